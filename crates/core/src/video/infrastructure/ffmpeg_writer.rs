use std::path::{Path, PathBuf};

use ffmpeg_next::format::context::Output;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::media::Type;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;
use ffmpeg_next::Rational;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_writer::VideoWriter;

/// Video sink backed by ffmpeg-next. Encodes RGB24 frames to MPEG4 and, when
/// the source file carries audio, remuxes that audio into the finished
/// output during `close` — no external ffmpeg binary involved.
pub struct FfmpegWriter {
    session: Option<EncodeSession>,
    output_path: Option<PathBuf>,
    source_path: Option<PathBuf>,
}

/// Everything that only exists between `open` and `close`.
struct EncodeSession {
    output: Output,
    encoder: ffmpeg_next::codec::encoder::video::Encoder,
    to_yuv: scaling::Context,
    width: u32,
    height: u32,
    fps: i32,
    next_pts: i64,
}

// Safety: the writer is moved to a single encode thread and never shared;
// the raw ffmpeg pointers inside are only touched from that thread.
unsafe impl Send for FfmpegWriter {}

impl FfmpegWriter {
    pub fn new() -> Self {
        Self {
            session: None,
            output_path: None,
            source_path: None,
        }
    }
}

impl Default for FfmpegWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl EncodeSession {
    fn start(path: &Path, metadata: &VideoMetadata) -> Result<Self, Box<dyn std::error::Error>> {
        let mut output = ffmpeg_next::format::output(path)?;
        let needs_global_header = output
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        // MPEG4 plays everywhere and needs no codec-specific options.
        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4)
            .ok_or("MPEG4 encoder not found")?;
        let mut stream = output.add_stream(Some(codec))?;

        let fps = usable_fps(metadata.fps);
        let mut encoder = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        encoder.set_width(metadata.width);
        encoder.set_height(metadata.height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(Rational(1, fps));
        encoder.set_frame_rate(Some(Rational(fps, 1)));
        if needs_global_header {
            encoder.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let encoder = encoder.open_with(ffmpeg_next::Dictionary::new())?;
        stream.set_parameters(&encoder);
        output.write_header()?;

        let to_yuv = scaling::Context::get(
            Pixel::RGB24,
            metadata.width,
            metadata.height,
            Pixel::YUV420P,
            metadata.width,
            metadata.height,
            scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            output,
            encoder,
            to_yuv,
            width: metadata.width,
            height: metadata.height,
            fps,
            next_pts: 0,
        })
    }

    fn encode(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let mut rgb = Video::new(Pixel::RGB24, self.width, self.height);
        copy_with_stride(frame.data(), &mut rgb, self.width, self.height);

        let mut yuv = Video::empty();
        self.to_yuv.run(&rgb, &mut yuv)?;
        yuv.set_pts(Some(self.next_pts));
        self.next_pts += 1;

        self.encoder.send_frame(&yuv)?;
        self.drain_packets()
    }

    fn finish(mut self) -> Result<(), Box<dyn std::error::Error>> {
        self.encoder.send_eof()?;
        self.drain_packets()?;
        self.output.write_trailer()?;
        Ok(())
    }

    fn drain_packets(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        let stream_time_base = self
            .output
            .stream(0)
            .ok_or("FfmpegWriter: output stream missing")?
            .time_base();

        let mut packet = ffmpeg_next::Packet::empty();
        while self.encoder.receive_packet(&mut packet).is_ok() {
            packet.set_stream(0);
            packet.rescale_ts(Rational(1, self.fps), stream_time_base);
            packet.write_interleaved(&mut self.output)?;
        }
        Ok(())
    }
}

impl VideoWriter for FfmpegWriter {
    fn open(
        &mut self,
        path: &Path,
        metadata: &VideoMetadata,
    ) -> Result<(), Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;
        self.session = Some(EncodeSession::start(path, metadata)?);
        self.output_path = Some(path.to_path_buf());
        self.source_path = metadata.source_path.clone();
        Ok(())
    }

    fn write(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        self.session
            .as_mut()
            .ok_or("FfmpegWriter: not opened")?
            .encode(frame)
    }

    fn close(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(session) = self.session.take() {
            session.finish()?;
        }

        // Carry over the source's audio track. A failure here leaves a
        // valid silent video, so it is reported but not fatal.
        if let (Some(source), Some(output)) = (self.source_path.take(), self.output_path.take()) {
            if let Err(e) = remux_source_audio(&source, &output) {
                log::warn!("Audio remux failed, output has no audio: {e}");
            }
        }
        Ok(())
    }
}

fn usable_fps(fps: f64) -> i32 {
    let rounded = fps.round() as i32;
    if rounded > 0 {
        rounded
    } else {
        30
    }
}

/// Writes packed RGB rows into an ffmpeg frame whose rows may be padded.
fn copy_with_stride(src: &[u8], rgb: &mut Video, width: u32, height: u32) {
    let stride = rgb.stride(0);
    let data = rgb.data_mut(0);
    let row_bytes = width as usize * 3;

    for row in 0..height as usize {
        data[row * stride..row * stride + row_bytes]
            .copy_from_slice(&src[row * row_bytes..(row + 1) * row_bytes]);
    }
}

/// Rebuilds `video_output` with the audio streams of `source` copied in
/// (stream copy, no transcode). A source without audio is a no-op.
fn remux_source_audio(source: &Path, video_output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    {
        let probe = ffmpeg_next::format::input(source)?;
        if probe.streams().best(Type::Audio).is_none() {
            return Ok(());
        }
    }

    let mut video_in = ffmpeg_next::format::input(video_output)?;
    let mut audio_in = ffmpeg_next::format::input(source)?;

    let ext = video_output
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("mp4");
    let staging = video_output.with_extension(format!("_mux.{ext}"));
    let mut muxed = ffmpeg_next::format::output(&staging)?;

    let video_map = map_streams(&video_in, Type::Video, &mut muxed, 0)?;
    let next = video_map.iter().filter(|m| m.is_some()).count();
    let audio_map = map_streams(&audio_in, Type::Audio, &mut muxed, next)?;

    muxed.write_header()?;
    copy_packets(&mut video_in, &video_map, &mut muxed)?;
    copy_packets(&mut audio_in, &audio_map, &mut muxed)?;
    muxed.write_trailer()?;

    std::fs::rename(&staging, video_output)?;
    Ok(())
}

/// Adds one stream-copy output stream per input stream of `medium`.
/// Returns input index → output index, `None` for unmapped streams.
fn map_streams(
    input: &ffmpeg_next::format::context::Input,
    medium: Type,
    muxed: &mut Output,
    first_output_index: usize,
) -> Result<Vec<Option<usize>>, Box<dyn std::error::Error>> {
    let mut map = vec![None; input.nb_streams() as usize];
    let mut next = first_output_index;

    for (index, stream) in input.streams().enumerate() {
        if stream.parameters().medium() != medium {
            continue;
        }
        let mut out = muxed.add_stream(ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::None))?;
        out.set_parameters(stream.parameters());
        // The source container's codec tag may not be valid in the output
        // container; zero lets the muxer pick.
        unsafe {
            (*out.parameters().as_mut_ptr()).codec_tag = 0;
        }
        map[index] = Some(next);
        next += 1;
    }
    Ok(map)
}

fn copy_packets(
    input: &mut ffmpeg_next::format::context::Input,
    map: &[Option<usize>],
    muxed: &mut Output,
) -> Result<(), Box<dyn std::error::Error>> {
    let input_time_bases: Vec<_> = input.streams().map(|s| s.time_base()).collect();

    for (stream, mut packet) in input.packets() {
        let Some(out_index) = map[stream.index()] else {
            continue;
        };
        let out_time_base = muxed
            .stream(out_index)
            .ok_or("remux: mapped stream missing")?
            .time_base();
        packet.rescale_ts(input_time_bases[stream.index()], out_time_base);
        packet.set_position(-1);
        packet.set_stream(out_index);
        packet.write_interleaved(muxed)?;
    }
    Ok(())
}
