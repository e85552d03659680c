use std::path::Path;

use ffmpeg_next::format::context::Input;
use ffmpeg_next::format::Pixel;
use ffmpeg_next::media::Type;
use ffmpeg_next::software::scaling;
use ffmpeg_next::util::frame::video::Video;

use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;

/// Video source backed by ffmpeg-next (libavformat + libavcodec). Every
/// decoded picture is converted to tightly packed RGB24 before it leaves
/// this module.
pub struct FfmpegReader {
    input: Option<Input>,
    stream_index: usize,
}

// Safety: the reader is moved to a single decode thread and never shared;
// the raw ffmpeg pointers inside are only touched from that thread.
unsafe impl Send for FfmpegReader {}

impl FfmpegReader {
    pub fn new() -> Self {
        Self {
            input: None,
            stream_index: 0,
        }
    }
}

impl Default for FfmpegReader {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoMetadata, Box<dyn std::error::Error>> {
        ffmpeg_next::init()?;

        let input = ffmpeg_next::format::input(path)?;
        let stream = input
            .streams()
            .best(Type::Video)
            .ok_or("No video stream found")?;
        self.stream_index = stream.index();

        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?
            .decoder()
            .video()?;

        let rate = stream.rate();
        let metadata = VideoMetadata {
            width: decoder.width(),
            height: decoder.height(),
            fps: if rate.denominator() != 0 {
                f64::from(rate.numerator()) / f64::from(rate.denominator())
            } else {
                0.0
            },
            total_frames: stream.frames().max(0) as usize,
            codec: decoder
                .codec()
                .map(|c| c.name().to_string())
                .unwrap_or_default(),
            source_path: Some(path.to_path_buf()),
        };

        self.input = Some(input);
        Ok(metadata)
    }

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_> {
        let Some(input) = self.input.as_mut() else {
            return Box::new(std::iter::once(Err("FfmpegReader: not opened".into())));
        };

        match DecodeIter::new(input, self.stream_index) {
            Ok(iter) => Box::new(iter),
            Err(e) => Box::new(std::iter::once(Err(e))),
        }
    }

    fn close(&mut self) {
        self.input = None;
    }
}

/// Pulls packets, feeds the decoder, and yields RGB24 frames one at a time
/// so only one decoded picture is in flight.
struct DecodeIter<'a> {
    input: &'a mut Input,
    decoder: ffmpeg_next::decoder::Video,
    to_rgb: scaling::Context,
    width: u32,
    height: u32,
    stream_index: usize,
    next_index: usize,
    state: DecodeState,
}

#[derive(PartialEq)]
enum DecodeState {
    Reading,
    Flushing,
    Finished,
}

impl<'a> DecodeIter<'a> {
    fn new(input: &'a mut Input, stream_index: usize) -> Result<Self, Box<dyn std::error::Error>> {
        let stream = input
            .stream(stream_index)
            .ok_or("FfmpegReader: video stream disappeared")?;
        let decoder = ffmpeg_next::codec::context::Context::from_parameters(stream.parameters())?
            .decoder()
            .video()?;

        let (width, height) = (decoder.width(), decoder.height());
        let to_rgb = scaling::Context::get(
            decoder.format(),
            width,
            height,
            Pixel::RGB24,
            width,
            height,
            scaling::Flags::BILINEAR,
        )?;

        Ok(Self {
            input,
            decoder,
            to_rgb,
            width,
            height,
            stream_index,
            next_index: 0,
            state: DecodeState::Reading,
        })
    }

    /// One decoded frame out of the decoder, if it has one ready.
    fn receive(&mut self) -> Option<Result<Frame, Box<dyn std::error::Error>>> {
        let mut decoded = Video::empty();
        if self.decoder.receive_frame(&mut decoded).is_err() {
            return None;
        }

        let mut rgb = Video::empty();
        if let Err(e) = self.to_rgb.run(&decoded, &mut rgb) {
            return Some(Err(Box::new(e)));
        }

        let frame = Frame::new(
            strip_row_padding(&rgb, self.width, self.height),
            self.width,
            self.height,
            3,
            self.next_index,
        );
        self.next_index += 1;
        Some(Ok(frame))
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = Result<Frame, Box<dyn std::error::Error>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.state == DecodeState::Finished {
                return None;
            }
            if let Some(result) = self.receive() {
                return Some(result);
            }
            if self.state == DecodeState::Flushing {
                self.state = DecodeState::Finished;
                return None;
            }

            // Feed packets until the decoder produces output or the
            // container runs dry.
            match self.input.packets().next() {
                Some((stream, packet)) => {
                    if stream.index() == self.stream_index {
                        let _ = self.decoder.send_packet(&packet);
                    }
                }
                None => {
                    let _ = self.decoder.send_eof();
                    self.state = DecodeState::Flushing;
                }
            }
        }
    }
}

/// ffmpeg rows may carry trailing padding (stride > width * 3); repack into
/// a contiguous buffer the rest of the pipeline can index directly.
fn strip_row_padding(rgb: &Video, width: u32, height: u32) -> Vec<u8> {
    let stride = rgb.stride(0);
    let data = rgb.data(0);
    let row_bytes = width as usize * 3;

    let mut pixels = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        pixels.extend_from_slice(&data[row * stride..row * stride + row_bytes]);
    }
    pixels
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;

    use ffmpeg_next::format::Pixel;
    use ffmpeg_next::software::scaling;
    use ffmpeg_next::util::frame::video::Video;
    use ffmpeg_next::Rational;

    /// Encodes a short MPEG4 clip: black background with a small white
    /// square that moves right one pixel per frame. Gives the decoder real
    /// work without shipping a fixture file.
    pub fn create_test_video(path: &Path, num_frames: usize, width: u32, height: u32, fps: f64) {
        ffmpeg_next::init().unwrap();

        let mut output = ffmpeg_next::format::output(path).unwrap();
        let needs_global_header = output
            .format()
            .flags()
            .contains(ffmpeg_next::format::Flags::GLOBAL_HEADER);

        let codec = ffmpeg_next::encoder::find(ffmpeg_next::codec::Id::MPEG4).unwrap();
        let mut stream = output.add_stream(Some(codec)).unwrap();

        let mut encoder = ffmpeg_next::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .unwrap();
        encoder.set_width(width);
        encoder.set_height(height);
        encoder.set_format(Pixel::YUV420P);
        encoder.set_time_base(Rational(1, fps as i32));
        encoder.set_frame_rate(Some(Rational(fps as i32, 1)));
        if needs_global_header {
            encoder.set_flags(ffmpeg_next::codec::Flags::GLOBAL_HEADER);
        }

        let mut encoder = encoder.open_with(ffmpeg_next::Dictionary::new()).unwrap();
        stream.set_parameters(&encoder);
        output.write_header().unwrap();
        let stream_time_base = output.stream(0).unwrap().time_base();

        let mut to_yuv = scaling::Context::get(
            Pixel::RGB24,
            width,
            height,
            Pixel::YUV420P,
            width,
            height,
            scaling::Flags::BILINEAR,
        )
        .unwrap();

        let flush = |encoder: &mut ffmpeg_next::encoder::Video,
                         output: &mut ffmpeg_next::format::context::Output| {
            let mut packet = ffmpeg_next::Packet::empty();
            while encoder.receive_packet(&mut packet).is_ok() {
                packet.set_stream(0);
                packet.rescale_ts(Rational(1, fps as i32), stream_time_base);
                packet.write_interleaved(output).unwrap();
            }
        };

        for i in 0..num_frames {
            let mut rgb = Video::new(Pixel::RGB24, width, height);
            paint_square(&mut rgb, width, height, i);

            let mut yuv = Video::empty();
            to_yuv.run(&rgb, &mut yuv).unwrap();
            yuv.set_pts(Some(i as i64));

            encoder.send_frame(&yuv).unwrap();
            flush(&mut encoder, &mut output);
        }

        encoder.send_eof().unwrap();
        flush(&mut encoder, &mut output);
        output.write_trailer().unwrap();
    }

    fn paint_square(rgb: &mut Video, width: u32, height: u32, frame_index: usize) {
        let stride = rgb.stride(0);
        let data = rgb.data_mut(0);
        let side = (height / 4).max(4) as usize;
        let x0 = frame_index % (width as usize - side);
        let y0 = height as usize / 2 - side / 2;

        for row in y0..y0 + side {
            for col in x0..x0 + side {
                let at = row * stride + col * 3;
                data[at] = 255;
                data[at + 1] = 255;
                data[at + 2] = 255;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::create_test_video;
    use super::*;

    #[test]
    fn test_open_reports_stream_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.mp4");
        create_test_video(&path, 5, 160, 120, 30.0);

        let mut reader = FfmpegReader::new();
        let meta = reader.open(&path).unwrap();
        assert_eq!(meta.width, 160);
        assert_eq!(meta.height, 120);
        assert!(meta.fps > 0.0);
        assert_eq!(meta.source_path, Some(path));
    }

    #[test]
    fn test_open_missing_file_is_an_error() {
        let mut reader = FfmpegReader::new();
        assert!(reader.open(Path::new("/nonexistent/in.mp4")).is_err());
    }

    #[test]
    fn test_decodes_every_frame_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.mp4");
        create_test_video(&path, 6, 160, 120, 30.0);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();

        let frames: Vec<_> = reader.frames().map(|f| f.unwrap()).collect();
        assert_eq!(frames.len(), 6);
        for (i, frame) in frames.iter().enumerate() {
            assert_eq!(frame.index(), i);
        }
    }

    #[test]
    fn test_frames_are_packed_rgb24() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.mp4");
        create_test_video(&path, 2, 160, 120, 30.0);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();

        let frame = reader.frames().next().unwrap().unwrap();
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.data().len(), 160 * 120 * 3);
    }

    #[test]
    fn test_frames_before_open_yields_error() {
        let mut reader = FfmpegReader::new();
        let result = reader.frames().next().unwrap();
        assert!(result.is_err());
    }

    #[test]
    fn test_close_twice_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("in.mp4");
        create_test_video(&path, 1, 160, 120, 30.0);

        let mut reader = FfmpegReader::new();
        reader.open(&path).unwrap();
        reader.close();
        reader.close();
    }
}
