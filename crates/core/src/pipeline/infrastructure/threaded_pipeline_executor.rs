use std::path::Path;
use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::annotation::domain::frame_annotator::{FrameAnnotator, LabeledDetection};
use crate::detection::domain::person_detector::PersonDetector;
use crate::identity::identity_resolver::IdentityResolver;
use crate::pipeline::pipeline_executor::{LabelSummary, PipelineConfig, PipelineExecutor};
use crate::reid::domain::embedding_extractor::EmbeddingExtractor;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

const DEFAULT_CHANNEL_CAPACITY: usize = 8;

type SendError = Box<dyn std::error::Error + Send + Sync>;

/// Executes the labeling pipeline with dedicated threads for I/O and
/// inference.
///
/// Layout: `reader → identify [detect/embed/resolve] → main [annotate] → writer`
///
/// Inference and I/O run concurrently so they overlap, improving throughput
/// when detection and embedding are the bottleneck. The identity resolver is
/// owned by the identify thread alone, so resolve calls are serialized by
/// construction.
pub struct ThreadedPipelineExecutor {
    channel_capacity: usize,
}

impl ThreadedPipelineExecutor {
    pub fn new() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Default for ThreadedPipelineExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl PipelineExecutor for ThreadedPipelineExecutor {
    fn execute(
        &self,
        reader: Box<dyn VideoReader>,
        mut writer: Box<dyn VideoWriter>,
        detector: Box<dyn PersonDetector>,
        extractor: Box<dyn EmbeddingExtractor>,
        resolver: IdentityResolver,
        annotator: Box<dyn FrameAnnotator>,
        metadata: &VideoMetadata,
        output_path: &Path,
        mut config: PipelineConfig,
    ) -> Result<LabelSummary, Box<dyn std::error::Error>> {
        let total_frames = metadata.total_frames;
        let cap = self.channel_capacity;

        writer.open(output_path, metadata)?;

        let (frame_tx, frame_rx) = crossbeam_channel::bounded::<Result<Frame, SendError>>(cap);
        let (identified_tx, identified_rx) =
            crossbeam_channel::bounded::<Result<IdentifiedFrame, SendError>>(cap);
        let (write_tx, write_rx) = crossbeam_channel::bounded::<Frame>(cap);

        let reader_handle = spawn_reader(reader, frame_tx, config.cancelled.clone());
        let identify_handle = spawn_identify(
            IdentifyStage {
                detector,
                extractor,
                resolver,
            },
            frame_rx,
            identified_tx,
            config.cancelled.clone(),
        );
        let writer_handle = spawn_writer(writer, write_rx);

        let (frames_written, main_error) = run_main_loop(
            identified_rx,
            &write_tx,
            &*annotator,
            total_frames,
            &mut config,
        );

        drop(write_tx);

        let stage = join_threads(reader_handle, identify_handle, writer_handle, main_error)?;
        config.logger.summary();

        Ok(LabelSummary {
            frames_written,
            identities: stage.resolver.identity_count(),
        })
    }
}

/// One frame after the identify stage: every detection carries the stable
/// identity the resolver assigned to it.
struct IdentifiedFrame {
    frame: Frame,
    detections: Vec<LabeledDetection>,
    timings: StageTimings,
}

/// Per-frame stage durations, measured on the identify thread and reported
/// to the logger on the main thread.
struct StageTimings {
    detect_ms: f64,
    embed_ms: f64,
    resolve_ms: f64,
}

/// The inference stages that must run one frame at a time: person detection,
/// embedding extraction, and identity resolution.
struct IdentifyStage {
    detector: Box<dyn PersonDetector>,
    extractor: Box<dyn EmbeddingExtractor>,
    resolver: IdentityResolver,
}

impl IdentifyStage {
    fn identify(
        &mut self,
        frame: &Frame,
    ) -> Result<(Vec<LabeledDetection>, StageTimings), Box<dyn std::error::Error>> {
        let start = Instant::now();
        let detections = self.detector.detect(frame)?;
        let detect_ms = start.elapsed().as_secs_f64() * 1000.0;

        let mut embed_ms = 0.0;
        let mut resolve_ms = 0.0;
        let mut labeled = Vec::with_capacity(detections.len());

        for detection in &detections {
            let start = Instant::now();
            let embedding = self.embed(frame, &detection.bbox);
            embed_ms += start.elapsed().as_secs_f64() * 1000.0;

            let start = Instant::now();
            let identity = self.resolver.resolve(&embedding)?;
            resolve_ms += start.elapsed().as_secs_f64() * 1000.0;

            labeled.push(LabeledDetection {
                bbox: detection.bbox,
                identity,
            });
        }

        Ok((
            labeled,
            StageTimings {
                detect_ms,
                embed_ms,
                resolve_ms,
            },
        ))
    }

    /// Crops the detection out of the frame and embeds it. Detections whose
    /// clamped pixel rectangle is empty get an all-zero embedding, the same
    /// fallback the extractor uses for failed inference.
    fn embed(&mut self, frame: &Frame, bbox: &BoundingBox) -> Vec<f32> {
        let crop = bbox
            .pixel_rect(frame.width(), frame.height())
            .and_then(|r| frame.crop(r.x, r.y, r.width, r.height));
        match crop {
            Some(crop) => self.extractor.extract(&crop),
            None => vec![0.0; self.extractor.dimension()],
        }
    }
}

fn spawn_reader(
    mut reader: Box<dyn VideoReader>,
    frame_tx: crossbeam_channel::Sender<Result<Frame, SendError>>,
    cancelled: std::sync::Arc<std::sync::atomic::AtomicBool>,
) -> std::thread::JoinHandle<Box<dyn VideoReader>> {
    std::thread::spawn(move || {
        for frame_result in reader.frames() {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }
            let mapped = frame_result.map_err(|e| -> SendError { e.to_string().into() });
            if frame_tx.send(mapped).is_err() {
                break;
            }
        }
        reader.close();
        reader
    })
}

fn spawn_identify(
    mut stage: IdentifyStage,
    frame_rx: crossbeam_channel::Receiver<Result<Frame, SendError>>,
    identified_tx: crossbeam_channel::Sender<Result<IdentifiedFrame, SendError>>,
    cancelled: std::sync::Arc<std::sync::atomic::AtomicBool>,
) -> std::thread::JoinHandle<IdentifyStage> {
    std::thread::spawn(move || {
        for frame_result in frame_rx {
            if cancelled.load(Ordering::Relaxed) {
                break;
            }

            let result = match frame_result {
                Ok(frame) => match stage.identify(&frame) {
                    Ok((detections, timings)) => Ok(IdentifiedFrame {
                        frame,
                        detections,
                        timings,
                    }),
                    Err(e) => Err(e.to_string().into()),
                },
                Err(e) => Err(e),
            };

            if identified_tx.send(result).is_err() {
                break;
            }
        }
        stage
    })
}

fn spawn_writer(
    mut writer: Box<dyn VideoWriter>,
    write_rx: crossbeam_channel::Receiver<Frame>,
) -> std::thread::JoinHandle<Result<Box<dyn VideoWriter>, SendError>> {
    std::thread::spawn(move || {
        for frame in write_rx {
            writer
                .write(&frame)
                .map_err(|e| -> SendError { e.to_string().into() })?;
        }
        Ok(writer)
    })
}

/// Runs the main thread loop: receive identified frames, draw the labels,
/// and send to writer.
fn run_main_loop(
    identified_rx: crossbeam_channel::Receiver<Result<IdentifiedFrame, SendError>>,
    write_tx: &crossbeam_channel::Sender<Frame>,
    annotator: &dyn FrameAnnotator,
    total_frames: usize,
    config: &mut PipelineConfig,
) -> (usize, Option<Box<dyn std::error::Error>>) {
    let mut frames_written: usize = 0;

    for identified_result in identified_rx {
        if config.cancelled.load(Ordering::Relaxed) {
            break;
        }

        let IdentifiedFrame {
            mut frame,
            detections,
            timings,
        } = match identified_result {
            Ok(identified) => identified,
            Err(e) => return (frames_written, Some(e.to_string().into())),
        };

        let start = Instant::now();
        if let Err(e) = annotator.annotate(&mut frame, &detections) {
            return (frames_written, Some(e));
        }
        let annotate_ms = start.elapsed().as_secs_f64() * 1000.0;

        if write_tx.send(frame).is_err() {
            return (
                frames_written,
                Some("Writer channel closed unexpectedly".into()),
            );
        }

        frames_written += 1;

        config.logger.timing("detect", timings.detect_ms);
        config.logger.timing("embed", timings.embed_ms);
        config.logger.timing("resolve", timings.resolve_ms);
        config.logger.timing("annotate", annotate_ms);
        config.logger.metric("people", detections.len() as f64);
        config.logger.progress(frames_written, total_frames);

        if let Some(ref callback) = config.on_progress {
            if !callback(frames_written, total_frames) {
                return (frames_written, Some("Cancelled".into()));
            }
        }
    }

    (frames_written, None)
}

/// Joins all pipeline threads and coalesces the first error encountered.
fn join_threads(
    reader_handle: std::thread::JoinHandle<Box<dyn VideoReader>>,
    identify_handle: std::thread::JoinHandle<IdentifyStage>,
    writer_handle: std::thread::JoinHandle<Result<Box<dyn VideoWriter>, SendError>>,
    mut first_error: Option<Box<dyn std::error::Error>>,
) -> Result<IdentifyStage, Box<dyn std::error::Error>> {
    fn set_if_none(slot: &mut Option<Box<dyn std::error::Error>>, err: Box<dyn std::error::Error>) {
        if slot.is_none() {
            *slot = Some(err);
        }
    }

    match reader_handle.join() {
        Ok(mut r) => r.close(),
        Err(_) => set_if_none(&mut first_error, "Reader thread panicked".into()),
    }

    let stage = match identify_handle.join() {
        Ok(stage) => Some(stage),
        Err(_) => {
            set_if_none(&mut first_error, "Identify thread panicked".into());
            None
        }
    };

    match writer_handle.join() {
        Ok(Ok(mut w)) => {
            if let Err(e) = w.close() {
                set_if_none(&mut first_error, e);
            }
        }
        Ok(Err(e)) => set_if_none(&mut first_error, e.to_string().into()),
        Err(_) => set_if_none(&mut first_error, "Writer thread panicked".into()),
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(stage.expect("identify thread joined without error")),
    }
}
