use std::path::PathBuf;
use std::process;

use clap::Parser;

use reidtag_core::annotation::domain::frame_annotator::FrameAnnotator;
use reidtag_core::annotation::infrastructure::box_label_annotator::BoxLabelAnnotator;
use reidtag_core::detection::domain::person_detector::PersonDetector;
use reidtag_core::detection::infrastructure::bytetrack_tracker::ByteTracker;
use reidtag_core::detection::infrastructure::onnx_person_detector::OnnxPersonDetector;
use reidtag_core::identity::identity_resolver::IdentityResolver;
use reidtag_core::pipeline::infrastructure::threaded_pipeline_executor::ThreadedPipelineExecutor;
use reidtag_core::pipeline::label_people_use_case::{LabelPeopleUseCase, PipelineComponents};
use reidtag_core::pipeline::pipeline_logger::StdoutPipelineLogger;
use reidtag_core::reid::domain::embedding_extractor::EmbeddingExtractor;
use reidtag_core::reid::infrastructure::onnx_osnet_extractor::OnnxOsnetExtractor;
use reidtag_core::shared::constants::{
    DETECTOR_MODEL_NAME, DETECTOR_MODEL_URL, REID_MODEL_NAME, REID_MODEL_URL,
};
use reidtag_core::shared::model_resolver::{self, ProgressFn};
use reidtag_core::video::domain::video_reader::VideoReader;
use reidtag_core::video::domain::video_writer::VideoWriter;
use reidtag_core::video::infrastructure::ffmpeg_reader::FfmpegReader;
use reidtag_core::video::infrastructure::ffmpeg_writer::FfmpegWriter;

/// Person detection and stable identity labeling for videos.
#[derive(Parser)]
#[command(name = "reidtag")]
struct Cli {
    /// Input video file.
    input: PathBuf,

    /// Output video file.
    output: PathBuf,

    /// Squared-L2 distance threshold for matching a person to a known identity.
    #[arg(long, default_value = "0.7")]
    threshold: f32,

    /// Person detection confidence threshold (0.0-1.0).
    #[arg(long, default_value = "0.4")]
    confidence: f32,

    /// Frames a short-term track survives without a detection.
    #[arg(long, default_value = "30")]
    max_lost: usize,

    /// Print per-stage timing and throughput after processing.
    #[arg(long)]
    summary: bool,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    validate(&cli)?;

    let detector = build_detector(&cli)?;
    let extractor = build_extractor()?;
    let resolver = IdentityResolver::new(extractor.dimension(), cli.threshold);

    let mut reader: Box<dyn VideoReader> = Box::new(FfmpegReader::new());
    let metadata = reader.open(&cli.input)?;
    let writer: Box<dyn VideoWriter> = Box::new(FfmpegWriter::new());
    let annotator: Box<dyn FrameAnnotator> = Box::new(BoxLabelAnnotator::new());

    let total = metadata.total_frames;
    let progress: Box<dyn Fn(usize, usize) -> bool + Send> = Box::new(move |current, _| {
        eprint!("\rProcessing frame {current}/{total}");
        true
    });

    let components = PipelineComponents {
        reader,
        writer,
        detector,
        extractor,
        resolver,
        annotator,
    };
    let mut use_case = LabelPeopleUseCase::new(components, Box::new(ThreadedPipelineExecutor::new()))
        .with_progress(progress);
    if cli.summary {
        use_case = use_case.with_logger(Box::new(StdoutPipelineLogger::default()));
    }
    let summary = use_case.execute(&metadata, &cli.output)?;
    eprintln!();
    log::info!(
        "Output written to {} ({} frames, {} identities)",
        cli.output.display(),
        summary.frames_written,
        summary.identities
    );

    Ok(())
}

fn build_detector(cli: &Cli) -> Result<Box<dyn PersonDetector>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {DETECTOR_MODEL_NAME}");
    let model_path = model_resolver::resolve(
        DETECTOR_MODEL_NAME,
        DETECTOR_MODEL_URL,
        None,
        Some(download_progress("person detection model")),
    )?;
    eprintln!();

    let tracker = ByteTracker::new(cli.max_lost);
    Ok(Box::new(OnnxPersonDetector::new(
        &model_path,
        tracker,
        cli.confidence,
    )?))
}

fn build_extractor() -> Result<Box<dyn EmbeddingExtractor>, Box<dyn std::error::Error>> {
    log::info!("Resolving model: {REID_MODEL_NAME}");
    let model_path = model_resolver::resolve(
        REID_MODEL_NAME,
        REID_MODEL_URL,
        None,
        Some(download_progress("re-identification model")),
    )?;
    eprintln!();

    Ok(Box::new(OnnxOsnetExtractor::new(&model_path)?))
}

fn validate(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    if !cli.input.exists() {
        return Err(format!("Input file not found: {}", cli.input.display()).into());
    }
    if !(0.0..=1.0).contains(&cli.confidence) {
        return Err(format!(
            "Confidence must be between 0.0 and 1.0, got {}",
            cli.confidence
        )
        .into());
    }
    if cli.threshold.is_nan() || cli.threshold < 0.0 {
        return Err(format!("Threshold must be non-negative, got {}", cli.threshold).into());
    }
    Ok(())
}

fn download_progress(label: &'static str) -> ProgressFn {
    Box::new(move |downloaded, total| {
        if total > 0 {
            let pct = (downloaded as f64 / total as f64 * 100.0) as u32;
            eprint!("\rDownloading {label}... {pct}%");
        } else {
            eprint!("\rDownloading {label}... {downloaded} bytes");
        }
    })
}
