use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::person_detector::PersonDetector;
use crate::identity::identity_resolver::IdentityResolver;
use crate::pipeline::pipeline_logger::PipelineLogger;
use crate::reid::domain::embedding_extractor::EmbeddingExtractor;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

/// Configuration for a pipeline execution run.
pub struct PipelineConfig {
    pub on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
    pub cancelled: Arc<AtomicBool>,
    pub logger: Box<dyn PipelineLogger>,
}

/// End-of-run counters reported back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelSummary {
    pub frames_written: usize,
    /// Number of distinct people the resolver assigned across the whole run.
    pub identities: usize,
}

/// Abstracts how the read → identify → annotate → write pipeline is executed.
///
/// This is a port (application-layer interface). Infrastructure provides
/// concrete implementations (e.g. threaded, single-threaded).
pub trait PipelineExecutor: Send {
    #[allow(clippy::too_many_arguments)]
    fn execute(
        &self,
        reader: Box<dyn VideoReader>,
        writer: Box<dyn VideoWriter>,
        detector: Box<dyn PersonDetector>,
        extractor: Box<dyn EmbeddingExtractor>,
        resolver: IdentityResolver,
        annotator: Box<dyn FrameAnnotator>,
        metadata: &VideoMetadata,
        output_path: &Path,
        config: PipelineConfig,
    ) -> Result<LabelSummary, Box<dyn std::error::Error>>;
}
