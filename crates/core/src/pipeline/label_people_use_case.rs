use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::person_detector::PersonDetector;
use crate::identity::identity_resolver::IdentityResolver;
use crate::reid::domain::embedding_extractor::EmbeddingExtractor;
use crate::shared::video_metadata::VideoMetadata;
use crate::video::domain::video_reader::VideoReader;
use crate::video::domain::video_writer::VideoWriter;

use super::pipeline_executor::{LabelSummary, PipelineConfig, PipelineExecutor};
use super::pipeline_logger::{NullPipelineLogger, PipelineLogger};

/// The six collaborators one labeling run consumes.
pub struct PipelineComponents {
    pub reader: Box<dyn VideoReader>,
    pub writer: Box<dyn VideoWriter>,
    pub detector: Box<dyn PersonDetector>,
    pub extractor: Box<dyn EmbeddingExtractor>,
    pub resolver: IdentityResolver,
    pub annotator: Box<dyn FrameAnnotator>,
}

/// Application entry point for "label every person in this video".
///
/// Owns the assembled components and hands them to a [`PipelineExecutor`].
/// Single-use: `execute` moves the components out, so a second call fails
/// rather than silently reusing a spent resolver.
pub struct LabelPeopleUseCase {
    components: Option<PipelineComponents>,
    executor: Box<dyn PipelineExecutor>,
    on_progress: Option<Box<dyn Fn(usize, usize) -> bool + Send>>,
    cancelled: Arc<AtomicBool>,
    logger: Option<Box<dyn PipelineLogger>>,
}

impl LabelPeopleUseCase {
    pub fn new(components: PipelineComponents, executor: Box<dyn PipelineExecutor>) -> Self {
        Self {
            components: Some(components),
            executor,
            on_progress: None,
            cancelled: Arc::new(AtomicBool::new(false)),
            logger: None,
        }
    }

    /// Per-frame progress callback; returning `false` aborts the run.
    pub fn with_progress(
        mut self,
        on_progress: Box<dyn Fn(usize, usize) -> bool + Send>,
    ) -> Self {
        self.on_progress = Some(on_progress);
        self
    }

    /// External cancellation flag, checked between frames.
    pub fn with_cancel_flag(mut self, cancelled: Arc<AtomicBool>) -> Self {
        self.cancelled = cancelled;
        self
    }

    pub fn with_logger(mut self, logger: Box<dyn PipelineLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn execute(
        &mut self,
        metadata: &VideoMetadata,
        output_path: &Path,
    ) -> Result<LabelSummary, Box<dyn std::error::Error>> {
        let PipelineComponents {
            reader,
            writer,
            detector,
            extractor,
            resolver,
            annotator,
        } = self.components.take().ok_or("Pipeline already executed")?;

        let config = PipelineConfig {
            on_progress: self.on_progress.take(),
            cancelled: self.cancelled.clone(),
            logger: self
                .logger
                .take()
                .unwrap_or_else(|| Box::new(NullPipelineLogger)),
        };

        self.executor.execute(
            reader, writer, detector, extractor, resolver, annotator, metadata, output_path,
            config,
        )
    }
}
