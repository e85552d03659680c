use crate::identity::global_identity::GlobalIdentity;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// One detection with its resolved identity, ready to draw.
#[derive(Clone, Debug)]
pub struct LabeledDetection {
    pub bbox: BoundingBox,
    pub identity: GlobalIdentity,
}

/// Domain interface for drawing identity labels onto a frame.
///
/// Implementations modify the frame in-place (`&mut Frame`) to avoid
/// allocation.
pub trait FrameAnnotator: Send {
    fn annotate(
        &self,
        frame: &mut Frame,
        detections: &[LabeledDetection],
    ) -> Result<(), Box<dyn std::error::Error>>;
}
