use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

/// One person found in a frame.
#[derive(Clone, Debug)]
pub struct PersonDetection {
    pub bbox: BoundingBox,
    pub score: f32,
    /// Short-term tracker id. Ephemeral: it can change when the person is
    /// occluded or leaves the frame, so it only serves as a display hint,
    /// never as identity.
    pub track_id: Option<u32>,
}

/// Domain interface for person detection.
///
/// Implementations may be stateful (e.g., tracking across frames),
/// hence `&mut self`.
pub trait PersonDetector: Send {
    fn detect(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<PersonDetection>, Box<dyn std::error::Error>>;
}
