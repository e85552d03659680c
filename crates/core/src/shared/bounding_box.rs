/// Axis-aligned box in pixel coordinates: `(x1, y1)` top-left inclusive,
/// `(x2, y2)` bottom-right exclusive. Coordinates stay in floating point
/// until a pixel operation needs integers.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// An integer rectangle fully inside a frame, produced by clamping a
/// [`BoundingBox`] to frame bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Builds a box from center coordinates and size, the layout detector
    /// heads emit before decoding.
    pub fn from_center_size(cx: f32, cy: f32, width: f32, height: f32) -> Self {
        Self {
            x1: cx - width / 2.0,
            y1: cy - height / 2.0,
            x2: cx + width / 2.0,
            y2: cy + height / 2.0,
        }
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x1 = self.x1.max(other.x1);
        let y1 = self.y1.max(other.y1);
        let x2 = self.x2.min(other.x2);
        let y2 = self.y2.min(other.y2);

        let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
        if inter == 0.0 {
            return 0.0;
        }
        inter / (self.area() + other.area() - inter)
    }

    /// Truncates coordinates to whole pixels and clamps them to the frame.
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn pixel_rect(&self, frame_width: u32, frame_height: u32) -> Option<PixelRect> {
        let x1 = (self.x1.max(0.0) as u32).min(frame_width);
        let y1 = (self.y1.max(0.0) as u32).min(frame_height);
        let x2 = (self.x2.max(0.0) as u32).min(frame_width);
        let y2 = (self.y2.max(0.0) as u32).min(frame_height);
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(PixelRect {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
        })
    }
}
