use crate::annotation::domain::frame_annotator::{FrameAnnotator, LabeledDetection};
use crate::shared::bounding_box::PixelRect;
use crate::shared::frame::Frame;

/// Box and label color (RGB green).
const COLOR: [u8; 3] = [0, 255, 0];

/// Outline stroke width in pixels, drawn inward from the box edge.
const STROKE: u32 = 2;

/// Integer upscale factor for the 5x7 glyph bitmaps.
const LABEL_SCALE: u32 = 2;

/// Gap between the label baseline and the box's top edge.
const LABEL_MARGIN: u32 = 4;

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;

/// CPU annotator: strokes each detection's box and writes an `ID: n`
/// label above its top-left corner using a built-in 5x7 bitmap font.
///
/// Geometry is clamped so drawing always stays inside the frame; a
/// detection entirely outside the frame is skipped.
pub struct BoxLabelAnnotator;

impl BoxLabelAnnotator {
    pub fn new() -> Self {
        Self
    }
}

impl Default for BoxLabelAnnotator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAnnotator for BoxLabelAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        detections: &[LabeledDetection],
    ) -> Result<(), Box<dyn std::error::Error>> {
        for det in detections {
            let Some(rect) = det.bbox.pixel_rect(frame.width(), frame.height()) else {
                continue;
            };
            draw_rect_outline(frame, rect, COLOR, STROKE);

            let label = format!("ID: {}", det.identity);
            let text_height = GLYPH_HEIGHT * LABEL_SCALE;
            let label_y = rect.y.saturating_sub(text_height + LABEL_MARGIN);
            draw_text(frame, &label, rect.x, label_y, LABEL_SCALE, COLOR);
        }
        Ok(())
    }
}

/// Strokes the rectangle border, growing inward so the outline never
/// leaves the (already clamped) rect.
fn draw_rect_outline(frame: &mut Frame, rect: PixelRect, color: [u8; 3], stroke: u32) {
    let x1 = rect.x + rect.width;
    let y1 = rect.y + rect.height;
    let stroke = stroke.min(rect.width).min(rect.height);

    for y in rect.y..y1 {
        let on_horizontal_band = y < rect.y + stroke || y >= y1 - stroke;
        if on_horizontal_band {
            for x in rect.x..x1 {
                put_pixel(frame, x, y, color);
            }
        } else {
            for x in rect.x..(rect.x + stroke) {
                put_pixel(frame, x, y, color);
            }
            for x in (x1 - stroke)..x1 {
                put_pixel(frame, x, y, color);
            }
        }
    }
}

/// Renders `text` with its top-left corner at `(x, y)`, skipping pixels
/// that fall outside the frame.
fn draw_text(frame: &mut Frame, text: &str, x: u32, y: u32, scale: u32, color: [u8; 3]) {
    let advance = (GLYPH_WIDTH + 1) * scale;
    let mut pen_x = x;
    for ch in text.chars() {
        let rows = glyph(ch);
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (0b10000 >> col) == 0 {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let px = pen_x + col * scale + dx;
                        let py = y + row as u32 * scale + dy;
                        if px < frame.width() && py < frame.height() {
                            put_pixel(frame, px, py, color);
                        }
                    }
                }
            }
        }
        pen_x += advance;
    }
}

fn put_pixel(frame: &mut Frame, x: u32, y: u32, color: [u8; 3]) {
    let channels = frame.channels() as usize;
    let offset = (y as usize * frame.width() as usize + x as usize) * channels;
    let data = frame.data_mut();
    for (c, &value) in color.iter().enumerate().take(channels) {
        data[offset + c] = value;
    }
}

/// 5x7 bitmaps for the characters a label can contain; each row is the
/// top 5 bits reading left to right. Unknown characters render blank.
fn glyph(ch: char) -> [u8; 7] {
    match ch {
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        ':' => [0x00, 0x04, 0x04, 0x00, 0x04, 0x04, 0x00],
        _ => [0x00; 7],
    }
}
