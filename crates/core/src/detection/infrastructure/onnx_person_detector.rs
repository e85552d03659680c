/// YOLOv8 person detector using ONNX Runtime via `ort`.
///
/// Handles letterbox preprocessing, inference, class filtering, NMS, and
/// short-term track assignment through [`ByteTracker`].
use std::path::Path;

use crate::detection::domain::person_detector::{PersonDetection, PersonDetector};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::execution_provider::preferred_execution_providers;
use crate::shared::frame::Frame;

use super::bytetrack_tracker::{ByteTracker, Candidate};

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f32 = 0.45;

/// COCO class index for "person".
const PERSON_CLASS_INDEX: usize = 0;

/// How the letterboxed model input maps back onto the source frame.
#[derive(Clone, Copy, Debug)]
struct LetterboxMap {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

/// Person detector backed by an ONNX Runtime session over a COCO-trained
/// YOLOv8 export.
pub struct OnnxPersonDetector {
    session: ort::session::Session,
    tracker: ByteTracker,
    confidence: f32,
    input_size: u32,
}

impl OnnxPersonDetector {
    /// Loads a YOLOv8 ONNX model and prepares for inference.
    ///
    /// The input resolution is read from the model's input shape (expecting
    /// NCHW). Falls back to 640 if the shape is dynamic or unreadable.
    pub fn new(
        model_path: &Path,
        tracker: ByteTracker,
        confidence: f32,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let session = ort::session::Session::builder()?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| {
                if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
                    // shape is [N, C, H, W]; H suffices for a square input
                    if shape.len() >= 4 && shape[2] > 0 {
                        Some(shape[2] as u32)
                    } else {
                        None
                    }
                } else {
                    None
                }
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        Ok(Self {
            session,
            tracker,
            confidence,
            input_size,
        })
    }
}

impl PersonDetector for OnnxPersonDetector {
    fn detect(
        &mut self,
        frame: &Frame,
    ) -> Result<Vec<PersonDetection>, Box<dyn std::error::Error>> {
        let (input_tensor, map) = letterbox(frame, self.input_size);

        let input_value = ort::value::Tensor::from_array(input_tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("detector model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape();

        // YOLOv8 emits [1, num_features, num_detections] (transposed) but
        // some exports use [1, num_detections, num_features]. Handle both.
        let (num_dets, num_feats, transposed) = if shape.len() == 3 {
            if shape[1] < shape[2] {
                (shape[2], shape[1], true)
            } else {
                (shape[1], shape[2], false)
            }
        } else {
            return Err(format!("unexpected detector output shape: {shape:?}").into());
        };

        let data = tensor.as_slice().ok_or("cannot view detector output as a slice")?;
        let mut candidates = decode_output(data, num_dets, num_feats, transposed, map, self.confidence);
        let kept = nms(&mut candidates, NMS_IOU_THRESH);

        let track_ids = self.tracker.assign(&kept);
        Ok(kept
            .into_iter()
            .zip(track_ids)
            .map(|(c, track_id)| PersonDetection {
                bbox: c.bbox,
                score: c.score,
                track_id,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Letterbox-resizes a frame to `target_size` x `target_size`, normalized
/// to `[0, 1]` NCHW float32, padded with YOLO's 114-gray.
fn letterbox(frame: &Frame, target_size: u32) -> (ndarray::Array4<f32>, LetterboxMap) {
    let fw = frame.width() as f32;
    let fh = frame.height() as f32;
    let target = target_size as f32;

    let scale = (target / fw).min(target / fh);
    let new_w = (fw * scale).round() as u32;
    let new_h = (fh * scale).round() as u32;
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let gray = 114.0f32 / 255.0;
    let mut tensor =
        ndarray::Array4::<f32>::from_elem((1, 3, target_size as usize, target_size as usize), gray);

    let src = frame.as_ndarray(); // [H, W, C] u8
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;

    // Nearest-neighbor resize into the padded region
    for y in 0..new_h as usize {
        let src_y = ((y as f32 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f32 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    (
        tensor,
        LetterboxMap {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
        },
    )
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

/// Converts raw model output rows into person candidates in frame
/// coordinates.
///
/// A YOLOv8 row is `[cx, cy, w, h, class_0 .. class_N]` with the scores
/// already sigmoid-activated. A row survives when "person" is its best
/// class and beats the confidence floor.
fn decode_output(
    data: &[f32],
    num_dets: usize,
    num_feats: usize,
    transposed: bool,
    map: LetterboxMap,
    confidence: f32,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();
    if num_feats < 5 {
        return candidates;
    }

    for i in 0..num_dets {
        let row: Vec<f32> = if transposed {
            (0..num_feats).map(|f| data[f * num_dets + i]).collect()
        } else {
            data[i * num_feats..(i + 1) * num_feats].to_vec()
        };

        let mut best_class = 0;
        let mut best_score = row[4];
        for (class, &score) in row[4..].iter().enumerate().skip(1) {
            if score > best_score {
                best_class = class;
                best_score = score;
            }
        }
        if best_class != PERSON_CLASS_INDEX || best_score < confidence {
            continue;
        }

        let centered = BoundingBox::from_center_size(row[0], row[1], row[2], row[3]);
        let bbox = BoundingBox::new(
            (centered.x1 - map.pad_x) / map.scale,
            (centered.y1 - map.pad_y) / map.scale,
            (centered.x2 - map.pad_x) / map.scale,
            (centered.y2 - map.pad_y) / map.scale,
        );
        candidates.push(Candidate {
            bbox,
            score: best_score,
        });
    }
    candidates
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

/// Greedy NMS: sort by score descending, suppress overlapping boxes.
fn nms(candidates: &mut [Candidate], iou_thresh: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(candidates[i].clone());
        for j in (i + 1)..candidates.len() {
            if suppressed[j] {
                continue;
            }
            if candidates[i].bbox.iou(&candidates[j].bbox) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    // ── Letterbox ────────────────────────────────────────────────────

    #[test]
    fn test_letterbox_pads_the_short_axis() {
        // 320x240 → 640: scale 2.0, resized 640x480, 80px top+bottom pad
        let frame = Frame::new(vec![0u8; 320 * 240 * 3], 320, 240, 3, 0);
        let (tensor, map) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(map.scale, 2.0);
        assert_relative_eq!(map.pad_x, 0.0);
        assert_relative_eq!(map.pad_y, 80.0);
    }

    #[test]
    fn test_letterbox_square_frame_has_no_padding() {
        let frame = Frame::new(vec![0u8; 100 * 100 * 3], 100, 100, 3, 0);
        let (tensor, map) = letterbox(&frame, 640);

        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_relative_eq!(map.scale, 6.4);
        assert_relative_eq!(map.pad_x, 0.0);
        assert_relative_eq!(map.pad_y, 0.0);
    }

    #[test]
    fn test_letterbox_normalizes_pixels_and_fills_gray() {
        let frame = Frame::new(vec![255u8; 100 * 50 * 3], 100, 50, 3, 0);
        let (tensor, map) = letterbox(&frame, 640);

        // Inside the image region pixels are 255/255.
        let y = map.pad_y as usize + 1;
        assert_relative_eq!(tensor[[0, 0, y, 1]], 1.0);
        // The pad region keeps YOLO's gray.
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 114.0 / 255.0);
    }

    // ── Decoding ─────────────────────────────────────────────────────

    const NO_PAD: LetterboxMap = LetterboxMap {
        scale: 1.0,
        pad_x: 0.0,
        pad_y: 0.0,
    };

    /// Rows of `[cx, cy, w, h, person, other]` laid out detection-major.
    fn flat(rows: &[[f32; 6]]) -> Vec<f32> {
        rows.iter().flatten().copied().collect()
    }

    #[test]
    fn test_decode_keeps_confident_person() {
        let data = flat(&[[100.0, 80.0, 20.0, 40.0, 0.9, 0.05]]);
        let candidates = decode_output(&data, 1, 6, false, NO_PAD, 0.4);

        assert_eq!(candidates.len(), 1);
        let bbox = candidates[0].bbox;
        assert_relative_eq!(bbox.x1, 90.0);
        assert_relative_eq!(bbox.y1, 60.0);
        assert_relative_eq!(bbox.x2, 110.0);
        assert_relative_eq!(bbox.y2, 100.0);
        assert_relative_eq!(candidates[0].score, 0.9);
    }

    #[test]
    fn test_decode_drops_person_below_confidence() {
        let data = flat(&[[100.0, 80.0, 20.0, 40.0, 0.3, 0.05]]);
        assert!(decode_output(&data, 1, 6, false, NO_PAD, 0.4).is_empty());
    }

    #[test]
    fn test_decode_drops_rows_of_other_classes() {
        // Confident, but the best class is not "person".
        let data = flat(&[[100.0, 80.0, 20.0, 40.0, 0.2, 0.95]]);
        assert!(decode_output(&data, 1, 6, false, NO_PAD, 0.4).is_empty());
    }

    #[test]
    fn test_decode_unmaps_letterbox_coordinates() {
        let map = LetterboxMap {
            scale: 2.0,
            pad_x: 0.0,
            pad_y: 80.0,
        };
        let data = flat(&[[320.0, 240.0, 64.0, 128.0, 0.8, 0.1]]);
        let candidates = decode_output(&data, 1, 6, false, map, 0.4);

        assert_eq!(candidates.len(), 1);
        let bbox = candidates[0].bbox;
        assert_relative_eq!(bbox.x1, 144.0);
        assert_relative_eq!(bbox.y1, 48.0);
        assert_relative_eq!(bbox.x2, 176.0);
        assert_relative_eq!(bbox.y2, 112.0);
    }

    #[test]
    fn test_decode_transposed_layout_matches_row_major() {
        let rows = [
            [100.0, 80.0, 20.0, 40.0, 0.9, 0.05],
            [300.0, 200.0, 30.0, 60.0, 0.7, 0.1],
        ];
        let row_major = flat(&rows);

        // Feature-major: data[f * num_dets + i]
        let mut feature_major = vec![0.0f32; 12];
        for (i, row) in rows.iter().enumerate() {
            for (f, &v) in row.iter().enumerate() {
                feature_major[f * 2 + i] = v;
            }
        }

        let a = decode_output(&row_major, 2, 6, false, NO_PAD, 0.4);
        let b = decode_output(&feature_major, 2, 6, true, NO_PAD, 0.4);
        assert_eq!(a.len(), 2);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(&b) {
            assert_relative_eq!(x.bbox.x1, y.bbox.x1);
            assert_relative_eq!(x.score, y.score);
        }
    }

    // ── NMS ──────────────────────────────────────────────────────────

    fn cand(x1: f32, y1: f32, x2: f32, y2: f32, score: f32) -> Candidate {
        Candidate {
            bbox: BoundingBox::new(x1, y1, x2, y2),
            score,
        }
    }

    #[test]
    fn test_nms_suppresses_overlapping_keeping_best_score() {
        let mut candidates = vec![
            cand(0.0, 0.0, 100.0, 100.0, 0.6),
            cand(5.0, 5.0, 105.0, 105.0, 0.9),
        ];
        let kept = nms(&mut candidates, 0.45);
        assert_eq!(kept.len(), 1);
        assert_relative_eq!(kept[0].score, 0.9);
    }

    #[test]
    fn test_nms_keeps_disjoint_boxes() {
        let mut candidates = vec![
            cand(0.0, 0.0, 50.0, 50.0, 0.9),
            cand(200.0, 200.0, 250.0, 250.0, 0.8),
        ];
        assert_eq!(nms(&mut candidates, 0.45).len(), 2);
    }

    #[test]
    fn test_nms_empty_input() {
        let mut candidates: Vec<Candidate> = Vec::new();
        assert!(nms(&mut candidates, 0.45).is_empty());
    }
}
