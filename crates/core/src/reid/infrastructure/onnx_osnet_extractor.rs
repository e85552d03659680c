/// OSNet appearance-embedding extractor using ONNX Runtime.
///
/// Produces the raw (unnormalized) OSNet feature vector; the identity
/// resolver's squared-L2 threshold is calibrated against these raw
/// values, so no L2 normalization is applied here.
use std::path::Path;

use crate::reid::domain::embedding_extractor::EmbeddingExtractor;
use crate::shared::constants::EMBEDDING_DIM;
use crate::shared::execution_provider::preferred_execution_providers;
use crate::shared::frame::Frame;

const INPUT_HEIGHT: usize = 256;
const INPUT_WIDTH: usize = 128;

/// ImageNet channel statistics, matching the model's training transform.
const NORM_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const NORM_STD: [f32; 3] = [0.229, 0.224, 0.225];

pub struct OnnxOsnetExtractor {
    session: ort::session::Session,
    dimension: usize,
}

impl OnnxOsnetExtractor {
    /// Loads an OSNet ONNX export and prepares for inference.
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let intra_threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        let session = ort::session::Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_inter_threads(1)?
            .with_intra_threads(intra_threads)?
            .with_execution_providers(preferred_execution_providers())?
            .commit_from_file(model_path)?;

        Ok(Self {
            session,
            dimension: EMBEDDING_DIM,
        })
    }

    fn run_inference(&mut self, crop: &Frame) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let tensor = preprocess(crop);
        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding = embedding_array
            .as_slice()
            .ok_or("cannot view embedding output as a slice")?;

        if embedding.len() != self.dimension {
            return Err(format!(
                "model emitted {} embedding components, expected {}",
                embedding.len(),
                self.dimension
            )
            .into());
        }
        Ok(embedding.to_vec())
    }
}

impl EmbeddingExtractor for OnnxOsnetExtractor {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn extract(&mut self, crop: &Frame) -> Vec<f32> {
        match self.run_inference(crop) {
            Ok(embedding) => embedding,
            Err(e) => {
                log::warn!(
                    "embedding extraction failed on frame {}: {e}; substituting zeros",
                    crop.index()
                );
                vec![0.0; self.dimension]
            }
        }
    }
}

/// Resizes a crop to 256x128 and applies the ImageNet normalization in
/// NCHW layout.
fn preprocess(crop: &Frame) -> ndarray::Array4<f32> {
    let src = crop.as_ndarray(); // [H, W, C] u8
    let src_h = crop.height() as usize;
    let src_w = crop.width() as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_HEIGHT, INPUT_WIDTH));
    for y in 0..INPUT_HEIGHT {
        let src_y =
            (((y as f64 + 0.5) * src_h as f64 / INPUT_HEIGHT as f64) as usize).min(src_h - 1);
        for x in 0..INPUT_WIDTH {
            let src_x =
                (((x as f64 + 0.5) * src_w as f64 / INPUT_WIDTH as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                let value = src[[src_y, src_x, c]] as f32 / 255.0;
                tensor[[0, c, y, x]] = (value - NORM_MEAN[c]) / NORM_STD[c];
            }
        }
    }
    tensor
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_preprocess_shape_is_person_aspect() {
        let crop = Frame::new(vec![128u8; 40 * 80 * 3], 40, 80, 3, 0);
        let tensor = preprocess(&crop);
        assert_eq!(tensor.shape(), &[1, 3, 256, 128]);
    }

    #[test]
    fn test_preprocess_normalizes_per_channel() {
        let crop = Frame::new(vec![255u8; 10 * 20 * 3], 10, 20, 3, 0);
        let tensor = preprocess(&crop);
        for c in 0..3 {
            let expected = (1.0 - NORM_MEAN[c]) / NORM_STD[c];
            assert_relative_eq!(tensor[[0, c, 0, 0]], expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_preprocess_black_pixels_map_below_zero() {
        let crop = Frame::new(vec![0u8; 10 * 20 * 3], 10, 20, 3, 0);
        let tensor = preprocess(&crop);
        for c in 0..3 {
            let expected = (0.0 - NORM_MEAN[c]) / NORM_STD[c];
            assert_relative_eq!(tensor[[0, c, 10, 10]], expected, epsilon = 1e-5);
        }
    }

    #[test]
    fn test_preprocess_resize_keeps_left_right_structure() {
        // 4x4 crop, left half black, right half white.
        let mut data = vec![0u8; 4 * 4 * 3];
        for row in 0..4 {
            for col in 2..4 {
                let base = (row * 4 + col) * 3;
                data[base] = 255;
                data[base + 1] = 255;
                data[base + 2] = 255;
            }
        }
        let crop = Frame::new(data, 4, 4, 3, 0);
        let tensor = preprocess(&crop);

        let black = (0.0 - NORM_MEAN[0]) / NORM_STD[0];
        let white = (1.0 - NORM_MEAN[0]) / NORM_STD[0];
        assert_relative_eq!(tensor[[0, 0, 5, 0]], black, epsilon = 1e-5);
        assert_relative_eq!(tensor[[0, 0, 5, 127]], white, epsilon = 1e-5);
    }

    #[test]
    fn test_preprocess_single_pixel_crop() {
        // Degenerate 1x1 crop still produces a full-size tensor.
        let crop = Frame::new(vec![200, 100, 50], 1, 1, 3, 0);
        let tensor = preprocess(&crop);
        assert_eq!(tensor.shape(), &[1, 3, 256, 128]);
        let expected = (200.0 / 255.0 - NORM_MEAN[0]) / NORM_STD[0];
        assert_relative_eq!(tensor[[0, 0, 100, 60]], expected, epsilon = 1e-5);
    }
}
