pub mod bytetrack_tracker;
pub mod onnx_person_detector;
