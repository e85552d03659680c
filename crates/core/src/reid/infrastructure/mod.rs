pub mod onnx_osnet_extractor;
