pub mod arcface;
pub mod model_resolver;
pub mod onnx_face_analyzer;
pub mod yolo_decode;
