/// Face detection plus identity embedding with two ONNX Runtime sessions.
///
/// A YOLO face model proposes boxes (letterbox, decode, NMS); each surviving
/// box is cropped and passed through an ArcFace model whose output is
/// L2-normalized into the face's embedding.
use std::path::Path;
use std::sync::Mutex;

use ort::session::Session;

use crate::detection::domain::face_detector::FaceDetector;
use crate::shared::face::{BoundingBox, FaceRecord};
use crate::shared::frame::Frame;

use super::arcface;
use super::yolo_decode::{self, Candidate};

/// Used when the model's input shape is dynamic.
const DEFAULT_INPUT_SIZE: u32 = 640;

pub const DEFAULT_CONFIDENCE: f64 = 0.5;

const NMS_IOU_THRESH: f64 = 0.45;

pub struct OnnxFaceAnalyzer {
    detector: Mutex<Session>,
    embedder: Mutex<Session>,
    input_size: u32,
    confidence: f64,
}

impl OnnxFaceAnalyzer {
    pub fn new(
        detection_model: &Path,
        embedding_model: &Path,
        confidence: f64,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let detector = load_session(detection_model)?;
        let input_size = square_input_size(&detector).unwrap_or(DEFAULT_INPUT_SIZE);
        let embedder = load_session(embedding_model)?;
        log::info!(
            "Face models loaded ({}x{} detector input, confidence {confidence})",
            input_size,
            input_size
        );
        Ok(Self {
            detector: Mutex::new(detector),
            embedder: Mutex::new(embedder),
            input_size,
            confidence,
        })
    }

    fn propose(&self, frame: &Frame) -> Result<Vec<Candidate>, Box<dyn std::error::Error>> {
        let (input, fit) = yolo_decode::letterbox(frame, self.input_size);
        let input = ort::value::Tensor::from_array(input)?;

        let mut session = self
            .detector
            .lock()
            .map_err(|e| format!("detector session poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input])?;
        require_outputs(outputs.len(), "detection")?;
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        let data = tensor
            .as_slice()
            .ok_or("detection output is not contiguous")?;

        let candidates = yolo_decode::decode_rows(data, &shape, self.confidence, &fit)?;
        Ok(yolo_decode::nms(candidates, NMS_IOU_THRESH))
    }

    fn embed(
        &self,
        frame: &Frame,
        bbox: &BoundingBox,
    ) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let input = ort::value::Tensor::from_array(arcface::face_tensor(frame, bbox))?;
        let mut session = self
            .embedder
            .lock()
            .map_err(|e| format!("embedding session poisoned: {e}"))?;
        let outputs = session.run(ort::inputs![input])?;
        require_outputs(outputs.len(), "embedding")?;
        let array = outputs[0].try_extract_array::<f32>()?;
        let mut embedding = array
            .as_slice()
            .ok_or("embedding output is not contiguous")?
            .to_vec();
        arcface::l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

impl FaceDetector for OnnxFaceAnalyzer {
    fn detect(&self, frame: &Frame) -> Result<Vec<FaceRecord>, Box<dyn std::error::Error>> {
        if !frame.is_well_formed() {
            return Err(format!("frame {} is malformed", frame.index()).into());
        }

        let mut faces = Vec::new();
        for c in self.propose(frame)? {
            let bbox = BoundingBox::new(
                c.x1.floor() as i32,
                c.y1.floor() as i32,
                c.x2.ceil() as i32,
                c.y2.ceil() as i32,
            );
            let crop = bbox.clamp_to(frame.width(), frame.height());
            if crop.is_empty() {
                continue;
            }
            let embedding = self.embed(frame, &crop)?;
            faces.push(FaceRecord::new(bbox, embedding));
        }
        Ok(faces)
    }
}

fn require_outputs(count: usize, model: &str) -> Result<(), Box<dyn std::error::Error>> {
    if count == 0 {
        return Err(format!("{model} model produced no outputs").into());
    }
    Ok(())
}

fn load_session(model_path: &Path) -> Result<Session, Box<dyn std::error::Error>> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}

/// `H` of an NCHW input, if the model fixes it.
fn square_input_size(session: &Session) -> Option<u32> {
    session.inputs().first().and_then(|input| {
        if let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() {
            (shape.len() >= 4 && shape[2] > 0).then(|| shape[2] as u32)
        } else {
            None
        }
    })
}

/// Hardware providers per platform; ONNX Runtime falls back to CPU.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}
