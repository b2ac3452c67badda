pub mod cpu_face_concealer;
pub mod effects;
pub mod gaussian;
pub mod mask_builder;
