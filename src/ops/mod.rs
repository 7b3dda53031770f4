pub mod fill;
pub mod stroke;
