pub mod buffer;
pub mod generator;
pub mod instrument;
