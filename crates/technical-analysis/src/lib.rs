pub mod engine;
pub mod indicators;

pub use engine::*;
pub use indicators::*;
