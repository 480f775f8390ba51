pub mod cleaning;
pub mod preprocessor;
pub mod scaler;

pub use preprocessor::{Preprocessor, Sequence};
pub use scaler::{Scaler, ScalerKind};
