//! Validated value types shared across the crate

pub mod duration;
pub mod validated;

pub use duration::duration_serde;
pub use validated::{RepositoryName, RequestPath, ValidationError};
