pub mod error;
pub mod sample;
pub mod sanitize;
pub mod stats;
pub mod traits;
pub mod types;

pub use error::*;
pub use traits::*;
pub use types::*;
