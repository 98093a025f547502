pub mod cancel;
pub mod engine;
pub mod error;

pub use cancel::{CancelSignal, CancelWatcher};
pub use engine::TransferEngine;
pub use error::UnitError;
