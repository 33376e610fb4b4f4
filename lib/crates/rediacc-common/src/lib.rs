pub mod queue;
pub mod wire;

pub use queue::QueueStatus;
pub use wire::{ApiResponse, ResultTable, Row, row_field, row_str};
