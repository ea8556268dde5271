pub mod config;
pub mod prelude;
pub mod report;
pub mod scenario;

pub use veboost_core as core;
pub use veboost_escrow as escrow;
