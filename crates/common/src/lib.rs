//! Types shared by every crate of the repair order workspace.

mod types;

pub use types::OrderId;
