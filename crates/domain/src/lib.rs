//! Domain layer for the repair order system.
//!
//! This crate provides:
//! - Aggregate and DomainEvent traits
//! - Money value object with half-even rounding
//! - RepairOrder aggregate with its state machine and audit trail
//! - Command parsing and the batch CommandHandler
//! - RepairOrderRepository port with a snapshot-backed adapter

pub mod aggregate;
pub mod command;
pub mod error;
pub mod money;
pub mod order;
pub mod repository;

pub use aggregate::{Aggregate, DomainEvent};
pub use command::{
    BatchResponse, Command, CommandFailure, CommandHandler, CommandOutcome, ErrorBody,
};
pub use error::{DomainError, ErrorCode};
pub use money::{Money, ParseMoneyError};
pub use order::{
    Authorization, CommandError, CommandRequest, EventSummary, NewComponent, NewService,
    Operation, OrderCommand, OrderError, OrderEvent, OrderStatus, OrderSummary, RecordedEvent,
    RepairOrder,
};
pub use repository::{RepairOrderRepository, SnapshotRepository};
