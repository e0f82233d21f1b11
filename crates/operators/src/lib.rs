//! `operators` crate — the `Operator` trait and built-in operator implementations.
//!
//! Every operator — built-in and user-defined alike — must implement
//! [`Operator`]. The engine crate dispatches task execution through this
//! trait object.

pub mod command;
pub mod error;
pub mod mock;
pub mod traits;

pub use error::OperatorError;
pub use traits::Operator;
