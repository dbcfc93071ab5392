#![forbid(unsafe_code)]

//! Core types shared by every sigtuna crate.

pub mod algorithm;
pub mod error;
pub mod ns;

pub use error::{Boundary, Error, ReferenceFault, RejectReason, Result};
