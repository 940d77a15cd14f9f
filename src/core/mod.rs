//! Tether Protocol - Core traits, types, and constants.
//!
//! This module provides the packet traits, wire constants, and error types
//! shared by every layer. It does not depend on the async runtime.

mod constants;
mod error;
mod traits;

pub use constants::*;
pub use error::*;
pub use traits::*;
