//! Utility modules

pub mod diagnostics;
pub mod error;

pub use diagnostics::{Diagnostics, VerboseSink};
pub use error::{CommandError, ConnectionError, Error, Result};
