//! Protocol-level utilities for the multipart batch format.

pub mod constants;
pub mod formatter;
pub mod headers;

pub use constants::*;
pub use formatter::*;
pub use headers::*;
