//! Error handling for lockscope.
//!
//! This module provides the stable error codes shared by all lockscope
//! components and the structured failure returned by diagnostic commands.

mod code;
mod command;

pub use code::ErrorCode;
pub use command::CommandError;
