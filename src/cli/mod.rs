//! Command-line interface
//!
//! The clap definition for the binary and the parser for lines typed at the
//! operator console.

pub mod commands;
pub mod console;

pub use commands::{Command, Opt, StartArgs};
pub use console::{ConsoleCommand, CONSOLE_HELP};
