//! Configuration management
//!
//! Listen/advertised addresses, bootstrap peers, mining difficulty and
//! network timeouts for a node.

pub mod settings;

pub use settings::Config;
