//! Port definitions — traits that adapters implement.
//!
//! The bus only knows [`Plugin`]; subsystems and integrations alike are
//! plugged in through it.

pub mod plugin;

pub use plugin::Plugin;
