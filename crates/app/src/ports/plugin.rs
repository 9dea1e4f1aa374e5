//! Plugin port — the lifecycle every subsystem and integration implements.
//!
//! The hub drives each plugin through three phases:
//!
//! 1. construction (outside this trait, config is validated there)
//! 2. [`register`](Plugin::register), called in registration order
//! 3. [`start`](Plugin::start), called once every plugin is registered
//!
//! Messages arrive through [`handle_msg`](Plugin::handle_msg) with the
//! plugin's own path segment already stripped. On shutdown
//! [`stop`](Plugin::stop) is called in reverse registration order.

use async_trait::async_trait;
use homectl_domain::error::HomectlError;

use crate::bus::Bus;

/// A component addressable on the bus.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// One-time setup. Returns once the plugin can receive messages.
    async fn register(&self, bus: &Bus) -> Result<(), HomectlError>;

    /// Post-registration activity, such as arming pollers.
    ///
    /// Must return promptly; long-running work is spawned, not awaited.
    async fn start(&self, _bus: &Bus) -> Result<(), HomectlError> {
        Ok(())
    }

    /// Handle a message addressed to `path` below this plugin.
    ///
    /// The default ignores the message and replies with `null`.
    async fn handle_msg(
        &self,
        path: &str,
        _payload: serde_json::Value,
        _bus: &Bus,
    ) -> Result<serde_json::Value, HomectlError> {
        tracing::debug!(path, "message ignored");
        Ok(serde_json::Value::Null)
    }

    /// Cancel background work. Called once on shutdown.
    async fn stop(&self) {}
}
