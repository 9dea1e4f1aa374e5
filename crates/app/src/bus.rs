//! Path-addressed message bus.
//!
//! A [`Router`] maps the first segment of a path to a registered [`Plugin`]
//! and is immutable once built. Callers hold a [`Bus`] handle, which also
//! carries the depth of the current call chain: every hop increments it, and
//! exceeding the router's limit fails the call instead of recursing forever.
//!
//! Fatal errors (see [`HomectlError::is_fatal`]) are logged once, latched
//! into the router's fatal signal and returned up the failing call chain.
//! The daemon waits on that signal and exits.

use std::sync::Arc;

use homectl_domain::error::HomectlError;
use homectl_domain::path::split_first;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;

use crate::ports::Plugin;

/// Default maximum number of nested bus hops.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 16;

/// Builder for [`Router`]. Plugins can only be registered here.
pub struct RouterBuilder {
    subsystems: Vec<(String, Arc<dyn Plugin>)>,
    max_call_depth: usize,
}

impl RouterBuilder {
    /// Limit on nested bus hops.
    #[must_use]
    pub fn max_call_depth(mut self, max_call_depth: usize) -> Self {
        self.max_call_depth = max_call_depth;
        self
    }

    /// Register `plugin` under the first path segment `name`.
    ///
    /// Registering a name twice replaces the earlier plugin in place.
    #[must_use]
    pub fn register(mut self, name: impl Into<String>, plugin: Arc<dyn Plugin>) -> Self {
        let name = name.into();
        if let Some(slot) = self.subsystems.iter_mut().find(|(n, _)| *n == name) {
            tracing::warn!(name = %name, "subsystem registered twice, replacing");
            slot.1 = plugin;
        } else {
            self.subsystems.push((name, plugin));
        }
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<Router> {
        let (fatal, _) = watch::channel(None);
        Arc::new(Router {
            subsystems: self.subsystems,
            max_call_depth: self.max_call_depth,
            fatal,
        })
    }
}

/// Immutable registry of subsystems, keyed by first path segment.
pub struct Router {
    subsystems: Vec<(String, Arc<dyn Plugin>)>,
    max_call_depth: usize,
    fatal: watch::Sender<Option<String>>,
}

impl Router {
    #[must_use]
    pub fn builder() -> RouterBuilder {
        RouterBuilder {
            subsystems: Vec::new(),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }

    /// Registered subsystems in registration order.
    pub fn subsystems(&self) -> impl DoubleEndedIterator<Item = (&str, &Arc<dyn Plugin>)> {
        self.subsystems.iter().map(|(name, plugin)| (name.as_str(), plugin))
    }

    /// Receiver that observes the first fatal error, rendered as a string.
    #[must_use]
    pub fn fatal_signal(&self) -> watch::Receiver<Option<String>> {
        self.fatal.subscribe()
    }

    /// The first fatal error raised on this router, if any.
    #[must_use]
    pub fn fatal_error(&self) -> Option<String> {
        self.fatal.borrow().clone()
    }

    fn lookup(&self, name: &str) -> Option<&Arc<dyn Plugin>> {
        self.subsystems
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, plugin)| plugin)
    }

    fn raise_fatal(&self, path: &str, err: &HomectlError) {
        let message = err.to_string();
        let latched = self.fatal.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(message);
            true
        });
        if latched {
            tracing::error!(%err, path, "fatal bus error");
        }
    }
}

/// Handle used to send messages, scoped to a position in a call chain.
#[derive(Clone)]
pub struct Bus {
    router: Arc<Router>,
    depth: usize,
}

impl Bus {
    /// A root handle, at depth zero.
    #[must_use]
    pub fn new(router: Arc<Router>) -> Self {
        Self { router, depth: 0 }
    }

    #[must_use]
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Send `payload` to `path` and decode the reply as `T`.
    ///
    /// # Errors
    ///
    /// Returns whatever the handler fails with, or one of the fatal routing
    /// errors: [`HomectlError::UnknownSubsystem`],
    /// [`HomectlError::CallDepthExceeded`] or
    /// [`HomectlError::ResponseShape`] when the reply does not decode as `T`.
    pub async fn send<T, P>(&self, path: &str, payload: &P) -> Result<T, HomectlError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized + Sync,
    {
        let payload = serde_json::to_value(payload).map_err(|err| HomectlError::payload(path, err))?;
        let reply = self.send_value(path, payload).await?;
        serde_json::from_value(reply).map_err(|source| {
            self.fail(
                path,
                HomectlError::ResponseShape {
                    path: path.to_string(),
                    source,
                },
            )
        })
    }

    /// Send `payload` to `path`, discarding the reply.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send), minus the reply decoding.
    pub async fn emit<P>(&self, path: &str, payload: &P) -> Result<(), HomectlError>
    where
        P: Serialize + ?Sized + Sync,
    {
        let payload = serde_json::to_value(payload).map_err(|err| HomectlError::payload(path, err))?;
        self.send_value(path, payload).await.map(drop)
    }

    /// Send a raw JSON payload and return the raw reply.
    ///
    /// # Errors
    ///
    /// Same as [`send`](Self::send), minus the reply decoding.
    pub async fn send_value(
        &self,
        path: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, HomectlError> {
        self.route(path, payload)
            .await
            .map_err(|err| self.fail(path, err))
    }

    async fn route(
        &self,
        path: &str,
        payload: serde_json::Value,
    ) -> Result<serde_json::Value, HomectlError> {
        let max = self.router.max_call_depth;
        if self.depth >= max {
            return Err(HomectlError::CallDepthExceeded {
                path: path.to_string(),
                max,
            });
        }

        let (name, rest) = split_first(path);
        let plugin = self
            .router
            .lookup(name)
            .ok_or_else(|| HomectlError::UnknownSubsystem {
                name: name.to_string(),
                path: path.to_string(),
            })?;

        let nested = Self {
            router: Arc::clone(&self.router),
            depth: self.depth + 1,
        };
        tracing::trace!(path, depth = self.depth, "routing message");
        plugin.handle_msg(rest, payload, &nested).await
    }

    fn fail(&self, path: &str, err: HomectlError) -> HomectlError {
        if err.is_fatal() {
            self.router.raise_fatal(path, &err);
        }
        err
    }
}

/// Decode a handler payload, failing only the originating call chain.
///
/// # Errors
///
/// Returns [`HomectlError::Payload`] naming `path`.
pub fn decode_payload<T: DeserializeOwned>(
    path: &str,
    payload: serde_json::Value,
) -> Result<T, HomectlError> {
    serde_json::from_value(payload).map_err(|err| HomectlError::payload(path, err))
}

/// Encode a handler reply.
///
/// # Errors
///
/// Returns [`HomectlError::ResponseShape`] when `value` has no JSON form.
pub fn encode_reply<T: Serialize + ?Sized>(
    path: &str,
    value: &T,
) -> Result<serde_json::Value, HomectlError> {
    serde_json::to_value(value).map_err(|source| HomectlError::ResponseShape {
        path: path.to_string(),
        source,
    })
}
