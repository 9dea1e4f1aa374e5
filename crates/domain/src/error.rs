//! Common error types used across the workspace.
//!
//! [`HomectlError`] is the only error type that crosses the message bus.
//! Each variant is either *fatal* (a programming or configuration error that
//! must end the process) or *recoverable* (only the originating call chain
//! fails). See [`HomectlError::is_fatal`].

/// Top-level error type for bus calls and subsystem operations.
#[derive(Debug, thiserror::Error)]
pub enum HomectlError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    /// No subsystem is registered under the first path segment.
    #[error("no subsystem registered with name {name:?} (path {path:?})")]
    UnknownSubsystem { name: String, path: String },

    /// A subsystem answered with a value the caller cannot decode.
    #[error("unexpected response shape from {path:?}")]
    ResponseShape {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A chain of nested bus calls exceeded the configured depth.
    #[error("bus call depth {max} exceeded while routing {path:?}")]
    CallDepthExceeded { path: String, max: usize },

    /// Static configuration failed validation at construction.
    #[error("invalid configuration for {component:?}")]
    InvalidConfig {
        component: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An integration references a plugin identifier nobody registered.
    #[error("integration {id:?} uses unknown plugin {plugin:?}")]
    UnknownPlugin { id: String, plugin: String },

    /// A handler received a payload it cannot decode.
    #[error("malformed payload for {path:?}")]
    Payload {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// An integration failed while talking to its device or service.
    #[error("integration error")]
    Integration(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HomectlError {
    /// Whether this error indicates a broken protocol or configuration that
    /// must terminate the process.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::UnknownSubsystem { .. }
                | Self::ResponseShape { .. }
                | Self::CallDepthExceeded { .. }
                | Self::InvalidConfig { .. }
                | Self::UnknownPlugin { .. }
        )
    }

    /// Wrap a configuration decoding failure for `component`.
    pub fn invalid_config(
        component: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::InvalidConfig {
            component: component.into(),
            source: source.into(),
        }
    }

    /// Wrap a payload decoding failure at the handler for `path`.
    pub fn payload(path: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Payload {
            path: path.into(),
            source,
        }
    }
}

/// Domain invariant violations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid device path {0:?}, expected devices/<integration>/<id>")]
    InvalidDevicePath(String),

    #[error("unrecognised color {0:?}")]
    InvalidColor(String),

    #[error("invalid glob pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("routine action must start with a bus path")]
    EmptyAction,

    #[error("brightness rate {0:?} is not a number")]
    InvalidRate(String),
}
