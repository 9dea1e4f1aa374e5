//! # homectl-app
//!
//! Application layer: the message bus, the plugin contract and the
//! built-in subsystems.
//!
//! ## Responsibilities
//! - Define the **plugin port** ([`ports::Plugin`]) that every subsystem and
//!   every integration implements
//! - Provide the path-addressed **bus** ([`bus::Router`], [`bus::Bus`])
//! - Implement the subsystems:
//!   - `Devices`: wished state, reconciliation and batched dispatch
//!   - `Groups`: glob-based device sets
//!   - `Scenes`: templated commands with dynamic values
//!   - `Routines`: edge-triggered rules over sensor values
//!   - `Integrations`: loads the configured integration plugins
//! - Run the three-phase lifecycle in [`hub::Hub`]
//!
//! ## Dependency rule
//! Depends on `homectl-domain` only (plus `tokio::sync` for the fatal signal).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod bus;
pub mod hub;
pub mod ports;
pub mod registry;
pub mod subsystems;
