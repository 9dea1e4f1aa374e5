//! # homectl-domain
//!
//! Pure domain model for the homectl home automation hub.
//!
//! ## Responsibilities
//! - Foundational types: bus paths, error conventions, timestamps
//! - Define **device state** (the "wished" record), **device commands**
//!   (outbound instructions) and **discovered state** (observed facts)
//! - Define the **color** model (canonical HSV, brightness compositing)
//! - Define static configuration for **groups**, **scenes**, **routines**
//!   and **integrations**
//! - Contain the layered state merge and other invariant enforcement
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or IO crates.
//! The message bus and every subsystem live in the `app` crate.

pub mod error;
pub mod path;
pub mod time;

pub mod color;
pub mod device;
pub mod group;
pub mod integration;
pub mod routine;
pub mod scene;
