//! Built-in subsystems — the plugins registered under the fixed top-level
//! path segments.
//!
//! Each subsystem owns its state exclusively and mutates it only from its
//! own handlers. Locks are never held across a bus call.

pub mod devices;
pub mod groups;
pub mod integrations;
pub mod routines;
pub mod scenes;

pub use devices::Devices;
pub use groups::Groups;
pub use integrations::Integrations;
pub use routines::Routines;
pub use scenes::Scenes;

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a subsystem's state, recovering the data from a poisoned lock.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
