//! Workspace facade crate.
//!
//! Re-exports the engine crates so a host application can depend on
//! `camsync-workspace` alone. The `desktop-shims` feature (default) also pulls
//! in the desktop adapters and lets `CoreConfig` fall back to them.

pub use bridge_traits;
pub use core_runtime;
pub use core_sync;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop;
