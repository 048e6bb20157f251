//! loom-capture: the Capture FS mountpoint (C5), its final-close detection,
//! and the commit-barrier/watchdog primitives the driver coordinates
//! between phases with (§4.5, §5).
//!
//! No real FUSE binding is used — see `mount` and `watcher` for why, and
//! `DESIGN.md` Open Question 1 for the full rationale.

pub mod broadcast;
pub mod event;
pub mod mount;
pub mod watchdog;
pub mod watcher;

pub use broadcast::{CommitBarrier, CommitWaiter};
pub use event::FileEvent;
pub use mount::CaptureMount;
pub use watchdog::Watchdog;
pub use watcher::CaptureWatcher;
