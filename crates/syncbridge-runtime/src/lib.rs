//! syncbridge-runtime - Background event loop host
//!
//! This crate owns the synchronizer's dedicated loop thread and the three
//! primitives the wrapper layer dispatches through:
//! - [`LoopHost::run_blocking`] parks the calling OS thread until the
//!   future completes on the background loop
//! - [`LoopHost::run_cooperative`] returns a [`CrossLoopFuture`] that can
//!   be awaited from any other runtime
//! - [`LoopHost::schedule`] submits and returns a [`ScheduledCall`] handle
//!   immediately
//!
//! All user futures execute on the loop thread and nowhere else. The host
//! also carries the lifecycle machinery: lazy start, graceful shutdown
//! with a bounded drain, loop-death detection, and SIGINT forwarding to
//! in-flight blocking calls.

mod cross_loop;
mod interrupt;
mod loop_host;
mod scheduled;

pub use cross_loop::CrossLoopFuture;
pub use interrupt::{InterruptGuard, InterruptHub};
pub use loop_host::LoopHost;
pub use scheduled::ScheduledCall;
