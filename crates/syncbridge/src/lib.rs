//! # syncbridge
//!
//! Offer a blocking interface to async Rust without giving up the async
//! one. A [`Synchronizer`] owns a dedicated background thread running a
//! single cooperative event loop; wrap operations turn one async
//! implementation into a dual-interface wrapper whose blocking entry parks
//! the calling thread and whose `.aio` entry returns awaitables that any
//! other runtime can drive. All wrapped futures execute on the background
//! loop and nowhere else.
//!
//! ## Quick start
//!
//! ```ignore
//! use syncbridge::prelude::*;
//!
//! let sync = get_synchronizer("default");
//! let square = sync.wrap_fn(|x: i32| async move {
//!     tokio::time::sleep(std::time::Duration::from_millis(10)).await;
//!     x * x
//! });
//!
//! // blocking entry, from any plain thread
//! assert_eq!(square.call(7)?, 49);
//!
//! // cooperative entry, from your own runtime
//! // assert_eq!(square.aio().call(7).await?, 49);
//!
//! // future-requested entry: submit now, collect later
//! let pending = square.schedule(9)?;
//! assert_eq!(pending.result()?, 81);
//! # Ok::<(), syncbridge::BridgeError>(())
//! ```
//!
//! Instances work the same way: implement [`Wrappable`] for a type whose
//! async methods should run on the loop, wrap it with
//! [`Synchronizer::wrap_instance`], and dispatch methods through the
//! returned [`Handle`]. Arguments and results are translated between
//! wrapper and implementation identities by the [`TranslateIn`] /
//! [`TranslateOut`] traits; [`Raw`] opts a value out of traversal.
//!
//! ## Crate structure
//!
//! This is the wrapper layer over:
//! - [`syncbridge_core`] - error, state, and configuration types
//! - [`syncbridge_runtime`] - the background loop host and its primitives

mod function;
mod handle;
mod registry;
mod scope;
mod stream;
mod synchronizer;
mod translate;

// Re-export core types
pub use syncbridge_core::{
    BridgeError, BridgeResult, BridgeState, ErrorCallback, SynchronizerConfig,
};

// Re-export runtime types
pub use syncbridge_runtime::{CrossLoopFuture, LoopHost, ScheduledCall};

pub use function::{AioFn, SyncFn, WrapOptions};
pub use handle::{Handle, Wrappable};
pub use registry::{Registry, TypeEntry};
pub use scope::{AioGuard, AioScope, AsyncResource, ScopeGuard, SyncScope};
pub use stream::{AioGen, AioStream, BlockingIter, SyncGen};
pub use synchronizer::{
    get_synchronizer, shutdown_all, BlockingInAsyncCallback, Callbacks, Synchronizer,
};
pub use translate::{Raw, TranslateIn, TranslateOut};

// Re-export common dependencies wrapper authors need
pub use async_trait::async_trait;
pub use futures;
pub use tokio;
pub use tracing;

/// Prelude module for convenient imports.
///
/// Use `use syncbridge::prelude::*;` to import commonly used types.
pub mod prelude {
    pub use crate::{
        async_trait, get_synchronizer, AsyncResource, BridgeError, BridgeResult, BridgeState,
        Handle, Raw, Synchronizer, SynchronizerConfig, TranslateIn, TranslateOut, WrapOptions,
        Wrappable,
    };
}
