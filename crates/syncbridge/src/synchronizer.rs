//! The synchronizer: one background loop plus the wrap surface

use std::future::Future;
use std::sync::Arc;

use dashmap::DashMap;
use futures::Stream;
use once_cell::sync::Lazy;
use syncbridge_core::{
    BridgeError, BridgeResult, BridgeState, ErrorCallback, SynchronizerConfig,
};
use syncbridge_runtime::LoopHost;

use crate::function::{SyncFn, WrapOptions};
use crate::handle::{Handle, Wrappable};
use crate::registry::Registry;
use crate::scope::{AsyncResource, SyncScope};
use crate::stream::SyncGen;
use crate::translate::{TranslateIn, TranslateOut};

/// Callback invoked when a blocking entry is used inside an async context;
/// receives the wrapper's name
pub type BlockingInAsyncCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Optional reporting hooks for a synchronizer
#[derive(Clone, Default)]
pub struct Callbacks {
    /// Invoked for errors with no caller left to report to
    pub on_task_error: Option<ErrorCallback>,
    /// Invoked when a blocking entry is used inside an async context
    pub on_blocking_in_async: Option<BlockingInAsyncCallback>,
}

struct SyncInner {
    host: LoopHost,
    registry: Registry,
    callbacks: Callbacks,
}

/// Runtime bridge between blocking and cooperative callers
///
/// Owns a lazily-started background thread running a single cooperative
/// event loop, a translation registry, and the wrap operations that
/// produce dual-interface wrappers. Cloning is cheap and shares the same
/// bridge.
#[derive(Clone)]
pub struct Synchronizer {
    inner: Arc<SyncInner>,
}

impl Synchronizer {
    /// Create a synchronizer from a configuration
    pub fn new(config: SynchronizerConfig) -> Self {
        Self::with_callbacks(config, Callbacks::default())
    }

    /// Create a synchronizer with reporting hooks
    pub fn with_callbacks(config: SynchronizerConfig, callbacks: Callbacks) -> Self {
        let host = LoopHost::new(config, callbacks.on_task_error.clone());
        Self {
            inner: Arc::new(SyncInner {
                host,
                registry: Registry::new(),
                callbacks,
            }),
        }
    }

    /// Create a synchronizer with the given logical name
    pub fn named(name: impl Into<String>) -> Self {
        Self::new(SynchronizerConfig::named(name))
    }

    /// The synchronizer's logical name
    pub fn name(&self) -> &str {
        self.inner.host.name()
    }

    /// The configuration this synchronizer was created with
    pub fn config(&self) -> &SynchronizerConfig {
        self.inner.host.config()
    }

    /// Current lifecycle state of the background loop
    pub fn state(&self) -> BridgeState {
        self.inner.host.state()
    }

    /// The loop host backing this synchronizer
    ///
    /// Generated wrappers and advanced callers may submit raw futures
    /// through it directly.
    pub fn host(&self) -> &LoopHost {
        &self.inner.host
    }

    /// The translation registry
    pub fn registry(&self) -> &Registry {
        &self.inner.registry
    }

    /// Number of tasks currently in flight on the background loop
    pub fn task_count(&self) -> usize {
        self.inner.host.task_count()
    }

    /// True when both values are handles to the same synchronizer
    pub fn same_instance(&self, other: &Synchronizer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Cancel in-flight tasks, drain the loop, and join its thread
    ///
    /// Idempotent. Afterwards every submission fails fast with the closed
    /// error; wrappers made from this synchronizer become inert.
    pub fn shutdown(&self) -> BridgeResult<()> {
        self.inner.host.shutdown()
    }

    /// Cancel in-flight blocking calls as a termination signal would
    pub fn interrupt(&self) -> usize {
        self.inner.host.interrupt()
    }

    /// Wrap an async function into a dual-interface callable
    ///
    /// The blocking entry is the wrapper's `call`; the cooperative entry is
    /// reached through `aio()`. Call sites may pass any value translating
    /// inward to `Args`; results are translated out.
    pub fn wrap_fn<Args, Out, F, Fut>(&self, f: F) -> SyncFn<Args, Out>
    where
        Args: Send + 'static,
        Out: TranslateOut,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Out> + Send + 'static,
    {
        self.wrap_fn_with(f, WrapOptions::default())
    }

    /// Wrap an async function with explicit options
    pub fn wrap_fn_with<Args, Out, F, Fut>(&self, f: F, opts: WrapOptions) -> SyncFn<Args, Out>
    where
        Args: Send + 'static,
        Out: TranslateOut,
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Out> + Send + 'static,
    {
        SyncFn::wrap(self.clone(), f, opts)
    }

    /// Wrap an async generator function into a dual-interface generator
    pub fn wrap_gen<Args, I, F, S>(&self, f: F) -> SyncGen<Args, I>
    where
        Args: Send + 'static,
        I: TranslateOut,
        F: Fn(Args) -> S + Send + Sync + 'static,
        S: Stream<Item = I> + Send + 'static,
    {
        self.wrap_gen_with(f, WrapOptions::default())
    }

    /// Wrap an async generator function with explicit options
    pub fn wrap_gen_with<Args, I, F, S>(&self, f: F, opts: WrapOptions) -> SyncGen<Args, I>
    where
        Args: Send + 'static,
        I: TranslateOut,
        F: Fn(Args) -> S + Send + Sync + 'static,
        S: Stream<Item = I> + Send + 'static,
    {
        SyncGen::wrap(self.clone(), f, opts)
    }

    /// Wrap an async context manager into a dual-interface scope
    pub fn wrap_scope<R: AsyncResource>(&self, resource: R) -> SyncScope<R> {
        self.wrap_scope_with(resource, WrapOptions::default())
    }

    /// Wrap an async context manager with explicit options
    pub fn wrap_scope_with<R: AsyncResource>(
        &self,
        resource: R,
        opts: WrapOptions,
    ) -> SyncScope<R> {
        SyncScope::wrap(self.clone(), resource, opts)
    }

    /// Wrapper for an existing implementation instance
    ///
    /// Registers `T` on first use and reuses the live wrapper for `imp` if
    /// one exists.
    pub fn wrap_instance<T: Wrappable>(&self, imp: Arc<T>) -> Handle<T> {
        self.inner.registry.wrap_instance(imp, self)
    }

    /// Run an async constructor on the loop and wrap the built instance
    pub fn construct<T, Fut>(&self, ctor: Fut) -> BridgeResult<Handle<T>>
    where
        T: Wrappable,
        Fut: Future<Output = T> + Send + 'static,
    {
        let imp = self.inner.host.run_blocking(ctor)?;
        Ok(self.wrap_instance(Arc::new(imp)))
    }

    /// True once `T` has been registered with this synchronizer
    pub fn is_registered<T: Wrappable>(&self) -> bool {
        self.inner.registry.is_registered::<T>()
    }

    /// Inward translation of an arbitrary value
    pub fn translate_in<V: TranslateIn>(&self, value: V) -> V::Inner {
        value.translate_in(self)
    }

    /// Outward translation of an arbitrary value
    pub fn translate_out<V: TranslateOut>(&self, value: V) -> V::Outer {
        value.translate_out(self)
    }

    /// Note a blocking entry; warns when the caller has a live loop
    pub(crate) fn note_blocking_entry(&self, name: &str) {
        if tokio::runtime::Handle::try_current().is_err() {
            return;
        }
        if let Some(report) = &self.inner.callbacks.on_blocking_in_async {
            report(name);
        } else if self.config().warn_blocking_in_async {
            tracing::warn!(
                wrapper = name,
                "blocking entry used inside an async context; the .aio form avoids parking this thread"
            );
        }
    }
}

impl std::fmt::Debug for Synchronizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Synchronizer")
            .field("name", &self.name())
            .field("state", &self.state())
            .finish()
    }
}

static SYNCHRONIZERS: Lazy<DashMap<String, Synchronizer>> = Lazy::new(DashMap::new);

/// The process-global synchronizer for `name`, created on first use
///
/// Calling this twice with the same name yields the same instance.
pub fn get_synchronizer(name: &str) -> Synchronizer {
    SYNCHRONIZERS
        .entry(name.to_string())
        .or_insert_with(|| Synchronizer::new(SynchronizerConfig::named(name)))
        .clone()
}

/// Shut down every named synchronizer
///
/// The process-exit finalizer for embedders that want a clean drain; the
/// names stay registered and fail fast afterwards.
pub fn shutdown_all() {
    for entry in SYNCHRONIZERS.iter() {
        if let Err(e) = entry.value().shutdown() {
            tracing::warn!(name = entry.key(), error = %e, "synchronizer shutdown failed");
        }
    }
}
