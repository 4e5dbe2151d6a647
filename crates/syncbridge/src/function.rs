//! Dual-interface wrappers for async functions

use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use syncbridge_core::{BridgeError, BridgeResult};
use syncbridge_runtime::{CrossLoopFuture, ScheduledCall};

use crate::translate::{TranslateIn, TranslateOut};
use crate::Synchronizer;

/// Wrap-time options for a callable or generator
#[derive(Debug, Clone)]
pub struct WrapOptions {
    /// Name the wrapper presents in Debug output and error messages
    pub name: Option<String>,
    /// Optional module string the wrapper is placed under
    pub target_module: Option<String>,
    /// Whether the wrapper accepts future-requested calls via `schedule`
    pub allow_futures: bool,
}

impl Default for WrapOptions {
    fn default() -> Self {
        Self {
            name: None,
            target_module: None,
            allow_futures: true,
        }
    }
}

impl WrapOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_target_module(mut self, module: impl Into<String>) -> Self {
        self.target_module = Some(module.into());
        self
    }

    pub fn with_allow_futures(mut self, allow: bool) -> Self {
        self.allow_futures = allow;
        self
    }
}

/// Resolved wrap-time metadata shared by both entry points
#[derive(Debug, Clone)]
pub(crate) struct WrapMeta {
    pub(crate) name: String,
    pub(crate) target_module: Option<String>,
    pub(crate) allow_futures: bool,
}

impl WrapMeta {
    pub(crate) fn resolve(default_name: String, opts: WrapOptions) -> Self {
        Self {
            name: opts.name.unwrap_or(default_name),
            target_module: opts.target_module,
            allow_futures: opts.allow_futures,
        }
    }

    pub(crate) fn qualified_name(&self) -> String {
        match &self.target_module {
            Some(module) => format!("{module}::{}", self.name),
            None => self.name.clone(),
        }
    }
}

/// Display name for a wrapped closure or function item
pub(crate) fn fn_display_name<F>() -> String {
    let full = std::any::type_name::<F>();
    let trimmed = full.trim_end_matches("::{{closure}}");
    trimmed.rsplit("::").next().unwrap_or(trimmed).to_string()
}

struct FnShared<Args, Out>
where
    Args: Send + 'static,
    Out: TranslateOut,
{
    factory: Box<dyn Fn(Args) -> BoxFuture<'static, Out> + Send + Sync>,
    sync: Synchronizer,
    meta: WrapMeta,
}

impl<Args, Out> FnShared<Args, Out>
where
    Args: Send + 'static,
    Out: TranslateOut,
{
    /// Translate args in, invoke the factory, translate the result out on
    /// the loop side
    fn make_future<A>(&self, args: A) -> BoxFuture<'static, Out::Outer>
    where
        A: TranslateIn<Inner = Args>,
    {
        let sync = self.sync.clone();
        let inner = args.translate_in(&sync);
        let fut = (self.factory)(inner);
        async move { fut.await.translate_out(&sync) }.boxed()
    }
}

/// Blocking entry of a wrapped async function
///
/// Created by [`Synchronizer::wrap_fn`]. `Args` is what the implementation
/// takes and `Out` what it produces; call sites may pass any value that
/// translates inward to `Args`, so handles are accepted where the
/// implementation expects its own instances. Calling parks the current OS
/// thread until the future completes on the background loop; the
/// [`SyncFn::aio`] view shares the same underlying factory and options and
/// returns awaitables instead.
pub struct SyncFn<Args, Out>
where
    Args: Send + 'static,
    Out: TranslateOut,
{
    shared: Arc<FnShared<Args, Out>>,
}

impl<Args, Out> Clone for SyncFn<Args, Out>
where
    Args: Send + 'static,
    Out: TranslateOut,
{
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<Args, Out> SyncFn<Args, Out>
where
    Args: Send + 'static,
    Out: TranslateOut,
{
    pub(crate) fn wrap<F, Fut>(sync: Synchronizer, f: F, opts: WrapOptions) -> Self
    where
        F: Fn(Args) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Out> + Send + 'static,
    {
        let meta = WrapMeta::resolve(fn_display_name::<F>(), opts);
        Self {
            shared: Arc::new(FnShared {
                factory: Box::new(move |args| f(args).boxed()),
                sync,
                meta,
            }),
        }
    }

    /// Invoke the wrapped function and block until it completes
    pub fn call<A>(&self, args: A) -> BridgeResult<Out::Outer>
    where
        A: TranslateIn<Inner = Args>,
    {
        let shared = &self.shared;
        shared.sync.note_blocking_entry(&shared.meta.name);
        shared.sync.host().run_blocking(shared.make_future(args))
    }

    /// The future-requested form: submit and return a handle immediately
    pub fn schedule<A>(&self, args: A) -> BridgeResult<ScheduledCall<Out::Outer>>
    where
        A: TranslateIn<Inner = Args>,
    {
        let shared = &self.shared;
        if !shared.meta.allow_futures {
            return Err(BridgeError::FuturesNotAllowed {
                name: shared.meta.qualified_name(),
            });
        }
        shared.sync.host().schedule(shared.make_future(args))
    }

    /// The cooperative view of this function
    pub fn aio(&self) -> AioFn<Args, Out> {
        AioFn {
            shared: self.shared.clone(),
        }
    }

    /// The wrapper's bare name
    pub fn name(&self) -> &str {
        &self.shared.meta.name
    }

    /// The wrapper's name qualified by its target module
    pub fn qualified_name(&self) -> String {
        self.shared.meta.qualified_name()
    }

    /// The synchronizer this wrapper dispatches through
    pub fn synchronizer(&self) -> &Synchronizer {
        &self.shared.sync
    }

    #[cfg(test)]
    pub(crate) fn shares_state_with(&self, aio: &AioFn<Args, Out>) -> bool {
        Arc::ptr_eq(&self.shared, &aio.shared)
    }
}

impl<Args, Out> std::fmt::Debug for SyncFn<Args, Out>
where
    Args: Send + 'static,
    Out: TranslateOut,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncFn")
            .field("name", &self.shared.meta.qualified_name())
            .finish()
    }
}

/// Cooperative entry of a wrapped async function
///
/// A view over the same state as its [`SyncFn`]; calls resolve on the
/// background loop and are awaited from the caller's own loop.
pub struct AioFn<Args, Out>
where
    Args: Send + 'static,
    Out: TranslateOut,
{
    shared: Arc<FnShared<Args, Out>>,
}

impl<Args, Out> Clone for AioFn<Args, Out>
where
    Args: Send + 'static,
    Out: TranslateOut,
{
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<Args, Out> AioFn<Args, Out>
where
    Args: Send + 'static,
    Out: TranslateOut,
{
    /// Invoke the wrapped function, returning an awaitable
    ///
    /// The call is not submitted until first poll, so this may be used from
    /// a thread with no running loop to build a future for later.
    pub fn call<A>(&self, args: A) -> CrossLoopFuture<Out::Outer>
    where
        A: TranslateIn<Inner = Args>,
    {
        let shared = &self.shared;
        shared.sync.host().run_cooperative(shared.make_future(args))
    }

    /// The wrapper's bare name
    pub fn name(&self) -> &str {
        &self.shared.meta.name
    }
}

impl<Args, Out> std::fmt::Debug for AioFn<Args, Out>
where
    Args: Send + 'static,
    Out: TranslateOut,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AioFn")
            .field("name", &self.shared.meta.qualified_name())
            .finish()
    }
}
