//! Instance proxies for wrapped implementation types

use std::future::Future;
use std::sync::Arc;

use futures::Stream;
use syncbridge_core::BridgeResult;
use syncbridge_runtime::{CrossLoopFuture, ScheduledCall};

use crate::registry::short_type_name;
use crate::scope::{AsyncResource, SyncScope};
use crate::stream::{AioStream, BlockingIter};
use crate::translate::{TranslateIn, TranslateOut};
use crate::Synchronizer;

/// Marker for implementation types that can live behind a [`Handle`]
///
/// Implementations are only ever executed on the synchronizer's background
/// loop; the handle is what user code holds and clones freely.
pub trait Wrappable: Send + Sync + 'static {
    /// Name the wrapper presents in Debug output and error messages
    fn wrapper_name() -> String {
        short_type_name::<Self>()
    }
}

pub(crate) struct HandleShared<T: Wrappable> {
    pub(crate) imp: Arc<T>,
    pub(crate) sync: Synchronizer,
}

impl<T: Wrappable> HandleShared<T> {
    pub(crate) fn new(imp: Arc<T>, sync: Synchronizer) -> Self {
        Self { imp, sync }
    }
}

/// Dual-interface proxy for an implementation instance
///
/// A handle owns its implementation; the registry tracks the reverse
/// direction weakly, so for any implementation there is at most one live
/// handle state per synchronizer. Methods come in a blocking form
/// ([`Handle::call`]) and a cooperative form ([`Handle::aio`]); both build
/// the method future here and execute it on the background loop.
pub struct Handle<T: Wrappable> {
    shared: Arc<HandleShared<T>>,
}

impl<T: Wrappable> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<T: Wrappable> Handle<T> {
    pub(crate) fn from_shared(shared: Arc<HandleShared<T>>) -> Self {
        Self { shared }
    }

    /// The underlying implementation; the inward translation escape hatch
    pub fn implementation(&self) -> Arc<T> {
        self.shared.imp.clone()
    }

    /// The synchronizer this handle dispatches through
    pub fn synchronizer(&self) -> &Synchronizer {
        &self.shared.sync
    }

    /// True when both handles are views of the same wrapper state
    pub fn ptr_eq(&self, other: &Handle<T>) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    /// True when both handles proxy the same implementation instance
    pub fn impl_ptr_eq(&self, other: &Handle<T>) -> bool {
        Arc::ptr_eq(&self.shared.imp, &other.shared.imp)
    }

    fn display_name(&self) -> String {
        self.shared
            .sync
            .registry()
            .type_entry::<T>()
            .map(|e| e.qualified_name())
            .unwrap_or_else(T::wrapper_name)
    }

    /// Blocking method dispatch: build the method future with `body` and
    /// run it to completion on the background loop
    pub fn call<F, Fut, R>(&self, body: F) -> BridgeResult<R::Outer>
    where
        F: FnOnce(Arc<T>) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        R: TranslateOut,
    {
        let name = self.display_name();
        self.shared.sync.note_blocking_entry(&name);
        self.shared.sync.host().run_blocking(self.method_future(body))
    }

    /// Cooperative method dispatch: the `.aio` form of [`Handle::call`]
    pub fn aio<F, Fut, R>(&self, body: F) -> CrossLoopFuture<R::Outer>
    where
        F: FnOnce(Arc<T>) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        R: TranslateOut,
    {
        self.shared.sync.host().run_cooperative(self.method_future(body))
    }

    /// Future-requested method dispatch: submit and return a handle
    pub fn schedule<F, Fut, R>(&self, body: F) -> BridgeResult<ScheduledCall<R::Outer>>
    where
        F: FnOnce(Arc<T>) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        R: TranslateOut,
    {
        self.shared.sync.host().schedule(self.method_future(body))
    }

    /// Blocking dispatch with translated arguments
    ///
    /// `args` go through inward translation before `body` sees them; what
    /// generated method wrappers use for signatures that mention handles.
    pub fn call_with<Args, F, Fut, R>(&self, args: Args, body: F) -> BridgeResult<R::Outer>
    where
        Args: TranslateIn,
        F: FnOnce(Arc<T>, Args::Inner) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        R: TranslateOut,
    {
        let inner = args.translate_in(&self.shared.sync);
        self.call(move |imp| body(imp, inner))
    }

    /// Cooperative dispatch with translated arguments
    pub fn aio_with<Args, F, Fut, R>(&self, args: Args, body: F) -> CrossLoopFuture<R::Outer>
    where
        Args: TranslateIn,
        F: FnOnce(Arc<T>, Args::Inner) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        R: TranslateOut,
    {
        let inner = args.translate_in(&self.shared.sync);
        self.aio(move |imp| body(imp, inner))
    }

    /// Synchronous member access, translated out
    ///
    /// Plain (non-async) members pass through without touching the loop;
    /// property reads go through here.
    pub fn get<F, R>(&self, read: F) -> R::Outer
    where
        F: FnOnce(&T) -> R,
        R: TranslateOut,
    {
        read(&self.shared.imp).translate_out(&self.shared.sync)
    }

    /// Blocking iteration over a generator method
    pub fn stream<F, S, I>(&self, body: F) -> BlockingIter<I>
    where
        F: FnOnce(Arc<T>) -> S,
        S: Stream<Item = I> + Send + 'static,
        I: TranslateOut,
    {
        let stream = body(self.shared.imp.clone());
        BlockingIter::from_stream(stream, self.shared.sync.clone(), self.display_name())
    }

    /// Cooperative iteration over a generator method
    pub fn aio_stream<F, S, I>(&self, body: F) -> AioStream<I>
    where
        F: FnOnce(Arc<T>) -> S,
        S: Stream<Item = I> + Send + 'static,
        I: TranslateOut,
    {
        let stream = body(self.shared.imp.clone());
        AioStream::from_stream(stream, self.shared.sync.clone())
    }

    fn method_future<F, Fut, R>(
        &self,
        body: F,
    ) -> impl Future<Output = R::Outer> + Send + 'static
    where
        F: FnOnce(Arc<T>) -> Fut,
        Fut: Future<Output = R> + Send + 'static,
        R: TranslateOut,
    {
        let sync = self.shared.sync.clone();
        let fut = body(self.shared.imp.clone());
        async move { fut.await.translate_out(&sync) }
    }
}

impl<T: Wrappable + AsyncResource> Handle<T> {
    /// Context-manager view of this instance
    ///
    /// Available when the implementation exposes the async enter/exit
    /// protocol; the scope shares this handle's implementation.
    pub fn scope(&self) -> SyncScope<T> {
        SyncScope::from_parts(
            self.shared.imp.clone(),
            self.shared.sync.clone(),
            self.display_name(),
        )
    }
}

impl<T: Wrappable> std::fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct(&self.display_name())
            .field("impl", &format_args!("{:p}", Arc::as_ptr(&self.shared.imp)))
            .finish()
    }
}

impl<T: Wrappable> TranslateIn for Handle<T> {
    type Inner = Arc<T>;

    fn translate_in(self, _sync: &Synchronizer) -> Self::Inner {
        self.shared.imp.clone()
    }
}

impl<T: Wrappable> TranslateOut for Arc<T> {
    type Outer = Handle<T>;

    fn translate_out(self, sync: &Synchronizer) -> Self::Outer {
        sync.registry().wrap_instance(self, sync)
    }
}
