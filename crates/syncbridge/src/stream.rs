//! Dual-interface wrappers for async generators
//!
//! The underlying stream lives in a slot on the heap and is only ever
//! polled on the background loop; each consumer-side step submits a
//! one-step future that advances it and translates the item out. Dropping
//! a consumer closes the stream on the loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::stream::{BoxStream, Stream, StreamExt};
use syncbridge_core::BridgeResult;
use syncbridge_runtime::CrossLoopFuture;
use tokio::sync::Mutex;

use crate::function::{fn_display_name, WrapMeta, WrapOptions};
use crate::translate::{TranslateIn, TranslateOut};
use crate::Synchronizer;

type StreamSlot<I> = Arc<Mutex<Option<BoxStream<'static, I>>>>;

/// Advance the slotted stream by one item on the loop
///
/// Exhaustion drops the stream eagerly and leaves the slot empty.
fn step<I: TranslateOut>(
    slot: StreamSlot<I>,
    sync: Synchronizer,
) -> impl std::future::Future<Output = Option<I::Outer>> + Send + 'static {
    async move {
        let mut guard = slot.lock().await;
        match guard.as_mut() {
            Some(stream) => match stream.next().await {
                Some(item) => Some(item.translate_out(&sync)),
                None => {
                    guard.take();
                    None
                }
            },
            None => None,
        }
    }
}

struct GenShared<Args, I>
where
    Args: Send + 'static,
    I: TranslateOut,
{
    factory: Box<dyn Fn(Args) -> BoxStream<'static, I> + Send + Sync>,
    sync: Synchronizer,
    meta: WrapMeta,
}

/// Blocking entry of a wrapped async generator
///
/// Created by [`Synchronizer::wrap_gen`]. `Args` is what the
/// implementation takes; call sites may pass any value translating inward
/// to it. Generators have no future-requested form; only the iterator
/// shapes exist.
pub struct SyncGen<Args, I>
where
    Args: Send + 'static,
    I: TranslateOut,
{
    shared: Arc<GenShared<Args, I>>,
}

impl<Args, I> Clone for SyncGen<Args, I>
where
    Args: Send + 'static,
    I: TranslateOut,
{
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<Args, I> SyncGen<Args, I>
where
    Args: Send + 'static,
    I: TranslateOut,
{
    pub(crate) fn wrap<F, S>(sync: Synchronizer, f: F, opts: WrapOptions) -> Self
    where
        F: Fn(Args) -> S + Send + Sync + 'static,
        S: Stream<Item = I> + Send + 'static,
    {
        let meta = WrapMeta::resolve(fn_display_name::<F>(), opts);
        Self {
            shared: Arc::new(GenShared {
                factory: Box::new(move |args| f(args).boxed()),
                sync,
                meta,
            }),
        }
    }

    fn make_slot<A>(&self, args: A) -> StreamSlot<I>
    where
        A: TranslateIn<Inner = Args>,
    {
        let inner = args.translate_in(&self.shared.sync);
        Arc::new(Mutex::new(Some((self.shared.factory)(inner))))
    }

    /// Instantiate the generator as a blocking iterator
    pub fn call<A>(&self, args: A) -> BlockingIter<I>
    where
        A: TranslateIn<Inner = Args>,
    {
        BlockingIter {
            slot: self.make_slot(args),
            sync: self.shared.sync.clone(),
            name: self.shared.meta.qualified_name(),
            done: false,
        }
    }

    /// The cooperative view of this generator
    pub fn aio(&self) -> AioGen<Args, I> {
        AioGen {
            shared: self.shared.clone(),
        }
    }

    /// The wrapper's bare name
    pub fn name(&self) -> &str {
        &self.shared.meta.name
    }
}

impl<Args, I> std::fmt::Debug for SyncGen<Args, I>
where
    Args: Send + 'static,
    I: TranslateOut,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncGen")
            .field("name", &self.shared.meta.qualified_name())
            .finish()
    }
}

/// Cooperative entry of a wrapped async generator
pub struct AioGen<Args, I>
where
    Args: Send + 'static,
    I: TranslateOut,
{
    shared: Arc<GenShared<Args, I>>,
}

impl<Args, I> Clone for AioGen<Args, I>
where
    Args: Send + 'static,
    I: TranslateOut,
{
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<Args, I> AioGen<Args, I>
where
    Args: Send + 'static,
    I: TranslateOut,
{
    /// Instantiate the generator as an async iterator
    pub fn call<A>(&self, args: A) -> AioStream<I>
    where
        A: TranslateIn<Inner = Args>,
    {
        let inner = args.translate_in(&self.shared.sync);
        AioStream {
            slot: Arc::new(Mutex::new(Some((self.shared.factory)(inner)))),
            sync: self.shared.sync.clone(),
            pending: None,
            done: false,
        }
    }
}

/// Blocking iterator driving an async generator one step at a time
///
/// Each `next` runs a one-step future to completion on the loop. Bridge
/// failures (cancellation, shutdown) surface as an `Err` item and fuse the
/// iterator.
pub struct BlockingIter<I: TranslateOut> {
    slot: StreamSlot<I>,
    sync: Synchronizer,
    name: String,
    done: bool,
}

impl<I: TranslateOut> BlockingIter<I> {
    pub(crate) fn from_stream<S>(stream: S, sync: Synchronizer, name: String) -> Self
    where
        S: Stream<Item = I> + Send + 'static,
    {
        Self {
            slot: Arc::new(Mutex::new(Some(stream.boxed()))),
            sync,
            name,
            done: false,
        }
    }
}

impl<I: TranslateOut> Iterator for BlockingIter<I> {
    type Item = BridgeResult<I::Outer>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.sync.note_blocking_entry(&self.name);
        let fut = step(self.slot.clone(), self.sync.clone());
        match self.sync.host().run_blocking(fut) {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl<I: TranslateOut> Drop for BlockingIter<I> {
    fn drop(&mut self) {
        close_slot(&self.slot, &self.sync, &self.name, true);
    }
}

/// Async iterator driving the generator via cross-loop steps
pub struct AioStream<I: TranslateOut> {
    slot: StreamSlot<I>,
    sync: Synchronizer,
    pending: Option<CrossLoopFuture<Option<I::Outer>>>,
    done: bool,
}

impl<I: TranslateOut> AioStream<I> {
    pub(crate) fn from_stream<S>(stream: S, sync: Synchronizer) -> Self
    where
        S: Stream<Item = I> + Send + 'static,
    {
        Self {
            slot: Arc::new(Mutex::new(Some(stream.boxed()))),
            sync,
            pending: None,
            done: false,
        }
    }

    /// Close the underlying generator on the loop and wait for it
    pub async fn close(&mut self) {
        self.done = true;
        self.pending = None;
        let slot = self.slot.clone();
        let _ = self
            .sync
            .host()
            .run_cooperative(async move {
                slot.lock().await.take();
            })
            .await;
    }
}

impl<I: TranslateOut> Stream for AioStream<I> {
    type Item = BridgeResult<I::Outer>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }
        if this.pending.is_none() {
            let fut = step(this.slot.clone(), this.sync.clone());
            this.pending = Some(this.sync.host().run_cooperative(fut));
        }
        let Some(pending) = this.pending.as_mut() else {
            return Poll::Ready(None);
        };
        match Pin::new(pending).poll(cx) {
            Poll::Ready(Ok(Some(item))) => {
                this.pending = None;
                Poll::Ready(Some(Ok(item)))
            }
            Poll::Ready(Ok(None)) => {
                this.pending = None;
                this.done = true;
                Poll::Ready(None)
            }
            Poll::Ready(Err(e)) => {
                this.pending = None;
                this.done = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<I: TranslateOut> Drop for AioStream<I> {
    fn drop(&mut self) {
        // never block here: this may run inside the caller's loop
        self.pending = None;
        close_slot(&self.slot, &self.sync, "aio generator", false);
    }
}

/// Schedule dropping the slotted stream on the loop
///
/// With `wait`, blocks up to the finalization timeout so the generator's
/// resources settle before the consumer continues; without it the close is
/// detached but still tracked for shutdown.
fn close_slot<I: TranslateOut>(slot: &StreamSlot<I>, sync: &Synchronizer, name: &str, wait: bool) {
    if !sync.host().state().can_submit() {
        return;
    }
    if let Ok(ready) = slot.try_lock() {
        if ready.is_none() {
            return;
        }
    }
    let slot = slot.clone();
    match sync.host().schedule(async move {
        slot.lock().await.take();
    }) {
        Ok(mut call) => {
            if wait && !sync.host().is_loop_thread() {
                let timeout = sync.config().finalize_timeout();
                if !call.wait_timeout(timeout) {
                    tracing::warn!(gen = name, "generator finalization timed out");
                }
            }
        }
        Err(e) => {
            tracing::debug!(gen = name, error = %e, "generator finalization skipped");
        }
    }
}
