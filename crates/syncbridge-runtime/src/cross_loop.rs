//! Awaitable bridge between the caller's loop and the background loop
//!
//! A [`CrossLoopFuture`] is what a cooperative caller gets back: a small
//! adapter holding a cross-thread completion channel. Submission is lazy -
//! it happens on first poll - so a caller with no running loop may build
//! the future and hand it to whatever runtime will eventually drive it.
//! Dropping the future before completion cancels the background task.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use syncbridge_core::BridgeResult;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::LoopHost;

/// Resolves on the caller's loop once the submitted future completes on
/// the background loop
pub struct CrossLoopFuture<T> {
    state: State<T>,
}

enum State<T> {
    Queued {
        host: LoopHost,
        fut: BoxFuture<'static, T>,
    },
    Waiting {
        host: LoopHost,
        rx: oneshot::Receiver<BridgeResult<T>>,
        cancel: CancellationToken,
    },
    Done,
}

impl<T: Send + 'static> CrossLoopFuture<T> {
    pub(crate) fn queued(host: LoopHost, fut: BoxFuture<'static, T>) -> Self {
        Self {
            state: State::Queued { host, fut },
        }
    }
}

impl<T: Send + 'static> Future for CrossLoopFuture<T> {
    type Output = BridgeResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        loop {
            match &this.state {
                State::Queued { .. } => {
                    let State::Queued { host, fut } =
                        std::mem::replace(&mut this.state, State::Done)
                    else {
                        unreachable!()
                    };
                    // First poll: submit to the background loop. May lazily
                    // start the loop thread, which blocks very briefly.
                    let core = match host.ensure_core() {
                        Ok(core) => core,
                        Err(e) => return Poll::Ready(Err(e)),
                    };
                    let (tx, rx) = oneshot::channel();
                    let cancel = core.child_token();
                    host.submit(&core, cancel.clone(), fut, move |out| {
                        let _ = tx.send(out);
                    });
                    this.state = State::Waiting { host, rx, cancel };
                }
                State::Waiting { .. } => {
                    let State::Waiting { host, mut rx, cancel } =
                        std::mem::replace(&mut this.state, State::Done)
                    else {
                        unreachable!()
                    };
                    match Pin::new(&mut rx).poll(cx) {
                        Poll::Ready(Ok(out)) => return Poll::Ready(out),
                        Poll::Ready(Err(_)) => {
                            return Poll::Ready(Err(host.disconnect_error()))
                        }
                        Poll::Pending => {
                            this.state = State::Waiting { host, rx, cancel };
                            return Poll::Pending;
                        }
                    }
                }
                State::Done => panic!("CrossLoopFuture polled after completion"),
            }
        }
    }
}

impl<T> Drop for CrossLoopFuture<T> {
    fn drop(&mut self) {
        // dropping an unresolved future is the cooperative caller's cancel
        if let State::Waiting { cancel, .. } = &self.state {
            cancel.cancel();
        }
    }
}
