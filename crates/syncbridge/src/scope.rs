//! Dual-interface wrappers for async context managers
//!
//! A resource exposes async `enter`/`exit`; the wrapper turns that into
//! guard types. Enter and exit are separate submissions to the loop, and
//! exit runs even when the body panics or early-returns, because the
//! guards run it on drop. The entered value is translated out into the
//! guard and translated back in for exit.

use std::sync::Arc;

use async_trait::async_trait;
use syncbridge_core::BridgeResult;

use crate::function::{WrapMeta, WrapOptions};
use crate::registry::short_type_name;
use crate::translate::{TranslateIn, TranslateOut};
use crate::Synchronizer;

/// An async context manager: acquire on `enter`, release on `exit`
///
/// Methods only ever run on the synchronizer's background loop.
#[async_trait]
pub trait AsyncResource: Send + Sync + 'static {
    /// Value the scope body works with
    type Item: Send + 'static;

    async fn enter(&self) -> Self::Item;

    async fn exit(&self, item: Self::Item);
}

struct ScopeShared<R: AsyncResource> {
    resource: Arc<R>,
    sync: Synchronizer,
    meta: WrapMeta,
}

/// Blocking entry of a wrapped async context manager
pub struct SyncScope<R: AsyncResource> {
    shared: Arc<ScopeShared<R>>,
}

impl<R: AsyncResource> Clone for SyncScope<R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<R: AsyncResource> SyncScope<R> {
    pub(crate) fn wrap(sync: Synchronizer, resource: R, opts: WrapOptions) -> Self {
        Self::from_parts_meta(
            Arc::new(resource),
            sync,
            WrapMeta::resolve(short_type_name::<R>(), opts),
        )
    }

    pub(crate) fn from_parts(resource: Arc<R>, sync: Synchronizer, name: String) -> Self {
        Self::from_parts_meta(resource, sync, WrapMeta::resolve(name, WrapOptions::default()))
    }

    fn from_parts_meta(resource: Arc<R>, sync: Synchronizer, meta: WrapMeta) -> Self {
        Self {
            shared: Arc::new(ScopeShared {
                resource,
                sync,
                meta,
            }),
        }
    }

    /// The wrapper's bare name
    pub fn name(&self) -> &str {
        &self.shared.meta.name
    }

    /// The cooperative view of this scope
    pub fn aio(&self) -> AioScope<R> {
        AioScope {
            shared: self.shared.clone(),
        }
    }
}

impl<R> SyncScope<R>
where
    R: AsyncResource,
    R::Item: TranslateOut,
    <R::Item as TranslateOut>::Outer: TranslateIn<Inner = R::Item>,
{
    /// Run `enter` on the loop, blocking until the resource is acquired
    pub fn enter(&self) -> BridgeResult<ScopeGuard<R>> {
        self.shared.sync.note_blocking_entry(&self.shared.meta.name);
        let resource = self.shared.resource.clone();
        let sync = self.shared.sync.clone();
        let value = self.shared.sync.host().run_blocking(async move {
            resource.enter().await.translate_out(&sync)
        })?;
        Ok(ScopeGuard {
            value: Some(value),
            shared: self.shared.clone(),
        })
    }
}

impl<R: AsyncResource> std::fmt::Debug for SyncScope<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncScope")
            .field("name", &self.shared.meta.qualified_name())
            .finish()
    }
}

/// Cooperative entry of a wrapped async context manager
pub struct AioScope<R: AsyncResource> {
    shared: Arc<ScopeShared<R>>,
}

impl<R: AsyncResource> Clone for AioScope<R> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<R> AioScope<R>
where
    R: AsyncResource,
    R::Item: TranslateOut,
    <R::Item as TranslateOut>::Outer: TranslateIn<Inner = R::Item>,
{
    /// Run `enter` on the loop, awaiting the acquired resource
    pub async fn enter(&self) -> BridgeResult<AioGuard<R>> {
        let resource = self.shared.resource.clone();
        let sync = self.shared.sync.clone();
        let value = self
            .shared
            .sync
            .host()
            .run_cooperative(async move { resource.enter().await.translate_out(&sync) })
            .await?;
        Ok(AioGuard {
            value: Some(value),
            shared: self.shared.clone(),
        })
    }
}

/// Blocking guard over an entered resource; runs `exit` when it goes away
pub struct ScopeGuard<R>
where
    R: AsyncResource,
    R::Item: TranslateOut,
    <R::Item as TranslateOut>::Outer: TranslateIn<Inner = R::Item>,
{
    value: Option<<R::Item as TranslateOut>::Outer>,
    shared: Arc<ScopeShared<R>>,
}

impl<R> ScopeGuard<R>
where
    R: AsyncResource,
    R::Item: TranslateOut,
    <R::Item as TranslateOut>::Outer: TranslateIn<Inner = R::Item>,
{
    /// The entered value, translated out
    pub fn value(&self) -> &<R::Item as TranslateOut>::Outer {
        self.value.as_ref().expect("guard value present until exit")
    }

    /// Run `exit` on the loop, blocking until the resource is released
    pub fn exit(mut self) -> BridgeResult<()> {
        let Some(value) = self.value.take() else {
            return Ok(());
        };
        let item = value.translate_in(&self.shared.sync);
        let resource = self.shared.resource.clone();
        self.shared
            .sync
            .host()
            .run_blocking(async move { resource.exit(item).await })
    }
}

impl<R> Drop for ScopeGuard<R>
where
    R: AsyncResource,
    R::Item: TranslateOut,
    <R::Item as TranslateOut>::Outer: TranslateIn<Inner = R::Item>,
{
    fn drop(&mut self) {
        let Some(value) = self.value.take() else {
            return;
        };
        let host = self.shared.sync.host();
        if !host.state().can_submit() {
            tracing::warn!(
                scope = %self.shared.meta.name,
                "scope guard dropped after shutdown; exit skipped"
            );
            return;
        }
        let item = value.translate_in(&self.shared.sync);
        let resource = self.shared.resource.clone();
        match host.schedule(async move { resource.exit(item).await }) {
            Ok(mut call) => {
                // waiting on the loop thread itself would stall the loop
                if !host.is_loop_thread() {
                    let timeout = self.shared.sync.config().finalize_timeout();
                    if !call.wait_timeout(timeout) {
                        tracing::warn!(
                            scope = %self.shared.meta.name,
                            "scope exit timed out during drop"
                        );
                    }
                }
            }
            Err(e) => tracing::warn!(
                scope = %self.shared.meta.name,
                error = %e,
                "scope exit could not be scheduled"
            ),
        }
    }
}

/// Cooperative guard over an entered resource
///
/// Prefer the explicit [`AioGuard::exit`]; on drop the exit is scheduled
/// detached (a drop cannot await) but remains tracked for shutdown.
pub struct AioGuard<R>
where
    R: AsyncResource,
    R::Item: TranslateOut,
    <R::Item as TranslateOut>::Outer: TranslateIn<Inner = R::Item>,
{
    value: Option<<R::Item as TranslateOut>::Outer>,
    shared: Arc<ScopeShared<R>>,
}

impl<R> AioGuard<R>
where
    R: AsyncResource,
    R::Item: TranslateOut,
    <R::Item as TranslateOut>::Outer: TranslateIn<Inner = R::Item>,
{
    /// The entered value, translated out
    pub fn value(&self) -> &<R::Item as TranslateOut>::Outer {
        self.value.as_ref().expect("guard value present until exit")
    }

    /// Run `exit` on the loop, awaiting the release
    pub async fn exit(mut self) -> BridgeResult<()> {
        let Some(value) = self.value.take() else {
            return Ok(());
        };
        let item = value.translate_in(&self.shared.sync);
        let resource = self.shared.resource.clone();
        self.shared
            .sync
            .host()
            .run_cooperative(async move { resource.exit(item).await })
            .await
    }
}

impl<R> Drop for AioGuard<R>
where
    R: AsyncResource,
    R::Item: TranslateOut,
    <R::Item as TranslateOut>::Outer: TranslateIn<Inner = R::Item>,
{
    fn drop(&mut self) {
        let Some(value) = self.value.take() else {
            return;
        };
        let host = self.shared.sync.host();
        if !host.state().can_submit() {
            return;
        }
        let item = value.translate_in(&self.shared.sync);
        let resource = self.shared.resource.clone();
        match host.schedule(async move { resource.exit(item).await }) {
            Ok(_detached) => {
                tracing::debug!(scope = %self.shared.meta.name, "scope exit scheduled on drop");
            }
            Err(e) => tracing::debug!(
                scope = %self.shared.meta.name,
                error = %e,
                "scope exit could not be scheduled"
            ),
        }
    }
}

#[cfg(test)]
#[path = "scope/scope_tests.rs"]
mod scope_tests;
