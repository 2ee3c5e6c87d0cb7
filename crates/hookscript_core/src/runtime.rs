//! Process-wide hook runtime.
//!
//! # Responsibility
//! - Own the intercept table, the loaded extensions and the detour backend
//!   after bootstrap.
//! - Enable every installed intercept as one batch.
//! - Serve trampolines: call-through lookup plus fold/notify dispatch.
//!
//! # Invariants
//! - Read-only after construction except for the one-shot enable flag.
//! - Nested dispatch on the same thread returns the original result untouched.

use crate::extension::runtime::ScriptContext;
use crate::hook::backend::{DetourBackend, InstallError};
use crate::hook::dispatch::{DispatchGuard, LoadedExtensions};
use crate::hook::point::{HookId, InterceptPoint, InterceptTable, ResultPolicy};
use crate::model::value::HookValue;
use log::{debug, info, trace};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

pub struct HookRuntime<C> {
    points: InterceptTable,
    extensions: LoadedExtensions<C>,
    backend: Mutex<Box<dyn DetourBackend>>,
    installed: Vec<HookId>,
    enabled: AtomicBool,
}

impl<C> HookRuntime<C> {
    /// `installed` lists the points whose detours are queued in `backend`.
    pub fn new(
        points: InterceptTable,
        extensions: LoadedExtensions<C>,
        backend: Box<dyn DetourBackend>,
        installed: Vec<HookId>,
    ) -> Self {
        Self {
            points,
            extensions,
            backend: Mutex::new(backend),
            installed,
            enabled: AtomicBool::new(false),
        }
    }

    pub fn points(&self) -> &InterceptTable {
        &self.points
    }

    pub fn point(&self, id: HookId) -> Option<&InterceptPoint> {
        self.points.get(id)
    }

    pub fn extensions(&self) -> &LoadedExtensions<C> {
        &self.extensions
    }

    pub fn installed(&self) -> &[HookId] {
        &self.installed
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    /// Address that reaches the original function behind `id`.
    pub fn call_through(&self, id: HookId) -> Option<usize> {
        self.points.get(id).and_then(InterceptPoint::call_through)
    }

    /// Activates every queued intercept in one batch.
    ///
    /// A no-op when nothing was installed or the batch is already live.
    ///
    /// # Errors
    /// - `InstallError::EnableFailed` when the backend rejects the batch; no
    ///   intercept is left active in that case.
    pub fn enable_all(&self) -> Result<(), InstallError> {
        if self.installed.is_empty() {
            debug!("event=hooks_enable module=runtime status=skipped reason=nothing_installed");
            return Ok(());
        }

        let mut backend = self.backend.lock();
        if self.enabled.load(Ordering::Acquire) {
            return Ok(());
        }
        backend.apply_queued().map_err(InstallError::EnableFailed)?;
        self.enabled.store(true, Ordering::Release);
        info!(
            "event=hooks_enable module=runtime status=ok count={}",
            self.installed.len()
        );
        Ok(())
    }
}

impl<C: ScriptContext> HookRuntime<C> {
    /// Routes by the point's policy. Unknown ids return `original`.
    pub fn dispatch<T>(&self, id: HookId, args: &[HookValue], original: T) -> T
    where
        T: Clone + Into<HookValue> + TryFrom<HookValue>,
    {
        match self.points.get(id).map(InterceptPoint::policy) {
            Some(ResultPolicy::Fold) => self.fold(id, args, original),
            Some(ResultPolicy::Notify) => {
                self.notify(id, args, &original.clone().into());
                original
            }
            None => original,
        }
    }

    /// Folds `original` through every subscriber of `id` in order.
    pub fn fold<T>(&self, id: HookId, args: &[HookValue], original: T) -> T
    where
        T: Clone + Into<HookValue> + TryFrom<HookValue>,
    {
        let Some(_guard) = DispatchGuard::enter() else {
            trace!(
                "event=dispatch_nested module=runtime hook={} status=passthrough",
                id.index()
            );
            return original;
        };
        self.extensions.fold(id.index(), args, original)
    }

    /// Runs every subscriber of `id` for side effects only.
    pub fn notify(&self, id: HookId, args: &[HookValue], original: &HookValue) {
        let Some(_guard) = DispatchGuard::enter() else {
            trace!(
                "event=dispatch_nested module=runtime hook={} status=passthrough",
                id.index()
            );
            return;
        };
        self.extensions.notify(id.index(), args, original);
    }
}
