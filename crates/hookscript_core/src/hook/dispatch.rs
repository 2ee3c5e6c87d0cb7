//! Result folding across subscribers.
//!
//! # Responsibility
//! - Walk one subscriber group in registration order.
//! - Resolve each handler by exact name at call time and invoke it.
//! - Isolate handler failures so one extension cannot break another.
//!
//! # Invariants
//! - A failing, panicking or mistyped handler leaves the running result
//!   unchanged; the remaining subscribers still run.
//! - Handlers absent at call time are skipped silently.

use crate::extension::registry::{ContextId, ContextRegistry};
use crate::extension::runtime::{HandlerError, LoadError, ScriptContext};
use crate::hook::subscription::SubscriptionTable;
use crate::model::value::HookValue;
use log::{trace, warn};
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};

thread_local! {
    static DISPATCHING: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as dispatching until dropped.
///
/// `enter` returns `None` when the thread is already inside a dispatch, which
/// happens when a handler's side effect re-enters an intercepted function.
pub struct DispatchGuard {
    _private: (),
}

impl DispatchGuard {
    pub fn enter() -> Option<Self> {
        DISPATCHING.with(|flag| {
            if flag.get() {
                None
            } else {
                flag.set(true);
                Some(Self { _private: () })
            }
        })
    }
}

impl Drop for DispatchGuard {
    fn drop(&mut self) {
        DISPATCHING.with(|flag| flag.set(false));
    }
}

/// Loaded contexts plus the subscription table built from them.
pub struct LoadedExtensions<C> {
    contexts: ContextRegistry<C>,
    subscriptions: SubscriptionTable,
    failures: Vec<LoadError>,
}

impl<C> LoadedExtensions<C> {
    /// `failures` lists source units that produced no context.
    pub fn new(
        contexts: ContextRegistry<C>,
        subscriptions: SubscriptionTable,
        failures: Vec<LoadError>,
    ) -> Self {
        Self {
            contexts,
            subscriptions,
            failures,
        }
    }

    pub fn contexts(&self) -> &ContextRegistry<C> {
        &self.contexts
    }

    pub fn subscriptions(&self) -> &SubscriptionTable {
        &self.subscriptions
    }

    pub fn failures(&self) -> &[LoadError] {
        &self.failures
    }
}

impl<C: ScriptContext> LoadedExtensions<C> {
    /// Folds `original` through the subscribers of group `index`.
    ///
    /// Each handler receives `args` followed by the running result. A result
    /// that does not convert back into `T` counts as a handler error.
    pub fn fold<T>(&self, index: usize, args: &[HookValue], original: T) -> T
    where
        T: Clone + Into<HookValue> + TryFrom<HookValue>,
    {
        let Some(group) = self.subscriptions.group(index) else {
            return original;
        };

        let mut running = original;
        for id in group.contexts() {
            let mut call_args = args.to_vec();
            let current: HookValue = running.clone().into();
            let expected = current.kind();
            call_args.push(current);

            match self.run_handler(*id, group.point(), call_args) {
                None => {}
                Some(Ok(value)) => {
                    let found = value.kind();
                    match T::try_from(value) {
                        Ok(next) => running = next,
                        Err(_) => self.report(
                            *id,
                            group.point(),
                            &HandlerError::ResultType { expected, found },
                        ),
                    }
                }
                Some(Err(err)) => self.report(*id, group.point(), &err),
            }
        }
        running
    }

    /// Runs every subscriber of group `index` for its side effects.
    ///
    /// Each handler receives `args` followed by `original`; results are ignored.
    pub fn notify(&self, index: usize, args: &[HookValue], original: &HookValue) {
        let Some(group) = self.subscriptions.group(index) else {
            return;
        };

        for id in group.contexts() {
            let mut call_args = args.to_vec();
            call_args.push(original.clone());
            if let Some(Err(err)) = self.run_handler(*id, group.point(), call_args) {
                self.report(*id, group.point(), &err);
            }
        }
    }

    fn run_handler(
        &self,
        id: ContextId,
        point: &str,
        args: Vec<HookValue>,
    ) -> Option<Result<HookValue, HandlerError>> {
        let entry = self.contexts.get(id)?;
        let mut context = entry.lock();
        let Some(handler) = context.lookup(point) else {
            trace!(
                "event=handler_skipped module=dispatch hook={point} script={} reason=absent",
                entry.path().display()
            );
            return None;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| context.invoke(&handler, args)));
        Some(match outcome {
            Ok(result) => result,
            Err(payload) => Err(HandlerError::Panicked(panic_message(payload.as_ref()))),
        })
    }

    fn report(&self, id: ContextId, point: &str, err: &HandlerError) {
        let script = self
            .contexts
            .get(id)
            .map(|entry| entry.path().display().to_string())
            .unwrap_or_default();
        warn!("event=handler_failed module=dispatch hook={point} script={script} error={err}");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::DispatchGuard;

    #[test]
    fn guard_rejects_nested_entry_on_same_thread() {
        let outer = DispatchGuard::enter().expect("first entry");
        assert!(DispatchGuard::enter().is_none());
        drop(outer);
        assert!(DispatchGuard::enter().is_some());
    }

    #[test]
    fn guard_is_per_thread() {
        let _outer = DispatchGuard::enter().expect("first entry");
        let other = std::thread::spawn(|| DispatchGuard::enter().is_some())
            .join()
            .expect("thread joins");
        assert!(other);
    }
}
