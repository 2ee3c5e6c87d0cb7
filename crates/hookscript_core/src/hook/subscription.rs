//! Hook subscription table.
//!
//! # Invariants
//! - Built once; read-only afterwards, so dispatch needs no locking here.
//! - Groups keep point declaration order; members keep context creation order.

use crate::extension::registry::{ContextId, ContextRegistry};
use crate::extension::runtime::ScriptContext;

/// Ordered subscribers of one intercept point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberGroup {
    point: String,
    contexts: Vec<ContextId>,
}

impl SubscriberGroup {
    pub fn point(&self) -> &str {
        &self.point
    }

    pub fn contexts(&self) -> &[ContextId] {
        &self.contexts
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

/// Multi-valued map from intercept-point name to subscribing contexts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionTable {
    groups: Vec<SubscriberGroup>,
}

impl SubscriptionTable {
    /// Probes every context for every point name and records the matches.
    ///
    /// Group `i` corresponds to `points[i]`.
    pub fn build<C: ScriptContext>(points: &[&str], registry: &mut ContextRegistry<C>) -> Self {
        let mut groups: Vec<SubscriberGroup> = points
            .iter()
            .map(|name| SubscriberGroup {
                point: (*name).to_string(),
                contexts: Vec::new(),
            })
            .collect();

        let ids: Vec<ContextId> = registry.ids().collect();
        for id in ids {
            let matched = registry.register_handlers(id, points);
            for group in groups.iter_mut() {
                if matched.iter().any(|name| name == &group.point) {
                    group.contexts.push(id);
                }
            }
        }

        Self { groups }
    }

    /// Subscribers of `point`, in registration order. Empty for unknown names.
    pub fn subscribers_for(&self, point: &str) -> impl Iterator<Item = ContextId> + Clone + '_ {
        self.groups
            .iter()
            .find(|group| group.point == point)
            .map(|group| group.contexts.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
    }

    /// Group at declaration index `index`.
    pub fn group(&self, index: usize) -> Option<&SubscriberGroup> {
        self.groups.get(index)
    }

    pub fn groups(&self) -> &[SubscriberGroup] {
        &self.groups
    }

    pub fn has_subscribers(&self, index: usize) -> bool {
        self.groups.get(index).is_some_and(|group| !group.is_empty())
    }

    /// Total number of subscription entries.
    pub fn entry_count(&self) -> usize {
        self.groups.iter().map(|group| group.contexts.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::SubscriptionTable;
    use crate::extension::registry::ContextRegistry;
    use crate::extension::runtime::{HandlerError, LoadError, ScriptContext, ScriptEngine};
    use crate::extension::source::SourceUnit;
    use crate::model::value::HookValue;

    struct NamedContext(Vec<String>);

    impl ScriptContext for NamedContext {
        type Handler = ();

        fn lookup(&self, name: &str) -> Option<()> {
            self.0.iter().any(|candidate| candidate == name).then_some(())
        }

        fn invoke(&mut self, _handler: &(), _args: Vec<HookValue>) -> Result<HookValue, HandlerError> {
            Ok(HookValue::Unit)
        }
    }

    /// Treats the file stem as a comma-separated list of handler names.
    struct StemEngine;

    impl ScriptEngine for StemEngine {
        type Context = NamedContext;

        fn create_context(&self, unit: &SourceUnit) -> Result<NamedContext, LoadError> {
            let stem = unit
                .path()
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(NamedContext(stem.split(',').map(str::to_string).collect()))
        }
    }

    fn registry_for(files: &[&str]) -> ContextRegistry<NamedContext> {
        let mut registry = ContextRegistry::new();
        for file in files {
            registry
                .create_context(&StemEngine, &SourceUnit::new(*file))
                .expect("context creation");
        }
        registry
    }

    #[test]
    fn groups_follow_context_creation_order() {
        let mut registry = registry_for(&["A,B.rhai", "B.rhai", "C.rhai"]);
        let table = SubscriptionTable::build(&["A", "B", "D"], &mut registry);

        let a: Vec<usize> = table.subscribers_for("A").map(|id| id.index()).collect();
        let b: Vec<usize> = table.subscribers_for("B").map(|id| id.index()).collect();
        assert_eq!(a, vec![0]);
        assert_eq!(b, vec![0, 1]);
        assert_eq!(table.subscribers_for("D").count(), 0);
        assert_eq!(table.subscribers_for("unknown").count(), 0);
        assert_eq!(table.entry_count(), 3);
        assert!(table.has_subscribers(1));
        assert!(!table.has_subscribers(2));
    }

    #[test]
    fn iterator_is_restartable() {
        let mut registry = registry_for(&["A.rhai", "A,B.rhai"]);
        let table = SubscriptionTable::build(&["A"], &mut registry);
        let subscribers = table.subscribers_for("A");
        let first: Vec<_> = subscribers.clone().collect();
        let second: Vec<_> = subscribers.collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn rebuilding_from_same_sources_is_order_stable() {
        let files = ["X,Y.rhai", "Y.rhai", "X.rhai"];
        let first = SubscriptionTable::build(&["X", "Y"], &mut registry_for(&files));
        let second = SubscriptionTable::build(&["X", "Y"], &mut registry_for(&files));
        assert_eq!(first, second);
    }
}
