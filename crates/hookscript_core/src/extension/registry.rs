//! Extension context registry.
//!
//! # Responsibility
//! - Own every loaded extension context for the process lifetime.
//! - Record which intercept points each context subscribed to.
//!
//! # Invariants
//! - Source paths are unique keys; contexts are never removed.
//! - Each context sits behind its own exclusive guard.

use crate::extension::runtime::{LoadError, ScriptContext, ScriptEngine};
use crate::extension::source::SourceUnit;
use log::{debug, info};
use parking_lot::{Mutex, MutexGuard};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Stable index of one context, in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContextId(usize);

impl ContextId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Registered context snapshot.
pub struct ExtensionContext<C> {
    path: PathBuf,
    handle: Mutex<C>,
    handlers: Vec<String>,
}

impl<C> ExtensionContext<C> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Handler names matched at registration time, in declaration order.
    pub fn handlers(&self) -> &[String] {
        &self.handlers
    }

    /// Exclusive access to the execution handle.
    pub fn lock(&self) -> MutexGuard<'_, C> {
        self.handle.lock()
    }
}

/// In-process context table keyed by source path.
pub struct ContextRegistry<C> {
    entries: Vec<ExtensionContext<C>>,
    by_path: BTreeMap<PathBuf, ContextId>,
}

impl<C> Default for ContextRegistry<C> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            by_path: BTreeMap::new(),
        }
    }
}

impl<C: ScriptContext> ContextRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers one context for `unit`.
    ///
    /// # Errors
    /// - `LoadError::DuplicatePath` when `unit` already owns a context.
    /// - Any engine `LoadError`; nothing is registered in that case.
    pub fn create_context<E>(&mut self, engine: &E, unit: &SourceUnit) -> Result<ContextId, LoadError>
    where
        E: ScriptEngine<Context = C>,
    {
        if self.by_path.contains_key(unit.path()) {
            return Err(LoadError::DuplicatePath(unit.path().to_path_buf()));
        }

        let handle = engine.create_context(unit)?;
        let id = ContextId(self.entries.len());
        self.entries.push(ExtensionContext {
            path: unit.path().to_path_buf(),
            handle: Mutex::new(handle),
            handlers: Vec::new(),
        });
        self.by_path.insert(unit.path().to_path_buf(), id);
        info!(
            "event=context_created module=registry status=ok context={} script={}",
            id.index(),
            unit.path().display()
        );
        Ok(id)
    }

    /// Probes `id` for each expected handler name and records the matches.
    ///
    /// Absence is a normal outcome. Unknown ids match nothing.
    pub fn register_handlers(&mut self, id: ContextId, expected: &[&str]) -> Vec<String> {
        let Some(entry) = self.entries.get_mut(id.index()) else {
            return vec![];
        };

        let mut matched = Vec::new();
        {
            let handle = entry.handle.lock();
            for name in expected {
                if handle.lookup(name).is_some() {
                    info!(
                        "event=handler_found module=registry script={} hook={name}",
                        entry.path.display()
                    );
                    matched.push((*name).to_string());
                } else {
                    debug!(
                        "event=handler_missing module=registry script={} hook={name}",
                        entry.path.display()
                    );
                }
            }
        }

        for name in &matched {
            if !entry.handlers.contains(name) {
                entry.handlers.push(name.clone());
            }
        }
        matched
    }
}

impl<C> ContextRegistry<C> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: ContextId) -> Option<&ExtensionContext<C>> {
        self.entries.get(id.index())
    }

    pub fn find(&self, path: &Path) -> Option<ContextId> {
        self.by_path.get(path).copied()
    }

    /// Context ids in creation order.
    pub fn ids(&self) -> impl Iterator<Item = ContextId> + '_ {
        (0..self.entries.len()).map(ContextId)
    }

    pub fn iter(&self) -> impl Iterator<Item = (ContextId, &ExtensionContext<C>)> + '_ {
        self.entries
            .iter()
            .enumerate()
            .map(|(index, entry)| (ContextId(index), entry))
    }
}
