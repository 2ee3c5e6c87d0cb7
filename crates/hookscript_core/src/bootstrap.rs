//! Bootstrap sequence.
//!
//! # Responsibility
//! - Resolve the script root, create one context per source unit, build the
//!   subscription table, then install every subscribed intercept.
//!
//! # Invariants
//! - A missing script root ends bootstrap early with nothing installed.
//! - A unit that fails to load is logged and contributes no subscriptions.
//! - A point with zero subscribers is never installed.
//! - Enabling is left to [`HookRuntime::enable_all`] so the caller can
//!   publish the runtime before any trampoline can fire.

use crate::config::HookConfig;
use crate::extension::registry::ContextRegistry;
use crate::extension::runtime::ScriptEngine;
use crate::extension::source::discover_sources;
use crate::hook::backend::{install, DetourBackend, InstallError};
use crate::hook::dispatch::LoadedExtensions;
use crate::hook::point::InterceptTable;
use crate::hook::subscription::SubscriptionTable;
use crate::runtime::HookRuntime;
use log::{debug, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

#[derive(Debug)]
pub enum BootstrapError {
    ScriptDir { path: PathBuf, source: std::io::Error },
    Install(InstallError),
}

impl Display for BootstrapError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScriptDir { path, source } => write!(
                f,
                "failed to scan script directory `{}`: {source}",
                path.display()
            ),
            Self::Install(source) => write!(f, "{source}"),
        }
    }
}

impl Error for BootstrapError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::ScriptDir { source, .. } => Some(source),
            Self::Install(source) => Some(source),
        }
    }
}

impl From<InstallError> for BootstrapError {
    fn from(value: InstallError) -> Self {
        Self::Install(value)
    }
}

/// Loads every source unit under the configured root and probes `points`.
///
/// Returns `Ok(None)` when the root does not exist.
pub fn load_extensions<E: ScriptEngine>(
    config: &HookConfig,
    engine: &E,
    points: &[&str],
) -> Result<Option<LoadedExtensions<E::Context>>, BootstrapError> {
    let root = config.script_dir.as_path();
    if !root.is_dir() {
        info!(
            "event=bootstrap module=bootstrap status=skipped reason=script_dir_missing path={}",
            root.display()
        );
        return Ok(None);
    }

    let units =
        discover_sources(root, &config.script_extension).map_err(|source| {
            BootstrapError::ScriptDir {
                path: root.to_path_buf(),
                source,
            }
        })?;
    info!(
        "event=scripts_scan module=bootstrap status=ok path={} count={}",
        root.display(),
        units.len()
    );

    let mut contexts = ContextRegistry::new();
    let mut failures = Vec::new();
    for unit in &units {
        info!(
            "event=script_load module=bootstrap script={}",
            unit.display_name()
        );
        if let Err(err) = contexts.create_context(engine, unit) {
            warn!(
                "event=script_load module=bootstrap status=error script={} error={err}",
                unit.display_name()
            );
            failures.push(err);
        }
    }

    let subscriptions = SubscriptionTable::build(points, &mut contexts);
    info!(
        "event=subscriptions_built module=bootstrap status=ok contexts={} entries={}",
        contexts.len(),
        subscriptions.entry_count()
    );
    Ok(Some(LoadedExtensions::new(
        contexts,
        subscriptions,
        failures,
    )))
}

/// Runs the bootstrap sequence up to, not including, enabling.
///
/// # Errors
/// - `BootstrapError::ScriptDir` when the root exists but cannot be listed.
/// - `BootstrapError::Install` when any subscribed point fails to install.
pub fn bootstrap<E: ScriptEngine>(
    config: &HookConfig,
    engine: &E,
    points: InterceptTable,
    mut backend: Box<dyn DetourBackend>,
) -> Result<Option<HookRuntime<E::Context>>, BootstrapError> {
    let names = points.names();
    let Some(extensions) = load_extensions(config, engine, &names)? else {
        return Ok(None);
    };

    let mut installed = Vec::new();
    for (id, point) in points.iter() {
        if !extensions.subscriptions().has_subscribers(id.index()) {
            debug!(
                "event=hook_skip module=bootstrap hook={} reason=no_subscribers",
                point.name()
            );
            continue;
        }
        install(point, backend.as_mut())?;
        installed.push(id);
    }

    info!(
        "event=bootstrap module=bootstrap status=ok installed={}",
        installed.len()
    );
    Ok(Some(HookRuntime::new(points, extensions, backend, installed)))
}
