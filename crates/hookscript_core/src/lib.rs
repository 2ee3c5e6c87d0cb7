//! Core of the hookscript loader.
//! Owns extension contexts, intercept installation and multi-subscriber dispatch.

pub mod bootstrap;
pub mod config;
pub mod extension;
pub mod hook;
pub mod logging;
pub mod model;
pub mod runtime;

pub use bootstrap::{bootstrap, load_extensions, BootstrapError};
pub use config::{load_config, load_config_or_default, ConfigError, HookConfig};
pub use extension::capability::{CapabilitySurface, HostBindings, LogOnlyHost};
pub use extension::registry::{ContextId, ContextRegistry};
pub use extension::rhai_runtime::{RhaiContext, RhaiScriptEngine};
pub use extension::runtime::{HandlerError, LoadError, ScriptContext, ScriptEngine};
pub use hook::backend::{install, DetourBackend, DetourError, InstallError};
#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use hook::backend::RetourBackend;
pub use hook::dispatch::LoadedExtensions;
pub use hook::point::{HookId, InterceptPoint, InterceptTable, ResultPolicy};
pub use logging::{default_log_level, init_console_logging, init_logging, logging_status};
pub use model::value::{HookValue, ValueConversionError};
pub use runtime::HookRuntime;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
