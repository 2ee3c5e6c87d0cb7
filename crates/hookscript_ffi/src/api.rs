//! C ABI entry points for the host process.
//!
//! # Responsibility
//! - Run the attach sequence: config, logging, host bindings, bootstrap,
//!   publish the runtime, enable intercepts.
//! - Own the single process-wide [`HookRuntime`].
//!
//! # Invariants
//! - Exported functions never unwind across the boundary.
//! - The runtime is published before any intercept is enabled.
//! - Attach completes at most once per process; later calls return success.
//! - A failed attach can be retried. Once the runtime is published, a retry
//!   only re-attempts enabling it.

use crate::game::{declare_points, game_point_names};
use crate::host::{module_base, GameHost};
use hookscript_core::{
    bootstrap, init_logging, load_config_or_default, BootstrapError, CapabilitySurface,
    ConfigError, DetourBackend, HookRuntime, InstallError, RhaiContext, RhaiScriptEngine,
};
use log::{error, info};
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::error::Error;
use std::ffi::CStr;
use std::fmt::{Display, Formatter};
use std::os::raw::c_char;
use std::path::Path;
use std::sync::Arc;

pub const STATUS_OK: i32 = 0;
pub const STATUS_INVALID_ARGUMENT: i32 = -1;
pub const STATUS_CONFIG: i32 = -2;
pub const STATUS_LOGGING: i32 = -3;
pub const STATUS_INSTALL: i32 = -4;
pub const STATUS_UNSUPPORTED: i32 = -5;
pub const STATUS_PANIC: i32 = -6;

static RUNTIME: OnceCell<HookRuntime<RhaiContext>> = OnceCell::new();
static ATTACHED: Mutex<bool> = parking_lot::const_mutex(false);

pub(crate) fn runtime() -> Option<&'static HookRuntime<RhaiContext>> {
    RUNTIME.get()
}

/// What a completed attach did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachOutcome {
    /// Intercepts are live; `installed` counts them.
    Attached { installed: usize },
    /// The script directory is absent; the host runs unmodified.
    NoExtensions,
    AlreadyAttached,
}

#[derive(Debug)]
pub enum AttachError {
    Config(ConfigError),
    Logging(String),
    Bootstrap(BootstrapError),
    Unsupported(&'static str),
}

impl AttachError {
    pub fn status(&self) -> i32 {
        match self {
            Self::Config(_) => STATUS_CONFIG,
            Self::Logging(_) => STATUS_LOGGING,
            Self::Bootstrap(_) => STATUS_INSTALL,
            Self::Unsupported(_) => STATUS_UNSUPPORTED,
        }
    }
}

impl Display for AttachError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(err) => write!(f, "{err}"),
            Self::Logging(message) => write!(f, "logging setup failed: {message}"),
            Self::Bootstrap(err) => write!(f, "{err}"),
            Self::Unsupported(arch) => write!(f, "inline hooks are not supported on `{arch}`"),
        }
    }
}

impl Error for AttachError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Bootstrap(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ConfigError> for AttachError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<BootstrapError> for AttachError {
    fn from(value: BootstrapError) -> Self {
        Self::Bootstrap(value)
    }
}

impl From<InstallError> for AttachError {
    fn from(value: InstallError) -> Self {
        Self::Bootstrap(BootstrapError::Install(value))
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn detour_backend() -> Result<Box<dyn DetourBackend>, AttachError> {
    Ok(Box::new(hookscript_core::RetourBackend::new()))
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64")))]
fn detour_backend() -> Result<Box<dyn DetourBackend>, AttachError> {
    Err(AttachError::Unsupported(std::env::consts::ARCH))
}

/// Runs the attach sequence against the config file at `config_path`.
///
/// # Errors
/// - `AttachError::Config` for an unreadable or invalid config file.
/// - `AttachError::Logging` when the log sink cannot be started.
/// - `AttachError::Bootstrap` when a subscribed intercept fails to install
///   or enable.
pub fn attach(config_path: &Path) -> Result<AttachOutcome, AttachError> {
    let mut attached = ATTACHED.lock();
    if *attached {
        return Ok(AttachOutcome::AlreadyAttached);
    }

    let runtime = match RUNTIME.get() {
        Some(runtime) => {
            info!("event=attach module=ffi status=retry step=enable");
            runtime
        }
        None => {
            let Some(runtime) = prepare(config_path)? else {
                *attached = true;
                info!("event=attach module=ffi status=ok reason=no_extensions");
                return Ok(AttachOutcome::NoExtensions);
            };
            match RUNTIME.try_insert(runtime) {
                Ok(published) => published,
                Err((published, _)) => published,
            }
        }
    };

    runtime.enable_all()?;
    *attached = true;
    info!(
        "event=attach module=ffi status=ok installed={} known_points={}",
        runtime.installed().len(),
        game_point_names().len()
    );
    Ok(AttachOutcome::Attached {
        installed: runtime.installed().len(),
    })
}

/// Config, logging, host bindings and bootstrap; `None` without a script dir.
fn prepare(config_path: &Path) -> Result<Option<HookRuntime<RhaiContext>>, AttachError> {
    let config = load_config_or_default(config_path)?;
    let cwd = std::env::current_dir()
        .map_err(|err| AttachError::Logging(format!("working directory unavailable: {err}")))?;
    let log_dir = config.resolve_log_dir(&cwd);
    let log_dir = log_dir
        .to_str()
        .ok_or_else(|| AttachError::Logging(format!("non UTF-8 log dir `{}`", log_dir.display())))?;
    init_logging(&config.log_level, log_dir).map_err(AttachError::Logging)?;
    info!(
        "event=attach module=ffi status=start config={} script_dir={}",
        config_path.display(),
        config.script_dir.display()
    );

    let base = module_base();
    let host = GameHost::resolve(&config, base);
    let engine = RhaiScriptEngine::new(CapabilitySurface::new(Arc::new(host)));
    let points = declare_points(&config, base)?;
    let backend = detour_backend()?;
    Ok(bootstrap(&config, &engine, points, backend)?)
}

fn attach_status(config_path: &Path) -> i32 {
    match std::panic::catch_unwind(|| attach(config_path)) {
        Ok(Ok(_)) => STATUS_OK,
        Ok(Err(err)) => {
            error!("event=attach module=ffi status=error error={err}");
            err.status()
        }
        Err(_) => STATUS_PANIC,
    }
}

/// Attaches using the config file at `config_path`.
///
/// # FFI contract
/// - Returns `0` on success, when the script directory is absent, and on
///   repeated calls.
/// - Returns a negative status on fatal errors; the host keeps running
///   without intercepts.
/// - Never unwinds.
///
/// # Safety
/// `config_path` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn hookscript_attach(config_path: *const c_char) -> i32 {
    if config_path.is_null() {
        return STATUS_INVALID_ARGUMENT;
    }
    let Ok(path) = CStr::from_ptr(config_path).to_str() else {
        return STATUS_INVALID_ARGUMENT;
    };
    attach_status(Path::new(path))
}

/// Core crate version as a static NUL-terminated string.
///
/// # FFI contract
/// - The pointer is valid for the process lifetime; callers must not free it.
#[no_mangle]
pub extern "C" fn hookscript_version() -> *const c_char {
    concat!(env!("CARGO_PKG_VERSION"), "\0").as_ptr().cast()
}

#[cfg(windows)]
mod dll {
    use super::attach_status;
    use hookscript_core::config::DEFAULT_CONFIG_PATH;
    use std::ffi::c_void;
    use std::path::Path;

    const DLL_PROCESS_ATTACH: u32 = 1;

    /// Loader entry point; attaches with the default config path.
    #[no_mangle]
    pub extern "system" fn DllMain(_module: *mut c_void, reason: u32, _reserved: *mut c_void) -> i32 {
        if reason == DLL_PROCESS_ATTACH {
            let _ = attach_status(Path::new(DEFAULT_CONFIG_PATH));
        }
        1
    }
}

#[cfg(test)]
mod tests {
    use super::{
        attach, hookscript_attach, hookscript_version, AttachError, STATUS_CONFIG, STATUS_INSTALL,
        STATUS_INVALID_ARGUMENT, STATUS_LOGGING,
    };
    use hookscript_core::{BootstrapError, ConfigError, InstallError};
    use std::ffi::CStr;

    #[test]
    fn null_config_path_is_rejected() {
        // SAFETY: null is an accepted input.
        assert_eq!(unsafe { hookscript_attach(std::ptr::null()) }, STATUS_INVALID_ARGUMENT);
    }

    #[test]
    fn errors_map_to_stable_status_codes() {
        assert_eq!(
            AttachError::Config(ConfigError::Invalid("x".to_string())).status(),
            STATUS_CONFIG
        );
        assert_eq!(AttachError::Logging("x".to_string()).status(), STATUS_LOGGING);
        assert_eq!(
            AttachError::Bootstrap(BootstrapError::Install(InstallError::TooManyPoints)).status(),
            STATUS_INSTALL
        );
    }

    #[test]
    fn version_is_nul_terminated() {
        // SAFETY: the export returns a static NUL-terminated string.
        let version = unsafe { CStr::from_ptr(hookscript_version()) };
        assert_eq!(
            version.to_str().expect("version is UTF-8"),
            env!("CARGO_PKG_VERSION")
        );
    }

    #[test]
    fn failed_attach_can_be_retried() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("hookscript.toml");
        std::fs::write(&path, "script_dir = ").expect("write broken config");

        for _ in 0..2 {
            let err = attach(&path).expect_err("broken config must fail");
            assert_eq!(err.status(), STATUS_CONFIG);
        }
        let config = std::ffi::CString::new(path.to_str().expect("UTF-8 path")).expect("no NUL");
        // SAFETY: `config` is a valid NUL-terminated path.
        assert_eq!(unsafe { hookscript_attach(config.as_ptr()) }, STATUS_CONFIG);
    }
}
