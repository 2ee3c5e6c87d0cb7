//! Capability surface injected into every extension context.
//!
//! Capability functions are thin forwarders: no argument validation, no
//! return values, never fail. They must not route through an intercept point.

use log::{debug, error, info, warn};
use std::sync::Arc;

/// Log target used for messages emitted by extension code.
pub const SCRIPT_LOG_TARGET: &str = "script";

/// Namespace of host-provided operations visible to extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Capability {
    Log,
    Game,
}

impl Capability {
    /// Namespace name as seen from extension code.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Log => CAPABILITY_LOG,
            Self::Game => CAPABILITY_GAME,
        }
    }

    /// User-facing short description.
    pub fn description(self) -> &'static str {
        match self {
            Self::Log => "Write leveled messages to the process log.",
            Self::Game => "Forward output to the host user interface.",
        }
    }
}

/// Namespace name for logging operations.
pub const CAPABILITY_LOG: &str = "Log";
/// Namespace name for host UI operations.
pub const CAPABILITY_GAME: &str = "Game";

const ALL_CAPABILITIES: &[Capability] = &[Capability::Log, Capability::Game];

/// Returns every capability namespace, in injection order.
pub fn all_capabilities() -> &'static [Capability] {
    ALL_CAPABILITIES
}

/// Host-specific operations behind the `Game` namespace.
pub trait HostBindings: Send + Sync {
    /// Shows one message in the host UI.
    fn show_message(&self, message: &str);
}

/// Bindings for processes without a host UI; messages go to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogOnlyHost;

impl HostBindings for LogOnlyHost {
    fn show_message(&self, message: &str) {
        info!(target: SCRIPT_LOG_TARGET, "event=show_message module=capability sink=log message={message}");
    }
}

/// Fixed operation set handed to every context at creation.
#[derive(Clone)]
pub struct CapabilitySurface {
    host: Arc<dyn HostBindings>,
}

impl CapabilitySurface {
    pub fn new(host: Arc<dyn HostBindings>) -> Self {
        Self { host }
    }

    /// Surface whose `Game` namespace only logs.
    pub fn log_only() -> Self {
        Self::new(Arc::new(LogOnlyHost))
    }

    pub fn log_debug(&self, message: &str) {
        debug!(target: SCRIPT_LOG_TARGET, "{message}");
    }

    pub fn log_info(&self, message: &str) {
        info!(target: SCRIPT_LOG_TARGET, "{message}");
    }

    pub fn log_warn(&self, message: &str) {
        warn!(target: SCRIPT_LOG_TARGET, "{message}");
    }

    pub fn log_error(&self, message: &str) {
        error!(target: SCRIPT_LOG_TARGET, "{message}");
    }

    pub fn show_message(&self, message: &str) {
        self.host.show_message(message);
    }
}

impl Default for CapabilitySurface {
    fn default() -> Self {
        Self::log_only()
    }
}

impl std::fmt::Debug for CapabilitySurface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilitySurface").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::{all_capabilities, Capability, CapabilitySurface, HostBindings};
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Default)]
    struct RecordingHost {
        messages: Mutex<Vec<String>>,
    }

    impl HostBindings for RecordingHost {
        fn show_message(&self, message: &str) {
            self.messages.lock().push(message.to_string());
        }
    }

    #[test]
    fn forwards_show_message_to_host_bindings() {
        let host = Arc::new(RecordingHost::default());
        let surface = CapabilitySurface::new(host.clone());
        surface.show_message("hunt started");
        surface.show_message("hunt ended");
        assert_eq!(
            *host.messages.lock(),
            vec!["hunt started".to_string(), "hunt ended".to_string()]
        );
    }

    #[test]
    fn exposes_namespaces_in_injection_order() {
        let names: Vec<&str> = all_capabilities().iter().map(|cap| cap.as_str()).collect();
        assert_eq!(names, vec!["Log", "Game"]);
        assert!(Capability::Log.description().contains("log"));
        assert!(Capability::Game.description().contains("host"));
    }
}
