//! Host process bindings.
//!
//! # Responsibility
//! - Locate the host image base and turn configured offsets into addresses.
//! - Forward `Game::ShowMessage` into the host's chat routine.
//!
//! # Invariants
//! - Unresolved host routines turn capability calls into logged no-ops.

use hookscript_core::{HookConfig, HostBindings};
use log::warn;
use std::ffi::{c_void, CString};
use std::os::raw::c_char;

/// Config target naming the host chat routine.
pub const SHOW_MESSAGE_TARGET: &str = "Chat_ShowGameMessage";
/// Config target naming the global that holds the chat instance pointer.
pub const CHAT_MAIN_TARGET: &str = "Chat_MainPtr";

type ShowGameMessageFn = unsafe extern "C" fn(*mut c_void, *const c_char, f32, f32, bool);

/// Base address of the host executable image. Zero outside Windows, where
/// configured offsets are taken as absolute addresses.
#[cfg(windows)]
pub fn module_base() -> usize {
    #[link(name = "kernel32")]
    extern "system" {
        fn GetModuleHandleW(module_name: *const u16) -> *mut c_void;
    }
    // SAFETY: a null name asks for the calling process image and has no
    // other preconditions.
    unsafe { GetModuleHandleW(std::ptr::null()) as usize }
}

#[cfg(not(windows))]
pub fn module_base() -> usize {
    0
}

/// `base + offset`, or `None` on overflow or a null result.
pub fn resolve_address(base: usize, offset: u64) -> Option<usize> {
    let offset = usize::try_from(offset).ok()?;
    base.checked_add(offset).filter(|address| *address != 0)
}

/// Capability bindings backed by resolved host routines.
#[derive(Debug, Clone, Copy, Default)]
pub struct GameHost {
    show_message: Option<usize>,
    chat_main: Option<usize>,
}

impl GameHost {
    pub fn resolve(config: &HookConfig, base: usize) -> Self {
        let lookup = |name: &str| {
            config
                .target_offset(name)
                .and_then(|offset| resolve_address(base, offset))
        };
        Self {
            show_message: lookup(SHOW_MESSAGE_TARGET),
            chat_main: lookup(CHAT_MAIN_TARGET),
        }
    }

    pub fn can_show_messages(&self) -> bool {
        self.show_message.is_some() && self.chat_main.is_some()
    }
}

impl HostBindings for GameHost {
    fn show_message(&self, message: &str) {
        let (Some(routine), Some(chat_main)) = (self.show_message, self.chat_main) else {
            warn!("event=show_message module=host status=skipped reason=unresolved");
            return;
        };
        let Ok(text) = CString::new(message) else {
            warn!("event=show_message module=host status=skipped reason=interior_nul");
            return;
        };

        // SAFETY: both addresses come from the host addressing table; the
        // routine has the chat signature and `chat_main` holds the live chat
        // instance once the game has started.
        unsafe {
            let chat = *(chat_main as *const *mut c_void);
            let routine = std::mem::transmute::<usize, ShowGameMessageFn>(routine);
            routine(chat, text.as_ptr(), -1.0, -1.0, false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{resolve_address, GameHost, CHAT_MAIN_TARGET, SHOW_MESSAGE_TARGET};
    use hookscript_core::{HookConfig, HostBindings};

    #[test]
    fn resolves_offsets_against_base() {
        assert_eq!(resolve_address(0x1400_0000, 0x20), Some(0x1400_0020));
        assert_eq!(resolve_address(0, 0), None);
        assert_eq!(resolve_address(usize::MAX, 1), None);
    }

    #[test]
    fn unresolved_host_makes_show_message_a_no_op() {
        let host = GameHost::resolve(&HookConfig::default(), 0x1000);
        assert!(!host.can_show_messages());
        host.show_message("ignored");
    }

    #[test]
    fn resolves_both_chat_targets() {
        let mut config = HookConfig::default();
        config.targets.insert(SHOW_MESSAGE_TARGET.to_string(), 0x10);
        config.targets.insert(CHAT_MAIN_TARGET.to_string(), 0x20);
        assert!(GameHost::resolve(&config, 0x1000).can_show_messages());
    }
}
