//! Interception engine: detour backends and installation.
//!
//! # Responsibility
//! - Redirect an original entry to its trampoline and record the
//!   call-through address in the point's slot.
//! - Apply every queued redirection as one batch.
//!
//! # Invariants
//! - Null targets and detours are rejected before touching memory.
//! - A batch is all-or-nothing: a failed enable leaves no member enabled.

use crate::hook::point::InterceptPoint;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Low-level redirection primitive.
pub trait DetourBackend: Send {
    /// Creates a disabled detour from `target` to `detour`.
    ///
    /// Returns the address that calls through to the original code.
    fn create(&mut self, target: usize, detour: usize) -> Result<usize, DetourError>;

    /// Enables every detour created since the last successful apply.
    fn apply_queued(&mut self) -> Result<(), DetourError>;
}

/// Backend-level failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetourError {
    InvalidAddress(usize),
    AlreadyHooked(usize),
    Patch(String),
}

impl Display for DetourError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidAddress(address) => write!(f, "address {address:#x} is not patchable"),
            Self::AlreadyHooked(address) => write!(f, "address {address:#x} is already hooked"),
            Self::Patch(message) => write!(f, "patch failed: {message}"),
        }
    }
}

impl Error for DetourError {}

/// Intercept installation failures. Always fatal to bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallError {
    InvalidTarget(String),
    InvalidDetour(String),
    AlreadyHooked(String),
    UnknownPoint(usize),
    DuplicatePoint(String),
    TooManyPoints,
    Backend { hook: String, source: DetourError },
    EnableFailed(DetourError),
}

impl Display for InstallError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTarget(hook) => write!(f, "hook `{hook}` has no resolved target address"),
            Self::InvalidDetour(hook) => write!(f, "hook `{hook}` has no trampoline address"),
            Self::AlreadyHooked(hook) => write!(f, "hook `{hook}` is already installed"),
            Self::UnknownPoint(index) => write!(f, "intercept point #{index} is not declared"),
            Self::DuplicatePoint(hook) => write!(f, "intercept point `{hook}` is declared twice"),
            Self::TooManyPoints => write!(f, "intercept table is full"),
            Self::Backend { hook, source } => {
                write!(f, "failed to install hook `{hook}`: {source}")
            }
            Self::EnableFailed(source) => write!(f, "failed to enable queued hooks: {source}"),
        }
    }
}

impl Error for InstallError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Backend { source, .. } | Self::EnableFailed(source) => Some(source),
            _ => None,
        }
    }
}

/// Creates the detour for `point` and fills its call-through slot.
///
/// The detour stays disabled until [`DetourBackend::apply_queued`].
pub fn install(point: &InterceptPoint, backend: &mut dyn DetourBackend) -> Result<(), InstallError> {
    if point.target() == 0 {
        return Err(InstallError::InvalidTarget(point.name().to_string()));
    }
    if point.detour() == 0 {
        return Err(InstallError::InvalidDetour(point.name().to_string()));
    }
    if point.is_installed() {
        return Err(InstallError::AlreadyHooked(point.name().to_string()));
    }

    let call_through =
        backend
            .create(point.target(), point.detour())
            .map_err(|source| InstallError::Backend {
                hook: point.name().to_string(),
                source,
            })?;
    point.set_call_through(call_through)?;
    info!(
        "event=hook_queued module=engine hook={} target={:#x} detour={:#x}",
        point.name(),
        point.target(),
        point.detour()
    );
    Ok(())
}

/// A created redirection that a batch can switch on and off.
pub(crate) trait Patch {
    fn enable(&self) -> Result<(), DetourError>;
    fn disable(&self) -> Result<(), DetourError>;
}

/// Enables `batch` in order.
///
/// When member `k` fails, members `0..k` are disabled again in reverse order
/// and the enable error is returned.
pub(crate) fn enable_batch<P: Patch>(batch: &[P]) -> Result<(), DetourError> {
    for (index, patch) in batch.iter().enumerate() {
        if let Err(err) = patch.enable() {
            warn!("event=hook_enable module=engine status=error batch_index={index} error={err}");
            for enabled in batch[..index].iter().rev() {
                if let Err(err) = enabled.disable() {
                    error!("event=hook_rollback module=engine status=error error={err}");
                }
            }
            return Err(err);
        }
    }
    Ok(())
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
pub use self::retour_backend::RetourBackend;

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
mod retour_backend {
    use super::{enable_batch, DetourBackend, DetourError, Patch};
    use retour::RawDetour;
    use std::collections::BTreeSet;

    struct OwnedDetour(RawDetour);

    // SAFETY: detours are only created, enabled and disabled while the owning
    // backend is borrowed mutably; the patched code is never freed.
    unsafe impl Send for OwnedDetour {}

    impl Patch for OwnedDetour {
        fn enable(&self) -> Result<(), DetourError> {
            // SAFETY: the call-through slot for this detour was populated
            // before the batch is applied.
            unsafe { self.0.enable() }.map_err(|err| DetourError::Patch(err.to_string()))
        }

        fn disable(&self) -> Result<(), DetourError> {
            // SAFETY: the target is still mapped; disabling restores the
            // original bytes.
            unsafe { self.0.disable() }.map_err(|err| DetourError::Patch(err.to_string()))
        }
    }

    /// Inline-patching backend built on `retour::RawDetour`.
    ///
    /// Detours are kept alive for the backend's lifetime; dropping the backend
    /// restores the original code.
    #[derive(Default)]
    pub struct RetourBackend {
        detours: Vec<OwnedDetour>,
        targets: BTreeSet<usize>,
        applied: usize,
    }

    impl RetourBackend {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl DetourBackend for RetourBackend {
        fn create(&mut self, target: usize, detour: usize) -> Result<usize, DetourError> {
            if target == 0 || detour == 0 {
                return Err(DetourError::InvalidAddress(target));
            }
            if self.targets.contains(&target) {
                return Err(DetourError::AlreadyHooked(target));
            }

            // SAFETY: `target` is a resolved function entry supplied by the
            // host addressing table and `detour` is an `extern` trampoline
            // with the same signature.
            let raw = unsafe { RawDetour::new(target as *const (), detour as *const ()) }
                .map_err(|err| DetourError::Patch(err.to_string()))?;
            let call_through = raw.trampoline() as *const () as usize;
            self.detours.push(OwnedDetour(raw));
            self.targets.insert(target);
            Ok(call_through)
        }

        fn apply_queued(&mut self) -> Result<(), DetourError> {
            enable_batch(&self.detours[self.applied..])?;
            self.applied = self.detours.len();
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::RetourBackend;
        use crate::hook::backend::{DetourBackend, DetourError};
        use std::hint::black_box;

        #[inline(never)]
        extern "C" fn patch_target(value: u32) -> u32 {
            let mut acc = black_box(value);
            for step in 0..black_box(8_u32) {
                acc = black_box(acc.rotate_left(3) ^ step);
            }
            acc
        }

        #[inline(never)]
        extern "C" fn patch_detour(value: u32) -> u32 {
            black_box(value).wrapping_add(1)
        }

        fn addresses() -> (usize, usize) {
            let target = black_box(patch_target as extern "C" fn(u32) -> u32) as usize;
            let detour = black_box(patch_detour as extern "C" fn(u32) -> u32) as usize;
            (target, detour)
        }

        #[test]
        fn null_addresses_are_not_patchable() {
            let mut backend = RetourBackend::new();
            let (target, _) = addresses();
            assert_eq!(
                backend.create(0, 0x1000).expect_err("null target"),
                DetourError::InvalidAddress(0)
            );
            assert_eq!(
                backend.create(target, 0).expect_err("null detour"),
                DetourError::InvalidAddress(target)
            );
        }

        #[test]
        fn second_detour_on_one_target_is_rejected() {
            let mut backend = RetourBackend::new();
            let (target, detour) = addresses();
            let call_through = backend.create(target, detour).expect("first detour");
            assert_ne!(call_through, 0);
            assert_eq!(
                backend.create(target, detour).expect_err("duplicate target"),
                DetourError::AlreadyHooked(target)
            );
        }
    }
}
