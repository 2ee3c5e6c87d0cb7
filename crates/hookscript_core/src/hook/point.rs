//! Intercept point declarations.
//!
//! # Invariants
//! - Points live in an arena and are addressed by stable `HookId`s.
//! - Names are unique within one table.
//! - The call-through slot is written at most once, before enabling.

use crate::hook::backend::InstallError;
use once_cell::sync::OnceCell;

/// Stable small-integer handle into an [`InterceptTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookId(u16);

impl HookId {
    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

/// How handler results combine into the value returned to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultPolicy {
    /// Each handler receives the running result and replaces it.
    Fold,
    /// Handlers run for side effects; the original result is returned.
    Notify,
}

/// One host function eligible for interception.
#[derive(Debug)]
pub struct InterceptPoint {
    name: String,
    target: usize,
    detour: usize,
    policy: ResultPolicy,
    call_through: OnceCell<usize>,
}

impl InterceptPoint {
    /// `target` is the resolved original entry, `detour` the trampoline.
    pub fn new(name: impl Into<String>, target: usize, detour: usize, policy: ResultPolicy) -> Self {
        Self {
            name: name.into(),
            target,
            detour,
            policy,
            call_through: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> usize {
        self.target
    }

    pub fn detour(&self) -> usize {
        self.detour
    }

    pub fn policy(&self) -> ResultPolicy {
        self.policy
    }

    /// Address that still reaches the original function, once installed.
    pub fn call_through(&self) -> Option<usize> {
        self.call_through.get().copied()
    }

    pub fn is_installed(&self) -> bool {
        self.call_through.get().is_some()
    }

    pub(crate) fn set_call_through(&self, address: usize) -> Result<(), InstallError> {
        self.call_through
            .set(address)
            .map_err(|_| InstallError::AlreadyHooked(self.name.clone()))
    }
}

/// Arena of intercept points in declaration order.
#[derive(Debug, Default)]
pub struct InterceptTable {
    points: Vec<InterceptPoint>,
}

impl InterceptTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one point and returns its id.
    ///
    /// # Errors
    /// - `InstallError::DuplicatePoint` when the name is already declared.
    pub fn declare(&mut self, point: InterceptPoint) -> Result<HookId, InstallError> {
        if self.find(point.name()).is_some() {
            return Err(InstallError::DuplicatePoint(point.name));
        }
        let index = u16::try_from(self.points.len()).map_err(|_| InstallError::TooManyPoints)?;
        self.points.push(point);
        Ok(HookId(index))
    }

    pub fn get(&self, id: HookId) -> Option<&InterceptPoint> {
        self.points.get(id.index())
    }

    pub fn find(&self, name: &str) -> Option<HookId> {
        self.points
            .iter()
            .position(|point| point.name() == name)
            .and_then(|index| u16::try_from(index).ok())
            .map(HookId)
    }

    /// Point names in declaration order.
    pub fn names(&self) -> Vec<&str> {
        self.points.iter().map(InterceptPoint::name).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HookId, &InterceptPoint)> + '_ {
        self.points
            .iter()
            .enumerate()
            .map(|(index, point)| (HookId(index as u16), point))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
