//! Scripting collaborator contracts.
//!
//! The dispatch core never talks to a concrete script engine. It creates
//! contexts through [`ScriptEngine`] and resolves/invokes handlers through
//! [`ScriptContext`].

use crate::extension::source::SourceUnit;
use crate::model::value::HookValue;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Factory for isolated extension contexts.
pub trait ScriptEngine {
    type Context: ScriptContext;

    /// Builds one context: injects capabilities, then runs top-level code.
    fn create_context(&self, unit: &SourceUnit) -> Result<Self::Context, LoadError>;
}

/// One isolated execution environment.
///
/// Implementations are serialized by the registry guard; `invoke` is never
/// called concurrently on the same context.
pub trait ScriptContext: Send {
    type Handler;

    /// Looks up a handler by exact name in the current namespace.
    fn lookup(&self, name: &str) -> Option<Self::Handler>;

    /// Invokes a handler with positional arguments.
    fn invoke(
        &mut self,
        handler: &Self::Handler,
        args: Vec<HookValue>,
    ) -> Result<HookValue, HandlerError>;
}

/// Context creation failures. Always recovered per source unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    Read { path: PathBuf, message: String },
    Parse { path: PathBuf, message: String },
    Execute { path: PathBuf, message: String },
    DuplicatePath(PathBuf),
}

impl Display for LoadError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read { path, message } => {
                write!(f, "failed to read script `{}`: {message}", path.display())
            }
            Self::Parse { path, message } => {
                write!(f, "failed to parse script `{}`: {message}", path.display())
            }
            Self::Execute { path, message } => {
                write!(f, "failed to execute script `{}`: {message}", path.display())
            }
            Self::DuplicatePath(path) => {
                write!(f, "script context already registered: {}", path.display())
            }
        }
    }
}

impl Error for LoadError {}

/// Handler invocation failures. Always recovered per handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandlerError {
    Runtime(String),
    ResultType {
        expected: &'static str,
        found: &'static str,
    },
    Panicked(String),
}

impl Display for HandlerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Runtime(message) => write!(f, "handler raised: {message}"),
            Self::ResultType { expected, found } => {
                write!(f, "handler returned {found}, expected {expected}")
            }
            Self::Panicked(message) => write!(f, "handler panicked: {message}"),
        }
    }
}

impl Error for HandlerError {}
