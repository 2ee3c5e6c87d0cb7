//! Extension contexts and their collaborators.
//!
//! This module owns script discovery, the capability surface, the scripting
//! collaborator contracts with their Rhai implementation, and the context
//! registry that keeps every loaded extension alive for the process lifetime.

pub mod capability;
pub mod registry;
pub mod rhai_runtime;
pub mod runtime;
pub mod source;
