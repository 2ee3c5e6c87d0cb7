//! Values exchanged between intercepted host calls and extension handlers.
//!
//! # Responsibility
//! - Define the boundary value shape shared by dispatch and script runtimes.
//!
//! # Invariants
//! - Conversions back into host-native types are fallible and explicit.

pub mod value;
