//! Process-attach library for the hookscript loader.
//!
//! Loaded into the host process; reads `hookscript.toml`, loads Rhai
//! extensions and redirects the configured game functions to dispatch
//! trampolines.

pub mod api;
pub mod game;
pub mod host;

pub use api::{attach, hookscript_attach, hookscript_version, AttachError, AttachOutcome};
pub use game::{declare_points, game_point_names, game_point_policy};
