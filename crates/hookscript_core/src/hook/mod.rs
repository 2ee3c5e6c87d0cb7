//! Interception engine, subscriptions and result dispatch.

pub mod backend;
pub mod dispatch;
pub mod point;
pub mod subscription;
