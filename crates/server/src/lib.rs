//! HTTP control surface for the remediation engine, plus the configuration
//! read by the `remedy-server` daemon.

pub mod api;
pub mod config;
pub mod error;
