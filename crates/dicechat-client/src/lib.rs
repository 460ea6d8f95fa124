//! Dicechat client library - connection management and chat orchestration.
//!
//! The connection manager, controller, and configuration live here so the
//! integration tests can drive them against a fake server; `main.rs` only
//! adds the terminal shell.

pub mod config;
pub mod connection;
pub mod controller;
pub mod logging;
