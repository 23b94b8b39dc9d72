//! CodeToast Library
//!
//! An owner-only debugging extension for chat bots.
//!
//! This crate provides:
//! - A declarative command registry that wires nested commands onto a dispatcher
//! - Tracking of in-flight command invocations
//! - Text, wrapped and file-content paginators
//! - A reaction-driven interactive paginator session
//! - The `codetoast` diagnostics, `cat` and `curl` commands

pub mod cog;
pub mod commands;
pub mod config;
pub mod host;
pub mod interface;
pub mod paginator;
pub mod tasks;
