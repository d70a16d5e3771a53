// src/lib.rs

//! Updraft content updater
//!
//! Keeps an install directory at the latest version of an application's
//! content: validates the license, removes the installed version, downloads
//! the new package and installs its files, reporting weighted progress and
//! honoring cooperative cancellation throughout.
//!
//! # Architecture
//!
//! - Registry-first: every installed file is recorded in SQLite with the
//!   version that installed it, written only after the file is in place
//! - Commands: two-phase (prepare, execute) units driven by a strategy
//! - Packages: zip, or pack1 with a companion binary meta file
//! - Progress: weighted operations aggregated into one percentage

pub mod archive;
pub mod cancellation;
pub mod commands;
pub mod content;
pub mod db;
mod error;
pub mod local;
pub mod remote;
pub mod status;
pub mod updater;

pub use cancellation::CancellationToken;
pub use error::{Error, ErrorKind, Result};
