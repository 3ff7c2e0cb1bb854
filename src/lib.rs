//! lhfw - Lighthouse firewall editor
//!
//! Fetches a Lighthouse instance's firewall rules, folds protocol variants of
//! the same rule into one entry, hands the result to an editor and replaces
//! the remote rule set with the edited file once the operator confirms.
//!
//! # Architecture
//!
//! - [`core`] - Rule model, merge/expand, error types
//! - [`gateway`] - Remote authority trait and the Lighthouse API client
//! - [`workflow`] - Fetch → merge → edit → confirm → apply state machine
//! - [`editor`] - External editor and confirmation prompt
//! - [`probe`] - Concurrent public IP discovery
//! - [`config`] - Credential and instance id resolution
//! - [`utils`] - Utility functions (XDG directories, duration rounding)
//!
//! # Safety Features
//!
//! - Nothing is submitted without an explicit `yes`
//! - Apply always re-reads the artifact from disk
//! - The artifact survives abort, editor failure and remote errors
//! - Cached credentials are written atomically with 0600 permissions

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::missing_errors_doc)]

pub mod config;
pub mod core;
pub mod editor;
pub mod gateway;
pub mod probe;
pub mod utils;
pub mod workflow;

// Re-export commonly used types
pub use core::error::{Error, Result};
pub use core::firewall::{Action, FirewallRule, InstanceFirewallRules, Protocol, RemoteRule};
pub use gateway::RemoteAuthority;
