//! Core firewall rule functionality
//!
//! - [`firewall`]: Rule data structures and the scratch artifact format
//! - [`merge`]: Folding single-protocol rules into multi-protocol rules and back
//! - [`error`]: Error types for all lhfw operations

pub mod error;
pub mod firewall;
pub mod merge;

#[cfg(test)]
pub mod test_helpers;

#[cfg(test)]
mod tests;
