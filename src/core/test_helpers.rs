//! Shared test utilities for core module tests
//!
//! This module is only compiled in test mode.

use crate::core::firewall::{Action, FirewallRule, Protocol};

/// Creates a single-protocol rule.
pub fn rule(
    protocol: Protocol,
    port: &str,
    cidr_block: Option<&str>,
    action: Action,
    description: Option<&str>,
) -> FirewallRule {
    FirewallRule {
        protocols: vec![protocol],
        port: port.to_string(),
        cidr_block: cidr_block.map(str::to_string),
        action,
        description: description.map(str::to_string),
    }
}
