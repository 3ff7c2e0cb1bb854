//! Remote authority for an instance's firewall rules
//!
//! The workflow only ever talks to a [`RemoteAuthority`]; the concrete
//! [`lighthouse::LighthouseClient`] is constructed by the caller and passed
//! in, so tests substitute an in-memory double.

pub mod lighthouse;
pub mod signing;

use crate::core::error::Result;
use crate::core::firewall::RemoteRule;
use async_trait::async_trait;

/// Acknowledgement of a successful modify call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ModifyAck {
    pub request_id: String,
}

/// The source of truth for an instance's active firewall rules.
#[async_trait]
pub trait RemoteAuthority: Send + Sync {
    /// Returns every rule currently active on the instance, in API order.
    async fn describe_rules(&self, instance_id: &str) -> Result<Vec<RemoteRule>>;

    /// Replaces the instance's entire rule set with `rules`.
    ///
    /// Full-replace semantics: rules not listed are removed.
    async fn modify_rules(&self, instance_id: &str, rules: &[RemoteRule]) -> Result<ModifyAck>;
}
