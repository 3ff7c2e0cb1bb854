//! Firewall rule data structures and the scratch artifact format
//!
//! Two shapes of the same access-control entry live here:
//!
//! - [`RemoteRule`] is what the Lighthouse API speaks: exactly one protocol
//!   per record.
//! - [`FirewallRule`] is what the operator edits: one or more protocols that
//!   share port, CIDR block, action and description.
//!
//! [`crate::core::merge`] converts between the two.
//!
//! # Scratch artifact
//!
//! ```json
//! {
//!     "instanceId": "lhins-abc123",
//!     "rules": [
//!         {
//!             "protocol": ["TCP", "UDP"],
//!             "port": "80",
//!             "cidrBlock": "0.0.0.0/0",
//!             "action": "ACCEPT",
//!             "description": "web"
//!         }
//!     ]
//! }
//! ```
//!
//! `protocol` is always written as an array. A bare string is accepted on
//! read so a hand-written file can use either form.

use crate::core::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol token accepted by the Lighthouse firewall API
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
    strum::AsRefStr,
)]
pub enum Protocol {
    #[serde(rename = "TCP", alias = "tcp")]
    #[strum(serialize = "TCP")]
    Tcp,
    #[serde(rename = "UDP", alias = "udp")]
    #[strum(serialize = "UDP")]
    Udp,
    #[serde(rename = "ICMP", alias = "icmp")]
    #[strum(serialize = "ICMP")]
    Icmp,
    #[serde(rename = "ICMPv6", alias = "icmpv6", alias = "ICMPV6")]
    #[strum(serialize = "ICMPv6")]
    Icmpv6,
    /// Every protocol
    #[serde(rename = "ALL", alias = "all")]
    #[strum(serialize = "ALL")]
    All,
}

#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
pub enum Action {
    #[serde(rename = "ACCEPT", alias = "accept")]
    #[strum(serialize = "ACCEPT")]
    Accept,
    #[serde(rename = "DROP", alias = "drop")]
    #[strum(serialize = "DROP")]
    Drop,
}

/// A single-protocol rule record, the shape the remote authority stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRule {
    pub protocol: Protocol,
    pub port: String,
    pub cidr_block: Option<String>,
    pub action: Action,
    pub description: Option<String>,
}

/// An operator-facing rule, possibly covering several protocols.
///
/// All fields other than `protocols` are shared by every protocol folded
/// into the rule. `port` and `cidr_block` are opaque strings passed through
/// to the API untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FirewallRule {
    #[serde(rename = "protocol", with = "protocol_list")]
    pub protocols: Vec<Protocol>,
    pub port: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FirewallRule {
    /// Whether `other` targets the same traffic with the same verdict, so the
    /// two may be folded into one multi-protocol rule.
    pub fn shares_target(&self, other: &FirewallRule) -> bool {
        self.action == other.action
            && self.port == other.port
            && self.cidr_block == other.cidr_block
    }
}

impl From<RemoteRule> for FirewallRule {
    fn from(rule: RemoteRule) -> Self {
        Self {
            protocols: vec![rule.protocol],
            port: rule.port,
            cidr_block: rule.cidr_block,
            action: rule.action,
            description: rule.description,
        }
    }
}

impl fmt::Display for FirewallRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let protocols = self
            .protocols
            .iter()
            .map(AsRef::<str>::as_ref)
            .collect::<Vec<_>>()
            .join(",");
        write!(
            f,
            "{:<12} {:<16} {:<20} {:<6}",
            protocols,
            self.port,
            self.cidr_block.as_deref().unwrap_or("-"),
            self.action.as_ref()
        )?;
        if let Some(description) = &self.description {
            write!(f, " {description}")?;
        }
        Ok(())
    }
}

/// The full rule set of one instance, as written to and read from the
/// scratch artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceFirewallRules {
    pub instance_id: String,
    #[serde(default)]
    pub rules: Vec<FirewallRule>,
}

impl InstanceFirewallRules {
    pub fn new(instance_id: impl Into<String>, rules: Vec<FirewallRule>) -> Self {
        Self {
            instance_id: instance_id.into(),
            rules,
        }
    }

    /// Renders the rule set as indented, diff-friendly JSON with a trailing newline.
    pub fn to_pretty_json(&self) -> Result<String> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        buf.push(b'\n');
        // serde_json only ever emits UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Serde adapter: writes the protocol list as an array, reads either a
/// single token or a non-empty array.
mod protocol_list {
    use super::Protocol;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(Protocol),
        Many(Vec<Protocol>),
    }

    #[allow(clippy::ptr_arg)]
    pub fn serialize<S: Serializer>(
        protocols: &Vec<Protocol>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        protocols.serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<Protocol>, D::Error> {
        let protocols = match OneOrMany::deserialize(deserializer)? {
            OneOrMany::One(protocol) => vec![protocol],
            OneOrMany::Many(protocols) => protocols,
        };
        if protocols.is_empty() {
            return Err(D::Error::custom("protocol list must not be empty"));
        }
        Ok(protocols)
    }
}
