//! Folding single-protocol rules into multi-protocol rules and back
//!
//! [`merge`] keeps the edited file compact: the Lighthouse console tends to
//! create one rule per protocol for the same port, and seeing them as one
//! line is what an operator expects. [`expand`] undoes the fold before
//! submission because the API only accepts one protocol per record.
//!
//! The round trip preserves every `(protocol, port, cidr, action)` tuple.
//! Description boundaries are not preserved: once `"web"` and `"dns"` have
//! become `"web; dns"`, every expanded record carries `"web; dns"`. This is
//! a known one-way transform.

use crate::core::firewall::{Action, FirewallRule, Protocol, RemoteRule};
use std::collections::BTreeSet;

/// Separator placed between absorbed descriptions.
pub const DESCRIPTION_SEPARATOR: &str = "; ";

/// Access semantics of one single-protocol rule, ignoring its description.
pub type AccessTuple = (Protocol, String, Option<String>, Action);

/// Merges rules that differ only in protocol (and description).
///
/// Single greedy left-to-right pass: each surviving rule absorbs every later,
/// not yet absorbed rule with the same action, port and CIDR block. Absorbed
/// protocols are appended as-is (duplicates are kept); an absorbed
/// description is appended after `"; "` unless the survivor's description
/// already contains it. Survivors keep their relative order.
///
/// Rule sets are tens of entries, so the quadratic scan is fine.
pub fn merge(rules: &[FirewallRule]) -> Vec<FirewallRule> {
    let mut absorbed = vec![false; rules.len()];
    let mut merged = Vec::with_capacity(rules.len());

    for (i, rule) in rules.iter().enumerate() {
        if absorbed[i] {
            continue;
        }

        let mut survivor = rule.clone();
        for (j, candidate) in rules.iter().enumerate().skip(i + 1) {
            if absorbed[j] || !survivor.shares_target(candidate) {
                continue;
            }
            absorb(&mut survivor, candidate);
            absorbed[j] = true;
        }
        merged.push(survivor);
    }

    merged
}

fn absorb(survivor: &mut FirewallRule, other: &FirewallRule) {
    survivor.protocols.extend_from_slice(&other.protocols);

    let Some(extra) = other.description.as_deref() else {
        return;
    };
    match survivor.description.as_mut() {
        Some(existing) => {
            if !existing.contains(extra) {
                existing.push_str(DESCRIPTION_SEPARATOR);
                existing.push_str(extra);
            }
        }
        None => survivor.description = Some(extra.to_string()),
    }
}

/// Expands each rule into one single-protocol record per listed protocol,
/// copying every other field verbatim.
///
/// The protocol list is not validated: a protocol listed twice yields two
/// identical records, and the remote authority decides what to make of them.
pub fn expand(rules: &[FirewallRule]) -> Vec<RemoteRule> {
    rules
        .iter()
        .flat_map(|rule| {
            rule.protocols.iter().map(move |&protocol| RemoteRule {
                protocol,
                port: rule.port.clone(),
                cidr_block: rule.cidr_block.clone(),
                action: rule.action,
                description: rule.description.clone(),
            })
        })
        .collect()
}

/// The set of access tuples a rule sequence grants or denies.
pub fn access_set(rules: &[FirewallRule]) -> BTreeSet<AccessTuple> {
    rules
        .iter()
        .flat_map(|rule| {
            rule.protocols.iter().map(move |&protocol| {
                (
                    protocol,
                    rule.port.clone(),
                    rule.cidr_block.clone(),
                    rule.action,
                )
            })
        })
        .collect()
}

/// Same as [`access_set`] for records already in remote form.
pub fn remote_access_set(rules: &[RemoteRule]) -> BTreeSet<AccessTuple> {
    rules
        .iter()
        .map(|rule| {
            (
                rule.protocol,
                rule.port.clone(),
                rule.cidr_block.clone(),
                rule.action,
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_helpers::rule;

    #[test]
    fn test_merge_groups_by_port_cidr_action() {
        let a = rule(Protocol::Tcp, "80", Some("0.0.0.0/0"), Action::Accept, Some("web"));
        let b = rule(Protocol::Udp, "80", Some("0.0.0.0/0"), Action::Accept, Some("web"));
        let c = rule(Protocol::Tcp, "22", Some("0.0.0.0/0"), Action::Accept, Some("ssh"));

        let merged = merge(&[a, b, c.clone()]);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].protocols, vec![Protocol::Tcp, Protocol::Udp]);
        assert_eq!(merged[0].port, "80");
        assert_eq!(merged[0].description.as_deref(), Some("web"));
        assert_eq!(merged[1], c);
    }

    #[test]
    fn test_merge_concatenates_distinct_descriptions() {
        let a = rule(Protocol::Tcp, "80", Some("10.0.0.0/8"), Action::Accept, Some("x"));
        let b = rule(Protocol::Udp, "80", Some("10.0.0.0/8"), Action::Accept, Some("y"));

        let merged = merge(&[a, b]);
        assert_eq!(merged[0].description.as_deref(), Some("x; y"));
    }

    #[test]
    fn test_merge_skips_contained_description() {
        let a = rule(Protocol::Tcp, "80", Some("10.0.0.0/8"), Action::Accept, Some("x"));
        let b = rule(Protocol::Udp, "80", Some("10.0.0.0/8"), Action::Accept, Some("x"));

        let merged = merge(&[a, b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].description.as_deref(), Some("x"));
    }

    #[test]
    fn test_merge_substring_description_not_repeated() {
        let a = rule(Protocol::Tcp, "53", None, Action::Accept, Some("public dns"));
        let b = rule(Protocol::Udp, "53", None, Action::Accept, Some("dns"));

        let merged = merge(&[a, b]);
        assert_eq!(merged[0].description.as_deref(), Some("public dns"));
    }

    #[test]
    fn test_merge_absent_description_adopts_absorbed() {
        let a = rule(Protocol::Tcp, "443", None, Action::Accept, None);
        let b = rule(Protocol::Udp, "443", None, Action::Accept, Some("quic"));
        let c = rule(Protocol::Icmp, "443", None, Action::Accept, None);

        let merged = merge(&[a, b, c]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].description.as_deref(), Some("quic"));
        assert_eq!(
            merged[0].protocols,
            vec![Protocol::Tcp, Protocol::Udp, Protocol::Icmp]
        );
    }

    #[test]
    fn test_merge_absent_cidr_only_matches_absent() {
        let a = rule(Protocol::Tcp, "80", None, Action::Accept, None);
        let b = rule(Protocol::Udp, "80", Some("0.0.0.0/0"), Action::Accept, None);
        let c = rule(Protocol::Icmp, "80", None, Action::Accept, None);

        let merged = merge(&[a, b, c]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].protocols, vec![Protocol::Tcp, Protocol::Icmp]);
        assert_eq!(merged[1].cidr_block.as_deref(), Some("0.0.0.0/0"));
    }

    #[test]
    fn test_merge_keeps_different_actions_apart() {
        let a = rule(Protocol::Tcp, "22", None, Action::Accept, None);
        let b = rule(Protocol::Udp, "22", None, Action::Drop, None);

        assert_eq!(merge(&[a, b]).len(), 2);
    }

    #[test]
    fn test_merge_keeps_duplicate_protocols() {
        let a = rule(Protocol::Tcp, "22", None, Action::Accept, None);
        let merged = merge(&[a.clone(), a]);
        assert_eq!(merged[0].protocols, vec![Protocol::Tcp, Protocol::Tcp]);
    }

    #[test]
    fn test_merge_does_not_mutate_input() {
        let input = vec![
            rule(Protocol::Tcp, "80", None, Action::Accept, Some("a")),
            rule(Protocol::Udp, "80", None, Action::Accept, Some("b")),
        ];
        let snapshot = input.clone();
        let _ = merge(&input);
        assert_eq!(input, snapshot);
    }

    #[test]
    fn test_merge_empty() {
        assert!(merge(&[]).is_empty());
    }

    #[test]
    fn test_expand_copies_fields_per_protocol() {
        let mut merged = rule(Protocol::Tcp, "80", Some("0.0.0.0/0"), Action::Accept, Some("web; dns"));
        merged.protocols.push(Protocol::Udp);

        let expanded = expand(&[merged]);
        assert_eq!(expanded.len(), 2);
        assert_eq!(expanded[0].protocol, Protocol::Tcp);
        assert_eq!(expanded[1].protocol, Protocol::Udp);
        for record in &expanded {
            assert_eq!(record.port, "80");
            assert_eq!(record.cidr_block.as_deref(), Some("0.0.0.0/0"));
            assert_eq!(record.description.as_deref(), Some("web; dns"));
        }
    }

    #[test]
    fn test_expand_loses_description_boundaries() {
        let a = rule(Protocol::Tcp, "80", None, Action::Accept, Some("web"));
        let b = rule(Protocol::Udp, "80", None, Action::Accept, Some("dns"));

        let expanded = expand(&merge(&[a, b]));
        assert!(
            expanded
                .iter()
                .all(|r| r.description.as_deref() == Some("web; dns"))
        );
    }
}
