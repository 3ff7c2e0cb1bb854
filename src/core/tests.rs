#[cfg(test)]
mod property_tests {
    use crate::core::firewall::{Action, FirewallRule, InstanceFirewallRules, Protocol};
    use crate::core::merge::{access_set, expand, merge, remote_access_set};
    use proptest::prelude::*;
    use strum::IntoEnumIterator;

    fn arb_protocol() -> impl Strategy<Value = Protocol> {
        proptest::sample::select(Protocol::iter().collect::<Vec<_>>())
    }

    prop_compose! {
        // Small value pools so that merge candidates actually collide
        fn arb_rule()(
            protocols in proptest::collection::vec(arb_protocol(), 1..3),
            port in prop_oneof![Just("ALL"), Just("22"), Just("80"), Just("3000-4000")],
            cidr_block in proptest::option::of(prop_oneof![Just("0.0.0.0/0"), Just("10.0.0.0/8")]),
            action in prop_oneof![Just(Action::Accept), Just(Action::Drop)],
            description in proptest::option::of("[a-z]{1,6}"),
        ) -> FirewallRule {
            FirewallRule {
                protocols,
                port: port.to_string(),
                cidr_block: cidr_block.map(str::to_string),
                action,
                description,
            }
        }
    }

    proptest! {
        #[test]
        fn test_merge_is_idempotent(rules in proptest::collection::vec(arb_rule(), 0..24)) {
            let once = merge(&rules);
            let twice = merge(&once);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn test_merge_then_expand_preserves_access_tuples(
            rules in proptest::collection::vec(arb_rule(), 0..24)
        ) {
            let before = access_set(&rules);
            let after = remote_access_set(&expand(&merge(&rules)));
            prop_assert_eq!(before, after);
        }

        #[test]
        fn test_merge_leaves_no_mergeable_pair(rules in proptest::collection::vec(arb_rule(), 0..24)) {
            let merged = merge(&rules);
            for (i, a) in merged.iter().enumerate() {
                for b in merged.iter().skip(i + 1) {
                    prop_assert!(!a.shares_target(b));
                }
            }
        }

        #[test]
        fn test_merge_keeps_protocol_count(rules in proptest::collection::vec(arb_rule(), 0..24)) {
            let before: usize = rules.iter().map(|r| r.protocols.len()).sum();
            prop_assert_eq!(expand(&merge(&rules)).len(), before);
        }

        #[test]
        fn test_artifact_text_roundtrip(rules in proptest::collection::vec(arb_rule(), 0..12)) {
            let set = InstanceFirewallRules::new("lhins-prop", merge(&rules));
            let text = set.to_pretty_json().unwrap();
            let parsed = InstanceFirewallRules::from_json(&text).unwrap();
            prop_assert_eq!(parsed, set);
        }
    }
}
