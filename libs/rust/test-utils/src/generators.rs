//! Shared proptest generators.
//!
//! Role names produced here always satisfy the engine's generic-name rule:
//! word characters at both ends, word characters, dots or dashes between.

use proptest::prelude::*;
use std::time::Duration;

/// Generate role names accepted by the role store.
pub fn role_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z0-9_]",
        "[a-zA-Z0-9_][a-zA-Z0-9_.-]{0,30}[a-zA-Z0-9_]",
    ]
}

/// Generate role names the role store must reject.
pub fn invalid_role_name_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[.-][a-z0-9]{1,10}",
        "[a-z0-9]{1,10}[.-]",
        "[a-z0-9]{1,10}[/ @:][a-z0-9]{1,10}",
    ]
}

/// Generate non-empty passwords.
pub fn password_strategy() -> impl Strategy<Value = String> {
    "[A-Za-z0-9!@#$%^&*]{1,64}"
}

/// Generate registry usernames.
pub fn username_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{2,20}"
}

/// Generate registry base URIs.
pub fn connection_uri_strategy() -> impl Strategy<Value = String> {
    (
        prop_oneof![Just("http"), Just("https")],
        "[a-z][a-z0-9-]{2,15}",
        prop_oneof![Just("com"), Just("org"), Just("internal")],
        prop::option::of(1024u16..65535),
    )
        .prop_map(|(scheme, host, tld, port)| match port {
            Some(port) => format!("{scheme}://{host}.{tld}:{port}"),
            None => format!("{scheme}://{host}.{tld}"),
        })
}

/// Generate upstream token keys (hex, like registry token identifiers).
pub fn token_key_strategy() -> impl Strategy<Value = String> {
    "[a-f0-9]{64}"
}

/// Generate IPv4 CIDR blocks.
pub fn cidr_strategy() -> impl Strategy<Value = String> {
    (any::<[u8; 4]>(), 8u8..=32).prop_map(|(octets, bits)| {
        format!(
            "{}.{}.{}.{}/{}",
            octets[0], octets[1], octets[2], octets[3], bits
        )
    })
}

/// Generate comma-separated CIDR whitelists as stored on a role.
pub fn cidr_whitelist_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(cidr_strategy(), 1..4).prop_map(|cidrs| cidrs.join(","))
}

/// Generate lease TTL values (1 minute to 24 hours).
pub fn ttl_strategy() -> impl Strategy<Value = Duration> {
    (60u64..86400).prop_map(Duration::from_secs)
}
