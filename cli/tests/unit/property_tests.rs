//! Property-based tests for validation and wire formatting.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use proptest::prelude::*;

use rediacc_cli::domain::api::{endpoint_url, hash_password};
use rediacc_cli::domain::config::{
    RediaccConfig, VALID_CONFIG_KEYS, validate_config_key, validate_config_value,
};
use rediacc_cli::domain::ssh::KnownHostsEntry;

// ============================================================================
// Config whitelist
// ============================================================================

proptest! {
    /// Keys outside the whitelist are rejected, and `set` refuses them too.
    #[test]
    fn prop_unknown_keys_rejected(key in "[a-z]{1,12}\\.[a-z_]{1,16}") {
        prop_assume!(!VALID_CONFIG_KEYS.contains(&key.as_str()));
        prop_assert!(validate_config_key(&key).is_err());
        prop_assert!(RediaccConfig::default().set(&key, "1").is_err());
    }

    /// Every whole number of seconds in range round-trips through `get`.
    #[test]
    fn prop_seconds_keys_accept_positive_integers(secs in 1u64..86_400) {
        let mut config = RediaccConfig::default();
        config.set("queue.poll_interval_secs", &secs.to_string()).unwrap();
        prop_assert_eq!(config.get("queue.poll_interval_secs").unwrap(), secs.to_string());
    }

    /// Non-numeric uids are rejected.
    #[test]
    fn prop_uid_must_be_numeric(value in "[a-z]{1,8}") {
        prop_assert!(validate_config_value("universal_user.id", &value).is_err());
    }
}

// ============================================================================
// Wire helpers
// ============================================================================

proptest! {
    /// The URL always carries exactly one `/api/StoredProcedure/` segment.
    #[test]
    fn prop_endpoint_url_has_single_api_segment(
        host in "[a-z]{1,10}",
        with_api in any::<bool>(),
        trailing in any::<bool>(),
        endpoint in "[A-Z][A-Za-z]{1,20}",
    ) {
        let mut base = format!("https://{host}.test");
        if with_api {
            base.push_str("/api");
        }
        if trailing {
            base.push('/');
        }
        let url = endpoint_url(&base, &endpoint);
        prop_assert_eq!(url.matches("/api/").count(), 1);
        let suffix = format!("/api/StoredProcedure/{endpoint}");
        prop_assert!(url.ends_with(&suffix));
    }

    /// Password hashes are `0x` plus 64 lowercase hex digits.
    #[test]
    fn prop_password_hash_shape(password in ".{0,40}") {
        let hash = hash_password(&password);
        prop_assert!(hash.starts_with("0x"));
        prop_assert_eq!(hash.len(), 66);
        prop_assert!(hash[2..].chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}

// ============================================================================
// Known-hosts alias augmentation
// ============================================================================

proptest! {
    /// Adding aliases never duplicates a host and keeps the original first.
    #[test]
    fn prop_aliases_are_deduplicated(
        aliases in proptest::collection::vec("[a-z0-9.-]{1,12}", 0..6),
    ) {
        let mut entry = KnownHostsEntry::parse("10.0.0.1 ssh-ed25519 AAAAC3Nz").unwrap();
        entry.add_aliases(aliases.iter().map(String::as_str));
        entry.add_aliases(aliases.iter().map(String::as_str));

        prop_assert_eq!(entry.hosts[0].as_str(), "10.0.0.1");
        let mut unique = entry.hosts.clone();
        unique.sort();
        unique.dedup();
        prop_assert_eq!(unique.len(), entry.hosts.len());
        for alias in &aliases {
            prop_assert!(entry.hosts.contains(alias));
        }
    }
}
