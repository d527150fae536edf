#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use framewire_core::FramewireError;
use framewire_embed::config;

#[test]
fn deny_unknown_fields() {
    let bad = r#"
wallet_url: "https://wallet.example"
networkz: { chain_id: "0x1" } # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(matches!(err, FramewireError::InvalidConfig(_)));
}

#[test]
fn ok_minimal_config() {
    let ok = r#"
wallet_url: "https://wallet.example"
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.network.chain_id, "0x3");
    assert_eq!(cfg.z_index, 99_999);
    assert!(!cfg.enable_logging);
}

#[test]
fn chain_id_must_be_hex() {
    let bad = r#"
wallet_url: "https://wallet.example"
network: { chain_id: "3" }
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert!(matches!(err, FramewireError::InvalidConfig(_)));
}

#[test]
fn empty_wallet_url_rejected() {
    let bad = r#"
wallet_url: ""
"#;
    assert!(config::load_from_str(bad).is_err());
}
