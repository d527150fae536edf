//! Envelope decode behavior at the transport boundary.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use framewire_core::protocol::envelope::Envelope;
use serde_json::json;

#[test]
fn decodes_tagged_object() {
    let env = Envelope::from_value(json!({
        "name": "status",
        "data": { "loggedIn": true, "verifier": "google" }
    }))
    .expect("must decode");
    assert_eq!(env.name, "status");
    assert_eq!(env.data["verifier"], "google");
}

#[test]
fn non_envelope_objects_are_dropped_not_errors() {
    assert!(Envelope::from_value(json!({"foo": "bar"})).is_none());
    assert!(Envelope::from_value(json!("just a string")).is_none());
    assert!(Envelope::from_value(json!(42)).is_none());
}

#[test]
fn round_trips_through_transport_value() {
    let env = Envelope::new("window", json!({"data": {"preopenInstanceId": "x"}}));
    let v = serde_json::to_value(&env).unwrap();
    assert_eq!(Envelope::from_value(v).unwrap(), env);
}
