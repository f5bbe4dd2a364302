//! Tests for components/recovery.rs

use std::collections::HashMap;

use native_push::components::PushError;
use native_push::components::recovery::*;
use url::Url;

fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

#[test]
fn test_encode_is_canonical_base64url() {
    let token = encode(&map(&[("a", "b")])).unwrap();
    assert_eq!(token.as_str(), "eyJhIjoiYiJ9");

    let forward = encode(&map(&[("x", "1"), ("y", "2"), ("z", "3")])).unwrap();
    let backward = encode(&map(&[("z", "3"), ("y", "2"), ("x", "1")])).unwrap();
    assert_eq!(forward, backward);
}

#[test]
fn test_decode_restores_map() {
    let data = map(&[("chat", "42"), ("text", "héllo / wörld?&#"), ("empty", "")]);
    let token = encode(&data).unwrap();

    assert!(!token.as_str().contains(['+', '/', '=']));
    assert_eq!(decode(&token).unwrap(), data);
}

#[test]
fn test_decode_accepts_padding() {
    let padded = RecoveryToken::from_string("eyJhIjoiYiJ9==");
    assert_eq!(decode(&padded).unwrap(), map(&[("a", "b")]));

    // {"ab":"c"} needs padding in standard base64
    let padded = RecoveryToken::from_string("eyJhYiI6ImMifQ==");
    assert_eq!(decode(&padded).unwrap(), map(&[("ab", "c")]));
}

#[test]
fn test_decode_rejects_corruption_as_malformed() {
    let corrupted = [
        "eyJhIjoiYiJ9!",   // not base64url
        "eyJhIjoiYiJ",     // truncated
        "e",               // impossible length
        "WzEsMl0",         // [1,2]
        "Im5vdCBhbiBvYmplY3Qi", // a JSON string
        "bm90IGpzb24",     // not JSON
    ];
    for text in corrupted {
        let result = decode(&RecoveryToken::from_string(text));
        assert!(
            matches!(result, Err(PushError::MalformedToken { .. })),
            "{text} should be malformed, got {result:?}"
        );
    }
}

#[test]
fn test_recovery_url_round_trip_strips_fragment() {
    let base = Url::parse("https://app.example/").unwrap();
    let token = encode(&map(&[("a", "b")])).unwrap();

    let url = recovery_url(&base, &token);
    assert_eq!(url.as_str(), "https://app.example/#eyJhIjoiYiJ9");

    let (stripped, taken) = take_from_url(&url);
    assert_eq!(stripped, base);
    assert_eq!(taken, Some(token));

    let (unchanged, none) = take_from_url(&base);
    assert_eq!(unchanged, base);
    assert_eq!(none, None);
}

#[test]
fn test_inbox_hands_out_payload_once() {
    let inbox = RecoveryInbox::new();
    assert!(inbox.offer(&encode(&map(&[("a", "b")])).unwrap()));
    assert!(inbox.has_pending());

    assert_eq!(inbox.take(), Some(map(&[("a", "b")])));
    assert_eq!(inbox.take(), None);
    assert!(!inbox.has_pending());
}

#[test]
fn test_inbox_accepts_first_offer_only() {
    let inbox = RecoveryInbox::new();
    assert!(inbox.offer(&encode(&map(&[("first", "1")])).unwrap()));
    assert!(!inbox.offer(&encode(&map(&[("second", "2")])).unwrap()));
    assert!(!inbox.offer_payload(map(&[("third", "3")])));

    assert_eq!(inbox.take(), Some(map(&[("first", "1")])));
    // A consumed session never takes a new payload
    assert!(!inbox.offer_payload(map(&[("late", "1")])));
    assert_eq!(inbox.take(), None);
}

#[test]
fn test_inbox_discards_malformed_token() {
    let inbox = RecoveryInbox::new();
    assert!(!inbox.offer(&RecoveryToken::from_string("%%%")));
    assert!(!inbox.has_pending());

    // The slot is still open for the launching notification
    assert!(inbox.offer_payload(map(&[("a", "b")])));
    assert_eq!(inbox.take(), Some(map(&[("a", "b")])));
}

#[test]
fn test_hash_route_is_not_a_recovery_token() {
    let inbox = RecoveryInbox::new();
    let url = Url::parse("https://app.example/#/settings").unwrap();

    assert_eq!(take_from_url(&url), (url.clone(), None));
    let shown = inbox.offer_url(&url);

    assert_eq!(shown.as_str(), "https://app.example/#/settings");
    assert!(!inbox.has_pending());
    assert!(inbox.offer_payload(map(&[("a", "b")])));
    assert_eq!(inbox.take(), Some(map(&[("a", "b")])));
}

#[test]
fn test_inbox_offer_url_returns_clean_url() {
    let inbox = RecoveryInbox::new();
    let url = Url::parse("https://app.example/inbox?tab=1#eyJhIjoiYiJ9").unwrap();

    let clean = inbox.offer_url(&url);

    assert_eq!(clean.as_str(), "https://app.example/inbox?tab=1");
    assert_eq!(inbox.take(), Some(map(&[("a", "b")])));
}

#[test]
fn test_launch_extras_without_data_extra_drop_transport_keys() {
    let extras = serde_json::json!({
        "chat": "42",
        "from": "1234",
        "collapse_key": "c",
        "google.sent_time": 1700000000,
        "gcm.n.e": "1",
        "title": "Hi",
    });
    let serde_json::Value::Object(extras) = extras else {
        unreachable!("literal is an object");
    };

    assert_eq!(initial_from_extras(&extras), map(&[("chat", "42")]));
}

#[test]
fn test_launch_data_extra_wins_over_other_extras() {
    let extras = serde_json::json!({
        INITIAL_DATA_EXTRA: r#"{"chat": "42", "unread": 2}"#,
        "profile": "ignored",
    });
    let serde_json::Value::Object(extras) = extras else {
        unreachable!("literal is an object");
    };

    assert_eq!(initial_from_extras(&extras), map(&[("chat", "42"), ("unread", "2")]));

    let mut broken = extras.clone();
    broken.insert(INITIAL_DATA_EXTRA.to_string(), "not json".into());
    assert!(initial_from_extras(&broken).is_empty());
}
