use proptest::prelude::*;
use snugmodel::{
    Key, KeyId, ModelError,
    keys::{self, INT_PREFIX, SEPARATOR},
};

#[test]
fn parent_child_scenario_round_trips() {
    let pairs = vec![
        ("Parent".to_string(), KeyId::Name("abc".into())),
        ("Child".to_string(), KeyId::Id(123)),
    ];
    let token = keys::encode(&pairs).unwrap();
    assert_eq!(token, "UGFyZW50HmFiYx5DaGlsZB4fMTIz");
    assert_eq!(keys::decode(&token).unwrap(), pairs);
}

#[test]
fn tokens_are_url_safe_and_unpadded() {
    let key = Key::new([("Kind", KeyId::from("??>>")), ("K", KeyId::from(-5))]).unwrap();
    let token = key.to_resource_id();
    assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    assert_eq!(Key::from_resource_id(&token).unwrap(), key);
}

#[test]
fn padded_tokens_are_still_accepted() {
    let token = Key::root("A", "b").unwrap().to_resource_id();
    let mut padded = token.clone();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    assert_eq!(Key::from_resource_id(&padded).unwrap(), Key::from_resource_id(&token).unwrap());
}

#[test]
fn malformed_tokens_raise_invalid_id() {
    // lone kind, bad base64, and a token with trailing garbage
    let dangling = keys::encode(&[("A".into(), KeyId::Name("b".into()))]).unwrap() + "x";
    for token in ["QQ", "a", "%%%", dangling.as_str()] {
        assert!(matches!(
            Key::from_resource_id(token).unwrap_err(),
            ModelError::InvalidId { .. }
        ));
    }

    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    let bad_int = URL_SAFE_NO_PAD.encode([b'A', SEPARATOR, INT_PREFIX, b'x']);
    assert!(matches!(keys::decode(&bad_int).unwrap_err(), ModelError::InvalidId { .. }));
}

#[test]
fn raw_codec_rejects_pairs_that_cannot_round_trip() {
    let marker_led = vec![("A".to_string(), KeyId::Name("\u{1f}12".into()))];
    assert!(matches!(keys::encode(&marker_led).unwrap_err(), ModelError::BadArgument { .. }));
    let split = vec![("A".to_string(), KeyId::Name("b\u{1e}c".into()))];
    assert!(keys::encode(&split).is_err());
    assert!(keys::encode(&[]).is_err());

    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
    let empty_kind = URL_SAFE_NO_PAD.encode([SEPARATOR, b'x']);
    assert!(matches!(keys::decode(&empty_kind).unwrap_err(), ModelError::InvalidId { .. }));
}

fn key_id() -> impl Strategy<Value = KeyId> {
    prop_oneof![
        any::<i64>().prop_map(KeyId::Id),
        // includes the bytes on either side of the reserved pair
        "[\\x1c\\x1d\\x20a-zA-Z0-9:/_é-]{1,12}".prop_map(KeyId::Name),
    ]
}

proptest! {
    #[test]
    fn decode_inverts_encode(
        pairs in prop::collection::vec(("[\\x1d\\x20A-Za-z0-9_]{1,10}", key_id()), 1..5)
    ) {
        let token = keys::encode(&pairs).unwrap();
        prop_assert_eq!(keys::decode(&token).unwrap(), pairs.clone());
        let key = Key::new(pairs).unwrap();
        prop_assert_eq!(Key::from_resource_id(&token).unwrap(), key);
    }
}
