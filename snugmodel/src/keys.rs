//! Hierarchical entity keys and their portable token encoding.
//!
//! A key is an ordered path of `(kind, identifier)` pairs from root to leaf. The token
//! joins every kind and identifier with [`SEPARATOR`], marks integer identifiers with a
//! leading [`INT_PREFIX`], and encodes the buffer with URL-safe base64 minus its `=`
//! padding. Both control bytes are illegal inside kinds and text identifiers.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE};
use serde::{Serialize, Serializer};

use crate::{
    errors::{ModelError, ModelResult},
    id::generate_key_name,
};

pub const SEPARATOR: u8 = 0x1e;
pub const INT_PREFIX: u8 = 0x1f;

/// True for bytes reserved by the token format.
pub fn is_reserved_byte(byte: u8) -> bool {
    byte == SEPARATOR || byte == INT_PREFIX
}

/// Identifier of one key pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyId {
    Name(String),
    Id(i64),
}

impl KeyId {
    pub fn as_name(&self) -> Option<&str> {
        match self {
            KeyId::Name(name) => Some(name),
            KeyId::Id(_) => None,
        }
    }

    pub fn as_id(&self) -> Option<i64> {
        match self {
            KeyId::Id(id) => Some(*id),
            KeyId::Name(_) => None,
        }
    }
}

impl From<&str> for KeyId {
    fn from(value: &str) -> Self {
        KeyId::Name(value.to_string())
    }
}

impl From<String> for KeyId {
    fn from(value: String) -> Self {
        KeyId::Name(value)
    }
}

impl From<i64> for KeyId {
    fn from(value: i64) -> Self {
        KeyId::Id(value)
    }
}

impl From<i32> for KeyId {
    fn from(value: i32) -> Self {
        KeyId::Id(i64::from(value))
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyId::Name(name) => write!(f, "{name:?}"),
            KeyId::Id(id) => write!(f, "{id}"),
        }
    }
}

/// Encode a pair sequence into a resource id token.
///
/// Fails with `BadArgument` on an empty sequence, an empty part, or a reserved byte.
pub fn encode(pairs: &[(String, KeyId)]) -> ModelResult<String> {
    check_pairs(pairs)?;
    Ok(encode_checked(pairs))
}

fn encode_checked(pairs: &[(String, KeyId)]) -> String {
    let mut buffer = Vec::new();
    for (index, (kind, id)) in pairs.iter().enumerate() {
        if index > 0 {
            buffer.push(SEPARATOR);
        }
        buffer.extend_from_slice(kind.as_bytes());
        buffer.push(SEPARATOR);
        match id {
            KeyId::Name(name) => buffer.extend_from_slice(name.as_bytes()),
            KeyId::Id(id) => {
                buffer.push(INT_PREFIX);
                buffer.extend_from_slice(id.to_string().as_bytes());
            }
        }
    }
    URL_SAFE.encode(&buffer).trim_end_matches('=').to_string()
}

/// Decode a resource id token back into its pair sequence.
pub fn decode(token: &str) -> ModelResult<Vec<(String, KeyId)>> {
    let invalid = || ModelError::invalid_id(token);

    let mut padded = token.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    let buffer = URL_SAFE.decode(padded.as_bytes()).map_err(|_| invalid())?;

    let fragments: Vec<&[u8]> = buffer.split(|byte| *byte == SEPARATOR).collect();
    if fragments.len() % 2 != 0 {
        return Err(invalid());
    }

    let pairs = fragments
        .chunks_exact(2)
        .map(|chunk| {
            let kind = std::str::from_utf8(chunk[0]).map_err(|_| invalid())?;
            let id = match chunk[1].split_first() {
                Some((&INT_PREFIX, digits)) => {
                    let digits = std::str::from_utf8(digits).map_err(|_| invalid())?;
                    KeyId::Id(digits.parse().map_err(|_| invalid())?)
                }
                _ => KeyId::Name(std::str::from_utf8(chunk[1]).map_err(|_| invalid())?.to_string()),
            };
            Ok((kind.to_string(), id))
        })
        .collect::<ModelResult<Vec<_>>>()?;
    check_pairs(&pairs).map_err(|_| invalid())?;
    Ok(pairs)
}

/// A validated, non-empty key path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key {
    pairs: Vec<(String, KeyId)>,
}

impl Key {
    pub fn new<I, K, V>(pairs: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<KeyId>,
    {
        let pairs: Vec<(String, KeyId)> = pairs.into_iter().map(|(kind, id)| (kind.into(), id.into())).collect();
        check_pairs(&pairs)?;
        Ok(Self { pairs })
    }

    pub fn root(kind: impl Into<String>, id: impl Into<KeyId>) -> ModelResult<Self> {
        Self::new([(kind.into(), id.into())])
    }

    /// Key of a fresh child of `parent` (or a fresh root) with a generated text id.
    pub fn generated(kind: impl Into<String>, parent: Option<&Key>) -> ModelResult<Self> {
        let id = KeyId::Name(generate_key_name());
        match parent {
            Some(parent) => parent.child(kind, id),
            None => Self::root(kind, id),
        }
    }

    pub fn child(&self, kind: impl Into<String>, id: impl Into<KeyId>) -> ModelResult<Self> {
        let mut pairs = self.pairs.clone();
        pairs.push((kind.into(), id.into()));
        Self::new(pairs)
    }

    pub fn parent(&self) -> Option<Key> {
        (self.pairs.len() > 1).then(|| Key {
            pairs: self.pairs[..self.pairs.len() - 1].to_vec(),
        })
    }

    /// Leaf kind.
    pub fn kind(&self) -> &str {
        self.leaf().0.as_str()
    }

    /// Leaf identifier.
    pub fn id(&self) -> &KeyId {
        &self.leaf().1
    }

    pub fn pairs(&self) -> &[(String, KeyId)] {
        &self.pairs
    }

    fn leaf(&self) -> &(String, KeyId) {
        // `new` rejects empty paths
        &self.pairs[self.pairs.len() - 1]
    }

    pub fn to_resource_id(&self) -> String {
        encode_checked(&self.pairs)
    }

    pub fn from_resource_id(token: &str) -> ModelResult<Self> {
        decode(token).map(|pairs| Self { pairs })
    }

    /// Decode a token whose leaf kind must be `kind`.
    pub fn from_resource_id_of_kind(kind: &str, token: &str) -> ModelResult<Self> {
        let key = Self::from_resource_id(token)?;
        if key.kind() != kind {
            return Err(ModelError::invalid_id(token));
        }
        Ok(key)
    }
}

fn check_pairs(pairs: &[(String, KeyId)]) -> ModelResult<()> {
    if pairs.is_empty() {
        return Err(ModelError::bad_argument("a key needs at least one (kind, id) pair"));
    }
    for (kind, id) in pairs {
        check_part("kind", kind)?;
        if let KeyId::Name(name) = id {
            check_part("identifier", name)?;
        }
    }
    Ok(())
}

fn check_part(label: &str, part: &str) -> ModelResult<()> {
    if part.is_empty() {
        return Err(ModelError::bad_argument(format!("key {label} cannot be empty")));
    }
    if part.bytes().any(is_reserved_byte) {
        return Err(ModelError::bad_argument(format!(
            "key {label} {part:?} contains a reserved control byte"
        )));
    }
    Ok(())
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Key(")?;
        for (index, (kind, id)) in self.pairs.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{kind}, {id}")?;
        }
        f.write_str(")")
    }
}

impl Serialize for Key {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_resource_id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_mixed_identifiers() {
        let key = Key::new([("Parent", KeyId::from("abc")), ("Child", KeyId::from(123))]).unwrap();
        let token = key.to_resource_id();
        assert!(!token.contains('='));
        let decoded = Key::from_resource_id(&token).unwrap();
        assert_eq!(decoded, key);
        assert_eq!(decoded.id(), &KeyId::Id(123));
    }

    #[test]
    fn layout_uses_reserved_bytes() {
        let token = encode(&[("A".to_string(), KeyId::Id(7))]).unwrap();
        let raw = URL_SAFE.decode(format!("{token}=")).unwrap();
        assert_eq!(raw, [b'A', SEPARATOR, INT_PREFIX, b'7']);
    }

    #[test]
    fn numeric_text_stays_text() {
        let key = Key::root("Item", "42").unwrap();
        let decoded = Key::from_resource_id(&key.to_resource_id()).unwrap();
        assert_eq!(decoded.id(), &KeyId::Name("42".into()));
    }

    #[test]
    fn rejects_malformed_tokens() {
        for token in ["", "!!!!", "a", "QQ"] {
            let err = Key::from_resource_id(token).unwrap_err();
            assert!(matches!(err, ModelError::InvalidId { .. }), "{token}: {err}");
        }
    }

    #[test]
    fn rejects_reserved_bytes_in_parts() {
        assert!(Key::root("Kind\u{1e}", "x").is_err());
        assert!(Key::root("Kind", "\u{1f}5").is_err());
        assert!(Key::root("", "x").is_err());
        assert!(Key::new(Vec::<(String, KeyId)>::new()).is_err());
    }

    #[test]
    fn kind_checked_decode() {
        let token = Key::root("User", 1).unwrap().to_resource_id();
        assert!(Key::from_resource_id_of_kind("User", &token).is_ok());
        let err = Key::from_resource_id_of_kind("Post", &token).unwrap_err();
        assert!(matches!(err, ModelError::InvalidId { .. }));
    }

    #[test]
    fn parent_and_child() {
        let root = Key::root("Org", "acme").unwrap();
        let child = root.child("Team", 5).unwrap();
        assert_eq!(child.parent(), Some(root.clone()));
        assert_eq!(root.parent(), None);
        assert_eq!(child.kind(), "Team");

        let generated = Key::generated("Team", Some(&root)).unwrap();
        assert_eq!(generated.parent(), Some(root));
        assert!(generated.id().as_name().is_some());
    }
}
