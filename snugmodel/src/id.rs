use nanoid::nanoid;

/// Alphabet for generated key names (no ambiguous glyphs).
const KEY_NAME_ALPHABET: &[char] = &[
    'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'J', 'K', 'L', 'M', 'N', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y',
    'Z', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'j', 'm', 'n', 'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];
const KEY_NAME_LENGTH: usize = 20;

/// Generates a fresh text identifier for a key.
pub fn generate_key_name() -> String {
    nanoid!(KEY_NAME_LENGTH, KEY_NAME_ALPHABET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_has_expected_length_and_charset() {
        let name = generate_key_name();
        assert_eq!(name.len(), KEY_NAME_LENGTH);
        assert!(name.chars().all(|c| KEY_NAME_ALPHABET.contains(&c)));
    }

    #[test]
    fn names_differ() {
        assert_ne!(generate_key_name(), generate_key_name());
    }
}
