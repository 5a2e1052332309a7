//! Stock field validators.
//!
//! Every validator here is idempotent: feeding its output back in returns it unchanged.

use email_address::EmailAddress;
use regex::Regex;
use url::Url;
use uuid::Uuid;

use crate::{
    errors::{ModelError, ModelResult},
    field::Validator,
    value::Value,
};

/// Returns `true` if the provided string is a syntactically valid email address.
pub fn is_valid_email(value: &str) -> bool {
    EmailAddress::is_valid(value)
}

/// Returns `true` if the provided string parses as a URL with a scheme.
pub fn is_valid_url(value: &str) -> bool {
    Url::parse(value).is_ok()
}

/// Returns `true` if the provided string parses as a UUID.
pub fn is_valid_uuid(value: &str) -> bool {
    Uuid::parse_str(value).is_ok()
}

fn text_check(label: &'static str, check: fn(&str) -> bool) -> Validator {
    Validator::new(label, move |field, value| match value.as_str() {
        Some(text) if check(text) => Ok(None),
        Some(text) => Err(ModelError::bad_value(field.label(), format!("{text:?} is not a valid {label}"))),
        None => Err(ModelError::bad_value(field.label(), format!("{label} validator needs text"))),
    })
}

pub fn email() -> Validator {
    text_check("email", is_valid_email)
}

pub fn url() -> Validator {
    text_check("url", is_valid_url)
}

pub fn uuid() -> Validator {
    text_check("uuid", is_valid_uuid)
}

/// Text must match `pattern` in full.
pub fn pattern(pattern: &str) -> ModelResult<Validator> {
    let regex = Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|err| ModelError::config(format!("invalid validator pattern {pattern:?}: {err}")))?;
    Ok(Validator::new(format!("pattern({pattern})"), move |field, value| {
        match value.as_str() {
            Some(text) if regex.is_match(text) => Ok(None),
            Some(text) => Err(ModelError::bad_value(
                field.label(),
                format!("{text:?} does not match {}", regex.as_str()),
            )),
            None => Err(ModelError::bad_value(field.label(), "pattern validator needs text")),
        }
    }))
}

pub fn lowercase() -> Validator {
    Validator::new("lowercase", |_, value| {
        Ok(value.as_str().map(|text| Value::from(text.to_lowercase())))
    })
}

pub fn strip() -> Validator {
    Validator::new("strip", |_, value| Ok(value.as_str().map(|text| Value::from(text.trim()))))
}

/// Stock validator by name, as referenced from schema files.
pub fn by_name(name: &str) -> ModelResult<Validator> {
    match name {
        "email" => Ok(email()),
        "url" => Ok(url()),
        "uuid" => Ok(uuid()),
        "lowercase" => Ok(lowercase()),
        "strip" => Ok(strip()),
        other => Err(ModelError::config(format!("unknown validator {other:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldDef;

    #[test]
    fn email_validation() {
        assert!(is_valid_email("test@example.com"));
        assert!(!is_valid_email("invalid"));
    }

    #[test]
    fn url_validation() {
        assert!(is_valid_url("https://example.com"));
        assert!(!is_valid_url("not-a-url"));
    }

    #[test]
    fn uuid_validation() {
        assert!(is_valid_uuid("550e8400-e29b-41d4-a716-446655440000"));
        assert!(!is_valid_uuid("not-a-uuid"));
    }

    #[test]
    fn email_validator_rejects_bad_addresses() {
        let field = FieldDef::string().name("mail").validator(email()).build().unwrap();
        assert!(field.do_validate(Value::from("a@b.io")).is_ok());
        let err = field.do_validate(Value::from("nope")).unwrap_err();
        assert!(matches!(err, ModelError::BadValue { .. }));
    }

    #[test]
    fn pattern_matches_whole_value() {
        let field = FieldDef::string().validator(pattern("[a-z]+").unwrap()).build().unwrap();
        assert!(field.do_validate(Value::from("abc")).is_ok());
        assert!(field.do_validate(Value::from("abc1")).is_err());
        assert!(pattern("(").is_err());
    }

    #[test]
    fn transforming_validators_are_idempotent() {
        let field = FieldDef::string().validator(strip()).build().unwrap();
        let once = field.do_validate(Value::from("  hi ")).unwrap();
        assert_eq!(once, Value::from("hi"));
        assert_eq!(field.do_validate(once.clone()).unwrap(), once);

        let field = FieldDef::string().validator(lowercase()).build().unwrap();
        assert_eq!(field.do_validate(Value::from("MiXeD")).unwrap(), Value::from("mixed"));
    }

    #[test]
    fn looks_up_by_name() {
        assert_eq!(by_name("email").unwrap().label(), "email");
        assert!(by_name("shout").is_err());
    }
}
