//! Composite identifiers
//!
//! Associations without a single cloud-side id are tracked by joining their
//! parts with `#` (e.g. `service-xxx#IPStrategy-yyy`) or by a JSON object
//! string. Both forms are part of the import syntax and must stay stable.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::provider::ProviderError;

/// Separator for `#`-joined identifiers
pub const FIELD_SEPARATOR: char = '#';

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    #[error("malformed id '{id}': expected {expected} parts separated by '#', got {got}")]
    PartCount {
        id: String,
        expected: usize,
        got: usize,
    },

    #[error("malformed id '{id}': part {index} is empty")]
    EmptyPart { id: String, index: usize },

    #[error("malformed id '{id}': {message}")]
    InvalidJson { id: String, message: String },

    #[error("cannot encode id: {0}")]
    Encode(String),
}

impl From<IdError> for ProviderError {
    fn from(err: IdError) -> Self {
        ProviderError::from_error(err)
    }
}

/// Typed key encoded into a single identifier string
pub trait CompositeKey: Sized {
    fn to_id(&self) -> String;
    fn parse_id(id: &str) -> Result<Self, IdError>;
}

/// Join parts with the field separator
pub fn join(parts: &[&str]) -> String {
    let sep = FIELD_SEPARATOR.to_string();
    parts.join(&sep)
}

/// Split an identifier into exactly `N` non-empty parts
pub fn split<const N: usize>(id: &str) -> Result<[String; N], IdError> {
    let parts: Vec<String> = id.split(FIELD_SEPARATOR).map(str::to_string).collect();
    if let Some(index) = parts.iter().position(String::is_empty) {
        return Err(IdError::EmptyPart {
            id: id.to_string(),
            index,
        });
    }
    let got = parts.len();
    parts.try_into().map_err(|_| IdError::PartCount {
        id: id.to_string(),
        expected: N,
        got,
    })
}

/// Encode a key struct as a JSON identifier
pub fn to_json_id<T: Serialize>(key: &T) -> Result<String, IdError> {
    serde_json::to_string(key).map_err(|e| IdError::Encode(e.to_string()))
}

/// Decode a JSON identifier into a key struct
pub fn parse_json_id<T: DeserializeOwned>(id: &str) -> Result<T, IdError> {
    serde_json::from_str(id).map_err(|e| IdError::InvalidJson {
        id: id.to_string(),
        message: e.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn join_and_split() {
        let id = join(&["service-ohxqslqe", "IPStrategy-nbxqk56k"]);
        assert_eq!(id, "service-ohxqslqe#IPStrategy-nbxqk56k");

        let [service, strategy] = split::<2>(&id).unwrap();
        assert_eq!(service, "service-ohxqslqe");
        assert_eq!(strategy, "IPStrategy-nbxqk56k");
    }

    #[test]
    fn split_rejects_wrong_part_count() {
        let err = split::<4>("service-1#strategy-1#api-1").unwrap_err();
        assert_eq!(
            err,
            IdError::PartCount {
                id: "service-1#strategy-1#api-1".to_string(),
                expected: 4,
                got: 3,
            }
        );
        assert!(split::<2>("service-1").is_err());
        assert!(split::<2>("a#b#c").is_err());
    }

    #[test]
    fn split_rejects_empty_parts() {
        assert!(matches!(
            split::<2>("service-1#"),
            Err(IdError::EmptyPart { index: 1, .. })
        ));
        assert!(split::<1>("").is_err());
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Pair {
        api_key_id: String,
        usage_plan_id: String,
    }

    #[test]
    fn json_ids() {
        let pair = Pair {
            api_key_id: "AKID1".to_string(),
            usage_plan_id: "usagePlan-1".to_string(),
        };
        let id = to_json_id(&pair).unwrap();
        assert_eq!(id, r#"{"api_key_id":"AKID1","usage_plan_id":"usagePlan-1"}"#);
        assert_eq!(parse_json_id::<Pair>(&id).unwrap(), pair);
        assert!(matches!(
            parse_json_id::<Pair>("not json"),
            Err(IdError::InvalidJson { .. })
        ));
    }

    #[test]
    fn unencodable_key_is_an_error() {
        let key = std::collections::HashMap::from([((1, 2), "x")]);
        assert!(matches!(to_json_id(&key), Err(IdError::Encode(_))));
    }
}
