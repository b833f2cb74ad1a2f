use crate::error::ChaincodeError;
use serde::de::{self, Deserializer, IgnoredAny, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Wire names, in encoding order.
const FIELDS: &[&str] = &[
    "Token",
    "TypeBiometric",
    "KeyBiometric",
    "ActivationDate",
    "ExpiredDate",
    "ProviderBiometric",
];

/// A biometric credential as stored in the world state.
///
/// Every field is an opaque string; dates are not parsed. Decoding accepts a
/// JSON object or `null` only. Field names match exactly first, then
/// case-insensitively; a repeated field keeps its last value; a `null` field
/// value leaves the field untouched; missing fields stay empty and unknown
/// fields are ignored.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BiometricRecord {
    #[serde(rename = "Token")]
    pub token: String,
    /// fingerprint, visual, facial, voice
    #[serde(rename = "TypeBiometric")]
    pub type_biometric: String,
    #[serde(rename = "KeyBiometric")]
    pub key_biometric: String,
    #[serde(rename = "ActivationDate")]
    pub activation_date: String,
    #[serde(rename = "ExpiredDate")]
    pub expired_date: String,
    /// Local, Veridas, Facephi
    #[serde(rename = "ProviderBiometric")]
    pub provider_biometric: String,
}

impl BiometricRecord {
    pub fn from_json(bytes: &[u8]) -> Result<Self, ChaincodeError> {
        serde_json::from_slice(bytes).map_err(ChaincodeError::Decode)
    }

    pub fn to_json(&self) -> Result<Vec<u8>, ChaincodeError> {
        serde_json::to_vec(self).map_err(|source| ChaincodeError::Encode {
            key: self.key_biometric.clone(),
            source,
        })
    }

    /// Token and key must be non-empty; nothing else is checked.
    pub fn validate(&self) -> Result<(), ChaincodeError> {
        if self.token.is_empty() {
            return Err(ChaincodeError::Validation { field: "Token" });
        }
        if self.key_biometric.is_empty() {
            return Err(ChaincodeError::Validation {
                field: "KeyBiometric",
            });
        }
        Ok(())
    }

    /// Storage key: `key_type_provider`.
    pub fn derived_key(&self) -> String {
        format!(
            "{}_{}_{}",
            self.key_biometric, self.type_biometric, self.provider_biometric
        )
    }

    /// Rewrite `key_biometric` in place to the derived key.
    pub fn with_derived_key(mut self) -> Self {
        self.key_biometric = self.derived_key();
        self
    }

    fn field_mut(&mut self, name: &str) -> Option<&mut String> {
        let idx = FIELDS
            .iter()
            .position(|f| *f == name)
            .or_else(|| FIELDS.iter().position(|f| fold_eq(f, name)))?;
        Some(match idx {
            0 => &mut self.token,
            1 => &mut self.type_biometric,
            2 => &mut self.key_biometric,
            3 => &mut self.activation_date,
            4 => &mut self.expired_date,
            _ => &mut self.provider_biometric,
        })
    }
}

fn fold_eq(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

impl<'de> Deserialize<'de> for BiometricRecord {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(RecordVisitor)
    }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
    type Value = BiometricRecord;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON object describing a biometric record")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(BiometricRecord::default())
    }

    fn visit_none<E: de::Error>(self) -> Result<Self::Value, E> {
        Ok(BiometricRecord::default())
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut rec = BiometricRecord::default();
        while let Some(key) = map.next_key::<String>()? {
            match rec.field_mut(&key) {
                Some(slot) => {
                    if let Some(value) = map.next_value::<Option<String>>()? {
                        *slot = value;
                    }
                }
                None => {
                    map.next_value::<IgnoredAny>()?;
                }
            }
        }
        Ok(rec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_key_joins_with_underscores() {
        let rec = BiometricRecord {
            token: "t1".into(),
            type_biometric: "facial".into(),
            key_biometric: "u42".into(),
            provider_biometric: "Veridas".into(),
            ..Default::default()
        };
        assert_eq!(rec.derived_key(), "u42_facial_Veridas");
        assert_eq!(rec.with_derived_key().key_biometric, "u42_facial_Veridas");
    }

    #[test]
    fn test_derived_key_keeps_empty_segments() {
        let rec = BiometricRecord {
            token: "t1".into(),
            key_biometric: "u42".into(),
            ..Default::default()
        };
        assert_eq!(rec.derived_key(), "u42__");
    }

    #[test]
    fn test_missing_fields_decode_as_empty() {
        let rec = BiometricRecord::from_json(br#"{"Token":"t1","Extra":true}"#).unwrap();
        assert_eq!(rec.token, "t1");
        assert!(rec.key_biometric.is_empty());
        assert!(rec.activation_date.is_empty());
    }

    #[test]
    fn test_non_string_field_is_decode_error() {
        let err = BiometricRecord::from_json(br#"{"Token":7}"#).unwrap_err();
        assert!(matches!(err, ChaincodeError::Decode(_)));
        let err = BiometricRecord::from_json(b"{not json").unwrap_err();
        assert_eq!(err.to_string(), "Error parsing input");
    }

    #[test]
    fn test_only_objects_or_null_decode() {
        for raw in [
            r#"["t1","facial","u42","","","Veridas"]"#,
            r#"["Token"]"#,
            r#""t1""#,
            "42",
            "true",
        ] {
            assert!(
                matches!(
                    BiometricRecord::from_json(raw.as_bytes()),
                    Err(ChaincodeError::Decode(_))
                ),
                "decoded {raw}"
            );
        }
        assert_eq!(
            BiometricRecord::from_json(b"null").unwrap(),
            BiometricRecord::default()
        );
    }

    #[test]
    fn test_field_names_match_case_insensitively() {
        let rec = BiometricRecord::from_json(
            br#"{"token":"t1","TYPEBIOMETRIC":"facial","keyBiometric":"u1","providerbiometric":"Local"}"#,
        )
        .unwrap();
        assert_eq!(rec.token, "t1");
        assert_eq!(rec.type_biometric, "facial");
        assert_eq!(rec.derived_key(), "u1_facial_Local");
    }

    #[test]
    fn test_repeated_field_keeps_last_value() {
        let rec =
            BiometricRecord::from_json(br#"{"Token":"a","Token":"b","token":"c","KeyBiometric":"k"}"#)
                .unwrap();
        assert_eq!(rec.token, "c");
        assert_eq!(rec.key_biometric, "k");
    }

    #[test]
    fn test_null_field_leaves_value_untouched() {
        let rec =
            BiometricRecord::from_json(br#"{"Token":"t1","Token":null,"ExpiredDate":null}"#).unwrap();
        assert_eq!(rec.token, "t1");
        assert!(rec.expired_date.is_empty());
    }

    #[test]
    fn test_validate_requires_token_and_key() {
        let mut rec = BiometricRecord {
            token: "t1".into(),
            key_biometric: "u1".into(),
            ..Default::default()
        };
        assert!(rec.validate().is_ok());

        rec.token.clear();
        assert!(matches!(
            rec.validate(),
            Err(ChaincodeError::Validation { field: "Token" })
        ));

        rec.token = "t1".into();
        rec.key_biometric.clear();
        assert!(matches!(
            rec.validate(),
            Err(ChaincodeError::Validation {
                field: "KeyBiometric"
            })
        ));
    }

    #[test]
    fn test_encoding_emits_every_field_in_order() {
        let rec = BiometricRecord {
            token: "t1".into(),
            key_biometric: "u1".into(),
            ..Default::default()
        };
        let json = String::from_utf8(rec.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            r#"{"Token":"t1","TypeBiometric":"","KeyBiometric":"u1","ActivationDate":"","ExpiredDate":"","ProviderBiometric":""}"#
        );
    }
}
