use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Implements `as_str`, `Display` and case-insensitive `FromStr` for a
/// fieldless enum whose serde form is the same snake_case string.
macro_rules! text_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                match s.trim().to_lowercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    _ => Err(format!("Unknown {}: {s}", stringify!($name))),
                }
            }
        }
    };
}

pub(crate) use text_enum;

/// One value in an entity's metadata map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Flag(bool),
    Number(f64),
    Text(String),
    List(Vec<String>),
}

impl MetadataValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MetadataValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            MetadataValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            MetadataValue::Flag(b) => Some(*b),
            _ => None,
        }
    }

    /// Lossy conversion from arbitrary JSON. Nested objects and non-string
    /// list items are dropped.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(MetadataValue::Flag(*b)),
            serde_json::Value::Number(n) => n.as_f64().map(MetadataValue::Number),
            serde_json::Value::String(s) => Some(MetadataValue::Text(s.clone())),
            serde_json::Value::Array(items) => Some(MetadataValue::List(
                items
                    .iter()
                    .filter_map(|item| item.as_str().map(str::to_string))
                    .collect(),
            )),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::Text(value.to_string())
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Number(value)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Flag(value)
    }
}

/// Ordered so that stored JSON is stable.
pub type EntityMetadata = BTreeMap<String, MetadataValue>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn metadata_round_trips_untagged() {
        let mut metadata = EntityMetadata::new();
        metadata.insert("page".into(), 12.0.into());
        metadata.insert("source".into(), "Chapter 3".into());
        metadata.insert("answered".into(), false.into());
        metadata.insert("aliases".into(), MetadataValue::List(vec!["ML".into()]));

        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(
            json,
            json!({"aliases": ["ML"], "answered": false, "page": 12.0, "source": "Chapter 3"})
        );

        let back: EntityMetadata = serde_json::from_value(json).unwrap();
        assert_eq!(back, metadata);
    }

    #[test]
    fn from_json_drops_objects() {
        assert_eq!(MetadataValue::from_json(&json!({"nested": 1})), None);
        assert_eq!(
            MetadataValue::from_json(&json!(["a", 1, "b"])),
            Some(MetadataValue::List(vec!["a".into(), "b".into()]))
        );
    }
}
