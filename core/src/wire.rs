//! Helpers for decoding CRM bodies leniently.
//!
//! The CRM adds enum values and sends `null` for empty lists without
//! notice. Decoding keeps what it does not recognise so a fetched object
//! written back is unchanged.

use serde::{Deserialize, Deserializer};

/// A string enum whose unknown wire values land in `Unknown(String)` and are
/// written back verbatim.
macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($variant:ident => $wire:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            /// A value this client does not know about.
            Unknown(String),
        }

        impl $name {
            pub fn as_str(&self) -> &str {
                match self {
                    $($name::$variant => $wire,)+
                    $name::Unknown(raw) => raw,
                }
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                match raw.as_str() {
                    $($wire => $name::$variant,)+
                    _ => $name::Unknown(raw),
                }
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                match value {
                    $name::Unknown(raw) => raw,
                    known => known.as_str().to_string(),
                }
            }
        }
    };
}

pub(crate) use wire_enum;

/// Deserialize `null` as the type's default.
pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    wire_enum! {
        pub enum Color {
            Red => "RED",
            Blue => "BLUE",
        }
    }

    #[test]
    fn known_values_map_to_variants() {
        let color: Color = serde_json::from_value(json!("RED")).unwrap();
        assert_eq!(color, Color::Red);
        assert_eq!(serde_json::to_value(&color).unwrap(), json!("RED"));
    }

    #[test]
    fn unknown_values_survive_a_round_trip() {
        let color: Color = serde_json::from_value(json!("TEAL")).unwrap();
        assert_eq!(color, Color::Unknown("TEAL".to_string()));
        assert_eq!(color.as_str(), "TEAL");
        assert_eq!(serde_json::to_value(&color).unwrap(), json!("TEAL"));
    }

    #[test]
    fn null_reads_as_default() {
        #[derive(Deserialize)]
        struct Holder {
            #[serde(default, deserialize_with = "null_as_default")]
            items: Vec<String>,
        }
        let holder: Holder = serde_json::from_value(json!({"items": null})).unwrap();
        assert!(holder.items.is_empty());
        let holder: Holder = serde_json::from_value(json!({})).unwrap();
        assert!(holder.items.is_empty());
    }
}
