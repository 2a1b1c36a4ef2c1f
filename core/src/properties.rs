//! Translation between flat attribute updates and the CRM's property list.
//!
//! # Design
//! A contact on the wire is a handful of top-level control fields plus an
//! ordered `properties` array of `{type, name, value, subtype?}` entries.
//! Callers describe changes as one flat map (`{"first_name": "Anita",
//! "phone": {"value": "...", "subtype": "mobile"}}`); `encode` splits that
//! map into control fields and property entries, and `merge` folds the
//! entries into an existing list.
//!
//! An entry's slot is the pair `(name, subtype)`. Entries sharing a name
//! but not a subtype coexist, which is why `get_property` may answer with
//! several values.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::wire::wire_enum;

/// Top-level contact attributes that never live in `properties`.
pub const CONTROL_FIELDS: [&str; 6] = [
    "id",
    "type",
    "tags",
    "lead_score",
    "star_value",
    "contact_company_id",
];

/// Property names the CRM predefines. Everything else is custom.
pub const SYSTEM_PROPERTIES: [&str; 7] = [
    "first_name",
    "last_name",
    "company",
    "title",
    "email",
    "address",
    "phone",
];

pub fn is_control_field(key: &str) -> bool {
    CONTROL_FIELDS.contains(&key)
}

pub fn is_system_property(key: &str) -> bool {
    SYSTEM_PROPERTIES.contains(&key)
}

wire_enum! {
    /// Whether a property is predefined by the CRM or user-defined.
    pub enum PropertyKind {
        System => "SYSTEM",
        Custom => "CUSTOM",
    }
}

impl PropertyKind {
    pub fn for_name(name: &str) -> Self {
        if is_system_property(name) {
            PropertyKind::System
        } else {
            PropertyKind::Custom
        }
    }
}

/// One entry of a contact's `properties` list.
///
/// Fields the CRM sends beyond the four known ones are kept in `extra` and
/// written back unchanged. Entries without a `type` decode with `kind`
/// unset and are written back without one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyEntry {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<PropertyKind>,
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PropertyEntry {
    /// A scalar entry, classified by name.
    pub fn new(name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        Self {
            kind: Some(PropertyKind::for_name(&name)),
            name,
            value: value.into(),
            subtype: None,
            extra: Map::new(),
        }
    }

    pub fn with_subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    /// True when both entries occupy the same `(name, subtype)` slot.
    pub fn same_slot(&self, other: &PropertyEntry) -> bool {
        self.name == other.name && self.subtype == other.subtype
    }

    /// Look up a field by its wire name. Absent fields read as `null`.
    pub fn field(&self, key: &str) -> Value {
        match key {
            "type" => self
                .kind
                .as_ref()
                .map(|kind| Value::String(kind.as_str().to_string()))
                .unwrap_or(Value::Null),
            "name" => Value::String(self.name.clone()),
            "value" => self.value.clone(),
            "subtype" => self.subtype.clone().map(Value::String).unwrap_or(Value::Null),
            other => self.extra.get(other).cloned().unwrap_or(Value::Null),
        }
    }
}

/// A flat update split into its two wire tiers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EncodedAttributes {
    pub control_fields: Map<String, Value>,
    pub properties: Vec<PropertyEntry>,
}

impl EncodedAttributes {
    /// The JSON payload used when creating a contact.
    pub fn into_payload(self) -> Result<Value, ApiError> {
        let mut payload = self.control_fields;
        let properties =
            serde_json::to_value(&self.properties).map_err(|e| ApiError::Serialization(e.to_string()))?;
        payload.insert("properties".to_string(), properties);
        Ok(Value::Object(payload))
    }
}

/// Split a flat attribute map into control fields and property entries.
///
/// Scalar values become `{type, name, value}`. Object values are copied and
/// get `type` and `name` set on top, so `value`, `subtype` and any other
/// caller-supplied keys survive. Input order is kept and nothing is
/// deduplicated.
pub fn encode(options: &Map<String, Value>) -> Result<EncodedAttributes, ApiError> {
    let mut encoded = EncodedAttributes::default();
    for (key, value) in options {
        if is_control_field(key) {
            encoded.control_fields.insert(key.clone(), value.clone());
        } else {
            encoded.properties.push(encode_property(key, value)?);
        }
    }
    Ok(encoded)
}

fn encode_property(key: &str, value: &Value) -> Result<PropertyEntry, ApiError> {
    let Value::Object(fields) = value else {
        return Ok(PropertyEntry::new(key, value.clone()));
    };
    let mut fields = fields.clone();
    fields.insert(
        "type".to_string(),
        Value::String(PropertyKind::for_name(key).as_str().to_string()),
    );
    fields.insert("name".to_string(), Value::String(key.to_string()));
    serde_json::from_value(Value::Object(fields))
        .map_err(|e| ApiError::Serialization(format!("property `{key}`: {e}")))
}

/// Fold `incoming` entries into `existing`.
///
/// Each existing entry, in order, takes the value of the first remaining
/// incoming entry in the same slot; that incoming entry is consumed. Only
/// `value` is overwritten. Unconsumed incoming entries are appended in
/// their original order.
pub fn merge(existing: Vec<PropertyEntry>, incoming: Vec<PropertyEntry>) -> Vec<PropertyEntry> {
    let mut pending = incoming;
    let mut merged: Vec<PropertyEntry> = existing
        .into_iter()
        .map(|mut entry| {
            if let Some(pos) = pending.iter().position(|candidate| entry.same_slot(candidate)) {
                entry.value = pending.remove(pos).value;
            }
            entry
        })
        .collect();
    merged.append(&mut pending);
    merged
}

/// Which property entries to pick.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    /// Every entry with this name, whatever its subtype.
    Name(String),
    /// Every entry whose fields equal all of these pairs.
    Fields(Map<String, Value>),
}

impl Selector {
    pub fn name(name: impl Into<String>) -> Self {
        Selector::Name(name.into())
    }

    /// Add a required field, turning a name selector into a field selector.
    pub fn with(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut fields = match self {
            Selector::Name(name) => {
                let mut fields = Map::new();
                fields.insert("name".to_string(), Value::String(name));
                fields
            }
            Selector::Fields(fields) => fields,
        };
        fields.insert(key.into(), value.into());
        Selector::Fields(fields)
    }

    pub fn matches(&self, entry: &PropertyEntry) -> bool {
        match self {
            Selector::Name(name) => entry.name == *name,
            Selector::Fields(fields) => fields.iter().all(|(key, value)| entry.field(key) == *value),
        }
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::Name(name.to_string())
    }
}

impl From<String> for Selector {
    fn from(name: String) -> Self {
        Selector::Name(name)
    }
}

impl From<Map<String, Value>> for Selector {
    fn from(fields: Map<String, Value>) -> Self {
        Selector::Fields(fields)
    }
}

/// Result of a property lookup: one value, or every value when the
/// selector matched more than one entry.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Single(Value),
    Multiple(Vec<Value>),
}

impl PropertyValue {
    pub fn as_single(&self) -> Option<&Value> {
        match self {
            PropertyValue::Single(value) => Some(value),
            PropertyValue::Multiple(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        self.as_single().and_then(Value::as_str)
    }
}

pub fn select<'a>(properties: &'a [PropertyEntry], selector: &Selector) -> Vec<&'a PropertyEntry> {
    properties.iter().filter(|entry| selector.matches(entry)).collect()
}

/// `None` when nothing matches; ambiguity is not an error.
pub fn get_property(properties: &[PropertyEntry], selector: &Selector) -> Option<PropertyValue> {
    let mut matches = select(properties, selector);
    match matches.len() {
        0 => None,
        1 => matches.pop().map(|entry| PropertyValue::Single(entry.value.clone())),
        _ => Some(PropertyValue::Multiple(
            matches.into_iter().map(|entry| entry.value.clone()).collect(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("expected object, got {other}"),
        }
    }

    fn phones() -> Vec<PropertyEntry> {
        vec![
            PropertyEntry::new("first_name", "Anita"),
            PropertyEntry::new("phone", "1231111111").with_subtype("home"),
            PropertyEntry::new("phone", "1232222222").with_subtype("mobile"),
        ]
    }

    #[test]
    fn encode_classifies_system_and_custom_keys() {
        let encoded = encode(&object(json!({"first_name": "Anita", "custom_field": "x"}))).unwrap();
        assert!(encoded.control_fields.is_empty());
        assert_eq!(
            serde_json::to_value(&encoded.properties).unwrap(),
            json!([
                {"type": "SYSTEM", "name": "first_name", "value": "Anita"},
                {"type": "CUSTOM", "name": "custom_field", "value": "x"}
            ])
        );
    }

    #[test]
    fn encode_copies_control_fields_verbatim() {
        let encoded = encode(&object(json!({
            "tags": ["sales", "rspec"],
            "star_value": 4,
            "email": "anitadrink@example.com"
        })))
        .unwrap();
        assert_eq!(encoded.control_fields["tags"], json!(["sales", "rspec"]));
        assert_eq!(encoded.control_fields["star_value"], json!(4));
        assert_eq!(encoded.properties.len(), 1);
        assert_eq!(encoded.properties[0].kind, Some(PropertyKind::System));
    }

    #[test]
    fn encode_keeps_mapping_fields_and_overrides_type_and_name() {
        let encoded = encode(&object(json!({
            "phone": {"value": "1233333333", "subtype": "mobile", "type": "CUSTOM", "name": "x"},
            "website": {"value": "example.com", "subtype": "URL", "label": "home page"}
        })))
        .unwrap();
        let phone = &encoded.properties[0];
        assert_eq!(phone.kind, Some(PropertyKind::System));
        assert_eq!(phone.name, "phone");
        assert_eq!(phone.subtype.as_deref(), Some("mobile"));
        assert_eq!(phone.value, json!("1233333333"));

        let website = &encoded.properties[1];
        assert_eq!(website.kind, Some(PropertyKind::Custom));
        assert_eq!(website.extra["label"], json!("home page"));
    }

    #[test]
    fn encode_preserves_input_order_without_dedup() {
        let encoded = encode(&object(json!({"z_custom": 1, "email": "a@x.com", "a_custom": 2}))).unwrap();
        let names: Vec<&str> = encoded.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["z_custom", "email", "a_custom"]);
    }

    #[test]
    fn encode_rejects_non_string_subtype() {
        let err = encode(&object(json!({"phone": {"value": "1", "subtype": 5}}))).unwrap_err();
        assert!(matches!(err, ApiError::Serialization(_)));
    }

    #[test]
    fn encode_keeps_null_values() {
        let encoded = encode(&object(json!({"nickname": null}))).unwrap();
        assert_eq!(
            serde_json::to_value(&encoded.properties).unwrap(),
            json!([{"type": "CUSTOM", "name": "nickname", "value": null}])
        );
    }

    #[test]
    fn entry_without_type_decodes_and_writes_back_unchanged() {
        let raw = json!({"name": "nickname", "value": "Ani"});
        let entry: PropertyEntry = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(entry.kind, None);
        assert_eq!(entry.field("type"), Value::Null);
        assert_eq!(serde_json::to_value(&entry).unwrap(), raw);
    }

    #[test]
    fn entry_with_unknown_type_round_trips() {
        let raw = json!({"type": "COMPUTED", "name": "score", "value": 7});
        let entry: PropertyEntry = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(entry.kind, Some(PropertyKind::Unknown("COMPUTED".to_string())));
        assert_eq!(entry.field("type"), json!("COMPUTED"));
        assert_eq!(serde_json::to_value(&entry).unwrap(), raw);
    }

    #[test]
    fn payload_nests_properties_next_to_control_fields() {
        let payload = encode(&object(json!({"tags": ["a"], "first_name": "Anita"})))
            .unwrap()
            .into_payload()
            .unwrap();
        assert_eq!(
            payload,
            json!({
                "tags": ["a"],
                "properties": [{"type": "SYSTEM", "name": "first_name", "value": "Anita"}]
            })
        );
    }

    #[test]
    fn merge_overwrites_value_in_matching_slot() {
        let existing = vec![PropertyEntry::new("phone", "1232222222").with_subtype("mobile")];
        let incoming = vec![PropertyEntry::new("phone", "1233333333").with_subtype("mobile")];
        let merged = merge(existing, incoming);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].value, json!("1233333333"));
    }

    #[test]
    fn merge_appends_unmatched_and_keeps_existing_order() {
        let incoming = vec![
            PropertyEntry::new("phone", "999").with_subtype("other"),
            PropertyEntry::new("first_name", "Foo!"),
            PropertyEntry::new("nickname", "Ani"),
        ];
        let merged = merge(phones(), incoming);
        assert_eq!(merged.len(), 3 + 3 - 1);
        let slots: Vec<(&str, Option<&str>)> = merged
            .iter()
            .map(|p| (p.name.as_str(), p.subtype.as_deref()))
            .collect();
        assert_eq!(
            slots,
            [
                ("first_name", None),
                ("phone", Some("home")),
                ("phone", Some("mobile")),
                ("phone", Some("other")),
                ("nickname", None),
            ]
        );
        assert_eq!(merged[0].value, json!("Foo!"));
    }

    #[test]
    fn merge_subtype_absent_only_matches_absent() {
        let incoming = vec![PropertyEntry::new("phone", "555")];
        let merged = merge(phones(), incoming);
        assert_eq!(merged.len(), 4);
        assert_eq!(merged[1].value, json!("1231111111"));
        assert_eq!(merged[3].subtype, None);
    }

    #[test]
    fn merge_only_overwrites_value() {
        let mut existing = PropertyEntry::new("website", "old.example.com").with_subtype("URL");
        existing.extra.insert("label".to_string(), json!("keep"));
        let mut incoming = PropertyEntry::new("website", "new.example.com").with_subtype("URL");
        incoming.extra.insert("label".to_string(), json!("drop"));
        let merged = merge(vec![existing], vec![incoming]);
        assert_eq!(merged[0].value, json!("new.example.com"));
        assert_eq!(merged[0].extra["label"], json!("keep"));
    }

    #[test]
    fn merge_consumes_first_match_only() {
        let incoming = vec![PropertyEntry::new("first_name", "A"), PropertyEntry::new("first_name", "B")];
        let merged = merge(phones(), incoming);
        assert_eq!(merged[0].value, json!("A"));
        assert_eq!(merged.len(), 4);
        assert_eq!(merged[3].value, json!("B"));
    }

    #[test]
    fn merging_the_same_update_twice_is_idempotent() {
        let update = object(json!({
            "first_name": "Foo!",
            "phone": {"value": "123 123 123", "subtype": "other"},
            "nickname": "Ani"
        }));
        let once = merge(phones(), encode(&update).unwrap().properties);
        let twice = merge(once.clone(), encode(&update).unwrap().properties);
        assert_eq!(once, twice);
    }

    #[test]
    fn select_by_name_returns_every_subtype() {
        let props = phones();
        let selected = select(&props, &Selector::from("phone"));
        assert_eq!(selected.len(), 2);
    }

    #[test]
    fn get_property_by_fields_narrows_to_subtype() {
        let props = phones();
        let home = get_property(&props, &Selector::name("phone").with("subtype", "home"));
        assert_eq!(home, Some(PropertyValue::Single(json!("1231111111"))));
    }

    #[test]
    fn get_property_returns_all_values_when_ambiguous() {
        let props = phones();
        let value = get_property(&props, &Selector::from("phone")).unwrap();
        assert_eq!(
            value,
            PropertyValue::Multiple(vec![json!("1231111111"), json!("1232222222")])
        );
        assert_eq!(value.as_str(), None);
    }

    #[test]
    fn get_property_without_match_is_none() {
        let props = phones();
        assert_eq!(get_property(&props, &Selector::from("nil-property")), None);
        assert_eq!(
            get_property(&props, &Selector::name("phone").with("subtype", "nil-property")),
            None
        );
    }

    #[test]
    fn field_selector_can_reference_type_and_null_subtype() {
        let props = phones();
        let selector = Selector::from(object(json!({"type": "SYSTEM", "subtype": null})));
        let value = get_property(&props, &selector).unwrap();
        assert_eq!(value.as_str(), Some("Anita"));
    }
}
