//! Domain types for the CRM API.
//!
//! # Design
//! Each resource is a struct with the fields the client reasons about plus
//! an `extra` map (serde-flattened) for everything else the CRM returns, so
//! a fetched object written back with `save` loses nothing. Responses are
//! folded into an existing object with [`fold_into`]: a shallow, top-level
//! overwrite performed on the JSON form, matching how the CRM itself treats
//! a `PUT` of the full object.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::http::HttpResponse;
use crate::properties::{self, PropertyEntry, PropertyValue, Selector};
use crate::wire::{null_as_default, wire_enum};

/// A CRM contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(
        rename = "tagsWithTime",
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub tags_with_time: Vec<TagWithTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lead_score: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub star_value: Option<i64>,
    /// Sent by the CRM as either a number or a string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact_company_id: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<Owner>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<PropertyEntry>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Contact {
    pub fn from_json(body: Value) -> Result<Self, ApiError> {
        serde_json::from_value(body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    /// Entries matching `selector`; empty when the contact has no
    /// properties at all.
    pub fn select_properties(&self, selector: impl Into<Selector>) -> Vec<&PropertyEntry> {
        match &self.properties {
            Some(props) => properties::select(props, &selector.into()),
            None => Vec::new(),
        }
    }

    pub fn get_property(&self, selector: impl Into<Selector>) -> Option<PropertyValue> {
        let props = self.properties.as_deref()?;
        properties::get_property(props, &selector.into())
    }

    /// Shallow-merge a response body into this contact.
    pub fn merge_body(&mut self, body: Value) -> Result<(), ApiError> {
        merge_body(self, body)
    }
}

/// A tag together with the time it was attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagWithTime {
    pub tag: String,
    #[serde(rename = "createdTime", default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// The CRM user that owns a contact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Owner {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A note attached to a contact. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

wire_enum! {
    pub enum TaskType {
        Call => "CALL",
        Email => "EMAIL",
        FollowUp => "FOLLOW_UP",
        Meeting => "MEETING",
        Milestone => "MILESTONE",
        Send => "SEND",
        Tweet => "TWEET",
        Other => "OTHER",
    }
}

wire_enum! {
    pub enum Priority {
        High => "HIGH",
        Normal => "NORMAL",
        Low => "LOW",
    }
}

wire_enum! {
    pub enum TaskStatus {
        YetToStart => "YET_TO_START",
        InProgress => "IN_PROGRESS",
        Completed => "COMPLETED",
    }
}

/// A CRM task. Flat: no property list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Task {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<TaskType>,
    #[serde(rename = "priority_type", default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    /// Unix timestamp, seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<i64>,
    /// Contact ids on create; full contact objects in responses.
    #[serde(default, deserialize_with = "null_as_default", skip_serializing_if = "Vec::is_empty")]
    pub contacts: Vec<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Task {
    pub fn from_json(body: Value) -> Result<Self, ApiError> {
        serde_json::from_value(body).map_err(|e| ApiError::Deserialization(e.to_string()))
    }

    pub fn merge_body(&mut self, body: Value) -> Result<(), ApiError> {
        merge_body(self, body)
    }
}

/// Outcome of a listing or search call.
///
/// A non-200 answer is not an error for these endpoints; the raw response
/// is handed back for the caller to inspect.
#[derive(Debug, Clone, PartialEq)]
pub enum Listing<T> {
    Items(Vec<T>),
    Raw(HttpResponse),
}

impl<T> Listing<T> {
    pub fn items(&self) -> Option<&[T]> {
        match self {
            Listing::Items(items) => Some(items),
            Listing::Raw(_) => None,
        }
    }

    pub fn into_items(self) -> Option<Vec<T>> {
        match self {
            Listing::Items(items) => Some(items),
            Listing::Raw(_) => None,
        }
    }
}

/// Contacts found by email address.
#[derive(Debug, Clone, PartialEq)]
pub enum EmailSearch {
    One(Contact),
    Many(Vec<Contact>),
}

impl EmailSearch {
    pub fn into_vec(self) -> Vec<Contact> {
        match self {
            EmailSearch::One(contact) => vec![contact],
            EmailSearch::Many(contacts) => contacts,
        }
    }
}

/// Overwrite top-level fields of `target` with those in `overlay`.
pub(crate) fn fold_into<T>(target: &mut T, overlay: Map<String, Value>) -> Result<(), ApiError>
where
    T: Serialize + DeserializeOwned,
{
    let mut current = match serde_json::to_value(&*target) {
        Ok(Value::Object(map)) => map,
        Ok(_) => return Err(ApiError::Serialization("resource is not a JSON object".to_string())),
        Err(e) => return Err(ApiError::Serialization(e.to_string())),
    };
    current.extend(overlay);
    *target = serde_json::from_value(Value::Object(current))
        .map_err(|e| ApiError::Deserialization(e.to_string()))?;
    Ok(())
}

fn merge_body<T>(target: &mut T, body: Value) -> Result<(), ApiError>
where
    T: Serialize + DeserializeOwned,
{
    match body {
        Value::Object(map) => fold_into(target, map),
        Value::Null => Ok(()),
        other => Err(ApiError::Deserialization(format!(
            "expected a JSON object to merge, got {other}"
        ))),
    }
}
