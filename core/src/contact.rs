//! Stateless request builder and response parser for contacts.
//!
//! # Design
//! Like the task client, every remote operation is a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes the
//! matching `HttpResponse`. Instance operations that change a contact take
//! it by `&mut` in the parse step and fold the response into it.
//!
//! Three endpoints (`search/email`, `add-score`, `change-owner`) only
//! accept form-encoded bodies; the rest speak JSON.

use serde_json::{json, Map, Value};

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::properties;
use crate::resource::{self, BaseUrl};
use crate::types::{fold_into, Contact, EmailSearch, Listing, Note, TagWithTime};

/// Body text the CRM sends (with a 200 and no JSON) when changing a
/// contact's owner to an unknown user.
pub const OWNER_NOT_FOUND: &str = "Owner with this email does not exist";

pub const DEFAULT_SEARCH_TYPE: &str = "PERSON";
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone)]
pub struct ContactClient {
    base: BaseUrl,
}

impl ContactClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: BaseUrl::new(base_url),
        }
    }

    pub fn build_list(&self) -> HttpRequest {
        self.base.get("contacts")
    }

    pub fn parse_list(&self, response: HttpResponse) -> Result<Listing<Contact>, ApiError> {
        resource::parse_listing(response)
    }

    pub fn build_find(&self, id: i64) -> HttpRequest {
        self.base.get(&format!("contacts/{id}"))
    }

    pub fn parse_find(&self, response: HttpResponse) -> Result<Contact, ApiError> {
        resource::parse_found(response)
    }

    /// Duplicate addresses are dropped, keeping first-seen order.
    pub fn build_search_by_email<S: AsRef<str>>(&self, emails: &[S]) -> Result<HttpRequest, ApiError> {
        let mut unique: Vec<&str> = Vec::with_capacity(emails.len());
        for email in emails {
            let email = email.as_ref();
            if !unique.contains(&email) {
                unique.push(email);
            }
        }
        let ids = serde_json::to_string(&unique).map_err(|e| ApiError::Serialization(e.to_string()))?;
        self.base.form("contacts/search/email", &[("email_ids", ids.as_str())])
    }

    /// More than one entry in the body yields `Many` (nulls dropped). A
    /// single entry that is `null` or `{}` means nothing matched.
    pub fn parse_search_by_email(&self, response: HttpResponse) -> Result<Option<EmailSearch>, ApiError> {
        let entries = match response.json()? {
            Value::Array(entries) => entries,
            Value::Null => Vec::new(),
            single @ Value::Object(_) => vec![single],
            other => {
                return Err(ApiError::Deserialization(format!(
                    "expected a list of contacts, got {other}"
                )))
            }
        };

        if entries.len() > 1 {
            let contacts = entries
                .into_iter()
                .filter(|entry| !entry.is_null())
                .map(Contact::from_json)
                .collect::<Result<Vec<_>, _>>()?;
            return Ok(Some(EmailSearch::Many(contacts)));
        }

        match entries.into_iter().next() {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Object(fields)) if fields.is_empty() => Ok(None),
            Some(entry) => Contact::from_json(entry).map(|c| Some(EmailSearch::One(c))),
        }
    }

    pub fn build_search(&self, query: &str, kind: &str, page_size: u32) -> Result<HttpRequest, ApiError> {
        let page_size = page_size.to_string();
        let fields = [("q", query), ("type", kind), ("page_size", page_size.as_str())];
        let query = serde_urlencoded::to_string(fields).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(self.base.get(&format!("search?{query}")))
    }

    pub fn parse_search(&self, response: HttpResponse) -> Result<Listing<Contact>, ApiError> {
        resource::parse_listing(response)
    }

    /// `options` is a flat attribute map; see [`properties::encode`].
    pub fn build_create(&self, options: &Map<String, Value>) -> Result<HttpRequest, ApiError> {
        let payload = properties::encode(options)?.into_payload()?;
        self.base.json(HttpMethod::Post, "contacts", &payload)
    }

    pub fn parse_create(&self, response: HttpResponse) -> Result<Option<Contact>, ApiError> {
        resource::parse_optional(response)
    }

    /// Positive scores add to the lead score, negative ones subtract.
    pub fn build_update_score(&self, email: &str, score: i64) -> Result<HttpRequest, ApiError> {
        let score = score.to_string();
        self.base
            .form("contacts/add-score", &[("email", email), ("score", score.as_str())])
    }

    pub fn parse_update_score(&self, response: HttpResponse) -> Result<Option<Contact>, ApiError> {
        resource::parse_optional(response)
    }

    pub fn build_delete(&self, id: i64) -> HttpRequest {
        self.base.delete(&format!("contacts/{id}"))
    }

    pub fn build_destroy(&self, contact: &Contact) -> Result<HttpRequest, ApiError> {
        Ok(self.build_delete(contact_id(contact)?))
    }

    pub fn build_delete_tags<S: AsRef<str>>(&self, contact: &Contact, tags: &[S]) -> Result<HttpRequest, ApiError> {
        let tags: Vec<&str> = tags.iter().map(AsRef::as_ref).collect();
        let payload = json!({ "id": contact_id(contact)?, "tags": tags });
        self.base.json(HttpMethod::Put, "contacts/delete/tags", &payload)
    }

    /// Replaces `tags` and `tags_with_time` with what the CRM kept. Returns
    /// `false`, leaving the contact alone, on any status but 200.
    pub fn parse_delete_tags(&self, contact: &mut Contact, response: HttpResponse) -> Result<bool, ApiError> {
        if response.status != 200 {
            return Ok(false);
        }
        let remaining: Vec<TagWithTime> = resource::decode(response.json()?)?;
        contact.tags = remaining.iter().map(|t| t.tag.clone()).collect();
        contact.tags_with_time = remaining;
        Ok(true)
    }

    pub fn build_notes(&self, contact: &Contact) -> Result<HttpRequest, ApiError> {
        let id = contact_id(contact)?;
        Ok(self.base.get(&format!("contacts/{id}/notes")))
    }

    pub fn parse_notes(&self, response: HttpResponse) -> Result<Vec<Note>, ApiError> {
        resource::check_status(&response, 200)?;
        resource::decode(response.json()?)
    }

    /// `PUT` of the whole contact as it stands locally.
    pub fn build_save(&self, contact: &Contact) -> Result<HttpRequest, ApiError> {
        self.base.json(HttpMethod::Put, "contacts", contact)
    }

    pub fn parse_save(&self, contact: &mut Contact, response: HttpResponse) -> Result<(), ApiError> {
        resource::check_status(&response, 200)?;
        contact.merge_body(response.json()?)
    }

    pub fn build_change_owner(&self, contact: &Contact, owner_email: &str) -> Result<HttpRequest, ApiError> {
        let id = contact_id(contact)?.to_string();
        self.base.form(
            "contacts/change-owner",
            &[("owner_email", owner_email), ("contact_id", id.as_str())],
        )
    }

    /// An unknown owner becomes `NotFound` with the CRM's message. Any other
    /// undecodable body is returned as the decoding error itself.
    pub fn parse_change_owner(&self, contact: &mut Contact, response: HttpResponse) -> Result<(), ApiError> {
        let body = match response.json() {
            Ok(body) => body,
            Err(_) if response.body.contains(OWNER_NOT_FOUND) => {
                return Err(ApiError::NotFound {
                    response,
                    message: Some(OWNER_NOT_FOUND.to_string()),
                })
            }
            Err(e) => return Err(e),
        };
        resource::check_status(&response, 200)?;
        contact.merge_body(body)
    }
}

impl Contact {
    /// Apply a flat attribute update locally, without any network call.
    ///
    /// Control fields overwrite the top-level fields; everything else is
    /// encoded into property entries and merged into `properties` by
    /// `(name, subtype)` slot.
    pub fn update_attributes(&mut self, options: &Map<String, Value>) -> Result<(), ApiError> {
        let encoded = properties::encode(options)?;
        let existing = self.properties.clone().unwrap_or_default();
        let merged = properties::merge(existing, encoded.properties);

        let mut overlay = encoded.control_fields;
        let merged = serde_json::to_value(merged).map_err(|e| ApiError::Serialization(e.to_string()))?;
        overlay.insert("properties".to_string(), merged);
        fold_into(self, overlay)
    }
}

fn contact_id(contact: &Contact) -> Result<i64, ApiError> {
    contact.id.ok_or(ApiError::MissingId("contact"))
}
