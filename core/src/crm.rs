//! Transport-backed entry point tying the resource clients to the network.
//!
//! `Crm` owns a `Transport` and the two stateless clients. Each operation
//! builds a request, executes it and parses the response; the contact and
//! task handles returned by [`Crm::contacts`] and [`Crm::tasks`] simply
//! borrow the `Crm`.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::contact::{ContactClient, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_TYPE};
use crate::error::ApiError;
use crate::http::{HttpRequest, HttpResponse};
use crate::task::TaskClient;
use crate::transport::{CrmConfig, Transport, UreqTransport};
use crate::types::{Contact, EmailSearch, Listing, Note, Task};

#[derive(Debug)]
pub struct Crm<T> {
    transport: T,
    contacts: ContactClient,
    tasks: TaskClient,
}

impl Crm<UreqTransport> {
    pub fn from_config(config: &CrmConfig) -> Self {
        Self::new(&config.base_url, UreqTransport::new(config))
    }
}

impl<T: Transport> Crm<T> {
    pub fn new(base_url: &str, transport: T) -> Self {
        Self {
            transport,
            contacts: ContactClient::new(base_url),
            tasks: TaskClient::new(base_url),
        }
    }

    pub fn contacts(&self) -> Contacts<'_, T> {
        Contacts { crm: self }
    }

    pub fn tasks(&self) -> Tasks<'_, T> {
        Tasks { crm: self }
    }

    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        debug!(method = request.method.as_str(), path = %request.path, "sending request");
        let response = self.transport.execute(&request)?;
        debug!(status = response.status, path = %request.path, "received response");
        Ok(response)
    }
}

fn log_not_found<V>(result: Result<V, ApiError>) -> Result<V, ApiError> {
    if let Err(ApiError::NotFound { response, message }) = &result {
        warn!(status = response.status, reason = message.as_deref(), "remote reported not found");
    }
    result
}

/// Contact operations.
pub struct Contacts<'a, T> {
    crm: &'a Crm<T>,
}

impl<T: Transport> Contacts<'_, T> {
    fn client(&self) -> &ContactClient {
        &self.crm.contacts
    }

    pub fn list(&self) -> Result<Listing<Contact>, ApiError> {
        let response = self.crm.execute(self.client().build_list())?;
        self.client().parse_list(response)
    }

    pub fn find(&self, id: i64) -> Result<Contact, ApiError> {
        let response = self.crm.execute(self.client().build_find(id))?;
        log_not_found(self.client().parse_find(response))
    }

    pub fn search_by_email<S: AsRef<str>>(&self, emails: &[S]) -> Result<Option<EmailSearch>, ApiError> {
        let response = self.crm.execute(self.client().build_search_by_email(emails)?)?;
        self.client().parse_search_by_email(response)
    }

    /// Person search with the default page size.
    pub fn search(&self, query: &str) -> Result<Listing<Contact>, ApiError> {
        self.search_with(query, DEFAULT_SEARCH_TYPE, DEFAULT_PAGE_SIZE)
    }

    pub fn search_with(&self, query: &str, kind: &str, page_size: u32) -> Result<Listing<Contact>, ApiError> {
        let response = self.crm.execute(self.client().build_search(query, kind, page_size)?)?;
        self.client().parse_search(response)
    }

    pub fn create(&self, options: &Map<String, Value>) -> Result<Option<Contact>, ApiError> {
        let response = self.crm.execute(self.client().build_create(options)?)?;
        self.client().parse_create(response)
    }

    pub fn update_score(&self, email: &str, score: i64) -> Result<Option<Contact>, ApiError> {
        let response = self.crm.execute(self.client().build_update_score(email, score)?)?;
        self.client().parse_update_score(response)
    }

    /// Returns the raw response; the CRM answers 204 on success.
    pub fn delete(&self, id: i64) -> Result<HttpResponse, ApiError> {
        self.crm.execute(self.client().build_delete(id))
    }

    pub fn destroy(&self, contact: &Contact) -> Result<HttpResponse, ApiError> {
        self.crm.execute(self.client().build_destroy(contact)?)
    }

    pub fn delete_tags<S: AsRef<str>>(&self, contact: &mut Contact, tags: &[S]) -> Result<bool, ApiError> {
        let response = self.crm.execute(self.client().build_delete_tags(contact, tags)?)?;
        self.client().parse_delete_tags(contact, response)
    }

    pub fn notes(&self, contact: &Contact) -> Result<Vec<Note>, ApiError> {
        let response = self.crm.execute(self.client().build_notes(contact)?)?;
        self.client().parse_notes(response)
    }

    /// `update_attributes` followed by `save`.
    pub fn update(&self, contact: &mut Contact, options: &Map<String, Value>) -> Result<(), ApiError> {
        contact.update_attributes(options)?;
        self.save(contact)
    }

    pub fn save(&self, contact: &mut Contact) -> Result<(), ApiError> {
        let response = self.crm.execute(self.client().build_save(contact)?)?;
        self.client().parse_save(contact, response)
    }

    pub fn change_owner(&self, contact: &mut Contact, owner_email: &str) -> Result<(), ApiError> {
        let response = self
            .crm
            .execute(self.client().build_change_owner(contact, owner_email)?)?;
        log_not_found(self.client().parse_change_owner(contact, response))
    }
}

/// Task operations.
pub struct Tasks<'a, T> {
    crm: &'a Crm<T>,
}

impl<T: Transport> Tasks<'_, T> {
    fn client(&self) -> &TaskClient {
        &self.crm.tasks
    }

    pub fn list(&self) -> Result<Listing<Task>, ApiError> {
        let response = self.crm.execute(self.client().build_list())?;
        self.client().parse_list(response)
    }

    pub fn pending(&self) -> Result<Listing<Task>, ApiError> {
        let response = self.crm.execute(self.client().build_pending())?;
        self.client().parse_list(response)
    }

    pub fn find(&self, id: i64) -> Result<Task, ApiError> {
        let response = self.crm.execute(self.client().build_find(id))?;
        log_not_found(self.client().parse_find(response))
    }

    pub fn create(&self, task: &Task) -> Result<Option<Task>, ApiError> {
        let response = self.crm.execute(self.client().build_create(task)?)?;
        self.client().parse_create(response)
    }

    pub fn delete(&self, id: i64) -> Result<HttpResponse, ApiError> {
        self.crm.execute(self.client().build_delete(id))
    }

    pub fn destroy(&self, task: &Task) -> Result<HttpResponse, ApiError> {
        self.crm.execute(self.client().build_destroy(task)?)
    }

    pub fn update(&self, task: &mut Task, options: &Map<String, Value>) -> Result<(), ApiError> {
        let request = self.client().build_update(task, options)?;
        let response = self.crm.execute(request)?;
        self.client().parse_update(task, response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;
    use serde_json::json;
    use std::cell::RefCell;

    /// Replays canned responses and records what was sent.
    struct Scripted {
        responses: RefCell<Vec<HttpResponse>>,
        sent: RefCell<Vec<HttpRequest>>,
    }

    impl Scripted {
        fn new(responses: Vec<(u16, &str)>) -> Self {
            let responses = responses
                .into_iter()
                .rev()
                .map(|(status, body)| HttpResponse {
                    status,
                    headers: Vec::new(),
                    body: body.to_string(),
                })
                .collect();
            Self {
                responses: RefCell::new(responses),
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    impl Transport for Scripted {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
            self.sent.borrow_mut().push(request.clone());
            self.responses
                .borrow_mut()
                .pop()
                .ok_or_else(|| ApiError::Transport("no scripted response left".to_string()))
        }
    }

    const BASE: &str = "http://crm.test/dev/api";

    #[test]
    fn update_applies_locally_then_saves() {
        let transport = Scripted::new(vec![(
            200,
            r#"{"id":123,"properties":[{"type":"SYSTEM","name":"first_name","value":"Foo!"}],"updated_time":7}"#,
        )]);
        let crm = Crm::new(BASE, &transport);
        let mut contact = Contact::from_json(json!({
            "id": 123,
            "properties": [{"type": "SYSTEM", "name": "first_name", "value": "Anita"}]
        }))
        .unwrap();

        let options = match json!({"first_name": "Foo!"}) {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        crm.contacts().update(&mut contact, &options).unwrap();

        let sent = transport.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].method, HttpMethod::Put);
        let body: Value = serde_json::from_str(sent[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(body["properties"][0]["value"], "Foo!");
        assert_eq!(contact.extra["updated_time"], json!(7));
    }

    #[test]
    fn transport_failures_propagate() {
        let transport = Scripted::new(Vec::new());
        let crm = Crm::new(BASE, &transport);
        let err = crm.tasks().find(1).unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
    }

    #[test]
    fn delete_returns_raw_response() {
        let transport = Scripted::new(vec![(204, "")]);
        let crm = Crm::new(BASE, &transport);
        let response = crm.contacts().delete(123).unwrap();
        assert_eq!(response.status, 204);
        assert_eq!(transport.sent.borrow()[0].path, format!("{BASE}/contacts/123"));
    }

    #[test]
    fn from_config_targets_domain_with_credentials() {
        let crm = Crm::from_config(&CrmConfig::for_domain("acme", "user@example.com", "secret-key"));
        assert_eq!(
            crm.contacts.build_list().path,
            "https://acme.agilecrm.com/dev/api/contacts"
        );
        assert_eq!(
            crm.tasks.build_pending().path,
            "https://acme.agilecrm.com/dev/api/tasks"
        );
        let debug = format!("{crm:?}");
        assert!(debug.contains("authenticated: true"));
        assert!(!debug.contains("secret-key"));
    }
}
