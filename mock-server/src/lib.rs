//! In-memory fake of the Agile CRM REST API, mounted under `/dev/api`.
//!
//! Contacts, notes and tasks are stored as raw JSON so the fake accepts
//! whatever shape the client sends, the way the real service does. The
//! store is seeded with a known contact (id 123, Anita Drink), a second
//! contact, notes and tasks so tests can run against fixed ids.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const API_PREFIX: &str = "/dev/api";
pub const OWNER_NOT_FOUND: &str = "Owner with this email does not exist";
pub const KNOWN_OWNER: &str = "new_owner@example.com";

const TAG_TIME: i64 = 1_400_000_000_000;

#[derive(Debug, Default)]
pub struct Store {
    pub contacts: BTreeMap<i64, Value>,
    pub notes: BTreeMap<i64, Vec<Value>>,
    pub tasks: BTreeMap<i64, Value>,
    pub owners: Vec<Value>,
    next_id: i64,
}

impl Store {
    pub fn seeded() -> Self {
        let mut store = Store {
            next_id: 1000,
            ..Store::default()
        };
        store.contacts.insert(
            123,
            json!({
                "id": 123,
                "type": "PERSON",
                "tags": ["sales", "rspec", "new"],
                "tagsWithTime": tags_with_time(&["sales", "rspec", "new"]),
                "lead_score": 0,
                "star_value": 0,
                "properties": [
                    {"type": "SYSTEM", "name": "first_name", "value": "Anita"},
                    {"type": "SYSTEM", "name": "last_name", "value": "Drink"},
                    {"type": "SYSTEM", "name": "email", "value": "anitadrink@example.com", "subtype": "work"},
                    {"type": "SYSTEM", "name": "phone", "value": "1231111111", "subtype": "home"},
                    {"type": "SYSTEM", "name": "phone", "value": "1232222222", "subtype": "mobile"},
                    {"type": "CUSTOM", "name": "user_name", "value": "Anita"}
                ],
                "owner": {"email": "owner@example.com", "name": "Original Owner"}
            }),
        );
        store.contacts.insert(
            124,
            json!({
                "id": 124,
                "type": "PERSON",
                "tags": [],
                "lead_score": 5,
                "properties": [
                    {"type": "SYSTEM", "name": "first_name", "value": "Bob"},
                    {"type": "SYSTEM", "name": "email", "value": "bob@example.com"}
                ]
            }),
        );
        store.notes.insert(
            123,
            vec![
                json!({"id": 1, "subject": "Intro call", "description": "Talked about pricing", "created_time": 1400000000}),
                json!({"id": 2, "subject": "Follow up", "description": "Sent brochure", "created_time": 1400000500}),
            ],
        );
        store.tasks.insert(
            123,
            json!({"id": 123, "type": "CALL", "priority_type": "HIGH", "status": "YET_TO_START", "subject": "Call Anita", "due": 1400000000}),
        );
        store.tasks.insert(
            124,
            json!({"id": 124, "type": "EMAIL", "priority_type": "LOW", "status": "COMPLETED", "subject": "Send recap", "due": 1400000000}),
        );
        store.owners.push(json!({"email": KNOWN_OWNER, "name": "New Owner"}));
        store
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn contact_by_email(&mut self, email: &str) -> Option<&mut Value> {
        self.contacts
            .values_mut()
            .find(|contact| property_values(contact, "email").any(|v| v == email))
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    app_with(Store::seeded())
}

pub fn app_with(store: Store) -> Router {
    let db: Db = Arc::new(RwLock::new(store));
    let api = Router::new()
        .route("/contacts", get(list_contacts).post(create_contact).put(update_contact))
        .route("/contacts/{id}", get(get_contact).delete(delete_contact))
        .route("/contacts/{id}/notes", get(contact_notes))
        .route("/contacts/search/email", post(search_by_email))
        .route("/contacts/add-score", post(add_score))
        .route("/contacts/delete/tags", put(delete_tags))
        .route("/contacts/change-owner", post(change_owner))
        .route("/search", get(search))
        .route("/tasks", get(pending_tasks).post(create_task).put(update_task))
        .route("/tasks/all", get(all_tasks))
        .route("/tasks/{id}", get(get_task).delete(delete_task))
        .with_state(db);
    Router::new().nest(API_PREFIX, api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

fn property_values<'a>(contact: &'a Value, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
    contact["properties"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(move |p| p["name"] == name)
        .filter_map(|p| p["value"].as_str())
}

fn tags_with_time(tags: &[&str]) -> Value {
    Value::Array(
        tags.iter()
            .map(|tag| json!({"tag": tag, "createdTime": TAG_TIME}))
            .collect(),
    )
}

fn tag_names(contact: &Value) -> Vec<String> {
    contact["tags"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|t| t.as_str().map(str::to_string))
        .collect()
}

// --- contacts ---

async fn list_contacts(State(db): State<Db>) -> Json<Vec<Value>> {
    let store = db.read().await;
    Json(store.contacts.values().cloned().collect())
}

async fn get_contact(State(db): State<Db>, Path(id): Path<i64>) -> Result<Json<Value>, StatusCode> {
    let store = db.read().await;
    store.contacts.get(&id).cloned().map(Json).ok_or(StatusCode::NO_CONTENT)
}

async fn contact_notes(State(db): State<Db>, Path(id): Path<i64>) -> Json<Vec<Value>> {
    let store = db.read().await;
    Json(store.notes.get(&id).cloned().unwrap_or_default())
}

async fn create_contact(State(db): State<Db>, Json(mut contact): Json<Value>) -> Result<Json<Value>, StatusCode> {
    let fields = contact.as_object_mut().ok_or(StatusCode::BAD_REQUEST)?;
    let mut store = db.write().await;
    let id = store.allocate_id();
    fields.insert("id".to_string(), json!(id));
    fields.entry("type").or_insert(json!("PERSON"));
    fields.entry("tags").or_insert(json!([]));
    fields.entry("lead_score").or_insert(json!(0));
    let tags = tag_names(&contact);
    let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
    contact["tagsWithTime"] = tags_with_time(&tags);
    store.contacts.insert(id, contact.clone());
    Ok(Json(contact))
}

async fn update_contact(State(db): State<Db>, Json(contact): Json<Value>) -> Result<Json<Value>, StatusCode> {
    let id = contact["id"].as_i64().ok_or(StatusCode::BAD_REQUEST)?;
    let mut store = db.write().await;
    let stored = store.contacts.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    *stored = contact;
    stored["updated_time"] = json!(TAG_TIME / 1000);
    Ok(Json(stored.clone()))
}

async fn delete_contact(State(db): State<Db>, Path(id): Path<i64>) -> StatusCode {
    db.write().await.contacts.remove(&id);
    StatusCode::NO_CONTENT
}

#[derive(Deserialize)]
pub struct EmailSearchForm {
    pub email_ids: String,
}

/// One entry per requested address, `null` where nothing matched.
async fn search_by_email(
    State(db): State<Db>,
    Form(form): Form<EmailSearchForm>,
) -> Result<Json<Vec<Value>>, StatusCode> {
    let emails: Vec<String> = serde_json::from_str(&form.email_ids).map_err(|_| StatusCode::BAD_REQUEST)?;
    let mut store = db.write().await;
    let found = emails
        .iter()
        .map(|email| store.contact_by_email(email).map(|c| c.clone()).unwrap_or(Value::Null))
        .collect();
    Ok(Json(found))
}

#[derive(Deserialize)]
pub struct ScoreForm {
    pub email: String,
    pub score: i64,
}

async fn add_score(State(db): State<Db>, Form(form): Form<ScoreForm>) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let contact = store.contact_by_email(&form.email).ok_or(StatusCode::NO_CONTENT)?;
    let score = contact["lead_score"].as_i64().unwrap_or(0) + form.score;
    contact["lead_score"] = json!(score);
    Ok(Json(contact.clone()))
}

#[derive(Deserialize)]
pub struct DeleteTags {
    pub id: i64,
    pub tags: Vec<String>,
}

async fn delete_tags(State(db): State<Db>, Json(input): Json<DeleteTags>) -> Result<Json<Value>, StatusCode> {
    let mut store = db.write().await;
    let contact = store.contacts.get_mut(&input.id).ok_or(StatusCode::NOT_FOUND)?;
    let remaining: Vec<String> = tag_names(contact)
        .into_iter()
        .filter(|tag| !input.tags.contains(tag))
        .collect();
    let remaining: Vec<&str> = remaining.iter().map(String::as_str).collect();
    contact["tags"] = json!(remaining);
    contact["tagsWithTime"] = tags_with_time(&remaining);
    Ok(Json(contact["tagsWithTime"].clone()))
}

#[derive(Deserialize)]
pub struct ChangeOwnerForm {
    pub owner_email: String,
    pub contact_id: i64,
}

/// Unknown owners get a plain-text 200, as the real service does.
async fn change_owner(State(db): State<Db>, Form(form): Form<ChangeOwnerForm>) -> Response {
    let mut store = db.write().await;
    let Some(owner) = store.owners.iter().find(|o| o["email"] == form.owner_email.as_str()).cloned() else {
        return (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], OWNER_NOT_FOUND).into_response();
    };
    match store.contacts.get_mut(&form.contact_id) {
        Some(contact) => {
            contact["owner"] = owner;
            Json(contact.clone()).into_response()
        }
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

#[derive(Deserialize)]
pub struct SearchQuery {
    pub q: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub page_size: Option<usize>,
}

/// Case-insensitive substring match against every property value.
async fn search(State(db): State<Db>, Query(query): Query<SearchQuery>) -> Json<Vec<Value>> {
    let store = db.read().await;
    let needle = query.q.to_lowercase();
    let kind = query.kind.unwrap_or_else(|| "PERSON".to_string());
    let hits = store
        .contacts
        .values()
        .filter(|c| c["type"] == kind.as_str())
        .filter(|c| {
            c["properties"]
                .as_array()
                .into_iter()
                .flatten()
                .filter_map(|p| p["value"].as_str())
                .any(|v| v.to_lowercase().contains(&needle))
        })
        .take(query.page_size.unwrap_or(10))
        .cloned()
        .collect();
    Json(hits)
}

// --- tasks ---

async fn pending_tasks(State(db): State<Db>) -> Json<Vec<Value>> {
    let store = db.read().await;
    Json(
        store
            .tasks
            .values()
            .filter(|t| t["status"] != "COMPLETED")
            .cloned()
            .collect(),
    )
}

async fn all_tasks(State(db): State<Db>) -> Json<Vec<Value>> {
    let store = db.read().await;
    Json(store.tasks.values().cloned().collect())
}

async fn get_task(State(db): State<Db>, Path(id): Path<i64>) -> Result<Json<Value>, StatusCode> {
    let store = db.read().await;
    store.tasks.get(&id).cloned().map(Json).ok_or(StatusCode::NO_CONTENT)
}

async fn create_task(State(db): State<Db>, Json(mut task): Json<Value>) -> Result<Json<Value>, StatusCode> {
    let fields = task.as_object_mut().ok_or(StatusCode::BAD_REQUEST)?;
    let mut store = db.write().await;
    let id = store.allocate_id();
    fields.insert("id".to_string(), json!(id));
    fields.entry("status").or_insert(json!("YET_TO_START"));
    store.tasks.insert(id, task.clone());
    Ok(Json(task))
}

async fn update_task(State(db): State<Db>, Json(task): Json<Value>) -> Result<Json<Value>, StatusCode> {
    let id = task["id"].as_i64().ok_or(StatusCode::BAD_REQUEST)?;
    let mut store = db.write().await;
    let stored = store.tasks.get_mut(&id).ok_or(StatusCode::NOT_FOUND)?;
    *stored = task;
    Ok(Json(stored.clone()))
}

async fn delete_task(State(db): State<Db>, Path(id): Path<i64>) -> StatusCode {
    db.write().await.tasks.remove(&id);
    StatusCode::NO_CONTENT
}
