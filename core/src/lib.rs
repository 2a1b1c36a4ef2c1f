//! Blocking client for the Agile CRM REST API.
//!
//! # Overview
//! Contacts and tasks with CRUD, search, scoring, tagging and ownership
//! transfer. The interesting part is `properties`: a contact's attributes
//! live in a typed `properties` list, and flat updates such as
//! `{"first_name": "X", "phone": {"value": "...", "subtype": "mobile"}}`
//! are encoded and merged into it slot by slot.
//!
//! # Design
//! - `ContactClient` / `TaskClient` are stateless: `build_*` produces an
//!   `HttpRequest`, `parse_*` consumes an `HttpResponse`.
//! - `Transport` executes requests; `UreqTransport` is the blocking default.
//! - `Crm` wires the two together and is what most callers use.
//! - Listing and search calls hand non-200 responses back as
//!   `Listing::Raw`; lookups of unknown ids fail with `ApiError::NotFound`.

pub mod contact;
pub mod crm;
pub mod error;
pub mod http;
pub mod properties;
mod resource;
pub mod task;
pub mod transport;
pub mod types;
mod wire;

pub use contact::ContactClient;
pub use crm::{Contacts, Crm, Tasks};
pub use error::ApiError;
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use properties::{PropertyEntry, PropertyKind, PropertyValue, Selector};
pub use task::TaskClient;
pub use transport::{CrmConfig, Transport, UreqTransport};
pub use types::{Contact, EmailSearch, Listing, Note, Owner, Priority, Task, TaskStatus, TaskType};
