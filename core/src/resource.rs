//! Request/response plumbing shared by the contact and task clients.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, CONTENT_TYPE_FORM, CONTENT_TYPE_JSON};
use crate::types::Listing;

/// Base URL with any trailing slash removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct BaseUrl(String);

impl BaseUrl {
    pub(crate) fn new(base_url: &str) -> Self {
        Self(base_url.trim_end_matches('/').to_string())
    }

    pub(crate) fn join(&self, path: &str) -> String {
        format!("{}/{path}", self.0)
    }

    pub(crate) fn get(&self, path: &str) -> HttpRequest {
        HttpRequest::without_body(HttpMethod::Get, self.join(path))
    }

    pub(crate) fn delete(&self, path: &str) -> HttpRequest {
        HttpRequest::without_body(HttpMethod::Delete, self.join(path))
    }

    pub(crate) fn json<T: Serialize + ?Sized>(
        &self,
        method: HttpMethod,
        path: &str,
        payload: &T,
    ) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(payload).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest::with_body(method, self.join(path), CONTENT_TYPE_JSON, body))
    }

    pub(crate) fn form(&self, path: &str, fields: &[(&str, &str)]) -> Result<HttpRequest, ApiError> {
        let body = serde_urlencoded::to_string(fields).map_err(|e| ApiError::Serialization(e.to_string()))?;
        Ok(HttpRequest::with_body(HttpMethod::Post, self.join(path), CONTENT_TYPE_FORM, body))
    }
}

/// Map a non-matching status to `HttpError`.
pub(crate) fn check_status(response: &HttpResponse, expected: u16) -> Result<(), ApiError> {
    if response.status == expected {
        return Ok(());
    }
    Err(ApiError::HttpError {
        status: response.status,
        body: response.body.clone(),
    })
}

pub(crate) fn decode<T: DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::Deserialization(e.to_string()))
}

/// 200 decodes to items; anything else comes back untouched.
pub(crate) fn parse_listing<T: DeserializeOwned>(response: HttpResponse) -> Result<Listing<T>, ApiError> {
    if response.status != 200 {
        return Ok(Listing::Raw(response));
    }
    Ok(Listing::Items(decode(response.json()?)?))
}

/// 200 decodes the resource, 204 means the id is unknown.
pub(crate) fn parse_found<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    match response.status {
        200 => decode(response.json()?),
        204 => Err(ApiError::not_found(response)),
        _ => Err(ApiError::HttpError {
            status: response.status,
            body: response.body,
        }),
    }
}

/// 200 decodes the resource; any other status yields `None`.
pub(crate) fn parse_optional<T: DeserializeOwned>(response: HttpResponse) -> Result<Option<T>, ApiError> {
    if response.status != 200 {
        return Ok(None);
    }
    decode(response.json()?).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Task;

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn trailing_slash_is_stripped() {
        let base = BaseUrl::new("http://localhost:3000/dev/api/");
        assert_eq!(base.join("contacts"), "http://localhost:3000/dev/api/contacts");
    }

    #[test]
    fn form_body_is_urlencoded() {
        let base = BaseUrl::new("http://localhost");
        let req = base
            .form("contacts/add-score", &[("email", "a+b@example.com"), ("score", "-5")])
            .unwrap();
        assert_eq!(req.body.as_deref(), Some("email=a%2Bb%40example.com&score=-5"));
        assert_eq!(req.content_type(), Some(CONTENT_TYPE_FORM));
    }

    #[test]
    fn listing_passes_non_200_through() {
        let raw = response(401, "unauthorized");
        let listing: Listing<Task> = parse_listing(raw.clone()).unwrap();
        assert_eq!(listing, Listing::Raw(raw));
    }

    #[test]
    fn found_maps_204_to_not_found() {
        let err = parse_found::<Task>(response(204, "")).unwrap_err();
        match err {
            ApiError::NotFound { response, message } => {
                assert_eq!(response.status, 204);
                assert!(message.is_none());
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn found_bad_json() {
        let err = parse_found::<Task>(response(200, "not json")).unwrap_err();
        assert!(matches!(err, ApiError::Deserialization(_)));
    }

    #[test]
    fn optional_is_none_on_failure_status() {
        assert_eq!(parse_optional::<Task>(response(500, "boom")).unwrap(), None);
        let task = parse_optional::<Task>(response(200, r#"{"id":1}"#)).unwrap().unwrap();
        assert_eq!(task.id, Some(1));
    }
}
