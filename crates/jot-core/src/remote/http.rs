//! reqwest implementation of the remote note contract

use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};

use super::{ApiError, ApiResult, ApiSession, RemoteNote, RemoteNoteApi, UpsertRequest};
use crate::models::NoteType;
use crate::util::compact_text;

const HTTP_TIMEOUT_SECS: u64 = 15;

/// HTTP client for the note service's `/notes` resource
#[derive(Clone)]
pub struct HttpNoteApi {
    client: reqwest::Client,
}

impl HttpNoteApi {
    pub fn new() -> ApiResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|error| ApiError {
                code: None,
                message: format!("failed to build HTTP client: {error}"),
                unreachable: false,
            })?;
        Ok(Self { client })
    }

    fn notes_url(session: &ApiSession) -> String {
        format!("{}/notes", session.base_url)
    }

    async fn send(request: RequestBuilder, session: &ApiSession) -> ApiResult<Response> {
        let response = request
            .bearer_auth(&session.token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|error| classify_transport_error(&error))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body))
    }
}

impl RemoteNoteApi for HttpNoteApi {
    async fn list(
        &self,
        session: &ApiSession,
        note_type: NoteType,
        archived: bool,
    ) -> ApiResult<Vec<RemoteNote>> {
        let request = self.client.get(Self::notes_url(session)).query(&[
            ("type", note_type.as_str()),
            ("archived", if archived { "true" } else { "false" }),
        ]);
        let response = Self::send(request, session).await?;
        response.json().await.map_err(|error| decode_error(&error))
    }

    async fn list_by_ids(
        &self,
        session: &ApiSession,
        ids: &[String],
    ) -> ApiResult<Vec<RemoteNote>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let request = self
            .client
            .get(Self::notes_url(session))
            .query(&[("ids", ids.join(","))]);
        let response = Self::send(request, session).await?;
        response.json().await.map_err(|error| decode_error(&error))
    }

    async fn upsert(
        &self,
        session: &ApiSession,
        body: &UpsertRequest,
    ) -> ApiResult<RemoteNote> {
        let request = self.client.post(Self::notes_url(session)).json(body);
        let response = Self::send(request, session).await?;
        response.json().await.map_err(|error| decode_error(&error))
    }

    async fn delete(&self, session: &ApiSession, ids: &[String]) -> ApiResult<()> {
        let request = self
            .client
            .delete(Self::notes_url(session))
            .json(&DeleteRequest { ids });
        Self::send(request, session).await?;
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct DeleteRequest<'a> {
    ids: &'a [String],
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: Option<String>,
    message: Option<String>,
}

fn classify_transport_error(error: &reqwest::Error) -> ApiError {
    if error.is_connect() || error.is_timeout() || error.is_request() {
        ApiError::unreachable(format!("note service unreachable: {error}"))
    } else {
        ApiError {
            code: error.status().map(|status| status.as_u16()),
            message: format!("note service request failed: {error}"),
            unreachable: false,
        }
    }
}

fn decode_error(error: &reqwest::Error) -> ApiError {
    ApiError {
        code: None,
        message: format!("invalid note service response: {error}"),
        unreachable: false,
    }
}

const fn is_unavailable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 502..=504)
}

fn status_error(status: StatusCode, body: &str) -> ApiError {
    let message = parse_api_error(status, body);
    if is_unavailable_status(status) {
        ApiError {
            code: Some(status.as_u16()),
            message,
            unreachable: true,
        }
    } else {
        ApiError::rejected(status.as_u16(), message)
    }
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<ApiErrorBody>(body) {
        if let Some(message) = payload.message.or(payload.error) {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
