//! HTTP implementations of the REST collaborators.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, Response, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::auth::CredentialStore;
use crate::error::{ClientError, ClientResult};
use crate::models::booking::{Booking, BookingFilter, BookingStats, NewBooking};
use crate::models::chat::ChatMessage;
use crate::models::grid::AvailabilitySnapshot;
use crate::models::open_match::OpenMatch;
use crate::repositories::{BookingService, ChatHistoryService, MatchService};

/// Shared HTTP core: bearer attachment, one refresh-and-retry on 401, and
/// status mapping into the client error taxonomy.
#[derive(Clone)]
pub struct RestClient {
    http: reqwest::Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl RestClient {
    pub fn new(base_url: &str, credentials: Arc<dyn CredentialStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    async fn request<B: Serialize>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&B>,
    ) -> ClientResult<Response> {
        let url = format!("{}{}", self.base_url, path);
        let mut refreshed = false;

        loop {
            let mut request = self.http.request(method.clone(), &url);
            if !query.is_empty() {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }
            if let Some(token) = self.credentials.access_token().await {
                request = request.bearer_auth(token);
            }

            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                if !refreshed && self.credentials.refresh_access_token().await.is_some() {
                    refreshed = true;
                    debug!(path, "retrying after token refresh");
                    continue;
                }
                return Err(ClientError::AuthRequired);
            }
            if status.is_client_error() {
                let body = response.text().await.unwrap_or_default();
                return Err(ClientError::Rejected(extract_message(&body)));
            }
            return Ok(response.error_for_status()?);
        }
    }

    async fn get(&self, path: &str, query: &[(&str, String)]) -> ClientResult<Response> {
        self.request::<()>(Method::GET, path, query, None).await
    }

    async fn post<B: Serialize>(&self, path: &str, body: Option<&B>) -> ClientResult<Response> {
        self.request(Method::POST, path, &[], body).await
    }

    async fn delete(&self, path: &str) -> ClientResult<()> {
        self.request::<()>(Method::DELETE, path, &[], None).await?;
        Ok(())
    }
}

/// Best human-readable message out of a rejection body. The service answers
/// with `{"detail": ...}`, field-error maps, or plain text depending on the
/// failure.
fn extract_message(body: &str) -> String {
    let Ok(value) = serde_json::from_str::<Value>(body) else {
        return fallback_message(body);
    };
    if let Some(detail) = value.get("detail").and_then(Value::as_str) {
        return detail.to_string();
    }
    if let Some(object) = value.as_object() {
        for entry in object.values() {
            match entry {
                Value::String(message) => return message.clone(),
                Value::Array(items) => {
                    if let Some(message) = items.iter().find_map(Value::as_str) {
                        return message.to_string();
                    }
                }
                _ => {}
            }
        }
    }
    fallback_message(body)
}

fn fallback_message(body: &str) -> String {
    if body.trim().is_empty() {
        "request rejected".to_string()
    } else {
        body.trim().to_string()
    }
}

pub struct RestBookingService {
    client: RestClient,
}

impl RestBookingService {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BookingService for RestBookingService {
    async fn list_bookings(&self, filter: &BookingFilter) -> ClientResult<Vec<Booking>> {
        let response = self.client.get("/api/bookings/bookings/", &[]).await?;
        let mut bookings: Vec<Booking> = response.json().await?;
        if let Some(court_id) = filter.court_id {
            bookings.retain(|b| b.court_id() == Some(court_id));
        }
        if let Some(status) = filter.status {
            bookings.retain(|b| b.status == status);
        }
        Ok(bookings)
    }

    async fn create_booking(&self, new: &NewBooking) -> ClientResult<Booking> {
        let response = self
            .client
            .post("/api/bookings/bookings/", Some(new))
            .await?;
        Ok(response.json().await?)
    }

    async fn delete_booking(&self, id: i64) -> ClientResult<()> {
        self.client
            .delete(&format!("/api/bookings/bookings/{}/", id))
            .await
    }

    async fn weekly_availability(
        &self,
        court_id: i64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> ClientResult<AvailabilitySnapshot> {
        let response = self
            .client
            .get(
                &format!("/api/courts/{}/weekly-availability/", court_id),
                &[
                    ("start_date", start.to_rfc3339()),
                    ("end_date", end.to_rfc3339()),
                ],
            )
            .await?;
        Ok(response.json().await?)
    }

    async fn stats(&self) -> ClientResult<BookingStats> {
        let response = self.client.get("/api/bookings/stats/", &[]).await?;
        Ok(response.json().await?)
    }
}

pub struct RestMatchService {
    client: RestClient,
}

impl RestMatchService {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[derive(Serialize)]
struct RemoveParticipantRequest {
    user_id: i64,
}

#[async_trait]
impl MatchService for RestMatchService {
    async fn list_open_matches(&self) -> ClientResult<Vec<OpenMatch>> {
        let response = self.client.get("/api/matches/open-matches/", &[]).await?;
        Ok(response.json().await?)
    }

    async fn join_match(&self, id: i64) -> ClientResult<()> {
        self.client
            .post::<()>(&format!("/api/matches/open-matches/{}/join/", id), None)
            .await?;
        Ok(())
    }

    async fn leave_match(&self, id: i64) -> ClientResult<()> {
        self.client
            .post::<()>(&format!("/api/matches/open-matches/{}/leave/", id), None)
            .await?;
        Ok(())
    }

    async fn cancel_match(&self, id: i64) -> ClientResult<()> {
        self.client
            .post::<()>(&format!("/api/matches/open-matches/{}/cancel/", id), None)
            .await?;
        Ok(())
    }

    async fn remove_participant(&self, id: i64, user_id: i64) -> ClientResult<()> {
        self.client
            .post(
                &format!("/api/matches/open-matches/{}/remove_participant/", id),
                Some(&RemoveParticipantRequest { user_id }),
            )
            .await?;
        Ok(())
    }
}

pub struct RestChatHistoryService {
    client: RestClient,
}

impl RestChatHistoryService {
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ChatHistoryService for RestChatHistoryService {
    async fn list_messages(&self, match_id: i64) -> ClientResult<Vec<ChatMessage>> {
        let response = self
            .client
            .get(
                "/api/chat/messages/",
                &[("match_id", match_id.to_string())],
            )
            .await?;
        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_message_prefers_detail() {
        assert_eq!(
            extract_message(r#"{"detail": "Not a participant"}"#),
            "Not a participant"
        );
    }

    #[test]
    fn extract_message_reads_field_errors() {
        assert_eq!(
            extract_message(r#"{"non_field_errors": ["Slot no longer available"]}"#),
            "Slot no longer available"
        );
        assert_eq!(
            extract_message(r#"{"end_time": "must be after start"}"#),
            "must be after start"
        );
    }

    #[test]
    fn extract_message_falls_back_to_raw_body() {
        assert_eq!(extract_message("oops"), "oops");
        assert_eq!(extract_message(""), "request rejected");
        assert_eq!(extract_message(r#"{"count": 3}"#), r#"{"count": 3}"#);
    }
}
