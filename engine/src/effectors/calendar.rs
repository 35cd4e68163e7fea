//! CALENDAR_SHIELD: push a calendar event one day later
//!
//! Talks to a Google Calendar v3 compatible API. The event is fetched, its
//! start and end are shifted by 24 hours and the new times are patched back.
//! Timed events (`dateTime`) and all-day events (`date`) are both handled.

use super::{Effector, EffectorError};
use crate::config::CalendarConfig;
use crate::secrets::{self, CalendarCredentials, SecretSource};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate};
use reqwest::Url;
use sdk::types::Action;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

const SERVICE: &str = "calendar";

pub struct CalendarShield {
    config: CalendarConfig,
    secrets: Arc<dyn SecretSource>,
    client: reqwest::Client,
}

impl CalendarShield {
    pub fn new(
        config: CalendarConfig,
        secrets: Arc<dyn SecretSource>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            config,
            secrets,
            client,
        }
    }

    fn credentials(&self) -> Result<CalendarCredentials, EffectorError> {
        let blob = self
            .secrets
            .get_secret(secrets::CALENDAR_CREDENTIALS)
            .ok_or_else(|| EffectorError::NotConfigured(secrets::CALENDAR_CREDENTIALS.to_string()))?;
        CalendarCredentials::parse(&blob).map_err(EffectorError::InvalidInput)
    }

    fn event_url(&self, calendar_id: &str, event_id: &str) -> Result<Url, EffectorError> {
        let mut url = Url::parse(&self.config.base_url).map_err(|e| {
            EffectorError::InvalidInput(format!("invalid calendar base_url: {}", e))
        })?;
        url.path_segments_mut()
            .map_err(|_| EffectorError::InvalidInput("invalid calendar base_url".to_string()))?
            .pop_if_empty()
            .extend(["calendars", calendar_id, "events", event_id]);
        Ok(url)
    }
}

fn network_error(e: reqwest::Error) -> EffectorError {
    EffectorError::network(SERVICE, e)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, EffectorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(EffectorError::Api {
        service: SERVICE,
        status: status.as_u16(),
        body: secrets::scrub(&body),
    })
}

/// Shift one `start`/`end` object by a day, keeping any extra fields such as
/// `timeZone`.
fn shift_time(slot: &Value) -> Result<Value, EffectorError> {
    let mut shifted = slot.clone();

    if let Some(date_time) = slot.get("dateTime").and_then(Value::as_str) {
        let parsed = DateTime::parse_from_rfc3339(date_time).map_err(|e| {
            EffectorError::InvalidInput(format!("unparseable event time {}: {}", date_time, e))
        })?;
        shifted["dateTime"] = json!((parsed + Duration::hours(24)).to_rfc3339());
        return Ok(shifted);
    }

    if let Some(date) = slot.get("date").and_then(Value::as_str) {
        let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|e| {
            EffectorError::InvalidInput(format!("unparseable event date {}: {}", date, e))
        })?;
        shifted["date"] = json!((parsed + Duration::days(1)).format("%Y-%m-%d").to_string());
        return Ok(shifted);
    }

    Err(EffectorError::InvalidInput(
        "event has no dateTime or date".to_string(),
    ))
}

fn display_time(slot: &Value) -> &str {
    slot.get("dateTime")
        .or_else(|| slot.get("date"))
        .and_then(Value::as_str)
        .unwrap_or("unknown")
}

#[async_trait]
impl Effector for CalendarShield {
    fn name(&self) -> &str {
        "calendar_shield"
    }

    async fn apply(&self, action: &Action) -> Result<String, EffectorError> {
        let event_id = action.value.trim();
        if event_id.is_empty() {
            return Err(EffectorError::InvalidInput(
                "calendar event id is empty".to_string(),
            ));
        }

        let creds = self.credentials()?;
        let url = self.event_url(&creds.calendar_id, event_id)?;

        let response = self
            .client
            .get(url.clone())
            .bearer_auth(&creds.access_token)
            .send()
            .await
            .map_err(network_error)?;
        let event: Value = check_status(response)
            .await?
            .json()
            .await
            .map_err(network_error)?;

        let start = event
            .get("start")
            .ok_or_else(|| EffectorError::InvalidInput("event has no start".to_string()))?;
        let end = event
            .get("end")
            .ok_or_else(|| EffectorError::InvalidInput("event has no end".to_string()))?;

        let patch = json!({
            "start": shift_time(start)?,
            "end": shift_time(end)?,
        });

        let response = self
            .client
            .patch(url)
            .bearer_auth(&creds.access_token)
            .json(&patch)
            .send()
            .await
            .map_err(network_error)?;

        if let Err(e) = check_status(response).await {
            warn!("Calendar patch for event {} failed: {}", event_id, e);
            return Err(e);
        }

        let new_start = display_time(&patch["start"]);
        info!("Calendar event {} moved to {}", event_id, new_start);
        Ok(format!("Calendar event {} moved to {}", event_id, new_start))
    }
}
