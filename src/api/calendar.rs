// src/api/calendar.rs

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::{
    api::http::HmsApi,
    config::Config,
    error::ApiError,
    models::{Appointment, AppointmentStatus},
};

/// Popup geometry the host shell should use for the consent window.
pub const POPUP_WIDTH: u32 = 600;
pub const POPUP_HEIGHT: u32 = 700;

const EVENT_LOCATION: &str = "Hospital Management System";

/* ============================================================
   Event payloads
   ============================================================ */

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTime {
    pub date_time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendee {
    pub email: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReminder {
    pub method: &'static str,
    pub minutes: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventReminders {
    pub use_default: bool,
    pub overrides: Vec<EventReminder>,
}

/// Provider-event shape derived from an appointment on demand; built
/// transiently per sync call, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEventPayload {
    pub summary: String,
    pub description: String,
    pub start: EventTime,
    pub end: EventTime,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<EventAttendee>>,
    pub reminders: EventReminders,
}

pub fn event_from_appointment(appt: &Appointment) -> CalendarEventPayload {
    let attendees = if appt.contact.email.is_empty() {
        None
    } else {
        Some(vec![EventAttendee {
            email: appt.contact.email.clone(),
            display_name: appt.patient_name.clone(),
        }])
    };

    let notes = if appt.notes.is_empty() { "N/A" } else { &appt.notes };

    CalendarEventPayload {
        summary: format!("{} - {}", appt.kind, appt.patient_name),
        description: format!(
            "Appointment with {}\nPatient ID: {}\nNotes: {}",
            appt.doctor_display(),
            appt.patient_unique_id,
            notes,
        ),
        start: EventTime {
            date_time: appt.start_at().format("%Y-%m-%dT%H:%M:%S").to_string(),
            time_zone: None,
        },
        end: EventTime {
            date_time: appt.end_at().format("%Y-%m-%dT%H:%M:%S").to_string(),
            time_zone: None,
        },
        location: EVENT_LOCATION.to_string(),
        attendees,
        reminders: EventReminders {
            use_default: true,
            overrides: vec![
                EventReminder { method: "popup", minutes: 30 },
                EventReminder { method: "email", minutes: 60 },
            ],
        },
    }
}

/* ============================================================
   Remote events (range query / import)
   ============================================================ */

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RemoteEventTime {
    #[serde(rename = "dateTime")]
    pub date_time: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteEvent {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub start: RemoteEventTime,
    #[serde(default)]
    pub end: Option<RemoteEventTime>,
}

/// Partial appointment recovered from a provider event; has no backend id
/// until someone actually creates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppointmentDraft {
    pub patient_name: String,
    pub doctor_name: String,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub kind: String,
    pub status: AppointmentStatus,
    pub notes: String,
}

fn parse_event_start(time: &RemoteEventTime) -> (Option<NaiveDate>, Option<NaiveTime>) {
    if let Some(raw) = &time.date_time {
        // "2025-09-25T14:30:00" with or without an offset suffix
        let trimmed = raw.trim_end_matches('Z');
        let naive = NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(&trimmed[..trimmed.len().min(19)], "%Y-%m-%dT%H:%M:%S"));
        if let Ok(dt) = naive {
            return (Some(dt.date()), Some(dt.time()));
        }
    }
    if let Some(raw) = &time.date {
        if let Ok(date) = raw.parse::<NaiveDate>() {
            return (Some(date), None);
        }
    }
    (None, None)
}

/// Inverse of the summary/description convention `event_from_appointment`
/// writes: "Type - Patient" and an "Appointment with ..." description line.
pub fn draft_from_event(event: &RemoteEvent) -> AppointmentDraft {
    let (kind, patient_name) = match event.summary.split_once(" - ") {
        Some((kind, patient)) => (kind.to_string(), patient.to_string()),
        None => ("Appointment".to_string(), "Unknown Patient".to_string()),
    };

    let doctor_name = event
        .description
        .lines()
        .find_map(|line| line.strip_prefix("Appointment with "))
        .unwrap_or("Unknown Doctor")
        .to_string();

    let (date, time) = parse_event_start(&event.start);

    AppointmentDraft {
        patient_name,
        doctor_name,
        date,
        time,
        kind,
        status: AppointmentStatus::Scheduled,
        notes: event.description.clone(),
    }
}

/* ============================================================
   Sync client
   ============================================================ */

/// Thin client for the backend's calendar-bridge endpoints. Every provider
/// call is proxied server-side; this only talks to the local backend.
/// Owns the session-scoped connection flag.
#[derive(Clone)]
pub struct CalendarSync {
    api: HmsApi,
    connected: Arc<AtomicBool>,
    check_timeout: Duration,
}

impl CalendarSync {
    pub fn new(api: HmsApi, cfg: &Config) -> Self {
        Self {
            api,
            connected: Arc::new(AtomicBool::new(false)),
            check_timeout: Duration::from_secs(cfg.connection_check_secs),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Explicit disconnect resets the session flag; revoking access itself
    /// happens on the provider side.
    pub fn disconnect(&self) {
        self.set_connected(false);
    }

    /// Bounded probe of the bridge. Always resolves: timeout, 404 and
    /// network failures all read as "not connected".
    pub async fn check_connection(&self) -> bool {
        #[derive(Deserialize)]
        struct ConnectionStatus {
            #[serde(default)]
            connected: bool,
        }

        let connected = match self
            .api
            .get_json_timeout::<ConnectionStatus>("/google-calendar/connection/", self.check_timeout)
            .await
        {
            Ok(status) => status.connected,
            Err(err) => {
                tracing::debug!("calendar connection check failed: {err}");
                false
            }
        };
        self.set_connected(connected);
        connected
    }

    /// GET the provider consent URL; the host opens it in a popup.
    pub async fn initiate_auth(&self) -> Result<String, ApiError> {
        #[derive(Deserialize)]
        struct AuthUrl {
            auth_url: String,
        }

        let auth: AuthUrl = self
            .api
            .get_json("/google-calendar/auth/")
            .await
            .map_err(|err| {
                tracing::warn!("calendar auth initiation failed: {err}");
                ApiError::AuthInitFailed
            })?;
        Ok(auth.auth_url)
    }

    /// Relay the authorization code; on success the account is linked.
    pub async fn handle_callback(&self, code: &str) -> Result<(), ApiError> {
        self.api
            .post_json::<serde_json::Value>(
                "/google-calendar/callback/",
                &serde_json::json!({ "code": code }),
            )
            .await?;
        self.set_connected(true);
        Ok(())
    }

    /// Push one appointment to the provider. Calling again for the same
    /// appointment updates the event; the backend owns that idempotency.
    pub async fn sync_appointment(&self, appointment_id: i64) -> Result<String, ApiError> {
        #[derive(Deserialize)]
        struct Synced {
            event_id: String,
        }

        let synced: Synced = self
            .api
            .post_json(
                "/google-calendar/sync/",
                &serde_json::json!({ "appointment_id": appointment_id }),
            )
            .await?;
        Ok(synced.event_id)
    }

    /// Remove the provider event for an appointment. Nothing to delete is
    /// success.
    pub async fn delete_event(&self, appointment_id: i64) -> Result<(), ApiError> {
        match self
            .api
            .delete(&format!("/google-calendar/events/{appointment_id}/delete/"))
            .await
        {
            Ok(()) | Err(ApiError::NotFound(_)) => Ok(()),
            Err(err) => Err(err),
        }
    }

    /// Range query; off the critical path, used by import only.
    pub async fn events(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<RemoteEvent>, ApiError> {
        #[derive(Deserialize)]
        struct EventsEnvelope {
            #[serde(default)]
            events: Vec<RemoteEvent>,
        }

        let envelope: EventsEnvelope = self
            .api
            .get_json_query(
                "/google-calendar/events/",
                &[
                    ("start_date", start.to_string()),
                    ("end_date", end.to_string()),
                ],
            )
            .await?;
        Ok(envelope.events)
    }

    pub async fn import_events(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<AppointmentDraft>, ApiError> {
        let events = self.events(start, end).await?;
        Ok(events.iter().map(draft_from_event).collect())
    }
}
