use crate::{api::CalendarSync, models::Appointment};

/// Outcome of one batch run. Partial success is the expected case, not an
/// error state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub success: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

impl SyncReport {
    pub fn total(&self) -> usize {
        self.success + self.failed
    }
}

/// Drives the sync client across a list of appointments, one at a time.
/// Sequential on purpose: volumes are tens, and the backend may rate-limit
/// the provider. One appointment failing never aborts the batch.
pub struct SyncOrchestrator {
    calendar: CalendarSync,
}

impl SyncOrchestrator {
    pub fn new(calendar: CalendarSync) -> Self {
        Self { calendar }
    }

    pub async fn sync_many(&self, appointments: &[Appointment]) -> SyncReport {
        let mut report = SyncReport::default();

        for appt in appointments {
            let Some(id) = appt.id else {
                report.failed += 1;
                report
                    .errors
                    .push(format!("Appointment {} has no ID", appt.patient_name));
                continue;
            };

            match self.calendar.sync_appointment(id).await {
                Ok(event_id) => {
                    tracing::debug!("synced appointment {id} as event {event_id}");
                    report.success += 1;
                }
                Err(err) => {
                    report.failed += 1;
                    report
                        .errors
                        .push(format!("Failed to sync {}: {err}", appt.patient_name));
                }
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;
    use crate::api::HmsApi;
    use crate::models::fixtures::appointment;
    use crate::testutil::{spawn_backend, test_config};

    // Backend that accepts even appointment ids and rejects odd ones.
    async fn orchestrator() -> SyncOrchestrator {
        let router = Router::new().route(
            "/api/google-calendar/sync/",
            post(|Json(body): Json<Value>| async move {
                let id = body["appointment_id"].as_i64().unwrap_or(0);
                if id % 2 == 0 {
                    Ok(Json(json!({"event_id": format!("evt_{id}")})))
                } else {
                    Err(StatusCode::BAD_GATEWAY)
                }
            }),
        );
        let base = spawn_backend(router).await;
        let cfg = test_config(&base);
        SyncOrchestrator::new(CalendarSync::new(HmsApi::new(&cfg).unwrap(), &cfg))
    }

    #[tokio::test]
    async fn test_counts_are_conserved() {
        let orchestrator = orchestrator().await;
        let appointments = vec![
            appointment(2, "2025-09-01"),
            appointment(3, "2025-09-02"),
            appointment(4, "2025-09-03"),
            appointment(5, "2025-09-04"),
        ];

        let report = orchestrator.sync_many(&appointments).await;
        assert_eq!(report.success, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.total(), appointments.len());
        assert_eq!(report.errors.len(), report.failed);
    }

    #[tokio::test]
    async fn test_missing_id_counts_as_failed() {
        let orchestrator = orchestrator().await;
        let mut draft = appointment(1, "2025-09-01");
        draft.id = None;
        draft.patient_name = "X".to_string();

        let report = orchestrator.sync_many(&[draft]).await;
        assert_eq!(report.success, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.errors, vec!["Appointment X has no ID".to_string()]);
    }

    #[tokio::test]
    async fn test_failure_does_not_abort_batch() {
        let orchestrator = orchestrator().await;
        let appointments = vec![
            appointment(1, "2025-09-01"), // rejected
            appointment(2, "2025-09-02"), // accepted
        ];

        let report = orchestrator.sync_many(&appointments).await;
        assert_eq!(report.success, 1);
        assert_eq!(report.failed, 1);
        assert!(report.errors[0].starts_with("Failed to sync Jane Doe"));
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let orchestrator = orchestrator().await;
        let report = orchestrator.sync_many(&[]).await;
        assert_eq!(report, SyncReport::default());
    }
}
