// src/api/appointments.rs

use chrono::NaiveDate;
use serde::Serialize;

use crate::{
    api::http::{HmsApi, Listing},
    error::ApiError,
    models::{AppointmentStatus, RawAppointment},
};

/// Body for create/update. Patient and doctor are the backend's integer
/// ids; `time` stays "HH:MM" the way the form produced it.
#[derive(Debug, Clone, Serialize)]
pub struct AppointmentPayload {
    pub patient: i64,
    pub doctor: i64,
    pub date: NaiveDate,
    pub time: String,
    pub status: AppointmentStatus,
}

impl HmsApi {
    pub async fn list_appointments(&self) -> Result<Vec<RawAppointment>, ApiError> {
        let listing: Listing<RawAppointment> = self.get_json("/appointments/").await?;
        Ok(listing.into_vec())
    }

    pub async fn create_appointment(
        &self,
        payload: &AppointmentPayload,
    ) -> Result<RawAppointment, ApiError> {
        let body = serde_json::to_value(payload)
            .map_err(|e| ApiError::Unexpected(e.to_string()))?;
        self.post_json("/appointments/", &body).await
    }

    pub async fn update_appointment(
        &self,
        id: i64,
        payload: &AppointmentPayload,
    ) -> Result<RawAppointment, ApiError> {
        let body = serde_json::to_value(payload)
            .map_err(|e| ApiError::Unexpected(e.to_string()))?;
        self.patch_json(&format!("/appointments/{id}/"), &body).await
    }

    pub async fn delete_appointment(&self, id: i64) -> Result<(), ApiError> {
        self.delete(&format!("/appointments/{id}/")).await
    }
}
