// src/api/patients.rs

use serde::{Deserialize, Serialize};

use crate::{
    api::http::{HmsApi, Listing},
    error::ApiError,
};

/// Lookup row for the appointment form's patient select.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PatientSummary {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub unique_id: String,
}

impl PatientSummary {
    pub fn display(&self) -> String {
        format!("{} {} ({})", self.first_name, self.last_name, self.unique_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorSummary {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
}

impl DoctorSummary {
    pub fn display(&self) -> String {
        format!("Dr. {} {}", self.first_name, self.last_name)
    }
}

/// Seed roster used when the backend has no doctor-list endpoint. An
/// explicit documented fallback, not a bug: the deployment ships without
/// /doctors/ until staff management lands.
pub fn seed_doctors() -> Vec<DoctorSummary> {
    vec![
        DoctorSummary {
            id: 1,
            first_name: "John".to_string(),
            last_name: "Smith".to_string(),
            username: "dr_smith".to_string(),
        },
        DoctorSummary {
            id: 2,
            first_name: "Sarah".to_string(),
            last_name: "Johnson".to_string(),
            username: "dr_johnson".to_string(),
        },
        DoctorSummary {
            id: 3,
            first_name: "Michael".to_string(),
            last_name: "Brown".to_string(),
            username: "dr_brown".to_string(),
        },
    ]
}

impl HmsApi {
    pub async fn list_patients(&self, page_size: u32) -> Result<Vec<PatientSummary>, ApiError> {
        let listing: Listing<PatientSummary> = self
            .get_json_query("/patients/", &[("page_size", page_size.to_string())])
            .await?;
        Ok(listing.into_vec())
    }

    /// Doctor lookup; degrades to the seed roster when the endpoint is
    /// missing.
    pub async fn list_doctors(&self) -> Result<Vec<DoctorSummary>, ApiError> {
        match self.get_json::<Listing<DoctorSummary>>("/doctors/").await {
            Ok(listing) => Ok(listing.into_vec()),
            Err(ApiError::NotFound(_)) => {
                tracing::debug!("no /doctors/ endpoint, using seed roster");
                Ok(seed_doctors())
            }
            Err(err) => Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::extract::Query;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;
    use std::collections::HashMap;

    use super::*;
    use crate::testutil::{spawn_backend, test_config};

    #[tokio::test]
    async fn test_list_patients_passes_page_size() {
        let router = Router::new().route(
            "/api/patients/",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("page_size").map(String::as_str), Some("100"));
                Json(json!({
                    "count": 1,
                    "results": [{
                        "id": 5, "first_name": "Jane", "last_name": "Doe",
                        "unique_id": "P0005"
                    }]
                }))
            }),
        );
        let base = spawn_backend(router).await;
        let api = HmsApi::new(&test_config(&base)).unwrap();

        let patients = api.list_patients(100).await.unwrap();
        assert_eq!(patients.len(), 1);
        assert_eq!(patients[0].display(), "Jane Doe (P0005)");
    }

    #[tokio::test]
    async fn test_list_doctors_falls_back_to_seed_roster() {
        // No /doctors/ route at all: 404 must degrade, not error.
        let base = spawn_backend(Router::new()).await;
        let api = HmsApi::new(&test_config(&base)).unwrap();

        let doctors = api.list_doctors().await.unwrap();
        assert_eq!(doctors, seed_doctors());
        assert_eq!(doctors[0].display(), "Dr. John Smith");
    }

    #[tokio::test]
    async fn test_list_doctors_prefers_backend_when_present() {
        let router = Router::new().route(
            "/api/doctors/",
            get(|| async {
                Json(json!([{
                    "id": 40, "first_name": "Ada", "last_name": "Wong",
                    "username": "dr_wong"
                }]))
            }),
        );
        let base = spawn_backend(router).await;
        let api = HmsApi::new(&test_config(&base)).unwrap();

        let doctors = api.list_doctors().await.unwrap();
        assert_eq!(doctors.len(), 1);
        assert_eq!(doctors[0].id, 40);
    }
}
