// src/api/mod.rs

pub mod appointments;
pub mod calendar;
pub mod http;
pub mod patients;

pub use appointments::AppointmentPayload;
pub use calendar::CalendarSync;
pub use http::HmsApi;
pub use patients::{DoctorSummary, PatientSummary, seed_doctors};
