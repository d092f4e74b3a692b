// src/controllers/form.rs

use std::collections::HashMap;

use chrono::NaiveDate;

use crate::{
    api::{AppointmentPayload, DoctorSummary, HmsApi, PatientSummary, seed_doctors},
    error::ApiError,
    models::{AppointmentStatus, RawAppointment},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Idle,
    LoadingLookups,
    Ready,
    Submitting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Patient,
    Doctor,
    Date,
    Time,
    Status,
}

impl FormField {
    pub fn as_str(&self) -> &'static str {
        match self {
            FormField::Patient => "patient",
            FormField::Doctor => "doctor",
            FormField::Date => "date",
            FormField::Time => "time",
            FormField::Status => "status",
        }
    }
}

/// Field values exactly as the user typed them. Select widgets hand over
/// string ids; translation to integer ids happens at submit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    pub patient: String,
    pub doctor: String,
    pub date: String,
    pub time: String,
    pub status: AppointmentStatus,
}

/// Create/edit appointment form: `Idle -> LoadingLookups -> Ready ->
/// Submitting -> (Ready | Idle)`. A failed submit keeps the form open and
/// editable; nothing the user typed is lost.
pub struct AppointmentForm {
    api: HmsApi,
    state: FormState,
    mode: FormMode,
    appointment_id: Option<i64>,
    pub data: FormData,
    patients: Vec<PatientSummary>,
    doctors: Vec<DoctorSummary>,
    errors: HashMap<String, String>,
}

impl AppointmentForm {
    pub fn new(api: HmsApi) -> Self {
        Self {
            api,
            state: FormState::Idle,
            mode: FormMode::Create,
            appointment_id: None,
            data: FormData::default(),
            patients: Vec::new(),
            doctors: Vec::new(),
            errors: HashMap::new(),
        }
    }

    pub fn state(&self) -> FormState {
        self.state
    }

    pub fn mode(&self) -> FormMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.state != FormState::Idle
    }

    pub fn patients(&self) -> &[PatientSummary] {
        &self.patients
    }

    pub fn doctors(&self) -> &[DoctorSummary] {
        &self.doctors
    }

    pub fn errors(&self) -> &HashMap<String, String> {
        &self.errors
    }

    /// Open the form and fetch both lookup lists in parallel. One lookup
    /// failing does not take the other down: patients degrade to an empty
    /// list, doctors to the seed roster.
    pub async fn open(
        &mut self,
        mode: FormMode,
        initial: Option<FormData>,
        appointment_id: Option<i64>,
    ) -> Result<(), ApiError> {
        if mode == FormMode::Edit && appointment_id.is_none() {
            return Err(ApiError::Unexpected(
                "edit mode requires an appointment id".to_string(),
            ));
        }

        self.mode = mode;
        self.appointment_id = appointment_id;
        self.data = initial.unwrap_or_default();
        self.errors.clear();
        self.state = FormState::LoadingLookups;

        let (patients, doctors) = tokio::join!(self.api.list_patients(100), self.api.list_doctors());
        self.patients = patients.unwrap_or_else(|err| {
            tracing::warn!("patient lookup failed: {err}");
            Vec::new()
        });
        self.doctors = doctors.unwrap_or_else(|err| {
            tracing::warn!("doctor lookup failed: {err}");
            seed_doctors()
        });

        self.state = FormState::Ready;
        Ok(())
    }

    pub fn set_field(&mut self, field: FormField, value: String) {
        match field {
            FormField::Patient => self.data.patient = value,
            FormField::Doctor => self.data.doctor = value,
            FormField::Date => self.data.date = value,
            FormField::Time => self.data.time = value,
            FormField::Status => {
                if let Some(status) = AppointmentStatus::parse(&value) {
                    self.data.status = status;
                }
            }
        }
        self.errors.remove(field.as_str());
    }

    // Courtesy validation; the backend stays authoritative and may still
    // answer with its own field map.
    fn build_payload(&self) -> Result<AppointmentPayload, HashMap<String, String>> {
        let mut errors = HashMap::new();

        let patient = match self.data.patient.trim().parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                let message = if self.data.patient.trim().is_empty() {
                    "Select a patient"
                } else {
                    "Invalid patient"
                };
                errors.insert("patient".to_string(), message.to_string());
                None
            }
        };
        let doctor = match self.data.doctor.trim().parse::<i64>() {
            Ok(id) => Some(id),
            Err(_) => {
                let message = if self.data.doctor.trim().is_empty() {
                    "Select a doctor"
                } else {
                    "Invalid doctor"
                };
                errors.insert("doctor".to_string(), message.to_string());
                None
            }
        };
        let date = match self.data.date.trim().parse::<NaiveDate>() {
            Ok(date) => Some(date),
            Err(_) => {
                let message = if self.data.date.trim().is_empty() {
                    "Date is required"
                } else {
                    "Date must be YYYY-MM-DD"
                };
                errors.insert("date".to_string(), message.to_string());
                None
            }
        };
        if self.data.time.trim().is_empty() {
            errors.insert("time".to_string(), "Time is required".to_string());
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(AppointmentPayload {
            patient: patient.unwrap_or_default(),
            doctor: doctor.unwrap_or_default(),
            date: date.unwrap_or_default(),
            time: self.data.time.trim().to_string(),
            status: self.data.status,
        })
    }

    /// Dispatch create or update depending on the mode. On success the saved
    /// backend record is returned and the form closes; on failure the form
    /// stays open with field errors (or a general banner) set.
    pub async fn submit(&mut self) -> Result<RawAppointment, ApiError> {
        if self.state != FormState::Ready {
            return Err(ApiError::Unexpected("form is not ready".to_string()));
        }
        self.errors.clear();

        let payload = match self.build_payload() {
            Ok(payload) => payload,
            Err(fields) => {
                self.errors = fields.clone();
                return Err(ApiError::Validation(fields));
            }
        };

        self.state = FormState::Submitting;
        let result = match self.mode {
            FormMode::Create => self.api.create_appointment(&payload).await,
            FormMode::Edit => {
                // open() guarantees the id in edit mode
                let Some(id) = self.appointment_id else {
                    self.state = FormState::Ready;
                    return Err(ApiError::Unexpected("missing appointment id".to_string()));
                };
                self.api.update_appointment(id, &payload).await
            }
        };

        match result {
            Ok(record) => {
                self.close();
                Ok(record)
            }
            Err(ApiError::Validation(fields)) => {
                self.errors = fields.clone();
                self.state = FormState::Ready;
                Err(ApiError::Validation(fields))
            }
            Err(err) => {
                self.errors.insert(
                    "general".to_string(),
                    "Failed to save appointment. Please try again.".to_string(),
                );
                self.state = FormState::Ready;
                Err(err)
            }
        }
    }

    pub fn close(&mut self) {
        self.state = FormState::Idle;
        self.mode = FormMode::Create;
        self.appointment_id = None;
        self.data = FormData::default();
        self.errors.clear();
    }
}
