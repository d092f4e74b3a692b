use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Default appointment length when only a start is stored.
pub const DEFAULT_DURATION_MIN: i64 = 60;

/* -------------------------
   Backend payloads
--------------------------*/

/// Canonical backend status. "confirmed"/"no-show" exist only in the UI
/// filter vocabulary and are never persisted or sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    #[default]
    Scheduled,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(AppointmentStatus::Scheduled),
            "completed" => Some(AppointmentStatus::Completed),
            "cancelled" => Some(AppointmentStatus::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientRef {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub unique_id: String,
    #[serde(default)]
    pub contact_info: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoctorRef {
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

/// Appointment exactly as the backend serializes it. `time` stays a string
/// here: the backend emits "HH:MM:SS" while form inputs produce "HH:MM",
/// and both must survive the trip.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAppointment {
    pub id: i64,
    pub patient: PatientRef,
    pub doctor: DoctorRef,
    pub date: NaiveDate,
    pub time: String,
    pub status: AppointmentStatus,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/* -------------------------
   Canonical UI record
--------------------------*/

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Contact {
    pub phone: String,
    pub email: String,
}

/// The shape everything downstream (grid, table, sync) consumes. Derived
/// display fields are computed once here, never re-derived per component.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Appointment {
    /// Backend-assigned; `None` only for drafts that were never persisted.
    pub id: Option<i64>,
    pub patient: PatientRef,
    pub doctor: DoctorRef,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub patient_name: String,
    pub patient_unique_id: String,
    /// Visit type; the backend does not store one yet.
    pub kind: String,
    pub notes: String,
    pub contact: Contact,
}

impl Appointment {
    pub fn start_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time)
    }

    pub fn end_at(&self) -> NaiveDateTime {
        self.start_at() + Duration::minutes(DEFAULT_DURATION_MIN)
    }

    pub fn doctor_display(&self) -> String {
        format!("Dr. {} {}", self.doctor.first_name, self.doctor.last_name)
    }
}

fn parse_time(raw: &str) -> NaiveTime {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .unwrap_or_else(|_| NaiveTime::from_hms_opt(0, 0, 0).unwrap())
}

/// Backend record -> canonical UI record. Pure; missing optionals become
/// empty strings, nothing here can fail.
pub fn transform(raw: RawAppointment) -> Appointment {
    let patient_name = format!("{} {}", raw.patient.first_name, raw.patient.last_name);
    let contact = Contact {
        phone: raw.patient.contact_info.clone(),
        email: raw.patient.email.clone().unwrap_or_default(),
    };

    Appointment {
        id: Some(raw.id),
        patient_name,
        patient_unique_id: raw.patient.unique_id.clone(),
        kind: "General Checkup".to_string(),
        notes: raw.notes.clone(),
        contact,
        patient: raw.patient,
        doctor: raw.doctor,
        date: raw.date,
        time: parse_time(&raw.time),
        status: raw.status,
        created_at: raw.created_at,
        updated_at: raw.updated_at,
    }
}

/* -------------------------
   Users and roles
--------------------------*/

/// Roles as the backend knows them:
/// admin, doctor, nurse, receptionist, patient
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Doctor,
    Nurse,
    Receptionist,
    Patient,
}

impl Role {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "admin" => Some(Role::Admin),
            "doctor" => Some(Role::Doctor),
            "nurse" => Some(Role::Nurse),
            "receptionist" => Some(Role::Receptionist),
            "patient" => Some(Role::Patient),
            _ => None,
        }
    }
}

/// The backend serializes `role` either as a bare string or as an object
/// `{"name": ...}` depending on the endpoint. Normalized here, once, instead
/// of re-checked at every consumption site.
fn role_from_repr<'de, D>(deserializer: D) -> Result<Role, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Name(String),
        Object { name: String },
    }

    let name = match Repr::deserialize(deserializer)? {
        Repr::Name(name) => name,
        Repr::Object { name } => name,
    };
    Role::parse(&name)
        .ok_or_else(|| serde::de::Error::custom(format!("unknown role: {name}")))
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(deserialize_with = "role_from_repr")]
    pub role: Role,
}

/* -------------------------
   Helpers
--------------------------*/

pub fn can_manage_appointments(role: Role) -> bool {
    matches!(role, Role::Admin | Role::Doctor | Role::Receptionist)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_derives_display_fields() {
        let appt = transform(fixtures::raw_appointment(12, "2025-09-25", "14:30:00"));
        assert_eq!(appt.id, Some(12));
        assert_eq!(appt.patient_name, "Jane Doe");
        assert_eq!(appt.patient_unique_id, "P0001");
        assert_eq!(appt.contact.phone, "555-0100");
        assert_eq!(appt.contact.email, "jane@example.com");
        assert_eq!(appt.kind, "General Checkup");
        assert_eq!(appt.time, NaiveTime::from_hms_opt(14, 30, 0).unwrap());
    }

    #[test]
    fn test_transform_is_pure() {
        let raw = fixtures::raw_appointment(3, "2025-01-31", "08:00:00");
        assert_eq!(transform(raw.clone()), transform(raw));
    }

    #[test]
    fn test_transform_missing_email_becomes_empty() {
        let mut raw = fixtures::raw_appointment(4, "2025-03-02", "10:00:00");
        raw.patient.email = None;
        let appt = transform(raw);
        assert_eq!(appt.contact.email, "");
    }

    #[test]
    fn test_time_parses_with_and_without_seconds() {
        let with_secs = transform(fixtures::raw_appointment(1, "2025-06-10", "09:15:00"));
        let without = transform(fixtures::raw_appointment(2, "2025-06-10", "09:15"));
        assert_eq!(with_secs.time, without.time);
    }

    #[test]
    fn test_start_end_default_duration() {
        let appt = transform(fixtures::raw_appointment(5, "2025-09-25", "23:30:00"));
        assert_eq!(appt.start_at().to_string(), "2025-09-25 23:30:00");
        // rolls into the next day rather than clamping
        assert_eq!(appt.end_at().to_string(), "2025-09-26 00:30:00");
    }

    #[test]
    fn test_status_round_trip() {
        let json = serde_json::to_string(&AppointmentStatus::Cancelled).unwrap();
        assert_eq!(json, "\"cancelled\"");
        let back: AppointmentStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AppointmentStatus::Cancelled);
        assert_eq!(AppointmentStatus::parse("no-show"), None);
    }

    #[test]
    fn test_role_accepts_string_and_object() {
        let from_string: UserProfile =
            serde_json::from_value(serde_json::json!({
                "id": 1, "username": "alice", "role": "Doctor"
            }))
            .unwrap();
        let from_object: UserProfile =
            serde_json::from_value(serde_json::json!({
                "id": 2, "username": "bob", "role": {"name": "receptionist"}
            }))
            .unwrap();
        assert_eq!(from_string.role, Role::Doctor);
        assert_eq!(from_object.role, Role::Receptionist);

        let unknown = serde_json::from_value::<UserProfile>(serde_json::json!({
            "id": 3, "username": "eve", "role": "superuser"
        }));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_role_gating() {
        assert!(can_manage_appointments(Role::Admin));
        assert!(can_manage_appointments(Role::Receptionist));
        assert!(!can_manage_appointments(Role::Patient));
        assert!(!can_manage_appointments(Role::Nurse));
    }
}
