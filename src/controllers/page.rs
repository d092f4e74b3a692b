// src/controllers/page.rs

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::{
    api::HmsApi,
    controllers::form::FormData,
    error::ApiError,
    grid::{CalendarCursor, CalendarView, DayCell},
    models::{Appointment, AppointmentStatus, Role, can_manage_appointments, transform},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTab {
    Calendar,
    List,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateFilter {
    #[default]
    All,
    Today,
    Tomorrow,
}

impl DateFilter {
    pub fn parse(s: &str) -> Self {
        match s {
            "today" => DateFilter::Today,
            "tomorrow" => DateFilter::Tomorrow,
            _ => DateFilter::All,
        }
    }

    pub fn matches(&self, appt: &Appointment, today: NaiveDate) -> bool {
        match self {
            DateFilter::All => true,
            DateFilter::Today => appt.date == today,
            DateFilter::Tomorrow => appt.date == today + chrono::Duration::days(1),
        }
    }
}

/// Status filter over the list. The UI vocabulary is a superset of the
/// canonical backend enum; the extra display-only values ("confirmed",
/// "no-show") are accepted but match no stored appointment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum StatusFilter {
    #[default]
    All,
    Canonical(AppointmentStatus),
    DisplayOnly(String),
}

impl StatusFilter {
    pub fn parse(s: &str) -> Self {
        if s == "all" {
            return StatusFilter::All;
        }
        match AppointmentStatus::parse(s) {
            Some(status) => StatusFilter::Canonical(status),
            None => StatusFilter::DisplayOnly(s.to_string()),
        }
    }

    pub fn matches(&self, appt: &Appointment) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Canonical(status) => appt.status == *status,
            StatusFilter::DisplayOnly(_) => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageStats {
    pub today_total: usize,
    pub completed_today: usize,
    pub upcoming: usize,
    pub cancelled: usize,
}

/// Blocking confirmation seam for destructive actions; the CLI answers on
/// stdin, a GUI shell with a dialog, tests with a canned bool.
#[async_trait]
pub trait ConfirmPrompt: Send + Sync {
    async fn confirm(&self, message: &str) -> bool;
}

/// Top-level appointments view: the fetched list, filters, tabs and the
/// calendar cursor. Filters run client-side over the in-memory list; only
/// mutations trigger a refetch.
pub struct AppointmentsPage {
    api: HmsApi,
    role: Role,
    appointments: Vec<Appointment>,
    pub status_filter: StatusFilter,
    pub date_filter: DateFilter,
    pub search: String,
    pub tab: PageTab,
    pub cursor: CalendarCursor,
    selected: Option<i64>,
    error: Option<String>,
}

impl AppointmentsPage {
    pub fn new(api: HmsApi, role: Role, today: NaiveDate) -> Self {
        Self {
            api,
            role,
            appointments: Vec::new(),
            status_filter: StatusFilter::All,
            date_filter: DateFilter::All,
            search: String::new(),
            tab: PageTab::Calendar,
            cursor: CalendarCursor::new(today, CalendarView::Month),
            selected: None,
            error: None,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn appointments(&self) -> &[Appointment] {
        &self.appointments
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn select(&mut self, id: Option<i64>) {
        self.selected = id;
    }

    pub fn selected(&self) -> Option<&Appointment> {
        let id = self.selected?;
        self.appointments.iter().find(|a| a.id == Some(id))
    }

    /// Fetch everything once; raw records are normalized at this boundary
    /// and nowhere else.
    pub async fn load(&mut self) {
        match self.api.list_appointments().await {
            Ok(raw) => {
                self.appointments = raw.into_iter().map(transform).collect();
                self.error = None;
            }
            Err(err) => {
                tracing::error!("failed to fetch appointments: {err}");
                self.appointments.clear();
                self.error = Some("Failed to load appointments. Please try again.".to_string());
            }
        }
    }

    pub fn filtered(&self, today: NaiveDate) -> Vec<&Appointment> {
        let needle = self.search.to_lowercase();
        self.appointments
            .iter()
            .filter(|appt| {
                self.status_filter.matches(appt)
                    && self.date_filter.matches(appt, today)
                    && (needle.is_empty()
                        || appt.patient_name.to_lowercase().contains(&needle)
                        || appt.patient_unique_id.to_lowercase().contains(&needle))
            })
            .collect()
    }

    /// Day-cells for the calendar tab, honoring the active filters.
    pub fn cells(&self, today: NaiveDate) -> Vec<DayCell> {
        let filtered: Vec<Appointment> =
            self.filtered(today).into_iter().cloned().collect();
        self.cursor.cells(&filtered, today)
    }

    pub fn stats(&self, today: NaiveDate) -> PageStats {
        let mut stats = PageStats::default();
        for appt in &self.appointments {
            if appt.date == today {
                stats.today_total += 1;
                if appt.status == AppointmentStatus::Completed {
                    stats.completed_today += 1;
                }
            }
            if appt.date > today && appt.status != AppointmentStatus::Cancelled {
                stats.upcoming += 1;
            }
            if appt.status == AppointmentStatus::Cancelled {
                stats.cancelled += 1;
            }
        }
        stats
    }

    /// Pre-filled form data for editing an existing appointment.
    pub fn edit_seed(&self, id: i64) -> Option<(FormData, i64)> {
        let appt = self.appointments.iter().find(|a| a.id == Some(id))?;
        Some((
            FormData {
                patient: appt.patient.id.to_string(),
                doctor: appt.doctor.id.to_string(),
                date: appt.date.to_string(),
                time: appt.time.format("%H:%M").to_string(),
                status: appt.status,
            },
            id,
        ))
    }

    /// Cancel flow: confirm, delete, then refetch the whole list. No
    /// optimistic removal — the backend may apply its own status
    /// transitions, so its state wins.
    pub async fn cancel_appointment(
        &mut self,
        id: i64,
        prompt: &dyn ConfirmPrompt,
    ) -> Result<bool, ApiError> {
        if !can_manage_appointments(self.role) {
            return Err(ApiError::api(
                "FORBIDDEN",
                "Only admin/doctor/receptionist can cancel appointments",
            ));
        }
        let Some(appt) = self.appointments.iter().find(|a| a.id == Some(id)) else {
            return Err(ApiError::not_found("appointment"));
        };

        let message = format!(
            "Are you sure you want to cancel the appointment for {} on {} at {}?",
            appt.patient_name,
            appt.date,
            appt.time.format("%H:%M"),
        );
        if !prompt.confirm(&message).await {
            return Ok(false);
        }

        self.api.delete_appointment(id).await?;
        self.load().await;
        Ok(true)
    }

    /// Called after the form saved; mirrors the cancel path's refetch.
    pub async fn save_completed(&mut self) {
        self.load().await;
    }
}

/* ============================================================
   Background refresh
   ============================================================ */

/// Periodic list refresh. Dropping the handle aborts the task — teardown is
/// explicit, nothing keeps polling a dead view.
pub struct AutoRefresh {
    handle: JoinHandle<()>,
}

impl AutoRefresh {
    pub fn start(page: Arc<Mutex<AppointmentsPage>>, every: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await; // the first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                page.lock().await.load().await;
            }
        });
        Self { handle }
    }
}

impl Drop for AutoRefresh {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
