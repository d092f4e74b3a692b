// src/controllers/mod.rs

pub mod form;
pub mod page;

pub use form::{AppointmentForm, FormData, FormField, FormMode, FormState};
pub use page::{
    AppointmentsPage, AutoRefresh, ConfirmPrompt, DateFilter, PageStats, PageTab, StatusFilter,
};
