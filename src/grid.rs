use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::{Datelike, Duration, Months, NaiveDate};

use crate::models::Appointment;

/// How many appointments a month cell shows before collapsing into a
/// "+N more" overflow count. Overflow is display-only; the data keeps all.
pub const DAY_CELL_DISPLAY_CAP: usize = 3;

/// Month view always renders 6 weeks x 7 days. A fixed-size grid trades a
/// little wasted space for no dynamic row-count edge cases.
pub const MONTH_GRID_CELLS: usize = 42;
pub const WEEK_GRID_CELLS: usize = 7;

pub const DAYS_OF_WEEK: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalendarView {
    Month,
    Week,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DayCell {
    pub date: NaiveDate,
    /// Inside the reference month (month view) or always true (week view).
    pub is_current_period: bool,
    pub is_today: bool,
    pub appointments: Vec<Appointment>,
}

impl DayCell {
    pub fn visible(&self) -> &[Appointment] {
        let cap = self.appointments.len().min(DAY_CELL_DISPLAY_CAP);
        &self.appointments[..cap]
    }

    pub fn overflow(&self) -> usize {
        self.appointments.len().saturating_sub(DAY_CELL_DISPLAY_CAP)
    }
}

/// Sunday on or before `date`.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_sunday()))
}

// Single pass over the list; each cell then looks its date up in O(1).
fn bucket_by_date(appointments: &[Appointment]) -> HashMap<NaiveDate, Vec<Appointment>> {
    let mut grouped: HashMap<NaiveDate, Vec<Appointment>> = HashMap::new();
    for appt in appointments {
        grouped.entry(appt.date).or_default().push(appt.clone());
    }
    grouped
}

/// 42 cells: first-of-month backed up to the nearest prior Sunday, then six
/// full weeks. Appointments outside the reference month but inside the
/// window still land in their absolute-date cell.
pub fn month_grid(
    appointments: &[Appointment],
    reference: NaiveDate,
    today: NaiveDate,
) -> Vec<DayCell> {
    let first_of_month = reference.with_day(1).unwrap();
    let start = week_start(first_of_month);
    let mut grouped = bucket_by_date(appointments);

    (0..MONTH_GRID_CELLS as i64)
        .map(|offset| {
            let date = start + Duration::days(offset);
            DayCell {
                date,
                is_current_period: date.year() == reference.year()
                    && date.month() == reference.month(),
                is_today: date == today,
                appointments: grouped.remove(&date).unwrap_or_default(),
            }
        })
        .collect()
}

/// 7 day-columns starting the Sunday on/before `reference`.
pub fn week_grid(
    appointments: &[Appointment],
    reference: NaiveDate,
    today: NaiveDate,
) -> Vec<DayCell> {
    let start = week_start(reference);
    let mut grouped = bucket_by_date(appointments);

    (0..WEEK_GRID_CELLS as i64)
        .map(|offset| {
            let date = start + Duration::days(offset);
            DayCell {
                date,
                is_current_period: true,
                is_today: date == today,
                appointments: grouped.remove(&date).unwrap_or_default(),
            }
        })
        .collect()
}

/* ============================================================
   Navigation
   ============================================================ */

/// Reference date plus the active view. Month stepping moves the month
/// field (Jan 31 -> end of Feb), never a fixed 30-day jump.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CalendarCursor {
    pub reference: NaiveDate,
    pub view: CalendarView,
}

impl CalendarCursor {
    pub fn new(reference: NaiveDate, view: CalendarView) -> Self {
        Self { reference, view }
    }

    pub fn next(&mut self) {
        self.reference = match self.view {
            CalendarView::Month => self
                .reference
                .checked_add_months(Months::new(1))
                .unwrap_or(self.reference),
            CalendarView::Week => self.reference + Duration::days(7),
        };
    }

    pub fn previous(&mut self) {
        self.reference = match self.view {
            CalendarView::Month => self
                .reference
                .checked_sub_months(Months::new(1))
                .unwrap_or(self.reference),
            CalendarView::Week => self.reference - Duration::days(7),
        };
    }

    pub fn go_to_today(&mut self, today: NaiveDate) {
        self.reference = today;
    }

    pub fn cells(&self, appointments: &[Appointment], today: NaiveDate) -> Vec<DayCell> {
        match self.view {
            CalendarView::Month => month_grid(appointments, self.reference, today),
            CalendarView::Week => week_grid(appointments, self.reference, today),
        }
    }

    pub fn title(&self) -> String {
        match self.view {
            CalendarView::Month => self.reference.format("%B %Y").to_string(),
            CalendarView::Week => format!("Week of {}", week_start(self.reference).format("%b %-d, %Y")),
        }
    }
}

/* ============================================================
   Text rendering (CLI)
   ============================================================ */

/// Month grid as fixed-width text. Each cell shows the day number, a `*`
/// marker on today, and the appointment count when non-zero.
pub fn render_month(cells: &[DayCell], title: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    for day in DAYS_OF_WEEK {
        let _ = write!(out, "{day:>9} ");
    }
    out.push('\n');

    for week in cells.chunks(WEEK_GRID_CELLS) {
        for cell in week {
            let marker = if cell.is_today { "*" } else { " " };
            let count = if cell.appointments.is_empty() {
                "   ".to_string()
            } else {
                format!("({})", cell.appointments.len())
            };
            let dimmed = if cell.is_current_period { ' ' } else { '.' };
            let _ = write!(out, "{dimmed}{:>3}{marker}{count:>4} ", cell.date.day());
        }
        out.push('\n');
    }
    out
}

pub fn render_week(cells: &[DayCell], title: &str) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{title}");
    for cell in cells {
        let marker = if cell.is_today { " (today)" } else { "" };
        let _ = writeln!(
            out,
            "{} {}{marker}",
            DAYS_OF_WEEK[cell.date.weekday().num_days_from_sunday() as usize],
            cell.date.format("%Y-%m-%d"),
        );
        for appt in &cell.appointments {
            let _ = writeln!(
                out,
                "    {} {} - {} [{}]",
                appt.time.format("%H:%M"),
                appt.patient_name,
                appt.doctor_display(),
                appt.status.as_str(),
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::appointment;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn test_month_grid_always_42_cells() {
        for reference in ["2025-02-10", "2024-02-29", "2025-09-15", "2025-12-01"] {
            let cells = month_grid(&[], date(reference), date("2025-01-01"));
            assert_eq!(cells.len(), MONTH_GRID_CELLS, "for {reference}");
        }
    }

    #[test]
    fn test_week_grid_always_7_cells() {
        let cells = week_grid(&[], date("2025-09-15"), date("2025-09-15"));
        assert_eq!(cells.len(), WEEK_GRID_CELLS);
        assert_eq!(cells[0].date, date("2025-09-14")); // Sunday
        assert_eq!(cells[6].date, date("2025-09-20"));
    }

    #[test]
    fn test_month_grid_starts_on_prior_sunday() {
        // Sep 1 2025 is a Monday, so the grid starts Aug 31.
        let cells = month_grid(&[], date("2025-09-15"), date("2025-09-15"));
        assert_eq!(cells[0].date, date("2025-08-31"));
        assert!(!cells[0].is_current_period);
        assert!(cells[1].is_current_period);
        assert!(cells.iter().any(|c| c.is_today));
    }

    #[test]
    fn test_every_in_window_appointment_lands_in_exactly_one_cell() {
        let appointments = vec![
            appointment(1, "2025-09-01"),
            appointment(2, "2025-09-15"),
            appointment(3, "2025-09-30"),
            appointment(4, "2025-08-31"), // prior month, inside window
            appointment(5, "2025-10-04"), // next month, inside window
        ];
        let cells = month_grid(&appointments, date("2025-09-15"), date("2025-09-15"));

        for appt in &appointments {
            let holders: Vec<&DayCell> = cells
                .iter()
                .filter(|c| c.appointments.iter().any(|a| a.id == appt.id))
                .collect();
            assert_eq!(holders.len(), 1, "appointment {:?}", appt.id);
            assert_eq!(holders[0].date, appt.date);
        }
    }

    #[test]
    fn test_out_of_window_appointment_is_absent() {
        // September 2025's window runs Aug 31 through Oct 11; Oct 12 is the
        // first date with no cell to land in.
        let appointments = vec![appointment(1, "2025-09-25"), appointment(2, "2025-10-12")];
        let cells = month_grid(&appointments, date("2025-09-15"), date("2025-09-15"));

        let sep25 = cells.iter().find(|c| c.date == date("2025-09-25")).unwrap();
        assert_eq!(sep25.appointments.len(), 1);
        assert_eq!(sep25.appointments[0].id, Some(1));

        assert!(cells.iter().all(|c| c.date != date("2025-10-12")));
        let total: usize = cells.iter().map(|c| c.appointments.len()).sum();
        assert_eq!(total, 1);
    }

    #[test]
    fn test_empty_list_gives_empty_cells() {
        let cells = month_grid(&[], date("2025-09-15"), date("2025-09-15"));
        assert!(cells.iter().all(|c| c.appointments.is_empty()));
    }

    #[test]
    fn test_display_cap_and_overflow() {
        let appointments: Vec<_> = (1..=5).map(|id| appointment(id, "2025-09-10")).collect();
        let cells = month_grid(&appointments, date("2025-09-15"), date("2025-09-15"));
        let cell = cells.iter().find(|c| c.date == date("2025-09-10")).unwrap();

        assert_eq!(cell.appointments.len(), 5);
        assert_eq!(cell.visible().len(), DAY_CELL_DISPLAY_CAP);
        assert_eq!(cell.overflow(), 2);
    }

    #[test]
    fn test_month_navigation_clamps_day() {
        let mut cursor = CalendarCursor::new(date("2025-01-31"), CalendarView::Month);
        cursor.next();
        assert_eq!(cursor.reference, date("2025-02-28"));
        cursor.next();
        assert_eq!(cursor.reference, date("2025-03-28"));
        cursor.previous();
        assert_eq!(cursor.reference, date("2025-02-28"));
    }

    #[test]
    fn test_week_navigation_steps_seven_days() {
        let mut cursor = CalendarCursor::new(date("2025-09-15"), CalendarView::Week);
        cursor.next();
        assert_eq!(cursor.reference, date("2025-09-22"));
        cursor.previous();
        cursor.previous();
        assert_eq!(cursor.reference, date("2025-09-08"));
        cursor.go_to_today(date("2025-09-15"));
        assert_eq!(cursor.reference, date("2025-09-15"));
    }

    #[test]
    fn test_titles() {
        let month = CalendarCursor::new(date("2025-09-15"), CalendarView::Month);
        assert_eq!(month.title(), "September 2025");
        let week = CalendarCursor::new(date("2025-09-15"), CalendarView::Week);
        assert_eq!(week.title(), "Week of Sep 14, 2025");
    }

    #[test]
    fn test_render_month_has_seven_columns_and_six_rows() {
        let cells = month_grid(&[appointment(1, "2025-09-10")], date("2025-09-15"), date("2025-09-15"));
        let text = render_month(&cells, "September 2025");
        let lines: Vec<&str> = text.lines().collect();
        // title + weekday header + 6 week rows
        assert_eq!(lines.len(), 8);
        assert!(lines[1].contains("Sun"));
        assert!(text.contains("(1)"));
    }
}
