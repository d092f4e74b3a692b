use anyhow::Context;
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use tracing_subscriber::EnvFilter;

use hms_client::api::{CalendarSync, HmsApi};
use hms_client::config::Config;
use hms_client::controllers::{AppointmentsPage, PageTab};
use hms_client::error::ApiError;
use hms_client::grid::{CalendarView, render_month, render_week};
use hms_client::models::Role;
use hms_client::oauth::{OauthBridge, UrlOpener};
use hms_client::sync::SyncOrchestrator;

const USAGE: &str = "Usage: hms-client <command>
  schedule [YYYY-MM-DD]   month calendar around the given date (default today)
  week [YYYY-MM-DD]       week view
  list                    appointment table
  status                  external calendar connection state
  sync                    push all appointments to the external calendar
  connect                 start linking the external calendar account
  login <user> <pass>     exchange credentials for session tokens";

/// CLI stand-in for the popup: prints the consent URL for the operator.
struct ConsoleOpener;

#[async_trait]
impl UrlOpener for ConsoleOpener {
    async fn open(&self, url: &str) -> Result<(), ApiError> {
        println!("Open this URL in your browser to authorize calendar access:");
        println!("  {url}");
        Ok(())
    }
}

async fn fetch_role(api: &HmsApi) -> Role {
    match api.get_profile().await {
        Ok(profile) => profile.role,
        Err(err) => {
            tracing::debug!("profile lookup failed ({err}), assuming receptionist view");
            Role::Receptionist
        }
    }
}

async fn loaded_page(api: &HmsApi, reference: NaiveDate) -> anyhow::Result<AppointmentsPage> {
    let role = fetch_role(api).await;
    let mut page = AppointmentsPage::new(api.clone(), role, reference);
    page.load().await;
    if let Some(err) = page.error() {
        anyhow::bail!("{err}");
    }
    Ok(page)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let cfg = Config::from_env()?;
    let api = HmsApi::new(&cfg)?;

    let mut args = std::env::args().skip(1);
    let command = args.next().unwrap_or_else(|| "schedule".to_string());
    let today = Local::now().date_naive();

    match command.as_str() {
        "schedule" | "week" => {
            let reference: NaiveDate = match args.next() {
                Some(raw) => raw.parse().context("reference date must be YYYY-MM-DD")?,
                None => today,
            };
            let mut page = loaded_page(&api, reference).await?;
            if command == "week" {
                page.cursor.view = CalendarView::Week;
            }
            let cells = page.cells(today);
            let rendered = match page.cursor.view {
                CalendarView::Month => render_month(&cells, &page.cursor.title()),
                CalendarView::Week => render_week(&cells, &page.cursor.title()),
            };
            print!("{rendered}");
        }
        "list" => {
            let mut page = loaded_page(&api, today).await?;
            page.tab = PageTab::List;
            for appt in page.filtered(today) {
                println!(
                    "{:>5}  {}  {}  {:<24} {:<22} {}",
                    appt.id.unwrap_or_default(),
                    appt.date,
                    appt.time.format("%H:%M"),
                    appt.patient_name,
                    appt.doctor_display(),
                    appt.status.as_str(),
                );
            }
        }
        "status" => {
            let calendar = CalendarSync::new(api.clone(), &cfg);
            if calendar.check_connection().await {
                println!("Google Calendar: connected");
            } else {
                println!("Google Calendar: not connected");
            }
        }
        "sync" => {
            let page = loaded_page(&api, today).await?;
            let orchestrator =
                SyncOrchestrator::new(CalendarSync::new(api.clone(), &cfg));
            let report = orchestrator.sync_many(page.appointments()).await;
            println!(
                "Synced {} of {} appointment(s), {} failed",
                report.success,
                report.total(),
                report.failed,
            );
            for error in &report.errors {
                println!("  {error}");
            }
        }
        "connect" => {
            let calendar = CalendarSync::new(api.clone(), &cfg);
            let bridge = OauthBridge::new(
                calendar,
                vec![cfg.backend_origin(), cfg.frontend_origin.clone()],
            );
            bridge.sign_in(&ConsoleOpener).await?;
            println!("Waiting for the consent flow to complete in the browser.");
        }
        "login" => {
            let username = args.next().context(USAGE)?;
            let password = args.next().context(USAGE)?;
            api.login(&username, &password).await?;
            let access = api.access_token().await.unwrap_or_default();
            println!("Signed in. Export for later runs:");
            println!("  HMS_ACCESS_TOKEN={access}");
        }
        other => {
            anyhow::bail!("unknown command: {other}\n{USAGE}");
        }
    }

    Ok(())
}
