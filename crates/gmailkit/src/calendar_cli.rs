//! `gmail-calendar`: calendars and events over CalDAV.

use std::ffi::OsString;
use std::process::ExitCode;

use anyhow::Result;
use chrono::{Days, Local, NaiveDateTime};
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use gmailkit_calendar::{EventQuery, SYNC_SELECT_URL};
use gmailkit_core::{CalendarDescriptor, CalendarEvent, EventTime, Overrides, Settings};

use crate::output::{Report, bootstrap, finish, parse_args};

const UNAUTHORIZED_HINT: &str = "Calendar returned 401. Google may require OAuth for CalDAV for your account. Use the same app password only for mail (IMAP/SMTP).";

#[derive(Parser, Debug)]
#[command(
    name = "gmail-calendar",
    version,
    about = "List Google calendars and events over CalDAV"
)]
pub struct CalendarCli {
    /// Gmail address (or set GMAIL_USER)
    #[arg(long, global = true)]
    user: Option<String>,
    /// App password (or set GMAIL_APP_PASSWORD)
    #[arg(long, global = true)]
    password: Option<String>,
    /// Print one JSON document instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: CalendarCommand,
}

#[derive(Subcommand, Debug)]
enum CalendarCommand {
    /// List calendars
    Calendars(CalendarsCmd),
    /// List events in a window around today
    Events(EventsCmd),
}

#[derive(Args, Debug)]
struct CalendarsCmd {
    /// Show full URL and id
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Args, Debug)]
struct EventsCmd {
    /// Calendar ID (default: primary)
    #[arg(long = "calendar")]
    calendar_id: Option<String>,
    /// Days in the past to include
    #[arg(long, default_value_t = 7)]
    days_past: u64,
    /// Days ahead to include
    #[arg(long, default_value_t = 30)]
    days_ahead: u64,
    /// Max events to return
    #[arg(long, default_value_t = 50)]
    max: usize,
}

pub fn run<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    bootstrap();
    let cli: CalendarCli = match parse_args(args) {
        Ok(cli) => cli,
        Err(code) => return code,
    };
    let json = cli.json;
    finish(execute(cli), json, unauthorized_hint)
}

fn execute(cli: CalendarCli) -> Result<Report> {
    let overrides = Overrides {
        user: cli.user,
        password: cli.password,
        ..Overrides::default()
    };
    let settings = Settings::resolve_account(&overrides);
    match cli.command {
        CalendarCommand::Calendars(cmd) => {
            let calendars = gmailkit_calendar::list_calendars(&settings)?;
            Ok(calendars_report(&calendars, cmd.verbose))
        }
        CalendarCommand::Events(cmd) => {
            let query = event_query(&cmd, Local::now().naive_local());
            let events = gmailkit_calendar::list_events(&settings, &query)?;
            Ok(events_report(&events))
        }
    }
}

fn unauthorized_hint(err: &anyhow::Error) -> Option<&'static str> {
    let typed = err
        .downcast_ref::<gmailkit_core::Error>()
        .is_some_and(gmailkit_core::Error::is_unauthorized);
    let message = err.to_string();
    if typed || message.contains("401") || message.contains("Unauthorized") {
        Some(UNAUTHORIZED_HINT)
    } else {
        None
    }
}

fn event_query(cmd: &EventsCmd, now: NaiveDateTime) -> EventQuery {
    let start = now.checked_sub_days(Days::new(cmd.days_past)).unwrap_or(now);
    let end = now.checked_add_days(Days::new(cmd.days_ahead)).unwrap_or(now);
    EventQuery {
        calendar_id: cmd.calendar_id.clone(),
        start: Some(start.date()),
        end: Some(end.date()),
        max_results: cmd.max,
    }
}

fn calendars_report(calendars: &[CalendarDescriptor], verbose: bool) -> Report {
    let mut text = Vec::new();
    for cal in calendars {
        let name = if cal.name.is_empty() {
            "(no name)"
        } else {
            cal.name.as_str()
        };
        if verbose {
            text.push(format!("  name: {}", name));
            text.push(format!("  id:   {}", cal.id));
            text.push(format!("  url:  {}", cal.url));
            text.push(String::new());
        } else {
            text.push(format!("  {}  {}", cal.id, name));
        }
    }
    if !calendars.is_empty() && !verbose {
        text.push(String::new());
        text.push(
            "  Missing shared calendars (Other calendars)? Enable them for CalDAV at:".to_string(),
        );
        text.push(format!("  {}", SYNC_SELECT_URL));
    }
    Report::new(text, json!(calendars))
}

fn events_report(events: &[CalendarEvent]) -> Report {
    let text = events
        .iter()
        .map(|event| {
            let location = if event.location.is_empty() {
                String::new()
            } else {
                format!(" @ {}", event.location)
            };
            format!(
                "  {} – {}  {}{}",
                time_label(event.start.as_ref()),
                time_label(event.end.as_ref()),
                event.summary,
                location
            )
        })
        .collect();
    Report::new(text, json!(events))
}

fn time_label(time: Option<&EventTime>) -> String {
    time.map(ToString::to_string).unwrap_or_else(|| "-".to_string())
}
