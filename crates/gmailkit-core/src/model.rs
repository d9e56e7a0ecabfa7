use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Serialize;

pub const DEFAULT_FOLDER: &str = "INBOX";
pub const UNTITLED_EVENT: &str = "(no title)";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailboxEntry {
    pub uid: u32,
    pub subject: String,
    pub from: String,
    pub date: String,
    pub seen: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub uid: u32,
    pub subject: String,
    pub from: String,
    pub date: String,
    pub body_plain: String,
    pub body_html: String,
}

/// One recipient or an ordered list of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipients(pub Vec<String>);

impl From<&str> for Recipients {
    fn from(value: &str) -> Self {
        Self(vec![value.to_string()])
    }
}

impl From<String> for Recipients {
    fn from(value: String) -> Self {
        Self(vec![value])
    }
}

impl From<Vec<String>> for Recipients {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl From<&[&str]> for Recipients {
    fn from(value: &[&str]) -> Self {
        Self(value.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for Recipients {
    fn from(value: [&str; N]) -> Self {
        Self(value.iter().map(|s| s.to_string()).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub to: Vec<String>,
    pub subject: String,
    pub body_plain: String,
    pub body_html: Option<String>,
    /// Defaults to the authenticated address when `None`.
    pub from: Option<String>,
}

impl OutboundMessage {
    pub fn new(
        to: impl Into<Recipients>,
        subject: impl Into<String>,
        body_plain: impl Into<String>,
    ) -> Self {
        Self {
            to: to.into().0,
            subject: subject.into(),
            body_plain: body_plain.into(),
            body_html: None,
            from: None,
        }
    }

    pub fn with_html(mut self, body_html: impl Into<String>) -> Self {
        self.body_html = Some(body_html.into());
        self
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarDescriptor {
    pub name: String,
    pub url: String,
    pub id: String,
}

/// A DTSTART/DTEND value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventTime {
    Date { date: NaiveDate },
    Utc { datetime: DateTime<Utc> },
    /// Floating time, or wall-clock time in the named zone.
    Local {
        datetime: NaiveDateTime,
        tzid: Option<String>,
    },
}

impl EventTime {
    pub fn date(&self) -> NaiveDate {
        match self {
            Self::Date { date } => *date,
            Self::Utc { datetime } => datetime.date_naive(),
            Self::Local { datetime, .. } => datetime.date(),
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date { date } => write!(f, "{}", date.format("%Y-%m-%d")),
            Self::Utc { datetime } => write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S+00:00")),
            Self::Local {
                datetime,
                tzid: Some(tzid),
            } => write!(f, "{} ({})", datetime.format("%Y-%m-%d %H:%M:%S"), tzid),
            Self::Local { datetime, tzid: None } => {
                write!(f, "{}", datetime.format("%Y-%m-%d %H:%M:%S"))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarEvent {
    pub summary: String,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    pub uid: String,
    pub location: String,
    pub description: String,
}
