//! Calendar listing and event queries over CalDAV.

use chrono::{Days, Local, NaiveDate, NaiveDateTime};
use tracing::debug;
use url::Url;

use gmailkit_core::{CalendarDescriptor, CalendarEvent, Error, Result, Settings};

pub mod ics;
pub mod multistatus;
pub mod transport;

pub use multistatus::{DavResponse, parse_multistatus};
pub use transport::{DavTransport, HttpDavTransport};

/// Legacy Google endpoint that still accepts app passwords.
pub const GOOGLE_CALDAV_URL: &str = "https://calendar.google.com/calendar/dav/";
/// Where shared calendars have to be enabled before CalDAV lists them.
pub const SYNC_SELECT_URL: &str = "https://www.google.com/calendar/syncselect";

pub const DEFAULT_DAYS_PAST: u64 = 7;
pub const DEFAULT_DAYS_AHEAD: u64 = 30;
pub const DEFAULT_MAX_RESULTS: usize = 100;

const PRINCIPAL_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop>
    <d:current-user-principal/>
  </d:prop>
</d:propfind>"#;

const HOME_SET_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <c:calendar-home-set/>
  </d:prop>
</d:propfind>"#;

const CALENDARS_BODY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <d:displayname/>
    <d:resourcetype/>
  </d:prop>
</d:propfind>"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventQuery {
    /// Calendar id or URL fragment; the first calendar when absent.
    pub calendar_id: Option<String>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub max_results: usize,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            calendar_id: None,
            start: None,
            end: None,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

impl EventQuery {
    /// Half-open `[start, end)`; defaults to a week back and thirty days ahead.
    pub fn window(&self, now: NaiveDateTime) -> (NaiveDate, NaiveDate) {
        let today = now.date();
        let start = self.start.unwrap_or_else(|| {
            today
                .checked_sub_days(Days::new(DEFAULT_DAYS_PAST))
                .unwrap_or(today)
        });
        let end = self.end.unwrap_or_else(|| {
            today
                .checked_add_days(Days::new(DEFAULT_DAYS_AHEAD))
                .unwrap_or(today)
        });
        (start, end)
    }
}

pub struct CalendarClient<T> {
    transport: T,
    base_url: Url,
}

pub fn connect(settings: &Settings) -> Result<CalendarClient<HttpDavTransport>> {
    let creds = settings.credentials()?;
    CalendarClient::new(GOOGLE_CALDAV_URL, HttpDavTransport::new(&creds)?)
}

pub fn list_calendars(settings: &Settings) -> Result<Vec<CalendarDescriptor>> {
    connect(settings)?.list_calendars()
}

pub fn list_events(settings: &Settings, query: &EventQuery) -> Result<Vec<CalendarEvent>> {
    connect(settings)?.list_events(query)
}

impl<T: DavTransport> CalendarClient<T> {
    pub fn new(base_url: &str, transport: T) -> Result<Self> {
        let base_url =
            Url::parse(base_url).map_err(|e| Error::InvalidInput(format!("{}: {}", base_url, e)))?;
        Ok(Self {
            transport,
            base_url,
        })
    }

    /// Calendars visible to the authenticated principal.
    pub fn list_calendars(&self) -> Result<Vec<CalendarDescriptor>> {
        let home = self.calendar_home()?;
        let xml = self.transport.propfind(home.as_str(), 1, CALENDARS_BODY)?;
        let mut calendars = Vec::new();
        for response in parse_multistatus(&xml)? {
            if !response.is_calendar {
                continue;
            }
            let url = resolve_href(&home, &response.href)?;
            calendars.push(CalendarDescriptor {
                name: response.display_name.unwrap_or_default(),
                id: calendar_id_from_url(url.as_str()),
                url: url.to_string(),
            });
        }
        debug!("caldav calendars count={}", calendars.len());
        Ok(calendars)
    }

    pub fn list_events(&self, query: &EventQuery) -> Result<Vec<CalendarEvent>> {
        let calendars = self.list_calendars()?;
        let Some(calendar) = select_calendar(&calendars, query.calendar_id.as_deref()) else {
            return Ok(Vec::new());
        };
        let (start, end) = query.window(Local::now().naive_local());
        debug!(
            "caldav events calendar={} start={} end={} max={}",
            calendar.id, start, end, query.max_results
        );

        let xml = self
            .transport
            .report(&calendar.url, 1, &calendar_query_body(start, end))?;
        let mut events = Vec::new();
        for response in parse_multistatus(&xml)? {
            if let Some(data) = response.calendar_data.as_deref() {
                events.extend(ics::parse_events(data));
            }
        }
        events.truncate(query.max_results);
        Ok(events)
    }

    fn principal(&self) -> Result<Url> {
        let xml = self
            .transport
            .propfind(self.base_url.as_str(), 0, PRINCIPAL_BODY)?;
        let href = parse_multistatus(&xml)?
            .into_iter()
            .find_map(|r| r.principal_href);
        match href {
            Some(href) => resolve_href(&self.base_url, &href),
            None => Ok(self.base_url.clone()),
        }
    }

    fn calendar_home(&self) -> Result<Url> {
        let principal = self.principal()?;
        let xml = self.transport.propfind(principal.as_str(), 0, HOME_SET_BODY)?;
        let href = parse_multistatus(&xml)?
            .into_iter()
            .find_map(|r| r.home_set_href);
        match href {
            Some(href) => resolve_href(&principal, &href),
            None => Ok(principal),
        }
    }
}

/// Google URLs look like `.../calendar/dav/<calendar id>/events`; this
/// follows that layout and nothing more general.
pub fn calendar_id_from_url(url: &str) -> String {
    let parts: Vec<&str> = url.trim_end_matches('/').split('/').collect();
    let raw = match parts.as_slice() {
        [.., prev, last] if last.eq_ignore_ascii_case("events") => *prev,
        [.., last] => *last,
        [] => "",
    };
    String::from_utf8_lossy(&urlencoding::decode_binary(raw.as_bytes())).into_owned()
}

/// Match by URL fragment, trailing segment or derived id; otherwise the
/// first calendar, which the service conventionally makes the primary one.
pub fn select_calendar<'a>(
    calendars: &'a [CalendarDescriptor],
    calendar_id: Option<&str>,
) -> Option<&'a CalendarDescriptor> {
    let wanted = calendar_id.map(str::trim).filter(|id| !id.is_empty());
    if let Some(id) = wanted {
        let found = calendars.iter().find(|cal| {
            cal.url.contains(id) || cal.url.trim_end_matches('/').ends_with(id) || cal.id == id
        });
        if found.is_some() {
            return found;
        }
        debug!("caldav calendar id={} not found, using first", id);
    }
    calendars.first()
}

fn resolve_href(base: &Url, href: &str) -> Result<Url> {
    base.join(href)
        .map_err(|e| Error::Malformed(format!("bad href {:?}: {}", href, e)))
}

fn calendar_query_body(start: NaiveDate, end: NaiveDate) -> String {
    let start = caldav_timestamp(start);
    let end = caldav_timestamp(end);
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <d:getetag/>
    <c:calendar-data>
      <c:expand start="{start}" end="{end}"/>
    </c:calendar-data>
  </d:prop>
  <c:filter>
    <c:comp-filter name="VCALENDAR">
      <c:comp-filter name="VEVENT">
        <c:time-range start="{start}" end="{end}"/>
      </c:comp-filter>
    </c:comp-filter>
  </c:filter>
</c:calendar-query>"#
    )
}

fn caldav_timestamp(date: NaiveDate) -> String {
    format!("{}T000000Z", date.format("%Y%m%d"))
}
