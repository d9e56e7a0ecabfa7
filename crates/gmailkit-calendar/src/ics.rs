//! Just enough iCalendar (RFC 5545) to turn VEVENTs into `CalendarEvent`s.

use chrono::{NaiveDate, NaiveDateTime};

use gmailkit_core::{CalendarEvent, EventTime, UNTITLED_EVENT};

#[derive(Debug, Clone, PartialEq, Eq)]
struct ContentLine {
    name: String,
    params: Vec<(String, String)>,
    value: String,
}

impl ContentLine {
    fn param(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Default)]
struct EventBuilder {
    summary: String,
    start: Option<EventTime>,
    end: Option<EventTime>,
    uid: String,
    location: String,
    description: String,
}

impl EventBuilder {
    fn build(self) -> CalendarEvent {
        CalendarEvent {
            summary: if self.summary.is_empty() {
                UNTITLED_EVENT.to_string()
            } else {
                self.summary
            },
            start: self.start,
            end: self.end,
            uid: self.uid,
            location: self.location,
            description: self.description,
        }
    }
}

/// Every VEVENT in `data`, in document order. Sub-components such as VALARM
/// do not leak their properties into the event.
pub fn parse_events(data: &str) -> Vec<CalendarEvent> {
    let mut events = Vec::new();
    let mut current: Option<EventBuilder> = None;
    let mut nested_depth = 0usize;

    for line in unfold_lines(data) {
        let Some(line) = parse_content_line(&line) else {
            continue;
        };
        match line.name.as_str() {
            "BEGIN" if line.value.eq_ignore_ascii_case("VEVENT") && current.is_none() => {
                current = Some(EventBuilder::default());
                nested_depth = 0;
            }
            "BEGIN" => {
                if current.is_some() {
                    nested_depth += 1;
                }
            }
            "END" if line.value.eq_ignore_ascii_case("VEVENT") && nested_depth == 0 => {
                if let Some(builder) = current.take() {
                    events.push(builder.build());
                }
            }
            "END" => {
                nested_depth = nested_depth.saturating_sub(1);
            }
            _ => {
                if nested_depth > 0 {
                    continue;
                }
                if let Some(builder) = current.as_mut() {
                    apply_property(builder, &line);
                }
            }
        }
    }
    events
}

fn apply_property(builder: &mut EventBuilder, line: &ContentLine) {
    match line.name.as_str() {
        "SUMMARY" => builder.summary = unescape_text(&line.value),
        "UID" => builder.uid = unescape_text(&line.value),
        "LOCATION" => builder.location = unescape_text(&line.value),
        "DESCRIPTION" => builder.description = unescape_text(&line.value),
        "DTSTART" => builder.start = parse_event_time(line),
        "DTEND" => builder.end = parse_event_time(line),
        _ => {}
    }
}

fn unfold_lines(data: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    for raw in data.split('\n') {
        let raw = raw.strip_suffix('\r').unwrap_or(raw);
        if let Some(rest) = raw.strip_prefix(' ').or_else(|| raw.strip_prefix('\t')) {
            if let Some(last) = lines.last_mut() {
                last.push_str(rest);
                continue;
            }
        }
        if !raw.is_empty() {
            lines.push(raw.to_string());
        }
    }
    lines
}

// NAME;PARAM=a;PARAM="quoted;value":value
fn parse_content_line(line: &str) -> Option<ContentLine> {
    let mut in_quotes = false;
    let mut split_at = None;
    for (idx, ch) in line.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ':' if !in_quotes => {
                split_at = Some(idx);
                break;
            }
            _ => {}
        }
    }
    let split_at = split_at?;
    let (head, value) = (&line[..split_at], &line[split_at + 1..]);

    let mut parts = split_params(head).into_iter();
    let name = parts.next()?.trim().to_ascii_uppercase();
    if name.is_empty() {
        return None;
    }
    let params = parts
        .filter_map(|param| {
            let (key, val) = param.split_once('=')?;
            Some((
                key.trim().to_ascii_uppercase(),
                val.trim().trim_matches('"').to_string(),
            ))
        })
        .collect();
    Some(ContentLine {
        name,
        params,
        value: value.to_string(),
    })
}

fn split_params(head: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut in_quotes = false;
    let mut start = 0;
    for (idx, ch) in head.char_indices() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                out.push(&head[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    out.push(&head[start..]);
    out
}

fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn parse_event_time(line: &ContentLine) -> Option<EventTime> {
    let value = line.value.trim();
    let is_date = line
        .param("VALUE")
        .is_some_and(|v| v.eq_ignore_ascii_case("DATE"))
        || (value.len() == 8 && !value.contains('T'));
    if is_date {
        let date = NaiveDate::parse_from_str(value, "%Y%m%d").ok()?;
        return Some(EventTime::Date { date });
    }
    if let Some(utc) = value.strip_suffix('Z') {
        let datetime = NaiveDateTime::parse_from_str(utc, "%Y%m%dT%H%M%S").ok()?;
        return Some(EventTime::Utc {
            datetime: datetime.and_utc(),
        });
    }
    let datetime = NaiveDateTime::parse_from_str(value, "%Y%m%dT%H%M%S").ok()?;
    Some(EventTime::Local {
        datetime,
        tzid: line.param("TZID").map(str::to_string),
    })
}
