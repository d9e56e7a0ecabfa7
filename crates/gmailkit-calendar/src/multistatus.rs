//! WebDAV multistatus bodies, reduced to the properties CalDAV discovery and
//! calendar queries read.

use quick_xml::Reader;
use quick_xml::events::Event;

use gmailkit_core::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DavResponse {
    pub href: String,
    pub display_name: Option<String>,
    pub is_calendar: bool,
    pub principal_href: Option<String>,
    pub home_set_href: Option<String>,
    pub calendar_data: Option<String>,
}

pub fn parse_multistatus(xml: &str) -> Result<Vec<DavResponse>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<String> = Vec::new();
    let mut responses = Vec::new();
    let mut current: Option<DavResponse> = None;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(e.local_name().as_ref());
                if name == "response" {
                    current = Some(DavResponse::default());
                }
                stack.push(name);
                text.clear();
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(e.local_name().as_ref());
                if name == "calendar" && parent_is(&stack, "resourcetype") {
                    if let Some(response) = current.as_mut() {
                        response.is_calendar = true;
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let chunk = t
                    .unescape()
                    .map_err(|e| Error::Malformed(format!("multistatus text: {}", e)))?;
                text.push_str(&chunk);
            }
            Ok(Event::CData(c)) => {
                text.push_str(&String::from_utf8_lossy(&c.into_inner()));
            }
            Ok(Event::End(_)) => {
                let name = stack.pop().unwrap_or_default();
                if let Some(response) = current.as_mut() {
                    let value = text.trim();
                    match (name.as_str(), stack.last().map(String::as_str)) {
                        ("href", Some("response")) => response.href = value.to_string(),
                        ("href", Some("current-user-principal")) => {
                            response.principal_href = non_empty(value)
                        }
                        ("href", Some("calendar-home-set")) => {
                            response.home_set_href = non_empty(value)
                        }
                        ("displayname", _) => response.display_name = non_empty(value),
                        ("calendar-data", _) => response.calendar_data = non_empty(value),
                        ("calendar", Some("resourcetype")) => response.is_calendar = true,
                        _ => {}
                    }
                }
                if name == "response" {
                    if let Some(response) = current.take() {
                        responses.push(response);
                    }
                }
                text.clear();
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(Error::Malformed(format!(
                    "multistatus XML at {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    Ok(responses)
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn parent_is(stack: &[String], name: &str) -> bool {
    stack.last().is_some_and(|p| p == name)
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
