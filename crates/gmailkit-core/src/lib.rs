//! Shared configuration, error taxonomy and value types for the gmailkit tools.

pub mod config;
pub mod error;
pub mod logging;
pub mod model;

pub use config::{Credentials, FileConfig, Overrides, Settings};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{
    CalendarDescriptor, CalendarEvent, DEFAULT_FOLDER, EventTime, MailMessage, MailboxEntry,
    OutboundMessage, Recipients, UNTITLED_EVENT,
};
