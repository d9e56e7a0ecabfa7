//! Command-line front ends: `gmail-mail` and `gmail-calendar`.

pub mod calendar_cli;
pub mod mail_cli;
mod output;
