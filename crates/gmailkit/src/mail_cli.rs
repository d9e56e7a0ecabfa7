//! `gmail-mail`: send, list, open and mark-read.

use std::ffi::OsString;
use std::process::ExitCode;

use anyhow::{Result, anyhow};
use clap::{Args, Parser, Subcommand};
use serde_json::json;

use gmailkit_content::html_to_text;
use gmailkit_core::{DEFAULT_FOLDER, MailMessage, MailboxEntry, OutboundMessage, Overrides, Settings};

use crate::output::{Report, bootstrap, clip, finish, parse_args};

const HTML_WRAP_COLS: usize = 80;

#[derive(Parser, Debug)]
#[command(
    name = "gmail-mail",
    version,
    about = "Send email, list mailbox, open mail, mark as read"
)]
pub struct MailCli {
    /// Gmail address (or set GMAIL_USER)
    #[arg(long, global = true)]
    user: Option<String>,
    /// App password (or set GMAIL_APP_PASSWORD)
    #[arg(long, global = true)]
    password: Option<String>,
    /// IMAP host (default from env or imap.gmail.com)
    #[arg(long, global = true)]
    imap_host: Option<String>,
    /// IMAP port (default from env or 993)
    #[arg(long, global = true)]
    imap_port: Option<u16>,
    /// SMTP host (default from env or smtp.gmail.com)
    #[arg(long, global = true)]
    smtp_host: Option<String>,
    /// SMTP port (default from env or 587)
    #[arg(long, global = true)]
    smtp_port: Option<u16>,
    /// Print one JSON document instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: MailCommand,
}

#[derive(Subcommand, Debug)]
enum MailCommand {
    /// Send an email
    Send(SendCmd),
    /// List recent emails
    List(ListCmd),
    /// Show one email by UID
    Open(OpenCmd),
    /// Mark an email as read
    MarkRead(MarkReadCmd),
}

#[derive(Args, Debug)]
struct SendCmd {
    /// Recipient; repeat the flag or separate with commas
    #[arg(long, required = true, value_delimiter = ',')]
    to: Vec<String>,
    #[arg(long)]
    subject: String,
    /// Body text
    #[arg(long)]
    body: String,
    /// HTML alternative of the body
    #[arg(long)]
    html: Option<String>,
    /// Sender, when different from the account address
    #[arg(long)]
    from: Option<String>,
}

#[derive(Args, Debug)]
struct ListCmd {
    #[arg(long, default_value = DEFAULT_FOLDER)]
    folder: String,
    /// Max emails to list
    #[arg(long, default_value_t = 20)]
    max: usize,
}

#[derive(Args, Debug)]
struct OpenCmd {
    /// Email UID from list
    uid: u32,
    #[arg(long, default_value = DEFAULT_FOLDER)]
    folder: String,
}

#[derive(Args, Debug)]
struct MarkReadCmd {
    /// Email UID from list
    uid: u32,
    #[arg(long, default_value = DEFAULT_FOLDER)]
    folder: String,
}

pub fn run<I, T>(args: I) -> ExitCode
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    bootstrap();
    let cli: MailCli = match parse_args(args) {
        Ok(cli) => cli,
        Err(code) => return code,
    };
    let json = cli.json;
    finish(execute(cli), json, |_| None)
}

impl MailCli {
    fn overrides(&self) -> Overrides {
        Overrides {
            user: self.user.clone(),
            password: self.password.clone(),
            imap_host: self.imap_host.clone(),
            imap_port: self.imap_port,
            smtp_host: self.smtp_host.clone(),
            smtp_port: self.smtp_port,
        }
    }
}

fn execute(cli: MailCli) -> Result<Report> {
    let settings = Settings::resolve(&cli.overrides())?;
    match cli.command {
        MailCommand::Send(cmd) => {
            let outbound = outbound_from(cmd);
            gmailkit_mail::send_message(&settings, &outbound)?;
            Ok(sent_report(&outbound.to))
        }
        MailCommand::List(cmd) => {
            let entries = gmailkit_mail::list_messages(&settings, &cmd.folder, cmd.max)?;
            Ok(list_report(&entries))
        }
        MailCommand::Open(cmd) => {
            let message = gmailkit_mail::open_message(&settings, &cmd.folder, cmd.uid)?
                .ok_or_else(|| anyhow!("Email not found"))?;
            Ok(open_report(&message))
        }
        MailCommand::MarkRead(cmd) => {
            gmailkit_mail::mark_as_read(&settings, &cmd.folder, cmd.uid)?;
            Ok(Report::new(
                vec![format!("Marked UID {} as read", cmd.uid)],
                json!({ "uid": cmd.uid, "folder": cmd.folder, "seen": true }),
            ))
        }
    }
}

fn outbound_from(cmd: SendCmd) -> OutboundMessage {
    let to: Vec<String> = cmd
        .to
        .iter()
        .map(|addr| addr.trim().to_string())
        .filter(|addr| !addr.is_empty())
        .collect();
    let mut outbound = OutboundMessage::new(to, cmd.subject, cmd.body);
    if let Some(html) = cmd.html {
        outbound = outbound.with_html(html);
    }
    if let Some(from) = cmd.from {
        outbound = outbound.with_from(from);
    }
    outbound
}

fn sent_report(to: &[String]) -> Report {
    Report::new(
        vec![format!("Email sent to {}", to.join(", "))],
        json!({ "sent": true, "to": to }),
    )
}

fn list_report(entries: &[MailboxEntry]) -> Report {
    let text = entries
        .iter()
        .map(|entry| {
            let unread = if entry.seen { "" } else { " (unread)" };
            format!(
                "UID {}{} | {} | {} | {}",
                entry.uid,
                unread,
                entry.date,
                clip(&entry.from, 40),
                clip(&entry.subject, 50)
            )
        })
        .collect();
    Report::new(text, json!(entries))
}

fn open_report(message: &MailMessage) -> Report {
    let body = if !message.body_plain.is_empty() {
        message.body_plain.clone()
    } else if !message.body_html.is_empty() {
        html_to_text(&message.body_html, HTML_WRAP_COLS)
    } else {
        "(no body)".to_string()
    };
    let text = vec![
        format!("From: {}", message.from),
        format!("Date: {}", message.date),
        format!("Subject: {}", message.subject),
        "-".repeat(40),
        body,
    ];
    Report::new(text, json!(message))
}
