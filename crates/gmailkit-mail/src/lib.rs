//! Mailbox operations over IMAP and outbound mail over SMTP.

use std::collections::HashMap;

use tracing::debug;

use gmailkit_content::{parse_message, summarize_headers};
use gmailkit_core::{MailMessage, MailboxEntry, Result, Settings};

pub mod session;
pub mod smtp;

pub use session::{ImapSession, with_imap_session};
pub use smtp::{compose_message, send_message};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderAccess {
    /// EXAMINE; fetching never changes flags.
    ReadOnly,
    ReadWrite,
}

#[derive(Debug, Clone)]
pub struct FetchedHeader {
    pub uid: u32,
    pub header: Vec<u8>,
    pub seen: bool,
}

/// The handful of IMAP commands the mailbox operations need, addressed by UID.
pub trait MailboxSession {
    /// Returns the number of messages in the folder.
    fn select_folder(&mut self, folder: &str, access: FolderAccess) -> Result<u32>;
    fn search_all_uids(&mut self) -> Result<Vec<u32>>;
    fn fetch_headers(&mut self, uids: &[u32]) -> Result<Vec<FetchedHeader>>;
    /// `None` when the server has no message with that UID.
    fn fetch_message(&mut self, uid: u32) -> Result<Option<Vec<u8>>>;
    fn add_seen_flag(&mut self, uid: u32) -> Result<()>;
}

pub fn list_messages(settings: &Settings, folder: &str, max_count: usize) -> Result<Vec<MailboxEntry>> {
    with_imap_session(settings, |session| list_messages_in(session, folder, max_count))
}

pub fn open_message(settings: &Settings, folder: &str, uid: u32) -> Result<Option<MailMessage>> {
    with_imap_session(settings, |session| open_message_in(session, folder, uid))
}

pub fn mark_as_read(settings: &Settings, folder: &str, uid: u32) -> Result<()> {
    with_imap_session(settings, |session| mark_as_read_in(session, folder, uid))
}

/// Newest-first headers and read state for at most `max_count` messages.
pub fn list_messages_in<S>(session: &mut S, folder: &str, max_count: usize) -> Result<Vec<MailboxEntry>>
where
    S: MailboxSession + ?Sized,
{
    debug!("imap_list start folder={} max={}", folder, max_count);
    let exists = session.select_folder(folder, FolderAccess::ReadOnly)?;
    if exists == 0 || max_count == 0 {
        return Ok(Vec::new());
    }
    let uids = newest_uids(session.search_all_uids()?, max_count);
    if uids.is_empty() {
        return Ok(Vec::new());
    }

    let mut by_uid: HashMap<u32, FetchedHeader> = session
        .fetch_headers(&uids)?
        .into_iter()
        .map(|fetched| (fetched.uid, fetched))
        .collect();
    let entries: Vec<MailboxEntry> = uids
        .iter()
        .filter_map(|uid| by_uid.remove(uid))
        .map(|fetched| {
            let summary = summarize_headers(&fetched.header);
            MailboxEntry {
                uid: fetched.uid,
                subject: summary.subject,
                from: summary.from,
                date: summary.date,
                seen: fetched.seen,
            }
        })
        .collect();
    debug!("imap_list done folder={} count={}", folder, entries.len());
    Ok(entries)
}

pub fn open_message_in<S>(session: &mut S, folder: &str, uid: u32) -> Result<Option<MailMessage>>
where
    S: MailboxSession + ?Sized,
{
    session.select_folder(folder, FolderAccess::ReadOnly)?;
    let Some(raw) = session.fetch_message(uid)? else {
        debug!("imap_open not found folder={} uid={}", folder, uid);
        return Ok(None);
    };
    let content = parse_message(&raw)?;
    Ok(Some(MailMessage {
        uid,
        subject: content.headers.subject,
        from: content.headers.from,
        date: content.headers.date,
        body_plain: content.body_plain,
        body_html: content.body_html,
    }))
}

pub fn mark_as_read_in<S>(session: &mut S, folder: &str, uid: u32) -> Result<()>
where
    S: MailboxSession + ?Sized,
{
    session.select_folder(folder, FolderAccess::ReadWrite)?;
    session.add_seen_flag(uid)
}

/// UIDs ascend with arrival, so the newest are at the tail.
fn newest_uids(mut uids: Vec<u32>, max_count: usize) -> Vec<u32> {
    uids.sort_unstable();
    uids.dedup();
    let skip = uids.len().saturating_sub(max_count);
    uids.into_iter().skip(skip).rev().collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use gmailkit_core::{Error, Settings};

    use super::{
        FetchedHeader, FolderAccess, MailboxSession, list_messages_in, mark_as_read_in,
        newest_uids, open_message_in,
    };

    struct FakeMessage {
        uid: u32,
        raw: Vec<u8>,
        seen: bool,
    }

    #[derive(Default)]
    struct FakeMailbox {
        folders: HashMap<String, Vec<FakeMessage>>,
        selected: Option<(String, FolderAccess)>,
    }

    impl FakeMailbox {
        fn with_folder(mut self, name: &str, messages: Vec<FakeMessage>) -> Self {
            self.folders.insert(name.to_string(), messages);
            self
        }

        fn current(&mut self) -> Result<&mut Vec<FakeMessage>, Error> {
            let (name, _) = self
                .selected
                .as_ref()
                .ok_or_else(|| Error::Server("BAD no folder selected".into()))?;
            let name = name.clone();
            self.folders
                .get_mut(&name)
                .ok_or_else(|| Error::Server("NO no such folder".into()))
        }
    }

    impl MailboxSession for FakeMailbox {
        fn select_folder(&mut self, folder: &str, access: FolderAccess) -> Result<u32, Error> {
            let count = self
                .folders
                .get(folder)
                .map(|m| m.len() as u32)
                .ok_or_else(|| Error::Server(format!("NO [NONEXISTENT] Unknown Mailbox: {}", folder)))?;
            self.selected = Some((folder.to_string(), access));
            Ok(count)
        }

        fn search_all_uids(&mut self) -> Result<Vec<u32>, Error> {
            Ok(self.current()?.iter().map(|m| m.uid).collect())
        }

        fn fetch_headers(&mut self, uids: &[u32]) -> Result<Vec<FetchedHeader>, Error> {
            Ok(self
                .current()?
                .iter()
                .filter(|m| uids.contains(&m.uid))
                .map(|m| FetchedHeader {
                    uid: m.uid,
                    header: m.raw.clone(),
                    seen: m.seen,
                })
                .collect())
        }

        fn fetch_message(&mut self, uid: u32) -> Result<Option<Vec<u8>>, Error> {
            Ok(self
                .current()?
                .iter()
                .find(|m| m.uid == uid)
                .map(|m| m.raw.clone()))
        }

        fn add_seen_flag(&mut self, uid: u32) -> Result<(), Error> {
            if !matches!(self.selected, Some((_, FolderAccess::ReadWrite))) {
                return Err(Error::Server("NO mailbox is read-only".into()));
            }
            if let Some(message) = self.current()?.iter_mut().find(|m| m.uid == uid) {
                message.seen = true;
            }
            Ok(())
        }
    }

    fn message(uid: u32, subject: &str, seen: bool) -> FakeMessage {
        FakeMessage {
            uid,
            raw: format!(
                "From: Sender <sender@example.com>\r\nDate: Wed, 3 Jan 2024 09:00:00 +0000\r\nSubject: {}\r\n\r\nbody of {}\r\n",
                subject, uid
            )
            .into_bytes(),
            seen,
        }
    }

    #[test]
    fn empty_folder_lists_nothing() -> anyhow::Result<()> {
        let mut mailbox = FakeMailbox::default().with_folder("INBOX", Vec::new());
        let entries = list_messages_in(&mut mailbox, "INBOX", 20)?;
        assert!(entries.is_empty());
        Ok(())
    }

    #[test]
    fn list_is_newest_first_and_bounded() -> anyhow::Result<()> {
        let mut mailbox = FakeMailbox::default().with_folder(
            "INBOX",
            vec![
                message(3, "three", true),
                message(10, "ten", false),
                message(5, "five", true),
                message(7, "seven", false),
            ],
        );
        let entries = list_messages_in(&mut mailbox, "INBOX", 2)?;
        let uids: Vec<u32> = entries.iter().map(|e| e.uid).collect();
        assert_eq!(uids, vec![10, 7]);
        assert_eq!(entries[0].subject, "ten");
        assert_eq!(entries[0].from, "Sender <sender@example.com>");
        assert!(!entries[0].seen);
        assert_eq!(mailbox.selected, Some(("INBOX".to_string(), FolderAccess::ReadOnly)));

        let all = list_messages_in(&mut mailbox, "INBOX", 50)?;
        assert_eq!(all.len(), 4);
        assert_eq!(all.last().map(|e| e.uid), Some(3));
        Ok(())
    }

    #[test]
    fn zero_max_lists_nothing() -> anyhow::Result<()> {
        let mut mailbox =
            FakeMailbox::default().with_folder("INBOX", vec![message(1, "one", false)]);
        assert!(list_messages_in(&mut mailbox, "INBOX", 0)?.is_empty());
        Ok(())
    }

    #[test]
    fn mark_read_shows_up_in_next_list() -> anyhow::Result<()> {
        let mut mailbox = FakeMailbox::default().with_folder(
            "INBOX",
            vec![message(1, "one", false), message(2, "two", false)],
        );
        mark_as_read_in(&mut mailbox, "INBOX", 1)?;
        assert_eq!(mailbox.selected, Some(("INBOX".to_string(), FolderAccess::ReadWrite)));

        let entries = list_messages_in(&mut mailbox, "INBOX", 10)?;
        let seen: Vec<(u32, bool)> = entries.iter().map(|e| (e.uid, e.seen)).collect();
        assert_eq!(seen, vec![(2, false), (1, true)]);
        Ok(())
    }

    #[test]
    fn open_unknown_uid_is_not_found() -> anyhow::Result<()> {
        let mut mailbox =
            FakeMailbox::default().with_folder("INBOX", vec![message(1, "one", false)]);
        assert!(open_message_in(&mut mailbox, "INBOX", 99)?.is_none());
        Ok(())
    }

    #[test]
    fn open_decodes_headers_and_body() -> anyhow::Result<()> {
        let mut mailbox =
            FakeMailbox::default().with_folder("Archive", vec![message(4, "=?UTF-8?Q?Caf=C3=A9?=", true)]);
        let opened = open_message_in(&mut mailbox, "Archive", 4)?
            .ok_or_else(|| anyhow::anyhow!("message should exist"))?;
        assert_eq!(opened.uid, 4);
        assert_eq!(opened.subject, "Café");
        assert_eq!(opened.date, "Wed, 3 Jan 2024 09:00:00 +0000");
        assert_eq!(opened.body_plain.trim_end(), "body of 4");
        assert!(opened.body_html.is_empty());
        assert_eq!(mailbox.selected, Some(("Archive".to_string(), FolderAccess::ReadOnly)));
        Ok(())
    }

    #[test]
    fn unknown_folder_error_propagates() {
        let mut mailbox = FakeMailbox::default();
        let err = list_messages_in(&mut mailbox, "Nope", 5).unwrap_err();
        assert!(err.to_string().contains("Unknown Mailbox"));
    }

    #[test]
    fn newest_uids_takes_tail_and_reverses() {
        assert_eq!(newest_uids(vec![1, 2, 3, 4, 5], 3), vec![5, 4, 3]);
        assert_eq!(newest_uids(vec![5, 1, 3], 10), vec![5, 3, 1]);
        assert!(newest_uids(Vec::new(), 4).is_empty());
    }

    fn without_account() -> Settings {
        Settings {
            user: "me@example.com".into(),
            password: String::new(),
            imap_host: "imap.invalid".into(),
            imap_port: 993,
            smtp_host: "smtp.invalid".into(),
            smtp_port: 587,
        }
    }

    #[test]
    fn mailbox_operations_need_credentials() {
        let settings = without_account();
        assert!(matches!(
            super::list_messages(&settings, "INBOX", 10),
            Err(Error::MissingCredentials)
        ));
        assert!(matches!(
            super::open_message(&settings, "INBOX", 1),
            Err(Error::MissingCredentials)
        ));
        assert!(matches!(
            super::mark_as_read(&settings, "INBOX", 1),
            Err(Error::MissingCredentials)
        ));
    }
}
