//! Authenticated IMAP session scoped to one operation.

use imap::{ClientBuilder, ConnectionMode};
use tracing::debug;

use gmailkit_core::{Error, Result, Settings};

use crate::{FetchedHeader, FolderAccess, MailboxSession};

type Inner = imap::Session<imap::Connection>;

/// Logged-in IMAP session. Dropping it sends LOGOUT, so every exit path of
/// the owning operation releases the connection.
pub struct ImapSession {
    inner: Option<Inner>,
}

impl ImapSession {
    pub fn connect(settings: &Settings) -> Result<Self> {
        let creds = settings.credentials()?;
        debug!(
            "imap_connect start host={} port={}",
            settings.imap_host, settings.imap_port
        );
        let client = ClientBuilder::new(settings.imap_host.as_str(), settings.imap_port)
            .tls_kind(imap::TlsKind::Native)
            .mode(ConnectionMode::AutoTls)
            .connect()
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        debug!("imap_connect tcp connected");
        let session = client
            .login(&creds.address, &creds.secret)
            .map_err(|(err, _client)| login_error(err))?;
        debug!("imap_connect login ok user={}", creds.address);
        Ok(Self {
            inner: Some(session),
        })
    }

    fn session(&mut self) -> Result<&mut Inner> {
        self.inner
            .as_mut()
            .ok_or_else(|| Error::ConnectionFailed("IMAP session already closed".to_string()))
    }
}

impl Drop for ImapSession {
    fn drop(&mut self) {
        if let Some(mut session) = self.inner.take() {
            match session.logout() {
                Ok(()) => debug!("imap logout"),
                Err(err) => debug!("imap logout failed error={}", err),
            }
        }
    }
}

/// Connect, run `op`, log out. The session never outlives the call.
pub fn with_imap_session<T, F>(settings: &Settings, op: F) -> Result<T>
where
    F: FnOnce(&mut ImapSession) -> Result<T>,
{
    let mut session = ImapSession::connect(settings)?;
    op(&mut session)
}

impl MailboxSession for ImapSession {
    fn select_folder(&mut self, folder: &str, access: FolderAccess) -> Result<u32> {
        let session = self.session()?;
        let mailbox = match access {
            FolderAccess::ReadOnly => session.examine(folder),
            FolderAccess::ReadWrite => session.select(folder),
        }
        .map_err(imap_error)?;
        debug!(
            "imap select folder={} access={:?} exists={}",
            folder, access, mailbox.exists
        );
        Ok(mailbox.exists)
    }

    fn search_all_uids(&mut self) -> Result<Vec<u32>> {
        let uids = self.session()?.uid_search("ALL").map_err(imap_error)?;
        Ok(uids.into_iter().collect())
    }

    fn fetch_headers(&mut self, uids: &[u32]) -> Result<Vec<FetchedHeader>> {
        if uids.is_empty() {
            return Ok(Vec::new());
        }
        let fetches = self
            .session()?
            .uid_fetch(uid_set(uids), "(UID FLAGS BODY.PEEK[HEADER])")
            .map_err(imap_error)?;
        let mut out = Vec::new();
        for fetch in fetches.iter() {
            let Some(uid) = fetch.uid else {
                continue;
            };
            let seen = fetch
                .flags()
                .iter()
                .any(|f| matches!(f, imap::types::Flag::Seen));
            out.push(FetchedHeader {
                uid,
                header: fetch.header().unwrap_or(&[]).to_vec(),
                seen,
            });
        }
        debug!("imap fetch_headers requested={} got={}", uids.len(), out.len());
        Ok(out)
    }

    fn fetch_message(&mut self, uid: u32) -> Result<Option<Vec<u8>>> {
        let fetches = self
            .session()?
            .uid_fetch(uid.to_string(), "(UID RFC822)")
            .map_err(imap_error)?;
        Ok(fetches
            .iter()
            .filter(|f| f.uid.is_none_or(|u| u == uid))
            .find_map(|f| f.body().map(|b| b.to_vec())))
    }

    fn add_seen_flag(&mut self, uid: u32) -> Result<()> {
        self.session()?
            .uid_store(uid.to_string(), "+FLAGS (\\Seen)")
            .map_err(imap_error)?;
        debug!("imap store seen uid={}", uid);
        Ok(())
    }
}

fn uid_set(uids: &[u32]) -> String {
    uids.iter()
        .map(|uid| uid.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

fn login_error(err: imap::Error) -> Error {
    match &err {
        imap::Error::No(_) | imap::Error::Bad(_) => Error::AuthenticationFailed(err.to_string()),
        _ => imap_error(err),
    }
}

fn imap_error(err: imap::Error) -> Error {
    match &err {
        imap::Error::Io(_) | imap::Error::ConnectionLost => {
            Error::ConnectionFailed(err.to_string())
        }
        _ => Error::Server(err.to_string()),
    }
}
