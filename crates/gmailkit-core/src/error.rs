//! Error taxonomy shared by the mail and calendar crates.

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("GMAIL_USER and GMAIL_APP_PASSWORD are required (pass --user/--password or set them in the environment)")]
    MissingCredentials,

    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Protocol-level failure reported by the server, passed through verbatim.
    #[error("{0}")]
    Server(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A response that could not be parsed.
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl Error {
    /// True for rejected credentials and for any failure whose message looks
    /// like an HTTP 401.
    pub fn is_unauthorized(&self) -> bool {
        if matches!(self, Self::AuthenticationFailed(_)) {
            return true;
        }
        let text = self.to_string();
        text.contains("401") || text.contains("Unauthorized")
    }
}
