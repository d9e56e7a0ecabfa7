//! HTTP side of CalDAV: PROPFIND and REPORT with Basic auth.

use base64::Engine;
use reqwest::StatusCode;
use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use tracing::debug;

use gmailkit_core::{Credentials, Error, Result};

/// Returns the multistatus body of a WebDAV request.
pub trait DavTransport {
    fn propfind(&self, url: &str, depth: u8, body: &str) -> Result<String>;
    fn report(&self, url: &str, depth: u8, body: &str) -> Result<String>;
}

pub struct HttpDavTransport {
    client: Client,
    auth_header: String,
}

impl HttpDavTransport {
    pub fn new(creds: &Credentials) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        Ok(Self {
            client,
            auth_header: basic_auth_header(creds),
        })
    }

    fn send(&self, method: &[u8], url: &str, depth: u8, body: &str) -> Result<String> {
        let method = reqwest::Method::from_bytes(method)
            .map_err(|e| Error::InvalidInput(e.to_string()))?;
        debug!("dav request method={} url={} depth={}", method, url, depth);
        let response = self
            .client
            .request(method, url)
            .header(AUTHORIZATION, &self.auth_header)
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .header("Depth", depth.to_string())
            .body(body.to_string())
            .send()
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
        debug!("dav response status={} bytes={}", status, text.len());
        check_status(status, &text)?;
        Ok(text)
    }
}

impl DavTransport for HttpDavTransport {
    fn propfind(&self, url: &str, depth: u8, body: &str) -> Result<String> {
        self.send(b"PROPFIND", url, depth, body)
    }

    fn report(&self, url: &str, depth: u8, body: &str) -> Result<String> {
        self.send(b"REPORT", url, depth, body)
    }
}

fn basic_auth_header(creds: &Credentials) -> String {
    let pair = format!("{}:{}", creds.address, creds.secret);
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(pair)
    )
}

// 207 Multi-Status is inside the 2xx range.
fn check_status(status: StatusCode, body: &str) -> Result<()> {
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        return Err(Error::AuthenticationFailed(format!(
            "{} (HTTP 401 Unauthorized from calendar server)",
            status
        )));
    }
    if !status.is_success() {
        return Err(Error::Server(format!("{} - {}", status, body.trim())));
    }
    Ok(())
}
