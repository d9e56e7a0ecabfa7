use lettre::{
    Message, SmtpTransport, Transport,
    message::{Mailbox, MultiPart, header::ContentType},
    transport::smtp::{
        authentication::Credentials as SmtpCredentials,
        client::{Tls, TlsParameters},
    },
};
use tracing::debug;

use gmailkit_core::{Credentials, Error, OutboundMessage, Result, Settings};

const SMTPS_PORT: u16 = 465;

/// Compose and send one message: connect, STARTTLS, AUTH, send, QUIT.
pub fn send_message(settings: &Settings, outbound: &OutboundMessage) -> Result<()> {
    let creds = settings.credentials()?;
    let email = compose_message(&creds, outbound)?;

    let tls_parameters = TlsParameters::new(settings.smtp_host.clone())
        .map_err(|e| Error::ConnectionFailed(e.to_string()))?;
    let builder = SmtpTransport::builder_dangerous(settings.smtp_host.as_str()).port(settings.smtp_port);
    let builder = if settings.smtp_port == SMTPS_PORT {
        builder.tls(Tls::Wrapper(tls_parameters))
    } else {
        builder.tls(Tls::Required(tls_parameters))
    };
    let mailer = builder
        .credentials(SmtpCredentials::new(
            creds.address.clone(),
            creds.secret.clone(),
        ))
        .build();

    debug!(
        "smtp_send start host={} port={} recipients={}",
        settings.smtp_host,
        settings.smtp_port,
        outbound.to.len()
    );
    mailer.send(&email).map_err(smtp_error)?;
    debug!("smtp_send ok");
    Ok(())
}

/// Plain text only, or multipart/alternative with the plain part first.
pub fn compose_message(creds: &Credentials, outbound: &OutboundMessage) -> Result<Message> {
    if outbound.to.is_empty() {
        return Err(Error::InvalidInput("no recipients".to_string()));
    }
    let sender = outbound
        .from
        .as_deref()
        .filter(|f| !f.trim().is_empty())
        .unwrap_or(&creds.address);
    let mut builder = Message::builder()
        .from(parse_mailbox(sender)?)
        .subject(outbound.subject.as_str());
    for addr in &outbound.to {
        builder = builder.to(parse_mailbox(addr)?);
    }

    let html = outbound.body_html.as_deref().filter(|h| !h.is_empty());
    let email = match html {
        Some(html) => builder.multipart(MultiPart::alternative_plain_html(
            outbound.body_plain.clone(),
            html.to_string(),
        )),
        None => builder
            .header(ContentType::TEXT_PLAIN)
            .body(outbound.body_plain.clone()),
    };
    email.map_err(|e| Error::InvalidInput(e.to_string()))
}

fn parse_mailbox(input: &str) -> Result<Mailbox> {
    let trimmed = input.trim();
    let invalid = |e: lettre::address::AddressError| {
        Error::InvalidInput(format!("invalid address {:?}: {}", trimmed, e))
    };
    if let (Some(start), Some(end)) = (trimmed.find('<'), trimmed.rfind('>')) {
        if start < end {
            let name = trimmed[..start].trim().trim_matches('"');
            let addr = trimmed[start + 1..end].trim();
            let name = (!name.is_empty()).then(|| name.to_string());
            return Ok(Mailbox::new(name, addr.parse().map_err(invalid)?));
        }
    }
    Ok(Mailbox::new(None, trimmed.parse().map_err(invalid)?))
}

// 530/534/535 are the authentication replies; other replies are passed on.
fn smtp_error(err: lettre::transport::smtp::Error) -> Error {
    match err.status().map(|code| code.to_string()) {
        Some(code) if matches!(code.as_str(), "530" | "534" | "535") => {
            Error::AuthenticationFailed(err.to_string())
        }
        Some(_) => Error::Server(err.to_string()),
        None => Error::ConnectionFailed(err.to_string()),
    }
}
