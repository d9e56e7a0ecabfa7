//! Message header and body decoding.

use std::borrow::Cow;

use mailparse::{MailHeader, MailHeaderMap, ParsedMail};

use gmailkit_core::{Error, Result};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderSummary {
    pub subject: String,
    pub from: String,
    pub date: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MessageContent {
    pub headers: HeaderSummary,
    pub body_plain: String,
    pub body_html: String,
}

/// Subject/From/Date out of a raw header block. Never fails; unparsable
/// headers yield empty fields.
pub fn summarize_headers(raw: &[u8]) -> HeaderSummary {
    let raw = with_clean_headers(raw);
    match mailparse::parse_headers(&raw) {
        Ok((headers, _)) => summary_from(&headers),
        Err(_) => HeaderSummary::default(),
    }
}

pub fn parse_message(raw: &[u8]) -> Result<MessageContent> {
    let raw = with_clean_headers(raw);
    let parsed = mailparse::parse_mail(&raw).map_err(|e| Error::Malformed(e.to_string()))?;
    let headers = summary_from(&parsed.headers);
    let (body_plain, body_html) = extract_bodies(&parsed);
    Ok(MessageContent {
        headers,
        body_plain,
        body_html,
    })
}

/// Plain-text rendering of an HTML body for terminals.
pub fn html_to_text(html: &str, width_cols: usize) -> String {
    html2text::from_read(html.as_bytes(), width_cols.max(20))
}

fn summary_from(headers: &[MailHeader]) -> HeaderSummary {
    HeaderSummary {
        subject: header_value(headers, "Subject").unwrap_or_default(),
        from: header_value(headers, "From").unwrap_or_default(),
        date: header_value(headers, "Date")
            .map(|d| d.trim().to_string())
            .unwrap_or_default(),
    }
}

/// Replaces bytes in the header block that are not UTF-8 with U+FFFD. The
/// body is left alone so 8-bit parts still decode with their own charset.
fn with_clean_headers(raw: &[u8]) -> Cow<'_, [u8]> {
    let body_start = mailparse::parse_headers(raw)
        .map(|(_, offset)| offset)
        .unwrap_or(raw.len());
    let (head, body) = raw.split_at(body_start);
    match String::from_utf8_lossy(head) {
        Cow::Borrowed(_) => Cow::Borrowed(raw),
        Cow::Owned(clean) => {
            let mut out = clean.into_bytes();
            out.extend_from_slice(body);
            Cow::Owned(out)
        }
    }
}

// Encoded words are decoded and joined.
fn header_value(headers: &[MailHeader], name: &str) -> Option<String> {
    let header = headers.get_first_header(name)?;
    Some(
        header
            .get_value_utf8()
            .unwrap_or_else(|_| header.get_value()),
    )
}

fn extract_bodies(parsed: &ParsedMail) -> (String, String) {
    let is_multipart = !parsed.subparts.is_empty()
        || parsed.ctype.mimetype.to_lowercase().starts_with("multipart/");
    if !is_multipart {
        return (parsed.get_body().unwrap_or_default(), String::new());
    }

    let mut text_plain: Option<String> = None;
    let mut text_html: Option<String> = None;
    walk_parts(parsed, &mut |part| {
        let ctype = part.ctype.mimetype.to_lowercase();
        if ctype == "text/plain" && text_plain.is_none() {
            text_plain = Some(part.get_body().unwrap_or_default());
        }
        if ctype == "text/html" && text_html.is_none() {
            text_html = Some(part.get_body().unwrap_or_default());
        }
    });
    (text_plain.unwrap_or_default(), text_html.unwrap_or_default())
}

fn walk_parts<F>(parsed: &ParsedMail, cb: &mut F)
where
    F: FnMut(&ParsedMail),
{
    cb(parsed);
    for part in &parsed.subparts {
        walk_parts(part, cb);
    }
}

#[cfg(test)]
mod tests {
    use super::{html_to_text, parse_message, summarize_headers};

    #[test]
    fn encoded_words_are_decoded_and_joined() {
        let raw = b"Subject: =?ISO-8859-1?Q?Caf=E9?= =?ISO-8859-1?Q?_au_lait?=\r\nFrom: =?UTF-8?B?SsO8cmdlbg==?= <j@example.com>\r\nDate: Wed, 3 Jan 2024 09:00:00 +0000\r\n\r\n";
        let summary = summarize_headers(raw);
        assert_eq!(summary.subject, "Café au lait");
        assert_eq!(summary.from, "Jürgen <j@example.com>");
        assert_eq!(summary.date, "Wed, 3 Jan 2024 09:00:00 +0000");
    }

    #[test]
    fn raw_utf8_and_invalid_bytes_do_not_fail() {
        let utf8 = "Subject: Grüße\r\n\r\n".as_bytes();
        assert_eq!(summarize_headers(utf8).subject, "Grüße");

        let invalid = b"Subject: Hi \xff\xfe there\r\n\r\n";
        let subject = summarize_headers(invalid).subject;
        assert_eq!(subject, "Hi \u{FFFD}\u{FFFD} there");
    }

    #[test]
    fn invalid_header_bytes_are_replaced_in_full_messages() -> anyhow::Result<()> {
        let raw = b"From: =?UTF-8?B?SsO8cmdlbg==?= <j@example.com>\r\nSubject: caf\xe9\r\n\r\nhello\r\n";
        let content = parse_message(raw)?;
        assert_eq!(content.headers.subject, "caf\u{FFFD}");
        assert_eq!(content.headers.from, "J\u{fc}rgen <j@example.com>");
        assert_eq!(content.body_plain.trim_end(), "hello");
        Ok(())
    }

    #[test]
    fn missing_headers_are_empty() {
        let summary = summarize_headers(b"X-Other: 1\r\n\r\n");
        assert!(summary.subject.is_empty());
        assert!(summary.from.is_empty());
        assert!(summary.date.is_empty());
    }

    #[test]
    fn alternative_message_yields_both_bodies() -> anyhow::Result<()> {
        let raw = concat!(
            "From: a@example.com\r\n",
            "Subject: Both\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/alternative; boundary=\"b1\"\r\n",
            "\r\n",
            "--b1\r\n",
            "Content-Type: text/plain; charset=utf-8\r\n",
            "\r\n",
            "plain text\r\n",
            "--b1\r\n",
            "Content-Type: text/html; charset=utf-8\r\n",
            "\r\n",
            "<p>html</p>\r\n",
            "--b1--\r\n",
        );
        let content = parse_message(raw.as_bytes())?;
        assert_eq!(content.headers.subject, "Both");
        assert_eq!(content.body_plain.trim_end(), "plain text");
        assert_eq!(content.body_html.trim_end(), "<p>html</p>");
        Ok(())
    }

    #[test]
    fn first_part_of_each_type_wins_in_part_order() -> anyhow::Result<()> {
        let raw = concat!(
            "Subject: Nested\r\n",
            "Content-Type: multipart/mixed; boundary=\"outer\"\r\n",
            "\r\n",
            "--outer\r\n",
            "Content-Type: multipart/alternative; boundary=\"inner\"\r\n",
            "\r\n",
            "--inner\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Transfer-Encoding: quoted-printable\r\n",
            "\r\n",
            "first =3D plain\r\n",
            "--inner\r\n",
            "Content-Type: text/html\r\n",
            "\r\n",
            "<b>first</b>\r\n",
            "--inner--\r\n",
            "--outer\r\n",
            "Content-Type: text/plain\r\n",
            "Content-Disposition: attachment; filename=\"notes.txt\"\r\n",
            "\r\n",
            "second plain\r\n",
            "--outer--\r\n",
        );
        let content = parse_message(raw.as_bytes())?;
        assert_eq!(content.body_plain.trim_end(), "first = plain");
        assert_eq!(content.body_html.trim_end(), "<b>first</b>");
        Ok(())
    }

    #[test]
    fn single_part_payload_is_the_plain_body() -> anyhow::Result<()> {
        let raw = b"Subject: Html only\r\nContent-Type: text/html\r\n\r\n<i>hello</i>";
        let content = parse_message(raw)?;
        assert_eq!(content.body_plain, "<i>hello</i>");
        assert!(content.body_html.is_empty());
        Ok(())
    }

    #[test]
    fn multipart_without_text_parts_has_empty_bodies() -> anyhow::Result<()> {
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=\"x\"\r\n",
            "\r\n",
            "--x\r\n",
            "Content-Type: application/pdf\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "JVBERi0=\r\n",
            "--x--\r\n",
        );
        let content = parse_message(raw.as_bytes())?;
        assert!(content.body_plain.is_empty());
        assert!(content.body_html.is_empty());
        Ok(())
    }

    #[test]
    fn html_renders_to_text() {
        let text = html_to_text("<p>Hello <b>world</b></p>", 80);
        assert!(text.contains("Hello"));
        assert!(text.contains("world"));
    }
}
