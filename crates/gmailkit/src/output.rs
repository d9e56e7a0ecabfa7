use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use serde_json::{Value as JsonValue, json};

const CLI_SCHEMA_VERSION: &str = "gmailkit.cli.v1";

/// What a command produced, in both output modes.
pub(crate) struct Report {
    pub(crate) text: Vec<String>,
    pub(crate) json: JsonValue,
}

impl Report {
    pub(crate) fn new(text: Vec<String>, json: JsonValue) -> Self {
        Self { text, json }
    }
}

/// Loads `.env` and starts the opt-in file logger.
pub(crate) fn bootstrap() {
    let _ = dotenvy::dotenv();
    gmailkit_core::init_logging();
}

/// Usage errors exit 1; `--help` and `--version` exit 0.
pub(crate) fn parse_args<C, I, T>(args: I) -> std::result::Result<C, ExitCode>
where
    C: Parser,
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    C::try_parse_from(args).map_err(|err| {
        let _ = err.print();
        if err.use_stderr() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        }
    })
}

/// Prints the outcome and maps it to the process exit code. `hint` may add
/// a line on stderr ahead of the error itself.
pub(crate) fn finish(
    outcome: Result<Report>,
    json: bool,
    hint: impl Fn(&anyhow::Error) -> Option<&'static str>,
) -> ExitCode {
    match outcome {
        Ok(report) => {
            let printed = if json {
                output_ok(report.json)
            } else {
                for line in &report.text {
                    println!("{}", line);
                }
                Ok(())
            };
            match printed {
                Ok(()) => ExitCode::SUCCESS,
                Err(err) => {
                    eprintln!("{}", err);
                    ExitCode::FAILURE
                }
            }
        }
        Err(err) => {
            let stdout = std::io::stdout();
            let stderr = std::io::stderr();
            if let Err(print_err) =
                report_failure(&err, json, &hint, &mut stdout.lock(), &mut stderr.lock())
            {
                eprintln!("{}", print_err);
            }
            ExitCode::FAILURE
        }
    }
}

/// The error always reaches `err_out`, preceded by the hint when there is
/// one. JSON mode also writes the error envelope to `out`.
pub(crate) fn report_failure(
    err: &anyhow::Error,
    json: bool,
    hint: impl Fn(&anyhow::Error) -> Option<&'static str>,
    out: &mut impl Write,
    err_out: &mut impl Write,
) -> Result<()> {
    if json {
        writeln!(out, "{}", render_error(&err.to_string())?)?;
    }
    if let Some(hint) = hint(err) {
        writeln!(err_out, "{}", hint)?;
    }
    writeln!(err_out, "{}", err)?;
    Ok(())
}

fn output_ok(value: JsonValue) -> Result<()> {
    println!("{}", render_ok(value)?);
    Ok(())
}

fn render_ok(value: JsonValue) -> Result<String> {
    Ok(serde_json::to_string(&json!({
        "schema": CLI_SCHEMA_VERSION,
        "ok": true,
        "result": value
    }))?)
}

fn render_error(message: &str) -> Result<String> {
    Ok(serde_json::to_string(&json!({
        "schema": CLI_SCHEMA_VERSION,
        "ok": false,
        "error": message
    }))?)
}

/// First `max` characters, never splitting a code point.
pub(crate) fn clip(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use serde_json::{Value as JsonValue, json};

    use super::{clip, render_error, render_ok, report_failure};

    fn captured(json: bool, hint: Option<&'static str>) -> anyhow::Result<(String, String)> {
        let err = anyhow::anyhow!("GMAIL_USER and GMAIL_APP_PASSWORD are required");
        let mut out = Vec::new();
        let mut err_out = Vec::new();
        report_failure(&err, json, |_| hint, &mut out, &mut err_out)?;
        Ok((String::from_utf8(out)?, String::from_utf8(err_out)?))
    }

    #[test]
    fn json_envelopes() -> anyhow::Result<()> {
        let ok: JsonValue = serde_json::from_str(&render_ok(json!([1, 2]))?)?;
        assert_eq!(ok["schema"], "gmailkit.cli.v1");
        assert_eq!(ok["ok"], true);
        assert_eq!(ok["result"], json!([1, 2]));

        let err: JsonValue = serde_json::from_str(&render_error("boom")?)?;
        assert_eq!(err["ok"], false);
        assert_eq!(err["error"], "boom");
        Ok(())
    }

    #[test]
    fn clip_counts_characters() {
        assert_eq!(clip("héllo", 2), "hé");
        assert_eq!(clip("abc", 10), "abc");
    }

    #[test]
    fn json_failure_still_reports_on_stderr() -> anyhow::Result<()> {
        let (out, err_out) = captured(true, Some("try again later"))?;
        let envelope: JsonValue = serde_json::from_str(out.trim())?;
        assert_eq!(envelope["ok"], false);
        assert_eq!(
            envelope["error"],
            "GMAIL_USER and GMAIL_APP_PASSWORD are required"
        );
        assert_eq!(
            err_out,
            "try again later\nGMAIL_USER and GMAIL_APP_PASSWORD are required\n"
        );
        Ok(())
    }

    #[test]
    fn text_failure_writes_only_stderr() -> anyhow::Result<()> {
        let (out, err_out) = captured(false, None)?;
        assert!(out.is_empty());
        assert_eq!(err_out, "GMAIL_USER and GMAIL_APP_PASSWORD are required\n");
        Ok(())
    }
}
