//! Log redaction: masks AWS account IDs, ARNs, and secret-shaped key/value
//! pairs before any log bytes reach a sink.
//!
//! Patterns are applied in a fixed order (ARNs, then standalone account IDs,
//! then secrets) so the masks never interact: once an ARN's account segment
//! is `***`, the standalone 12-digit pass has nothing left to match inside it.

use std::io;
use std::sync::OnceLock;

use regex::Regex;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

static REDACTOR: OnceLock<Redactor> = OnceLock::new();

/// Compiled redaction patterns.
pub struct Redactor {
    arn: Regex,
    account_id: Regex,
    secret: Regex,
}

impl Redactor {
    pub fn new() -> Self {
        Self {
            arn: Regex::new(r"arn:aws:[a-z0-9\-]+:[a-z0-9\-]*:\d{12}:\S+").unwrap(),
            account_id: Regex::new(r"\d{12}").unwrap(),
            secret: Regex::new(r"(?i)(secret|password|token|key)[\s:=]+\S+").unwrap(),
        }
    }

    /// Masks sensitive material in a message.
    pub fn redact(&self, msg: &str) -> String {
        // ARNs: mask the account segment, keep the rest readable.
        let msg = self.arn.replace_all(msg, |caps: &regex::Captures<'_>| {
            let mut parts: Vec<&str> = caps[0].split(':').collect();
            if parts.len() >= 5 {
                parts[4] = "***";
            }
            parts.join(":")
        });

        // Standalone 12-digit account IDs.
        let msg = self.account_id.replace_all(&msg, "************");

        // secret/password/token/key values, preserving the separator.
        let msg = self.secret.replace_all(&msg, |caps: &regex::Captures<'_>| {
            let matched = &caps[0];
            match matched.find(|c| c == ':' || c == '=' || c == ' ') {
                Some(idx) => format!("{}***", &matched[..=idx]),
                None => "***".to_string(),
            }
        });

        msg.into_owned()
    }
}

impl Default for Redactor {
    fn default() -> Self {
        Self::new()
    }
}

/// Masks sensitive material using the process-wide redactor.
pub fn redact(msg: &str) -> String {
    REDACTOR.get_or_init(Redactor::new).redact(msg)
}

/// An `io::Write` adapter that redacts everything passing through it.
/// Wrap the log sink with this so unredacted bytes never leave the process.
pub struct RedactWriter<W: io::Write> {
    out: W,
}

impl<W: io::Write> RedactWriter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }
}

impl<W: io::Write> io::Write for RedactWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let redacted = redact(&String::from_utf8_lossy(buf));
        self.out.write_all(redacted.as_bytes())?;
        // Report the caller's byte count: the rewrite is invisible upstream.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

/// Installs the global tracing subscriber with redaction applied to stderr.
/// Safe to call more than once; later calls are no-ops.
pub fn init_logging(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(|| RedactWriter::new(io::stderr()));

    let result = if config.log_format == "json" {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if result.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_redacts_account_id_in_arn() {
        let out = redact("Role: arn:aws:iam::111111111111:role/DevRole");
        assert!(out.contains("***"));
        assert!(!out.contains("111111111111"));
        assert!(out.contains("role/DevRole"));
    }

    #[test]
    fn test_redacts_standalone_account_id() {
        let out = redact("Account 123456789012 accessed");
        assert!(out.contains("************"));
        assert!(!out.contains("123456789012"));
    }

    #[test]
    fn test_redacts_secrets_preserving_separator() {
        let out = redact("secret: abc123xyz");
        assert!(out.contains("secret:"));
        assert!(!out.contains("abc123xyz"));

        let out = redact("password=hunter2");
        assert!(out.contains("password="));
        assert!(!out.contains("hunter2"));
    }

    #[test]
    fn test_preserves_normal_text() {
        assert_eq!(redact("Processing role DevRole"), "Processing role DevRole");
    }

    #[test]
    fn test_no_uninterrupted_twelve_digits_survive() {
        let inputs = [
            "plain 999999999999 number",
            "arn:aws:s3:us-east-1:123456789012:bucket/thing",
            "ids 111111111111 and 222222222222",
        ];
        let twelve = Regex::new(r"\d{12}").unwrap();
        for input in inputs {
            assert!(!twelve.is_match(&redact(input)), "leaked digits in {input:?}");
        }
    }

    #[test]
    fn test_redact_writer_reports_original_length() {
        let mut sink = Vec::new();
        {
            let mut w = RedactWriter::new(&mut sink);
            let msg = b"token = tok_12345";
            let n = w.write(msg).unwrap();
            assert_eq!(n, msg.len());
        }
        let written = String::from_utf8(sink).unwrap();
        assert!(!written.contains("tok_12345"));
    }
}
