//! Parsing of `altool` free-text output.
//!
//! The notarization front-end prints human-readable text, not structured
//! data, so fields are scraped with regular expressions. Patterns must stay
//! byte-compatible with the tool's output.

use super::Ticket;
use crate::error::{NotarizeError, Result};
use regex::Regex;
use std::sync::LazyLock;

static TICKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"RequestUUID = ([0-9a-z\-]+)").expect("valid ticket regex"));

// Printed instead of RequestUUID when the payload was already uploaded
static UPLOAD_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"The upload ID is ([0-9a-z\-]+)").expect("valid upload id regex")
});

static STATUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Status: ([\w ]+)").expect("valid status regex"));

static LOG_URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"LogFileURL: (.*)").expect("valid log url regex"));

/// State reported by a status query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotarizationStatus {
    InProgress,
    Success,
    Invalid,
}

impl NotarizationStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::InProgress)
    }
}

/// Ticket from a submission response, preferring `RequestUUID`
pub fn parse_ticket(text: &str) -> Result<Ticket> {
    TICKET_RE
        .captures(text)
        .or_else(|| UPLOAD_ID_RE.captures(text))
        .map(|caps| Ticket::new(&caps[1]))
        .ok_or(NotarizeError::TicketNotFound)
}

/// Status from a status query response
pub fn parse_status(text: &str) -> Result<NotarizationStatus> {
    let caps = STATUS_RE
        .captures(text)
        .ok_or(NotarizeError::UnexpectedFormat)?;
    match &caps[1] {
        "success" => Ok(NotarizationStatus::Success),
        "in progress" => Ok(NotarizationStatus::InProgress),
        "invalid" => Ok(NotarizationStatus::Invalid),
        other => Err(NotarizeError::UnknownStatus(other.to_string())),
    }
}

/// Failure log location from a status query response
pub fn parse_log_url(text: &str) -> Option<&str> {
    LOG_URL_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|url| !url.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUBMIT_OK: &str = "2019-10-01 12:00:00.000 altool[123:456] No errors uploading 'MyApp.zip'.\n\
                             RequestUUID = 11111111-2222-3333-4444-555555555555\n";

    const RESUBMIT: &str = "*** Error: ERROR ITMS-90732: \"The software asset has already been \
                            uploaded. The upload ID is 6a1c7e2b-0d3f-4c1a-9e55-0123456789ab\" at SoftwareAssets/EnigmaSoftwareAsset\n";

    #[test]
    fn test_primary_ticket() {
        assert_eq!(
            parse_ticket(SUBMIT_OK).unwrap().as_str(),
            "11111111-2222-3333-4444-555555555555"
        );
        assert_eq!(parse_ticket("RequestUUID = abc-123").unwrap().as_str(), "abc-123");
    }

    #[test]
    fn test_alternate_ticket() {
        assert_eq!(
            parse_ticket(RESUBMIT).unwrap().as_str(),
            "6a1c7e2b-0d3f-4c1a-9e55-0123456789ab"
        );
        assert_eq!(
            parse_ticket("The upload ID is def-456").unwrap().as_str(),
            "def-456"
        );
    }

    #[test]
    fn test_primary_preferred_over_alternate() {
        let text = "The upload ID is aaa-1\nRequestUUID = bbb-2\n";
        assert_eq!(parse_ticket(text).unwrap().as_str(), "bbb-2");
    }

    #[test]
    fn test_ticket_stops_at_uppercase() {
        assert_eq!(parse_ticket("RequestUUID = abc-DEF").unwrap().as_str(), "abc-");
    }

    #[test]
    fn test_no_ticket() {
        assert!(matches!(
            parse_ticket("Error: unable to authenticate").unwrap_err(),
            NotarizeError::TicketNotFound
        ));
    }

    #[test]
    fn test_status_values() {
        assert_eq!(
            parse_status("   Status: success\n").unwrap(),
            NotarizationStatus::Success
        );
        assert_eq!(
            parse_status("RequestUUID: x\n   Status: in progress\n").unwrap(),
            NotarizationStatus::InProgress
        );
        assert_eq!(
            parse_status("Status: invalid\nLogFileURL: https://example.com/log").unwrap(),
            NotarizationStatus::Invalid
        );
        assert!(NotarizationStatus::Success.is_terminal());
        assert!(!NotarizationStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_unknown_status() {
        match parse_status("Status: bogus").unwrap_err() {
            NotarizeError::UnknownStatus(value) => assert_eq!(value, "bogus"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_status_code_line_is_not_a_status() {
        assert!(matches!(
            parse_status("Status Code: 2\nStatus Message: Package Invalid").unwrap_err(),
            NotarizeError::UnexpectedFormat
        ));
    }

    #[test]
    fn test_log_url() {
        let text = "   Status: invalid\n  LogFileURL: https://osxapps.example.com/log.json\r\n";
        assert_eq!(
            parse_log_url(text),
            Some("https://osxapps.example.com/log.json")
        );
        assert_eq!(parse_log_url("Status: invalid\nLogFileURL: (null)"), Some("(null)"));
        assert_eq!(parse_log_url("Status: invalid\n"), None);
    }
}
