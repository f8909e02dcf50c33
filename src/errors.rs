use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// Error taxonomy shared by every component. Transport layers branch on this
/// rather than on the concrete component error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Conflict,
    BackingProcessGone,
    ExternalToolFailure,
    ResourceCreationFailed,
    InvalidInput,
    Storage,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::BackingProcessGone => "backing_process_gone",
            ErrorKind::ExternalToolFailure => "external_tool_failure",
            ErrorKind::ResourceCreationFailed => "resource_creation_failed",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Storage => "storage",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static URL_USERINFO: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?P<scheme>[a-zA-Z][a-zA-Z0-9+.-]*://)[^/@\s]+@").expect("static regex")
});

static TOKEN_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:gh[pousr]_[A-Za-z0-9]{16,}|github_pat_[A-Za-z0-9_]{20,})\b")
        .expect("static regex")
});

/// Masks credentials that external tools like to echo back in their stderr:
/// userinfo embedded in remote URLs and GitHub access tokens.
pub fn sanitize_diagnostic(text: &str) -> String {
    let without_userinfo = URL_USERINFO.replace_all(text.trim(), "${scheme}***@");
    TOKEN_LIKE
        .replace_all(&without_userinfo, "***")
        .into_owned()
}
