use thiserror::Error;

/// Core error types for lhfw
#[derive(Debug, Error)]
pub enum Error {
    /// Missing or malformed credential, instance id or cached config
    #[error("Configuration error: {0}")]
    Config(String),

    /// The Lighthouse API rejected a request
    #[error("{code}: {message} (request id: {request_id})")]
    Remote {
        code: String,
        message: String,
        request_id: String,
    },

    /// Transport failure talking to the Lighthouse API
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External editor could not be run to completion
    #[error("Editor error: {0}")]
    Editor(#[from] crate::editor::EditorError),
}

impl Error {
    /// True for failures that originate at the remote authority (API or transport).
    pub fn is_remote(&self) -> bool {
        matches!(self, Error::Remote { .. } | Error::Http(_))
    }
}

/// Represents a translated error with helpful context
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
    pub help_url: Option<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
            help_url: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_help(mut self, url: impl Into<String>) -> Self {
        self.help_url = Some(url.into());
        self
    }
}

/// Known Lighthouse error codes and what an operator can do about them
pub struct RemoteErrorPattern;

impl RemoteErrorPattern {
    /// Matches a Lighthouse error code against known patterns.
    ///
    /// The original message is always kept as the `user_message` so nothing
    /// the API said is lost; only the suggestions differ per code.
    pub fn match_error(code: &str, message: &str) -> ErrorTranslation {
        let verbatim = format!("{code}: {message}");

        if code.starts_with("AuthFailure.SignatureExpire") {
            return ErrorTranslation::new(verbatim)
                .with_suggestion("The request timestamp is too far from server time")
                .with_suggestion("Synchronize the local clock (e.g. timedatectl set-ntp true)");
        }

        if code.starts_with("AuthFailure.SecretIdNotFound")
            || code.starts_with("AuthFailure.SignatureFailure")
            || code.starts_with("AuthFailure.InvalidSecretId")
        {
            return ErrorTranslation::new(verbatim)
                .with_suggestion("Check LIGHTHOUSE_SECRET=secretId:secretKey[:instanceId]")
                .with_suggestion("Remove the cached lighthouse.json if it holds stale keys")
                .with_help("https://console.cloud.tencent.com/cam/capi");
        }

        if code.starts_with("AuthFailure") || code.starts_with("UnauthorizedOperation") {
            return ErrorTranslation::new(verbatim)
                .with_suggestion("The key pair is valid but lacks Lighthouse permissions")
                .with_suggestion("Grant QcloudLighthouseFullAccess to the sub-account");
        }

        if code.contains("InstanceIdNotFound") || code.contains("InstanceNotFound") {
            return ErrorTranslation::new(verbatim)
                .with_suggestion("Pass the instance id explicitly with --instance-id")
                .with_suggestion("Check that the configured region matches the instance region");
        }

        if code.contains("FirewallRulesExist") || code.contains("Duplicate") {
            return ErrorTranslation::new(verbatim)
                .with_suggestion("The edited file contains the same rule twice")
                .with_suggestion("Look for repeated protocols inside one rule's protocol list");
        }

        if code.starts_with("LimitExceeded") {
            return ErrorTranslation::new(verbatim)
                .with_suggestion("Too many rules after expansion; each protocol counts as a rule")
                .with_suggestion("Combine port ranges or remove unused rules");
        }

        if code.starts_with("InvalidParameter") || code.starts_with("MissingParameter") {
            return ErrorTranslation::new(verbatim)
                .with_suggestion("Check port syntax: ALL, 22, 80,443 or 3000-4000")
                .with_suggestion("Check cidrBlock syntax: 0.0.0.0/0 or 10.0.0.1")
                .with_suggestion("Action must be ACCEPT or DROP");
        }

        ErrorTranslation::new(verbatim)
            .with_suggestion("The edited file was kept; fix it and re-run with -f <file>")
            .with_help("https://cloud.tencent.com/document/product/1207/47578")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
