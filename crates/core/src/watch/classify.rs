use std::fmt;

/// Coarse cause of an analysis-tool failure, guessed from its output.
///
/// Substring heuristics only: a harmless log line that happens to mention
/// "timeout" will classify as [`NetworkTimeout`](Self::NetworkTimeout).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Auth,
    NetworkRefused,
    NetworkTimeout,
    NotFound,
    Unknown,
}

impl ErrorClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auth => "auth",
            Self::NetworkRefused => "network-refused",
            Self::NetworkTimeout => "network-timeout",
            Self::NotFound => "not-found",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify diagnostic text. Checks run in priority order; first hit wins.
pub fn classify_error(text: &str) -> ErrorClass {
    let lower = text.to_lowercase();
    if lower.contains("401") || lower.contains("unauthorized") || lower.contains("auth") {
        ErrorClass::Auth
    } else if lower.contains("connection refused") {
        ErrorClass::NetworkRefused
    } else if lower.contains("timed out") || lower.contains("timeout") {
        ErrorClass::NetworkTimeout
    } else if lower.contains("not found") {
        ErrorClass::NotFound
    } else {
        ErrorClass::Unknown
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_markers() {
        assert_eq!(
            classify_error("method DESCRIBE failed: 401 Unauthorized"),
            ErrorClass::Auth
        );
        assert_eq!(classify_error("UNAUTHORIZED"), ErrorClass::Auth);
    }

    #[test]
    fn network_markers() {
        assert_eq!(
            classify_error("Connection to tcp://10.0.0.5:554 failed: Connection refused"),
            ErrorClass::NetworkRefused
        );
        assert_eq!(classify_error("Operation timed out"), ErrorClass::NetworkTimeout);
        assert_eq!(classify_error("rw_timeout reached"), ErrorClass::NetworkTimeout);
    }

    #[test]
    fn not_found_and_unknown() {
        assert_eq!(classify_error("404 Stream Not Found"), ErrorClass::NotFound);
        assert_eq!(classify_error("Invalid data found"), ErrorClass::Unknown);
        assert_eq!(classify_error(""), ErrorClass::Unknown);
    }

    #[test]
    fn auth_wins_over_timeout() {
        assert_eq!(classify_error("401 after timeout"), ErrorClass::Auth);
    }

    #[test]
    fn display_tags() {
        assert_eq!(ErrorClass::NetworkRefused.to_string(), "network-refused");
    }
}
