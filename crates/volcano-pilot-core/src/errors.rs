//! Turning gateway failures into status-line text.
//!
//! Every failure ends up on a view's status line; nothing here is fatal.
//! These helpers translate [`GatewayError`] values into short messages an
//! operator can act on, and bucket them for coloring.

use gateway_rs::GatewayError;

/// One-line operator-facing description of a failure.
pub fn user_message(error: &GatewayError) -> String {
    match error {
        GatewayError::Connection(detail) => describe_connection(detail),
        GatewayError::Api(detail) => detail.clone(),
        GatewayError::Decode(detail) => format!("Unexpected gateway response: {detail}"),
        GatewayError::ConfigNotFound(path) => format!("Config file not found: {path}"),
        GatewayError::ConfigInvalid(detail) => format!("Invalid config: {detail}"),
        GatewayError::NoHomeDirectory => "Could not determine home directory".to_string(),
        GatewayError::Io(err) => format!("I/O error: {err}"),
    }
}

/// Connection failures carry reqwest's full chain; pick the part that tells
/// the operator what to check.
fn describe_connection(detail: &str) -> String {
    let lower = detail.to_lowercase();
    if lower.contains("refused") {
        "Connection refused - is the gateway running?".to_string()
    } else if lower.contains("timed out") || lower.contains("timeout") {
        "Request timed out - the gateway or node agent is not answering".to_string()
    } else if lower.contains("dns") || lower.contains("resolve") {
        "Could not resolve the gateway host".to_string()
    } else {
        format!("Connection failed: {detail}")
    }
}

/// Broad failure buckets, used to color status lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The gateway could not be reached at all.
    Network,
    /// Reached it, and it reported a failure.
    Backend,
    /// Local configuration problems.
    Config,
    Timeout,
    Other,
}

impl ErrorCategory {
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Backend => "backend",
            ErrorCategory::Config => "config",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Other => "error",
        }
    }
}

pub fn categorize(error: &GatewayError) -> ErrorCategory {
    match error {
        GatewayError::Connection(detail) => {
            let lower = detail.to_lowercase();
            if lower.contains("timed out") || lower.contains("timeout") {
                ErrorCategory::Timeout
            } else {
                ErrorCategory::Network
            }
        }
        GatewayError::Api(_) => ErrorCategory::Backend,
        GatewayError::Decode(_) => ErrorCategory::Backend,
        GatewayError::ConfigNotFound(_) | GatewayError::ConfigInvalid(_) => ErrorCategory::Config,
        GatewayError::NoHomeDirectory => ErrorCategory::Config,
        GatewayError::Io(_) => ErrorCategory::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refused_connections_point_at_the_gateway() {
        let err = GatewayError::Connection(
            "error sending request: tcp connect error: Connection refused (os error 111)"
                .to_string(),
        );
        assert!(user_message(&err).contains("is the gateway running"));
        assert_eq!(categorize(&err), ErrorCategory::Network);
    }

    #[test]
    fn timeouts_are_their_own_bucket() {
        let err = GatewayError::Connection("operation timed out".to_string());
        assert!(user_message(&err).contains("timed out"));
        assert_eq!(categorize(&err), ErrorCategory::Timeout);
    }

    #[test]
    fn backend_reports_pass_through_verbatim() {
        let err = GatewayError::Api("workspace directory not found".to_string());
        assert_eq!(user_message(&err), "workspace directory not found");
        assert_eq!(categorize(&err), ErrorCategory::Backend);
    }

    #[test]
    fn config_errors_bucket_together() {
        assert_eq!(
            categorize(&GatewayError::ConfigNotFound("/tmp/x".to_string())),
            ErrorCategory::Config
        );
        assert_eq!(
            categorize(&GatewayError::NoHomeDirectory),
            ErrorCategory::Config
        );
    }

    #[test]
    fn labels_are_stable() {
        assert_eq!(ErrorCategory::Network.label(), "network");
        assert_eq!(ErrorCategory::Backend.label(), "backend");
    }
}
