//! Agent port resolution.
//!
//! Operators type ports by hand and older frontends mangled a few of them on
//! the way into storage, so every raw port string passes through
//! [`PortPolicy::resolve`] before use: defaulting, range validation, and a
//! configurable correction table for known-bad values.

use std::collections::BTreeMap;

use tracing::warn;

use crate::constants::DEFAULT_AGENT_PORT;

/// Parses a port string without applying any policy: integer in
/// `1..=65535` or nothing.
///
/// ```
/// use volcano_pilot_core::ports::parse_strict;
///
/// assert_eq!(parse_strict("30081"), Some(30081));
/// assert_eq!(parse_strict("3008"), Some(3008));
/// assert_eq!(parse_strict("0"), None);
/// assert_eq!(parse_strict("gpu"), None);
/// ```
pub fn parse_strict(raw: &str) -> Option<u16> {
    let parsed: i64 = raw.trim().parse().ok()?;
    if (1..=65535).contains(&parsed) {
        Some(parsed as u16)
    } else {
        None
    }
}

/// How raw port input is turned into a usable port string.
#[derive(Debug, Clone)]
pub struct PortPolicy {
    default_port: String,
    corrections: BTreeMap<u16, u16>,
}

impl Default for PortPolicy {
    fn default() -> Self {
        let mut corrections = BTreeMap::new();
        corrections.insert(3008, 30082);
        Self {
            default_port: DEFAULT_AGENT_PORT.to_string(),
            corrections,
        }
    }
}

impl PortPolicy {
    pub fn new(default_port: impl Into<String>, corrections: BTreeMap<u16, u16>) -> Self {
        Self {
            default_port: default_port.into(),
            corrections,
        }
    }

    pub fn default_port(&self) -> &str {
        &self.default_port
    }

    /// Resolves raw operator or stored input to a canonical port string.
    ///
    /// Empty input means "use the default". Unparseable or out-of-range
    /// input falls back to the default with a warning rather than an error:
    /// a bad saved port must never lock the operator out of a node. Values
    /// in the correction table are replaced before use.
    ///
    /// ```
    /// use volcano_pilot_core::ports::PortPolicy;
    ///
    /// let policy = PortPolicy::default();
    /// assert_eq!(policy.resolve("8080"), "8080");
    /// assert_eq!(policy.resolve(""), "30081");
    /// assert_eq!(policy.resolve("3008"), "30082");
    /// ```
    pub fn resolve(&self, raw: &str) -> String {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return self.default_port.clone();
        }
        let Some(port) = parse_strict(trimmed) else {
            warn!(port = %trimmed, default = %self.default_port, "invalid port, using default");
            return self.default_port.clone();
        };
        if let Some(&fixed) = self.corrections.get(&port) {
            warn!(from = port, to = fixed, "applying port correction");
            return fixed.to_string();
        }
        port.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_port_passes_through() {
        let policy = PortPolicy::default();
        assert_eq!(policy.resolve("30081"), "30081");
        assert_eq!(policy.resolve("1"), "1");
        assert_eq!(policy.resolve("65535"), "65535");
    }

    #[test]
    fn truncated_port_is_corrected() {
        let policy = PortPolicy::default();
        assert_eq!(policy.resolve("3008"), "30082");
    }

    #[test]
    fn empty_and_whitespace_fall_back_to_default() {
        let policy = PortPolicy::default();
        assert_eq!(policy.resolve(""), "30081");
        assert_eq!(policy.resolve("   "), "30081");
    }

    #[test]
    fn out_of_range_falls_back_to_default() {
        let policy = PortPolicy::default();
        assert_eq!(policy.resolve("0"), "30081");
        assert_eq!(policy.resolve("65536"), "30081");
        assert_eq!(policy.resolve("-1"), "30081");
        assert_eq!(policy.resolve("99999"), "30081");
    }

    #[test]
    fn unparseable_falls_back_to_default() {
        let policy = PortPolicy::default();
        assert_eq!(policy.resolve("gpu-node"), "30081");
        assert_eq!(policy.resolve("30081x"), "30081");
    }

    #[test]
    fn input_is_canonicalized() {
        let policy = PortPolicy::default();
        assert_eq!(policy.resolve(" 8080 "), "8080");
        assert_eq!(policy.resolve("030081"), "30081");
    }

    #[test]
    fn custom_default_and_corrections_apply() {
        let mut corrections = BTreeMap::new();
        corrections.insert(8080, 8081);
        let policy = PortPolicy::new("31000", corrections);
        assert_eq!(policy.resolve(""), "31000");
        assert_eq!(policy.resolve("junk"), "31000");
        assert_eq!(policy.resolve("8080"), "8081");
        // The stock correction table is not implied.
        assert_eq!(policy.resolve("3008"), "3008");
    }

    #[test]
    fn parse_strict_checks_range_only() {
        assert_eq!(parse_strict("3008"), Some(3008));
        assert_eq!(parse_strict("65535"), Some(65535));
        assert_eq!(parse_strict("65536"), None);
        assert_eq!(parse_strict("0"), None);
        assert_eq!(parse_strict(""), None);
        assert_eq!(parse_strict(" 443 "), Some(443));
    }
}
