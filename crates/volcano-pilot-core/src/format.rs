//! Display formatting helpers.

const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];

/// Human-readable byte count.
///
/// ```
/// use volcano_pilot_core::format::format_bytes;
///
/// assert_eq!(format_bytes(512), "512 B");
/// assert_eq!(format_bytes(2048), "2.0 KB");
/// assert_eq!(format_bytes(5_242_880), "5.0 MB");
/// ```
pub fn format_bytes(bytes: u64) -> String {
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

/// Utilization percentage with one decimal, as the gauges label themselves.
pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}

/// Maps a 0-100 percentage onto the 0-1 ratio gauge widgets want,
/// swallowing out-of-range agent readings.
pub fn percent_ratio(value: f64) -> f64 {
    (value / 100.0).clamp(0.0, 1.0)
}

/// Shortens long paths from the middle so both the root and the leaf stay
/// visible.
///
/// ```
/// use volcano_pilot_core::format::truncate_middle;
///
/// assert_eq!(truncate_middle("workspace/run1/output.log", 15), "workspa…put.log");
/// assert_eq!(truncate_middle("short", 15), "short");
/// ```
pub fn truncate_middle(text: &str, max_chars: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= max_chars {
        return text.to_string();
    }
    if max_chars <= 1 {
        return "…".to_string();
    }
    let keep = max_chars - 1;
    let head = keep.div_ceil(2);
    let tail = keep / 2;
    let mut out: String = chars[..head].iter().collect();
    out.push('…');
    out.extend(&chars[chars.len() - tail..]);
    out
}

/// Counted noun for status lines.
pub fn pluralize(count: usize, singular: &str, plural: &str) -> String {
    if count == 1 {
        format!("{count} {singular}")
    } else {
        format!("{count} {plural}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_step_through_units() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1024), "1.0 KB");
        assert_eq!(format_bytes(1536), "1.5 KB");
        assert_eq!(format_bytes(1_073_741_824), "1.0 GB");
    }

    #[test]
    fn percent_formats_one_decimal() {
        assert_eq!(format_percent(12.5), "12.5%");
        assert_eq!(format_percent(0.0), "0.0%");
        assert_eq!(format_percent(33.333), "33.3%");
    }

    #[test]
    fn ratio_clamps_agent_noise() {
        assert_eq!(percent_ratio(50.0), 0.5);
        assert_eq!(percent_ratio(-3.0), 0.0);
        assert_eq!(percent_ratio(150.0), 1.0);
    }

    #[test]
    fn truncation_keeps_head_and_tail() {
        assert_eq!(truncate_middle("abcdefghij", 5), "ab…ij");
        assert_eq!(truncate_middle("abcdefghij", 10), "abcdefghij");
        assert_eq!(truncate_middle("abcdefghij", 1), "…");
    }

    #[test]
    fn truncation_is_char_aware() {
        let path = "журнал/обучение/вывод.log";
        let short = truncate_middle(path, 10);
        assert_eq!(short.chars().count(), 10);
    }

    #[test]
    fn pluralize_picks_the_form() {
        assert_eq!(pluralize(1, "file", "files"), "1 file");
        assert_eq!(pluralize(0, "file", "files"), "0 files");
        assert_eq!(pluralize(42, "file", "files"), "42 files");
    }
}
