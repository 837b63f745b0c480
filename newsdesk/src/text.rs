//! Small string helpers shared by the pipeline stages.

/// First `max_chars` characters of `s` (Unicode scalar values, not bytes).
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &s[..byte_idx],
        None => s,
    }
}

/// Longest prefix of `s` that fits in `max_bytes` without splitting a character.
pub fn truncate_bytes(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Shorten text for log fields.
pub fn truncate_for_log(s: &str, max_chars: usize) -> String {
    let head = truncate_chars(s, max_chars);
    if head.len() == s.len() {
        s.to_string()
    } else {
        format!("{}…(+{} bytes)", head, s.len() - head.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_chars_counts_characters() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn truncate_bytes_respects_char_boundaries() {
        // 'é' is two bytes; cutting at 2 would split it
        assert_eq!(truncate_bytes("aé", 2), "a");
        assert_eq!(truncate_bytes("aé", 3), "aé");
    }

    #[test]
    fn log_truncation_reports_dropped_bytes() {
        assert_eq!(truncate_for_log("abcdef", 3), "abc…(+3 bytes)");
        assert_eq!(truncate_for_log("abc", 3), "abc");
    }
}
