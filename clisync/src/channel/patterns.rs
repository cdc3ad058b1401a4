//! Pattern construction for prompt and echo detection.

use regex::bytes::Regex;

/// Pattern that matches when the detected prompt reappears at the end of the
/// buffer.
///
/// The base prompt is escaped literally, may be followed by a mode suffix on
/// the same line (e.g. `(config-if)`), and must end in one of the profile's
/// terminators.
pub fn base_prompt_pattern(base_prompt: &str, terminators: &[char]) -> Result<Regex, regex::Error> {
    let terminators = terminators
        .iter()
        .map(|t| regex::escape(&t.to_string()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(
        "{}[^\\n]*(?:{})\\s*$",
        regex::escape(base_prompt),
        terminators
    ))
}

/// Pattern matching the device's echo of `command`.
pub fn echo_pattern(command: &str) -> Result<Regex, regex::Error> {
    Regex::new(&regex::escape(command.trim()))
}

/// Pattern matching either of two patterns.
pub fn either(first: &str, second: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("(?:{})|(?:{})", first, second))
}

/// Pattern matching any of the given terminator characters at the end of the
/// buffer, i.e. some prompt is showing.
pub fn terminator_at_end(terminators: &[char]) -> Result<Regex, regex::Error> {
    let class = terminators
        .iter()
        .map(|t| regex::escape(&t.to_string()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!("(?:{})\\s*$", class))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_prompt_pattern() {
        let pattern = base_prompt_pattern("core-sw1.lab", &['#', '>']).unwrap();
        assert!(pattern.is_match(b"output\r\ncore-sw1.lab#"));
        assert!(pattern.is_match(b"core-sw1.lab> "));
        assert!(pattern.is_match(b"core-sw1.lab(config-if)#"));
        // Escaped: '.' is literal
        assert!(!pattern.is_match(b"core-sw1xlab#"));
        // Prompt must be at the end of the buffer
        assert!(!pattern.is_match(b"core-sw1.lab#show version\r\nIOS"));
    }

    #[test]
    fn test_bracket_terminators() {
        let pattern = base_prompt_pattern("HPE", &['>', ']']).unwrap();
        assert!(pattern.is_match(b"<HPE>"));
        assert!(pattern.is_match(b"[HPE]"));
        assert!(pattern.is_match(b"[HPE-GigabitEthernet1/0/1]"));
    }

    #[test]
    fn test_echo_pattern_is_literal() {
        let pattern = echo_pattern("show run | i (ip|ipv6)\n").unwrap();
        assert!(pattern.is_match(b"router#show run | i (ip|ipv6)\r\n"));
        assert!(!pattern.is_match(b"show run | i ip"));
    }

    #[test]
    fn test_terminator_at_end() {
        let pattern = terminator_at_end(&['#', '>']).unwrap();
        assert!(pattern.is_match(b"\r\nrouter# "));
        assert!(pattern.is_match(b"router>"));
        assert!(!pattern.is_match(b"a#b\r\nmore"));
    }

    #[test]
    fn test_either() {
        let pattern = either(r"[Pp]assword:", r"#\s*$").unwrap();
        assert!(pattern.is_match(b"Password:"));
        assert!(pattern.is_match(b"router#"));
        assert!(!pattern.is_match(b"router>"));
    }
}
