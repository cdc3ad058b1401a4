//! Output sanitization.
//!
//! Remote CLIs decorate their output with VT100 control sequences, mix line
//! terminators and echo the command back. Everything returned to a caller
//! goes through [`sanitize_output`], which runs (in this order):
//!
//! 1. control-sequence stripping against an extensible catalog,
//! 2. line-terminator normalization to `\n`,
//! 3. command-echo stripping,
//! 4. trailing-prompt stripping.
//!
//! Control codes are stripped first because sequences may straddle the
//! prompt boundary.
//!
//! The catalog only covers sequences observed on real devices; it is not a
//! general terminal emulator. Extend it with [`AnsiStripper::with_code`].

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// What to do with a matched control sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnsiAction {
    /// Delete the sequence.
    Remove,
    /// Replace the sequence with a single newline (`ESC E`, next line).
    Newline,
    /// Replace the sequence with as many newlines as its first numeric
    /// parameter (`ESC [ n L`, insert lines).
    InsertLines,
}

/// One entry in the control-sequence catalog.
#[derive(Debug, Clone, Copy)]
pub struct AnsiCode {
    /// Short name, used in logs and tests.
    pub name: &'static str,
    /// Regex matching the sequence. Must contain exactly one ESC.
    pub pattern: &'static str,
    /// Substitution applied to each match.
    pub action: AnsiAction,
}

const fn remove(name: &'static str, pattern: &'static str) -> AnsiCode {
    AnsiCode {
        name,
        pattern,
        action: AnsiAction::Remove,
    }
}

/// Control sequences stripped by default.
pub const ANSI_CATALOG: &[AnsiCode] = &[
    remove("position_cursor", r"\x1b\[\d+;\d+H"),
    remove("show_cursor", r"\x1b\[\?25h"),
    remove("erase_line", r"\x1b\[2K"),
    remove("enable_scroll", r"\x1b\[\d+;\d+r"),
    remove("erase_line_end", r"\x1b\[K"),
    remove("carriage_return", r"\x1b\[1M"),
    remove("disable_line_wrapping", r"\x1b\[\?7l"),
    remove("reset_mode_screen_options", r"\x1b\[\?\d+l"),
    remove("reset_graphics_mode", r"\x1b\[00m"),
    remove("erase_display", r"\x1b\[2J"),
    remove("erase_display_0", r"\x1b\[J"),
    remove("graphics_mode", r"\x1b\[\d\d;\d\dm"),
    remove("graphics_mode2", r"\x1b\[\d\d;\d\d;\d\dm"),
    remove("graphics_mode3", r"\x1b\[(3|4)\dm"),
    remove("graphics_mode4", r"\x1b\[(9|10)[0-7]m"),
    remove("get_cursor_position", r"\x1b\[6n"),
    remove("cursor_position", r"\x1b\[m"),
    remove("attrs_off", r"\x1b\[0m"),
    remove("reverse", r"\x1b\[7m"),
    remove("cursor_left", r"\x1b\[\d+D"),
    AnsiCode {
        name: "next_line",
        pattern: r"\x1bE",
        action: AnsiAction::Newline,
    },
    AnsiCode {
        name: "insert_line",
        pattern: r"\x1b\[(\d+)L",
        action: AnsiAction::InsertLines,
    },
];

static DEFAULT_STRIPPER: Lazy<AnsiStripper> = Lazy::new(|| {
    // The built-in catalog is covered by tests; a bad entry is a bug.
    AnsiStripper::new(ANSI_CATALOG).unwrap_or_else(|e| panic!("invalid built-in ANSI catalog: {e}"))
});

static LINE_ENDINGS: Lazy<Regex> =
    Lazy::new(|| Regex::new("\r\r\r\n|\r\r\n|\r\n|\n\r").unwrap_or_else(|e| panic!("{e}")));

/// Compiled control-sequence catalog.
#[derive(Debug, Clone)]
pub struct AnsiStripper {
    codes: Vec<(&'static str, Regex, AnsiAction)>,
}

impl AnsiStripper {
    /// Compile a catalog.
    pub fn new(codes: &[AnsiCode]) -> Result<Self, regex::Error> {
        let codes = codes
            .iter()
            .map(|c| Ok((c.name, Regex::new(c.pattern)?, c.action)))
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { codes })
    }

    /// Add a catalog entry.
    pub fn with_code(mut self, code: AnsiCode) -> Result<Self, regex::Error> {
        self.codes
            .push((code.name, Regex::new(code.pattern)?, code.action));
        Ok(self)
    }

    /// Names of the catalog entries, in application order.
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.codes.iter().map(|(name, _, _)| *name)
    }

    /// Strip every cataloged sequence from `input`.
    ///
    /// Passes repeat until nothing changes, so a sequence formed by two
    /// fragments becoming adjacent is also stripped. Each change removes at
    /// least one ESC, which bounds the loop.
    pub fn strip<'a>(&self, input: &'a str) -> Cow<'a, str> {
        if !input.contains('\x1b') {
            return Cow::Borrowed(input);
        }

        let mut output = input.to_string();
        loop {
            let before = output.len();
            let escapes = output.matches('\x1b').count();
            for (_, regex, action) in &self.codes {
                let replaced = match action {
                    AnsiAction::Remove => regex.replace_all(&output, ""),
                    AnsiAction::Newline => regex.replace_all(&output, "\n"),
                    AnsiAction::InsertLines => regex.replace_all(&output, |caps: &Captures<'_>| {
                        let count = caps
                            .get(1)
                            .and_then(|m| m.as_str().parse::<usize>().ok())
                            .unwrap_or(1);
                        "\n".repeat(count)
                    }),
                };
                if let Cow::Owned(replaced) = replaced {
                    output = replaced;
                }
            }
            if output.matches('\x1b').count() == escapes && output.len() == before {
                break;
            }
        }
        Cow::Owned(output)
    }
}

/// Strip the default control-sequence catalog from `input`.
pub fn strip_ansi_escape_codes(input: &str) -> Cow<'_, str> {
    DEFAULT_STRIPPER.strip(input)
}

/// Convert `\r\n`, `\r\r\n`, `\n\r` and stray `\r` to `\n`.
pub fn normalize_linefeeds(input: &str) -> Cow<'_, str> {
    if !input.contains('\r') {
        return Cow::Borrowed(input);
    }
    let output = LINE_ENDINGS.replace_all(input, "\n");
    Cow::Owned(output.replace('\r', "\n"))
}

/// Remove the echoed command from the first line of `output`.
///
/// The first line is dropped when it is the command (possibly preceded by
/// the prompt it was typed at). Backspaces emitted by line-wrapping devices
/// are removed first. Output without the echo is returned unchanged.
pub fn strip_command(command: &str, output: &str) -> String {
    let output = if output.contains('\x08') {
        Cow::Owned(output.replace('\x08', ""))
    } else {
        Cow::Borrowed(output)
    };

    let command = normalize_linefeeds(command);
    let command = command.trim();
    if command.is_empty() {
        return output.into_owned();
    }

    let (first, rest) = match output.find('\n') {
        Some(pos) => (&output[..pos], Some(&output[pos + 1..])),
        None => (output.as_ref(), None),
    };

    if first.trim() == command || first.trim_end().ends_with(command) {
        rest.unwrap_or_default().to_string()
    } else {
        output.into_owned()
    }
}

/// Remove the trailing prompt line from `output` if it contains `base_prompt`.
pub fn strip_prompt(base_prompt: &str, output: &str) -> String {
    if base_prompt.is_empty() {
        return output.to_string();
    }
    match output.rfind('\n') {
        Some(pos) if output[pos + 1..].contains(base_prompt) => output[..pos].to_string(),
        None if output.contains(base_prompt) => String::new(),
        _ => output.to_string(),
    }
}

/// Control-sequence stripping followed by newline normalization.
pub fn sanitize(input: &str) -> String {
    let stripped = strip_ansi_escape_codes(input);
    normalize_linefeeds(&stripped).into_owned()
}

/// Which optional stripping steps to apply in [`sanitize_output`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SanitizeOptions<'a> {
    /// Strip this command's echo from the start.
    pub command: Option<&'a str>,
    /// Strip a trailing prompt line containing this base prompt.
    pub base_prompt: Option<&'a str>,
}

/// Full output pipeline applied to every command result.
pub fn sanitize_output(raw: &str, options: &SanitizeOptions<'_>) -> String {
    let mut output = sanitize(raw);
    if let Some(command) = options.command {
        output = strip_command(command, &output);
    }
    if let Some(prompt) = options.base_prompt {
        output = strip_prompt(prompt, &output);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_compiles() {
        let stripper = AnsiStripper::new(ANSI_CATALOG).unwrap();
        assert_eq!(stripper.names().count(), ANSI_CATALOG.len());
    }

    #[test]
    fn test_each_removed_sequence() {
        let samples = [
            "\x1b[24;27H",
            "\x1b[?25h",
            "\x1b[2K",
            "\x1b[1;24r",
            "\x1b[K",
            "\x1b[1M",
            "\x1b[?7l",
            "\x1b[?6l",
            "\x1b[00m",
            "\x1b[2J",
            "\x1b[J",
            "\x1b[00;32m",
            "\x1b[01;32;40m",
            "\x1b[32m",
            "\x1b[97m",
            "\x1b[6n",
            "\x1b[m",
            "\x1b[0m",
            "\x1b[7m",
            "\x1b[1D",
        ];
        for seq in samples {
            let input = format!("before{seq}after");
            assert_eq!(sanitize(&input), "beforeafter", "sequence {seq:?}");
            assert_eq!(sanitize(&sanitize(&input)), sanitize(&input));
        }
    }

    #[test]
    fn test_next_line_becomes_newline() {
        assert_eq!(sanitize("one\x1bEtwo"), "one\ntwo");
    }

    #[test]
    fn test_insert_line_expands_per_match() {
        assert_eq!(sanitize("a\x1b[2Lb\x1b[1Lc"), "a\n\nb\nc");
    }

    #[test]
    fn test_insert_line_is_idempotent() {
        let once = sanitize("banner\x1b[3Lrouter#");
        assert_eq!(once, "banner\n\n\nrouter#");
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn test_adjacent_fragments_reach_fixpoint() {
        // Removing ESC[K leaves ESC + "[2J", which must also go.
        let input = "x\x1b\x1b[K[2Jy";
        let once = sanitize(input);
        assert_eq!(once, "xy");
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn test_plain_text_only_normalized() {
        let text = "line1\r\nline2\n\rline3\rline4\r\r\nend";
        assert_eq!(sanitize(text), normalize_linefeeds(text));
        assert_eq!(sanitize(text), "line1\nline2\nline3\nline4\nend");
    }

    #[test]
    fn test_unknown_sequence_is_kept() {
        // Not in the catalog: left for an extended stripper.
        assert_eq!(sanitize("\x1b[5;1m"), "\x1b[5;1m");
        let stripper = AnsiStripper::new(ANSI_CATALOG)
            .unwrap()
            .with_code(remove("blink", r"\x1b\[5;1m"))
            .unwrap();
        assert_eq!(stripper.strip("a\x1b[5;1mb"), "ab");
    }

    #[test]
    fn test_strip_command() {
        assert_eq!(
            strip_command("show version", "show version\nIOS 15.2\nrouter#"),
            "IOS 15.2\nrouter#"
        );
        // Echo typed at a prompt still on the line
        assert_eq!(
            strip_command("show clock", "router#show clock\n12:00:00"),
            "12:00:00"
        );
        // Backspace line-wrap artifacts
        assert_eq!(
            strip_command("show run", "show \x08run\nhostname r1"),
            "hostname r1"
        );
        assert_eq!(strip_command("show run", "no echo here"), "no echo here");
    }

    #[test]
    fn test_strip_prompt() {
        assert_eq!(strip_prompt("router", "IOS 15.2\nrouter#"), "IOS 15.2");
        assert_eq!(strip_prompt("router", "IOS 15.2\n"), "IOS 15.2\n");
        assert_eq!(strip_prompt("router", "router#"), "");
        assert_eq!(strip_prompt("", "output\nrouter#"), "output\nrouter#");
    }

    #[test]
    fn test_sanitize_output_pipeline() {
        let raw = "show version\r\nIOS 15.2\r\n\x1b[Krouter#";
        let opts = SanitizeOptions {
            command: Some("show version"),
            base_prompt: Some("router"),
        };
        assert_eq!(sanitize_output(raw, &opts), "IOS 15.2");
    }
}
