//! Structured-data hook.
//!
//! Sanitized output can be passed through any number of [`OutputParser`]s.
//! A [`ParserChain`] tries them in order and never fails: when no parser
//! produces data the caller keeps the text.
//!
//! With the `textfsm` feature, [`TextFsmParser`] parses output with TextFSM
//! templates, looked up by platform and command or given per call.

use std::path::Path;
use std::sync::Arc;

use log::debug;
use serde_json::Value;
use thiserror::Error;

/// What a parser is given.
#[derive(Debug, Clone, Copy)]
pub struct ParseInput<'a> {
    /// Sanitized command output.
    pub text: &'a str,
    /// Profile name of the device.
    pub platform: Option<&'a str>,
    /// Command that produced the output.
    pub command: Option<&'a str>,
    /// Template chosen by the caller.
    pub template: Option<&'a Path>,
}

impl<'a> ParseInput<'a> {
    /// Input carrying only text.
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            platform: None,
            command: None,
            template: None,
        }
    }

    /// Set the platform.
    pub fn platform(mut self, platform: &'a str) -> Self {
        self.platform = Some(platform);
        self
    }

    /// Set the command.
    pub fn command(mut self, command: &'a str) -> Self {
        self.command = Some(command);
        self
    }

    /// Set the template path.
    pub fn template(mut self, template: &'a Path) -> Self {
        self.template = Some(template);
        self
    }
}

/// Parser failure. Never escapes a [`ParserChain`].
#[derive(Error, Debug)]
pub enum ParseError {
    /// No template for this platform/command
    #[error("No template for platform {platform:?}, command {command:?}")]
    NoTemplate {
        platform: Option<String>,
        command: Option<String>,
    },

    /// Template could not be compiled or run
    #[error("Template error: {0}")]
    Template(String),

    /// Template file could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Parsed data could not be represented as JSON
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A text-to-structured-data backend.
pub trait OutputParser: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Parse `input`, or fail.
    fn parse(&self, input: &ParseInput<'_>) -> Result<Value, ParseError>;
}

/// Either parsed data or the original text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Output<'a> {
    /// No parser produced data.
    Text(&'a str),
    /// Data from the first parser that produced any.
    Structured(&'a Value),
}

/// Ordered list of parsers.
#[derive(Clone, Default)]
pub struct ParserChain {
    parsers: Vec<Arc<dyn OutputParser>>,
}

impl ParserChain {
    /// Empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a parser.
    pub fn push(&mut self, parser: Arc<dyn OutputParser>) {
        self.parsers.push(parser);
    }

    /// Whether no parsers are registered.
    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }

    /// Registered parser names, in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parsers.iter().map(|p| p.name())
    }

    /// First non-empty result, or `None` to keep the text.
    ///
    /// Parser errors and empty results are logged and skipped.
    pub fn apply(&self, input: &ParseInput<'_>) -> Option<Value> {
        for parser in &self.parsers {
            match parser.parse(input) {
                Ok(value) if !is_empty(&value) => return Some(value),
                Ok(_) => debug!("parser {} produced no data", parser.name()),
                Err(e) => debug!("parser {} failed: {}", parser.name(), e),
            }
        }
        None
    }
}

impl std::fmt::Debug for ParserChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

#[cfg(feature = "textfsm")]
pub use self::textfsm::TextFsmParser;

#[cfg(feature = "textfsm")]
mod textfsm {
    use std::collections::HashMap;

    use indexmap::IndexMap;
    use serde_json::Value;
    use textfsm_rust::Template;

    use super::{OutputParser, ParseError, ParseInput};

    /// TextFSM backend.
    ///
    /// Templates are registered in memory under a platform and command, or
    /// passed per call as a file path. Header names are lowercased in the
    /// resulting records.
    #[derive(Debug, Default)]
    pub struct TextFsmParser {
        templates: IndexMap<(String, String), String>,
    }

    impl TextFsmParser {
        /// Parser with no templates.
        pub fn new() -> Self {
            Self::default()
        }

        /// Register `template` source for `command` on `platform`.
        pub fn with_template(
            mut self,
            platform: impl Into<String>,
            command: impl Into<String>,
            template: impl Into<String>,
        ) -> Self {
            self.templates
                .insert((platform.into(), command.into()), template.into());
            self
        }

        fn lookup(&self, input: &ParseInput<'_>) -> Option<&str> {
            let platform = input.platform?;
            let command = input.command?.trim();
            self.templates
                .get(&(platform.to_string(), command.to_string()))
                .map(String::as_str)
        }

        fn run(source: &str, text: &str) -> Result<Value, ParseError> {
            let template =
                Template::parse_str(source).map_err(|e| ParseError::Template(e.to_string()))?;
            let mut parser = template.parser();
            let records = parser
                .parse_text_to_dicts(text)
                .map_err(|e| ParseError::Template(e.to_string()))?;

            let records: Vec<HashMap<String, String>> = records
                .into_iter()
                .map(|record| {
                    record
                        .into_iter()
                        .map(|(key, value)| (key.to_lowercase(), value))
                        .collect()
                })
                .collect();
            Ok(serde_json::to_value(records)?)
        }
    }

    impl OutputParser for TextFsmParser {
        fn name(&self) -> &str {
            "textfsm"
        }

        fn parse(&self, input: &ParseInput<'_>) -> Result<Value, ParseError> {
            if let Some(path) = input.template {
                let source = std::fs::read_to_string(path)?;
                return Self::run(&source, input.text);
            }
            let source = self.lookup(input).ok_or_else(|| ParseError::NoTemplate {
                platform: input.platform.map(str::to_string),
                command: input.command.map(str::to_string),
            })?;
            Self::run(source, input.text)
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        const VERSION_TEMPLATE: &str = "\
Value VERSION (\\S+)

Start
  ^IOS ${VERSION} -> Record
";

        #[test]
        fn test_parse_registered_template() {
            let parser =
                TextFsmParser::new().with_template("cisco_ios", "show version", VERSION_TEMPLATE);
            let input = ParseInput::new("IOS 15.2\n")
                .platform("cisco_ios")
                .command("show version");
            let value = parser.parse(&input).unwrap();
            assert_eq!(value[0]["version"], "15.2");
        }

        #[test]
        fn test_missing_template() {
            let parser = TextFsmParser::new();
            let input = ParseInput::new("IOS 15.2").platform("linux").command("uname");
            assert!(matches!(
                parser.parse(&input),
                Err(ParseError::NoTemplate { .. })
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(Result<Value, &'static str>);

    impl OutputParser for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn parse(&self, _input: &ParseInput<'_>) -> Result<Value, ParseError> {
            self.0
                .clone()
                .map_err(|message| ParseError::Template(message.to_string()))
        }
    }

    #[test]
    fn test_empty_chain_keeps_text() {
        let chain = ParserChain::new();
        assert!(chain.apply(&ParseInput::new("IOS 15.2")).is_none());
    }

    #[test]
    fn test_failures_are_swallowed() {
        let mut chain = ParserChain::new();
        chain.push(Arc::new(Fixed(Err("boom"))));
        chain.push(Arc::new(Fixed(Ok(json!([])))));
        assert!(chain.apply(&ParseInput::new("text")).is_none());
    }

    #[test]
    fn test_first_non_empty_wins() {
        let mut chain = ParserChain::new();
        chain.push(Arc::new(Fixed(Err("boom"))));
        chain.push(Arc::new(Fixed(Ok(json!({"hostname": "router"})))));
        chain.push(Arc::new(Fixed(Ok(json!({"hostname": "other"})))));
        let value = chain.apply(&ParseInput::new("text")).unwrap();
        assert_eq!(value["hostname"], "router");
        assert_eq!(chain.names().count(), 3);
    }
}
