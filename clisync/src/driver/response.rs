//! Response type for command execution results.

use std::time::Duration;

use serde_json::Value;

use crate::parse::Output;

/// Response from a command execution.
#[derive(Debug, Clone)]
pub struct Response {
    /// The command that was executed.
    pub command: String,

    /// The sanitized output (command echo and trailing prompt removed as
    /// requested).
    pub result: String,

    /// The raw output before sanitization.
    pub raw_result: String,

    /// The prompt that ended the output, if one was seen.
    pub prompt: String,

    /// Time taken to execute the command.
    pub elapsed: Duration,

    /// Failure marker found in the output, if any.
    pub failure_message: Option<String>,

    /// Parsed output, when parsing was requested and succeeded.
    pub structured: Option<Value>,
}

impl Response {
    /// Create a new successful response.
    pub fn new(
        command: impl Into<String>,
        result: impl Into<String>,
        raw_result: impl Into<String>,
        prompt: impl Into<String>,
        elapsed: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            result: result.into(),
            raw_result: raw_result.into(),
            prompt: prompt.into(),
            elapsed,
            failure_message: None,
            structured: None,
        }
    }

    /// Mark the response failed.
    pub fn with_failure(mut self, failure_message: Option<impl Into<String>>) -> Self {
        self.failure_message = failure_message.map(Into::into);
        self
    }

    /// Attach parsed output.
    pub fn with_structured(mut self, structured: Option<Value>) -> Self {
        self.structured = structured;
        self
    }

    /// Check if the response indicates success.
    pub fn is_success(&self) -> bool {
        self.failure_message.is_none()
    }

    /// Structured data if parsing produced any, otherwise the text.
    pub fn output(&self) -> Output<'_> {
        match &self.structured {
            Some(value) => Output::Structured(value),
            None => Output::Text(&self.result),
        }
    }

    /// Get the result lines as an iterator.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.result.lines()
    }

    /// Check if the result contains a substring.
    pub fn contains(&self, pattern: &str) -> bool {
        self.result.contains(pattern)
    }
}

impl std::fmt::Display for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response() -> Response {
        Response::new(
            "show version",
            "IOS 15.2",
            "show version\r\nIOS 15.2\r\nrouter#",
            "router#",
            Duration::from_millis(5),
        )
    }

    #[test]
    fn test_output_falls_back_to_text() {
        let response = response();
        assert!(matches!(response.output(), Output::Text("IOS 15.2")));
    }

    #[test]
    fn test_output_prefers_structured() {
        let response = response().with_structured(Some(json!([{"version": "15.2"}])));
        match response.output() {
            Output::Structured(value) => assert_eq!(value[0]["version"], "15.2"),
            Output::Text(_) => panic!("expected structured output"),
        }
    }

    #[test]
    fn test_failure() {
        let response = response().with_failure(Some("% Invalid input"));
        assert!(!response.is_success());
        let response = response.with_failure(None::<String>);
        assert!(response.is_success());
    }
}
