// Tests for response and error output formatting

use super::*;
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn writer(format: OutputFormat, redact: bool) -> (OutputWriter, SharedBuffer) {
    let buffer = SharedBuffer::default();
    let output = OutputWriter::with_writer(format, false, false, redact, Box::new(buffer.clone()));
    (output, buffer)
}

fn session_response() -> ApiResponse<Value> {
    ApiResponse {
        data: json!({"user": {"id": "u_1"}, "accessToken": "eyJhbGciOi.payload.sig"}),
        status: 200,
        rate_limit: Some(RateLimitInfo {
            limit: Some(100),
            remaining: Some(42),
            ..Default::default()
        }),
    }
}

#[test]
fn test_human_response_with_status() {
    let (mut output, buffer) = writer(OutputFormat::Human, true);

    output.response(&session_response(), true).unwrap();

    let text = buffer.contents();
    assert!(text.starts_with("HTTP 200\nRate limit: 42/100 remaining\n"));
    assert!(text.contains(r#""accessToken": "***""#));
    assert!(!text.contains("payload.sig"));
}

#[test]
fn test_json_response_body_only() {
    let (mut output, buffer) = writer(OutputFormat::Json, false);

    output.response(&session_response(), false).unwrap();

    let printed: Value = serde_json::from_str(buffer.contents().trim()).unwrap();
    assert_eq!(printed, session_response().data);
}

#[test]
fn test_json_response_with_status() {
    let (mut output, buffer) = writer(OutputFormat::JsonPretty, true);

    output.response(&session_response(), true).unwrap();

    let printed: Value = serde_json::from_str(&buffer.contents()).unwrap();
    assert_eq!(printed["status"], 200);
    assert_eq!(printed["rate_limit"]["remaining"], 42);
    assert_eq!(printed["data"]["accessToken"], "***");
}

#[test]
fn test_empty_body_prints_nothing() {
    let (mut output, buffer) = writer(OutputFormat::Human, true);
    let response = ApiResponse {
        data: Value::Null,
        status: 204,
        rate_limit: None,
    };

    output.response(&response, false).unwrap();

    assert!(buffer.contents().is_empty());
}

#[test]
fn test_api_error_in_machine_formats() {
    let error = ApiError::new(
        409,
        "CONFLICT_ERROR",
        "Trip name already used",
        Some(json!({"code": "CONFLICT_ERROR", "details": {"field": "name"}})),
    );

    let (mut human, human_buffer) = writer(OutputFormat::Human, true);
    human.api_error(&error).unwrap();
    assert!(human_buffer.contents().is_empty());

    let (mut json_output, json_buffer) = writer(OutputFormat::Json, true);
    json_output.api_error(&error).unwrap();
    let printed: Value = serde_json::from_str(json_buffer.contents().trim()).unwrap();
    assert_eq!(printed["error"]["status"], 409);
    assert_eq!(printed["error"]["code"], "CONFLICT_ERROR");
    assert_eq!(printed["error"]["data"]["details"]["field"], "name");
}

#[test]
fn test_messages_respect_format_and_quiet() {
    let (mut output, buffer) = writer(OutputFormat::Human, true);
    output.info("Sending request").unwrap();
    output.warning("No token").unwrap();
    assert_eq!(buffer.contents(), "INFO: Sending request\nWARNING: No token\n");

    let buffer = SharedBuffer::default();
    let mut quiet = OutputWriter::with_writer(OutputFormat::Human, false, true, true, Box::new(buffer.clone()));
    quiet.info("hidden").unwrap();
    quiet.success("hidden").unwrap();
    assert!(buffer.contents().is_empty());

    let (mut json_output, json_buffer) = writer(OutputFormat::Json, true);
    json_output.info("hidden").unwrap();
    assert!(json_buffer.contents().is_empty());
}
