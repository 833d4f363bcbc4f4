//! TwiML call-control document served to the telephony platform.

use crate::call::{MEDIA_STREAM_PATH, StreamParameters};
use std::fmt::Write;

/// Escapes a value for use inside a double-quoted XML attribute.
///
/// Line breaks and tabs become character references, otherwise attribute-value
/// normalization turns them into spaces.
fn escape_attr(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            '\n' => escaped.push_str("&#10;"),
            '\r' => escaped.push_str("&#13;"),
            '\t' => escaped.push_str("&#9;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Builds the document that connects the call to a bidirectional media stream at
/// `wss://{host}/outbound-media-stream`, attaching the stream parameters.
///
/// Values are not validated; empty values are rendered as empty attributes.
pub fn build_control_document(params: &StreamParameters, host: &str) -> String {
    let mut document = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    document.push_str("<Response>\n  <Connect>\n");
    let _ = writeln!(
        document,
        "    <Stream url=\"{}\">",
        escape_attr(&format!("wss://{host}{MEDIA_STREAM_PATH}"))
    );
    for (name, value) in params.pairs() {
        let _ = writeln!(
            document,
            "      <Parameter name=\"{name}\" value=\"{}\" />",
            escape_attr(value)
        );
    }
    document.push_str("    </Stream>\n  </Connect>\n</Response>\n");
    document
}
