//! Gmail nodes.
//!
//! Supports `getAll`, `get` and `send`. Sending adds a preparation node that
//! builds the RFC 822 message and base64url-encodes it into `raw`.

use super::chain::{self, HttpCall, PathPart};
use super::{ServiceContext, ServiceKind};
use crate::document::Node;
use crate::error::NodeTransformError;
use serde_json::{Value, json};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";
const DEFAULT_MAX_RESULTS: &str = "100";

const MESSAGE_BUILDER_CODE: &str = r#"return items.map(item => {
  const pick = key => (defaults[key] !== null ? defaults[key] : item.json[key]);
  const headers = [`To: ${pick('sendTo')}`, `Subject: ${pick('subject') || ''}`];
  const cc = pick('ccList');
  if (cc) {
    headers.push(`Cc: ${cc}`);
  }
  headers.push('Content-Type: text/plain; charset="UTF-8"');
  const email = headers.join('\r\n') + '\r\n\r\n' + (pick('message') || '');
  const raw = Buffer.from(email).toString('base64')
    .replace(/\+/g, '-')
    .replace(/\//g, '_')
    .replace(/=+$/, '');
  return { json: { ...item.json, raw } };
});"#;

/// Expands a Gmail node.
///
/// # Errors
///
/// Returns `NodeTransformError::UnsupportedOperation` for any operation other
/// than `getAll`, `get` or `send`.
pub fn transform(node: &Node, ctx: &ServiceContext<'_>) -> Result<Vec<Node>, NodeTransformError> {
    let operation = node.text_parameter("operation").unwrap_or_default();
    let (call, prepare) = match operation.as_str() {
        "getAll" => (list_messages(node), None),
        "get" => (get_message(node), None),
        "send" => (send_message(), Some(message_builder(node))),
        _ => {
            return Err(NodeTransformError::UnsupportedOperation {
                service: ServiceKind::Mail.service_name().to_string(),
                operation,
            });
        }
    };
    Ok(chain::expand(node, ServiceKind::Mail, ctx, &call, prepare))
}

fn list_messages(node: &Node) -> HttpCall {
    let max_results = node
        .text_parameter("maxResults")
        .or_else(|| node.text_parameter("limit"))
        .unwrap_or_else(|| DEFAULT_MAX_RESULTS.to_string());
    let query = node
        .text_parameter("q")
        .or_else(|| node.nested_text_parameter("filters", "q"))
        .unwrap_or_default();
    HttpCall::get(format!("{GMAIL_API_BASE}/messages"))
        .query("maxResults", max_results)
        .query("q", query)
}

fn get_message(node: &Node) -> HttpCall {
    let url = chain::build_url(
        GMAIL_API_BASE,
        &[
            PathPart::Literal("messages".to_string()),
            PathPart::from_parameter(node, "messageId"),
        ],
        "",
    );
    HttpCall::get(url).query("format", "full")
}

fn send_message() -> HttpCall {
    HttpCall::post(format!("{GMAIL_API_BASE}/messages/send"))
        .json_body(json!("={{ JSON.stringify({ raw: $json.raw }) }}"))
}

/// Literal message fields are baked in; absent or expression-valued fields
/// are read from the input item at run time.
fn message_builder(node: &Node) -> Node {
    let literal = |value: Option<String>| match value {
        Some(v) if !v.starts_with('=') => Value::String(v),
        _ => Value::Null,
    };
    let defaults = json!({
        "sendTo": literal(node.text_parameter("sendTo")),
        "subject": literal(node.text_parameter("subject")),
        "message": literal(node.text_parameter("message")),
        "ccList": literal(node.nested_text_parameter("options", "ccList")),
    });
    let code = format!("const defaults = {defaults};\n{MESSAGE_BUILDER_CODE}");
    chain::prepare_node(node, "mime", "Create Email", code)
}
