//! Node shapes shared by every service transformer.
//!
//! A service node becomes `[error handler, token, (prepare), operation]`.
//! Only the operation node keeps the original id, name and position; the
//! helpers sit at fixed offsets to its left.

use super::error_handler::ERROR_HANDLER_CODE;
use super::{ServiceContext, ServiceKind};
use crate::document::Node;
use serde_json::{Value, json};

/// Engine type of the generic HTTP request node.
pub const HTTP_REQUEST_NODE_TYPE: &str = "n8n-nodes-base.httpRequest";

/// Engine type of the JavaScript function node.
pub const FUNCTION_NODE_TYPE: &str = "n8n-nodes-base.function";

/// HTTP node version whose parameter names the generated nodes use.
pub const HTTP_REQUEST_TYPE_VERSION: f64 = 4.2;

pub const FUNCTION_TYPE_VERSION: u32 = 1;

/// Per-request timeout of generated HTTP nodes.
pub const REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Tries per generated HTTP call, including the first.
pub const MAX_TRIES: u32 = 3;

/// Fixed wait between tries of a generated HTTP call.
pub const WAIT_BETWEEN_TRIES_MS: u64 = 5_000;

const ERROR_HANDLER_OFFSET: i64 = 300;
const TOKEN_OFFSET: i64 = 200;
const PREPARE_OFFSET: i64 = 100;

/// How a token node obtains an access token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    /// Exchange the run input's refresh token at the OAuth token endpoint.
    OAuthRefresh,
    /// Ask the internal token broker for the run input's user.
    Broker,
}

/// One segment of a generated URL path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathPart {
    Literal(String),
    /// An engine expression body, without the `{{ }}` already applied.
    Expression(String),
}

impl PathPart {
    /// Uses the node parameter `key`, or reads `key` from the run input.
    ///
    /// Parameters that are themselves engine expressions (`=...`) are kept
    /// as expressions.
    #[must_use]
    pub fn from_parameter(node: &Node, key: &str) -> Self {
        match node.text_parameter(key) {
            Some(value) => Self::from_value(value),
            None => Self::Expression(runtime_value(key)),
        }
    }

    /// Uses the node parameter `key`, or `default` when it is absent.
    #[must_use]
    pub fn parameter_or(node: &Node, key: &str, default: &str) -> Self {
        node.text_parameter(key)
            .map_or_else(|| Self::Literal(default.to_string()), Self::from_value)
    }

    fn from_value(value: String) -> Self {
        match value.strip_prefix('=') {
            Some(expression) => Self::Expression(expression.to_string()),
            None => Self::Literal(value),
        }
    }
}

/// `{{ $json["key"] }}`: the value of `key` in the node's input item.
#[must_use]
pub fn runtime_value(key: &str) -> String {
    format!("{{{{ $json[\"{key}\"] }}}}")
}

/// Renders node parameter `key` as a JavaScript expression.
///
/// Literals become JSON literals, `={{ expr }}` parameters become `(expr)`
/// and absent parameters read `key` from the input item.
#[must_use]
pub fn js_value(node: &Node, key: &str) -> String {
    let Some(value) = node.text_parameter(key) else {
        return format!("$json[\"{key}\"]");
    };
    let expression = value
        .strip_prefix("={{")
        .and_then(|rest| rest.strip_suffix("}}"));
    match expression {
        Some(inner) => format!("({})", inner.trim()),
        None => {
            let literal = value.strip_prefix('=').unwrap_or(value.as_str());
            Value::String(literal.to_string()).to_string()
        }
    }
}

/// Wraps a JavaScript object literal into a JSON body expression.
///
/// Nested literals must keep a space between closing braces so the engine
/// does not end the expression early.
#[must_use]
pub fn json_expression(object_literal: &str) -> Value {
    Value::String(format!("={{{{ JSON.stringify({object_literal}) }}}}"))
}

/// Joins `base`, the path parts and `suffix` into a URL.
///
/// Literal segments are percent-encoded. The result is prefixed with `=` (an engine expression) when any part is
/// an expression.
#[must_use]
pub fn build_url(base: &str, parts: &[PathPart], suffix: &str) -> String {
    let mut url = base.to_string();
    let mut dynamic = false;
    for part in parts {
        url.push('/');
        match part {
            PathPart::Literal(segment) => url.push_str(&urlencoding::encode(segment)),
            PathPart::Expression(expression) => {
                url.push_str(expression);
                dynamic = true;
            }
        }
    }
    url.push_str(suffix);
    if dynamic { format!("={url}") } else { url }
}

/// The request an operation node performs.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpCall {
    method: &'static str,
    url: String,
    query: Vec<(String, String)>,
    body: Option<String>,
}

impl HttpCall {
    #[must_use]
    pub fn new(method: &'static str, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    #[must_use]
    pub fn post(url: impl Into<String>) -> Self {
        Self::new("POST", url)
    }

    #[must_use]
    pub fn put(url: impl Into<String>) -> Self {
        Self::new("PUT", url)
    }

    #[must_use]
    pub fn delete(url: impl Into<String>) -> Self {
        Self::new("DELETE", url)
    }

    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Adds `name` to the query when `value` is present.
    #[must_use]
    pub fn query_opt(self, name: &str, value: Option<String>) -> Self {
        match value {
            Some(value) => self.query(name, value),
            None => self,
        }
    }

    /// Sends `body` as JSON. Strings are passed through as engine expressions.
    #[must_use]
    pub fn json_body(mut self, body: Value) -> Self {
        self.body = Some(match body {
            Value::String(expression) => expression,
            other => other.to_string(),
        });
        self
    }

    #[must_use]
    pub fn method(&self) -> &'static str {
        self.method
    }

    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

fn name_value_list(pairs: &[(String, String)]) -> Value {
    let parameters: Vec<Value> = pairs
        .iter()
        .map(|(name, value)| json!({"name": name, "value": value}))
        .collect();
    json!({ "parameters": parameters })
}

/// Name of the token node generated for `original`.
#[must_use]
pub fn token_node_name(original: &Node) -> String {
    format!("{} - Get Access Token", original.name)
}

/// Builds the function node that rewrites upstream failures into
/// `{error, code, retry}`.
#[must_use]
pub fn error_handler_node(original: &Node) -> Node {
    Node::new(
        format!("{}_error_handler", original.id),
        FUNCTION_NODE_TYPE,
        format!("{} - Error Handler", original.name),
        original.position.shifted_left(ERROR_HANDLER_OFFSET),
    )
    .with_parameters(json!({ "functionCode": ERROR_HANDLER_CODE }))
    .with_extra("typeVersion", json!(FUNCTION_TYPE_VERSION))
}

/// Builds the node that fetches an access token for `kind`.
#[must_use]
pub fn token_node(original: &Node, kind: ServiceKind, ctx: &ServiceContext<'_>) -> Node {
    let parameters = match kind.token_source() {
        TokenSource::OAuthRefresh => {
            let body = [
                ("grant_type", "refresh_token".to_string()),
                ("client_id", format!("={}", runtime_value("client_id"))),
                ("client_secret", format!("={}", runtime_value("client_secret"))),
                ("refresh_token", format!("={}", runtime_value("refresh_token"))),
            ]
            .map(|(name, value)| (name.to_string(), value));
            json!({
                "method": "POST",
                "url": ctx.options.oauth_token_url,
                "sendHeaders": true,
                "headerParameters": name_value_list(&[(
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                )]),
                "sendBody": true,
                "contentType": "form-urlencoded",
                "bodyParameters": name_value_list(&body),
                "options": {},
            })
        }
        TokenSource::Broker => {
            let query = [
                ("user_id".to_string(), format!("={}", runtime_value("user_id"))),
                ("service".to_string(), kind.service_name().to_string()),
            ];
            json!({
                "method": "GET",
                "url": ctx.options.token_broker_url,
                "sendQuery": true,
                "queryParameters": name_value_list(&query),
                "options": {},
            })
        }
    };

    Node::new(
        format!("{}_token", original.id),
        HTTP_REQUEST_NODE_TYPE,
        token_node_name(original),
        original.position.shifted_left(TOKEN_OFFSET),
    )
    .with_parameters(parameters)
    .with_extra("typeVersion", json!(HTTP_REQUEST_TYPE_VERSION))
    .with_continue_on_fail()
}

/// Builds a function node that prepares the operation's input.
#[must_use]
pub fn prepare_node(original: &Node, suffix: &str, label: &str, code: String) -> Node {
    Node::new(
        format!("{}_{suffix}", original.id),
        FUNCTION_NODE_TYPE,
        format!("{} - {label}", original.name),
        original.position.shifted_left(PREPARE_OFFSET),
    )
    .with_parameters(json!({ "functionCode": code }))
    .with_extra("typeVersion", json!(FUNCTION_TYPE_VERSION))
}

/// Builds the HTTP node that replaces `original` in place.
#[must_use]
pub fn operation_node(original: &Node, call: &HttpCall) -> Node {
    let authorization = format!(
        "=Bearer {{{{ $node[\"{}\"].json[\"access_token\"] }}}}",
        token_node_name(original)
    );
    let mut headers = vec![("Authorization".to_string(), authorization)];
    if call.body.is_some() {
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
    }

    let mut parameters = json!({
        "method": call.method,
        "url": call.url,
        "authentication": "none",
        "sendHeaders": true,
        "headerParameters": name_value_list(&headers),
        "options": {
            "redirect": {"redirect": {"followRedirects": true}},
            "timeout": REQUEST_TIMEOUT_MS,
        },
    });
    if !call.query.is_empty() {
        parameters["sendQuery"] = json!(true);
        parameters["queryParameters"] = name_value_list(&call.query);
    }
    if let Some(body) = &call.body {
        parameters["sendBody"] = json!(true);
        parameters["specifyBody"] = json!("json");
        parameters["jsonBody"] = json!(body);
    }

    Node::new(
        original.id.clone(),
        HTTP_REQUEST_NODE_TYPE,
        original.name.clone(),
        original.position,
    )
    .with_parameters(parameters)
    .with_extra("typeVersion", json!(HTTP_REQUEST_TYPE_VERSION))
    .with_retry(MAX_TRIES, WAIT_BETWEEN_TRIES_MS)
    .with_continue_on_fail()
}

/// Assembles the full replacement chain for `original`.
#[must_use]
pub fn expand(
    original: &Node,
    kind: ServiceKind,
    ctx: &ServiceContext<'_>,
    call: &HttpCall,
    prepare: Option<Node>,
) -> Vec<Node> {
    let mut nodes = vec![error_handler_node(original), token_node(original, kind, ctx)];
    nodes.extend(prepare);
    nodes.push(operation_node(original, call));
    nodes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Position, WorkflowDocument};
    use crate::transform::TransformOptions;

    fn original() -> Node {
        Node::new("n1", "n8n-nodes-base.googleDrive", "Files", Position::new(600, 200))
    }

    #[test]
    fn helpers_sit_left_of_the_original() {
        let node = original();
        assert_eq!(error_handler_node(&node).position, Position::new(300, 200));
        assert_eq!(
            prepare_node(&node, "prep", "Prepare", String::new()).position,
            Position::new(500, 200)
        );
    }

    #[test]
    fn generated_nodes_pin_their_type_version() {
        let node = original();
        assert_eq!(error_handler_node(&node).extra["typeVersion"], json!(1));
        assert_eq!(
            prepare_node(&node, "prep", "Prepare", String::new()).extra["typeVersion"],
            json!(1)
        );
        let op = operation_node(&node, &HttpCall::post("https://example.test").json_body(json!({})));
        assert_eq!(op.extra["typeVersion"], json!(4.2));
        assert_eq!(op.parameters["specifyBody"], "json");
    }

    #[test]
    fn broker_token_node_queries_by_user() {
        let workflow = WorkflowDocument::default();
        let options = TransformOptions::default();
        let ctx = ServiceContext {
            workflow: &workflow,
            options: &options,
        };
        let token = token_node(&original(), ServiceKind::Drive, &ctx);

        assert_eq!(token.id, "n1_token");
        assert_eq!(token.name, "Files - Get Access Token");
        assert_eq!(token.continue_on_fail, Some(true));
        assert_eq!(token.extra["typeVersion"], json!(HTTP_REQUEST_TYPE_VERSION));
        assert_eq!(token.parameters["method"], "GET");
        assert_eq!(token.parameters["url"], json!(options.token_broker_url));
        assert_eq!(
            token.parameters["queryParameters"]["parameters"][1],
            json!({"name": "service", "value": "drive"})
        );
    }

    #[test]
    fn operation_node_references_token_node() {
        let call = HttpCall::get("https://example.test/items").query("pageSize", "10");
        let node = operation_node(&original(), &call);

        assert_eq!(node.id, "n1");
        assert_eq!(node.node_type, HTTP_REQUEST_NODE_TYPE);
        assert_eq!(node.max_tries, Some(MAX_TRIES));
        assert_eq!(node.wait_between_tries, Some(WAIT_BETWEEN_TRIES_MS));
        assert_eq!(node.extra["typeVersion"], json!(4.2));
        assert_eq!(
            node.parameters["headerParameters"]["parameters"][0]["value"],
            "=Bearer {{ $node[\"Files - Get Access Token\"].json[\"access_token\"] }}"
        );
        assert_eq!(node.parameters["options"]["timeout"], REQUEST_TIMEOUT_MS);
        assert_eq!(node.parameters["sendQuery"], true);
        assert!(node.parameters.get("sendBody").is_none());
    }

    #[test]
    fn urls_become_expressions_when_dynamic() {
        let literal = build_url("https://api.test", &[PathPart::Literal("a".into())], "");
        assert_eq!(literal, "https://api.test/a");

        let reserved = build_url(
            "https://api.test",
            &[PathPart::Literal("My Sheet!A1:B2".into())],
            ":append",
        );
        assert_eq!(reserved, "https://api.test/My%20Sheet%21A1%3AB2:append");

        let node = original();
        let dynamic = build_url(
            "https://api.test",
            &[PathPart::from_parameter(&node, "fileId")],
            ":copy",
        );
        assert_eq!(dynamic, "=https://api.test/{{ $json[\"fileId\"] }}:copy");
    }

    #[test]
    fn js_values_follow_parameter_kind() {
        let node = original().with_parameters(json!({
            "title": "Q3 \"plan\"",
            "values": "={{ $json.rows }}"
        }));
        assert_eq!(js_value(&node, "title"), "\"Q3 \\\"plan\\\"\"");
        assert_eq!(js_value(&node, "values"), "($json.rows)");
        assert_eq!(js_value(&node, "name"), "$json[\"name\"]");
        assert_eq!(
            json_expression("{ a: 1 }"),
            json!("={{ JSON.stringify({ a: 1 }) }}")
        );
    }

    #[test]
    fn expression_parameters_stay_expressions() {
        let node = original().with_parameters(json!({"fileId": "={{ $json.id }}"}));
        assert_eq!(
            PathPart::from_parameter(&node, "fileId"),
            PathPart::Expression("{{ $json.id }}".to_string())
        );
    }
}
