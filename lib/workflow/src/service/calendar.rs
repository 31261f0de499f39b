//! Google Calendar nodes.

use super::chain::{self, HttpCall, PathPart, js_value, json_expression};
use super::{ServiceContext, ServiceKind};
use crate::document::Node;
use crate::error::NodeTransformError;

const CALENDAR_API_BASE: &str = "https://www.googleapis.com/calendar/v3/calendars";
const DEFAULT_CALENDAR: &str = "primary";
const DEFAULT_MAX_RESULTS: &str = "100";

/// Expands a Google Calendar node.
///
/// # Errors
///
/// Returns `NodeTransformError::UnsupportedOperation` for operations other
/// than `getAll`, `get`, `create` (or `createEvent`) and `delete`.
pub fn transform(node: &Node, ctx: &ServiceContext<'_>) -> Result<Vec<Node>, NodeTransformError> {
    let operation = node.text_parameter("operation").unwrap_or_default();
    let calendar = PathPart::parameter_or(node, "calendar", DEFAULT_CALENDAR);
    let events = PathPart::Literal("events".to_string());

    let call = match operation.as_str() {
        "getAll" => {
            let url = chain::build_url(CALENDAR_API_BASE, &[calendar, events], "");
            let max_results = node
                .text_parameter("maxResults")
                .or_else(|| node.text_parameter("limit"))
                .unwrap_or_else(|| DEFAULT_MAX_RESULTS.to_string());
            HttpCall::get(url)
                .query("maxResults", max_results)
                .query("singleEvents", "true")
                .query_opt("timeMin", node.text_parameter("timeMin"))
                .query_opt("timeMax", node.text_parameter("timeMax"))
        }
        "get" => HttpCall::get(event_url(node, calendar, events)),
        "delete" => HttpCall::delete(event_url(node, calendar, events)),
        "create" | "createEvent" => {
            let url = chain::build_url(CALENDAR_API_BASE, &[calendar, events], "");
            let body = format!(
                "{{ summary: {}, description: {}, start: {{ dateTime: {} }}, end: {{ dateTime: {} }} }}",
                js_value(node, "summary"),
                js_value(node, "description"),
                js_value(node, "start"),
                js_value(node, "end"),
            );
            HttpCall::post(url).json_body(json_expression(&body))
        }
        _ => {
            return Err(NodeTransformError::UnsupportedOperation {
                service: ServiceKind::Calendar.service_name().to_string(),
                operation,
            });
        }
    };
    Ok(chain::expand(node, ServiceKind::Calendar, ctx, &call, None))
}

fn event_url(node: &Node, calendar: PathPart, events: PathPart) -> String {
    chain::build_url(
        CALENDAR_API_BASE,
        &[calendar, events, PathPart::from_parameter(node, "eventId")],
        "",
    )
}
