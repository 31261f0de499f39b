//! Google Sheets nodes.
//!
//! Row data for `append` and `update` comes from the `values` parameter, or
//! from the input item's `values` at run time.

use super::chain::{self, HttpCall, PathPart, js_value, json_expression};
use super::{ServiceContext, ServiceKind};
use crate::document::Node;
use crate::error::NodeTransformError;

const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const DEFAULT_RANGE: &str = "Sheet1";
const VALUE_INPUT_OPTION: &str = "USER_ENTERED";

/// Expands a Google Sheets node.
///
/// # Errors
///
/// Returns `NodeTransformError::UnsupportedOperation` for operations other
/// than `read` (or `getAll`), `append`, `update` and `create`.
pub fn transform(node: &Node, ctx: &ServiceContext<'_>) -> Result<Vec<Node>, NodeTransformError> {
    let operation = node.text_parameter("operation").unwrap_or_default();
    let values_body = || json_expression(&format!("{{ values: {} }}", js_value(node, "values")));

    let call = match operation.as_str() {
        "read" | "getAll" => HttpCall::get(values_url(node, "")),
        "append" => HttpCall::post(values_url(node, ":append"))
            .query("valueInputOption", VALUE_INPUT_OPTION)
            .json_body(values_body()),
        "update" => HttpCall::put(values_url(node, ""))
            .query("valueInputOption", VALUE_INPUT_OPTION)
            .json_body(values_body()),
        "create" => {
            let body = format!("{{ properties: {{ title: {} }} }}", js_value(node, "title"));
            HttpCall::post(SHEETS_API_BASE).json_body(json_expression(&body))
        }
        _ => {
            return Err(NodeTransformError::UnsupportedOperation {
                service: ServiceKind::Sheets.service_name().to_string(),
                operation,
            });
        }
    };
    Ok(chain::expand(node, ServiceKind::Sheets, ctx, &call, None))
}

fn values_url(node: &Node, suffix: &str) -> String {
    chain::build_url(
        SHEETS_API_BASE,
        &[
            PathPart::from_parameter(node, "spreadsheetId"),
            PathPart::Literal("values".to_string()),
            PathPart::parameter_or(node, "range", DEFAULT_RANGE),
        ],
        suffix,
    )
}
