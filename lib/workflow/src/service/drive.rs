//! Google Drive nodes.

use super::chain::{self, HttpCall, PathPart, js_value, json_expression};
use super::{ServiceContext, ServiceKind};
use crate::document::Node;
use crate::error::NodeTransformError;

const DRIVE_FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";
const DEFAULT_PAGE_SIZE: &str = "100";
const FILE_FIELDS: &str = "id,name,mimeType,modifiedTime,webViewLink";

/// Expands a Google Drive node.
///
/// # Errors
///
/// Returns `NodeTransformError::UnsupportedOperation` for operations other
/// than `getAll` (or `list`), `get`, `createFolder` and `delete`.
pub fn transform(node: &Node, ctx: &ServiceContext<'_>) -> Result<Vec<Node>, NodeTransformError> {
    let operation = node.text_parameter("operation").unwrap_or_default();
    let call = match operation.as_str() {
        "getAll" | "list" => {
            let page_size = node
                .text_parameter("pageSize")
                .or_else(|| node.text_parameter("limit"))
                .unwrap_or_else(|| DEFAULT_PAGE_SIZE.to_string());
            let query = node
                .text_parameter("q")
                .or_else(|| node.nested_text_parameter("filters", "q"));
            HttpCall::get(DRIVE_FILES_URL)
                .query("pageSize", page_size)
                .query("fields", format!("files({FILE_FIELDS})"))
                .query_opt("q", query)
        }
        "get" => HttpCall::get(file_url(node)).query("fields", FILE_FIELDS),
        "delete" => HttpCall::delete(file_url(node)),
        "createFolder" => {
            let parents = match node.text_parameter("folderId") {
                Some(_) => format!(", parents: [{}]", js_value(node, "folderId")),
                None => String::new(),
            };
            let body = format!(
                "{{ name: {}, mimeType: \"{FOLDER_MIME_TYPE}\"{parents} }}",
                js_value(node, "name"),
            );
            HttpCall::post(DRIVE_FILES_URL).json_body(json_expression(&body))
        }
        _ => {
            return Err(NodeTransformError::UnsupportedOperation {
                service: ServiceKind::Drive.service_name().to_string(),
                operation,
            });
        }
    };
    Ok(chain::expand(node, ServiceKind::Drive, ctx, &call, None))
}

fn file_url(node: &Node) -> String {
    chain::build_url(DRIVE_FILES_URL, &[PathPart::from_parameter(node, "fileId")], "")
}
