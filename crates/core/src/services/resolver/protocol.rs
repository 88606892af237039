//! JSON-RPC 2.0 / Language Server Protocol message shapes.
//!
//! Only the subset the resolver session speaks is modelled. Call hierarchy
//! items keep every field the server sent so they can be handed back
//! verbatim in follow-up requests.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use url::Url;

use crate::index::Position;

pub const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC "method not found".
pub const METHOD_NOT_FOUND: i64 = -32601;

pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const INITIALIZED: &str = "initialized";
    pub const SHUTDOWN: &str = "shutdown";
    pub const EXIT: &str = "exit";
    pub const DID_OPEN: &str = "textDocument/didOpen";
    pub const PREPARE_CALL_HIERARCHY: &str = "textDocument/prepareCallHierarchy";
    pub const OUTGOING_CALLS: &str = "callHierarchy/outgoingCalls";
}

/// LSP symbol kinds the handshake advertises interest in.
const SYMBOL_KIND_METHOD: u32 = 6;
const SYMBOL_KIND_FUNCTION: u32 = 12;

/// Error object of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// An incoming message, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Reply to one of our requests. `id` is `None` if the server echoed an
    /// id we could never have issued.
    Response { id: Option<u64>, result: Result<Value, ResponseError> },
    /// Server-initiated request; must be answered.
    Request { id: Value, method: String, params: Value },
    Notification { method: String, params: Value },
}

impl Message {
    pub fn classify(mut value: Value) -> Option<Message> {
        let obj = value.as_object_mut()?;
        let params = obj.remove("params").unwrap_or(Value::Null);
        match (obj.remove("id"), obj.remove("method")) {
            (Some(id), Some(Value::String(method))) => {
                Some(Message::Request { id, method, params })
            }
            (None, Some(Value::String(method))) => Some(Message::Notification { method, params }),
            (Some(id), None) => {
                let result = match obj.remove("error") {
                    Some(error) => Err(serde_json::from_value(error).unwrap_or_else(|_| {
                        ResponseError {
                            code: 0,
                            message: "unparseable error object".to_string(),
                            data: None,
                        }
                    })),
                    None => Ok(obj.remove("result").unwrap_or(Value::Null)),
                };
                Some(Message::Response { id: id.as_u64(), result })
            }
            _ => None,
        }
    }
}

pub fn request(id: u64, method: &str, params: Value) -> Value {
    let mut message = json!({ "jsonrpc": JSONRPC_VERSION, "id": id, "method": method });
    if !params.is_null() {
        message["params"] = params;
    }
    message
}

pub fn notification(method: &str, params: Value) -> Value {
    let mut message = json!({ "jsonrpc": JSONRPC_VERSION, "method": method });
    if !params.is_null() {
        message["params"] = params;
    }
    message
}

pub fn error_response(id: Value, code: i64, message: impl Into<String>) -> Value {
    json!({
        "jsonrpc": JSONRPC_VERSION,
        "id": id,
        "error": { "code": code, "message": message.into() },
    })
}

/// `file://` URI for a path, resolving relative paths against the working
/// directory. `None` if the path cannot be expressed as a file URI.
pub fn file_uri(path: &Path) -> Option<Url> {
    if path.is_absolute() {
        Url::from_file_path(path).ok()
    } else {
        let cwd = std::env::current_dir().ok()?;
        Url::from_file_path(cwd.join(path)).ok()
    }
}

pub fn initialize_params(root_uri: &Url, process_id: u32) -> Value {
    json!({
        "processId": process_id,
        "rootUri": root_uri.as_str(),
        "workspaceFolders": [{ "uri": root_uri.as_str(), "name": "root" }],
        "capabilities": {
            "workspace": {
                "applyEdit": false,
                "workspaceEdit": { "documentChanges": true },
                "didChangeConfiguration": { "dynamicRegistration": false },
                "didChangeWatchedFiles": { "dynamicRegistration": false },
            },
            "textDocument": {
                "synchronization": { "dynamicRegistration": false },
                "documentSymbol": {
                    "dynamicRegistration": false,
                    "hierarchicalDocumentSymbolSupport": true,
                    "symbolKind": { "valueSet": [SYMBOL_KIND_FUNCTION, SYMBOL_KIND_METHOD] },
                },
                "callHierarchy": { "dynamicRegistration": false },
            },
        },
    })
}

pub fn did_open_params(uri: &Url, language_id: &str, version: i32, text: &str) -> Value {
    json!({
        "textDocument": {
            "uri": uri.as_str(),
            "languageId": language_id,
            "version": version,
            "text": text,
        }
    })
}

pub fn position_params(uri: &Url, position: Position) -> Value {
    json!({
        "textDocument": { "uri": uri.as_str() },
        "position": { "line": position.line, "character": position.character },
    })
}

/// Server-side handle for one entity in a call hierarchy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallHierarchyItem {
    pub name: String,
    /// `kind`, `uri`, `range`, `selectionRange`, `data`, and anything else the
    /// server attached.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

/// One entry of an outgoing-calls response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingCall {
    pub to: CallHierarchyItem,
    #[serde(default)]
    pub from_ranges: Vec<Value>,
}
