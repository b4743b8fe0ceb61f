//! JSON at the edges: filters typed on the command line or read from seed files come in as
//! (extended) JSON, results go out as relaxed extended JSON.

use bson::{Bson, Document};
use serde_json::Value;

/// Reads a JSON object as a document. Extended JSON wrappers such as `{"$oid": ..}` or
/// `{"$date": ..}` become the matching BSON values.
///
/// # Errors
/// Returns a message when `val` is not an object or holds malformed extended JSON.
pub fn object_to_document(val: &Value) -> Result<Document, String> {
    let Value::Object(obj) = val else {
        return Err(format!("expected a JSON object, found {}", kind(val)));
    };
    Document::try_from(obj.clone()).map_err(|e| e.to_string())
}

/// [`object_to_document`] over a JSON string.
///
/// # Errors
/// Returns a message for invalid JSON or a non-object top level.
pub fn str_to_document(json: &str) -> Result<Document, String> {
    let val: Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
    object_to_document(&val)
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Relaxed extended JSON, the form the mongo shell prints (`ObjectId` as `{"$oid": ..}`,
/// plain numbers for int and double).
#[must_use]
pub fn document_to_json(doc: &Document) -> Value {
    Bson::Document(doc.clone()).into_relaxed_extjson()
}

#[must_use]
pub fn documents_to_json(docs: &[Document]) -> Value {
    Value::Array(docs.iter().map(document_to_json).collect())
}
