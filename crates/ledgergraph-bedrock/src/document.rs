//! Conversion between `serde_json::Value` and the AWS smithy `Document`
//! type Converse uses for tool schemas and tool inputs.

use std::collections::HashMap;

use aws_smithy_types::{Document, Number};
use ledgergraph::{Error, Result};

pub fn json_to_document(value: &serde_json::Value) -> Result<Document> {
    match value {
        serde_json::Value::Null => Ok(Document::Null),
        serde_json::Value::Bool(b) => Ok(Document::Bool(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                if i >= 0 {
                    Ok(Document::Number(Number::PosInt(i as u64)))
                } else {
                    Ok(Document::Number(Number::NegInt(i)))
                }
            } else if let Some(f) = n.as_f64() {
                Ok(Document::Number(Number::Float(f)))
            } else {
                Err(Error::other("unrepresentable JSON number"))
            }
        }
        serde_json::Value::String(s) => Ok(Document::String(s.clone())),
        serde_json::Value::Array(arr) => {
            let docs: Result<Vec<_>> = arr.iter().map(json_to_document).collect();
            Ok(Document::Array(docs?))
        }
        serde_json::Value::Object(obj) => {
            let map: Result<HashMap<_, _>> = obj
                .iter()
                .map(|(k, v)| json_to_document(v).map(|d| (k.clone(), d)))
                .collect();
            Ok(Document::Object(map?))
        }
    }
}

pub fn document_to_json(doc: Document) -> Result<serde_json::Value> {
    match doc {
        Document::Null => Ok(serde_json::Value::Null),
        Document::Bool(b) => Ok(serde_json::Value::Bool(b)),
        Document::Number(n) => match n {
            Number::PosInt(i) => Ok(serde_json::json!(i)),
            Number::NegInt(i) => Ok(serde_json::json!(i)),
            Number::Float(f) => Ok(serde_json::json!(f)),
        },
        Document::String(s) => Ok(serde_json::Value::String(s)),
        Document::Array(arr) => {
            let values: Result<Vec<_>> = arr.into_iter().map(document_to_json).collect();
            Ok(serde_json::Value::Array(values?))
        }
        Document::Object(obj) => {
            let map: Result<serde_json::Map<_, _>> = obj
                .into_iter()
                .map(|(k, v)| document_to_json(v).map(|j| (k, j)))
                .collect();
            Ok(serde_json::Value::Object(map?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_nested_structures() {
        let value = serde_json::json!({
            "name": "graph_query",
            "count": 3,
            "rate": 0.08,
            "neg": -2,
            "nested": {"keys": ["a", "b"], "flag": true},
            "none": null,
        });
        let doc = json_to_document(&value).unwrap();
        let back = document_to_json(doc).unwrap();
        assert_eq!(back, value);
    }
}
