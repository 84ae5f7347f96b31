//! Identifier generation.
//!
//! Every record kind carries a stable prefix followed by a 12 hex char
//! random suffix, e.g. `doc_3f9a1c22b8de`.

use uuid::Uuid;

fn suffix() -> String {
    Uuid::new_v4().simple().to_string()[..12].to_string()
}

pub fn document_id() -> String {
    format!("doc_{}", suffix())
}

pub fn entity_id() -> String {
    format!("ent_{}", suffix())
}

pub fn edge_id() -> String {
    format!("edge_{}", suffix())
}

pub fn graph_id() -> String {
    format!("graph_{}", suffix())
}

pub fn risk_id() -> String {
    format!("risk_{}", suffix())
}

pub fn session_id() -> String {
    format!("session_{}", suffix())
}

pub fn message_id() -> String {
    format!("msg_{}", suffix())
}

pub fn job_id() -> String {
    format!("job_{}", suffix())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_and_lengths() {
        let id = document_id();
        assert!(id.starts_with("doc_"));
        assert_eq!(id.len(), "doc_".len() + 12);
        assert_ne!(entity_id(), entity_id());
    }
}
