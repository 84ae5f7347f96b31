//! Deterministic parsers over parsed markdown.
//!
//! Each parser is a pure function from `(markdown, document_id, graph_id)`
//! to a list of typed entities with citations; none of them calls an
//! external service. The table parser is the workhorse for structured
//! documents; the others cover specific financial document types, chosen
//! by the document-type detector.

pub mod contract;
pub mod doc_type;
pub mod email;
pub mod invoice;
pub mod loan;
pub mod narrative;
pub mod receipt;
pub mod tables;

pub use doc_type::{DocumentType, DocumentTypeDetector, TypeDetection};
pub use tables::TableParser;
