//! Word-based text chunking for semantic indexing.

use ledgergraph::models::Entity;

const CHUNK_SIZE_WORDS: usize = 500;
const CHUNK_OVERLAP_WORDS: usize = 100;
/// Page estimate used when the page count is unknown.
const FALLBACK_CHUNKS_PER_PAGE: f64 = 2.0;

/// One indexable passage of document text.
#[derive(Debug, Clone)]
pub struct DocumentChunk {
    pub chunk_id: String,
    pub document_id: String,
    pub content: String,
    pub chunk_index: usize,
    /// 1-indexed, always within [1, total_pages].
    pub page_number: u32,
    pub filename: String,
    /// Ids of entities whose names occur in this chunk.
    pub entity_refs: Vec<String>,
}

/// Split into ~500-word chunks with 100-word overlap.
#[must_use]
pub fn chunk_words(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return Vec::new();
    }
    let stride = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut i = 0usize;
    while i < words.len() {
        let end = (i + chunk_size).min(words.len());
        chunks.push(words[i..end].join(" "));
        if end == words.len() {
            break;
        }
        i += stride;
    }
    chunks
}

/// Chunk a document's markdown and attach page numbers and entity
/// references.
///
/// Chunk indices are distributed evenly across the known page count; with
/// no page count, two chunks per page are assumed. Entity references are
/// found by case-insensitive substring match of the entity name.
#[must_use]
pub fn chunk_document_text(
    document_id: &str,
    markdown: &str,
    filename: &str,
    entities: &[Entity],
    total_pages: Option<u32>,
) -> Vec<DocumentChunk> {
    let contents = chunk_words(markdown, CHUNK_SIZE_WORDS, CHUNK_OVERLAP_WORDS);
    if contents.is_empty() {
        return Vec::new();
    }

    let total_pages = match total_pages {
        Some(pages) if pages > 0 => pages,
        _ => ((contents.len() as f64 / FALLBACK_CHUNKS_PER_PAGE).ceil() as u32).max(1),
    };
    let chunks_per_page = (contents.len() as f64 / f64::from(total_pages)).max(1.0);

    let lowered_names: Vec<(&str, String)> = entities
        .iter()
        .filter(|e| !e.name.is_empty())
        .map(|e| (e.id.as_str(), e.name.to_lowercase()))
        .collect();

    contents
        .into_iter()
        .enumerate()
        .map(|(idx, content)| {
            let lowered = content.to_lowercase();
            let entity_refs = lowered_names
                .iter()
                .filter(|(_, name)| lowered.contains(name.as_str()))
                .map(|(id, _)| (*id).to_string())
                .collect();
            let estimated_page = (idx as f64 / chunks_per_page) as u32 + 1;
            DocumentChunk {
                chunk_id: format!("{document_id}_chunk_{idx}"),
                document_id: document_id.to_string(),
                content,
                chunk_index: idx,
                page_number: estimated_page.min(total_pages),
                filename: filename.to_string(),
                entity_refs,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledgergraph::models::EntityType;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn chunks_overlap_by_100_words() {
        let text = words(1000);
        let chunks = chunk_words(&text, 500, 100);
        assert_eq!(chunks.len(), 3);
        let first: Vec<&str> = chunks[0].split_whitespace().collect();
        let second: Vec<&str> = chunks[1].split_whitespace().collect();
        assert_eq!(first.len(), 500);
        // The second chunk starts 400 words in, repeating the last 100.
        assert_eq!(second[0], "w400");
        assert_eq!(first[400], "w400");
    }

    #[test]
    fn page_numbers_stay_within_bounds() {
        let text = words(3000);
        let chunks = chunk_document_text("doc_1", &text, "q4.pdf", &[], Some(4));
        assert!(!chunks.is_empty());
        for chunk in &chunks {
            assert!(chunk.page_number >= 1);
            assert!(chunk.page_number <= 4);
        }
        assert_eq!(chunks.last().unwrap().page_number, 4);
    }

    #[test]
    fn fallback_estimates_two_chunks_per_page() {
        let text = words(2000);
        let chunks = chunk_document_text("doc_1", &text, "q4.pdf", &[], None);
        let max_page = chunks.iter().map(|c| c.page_number).max().unwrap();
        assert!(max_page >= 2);
    }

    #[test]
    fn entity_refs_match_case_insensitively() {
        let mut entity = Entity::new(
            "ent_akron".into(),
            EntityType::Location,
            "Akron",
            "doc_1",
            "graph_1",
        );
        entity.name = "Akron".into();
        let text = format!("{} AKRON reported strong results", words(10));
        let chunks = chunk_document_text("doc_1", &text, "f.pdf", &[entity], Some(1));
        assert_eq!(chunks[0].entity_refs, vec!["ent_akron".to_string()]);
    }

    #[test]
    fn empty_text_produces_no_chunks() {
        assert!(chunk_document_text("doc_1", "", "f.pdf", &[], Some(3)).is_empty());
    }
}
