//! Process-wide state bundle.
//!
//! Seven in-memory maps, each behind its own lock, loaded from JSON
//! snapshots at startup and written back at shutdown. Locks are held only
//! for the map operation itself, never across I/O; callers clone what they
//! need out.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::models::{
    ChatMessage, ChatSession, Document, DocumentStatus, Entity, ExtractionJob, Graph, Risk,
};

const DOCUMENTS_FILE: &str = "documents.json";
const GRAPHS_FILE: &str = "graphs.json";
const ENTITIES_FILE: &str = "entities.json";
const CHAT_SESSIONS_FILE: &str = "chat_sessions.json";
const CHAT_MESSAGES_FILE: &str = "chat_messages.json";
const RISKS_FILE: &str = "risks.json";

/// The shared state bundle. A single supervisor (the server binary) owns
/// its lifecycle; everything else holds an `Arc<AppState>`.
pub struct AppState {
    pub documents: RwLock<HashMap<String, Document>>,
    pub graphs: RwLock<HashMap<String, Graph>>,
    /// Per-graph entity lists, mirroring the graphs map for fast lookup.
    pub entities: RwLock<HashMap<String, Vec<Entity>>>,
    pub chat_sessions: RwLock<HashMap<String, ChatSession>>,
    /// Per-session ordered message lists.
    pub chat_messages: RwLock<HashMap<String, Vec<ChatMessage>>>,
    /// Per-graph risk lists.
    pub risks: RwLock<HashMap<String, Vec<Risk>>>,
    /// Extraction jobs. Session-scoped, not snapshotted.
    pub jobs: RwLock<HashMap<String, ExtractionJob>>,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    #[must_use]
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
            graphs: RwLock::new(HashMap::new()),
            entities: RwLock::new(HashMap::new()),
            chat_sessions: RwLock::new(HashMap::new()),
            chat_messages: RwLock::new(HashMap::new()),
            risks: RwLock::new(HashMap::new()),
            jobs: RwLock::new(HashMap::new()),
        }
    }

    // ---- documents ----

    #[must_use]
    pub fn document(&self, id: &str) -> Option<Document> {
        self.documents.read().get(id).cloned()
    }

    pub fn insert_document(&self, document: Document) {
        self.documents.write().insert(document.id.clone(), document);
    }

    /// Mutate a document in place. Returns false when it does not exist.
    pub fn update_document(&self, id: &str, update: impl FnOnce(&mut Document)) -> bool {
        let mut documents = self.documents.write();
        match documents.get_mut(id) {
            Some(doc) => {
                update(doc);
                true
            }
            None => false,
        }
    }

    /// Advance a document's status, refusing regressions on the lattice.
    pub fn set_document_status(&self, id: &str, status: DocumentStatus) -> bool {
        self.update_document(id, |doc| {
            if doc.status.can_advance_to(status) {
                doc.status = status;
            } else {
                tracing::warn!(
                    document_id = id,
                    from = ?doc.status,
                    to = ?status,
                    "refusing status regression"
                );
            }
        })
    }

    #[must_use]
    pub fn list_documents(&self) -> Vec<Document> {
        let mut docs: Vec<_> = self.documents.read().values().cloned().collect();
        docs.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        docs
    }

    pub fn remove_document(&self, id: &str) -> Option<Document> {
        self.documents.write().remove(id)
    }

    /// Drop documents whose blob no longer exists on disk. Returns the
    /// pruned ids.
    pub fn prune_missing_blobs(&self) -> Vec<String> {
        let mut documents = self.documents.write();
        let missing: Vec<String> = documents
            .values()
            .filter(|d| !Path::new(&d.file_path).exists())
            .map(|d| d.id.clone())
            .collect();
        for id in &missing {
            documents.remove(id);
            tracing::warn!(document_id = %id, "pruned document with missing blob");
        }
        missing
    }

    // ---- graphs ----

    #[must_use]
    pub fn graph(&self, id: &str) -> Option<Graph> {
        self.graphs.read().get(id).cloned()
    }

    /// Install a freshly normalized graph and its entity list.
    pub fn install_graph(&self, graph: Graph) {
        self.entities
            .write()
            .insert(graph.id.clone(), graph.entities.clone());
        self.graphs.write().insert(graph.id.clone(), graph);
    }

    #[must_use]
    pub fn graph_entities(&self, graph_id: &str) -> Vec<Entity> {
        self.entities.read().get(graph_id).cloned().unwrap_or_default()
    }

    /// Supersession: purge every graph derived from `document_id`, along
    /// with its entity list and its risks. Returns the purged graph ids.
    pub fn purge_graphs_for_document(&self, document_id: &str) -> Vec<String> {
        let mut graphs = self.graphs.write();
        let stale: Vec<String> = graphs
            .values()
            .filter(|g| g.document_id == document_id)
            .map(|g| g.id.clone())
            .collect();
        for graph_id in &stale {
            graphs.remove(graph_id);
        }
        drop(graphs);

        let mut entities = self.entities.write();
        let mut risks = self.risks.write();
        for graph_id in &stale {
            entities.remove(graph_id);
            risks.remove(graph_id);
        }
        if !stale.is_empty() {
            tracing::info!(
                document_id,
                purged = stale.len(),
                "superseded prior graphs"
            );
        }
        stale
    }

    // ---- risks ----

    pub fn set_risks(&self, graph_id: &str, risks: Vec<Risk>) {
        self.risks.write().insert(graph_id.to_string(), risks);
    }

    #[must_use]
    pub fn graph_risks(&self, graph_id: &str) -> Vec<Risk> {
        self.risks.read().get(graph_id).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn all_risks(&self) -> Vec<Risk> {
        self.risks.read().values().flatten().cloned().collect()
    }

    // ---- persistence ----

    /// Write the six snapshot files. Each write is atomic (temp file then
    /// rename) so a crash mid-save never truncates an existing snapshot.
    pub fn save_snapshot(&self, state_dir: &Path) -> Result<()> {
        fs::create_dir_all(state_dir)?;

        // Clone each map out first; locks are never held across disk I/O.
        let documents = self.documents.read().clone();
        let graphs = self.graphs.read().clone();
        let entities = self.entities.read().clone();
        let sessions = self.chat_sessions.read().clone();
        let messages = self.chat_messages.read().clone();
        let risks = self.risks.read().clone();

        write_json(&state_dir.join(DOCUMENTS_FILE), &documents)?;
        write_json(&state_dir.join(GRAPHS_FILE), &graphs)?;
        write_json(&state_dir.join(ENTITIES_FILE), &entities)?;
        write_json(&state_dir.join(CHAT_SESSIONS_FILE), &sessions)?;
        write_json(&state_dir.join(CHAT_MESSAGES_FILE), &messages)?;
        write_json(&state_dir.join(RISKS_FILE), &risks)?;

        tracing::info!(dir = %state_dir.display(), "state snapshot written");
        Ok(())
    }

    /// Load all six snapshot files, reconstructing graphs that exist only
    /// as entity lists and pruning documents with missing blobs.
    pub fn load_snapshot(&self, state_dir: &Path) -> Result<()> {
        let documents: HashMap<String, Document> =
            read_json_or_default(&state_dir.join(DOCUMENTS_FILE))?;
        let mut graphs: HashMap<String, Graph> =
            read_json_or_default(&state_dir.join(GRAPHS_FILE))?;
        let entities: HashMap<String, Vec<Entity>> =
            read_json_or_default(&state_dir.join(ENTITIES_FILE))?;
        let sessions: HashMap<String, ChatSession> =
            read_json_or_default(&state_dir.join(CHAT_SESSIONS_FILE))?;
        let messages: HashMap<String, Vec<ChatMessage>> =
            read_json_or_default(&state_dir.join(CHAT_MESSAGES_FILE))?;
        let risks: HashMap<String, Vec<Risk>> = read_json_or_default(&state_dir.join(RISKS_FILE))?;

        // Reconstruct graphs that were lost but whose entities survive.
        for (graph_id, entity_list) in &entities {
            if let Some(graph) = graphs.get_mut(graph_id) {
                graph.entities = entity_list.clone();
            } else {
                tracing::warn!(graph_id = %graph_id, "reconstructing missing graph from entities");
                let document_id = entity_list
                    .first()
                    .map(|e| e.document_id.clone())
                    .unwrap_or_default();
                let mut graph = Graph::new(graph_id.clone(), document_id);
                graph.entities = entity_list.clone();
                graphs.insert(graph_id.clone(), graph);
            }
        }

        tracing::info!(
            documents = documents.len(),
            graphs = graphs.len(),
            sessions = sessions.len(),
            risk_graphs = risks.len(),
            "state snapshot loaded"
        );

        *self.documents.write() = documents;
        *self.graphs.write() = graphs;
        *self.entities.write() = entities;
        *self.chat_sessions.write() = sessions;
        *self.chat_messages.write() = messages;
        *self.risks.write() = risks;

        self.prune_missing_blobs();
        Ok(())
    }
}

fn write_json<T: Serialize>(path: &PathBuf, value: &T) -> Result<()> {
    let payload = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, payload)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

fn read_json_or_default<T: DeserializeOwned + Default>(path: &PathBuf) -> Result<T> {
    if !path.exists() {
        return Ok(T::default());
    }
    match serde_json::from_slice(&fs::read(path)?) {
        Ok(value) => Ok(value),
        Err(err) => {
            tracing::error!(file = %path.display(), error = %err, "unreadable snapshot, starting fresh");
            Ok(T::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids;
    use crate::models::{Edge, EdgeType, EntityType, RiskSeverity};

    fn entity(graph_id: &str, name: &str) -> Entity {
        Entity::new(
            ids::entity_id(),
            EntityType::Company,
            name,
            "doc_1",
            graph_id,
        )
    }

    fn sample_risk(graph_id: &str) -> Risk {
        Risk {
            id: ids::risk_id(),
            risk_type: "High Variable Rate".into(),
            severity: RiskSeverity::High,
            description: "rate above threshold".into(),
            affected_entity_ids: vec!["ent_x".into()],
            citations: Vec::new(),
            score: 1.0,
            threshold: 0.08,
            actual_value: 0.09,
            recommendation: "refinance".into(),
            graph_data: None,
            document_id: "doc_1".into(),
            graph_id: graph_id.into(),
            detected_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn snapshot_round_trip_reproduces_maps() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new();

        // A document whose blob exists (the snapshot file itself will do).
        let blob = dir.path().join("doc.pdf");
        std::fs::write(&blob, b"pdf").unwrap();
        let mut doc = Document::new(
            "doc_1".into(),
            "q4.pdf".into(),
            blob.to_string_lossy().into_owned(),
            3,
            "application/pdf".into(),
        );
        doc.status = DocumentStatus::Indexed;
        state.insert_document(doc);

        let mut graph = Graph::new("graph_1".into(), "doc_1");
        graph.entities.push(entity("graph_1", "Acme"));
        graph.edges.push(Edge::new(
            ids::edge_id(),
            "a",
            "b",
            EdgeType::RelatedTo,
            "graph_1",
        ));
        state.install_graph(graph);
        state.set_risks("graph_1", vec![sample_risk("graph_1")]);

        state.save_snapshot(dir.path()).unwrap();

        let restored = AppState::new();
        restored.load_snapshot(dir.path()).unwrap();

        assert_eq!(restored.documents.read().len(), 1);
        assert_eq!(
            restored.document("doc_1").unwrap().status,
            DocumentStatus::Indexed
        );
        let graph = restored.graph("graph_1").unwrap();
        assert_eq!(graph.entities.len(), 1);
        assert_eq!(graph.edges.len(), 1);
        assert_eq!(restored.graph_risks("graph_1").len(), 1);
    }

    #[test]
    fn load_prunes_documents_with_missing_blobs() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new();
        state.insert_document(Document::new(
            "doc_gone".into(),
            "gone.pdf".into(),
            dir.path().join("nope.pdf").to_string_lossy().into_owned(),
            1,
            "application/pdf".into(),
        ));
        state.save_snapshot(dir.path()).unwrap();

        let restored = AppState::new();
        restored.load_snapshot(dir.path()).unwrap();
        assert!(restored.document("doc_gone").is_none());
    }

    #[test]
    fn missing_graphs_are_reconstructed_from_entities() {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::new();
        state
            .entities
            .write()
            .insert("graph_lost".into(), vec![entity("graph_lost", "Orphan")]);
        state.save_snapshot(dir.path()).unwrap();

        let restored = AppState::new();
        restored.load_snapshot(dir.path()).unwrap();
        let graph = restored.graph("graph_lost").unwrap();
        assert_eq!(graph.document_id, "doc_1");
        assert_eq!(graph.entities.len(), 1);
        assert!(graph.edges.is_empty());
    }

    #[test]
    fn supersession_purges_graphs_entities_and_risks() {
        let state = AppState::new();
        let mut g1 = Graph::new("graph_old".into(), "doc_7");
        g1.entities.push(entity("graph_old", "Stale"));
        state.install_graph(g1);
        state.set_risks("graph_old", vec![sample_risk("graph_old")]);
        state.install_graph(Graph::new("graph_other".into(), "doc_8"));

        let purged = state.purge_graphs_for_document("doc_7");
        assert_eq!(purged, vec!["graph_old".to_string()]);
        assert!(state.graph("graph_old").is_none());
        assert!(state.graph_entities("graph_old").is_empty());
        assert!(state.graph_risks("graph_old").is_empty());
        assert!(state.graph("graph_other").is_some());
    }
}
