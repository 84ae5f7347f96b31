//! Extraction routing: sync vs. async by size, ZIP fan-out, adaptive
//! schema mode and progress publication.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use ledgergraph::ids;
use ledgergraph::models::{
    aggregate_records, Document, ExtractionJob, ExtractionMetadata, ExtractionRecord, JobStatus,
    KeyValue, RawEntity, RawTable,
};
use ledgergraph::progress::ProgressTracker;
use ledgergraph::retry::BackoffPolicy;
use ledgergraph::{AppState, Error, Result};
use serde_json::Value;

use crate::client::{AdeClient, ParseResponse};
use crate::schema::SchemaAnalyzer;

/// Media types the extraction service accepts for ZIP members.
const SUPPORTED_MEMBER_MIMES: &[&str] = &[
    "application/pdf",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.oasis.opendocument.text",
    "application/vnd.oasis.opendocument.presentation",
    "image/jpeg",
    "image/png",
];

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    /// Files above this size go through the async parse-job path.
    pub sync_max_bytes: u64,
    /// Concurrent remote calls during ZIP fan-out.
    pub zip_concurrency: usize,
    /// Upper bound on job poll iterations.
    pub poll_max_iterations: u32,
    /// Synthesize extraction schemas from parsed markdown.
    pub adaptive_schema: bool,
    /// Where completed job results are persisted.
    pub jobs_dir: PathBuf,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            sync_max_bytes: 15 * 1024 * 1024,
            zip_concurrency: 20,
            poll_max_iterations: 60,
            adaptive_schema: true,
            jobs_dir: PathBuf::from("./cache/jobs"),
        }
    }
}

/// Coordinates remote Parse/Extract for one document at a time. Stateless
/// between calls apart from job records and progress.
pub struct ExtractionOrchestrator {
    client: AdeClient,
    analyzer: SchemaAnalyzer,
    state: Arc<AppState>,
    progress: Arc<ProgressTracker>,
    options: OrchestratorOptions,
}

impl ExtractionOrchestrator {
    pub fn new(
        client: AdeClient,
        state: Arc<AppState>,
        progress: Arc<ProgressTracker>,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            client,
            analyzer: SchemaAnalyzer::new(),
            state,
            progress,
            options,
        }
    }

    /// Run extraction for a document, routing by container and size.
    pub async fn extract_document(&self, document: &Document) -> Result<ExtractionRecord> {
        tracing::info!(document_id = %document.id, size = document.file_size, "starting extraction");
        let result = if is_zip(document) {
            self.extract_zip(document).await
        } else {
            let content = tokio::fs::read(&document.file_path).await?;
            self.progress.start(&document.id, 1);
            let outcome = if document.file_size <= self.options.sync_max_bytes {
                self.extract_single(document, content).await
            } else {
                self.extract_via_job(document, content).await
            };
            match &outcome {
                Ok(_) => self.progress.update(&document.id, |p| {
                    p.completed = 1;
                }),
                Err(_) => self.progress.update(&document.id, |p| {
                    p.failed = 1;
                }),
            }
            outcome
        };

        match &result {
            Ok(record) => {
                self.progress.complete(&document.id);
                tracing::info!(
                    document_id = %document.id,
                    entities = record.entities.len(),
                    key_values = record.key_values.len(),
                    pages = record.metadata.total_pages,
                    "extraction completed"
                );
            }
            Err(err) => {
                self.progress.fail(&document.id);
                tracing::error!(document_id = %document.id, error = %err, "extraction failed");
            }
        }
        result
    }

    // ---- single file, sync path ----

    async fn extract_single(
        &self,
        document: &Document,
        content: Vec<u8>,
    ) -> Result<ExtractionRecord> {
        let mut job = ExtractionJob::new(ids::job_id(), &document.id, 1);
        let record = self
            .parse_then_extract(&document.filename, content, &document.mime_type, &mut job)
            .await;
        match &record {
            Ok(_) => {
                job.completed = 1;
                job.finish(JobStatus::Completed);
            }
            Err(_) => {
                job.failed = 1;
                job.finish(JobStatus::Failed);
            }
        }
        self.state.jobs.write().insert(job.id.clone(), job);
        record
    }

    /// Parse to markdown, then run schema extraction over it. Extract
    /// failures degrade to a parse-only record rather than failing the
    /// pipeline.
    async fn parse_then_extract(
        &self,
        filename: &str,
        content: Vec<u8>,
        mime_type: &str,
        job: &mut ExtractionJob,
    ) -> Result<ExtractionRecord> {
        let parsed = self.client.parse(filename, content, mime_type).await?;
        self.extract_from_markdown(parsed, job).await
    }

    async fn extract_from_markdown(
        &self,
        parsed: ParseResponse,
        job: &mut ExtractionJob,
    ) -> Result<ExtractionRecord> {
        let (schema, label) = if self.options.adaptive_schema && !parsed.markdown.is_empty() {
            (self.analyzer.analyze(&parsed.markdown), "adaptive")
        } else {
            (SchemaAnalyzer::default_schema(), "default")
        };
        job.schema_label = Some(label.to_string());

        match self.client.extract(&parsed.markdown, &schema).await {
            Ok(extract_json) => Ok(record_from_outputs(parsed, Some(extract_json))),
            Err(err) if label == "adaptive" => {
                // Adaptive schemas can be rejected by the service; retry
                // with the default schema before giving up on Extract.
                tracing::warn!(error = %err, "adaptive extract failed, retrying with default schema");
                job.schema_label = Some("default".to_string());
                match self
                    .client
                    .extract(&parsed.markdown, &SchemaAnalyzer::default_schema())
                    .await
                {
                    Ok(extract_json) => Ok(record_from_outputs(parsed, Some(extract_json))),
                    Err(err) => {
                        tracing::warn!(error = %err, "extract failed, falling back to parse-only");
                        Ok(record_from_outputs(parsed, None))
                    }
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "extract failed, falling back to parse-only");
                Ok(record_from_outputs(parsed, None))
            }
        }
    }

    // ---- single file, async job path ----

    async fn extract_via_job(
        &self,
        document: &Document,
        content: Vec<u8>,
    ) -> Result<ExtractionRecord> {
        let remote_job_id = self
            .client
            .submit_parse_job(&document.filename, content, &document.mime_type)
            .await?;
        tracing::info!(document_id = %document.id, job_id = %remote_job_id, "parse job submitted");

        let mut job = ExtractionJob::new(remote_job_id.clone(), &document.id, 1);
        self.state.jobs.write().insert(job.id.clone(), job.clone());

        let parsed = self.poll_parse_job(&remote_job_id).await;
        let record = match parsed {
            Some(parsed) => {
                self.persist_job_result(&mut job, &parsed);
                job.completed = 1;
                job.finish(JobStatus::Completed);
                self.extract_from_markdown(parsed, &mut job).await
            }
            None => {
                // Poll budget exhausted. Degrade to an empty parse-only
                // record so the pipeline can proceed.
                tracing::warn!(job_id = %remote_job_id, "parse job did not complete within poll budget");
                job.failed = 1;
                job.finish(JobStatus::Failed);
                Ok(ExtractionRecord::parse_only(String::new(), 0))
            }
        };
        self.state.jobs.write().insert(job.id.clone(), job);
        record
    }

    /// Poll with exponential backoff (1.0s base, factor 1.5, 8s cap) up to
    /// the configured iteration bound.
    async fn poll_parse_job(&self, job_id: &str) -> Option<ParseResponse> {
        let policy = BackoffPolicy::job_poll();
        for iteration in 0..self.options.poll_max_iterations {
            tokio::time::sleep(policy.delay(iteration)).await;
            match self.client.parse_job_status(job_id).await {
                Ok(status) if status.is_completed() => return status.result,
                Ok(status) if status.is_failed() => {
                    tracing::warn!(
                        job_id,
                        error = status.error.as_deref().unwrap_or("unknown"),
                        "parse job failed remotely"
                    );
                    return None;
                }
                Ok(_) => {}
                Err(err) => {
                    tracing::warn!(job_id, iteration, error = %err, "job status poll failed");
                }
            }
        }
        None
    }

    fn persist_job_result(&self, job: &mut ExtractionJob, parsed: &ParseResponse) {
        let path = self.options.jobs_dir.join(format!("{}.json", job.id));
        let payload = serde_json::json!({
            "markdown": parsed.markdown,
            "metadata": {"page_count": parsed.metadata.page_count},
            "extraction_id": parsed.extraction_id,
        });
        match std::fs::create_dir_all(&self.options.jobs_dir)
            .and_then(|()| std::fs::write(&path, payload.to_string()))
        {
            Ok(()) => job.result_path = Some(path.to_string_lossy().into_owned()),
            Err(err) => {
                tracing::warn!(job_id = %job.id, error = %err, "could not persist job result");
            }
        }
    }

    // ---- ZIP fan-out ----

    async fn extract_zip(&self, document: &Document) -> Result<ExtractionRecord> {
        let members = read_zip_members(&document.file_path)?;
        self.progress.start(&document.id, members.len());
        let mut job = ExtractionJob::new(ids::job_id(), &document.id, members.len());
        tracing::info!(
            document_id = %document.id,
            members = members.len(),
            "fanning out ZIP extraction"
        );

        // Members complete in any order; the aggregate is assembled once
        // all of them settle.
        let results: Vec<Result<ExtractionRecord>> = stream::iter(members)
            .map(|member| {
                let mut member_job = ExtractionJob::new(ids::job_id(), &document.id, 1);
                async move {
                    let result = self
                        .parse_then_extract(
                            &member.name,
                            member.content,
                            &member.mime_type,
                            &mut member_job,
                        )
                        .await;
                    match &result {
                        Ok(_) => self.progress.update(&document.id, |p| p.completed += 1),
                        Err(err) => {
                            tracing::warn!(member = %member.name, error = %err, "ZIP member failed");
                            self.progress.update(&document.id, |p| p.failed += 1);
                        }
                    }
                    result
                }
            })
            .buffer_unordered(self.options.zip_concurrency.max(1))
            .collect()
            .await;

        let mut completed = Vec::new();
        for result in results {
            match result {
                Ok(record) => completed.push(record),
                Err(_) => job.failed += 1,
            }
        }
        job.completed = completed.len();
        let status = if job.failed > 0 && completed.is_empty() {
            JobStatus::Failed
        } else {
            JobStatus::Completed
        };
        job.finish(status);
        self.state.jobs.write().insert(job.id.clone(), job);

        Ok(aggregate_records(completed))
    }
}

struct ZipMember {
    name: String,
    content: Vec<u8>,
    mime_type: String,
}

fn is_zip(document: &Document) -> bool {
    document.file_path.to_lowercase().ends_with(".zip")
        || document.mime_type == "application/zip"
        || document.mime_type == "application/x-zip-compressed"
}

/// Enumerate a ZIP archive, keeping members whose guessed media type the
/// extraction service supports.
fn read_zip_members(path: &str) -> Result<Vec<ZipMember>> {
    use std::io::Read;

    let file = std::fs::File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| Error::validation(format!("unreadable ZIP: {e}")))?;

    let mut members = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| Error::validation(format!("unreadable ZIP entry: {e}")))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mime_type = mime_guess::from_path(&name)
            .first_raw()
            .unwrap_or("application/octet-stream")
            .to_string();
        if !SUPPORTED_MEMBER_MIMES.contains(&mime_type.as_str()) {
            tracing::debug!(member = %name, mime = %mime_type, "skipping unsupported ZIP member");
            continue;
        }
        let mut content = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut content)?;
        let base_name = name.rsplit('/').next().unwrap_or(&name).to_string();
        members.push(ZipMember {
            name: base_name,
            content,
            mime_type,
        });
    }
    Ok(members)
}

/// Merge a Parse response and an optional Extract response into the
/// normalized record shape downstream stages consume.
fn record_from_outputs(parsed: ParseResponse, extract_json: Option<Value>) -> ExtractionRecord {
    let mut record = ExtractionRecord {
        markdown: parsed.markdown,
        metadata: ExtractionMetadata {
            total_pages: parsed.metadata.page_count,
            confidence: parsed.metadata.confidence,
            extraction_id: parsed.extraction_id,
        },
        ..ExtractionRecord::default()
    };

    let Some(extract_json) = extract_json else {
        return record;
    };

    // Entities, when the service reports any directly.
    if let Some(entities) = extract_json.get("entities").and_then(Value::as_array) {
        for raw in entities {
            record.entities.push(RawEntity {
                entity_type: string_field(raw, &["type", "entity_type"]),
                name: string_field(raw, &["name", "text"]),
                properties: raw
                    .get("attributes")
                    .or_else(|| raw.get("properties"))
                    .and_then(Value::as_object)
                    .cloned()
                    .unwrap_or_default(),
                citations: raw
                    .get("citations")
                    .or_else(|| raw.get("locations"))
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or_default(),
            });
        }
    }

    if let Some(tables) = extract_json.get("tables").and_then(Value::as_array) {
        for raw in tables {
            record.tables.push(RawTable {
                id: string_field(raw, &["id"]),
                page: raw.get("page").and_then(Value::as_u64).map(|p| p as u32),
                headers: raw
                    .get("headers")
                    .and_then(|v| serde_json::from_value(v.clone()).ok())
                    .unwrap_or_default(),
                rows: raw
                    .get("rows")
                    .and_then(Value::as_array)
                    .cloned()
                    .unwrap_or_default(),
                caption: string_field(raw, &["caption"]),
            });
        }
    }

    // The schema extraction object itself: each top-level field becomes a
    // key/value pair, and the whole object is kept verbatim.
    if let Some(extraction) = extract_json.get("extraction").and_then(Value::as_object) {
        for (key, value) in extraction {
            record.key_values.push(KeyValue {
                key: key.clone(),
                value: value.clone(),
            });
        }
        record.structured_extraction = Some(Value::Object(extraction.clone()));
    }
    if let Some(key_values) = extract_json.get("key_values").and_then(Value::as_array) {
        for kv in key_values {
            if let (Some(key), Some(value)) = (
                kv.get("key").and_then(Value::as_str),
                kv.get("value"),
            ) {
                record.key_values.push(KeyValue {
                    key: key.to_string(),
                    value: value.clone(),
                });
            }
        }
    }

    if let Some(extraction_id) = extract_json.get("extraction_id").and_then(Value::as_str) {
        record.metadata.extraction_id = Some(extraction_id.to_string());
    }
    record
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| value.get(*k).and_then(Value::as_str))
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parsed(markdown: &str, pages: u32) -> ParseResponse {
        ParseResponse {
            markdown: markdown.to_string(),
            metadata: crate::client::ParseMetadata {
                page_count: pages,
                confidence: Some(0.9),
            },
            extraction_id: Some("ex_1".into()),
        }
    }

    #[test]
    fn parse_only_record_keeps_markdown() {
        let record = record_from_outputs(parsed("# Report", 4), None);
        assert_eq!(record.markdown, "# Report");
        assert_eq!(record.metadata.total_pages, 4);
        assert!(record.entities.is_empty());
        assert!(record.structured_extraction.is_none());
    }

    #[test]
    fn extraction_object_becomes_key_values() {
        let extract = serde_json::json!({
            "extraction": {
                "summary": "Revenue grew.",
                "cities": [{"city": "Akron"}]
            },
            "extraction_id": "ex_9"
        });
        let record = record_from_outputs(parsed("md", 1), Some(extract));
        assert_eq!(record.key_values.len(), 2);
        assert!(record.structured_extraction.is_some());
        assert_eq!(record.metadata.extraction_id.as_deref(), Some("ex_9"));
    }

    #[test]
    fn reported_entities_map_defensively() {
        let extract = serde_json::json!({
            "entities": [
                {"entity_type": "ORGANIZATION", "text": "Acme Corp", "attributes": {"industry": "tech"}},
                {"type": "LOAN", "name": "Term Loan A", "properties": {"rate": 0.09}}
            ]
        });
        let record = record_from_outputs(parsed("md", 1), Some(extract));
        assert_eq!(record.entities.len(), 2);
        assert_eq!(record.entities[0].name.as_deref(), Some("Acme Corp"));
        assert_eq!(record.entities[0].entity_type.as_deref(), Some("ORGANIZATION"));
        assert_eq!(record.entities[1].properties["rate"], 0.09);
    }

    #[test]
    fn zip_members_filter_by_media_type() {
        use std::io::Write;

        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("bundle.zip");
        let file = std::fs::File::create(&zip_path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("a.pdf", options).unwrap();
        writer.write_all(b"%PDF-1.4").unwrap();
        writer.start_file("notes.txt", options).unwrap();
        writer.write_all(b"ignore me").unwrap();
        writer.start_file("sub/b.png", options).unwrap();
        writer.write_all(b"\x89PNG").unwrap();
        writer.finish().unwrap();

        let members = read_zip_members(zip_path.to_str().unwrap()).unwrap();
        let names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.png"]);
        assert_eq!(members[0].mime_type, "application/pdf");
    }
}
