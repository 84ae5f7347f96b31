//! Graph store seam and the Neo4j implementation.

use std::collections::HashMap;

use async_trait::async_trait;
use ledgergraph::models::{Edge, Entity};
use ledgergraph::{Error, Result};
use neo4rs::{query, Graph};
use serde_json::Value;

/// Simplified view of an entity pulled from the graph store.
#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub id: String,
    pub name: String,
    pub entity_type: String,
    pub properties: HashMap<String, Value>,
    pub graph_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraverseDirection {
    Outgoing,
    Incoming,
    Both,
}

impl TraverseDirection {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw {
            "outgoing" => Self::Outgoing,
            "incoming" => Self::Incoming,
            _ => Self::Both,
        }
    }
}

/// An entity reached by traversal, with the relationship path taken.
#[derive(Debug, Clone)]
pub struct ConnectedEntity {
    pub record: EntityRecord,
    pub relationship_path: Vec<String>,
    pub distance: i64,
}

/// A shortest path between two entities.
#[derive(Debug, Clone)]
pub struct GraphPath {
    pub entity_ids: Vec<String>,
    pub entity_names: Vec<String>,
    pub entity_types: Vec<String>,
    pub relationship_types: Vec<String>,
    pub length: i64,
}

/// An entity matching a connectivity pattern.
#[derive(Debug, Clone)]
pub struct PatternMatch {
    pub record: EntityRecord,
    pub relationship_count: i64,
    pub connected_to: Vec<String>,
}

/// Graph store operations the indexer, analytics and agent need.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn upsert_entities(&self, entities: &[Entity]) -> Result<usize>;
    async fn create_edges(&self, edges: &[Edge]) -> Result<usize>;

    /// Entities of one type, optionally scoped to a graph. A graph filter
    /// that matches nothing falls back to an unfiltered fetch.
    async fn entities_by_type(
        &self,
        entity_type: &str,
        graph_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EntityRecord>>;

    /// Entities matching any of the given types (all types when empty).
    async fn entities_filtered(
        &self,
        entity_types: &[String],
        graph_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EntityRecord>>;

    async fn entity_exists(&self, name: &str) -> Result<bool>;

    async fn traverse(
        &self,
        entity_name: &str,
        relationship_type: Option<&str>,
        direction: TraverseDirection,
        depth: u32,
    ) -> Result<Vec<ConnectedEntity>>;

    async fn shortest_path(
        &self,
        from_name: &str,
        to_name: &str,
        max_depth: u32,
    ) -> Result<Option<GraphPath>>;

    async fn entities_with_min_connections(
        &self,
        entity_type: Option<&str>,
        min_connections: i64,
    ) -> Result<Vec<PatternMatch>>;

    /// Sample property keys present on a graph's entities, for
    /// property-name normalization.
    async fn sample_property_keys(&self, graph_id: &str, limit: usize) -> Result<Vec<String>>;
}

fn parse_properties(raw: Option<String>) -> HashMap<String, Value> {
    raw.and_then(|s| serde_json::from_str(&s).ok()).unwrap_or_default()
}

/// Neo4j over bolt. Nodes are `Entity` labelled, merged on `entityId`;
/// relationships use the concrete edge type as their Cypher type.
pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| Error::store(format!("cannot connect to Neo4j: {e}")))?;
        Ok(Self { graph })
    }

    async fn fetch_records(
        &self,
        cypher: String,
        params: Vec<(&'static str, String)>,
    ) -> Result<Vec<EntityRecord>> {
        let mut q = query(&cypher);
        for (key, value) in params {
            q = q.param(key, value);
        }
        let mut stream = self
            .graph
            .execute(q)
            .await
            .map_err(|e| Error::store(format!("Neo4j query failed: {e}")))?;

        let mut records = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| Error::store(format!("Neo4j row read failed: {e}")))?
        {
            let (Ok(id), Ok(name), Ok(entity_type)) = (
                row.get::<String>("id"),
                row.get::<String>("name"),
                row.get::<String>("type"),
            ) else {
                continue;
            };
            records.push(EntityRecord {
                id,
                name,
                entity_type,
                properties: parse_properties(row.get::<String>("properties").ok()),
                graph_id: row.get::<String>("graphId").ok(),
            });
        }
        Ok(records)
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn upsert_entities(&self, entities: &[Entity]) -> Result<usize> {
        let mut indexed = 0usize;
        for entity in entities {
            let cypher = "
                MERGE (n:Entity {entityId: $entityId})
                SET n.type = $type,
                    n.name = $name,
                    n.properties = $properties,
                    n.documentId = $documentId,
                    n.graphId = $graphId,
                    n.citations = $citations
            ";
            self.graph
                .run(
                    query(cypher)
                        .param("entityId", entity.id.clone())
                        .param("type", entity.entity_type.as_str())
                        .param("name", entity.name.clone())
                        .param("properties", serde_json::to_string(&entity.properties)?)
                        .param("documentId", entity.document_id.clone())
                        .param("graphId", entity.graph_id.clone())
                        .param("citations", serde_json::to_string(&entity.citations)?),
                )
                .await
                .map_err(|e| Error::store(format!("Neo4j entity upsert failed: {e}")))?;
            indexed += 1;
        }
        tracing::info!(count = indexed, "indexed entities to graph store");
        Ok(indexed)
    }

    async fn create_edges(&self, edges: &[Edge]) -> Result<usize> {
        let mut created = 0usize;
        for edge in edges {
            // Relationship types must be identifiers in Cypher, so the
            // edge type is interpolated; it comes from a closed enum.
            let cypher = format!(
                "MATCH (a:Entity {{entityId: $source}})
                 MATCH (b:Entity {{entityId: $target}})
                 MERGE (a)-[r:{} {{edgeId: $edgeId}}]->(b)
                 SET r.graphId = $graphId, r.properties = $properties",
                edge.edge_type.as_str()
            );
            self.graph
                .run(
                    query(&cypher)
                        .param("source", edge.source.clone())
                        .param("target", edge.target.clone())
                        .param("edgeId", edge.id.clone())
                        .param("graphId", edge.graph_id.clone())
                        .param("properties", serde_json::to_string(&edge.properties)?),
                )
                .await
                .map_err(|e| Error::store(format!("Neo4j edge creation failed: {e}")))?;
            created += 1;
        }
        tracing::info!(count = created, "indexed relationships to graph store");
        Ok(created)
    }

    async fn entities_by_type(
        &self,
        entity_type: &str,
        graph_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EntityRecord>> {
        let select = "RETURN e.entityId AS id, e.name AS name, e.type AS type, \
                      e.properties AS properties, e.graphId AS graphId";
        if let Some(graph_id) = graph_id {
            let cypher = format!(
                "MATCH (e:Entity) WHERE e.type = $type AND e.graphId = $graphId {select} LIMIT {limit}"
            );
            let records = self
                .fetch_records(
                    cypher,
                    vec![
                        ("type", entity_type.to_string()),
                        ("graphId", graph_id.to_string()),
                    ],
                )
                .await?;
            if !records.is_empty() {
                return Ok(records);
            }
            tracing::warn!(graph_id, entity_type, "graph filter matched nothing, retrying unfiltered");
        }
        let cypher = format!("MATCH (e:Entity) WHERE e.type = $type {select} LIMIT {limit}");
        self.fetch_records(cypher, vec![("type", entity_type.to_string())])
            .await
    }

    async fn entities_filtered(
        &self,
        entity_types: &[String],
        graph_id: Option<&str>,
        limit: usize,
    ) -> Result<Vec<EntityRecord>> {
        let mut conditions = vec!["true".to_string()];
        if !entity_types.is_empty() {
            let list = entity_types
                .iter()
                .map(|t| format!("'{}'", t.replace('\'', "")))
                .collect::<Vec<_>>()
                .join(", ");
            conditions.push(format!("e.type IN [{list}]"));
        }
        let mut params = Vec::new();
        if let Some(graph_id) = graph_id {
            conditions.push("e.graphId = $graphId".to_string());
            params.push(("graphId", graph_id.to_string()));
        }
        let cypher = format!(
            "MATCH (e:Entity) WHERE {} \
             RETURN e.entityId AS id, e.name AS name, e.type AS type, \
             e.properties AS properties, e.graphId AS graphId LIMIT {limit}",
            conditions.join(" AND ")
        );
        self.fetch_records(cypher, params).await
    }

    async fn entity_exists(&self, name: &str) -> Result<bool> {
        let mut stream = self
            .graph
            .execute(
                query("MATCH (n:Entity {name: $name}) RETURN n.entityId AS id LIMIT 1")
                    .param("name", name.to_string()),
            )
            .await
            .map_err(|e| Error::store(format!("Neo4j query failed: {e}")))?;
        Ok(stream
            .next()
            .await
            .map_err(|e| Error::store(format!("Neo4j row read failed: {e}")))?
            .is_some())
    }

    async fn traverse(
        &self,
        entity_name: &str,
        relationship_type: Option<&str>,
        direction: TraverseDirection,
        depth: u32,
    ) -> Result<Vec<ConnectedEntity>> {
        let depth = depth.clamp(1, 3);
        let pattern = match direction {
            TraverseDirection::Outgoing => format!("(start)-[r*1..{depth}]->(connected:Entity)"),
            TraverseDirection::Incoming => format!("(start)<-[r*1..{depth}]-(connected:Entity)"),
            TraverseDirection::Both => format!("(start)-[r*1..{depth}]-(connected:Entity)"),
        };
        let rel_filter = match relationship_type {
            Some(rel) if rel != "any" => {
                // Edge types come from a closed set; strip quotes anyway.
                format!("AND ALL(rel IN r WHERE type(rel) = '{}')", rel.replace('\'', ""))
            }
            _ => String::new(),
        };
        let cypher = format!(
            "MATCH (start:Entity) WHERE start.name = $name
             MATCH {pattern}
             WHERE connected.entityId <> start.entityId {rel_filter}
             RETURN DISTINCT
                 connected.entityId AS id,
                 connected.name AS name,
                 connected.type AS type,
                 connected.properties AS properties,
                 connected.graphId AS graphId,
                 [rel IN r | type(rel)] AS relationshipPath,
                 size(r) AS distance
             ORDER BY distance, name
             LIMIT 50"
        );

        let mut stream = self
            .graph
            .execute(query(&cypher).param("name", entity_name.to_string()))
            .await
            .map_err(|e| Error::store(format!("Neo4j traverse failed: {e}")))?;

        let mut connected = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| Error::store(format!("Neo4j row read failed: {e}")))?
        {
            let (Ok(id), Ok(name), Ok(entity_type)) = (
                row.get::<String>("id"),
                row.get::<String>("name"),
                row.get::<String>("type"),
            ) else {
                continue;
            };
            connected.push(ConnectedEntity {
                record: EntityRecord {
                    id,
                    name,
                    entity_type,
                    properties: parse_properties(row.get::<String>("properties").ok()),
                    graph_id: row.get::<String>("graphId").ok(),
                },
                relationship_path: row.get::<Vec<String>>("relationshipPath").unwrap_or_default(),
                distance: row.get::<i64>("distance").unwrap_or(1),
            });
        }
        Ok(connected)
    }

    async fn shortest_path(
        &self,
        from_name: &str,
        to_name: &str,
        max_depth: u32,
    ) -> Result<Option<GraphPath>> {
        let max_depth = max_depth.clamp(1, 10);
        let cypher = format!(
            "MATCH (start:Entity {{name: $from}})
             MATCH (end:Entity {{name: $to}})
             MATCH path = shortestPath((start)-[*1..{max_depth}]-(end))
             RETURN
                 [node IN nodes(path) | node.entityId] AS entityIds,
                 [node IN nodes(path) | node.name] AS entityNames,
                 [node IN nodes(path) | node.type] AS entityTypes,
                 [rel IN relationships(path) | type(rel)] AS relationshipTypes,
                 length(path) AS pathLength
             LIMIT 1"
        );
        let mut stream = self
            .graph
            .execute(
                query(&cypher)
                    .param("from", from_name.to_string())
                    .param("to", to_name.to_string()),
            )
            .await
            .map_err(|e| Error::store(format!("Neo4j path query failed: {e}")))?;

        let row = stream
            .next()
            .await
            .map_err(|e| Error::store(format!("Neo4j row read failed: {e}")))?;
        Ok(row.map(|row| GraphPath {
            entity_ids: row.get::<Vec<String>>("entityIds").unwrap_or_default(),
            entity_names: row.get::<Vec<String>>("entityNames").unwrap_or_default(),
            entity_types: row.get::<Vec<String>>("entityTypes").unwrap_or_default(),
            relationship_types: row.get::<Vec<String>>("relationshipTypes").unwrap_or_default(),
            length: row.get::<i64>("pathLength").unwrap_or(0),
        }))
    }

    async fn entities_with_min_connections(
        &self,
        entity_type: Option<&str>,
        min_connections: i64,
    ) -> Result<Vec<PatternMatch>> {
        let type_filter = match entity_type {
            Some(t) if !t.is_empty() => format!("AND e.type = '{}'", t.replace('\'', "")),
            _ => String::new(),
        };
        let cypher = format!(
            "MATCH (e:Entity)
             WHERE true {type_filter}
             OPTIONAL MATCH (e)-[r]-(other:Entity)
             WITH e, count(DISTINCT r) AS relationshipCount,
                  collect(DISTINCT other.name) AS connectedTo
             WHERE relationshipCount >= $minConnections
             RETURN e.entityId AS id, e.name AS name, e.type AS type,
                    e.properties AS properties, e.graphId AS graphId,
                    relationshipCount, connectedTo
             ORDER BY relationshipCount DESC
             LIMIT 50"
        );
        let mut stream = self
            .graph
            .execute(query(&cypher).param("minConnections", min_connections))
            .await
            .map_err(|e| Error::store(format!("Neo4j pattern query failed: {e}")))?;

        let mut matches = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| Error::store(format!("Neo4j row read failed: {e}")))?
        {
            let (Ok(id), Ok(name), Ok(entity_type)) = (
                row.get::<String>("id"),
                row.get::<String>("name"),
                row.get::<String>("type"),
            ) else {
                continue;
            };
            let connected_to: Vec<String> = row.get::<Vec<String>>("connectedTo").unwrap_or_default();
            matches.push(PatternMatch {
                record: EntityRecord {
                    id,
                    name,
                    entity_type,
                    properties: parse_properties(row.get::<String>("properties").ok()),
                    graph_id: row.get::<String>("graphId").ok(),
                },
                relationship_count: row.get::<i64>("relationshipCount").unwrap_or(0),
                connected_to: connected_to.into_iter().take(10).collect(),
            });
        }
        Ok(matches)
    }

    async fn sample_property_keys(&self, graph_id: &str, limit: usize) -> Result<Vec<String>> {
        let cypher = format!(
            "MATCH (e:Entity {{graphId: $graphId}}) RETURN e.properties AS properties LIMIT {limit}"
        );
        let mut stream = self
            .graph
            .execute(query(&cypher).param("graphId", graph_id.to_string()))
            .await
            .map_err(|e| Error::store(format!("Neo4j query failed: {e}")))?;

        let mut keys = std::collections::BTreeSet::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| Error::store(format!("Neo4j row read failed: {e}")))?
        {
            for key in parse_properties(row.get::<String>("properties").ok()).into_keys() {
                keys.insert(key);
            }
        }
        Ok(keys.into_iter().collect())
    }
}
