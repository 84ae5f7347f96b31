//! Risk detection: rule table, LLM anomaly pass, missing-covenant
//! heuristic and per-risk subgraph synthesis.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use ledgergraph::ids;
use ledgergraph::models::{
    Edge, Entity, EntityType, Risk, RiskSeverity, RiskSubgraph,
};
use ledgergraph::Result;
use ledgergraph_bedrock::{jsonx, CompletionModel, CompletionRequest};
use serde_json::{json, Value};

/// How a rule compares the observed value against its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparator {
    Above,
    Below,
}

struct RiskRule {
    name: &'static str,
    description: &'static str,
    entity_type: EntityType,
    property: &'static str,
    threshold: f64,
    severity: RiskSeverity,
    comparator: Comparator,
    recommendation: &'static str,
}

const RULES: &[RiskRule] = &[
    RiskRule {
        name: "high_variable_rate",
        description: "Variable-rate debt exceeds 8% threshold",
        entity_type: EntityType::Loan,
        property: "rate",
        threshold: 0.08,
        severity: RiskSeverity::High,
        comparator: Comparator::Above,
        recommendation: "Consider hedging strategies or refinancing to fixed-rate debt",
    },
    RiskRule {
        name: "high_debt_ratio",
        description: "Debt-to-equity ratio exceeds 0.6 threshold",
        entity_type: EntityType::Metric,
        property: "debt_ratio",
        threshold: 0.6,
        severity: RiskSeverity::Medium,
        comparator: Comparator::Above,
        recommendation: "Consider debt restructuring or equity raising",
    },
    RiskRule {
        name: "negative_cash_flow",
        description: "Negative operating cash flow",
        entity_type: EntityType::Metric,
        property: "cash_flow",
        threshold: 0.0,
        severity: RiskSeverity::High,
        comparator: Comparator::Below,
        recommendation: "Review operational efficiency and cost structure",
    },
    RiskRule {
        name: "approaching_maturity",
        description: "Debt maturity within 12 months",
        entity_type: EntityType::Loan,
        property: "days_to_maturity",
        threshold: 365.0,
        severity: RiskSeverity::Medium,
        comparator: Comparator::Below,
        recommendation: "Prepare refinancing plan or cash reserves",
    },
];

const MAX_SUMMARY_ENTITIES: usize = 50;
const SUBGRAPH_SYSTEM_PROMPT: &str = r#"You are a financial risk analysis expert. Given a specific risk, identify which entities and relationships from the knowledge graph are most relevant to understanding and visualizing this risk.

Respond with JSON:
{
  "relevant_entity_ids": ["entity_id_1", "entity_id_2"],
  "relevant_relationship_indices": [0, 1, 2],
  "reasoning": "Brief explanation of why these entities/relationships are relevant"
}

Be comprehensive but focused - include entities that help visualize the risk's impact."#;

fn title_from_rule(name: &str) -> String {
    name.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn entity_to_value(entity: &Entity) -> Value {
    json!({
        "id": entity.id,
        "name": entity.name,
        "type": entity.entity_type.as_str(),
        "display_type": entity.display_type,
        "properties": entity.properties,
    })
}

fn edge_to_value(edge: &Edge) -> Value {
    json!({
        "id": edge.id,
        "source": edge.source,
        "target": edge.target,
        "type": edge.edge_type.as_str(),
        "properties": edge.properties,
    })
}

/// Hybrid risk detection over a graph's entities.
pub struct RiskDetector {
    model: Arc<dyn CompletionModel>,
}

impl RiskDetector {
    pub fn new(model: Arc<dyn CompletionModel>) -> Self {
        Self { model }
    }

    /// Rule pass: scan matching entities against the rule table.
    #[must_use]
    pub fn detect_rule_risks(
        &self,
        entities: &[Entity],
        document_id: &str,
        graph_id: &str,
    ) -> Vec<Risk> {
        let mut risks = Vec::new();
        for rule in RULES {
            for entity in entities {
                if entity.entity_type != rule.entity_type {
                    continue;
                }
                let Some(actual) = entity.numeric_property(rule.property) else {
                    continue;
                };
                let violated = match rule.comparator {
                    Comparator::Above => actual > rule.threshold,
                    Comparator::Below => actual < rule.threshold,
                };
                if !violated {
                    continue;
                }
                let score = match rule.property {
                    "rate" | "debt_ratio" => (actual / rule.threshold).min(1.0),
                    "cash_flow" => (actual.abs() / 1_000_000.0).min(1.0),
                    _ => ((rule.threshold - actual) / rule.threshold).min(1.0),
                };
                risks.push(Risk {
                    id: ids::risk_id(),
                    risk_type: title_from_rule(rule.name),
                    severity: rule.severity,
                    description: format!("{} - {}", rule.description, entity.name),
                    affected_entity_ids: vec![entity.id.clone()],
                    citations: entity.citations.clone(),
                    score,
                    threshold: rule.threshold,
                    actual_value: actual,
                    recommendation: rule.recommendation.to_string(),
                    graph_data: None,
                    document_id: document_id.to_string(),
                    graph_id: graph_id.to_string(),
                    detected_at: Utc::now(),
                });
            }
        }
        tracing::info!(count = risks.len(), "rule pass detected risks");
        risks
    }

    /// Loans in a graph with no clause entities at all suggest missing
    /// covenant documentation.
    #[must_use]
    pub fn detect_missing_covenants(
        &self,
        entities: &[Entity],
        document_id: &str,
        graph_id: &str,
    ) -> Vec<Risk> {
        let has_clauses = entities
            .iter()
            .any(|e| e.entity_type == EntityType::Clause);
        if has_clauses {
            return Vec::new();
        }
        entities
            .iter()
            .filter(|e| e.entity_type == EntityType::Loan)
            .map(|loan| Risk {
                id: ids::risk_id(),
                risk_type: "Missing Covenants".to_string(),
                severity: RiskSeverity::Medium,
                description: format!("No covenant clauses found for loan: {}", loan.name),
                affected_entity_ids: vec![loan.id.clone()],
                citations: loan.citations.clone(),
                score: 0.7,
                threshold: 1.0,
                actual_value: 0.0,
                recommendation: "Review loan agreement for required covenant clauses".to_string(),
                graph_data: None,
                document_id: document_id.to_string(),
                graph_id: graph_id.to_string(),
                detected_at: Utc::now(),
            })
            .collect()
    }

    /// LLM anomaly pass: summarize entities by type and ask for risks the
    /// rules cannot see. Parse failures degrade to an empty list.
    pub async fn detect_llm_anomalies(
        &self,
        entities: &[Entity],
        document_id: &str,
        graph_id: &str,
    ) -> Result<Vec<Risk>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let summary = prepare_entity_summary(entities, MAX_SUMMARY_ENTITIES);
        let prompt = format!(
            "Analyze these financial entities and detect potential risks, anomalies, or compliance gaps.\n\n\
             Entity Data:\n{summary}\n\n\
             Identify:\n\
             1. **Unusual patterns** - Values significantly outside normal ranges\n\
             2. **Missing required information** - Expected fields that are absent\n\
             3. **Inconsistencies** - Data that doesn't align across entities\n\
             4. **Compliance risks** - Potential regulatory or covenant violations\n\
             5. **Financial red flags** - Signs of financial distress or mismanagement\n\n\
             For each risk detected, provide:\n\
             - type: Brief risk category\n\
             - severity: critical/high/medium/low\n\
             - description: What the risk is\n\
             - affected_entities: List of entity IDs\n\
             - score: Risk score 0-1\n\
             - recommendation: Suggested action\n\n\
             Return as JSON array of risks. If no risks detected, return empty array []."
        );

        let response = self
            .model
            .complete(
                CompletionRequest {
                    system: None,
                    messages: vec![ledgergraph_bedrock::ConversationTurn::user(prompt)],
                    tools: Vec::new(),
                    max_tokens: 4096,
                    temperature: 0.1,
                },
            )
            .await?;

        let Some(items) = jsonx::extract_json_array(&response.text()) else {
            tracing::warn!("unparseable anomaly response, returning no LLM risks");
            return Ok(Vec::new());
        };

        let by_id: HashMap<&str, &Entity> = entities.iter().map(|e| (e.id.as_str(), e)).collect();
        let mut risks = Vec::new();
        for item in items {
            let affected: Vec<String> = item["affected_entities"]
                .as_array()
                .map(|ids| {
                    ids.iter()
                        .filter_map(Value::as_str)
                        .map(ToString::to_string)
                        .collect()
                })
                .unwrap_or_default();
            // Citations lift from the first three affected entities.
            let citations = affected
                .iter()
                .take(3)
                .filter_map(|id| by_id.get(id.as_str()))
                .flat_map(|e| e.citations.clone())
                .collect();
            let score = item["score"].as_f64().unwrap_or(0.5).clamp(0.0, 1.0);
            risks.push(Risk {
                id: ids::risk_id(),
                risk_type: item["type"]
                    .as_str()
                    .unwrap_or("LLM Detected Risk")
                    .to_string(),
                severity: RiskSeverity::parse(item["severity"].as_str().unwrap_or("medium")),
                description: item["description"].as_str().unwrap_or("").to_string(),
                affected_entity_ids: affected,
                citations,
                score,
                threshold: 1.0,
                actual_value: score,
                recommendation: item["recommendation"]
                    .as_str()
                    .unwrap_or("Review and investigate")
                    .to_string(),
                graph_data: None,
                document_id: document_id.to_string(),
                graph_id: graph_id.to_string(),
                detected_at: Utc::now(),
            });
        }
        tracing::info!(count = risks.len(), "LLM anomaly pass detected risks");
        Ok(risks)
    }

    /// Per-risk subgraph: ask the model which entities and relationship
    /// indices matter; fall back to the one-hop closure of the affected
    /// entities.
    pub async fn build_risk_subgraph(
        &self,
        risk: &Risk,
        entities: &[Entity],
        edges: &[Edge],
    ) -> RiskSubgraph {
        match self.llm_subgraph(risk, entities, edges).await {
            Ok(Some(subgraph)) => subgraph,
            Ok(None) | Err(_) => {
                tracing::warn!(risk_id = %risk.id, "LLM subgraph selection failed, using one-hop fallback");
                fallback_subgraph(risk, entities, edges)
            }
        }
    }

    async fn llm_subgraph(
        &self,
        risk: &Risk,
        entities: &[Entity],
        edges: &[Edge],
    ) -> Result<Option<RiskSubgraph>> {
        let entity_descriptions: Vec<Value> =
            entities.iter().take(100).map(entity_to_value).collect();
        let edge_descriptions: Vec<Value> = edges
            .iter()
            .take(50)
            .map(|e| {
                json!({
                    "source_id": e.source,
                    "target_id": e.target,
                    "type": e.edge_type.as_str(),
                    "properties": e.properties,
                })
            })
            .collect();

        let user_prompt = format!(
            "Risk Details:\n- Type: {}\n- Severity: {:?}\n- Description: {}\n- Affected Entity IDs: {:?}\n- Score: {}\n- Recommendation: {}\n\n\
             Available Entities ({}):\n{}\n\n\
             Available Relationships ({}):\n{}\n\n\
             Identify which entity IDs and relationship indices (0-based) are most relevant to understanding this risk. Respond with JSON only.",
            risk.risk_type,
            risk.severity,
            risk.description,
            risk.affected_entity_ids,
            risk.score,
            risk.recommendation,
            entity_descriptions.len(),
            serde_json::to_string_pretty(&entity_descriptions)?,
            edge_descriptions.len(),
            serde_json::to_string_pretty(&edge_descriptions)?,
        );

        let response = self
            .model
            .complete(
                CompletionRequest::single_turn(SUBGRAPH_SYSTEM_PROMPT, user_prompt)
                    .with_max_tokens(2048),
            )
            .await?;
        let Some(payload) = jsonx::extract_json_object(&response.text()) else {
            return Ok(None);
        };

        let mut relevant_ids: HashSet<String> = payload
            .get("relevant_entity_ids")
            .and_then(Value::as_array)
            .map(|ids| {
                ids.iter()
                    .filter_map(Value::as_str)
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();
        relevant_ids.extend(risk.affected_entity_ids.iter().cloned());

        let mut seen_edges = HashSet::new();
        let mut relationships = Vec::new();
        if let Some(indices) = payload
            .get("relevant_relationship_indices")
            .and_then(Value::as_array)
        {
            for index in indices.iter().filter_map(Value::as_u64) {
                if let Some(edge) = edges.get(index as usize) {
                    if seen_edges.insert(edge.id.clone()) {
                        relationships.push(edge_to_value(edge));
                    }
                }
            }
        }
        // Also include edges connecting any two relevant entities.
        for edge in edges {
            if relevant_ids.contains(&edge.source)
                && relevant_ids.contains(&edge.target)
                && seen_edges.insert(edge.id.clone())
            {
                relationships.push(edge_to_value(edge));
            }
        }

        let subgraph_entities: Vec<Value> = entities
            .iter()
            .filter(|e| relevant_ids.contains(&e.id))
            .map(entity_to_value)
            .collect();
        Ok(Some(RiskSubgraph {
            entities: subgraph_entities,
            relationships,
            reasoning: payload
                .get("reasoning")
                .and_then(Value::as_str)
                .unwrap_or("LLM-selected risk subgraph")
                .to_string(),
        }))
    }

    /// Severity histogram for dashboards.
    #[must_use]
    pub fn risk_summary(risks: &[Risk]) -> Value {
        let count = |severity: RiskSeverity| {
            risks.iter().filter(|r| r.severity == severity).count()
        };
        json!({
            "total_risks": risks.len(),
            "critical_severity": count(RiskSeverity::Critical),
            "high_severity": count(RiskSeverity::High),
            "medium_severity": count(RiskSeverity::Medium),
            "low_severity": count(RiskSeverity::Low),
        })
    }
}

/// Compact by-type entity summary for the anomaly prompt: first five of
/// each type with up to five non-null properties.
fn prepare_entity_summary(entities: &[Entity], max_entities: usize) -> String {
    let mut by_type: HashMap<&str, Vec<&Entity>> = HashMap::new();
    for entity in entities.iter().take(max_entities) {
        by_type
            .entry(entity.entity_type.as_str())
            .or_default()
            .push(entity);
    }

    let mut lines = Vec::new();
    let mut types: Vec<_> = by_type.keys().copied().collect();
    types.sort_unstable();
    for type_name in types {
        let group = &by_type[type_name];
        lines.push(format!(
            "\n**{} ({} total):**",
            type_name.to_uppercase(),
            group.len()
        ));
        for entity in group.iter().take(5) {
            let props: Vec<String> = entity
                .properties
                .iter()
                .filter(|(_, v)| !v.is_null())
                .take(5)
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            lines.push(format!(
                "  - ID: {}, Name: {}, Properties: {{{}}}",
                entity.id,
                entity.name,
                props.join(", ")
            ));
        }
        if group.len() > 5 {
            lines.push(format!("  ... and {} more", group.len() - 5));
        }
    }
    lines.join("\n")
}

/// One relationship hop out from the affected entities.
fn fallback_subgraph(risk: &Risk, entities: &[Entity], edges: &[Edge]) -> RiskSubgraph {
    let mut relevant_ids: HashSet<String> = risk.affected_entity_ids.iter().cloned().collect();
    let mut relevant_edges = Vec::new();
    for edge in edges {
        if relevant_ids.contains(&edge.source) || relevant_ids.contains(&edge.target) {
            relevant_edges.push(edge);
            relevant_ids.insert(edge.source.clone());
            relevant_ids.insert(edge.target.clone());
        }
    }
    RiskSubgraph {
        entities: entities
            .iter()
            .filter(|e| relevant_ids.contains(&e.id))
            .map(entity_to_value)
            .collect(),
        relationships: relevant_edges.into_iter().map(edge_to_value).collect(),
        reasoning: "Fallback: using affected entities and direct connections".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubModel;
    use ledgergraph::models::EdgeType;

    fn loan(id: &str, name: &str, rate: f64) -> Entity {
        let mut e = Entity::new(id.into(), EntityType::Loan, name, "doc_1", "graph_1");
        e.properties.insert("rate".into(), json!(rate));
        e
    }

    #[test]
    fn high_variable_rate_rule_fires_with_capped_score() {
        let detector = RiskDetector::new(Arc::new(StubModel::failing()));
        let entities = vec![loan("ent_loan", "Term Loan B", 0.09)];
        let risks = detector.detect_rule_risks(&entities, "doc_1", "graph_1");

        assert_eq!(risks.len(), 1);
        let risk = &risks[0];
        assert_eq!(risk.risk_type, "High Variable Rate");
        assert_eq!(risk.severity, RiskSeverity::High);
        assert_eq!(risk.score, 1.0);
        assert_eq!(risk.actual_value, 0.09);
        assert_eq!(risk.threshold, 0.08);
        assert_eq!(risk.affected_entity_ids, vec!["ent_loan".to_string()]);
    }

    #[test]
    fn below_threshold_rules_use_their_comparator() {
        let detector = RiskDetector::new(Arc::new(StubModel::failing()));
        let mut cash = Entity::new(
            "ent_cash".into(),
            EntityType::Metric,
            "cash_flow",
            "doc_1",
            "graph_1",
        );
        cash.properties.insert("cash_flow".into(), json!(-500_000.0));
        let mut maturing = loan("ent_near", "Bridge Loan", 0.05);
        maturing
            .properties
            .insert("days_to_maturity".into(), json!(90));

        let risks = detector.detect_rule_risks(&[cash, maturing], "doc_1", "graph_1");
        assert_eq!(risks.len(), 2);

        let cash_risk = risks.iter().find(|r| r.risk_type == "Negative Cash Flow").unwrap();
        assert!((cash_risk.score - 0.5).abs() < 1e-9);
        let maturity_risk = risks
            .iter()
            .find(|r| r.risk_type == "Approaching Maturity")
            .unwrap();
        assert!((maturity_risk.score - (365.0 - 90.0) / 365.0).abs() < 1e-9);
    }

    #[test]
    fn missing_covenants_fire_per_loan_without_clauses() {
        let detector = RiskDetector::new(Arc::new(StubModel::failing()));
        let entities = vec![loan("ent_a", "Loan A", 0.05), loan("ent_b", "Loan B", 0.04)];
        let risks = detector.detect_missing_covenants(&entities, "doc_1", "graph_1");
        assert_eq!(risks.len(), 2);
        assert!(risks.iter().all(|r| r.risk_type == "Missing Covenants"));

        let mut with_clause = entities;
        with_clause.push(Entity::new(
            "ent_c".into(),
            EntityType::Clause,
            "Leverage Covenant",
            "doc_1",
            "graph_1",
        ));
        assert!(detector
            .detect_missing_covenants(&with_clause, "doc_1", "graph_1")
            .is_empty());
    }

    #[tokio::test]
    async fn llm_anomalies_parse_and_clamp() {
        let response = json!([{
            "type": "Concentration Risk",
            "severity": "high",
            "description": "Single lender concentration",
            "affected_entities": ["ent_loan"],
            "score": 1.7,
            "recommendation": "Diversify lenders"
        }])
        .to_string();
        let detector = RiskDetector::new(Arc::new(StubModel::with_responses(vec![response])));
        let entities = vec![loan("ent_loan", "Term Loan B", 0.09)];
        let risks = detector
            .detect_llm_anomalies(&entities, "doc_1", "graph_1")
            .await
            .unwrap();
        assert_eq!(risks.len(), 1);
        assert_eq!(risks[0].severity, RiskSeverity::High);
        assert_eq!(risks[0].score, 1.0);
    }

    #[tokio::test]
    async fn unparseable_anomaly_response_degrades_to_empty() {
        let detector = RiskDetector::new(Arc::new(StubModel::with_responses(vec![
            "I could not find anything.".to_string(),
        ])));
        let entities = vec![loan("ent_loan", "Term Loan B", 0.09)];
        let risks = detector
            .detect_llm_anomalies(&entities, "doc_1", "graph_1")
            .await
            .unwrap();
        assert!(risks.is_empty());
    }

    #[tokio::test]
    async fn subgraph_falls_back_to_one_hop_closure() {
        let detector = RiskDetector::new(Arc::new(StubModel::failing()));
        let entities = vec![
            loan("ent_loan", "Term Loan B", 0.09),
            Entity::new("ent_co".into(), EntityType::Company, "Acme", "doc_1", "graph_1"),
            Entity::new("ent_far".into(), EntityType::Company, "Distant", "doc_1", "graph_1"),
        ];
        let edges = vec![Edge::new(
            "edge_1".into(),
            "ent_co",
            "ent_loan",
            EdgeType::HasLoan,
            "graph_1",
        )];
        let risk = detector.detect_rule_risks(&entities, "doc_1", "graph_1").remove(0);
        let subgraph = detector.build_risk_subgraph(&risk, &entities, &edges).await;

        assert_eq!(subgraph.entities.len(), 2);
        assert_eq!(subgraph.relationships.len(), 1);
        assert!(subgraph.reasoning.contains("Fallback"));
    }
}
