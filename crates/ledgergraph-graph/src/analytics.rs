//! Registered analytics metrics over the graph store.

use std::collections::HashMap;
use std::sync::Arc;

use ledgergraph::text::value_as_f64;
use ledgergraph_index::{EntityRecord, GraphStore};
use serde_json::{json, Map, Value};

/// Field categories used by liquidity analysis and drop-context summaries.
const RECEIVABLE_FIELDS: &[&str] = &[
    "accounts_receivable",
    "accrued_interest_receivable",
    "intergovernmental_receivable",
    "income_tax_receivable",
    "property_taxes_receivable",
    "special_assessments_receivable",
    "revenue_in_lieu_of_taxes_receivable",
    "due_from_other_governments",
    "notes_receivable",
    "loans_receivable",
];
const LIABILITY_FIELDS: &[&str] = &[
    "accounts_payable",
    "accrued_wages_and_benefits",
    "contracts_payable",
    "retainage_payable",
    "intergovernmental_payable",
    "accrued_interest_payable",
    "matured_compensated_absences_payable",
    "claims_payable",
    "due_to_other_governments",
    "unearned_revenue",
    "long_term_liabilities_due_within_one_year",
    "long_term_liabilities_due_in_more_than_one_year",
    "net_pension_liability",
    "net_opeb_liability",
    "total_liabilities",
];
const DEFERRED_INFLOW_FIELDS: &[&str] = &[
    "deferred_inflows_pension_related",
    "deferred_inflows_opeb_related",
    "deferred_inflows_property_taxes",
    "deferred_inflows_special_assessments",
    "deferred_inflows_other_amounts",
    "total_deferred_inflows_of_resources",
];

/// A registered metric: handler key, allowed entity types, defaults.
#[derive(Debug, Clone)]
pub struct MetricDefinition {
    pub name: &'static str,
    pub description: &'static str,
    pub entity_types: &'static [&'static str],
    pub default_params: Value,
}

fn registry() -> Vec<MetricDefinition> {
    vec![
        MetricDefinition {
            name: "property_threshold",
            description: "Find entities where a property meets threshold criteria",
            entity_types: &["Location", "Company", "Loan", "Invoice"],
            default_params: json!({"operator": "gt", "threshold": 0}),
        },
        MetricDefinition {
            name: "property_comparison",
            description: "Compare two properties within entities",
            entity_types: &["Location", "Company", "Loan", "Invoice"],
            default_params: json!({"comparison_type": "ratio", "threshold": 0.0}),
        },
        MetricDefinition {
            name: "grouped_aggregation",
            description: "Group entities by a field and aggregate properties",
            entity_types: &["Location", "Company", "Loan", "Invoice"],
            default_params: json!({"operation": "sum"}),
        },
        MetricDefinition {
            name: "sequential_drop",
            description: "Detect drops between consecutive entities in ordered groups",
            entity_types: &["Location", "Company"],
            default_params: json!({"drop_threshold": 0.30, "order_by": "total_assets", "group_by": "county"}),
        },
        MetricDefinition {
            name: "liquidity_analysis",
            description: "Analyze cash vs assets for liquidity concerns",
            entity_types: &["Location", "Company"],
            default_params: json!({"asset_threshold": 50_000_000.0, "cash_threshold": 3_000_000.0}),
        },
        MetricDefinition {
            name: "debt_risk",
            description: "Identify high debt-to-asset ratios",
            entity_types: &["Location", "Company"],
            default_params: json!({"debt_ratio_threshold": 0.70}),
        },
        MetricDefinition {
            name: "loan_maturity",
            description: "Find loans approaching maturity with high balances",
            entity_types: &["Loan"],
            default_params: json!({"months_threshold": 12, "balance_threshold": 1_000_000.0}),
        },
    ]
}

fn str_param<'a>(params: &'a Map<String, Value>, key: &str, default: &'a str) -> &'a str {
    params.get(key).and_then(Value::as_str).unwrap_or(default)
}

fn num_param(params: &Map<String, Value>, key: &str, default: f64) -> f64 {
    params
        .get(key)
        .and_then(value_as_f64)
        .unwrap_or(default)
}

fn compare(op: &str, value: f64, threshold: f64) -> bool {
    match op {
        "gt" => value > threshold,
        "lt" => value < threshold,
        "gte" => value >= threshold,
        "lte" => value <= threshold,
        "eq" => (value - threshold).abs() < f64::EPSILON,
        _ => false,
    }
}

fn prop(entity: &EntityRecord, key: &str) -> Option<f64> {
    entity.properties.get(key).and_then(value_as_f64)
}

fn collect_nonzero(properties: &HashMap<String, Value>, fields: &[&str]) -> Value {
    let mut out = Map::new();
    for field in fields {
        if let Some(value) = properties.get(*field).and_then(value_as_f64) {
            if value != 0.0 {
                out.insert((*field).to_string(), json!(value));
            }
        }
    }
    Value::Object(out)
}

/// A registry of named metrics with property-based handlers; entities come
/// from the graph store, falling back to an unfiltered fetch when a
/// graph-id filter matches nothing.
pub struct AnalyticsEngine {
    graph: Option<Arc<dyn GraphStore>>,
    metrics: Vec<MetricDefinition>,
}

impl AnalyticsEngine {
    #[must_use]
    pub fn new(graph: Option<Arc<dyn GraphStore>>) -> Self {
        Self {
            graph,
            metrics: registry(),
        }
    }

    /// Metric descriptors for discovery.
    #[must_use]
    pub fn list_metrics(&self) -> Vec<Value> {
        self.metrics
            .iter()
            .map(|m| {
                json!({
                    "name": m.name,
                    "description": m.description,
                    "entity_types": m.entity_types,
                    "default_params": m.default_params,
                })
            })
            .collect()
    }

    /// Dispatch a metric by name, merging defaults with caller params.
    pub async fn compute_metric(
        &self,
        metric_name: &str,
        params: &Value,
        context_graph_id: Option<&str>,
    ) -> Value {
        let Some(definition) = self.metrics.iter().find(|m| m.name == metric_name) else {
            let available: Vec<&str> = self.metrics.iter().map(|m| m.name).collect();
            return json!({
                "metric_name": metric_name,
                "error": format!("Unsupported metric '{metric_name}'. Available: {available:?}"),
                "available_metrics": available,
            });
        };
        if self.graph.is_none() {
            return json!({
                "metric_name": metric_name,
                "error": "Graph store not available for analytics",
            });
        }

        // Merge defaults with caller-supplied parameters.
        let mut merged = definition
            .default_params
            .as_object()
            .cloned()
            .unwrap_or_default();
        if let Some(overrides) = params.as_object() {
            for (key, value) in overrides {
                merged.insert(key.clone(), value.clone());
            }
        }
        let graph_id = merged
            .get("graph_id")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .or_else(|| context_graph_id.map(ToString::to_string));

        let result = match metric_name {
            "property_threshold" => self.property_threshold(&merged, graph_id.as_deref()).await,
            "property_comparison" => self.property_comparison(&merged, graph_id.as_deref()).await,
            "grouped_aggregation" => self.grouped_aggregation(&merged, graph_id.as_deref()).await,
            "sequential_drop" => self.sequential_drop(&merged, graph_id.as_deref()).await,
            "liquidity_analysis" => self.liquidity_analysis(&merged, graph_id.as_deref()).await,
            "debt_risk" => self.debt_risk(&merged, graph_id.as_deref()).await,
            "loan_maturity" => self.loan_maturity(&merged, graph_id.as_deref()).await,
            _ => json!({"error": "unreachable metric"}),
        };
        result
    }

    async fn fetch(
        &self,
        entity_type: &str,
        graph_id: Option<&str>,
        limit: usize,
    ) -> Vec<EntityRecord> {
        let Some(graph) = &self.graph else {
            return Vec::new();
        };
        match graph.entities_by_type(entity_type, graph_id, limit).await {
            Ok(records) => {
                tracing::info!(
                    entity_type,
                    count = records.len(),
                    "analytics loaded entities"
                );
                records
            }
            Err(err) => {
                tracing::error!(error = %err, "analytics entity fetch failed");
                Vec::new()
            }
        }
    }

    fn empty_result(metric: &str, entity_type: &str, extra: Map<String, Value>) -> Value {
        let mut out = Map::new();
        out.insert("metric_name".into(), json!(metric));
        out.insert("entity_type".into(), json!(entity_type));
        out.insert("results".into(), json!([]));
        out.insert("count".into(), json!(0));
        out.insert(
            "message".into(),
            json!(format!(
                "No {entity_type} entities found. Please upload and index documents first."
            )),
        );
        for (k, v) in extra {
            out.insert(k, v);
        }
        Value::Object(out)
    }

    async fn property_threshold(&self, params: &Map<String, Value>, graph_id: Option<&str>) -> Value {
        let entity_type = str_param(params, "entity_type", "Location");
        let Some(property_name) = params.get("property_name").and_then(Value::as_str) else {
            return json!({"error": "property_name is required"});
        };
        let threshold = num_param(params, "threshold", 0.0);
        let operator = str_param(params, "operator", "gt");
        let limit = num_param(params, "limit", 100.0) as usize;

        let entities = self.fetch(entity_type, graph_id, limit).await;
        if entities.is_empty() {
            return Self::empty_result("property_threshold", entity_type, Map::new());
        }

        let matches: Vec<Value> = entities
            .iter()
            .filter_map(|entity| {
                let value = prop(entity, property_name)?;
                compare(operator, value, threshold).then(|| {
                    json!({
                        "id": entity.id,
                        "name": entity.name,
                        "type": entity.entity_type,
                        property_name: value,
                        "properties": entity.properties,
                    })
                })
            })
            .collect();

        json!({
            "metric_name": "property_threshold",
            "entity_type": entity_type,
            "property_name": property_name,
            "operator": operator,
            "threshold": threshold,
            "count": matches.len(),
            "results": matches,
        })
    }

    async fn property_comparison(&self, params: &Map<String, Value>, graph_id: Option<&str>) -> Value {
        let entity_type = str_param(params, "entity_type", "Location");
        let (Some(property_a), Some(property_b)) = (
            params.get("property_a").and_then(Value::as_str),
            params.get("property_b").and_then(Value::as_str),
        ) else {
            return json!({"error": "property_a and property_b are required"});
        };
        let comparison_type = str_param(params, "comparison_type", "ratio");
        let threshold = num_param(params, "threshold", 0.0);
        let operator = str_param(params, "operator", "gt");
        let limit = num_param(params, "limit", 100.0) as usize;

        let entities = self.fetch(entity_type, graph_id, limit).await;
        let matches: Vec<Value> = entities
            .iter()
            .filter_map(|entity| {
                let a = prop(entity, property_a)?;
                let b = prop(entity, property_b)?;
                let result = match comparison_type {
                    "ratio" if b != 0.0 => a / b,
                    "diff" => a - b,
                    "pct" if b != 0.0 => (a - b) / b * 100.0,
                    _ => return None,
                };
                compare(operator, result, threshold).then(|| {
                    json!({
                        "id": entity.id,
                        "name": entity.name,
                        property_a: a,
                        property_b: b,
                        "comparison_result": result,
                        "properties": entity.properties,
                    })
                })
            })
            .collect();

        json!({
            "metric_name": "property_comparison",
            "entity_type": entity_type,
            "comparison": format!("{property_a} {comparison_type} {property_b}"),
            "threshold": threshold,
            "count": matches.len(),
            "results": matches,
        })
    }

    async fn grouped_aggregation(&self, params: &Map<String, Value>, graph_id: Option<&str>) -> Value {
        let entity_type = str_param(params, "entity_type", "Location");
        let group_by = str_param(params, "group_by", "county");
        let aggregate_property = str_param(params, "aggregate_property", "total_assets");
        let operation = str_param(params, "operation", "sum");
        let limit = num_param(params, "limit", 1000.0) as usize;

        let entities = self.fetch(entity_type, graph_id, limit).await;
        let mut groups: HashMap<String, Vec<&EntityRecord>> = HashMap::new();
        for entity in &entities {
            let Some(group) = entity.properties.get(group_by).and_then(Value::as_str) else {
                continue;
            };
            if group.is_empty() {
                continue;
            }
            groups.entry(group.to_string()).or_default().push(entity);
        }

        let mut results: Vec<Value> = groups
            .into_iter()
            .filter_map(|(group, members)| {
                let values: Vec<f64> = members
                    .iter()
                    .filter_map(|e| prop(e, aggregate_property))
                    .collect();
                if values.is_empty() {
                    return None;
                }
                let aggregate = match operation {
                    "avg" => values.iter().sum::<f64>() / values.len() as f64,
                    "max" => values.iter().copied().fold(f64::MIN, f64::max),
                    "min" => values.iter().copied().fold(f64::MAX, f64::min),
                    "count" => values.len() as f64,
                    _ => values.iter().sum(),
                };
                Some(json!({
                    "group": group,
                    "count": members.len(),
                    "aggregate_value": aggregate,
                    "entities": members.iter().map(|e| json!({"id": e.id, "name": e.name})).collect::<Vec<_>>(),
                }))
            })
            .collect();
        results.sort_by(|a, b| {
            let av = a["aggregate_value"].as_f64().unwrap_or(0.0);
            let bv = b["aggregate_value"].as_f64().unwrap_or(0.0);
            bv.partial_cmp(&av).unwrap_or(std::cmp::Ordering::Equal)
        });

        json!({
            "metric_name": "grouped_aggregation",
            "entity_type": entity_type,
            "group_by": group_by,
            "aggregate_property": aggregate_property,
            "operation": operation,
            "count": results.len(),
            "results": results,
        })
    }

    async fn sequential_drop(&self, params: &Map<String, Value>, graph_id: Option<&str>) -> Value {
        let entity_type = str_param(params, "entity_type", "Location");
        let group_by = str_param(params, "group_by", "county");
        let order_by = str_param(params, "order_by", "total_assets");
        let drop_threshold = num_param(params, "drop_threshold", 0.30);
        let limit = num_param(params, "limit", 1000.0) as usize;

        let entities = self.fetch(entity_type, graph_id, limit).await;
        if entities.is_empty() {
            let mut extra = Map::new();
            extra.insert("group_by".into(), json!(group_by));
            extra.insert("order_by".into(), json!(order_by));
            extra.insert("drop_threshold".into(), json!(drop_threshold));
            return Self::empty_result("sequential_drop", entity_type, extra);
        }

        let mut groups: HashMap<String, Vec<&EntityRecord>> = HashMap::new();
        for entity in &entities {
            let Some(group) = entity.properties.get(group_by).and_then(Value::as_str) else {
                continue;
            };
            groups.entry(group.to_string()).or_default().push(entity);
        }

        let mut results = Vec::new();
        for (group, members) in groups {
            let mut ordered: Vec<(&EntityRecord, f64)> = members
                .iter()
                .filter_map(|e| prop(e, order_by).map(|v| (*e, v)))
                .collect();
            if ordered.len() < 2 {
                continue;
            }
            ordered.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

            let mut drops = Vec::new();
            for pair in ordered.windows(2) {
                let (first, first_value) = (&pair[0].0, pair[0].1);
                let (second, second_value) = (&pair[1].0, pair[1].1);
                if first_value <= 0.0 {
                    continue;
                }
                let drop = first_value - second_value;
                if drop <= 0.0 {
                    continue;
                }
                let drop_ratio = drop / first_value;
                if drop_ratio >= drop_threshold {
                    drops.push(json!({
                        "from_entity": first.name,
                        "to_entity": second.name,
                        "from_value": first_value,
                        "to_value": second_value,
                        "drop_amount": drop,
                        "drop_ratio": drop_ratio,
                    }));
                }
            }

            if !drops.is_empty() {
                let ordered_entities: Vec<Value> = ordered
                    .iter()
                    .map(|(e, v)| {
                        json!({
                            "id": e.id,
                            "name": e.name,
                            order_by: v,
                            "receivables": collect_nonzero(&e.properties, RECEIVABLE_FIELDS),
                            "liabilities": collect_nonzero(&e.properties, LIABILITY_FIELDS),
                        })
                    })
                    .collect();
                results.push(json!({
                    "group": group,
                    "ordered_entities": ordered_entities,
                    "drops": drops,
                }));
            }
        }

        json!({
            "metric_name": "sequential_drop",
            "entity_type": entity_type,
            "group_by": group_by,
            "order_by": order_by,
            "drop_threshold": drop_threshold,
            "count": results.len(),
            "results": results,
        })
    }

    async fn liquidity_analysis(&self, params: &Map<String, Value>, graph_id: Option<&str>) -> Value {
        let entity_type = str_param(params, "entity_type", "Location");
        let asset_threshold = num_param(params, "asset_threshold", 50_000_000.0);
        let cash_threshold = num_param(params, "cash_threshold", 3_000_000.0);

        let entities = self.fetch(entity_type, graph_id, 1000).await;
        let mut matches: Vec<Value> = entities
            .iter()
            .filter_map(|entity| {
                let total_assets = prop(entity, "total_assets")?;
                let cash = prop(entity, "cash_and_cash_equivalents")
                    .or_else(|| prop(entity, "cash"))?;
                // Asset rich, cash poor.
                if total_assets <= asset_threshold || cash >= cash_threshold {
                    return None;
                }
                let liquidity_ratio = if total_assets > 0.0 { cash / total_assets } else { 0.0 };
                Some(json!({
                    "id": entity.id,
                    "name": entity.name,
                    "type": entity.entity_type,
                    "total_assets": total_assets,
                    "cash": cash,
                    "liquidity_ratio": liquidity_ratio,
                    "long_term_liabilities": collect_nonzero(&entity.properties, LIABILITY_FIELDS),
                    "deferred_inflows": collect_nonzero(&entity.properties, DEFERRED_INFLOW_FIELDS),
                    "risk_level": if liquidity_ratio < 0.02 { "high" } else { "medium" },
                }))
            })
            .collect();
        matches.sort_by(|a, b| {
            let av = a["total_assets"].as_f64().unwrap_or(0.0);
            let bv = b["total_assets"].as_f64().unwrap_or(0.0);
            bv.partial_cmp(&av).unwrap_or(std::cmp::Ordering::Equal)
        });

        json!({
            "metric_name": "liquidity_analysis",
            "entity_type": entity_type,
            "asset_threshold": asset_threshold,
            "cash_threshold": cash_threshold,
            "count": matches.len(),
            "results": matches,
        })
    }

    async fn debt_risk(&self, params: &Map<String, Value>, graph_id: Option<&str>) -> Value {
        let entity_type = str_param(params, "entity_type", "Location");
        let ratio_threshold = num_param(params, "debt_ratio_threshold", 0.70);

        let entities = self.fetch(entity_type, graph_id, 1000).await;
        let mut matches: Vec<Value> = entities
            .iter()
            .filter_map(|entity| {
                let total_assets = prop(entity, "total_assets")?;
                let total_liabilities = prop(entity, "total_liabilities")?;
                if total_assets == 0.0 {
                    return None;
                }
                let debt_ratio = total_liabilities / total_assets;
                (debt_ratio >= ratio_threshold).then(|| {
                    json!({
                        "id": entity.id,
                        "name": entity.name,
                        "type": entity.entity_type,
                        "total_assets": total_assets,
                        "total_liabilities": total_liabilities,
                        "debt_ratio": debt_ratio,
                        "risk_level": if debt_ratio > 0.90 { "critical" } else { "high" },
                    })
                })
            })
            .collect();
        matches.sort_by(|a, b| {
            let av = a["debt_ratio"].as_f64().unwrap_or(0.0);
            let bv = b["debt_ratio"].as_f64().unwrap_or(0.0);
            bv.partial_cmp(&av).unwrap_or(std::cmp::Ordering::Equal)
        });

        json!({
            "metric_name": "debt_risk",
            "entity_type": entity_type,
            "debt_ratio_threshold": ratio_threshold,
            "count": matches.len(),
            "results": matches,
        })
    }

    async fn loan_maturity(&self, params: &Map<String, Value>, graph_id: Option<&str>) -> Value {
        let months_threshold = num_param(params, "months_threshold", 12.0);
        let balance_threshold = num_param(params, "balance_threshold", 1_000_000.0);

        let loans = self.fetch("Loan", graph_id, 1000).await;
        let mut matches: Vec<Value> = loans
            .iter()
            .filter_map(|loan| {
                let balance = prop(loan, "principal_balance")
                    .or_else(|| prop(loan, "outstanding_balance"))
                    .or_else(|| prop(loan, "balance"))?;
                let maturity_months = prop(loan, "maturity_months")?;
                (balance >= balance_threshold && maturity_months <= months_threshold).then(|| {
                    json!({
                        "id": loan.id,
                        "name": loan.name,
                        "balance": balance,
                        "maturity_months": maturity_months,
                        "interest_rate": prop(loan, "interest_rate"),
                        "borrower": loan.properties.get("borrower"),
                        "lender": loan.properties.get("lender"),
                    })
                })
            })
            .collect();
        matches.sort_by(|a, b| {
            let am = a["maturity_months"].as_f64().unwrap_or(0.0);
            let bm = b["maturity_months"].as_f64().unwrap_or(0.0);
            am.partial_cmp(&bm)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    let ab = a["balance"].as_f64().unwrap_or(0.0);
                    let bb = b["balance"].as_f64().unwrap_or(0.0);
                    bb.partial_cmp(&ab).unwrap_or(std::cmp::Ordering::Equal)
                })
        });

        json!({
            "metric_name": "loan_maturity",
            "months_threshold": months_threshold,
            "balance_threshold": balance_threshold,
            "count": matches.len(),
            "results": matches,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ledgergraph::models::{Edge, Entity};
    use ledgergraph::Result;
    use ledgergraph_index::{ConnectedEntity, GraphPath, PatternMatch, TraverseDirection};

    struct FakeGraphStore {
        records: Vec<EntityRecord>,
    }

    #[async_trait]
    impl GraphStore for FakeGraphStore {
        async fn upsert_entities(&self, _entities: &[Entity]) -> Result<usize> {
            Ok(0)
        }
        async fn create_edges(&self, _edges: &[Edge]) -> Result<usize> {
            Ok(0)
        }
        async fn entities_by_type(
            &self,
            entity_type: &str,
            _graph_id: Option<&str>,
            _limit: usize,
        ) -> Result<Vec<EntityRecord>> {
            Ok(self
                .records
                .iter()
                .filter(|r| r.entity_type == entity_type)
                .cloned()
                .collect())
        }
        async fn entities_filtered(
            &self,
            _entity_types: &[String],
            _graph_id: Option<&str>,
            _limit: usize,
        ) -> Result<Vec<EntityRecord>> {
            Ok(self.records.clone())
        }
        async fn entity_exists(&self, _name: &str) -> Result<bool> {
            Ok(false)
        }
        async fn traverse(
            &self,
            _entity_name: &str,
            _relationship_type: Option<&str>,
            _direction: TraverseDirection,
            _depth: u32,
        ) -> Result<Vec<ConnectedEntity>> {
            Ok(Vec::new())
        }
        async fn shortest_path(
            &self,
            _from: &str,
            _to: &str,
            _max_depth: u32,
        ) -> Result<Option<GraphPath>> {
            Ok(None)
        }
        async fn entities_with_min_connections(
            &self,
            _entity_type: Option<&str>,
            _min_connections: i64,
        ) -> Result<Vec<PatternMatch>> {
            Ok(Vec::new())
        }
        async fn sample_property_keys(&self, _graph_id: &str, _limit: usize) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    fn location(id: &str, name: &str, props: Value) -> EntityRecord {
        EntityRecord {
            id: id.into(),
            name: name.into(),
            entity_type: "Location".into(),
            properties: props
                .as_object()
                .map(|m| m.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default(),
            graph_id: Some("graph_1".into()),
        }
    }

    fn engine(records: Vec<EntityRecord>) -> AnalyticsEngine {
        AnalyticsEngine::new(Some(Arc::new(FakeGraphStore { records })))
    }

    #[tokio::test]
    async fn property_threshold_filters_with_operator() {
        let engine = engine(vec![
            location("ent_a", "Akron", json!({"accounts_payable": 600_000})),
            location("ent_b", "Canton", json!({"accounts_payable": 100_000})),
            location("ent_c", "Hudson", json!({"accounts_payable": "750,000"})),
        ]);
        let result = engine
            .compute_metric(
                "property_threshold",
                &json!({"entity_type": "Location", "property_name": "accounts_payable",
                        "operator": "gt", "threshold": 500_000}),
                Some("graph_1"),
            )
            .await;

        assert_eq!(result["count"], 2);
        let names: Vec<&str> = result["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"Akron"));
        assert!(names.contains(&"Hudson"));
    }

    #[tokio::test]
    async fn grouped_aggregation_sums_by_group() {
        let engine = engine(vec![
            location("ent_a", "Akron", json!({"county": "Summit", "total_assets": 100.0})),
            location("ent_b", "Hudson", json!({"county": "Summit", "total_assets": 50.0})),
            location("ent_c", "Canton", json!({"county": "Stark", "total_assets": 30.0})),
        ]);
        let result = engine
            .compute_metric("grouped_aggregation", &json!({"aggregate_property": "total_assets"}), None)
            .await;

        assert_eq!(result["count"], 2);
        let top = &result["results"][0];
        assert_eq!(top["group"], "Summit");
        assert_eq!(top["aggregate_value"], 150.0);
    }

    #[tokio::test]
    async fn sequential_drop_detects_adjacent_drops() {
        let engine = engine(vec![
            location("ent_a", "Akron", json!({"county": "Summit", "total_assets": 1000.0})),
            location("ent_b", "Hudson", json!({"county": "Summit", "total_assets": 400.0})),
            location("ent_c", "Stow", json!({"county": "Summit", "total_assets": 380.0})),
        ]);
        let result = engine
            .compute_metric("sequential_drop", &json!({}), None)
            .await;

        assert_eq!(result["count"], 1);
        let drops = result["results"][0]["drops"].as_array().unwrap();
        assert_eq!(drops.len(), 1);
        assert_eq!(drops[0]["from_entity"], "Akron");
        assert_eq!(drops[0]["to_entity"], "Hudson");
        assert!(drops[0]["drop_ratio"].as_f64().unwrap() >= 0.30);
    }

    #[tokio::test]
    async fn liquidity_analysis_flags_asset_rich_cash_poor() {
        let engine = engine(vec![
            location(
                "ent_a",
                "Akron",
                json!({"total_assets": 80_000_000.0, "cash_and_cash_equivalents": 1_000_000.0,
                       "total_liabilities": 10_000_000.0}),
            ),
            location(
                "ent_b",
                "Hudson",
                json!({"total_assets": 90_000_000.0, "cash_and_cash_equivalents": 9_000_000.0}),
            ),
        ]);
        let result = engine
            .compute_metric("liquidity_analysis", &json!({}), None)
            .await;

        assert_eq!(result["count"], 1);
        let hit = &result["results"][0];
        assert_eq!(hit["name"], "Akron");
        assert_eq!(hit["risk_level"], "high");
    }

    #[tokio::test]
    async fn unknown_metric_reports_available_set() {
        let engine = engine(Vec::new());
        let result = engine.compute_metric("not_a_metric", &json!({}), None).await;
        assert!(result["error"].as_str().unwrap().contains("Unsupported metric"));
        assert!(result["available_metrics"].as_array().unwrap().len() >= 7);
    }

    #[tokio::test]
    async fn missing_store_reports_unavailable() {
        let engine = AnalyticsEngine::new(None);
        let result = engine
            .compute_metric("property_threshold", &json!({"property_name": "x"}), None)
            .await;
        assert!(result["error"].as_str().unwrap().contains("not available"));
    }

    #[tokio::test]
    async fn empty_results_carry_a_message() {
        let engine = engine(Vec::new());
        let result = engine
            .compute_metric(
                "property_threshold",
                &json!({"property_name": "total_assets"}),
                None,
            )
            .await;
        assert_eq!(result["count"], 0);
        assert!(result["message"].as_str().unwrap().contains("No Location"));
    }
}
