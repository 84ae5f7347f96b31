//! The closed tool surface exposed to the model.

use ledgergraph_bedrock::ToolDefinition;
use serde_json::json;

/// Tool names as a closed set; dispatch is a match, not reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    GraphQuery,
    DocLookup,
    DocumentSearch,
    MetricCompute,
    GraphTraverse,
    GraphPath,
    GraphPattern,
}

impl ToolName {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "graph_query" => Some(Self::GraphQuery),
            "doc_lookup" => Some(Self::DocLookup),
            "document_search" => Some(Self::DocumentSearch),
            "metric_compute" => Some(Self::MetricCompute),
            "graph_traverse" => Some(Self::GraphTraverse),
            "graph_path" => Some(Self::GraphPath),
            "graph_pattern" => Some(Self::GraphPattern),
            _ => None,
        }
    }
}

/// The seven tool definitions, with their input schemas.
#[must_use]
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: "graph_query".into(),
            description: "Query the knowledge graph for specific entities (companies, loans, metrics, cities, locations). Use for structured entity lookup with optional property filters.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query_text": {
                        "type": "string",
                        "description": "Natural language description of what to search for (e.g., 'cities with accounts payable over 500000')"
                    },
                    "entity_types": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Filter by entity types: Company, Loan, Location, City, Metric, Invoice, Person, Vendor, etc."
                    },
                    "property_filters": {
                        "type": "object",
                        "description": "Filter entities by property values. Example: {\"accounts_payable\": {\"$gt\": 500000}}",
                        "properties": {}
                    },
                    "limit": {
                        "type": "integer",
                        "description": "Maximum number of results",
                        "default": 50
                    }
                },
                "required": ["query_text"]
            }),
        },
        ToolDefinition {
            name: "doc_lookup".into(),
            description: "Retrieve source document evidence for a specific page or section".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "document_id": {"type": "string", "description": "Document identifier"},
                    "page": {"type": "integer", "description": "Page number to retrieve"}
                },
                "required": ["document_id"]
            }),
        },
        ToolDefinition {
            name: "document_search".into(),
            description: "Search full document text for concepts, phrases, or topics not captured in entities. Use for questions about document content, context, or passages.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "What to search for in document text"},
                    "limit": {"type": "integer", "description": "Maximum number of chunks to return", "default": 5}
                },
                "required": ["query"]
            }),
        },
        ToolDefinition {
            name: "metric_compute".into(),
            description: "Compute advanced analytics: comparisons, aggregations, thresholds, financial health checks. Supports Location, Company, Loan, Invoice entities.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "metric_name": {
                        "type": "string",
                        "description": "Metric to compute: property_threshold, property_comparison, grouped_aggregation, sequential_drop, liquidity_analysis, debt_risk, loan_maturity"
                    },
                    "params": {
                        "type": "object",
                        "description": "Metric parameters (entity_type, property names, thresholds, operators, group_by, etc.)",
                        "default": {}
                    }
                },
                "required": ["metric_name"]
            }),
        },
        ToolDefinition {
            name: "graph_traverse".into(),
            description: "Traverse the knowledge graph to find relationships. Use for questions about connections, ownership, subsidiaries, or related entities.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "entity_name": {"type": "string", "description": "Starting entity name"},
                    "relationship_type": {
                        "type": "string",
                        "description": "Type of relationship to follow: OWNS, HAS_LOAN, LOCATED_IN, SUBSIDIARY_OF, WORKS_FOR, SUPPLIES_TO, RELATED_TO, or 'any' for all types",
                        "default": "any"
                    },
                    "direction": {
                        "type": "string",
                        "enum": ["outgoing", "incoming", "both"],
                        "default": "both"
                    },
                    "depth": {"type": "integer", "default": 1, "minimum": 1, "maximum": 3}
                },
                "required": ["entity_name"]
            }),
        },
        ToolDefinition {
            name: "graph_path".into(),
            description: "Find shortest path between two entities in the graph. Use for 'how are X and Y connected?' questions.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "from_entity": {"type": "string", "description": "Starting entity name"},
                    "to_entity": {"type": "string", "description": "Target entity name"},
                    "max_depth": {"type": "integer", "description": "Maximum path length to search", "default": 5}
                },
                "required": ["from_entity", "to_entity"]
            }),
        },
        ToolDefinition {
            name: "graph_pattern".into(),
            description: "Find entities matching a specific graph pattern. Use for complex queries like 'companies with multiple loans'.".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "pattern_description": {"type": "string", "description": "Natural language description of the pattern to find"},
                    "entity_type": {"type": "string", "description": "Type of entity to return (Company, Loan, Location, etc.)"},
                    "min_connections": {"type": "integer", "description": "Minimum number of relationships", "default": 1}
                },
                "required": ["pattern_description"]
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_seven_tools_are_defined_and_parseable() {
        let tools = tool_definitions();
        assert_eq!(tools.len(), 7);
        for tool in &tools {
            assert!(ToolName::parse(&tool.name).is_some(), "unparseable: {}", tool.name);
            assert_eq!(tool.input_schema["type"], "object");
        }
        assert!(ToolName::parse("made_up_tool").is_none());
    }
}
