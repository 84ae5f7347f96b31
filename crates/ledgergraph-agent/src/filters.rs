//! Property filter evaluation and property-name normalization.

use std::collections::{HashMap, HashSet};

use ledgergraph::text::value_as_f64;
use serde_json::{Map, Value};

/// Evaluate `$gt`/`$lt`/`$gte`/`$lte`/`$eq` filters (or bare equality)
/// against entity property maps.
#[must_use]
pub fn filter_by_properties(entities: Vec<Value>, filters: &Map<String, Value>) -> Vec<Value> {
    if filters.is_empty() {
        return entities;
    }
    entities
        .into_iter()
        .filter(|entity| {
            let properties = entity.get("properties");
            filters.iter().all(|(name, condition)| {
                let Some(value) = properties.and_then(|p| p.get(name)) else {
                    return false;
                };
                matches_condition(value, condition)
            })
        })
        .collect()
}

fn matches_condition(value: &Value, condition: &Value) -> bool {
    match condition {
        Value::Object(operators) => {
            let Some(actual) = value_as_f64(value) else {
                // Non-numeric values only support $eq string comparison.
                return operators
                    .get("$eq")
                    .is_some_and(|expected| as_comparable_string(value) == as_comparable_string(expected));
            };
            operators.iter().all(|(op, operand)| {
                let Some(expected) = value_as_f64(operand) else {
                    return false;
                };
                match op.as_str() {
                    "$gt" => actual > expected,
                    "$lt" => actual < expected,
                    "$gte" => actual >= expected,
                    "$lte" => actual <= expected,
                    "$eq" => (actual - expected).abs() < f64::EPSILON,
                    _ => false,
                }
            })
        }
        expected => match (value_as_f64(value), value_as_f64(expected)) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => as_comparable_string(value) == as_comparable_string(expected),
        },
    }
}

fn as_comparable_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn normalize_key(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_lowercase()
}

/// Map user-supplied field names onto actual property keys through a fuzzy
/// lookup built from property keys already in context, so "cash balance"
/// matches `cash_and_cash_equivalents`.
#[must_use]
pub fn normalize_property_filters(
    filters: &Map<String, Value>,
    available_properties: &HashSet<String>,
) -> Map<String, Value> {
    if filters.is_empty() {
        return Map::new();
    }

    let mut lookup: HashMap<String, String> = HashMap::new();
    for property in available_properties {
        let normalized = normalize_key(property);
        if normalized.is_empty() {
            continue;
        }
        lookup.entry(normalized.clone()).or_insert_with(|| property.clone());
        lookup
            .entry(normalized.replace("and", ""))
            .or_insert_with(|| property.clone());
        let words: Vec<&str> = property.split('_').filter(|w| !w.is_empty()).collect();
        if words.len() > 1 {
            if let Some(first) = words.first() {
                lookup
                    .entry(normalize_key(first))
                    .or_insert_with(|| property.clone());
            }
            if let Some(last) = words.last() {
                lookup
                    .entry(normalize_key(last))
                    .or_insert_with(|| property.clone());
            }
        }
    }

    let mut normalized = Map::new();
    for (key, value) in filters {
        let candidate = normalize_key(key);
        let canonical = lookup
            .get(&candidate)
            .cloned()
            .or_else(|| {
                // Fuzzy fallback: the longest lookup key related to the
                // candidate by containment in either direction, so
                // "cashbalance" still resolves through "cash".
                lookup
                    .iter()
                    .filter(|(norm, _)| {
                        !candidate.is_empty()
                            && !norm.is_empty()
                            && (norm.contains(&candidate) || candidate.contains(norm.as_str()))
                    })
                    .max_by_key(|(norm, _)| norm.len())
                    .map(|(_, property)| property.clone())
            })
            .unwrap_or_else(|| key.clone());
        normalized.insert(canonical, value.clone());
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entity(name: &str, props: Value) -> Value {
        json!({"id": name, "name": name, "properties": props})
    }

    #[test]
    fn operator_filters_apply_numerically() {
        let entities = vec![
            entity("Akron", json!({"accounts_payable": 600_000})),
            entity("Canton", json!({"accounts_payable": "100,000"})),
            entity("Hudson", json!({"other": 1})),
        ];
        let filters = json!({"accounts_payable": {"$gt": 500_000}});
        let kept = filter_by_properties(entities, filters.as_object().unwrap());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0]["name"], "Akron");
    }

    #[test]
    fn bare_values_compare_for_equality() {
        let entities = vec![
            entity("Akron", json!({"county": "Summit"})),
            entity("Canton", json!({"county": "Stark"})),
        ];
        let filters = json!({"county": "Summit"});
        let kept = filter_by_properties(entities, filters.as_object().unwrap());
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0]["name"], "Akron");
    }

    #[test]
    fn friendly_names_normalize_to_real_keys() {
        let available: HashSet<String> = ["cash_and_cash_equivalents", "accounts_payable", "total_assets"]
            .iter()
            .map(|s| (*s).to_string())
            .collect();
        let filters = json!({"cash balance": {"$gt": 1000}, "accounts payable": {"$lt": 5}});
        let normalized = normalize_property_filters(filters.as_object().unwrap(), &available);

        assert!(normalized.contains_key("cash_and_cash_equivalents"));
        assert!(normalized.contains_key("accounts_payable"));
    }

    #[test]
    fn unknown_names_pass_through() {
        let available = HashSet::new();
        let filters = json!({"mystery_field": 1});
        let normalized = normalize_property_filters(filters.as_object().unwrap(), &available);
        assert!(normalized.contains_key("mystery_field"));
    }
}
