//! Deterministic loan agreement parsing: terms, parties, covenants, fees.

use std::collections::HashMap;
use std::sync::LazyLock;

use ledgergraph::ids;
use ledgergraph::models::{Citation, Entity, EntityType};
use ledgergraph::text::strip_html;
use regex::Regex;
use serde_json::{json, Value};

static LOAN_NUMBER_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)loan\s*#:?\s*([A-Z0-9\-]+)",
        r"(?i)loan\s+number:?\s*([A-Z0-9\-]+)",
        r"(?i)facility\s+number:?\s*([A-Z0-9\-]+)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static PRINCIPAL_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)principal\s+amount:?\s*\$?\s*([\d,]+\.?\d{0,2})",
        r"(?i)loan\s+amount:?\s*\$?\s*([\d,]+\.?\d{0,2})",
        r"(?i)(?:sum|amount)\s+of\s+\$?\s*([\d,]+\.?\d{0,2})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static RATE_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)interest\s+rate:?\s*([\d\.]+)\s*%",
        r"(?i)at\s+(?:a\s+rate\s+of\s+)?([\d\.]+)\s*%",
        r"(?i)apr:?\s*([\d\.]+)\s*%",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static TERM_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)term\s+of\s+(\d+)\s+(year|month)s?").expect("valid regex")
});
static ORIGINATION_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)dated\s+(?:as\s+of\s+)?(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})",
        r"(?i)origination\s+date:?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})",
        r"(?i)effective\s+date:?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static MATURITY_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)maturity\s+date:?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})",
        r"(?i)due\s+(?:on|date):?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})",
        r"(?i)final\s+payment\s+date:?\s*(\d{1,2}[/-]\d{1,2}[/-]\d{2,4})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});
static LENDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)lender:?\s*([^\n]+)").expect("valid regex"));
static BORROWER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)borrower:?\s*([^\n]+)").expect("valid regex"));
static COLLATERAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:secured\s+by|collateral|security):?\s*([^\.\n]+)").expect("valid regex")
});
static MAINTAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:borrower|company)\s+shall\s+(?:maintain|not\s+exceed)\s+([^\.]+)\.")
        .expect("valid regex")
});

/// Named covenant ratio patterns.
static COVENANT_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)debt[- ]to[- ]equity\s+ratio[^\d]*([\d\.]+)", "debt_to_equity_ratio"),
        (
            r"(?i)minimum\s+(?:net\s+)?(?:working\s+)?capital[^\d]*\$?\s*([\d,]+)",
            "minimum_capital",
        ),
        (
            r"(?i)debt\s+service\s+coverage\s+ratio[^\d]*([\d\.]+)",
            "debt_service_coverage",
        ),
        (r"(?i)leverage\s+ratio[^\d]*([\d\.]+)", "leverage_ratio"),
        (r"(?i)interest\s+coverage\s+ratio[^\d]*([\d\.]+)", "interest_coverage"),
    ]
    .iter()
    .map(|(p, name)| (Regex::new(p).expect("valid regex"), *name))
    .collect()
});

static FEE_PATTERNS: LazyLock<Vec<(Regex, &'static str, bool)>> = LazyLock::new(|| {
    [
        (r"(?i)origination\s+fee:?\s*\$?\s*([\d,]+\.?\d{0,2})", "origination_fee", false),
        (r"(?i)processing\s+fee:?\s*\$?\s*([\d,]+\.?\d{0,2})", "processing_fee", false),
        (
            r"(?i)late\s+(?:payment\s+)?fee:?\s*\$?\s*([\d,]+\.?\d{0,2})",
            "late_fee",
            false,
        ),
        (
            r"(?i)prepayment\s+penalty:?\s*\$?\s*([\d,]+\.?\d{0,2})",
            "prepayment_penalty",
            false,
        ),
        (r"(?i)commitment\s+fee:?\s*([\d\.]+)\s*%", "commitment_fee", true),
    ]
    .iter()
    .map(|(p, name, pct)| (Regex::new(p).expect("valid regex"), *name, *pct))
    .collect()
});

const LOAN_TYPES: &[&str] = &[
    "term loan",
    "revolving credit",
    "line of credit",
    "mortgage",
    "bridge loan",
];

fn capture(res: &[Regex], text: &str) -> Option<String> {
    res.iter()
        .find_map(|re| re.captures(text))
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
}

fn title_case(slug: &str) -> String {
    slug.split('_')
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

/// Extract the loan instrument, lender, borrower, covenants and fees.
#[must_use]
pub fn extract_entities(markdown: &str, document_id: &str, graph_id: &str) -> Vec<Entity> {
    let text = strip_html(markdown);
    let lower = text.to_lowercase();
    let mut entities = Vec::new();

    let loan_number = capture(&LOAN_NUMBER_RES, &text);
    let borrower_name = BORROWER_RE
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string());
    let lender_name = LENDER_RE
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string());

    let mut properties: HashMap<String, Value> = HashMap::new();
    properties.insert("loan_number".into(), json!(loan_number));
    properties.insert(
        "loan_type".into(),
        json!(LOAN_TYPES.iter().find(|t| lower.contains(**t))),
    );
    properties.insert(
        "principal_amount".into(),
        json!(capture(&PRINCIPAL_RES, &text).and_then(|v| v.replace(',', "").parse::<f64>().ok())),
    );
    properties.insert("currency".into(), json!("USD"));
    // Rates are reported as percentages; store the fraction so rule
    // thresholds compare directly.
    properties.insert(
        "interest_rate".into(),
        json!(capture(&RATE_RES, &text).and_then(|v| v.parse::<f64>().ok())),
    );
    properties.insert(
        "rate".into(),
        json!(capture(&RATE_RES, &text)
            .and_then(|v| v.parse::<f64>().ok())
            .map(|pct| pct / 100.0)),
    );
    properties.insert(
        "rate_type".into(),
        json!(if lower.contains("fixed rate") || lower.contains("fixed interest") {
            Some("fixed")
        } else if lower.contains("variable rate")
            || lower.contains("adjustable")
            || lower.contains("floating")
        {
            Some("variable")
        } else {
            None
        }),
    );
    if let Some(captures) = TERM_RE.captures(&text) {
        let amount: i64 = captures
            .get(1)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(0);
        let unit = captures.get(2).map(|m| m.as_str().to_lowercase());
        let months = if unit.as_deref() == Some("year") {
            amount * 12
        } else {
            amount
        };
        properties.insert("term_months".into(), json!(months));
    }
    properties.insert(
        "origination_date".into(),
        json!(capture(&ORIGINATION_RES, &text)),
    );
    properties.insert("maturity_date".into(), json!(capture(&MATURITY_RES, &text)));
    properties.insert("lender".into(), json!(lender_name));
    properties.insert(
        "collateral".into(),
        json!(COLLATERAL_RE
            .captures(&text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().trim())),
    );
    if lower.contains("monthly") {
        properties.insert("payment_frequency".into(), json!("monthly"));
    } else if lower.contains("quarterly") {
        properties.insert("payment_frequency".into(), json!("quarterly"));
    } else if lower.contains("annually") {
        properties.insert("payment_frequency".into(), json!("annually"));
    }

    let loan_name = format!(
        "Loan {}",
        loan_number
            .as_deref()
            .or(borrower_name.as_deref())
            .unwrap_or("Agreement")
    );
    entities.push(
        Entity::new(ids::entity_id(), EntityType::Loan, loan_name, document_id, graph_id)
            .with_properties(properties)
            .with_citations(vec![Citation::section(1, "Loan Terms")]),
    );

    if let Some(name) = lender_name {
        let mut props: HashMap<String, Value> = HashMap::new();
        props.insert("role".into(), json!("lender"));
        entities.push(
            Entity::new(ids::entity_id(), EntityType::Company, name, document_id, graph_id)
                .with_properties(props)
                .with_citations(vec![Citation::section(1, "Lender Information")]),
        );
    }

    if let Some(name) = borrower_name {
        let upper = name.to_uppercase();
        let entity_type = if ["INC", "LLC", "CORP", "LTD"].iter().any(|s| upper.contains(s)) {
            EntityType::Company
        } else {
            EntityType::Person
        };
        let mut props: HashMap<String, Value> = HashMap::new();
        props.insert("role".into(), json!("borrower"));
        entities.push(
            Entity::new(ids::entity_id(), entity_type, name, document_id, graph_id)
                .with_properties(props)
                .with_citations(vec![Citation::section(1, "Borrower Information")]),
        );
    }

    // Named ratio covenants.
    for (re, covenant_type) in COVENANT_PATTERNS.iter() {
        let Some(captures) = re.captures(&text) else {
            continue;
        };
        let raw = captures
            .get(1)
            .map(|m| m.as_str().replace(',', ""))
            .unwrap_or_default();
        let threshold: Option<f64> = raw.parse().ok();
        let mut props: HashMap<String, Value> = HashMap::new();
        props.insert("covenant_type".into(), json!(covenant_type));
        props.insert("threshold".into(), json!(threshold));
        props.insert(
            "description".into(),
            json!(format!(
                "Must maintain {} of {raw}",
                covenant_type.replace('_', " ")
            )),
        );
        entities.push(
            Entity::new(
                ids::entity_id(),
                EntityType::Clause,
                title_case(covenant_type),
                document_id,
                graph_id,
            )
            .with_properties(props)
            .with_citations(vec![Citation::section(1, "Covenants")]),
        );
    }

    // General "shall maintain / shall not exceed" covenants.
    for captures in MAINTAIN_RE.captures_iter(&text).take(10) {
        let Some(description) = captures.get(1).map(|m| m.as_str().trim()) else {
            continue;
        };
        let mut props: HashMap<String, Value> = HashMap::new();
        props.insert("covenant_type".into(), json!("general"));
        props.insert("description".into(), json!(description));
        entities.push(
            Entity::new(
                ids::entity_id(),
                EntityType::Clause,
                "Financial Covenant",
                document_id,
                graph_id,
            )
            .with_properties(props)
            .with_citations(vec![Citation::section(1, "Covenants")]),
        );
    }

    // Fees.
    for (re, fee_type, is_percentage) in FEE_PATTERNS.iter() {
        let Some(captures) = re.captures(&text) else {
            continue;
        };
        let raw = captures
            .get(1)
            .map(|m| m.as_str().replace(',', ""))
            .unwrap_or_default();
        let amount: Option<f64> = raw.parse().ok();
        let mut props: HashMap<String, Value> = HashMap::new();
        props.insert("fee_type".into(), json!(fee_type));
        if *is_percentage {
            props.insert("percentage".into(), json!(amount));
        } else {
            props.insert("amount".into(), json!(amount));
        }
        entities.push(
            Entity::new(
                ids::entity_id(),
                EntityType::Metric,
                title_case(fee_type),
                document_id,
                graph_id,
            )
            .with_properties(props)
            .with_citations(vec![Citation::section(1, "Fees")]),
        );
    }

    tracing::info!(entities = entities.len(), "loan parser finished");
    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOAN: &str = "LOAN AGREEMENT\n\
        Loan Number: TL-2026-01\n\
        Lender: First National Bank\n\
        Borrower: Acme Industries LLC\n\
        Principal Amount: $2,500,000\n\
        Interest Rate: 9.0% variable rate, adjusted quarterly\n\
        Term of 5 years\n\
        Maturity Date: 06/30/2031\n\
        The Borrower shall maintain a debt service coverage ratio of 1.25.\n\
        Origination Fee: $25,000\n";

    #[test]
    fn extracts_loan_terms_and_parties() {
        let entities = extract_entities(LOAN, "doc_1", "graph_1");

        let loan = &entities[0];
        assert_eq!(loan.entity_type, EntityType::Loan);
        assert_eq!(loan.name, "Loan TL-2026-01");
        assert_eq!(loan.properties["principal_amount"], 2_500_000.0);
        assert_eq!(loan.properties["interest_rate"], 9.0);
        assert_eq!(loan.properties["rate"], 0.09);
        assert_eq!(loan.properties["rate_type"], "variable");
        assert_eq!(loan.properties["term_months"], 60);
        assert_eq!(loan.properties["lender"], "First National Bank");

        let lender = entities
            .iter()
            .find(|e| e.name == "First National Bank")
            .unwrap();
        assert_eq!(lender.properties["role"], "lender");
        let borrower = entities
            .iter()
            .find(|e| e.name == "Acme Industries LLC")
            .unwrap();
        assert_eq!(borrower.entity_type, EntityType::Company);
    }

    #[test]
    fn extracts_covenants_and_fees() {
        let entities = extract_entities(LOAN, "doc_1", "graph_1");
        let covenant = entities
            .iter()
            .find(|e| e.name == "Debt Service Coverage")
            .unwrap();
        assert_eq!(covenant.entity_type, EntityType::Clause);
        assert_eq!(covenant.properties["threshold"], 1.25);

        let fee = entities.iter().find(|e| e.name == "Origination Fee").unwrap();
        assert_eq!(fee.properties["amount"], 25_000.0);
    }
}
