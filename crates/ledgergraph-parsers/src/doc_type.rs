//! Document type detection over markdown content.

use std::sync::LazyLock;

use regex::Regex;

static KEY_VALUE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\w+:\s*\w+").expect("valid regex"));
static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#+\s+").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    FinancialStatement,
    Invoice,
    Contract,
    Receipt,
    Email,
    Form,
    LoanDocument,
    Generic,
}

#[derive(Debug, Clone)]
pub struct TypeDetection {
    pub doc_type: DocumentType,
    pub confidence: f64,
}

struct TypePattern {
    doc_type: DocumentType,
    keywords: &'static [&'static str],
    indicators: &'static [&'static str],
    structure: &'static [&'static str],
    confidence_threshold: f64,
}

const PATTERNS: &[TypePattern] = &[
    TypePattern {
        doc_type: DocumentType::FinancialStatement,
        keywords: &[
            "balance sheet",
            "income statement",
            "cash flow",
            "assets",
            "liabilities",
            "equity",
        ],
        indicators: &["total assets", "net income", "revenue", "expenses"],
        structure: &["table"],
        confidence_threshold: 0.6,
    },
    TypePattern {
        doc_type: DocumentType::Invoice,
        keywords: &[
            "invoice",
            "bill to",
            "ship to",
            "invoice number",
            "due date",
            "amount due",
        ],
        indicators: &["subtotal", "tax", "total", "quantity", "price"],
        structure: &["key_value"],
        confidence_threshold: 0.7,
    },
    TypePattern {
        doc_type: DocumentType::Contract,
        keywords: &["whereas", "parties", "agreement", "contract", "hereby", "witnesseth"],
        indicators: &["term", "conditions", "obligations", "effective date"],
        structure: &["sections"],
        confidence_threshold: 0.6,
    },
    TypePattern {
        doc_type: DocumentType::Receipt,
        keywords: &["receipt", "transaction", "purchased", "paid", "store"],
        indicators: &["date", "time", "items", "total", "payment method"],
        structure: &["key_value"],
        confidence_threshold: 0.7,
    },
    TypePattern {
        doc_type: DocumentType::Email,
        keywords: &["from:", "to:", "subject:", "date:", "cc:", "bcc:"],
        indicators: &["sent", "received", "reply", "forward"],
        structure: &["key_value"],
        confidence_threshold: 0.8,
    },
    TypePattern {
        doc_type: DocumentType::Form,
        keywords: &["application", "form", "applicant", "please fill"],
        indicators: &["name:", "address:", "phone:", "signature:"],
        structure: &["key_value"],
        confidence_threshold: 0.6,
    },
    TypePattern {
        doc_type: DocumentType::LoanDocument,
        keywords: &["loan", "borrower", "lender", "principal", "interest rate", "maturity"],
        indicators: &["loan amount", "apr", "monthly payment", "term"],
        structure: &["key_value", "sections"],
        confidence_threshold: 0.7,
    },
];

/// Scores markdown against per-type keyword, indicator and structure
/// patterns: 40% keywords, 40% indicators, 20% structure.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentTypeDetector;

impl DocumentTypeDetector {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    #[must_use]
    pub fn detect(&self, markdown: &str) -> TypeDetection {
        let lower = markdown.to_lowercase();

        let mut best: Option<(&TypePattern, f64)> = None;
        for pattern in PATTERNS {
            let keyword_hits = pattern.keywords.iter().filter(|kw| lower.contains(**kw)).count();
            let keyword_score = keyword_hits as f64 / pattern.keywords.len() as f64 * 0.4;

            let indicator_hits = pattern
                .indicators
                .iter()
                .filter(|ind| lower.contains(**ind))
                .count();
            let indicator_score = indicator_hits as f64 / pattern.indicators.len() as f64 * 0.4;

            let mut structure_score = 0.0;
            for structure in pattern.structure {
                let hit = match *structure {
                    "table" => markdown.contains("<table"),
                    "key_value" => KEY_VALUE_RE.is_match(markdown),
                    "sections" => HEADING_RE.is_match(markdown),
                    _ => false,
                };
                if hit {
                    structure_score += 0.2;
                }
            }

            let total = keyword_score + indicator_score + structure_score;
            if best.map_or(true, |(_, score)| total > score) {
                best = Some((pattern, total));
            }
        }

        match best {
            Some((pattern, confidence)) if confidence >= pattern.confidence_threshold => {
                tracing::debug!(doc_type = ?pattern.doc_type, confidence, "document type detected");
                TypeDetection {
                    doc_type: pattern.doc_type,
                    confidence,
                }
            }
            Some((pattern, confidence)) => {
                tracing::debug!(
                    doc_type = ?pattern.doc_type,
                    confidence,
                    "best match below threshold, treating as generic"
                );
                TypeDetection {
                    doc_type: DocumentType::Generic,
                    confidence: 0.0,
                }
            }
            None => TypeDetection {
                doc_type: DocumentType::Generic,
                confidence: 0.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_loan_documents() {
        let md = "LOAN AGREEMENT\nBorrower: Acme Inc\nLender: First Bank\n\
                  Principal amount: $1,000,000\nInterest rate: 9%\nMaturity date: 01/15/2030\n\
                  Loan amount due with monthly payment over the term.";
        let detection = DocumentTypeDetector::new().detect(md);
        assert_eq!(detection.doc_type, DocumentType::LoanDocument);
        assert!(detection.confidence >= 0.7);
    }

    #[test]
    fn detects_invoices() {
        let md = "INVOICE\nInvoice Number: INV-100\nBill To: Beta LLC\nDue Date: 02/01/2026\n\
                  Subtotal: $90\nTax: $9\nTotal: $99\nQuantity and price per line below.\nAmount due on receipt.";
        let detection = DocumentTypeDetector::new().detect(md);
        assert_eq!(detection.doc_type, DocumentType::Invoice);
    }

    #[test]
    fn weak_signals_fall_back_to_generic() {
        let detection = DocumentTypeDetector::new().detect("once upon a time in a quiet town");
        assert_eq!(detection.doc_type, DocumentType::Generic);
        assert_eq!(detection.confidence, 0.0);
    }
}
