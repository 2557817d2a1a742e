/// Untyped row handed over by an ingestion adapter. Discarded after
/// normalization.
#[derive(Debug, Clone)]
pub struct RawRow {
    pub date: String,
    pub amount: String,
    pub description: String,
    pub account: String,
}

/// How a transaction's category was assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProposalSource {
    None,
    Rule,
    Ai,
    Manual,
}

impl ProposalSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Rule => "rule",
            Self::Ai => "ai",
            Self::Manual => "manual",
        }
    }

    pub fn from_db_value(s: &str) -> Self {
        match s {
            "rule" => Self::Rule,
            "ai" => Self::Ai,
            "manual" => Self::Manual,
            _ => Self::None,
        }
    }
}

/// Canonical transaction record. Amounts are integer cents; debits are
/// negative, credits positive.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub fingerprint: String,
    pub account: String,
    pub date: String,
    pub description: String,
    pub amount_cents: i64,
    pub category: Option<String>,
    pub category_source: ProposalSource,
    pub category_confidence: Option<f64>,
}

impl Transaction {
    /// Case-folded view of the description used for rule matching.
    /// The stored description keeps its original casing.
    pub fn matching_view(&self) -> String {
        self.description.to_uppercase()
    }
}

/// Candidate category from the rules engine or the AI adapter,
/// pending resolution. Never persisted on its own.
#[derive(Debug, Clone)]
pub struct CategoryProposal {
    pub fingerprint: String,
    pub category: String,
    pub confidence: f64,
    pub source: ProposalSource,
}

/// Outcome of resolving competing proposals for one record.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub category: String,
    pub source: ProposalSource,
    pub confidence: f64,
}

#[derive(Debug, Clone)]
pub struct Rule {
    pub id: i64,
    pub pattern: String,
    pub match_type: String,
    pub category: String,
    pub confidence: f64,
    pub priority: i64,
}
