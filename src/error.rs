use thiserror::Error;

#[derive(Error, Debug)]
pub enum FintrackError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Malformed date: {0}")]
    MalformedDate(String),

    #[error("Malformed amount: {0}")]
    MalformedAmount(String),

    #[error("Invalid rule configuration: {0}")]
    RuleConfigInvalid(String),

    #[error("Unknown account: {0}")]
    UnknownAccount(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("AI request failed (transient): {0}")]
    AiTransient(String),

    #[error("AI request failed: {0}")]
    AiAuthOrProtocol(String),

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: &'static str,
        #[source]
        source: Box<FintrackError>,
    },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl FintrackError {
    /// Wrap an error with the pipeline stage it occurred in.
    pub fn at_stage(self, stage: &'static str) -> Self {
        FintrackError::Stage {
            stage,
            source: Box::new(self),
        }
    }
}

impl From<reqwest::Error> for FintrackError {
    fn from(e: reqwest::Error) -> Self {
        // Connection-level problems are worth retrying; everything else
        // surfaces as a protocol failure.
        if e.is_timeout() || e.is_connect() || e.is_request() {
            FintrackError::AiTransient(e.to_string())
        } else {
            FintrackError::AiAuthOrProtocol(e.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, FintrackError>;
