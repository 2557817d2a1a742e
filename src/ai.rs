use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::error::{FintrackError, Result};
use crate::models::{CategoryProposal, ProposalSource, Transaction};
use crate::settings::AiSettings;

/// One record as submitted to the external classifier. The provider must
/// echo the fingerprint back so responses can be correlated.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationRequest {
    pub fingerprint: String,
    pub description: String,
    pub amount: String,
    pub date: String,
}

/// One entry of the provider's response. A null category is the explicit
/// "unclassifiable" marker.
#[derive(Debug, Deserialize)]
pub struct RawProposal {
    pub fingerprint: String,
    pub category: Option<String>,
    pub confidence: Option<f64>,
}

#[derive(Debug, Default)]
pub struct AiOutcome {
    pub proposals: HashMap<String, CategoryProposal>,
    /// Batches that exhausted their retries; their records stay unresolved.
    pub incomplete_batches: usize,
    /// Response entries dropped during validation (unknown fingerprint,
    /// category outside the taxonomy, confidence out of range).
    pub dropped: usize,
}

pub fn build_batches(records: &[Transaction], batch_size: usize) -> Vec<Vec<ClassificationRequest>> {
    let batch_size = batch_size.max(1);
    records
        .chunks(batch_size)
        .map(|chunk| {
            chunk
                .iter()
                .map(|t| ClassificationRequest {
                    fingerprint: t.fingerprint.clone(),
                    description: t.description.clone(),
                    amount: crate::fmt::cents_to_decimal(t.amount_cents),
                    date: t.date.clone(),
                })
                .collect()
        })
        .collect()
}

fn system_prompt(taxonomy: &[String]) -> String {
    format!(
        "You categorize bank statement transactions. Valid categories, and the only \
         ones you may use: {}. Reply with a JSON array only, one object per input \
         transaction: {{\"fingerprint\": \"<echoed from input>\", \"category\": \
         \"<category or null if unclassifiable>\", \"confidence\": <0.0-1.0>}}. \
         Echo each fingerprint exactly. No prose, no markdown.",
        taxonomy.join(", ")
    )
}

/// Models wrap JSON in code fences often enough that we strip them before
/// parsing.
pub fn parse_content(content: &str) -> Result<Vec<RawProposal>> {
    let trimmed = content.trim();
    let trimmed = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix("```").unwrap_or(trimmed).trim();
    serde_json::from_str(trimmed)
        .map_err(|e| FintrackError::AiAuthOrProtocol(format!("unparseable classifier response: {e}")))
}

/// Keep only proposals that correlate to a submitted fingerprint, name a
/// category inside the taxonomy, and carry a confidence in [0,1]. The
/// rest are dropped and counted; their records count as unclassified.
pub fn validate_proposals(
    raw: Vec<RawProposal>,
    submitted: &HashSet<String>,
    taxonomy: &[String],
) -> (Vec<CategoryProposal>, usize) {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    for entry in raw {
        if !submitted.contains(&entry.fingerprint) {
            dropped += 1;
            continue;
        }
        let Some(category) = entry.category else {
            // Explicit unclassifiable marker — not an error, not a proposal.
            continue;
        };
        if !taxonomy.iter().any(|c| c == &category) {
            dropped += 1;
            continue;
        }
        let Some(confidence) = entry.confidence else {
            dropped += 1;
            continue;
        };
        if !(0.0..=1.0).contains(&confidence) {
            dropped += 1;
            continue;
        }
        kept.push(CategoryProposal {
            fingerprint: entry.fingerprint,
            category,
            confidence,
            source: ProposalSource::Ai,
        });
    }
    (kept, dropped)
}

// ---------------------------------------------------------------------------
// HTTP plumbing (OpenAI-compatible chat completions)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

async fn request_batch(
    client: &reqwest::Client,
    settings: &AiSettings,
    api_key: &str,
    taxonomy: &[String],
    batch: &[ClassificationRequest],
) -> Result<Vec<RawProposal>> {
    let body = ChatRequest {
        model: settings.model.clone(),
        messages: vec![
            ChatMessage {
                role: "system".to_string(),
                content: system_prompt(taxonomy),
            },
            ChatMessage {
                role: "user".to_string(),
                content: serde_json::to_string_pretty(batch)
                    .map_err(|e| FintrackError::Other(e.to_string()))?,
            },
        ],
        temperature: 0.0,
    };

    let send = client
        .post(&settings.endpoint)
        .header(AUTHORIZATION, format!("Bearer {api_key}"))
        .json(&body)
        .send();

    let resp = match tokio::time::timeout(Duration::from_secs(settings.timeout_secs), send).await {
        Ok(resp) => resp?,
        Err(_) => {
            return Err(FintrackError::AiTransient(format!(
                "classifier call timed out after {}s",
                settings.timeout_secs
            )))
        }
    };

    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        let msg = format!("classifier returned {status}: {text}");
        return if status.as_u16() == 429 || status.is_server_error() {
            Err(FintrackError::AiTransient(msg))
        } else {
            Err(FintrackError::AiAuthOrProtocol(msg))
        };
    }

    let out: ChatResponse = resp
        .json()
        .await
        .map_err(|e| FintrackError::AiAuthOrProtocol(format!("bad classifier payload: {e}")))?;
    let content = out
        .choices
        .first()
        .and_then(|c| c.message.content.clone())
        .ok_or_else(|| FintrackError::AiAuthOrProtocol("empty classifier response".to_string()))?;
    parse_content(&content)
}

enum BatchResult {
    Ok(Vec<RawProposal>),
    /// Retries exhausted on transient failures.
    Incomplete,
}

async fn classify_batch(
    client: reqwest::Client,
    settings: Arc<AiSettings>,
    api_key: Arc<String>,
    taxonomy: Arc<Vec<String>>,
    batch: Vec<ClassificationRequest>,
) -> Result<BatchResult> {
    let mut backoff = Duration::from_millis(settings.backoff_ms);
    let mut attempt = 0u32;
    loop {
        match request_batch(&client, &settings, &api_key, &taxonomy, &batch).await {
            Ok(raw) => return Ok(BatchResult::Ok(raw)),
            Err(FintrackError::AiTransient(_)) if attempt < settings.max_retries => {
                attempt += 1;
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(FintrackError::AiTransient(_)) => return Ok(BatchResult::Incomplete),
            // Auth/protocol failures are not retried and not swallowed.
            Err(e) => return Err(e),
        }
    }
}

async fn classify_all(
    settings: Arc<AiSettings>,
    api_key: Arc<String>,
    taxonomy: Arc<Vec<String>>,
    batches: Vec<Vec<ClassificationRequest>>,
) -> Result<AiOutcome> {
    let client = reqwest::Client::new();
    let semaphore = Arc::new(Semaphore::new(settings.concurrency.max(1)));
    let mut set: JoinSet<Result<BatchResult>> = JoinSet::new();

    for batch in batches.iter().cloned() {
        let client = client.clone();
        let settings = settings.clone();
        let api_key = api_key.clone();
        let taxonomy = taxonomy.clone();
        let semaphore = semaphore.clone();
        set.spawn(async move {
            let _permit = semaphore
                .acquire()
                .await
                .map_err(|e| FintrackError::Other(e.to_string()))?;
            classify_batch(client, settings, api_key, taxonomy, batch).await
        });
    }

    let submitted: HashSet<String> = batches
        .iter()
        .flatten()
        .map(|r| r.fingerprint.clone())
        .collect();

    let mut outcome = AiOutcome::default();
    while let Some(joined) = set.join_next().await {
        let result = joined.map_err(|e| FintrackError::Other(e.to_string()))?;
        match result {
            // A hard failure aborts the stage; in-flight batches are
            // dropped with the JoinSet and their records stay unresolved.
            Err(e) => return Err(e),
            Ok(BatchResult::Incomplete) => outcome.incomplete_batches += 1,
            Ok(BatchResult::Ok(raw)) => {
                let (kept, dropped) = validate_proposals(raw, &submitted, &taxonomy);
                outcome.dropped += dropped;
                for p in kept {
                    outcome.proposals.insert(p.fingerprint.clone(), p);
                }
            }
        }
    }
    Ok(outcome)
}

/// Classify records the rules engine left uncategorized. Batches are
/// issued concurrently up to the configured limit; transient failures are
/// retried per batch with bounded exponential backoff. Synchronous entry
/// point — the rest of the pipeline has no reason to be async.
pub fn classify_uncategorized(
    settings: &AiSettings,
    taxonomy: &[String],
    records: &[Transaction],
) -> Result<AiOutcome> {
    if records.is_empty() {
        return Ok(AiOutcome::default());
    }
    let api_key = settings.resolve_api_key().ok_or_else(|| {
        FintrackError::AiAuthOrProtocol(
            "no API key configured; set FINTRACK_AI_KEY or settings.ai.api_key".to_string(),
        )
    })?;

    let batches = build_batches(records, settings.batch_size);
    let settings = Arc::new(settings.clone());
    let api_key = Arc::new(api_key);
    let taxonomy = Arc::new(taxonomy.to_vec());

    if let Ok(handle) = tokio::runtime::Handle::try_current() {
        tokio::task::block_in_place(|| {
            handle.block_on(classify_all(settings, api_key, taxonomy, batches))
        })
    } else {
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| FintrackError::Other(format!("create tokio runtime: {e}")))?;
        rt.block_on(classify_all(settings, api_key, taxonomy, batches))
    }
}
