use crate::models::{CategoryProposal, Resolution};

/// Choose the final category from competing proposals.
///
/// Precedence is fixed: a rule proposal always wins — rules encode
/// explicit human intent and outrank probabilistic inference, whatever
/// the AI's confidence. Failing that, an AI proposal is accepted only at
/// or above the configured minimum confidence. Otherwise the record stays
/// unresolved, which is a valid terminal state, not an error.
pub fn resolve(
    rule: Option<&CategoryProposal>,
    ai: Option<&CategoryProposal>,
    min_ai_confidence: f64,
) -> Option<Resolution> {
    if let Some(p) = rule {
        return Some(Resolution {
            category: p.category.clone(),
            source: p.source,
            confidence: p.confidence,
        });
    }
    if let Some(p) = ai {
        if p.confidence >= min_ai_confidence {
            return Some(Resolution {
                category: p.category.clone(),
                source: p.source,
                confidence: p.confidence,
            });
        }
    }
    None
}
