//! Nearest-neighbor document retrieval.
//!
//! Selects the single stored document that backs an answer:
//!
//! 1. If the candidate set is empty → [`Decision::NoDocumentsAvailable`].
//! 2. Scan every candidate once, scoring it by cosine similarity to the
//!    query ([`find_best_match`]). Ties keep the first candidate seen.
//! 3. Below `confidence_threshold` → [`Decision::NoConfidentMatch`].
//! 4. Trimmed content shorter than `min_content_length` characters →
//!    [`Decision::ContentTooShort`].
//! 5. Otherwise → [`Decision::Usable`].
//!
//! Everything here is pure and synchronous. Callers pass a snapshot of
//! the store; nothing is mutated or retained between calls.

use crate::error::RetrievalError;
use crate::models::DocumentRecord;

/// Default minimum similarity for a document to back an answer.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Default minimum trimmed content length, in characters.
pub const DEFAULT_MIN_CONTENT_LENGTH: usize = 20;

/// Score reported when no candidate was compared. Lower than any cosine.
pub const NO_MATCH_SCORE: f64 = -1.0;

/// Thresholds applied on top of the best match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalPolicy {
    pub confidence_threshold: f64,
    pub min_content_length: usize,
}

impl Default for RetrievalPolicy {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            min_content_length: DEFAULT_MIN_CONTENT_LENGTH,
        }
    }
}

/// Result of a best-match scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchResult<'a> {
    /// Highest-scoring candidate; `None` only when there were no candidates.
    pub best: Option<&'a DocumentRecord>,
    /// Cosine similarity of `best`, or [`NO_MATCH_SCORE`].
    pub score: f64,
}

/// Whether the best match may be used to answer a question.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Decision<'a> {
    NoDocumentsAvailable,
    NoConfidentMatch,
    ContentTooShort,
    Usable(&'a DocumentRecord),
}

impl Decision<'_> {
    /// Stable machine-readable label, used in logs and CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::NoDocumentsAvailable => "no_documents_available",
            Decision::NoConfidentMatch => "no_confident_match",
            Decision::ContentTooShort => "content_too_short",
            Decision::Usable(_) => "usable",
        }
    }
}

/// A decision together with the score it was made on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextSelection<'a> {
    pub decision: Decision<'a>,
    /// Best match, whether or not it was usable.
    pub best: Option<&'a DocumentRecord>,
    pub score: f64,
}

/// Compute cosine similarity between two vectors.
///
/// ```text
///            a · b
/// cos(θ) = ─────────
///          ‖a‖ × ‖b‖
/// ```
///
/// Sums are accumulated in `f64` in index order.
///
/// If either norm is exactly zero the result is `0.0`. That is a
/// convention for the degenerate case (the cosine is undefined there),
/// not a true similarity value.
///
/// # Errors
///
/// [`RetrievalError::DimensionMismatch`] if the lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, RetrievalError> {
    if a.len() != b.len() {
        return Err(RetrievalError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (f64::from(x), f64::from(y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (norm_a.sqrt() * norm_b.sqrt()))
}

/// Find the candidate most similar to `query`.
///
/// Returns `(None, NO_MATCH_SCORE)` for an empty slice. Otherwise every
/// candidate is scored exactly once and a later candidate replaces the
/// current best only on a strictly greater score, so the first of several
/// equal maxima wins. The result depends on the order of `candidates`.
///
/// # Errors
///
/// [`RetrievalError::DimensionMismatch`] if any candidate's vector length
/// differs from the query's. No partial result is returned.
pub fn find_best_match<'a>(
    query: &[f32],
    candidates: &'a [DocumentRecord],
) -> Result<MatchResult<'a>, RetrievalError> {
    let mut best: Option<&'a DocumentRecord> = None;
    let mut best_score = NO_MATCH_SCORE;

    for candidate in candidates {
        let score = cosine_similarity(query, &candidate.vector)?;
        if best.is_none() || score > best_score {
            best = Some(candidate);
            best_score = score;
        }
    }

    Ok(MatchResult {
        best,
        score: best_score,
    })
}

/// Decide whether `best` is good enough to answer from.
///
/// Never returns [`Decision::NoDocumentsAvailable`]; the empty-store case
/// is detected by the caller before scanning (see [`select_context`]).
pub fn decide_answerability<'a>(
    best: Option<&'a DocumentRecord>,
    best_score: f64,
    confidence_threshold: f64,
    min_content_length: usize,
) -> Decision<'a> {
    let doc = match best {
        Some(doc) if best_score >= confidence_threshold => doc,
        _ => return Decision::NoConfidentMatch,
    };

    let trimmed = doc.content.trim();
    if trimmed.is_empty() || trimmed.chars().count() < min_content_length {
        return Decision::ContentTooShort;
    }

    Decision::Usable(doc)
}

/// Run the full selection chain for one query.
pub fn select_context<'a>(
    query: &[f32],
    candidates: &'a [DocumentRecord],
    policy: &RetrievalPolicy,
) -> Result<ContextSelection<'a>, RetrievalError> {
    if candidates.is_empty() {
        return Ok(ContextSelection {
            decision: Decision::NoDocumentsAvailable,
            best: None,
            score: NO_MATCH_SCORE,
        });
    }

    let matched = find_best_match(query, candidates)?;
    let decision = decide_answerability(
        matched.best,
        matched.score,
        policy.confidence_threshold,
        policy.min_content_length,
    );

    tracing::debug!(
        candidates = candidates.len(),
        score = matched.score,
        decision = decision.as_str(),
        "context selected"
    );

    Ok(ContextSelection {
        decision,
        best: matched.best,
        score: matched.score,
    })
}
