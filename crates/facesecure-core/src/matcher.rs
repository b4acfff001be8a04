use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    /// The two embeddings have different lengths and cannot be compared.
    DimensionMismatch { left: usize, right: usize },
}

impl fmt::Display for MatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchError::DimensionMismatch { left, right } => {
                write!(f, "embedding dimension mismatch: {left} vs {right}")
            }
        }
    }
}

impl std::error::Error for MatchError {}

/// Cosine similarity between two embeddings, in [-1, 1].
///
/// Zero-magnitude vectors compare as 0.0 rather than NaN.
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> Result<f64, MatchError> {
    if a.len() != b.len() {
        return Err(MatchError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let mut dot = 0.0;
    let mut mag_a = 0.0;
    let mut mag_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        mag_a += x * x;
        mag_b += y * y;
    }

    let mag_a = mag_a.sqrt();
    let mag_b = mag_b.sqrt();
    if mag_a == 0.0 || mag_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (mag_a * mag_b))
}

/// Confidence tier derived from a similarity score.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    /// Below the low threshold: not the same person.
    Reject,
    /// Between the thresholds: step-up verification (MFA) required.
    Challenge,
    /// At or above the high threshold: accepted.
    Accept,
}

/// Classify a similarity score against the two confidence thresholds.
///
/// Boundaries are inclusive on the high side: a score exactly at
/// `low_threshold` is a challenge, exactly at `high_threshold` an accept.
pub fn classify(similarity: f64, low_threshold: f64, high_threshold: f64) -> MatchTier {
    if similarity < low_threshold {
        MatchTier::Reject
    } else if similarity < high_threshold {
        MatchTier::Challenge
    } else {
        MatchTier::Accept
    }
}

/// An enrolled template a probe can be matched against.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub embedding: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch {
    pub candidate_id: String,
    pub similarity: f64,
}

/// Seam for the probe-vs-population search so an indexed nearest-neighbor
/// implementation can replace the linear scan without touching the decision
/// pipeline.
pub trait CandidateMatcher {
    fn best_match(&self, probe: &[f64], candidates: &[Candidate]) -> Option<BestMatch>;
}

/// O(N) scan keeping the single best (candidate, similarity) pair.
///
/// Fine at small enrollment counts; this is the scalability ceiling of the
/// pipeline and the first thing to replace behind [`CandidateMatcher`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LinearScanMatcher;

impl CandidateMatcher for LinearScanMatcher {
    fn best_match(&self, probe: &[f64], candidates: &[Candidate]) -> Option<BestMatch> {
        let mut best: Option<BestMatch> = None;

        for candidate in candidates {
            if candidate.embedding.is_empty() {
                continue;
            }
            // A mixed population can hold templates produced by older encoder
            // versions; skip those instead of failing the whole scan.
            let similarity = match cosine_similarity(probe, &candidate.embedding) {
                Ok(s) => s,
                Err(MatchError::DimensionMismatch { .. }) => continue,
            };

            // Strict comparison: ties keep the first candidate encountered.
            let better = match &best {
                Some(current) => similarity > current.similarity,
                None => true,
            };
            if better {
                best = Some(BestMatch {
                    candidate_id: candidate.id.clone(),
                    similarity,
                });
            }
        }

        best
    }
}
