//! Confidence gate: decides whether retrieved context is good enough to
//! attempt an autonomous answer.

use serde::Serialize;

use crate::rag::retriever::RetrievedPassage;

#[derive(Debug, Clone, Serialize)]
pub struct ConfidenceAssessment {
    pub mean_score: f32,
    pub max_score: f32,
    pub passage_count: usize,
    pub sufficient: bool,
}

#[derive(Debug, Clone)]
pub struct ConfidenceGate {
    threshold: f32,
    min_passage_score: f32,
}

impl ConfidenceGate {
    pub fn new(threshold: f32, min_passage_score: f32) -> Self {
        Self {
            threshold,
            min_passage_score,
        }
    }

    /// Pure function of the passage set. The gating policy is a plain mean
    /// over passage scores with an inclusive threshold, plus a floor on the
    /// best individual score so a non-empty list of near-zero matches never
    /// counts as sufficient.
    pub fn assess(&self, passages: &[RetrievedPassage]) -> ConfidenceAssessment {
        let passage_count = passages.len();

        if passage_count == 0 {
            return ConfidenceAssessment {
                mean_score: 0.0,
                max_score: 0.0,
                passage_count: 0,
                sufficient: false,
            };
        }

        let mean_score = passages.iter().map(|p| p.score).sum::<f32>() / passage_count as f32;
        let max_score = passages.iter().map(|p| p.score).fold(0.0_f32, f32::max);

        let sufficient = mean_score >= self.threshold && max_score >= self.min_passage_score;

        ConfidenceAssessment {
            mean_score,
            max_score,
            passage_count,
            sufficient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::index::DocumentChunk;

    fn passage(id: &str, score: f32) -> RetrievedPassage {
        RetrievedPassage {
            chunk: DocumentChunk {
                chunk_id: id.to_string(),
                content: "texto".to_string(),
                product: "Producto".to_string(),
            },
            score,
        }
    }

    fn gate() -> ConfidenceGate {
        ConfidenceGate::new(0.65, 0.05)
    }

    #[test]
    fn empty_set_is_never_sufficient() {
        let assessment = gate().assess(&[]);
        assert!(!assessment.sufficient);
        assert_eq!(assessment.passage_count, 0);
        assert_eq!(assessment.mean_score, 0.0);

        // Independent of threshold value.
        let permissive = ConfidenceGate::new(0.0, 0.0).assess(&[]);
        assert!(!permissive.sufficient);
    }

    #[test]
    fn mean_at_threshold_is_sufficient() {
        let passages = vec![passage("a", 0.65), passage("b", 0.65)];
        let assessment = gate().assess(&passages);
        assert_eq!(assessment.mean_score, 0.65);
        assert!(assessment.sufficient);
    }

    #[test]
    fn mean_below_threshold_is_insufficient() {
        let passages = vec![passage("a", 0.1), passage("b", 0.05), passage("c", 0.02)];
        let assessment = gate().assess(&passages);
        assert!(assessment.mean_score < 0.65);
        assert!(!assessment.sufficient);
    }

    #[test]
    fn mixed_scores_average_out() {
        // 0.9, 0.85, 0.3 → mean ≈ 0.683 ≥ 0.65
        let passages = vec![passage("a", 0.9), passage("b", 0.85), passage("c", 0.3)];
        let assessment = gate().assess(&passages);
        assert!(assessment.sufficient);
        assert_eq!(assessment.passage_count, 3);
        assert!((assessment.mean_score - 0.6833).abs() < 1e-3);
        assert_eq!(assessment.max_score, 0.9);
    }

    #[test]
    fn best_passage_below_floor_is_insufficient() {
        let strict = ConfidenceGate::new(0.0, 0.2);
        let passages = vec![passage("a", 0.1)];
        assert!(!strict.assess(&passages).sufficient);
    }
}
