//! Handoff decider: the small state machine that turns gate and generator
//! outcomes into a final routing decision.
//!
//! `EvaluatingRetrieval → {Generating, Handoff}` and
//! `Generating → {Answered, Handoff}`; `Answered` and `Handoff` are
//! terminal. On handoff the configured contact block is appended, so the
//! caller always receives non-empty guidance.

use serde::Serialize;

use crate::rag::confidence::ConfidenceAssessment;
use crate::rag::generator::GenerationResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandoffReason {
    NoDocuments,
    LowConfidence,
    GenerationFailure,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DeciderState {
    EvaluatingRetrieval,
    Generating,
    Answered { answer: String },
    Handoff { reason: HandoffReason, answer: String },
}

impl DeciderState {
    pub fn needs_human(&self) -> bool {
        matches!(self, DeciderState::Handoff { .. })
    }
}

#[derive(Debug, Clone)]
pub struct ContactInfo {
    pub email: String,
    pub phone: String,
    pub url: String,
}

const DELIMITER: &str = "\n\n---\n\n";

const NO_ANSWER_APOLOGY: &str = "Disculpá, no encontré información suficiente en nuestro \
     catálogo para responder tu consulta con seguridad.";

const FAULT_APOLOGY: &str = "Disculpá, hubo un problema procesando tu consulta.";

pub struct HandoffDecider {
    contact: ContactInfo,
}

impl HandoffDecider {
    pub fn new(contact: ContactInfo) -> Self {
        Self { contact }
    }

    pub fn start(&self) -> DeciderState {
        DeciderState::EvaluatingRetrieval
    }

    /// First transition: retrieval confidence in, `Generating` or a terminal
    /// `Handoff` out.
    pub fn evaluate_retrieval(&self, assessment: &ConfidenceAssessment) -> DeciderState {
        if assessment.sufficient {
            return DeciderState::Generating;
        }

        let reason = if assessment.passage_count == 0 {
            HandoffReason::NoDocuments
        } else {
            HandoffReason::LowConfidence
        };

        DeciderState::Handoff {
            reason,
            answer: self.compose(NO_ANSWER_APOLOGY),
        }
    }

    /// Second transition: generation outcome in, `Answered` or `Handoff`
    /// out. A successful answer passes through verbatim.
    pub fn evaluate_generation(&self, result: &GenerationResult) -> DeciderState {
        if result.succeeded {
            return DeciderState::Answered {
                answer: result.answer_text.clone(),
            };
        }

        DeciderState::Handoff {
            reason: HandoffReason::GenerationFailure,
            answer: self.compose(FAULT_APOLOGY),
        }
    }

    /// Terminal state for faults the orchestrator absorbed (encoding or
    /// index errors mid-query).
    pub fn fault(&self) -> DeciderState {
        DeciderState::Handoff {
            reason: HandoffReason::GenerationFailure,
            answer: self.fault_answer(),
        }
    }

    /// The apology-plus-contacts text of a fault handoff.
    pub fn fault_answer(&self) -> String {
        self.compose(FAULT_APOLOGY)
    }

    fn compose(&self, partial: &str) -> String {
        let lead = if partial.trim().is_empty() {
            NO_ANSWER_APOLOGY
        } else {
            partial
        };
        format!("{lead}{DELIMITER}{}", self.contact_block())
    }

    fn contact_block(&self) -> String {
        format!(
            "💬 **¿Necesitás más ayuda?**\n\n\
             Para consultas específicas o asesoramiento personalizado, \
             contactá a nuestro equipo técnico:\n\n\
             📧 Email: {}\n\
             📞 Teléfono: {}\n\
             🌐 Web: {}",
            self.contact.email, self.contact.phone, self.contact.url
        )
    }
}
