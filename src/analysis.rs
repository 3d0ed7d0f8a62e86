//! Clinical note analysis.
//!
//! Suggestions are fixed placeholders until a model-backed analyzer exists;
//! only the note validation and word count depend on the input.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RafImpact {
    High,
    Medium,
    Low,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: u32,
    pub condition: String,
    pub icd10: String,
    pub rationale: String,
    pub raf_impact: RafImpact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specificity_hint: Option<String>,
}

impl Suggestion {
    /// Plain-text form for pasting into a chart.
    #[must_use]
    pub fn copy_text(&self) -> String {
        format!("{} ({}) - {}", self.condition, self.icd10, self.rationale)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub word_count: usize,
    pub headline: String,
    pub suggestions: Vec<Suggestion>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnalysisError {
    #[error("Paste a clinical note to analyze.")]
    EmptyNote,
}

#[must_use]
pub fn word_count(note: &str) -> usize {
    note.split_whitespace().count()
}

/// Analyze a note for documentation opportunities.
///
/// # Errors
///
/// `EmptyNote` if the note is blank.
pub fn analyze(note: &str) -> Result<AnalysisReport, AnalysisError> {
    if note.trim().is_empty() {
        return Err(AnalysisError::EmptyNote);
    }
    let suggestions = placeholder_suggestions();
    Ok(AnalysisReport {
        word_count: word_count(note),
        headline: format!("Identified {} documentation opportunities.", suggestions.len()),
        suggestions,
    })
}

fn placeholder_suggestions() -> Vec<Suggestion> {
    vec![
        Suggestion {
            id: 1,
            condition: "Type 2 diabetes mellitus with diabetic retinopathy".into(),
            icd10: "E11.319".into(),
            rationale: "Ophthalmology note documents nonproliferative retinopathy with active management. \
                        Capture ensures risk adjustment accuracy."
                .into(),
            raf_impact: RafImpact::High,
            specificity_hint: Some("Link retinal findings and current treatment plan.".into()),
        },
        Suggestion {
            id: 2,
            condition: "Chronic systolic (HFrEF) heart failure".into(),
            icd10: "I50.22".into(),
            rationale: "Cardiology plan references decreased EF (35%) and guideline-directed therapy. \
                        Specify systolic to reflect disease burden."
                .into(),
            raf_impact: RafImpact::High,
            specificity_hint: Some("Document EF measurement and NYHA class when available.".into()),
        },
        Suggestion {
            id: 3,
            condition: "COPD with acute lower respiratory infection".into(),
            icd10: "J44.0".into(),
            rationale: "Respiratory section notes wheezing, increased inhaler use, and antibiotic therapy \
                        for bronchitis. Document the acute component."
                .into(),
            raf_impact: RafImpact::Medium,
            specificity_hint: Some("Clarify oxygen status and exacerbation severity.".into()),
        },
    ]
}

#[cfg(test)]
#[path = "analysis_test.rs"]
mod tests;
