//! Taxonomic classification boundary.
//!
//! Classification itself is done by an external chat-completion service.
//! This module owns the two deterministic ends of that exchange:
//! - building the request (system prompt, analysis prompt, JSON mode)
//! - checking the service's answer against an explicit schema before any of
//!   it reaches storage
//!
//! ## Expected response
//!
//! ```text
//! {
//!   "taxa": [{ "kingdom": "Animalia", ..., "confidence": 0.92,
//!              "is_novel": false, "sequence_count": 3 }],
//!   "summary": { "total_taxa": 1, "novel_species": 0,
//!                "average_confidence": 0.92 }
//! }
//! ```

use log::warn;
use serde::{de, Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::model::StoredSequence;

/// Number of leading bases of each sequence quoted in the prompt.
pub const PROMPT_SEQUENCE_PREFIX: usize = 200;

/// Upper bound accepted for confidence values (they may come as fractions or percentages).
const MAX_CONFIDENCE: f64 = 100.0;

/// System message sent with every classification request.
pub const SYSTEM_PROMPT: &str = "You are an expert bioinformatician specializing in eDNA sequence \
analysis and taxonomic classification. Provide accurate, scientifically rigorous classifications.";

const RESPONSE_FORMAT_HINT: &str = r#"Please provide:
1. Taxonomic classification (Kingdom, Phylum, Class, Order, Family, Genus, Species)
2. Confidence scores for each classification
3. Identify any potentially novel species
4. Quality assessment of sequences

Respond in JSON format with this structure:
{
  "taxa": [
    {
      "kingdom": "string",
      "phylum": "string",
      "class": "string",
      "order": "string",
      "family": "string",
      "genus": "string",
      "species": "string",
      "confidence": number,
      "is_novel": boolean,
      "sequence_count": number
    }
  ],
  "summary": {
    "total_taxa": number,
    "novel_species": number,
    "average_confidence": number
  }
}"#;

/// Errors raised while talking to the classification service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaxonomyError {
    #[error("AI analysis failed: {0}")]
    UpstreamFailed(String),

    #[error("Invalid upstream response: {0}")]
    InvalidUpstreamResponse(String),
}

/// Result type for taxonomy operations.
pub type TaxonomyResult<T> = Result<T, TaxonomyError>;

fn invalid(msg: impl Into<String>) -> TaxonomyError {
    TaxonomyError::InvalidUpstreamResponse(msg.into())
}

const PROMPT_INTRO: &str = "Analyze the following DNA sequences and provide taxonomic \
classification.\n    \nSequences to analyze:\n";

/// Builds the user prompt asking for a classification of `sequences`.
///
/// Each sequence is quoted as a block `\nSequence <n>:\n<prefix>... (length: <len>)\n`
/// and blocks are separated by one more newline.
pub fn build_analysis_prompt(sequences: &[StoredSequence]) -> String {
    let blocks: Vec<String> = sequences
        .iter()
        .enumerate()
        .map(|(idx, seq)| {
            let prefix: String = seq
                .row
                .sequence_data
                .chars()
                .take(PROMPT_SEQUENCE_PREFIX)
                .collect();
            format!("\nSequence {}:\n{}... (length: {})\n", idx + 1, prefix, seq.len())
        })
        .collect();

    format!(
        "{}{}\n\n{}",
        PROMPT_INTRO,
        blocks.join("\n"),
        RESPONSE_FORMAT_HINT
    )
}

/// One message of a chat-completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResponseFormat {
    #[serde(rename = "type")]
    pub kind: String,
}

/// Body of the chat-completion request sent to the classification service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub response_format: ResponseFormat,
}

impl ChatRequest {
    /// Builds a JSON-mode request classifying `sequences` with `model`.
    pub fn for_sequences(model: impl Into<String>, sequences: &[StoredSequence]) -> Self {
        Self {
            model: model.into(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_analysis_prompt(sequences),
                },
            ],
            response_format: ResponseFormat {
                kind: "json_object".to_string(),
            },
        }
    }
}

/// A taxon reported by the classification service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Taxon {
    pub kingdom: String,
    #[serde(default)]
    pub phylum: Option<String>,
    #[serde(default)]
    pub class: Option<String>,
    #[serde(default)]
    pub order: Option<String>,
    #[serde(default)]
    pub family: Option<String>,
    #[serde(default)]
    pub genus: Option<String>,
    #[serde(default)]
    pub species: Option<String>,
    pub confidence: f64,
    #[serde(default)]
    pub is_novel: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_optional_count")]
    pub sequence_count: Option<u32>,
}

impl Taxon {
    /// Novelty flag, false when not reported.
    pub fn is_novel(&self) -> bool {
        self.is_novel.unwrap_or(false)
    }

    /// Number of sequences assigned to the taxon; a missing or zero count means one.
    pub fn sequence_count(&self) -> u32 {
        match self.sequence_count {
            Some(n) if n > 0 => n,
            _ => 1,
        }
    }
}

/// Summary block of the classification response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomySummary {
    #[serde(deserialize_with = "deserialize_count")]
    pub total_taxa: u32,
    #[serde(deserialize_with = "deserialize_count")]
    pub novel_species: u32,
    pub average_confidence: f64,
}

/// Counts are JSON numbers, so `3.0` is accepted as `3`. Fractional,
/// negative and oversized values are rejected.
fn whole_count(value: f64) -> Result<u32, String> {
    if value.is_finite() && value.fract() == 0.0 && (0.0..=u32::MAX as f64).contains(&value) {
        Ok(value as u32)
    } else {
        Err(format!("count {} is not a non-negative whole number", value))
    }
}

fn deserialize_count<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = f64::deserialize(deserializer)?;
    whole_count(value).map_err(de::Error::custom)
}

fn deserialize_optional_count<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<u32>, D::Error> {
    Option::<f64>::deserialize(deserializer)?
        .map(whole_count)
        .transpose()
        .map_err(de::Error::custom)
}

/// A validated classification response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomyReport {
    pub taxa: Vec<Taxon>,
    pub summary: TaxonomySummary,
}

impl TaxonomyReport {
    fn validate(&self) -> TaxonomyResult<()> {
        for (idx, taxon) in self.taxa.iter().enumerate() {
            if taxon.kingdom.trim().is_empty() {
                return Err(invalid(format!("taxon {} has an empty kingdom", idx + 1)));
            }
            check_confidence(taxon.confidence)
                .map_err(|msg| invalid(format!("taxon {}: {}", idx + 1, msg)))?;
        }
        check_confidence(self.summary.average_confidence)
            .map_err(|msg| invalid(format!("summary: {}", msg)))?;

        if self.summary.total_taxa as usize != self.taxa.len() {
            warn!(
                "Summary reports {} taxa but {} were listed",
                self.summary.total_taxa,
                self.taxa.len()
            );
        }
        Ok(())
    }
}

fn check_confidence(value: f64) -> Result<(), String> {
    if value.is_finite() && (0.0..=MAX_CONFIDENCE).contains(&value) {
        Ok(())
    } else {
        Err(format!("confidence {} out of range", value))
    }
}

/// Parses and validates the JSON taxonomy produced by the service.
pub fn parse_taxonomy_response(json: &str) -> TaxonomyResult<TaxonomyReport> {
    let report: TaxonomyReport =
        serde_json::from_str(json).map_err(|e| invalid(e.to_string()))?;
    report.validate()?;
    Ok(report)
}

#[derive(Debug, Deserialize)]
struct Completion {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: String,
}

/// Extracts the taxonomy from a full chat-completion response body.
///
/// The taxonomy is expected as a JSON document in the content of the first
/// choice.
pub fn parse_completion_response(body: &str) -> TaxonomyResult<TaxonomyReport> {
    let completion: Completion = serde_json::from_str(body).map_err(|e| invalid(e.to_string()))?;
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| invalid("completion has no choices"))?;
    parse_taxonomy_response(&choice.message.content)
}

/// Analysis row stored for a classification run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRow {
    pub project_id: String,
    pub user_id: String,
    pub taxa_count: u32,
    pub novel_species_count: u32,
    pub sequences_processed: usize,
    pub accuracy_rate: f64,
    pub summary: TaxonomySummary,
}

impl AnalysisRow {
    pub fn from_report(
        project_id: impl Into<String>,
        user_id: impl Into<String>,
        sequences_processed: usize,
        report: &TaxonomyReport,
    ) -> Self {
        Self {
            project_id: project_id.into(),
            user_id: user_id.into(),
            taxa_count: report.summary.total_taxa,
            novel_species_count: report.summary.novel_species,
            sequences_processed,
            accuracy_rate: report.summary.average_confidence,
            summary: report.summary.clone(),
        }
    }
}

/// Row stored for each identified taxon.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaxonRow {
    pub analysis_id: String,
    pub kingdom: String,
    pub phylum: Option<String>,
    pub class: Option<String>,
    pub order_name: Option<String>,
    pub family: Option<String>,
    pub genus: Option<String>,
    pub species: Option<String>,
    pub confidence_score: f64,
    pub sequence_count: u32,
    pub is_novel: bool,
}

impl TaxonRow {
    pub fn from_taxon(analysis_id: impl Into<String>, taxon: &Taxon) -> Self {
        Self {
            analysis_id: analysis_id.into(),
            kingdom: taxon.kingdom.clone(),
            phylum: taxon.phylum.clone(),
            class: taxon.class.clone(),
            order_name: taxon.order.clone(),
            family: taxon.family.clone(),
            genus: taxon.genus.clone(),
            species: taxon.species.clone(),
            confidence_score: taxon.confidence,
            sequence_count: taxon.sequence_count(),
            is_novel: taxon.is_novel(),
        }
    }
}
