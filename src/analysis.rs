//! Sequence analysis pipeline.
//!
//! Runs one classification of a project's sequences:
//! - Mark the project as `processing`
//! - Send the classification request through a [`Classifier`]
//! - Check the answer, then store the analysis row and one row per taxon
//! - Link the analysed sequences and mark the project as `completed`
//!
//! A failing step aborts the run. The project is then left in `processing`
//! and nothing after the failing step is written.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{ProjectStatus, StoredSequence};
use crate::store::{AnalysisStore, StoreError};
use crate::taxonomy::{
    parse_completion_response, AnalysisRow, ChatRequest, TaxonRow, TaxonomyError,
};

/// Model requested from the classification service unless a classifier says otherwise.
pub const DEFAULT_MODEL: &str = "google/gemini-2.5-flash";

/// Errors that can occur during an analysis run.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Malformed analysis request: {0}")]
    MalformedRequest(#[from] serde_json::Error),

    #[error(transparent)]
    Upstream(#[from] TaxonomyError),

    #[error("Failed to save analysis: {0}")]
    Store(#[from] StoreError),
}

/// Result type for analysis operations.
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// The external chat-completion service.
pub trait Classifier {
    /// Model name sent with the request.
    fn model(&self) -> &str {
        DEFAULT_MODEL
    }

    /// Sends `request` and returns the raw completion body.
    ///
    /// A non-success answer from the service is reported as
    /// [`TaxonomyError::UpstreamFailed`].
    fn complete(&mut self, request: &ChatRequest) -> Result<String, TaxonomyError>;
}

impl<F> Classifier for F
where
    F: FnMut(&ChatRequest) -> Result<String, TaxonomyError>,
{
    fn complete(&mut self, request: &ChatRequest) -> Result<String, TaxonomyError> {
        self(request)
    }
}

/// Body of an analysis request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub project_id: String,
    /// Stored sequences to classify
    pub sequences: Vec<StoredSequence>,
}

impl AnalysisRequest {
    pub fn new(project_id: impl Into<String>, sequences: Vec<StoredSequence>) -> Self {
        Self {
            project_id: project_id.into(),
            sequences,
        }
    }

    /// Parses a JSON request body (`projectId`, `sequences`).
    pub fn from_json(body: &str) -> AnalysisResult<Self> {
        Ok(serde_json::from_str(body)?)
    }
}

/// An analysis row as returned by the store after insertion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredAnalysis {
    /// Store-assigned identifier
    pub id: String,
    #[serde(flatten)]
    pub row: AnalysisRow,
}

/// Successful analysis response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResponse {
    pub success: bool,
    pub analysis: StoredAnalysis,
    /// Number of taxa reported in the summary
    pub taxa_count: u32,
}

/// Classifies `request.sequences` and stores the results for `user_id`.
///
/// # Examples
///
/// ```
/// use edna_ingest::analysis::analyze_sequences;
/// use edna_ingest::analysis::AnalysisRequest;
/// use edna_ingest::model::ProjectStatus;
/// use edna_ingest::store::MemoryStore;
/// use edna_ingest::taxonomy::{ChatRequest, TaxonomyError};
/// use serde_json::json;
///
/// let report = json!({
///     "taxa": [{ "kingdom": "Animalia", "confidence": 0.9 }],
///     "summary": { "total_taxa": 1, "novel_species": 0, "average_confidence": 0.9 }
/// });
/// let answer = json!({ "choices": [{ "message": { "content": report.to_string() } }] });
/// let mut classifier =
///     |_: &ChatRequest| -> Result<String, TaxonomyError> { Ok(answer.to_string()) };
///
/// let mut store = MemoryStore::new();
/// store.create_project("p1");
/// let request = AnalysisRequest::new("p1", Vec::new());
/// let response = analyze_sequences(&request, "u1", &mut classifier, &mut store).unwrap();
///
/// assert_eq!(response.analysis.id, "analysis-1");
/// assert_eq!(response.taxa_count, 1);
/// assert_eq!(store.project_status("p1"), Some(ProjectStatus::Completed));
/// ```
pub fn analyze_sequences<C, S>(
    request: &AnalysisRequest,
    user_id: &str,
    classifier: &mut C,
    store: &mut S,
) -> AnalysisResult<AnalysisResponse>
where
    C: Classifier + ?Sized,
    S: AnalysisStore + ?Sized,
{
    let project_id = request.project_id.as_str();
    info!("Analyzing sequences for project: {}", project_id);

    store.set_project_status(project_id, ProjectStatus::Processing)?;

    run_analysis(request, user_id, classifier, store).map_err(|err| {
        warn!("Analysis of project {} failed: {}", project_id, err);
        err
    })
}

fn run_analysis<C, S>(
    request: &AnalysisRequest,
    user_id: &str,
    classifier: &mut C,
    store: &mut S,
) -> AnalysisResult<AnalysisResponse>
where
    C: Classifier + ?Sized,
    S: AnalysisStore + ?Sized,
{
    let project_id = request.project_id.as_str();

    let chat = ChatRequest::for_sequences(classifier.model(), &request.sequences);
    let body = classifier.complete(&chat)?;
    let report = parse_completion_response(&body)?;
    info!("Classifier reported {} taxa", report.taxa.len());

    let analysis = store.insert_analysis(AnalysisRow::from_report(
        project_id,
        user_id,
        request.sequences.len(),
        &report,
    ))?;

    let taxa: Vec<TaxonRow> = report
        .taxa
        .iter()
        .map(|taxon| TaxonRow::from_taxon(&analysis.id, taxon))
        .collect();
    store.insert_taxa(taxa)?;

    let ids: Vec<String> = request.sequences.iter().map(|s| s.id.clone()).collect();
    store.link_sequences(&ids, &analysis.id)?;

    store.set_project_status(project_id, ProjectStatus::Completed)?;
    info!("Analysis {} completed", analysis.id);

    Ok(AnalysisResponse {
        success: true,
        taxa_count: report.summary.total_taxa,
        analysis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SequenceRecord;
    use crate::store::{MemoryStore, SequenceStore};
    use serde_json::json;

    fn completion(report: serde_json::Value) -> String {
        json!({ "choices": [{ "message": { "content": report.to_string() } }] }).to_string()
    }

    fn sample_report() -> serde_json::Value {
        json!({
            "taxa": [
                { "kingdom": "Animalia", "genus": "Salmo", "confidence": 0.9, "is_novel": true },
                { "kingdom": "Bacteria", "confidence": 0.5, "sequence_count": 2 }
            ],
            "summary": { "total_taxa": 2, "novel_species": 1, "average_confidence": 0.7 }
        })
    }

    /// Store holding project p1 and two uploaded sequences.
    fn seeded_store() -> (MemoryStore, Vec<StoredSequence>) {
        let mut store = MemoryStore::new();
        store.create_project("p1");
        let rows = vec![
            SequenceRecord::new("s1", "ATCG").to_row("f1"),
            SequenceRecord::new("s2", "GGCC").to_row("f1"),
        ];
        let saved = store.insert_sequences(rows).unwrap();
        (store, saved)
    }

    #[test]
    fn test_analysis_success() {
        let (mut store, saved) = seeded_store();
        let body = completion(sample_report());
        let mut seen = Vec::new();
        let mut classifier = |chat: &ChatRequest| -> Result<String, TaxonomyError> {
            seen.push(chat.clone());
            Ok(body.clone())
        };

        let request = AnalysisRequest::new("p1", saved);
        let response = analyze_sequences(&request, "u1", &mut classifier, &mut store).unwrap();

        assert!(response.success);
        assert_eq!(response.taxa_count, 2);
        assert_eq!(response.analysis.id, "analysis-1");
        assert_eq!(response.analysis.row.sequences_processed, 2);
        assert_eq!(response.analysis.row.user_id, "u1");
        assert_eq!(store.project_status("p1"), Some(ProjectStatus::Completed));

        let taxa: Vec<&TaxonRow> = store.taxa_for_analysis("analysis-1").collect();
        assert_eq!(taxa.len(), 2);
        assert!(taxa[0].is_novel);
        assert_eq!(taxa[1].sequence_count, 2);
        assert!(store
            .sequences_for_file("f1")
            .all(|s| s.analysis_id.as_deref() == Some("analysis-1")));

        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].model, DEFAULT_MODEL);
        assert!(seen[0].messages[1].content.contains("Sequence 2:\nGGCC... (length: 4)"));
    }

    #[test]
    fn test_upstream_failure_leaves_project_processing() {
        let (mut store, saved) = seeded_store();
        let mut classifier = |_: &ChatRequest| -> Result<String, TaxonomyError> {
            Err(TaxonomyError::UpstreamFailed("Too Many Requests".to_string()))
        };

        let request = AnalysisRequest::new("p1", saved);
        let err = analyze_sequences(&request, "u1", &mut classifier, &mut store).unwrap_err();

        assert_eq!(err.to_string(), "AI analysis failed: Too Many Requests");
        assert_eq!(store.project_status("p1"), Some(ProjectStatus::Processing));
        assert!(store.analyses().is_empty());
    }

    #[test]
    fn test_invalid_answer_leaves_project_processing() {
        let (mut store, saved) = seeded_store();
        let mut report = sample_report();
        report["taxa"][0]["confidence"] = json!(250);
        let body = completion(report);
        let mut classifier =
            |_: &ChatRequest| -> Result<String, TaxonomyError> { Ok(body.clone()) };

        let request = AnalysisRequest::new("p1", saved);
        let err = analyze_sequences(&request, "u1", &mut classifier, &mut store).unwrap_err();

        assert!(matches!(
            err,
            AnalysisError::Upstream(TaxonomyError::InvalidUpstreamResponse(_))
        ));
        assert_eq!(store.project_status("p1"), Some(ProjectStatus::Processing));
        assert!(store.analyses().is_empty());
        assert_eq!(store.taxa_for_analysis("analysis-1").count(), 0);
        assert!(store.sequences_for_file("f1").all(|s| s.analysis_id.is_none()));
    }

    #[test]
    fn test_unknown_project() {
        let (mut store, saved) = seeded_store();
        let mut calls = 0;
        let mut classifier = |_: &ChatRequest| -> Result<String, TaxonomyError> {
            calls += 1;
            Ok(completion(sample_report()))
        };

        let request = AnalysisRequest::new("p2", saved);
        let err = analyze_sequences(&request, "u1", &mut classifier, &mut store).unwrap_err();

        assert!(matches!(err, AnalysisError::Store(StoreError::UnknownProject(_))));
        assert_eq!(calls, 0);
    }

    #[test]
    fn test_custom_model() {
        struct Fixed(String);

        impl Classifier for Fixed {
            fn model(&self) -> &str {
                "local/test-model"
            }

            fn complete(&mut self, request: &ChatRequest) -> Result<String, TaxonomyError> {
                assert_eq!(request.model, "local/test-model");
                Ok(self.0.clone())
            }
        }

        let (mut store, saved) = seeded_store();
        let mut classifier = Fixed(completion(sample_report()));
        let request = AnalysisRequest::new("p1", saved);
        analyze_sequences(&request, "u1", &mut classifier, &mut store).unwrap();
        assert_eq!(store.analyses().len(), 1);
    }

    #[test]
    fn test_request_from_json() {
        let (_, saved) = seeded_store();
        let body = json!({ "projectId": "p1", "sequences": saved }).to_string();
        let request = AnalysisRequest::from_json(&body).unwrap();
        assert_eq!(request.project_id, "p1");
        assert_eq!(request.sequences.len(), 2);
        assert_eq!(request.sequences[1].row.sequence_data, "GGCC");

        let result = AnalysisRequest::from_json(r#"{"projectId": "p1"}"#);
        assert!(matches!(result, Err(AnalysisError::MalformedRequest(_))));
    }

    #[test]
    fn test_response_json_layout() {
        let (mut store, saved) = seeded_store();
        let body = completion(sample_report());
        let mut classifier =
            |_: &ChatRequest| -> Result<String, TaxonomyError> { Ok(body.clone()) };
        let request = AnalysisRequest::new("p1", saved);
        let response = analyze_sequences(&request, "u1", &mut classifier, &mut store).unwrap();

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], true);
        assert_eq!(value["taxa_count"], 2);
        assert_eq!(value["analysis"]["id"], "analysis-1");
        assert_eq!(value["analysis"]["project_id"], "p1");
        assert_eq!(value["analysis"]["summary"]["novel_species"], 1);
    }
}
