//! Persistence boundary.
//!
//! The pipelines only talk to storage through two traits:
//! - [`SequenceStore`] for the rows produced by an upload
//! - [`AnalysisStore`] for project status, analysis and taxon rows
//!
//! [`MemoryStore`] implements both and is what the CLI and the tests use.

use std::collections::HashMap;

use thiserror::Error;

use crate::analysis::StoredAnalysis;
use crate::model::{NewSequenceRow, ProjectStatus, StoredSequence};
use crate::taxonomy::{AnalysisRow, TaxonRow};

/// Errors raised by a store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Sequence row has no parent file")]
    MissingFile,

    #[error("Unknown sequence id: {0}")]
    UnknownSequence(String),

    #[error("Unknown project id: {0}")]
    UnknownProject(String),

    #[error("Unknown analysis id: {0}")]
    UnknownAnalysis(String),

    #[error("Store rejected the insert: {0}")]
    Rejected(String),
}

/// Persistence boundary for sequence rows.
pub trait SequenceStore {
    /// Inserts all rows, returning them with their store identifiers.
    ///
    /// Either every row is stored or none is.
    fn insert_sequences(
        &mut self,
        rows: Vec<NewSequenceRow>,
    ) -> Result<Vec<StoredSequence>, StoreError>;
}

/// Persistence boundary for classification results.
pub trait AnalysisStore {
    /// Moves a project to `status`.
    fn set_project_status(
        &mut self,
        project_id: &str,
        status: ProjectStatus,
    ) -> Result<(), StoreError>;

    /// Inserts an analysis row and returns it with its store identifier.
    fn insert_analysis(&mut self, row: AnalysisRow) -> Result<StoredAnalysis, StoreError>;

    /// Inserts the taxa identified by an analysis; all or nothing.
    fn insert_taxa(&mut self, rows: Vec<TaxonRow>) -> Result<(), StoreError>;

    /// Attaches the given sequences to an analysis; all or nothing.
    fn link_sequences(&mut self, ids: &[String], analysis_id: &str) -> Result<(), StoreError>;
}

/// In-memory store.
///
/// Sequences get identifiers `seq-1`, `seq-2`, ... and analyses
/// `analysis-1`, `analysis-2`, ...
#[derive(Debug, Default)]
pub struct MemoryStore {
    sequences: Vec<StoredSequence>,
    index: HashMap<String, usize>,
    next_id: usize,
    projects: HashMap<String, ProjectStatus>,
    analyses: Vec<StoredAnalysis>,
    taxa: Vec<TaxonRow>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sequences.
    pub fn len(&self) -> usize {
        self.sequences.len()
    }

    /// Returns true if no sequence has been stored.
    pub fn is_empty(&self) -> bool {
        self.sequences.is_empty()
    }

    /// Gets a stored sequence by id.
    pub fn get(&self, id: &str) -> Option<&StoredSequence> {
        self.index.get(id).map(|&idx| &self.sequences[idx])
    }

    /// All sequences attached to an uploaded file, in insertion order.
    pub fn sequences_for_file<'a>(
        &'a self,
        file_id: &'a str,
    ) -> impl Iterator<Item = &'a StoredSequence> + 'a {
        self.sequences.iter().filter(move |s| s.row.file_id == file_id)
    }

    /// Registers a new project in the `pending` state.
    pub fn create_project(&mut self, project_id: impl Into<String>) {
        self.projects.insert(project_id.into(), ProjectStatus::Pending);
    }

    /// Current status of a project.
    pub fn project_status(&self, project_id: &str) -> Option<ProjectStatus> {
        self.projects.get(project_id).copied()
    }

    /// All stored analyses, in insertion order.
    pub fn analyses(&self) -> &[StoredAnalysis] {
        &self.analyses
    }

    /// Taxa identified by an analysis.
    pub fn taxa_for_analysis<'a>(
        &'a self,
        analysis_id: &'a str,
    ) -> impl Iterator<Item = &'a TaxonRow> + 'a {
        self.taxa.iter().filter(move |t| t.analysis_id == analysis_id)
    }
}

impl SequenceStore for MemoryStore {
    fn insert_sequences(
        &mut self,
        rows: Vec<NewSequenceRow>,
    ) -> Result<Vec<StoredSequence>, StoreError> {
        if rows.iter().any(|row| row.file_id.is_empty()) {
            return Err(StoreError::MissingFile);
        }

        let mut saved = Vec::with_capacity(rows.len());
        for row in rows {
            self.next_id += 1;
            let stored = StoredSequence::new(format!("seq-{}", self.next_id), row);
            self.index.insert(stored.id.clone(), self.sequences.len());
            self.sequences.push(stored.clone());
            saved.push(stored);
        }
        Ok(saved)
    }
}

impl AnalysisStore for MemoryStore {
    fn set_project_status(
        &mut self,
        project_id: &str,
        status: ProjectStatus,
    ) -> Result<(), StoreError> {
        let current = self
            .projects
            .get_mut(project_id)
            .ok_or_else(|| StoreError::UnknownProject(project_id.to_string()))?;
        *current = status;
        Ok(())
    }

    fn insert_analysis(&mut self, row: AnalysisRow) -> Result<StoredAnalysis, StoreError> {
        if !self.projects.contains_key(&row.project_id) {
            return Err(StoreError::UnknownProject(row.project_id));
        }
        let stored = StoredAnalysis {
            id: format!("analysis-{}", self.analyses.len() + 1),
            row,
        };
        self.analyses.push(stored.clone());
        Ok(stored)
    }

    fn insert_taxa(&mut self, rows: Vec<TaxonRow>) -> Result<(), StoreError> {
        if let Some(row) = rows
            .iter()
            .find(|row| !self.analyses.iter().any(|a| a.id == row.analysis_id))
        {
            return Err(StoreError::UnknownAnalysis(row.analysis_id.clone()));
        }
        self.taxa.extend(rows);
        Ok(())
    }

    fn link_sequences(&mut self, ids: &[String], analysis_id: &str) -> Result<(), StoreError> {
        if !self.analyses.iter().any(|a| a.id == analysis_id) {
            return Err(StoreError::UnknownAnalysis(analysis_id.to_string()));
        }
        let positions = ids
            .iter()
            .map(|id| {
                self.index
                    .get(id)
                    .copied()
                    .ok_or_else(|| StoreError::UnknownSequence(id.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        for idx in positions {
            self.sequences[idx].analysis_id = Some(analysis_id.to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SequenceRecord;
    use crate::taxonomy::TaxonomySummary;

    fn analysis_row(project_id: &str) -> AnalysisRow {
        AnalysisRow {
            project_id: project_id.to_string(),
            user_id: "u1".to_string(),
            taxa_count: 0,
            novel_species_count: 0,
            sequences_processed: 0,
            accuracy_rate: 0.0,
            summary: TaxonomySummary {
                total_taxa: 0,
                novel_species: 0,
                average_confidence: 0.0,
            },
        }
    }

    fn taxon_row(analysis_id: &str) -> TaxonRow {
        TaxonRow {
            analysis_id: analysis_id.to_string(),
            kingdom: "Animalia".to_string(),
            phylum: None,
            class: None,
            order_name: None,
            family: None,
            genus: None,
            species: None,
            confidence_score: 0.5,
            sequence_count: 1,
            is_novel: false,
        }
    }

    fn rows(file_id: &str, data: &[&str]) -> Vec<NewSequenceRow> {
        data.iter()
            .enumerate()
            .map(|(i, seq)| SequenceRecord::new(format!("s{}", i + 1), *seq).to_row(file_id))
            .collect()
    }

    #[test]
    fn test_sequence_ids_are_sequential() {
        let mut store = MemoryStore::new();
        store.insert_sequences(rows("f1", &["ACGT", "GGCC"])).unwrap();
        let saved = store.insert_sequences(rows("f2", &["TTTT"])).unwrap();

        assert_eq!(saved[0].id, "seq-3");
        assert_eq!(store.len(), 3);
        assert_eq!(store.sequences_for_file("f1").count(), 2);
        assert_eq!(store.get("seq-3").unwrap().row.file_id, "f2");
    }

    #[test]
    fn test_missing_file_rejects_whole_batch() {
        let mut store = MemoryStore::new();
        let mut batch = rows("f1", &["ACGT"]);
        batch.extend(rows("", &["GGCC"]));

        assert_eq!(store.insert_sequences(batch), Err(StoreError::MissingFile));
        assert!(store.is_empty());
    }

    #[test]
    fn test_project_status() {
        let mut store = MemoryStore::new();
        store.create_project("p1");
        assert_eq!(store.project_status("p1"), Some(ProjectStatus::Pending));

        store.set_project_status("p1", ProjectStatus::Processing).unwrap();
        assert_eq!(store.project_status("p1"), Some(ProjectStatus::Processing));

        assert_eq!(
            store.set_project_status("p9", ProjectStatus::Completed),
            Err(StoreError::UnknownProject("p9".to_string()))
        );
        assert_eq!(store.project_status("p9"), None);
    }

    #[test]
    fn test_analysis_ids_and_taxa() {
        let mut store = MemoryStore::new();
        store.create_project("p1");

        let first = store.insert_analysis(analysis_row("p1")).unwrap();
        let second = store.insert_analysis(analysis_row("p1")).unwrap();
        assert_eq!(first.id, "analysis-1");
        assert_eq!(second.id, "analysis-2");
        assert_eq!(store.analyses().len(), 2);

        store.insert_taxa(vec![taxon_row("analysis-2"), taxon_row("analysis-2")]).unwrap();
        assert_eq!(store.taxa_for_analysis("analysis-2").count(), 2);
        assert_eq!(store.taxa_for_analysis("analysis-1").count(), 0);
    }

    #[test]
    fn test_analysis_for_unknown_project() {
        let mut store = MemoryStore::new();
        let result = store.insert_analysis(analysis_row("p404"));
        assert_eq!(result, Err(StoreError::UnknownProject("p404".to_string())));
    }

    #[test]
    fn test_taxa_for_unknown_analysis() {
        let mut store = MemoryStore::new();
        store.create_project("p1");
        store.insert_analysis(analysis_row("p1")).unwrap();

        let result = store.insert_taxa(vec![taxon_row("analysis-1"), taxon_row("analysis-7")]);
        assert_eq!(result, Err(StoreError::UnknownAnalysis("analysis-7".to_string())));
        assert_eq!(store.taxa_for_analysis("analysis-1").count(), 0);
    }

    #[test]
    fn test_link_sequences() {
        let mut store = MemoryStore::new();
        store.create_project("p1");
        store.insert_sequences(rows("f1", &["ACGT", "GGCC"])).unwrap();
        store.insert_analysis(analysis_row("p1")).unwrap();

        store.link_sequences(&["seq-2".to_string()], "analysis-1").unwrap();
        assert_eq!(store.get("seq-1").unwrap().analysis_id, None);
        assert_eq!(store.get("seq-2").unwrap().analysis_id.as_deref(), Some("analysis-1"));

        let err = store.link_sequences(&["seq-1".to_string(), "seq-9".to_string()], "analysis-1");
        assert_eq!(err, Err(StoreError::UnknownSequence("seq-9".to_string())));
        // Nothing linked on failure
        assert_eq!(store.get("seq-1").unwrap().analysis_id, None);

        let err = store.link_sequences(&["seq-1".to_string()], "analysis-5");
        assert_eq!(err, Err(StoreError::UnknownAnalysis("analysis-5".to_string())));
    }
}
