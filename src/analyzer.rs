use crate::models::{AdmissionBatch, AdmissionCriteria, ApplicantRecord, ApplicantTable};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionSummary {
    pub total_applicants: usize,
    pub qualified_applicants: usize,
    pub admitted: usize,
    pub vacancies: usize,
    pub top_total_score: Option<u32>,
    /// Lowest total that still got a place
    pub cutoff_total_score: Option<u32>,
}

pub struct AdmissionAnalyzer {
    criteria: AdmissionCriteria,
}

impl AdmissionAnalyzer {
    pub fn new(criteria: AdmissionCriteria) -> Self {
        Self { criteria }
    }

    pub fn criteria(&self) -> &AdmissionCriteria {
        &self.criteria
    }

    /// Threshold filter, then rank by total score and keep the best `vacancies` rows.
    pub fn select(&self, table: ApplicantTable) -> (AdmissionBatch, SelectionSummary) {
        let total_applicants = table.records.len();

        let mut qualified: Vec<ApplicantRecord> = table
            .records
            .into_iter()
            .filter(|record| record.meets(&self.criteria))
            .collect();
        let qualified_applicants = qualified.len();

        // sort_by is stable, so equal totals keep their CSV order
        qualified.sort_by(|a, b| b.total_score.cmp(&a.total_score));
        qualified.truncate(self.criteria.vacancies);

        let summary = SelectionSummary {
            total_applicants,
            qualified_applicants,
            admitted: qualified.len(),
            vacancies: self.criteria.vacancies,
            top_total_score: qualified.first().map(|r| r.total_score),
            cutoff_total_score: qualified.last().map(|r| r.total_score),
        };

        info!(
            read = summary.total_applicants,
            qualified = summary.qualified_applicants,
            admitted = summary.admitted,
            vacancies = summary.vacancies,
            "processed student data"
        );

        (
            AdmissionBatch {
                headers: table.headers,
                students: qualified,
            },
            summary,
        )
    }
}
