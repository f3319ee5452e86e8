use crate::error::{AdmissionError, AdmissionResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

pub const MATH_SCORE_COLUMN: &str = "math score";
pub const READING_SCORE_COLUMN: &str = "reading score";
pub const WRITING_SCORE_COLUMN: &str = "writing score";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    /// Seed for the synthetic name generator; unset means a fresh name set every run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_seed: Option<u64>,
    pub dataset: DatasetConfig,
    pub admission: AdmissionCriteria,
    pub paths: PathsConfig,
    pub letters: LettersConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DatasetConfig {
    /// Kaggle dataset identifier, `owner/slug`
    pub name: String,
    pub csv_file: String,
    pub download_command: String,
    /// Reuse an already extracted CSV instead of calling the download tool
    pub skip_download: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AdmissionCriteria {
    pub min_math_score: u32,
    pub min_reading_score: u32,
    pub min_writing_score: u32,
    pub vacancies: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub workspace: PathBuf,
    pub assets: PathBuf,
    pub credentials_file: String,
    pub template_file: String,
    pub download_dir: String,
    pub extraction_dir: String,
    pub letters_dir: String,
    pub reports_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LettersConfig {
    pub clean_previous: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReportConfig {
    pub enabled: bool,
    pub csv: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            name_seed: None,
            dataset: DatasetConfig::default(),
            admission: AdmissionCriteria::default(),
            paths: PathsConfig::default(),
            letters: LettersConfig::default(),
            report: ReportConfig::default(),
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            name: "rkiattisak/student-performance-in-mathematics".to_string(),
            csv_file: "exams.csv".to_string(),
            download_command: "kaggle".to_string(),
            skip_download: false,
        }
    }
}

impl Default for AdmissionCriteria {
    fn default() -> Self {
        Self {
            min_math_score: 80,
            min_reading_score: 85,
            min_writing_score: 85,
            vacancies: 100,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            workspace: PathBuf::from("."),
            assets: PathBuf::from("project_assets"),
            credentials_file: "kaggle.json".to_string(),
            template_file: "admission_template.docx".to_string(),
            download_dir: "download".to_string(),
            extraction_dir: "extracted_files".to_string(),
            letters_dir: "admitted_students".to_string(),
            reports_dir: "admission_lists".to_string(),
        }
    }
}

impl Default for LettersConfig {
    fn default() -> Self {
        Self {
            clean_previous: true,
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            csv: true,
        }
    }
}

impl Config {
    pub fn load_from_file(file_path: impl AsRef<Path>) -> AdmissionResult<Self> {
        let file_path = file_path.as_ref();
        let content = std::fs::read_to_string(file_path)
            .map_err(|err| AdmissionError::io(file_path, err))?;
        let config: Config = toml::from_str(&content)
            .map_err(|err| AdmissionError::Config(format!("{}: {}", file_path.display(), err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, file_path: impl AsRef<Path>) -> AdmissionResult<()> {
        let file_path = file_path.as_ref();
        let content =
            toml::to_string_pretty(self).map_err(|err| AdmissionError::Config(err.to_string()))?;
        std::fs::write(file_path, content).map_err(|err| AdmissionError::io(file_path, err))?;
        Ok(())
    }

    pub fn validate(&self) -> AdmissionResult<()> {
        if self.dataset.name.trim().is_empty() {
            return Err(AdmissionError::Config("dataset.name must not be empty".to_string()));
        }
        if self.dataset.name.trim_end_matches('/').rsplit('/').next().unwrap_or("").is_empty() {
            return Err(AdmissionError::Config(format!(
                "dataset.name '{}' has no slug",
                self.dataset.name
            )));
        }
        if self.dataset.csv_file.trim().is_empty() {
            return Err(AdmissionError::Config("dataset.csv_file must not be empty".to_string()));
        }
        Ok(())
    }

    /// Zip file the download tool leaves behind: the last segment of the dataset id
    pub fn archive_file_name(&self) -> String {
        let slug = self
            .dataset
            .name
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&self.dataset.name);
        format!("{}.zip", slug)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.paths
            .workspace
            .join(&self.paths.assets)
            .join(&self.paths.credentials_file)
    }

    pub fn template_path(&self) -> PathBuf {
        self.paths
            .workspace
            .join(&self.paths.assets)
            .join(&self.paths.template_file)
    }

    pub fn download_path(&self) -> PathBuf {
        self.paths.workspace.join(&self.paths.download_dir)
    }

    pub fn extraction_path(&self) -> PathBuf {
        self.paths.workspace.join(&self.paths.extraction_dir)
    }

    pub fn letters_path(&self) -> PathBuf {
        self.paths.workspace.join(&self.paths.letters_dir)
    }

    pub fn reports_path(&self) -> PathBuf {
        self.paths.workspace.join(&self.paths.reports_dir)
    }
}

/// Username/key pair handed to the dataset tool through its child environment only
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct KaggleCredentials {
    pub username: String,
    pub key: String,
}

impl fmt::Debug for KaggleCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KaggleCredentials")
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicantRecord {
    /// 1-based data row in the source CSV
    pub row: usize,
    /// Cell values as read, aligned with the table headers
    pub fields: Vec<String>,
    pub math_score: u32,
    pub reading_score: u32,
    pub writing_score: u32,
    pub total_score: u32,
    pub name: Option<String>,
    pub letter_path: Option<PathBuf>,
}

impl ApplicantRecord {
    pub fn new(row: usize, fields: Vec<String>, math: u32, reading: u32, writing: u32) -> Self {
        Self {
            row,
            fields,
            math_score: math,
            reading_score: reading,
            writing_score: writing,
            total_score: math.saturating_add(reading).saturating_add(writing),
            name: None,
            letter_path: None,
        }
    }

    /// `None` when the sum does not fit a `u32`
    pub fn checked_total(math: u32, reading: u32, writing: u32) -> Option<u32> {
        math.checked_add(reading)?.checked_add(writing)
    }

    pub fn meets(&self, criteria: &AdmissionCriteria) -> bool {
        self.math_score >= criteria.min_math_score
            && self.reading_score >= criteria.min_reading_score
            && self.writing_score >= criteria.min_writing_score
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicantTable {
    pub headers: Vec<String>,
    pub records: Vec<ApplicantRecord>,
}

/// Ranked, thresholded and capped selection of applicants
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionBatch {
    pub headers: Vec<String>,
    pub students: Vec<ApplicantRecord>,
}

impl AdmissionBatch {
    pub fn len(&self) -> usize {
        self.students.len()
    }

    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
    }
}
