use crate::error::{AdmissionError, AdmissionResult};
use crate::models::{
    ApplicantRecord, ApplicantTable, KaggleCredentials, MATH_SCORE_COLUMN, READING_SCORE_COLUMN,
    WRITING_SCORE_COLUMN,
};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};
use zip::ZipArchive;

const TOTAL_SCORE_COLUMN: &str = "total score";

pub fn read_credentials(path: &Path) -> AdmissionResult<KaggleCredentials> {
    info!(path = %path.display(), "loading credentials");
    let content = fs::read_to_string(path).map_err(|err| AdmissionError::Credentials {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })?;
    let credentials: KaggleCredentials =
        serde_json::from_str(&content).map_err(|err| AdmissionError::Credentials {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })?;

    if credentials.username.trim().is_empty() || credentials.key.trim().is_empty() {
        return Err(AdmissionError::Credentials {
            path: path.to_path_buf(),
            reason: "username and key must both be set".to_string(),
        });
    }
    Ok(credentials)
}

/// Wraps the external `kaggle` CLI used to pull the dataset archive
pub struct DatasetFetcher {
    program: String,
    dataset: String,
}

impl DatasetFetcher {
    pub fn new(program: impl Into<String>, dataset: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            dataset: dataset.into(),
        }
    }

    /// Credentials go into the child's environment, never into this process's.
    pub fn command(&self, credentials: &KaggleCredentials, download_dir: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .arg("datasets")
            .arg("download")
            .arg("-d")
            .arg(&self.dataset)
            .arg("-p")
            .arg(download_dir)
            .env("KAGGLE_USERNAME", &credentials.username)
            .env("KAGGLE_KEY", &credentials.key);
        command
    }

    pub fn download(
        &self,
        credentials: KaggleCredentials,
        download_dir: &Path,
    ) -> AdmissionResult<()> {
        info!(dataset = %self.dataset, dir = %download_dir.display(), "downloading dataset");
        let output = self
            .command(&credentials, download_dir)
            .output()
            .map_err(|err| {
                AdmissionError::Download(format!("could not run '{}': {}", self.program, err))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AdmissionError::Download(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        debug!(stdout = %String::from_utf8_lossy(&output.stdout).trim(), "download finished");
        Ok(())
    }
}

pub fn extract_archive(zip_path: &Path, extraction_dir: &Path) -> AdmissionResult<()> {
    info!(archive = %zip_path.display(), dir = %extraction_dir.display(), "extracting dataset");
    let file = File::open(zip_path).map_err(|err| AdmissionError::io(zip_path, err))?;
    let mut archive = ZipArchive::new(file).map_err(|source| AdmissionError::Archive {
        path: zip_path.to_path_buf(),
        source,
    })?;
    archive
        .extract(extraction_dir)
        .map_err(|source| AdmissionError::Archive {
            path: zip_path.to_path_buf(),
            source,
        })?;
    debug!(entries = archive.len(), "archive extracted");
    Ok(())
}

pub fn load_applicants(csv_path: &Path) -> AdmissionResult<ApplicantTable> {
    info!(path = %csv_path.display(), "loading student data");
    let mut reader = ReaderBuilder::new().trim(Trim::All).from_path(csv_path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let math_idx = column_index(&headers, MATH_SCORE_COLUMN)?;
    let reading_idx = column_index(&headers, READING_SCORE_COLUMN)?;
    let writing_idx = column_index(&headers, WRITING_SCORE_COLUMN)?;

    let mut records = Vec::new();
    for (i, result) in reader.records().enumerate() {
        let row = i + 1;
        let record = result?;
        let math = parse_score(&record, row, math_idx, MATH_SCORE_COLUMN)?;
        let reading = parse_score(&record, row, reading_idx, READING_SCORE_COLUMN)?;
        let writing = parse_score(&record, row, writing_idx, WRITING_SCORE_COLUMN)?;
        if ApplicantRecord::checked_total(math, reading, writing).is_none() {
            return Err(AdmissionError::InvalidScore {
                row,
                column: TOTAL_SCORE_COLUMN.to_string(),
                value: format!("{} + {} + {}", math, reading, writing),
            });
        }
        let fields = record.iter().map(str::to_string).collect();
        records.push(ApplicantRecord::new(row, fields, math, reading, writing));
    }

    info!(rows = records.len(), "student data loaded");
    Ok(ApplicantTable { headers, records })
}

pub fn csv_path(extraction_dir: &Path, csv_file: &str) -> PathBuf {
    extraction_dir.join(csv_file)
}

fn column_index(headers: &[String], column: &str) -> AdmissionResult<usize> {
    headers
        .iter()
        .position(|header| header == column)
        .ok_or_else(|| AdmissionError::MissingColumn(column.to_string()))
}

fn parse_score(record: &StringRecord, row: usize, idx: usize, column: &str) -> AdmissionResult<u32> {
    let value = record.get(idx).unwrap_or("");
    value.parse::<u32>().map_err(|_| AdmissionError::InvalidScore {
        row,
        column: column.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;
    use std::io::Write;

    const EXAMS_CSV: &str = "\
gender,race/ethnicity,math score,reading score,writing score
female,group B,90,91,92
male,group C,70,90,90
";

    fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).expect("write fixture");
        path
    }

    #[test]
    fn loads_scores_and_keeps_original_columns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(dir.path(), "exams.csv", EXAMS_CSV);

        let table = load_applicants(&path).expect("load");
        assert_eq!(table.headers.len(), 5);
        assert_eq!(table.records.len(), 2);

        let first = &table.records[0];
        assert_eq!(first.row, 1);
        assert_eq!(first.fields[0], "female");
        assert_eq!(first.total_score, 90 + 91 + 92);
        assert_eq!(table.records[1].math_score, 70);
    }

    #[test]
    fn missing_score_column_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(
            dir.path(),
            "exams.csv",
            "gender,math score,reading score\nfemale,90,90\n",
        );

        let err = load_applicants(&path).expect_err("writing score is absent");
        assert!(matches!(err, AdmissionError::MissingColumn(ref c) if c == "writing score"));
    }

    #[test]
    fn non_numeric_score_names_row_and_column() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(
            dir.path(),
            "exams.csv",
            "math score,reading score,writing score\n90,90,90\n80,abc,85\n",
        );

        match load_applicants(&path) {
            Err(AdmissionError::InvalidScore { row, column, value }) => {
                assert_eq!(row, 2);
                assert_eq!(column, "reading score");
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn scores_too_large_to_total_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(
            dir.path(),
            "exams.csv",
            "math score,reading score,writing score\n4000000000,4000000000,4000000000\n",
        );

        match load_applicants(&path) {
            Err(AdmissionError::InvalidScore { row, column, .. }) => {
                assert_eq!(row, 1);
                assert_eq!(column, "total score");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn credentials_are_read_from_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(dir.path(), "kaggle.json", r#"{"username":"ada","key":"k1"}"#);

        let credentials = read_credentials(&path).expect("credentials");
        assert_eq!(credentials.username, "ada");
        assert_eq!(credentials.key, "k1");
    }

    #[test]
    fn missing_credentials_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = read_credentials(&dir.path().join("kaggle.json")).expect_err("no file");
        assert!(matches!(err, AdmissionError::Credentials { .. }));
    }

    #[test]
    fn blank_key_is_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write_file(dir.path(), "kaggle.json", r#"{"username":"ada","key":" "}"#);
        assert!(read_credentials(&path).is_err());
    }

    #[test]
    fn download_command_scopes_credentials_to_child() {
        let fetcher = DatasetFetcher::new("kaggle", "owner/some-dataset");
        let credentials = KaggleCredentials {
            username: "ada".to_string(),
            key: "k1".to_string(),
        };
        let command = fetcher.command(&credentials, Path::new("download"));

        let args: Vec<&OsStr> = command.get_args().collect();
        assert_eq!(
            args,
            ["datasets", "download", "-d", "owner/some-dataset", "-p", "download"]
                .iter()
                .map(OsStr::new)
                .collect::<Vec<_>>()
        );
        let envs: Vec<(&OsStr, Option<&OsStr>)> = command.get_envs().collect();
        assert!(envs.contains(&(OsStr::new("KAGGLE_USERNAME"), Some(OsStr::new("ada")))));
        assert!(envs.contains(&(OsStr::new("KAGGLE_KEY"), Some(OsStr::new("k1")))));
    }

    #[test]
    fn unknown_download_tool_fails_cleanly() {
        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = DatasetFetcher::new("definitely-not-a-real-kaggle-binary", "owner/ds");
        let credentials = KaggleCredentials {
            username: "ada".to_string(),
            key: "k1".to_string(),
        };
        let err = fetcher
            .download(credentials, dir.path())
            .expect_err("tool is missing");
        assert!(matches!(err, AdmissionError::Download(_)));
    }

    #[test]
    fn extracts_csv_from_archive() {
        let dir = tempfile::tempdir().expect("tempdir");
        let zip_path = dir.path().join("student-performance-in-mathematics.zip");
        {
            let file = File::create(&zip_path).expect("create zip");
            let mut writer = zip::ZipWriter::new(file);
            writer
                .start_file("exams.csv", zip::write::SimpleFileOptions::default())
                .expect("start entry");
            writer.write_all(EXAMS_CSV.as_bytes()).expect("write entry");
            writer.finish().expect("finish zip");
        }

        let out = dir.path().join("extracted");
        fs::create_dir_all(&out).expect("mkdir");
        extract_archive(&zip_path, &out).expect("extract");

        let extracted = fs::read_to_string(csv_path(&out, "exams.csv")).expect("csv present");
        assert_eq!(extracted, EXAMS_CSV);
    }

    #[test]
    fn missing_archive_is_an_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = extract_archive(&dir.path().join("nope.zip"), dir.path()).expect_err("absent");
        assert!(matches!(err, AdmissionError::Io { .. }));
    }
}
