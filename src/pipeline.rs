use crate::analyzer::{AdmissionAnalyzer, SelectionSummary};
use crate::anonymizer::NameGenerator;
use crate::error::{AdmissionError, AdmissionResult};
use crate::fetcher::{self, DatasetFetcher};
use crate::letters::{self, LetterGenerator, LetterTemplate};
use crate::models::{AdmissionBatch, Config};
use crate::report::{ReportSheet, ReportWriter};
use chrono::NaiveDate;
use std::fs;
use std::path::PathBuf;
use tracing::{info, info_span};

#[derive(Debug)]
pub struct RunOutcome {
    pub summary: SelectionSummary,
    pub batch: AdmissionBatch,
    pub letters_dir: PathBuf,
    pub letter_paths: Vec<PathBuf>,
    pub report_path: Option<PathBuf>,
    pub csv_report_path: Option<PathBuf>,
}

/// fetch → extract → load → select → anonymize → letters → report, in that order.
/// The first failing stage ends the run.
pub struct AdmissionPipeline {
    config: Config,
    today: NaiveDate,
}

impl AdmissionPipeline {
    pub fn new(config: Config, today: NaiveDate) -> Self {
        Self { config, today }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn prepare_directories(&self) -> AdmissionResult<()> {
        let mut dirs = vec![
            self.config.download_path(),
            self.config.extraction_path(),
            self.config.letters_path(),
        ];
        if self.config.report.enabled {
            dirs.push(self.config.reports_path());
        }
        for dir in dirs {
            fs::create_dir_all(&dir).map_err(|err| AdmissionError::io(&dir, err))?;
        }
        Ok(())
    }

    pub fn fetch_dataset(&self) -> AdmissionResult<()> {
        let _span = info_span!("fetch").entered();
        let credentials = fetcher::read_credentials(&self.config.credentials_path())?;
        let fetcher = DatasetFetcher::new(
            self.config.dataset.download_command.clone(),
            self.config.dataset.name.clone(),
        );
        fetcher.download(credentials, &self.config.download_path())?;

        let zip_path = self
            .config
            .download_path()
            .join(self.config.archive_file_name());
        fetcher::extract_archive(&zip_path, &self.config.extraction_path())
    }

    pub fn select_students(&self) -> AdmissionResult<(AdmissionBatch, SelectionSummary)> {
        let _span = info_span!("select").entered();
        let csv_path = fetcher::csv_path(&self.config.extraction_path(), &self.config.dataset.csv_file);
        let table = fetcher::load_applicants(&csv_path)?;
        let (mut batch, summary) = AdmissionAnalyzer::new(self.config.admission).select(table);
        NameGenerator::new(self.config.name_seed).anonymize(&mut batch);
        Ok((batch, summary))
    }

    pub fn write_letters(&self, batch: &mut AdmissionBatch) -> AdmissionResult<Vec<PathBuf>> {
        let _span = info_span!("letters").entered();
        let letters_dir = self.config.letters_path();
        // a bad template must not cost the previous run its letters
        let template = LetterTemplate::load(&self.config.template_path())?;
        if self.config.letters.clean_previous {
            letters::clean_previous_letters(&letters_dir)?;
        }
        LetterGenerator::new(template, letters_dir).generate(batch, self.today)
    }

    pub fn write_reports(
        &self,
        batch: &AdmissionBatch,
    ) -> AdmissionResult<(Option<PathBuf>, Option<PathBuf>)> {
        if !self.config.report.enabled {
            info!("report generation disabled");
            return Ok((None, None));
        }
        let _span = info_span!("report").entered();
        let sheet = ReportSheet::from_batch(batch)?;
        let writer = ReportWriter::new(self.config.reports_path());
        let xlsx = writer.write_xlsx(&sheet, self.today)?;
        let csv = if self.config.report.csv {
            Some(writer.write_csv(&sheet, self.today)?)
        } else {
            None
        };
        Ok((Some(xlsx), csv))
    }

    pub fn run(&self) -> AdmissionResult<RunOutcome> {
        self.prepare_directories()?;

        if self.config.dataset.skip_download {
            info!("skipping download, reusing extracted dataset");
        } else {
            self.fetch_dataset()?;
        }

        let (mut batch, summary) = self.select_students()?;
        let letter_paths = self.write_letters(&mut batch)?;
        let (report_path, csv_report_path) = self.write_reports(&batch)?;

        let letters_dir = self.config.letters_path();
        info!(dir = %letters_dir.display(), letters = letter_paths.len(), "student letters created");

        Ok(RunOutcome {
            summary,
            batch,
            letters_dir,
            letter_paths,
            report_path,
            csv_report_path,
        })
    }
}
