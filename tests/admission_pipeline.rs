use admission_letters::models::{AdmissionBatch, ApplicantRecord, Config};
use admission_letters::report::{ReportSheet, ReportWriter};
use admission_letters::{AdmissionError, AdmissionPipeline};
use chrono::NaiveDate;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

const TEMPLATE: &str = "Dear {{ Student_Name }},\nYou have been admitted. {{ date }}\n";

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 5, 20).expect("valid date")
}

/// Lays out project_assets/ and extracted_files/ the way a real run leaves them
fn workspace(root: &Path, csv: &str) -> Config {
    let assets = root.join("project_assets");
    fs::create_dir_all(&assets).expect("assets dir");
    fs::write(assets.join("admission_template.txt"), TEMPLATE).expect("template");

    let extracted = root.join("extracted_files");
    fs::create_dir_all(&extracted).expect("extraction dir");
    fs::write(extracted.join("exams.csv"), csv).expect("csv");

    let mut config = Config::default();
    config.paths.workspace = root.to_path_buf();
    config.paths.template_file = "admission_template.txt".to_string();
    config.dataset.skip_download = true;
    config.name_seed = Some(2024);
    config
}

fn zip_entry(path: &Path, name: &str) -> String {
    let file = fs::File::open(path).expect("open archive");
    let mut archive = zip::ZipArchive::new(file).expect("valid zip");
    let mut entry = archive.by_name(name).expect("entry present");
    let mut content = String::new();
    entry.read_to_string(&mut content).expect("utf-8 entry");
    content
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .expect("file name")
        .to_string()
}

#[test]
fn three_row_example_admits_first_and_third() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = workspace(
        dir.path(),
        "gender,math score,reading score,writing score\n\
         female,90,90,90\n\
         male,70,90,90\n\
         female,85,85,85\n",
    );
    config.admission.vacancies = 2;

    let outcome = AdmissionPipeline::new(config, today()).run().expect("pipeline run");

    let rows: Vec<usize> = outcome.batch.students.iter().map(|s| s.row).collect();
    assert_eq!(rows, vec![1, 3]);
    assert_eq!(outcome.summary.total_applicants, 3);
    assert_eq!(outcome.letter_paths.len(), 2);

    for (student, path) in outcome.batch.students.iter().zip(&outcome.letter_paths) {
        let name = student.name.as_deref().expect("synthetic name");
        assert_eq!(file_name(path), format!("{}_Welcome_Letter.txt", name));
        let letter = fs::read_to_string(path).expect("letter written");
        assert!(letter.contains(&format!("Dear {},", name)));
        assert!(letter.contains("05/20/2025"));
    }

    let report = outcome.report_path.expect("report enabled by default");
    assert_eq!(file_name(&report), "admitted_students_2025.xlsx");
    assert!(report.is_file());
    let rels = zip_entry(&report, "xl/worksheets/_rels/sheet1.xml.rels");
    for student in &outcome.batch.students {
        let name = student.name.as_deref().expect("synthetic name");
        let target = format!(
            r#"Target="../admitted_students/{}_Welcome_Letter.txt""#,
            name.replace(' ', "%20")
        );
        assert!(rels.contains(&target), "{} missing from {}", target, rels);
    }
    let csv = outcome.csv_report_path.expect("csv copy enabled by default");
    assert_eq!(fs::read_to_string(csv).expect("csv").lines().count(), 3);
}

#[test]
fn seeded_runs_produce_the_same_letter_files() {
    let csv = "math score,reading score,writing score\n\
               95,95,95\n88,90,91\n81,86,86\n100,100,100\n";
    let first_dir = tempfile::tempdir().expect("tempdir");
    let second_dir = tempfile::tempdir().expect("tempdir");

    let first = AdmissionPipeline::new(workspace(first_dir.path(), csv), today())
        .run()
        .expect("first run");
    let second = AdmissionPipeline::new(workspace(second_dir.path(), csv), today())
        .run()
        .expect("second run");

    let names = |paths: &[PathBuf]| paths.iter().map(|p| file_name(p)).collect::<Vec<_>>();
    assert_eq!(names(&first.letter_paths), names(&second.letter_paths));
}

#[test]
fn rerun_replaces_previous_letters() {
    let csv = "math score,reading score,writing score\n95,95,95\n90,90,90\n";
    let dir = tempfile::tempdir().expect("tempdir");

    let mut config = workspace(dir.path(), csv);
    config.name_seed = Some(1);
    AdmissionPipeline::new(config.clone(), today()).run().expect("first run");
    config.name_seed = Some(2);
    let outcome = AdmissionPipeline::new(config, today()).run().expect("second run");

    let on_disk = fs::read_dir(&outcome.letters_dir).expect("letters dir").count();
    assert_eq!(on_disk, outcome.letter_paths.len());
}

#[test]
fn no_report_run_writes_letters_only() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = workspace(dir.path(), "math score,reading score,writing score\n99,99,99\n");
    config.report.enabled = false;

    let outcome = AdmissionPipeline::new(config, today()).run().expect("run");
    assert_eq!(outcome.letter_paths.len(), 1);
    assert!(outcome.report_path.is_none());
    assert!(!dir.path().join("admission_lists").exists());
}

#[test]
fn missing_score_column_fails_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = workspace(dir.path(), "math score,reading score\n90,90\n");

    let err = AdmissionPipeline::new(config, today()).run().expect_err("no writing score");
    assert!(matches!(err, AdmissionError::MissingColumn(_)));
}

#[test]
fn missing_template_fails_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut config = workspace(dir.path(), "math score,reading score,writing score\n90,90,90\n");
    config.paths.template_file = "nope.docx".to_string();

    let err = AdmissionPipeline::new(config, today()).run().expect_err("template absent");
    assert!(matches!(err, AdmissionError::Io { .. }));
}

#[test]
fn report_links_each_row_to_its_letter() {
    let dir = tempfile::tempdir().expect("tempdir");
    let letters = dir.path().join("letters");
    let reports = dir.path().join("lists");
    fs::create_dir_all(&letters).expect("letters dir");
    fs::create_dir_all(&reports).expect("reports dir");

    let names = ["Ada Lovelace", "Alan Turing"];
    let students = names
        .iter()
        .enumerate()
        .map(|(i, name)| {
            let letter = letters.join(format!("{}_Welcome_Letter.docx", name));
            fs::write(&letter, b"letter").expect("letter file");
            let mut record =
                ApplicantRecord::new(i + 1, vec!["95".into(), "95".into(), "95".into()], 95, 95, 95);
            record.name = Some(name.to_string());
            record.letter_path = Some(letter);
            record
        })
        .collect();
    let batch = AdmissionBatch {
        headers: vec![
            "math score".to_string(),
            "reading score".to_string(),
            "writing score".to_string(),
        ],
        students,
    };

    let sheet = ReportSheet::from_batch(&batch).expect("sheet");
    let path = ReportWriter::new(&reports)
        .write_xlsx(&sheet, today())
        .expect("xlsx written");

    let worksheet = zip_entry(&path, "xl/worksheets/sheet1.xml");
    assert_eq!(worksheet.matches("<row ").count(), 3, "header plus two data rows");
    assert_eq!(worksheet.matches("<hyperlink ").count(), 2);

    // link column is the 7th: G
    let rels = zip_entry(&path, "xl/worksheets/_rels/sheet1.xml.rels");
    for (i, name) in names.iter().enumerate() {
        let rel_id = format!("rId{}", i + 1);
        assert!(worksheet.contains(&format!(r#"<hyperlink ref="G{}" r:id="{}""#, i + 2, rel_id)));

        let relationship = rels
            .split("<Relationship ")
            .find(|r| r.contains(&format!(r#"Id="{}""#, rel_id)))
            .expect("relationship for row");
        let file = format!("{}_Welcome_Letter.docx", name);
        assert!(
            relationship.contains(&format!(
                r#"Target="../letters/{}""#,
                file.replace(' ', "%20")
            )),
            "{}",
            relationship
        );
        assert!(relationship.contains(r#"TargetMode="External""#));
        assert!(reports.join("..").join("letters").join(&file).is_file());
    }
}

#[cfg(unix)]
#[test]
fn full_run_uses_credentials_and_extracts_the_archive() {
    let dir = tempfile::tempdir().expect("tempdir");
    let root = dir.path();
    let mut config = workspace(root, "");
    fs::remove_dir_all(root.join("extracted_files")).expect("start without extracted data");
    fs::write(
        root.join("project_assets").join("kaggle.json"),
        r#"{"username":"ada","key":"secret"}"#,
    )
    .expect("credentials");

    // the archive is already present; `true` stands in for the download tool
    fs::create_dir_all(root.join("download")).expect("download dir");
    let zip_path = root.join("download").join(config.archive_file_name());
    let mut writer = zip::ZipWriter::new(fs::File::create(&zip_path).expect("zip file"));
    writer
        .start_file("exams.csv", zip::write::SimpleFileOptions::default())
        .expect("entry");
    writer
        .write_all(b"math score,reading score,writing score\n92,93,94\n50,50,50\n")
        .expect("csv bytes");
    writer.finish().expect("finish zip");

    config.dataset.skip_download = false;
    config.dataset.download_command = "true".to_string();

    let outcome = AdmissionPipeline::new(config, today()).run().expect("run");
    assert!(root.join("extracted_files").join("exams.csv").is_file());
    assert_eq!(outcome.batch.len(), 1);
    assert_eq!(outcome.batch.students[0].total_score, 279);
    assert!(std::env::var("KAGGLE_KEY").map(|k| k != "secret").unwrap_or(true));
}
