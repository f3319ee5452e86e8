use crate::error::{AdmissionError, AdmissionResult};
use crate::models::AdmissionBatch;
use chrono::NaiveDate;
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

pub const NAME_PLACEHOLDER: &str = "Student_Name";
pub const DATE_PLACEHOLDER: &str = "date";
pub const LETTER_SUFFIX: &str = "_Welcome_Letter";
pub const DATE_FORMAT: &str = "%m/%d/%Y";

#[derive(Debug, Clone)]
enum TemplateBody {
    Text(String),
    /// Raw bytes of a Word document; placeholders live in its XML parts
    Docx(Vec<u8>),
}

#[derive(Debug, Clone)]
pub struct LetterTemplate {
    body: TemplateBody,
    extension: Option<String>,
    placeholder: Regex,
    split_open: Regex,
    split_close: Regex,
    split_placeholder: Regex,
    markup: Regex,
}

impl LetterTemplate {
    pub fn load(path: &Path) -> AdmissionResult<Self> {
        let bytes = fs::read(path).map_err(|err| AdmissionError::io(path, err))?;
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_string);

        let body = match extension.as_deref() {
            Some(ext) if ext.eq_ignore_ascii_case("docx") => TemplateBody::Docx(bytes),
            _ => TemplateBody::Text(String::from_utf8(bytes).map_err(|_| {
                AdmissionError::Template(format!("{} is not valid UTF-8 text", path.display()))
            })?),
        };
        Self::with_body(body, extension)
    }

    pub fn from_text(text: impl Into<String>, extension: Option<&str>) -> AdmissionResult<Self> {
        Self::with_body(TemplateBody::Text(text.into()), extension.map(str::to_string))
    }

    fn with_body(body: TemplateBody, extension: Option<String>) -> AdmissionResult<Self> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|err| AdmissionError::Template(err.to_string()))
        };
        Ok(Self {
            body,
            extension,
            placeholder: compile(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}")?,
            split_open: compile(r"\{(?:<[^>]*>)+\{")?,
            split_close: compile(r"\}(?:<[^>]*>)+\}")?,
            split_placeholder: compile(r"\{\{(?:[^}<]|<[^>]*>)*?\}\}")?,
            markup: compile(r"<[^>]*>")?,
        })
    }

    pub fn extension(&self) -> Option<&str> {
        self.extension.as_deref()
    }

    pub fn file_name_for(&self, student_name: &str) -> String {
        match &self.extension {
            Some(ext) => format!("{}{}.{}", student_name, LETTER_SUFFIX, ext),
            None => format!("{}{}", student_name, LETTER_SUFFIX),
        }
    }

    pub fn render(&self, context: &HashMap<&str, String>) -> AdmissionResult<Vec<u8>> {
        match &self.body {
            TemplateBody::Text(text) => Ok(self.substitute(text, context, false)?.into_bytes()),
            TemplateBody::Docx(bytes) => self.render_docx(bytes, context),
        }
    }

    fn substitute(
        &self,
        text: &str,
        context: &HashMap<&str, String>,
        escape_xml: bool,
    ) -> AdmissionResult<String> {
        let mut unknown = None;
        let rendered = self.placeholder.replace_all(text, |caps: &Captures| {
            let key = &caps[1];
            match context.get(key) {
                Some(value) if escape_xml => xml_escape(value),
                Some(value) => value.clone(),
                None => {
                    unknown.get_or_insert_with(|| key.to_string());
                    caps[0].to_string()
                }
            }
        });
        if let Some(key) = unknown {
            return Err(AdmissionError::Template(format!(
                "template uses unknown placeholder '{}'",
                key
            )));
        }
        Ok(rendered.into_owned())
    }

    /// Word splits typed text into runs, so tags between the braces and inside
    /// `{{ ... }}` are dropped first.
    fn join_split_placeholders(&self, xml: &str) -> String {
        let braces = self.split_open.replace_all(xml, "{{");
        let braces = self.split_close.replace_all(&braces, "}}");
        self.split_placeholder
            .replace_all(&braces, |caps: &Captures| {
                self.markup.replace_all(&caps[0], "").into_owned()
            })
            .into_owned()
    }

    fn render_docx(&self, bytes: &[u8], context: &HashMap<&str, String>) -> AdmissionResult<Vec<u8>> {
        let zip_err = |err: zip::result::ZipError| AdmissionError::Template(err.to_string());
        let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(zip_err)?;
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i).map_err(zip_err)?;
            let name = entry.name().to_string();

            if !is_docx_text_part(&name) {
                writer.raw_copy_file(entry).map_err(zip_err)?;
                continue;
            }

            let mut xml = String::new();
            entry
                .read_to_string(&mut xml)
                .map_err(|err| AdmissionError::Template(format!("{}: {}", name, err)))?;
            let rendered = self.substitute(&self.join_split_placeholders(&xml), context, true)?;

            let options = SimpleFileOptions::default().compression_method(entry.compression());
            writer.start_file(name.as_str(), options).map_err(zip_err)?;
            writer
                .write_all(rendered.as_bytes())
                .map_err(|err| AdmissionError::Template(format!("{}: {}", name, err)))?;
        }

        Ok(writer.finish().map_err(zip_err)?.into_inner())
    }
}

fn is_docx_text_part(name: &str) -> bool {
    name == "word/document.xml"
        || (name.starts_with("word/header") && name.ends_with(".xml"))
        || (name.starts_with("word/footer") && name.ends_with(".xml"))
}

fn xml_escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

pub struct LetterGenerator {
    template: LetterTemplate,
    output_dir: PathBuf,
}

impl LetterGenerator {
    pub fn new(template: LetterTemplate, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            template,
            output_dir: output_dir.into(),
        }
    }

    /// Writes one letter per student and records its path on the student.
    /// Stops at the first letter that cannot be rendered or written.
    pub fn generate(&self, batch: &mut AdmissionBatch, today: NaiveDate) -> AdmissionResult<Vec<PathBuf>> {
        info!(
            students = batch.len(),
            dir = %self.output_dir.display(),
            "generating letters to admitted students"
        );
        let date = today.format(DATE_FORMAT).to_string();
        let mut paths = Vec::with_capacity(batch.len());

        for student in &mut batch.students {
            let name = student.name.clone().ok_or_else(|| {
                AdmissionError::Template(format!("row {} has no synthetic name", student.row))
            })?;
            let path = self.output_dir.join(self.template.file_name_for(&name));

            let mut context = HashMap::new();
            context.insert(NAME_PLACEHOLDER, name);
            context.insert(DATE_PLACEHOLDER, date.clone());

            let rendered = self.template.render(&context).map_err(|err| AdmissionError::Letter {
                path: path.clone(),
                reason: err.to_string(),
            })?;
            fs::write(&path, rendered).map_err(|err| AdmissionError::Letter {
                path: path.clone(),
                reason: err.to_string(),
            })?;
            debug!(path = %path.display(), "letter written");

            student.letter_path = Some(path.clone());
            paths.push(path);
        }

        Ok(paths)
    }
}

/// Remove letters left by earlier runs; synthetic names change between runs.
pub fn clean_previous_letters(letters_dir: &Path) -> AdmissionResult<usize> {
    if !letters_dir.exists() {
        return Ok(0);
    }

    let mut removed = 0;
    let entries = fs::read_dir(letters_dir).map_err(|err| AdmissionError::io(letters_dir, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| AdmissionError::io(letters_dir, err))?;
        let path = entry.path();
        let is_letter = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.contains(LETTER_SUFFIX))
            .unwrap_or(false);
        if !is_letter || !path.is_file() {
            continue;
        }
        match fs::remove_file(&path) {
            Ok(()) => removed += 1,
            Err(err) => warn!(path = %path.display(), error = %err, "could not remove old letter"),
        }
    }

    if removed > 0 {
        info!(removed, "cleaned previous letters");
    }
    Ok(removed)
}
