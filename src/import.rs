//! Reading book documents from NDJSON or JSON-array files.

use crate::errors::RunnerError;
use bson::Document as BsonDocument;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Auto,
    Ndjson,
    JsonArray,
}

#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub format: ImportFormat,
    pub skip_errors: bool,
    /// Rejected lines are written here as `{"line":..,"error":..,"record":..}`.
    pub error_sidecar: Option<PathBuf>,
    pub progress_every: Option<usize>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self { format: ImportFormat::Auto, skip_errors: false, error_sidecar: None, progress_every: Some(1000) }
    }
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub read: u64,
    pub skipped: u64,
}

/// Picks NDJSON or JSON-array from the file extension, then from the first non-blank byte.
///
/// # Errors
/// Returns an I/O error if the reader fails.
pub fn detect_format<R: BufRead>(reader: &mut R, path: &Path) -> Result<ImportFormat, RunnerError> {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("ndjson" | "jsonl") => return Ok(ImportFormat::Ndjson),
        _ => {}
    }
    let buf = reader.fill_buf()?;
    let first = buf.iter().find(|b| !b.is_ascii_whitespace());
    Ok(if first == Some(&b'[') { ImportFormat::JsonArray } else { ImportFormat::Ndjson })
}

fn to_document(v: &serde_json::Value) -> Result<BsonDocument, RunnerError> {
    crate::utils::json::object_to_document(v).map_err(RunnerError::Import)
}

fn escape_json(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

/// Reads documents from `reader` in the given format.
///
/// # Errors
/// Returns `RunnerError::Import` on malformed input (unless `skip_errors` is set for NDJSON)
/// and `RunnerError::Io` on read failures.
pub fn read_documents<R: Read>(
    reader: R,
    format: ImportFormat,
    opts: &ImportOptions,
) -> Result<(Vec<BsonDocument>, ImportReport), RunnerError> {
    let mut report = ImportReport::default();
    let mut out = Vec::new();
    let mut reader = BufReader::new(reader);
    let format = match format {
        ImportFormat::Auto => detect_format(&mut reader, Path::new(""))?,
        other => other,
    };
    if format == ImportFormat::JsonArray {
        let mut s = String::new();
        reader.read_to_string(&mut s)?;
        let val: serde_json::Value = serde_json::from_str(&s)?;
        let arr = val.as_array().ok_or_else(|| RunnerError::Import("expected JSON array".into()))?;
        for v in arr {
            out.push(to_document(v)?);
            report.read += 1;
        }
        return Ok((out, report));
    }

    let mut sidecar = match &opts.error_sidecar {
        Some(p) if opts.skip_errors => Some(File::create(p)?),
        _ => None,
    };
    let mut line_no: usize = 0;
    let mut buf = String::with_capacity(8 * 1024);
    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        line_no += 1;
        let line = buf.trim();
        if line.is_empty() {
            continue;
        }
        let parsed = serde_json::from_str::<serde_json::Value>(line)
            .map_err(|e| RunnerError::Import(format!("line {line_no}: {e}")))
            .and_then(|v| to_document(&v));
        match parsed {
            Ok(d) => {
                out.push(d);
                report.read += 1;
                if let Some(n) = opts.progress_every
                    && line_no % n == 0
                {
                    log::info!("read {} records (ndjson)", report.read);
                }
            }
            Err(e) if opts.skip_errors => {
                if let Some(f) = sidecar.as_mut() {
                    writeln!(
                        f,
                        "{{\"line\":{},\"error\":{},\"record\":{}}}",
                        line_no,
                        escape_json(&e.to_string()),
                        escape_json(line)
                    )?;
                }
                log::warn!("skipping line {line_no}: {e}");
                report.skipped += 1;
            }
            Err(e) => return Err(e),
        }
    }
    Ok((out, report))
}

/// Reads documents from a file, detecting the format when `opts.format` is `Auto`.
///
/// # Errors
/// See [`read_documents`].
pub fn read_file<P: AsRef<Path>>(
    path: P,
    opts: &ImportOptions,
) -> Result<(Vec<BsonDocument>, ImportReport), RunnerError> {
    log::info!("import: path={}", path.as_ref().display());
    let file = File::open(&path)?;
    let mut reader = BufReader::new(file);
    let format = match opts.format {
        ImportFormat::Auto => detect_format(&mut reader, path.as_ref())?,
        other => other,
    };
    read_documents(reader, format, opts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ndjson_skips_blank_lines() {
        let data = "{\"title\":\"A\"}\n\n{\"title\":\"B\",\"price\":3.5}\n";
        let (docs, report) =
            read_documents(data.as_bytes(), ImportFormat::Auto, &ImportOptions::default()).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(report.read, 2);
        assert_eq!(docs[1].get_f64("price").unwrap(), 3.5);
    }

    #[test]
    fn array_mode_is_detected_from_content() {
        let data = "  [{\"title\":\"A\"},{\"title\":\"B\"}]";
        let (docs, _) =
            read_documents(data.as_bytes(), ImportFormat::Auto, &ImportOptions::default()).unwrap();
        assert_eq!(docs.len(), 2);
    }

    #[test]
    fn bad_line_fails_unless_skipped() {
        let data = "{\"title\":\"A\"}\nnot json\n[1]\n";
        assert!(read_documents(data.as_bytes(), ImportFormat::Ndjson, &ImportOptions::default()).is_err());

        let tmp = tempfile::tempdir().unwrap();
        let sidecar = tmp.path().join("errors.ndjson");
        let opts = ImportOptions { skip_errors: true, error_sidecar: Some(sidecar.clone()), ..ImportOptions::default() };
        let (docs, report) = read_documents(data.as_bytes(), ImportFormat::Ndjson, &opts).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(report.skipped, 2);
        let written = std::fs::read_to_string(sidecar).unwrap();
        assert_eq!(written.lines().count(), 2);
        assert!(written.contains("\"line\":2"));
    }

    #[test]
    fn extension_wins_over_content() {
        let data = b"[1]";
        let mut r = BufReader::new(&data[..]);
        assert_eq!(detect_format(&mut r, Path::new("books.jsonl")).unwrap(), ImportFormat::Ndjson);
        let mut r = BufReader::new(&data[..]);
        assert_eq!(detect_format(&mut r, Path::new("books.json")).unwrap(), ImportFormat::JsonArray);
    }
}
