use serde_json::Value;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use crate::error::{FetchError, FetchResult};
use crate::iq::{Application, ReportReference};
use crate::report::{COLUMNS, ConsolidatedRow};

pub const CONSOLIDATED_FILE_NAME: &str = "consolidated_security_report.csv";

/// Writes per-report CSV files (and optionally raw JSON) into one directory
///
/// Files are written to a temporary sibling and renamed into place, so an
/// interrupted run never leaves a truncated CSV behind. Existing files for
/// the same application/report pair are overwritten.
#[derive(Debug)]
pub struct OutputWriter {
    dir: PathBuf,
    /// Sanitized public id → id of the application that owns the plain name
    claimed: Mutex<HashMap<String, String>>,
}

impl OutputWriter {
    /// Create the output directory (and parents) if needed
    pub fn create(dir: impl Into<PathBuf>) -> FetchResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| FetchError::io(&dir, e))?;
        Ok(Self {
            dir,
            claimed: Mutex::new(HashMap::new()),
        })
    }

    /// Hand out plain file-name prefixes in the given order, so the same
    /// application keeps the unsuffixed name whatever order writes happen in
    pub fn register(&self, applications: &[Application]) {
        let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
        for app in applications {
            claimed.entry(prefix_of(app)).or_insert_with(|| app.id.clone());
        }
    }

    /// Write one report's rows; a header-only file when `rows` is empty
    pub fn write(
        &self,
        app: &Application,
        reference: &ReportReference,
        rows: &[ConsolidatedRow],
    ) -> FetchResult<PathBuf> {
        let path = self.dir.join(format!("{}.csv", self.file_stem(app, reference)));
        write_csv(&path, rows)?;
        tracing::debug!("Wrote {} row(s) to {}", rows.len(), path.display());
        Ok(path)
    }

    /// Keep the raw payload next to its CSV
    pub fn write_raw_json(
        &self,
        app: &Application,
        reference: &ReportReference,
        payload: &Value,
    ) -> FetchResult<PathBuf> {
        let path = self.dir.join(format!("{}.json", self.file_stem(app, reference)));
        let body = serde_json::to_vec_pretty(payload)
            .map_err(|e| FetchError::io(&path, std::io::Error::other(e)))?;
        write_atomically(&path, |tmp| fs::write(tmp, &body))?;
        Ok(path)
    }

    /// All rows of the run in one file, renumbered 1..N
    pub fn write_consolidated(&self, rows: &[ConsolidatedRow]) -> FetchResult<PathBuf> {
        let path = self.dir.join(CONSOLIDATED_FILE_NAME);
        let renumbered: Vec<ConsolidatedRow> = rows
            .iter()
            .enumerate()
            .map(|(index, row)| ConsolidatedRow {
                number: index + 1,
                ..row.clone()
            })
            .collect();
        write_csv(&path, &renumbered)?;
        Ok(path)
    }

    /// `<publicId>_<stage>_<reportId>`; a later application whose public id
    /// sanitizes to an owned prefix gets `<publicId>-<applicationId>` instead
    fn file_stem(&self, app: &Application, reference: &ReportReference) -> String {
        let prefix = prefix_of(app);
        let owned = {
            let mut claimed = self.claimed.lock().unwrap_or_else(PoisonError::into_inner);
            *claimed.entry(prefix.clone()).or_insert_with(|| app.id.clone()) == app.id
        };
        let prefix = if owned {
            prefix
        } else {
            let unique = format!("{prefix}-{}", sanitize(&app.id));
            tracing::warn!("File name prefix {prefix} belongs to another application, using {unique}");
            unique
        };
        format!(
            "{prefix}_{}_{}",
            sanitize(&reference.stage_id),
            sanitize(&reference.report_id)
        )
    }
}

fn prefix_of(app: &Application) -> String {
    sanitize(if app.public_id.is_empty() { &app.id } else { &app.public_id })
}

/// Replace anything outside `[A-Za-z0-9._-]` with `_`
pub fn sanitize(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.is_empty() { "_".to_string() } else { cleaned }
}

fn write_csv(path: &Path, rows: &[ConsolidatedRow]) -> FetchResult<()> {
    write_atomically(path, |tmp| {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(tmp)
            .map_err(std::io::Error::other)?;
        writer.write_record(COLUMNS).map_err(std::io::Error::other)?;
        for row in rows {
            writer.serialize(row).map_err(std::io::Error::other)?;
        }
        writer.flush()
    })
}

fn write_atomically<F>(path: &Path, write: F) -> FetchResult<()>
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    let mut tmp_name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    if let Err(e) = write(&tmp).and_then(|_| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(FetchError::io(path, e));
    }
    Ok(())
}
