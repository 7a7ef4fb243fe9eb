//! Report persistence.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use super::render::render_report;
use crate::orchestrator::{SuiteKind, TestRun};

/// Upper bound on `_N` suffixes tried when a report name is taken.
const MAX_NAME_ATTEMPTS: u32 = 100;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("Failed to create report directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Writes plain-text reports into a fixed directory.
#[derive(Debug, Clone)]
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Timestamped file name for a run of the given suite.
    pub fn file_name(suite: SuiteKind, at: DateTime<Local>) -> String {
        let kind = match suite {
            SuiteKind::Standard => "StandardTest",
            SuiteKind::Dpi => "DPITest",
        };
        format!("DpiVerify_{kind}_{}.txt", at.format("%Y%m%d_%H%M%S"))
    }

    /// Render `run` and write it. Returns the path of the new file.
    pub async fn export(&self, run: &TestRun) -> Result<PathBuf, ReportError> {
        self.export_at(run, Local::now()).await
    }

    pub async fn export_at(&self, run: &TestRun, at: DateTime<Local>) -> Result<PathBuf, ReportError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| ReportError::CreateDir { path: self.dir.clone(), source })?;

        let (path, mut file) = self.create_unique(Self::file_name(run.suite, at)).await?;
        let text = render_report(run, at);
        let written = async {
            file.write_all(text.as_bytes()).await?;
            file.flush().await
        };
        written
            .await
            .map_err(|source| ReportError::Write { path: path.clone(), source })?;

        tracing::info!(path = %path.display(), results = run.results.len(), "report written");
        Ok(path)
    }

    /// Create `name`, or `<stem>_2.txt`, `<stem>_3.txt` and so on when an
    /// earlier report already holds the name. Never overwrites.
    async fn create_unique(&self, name: String) -> Result<(PathBuf, tokio::fs::File), ReportError> {
        let stem = name.trim_end_matches(".txt");
        let mut path = self.dir.join(&name);
        for attempt in 1..=MAX_NAME_ATTEMPTS {
            if attempt > 1 {
                path = self.dir.join(format!("{stem}_{attempt}.txt"));
            }
            match tokio::fs::OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(ReportError::Write { path, source }),
            }
        }
        Err(ReportError::Write {
            path,
            source: std::io::Error::new(std::io::ErrorKind::AlreadyExists, "no free report name"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn file_names_carry_suite_and_timestamp() {
        let at = Local.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).single().unwrap();
        assert_eq!(
            ReportWriter::file_name(SuiteKind::Standard, at),
            "DpiVerify_StandardTest_20250102_030405.txt"
        );
        assert_eq!(
            ReportWriter::file_name(SuiteKind::Dpi, at),
            "DpiVerify_DPITest_20250102_030405.txt"
        );
    }
}
