//! Append-only, plain-text audit logs (one file per job).
//!
//! Lines are written verbatim (`<timestamped message>\n`); the format is an
//! operational contract shared with existing log consumers.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::job::JobName;

/// Handle to a single append-only log file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditLog {
    path: PathBuf,
}

impl AuditLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `lines` with a single write on a file opened in append mode.
    ///
    /// The file is created if missing; existing content is never touched.
    pub fn append(&self, lines: &[String]) -> io::Result<()> {
        if lines.is_empty() {
            return Ok(());
        }

        let mut buf = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
        for line in lines {
            buf.push_str(line);
            buf.push('\n');
        }

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        file.write_all(buf.as_bytes())
    }

    /// Append, reporting (not raising) a write failure.
    ///
    /// The unwritten lines are echoed to the diagnostic stream so the record is not lost
    /// entirely. Returns whether the write succeeded.
    pub fn append_or_report(&self, job: JobName, lines: &[String]) -> bool {
        match self.append(lines) {
            Ok(()) => true,
            Err(e) => {
                warn!(job = %job, path = %self.path.display(), error = %e, "failed to write job log");
                for line in lines {
                    warn!(job = %job, line = %line, "unwritten job log line");
                }
                false
            }
        }
    }
}

/// Base directory holding every job's log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogDirectory {
    root: PathBuf,
}

impl LogDirectory {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the directory if it does not exist yet.
    pub fn ensure(&self) -> io::Result<()> {
        fs::create_dir_all(&self.root)
    }

    pub fn log_for(&self, job: JobName) -> AuditLog {
        AuditLog::new(self.root.join(job.log_file_name()))
    }
}
