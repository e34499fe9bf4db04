//! Upload intake: turns the files of one upload request into an [`ImportBatch`].
//!
//! The pipeline is staged in [`validator::UploadValidator`]. Soft per-file
//! rejections are reported as `diagnostics`, user facing problems as
//! [`FieldError`]s, and infrastructure failures as [`IntakeError`].

use crate::config::ImporterConfig;
use crate::utils::validation::format_size;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use utoipa::ToSchema;

pub mod file_check;
pub mod incoming;
pub mod shapefile;
pub mod staging;
pub mod validator;

pub use file_check::{BasicFileCheck, FileCheck};
pub use incoming::IncomingFile;
pub use shapefile::validate_shapefiles_have_all_parts;
pub use staging::StagingDirectory;
pub use validator::UploadValidator;

/// Marker in the extension list that enables `.gdb` directories inside archives.
pub const GEODATABASE_SENTINEL: &str = "gdb/";

/// What may be imported, and how much a user may store. Built once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportPolicy {
    valid_extensions: HashSet<String>,
    quota: Option<u64>,
}

impl ImportPolicy {
    pub fn new<I, S>(valid_extensions: I, quota: Option<u64>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            valid_extensions: valid_extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            quota,
        }
    }

    pub fn from_config(config: &ImporterConfig) -> Self {
        Self::new(&config.valid_extensions, config.user_upload_quota)
    }

    pub fn is_importable(&self, extension: &str) -> bool {
        !extension.is_empty() && self.valid_extensions.contains(&extension.to_lowercase())
    }

    pub fn imports_geodatabases(&self) -> bool {
        self.valid_extensions.contains(GEODATABASE_SENTINEL)
    }

    /// Archive paths ending `.gdb` are importable once the sentinel is configured.
    pub fn is_geodatabase_path(&self, name: &str) -> bool {
        self.imports_geodatabases() && name.ends_with(".gdb")
    }

    pub fn quota(&self) -> Option<u64> {
        self.quota
    }
}

/// A file materialized in the staging directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct CandidateFile {
    /// Path relative to the staging directory (archive members keep their folders)
    #[schema(value_type = String)]
    pub relative_path: PathBuf,
    pub name: String,
    /// Lower-cased, without the dot
    pub extension: String,
    pub size: u64,
}

impl CandidateFile {
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.name)
    }
}

fn human(bytes: &u64) -> String {
    format_size(*bytes)
}

/// A user facing validation failure, attached to the `file` field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Shapefiles must include .shp, .dbf, .shx, .prj")]
    IncompleteShapefile,

    #[error(
        "User Quota Exceeded. Quota: {} Used: {} Adding: {}",
        human(.quota),
        human(.used),
        human(.adding)
    )]
    QuotaExceeded { quota: u64, used: u64, adding: u64 },
}

/// Files accepted for import. Owns the staging directory they live in.
#[derive(Debug)]
pub struct ImportBatch {
    pub files: Vec<CandidateFile>,
    pub total_size: u64,
    pub diagnostics: Vec<String>,
    staging: StagingDirectory,
}

impl ImportBatch {
    pub fn staging_path(&self) -> &Path {
        self.staging.path()
    }

    /// Absolute path of one of the batch's files.
    pub fn path_of(&self, file: &CandidateFile) -> PathBuf {
        self.staging.path().join(&file.relative_path)
    }

    /// Detaches the staging directory so it outlives the batch.
    pub fn keep(self) -> (PathBuf, Vec<CandidateFile>, u64) {
        (self.staging.keep(), self.files, self.total_size)
    }
}

/// A batch that failed validation. Its staging directory has already been removed.
#[derive(Debug)]
pub struct UploadRejected {
    pub errors: Vec<FieldError>,
    pub diagnostics: Vec<String>,
    pub upload_size: u64,
    pub staging_path: PathBuf,
}

impl UploadRejected {
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

#[derive(Debug)]
pub enum IntakeOutcome {
    Accepted(ImportBatch),
    Rejected(UploadRejected),
}

impl IntakeOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, IntakeOutcome::Accepted(_))
    }
}

#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("Failed to create staging directory: {0}")]
    Staging(#[source] std::io::Error),

    #[error("Failed to read upload quota: {0}")]
    Quota(#[source] anyhow::Error),

    #[error("Intake task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}
