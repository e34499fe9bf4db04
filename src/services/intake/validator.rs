use super::shapefile::incomplete_shapefiles;
use super::{
    BasicFileCheck, CandidateFile, FieldError, FileCheck, ImportBatch, ImportPolicy, IncomingFile,
    IntakeError, IntakeOutcome, StagingDirectory, UploadRejected,
};
use crate::services::inspector::{Inspector, SignatureInspector};
use crate::services::quota::QuotaSource;
use crate::utils::validation::extension_of;
use std::collections::HashSet;
use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use zip::ZipArchive;

/// How one incoming file contributes candidates.
enum Source {
    /// The file itself
    Direct,
    /// An opened ZIP archive and its importable members, by entry name
    Archive {
        archive: ZipArchive<File>,
        members: HashSet<String>,
    },
}

/// Result of the filesystem stages, before the quota is applied.
#[derive(Debug)]
pub struct StagedUpload {
    pub staging: StagingDirectory,
    pub accepted: Vec<CandidateFile>,
    pub upload_size: u64,
    pub errors: Vec<FieldError>,
    pub diagnostics: Vec<String>,
}

#[derive(Clone)]
pub struct UploadValidator {
    policy: Arc<ImportPolicy>,
    staging_root: PathBuf,
    file_check: Arc<dyn FileCheck>,
    inspector: Arc<dyn Inspector>,
}

impl UploadValidator {
    pub fn new(policy: ImportPolicy, staging_root: impl Into<PathBuf>) -> Self {
        Self {
            policy: Arc::new(policy),
            staging_root: staging_root.into(),
            file_check: Arc::new(BasicFileCheck),
            inspector: Arc::new(SignatureInspector),
        }
    }

    pub fn with_file_check(mut self, file_check: Arc<dyn FileCheck>) -> Self {
        self.file_check = file_check;
        self
    }

    pub fn with_inspector(mut self, inspector: Arc<dyn Inspector>) -> Self {
        self.inspector = inspector;
        self
    }

    pub fn policy(&self) -> &ImportPolicy {
        &self.policy
    }

    /// Runs the whole intake for one request.
    ///
    /// Filesystem work happens on the blocking pool; the quota source is only
    /// consulted when a ceiling is configured.
    pub async fn validate(
        &self,
        files: Vec<IncomingFile>,
        quota_source: &dyn QuotaSource,
        user_id: Option<&str>,
    ) -> Result<IntakeOutcome, IntakeError> {
        let validator = self.clone();
        let staged = tokio::task::spawn_blocking(move || validator.stage(&files)).await??;
        self.enforce_quota(staged, quota_source, user_id).await
    }

    /// Stages 1-6: filter, classify, check completeness, materialize, inspect.
    pub fn stage(&self, files: &[IncomingFile]) -> Result<StagedUpload, IntakeError> {
        let staging =
            StagingDirectory::create_in(&self.staging_root).map_err(IntakeError::Staging)?;
        let mut errors = Vec::new();
        let mut diagnostics = Vec::new();

        let mut plan: Vec<(&IncomingFile, Source)> = Vec::new();
        let mut candidate_names: Vec<String> = Vec::new();

        for file in files {
            let problems = self.file_check.check(file, &self.policy);
            if !problems.is_empty() {
                soft_drop(&mut diagnostics, problems.join(", "));
                continue;
            }

            match self.classify(file) {
                Ok(Some(source)) => {
                    match &source {
                        Source::Direct => candidate_names.push(file.name().to_string()),
                        Source::Archive { members, .. } => {
                            candidate_names.extend(members.iter().cloned())
                        }
                    }
                    plan.push((file, source));
                }
                Ok(None) => soft_drop(
                    &mut diagnostics,
                    format!("{}: file type is not importable", file.name()),
                ),
                Err(e) => soft_drop(
                    &mut diagnostics,
                    format!("{}: could not be read ({})", file.name(), e),
                ),
            }
        }

        let incomplete = incomplete_shapefiles(&candidate_names);
        if !incomplete.is_empty() {
            tracing::info!("Incomplete shapefile sets: {}", incomplete.join(", "));
            errors.push(FieldError::IncompleteShapefile);
        }

        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut materialized: Vec<PathBuf> = Vec::new();

        for (file, source) in plan {
            match source {
                Source::Direct => {
                    let Some(relative) = enclosed_path(file.name()) else {
                        soft_drop(
                            &mut diagnostics,
                            format!("{}: file name escapes the upload", file.name()),
                        );
                        continue;
                    };
                    if !seen.insert(relative.clone()) {
                        soft_drop(
                            &mut diagnostics,
                            format!("{}: duplicate file in upload", file.name()),
                        );
                        continue;
                    }
                    let copied = staging
                        .prepare(&relative)
                        .and_then(|dest| file.copy_to(&dest));
                    match copied {
                        Ok(_) => materialized.push(relative),
                        Err(e) => soft_drop(
                            &mut diagnostics,
                            format!("{}: could not be staged ({})", file.name(), e),
                        ),
                    }
                }
                Source::Archive {
                    mut archive,
                    members,
                } => {
                    if let Err(e) = self.extract(
                        file,
                        &mut archive,
                        &members,
                        &staging,
                        &mut seen,
                        &mut materialized,
                        &mut diagnostics,
                    ) {
                        soft_drop(
                            &mut diagnostics,
                            format!("{}: could not extract archive ({})", file.name(), e),
                        );
                    }
                }
            }
        }

        let mut readable = Vec::with_capacity(materialized.len());
        let mut upload_size = 0u64;

        for relative in materialized {
            let path = staging.path().join(&relative);
            if !self.inspector.can_read(&path) {
                soft_drop(
                    &mut diagnostics,
                    format!(
                        "Inspector could not read file {} or file is empty",
                        relative.display()
                    ),
                );
                continue;
            }

            let size = match fs::metadata(&path) {
                Ok(meta) => meta.len(),
                Err(e) => {
                    soft_drop(
                        &mut diagnostics,
                        format!("{}: size unavailable ({})", relative.display(), e),
                    );
                    continue;
                }
            };
            upload_size = upload_size.saturating_add(size);

            let name = relative
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            readable.push(CandidateFile {
                extension: extension_of(&name),
                name,
                relative_path: relative,
                size,
            });
        }

        let names: HashSet<&str> = readable.iter().map(|c| c.name.as_str()).collect();
        let redundant: Vec<bool> = readable
            .iter()
            .map(|c| is_redundant_sidecar(c, &names))
            .collect();
        let accepted = readable
            .into_iter()
            .zip(redundant)
            .filter_map(|(c, skip)| {
                if skip {
                    tracing::debug!("Skipping metadata sidecar {}", c.name);
                    None
                } else {
                    Some(c)
                }
            })
            .collect();

        Ok(StagedUpload {
            staging,
            accepted,
            upload_size,
            errors,
            diagnostics,
        })
    }

    /// Stages 7-8: apply the quota ceiling and settle the outcome.
    pub async fn enforce_quota(
        &self,
        staged: StagedUpload,
        quota_source: &dyn QuotaSource,
        user_id: Option<&str>,
    ) -> Result<IntakeOutcome, IntakeError> {
        let StagedUpload {
            staging,
            accepted,
            upload_size,
            mut errors,
            diagnostics,
        } = staged;

        if let Some(quota) = self.policy.quota() {
            let used = quota_source
                .consumed_bytes(user_id)
                .await
                .map_err(IntakeError::Quota)?;

            if used.saturating_add(upload_size) > quota {
                let staging_path = staging.path().to_path_buf();
                if let Err(e) = staging.remove() {
                    tracing::warn!(
                        "Failed to remove staging directory {}: {}",
                        staging_path.display(),
                        e
                    );
                }
                errors.push(FieldError::QuotaExceeded {
                    quota,
                    used,
                    adding: upload_size,
                });
                return Ok(IntakeOutcome::Rejected(UploadRejected {
                    errors,
                    diagnostics,
                    upload_size,
                    staging_path,
                }));
            }
        }

        if !errors.is_empty() {
            // Dropping the staging directory removes it
            let staging_path = staging.path().to_path_buf();
            drop(staging);
            return Ok(IntakeOutcome::Rejected(UploadRejected {
                errors,
                diagnostics,
                upload_size,
                staging_path,
            }));
        }

        Ok(IntakeOutcome::Accepted(ImportBatch {
            files: accepted,
            total_size: upload_size,
            diagnostics,
            staging,
        }))
    }

    /// Opens ZIP content once; the archive is kept for extraction.
    fn classify(&self, file: &IncomingFile) -> io::Result<Option<Source>> {
        if let Ok(archive) = ZipArchive::new(file.open()?) {
            let members = archive
                .file_names()
                .filter(|name| !name.ends_with('/'))
                .filter(|name| self.policy.is_importable(&extension_of(name)))
                .map(|name| name.to_string())
                .collect();
            return Ok(Some(Source::Archive { archive, members }));
        }

        if self.policy.is_importable(&extension_of(file.name())) {
            Ok(Some(Source::Direct))
        } else {
            Ok(None)
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn extract(
        &self,
        file: &IncomingFile,
        archive: &mut ZipArchive<File>,
        members: &HashSet<String>,
        staging: &StagingDirectory,
        seen: &mut HashSet<PathBuf>,
        materialized: &mut Vec<PathBuf>,
        diagnostics: &mut Vec<String>,
    ) -> io::Result<()> {
        for i in 0..archive.len() {
            let mut entry = match archive.by_index(i) {
                Ok(entry) => entry,
                Err(e) => {
                    soft_drop(
                        diagnostics,
                        format!("{}: unreadable archive entry ({})", file.name(), e),
                    );
                    continue;
                }
            };

            if entry.is_dir() {
                continue;
            }
            let name = entry.name().to_string();
            if !(members.contains(&name) || self.policy.is_geodatabase_path(&name)) {
                continue;
            }

            let Some(relative) = entry.enclosed_name().map(|p| p.to_path_buf()) else {
                soft_drop(
                    diagnostics,
                    format!("{}: archive entry {} escapes the upload", file.name(), name),
                );
                continue;
            };
            if !seen.insert(relative.clone()) {
                soft_drop(diagnostics, format!("{}: duplicate file in upload", name));
                continue;
            }

            let dest = staging.prepare(&relative)?;
            let written = File::create(&dest).and_then(|mut out| io::copy(&mut entry, &mut out));
            match written {
                Ok(_) => materialized.push(relative),
                Err(e) => {
                    let _ = fs::remove_file(&dest);
                    soft_drop(diagnostics, format!("{}: could not be extracted ({})", name, e));
                }
            }
        }

        Ok(())
    }
}

/// A client supplied name as a path inside the staging directory.
///
/// `None` for absolute names and names that climb out with `..`.
fn enclosed_path(name: &str) -> Option<PathBuf> {
    let mut enclosed = PathBuf::new();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => enclosed.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (!enclosed.as_os_str().is_empty()).then_some(enclosed)
}

/// An `N.xml` next to `N.shp` or `N` only describes that file.
fn is_redundant_sidecar(file: &CandidateFile, names: &HashSet<&str>) -> bool {
    if file.extension != "xml" {
        return false;
    }
    let stem = file.stem();
    names.contains(stem) || names.contains(format!("{}.shp", stem).as_str())
}

fn soft_drop(diagnostics: &mut Vec<String>, message: String) {
    tracing::warn!("{}", message);
    diagnostics.push(message);
}
