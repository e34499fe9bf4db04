use super::{ImportPolicy, IncomingFile};
use crate::utils::validation::{extension_of, is_executable_content};

/// Cheap per-file well-formedness check run before anything is staged.
///
/// Returns human readable problems; an empty list means the file may proceed.
pub trait FileCheck: Send + Sync {
    fn check(&self, file: &IncomingFile, policy: &ImportPolicy) -> Vec<String>;
}

/// Rejects empty, hidden and executable files, and names outside the
/// importable set unless the content is a ZIP archive.
pub struct BasicFileCheck;

impl FileCheck for BasicFileCheck {
    fn check(&self, file: &IncomingFile, policy: &ImportPolicy) -> Vec<String> {
        let name = file.name();
        let mut errors = Vec::new();

        if file.size() == 0 {
            errors.push(format!("{}: file is empty", name));
            return errors;
        }

        if name.starts_with('.') {
            errors.push(format!("{}: hidden files are not allowed", name));
        }

        match file.header(512) {
            Ok(header) if is_executable_content(&header) => {
                errors.push(format!("{}: executable content is not allowed", name));
            }
            Ok(_) => {}
            Err(e) => errors.push(format!("{}: unreadable upload ({})", name, e)),
        }

        let ext = extension_of(name);
        if !policy.is_importable(&ext) && !file.is_archive() {
            errors.push(format!("{}: file type '.{}' is not allowed", name, ext));
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn policy() -> ImportPolicy {
        ImportPolicy::new(["shp", "geojson", "zip"], None)
    }

    #[test]
    fn test_accepts_importable_file() {
        let file = IncomingFile::from_bytes("a.geojson", br#"{"type":"FeatureCollection"}"#)
            .unwrap();
        assert!(BasicFileCheck.check(&file, &policy()).is_empty());
    }

    #[test]
    fn test_rejects_empty_file() {
        let file = IncomingFile::from_bytes("a.shp", b"").unwrap();
        let errors = BasicFileCheck.check(&file, &policy());
        assert_eq!(errors, vec!["a.shp: file is empty".to_string()]);
    }

    #[test]
    fn test_rejects_disallowed_extension() {
        let file = IncomingFile::from_bytes("notes.docx", b"plain words").unwrap();
        let errors = BasicFileCheck.check(&file, &policy());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains(".docx"));
    }

    #[test]
    fn test_rejects_executable() {
        let file = IncomingFile::from_bytes("a.shp", b"#!/bin/sh\necho").unwrap();
        let errors = BasicFileCheck.check(&file, &policy());
        assert!(errors.iter().any(|e| e.contains("executable")));
    }

    #[test]
    fn test_archive_with_unlisted_name_passes() {
        let mut cursor = std::io::Cursor::new(Vec::new());
        {
            let mut zip = zip::ZipWriter::new(&mut cursor);
            zip.start_file("a.geojson", zip::write::FileOptions::default())
                .unwrap();
            zip.write_all(b"{}").unwrap();
            zip.finish().unwrap();
        }
        let file = IncomingFile::from_bytes("download", cursor.get_ref()).unwrap();
        assert!(BasicFileCheck.check(&file, &policy()).is_empty());
    }
}
