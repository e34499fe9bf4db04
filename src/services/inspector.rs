use quick_xml::Reader;
use quick_xml::events::Event;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::Path;

const HEADER_LEN: u64 = 512;

/// Shapefile and index files start with this big-endian file code.
const SHAPEFILE_CODE: [u8; 4] = [0x00, 0x00, 0x27, 0x0A];

/// dBASE version bytes written by the usual GIS tools.
const DBF_VERSIONS: [u8; 13] = [
    0x02, 0x03, 0x04, 0x05, 0x30, 0x31, 0x43, 0x63, 0x83, 0x8B, 0xCB, 0xF5, 0xFB,
];

const JP2_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20, 0x0D, 0x0A, 0x87, 0x0A,
];
const SQLITE_HEADER: &[u8] = b"SQLite format 3\0";
const J2K_CODESTREAM: [u8; 4] = [0xFF, 0x4F, 0xFF, 0x51];

/// Decides whether the import pipeline will be able to open a staged file.
pub trait Inspector: Send + Sync {
    fn can_read(&self, path: &Path) -> bool;
}

/// Recognizes the supported formats by their signatures.
///
/// Text formats are parsed far enough to know they are well formed.
/// Unknown extensions pass as long as they are not empty.
pub struct SignatureInspector;

impl Inspector for SignatureInspector {
    fn can_read(&self, path: &Path) -> bool {
        match inspect(path) {
            Ok(readable) => readable,
            Err(e) => {
                tracing::debug!("Inspector failed on {}: {}", path.display(), e);
                false
            }
        }
    }
}

fn inspect(path: &Path) -> io::Result<bool> {
    let meta = fs::metadata(path)?;
    if !meta.is_file() || meta.len() == 0 {
        return Ok(false);
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    let mut header = Vec::with_capacity(HEADER_LEN as usize);
    File::open(path)?
        .take(HEADER_LEN)
        .read_to_end(&mut header)?;

    let readable = match ext.as_str() {
        "shp" | "shx" => header.len() >= 100 && header.starts_with(&SHAPEFILE_CODE),
        "dbf" => header.len() >= 32 && DBF_VERSIONS.contains(&header[0]),
        "prj" | "cpg" | "csv" => is_text(&header),
        "geojson" | "json" => is_geojson(path)?,
        "kml" | "xml" | "sld" => is_well_formed_xml(path)?,
        "tif" | "tiff" => infer::image::is_tiff(&header),
        "gpkg" => header.starts_with(SQLITE_HEADER),
        "jp2" | "j2k" => header.starts_with(&JP2_SIGNATURE) || header.starts_with(&J2K_CODESTREAM),
        "ntf" | "nitf" => header.starts_with(b"NITF") || header.starts_with(b"NSIF"),
        "zip" => zip::ZipArchive::new(File::open(path)?).is_ok(),
        _ => true,
    };

    Ok(readable)
}

/// UTF-8 with something besides whitespace. A character cut off by the
/// header window is tolerated.
fn is_text(header: &[u8]) -> bool {
    let text = match std::str::from_utf8(header) {
        Ok(text) => text,
        Err(e) if e.error_len().is_none() => {
            match std::str::from_utf8(&header[..e.valid_up_to()]) {
                Ok(text) => text,
                Err(_) => return false,
            }
        }
        Err(_) => return false,
    };

    !text.contains('\0') && !text.trim().is_empty()
}

#[derive(Deserialize)]
struct GeoJsonProbe {
    #[serde(rename = "type")]
    kind: String,
}

fn is_geojson(path: &Path) -> io::Result<bool> {
    let reader = BufReader::new(File::open(path)?);
    Ok(match serde_json::from_reader::<_, GeoJsonProbe>(reader) {
        Ok(probe) => !probe.kind.is_empty(),
        Err(e) => {
            tracing::debug!("Not GeoJSON {}: {}", path.display(), e);
            false
        }
    })
}

fn is_well_formed_xml(path: &Path) -> io::Result<bool> {
    let mut reader = Reader::from_reader(BufReader::new(File::open(path)?));
    let mut buf = Vec::new();
    let mut saw_root = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(_)) | Ok(Event::Empty(_)) => saw_root = true,
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!("Malformed XML {}: {}", path.display(), e);
                return Ok(false);
            }
        }
        buf.clear();
    }

    Ok(saw_root)
}


#[cfg(test)]
mod tests {
    use super::fixtures::readable_bytes;
    use super::*;

    fn write(dir: &Path, name: &str, data: &[u8]) -> std::path::PathBuf {
        let path = dir.join(name);
        fs::write(&path, data).unwrap();
        path
    }

    #[test]
    fn test_signatures_accepted() {
        let dir = tempfile::tempdir().unwrap();
        for ext in ["shp", "shx", "dbf", "prj", "geojson", "xml", "kml", "tif"] {
            let path = write(dir.path(), &format!("sample.{}", ext), &readable_bytes(ext));
            assert!(SignatureInspector.can_read(&path), "{} should be readable", ext);
        }
    }

    #[test]
    fn test_empty_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "empty.csv", b"");
        assert!(!SignatureInspector.can_read(&path));
    }

    #[test]
    fn test_missing_file_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!SignatureInspector.can_read(&dir.path().join("absent.shp")));
    }

    #[test]
    fn test_bad_signatures_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let shp = write(dir.path(), "fake.shp", &[1u8; 120]);
        let json = write(dir.path(), "broken.geojson", b"{\"features\": [");
        let xml = write(dir.path(), "broken.xml", b"<a><b></a>");
        let tif = write(dir.path(), "fake.tif", b"not a tiff at all");
        let gpkg = write(dir.path(), "fake.gpkg", b"SQLite format 2\0");
        for path in [shp, json, xml, tif, gpkg] {
            assert!(!SignatureInspector.can_read(&path), "{:?}", path);
        }
    }

    #[test]
    fn test_text_tolerates_truncated_char() {
        let mut header = "Zürich".as_bytes().to_vec();
        header.truncate(2); // cuts the two byte 'ü'
        assert!(is_text(&header));
        assert!(!is_text(b"   \n"));
        assert!(!is_text(&[0xFF, 0xFE, 0x41]));
    }

    #[test]
    fn test_geopackage_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(dir.path(), "tiles.gpkg", b"SQLite format 3\0rest of the header");
        assert!(SignatureInspector.can_read(&path));
    }
}
