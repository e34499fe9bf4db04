use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// The co-required parts of one shapefile dataset.
pub const SHAPEFILE_PARTS: [&str; 4] = ["shp", "dbf", "shx", "prj"];

/// Every base name that appears with one shapefile part must appear with all four.
pub fn validate_shapefiles_have_all_parts<S: AsRef<str>>(names: &[S]) -> bool {
    incomplete_shapefiles(names).is_empty()
}

/// Base names (path without extension) whose shapefile family is incomplete.
pub fn incomplete_shapefiles<S: AsRef<str>>(names: &[S]) -> Vec<String> {
    let mut families: BTreeMap<String, BTreeSet<&'static str>> = BTreeMap::new();

    for name in names {
        let path = Path::new(name.as_ref());
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            continue;
        };
        let ext = ext.to_lowercase();
        let Some(part) = SHAPEFILE_PARTS.iter().find(|p| **p == ext) else {
            continue;
        };
        let base = path.with_extension("").to_string_lossy().into_owned();
        families.entry(base).or_default().insert(*part);
    }

    families
        .into_iter()
        .filter(|(_, parts)| parts.len() < SHAPEFILE_PARTS.len())
        .map(|(base, _)| base)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_family() {
        assert!(validate_shapefiles_have_all_parts(&[
            "roads.shp",
            "roads.dbf",
            "roads.shx",
            "roads.prj",
        ]));
    }

    #[test]
    fn test_no_shapefiles_is_complete() {
        assert!(validate_shapefiles_have_all_parts(&["a.geojson", "b.tif"]));
        assert!(validate_shapefiles_have_all_parts::<&str>(&[]));
    }

    #[test]
    fn test_missing_parts() {
        let names = ["a.shp", "a.dbf", "b.shp", "b.DBF", "b.SHX", "b.prj"];
        assert!(!validate_shapefiles_have_all_parts(&names));
        assert_eq!(incomplete_shapefiles(&names), vec!["a".to_string()]);
    }

    #[test]
    fn test_orphan_projection_is_incomplete() {
        assert_eq!(incomplete_shapefiles(&["lonely.prj"]), vec!["lonely".to_string()]);
    }

    #[test]
    fn test_families_are_grouped_by_path() {
        let names = [
            "one/x.shp", "one/x.dbf", "one/x.shx", "one/x.prj", "two/x.shp",
        ];
        assert_eq!(incomplete_shapefiles(&names), vec!["two/x".to_string()]);
    }
}
