//! The importer's URL table.
//!
//! Every endpoint is declared once here with its name and access level;
//! `create_app` mounts the table and wraps each entry in the matching
//! auth layer.

use crate::AppState;
use crate::api::handlers::{imports, resources, uploads};
use axum::routing::{MethodRouter, get, post};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Anyone; a valid token is still picked up when present
    Public,
    /// A valid bearer token is required
    Authenticated,
}

pub struct RouteEntry {
    pub name: &'static str,
    pub path: &'static str,
    pub access: Access,
    /// Also answer on `path` with a trailing slash
    pub trailing_slash: bool,
    pub handler: MethodRouter<AppState>,
}

impl RouteEntry {
    fn new(
        name: &'static str,
        path: &'static str,
        access: Access,
        handler: MethodRouter<AppState>,
    ) -> Self {
        Self {
            name,
            path,
            access,
            trailing_slash: false,
            handler,
        }
    }

    fn with_trailing_slash(mut self) -> Self {
        self.trailing_slash = true;
        self
    }

    /// Every path this entry is mounted on.
    pub fn paths(&self) -> Vec<String> {
        let mut paths = vec![self.path.to_string()];
        if self.trailing_slash {
            paths.push(format!("{}/", self.path));
        }
        paths
    }
}

pub fn route_table() -> Vec<RouteEntry> {
    use Access::*;

    vec![
        RouteEntry::new(
            "uploads-new",
            "/uploads/new",
            Authenticated,
            get(uploads::upload_form).post(uploads::upload_files),
        ),
        RouteEntry::new(
            "uploads-new-json",
            "/uploads/new/json",
            Authenticated,
            post(uploads::upload_files_json),
        ),
        RouteEntry::new(
            "uploads-list",
            "/uploads",
            Authenticated,
            get(uploads::list_uploads),
        )
        .with_trailing_slash(),
        RouteEntry::new(
            "bulk-import",
            "/bulk-import",
            Authenticated,
            post(imports::bulk_import),
        )
        .with_trailing_slash(),
        RouteEntry::new(
            "one-shot-demo",
            "/one-shot-demo",
            Public,
            get(imports::one_shot_demo),
        )
        .with_trailing_slash(),
        RouteEntry::new(
            "upload-data-import-status",
            "/upload-data-import-status/:id",
            Public,
            get(imports::import_status),
        )
        .with_trailing_slash(),
        RouteEntry::new(
            "one-shot-demo-file-upload",
            "/one-shot-demo_file-upload",
            Public,
            post(imports::one_shot_upload),
        )
        .with_trailing_slash(),
        RouteEntry::new(
            "importer-api-uploaded-data",
            "/importer-api/uploaded-data",
            Authenticated,
            get(resources::list_uploaded_data),
        )
        .with_trailing_slash(),
        RouteEntry::new(
            "importer-api-uploaded-data-detail",
            "/importer-api/uploaded-data/:id",
            Authenticated,
            get(resources::get_uploaded_data),
        )
        .with_trailing_slash(),
        RouteEntry::new(
            "importer-api-uploaded-layers",
            "/importer-api/uploaded-layers",
            Authenticated,
            get(resources::list_uploaded_layers),
        )
        .with_trailing_slash(),
        RouteEntry::new(
            "importer-api-uploaded-layers-detail",
            "/importer-api/uploaded-layers/:id",
            Authenticated,
            get(resources::get_uploaded_layer),
        )
        .with_trailing_slash(),
        RouteEntry::new(
            "importer-api-uploaded-files",
            "/importer-api/uploaded-files",
            Authenticated,
            get(resources::list_uploaded_files),
        )
        .with_trailing_slash(),
        RouteEntry::new(
            "importer-api-uploaded-files-detail",
            "/importer-api/uploaded-files/:id",
            Authenticated,
            get(resources::get_uploaded_file),
        )
        .with_trailing_slash(),
    ]
}

/// Looks up a route's path by name.
pub fn reverse(name: &str) -> Option<&'static str> {
    route_table()
        .into_iter()
        .find(|entry| entry.name == name)
        .map(|entry| entry.path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn entry(name: &str) -> RouteEntry {
        route_table()
            .into_iter()
            .find(|e| e.name == name)
            .unwrap_or_else(|| panic!("no route named {}", name))
    }

    #[test]
    fn test_names_and_paths_are_unique() {
        let table = route_table();
        let names: HashSet<_> = table.iter().map(|e| e.name).collect();
        assert_eq!(names.len(), table.len());

        let paths: Vec<String> = table.iter().flat_map(|e| e.paths()).collect();
        let unique: HashSet<_> = paths.iter().collect();
        assert_eq!(unique.len(), paths.len());
    }

    #[test]
    fn test_upload_routes_require_login() {
        for name in ["uploads-new", "uploads-new-json", "uploads-list", "bulk-import"] {
            assert_eq!(entry(name).access, Access::Authenticated, "{}", name);
        }
    }

    #[test]
    fn test_demo_and_status_routes_are_public() {
        for name in [
            "one-shot-demo",
            "one-shot-demo-file-upload",
            "upload-data-import-status",
        ] {
            assert_eq!(entry(name).access, Access::Public, "{}", name);
        }
    }

    #[test]
    fn test_rest_collections_live_under_the_api_prefix() {
        let rest: Vec<RouteEntry> = route_table()
            .into_iter()
            .filter(|e| e.name.starts_with("importer-api-"))
            .collect();
        assert_eq!(rest.len(), 6);
        for e in rest {
            assert!(e.path.starts_with(crate::services::resources::API_PREFIX));
            assert_eq!(e.access, Access::Authenticated);
        }
    }

    #[test]
    fn test_trailing_slash_variants() {
        assert_eq!(
            entry("uploads-list").paths(),
            vec!["/uploads".to_string(), "/uploads/".to_string()]
        );
        assert_eq!(entry("uploads-new").paths(), vec!["/uploads/new".to_string()]);
        assert_eq!(
            entry("upload-data-import-status").paths()[1],
            "/upload-data-import-status/:id/"
        );
    }

    #[test]
    fn test_reverse() {
        assert_eq!(reverse("uploads-new-json"), Some("/uploads/new/json"));
        assert_eq!(reverse("missing"), None);
    }
}
