use anyhow::Context;
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Extensions accepted by the importer when `IMPORTER_VALID_EXTENSIONS` is unset.
///
/// `gdb/` is a sentinel: it marks `.gdb` paths inside archives as importable
/// file geodatabase directories.
pub const DEFAULT_SUPPORTED_EXTENSIONS: &[&str] = &[
    "shp", "shx", "prj", "dbf", "cpg", "kml", "geojson", "json", "tif", "tiff", "gpkg", "csv",
    "zip", "xml", "sld", "ntf", "nitf", "j2k", "jp2", "gdb/",
];

/// Importer configuration, read once at startup and immutable afterwards.
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    /// Lower-cased importable extensions, without the leading dot
    pub valid_extensions: Vec<String>,

    /// Per-user cumulative upload ceiling in bytes (None = unlimited)
    pub user_upload_quota: Option<u64>,

    /// Serve the GeoNode flavoured REST resources
    pub geonode_enabled: bool,

    /// Workspace used when building GeoNode layer links (default: "geonode")
    pub geonode_workspace: String,

    /// Root under which staging and upload directories are created
    pub upload_dir: PathBuf,

    /// Maximum request body size in bytes (default: 1 GB)
    pub max_request_size: usize,

    /// JWT Secret Key
    pub jwt_secret: String,

    /// Address the HTTP server binds to
    pub bind_addr: SocketAddr,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            valid_extensions: DEFAULT_SUPPORTED_EXTENSIONS
                .iter()
                .map(|e| e.to_string())
                .collect(),
            user_upload_quota: None,
            geonode_enabled: false,
            geonode_workspace: "geonode".to_string(),
            upload_dir: PathBuf::from("./media/osgeo_importer_uploads"),
            max_request_size: 1024 * 1024 * 1024, // 1 GB
            jwt_secret: "secret".to_string(),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

impl ImporterConfig {
    /// Load configuration from environment variables
    ///
    /// Fails when `USER_UPLOAD_QUOTA` is set but is not a byte count.
    pub fn from_env() -> anyhow::Result<Self> {
        let default = Self::default();

        Ok(Self {
            valid_extensions: env::var("IMPORTER_VALID_EXTENSIONS")
                .ok()
                .map(|v| parse_extensions(&v))
                .filter(|v| !v.is_empty())
                .unwrap_or(default.valid_extensions),

            user_upload_quota: parse_quota(env::var("USER_UPLOAD_QUOTA").ok().as_deref())?,

            geonode_enabled: env::var("IMPORTER_GEONODE_ENABLED")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(default.geonode_enabled),

            geonode_workspace: env::var("GEONODE_WORKSPACE")
                .unwrap_or(default.geonode_workspace),

            upload_dir: env::var("IMPORTER_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(default.upload_dir),

            max_request_size: env::var("MAX_REQUEST_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_request_size),

            jwt_secret: env::var("JWT_SECRET").unwrap_or(default.jwt_secret),

            bind_addr: env::var("BIND_ADDR")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.bind_addr),
        })
    }

    /// Create config for development (temp upload root, no quota)
    pub fn development() -> Self {
        Self {
            upload_dir: env::temp_dir().join("geo_importer_uploads"),
            ..Self::default()
        }
    }
}

/// An unset or blank quota means unlimited. Anything else must be a whole number of bytes.
fn parse_quota(raw: Option<&str>) -> anyhow::Result<Option<u64>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => value.parse().map(Some).with_context(|| {
            format!("Invalid USER_UPLOAD_QUOTA {:?}: expected a number of bytes", value)
        }),
    }
}

fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
