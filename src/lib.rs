pub mod api;
pub mod config;
pub mod entities;
pub mod infrastructure;
pub mod services;
pub mod utils;

use crate::api::middleware::auth::{auth_middleware, optional_auth_middleware};
use crate::api::routes::{Access, route_table};
use crate::config::ImporterConfig;
use crate::services::intake::{ImportPolicy, UploadValidator};
use crate::services::quota::{DbQuotaSource, QuotaSource};
use crate::services::resources::{ImporterResources, create_resources};
use crate::services::upload_service::UploadService;
use axum::{
    Router,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::uploads::upload_form,
        api::handlers::uploads::upload_files,
        api::handlers::uploads::upload_files_json,
        api::handlers::uploads::list_uploads,
        api::handlers::imports::bulk_import,
        api::handlers::imports::one_shot_demo,
        api::handlers::imports::one_shot_upload,
        api::handlers::imports::import_status,
        api::handlers::resources::list_uploaded_data,
        api::handlers::resources::get_uploaded_data,
        api::handlers::resources::list_uploaded_layers,
        api::handlers::resources::get_uploaded_layer,
        api::handlers::resources::list_uploaded_files,
        api::handlers::resources::get_uploaded_file,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::uploads::UploadResponse,
            api::handlers::health::HealthResponse,
            services::intake::CandidateFile,
            services::upload_service::UploadSummary,
            services::upload_service::ImportStatus,
            services::upload_service::LayerStatus,
            services::resources::Page,
            services::resources::PageMeta,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "uploads", description = "Upload intake endpoints"),
        (name = "imports", description = "Import scheduling and status"),
        (name = "importer-api", description = "REST collections over uploads"),
        (name = "system", description = "Service health")
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "jwt",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub config: Arc<ImporterConfig>,
    pub validator: UploadValidator,
    pub quota: Arc<dyn QuotaSource>,
    pub upload_service: Arc<UploadService>,
    pub resources: Arc<dyn ImporterResources>,
}

impl AppState {
    /// Wires the default collaborators for `config`.
    pub fn new(db: DatabaseConnection, config: ImporterConfig) -> Self {
        let validator =
            UploadValidator::new(ImportPolicy::from_config(&config), config.upload_dir.clone());

        Self {
            quota: Arc::new(DbQuotaSource::new(db.clone())),
            upload_service: Arc::new(UploadService::new(db.clone())),
            resources: create_resources(&config, db.clone()),
            validator,
            config: Arc::new(config),
            db,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .route("/health", get(api::handlers::health::health_check));

    for entry in route_table() {
        let handler = match entry.access {
            Access::Authenticated => entry
                .handler
                .clone()
                .layer(from_fn_with_state(state.clone(), auth_middleware)),
            Access::Public => entry
                .handler
                .clone()
                .layer(from_fn_with_state(state.clone(), optional_auth_middleware)),
        };
        for path in entry.paths() {
            tracing::debug!("Mounting {} at {}", entry.name, path);
            router = router.route(&path, handler.clone());
        }
    }

    router
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(Any),
        )
        .layer(axum::extract::DefaultBodyLimit::max(
            state.config.max_request_size,
        ))
        .with_state(state)
}
