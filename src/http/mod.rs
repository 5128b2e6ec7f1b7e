//! Thin `axum` transport layer (out of core scope per §1; wired here as the
//! external collaborator the core needs nobody but this module to exist).
//!
//! Routing covers the *qualified-subject* form of §4.7 (`:.ctx:subject` or a
//! bare subject for the default context) directly in the path segment; the
//! URL-prefix form (`/contexts/{c}/...`) reuses the same
//! `context_router::parse_url_prefix` parser but is left as a pure function
//! rather than duplicated as a second router mount for every route below —
//! routing-surface completeness is explicitly out of core scope (§1).

pub mod dto;

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};

use crate::context_router::{self, RoutedSubject};
use crate::error::RegistryError;
use crate::import;
use crate::model::SchemaType;
use crate::registry::{RegisterRequest, RegistryCore, VersionLookup};

use dto::*;

#[derive(Clone)]
pub struct AppState {
    pub core: RegistryCore,
}

pub fn router(core: RegistryCore) -> Router {
    let state = Arc::new(AppState { core });
    Router::new()
        .route("/subjects", get(list_subjects))
        .route("/subjects/:subject/versions", post(register_schema).get(list_versions))
        .route("/subjects/:subject", post(lookup_schema).delete(delete_subject))
        .route("/subjects/:subject/versions/:version", get(get_version).delete(delete_version))
        .route("/subjects/:subject/versions/:version/schema", get(get_version_schema))
        .route("/subjects/:subject/versions/:version/referencedby", get(referenced_by))
        .route("/schemas/ids/:id", get(get_schema_by_id))
        .route("/schemas/ids/:id/schema", get(get_schema_by_id_raw))
        .route("/schemas/ids/:id/subjects", get(subjects_for_id))
        .route("/schemas/ids/:id/versions", get(versions_for_id))
        .route("/schemas/types", get(schema_types))
        .route("/config", get(get_global_config).put(put_global_config))
        .route("/config/:subject", get(get_subject_config).put(put_subject_config).delete(delete_subject_config))
        .route("/compatibility/subjects/:subject/versions/:version", post(check_compatibility))
        .route("/mode", get(get_global_mode).put(put_global_mode))
        .route("/mode/:subject", get(get_subject_mode).put(put_subject_mode).delete(delete_subject_mode))
        .route("/contexts", get(list_contexts))
        .route("/contexts/:context/import", post(import_batch))
        .with_state(state)
}

fn bool_flag(params: &HashMap<String, String>, key: &str) -> bool {
    params.get(key).map(|v| v == "true").unwrap_or(false)
}

fn route(raw_subject: &str) -> Result<RoutedSubject, RegistryError> {
    context_router::parse_qualified_subject(raw_subject)
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorBody { error_code: self.0.error_code(), message: self.0.to_string() };
        (status, Json(body)).into_response()
    }
}

pub struct ApiError(RegistryError);

impl From<RegistryError> for ApiError {
    fn from(e: RegistryError) -> Self {
        Self(e)
    }
}

type ApiResult<T> = Result<T, ApiError>;

async fn register_schema(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<RegisterSchemaRequest>,
) -> ApiResult<Json<RegisterSchemaResponse>> {
    let routed = route(&subject)?;
    let normalize_query = params.get("normalize").map(|v| v == "true");
    let req = RegisterRequest {
        context: routed.context.as_str().to_owned(),
        subject: routed.subject,
        schema_type: body.schema_type.unwrap_or(SchemaType::Avro),
        schema_text: body.schema,
        references: body.references,
        metadata: body.metadata,
        rule_set: body.rule_set,
        normalize_query,
        explicit_id: body.id,
    };
    let resp = state.core.register(req).await?;
    Ok(Json(resp.into()))
}

async fn lookup_schema(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<LookupSchemaRequest>,
) -> ApiResult<Json<SchemaVersionResponse>> {
    let routed = route(&subject)?;
    let include_deleted = bool_flag(&params, "deleted");
    let normalize_query = params.get("normalize").map(|v| v == "true");
    let row = state
        .core
        .lookup_schema_under_subject(
            routed.context.as_str(),
            &routed.subject,
            body.schema_type.unwrap_or(SchemaType::Avro),
            &body.schema,
            &body.references,
            include_deleted,
            normalize_query,
        )
        .await?;
    let schema = state.core.get_schema_by_id(routed.context.as_str(), row.schema_id).await?;
    Ok(Json(SchemaVersionResponse {
        subject: routed.subject,
        id: row.schema_id,
        version: row.version,
        schema: schema.canonical_text,
        schema_type: schema.schema_type,
        references: schema.references,
        metadata: row.metadata,
        rule_set: row.rule_set,
    }))
}

async fn get_version(
    State(state): State<Arc<AppState>>,
    Path((subject, version)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<SchemaVersionResponse>> {
    let routed = route(&subject)?;
    let include_deleted = bool_flag(&params, "deleted");
    let spec = parse_version_spec(&version, routed.context.as_str())?;
    let row = state.core.get_version(routed.context.as_str(), &routed.subject, spec, include_deleted).await?;
    let schema = state.core.get_schema_by_id(routed.context.as_str(), row.schema_id).await?;
    Ok(Json(SchemaVersionResponse {
        subject: routed.subject,
        id: row.schema_id,
        version: row.version,
        schema: schema.canonical_text,
        schema_type: schema.schema_type,
        references: schema.references,
        metadata: row.metadata,
        rule_set: row.rule_set,
    }))
}

async fn get_version_schema(
    State(state): State<Arc<AppState>>,
    Path((subject, version)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<String> {
    let routed = route(&subject)?;
    let include_deleted = bool_flag(&params, "deleted");
    let spec = parse_version_spec(&version, routed.context.as_str())?;
    let row = state.core.get_version(routed.context.as_str(), &routed.subject, spec, include_deleted).await?;
    let schema = state.core.get_schema_by_id(routed.context.as_str(), row.schema_id).await?;
    Ok(schema.canonical_text)
}

fn parse_version_spec(raw: &str, _context: &str) -> ApiResult<VersionLookup> {
    if raw == "latest" {
        Ok(VersionLookup::Latest)
    } else {
        raw.parse::<i32>()
            .map(VersionLookup::Number)
            .map_err(|_| ApiError(RegistryError::InvalidVersion(raw.to_owned())))
    }
}

async fn list_versions(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<i32>>> {
    let routed = route(&subject)?;
    let deleted = bool_flag(&params, "deleted");
    let deleted_only = bool_flag(&params, "deletedOnly");
    let versions = state.core.list_versions(routed.context.as_str(), &routed.subject, deleted, deleted_only).await?;
    Ok(Json(versions))
}

async fn list_subjects(State(state): State<Arc<AppState>>, Query(params): Query<HashMap<String, String>>) -> ApiResult<Json<Vec<String>>> {
    let prefix = params.get("subjectPrefix").map(|s| s.as_str());
    let deleted = bool_flag(&params, "deleted");
    let deleted_only = bool_flag(&params, "deletedOnly");
    let subjects = state.core.list_subjects(".", prefix, deleted, deleted_only).await?;
    Ok(Json(subjects))
}

async fn delete_subject(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<Vec<i32>>> {
    let routed = route(&subject)?;
    let versions = if bool_flag(&params, "permanent") {
        state.core.permanent_delete_subject(routed.context.as_str(), &routed.subject).await?
    } else {
        state.core.soft_delete_subject(routed.context.as_str(), &routed.subject).await?
    };
    Ok(Json(versions))
}

async fn delete_version(
    State(state): State<Arc<AppState>>,
    Path((subject, version)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<i32>> {
    let routed = route(&subject)?;
    let spec = parse_version_spec(&version, routed.context.as_str())?;
    let number = match spec {
        VersionLookup::Number(n) => n,
        VersionLookup::Latest => {
            state
                .core
                .get_version(routed.context.as_str(), &routed.subject, VersionLookup::Latest, false)
                .await?
                .version
        }
    };
    let result = if bool_flag(&params, "permanent") {
        state.core.permanent_delete_version(routed.context.as_str(), &routed.subject, number).await?
    } else {
        state.core.soft_delete_version(routed.context.as_str(), &routed.subject, number).await?
    };
    Ok(Json(result))
}

async fn referenced_by(
    State(state): State<Arc<AppState>>,
    Path((subject, version)): Path<(String, String)>,
) -> ApiResult<Json<Vec<i64>>> {
    let routed = route(&subject)?;
    let spec = parse_version_spec(&version, routed.context.as_str())?;
    let row = state.core.get_version(routed.context.as_str(), &routed.subject, spec, true).await?;
    let ids = state.core.referenced_by(routed.context.as_str(), &routed.subject, row.version).await?;
    Ok(Json(ids))
}

async fn get_schema_by_id(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<SchemaByIdResponse>> {
    let context = params.get("context").map(|s| s.as_str()).unwrap_or(".");
    let schema = state.core.get_schema_by_id(context, id).await?;
    Ok(Json(SchemaByIdResponse { schema: schema.canonical_text, schema_type: schema.schema_type, references: schema.references }))
}

async fn get_schema_by_id_raw(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<String> {
    let schema = state.core.get_schema_by_id(".", id).await?;
    Ok(schema.canonical_text)
}

async fn subjects_for_id(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<Json<Vec<String>>> {
    let pairs = state.core.schema_subjects(".", id).await?;
    let mut subjects: Vec<String> = pairs.into_iter().map(|(s, _)| s).collect();
    subjects.sort();
    subjects.dedup();
    Ok(Json(subjects))
}

async fn versions_for_id(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> ApiResult<Json<Vec<SubjectVersionPair>>> {
    let pairs = state.core.schema_subjects(".", id).await?;
    Ok(Json(pairs.into_iter().map(|(subject, version)| SubjectVersionPair { subject, version }).collect()))
}

async fn schema_types() -> Json<Vec<&'static str>> {
    Json(vec!["AVRO", "JSON", "PROTOBUF"])
}

async fn get_global_config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    Json(state.core.get_global_config(".").await.into())
}

async fn put_global_config(State(state): State<Arc<AppState>>, Json(body): Json<ConfigUpdateRequest>) -> ApiResult<Json<ConfigResponse>> {
    let entry = body.into();
    state.core.set_global_config(".", entry).await?;
    Ok(Json(state.core.get_global_config(".").await.into()))
}

async fn get_subject_config(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<ConfigResponse>> {
    let routed = route(&subject)?;
    let default_to_global = bool_flag(&params, "defaultToGlobal");
    let entry = state.core.get_subject_config(routed.context.as_str(), &routed.subject, default_to_global).await?;
    Ok(Json(entry.into()))
}

async fn put_subject_config(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
    Json(body): Json<ConfigUpdateRequest>,
) -> ApiResult<Json<ConfigResponse>> {
    let routed = route(&subject)?;
    let entry: crate::model::ConfigEntry = body.into();
    state.core.set_subject_config(routed.context.as_str(), &routed.subject, entry.clone()).await?;
    Ok(Json(entry.into()))
}

async fn delete_subject_config(State(state): State<Arc<AppState>>, Path(subject): Path<String>) -> ApiResult<()> {
    let routed = route(&subject)?;
    state.core.delete_subject_config(routed.context.as_str(), &routed.subject).await;
    Ok(())
}

async fn check_compatibility(
    State(state): State<Arc<AppState>>,
    Path((subject, version)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<LookupSchemaRequest>,
) -> ApiResult<Json<CompatibilityCheckResponse>> {
    let routed = route(&subject)?;
    let spec = parse_version_spec(&version, routed.context.as_str())?;
    let normalize_query = params.get("normalize").map(|v| v == "true");
    let verdict = state
        .core
        .check_compatibility(
            routed.context.as_str(),
            &routed.subject,
            spec,
            body.schema_type.unwrap_or(SchemaType::Avro),
            &body.schema,
            &body.references,
            normalize_query,
        )
        .await?;
    Ok(Json(CompatibilityCheckResponse { is_compatible: verdict.is_compatible, messages: verdict.messages }))
}

async fn get_global_mode(State(state): State<Arc<AppState>>) -> Json<ModeResponse> {
    Json(ModeResponse { mode: state.core.get_global_mode(".").await })
}

async fn put_global_mode(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<ModeUpdateRequest>,
) -> ApiResult<Json<ModeResponse>> {
    let force = bool_flag(&params, "force");
    state.core.set_global_mode(".", body.mode, force).await?;
    Ok(Json(ModeResponse { mode: body.mode }))
}

async fn get_subject_mode(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Json<ModeResponse>> {
    let routed = route(&subject)?;
    let default_to_global = bool_flag(&params, "defaultToGlobal");
    let mode = state.core.get_subject_mode(routed.context.as_str(), &routed.subject, default_to_global).await?;
    Ok(Json(ModeResponse { mode }))
}

async fn put_subject_mode(
    State(state): State<Arc<AppState>>,
    Path(subject): Path<String>,
    Query(params): Query<HashMap<String, String>>,
    Json(body): Json<ModeUpdateRequest>,
) -> ApiResult<Json<ModeResponse>> {
    let routed = route(&subject)?;
    let force = bool_flag(&params, "force");
    state.core.set_subject_mode(routed.context.as_str(), &routed.subject, body.mode, force).await?;
    Ok(Json(ModeResponse { mode: body.mode }))
}

async fn delete_subject_mode(State(state): State<Arc<AppState>>, Path(subject): Path<String>) -> ApiResult<()> {
    let routed = route(&subject)?;
    state.core.delete_subject_mode(routed.context.as_str(), &routed.subject).await;
    Ok(())
}

async fn list_contexts(State(state): State<Arc<AppState>>) -> Json<Vec<String>> {
    Json(state.core.list_contexts().await)
}

async fn import_batch(
    State(state): State<Arc<AppState>>,
    Path(context): Path<String>,
    Json(body): Json<ImportBatchRequest>,
) -> ApiResult<Json<ImportBatchResponse>> {
    let raw_context = if context.starts_with('.') { context } else { format!(".{context}") };
    let context_name = crate::model::ContextName::parse(&raw_context)?;
    let items = body
        .schemas
        .into_iter()
        .map(|s| import::ImportItem {
            id: s.id,
            subject: s.subject,
            version: s.version,
            schema: s.schema,
            schema_type: s.schema_type.unwrap_or(SchemaType::Avro),
            references: s.references,
        })
        .collect();
    let outcome = import::import_batch(state.core.storage(), context_name.as_str(), items).await;
    Ok(Json(ImportBatchResponse { imported: outcome.imported, errors: outcome.errors }))
}
