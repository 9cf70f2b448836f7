use std::sync::Arc;

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use serde::{Deserialize, Serialize};
use tagseq::{
    Advance, Asset, AssetRegistry, CategoryId, CollisionPolicy, CommitStrategy, MemoryStore,
    NewSequenceConfig, SequenceConfig, SequenceKey, SequenceStore, SqliteStore,
    policy::Capability,
    workflow::{AssetCreation, CommitOutcome, NewAsset},
};

use crate::server::{
    config::{ServerConfig, StoreBackend},
    error::ApiError,
    service::principal::Principal,
    telemetry::{
        increment_commit_failures, increment_commits, increment_tags_generated,
        record_tag_collisions,
    },
};

pub type Store = Arc<dyn SequenceStore>;
pub type Registry = Arc<dyn AssetRegistry>;

/// Shared state behind every route.
///
/// Store calls are synchronous (SQLite in particular), so handlers run them on
/// the blocking pool via [`TagService::blocking`].
#[derive(Clone)]
pub struct TagService {
    store: Store,
    creation: Arc<AssetCreation<Store, Registry>>,
}

impl TagService {
    pub fn new(
        store: Store,
        registry: Registry,
        policy: CollisionPolicy,
        strategy: CommitStrategy,
    ) -> Self {
        let creation = AssetCreation::new(Arc::clone(&store), registry, policy, strategy);
        Self {
            store,
            creation: Arc::new(creation),
        }
    }

    pub fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        let (store, registry) = match &config.store {
            StoreBackend::Memory => shared(MemoryStore::new()),
            StoreBackend::SqliteInMemory => shared(
                SqliteStore::open_in_memory().context("failed to open in-memory SQLite")?,
            ),
            StoreBackend::Sqlite(path) => shared(
                SqliteStore::open(path)
                    .with_context(|| format!("failed to open SQLite at {}", path.display()))?,
            ),
        };
        Ok(Self::new(
            store,
            registry,
            config.collision_policy,
            config.commit_strategy,
        ))
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: FnOnce(&Self) -> tagseq::Result<T> + Send + 'static,
    {
        let service = self.clone();
        tokio::task::spawn_blocking(move || f(&service))
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?
            .map_err(ApiError::from)
    }
}

/// One backend serving as both the sequence store and the asset registry.
fn shared<T>(backend: T) -> (Store, Registry)
where
    T: SequenceStore + AssetRegistry + 'static,
{
    let backend = Arc::new(backend);
    let store: Store = backend.clone();
    let registry: Registry = backend;
    (store, registry)
}

pub fn router(service: TagService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/next-asset-id-by-category", post(next_asset_id))
        .route("/reserve-next-asset-id", post(reserve_next_asset_id))
        .route(
            "/category-tag-formats",
            post(create_tag_format).get(list_tag_formats),
        )
        .route("/category-tag-formats/{category_id}", get(get_tag_format))
        .route(
            "/category-tag-formats/{category_id}/current-number",
            put(set_current_number),
        )
        .route("/assets", post(create_asset))
        .with_state(service)
}

fn category(raw: String) -> Result<CategoryId, ApiError> {
    CategoryId::new(raw).map_err(|e| ApiError::InvalidRequest {
        reason: e.to_string(),
    })
}

#[derive(Debug, Deserialize)]
pub struct CategoryRequest {
    #[serde(alias = "categoryId")]
    pub category_id: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NextAssetIdResponse {
    pub asset_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ReserveResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateTagFormatRequest {
    #[serde(alias = "categoryId")]
    pub category_id: String,
    pub prefix: String,
    #[serde(default, alias = "startingNumber")]
    pub starting_number: Option<u64>,
    #[serde(default, alias = "zeroPadding")]
    pub zero_padding: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SetCurrentNumberRequest {
    #[serde(alias = "currentNumber")]
    pub current_number: u64,
}

#[derive(Debug, Deserialize)]
pub struct CreateAssetRequest {
    #[serde(alias = "categoryId")]
    pub category_id: String,
    pub name: String,
    #[serde(default, alias = "assetTag")]
    pub asset_tag: Option<String>,
}

// The two tag endpoints keep the camelCase keys existing clients read
// (`assetId`, `needsConfiguration`). Everything else is snake_case, matching
// the serialized `SequenceConfig` and `Asset` records.

#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CommitResponse {
    Committed { current_number: u64 },
    Skipped,
    Failed {
        error: String,
    },
}

impl From<CommitOutcome> for CommitResponse {
    fn from(outcome: CommitOutcome) -> Self {
        match outcome {
            CommitOutcome::Committed(advance) => Self::Committed {
                current_number: advance.current,
            },
            CommitOutcome::Skipped => Self::Skipped,
            CommitOutcome::Failed { reason } => Self::Failed { error: reason },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateAssetResponse {
    pub asset: Asset,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    pub commit: CommitResponse,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Returns the next candidate tag without reserving it.
#[tracing::instrument(skip_all, fields(tenant = principal.tenant_id.0))]
async fn next_asset_id(
    State(service): State<TagService>,
    principal: Principal,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<Json<NextAssetIdResponse>, ApiError> {
    principal.require(Capability::GenerateTags)?;
    let Json(request) = payload?;
    let key = SequenceKey::new(principal.tenant_id, category(request.category_id)?);

    let allocation = service
        .blocking(move |s| s.creation.allocator().generate(&key))
        .await?;

    increment_tags_generated();
    if let Some(warning) = &allocation.warning {
        record_tag_collisions(warning.skipped);
    }
    Ok(Json(NextAssetIdResponse {
        asset_id: allocation.identifier,
        warning: allocation.warning.map(|w| w.to_string()),
    }))
}

/// Advances the counter after the caller created an asset with the tag.
#[tracing::instrument(skip_all, fields(tenant = principal.tenant_id.0))]
async fn reserve_next_asset_id(
    State(service): State<TagService>,
    principal: Principal,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<Json<ReserveResponse>, Response> {
    let failed = |err: ApiError| {
        let status = err.status();
        let body = ReserveResponse {
            success: false,
            error: Some(err.body().error),
        };
        (status, Json(body)).into_response()
    };

    principal
        .require(Capability::CreateAssets)
        .map_err(failed)?;
    let Json(request) = payload.map_err(|e| failed(e.into()))?;
    let key = SequenceKey::new(
        principal.tenant_id,
        category(request.category_id).map_err(failed)?,
    );

    let advanced: Result<Advance, ApiError> = service
        .blocking(move |s| s.creation.committer().advance(&key))
        .await;
    match advanced {
        Ok(advance) => {
            increment_commits();
            tracing::debug!(current = advance.current, "asset tag reserved");
            Ok(Json(ReserveResponse {
                success: true,
                error: None,
            }))
        }
        Err(err) => {
            increment_commit_failures();
            tracing::warn!(error = %err, "failed to reserve asset tag");
            Err(failed(err))
        }
    }
}

async fn create_tag_format(
    State(service): State<TagService>,
    principal: Principal,
    payload: Result<Json<CreateTagFormatRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SequenceConfig>), ApiError> {
    principal.require(Capability::ConfigureTagFormats)?;
    let Json(request) = payload?;
    let config = NewSequenceConfig {
        category_id: category(request.category_id)?,
        prefix: request.prefix,
        starting_number: request.starting_number,
        zero_padding: request.zero_padding,
    }
    .into_config(principal.tenant_id)
    .map_err(|e| ApiError::InvalidRequest {
        reason: e.to_string(),
    })?;

    let created = service
        .blocking(move |s| {
            s.store.create(config.clone())?;
            Ok(config)
        })
        .await?;
    tracing::info!(key = %created.key(), prefix = %created.prefix, "tag format configured");
    Ok((StatusCode::CREATED, Json(created)))
}

async fn list_tag_formats(
    State(service): State<TagService>,
    principal: Principal,
) -> Result<Json<Vec<SequenceConfig>>, ApiError> {
    principal.require(Capability::ViewAssets)?;
    let tenant_id = principal.tenant_id;
    let configs = service
        .blocking(move |s| Ok(s.store.list(tenant_id)?))
        .await?;
    Ok(Json(configs))
}

async fn get_tag_format(
    State(service): State<TagService>,
    principal: Principal,
    Path(category_id): Path<String>,
) -> Result<Json<SequenceConfig>, ApiError> {
    principal.require(Capability::ViewAssets)?;
    let key = SequenceKey::new(principal.tenant_id, category(category_id)?);
    let config = service.blocking(move |s| Ok(s.store.get(&key)?)).await?;
    Ok(Json(config))
}

async fn set_current_number(
    State(service): State<TagService>,
    principal: Principal,
    Path(category_id): Path<String>,
    payload: Result<Json<SetCurrentNumberRequest>, JsonRejection>,
) -> Result<Json<SequenceConfig>, ApiError> {
    principal.require(Capability::ConfigureTagFormats)?;
    let Json(request) = payload?;
    let key = SequenceKey::new(principal.tenant_id, category(category_id)?);

    let config = service
        .blocking(move |s| {
            s.store.set_current_number(&key, request.current_number)?;
            Ok(s.store.get(&key)?)
        })
        .await?;
    tracing::info!(key = %config.key(), current = config.current_number, "counter reset");
    Ok(Json(config))
}

/// Creates an asset, generating its tag when none is supplied, and reserves
/// the tag it consumed.
#[tracing::instrument(skip_all, fields(tenant = principal.tenant_id.0))]
async fn create_asset(
    State(service): State<TagService>,
    principal: Principal,
    payload: Result<Json<CreateAssetRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateAssetResponse>), ApiError> {
    principal.require(Capability::CreateAssets)?;
    let Json(request) = payload?;
    let generated = request.asset_tag.is_none();
    let new_asset = NewAsset {
        category_id: category(request.category_id)?,
        name: request.name,
        asset_tag: request.asset_tag,
    };
    let tenant_id = principal.tenant_id;

    let created = service
        .blocking(move |s| s.creation.create(tenant_id, new_asset))
        .await?;

    if generated {
        increment_tags_generated();
    }
    if let Some(warning) = &created.warning {
        record_tag_collisions(warning.skipped);
    }
    match &created.commit {
        CommitOutcome::Committed(_) => increment_commits(),
        CommitOutcome::Failed { .. } => increment_commit_failures(),
        CommitOutcome::Skipped => {}
    }

    Ok((
        StatusCode::CREATED,
        Json(CreateAssetResponse {
            asset: created.asset,
            warning: created.warning.map(|w| w.to_string()),
            commit: created.commit.into(),
        }),
    ))
}
