//! Sellers, shippers, locations and product statuses share one shape: a
//! tenant-unique name. One set of handlers serves all four.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use common_http_errors::ApiResult;
use common_security::TenantCtxExtractor;
use serde::Deserialize;
use uuid::Uuid;

use super::{accept, require_name, Accepted};
use crate::app::AppState;
use crate::model::Catalog;

#[derive(Debug, Deserialize)]
pub struct NameBody {
    pub name: String,
}

pub(crate) async fn list(catalog: Catalog, State(state): State<AppState>, TenantCtxExtractor(ctx): TenantCtxExtractor) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "list_records", async move { Ok(store.list_named(tenant_id, catalog).await?) }).await
}

pub(crate) async fn get_one(
    catalog: Catalog,
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "get_record", async move { Ok(store.get_named(tenant_id, catalog, id).await?) }).await
}

pub(crate) async fn create(
    catalog: Catalog,
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Json(body): Json<NameBody>,
) -> ApiResult<Accepted> {
    let name = require_name(&ctx, "name", &body.name)?;
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    Ok(accept(&state, &ctx, "create_record", async move { Ok(store.create_named(tenant_id, catalog, &name).await?) })
        .await)
}

pub(crate) async fn rename(
    catalog: Catalog,
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
    Json(body): Json<NameBody>,
) -> ApiResult<Accepted> {
    let name = require_name(&ctx, "name", &body.name)?;
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    Ok(accept(&state, &ctx, "rename_record", async move {
        Ok(store.rename_named(tenant_id, catalog, id, &name).await?)
    })
    .await)
}

pub(crate) async fn delete(
    catalog: Catalog,
    State(state): State<AppState>,
    TenantCtxExtractor(ctx): TenantCtxExtractor,
    Path(id): Path<Uuid>,
) -> Accepted {
    let store = state.store.clone();
    let tenant_id = ctx.tenant_id;
    accept(&state, &ctx, "delete_record", async move {
        store.delete_named(tenant_id, catalog, id).await?;
        Ok(serde_json::json!({ "id": id, "deleted": true }))
    })
    .await
}

/// Mount the five record operations for `catalog` under `base`.
pub fn routes(router: Router<AppState>, base: &str, catalog: Catalog) -> Router<AppState> {
    router
        .route(
            base,
            get(move |state: State<AppState>, ctx: TenantCtxExtractor| list(catalog, state, ctx)).post(
                move |state: State<AppState>, ctx: TenantCtxExtractor, body: Json<NameBody>| {
                    create(catalog, state, ctx, body)
                },
            ),
        )
        .route(
            &format!("{base}/:id"),
            get(move |state: State<AppState>, ctx: TenantCtxExtractor, id: Path<Uuid>| get_one(catalog, state, ctx, id))
                .put(
                    move |state: State<AppState>, ctx: TenantCtxExtractor, id: Path<Uuid>, body: Json<NameBody>| {
                        rename(catalog, state, ctx, id, body)
                    },
                )
                .delete(move |state: State<AppState>, ctx: TenantCtxExtractor, id: Path<Uuid>| {
                    delete(catalog, state, ctx, id)
                }),
        )
}
