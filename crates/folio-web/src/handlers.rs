use axum::{
    Form, Json,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Redirect, Response},
};

use folio_core::{FolioError, Resolution, Route};

use crate::WebState;
use crate::assets::FOLIO_CSS;
use crate::dto::{PageQuery, SaveForm, UploadResponse};
use crate::error::{folio_error_response, multipart_error_response};
use crate::page;

const UPLOAD_DIR: &str = "images";
const UPLOAD_FIELD: &str = "file";
const UPLOAD_OPERATION: &str = "upload";

pub async fn stylesheet() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        FOLIO_CSS,
    )
        .into_response()
}

pub async fn resolve_root(
    State(state): State<WebState>,
    Query(query): Query<PageQuery>,
) -> Response {
    resolve(&state, "/", query).await
}

pub async fn resolve_route(
    State(state): State<WebState>,
    Path(route): Path<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    resolve(&state, &route, query).await
}

pub async fn save_root(State(state): State<WebState>, Form(form): Form<SaveForm>) -> Response {
    save(&state, "/", &form).await
}

pub async fn save_route(
    State(state): State<WebState>,
    Path(route): Path<String>,
    Form(form): Form<SaveForm>,
) -> Response {
    save(&state, &route, &form).await
}

async fn resolve(state: &WebState, route: &str, query: PageQuery) -> Response {
    let resolution = state.resolver.resolve(route, query.into_flags()).await;
    resolution_response(resolution)
}

async fn save(state: &WebState, route: &str, form: &SaveForm) -> Response {
    let resolution = state
        .resolver
        .save(route, &form.normalized_content())
        .await;
    resolution_response(resolution)
}

fn resolution_response(resolution: Resolution) -> Response {
    match resolution {
        Resolution::Page(page) => Html(page::render(&page)).into_response(),
        Resolution::Raw { bytes, mime, .. } => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, mime),
                (header::CACHE_CONTROL, "no-cache".to_string()),
            ],
            bytes,
        )
            .into_response(),
        Resolution::Redirect { route, create } => {
            let location = route.href(create.then_some("create=1"));
            Redirect::to(&location).into_response()
        }
        Resolution::NotHandled => StatusCode::NOT_FOUND.into_response(),
    }
}

pub async fn upload(State(state): State<WebState>, mut multipart: Multipart) -> Response {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(err) => return multipart_error_response(&err, UPLOAD_OPERATION),
        };
        if field.name() != Some(UPLOAD_FIELD) {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        return match field.bytes().await {
            Ok(bytes) => store_upload(&state, &file_name, &bytes).await,
            Err(err) => multipart_error_response(&err, UPLOAD_OPERATION),
        };
    }

    folio_error_response(
        FolioError::Validation(format!("multipart field `{UPLOAD_FIELD}` is required")),
        UPLOAD_OPERATION,
        None,
    )
}

async fn store_upload(state: &WebState, file_name: &str, bytes: &[u8]) -> Response {
    let dir = match Route::root().join(UPLOAD_DIR) {
        Ok(dir) => dir,
        Err(err) => return folio_error_response(err, UPLOAD_OPERATION, None),
    };
    let store = state.resolver.store();
    match store.write_upload(&dir, file_name, bytes).await {
        Ok(route) => {
            tracing::info!(%route, bytes = bytes.len(), "stored upload");
            if let Err(err) = state.resolver.index().update(&route).await {
                tracing::warn!(%route, error = %err, "index update after upload failed");
            }
            (
                StatusCode::OK,
                Json(UploadResponse {
                    path: route.to_string(),
                }),
            )
                .into_response()
        }
        Err(err) => folio_error_response(err, UPLOAD_OPERATION, Some(format!("/{UPLOAD_DIR}"))),
    }
}
