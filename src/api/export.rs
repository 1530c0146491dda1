use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use tracing::info;

use super::{AppState, SessionContext};
use crate::errors::ApiError;
use crate::export::{CefExporter, cef_file_name, csv_file_name, export_csv as render_csv};
use crate::search::SearchType;

fn attachment(content_type: &str, file_name: &str, body: String) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, format!("attachment; filename=\"{file_name}\"")),
        ],
        body,
    )
        .into_response()
}

#[utoipa::path(
    get,
    path = "/search/{search_type}/export/csv",
    tag = "export",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    responses((status = 200, description = "Every matching row as CSV", body = String, content_type = "text/csv"))
)]
pub async fn export_csv(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
) -> Result<Response, ApiError> {
    let session = state.session(&ctx, search_type).await?;
    let data = session.export_data().await?;
    let body = render_csv(&data.fields, &data.rows)?;
    let file_name = csv_file_name(search_type);
    session.record_export("csv", &file_name, data.rows.len()).await?;
    info!(%search_type, rows = data.rows.len(), "Exported CSV");
    Ok(attachment("text/csv; charset=utf-8", &file_name, body))
}

#[utoipa::path(
    get,
    path = "/search/{search_type}/export/cef",
    tag = "export",
    params(("search_type" = SearchType, Path, description = "Object type searched")),
    responses(
        (status = 200, description = "Every matching row as a CEF line", body = String, content_type = "text/plain"),
        (status = 400, description = "No Result found")
    )
)]
pub async fn export_cef(
    State(state): State<AppState>,
    ctx: SessionContext,
    Path(search_type): Path<SearchType>,
) -> Result<Response, ApiError> {
    let session = state.session(&ctx, search_type).await?;
    let data = session.export_data().await?;
    let body = CefExporter::new(&state.config.cef, search_type).export(&data.fields, &data.rows, Utc::now())?;
    let file_name = cef_file_name(search_type);
    session.record_export("cef", file_name, data.rows.len()).await?;
    info!(%search_type, rows = data.rows.len(), "Exported CEF");
    Ok(attachment("text/plain; charset=utf-8", file_name, body))
}
