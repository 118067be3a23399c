use axum::{
    body::Body,
    extract::{multipart::Field, Multipart, Path, State},
    http::{header, StatusCode},
    response::Response,
    routing::{get, patch},
    Extension, Json, Router,
};
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{error, warn};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::api::auth::SecurityAddon;
use crate::app_state::AppState;
use crate::db::models::document::{
    BookingDocument, DocumentStatus, DocumentType, DocumentUploadSchema, DocumentVerification,
};
use crate::roles::Caller;
use crate::utils::api_response::ApiResponse;
use crate::utils::storage::{content_type_for, document_url, sanitize_file_name, DocumentStorage};

fn bad_upload(message: &str, detail: Option<String>) -> ApiResponse<()> {
    ApiResponse::error(
        StatusCode::BAD_REQUEST,
        message,
        detail.map(|d| json!({ "message": d })),
    )
}

/// Streams one multipart file field into the blob for `document_id`.
/// Returns the number of bytes written.
async fn store_blob(
    storage: &DocumentStorage,
    booking_id: Uuid,
    document_id: Uuid,
    mut field: Field<'_>,
) -> Result<u64, ApiResponse<()>> {
    let mut file = storage.create(booking_id, document_id).await.map_err(|e| {
        error!("Failed to create blob for booking {}: {}", booking_id, e);
        ApiResponse::<()>::error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to store document",
            None,
        )
    })?;

    let mut written = 0u64;
    while let Some(chunk) = field.chunk().await.map_err(|e| {
        ApiResponse::<()>::error(e.status(), "Failed to read document data", Some(json!({ "message": e.body_text() })))
    })? {
        file.write_all(&chunk).await.map_err(|e| {
            error!("Failed to write blob for booking {}: {}", booking_id, e);
            ApiResponse::<()>::error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to store document",
                None,
            )
        })?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(|e| {
        error!("Failed to flush blob for booking {}: {}", booking_id, e);
        ApiResponse::<()>::error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store document", None)
    })?;
    Ok(written)
}

/// Reads the `document_type` and `file` fields. The blob is written as soon
/// as the file field arrives, so the caller removes it on any error.
async fn receive_upload(
    storage: &DocumentStorage,
    booking_id: Uuid,
    document_id: Uuid,
    multipart: &mut Multipart,
) -> Result<(DocumentType, String), ApiResponse<()>> {
    let mut document_type = None;
    let mut file_name = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_upload("Failed to process multipart data", Some(e.body_text())))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "document_type" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_upload("Failed to read document_type", Some(e.body_text())))?;
                document_type = Some(
                    text.parse::<DocumentType>()
                        .map_err(|e| bad_upload("Invalid document_type", Some(e)))?,
                );
            }
            "file" => {
                if file_name.is_some() {
                    return Err(bad_upload("Only one file can be uploaded at a time", None));
                }
                let original = sanitize_file_name(field.file_name().unwrap_or_default());
                let written = store_blob(storage, booking_id, document_id, field).await?;
                if written == 0 {
                    return Err(bad_upload("The uploaded file is empty", None));
                }
                file_name = Some(original);
            }
            _ => {}
        }
    }

    match (document_type, file_name) {
        (Some(document_type), Some(file_name)) => Ok((document_type, file_name)),
        (None, _) => Err(bad_upload("Missing document_type field", None)),
        (_, None) => Err(bad_upload("Missing file field", None)),
    }
}

/// ✅ Upload an identity document (multipart: `document_type`, `file`)
#[utoipa::path(
    post,
    path = "/bookings/{id}/documents",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Booking ID")),
    request_body(content = DocumentUploadSchema, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Document uploaded", body = BookingDocument),
        (status = 400, description = "Malformed upload"),
        (status = 403, description = "Caller does not own the booking"),
        (status = 404, description = "Booking not found"),
        (status = 409, description = "Booking no longer accepts documents"),
        (status = 413, description = "File too large")
    ),
    security(("bearerAuth" = []))
)]
pub async fn upload_document(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<ApiResponse<BookingDocument>, ApiResponse<()>> {
    state.bookings.authorize_upload(&caller, id).await?;

    let document_id = Uuid::new_v4();
    let (document_type, file_name) =
        match receive_upload(&state.documents, id, document_id, &mut multipart).await {
            Ok(upload) => upload,
            Err(e) => {
                warn!(booking_id = %id, "Document upload refused: {}", e.message);
                state.documents.remove(id, document_id).await;
                return Err(e);
            }
        };

    let document = match state
        .bookings
        .attach_document(id, document_id, document_type, file_name, document_url(id, document_id))
        .await
    {
        Ok(document) => document,
        Err(e) => {
            state.documents.remove(id, document_id).await;
            return Err(e.into());
        }
    };

    Ok(ApiResponse::success(StatusCode::CREATED, "Document uploaded", document))
}

/// Documents attached to a booking, newest first.
#[utoipa::path(
    get,
    path = "/bookings/{id}/documents",
    tag = "Documents",
    params(("id" = Uuid, Path, description = "Booking ID")),
    responses(
        (status = 200, description = "Documents retrieved", body = Vec<BookingDocument>),
        (status = 404, description = "Booking not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn list_documents(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path(id): Path<Uuid>,
) -> Result<ApiResponse<Vec<BookingDocument>>, ApiResponse<()>> {
    let documents = state.bookings.documents(&caller, id).await?;
    Ok(ApiResponse::success(StatusCode::OK, "Documents retrieved", documents))
}

#[utoipa::path(
    get,
    path = "/bookings/{id}/documents/{doc_id}/file",
    tag = "Documents",
    params(
        ("id" = Uuid, Path, description = "Booking ID"),
        ("doc_id" = Uuid, Path, description = "Document ID")
    ),
    responses(
        (status = 200, description = "Document contents"),
        (status = 404, description = "Document not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn download_document(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((id, doc_id)): Path<(Uuid, Uuid)>,
) -> Result<Response, ApiResponse<()>> {
    let document = state.bookings.document(&caller, id, doc_id).await?;

    let file = state.documents.open(id, doc_id).await.map_err(|e| {
        error!("Blob for document {} is unreadable: {}", doc_id, e);
        ApiResponse::<()>::error(StatusCode::NOT_FOUND, "Document file not found", None)
    })?;

    let disposition = format!(
        "inline; filename=\"{}\"",
        document.document_name.replace('"', "")
    );
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, content_type_for(&document.document_name))
        .header(header::CONTENT_DISPOSITION, disposition)
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| {
            error!("Failed to build download response: {}", e);
            ApiResponse::<()>::error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to send document", None)
        })
}

/// ✅ Admin1 / super_admin verdict on a document
#[utoipa::path(
    patch,
    path = "/bookings/{id}/documents/{doc_id}",
    tag = "Documents",
    params(
        ("id" = Uuid, Path, description = "Booking ID"),
        ("doc_id" = Uuid, Path, description = "Document ID")
    ),
    request_body = DocumentVerification,
    responses(
        (status = 200, description = "Document reviewed", body = BookingDocument),
        (status = 400, description = "Status must be verified or rejected"),
        (status = 403, description = "Caller may not verify documents"),
        (status = 404, description = "Document not found")
    ),
    security(("bearerAuth" = []))
)]
pub async fn verify_document(
    State(state): State<AppState>,
    Extension(caller): Extension<Caller>,
    Path((id, doc_id)): Path<(Uuid, Uuid)>,
    Json(verdict): Json<DocumentVerification>,
) -> Result<ApiResponse<BookingDocument>, ApiResponse<()>> {
    let document = state
        .bookings
        .verify_document(&caller, id, doc_id, verdict.status)
        .await?;
    Ok(ApiResponse::success(StatusCode::OK, "Document reviewed", document))
}

pub fn document_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/bookings/{id}/documents",
            get(list_documents).post(upload_document),
        )
        .route("/bookings/{id}/documents/{doc_id}", patch(verify_document))
        .route("/bookings/{id}/documents/{doc_id}/file", get(download_document))
}

#[derive(OpenApi)]
#[openapi(
    paths(upload_document, list_documents, download_document, verify_document),
    components(schemas(
        BookingDocument,
        DocumentType,
        DocumentStatus,
        DocumentVerification,
        DocumentUploadSchema
    )),
    tags((name = "Documents", description = "Identity documents attached to bookings")),
    modifiers(&SecurityAddon)
)]
pub struct DocumentDoc;
