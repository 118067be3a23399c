use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "document_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    Aadhaar,
    DrivingLicense,
    Passport,
    Other,
}

impl std::str::FromStr for DocumentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "aadhaar" => Ok(DocumentType::Aadhaar),
            "driving_license" => Ok(DocumentType::DrivingLicense),
            "passport" => Ok(DocumentType::Passport),
            "other" => Ok(DocumentType::Other),
            other => Err(format!("unknown document type '{}'", other)),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, sqlx::Type, ToSchema)]
#[sqlx(type_name = "document_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DocumentStatus {
    Pending,
    Verified,
    Rejected,
}

/// Identity document attached to a booking.
#[derive(Debug, Serialize, Deserialize, Clone, FromRow, ToSchema)]
pub struct BookingDocument {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub document_type: DocumentType,
    pub document_name: String,
    /// Retrievable URL of the stored blob
    pub file_url: String,
    pub status: DocumentStatus,
    pub uploaded_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<Uuid>,
}

#[derive(Debug, Clone)]
pub struct NewDocument {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub document_type: DocumentType,
    pub document_name: String,
    pub file_url: String,
}

/// ✅ **Reviewer verdict on a document**
#[derive(Debug, Deserialize, Clone, ToSchema)]
pub struct DocumentVerification {
    pub status: DocumentStatus,
}

#[derive(Serialize, ToSchema)]
pub struct DocumentUploadSchema {
    /// Document type: aadhaar, driving_license, passport or other
    document_type: String,
    /// The file to be uploaded (multipart/form-data)
    file: String,
}
