use std::io;
use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

/// Identity document blobs on local disk, one directory per booking:
/// `{root}/{booking_id}/{document_id}`.
#[derive(Debug, Clone)]
pub struct DocumentStorage {
    root: PathBuf,
}

impl DocumentStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blob_path(&self, booking_id: Uuid, document_id: Uuid) -> PathBuf {
        self.root
            .join(booking_id.to_string())
            .join(document_id.to_string())
    }

    /// Creates (or truncates) the blob file, creating the booking directory.
    pub async fn create(&self, booking_id: Uuid, document_id: Uuid) -> io::Result<fs::File> {
        let path = self.blob_path(booking_id, document_id);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::File::create(path).await
    }

    pub async fn open(&self, booking_id: Uuid, document_id: Uuid) -> io::Result<fs::File> {
        fs::File::open(self.blob_path(booking_id, document_id)).await
    }

    /// Best-effort cleanup after a failed upload.
    pub async fn remove(&self, booking_id: Uuid, document_id: Uuid) {
        let path = self.blob_path(booking_id, document_id);
        if let Err(e) = fs::remove_file(&path).await {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove blob {}: {}", path.display(), e);
            }
        }
    }
}

/// URL under which a stored document can be downloaded.
pub fn document_url(booking_id: Uuid, document_id: Uuid) -> String {
    format!("/bookings/{}/documents/{}/file", booking_id, document_id)
}

/// Content type guessed from the uploaded file name.
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Keeps only the final path component of a client-supplied file name.
pub fn sanitize_file_name(raw: &str) -> String {
    let name = raw
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or("")
        .trim();
    if name.is_empty() || name == "." || name == ".." {
        "document".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[test]
    fn file_names_lose_their_directories() {
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\scans\\aadhaar.pdf"), "aadhaar.pdf");
        assert_eq!(sanitize_file_name(".."), "document");
        assert_eq!(sanitize_file_name(""), "document");
    }

    #[test]
    fn content_types() {
        assert_eq!(content_type_for("scan.PDF"), "application/pdf");
        assert_eq!(content_type_for("front.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("noext"), "application/octet-stream");
    }

    #[tokio::test]
    async fn blobs_round_trip_on_disk() {
        let root = std::env::temp_dir().join(format!("venue-docs-{}", Uuid::new_v4()));
        let storage = DocumentStorage::new(&root);
        let (booking, doc) = (Uuid::new_v4(), Uuid::new_v4());

        let mut file = storage.create(booking, doc).await.unwrap();
        file.write_all(b"scan").await.unwrap();
        file.flush().await.unwrap();
        drop(file);

        let mut contents = Vec::new();
        storage
            .open(booking, doc)
            .await
            .unwrap()
            .read_to_end(&mut contents)
            .await
            .unwrap();
        assert_eq!(contents, b"scan");

        storage.remove(booking, doc).await;
        assert!(storage.open(booking, doc).await.is_err());
        let _ = std::fs::remove_dir_all(root);
    }
}
