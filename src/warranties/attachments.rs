use std::future::Future;
use std::time::Duration;

use anyhow::Context;
use bytes::Bytes;
use tracing::{info, warn};
use uuid::Uuid;

use super::model::Warranty;
use super::repo::{self, FileColumn};
use crate::error::ApiError;
use crate::state::AppState;
use crate::storage::StorageClient;

pub const PRESIGN_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentKind {
    Receipt,
    Image,
}

impl AttachmentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AttachmentKind::Receipt => "receipt",
            AttachmentKind::Image => "image",
        }
    }

    fn column(self) -> FileColumn {
        match self {
            AttachmentKind::Receipt => FileColumn::Receipt,
            AttachmentKind::Image => FileColumn::Image,
        }
    }

    pub fn key_of(self, warranty: &Warranty) -> Option<&str> {
        match self {
            AttachmentKind::Receipt => warranty.receipt_key.as_deref(),
            AttachmentKind::Image => warranty.image_key.as_deref(),
        }
    }
}

pub struct UploadItem {
    pub file_name: String,
    pub body: Bytes,
}

/// Lowercased extension of `file_name` if it is in `allowed`.
pub fn allowed_extension(file_name: &str, allowed: &[String]) -> Option<String> {
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    let ext = ext.to_ascii_lowercase();
    allowed.iter().any(|a| *a == ext).then_some(ext)
}

pub fn mime_for_ext(ext: &str) -> &'static str {
    match ext {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "webp" => "image/webp",
        "avif" => "image/avif",
        _ => "application/octet-stream",
    }
}

pub fn object_key(user_id: Uuid, warranty_id: Uuid, kind: AttachmentKind, ext: &str) -> String {
    format!(
        "warranties/{}/{}/{}-{}.{}",
        user_id,
        warranty_id,
        kind.as_str(),
        Uuid::new_v4(),
        ext
    )
}

/// Stores `upload` and points the record at it, dropping the object it replaces.
pub async fn attach(
    st: &AppState,
    user_id: Uuid,
    warranty_id: Uuid,
    kind: AttachmentKind,
    upload: UploadItem,
) -> Result<Warranty, ApiError> {
    let ext = allowed_extension(&upload.file_name, &st.config.upload.allowed_extensions)
        .ok_or_else(|| {
            ApiError::validation(format!(
                "file type not allowed; expected one of: {}",
                st.config.upload.allowed_extensions.join(", ")
            ))
        })?;
    if upload.body.is_empty() {
        return Err(ApiError::validation("file is empty"));
    }

    let existing = repo::find(&st.db, user_id, warranty_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Warranty not found"))?;
    let previous = kind.key_of(&existing).map(str::to_owned);

    let key = object_key(user_id, warranty_id, kind, &ext);
    let updated = store_then_link(st.storage.as_ref(), &key, upload.body, &ext, || {
        repo::set_file_key(&st.db, user_id, warranty_id, kind.column(), &key)
    })
    .await?;

    if let Some(old) = previous {
        release(st.storage.as_ref(), &old).await;
    }
    info!(%user_id, %warranty_id, kind = kind.as_str(), %key, "attachment stored");
    Ok(updated)
}

/// Uploads `body` under `key`, then runs `link` to point the record at it.
/// The new object is removed again if the link fails or the record is gone.
async fn store_then_link<F, Fut>(
    storage: &dyn StorageClient,
    key: &str,
    body: Bytes,
    ext: &str,
    link: F,
) -> Result<Warranty, ApiError>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = anyhow::Result<Option<Warranty>>>,
{
    storage
        .put_object(key, body, mime_for_ext(ext))
        .await
        .with_context(|| format!("put_object {key}"))?;

    match link().await {
        Ok(Some(w)) => Ok(w),
        Ok(None) => {
            release(storage, key).await;
            Err(ApiError::not_found("Warranty not found"))
        }
        Err(e) => {
            release(storage, key).await;
            Err(e.into())
        }
    }
}

pub async fn presign(st: &AppState, warranty: &Warranty, kind: AttachmentKind) -> Result<String, ApiError> {
    let key = kind
        .key_of(warranty)
        .ok_or_else(|| ApiError::not_found(format!("No {} attached", kind.as_str())))?;
    let url = st
        .storage
        .presign_get(key, PRESIGN_TTL)
        .await
        .with_context(|| format!("presign {key}"))?;
    Ok(url)
}

/// Deletes every file the record references. Failures are logged, not raised:
/// the record itself is already gone.
pub async fn release_all(storage: &dyn StorageClient, warranty: &Warranty) -> usize {
    let mut released = 0;
    for kind in [AttachmentKind::Receipt, AttachmentKind::Image] {
        if let Some(key) = kind.key_of(warranty) {
            if release(storage, key).await {
                released += 1;
            }
        }
    }
    released
}

async fn release(storage: &dyn StorageClient, key: &str) -> bool {
    match storage.delete_object(key).await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, %key, "failed to delete stored file");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UploadConfig;
    use crate::state::testing::MemoryStorage;
    use crate::warranties::model::fixtures::warranty;

    fn allowed() -> Vec<String> {
        UploadConfig::default().allowed_extensions
    }

    #[test]
    fn extension_check_is_case_insensitive() {
        assert_eq!(allowed_extension("receipt.PDF", &allowed()), Some("pdf".into()));
        assert_eq!(allowed_extension("photo.final.JpEg", &allowed()), Some("jpeg".into()));
        assert_eq!(allowed_extension("script.exe", &allowed()), None);
        assert_eq!(allowed_extension("no_extension", &allowed()), None);
        assert_eq!(allowed_extension(".pdf", &allowed()), None);
    }

    #[test]
    fn mime_types_follow_extension() {
        assert_eq!(mime_for_ext("pdf"), "application/pdf");
        assert_eq!(mime_for_ext("jpg"), "image/jpeg");
        assert_eq!(mime_for_ext("avif"), "image/avif");
        assert_eq!(mime_for_ext("bin"), "application/octet-stream");
    }

    #[test]
    fn object_keys_are_scoped_to_owner_and_record() {
        let user = Uuid::new_v4();
        let record = Uuid::new_v4();
        let key = object_key(user, record, AttachmentKind::Receipt, "pdf");
        assert!(key.starts_with(&format!("warranties/{user}/{record}/receipt-")));
        assert!(key.ends_with(".pdf"));
        assert_ne!(key, object_key(user, record, AttachmentKind::Receipt, "pdf"));
    }

    #[tokio::test]
    async fn release_all_deletes_both_files() {
        let storage = MemoryStorage::default();
        let mut w = warranty(1.0, 1, None);
        w.receipt_key = Some("a/receipt.pdf".into());
        w.image_key = Some("a/image.png".into());

        assert_eq!(release_all(&storage, &w).await, 2);
        let deletes = storage.deletes.lock().unwrap().clone();
        assert_eq!(deletes, vec!["a/receipt.pdf".to_string(), "a/image.png".to_string()]);
    }

    #[tokio::test]
    async fn release_all_skips_missing_and_tolerates_failures() {
        let storage = MemoryStorage::default();
        let w = warranty(1.0, 1, None);
        assert_eq!(release_all(&storage, &w).await, 0);

        let failing = MemoryStorage {
            fail_deletes: true,
            ..Default::default()
        };
        let mut w = warranty(1.0, 1, None);
        w.image_key = Some("a/image.png".into());
        assert_eq!(release_all(&failing, &w).await, 0);
    }

    #[tokio::test]
    async fn presign_requires_an_attachment() {
        let state = AppState::fake();
        let mut w = warranty(1.0, 1, None);
        let err = presign(&state, &w, AttachmentKind::Image).await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        w.image_key = Some("k/image.png".into());
        let url = presign(&state, &w, AttachmentKind::Image).await.unwrap();
        assert!(url.contains("k/image.png"));
        assert!(url.contains("ttl=600"));
    }

    #[tokio::test]
    async fn stored_upload_uses_scoped_key_and_mime() {
        let storage = MemoryStorage::default();
        let key = object_key(Uuid::new_v4(), Uuid::new_v4(), AttachmentKind::Image, "png");
        let mut linked = warranty(1.0, 1, None);
        linked.image_key = Some(key.clone());

        let w = store_then_link(&storage, &key, Bytes::from_static(b"png"), "png", || async move {
            Ok(Some(linked))
        })
        .await
        .unwrap();

        assert_eq!(w.image_key.as_deref(), Some(key.as_str()));
        let puts = storage.puts.lock().unwrap().clone();
        assert_eq!(puts, vec![(key, "image/png".to_string())]);
        assert!(storage.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_link_removes_the_new_object() {
        let storage = MemoryStorage::default();
        let pdf = Bytes::from_static(b"%PDF");
        let err = store_then_link(&storage, "k/receipt-1.pdf", pdf.clone(), "pdf", || async {
            Err(anyhow::anyhow!("connection reset"))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Internal(_)));

        let err = store_then_link(&storage, "k/receipt-2.pdf", pdf, "pdf", || async { Ok(None) })
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));

        let deletes = storage.deletes.lock().unwrap().clone();
        assert_eq!(deletes, vec!["k/receipt-1.pdf".to_string(), "k/receipt-2.pdf".to_string()]);
        assert_eq!(storage.puts.lock().unwrap().len(), 2);
    }
}
