use spin_sdk::http::{Request, Response};
use spin_sdk::key_value::Store;
use uuid::Uuid;

use crate::auth::validate_token;
use crate::config::*;
use crate::core::errors::ApiError;
use crate::core::helpers::store;

const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

pub fn is_allowed_image_type(mime: &str) -> bool {
    ALLOWED_IMAGE_TYPES.contains(&mime)
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "image/jpeg" => "jpg",
        "image/png" => "png",
        _ => "gif",
    }
}

pub struct StoredUpload {
    pub url: String,
    pub filename: String,
    pub filetype: String,
}

/// Validate and persist a raw upload body. Returns the blob's public URL and
/// storage key. The store doubles as the object storage: bytes in, URL out.
pub fn store_upload(store: &Store, req: &Request) -> Result<StoredUpload, ApiError> {
    let mime = req
        .header("Content-Type")
        .and_then(|h| h.as_str())
        .unwrap_or_default()
        .to_string();

    if !is_allowed_image_type(&mime) {
        return Err(ApiError::BadRequest(
            "image must be 'image/jpeg', 'image/png' or 'image/gif'".to_string(),
        ));
    }

    let bytes = req.body();
    if bytes.is_empty() {
        return Err(ApiError::BadRequest("Empty upload".to_string()));
    }
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(ApiError::BadRequest("Upload too large".to_string()));
    }

    let filename = format!("{}.{}", Uuid::new_v4(), extension_for(&mime));
    store
        .set(&media_key(&filename), bytes)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    let mut media: Vec<String> = store
        .get_json(MEDIA_LIST_KEY)
        .map_err(|e| ApiError::InternalError(e.to_string()))?
        .unwrap_or_default();
    media.push(filename.clone());
    store
        .set_json(MEDIA_LIST_KEY, &media)
        .map_err(|e| ApiError::InternalError(e.to_string()))?;

    tracing::info!(filename = %filename, size = bytes.len(), "stored media blob");

    Ok(StoredUpload {
        url: media_url(&filename),
        filename,
        filetype: mime,
    })
}

pub fn delete_blob(store: &Store, filename: &str) -> anyhow::Result<()> {
    store.delete(&media_key(filename))?;
    let mut media: Vec<String> = store.get_json(MEDIA_LIST_KEY)?.unwrap_or_default();
    media.retain(|f| f != filename);
    store.set_json(MEDIA_LIST_KEY, &media)?;
    Ok(())
}

/// Drop a blob given its public URL. External URLs (the gravatar default
/// avatar) are left alone.
pub fn delete_blob_by_url(store: &Store, url: &str) -> anyhow::Result<()> {
    if let Some(filename) = url.strip_prefix("/media/") {
        delete_blob(store, filename)?;
    }
    Ok(())
}

pub fn blob_exists(store: &Store, filename: &str) -> anyhow::Result<bool> {
    Ok(store.get(&media_key(filename))?.is_some())
}

// === HTTP Handlers ===

/// POST /media — raw image body; responds with the URL to reference from a
/// later post creation.
pub fn upload_media(req: Request) -> anyhow::Result<Response> {
    if validate_token(&req).is_none() {
        return Ok(ApiError::Unauthorized.into());
    }

    let store = store();
    let stored = match store_upload(&store, &req) {
        Ok(s) => s,
        Err(e) => return Ok(e.into()),
    };

    let resp = serde_json::json!({
        "url": stored.url,
        "filename": stored.filename,
        "filetype": stored.filetype,
    });
    Ok(Response::builder()
        .status(201)
        .header("Content-Type", "application/json")
        .body(serde_json::to_vec(&resp)?)
        .build())
}

/// GET /media/{filename}
pub fn serve_media(req: Request) -> anyhow::Result<Response> {
    let path = req.path();
    let filename = path.trim_start_matches("/media/");

    if filename.is_empty() || filename.contains('/') {
        return Ok(ApiError::BadRequest("Invalid media path".to_string()).into());
    }

    let store = store();
    match store.get(&media_key(filename))? {
        Some(bytes) => {
            let mime = mime_guess::from_path(filename).first_or_octet_stream();
            Ok(Response::builder()
                .status(200)
                .header("Content-Type", mime.as_ref())
                .body(bytes)
                .build())
        }
        None => Ok(ApiError::NotFound("File not found".to_string()).into()),
    }
}
