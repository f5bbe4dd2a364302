// Shared image utilities for all platform adapters
// Materializes notification images as local files: remote URLs are downloaded
// to temp files, file:// URLs are checked in place

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tempfile::NamedTempFile;
use tokio::sync::OnceCell;
use url::Url;

use crate::components::{PushError, PushResult};

/// Cached image entry with TTL tracking
#[derive(Debug, Clone)]
struct CachedImage {
    path: PathBuf,
    cached_at: Instant,
}

/// Cache TTL: 1 hour
const CACHE_TTL_SECS: u64 = 3600;

/// Maximum cache entries before forced eviction
const MAX_CACHE_ENTRIES: usize = 100;

/// Largest image accepted, notification surfaces downscale anyway
const MAX_IMAGE_SIZE: u64 = 10 * 1024 * 1024;

/// Global HTTP client for image downloads (shared across all adapters)
static HTTP_CLIENT: OnceCell<reqwest::Client> = OnceCell::const_new();

/// Key: URL string, Value: CachedImage with timestamp
static IMAGE_CACHE: OnceCell<Arc<DashMap<String, CachedImage>>> = OnceCell::const_new();

async fn get_http_client() -> PushResult<&'static reqwest::Client> {
    HTTP_CLIENT
        .get_or_try_init(|| async {
            reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .connect_timeout(Duration::from_secs(10))
                .user_agent(concat!("native-push/", env!("CARGO_PKG_VERSION")))
                .build()
                .map_err(|e| PushError::ImageFetchFailed {
                    url: String::new(),
                    message: format!("Failed to create HTTP client: {}", e),
                })
        })
        .await
}

async fn get_image_cache() -> Arc<DashMap<String, CachedImage>> {
    IMAGE_CACHE
        .get_or_init(|| async { Arc::new(DashMap::new()) })
        .await
        .clone()
}

/// Evict stale entries from cache (TTL expired or over size limit)
fn evict_stale_entries(cache: &DashMap<String, CachedImage>) {
    let now = Instant::now();
    let ttl = Duration::from_secs(CACHE_TTL_SECS);

    cache.retain(|_, entry| {
        let is_valid = now.duration_since(entry.cached_at) < ttl;
        if !is_valid {
            let _ = std::fs::remove_file(&entry.path);
        }
        is_valid
    });

    while cache.len() > MAX_CACHE_ENTRIES {
        let oldest = cache
            .iter()
            .min_by_key(|entry| entry.cached_at)
            .map(|entry| entry.key().clone());

        if let Some(key) = oldest {
            if let Some((_, entry)) = cache.remove(&key) {
                let _ = std::fs::remove_file(&entry.path);
            }
        } else {
            break;
        }
    }
}

/// Result of resolving an image reference to a local file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub path: PathBuf,
    /// Downloaded into a temp file owned by the cache
    pub is_temp: bool,
    pub original_url: String,
}

fn fetch_failed(url: &str, message: impl Into<String>) -> PushError {
    PushError::ImageFetchFailed {
        url: url.to_string(),
        message: message.into(),
    }
}

/// Resolve an `image`/`imageUrl` payload value to a local file.
///
/// Supports http(s) and file URLs. Callers bound the wait with their own
/// timeout; this function only enforces the client's connect/read limits.
pub async fn resolve_image(reference: &str) -> PushResult<ResolvedImage> {
    let url = Url::parse(reference).map_err(|e| fetch_failed(reference, e.to_string()))?;

    match url.scheme() {
        "file" => {
            let path = url
                .to_file_path()
                .map_err(|_| fetch_failed(reference, "Not a local file path"))?;
            if !path.exists() {
                return Err(fetch_failed(reference, "Image file does not exist"));
            }
            Ok(ResolvedImage {
                path,
                is_temp: false,
                original_url: url.to_string(),
            })
        },
        "http" | "https" => download_image(&url).await,
        scheme => Err(fetch_failed(
            reference,
            format!("Unsupported URL scheme for image: {}", scheme),
        )),
    }
}

/// Download a remote image to a temporary file, reusing cached downloads
pub async fn download_image(url: &Url) -> PushResult<ResolvedImage> {
    let url_string = url.to_string();

    let cache = get_image_cache().await;
    evict_stale_entries(&cache);

    if let Some(cached) = cache.get(&url_string) {
        if cached.path.exists() {
            return Ok(ResolvedImage {
                path: cached.path.clone(),
                is_temp: true,
                original_url: url_string,
            });
        }
        // Cached file was deleted, remove from cache
        drop(cached);
        cache.remove(&url_string);
    }

    let client = get_http_client().await?;

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| fetch_failed(&url_string, format!("Failed to download image: {}", e)))?;

    if !response.status().is_success() {
        return Err(fetch_failed(
            &url_string,
            format!("HTTP {} downloading image", response.status()),
        ));
    }

    if let Some(content_length) = response.headers().get(reqwest::header::CONTENT_LENGTH)
        && let Ok(length_str) = content_length.to_str()
        && let Ok(size) = length_str.parse::<u64>()
        && size > MAX_IMAGE_SIZE
    {
        return Err(fetch_failed(
            &url_string,
            format!(
                "Image too large: {} bytes exceeds {} byte limit",
                size, MAX_IMAGE_SIZE
            ),
        ));
    }

    let header_extension = extension_from_headers(response.headers());

    let bytes = read_capped(response, MAX_IMAGE_SIZE)
        .await
        .map_err(|message| fetch_failed(&url_string, message))?;

    let extension = sniff_extension(&bytes)
        .map(str::to_string)
        .or(header_extension)
        .ok_or_else(|| fetch_failed(&url_string, "Downloaded data is not a known image format"))?;

    let temp_file = NamedTempFile::with_suffix(format!(".{}", extension))
        .map_err(|e| fetch_failed(&url_string, format!("Failed to create temp file: {}", e)))?;

    let temp_path = temp_file.path().to_path_buf();
    tokio::fs::write(&temp_path, &bytes)
        .await
        .map_err(|e| fetch_failed(&url_string, format!("Failed to write temp file: {}", e)))?;

    // Keep the temp file alive, the cache owns its cleanup
    let persisted_path = temp_file
        .into_temp_path()
        .keep()
        .map_err(|e| fetch_failed(&url_string, format!("Failed to persist temp file: {}", e)))?;

    cache.insert(
        url_string.clone(),
        CachedImage {
            path: persisted_path.clone(),
            cached_at: Instant::now(),
        },
    );

    tracing::debug!("Downloaded image {} -> {:?}", url_string, persisted_path);

    Ok(ResolvedImage {
        path: persisted_path,
        is_temp: true,
        original_url: url_string,
    })
}

/// Read a response body, giving up as soon as it grows past `limit` bytes.
/// Chunked responses carry no Content-Length to check up front.
async fn read_capped(mut response: reqwest::Response, limit: u64) -> Result<Vec<u8>, String> {
    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| format!("Failed to read image bytes: {}", e))?
    {
        if (bytes.len() + chunk.len()) as u64 > limit {
            return Err(format!("Image too large: exceeds {} byte limit", limit));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(bytes)
}

/// Identify an image by its magic bytes
pub fn sniff_extension(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => Some("png"),
        [0xFF, 0xD8, 0xFF, ..] => Some("jpg"),
        [b'G', b'I', b'F', b'8', ..] => Some("gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("webp"),
        [b'B', b'M', ..] => Some("bmp"),
        [0x00, 0x00, 0x01, 0x00, ..] => Some("ico"),
        _ => None,
    }
}

/// Content-Type fallback for formats without a reliable signature (SVG)
fn extension_from_headers(headers: &reqwest::header::HeaderMap) -> Option<String> {
    let content_type = headers.get(reqwest::header::CONTENT_TYPE)?.to_str().ok()?;
    content_type
        .contains("image/svg")
        .then(|| "svg".to_string())
}

/// Clean up all cached temp images
pub fn cleanup_all_cached_images() {
    if let Some(cache) = IMAGE_CACHE.get() {
        for entry in cache.iter() {
            if let Err(e) = std::fs::remove_file(&entry.value().path) {
                tracing::debug!("Failed to cleanup cached image {:?}: {}", entry.value().path, e);
            }
        }
        cache.clear();
    }
}
