//! Direct-link fetcher: one HTTP GET per job via libcurl.
//!
//! Handles `ContentKind::Media` references only. The body is streamed to a
//! `.part` file in the job directory and renamed once the media kind is known
//! from `Content-Type` (or, failing that, the URL extension).

use async_trait::async_trait;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str;
use std::time::Duration;

use super::{ContentFetcher, FetchError, FetchedContent, MediaItem, MediaKind};
use crate::config::HttpConfig;
use crate::url_model::{self, ContentKind, ContentRef};

/// Fetches direct media links with curl.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    config: HttpConfig,
}

impl HttpFetcher {
    pub fn new(config: HttpConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ContentFetcher for HttpFetcher {
    async fn fetch(
        &self,
        reference: &ContentRef,
        work_dir: &Path,
    ) -> Result<FetchedContent, FetchError> {
        if reference.kind() != ContentKind::Media {
            return Err(FetchError::Unsupported(format!(
                "{} links need a platform fetcher",
                reference.kind().as_str()
            )));
        }

        let source = reference.source().to_string();
        let reference = reference.clone();
        let work_dir = work_dir.to_path_buf();
        let config = self.config.clone();
        let item = tokio::task::spawn_blocking(move || get_to_file(&reference, &work_dir, &config))
            .await
            .map_err(|e| FetchError::Transient(format!("fetch task join: {}", e)))??;

        Ok(FetchedContent {
            items: vec![item],
            owner: None,
            source,
        })
    }
}

/// Map a final HTTP status to a fetch error (None for 2xx).
pub(crate) fn classify_status(url: &str, code: u32) -> Option<FetchError> {
    match code {
        200..=299 => None,
        404 | 410 => Some(FetchError::NotFound(format!("{} returned HTTP {}", url, code))),
        401 | 403 | 451 => Some(FetchError::PrivateOrRestricted(format!(
            "{} returned HTTP {}",
            url, code
        ))),
        _ => Some(FetchError::Transient(format!("{} returned HTTP {}", url, code))),
    }
}

/// Runs the GET on the current thread; call from `spawn_blocking`.
fn get_to_file(
    reference: &ContentRef,
    work_dir: &Path,
    config: &HttpConfig,
) -> Result<MediaItem, FetchError> {
    let url = reference.as_str();
    let part_path = work_dir.join("01_download.part");
    let mut file = File::create(&part_path)
        .map_err(|e| FetchError::Transient(format!("create {}: {}", part_path.display(), e)))?;

    let mut content_type: Option<String> = None;
    let mut write_error: Option<std::io::Error> = None;
    let curl_err = |e: curl::Error| FetchError::Transient(e.to_string());

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(curl_err)?;
    easy.follow_location(true).map_err(curl_err)?;
    easy.max_redirections(10).map_err(curl_err)?;
    easy.connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .map_err(curl_err)?;
    easy.timeout(Duration::from_secs(config.timeout_secs))
        .map_err(curl_err)?;
    easy.low_speed_limit(1024).map_err(curl_err)?;
    easy.low_speed_time(Duration::from_secs(60)).map_err(curl_err)?;
    if let Some(agent) = &config.user_agent {
        easy.useragent(agent).map_err(curl_err)?;
    }

    let performed = {
        let mut transfer = easy.transfer();
        transfer
            .header_function(|data| {
                if let Ok(line) = str::from_utf8(data) {
                    if let Some((name, value)) = line.split_once(':') {
                        if name.trim().eq_ignore_ascii_case("content-type") {
                            // Redirect hops each send their own headers; the last one wins.
                            content_type = Some(value.trim().to_string());
                        }
                    }
                }
                true
            })
            .map_err(curl_err)?;
        transfer
            .write_function(|data| match file.write_all(data) {
                Ok(()) => Ok(data.len()),
                Err(e) => {
                    write_error = Some(e);
                    Ok(0) // abort transfer
                }
            })
            .map_err(curl_err)?;
        transfer.perform()
    };
    if let Some(e) = write_error {
        return Err(FetchError::Transient(format!(
            "write {}: {}",
            part_path.display(),
            e
        )));
    }
    performed.map_err(curl_err)?;

    let code = easy.response_code().map_err(curl_err)?;
    if let Some(err) = classify_status(url, code) {
        return Err(err);
    }
    file.flush()
        .map_err(|e| FetchError::Transient(format!("flush {}: {}", part_path.display(), e)))?;
    drop(file);

    let kind = content_type
        .as_deref()
        .and_then(MediaKind::from_content_type)
        .or_else(|| kind_from_url_path(reference))
        .ok_or_else(|| {
            FetchError::Unsupported(format!(
                "{} is not an image or video (content-type: {})",
                url,
                content_type.as_deref().unwrap_or("none")
            ))
        })?;

    let final_path: PathBuf = work_dir.join(local_file_name(reference, kind));
    std::fs::rename(&part_path, &final_path)
        .map_err(|e| FetchError::Transient(format!("rename {}: {}", final_path.display(), e)))?;
    tracing::debug!(path = %final_path.display(), kind = kind.as_str(), "fetched media");

    Ok(MediaItem {
        path: final_path,
        kind,
    })
}

fn kind_from_url_path(reference: &ContentRef) -> Option<MediaKind> {
    let last = reference.url().path_segments()?.rfind(|s| !s.is_empty())?;
    let (_, ext) = last.rsplit_once('.')?;
    MediaKind::from_extension(ext)
}

/// The URL's extension is kept only when it agrees with the detected kind.
fn local_file_name(reference: &ContentRef, kind: MediaKind) -> String {
    let name = url_model::media_filename(reference.url(), 0, kind.default_extension());
    if kind_from_url_path(reference) == Some(kind) {
        return name;
    }
    let stem = name.rsplit_once('.').map_or(name.as_str(), |(stem, _)| stem);
    format!("{}.{}", stem, kind.default_extension())
}
