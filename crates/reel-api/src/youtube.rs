use url::Url;

use crate::error::ApiError;

const MAX_ID_LEN: usize = 64;

const YOUTUBE_HOSTS: &[&str] = &["youtube.com", "www.youtube.com", "m.youtube.com", "music.youtube.com"];

pub fn is_valid_video_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Pull the video id out of the usual YouTube URL shapes:
/// `watch?v=`, `youtu.be/<id>`, `/embed/<id>`, `/v/<id>` and `/shorts/<id>`.
pub fn extract_video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let candidate = if host == "youtu.be" {
        segments.next().map(str::to_string)
    } else if YOUTUBE_HOSTS.contains(&host) {
        match segments.next()? {
            "watch" => url
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            "embed" | "v" | "shorts" => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    candidate.filter(|id| is_valid_video_id(id))
}

/// Check a download request before anything is written.
///
/// The URL must be an absolute http(s) URL and the id well-formed. When the URL is a
/// recognisable YouTube link, its id must agree with the one supplied.
pub fn validate_download_target(youtube_url: &str, youtube_id: &str) -> Result<Url, ApiError> {
    let url = Url::parse(youtube_url.trim())
        .map_err(|e| ApiError::Validation(format!("youtubeUrl is not a valid URL: {}", e)))?;

    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(ApiError::Validation("youtubeUrl must be an http(s) URL".into()));
    }

    if !is_valid_video_id(youtube_id) {
        return Err(ApiError::Validation("youtubeId is malformed".into()));
    }

    if let Some(found) = extract_video_id(&url) {
        if found != youtube_id {
            return Err(ApiError::Validation(format!(
                "youtubeId '{}' does not match the URL ('{}')",
                youtube_id, found
            )));
        }
    }

    Ok(url)
}
