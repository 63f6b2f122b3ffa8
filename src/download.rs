//! Remote video acquisition through yt-dlp.

use std::fs;
use std::path::Path;
use std::process::Command as ProcCommand;
use std::time::Instant;

use anyhow::{anyhow, Result};

use crate::error::UrlError;
use crate::transcoder::{ensure_tool, run_tool};

pub const YT_DLP: &str = "yt-dlp";

/// Extract the video id from a watch-page URL (`youtube.com/watch?v=<id>`)
/// or a short link (`youtu.be/<id>`). Scheme and `www.`/`m.` prefixes are
/// optional.
pub fn parse_video_url(url: &str) -> Result<String, UrlError> {
    let trimmed = url.trim();
    let rest = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let rest = rest
        .strip_prefix("www.")
        .or_else(|| rest.strip_prefix("m."))
        .unwrap_or(rest)
        .trim_end_matches('/');

    let (host, path) = rest.split_once('/').unwrap_or((rest, ""));
    let id = match host {
        "youtube.com" => {
            let (route, query) = path.split_once('?').unwrap_or((path, ""));
            let query = query.split('#').next().unwrap_or("");
            if route.trim_end_matches('/') != "watch" {
                return Err(UrlError::Unsupported(url.to_string()));
            }
            query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == "v")
                .map(|(_, value)| value)
                .unwrap_or("")
        }
        "youtu.be" => path
            .split(['?', '#'])
            .next()
            .unwrap_or("")
            .trim_end_matches('/'),
        _ => return Err(UrlError::Unsupported(url.to_string())),
    };

    let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(UrlError::MissingId(url.to_string()));
    }
    Ok(id.to_string())
}

/// Download the video behind `url` to `dest` as MP4.
pub fn download(url: &str, dest: &Path) -> Result<()> {
    let id = parse_video_url(url)?;
    ensure_tool(YT_DLP, "--version")?;

    if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    // A stale file would make yt-dlp skip the download
    if let Err(e) = fs::remove_file(dest) {
        if e.kind() != std::io::ErrorKind::NotFound {
            log::warn!("could not remove old download {}: {}", dest.display(), e);
        }
    }

    log::info!("Downloading video {}...", id);
    let start = Instant::now();
    run_tool(
        YT_DLP,
        "download",
        ProcCommand::new(YT_DLP)
            .args(["-f", "mp4", "-o"])
            .arg(dest)
            .arg("--")
            .arg(&id),
    )?;

    if !dest.is_file() {
        return Err(anyhow!("yt-dlp finished but {} was not written", dest.display()));
    }
    log::info!("Video downloaded in {:.2?}", start.elapsed());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_urls() {
        for url in [
            "https://www.youtube.com/watch?v=FtutLA63Cp8",
            "http://youtube.com/watch?v=FtutLA63Cp8",
            "youtube.com/watch?v=FtutLA63Cp8/",
            "https://m.youtube.com/watch?feature=share&v=FtutLA63Cp8&t=42",
            "https://www.youtube.com/watch?v=FtutLA63Cp8#t=10",
            "https://youtube.com/watch?v=FtutLA63Cp8&list=x#comments",
        ] {
            assert_eq!(parse_video_url(url).unwrap(), "FtutLA63Cp8", "{}", url);
        }
    }

    #[test]
    fn test_short_links() {
        assert_eq!(parse_video_url("https://youtu.be/FtutLA63Cp8").unwrap(), "FtutLA63Cp8");
        assert_eq!(parse_video_url("youtu.be/FtutLA63Cp8/").unwrap(), "FtutLA63Cp8");
        assert_eq!(parse_video_url("https://youtu.be/a-b_c?si=xyz").unwrap(), "a-b_c");
    }

    #[test]
    fn test_unsupported_urls() {
        for url in ["https://vimeo.com/12345", "", "https://youtube.com/playlist?list=abc", "not a url"] {
            assert!(
                matches!(parse_video_url(url), Err(UrlError::Unsupported(_))),
                "{:?}",
                url
            );
        }
    }

    #[test]
    fn test_missing_id() {
        for url in ["https://youtube.com/watch?list=abc", "https://youtu.be/", "youtube.com/watch?v="] {
            assert!(matches!(parse_video_url(url), Err(UrlError::MissingId(_))), "{:?}", url);
        }
    }
}
