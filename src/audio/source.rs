use anyhow::Context;
use std::path::PathBuf;

use super::LoadError;

/// Where a clip's encoded bytes come from: a local file or an http(s) URL.
#[derive(Clone, Debug)]
pub enum SourceLocator {
    Path(PathBuf),
    Url(String),
}

impl SourceLocator {
    pub fn parse(raw: &str) -> Self {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            Self::Url(raw.to_string())
        } else {
            Self::Path(PathBuf::from(raw))
        }
    }

    /// File extension used as a container format hint for the decoder.
    pub fn extension_hint(&self) -> Option<String> {
        let name = match self {
            Self::Path(path) => return path
                .extension()
                .and_then(|e| e.to_str())
                .map(str::to_string),
            Self::Url(url) => url.rsplit('/').next()?,
        };
        let name = name.split(['?', '#']).next()?;
        let (_, ext) = name.rsplit_once('.')?;
        if ext.is_empty() {
            None
        } else {
            Some(ext.to_string())
        }
    }

}

impl std::fmt::Display for SourceLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => write!(f, "{url}"),
        }
    }
}

/// Resolve a locator to encoded audio bytes.
pub fn fetch_audio(locator: &SourceLocator) -> Result<Vec<u8>, LoadError> {
    let bytes = match locator {
        SourceLocator::Path(path) => std::fs::read(path)
            .with_context(|| format!("failed to read {}", path.display()))
            .map_err(LoadError::Fetch)?,
        SourceLocator::Url(url) => {
            log::info!("Fetching audio from {url}");
            let response = reqwest::blocking::get(url)
                .and_then(|r| r.error_for_status())
                .with_context(|| format!("request to {url} failed"))
                .map_err(LoadError::Fetch)?;
            response
                .bytes()
                .with_context(|| format!("failed to read response body from {url}"))
                .map_err(LoadError::Fetch)?
                .to_vec()
        }
    };

    log::info!("Fetched {} bytes from {}", bytes.len(), locator);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_urls_and_paths() {
        assert!(matches!(
            SourceLocator::parse("https://example.com/cry.ogg"),
            SourceLocator::Url(_)
        ));
        assert!(matches!(
            SourceLocator::parse("clips/cry.ogg"),
            SourceLocator::Path(_)
        ));
    }

    #[test]
    fn extension_hint_from_path_and_url() {
        let path = SourceLocator::parse("clips/cry.ogg");
        assert_eq!(path.extension_hint().as_deref(), Some("ogg"));

        let url = SourceLocator::parse("https://example.com/sounds/25.mp3?raw=1");
        assert_eq!(url.extension_hint().as_deref(), Some("mp3"));

        let bare = SourceLocator::parse("https://example.com/stream");
        assert_eq!(bare.extension_hint(), None);
    }

    #[test]
    fn missing_file_is_a_fetch_error() {
        let locator = SourceLocator::parse("/definitely/not/here.wav");
        assert!(matches!(fetch_audio(&locator), Err(LoadError::Fetch(_))));
    }
}
