//! Where a manifest comes from

use std::fmt;
use std::path::PathBuf;

use tracing::info;
use url::Url;

use crate::app::client::HttpTransport;
use crate::app::manifest::parse::{parse_manifest, parse_manifest_file, ParsedManifest};
use crate::errors::{ManifestError, ManifestResult};

/// Local file or remote URL holding a manifest document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    File(PathBuf),
    Remote(Url),
}

impl ManifestSource {
    /// Interpret a CLI argument; `http://` and `https://` are remote
    pub fn parse(raw: &str) -> ManifestResult<Self> {
        if raw.starts_with("http://") || raw.starts_with("https://") {
            let url = Url::parse(raw).map_err(|e| ManifestError::InvalidUrl {
                url: raw.to_string(),
                error: e.to_string(),
            })?;
            Ok(ManifestSource::Remote(url))
        } else {
            Ok(ManifestSource::File(PathBuf::from(raw)))
        }
    }

    /// Read and parse the manifest
    pub async fn load(&self, transport: &HttpTransport) -> ManifestResult<ParsedManifest> {
        match self {
            ManifestSource::File(path) => parse_manifest_file(path).await,
            ManifestSource::Remote(url) => {
                info!("Fetching manifest from {}", url);
                let json = transport
                    .get_text(url)
                    .await
                    .map_err(|e| ManifestError::Fetch {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })?;
                parse_manifest(&json)
            }
        }
    }
}

impl fmt::Display for ManifestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ManifestSource::File(path) => write!(f, "{}", path.display()),
            ManifestSource::Remote(url) => write!(f, "{}", url),
        }
    }
}
