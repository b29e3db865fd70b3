//! Resolution of descriptor and asset references
//!
//! References in `description.yaml` may be absolute local paths, absolute
//! URLs, or paths relative to `<repository>/<extension>/`. Files are made
//! available locally (downloaded into a scoped scratch directory when
//! remote); directories are only located, never downloaded, because the
//! tools consuming them fetch remote overlays themselves.

use camino::Utf8Path;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use url::Url;

use crate::error::{ExtensionError, Result};
use crate::http::HttpClient;

const RAW_CONTENT_HOST: &str = "raw.githubusercontent.com";
const SOURCE_HOST: &str = "github.com";

/// File name used when a download URL has no final path segment
const FALLBACK_FILE_NAME: &str = "download";

/// Root that extension directories live under
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Repository {
    Local(PathBuf),
    Remote(Url),
}

impl Repository {
    /// Local roots are made absolute against the current directory; assets
    /// resolved under them stay valid from any working directory
    pub fn parse(location: &str) -> Result<Self> {
        match parse_absolute_url(location)? {
            Some(url) if url.scheme() == "file" => url
                .to_file_path()
                .map(Repository::Local)
                .map_err(|_| ExtensionError::fetch(location, "not a local file URL")),
            Some(url) => Ok(Repository::Remote(url)),
            None => std::path::absolute(location)
                .map(Repository::Local)
                .map_err(|e| ExtensionError::io(format!("can't resolve repository {}", location), e)),
        }
    }
}

impl std::fmt::Display for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Repository::Local(path) => write!(f, "{}", path.display()),
            Repository::Remote(url) => write!(f, "{}", url),
        }
    }
}

/// `Some` for absolute URLs with a host, `None` for anything path-like
fn parse_absolute_url(reference: &str) -> Result<Option<Url>> {
    match Url::parse(reference) {
        Ok(url) if url.has_host() || url.scheme() == "file" => Ok(Some(url)),
        Ok(_) | Err(url::ParseError::RelativeUrlWithoutBase) => Ok(None),
        Err(source) => Err(ExtensionError::InvalidUrl {
            url: reference.to_string(),
            source,
        }),
    }
}

/// `base/<extension>/<reference>` for a remote repository
fn extension_url(base: &Url, extension: &str, reference: &str) -> Result<Url> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join(&format!("{}/", extension))
        .and_then(|dir| dir.join(reference))
        .map_err(|source| ExtensionError::InvalidUrl {
            url: format!("{}{}/{}", base, extension, reference),
            source,
        })
}

/// Create a scoped scratch directory, removed when dropped
pub fn scratch_dir(prefix: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .map_err(|e| ExtensionError::io("can't create scratch directory", e))
}

/// Rewrite `https://raw.githubusercontent.com/U/R/B/P` into the overlay form
/// `https://github.com/U/R/P?ref=B`; any other location is returned as is
pub fn rewrite_raw_content_url(location: &str) -> String {
    let Ok(mut url) = Url::parse(location) else {
        return location.to_string();
    };
    if url.host_str() != Some(RAW_CONTENT_HOST) {
        return location.to_string();
    }

    let segments: Vec<String> = url
        .path_segments()
        .map(|parts| parts.map(str::to_string).collect())
        .unwrap_or_default();
    // user, repo, branch, then at least one path segment
    if segments.len() < 4 {
        return location.to_string();
    }

    let branch = segments[2].clone();
    let path = segments[..2]
        .iter()
        .chain(&segments[3..])
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join("/");

    if url.set_host(Some(SOURCE_HOST)).is_err() {
        return location.to_string();
    }
    url.set_path(&path);
    url.set_query(Some(&format!("ref={}", branch)));
    url.to_string()
}

/// Resolves references declared by one extension
#[derive(Debug, Clone)]
pub struct AssetResolver {
    repository: Repository,
    extension: String,
    http: HttpClient,
}

impl AssetResolver {
    pub(crate) fn new(repository: Repository, extension: impl Into<String>, http: HttpClient) -> Self {
        Self {
            repository,
            extension: extension.into(),
            http,
        }
    }

    pub fn repository(&self) -> &Repository {
        &self.repository
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Make a file reference available locally
    ///
    /// Absolute local paths and paths relative to a local repository are
    /// used in place; URLs (absolute, or relative to a remote repository)
    /// are downloaded into `scratch`.
    pub async fn fetch_file(&self, reference: &str, scratch: &Path) -> Result<PathBuf> {
        if Path::new(reference).is_absolute() {
            return existing(PathBuf::from(reference));
        }
        if let Some(url) = parse_absolute_url(reference)? {
            if url.scheme() == "file" {
                let path = url
                    .to_file_path()
                    .map_err(|_| ExtensionError::fetch(reference, "not a local file URL"))?;
                return existing(path);
            }
            return self.download(&url, scratch).await;
        }

        match &self.repository {
            Repository::Remote(base) => {
                let url = extension_url(base, &self.extension, reference)?;
                self.download(&url, scratch).await
            }
            Repository::Local(base) => existing(base.join(&self.extension).join(reference)),
        }
    }

    /// Locate a directory reference without downloading it
    ///
    /// Local directories must exist; remote ones are left to the tool.
    pub fn directory_location(&self, reference: &str) -> Result<String> {
        if Path::new(reference).is_absolute() {
            return existing_dir(PathBuf::from(reference));
        }
        match parse_absolute_url(reference)? {
            Some(url) if url.scheme() == "file" => {
                let path = url
                    .to_file_path()
                    .map_err(|_| ExtensionError::fetch(reference, "not a local file URL"))?;
                return existing_dir(path);
            }
            Some(_) => return Ok(reference.to_string()),
            None => {}
        }

        match &self.repository {
            Repository::Remote(base) => {
                let mut url = base.clone();
                let joined = Utf8Path::new(url.path())
                    .join(&self.extension)
                    .join(reference);
                url.set_path(joined.as_str());
                Ok(url.to_string())
            }
            Repository::Local(base) => existing_dir(base.join(&self.extension).join(reference)),
        }
    }

    /// Directory location in a form the overlay tool can consume
    pub fn kustomize_location(&self, reference: &str) -> Result<String> {
        Ok(rewrite_raw_content_url(&self.directory_location(reference)?))
    }

    async fn download(&self, url: &Url, scratch: &Path) -> Result<PathBuf> {
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|segment| !segment.is_empty())
            .unwrap_or(FALLBACK_FILE_NAME)
            .to_string();
        let target = scratch.join(&name);
        debug!("Downloading {} to {}", url, target.display());

        let response = self
            .http
            .send("download", |client| client.get(url.clone()))
            .await
            .map_err(|e| ExtensionError::fetch(url.as_str(), e))?;
        if !response.status().is_success() {
            return Err(ExtensionError::fetch(
                url.as_str(),
                format!("server returned {}", response.status()),
            ));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ExtensionError::fetch(url.as_str(), e))?;

        tokio::fs::write(&target, &bytes)
            .await
            .map_err(|e| ExtensionError::io(format!("can't write {}", target.display()), e))?;
        Ok(target)
    }
}

fn existing(path: PathBuf) -> Result<PathBuf> {
    if path.exists() {
        Ok(path)
    } else {
        Err(ExtensionError::fetch(
            path.display().to_string(),
            "no such file or directory",
        ))
    }
}

fn existing_dir(path: PathBuf) -> Result<String> {
    if path.is_dir() {
        Ok(path.display().to_string())
    } else {
        Err(ExtensionError::fetch(
            path.display().to_string(),
            "no such directory",
        ))
    }
}
