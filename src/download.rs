//! Fetches remote listings and archives, extracts zip archives and wipes
//! scratch directories.

use std::{
    fmt,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use async_trait::async_trait;
use futures::StreamExt;
use log::{debug, info};
use zip::ZipArchive;

use crate::error::{DownloadError, FetchError};

/// Source of remote content. The pipeline only ever talks to the network
/// through this trait.
#[async_trait]
pub trait Fetch: Send + Sync {
    /// Fetches a page as text (directory listings).
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;

    /// Fetches `url` and saves the body to `dest`. `dest` must not be left
    /// behind when the fetch fails.
    async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError>;
}

/// [`Fetch`] over HTTP(S).
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> Self {
        HttpFetcher {
            client: reqwest::Client::new(),
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let response = self.client.get(url).send().await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url.to_string()));
        }
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        Ok(response)
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        Ok(self.get(url).await?.text().await?)
    }

    async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
        let response = self.get(url).await?;

        // Stream into a sibling file so an interrupted download never looks
        // like a finished one.
        let partial = partial_path(dest);
        let result = async {
            let mut file = File::create(&partial)?;
            let mut stream = response.bytes_stream();

            while let Some(chunk) = stream.next().await {
                file.write_all(&chunk?)?;
            }
            file.flush()?;

            Ok::<(), FetchError>(())
        }
        .await;

        match result {
            Ok(()) => {
                fs::rename(&partial, dest)?;
                Ok(())
            }
            Err(e) => {
                let _ = fs::remove_file(&partial);
                Err(e)
            }
        }
    }
}

/// `dest` with `.part` appended to the file name.
pub fn partial_path(dest: &Path) -> PathBuf {
    let mut name = dest.file_name().unwrap_or_default().to_os_string();
    name.push(".part");
    dest.with_file_name(name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of a single download attempt.
pub enum DownloadOutcome {
    /// The destination already existed; nothing was fetched.
    AlreadyPresent,
    Downloaded,
    /// The fetch failed. Processing may continue without this file.
    Failed { reason: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Running counts of download attempts.
pub struct DownloadTally {
    pub tried: usize,
    pub existed: usize,
    pub downloaded: usize,
    pub failed: usize,
}

impl DownloadTally {
    pub fn record(&mut self, outcome: &DownloadOutcome) {
        self.tried += 1;
        match outcome {
            DownloadOutcome::AlreadyPresent => self.existed += 1,
            DownloadOutcome::Downloaded => self.downloaded += 1,
            DownloadOutcome::Failed { .. } => self.failed += 1,
        }
    }
}

impl fmt::Display for DownloadTally {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} files are tried: {} exist, {} downloads, {} errors",
            self.tried, self.existed, self.downloaded, self.failed
        )
    }
}

/// Downloads `url` to `dest` unless `dest` already exists, creating parent
/// directories as needed.
///
/// Network failures are returned as [`DownloadOutcome::Failed`]; only local
/// filesystem problems are errors.
pub async fn download_if_missing<F: Fetch + ?Sized>(
    fetcher: &F,
    url: &str,
    dest: &Path,
) -> Result<DownloadOutcome, DownloadError> {
    if dest.exists() {
        debug!("{} exists, not fetching", dest.display());
        return Ok(DownloadOutcome::AlreadyPresent);
    }

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|source| DownloadError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    match fetcher.download(url, dest).await {
        Ok(()) => {
            info!("{} is saved.", dest.display());
            Ok(DownloadOutcome::Downloaded)
        }
        Err(e) => Ok(DownloadOutcome::Failed {
            reason: e.to_string(),
        }),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of extracting one archive.
pub enum ExtractOutcome {
    /// Number of entries written.
    Extracted(usize),
    /// Not a zip archive, or extraction failed part-way.
    Skipped { reason: String },
}

/// Extracts the zip archive at `archive_path` into `working_dir`.
pub fn extract_zip(archive_path: &Path, working_dir: &Path) -> Result<ExtractOutcome, DownloadError> {
    let file = File::open(archive_path)?;

    let mut archive = match ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(e) => {
            return Ok(ExtractOutcome::Skipped {
                reason: e.to_string(),
            })
        }
    };

    let entries = archive.len();
    match archive.extract(working_dir) {
        Ok(()) => {
            info!("{} is unzipped.", archive_path.display());
            Ok(ExtractOutcome::Extracted(entries))
        }
        Err(e) => Ok(ExtractOutcome::Skipped {
            reason: e.to_string(),
        }),
    }
}

/// Removes everything inside `dir`, creating it if it does not exist.
/// Returns the number of entries removed.
pub fn clear_directory(dir: &Path) -> Result<usize, DownloadError> {
    if !dir.exists() {
        fs::create_dir_all(dir).map_err(|source| DownloadError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        return Ok(0);
    }

    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            fs::remove_dir_all(&path)?;
        } else {
            fs::remove_file(&path)?;
        }
        removed += 1;
    }

    if removed > 0 {
        debug!("Removed {} temporary entries from {}", removed, dir.display());
    }

    Ok(removed)
}

/// Lists the files in `dir` (recursively) with the given extension, sorted.
pub fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, std::io::Error> {
    let mut found = Vec::new();
    let mut pending = vec![dir.to_path_buf()];

    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
            {
                found.push(path);
            }
        }
    }

    found.sort();
    Ok(found)
}

// -- Test support ------------------------------------------------------------

#[cfg(test)]
pub mod testing {
    //! An in-memory [`Fetch`] that records every request.

    use std::{collections::HashMap, sync::Mutex};

    use super::*;

    #[derive(Default)]
    pub struct MemoryFetcher {
        pages: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<String>>,
    }

    impl MemoryFetcher {
        pub fn with(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
            self.pages.insert(url.to_string(), body.into());
            self
        }

        pub fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }

        fn lookup(&self, url: &str) -> Result<&Vec<u8>, FetchError> {
            self.requests.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .ok_or_else(|| FetchError::NotFound(url.to_string()))
        }
    }

    #[async_trait]
    impl Fetch for MemoryFetcher {
        async fn get_text(&self, url: &str) -> Result<String, FetchError> {
            let body = self.lookup(url)?;
            Ok(String::from_utf8_lossy(body).into_owned())
        }

        async fn download(&self, url: &str, dest: &Path) -> Result<(), FetchError> {
            let body = self.lookup(url)?;
            fs::write(dest, body)?;
            Ok(())
        }
    }
}

// -- Tests -------------------------------------------------------------------
