pub mod package;

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use reqwest::header::CONTENT_TYPE;
use reqwest::{blocking::Client, redirect::Policy, StatusCode};
use url::Url;

use crate::error::Error;
use crate::Result;

const HTTP_CONN_TIMEOUT: u64 = 30;
const DOWNLOAD_TIMEOUT: u64 = 60;

/// Timeouts applied to every GET request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    /// TCP connect including the TLS handshake.
    pub connect: Duration,
    /// The whole request, body included.
    pub total: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Timeouts {
            connect: Duration::from_secs(HTTP_CONN_TIMEOUT),
            total: Duration::from_secs(DOWNLOAD_TIMEOUT),
        }
    }
}

/// `User-Agent` sent with every request, e.g. `wyu-rs/0.1.0 (linux; x86_64)`.
pub fn user_agent() -> String {
    format!("{}/{} ({}; {})", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"), std::env::consts::OS, std::env::consts::ARCH)
}

pub fn hash_on_disk<T: wyu_types::Hasher>(path: &Path, maxlen: Option<usize>) -> Result<T::Output> {
    let file = File::open(path).map_err(Error::OpenFile)?;

    let filelen = file.metadata().map_err(Error::GetFileMetadata)?.len() as usize;

    let mut maxlen_to_read: usize = match maxlen {
        Some(len) => filelen.min(len),
        None => filelen,
    };

    let mut hasher = T::new();

    const CHUNKLEN: usize = 10485760; // 10M

    let mut freader = BufReader::new(file);
    let mut databuf = vec![0u8; CHUNKLEN.min(maxlen_to_read)];

    while maxlen_to_read > 0 {
        if maxlen_to_read < databuf.len() {
            // last and submaximal chunk to read, shrink the buffer for it
            databuf.truncate(maxlen_to_read);
        }

        freader.read_exact(&mut databuf).map_err(Error::ReadFromFile)?;

        maxlen_to_read -= databuf.len();

        hasher.update(&databuf);
    }

    Ok(hasher.finalize())
}

/// Something that can GET a URL into a writer.
///
/// A successful fetch has written the complete body. A failed fetch may have
/// written part of it; callers that retry elsewhere must discard the output.
pub trait Fetcher {
    fn fetch(&self, url: &str, writer: &mut dyn Write) -> Result<u64>;
}

impl<T: Fetcher + ?Sized> Fetcher for &T {
    fn fetch(&self, url: &str, writer: &mut dyn Write) -> Result<u64> {
        (**self).fetch(url, writer)
    }
}

/// Blocking HTTP(S) transport.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeouts: Timeouts) -> Result<Self> {
        // The default policy of reqwest Client supports max 10 attempts on HTTP redirect.
        let client = Client::builder()
            .connect_timeout(timeouts.connect)
            .timeout(timeouts.total)
            .user_agent(user_agent())
            .redirect(Policy::default())
            .build()
            .map_err(Error::BuildClient)?;

        Ok(HttpFetcher { client })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, writer: &mut dyn Write) -> Result<u64> {
        let url = Url::parse(url).map_err(|err| Error::ParseUrl(url.to_string(), err))?;

        let mut res = self.client.get(url.clone()).send().map_err(|err| Error::SendGetRequest(url.clone(), err))?;

        if url != *res.url() {
            info!("redirected to URL {:?}", res.url());
        }

        let is_html = res
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|content_type| content_type.to_ascii_lowercase().contains("html"));

        match res.status() {
            StatusCode::NOT_FOUND => return Err(Error::ErrorPageReturned(url)),
            _ if is_html => return Err(Error::ErrorPageReturned(url)),
            StatusCode::OK => {}
            status => return Err(Error::GetRequestFailed(url, status)),
        }

        res.copy_to(writer).map_err(Error::CopyRequestBodyToFile)
    }
}

fn try_urls<T, F>(urls: &[String], attempt: F) -> Result<T>
where
    F: FnMut(&String) -> Result<T>,
{
    if urls.is_empty() {
        return Err(Error::NoUrlsSpecified);
    }

    crate::first_success(urls, attempt).map_err(Error::DownloadFailed)
}

/// Downloads the first URL that succeeds into memory.
pub fn download_to_vec<F: Fetcher>(fetcher: &F, urls: &[String]) -> Result<Vec<u8>> {
    try_urls(urls, |url| {
        debug!("fetching {url}");
        let mut buf = Vec::new();
        fetcher.fetch(url, &mut buf)?;
        Ok(buf)
    })
}

/// Downloads the first URL that succeeds into `path`, truncating it for every
/// attempt. Returns the number of bytes written.
pub fn download_to_file<F: Fetcher>(fetcher: &F, urls: &[String], path: &Path) -> Result<u64> {
    try_urls(urls, |url| {
        debug!("fetching {url} into {}", path.display());
        let mut file = File::create(path).map_err(Error::CreateFile)?;
        let written = fetcher.fetch(url, &mut file)?;
        file.flush().map_err(Error::WriteFile)?;
        Ok(written)
    })
}
