// src/document.rs
//! Filing text collaborator: downloads the attached PDF and flattens its first
//! pages to plain text. Every failure is logged and returned as empty text.

use anyhow::{bail, Context, Result};
use metrics::{counter, histogram};
use std::time::Duration;

pub const DEFAULT_MAX_PAGES: usize = 3;
pub const DEFAULT_MAX_BYTES: usize = 15 * 1024 * 1024;

#[async_trait::async_trait]
pub trait DocumentSource: Send + Sync {
    /// Plain text of the leading pages, or empty on any failure.
    async fn fetch_text(&self, url: &str) -> String;
}

/// Used when filings should not be fetched at all.
pub struct NoDocuments;

#[async_trait::async_trait]
impl DocumentSource for NoDocuments {
    async fn fetch_text(&self, _url: &str) -> String {
        String::new()
    }
}

pub struct PdfDocumentSource {
    client: reqwest::Client,
    max_pages: usize,
    max_bytes: usize,
}

impl PdfDocumentSource {
    pub fn new(timeout: Duration, max_pages: usize) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; bse-disclosure-bot/0.1)")
            .build()
            .context("building document http client")?;
        Ok(Self {
            client,
            max_pages: max_pages.max(1),
            max_bytes: DEFAULT_MAX_BYTES,
        })
    }

    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>> {
        let rsp = self
            .client
            .get(url)
            .send()
            .await
            .context("document get()")?
            .error_for_status()
            .context("document non-2xx")?;
        if let Some(len) = rsp.content_length() {
            if len as usize > self.max_bytes {
                bail!("document too large: {len} bytes");
            }
        }
        let bytes = rsp.bytes().await.context("document body")?;
        if bytes.len() > self.max_bytes {
            bail!("document too large: {} bytes", bytes.len());
        }
        Ok(bytes.to_vec())
    }
}

/// Text of the first `max_pages` pages of a PDF.
pub fn pdf_text(bytes: &[u8], max_pages: usize) -> Result<String> {
    if !bytes.starts_with(b"%PDF") {
        bail!("not a pdf");
    }
    let doc = lopdf::Document::load_mem(bytes).context("loading pdf")?;
    let pages: Vec<u32> = doc.get_pages().keys().copied().take(max_pages).collect();
    if pages.is_empty() {
        return Ok(String::new());
    }
    doc.extract_text(&pages).context("extracting pdf text")
}

#[async_trait::async_trait]
impl DocumentSource for PdfDocumentSource {
    async fn fetch_text(&self, url: &str) -> String {
        let t0 = std::time::Instant::now();
        let bytes = match self.download(url).await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(target: "document", error = ?e, %url, "document download failed");
                counter!("document_errors_total").increment(1);
                return String::new();
            }
        };

        let max_pages = self.max_pages;
        let parsed = tokio::task::spawn_blocking(move || pdf_text(&bytes, max_pages)).await;
        histogram!("document_fetch_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);

        match parsed {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(target: "document", error = ?e, %url, "document parse failed");
                counter!("document_errors_total").increment(1);
                String::new()
            }
            Err(e) => {
                tracing::warn!(target: "document", error = ?e, %url, "document parse task failed");
                counter!("document_errors_total").increment(1);
                String::new()
            }
        }
    }
}
