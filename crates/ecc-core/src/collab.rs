//! Narrow interfaces to the outside world a pipeline run talks to: the HTTP
//! fetcher, blob storage for raw payloads, and the operations channel.
//!
//! Implementations live in `ecc-scraper`; tests substitute in-memory fakes.

use std::future::Future;

use bytes::Bytes;
use serde_json::Value;

// ─── HTTP ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
  Get,
  Post,
}

/// A fully-described upstream request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
  pub method:  Method,
  pub url:     String,
  pub headers: Vec<(&'static str, String)>,
  pub query:   Vec<(&'static str, String)>,
  /// JSON body; only sent with `Post`.
  pub json:    Option<Value>,
}

impl HttpRequest {
  pub fn get(url: impl Into<String>) -> Self {
    Self {
      method:  Method::Get,
      url:     url.into(),
      headers: Vec::new(),
      query:   Vec::new(),
      json:    None,
    }
  }

  pub fn post_json(url: impl Into<String>, body: Value) -> Self {
    Self {
      method: Method::Post,
      json: Some(body),
      ..Self::get(url)
    }
  }

  pub fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
    self.headers.push((name, value.into()));
    self
  }

  pub fn query(mut self, name: &'static str, value: impl Into<String>) -> Self {
    self.query.push((name, value.into()));
    self
  }
}

/// What came back from the upstream, whatever the status.
#[derive(Debug, Clone)]
pub struct Payload {
  pub url:    String,
  pub status: u16,
  pub body:   Bytes,
}

impl Payload {
  pub fn is_success(&self) -> bool { (200..300).contains(&self.status) }

  /// Turn a non-2xx answer into [`crate::Error::Fetch`].
  pub fn ensure_success(self) -> crate::Result<Self> {
    if self.is_success() {
      Ok(self)
    } else {
      Err(crate::Error::Fetch { url: self.url, status: self.status })
    }
  }
}

/// Issues upstream requests. Transport failures are errors; HTTP statuses are
/// not; the caller decides what a status means.
pub trait Fetcher: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn fetch(
    &self,
    request: HttpRequest,
  ) -> impl Future<Output = Result<Payload, Self::Error>> + Send + '_;
}

/// A successful download, labelled and named for blob storage.
#[derive(Debug, Clone)]
pub struct Download {
  /// Source-side label of what was requested (e.g. a fuel category), or the
  /// country slug for single-request sources.
  pub label:     String,
  /// Where the raw payload is kept for manual re-processing.
  pub blob_name: String,
  pub payload:   Payload,
}

// ─── Blob storage ────────────────────────────────────────────────────────────

/// Confirmation of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobReceipt {
  pub name:   String,
  pub size:   usize,
  /// Hex-encoded SHA-256 of the stored bytes.
  pub sha256: String,
}

/// Verbatim storage for raw upstream payloads. Writing an existing name
/// overwrites it.
pub trait BlobStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn put<'a>(
    &'a self,
    name: &'a str,
    body: &'a [u8],
  ) -> impl Future<Output = Result<BlobReceipt, Self::Error>> + Send + 'a;
}

// ─── Notifications ───────────────────────────────────────────────────────────

/// Best-effort delivery of one human-readable status line.
///
/// Implementations swallow (and log) their own failures: nothing a notifier
/// does may change the control flow of a run.
pub trait Notifier: Send + Sync {
  fn send<'a>(&'a self, text: &'a str) -> impl Future<Output = ()> + Send + 'a;
}
