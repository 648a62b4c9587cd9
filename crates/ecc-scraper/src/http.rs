//! [`Fetcher`] over a shared [`reqwest::Client`].

use std::time::Duration;

use ecc_core::collab::{Fetcher, HttpRequest, Method, Payload};
use reqwest::Client;
use tracing::debug;

use crate::error::Result;

/// Cheap to clone; the inner client is `Arc`-based.
#[derive(Clone)]
pub struct ReqwestFetcher {
  client: Client,
}

impl ReqwestFetcher {
  pub fn new(timeout: Duration) -> Result<Self> {
    let client = Client::builder()
      .timeout(timeout)
      .user_agent(concat!("ecc-scraper/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { client })
  }

  /// Translate `request` without sending it.
  pub fn build(&self, request: HttpRequest) -> reqwest::Result<reqwest::Request> {
    let mut builder = match request.method {
      Method::Get => self.client.get(&request.url),
      Method::Post => self.client.post(&request.url),
    };
    for (name, value) in &request.headers {
      builder = builder.header(*name, value);
    }
    if !request.query.is_empty() {
      builder = builder.query(&request.query);
    }
    if let (Method::Post, Some(body)) = (request.method, &request.json) {
      builder = builder.json(body);
    }
    builder.build()
  }
}

impl Fetcher for ReqwestFetcher {
  type Error = reqwest::Error;

  async fn fetch(&self, request: HttpRequest) -> Result<Payload, reqwest::Error> {
    let url = request.url.clone();
    let req = self.build(request)?;
    debug!(method = %req.method(), url = %req.url(), "upstream request");

    let resp = self.client.execute(req).await?;
    let status = resp.status().as_u16();
    let body = resp.bytes().await?;
    debug!(%url, status, size = body.len(), "upstream response");

    Ok(Payload { url, status, body })
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn fetcher() -> ReqwestFetcher { ReqwestFetcher::new(Duration::from_secs(5)).unwrap() }

  #[test]
  fn get_carries_query_and_headers() {
    let req = fetcher()
      .build(
        HttpRequest::get("https://example.org/data")
          .query("synchronous", "true")
          .header("Accept", "text/csv"),
      )
      .unwrap();

    assert_eq!(req.method(), reqwest::Method::GET);
    assert_eq!(req.url().as_str(), "https://example.org/data?synchronous=true");
    assert_eq!(req.headers()["accept"], "text/csv");
    assert!(req.body().is_none());
  }

  #[test]
  fn post_sends_a_json_body() {
    let req = fetcher()
      .build(HttpRequest::post_json("https://example.org/query", json!({ "a": 1 })))
      .unwrap();

    assert_eq!(req.method(), reqwest::Method::POST);
    assert_eq!(req.headers()["content-type"], "application/json");
    let body = req.body().and_then(|b| b.as_bytes()).unwrap();
    assert_eq!(serde_json::from_slice::<serde_json::Value>(body).unwrap(), json!({ "a": 1 }));
  }
}
