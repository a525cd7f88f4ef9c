use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;

use super::{Error, HttpResponse, Result};
use crate::RequestTemplate;

/// The OS-level TCP connect timeout can be tens of seconds; unreachable targets should
/// surface as failures promptly instead.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
    request_timeout: Option<Duration>,
}

impl Default for HttpClient {
    fn default() -> Self {
        Self::new(Some(DEFAULT_CONNECT_TIMEOUT), Some(DEFAULT_REQUEST_TIMEOUT))
    }
}

impl HttpClient {
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>, request_timeout: Option<Duration>) -> Self {
        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false);
        http_connector.set_connect_timeout(connect_timeout);
        http_connector.set_nodelay(true);

        let https_connector = HttpsConnectorBuilder::new()
            .with_webpki_roots()
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let inner = Client::builder(TokioExecutor::new()).build(https_connector);

        Self {
            inner,
            request_timeout,
        }
    }

    /// Sends request number `index` of `template` exactly once. No retries.
    pub async fn send(&self, template: &RequestTemplate, index: u64) -> Result<HttpResponse> {
        let variant = template.variant(index);

        let mut req: Request<Full<Bytes>> = Request::builder()
            .method(template.method().as_http())
            .uri(variant.uri().clone())
            .body(Full::new(variant.body().clone()))?;
        *req.headers_mut() = template.wire_headers().clone();

        let started = Instant::now();
        let exchange = async {
            let res = self.inner.request(req).await?;
            let time_to_first_byte = started.elapsed();

            let (parts, body) = res.into_parts();
            let status = parts.status.as_u16();

            let mut merged: BTreeMap<String, String> = BTreeMap::new();
            for (name, value) in parts.headers.iter() {
                let key = name.as_str().to_ascii_lowercase();
                let v = String::from_utf8_lossy(value.as_bytes()).to_string();
                merged
                    .entry(key)
                    .and_modify(|cur| {
                        if !cur.is_empty() {
                            cur.push_str(", ");
                        }
                        cur.push_str(&v);
                    })
                    .or_insert(v);
            }

            let body = body.collect().await?.to_bytes();

            Ok::<_, Error>(HttpResponse {
                status,
                headers: merged.into_iter().collect(),
                body,
                time_to_first_byte,
            })
        };

        match self.request_timeout {
            Some(timeout) => match tokio::time::timeout(timeout, exchange).await {
                Ok(res) => res,
                Err(_) => Err(Error::Timeout(timeout)),
            },
            None => exchange.await,
        }
    }
}
