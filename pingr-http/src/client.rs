use bytes::Bytes;
use http_body_util::{BodyExt as _, Full};
use hyper::Request;
use hyper_rustls::{HttpsConnector, HttpsConnectorBuilder};
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

use pingr_core::{ErrorInfo, QueryClient, QueryReply};

use super::{Error, Result};

const USER_AGENT: &str = concat!("pingr/", env!("CARGO_PKG_VERSION"));

/// Status query over HTTP(S): a `GET` that must answer with a 2xx status.
#[derive(Debug, Clone)]
pub struct HttpStatusClient {
    inner: Client<HttpsConnector<HttpConnector>, Full<Bytes>>,
}

impl Default for HttpStatusClient {
    fn default() -> Self {
        // The OS-level TCP connect timeout can be very long (tens of seconds); keep failed
        // connects prompt so they surface as connection errors rather than timeouts.
        Self::new(Some(Duration::from_secs(3)))
    }
}

impl HttpStatusClient {
    #[must_use]
    pub fn new(connect_timeout: Option<Duration>) -> Self {
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

        Self { inner }
    }

    pub async fn status(&self, target: &str, timeout: Duration) -> Result<QueryReply> {
        let uri = validate_target(target)?;

        let req: Request<Full<Bytes>> = Request::builder()
            .method(http::Method::GET)
            .uri(uri)
            .header(http::header::USER_AGENT, USER_AGENT)
            .body(Full::new(Bytes::new()))?;

        // The deadline covers the whole exchange, body included.
        match tokio::time::timeout(timeout, self.exchange(req)).await {
            Ok(res) => res,
            Err(_) => Err(Error::Timeout(timeout)),
        }
    }

    async fn exchange(&self, req: Request<Full<Bytes>>) -> Result<QueryReply> {
        let res = self.inner.request(req).await?;
        let (parts, body) = res.into_parts();
        let body = body.collect().await?.to_bytes();

        if !parts.status.is_success() {
            return Err(Error::UnexpectedStatus(parts.status.as_u16()));
        }

        let server = parts
            .headers
            .get(http::header::SERVER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        Ok(QueryReply {
            status: Some(parts.status.as_u16()),
            server,
            bytes_received: body.len() as u64,
        })
    }
}

impl QueryClient for HttpStatusClient {
    async fn query(&self, target: &str, timeout: Duration) -> std::result::Result<QueryReply, ErrorInfo> {
        self.status(target, timeout).await.map_err(ErrorInfo::from)
    }
}

/// Checks that `target` is an absolute http(s) URL.
pub fn validate_target(target: &str) -> Result<hyper::Uri> {
    let parsed = url::Url::parse(target).map_err(|_| Error::InvalidUrl(target.to_string()))?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(Error::UnsupportedScheme(target.to_string()));
    }
    if parsed.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidUrl(target.to_string()));
    }

    parsed
        .as_str()
        .parse()
        .map_err(|_| Error::InvalidUrl(target.to_string()))
}
