use async_trait::async_trait;
use reqwest::{Response, Url};

/// Executes GET requests for the geocoder. A seam so tests can stub the
/// network away.
#[async_trait]
pub trait GeocodeTransport: Send + Sync {
    async fn get(&self, url: Url) -> reqwest::Result<Response>;
}

/// Plain reqwest-backed transport.
pub struct HttpTransport(reqwest::Client);

impl HttpTransport {
    pub fn new() -> Self {
        Self(reqwest::Client::new())
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GeocodeTransport for HttpTransport {
    async fn get(&self, url: Url) -> reqwest::Result<Response> {
        self.0.get(url).send().await
    }
}
