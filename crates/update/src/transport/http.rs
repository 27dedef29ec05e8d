use super::Transport;
use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use cmpack_config::NetworkConfig;
use exn::ResultExt;
use std::time::Duration;
use tracing::{debug, instrument};

/// [`Transport`] over HTTP(S), following redirects.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn from_config(network: &NetworkConfig) -> Result<Self> {
        Self::new(
            &network.user_agent,
            network.timeout(),
            network.connect_timeout(),
            network.low_speed_timeout(),
        )
    }

    /// `read_timeout` bounds the time between two reads of the body, catching
    /// stalled transfers that a generous total timeout would let hang.
    pub fn new(
        user_agent: &str,
        timeout: Option<Duration>,
        connect_timeout: Option<Duration>,
        read_timeout: Option<Duration>,
    ) -> Result<Self> {
        let mut builder = reqwest::Client::builder().user_agent(user_agent);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(timeout) = connect_timeout {
            builder = builder.connect_timeout(timeout);
        }
        if let Some(timeout) = read_timeout {
            builder = builder.read_timeout(timeout);
        }
        let client = builder.build().or_raise(|| ErrorKind::Client)?;
        Ok(Self { client })
    }
}

fn classify(url: &str, err: &reqwest::Error) -> ErrorKind {
    if err.is_timeout() {
        ErrorKind::Timeout(url.to_string())
    } else {
        ErrorKind::Transport(url.to_string())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        let response = match self.client.get(url).send().await {
            Ok(response) => response,
            Err(e) => {
                let kind = classify(url, &e);
                return Err(e).or_raise(|| kind);
            },
        };
        let status = response.status();
        if !status.is_success() {
            exn::bail!(ErrorKind::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                let kind = classify(url, &e);
                return Err(e).or_raise(|| kind);
            },
        };
        debug!(bytes = body.len(), "Fetched");
        Ok(body.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn transport(timeout: Option<Duration>) -> HttpTransport {
        HttpTransport::new("cmpack-test", timeout, None, None).unwrap()
    }

    #[tokio::test]
    async fn test_fetch_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/pack/index.pidx"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<index/>"))
            .mount(&server)
            .await;

        let body = transport(None)
            .fetch(&format!("{}/pack/index.pidx", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, b"<index/>");
    }

    #[tokio::test]
    async fn test_http_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/missing.pdsc", server.uri());
        let err = transport(None).fetch(&url).await.unwrap_err();
        assert_eq!(*err, ErrorKind::HttpStatus { url, status: 404 });
    }

    #[tokio::test]
    async fn test_timeout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
            .mount(&server)
            .await;

        let url = format!("{}/slow.pack", server.uri());
        let err = transport(Some(Duration::from_millis(200))).fetch(&url).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Timeout(url));
    }

    #[tokio::test]
    async fn test_unreachable_host() {
        let url = "http://127.0.0.1:1/index.pidx".to_string();
        let err = transport(Some(Duration::from_secs(5))).fetch(&url).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Transport(url));
    }

    #[tokio::test]
    async fn test_user_agent_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(wiremock::matchers::header("user-agent", "cmpack-test"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        transport(None).fetch(&server.uri()).await.unwrap();
    }
}
