//! Application-layer probe: an HTTP(S) HEAD request pinned to one candidate address.

use async_trait::async_trait;
use ipscan_core::{Attempt, Outcome};
use reqwest::{redirect::Policy, Client, StatusCode};
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_6) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/98.0.4758.80 Safari/537.36";

#[derive(Debug, Error)]
pub enum ProbeSetupError {
    #[error("invalid probe url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("probe url {0:?} has no host name")]
    MissingHost(String),
    #[error("probe url {0:?} must use http or https")]
    UnsupportedScheme(String),
}

/// HEAD request to a fixed URL whose host name is forced to resolve to the probed address.
#[derive(Debug, Clone)]
pub struct HttpAttempt {
    url: Url,
    host: String,
    port: u16,
    timeout: Duration,
}

impl HttpAttempt {
    pub fn new(url: &str, port: u16, timeout: Duration) -> Result<Self, ProbeSetupError> {
        let mut parsed = Url::parse(url).map_err(|source| ProbeSetupError::InvalidUrl { url: url.to_string(), source })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ProbeSetupError::UnsupportedScheme(url.to_string()));
        }
        let host = parsed
            .host_str()
            .map(str::to_string)
            .ok_or_else(|| ProbeSetupError::MissingHost(url.to_string()))?;
        // DNS overrides carry no port, so a non-default port has to live in the URL.
        if parsed.port_or_known_default() != Some(port) {
            parsed
                .set_port(Some(port))
                .map_err(|_| ProbeSetupError::MissingHost(url.to_string()))?;
        }
        Ok(HttpAttempt { url: parsed, host, port, timeout })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    fn client_for(&self, addr: IpAddr) -> reqwest::Result<Client> {
        Client::builder()
            .redirect(Policy::none())
            .timeout(self.timeout)
            .user_agent(USER_AGENT)
            .resolve(&self.host, SocketAddr::new(addr, self.port))
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()
    }
}

/// The first response is taken as-is: success and redirect statuses pass.
pub fn accepted(status: StatusCode) -> bool {
    status.is_success() || status.is_redirection()
}

#[async_trait]
impl Attempt for HttpAttempt {
    async fn attempt(&self, addr: IpAddr, _seq: u16) -> Outcome {
        let client = match self.client_for(addr) {
            Ok(c) => c,
            Err(e) => {
                debug!(%addr, error = %e, "http client build failed");
                return Outcome::Timeout;
            }
        };
        let start = Instant::now();
        match client.head(self.url.clone()).send().await {
            Ok(resp) if accepted(resp.status()) => Outcome::Reply(start.elapsed()),
            Ok(resp) => {
                debug!(%addr, status = %resp.status(), "http status rejected");
                Outcome::Timeout
            }
            Err(e) => {
                debug!(%addr, error = %e, "http request failed");
                Outcome::Timeout
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    const NO_CONTENT: &str = "HTTP/1.1 204 No Content\r\nConnection: close\r\n\r\n";
    const FOUND: &str = "HTTP/1.1 302 Found\r\n\
        Location: http://elsewhere.invalid/\r\n\
        Content-Length: 0\r\n\
        Connection: close\r\n\r\n";
    const UNAVAILABLE: &str = "HTTP/1.1 503 Service Unavailable\r\n\
        Content-Length: 0\r\n\
        Connection: close\r\n\r\n";

    fn local(port: u16, timeout: Duration) -> HttpAttempt {
        HttpAttempt::new(&format!("http://probe.invalid:{}/", port), port, timeout).unwrap()
    }

    /// Answers one connection with `response` and hands back the raw request.
    async fn fixed_server(response: &'static str) -> (u16, tokio::task::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let mut seen = Vec::new();
            if let Ok((mut sock, _)) = listener.accept().await {
                let mut buf = vec![0u8; 2048];
                let n = sock.read(&mut buf).await.unwrap_or(0);
                seen.push(String::from_utf8_lossy(&buf[..n]).to_string());
                let _ = sock.write_all(response.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
            seen
        });
        (port, handle)
    }

    #[test]
    fn rejects_bad_urls() {
        let t = Duration::from_secs(1);
        let bad = HttpAttempt::new("not a url", 443, t);
        assert!(matches!(bad, Err(ProbeSetupError::InvalidUrl { .. })));
        let ftp = HttpAttempt::new("ftp://example.com/", 21, t);
        assert!(matches!(ftp, Err(ProbeSetupError::UnsupportedScheme(_))));
    }

    #[test]
    fn non_default_port_moves_into_url() {
        let t = Duration::from_secs(1);
        let a = HttpAttempt::new("https://translate.google.com/", 443, t).unwrap();
        assert_eq!(a.url().as_str(), "https://translate.google.com/");
        let a = HttpAttempt::new("https://translate.google.com/", 8443, t).unwrap();
        assert_eq!(a.url().as_str(), "https://translate.google.com:8443/");
    }

    #[test]
    fn redirects_count_as_success() {
        assert!(accepted(StatusCode::OK));
        assert!(accepted(StatusCode::MOVED_PERMANENTLY));
        assert!(!accepted(StatusCode::FORBIDDEN));
        assert!(!accepted(StatusCode::BAD_GATEWAY));
    }

    #[tokio::test]
    async fn dials_the_given_address_not_dns() {
        let (port, server) = fixed_server(NO_CONTENT).await;
        let url = format!("http://probe.invalid:{}/status", port);
        let a = HttpAttempt::new(&url, port, Duration::from_secs(3)).unwrap();
        let outcome = a.attempt(IpAddr::from([127, 0, 0, 1]), 0).await;
        assert!(matches!(outcome, Outcome::Reply(_)), "{:?}", outcome);
        let requests = server.await.unwrap();
        assert!(requests[0].starts_with("HEAD /status HTTP/1.1"), "{}", requests[0]);
        assert!(requests[0].to_lowercase().contains("host: probe.invalid"));
    }

    #[tokio::test]
    async fn redirect_is_not_followed() {
        let (port, server) = fixed_server(FOUND).await;
        let a = local(port, Duration::from_secs(3));
        let outcome = a.attempt(IpAddr::from([127, 0, 0, 1]), 0).await;
        assert!(matches!(outcome, Outcome::Reply(_)), "{:?}", outcome);
        assert_eq!(server.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn server_error_and_dead_port_map_to_timeout() {
        let (port, _server) = fixed_server(UNAVAILABLE).await;
        let a = local(port, Duration::from_secs(3));
        assert_eq!(a.attempt(IpAddr::from([127, 0, 0, 1]), 0).await, Outcome::Timeout);

        let dead = {
            let l = TcpListener::bind("127.0.0.1:0").await.unwrap();
            l.local_addr().unwrap().port()
        };
        let a = local(dead, Duration::from_secs(1));
        assert_eq!(a.attempt(IpAddr::from([127, 0, 0, 1]), 0).await, Outcome::Timeout);
    }
}
