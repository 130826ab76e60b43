use crate::error::{ErrorKind, Result, is_retryable_status};
use emomo_config::{HttpConfig, RETRY_JITTER};
use exn::ResultExt;
use rand::Rng;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE, HeaderMap, HeaderValue, REFERER};
use reqwest::tls::Version;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::instrument;

const ACCEPT_HTML: &str =
    "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8";

/// A `reqwest` client that looks like a browser and retries transient
/// failures.
///
/// Retries cover connection failures, timeouts and the statuses listed in
/// [`ErrorKind::is_retryable`], with exponential backoff and ±25% jitter.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: HttpConfig,
}

impl HttpClient {
    /// Build a client sending `referer` with every request.
    pub fn new(config: &HttpConfig, timeout: Duration, referer: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_HTML));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_str(&config.accept_language).or_raise(|| ErrorKind::Client)?,
        );
        headers.insert(REFERER, HeaderValue::from_str(referer).or_raise(|| ErrorKind::Client)?);

        let mut builder = Client::builder()
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .timeout(timeout)
            .gzip(true)
            .brotli(true);
        if config.insecure_tls {
            builder = builder
                .min_tls_version(Version::TLS_1_2)
                .max_tls_version(Version::TLS_1_2)
                .danger_accept_invalid_certs(true);
        }
        Ok(Self {
            client: builder.build().or_raise(|| ErrorKind::Client)?,
            retry: config.clone(),
        })
    }

    /// Backoff before retry number `attempt + 1`.
    pub(crate) fn retry_delay(&self, attempt: u32) -> Duration {
        let jitter = rand::thread_rng().gen_range(1.0 - RETRY_JITTER..=1.0 + RETRY_JITTER);
        self.retry.backoff(attempt).mul_f64(jitter)
    }

    /// GET `url`, retrying transient failures. Non-success statuses that are
    /// left after retrying are errors.
    #[instrument(level = "debug", skip(self))]
    pub async fn get(&self, url: &str) -> Result<Response> {
        let mut attempt = 0;
        loop {
            let outcome = self.client.get(url).send().await;
            let retryable = match &outcome {
                Ok(response) => is_retryable_status(response.status().as_u16()),
                Err(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            };
            if retryable && attempt < self.retry.max_retries {
                let delay = self.retry_delay(attempt);
                attempt += 1;
                tracing::warn!(url, attempt, max_retries = self.retry.max_retries, ?delay, "Retrying request");
                tokio::time::sleep(delay).await;
                continue;
            }
            let response = outcome.or_raise(|| ErrorKind::Request(url.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                exn::bail!(ErrorKind::Status {
                    url: url.to_string(),
                    status: status.as_u16(),
                });
            }
            return Ok(response);
        }
    }

    /// GET `url` as text, decoded with the charset the server declares.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        response.text().await.or_raise(|| ErrorKind::Request(url.to_string()))
    }

    /// GET `url` as raw bytes, along with the declared content type.
    pub async fn get_bytes(&self, url: &str) -> Result<(Vec<u8>, Option<String>)> {
        let response = self.get(url).await?;
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await.or_raise(|| ErrorKind::Request(url.to_string()))?;
        Ok((bytes.to_vec(), content_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn client() -> HttpClient {
        HttpClient::new(&HttpConfig::default(), Duration::from_secs(5), "https://x.test").unwrap()
    }

    #[rstest]
    #[case(0, 500)]
    #[case(1, 1000)]
    #[case(2, 2000)]
    #[case(4, 8000)]
    #[case(10, 8000)]
    #[case(u32::MAX, 8000)]
    fn test_retry_delay_backoff(#[case] attempt: u32, #[case] nominal_ms: u64) {
        let client = client();
        for _ in 0..20 {
            let delay = client.retry_delay(attempt).as_millis() as u64;
            assert!(delay + 1 >= nominal_ms * 3 / 4, "{delay}ms below {nominal_ms}ms - 25%");
            assert!(delay <= nominal_ms * 5 / 4, "{delay}ms above {nominal_ms}ms + 25%");
        }
    }

    #[test]
    fn test_rejects_unencodable_referer() {
        let err = HttpClient::new(&HttpConfig::default(), Duration::from_secs(5), "https://x.test/\n").unwrap_err();
        assert_eq!(*err, ErrorKind::Client);
    }
}
