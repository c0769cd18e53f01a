use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Url;
use rivulet_api::PluginError;

use crate::config::PutSearchBulkConfig;
use crate::response::HttpReply;

/// Sends one bulk payload and returns the raw reply.
///
/// `Err` means no reply was obtained (connect error, timeout).
pub trait BulkTransport: Send + Sync {
    /// Full bulk URL, reported with delivery events.
    fn endpoint(&self) -> &str;

    fn submit(
        &self,
        payload: String,
    ) -> Pin<Box<dyn Future<Output = Result<HttpReply, PluginError>> + Send + '_>>;
}

/// `PUT <base>/_bulk` over reqwest.
pub struct HttpBulkClient {
    http: reqwest::Client,
    url: Url,
    endpoint: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpBulkClient {
    pub fn from_config(cfg: &PutSearchBulkConfig) -> Result<Self, PluginError> {
        let url = bulk_url(&cfg.url, &cfg.query_params)?;
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(cfg.connect_timeout_secs))
            .timeout(Duration::from_secs(cfg.response_timeout_secs))
            .build()
            .map_err(|e| PluginError::config(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            endpoint: url.to_string(),
            url,
            username: cfg.username.clone().filter(|u| !u.is_empty()),
            password: cfg.password.clone(),
        })
    }
}

impl BulkTransport for HttpBulkClient {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn submit(
        &self,
        payload: String,
    ) -> Pin<Box<dyn Future<Output = Result<HttpReply, PluginError>> + Send + '_>> {
        Box::pin(async move {
            let mut request = self
                .http
                .put(self.url.clone())
                .header(reqwest::header::CONTENT_TYPE, "application/x-ndjson")
                .body(payload);
            if let Some(user) = &self.username {
                request = request.basic_auth(user, self.password.as_deref());
            }

            let resp = request
                .send()
                .await
                .map_err(|e| PluginError::io(format!("bulk request: {e}")))?;

            let status = resp.status().as_u16();
            // A body that cannot be read is handled like one that cannot be parsed.
            let body = match resp.bytes().await {
                Ok(bytes) => bytes.to_vec(),
                Err(e) => {
                    tracing::warn!(status, error = %e, "failed to read bulk response body");
                    Vec::new()
                }
            };
            Ok(HttpReply { status, body })
        })
    }
}

/// `<base>/_bulk` plus extra query parameters.
pub fn bulk_url(base: &str, query_params: &BTreeMap<String, String>) -> Result<Url, PluginError> {
    let mut url = Url::parse(base.trim())
        .map_err(|e| PluginError::config(format!("invalid url '{base}': {e}")))?;
    url.path_segments_mut()
        .map_err(|_| PluginError::config(format!("url '{base}' cannot be used as a base")))?
        .pop_if_empty()
        .push("_bulk");
    if !query_params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (name, value) in query_params {
            pairs.append_pair(name, value);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_bulk_segment() {
        let none = BTreeMap::new();
        assert_eq!(
            bulk_url("http://localhost:9200", &none).unwrap().as_str(),
            "http://localhost:9200/_bulk"
        );
        assert_eq!(
            bulk_url("http://es.local:9200/prefix/", &none).unwrap().as_str(),
            "http://es.local:9200/prefix/_bulk"
        );
    }

    #[test]
    fn appends_query_params() {
        let params = BTreeMap::from([
            ("pipeline".to_string(), "geoip".to_string()),
            ("refresh".to_string(), "true".to_string()),
        ]);
        assert_eq!(
            bulk_url("http://localhost:9200", &params).unwrap().as_str(),
            "http://localhost:9200/_bulk?pipeline=geoip&refresh=true"
        );
    }

    #[test]
    fn rejects_invalid_urls() {
        let none = BTreeMap::new();
        assert!(bulk_url("not a url", &none).is_err());
        assert!(bulk_url("mailto:ops@example.com", &none).is_err());
    }
}
