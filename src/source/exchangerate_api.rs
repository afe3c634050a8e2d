use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::Deserialize;

use super::{RateSource, SourceError, checked_rate};
use crate::currency::CurrencyCode;

/// Client for the ExchangeRate-API "pair" endpoint.
#[derive(Debug, Clone)]
pub struct ExchangeRateApiSource {
    client: Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct PairResponse {
    result: String,
    #[serde(rename = "error-type")]
    error_type: Option<String>,
    base_code: Option<String>,
    target_code: Option<String>,
    conversion_rate: Option<f64>,
}

impl ExchangeRateApiSource {
    pub fn new(client: Client, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    fn pair_url(&self, from: CurrencyCode, to: CurrencyCode) -> String {
        format!(
            "{}/{}/pair/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.api_key,
            from,
            to
        )
    }
}

#[async_trait]
impl RateSource for ExchangeRateApiSource {
    async fn fetch_rate(&self, from: CurrencyCode, to: CurrencyCode) -> Result<f64, SourceError> {
        let resp = self.client.get(self.pair_url(from, to)).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        let pair: PairResponse = match serde_json::from_str(&body) {
            Ok(pair) => pair,
            Err(err) if status.is_success() => return Err(SourceError::malformed(err.to_string())),
            Err(_) => return Err(SourceError::Status(status.as_u16())),
        };

        if pair.result != "success" {
            return match pair.error_type.as_deref() {
                Some("unsupported-code") => Err(SourceError::NoRate { from, to }),
                _ if !status.is_success() => Err(SourceError::Status(status.as_u16())),
                other => Err(SourceError::malformed(format!(
                    "rate source reported error {}",
                    other.unwrap_or("unknown")
                ))),
            };
        }

        debug!(
            "ExchangeRate-API answered {:?} -> {:?}: {:?}",
            pair.base_code, pair.target_code, pair.conversion_rate
        );

        let rate = pair
            .conversion_rate
            .ok_or_else(|| SourceError::malformed("conversion_rate missing"))?;

        checked_rate(rate)
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;

    use super::*;

    fn code(s: &str) -> CurrencyCode {
        s.parse().unwrap()
    }

    #[tokio::test]
    async fn reads_conversion_rate_from_pair_endpoint() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method("GET").path("/v6/secret/pair/USD/EUR");
                then.status(200)
                    .header("content-type", "application/json")
                    .body(r#"{"result":"success","base_code":"USD","target_code":"EUR","conversion_rate":0.92}"#);
            })
            .await;

        let source = ExchangeRateApiSource::new(Client::new(), server.url("/v6/"), "secret");
        let rate = source.fetch_rate(code("USD"), code("EUR")).await.unwrap();

        assert_eq!(rate, 0.92);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unsupported_code_is_no_rate() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET").path("/v6/secret/pair/USD/ZZZ");
                then.status(404)
                    .header("content-type", "application/json")
                    .body(r#"{"result":"error","error-type":"unsupported-code"}"#);
            })
            .await;

        let source = ExchangeRateApiSource::new(Client::new(), server.url("/v6"), "secret");
        let err = source.fetch_rate(code("USD"), code("ZZZ")).await.unwrap_err();

        assert!(matches!(err, SourceError::NoRate { .. }));
    }

    #[tokio::test]
    async fn server_error_surfaces_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET");
                then.status(503).body("upstream down");
            })
            .await;

        let source = ExchangeRateApiSource::new(Client::new(), server.url("/v6"), "secret");
        let err = source.fetch_rate(code("USD"), code("EUR")).await.unwrap_err();

        assert!(matches!(err, SourceError::Status(503)));
    }

    #[tokio::test]
    async fn negative_rate_is_rejected() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method("GET");
                then.status(200)
                    .body(r#"{"result":"success","conversion_rate":-1.5}"#);
            })
            .await;

        let source = ExchangeRateApiSource::new(Client::new(), server.url("/v6"), "secret");
        let err = source.fetch_rate(code("USD"), code("EUR")).await.unwrap_err();

        assert!(matches!(err, SourceError::Malformed(_)));
    }
}
