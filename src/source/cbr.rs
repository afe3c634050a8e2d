use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use log::debug;
use reqwest::Client;
use rust_decimal::prelude::ToPrimitive;

use super::{RateSource, SourceError, checked_rate};
use crate::currency::CurrencyCode;
use crate::val_curs::ValCurs;

pub const DEFAULT_CBR_URL: &str = "https://cbr.ru/scripts/XML_daily.asp";

/// Cross rates derived from the Central Bank of Russia daily XML feed.
#[derive(Debug, Clone)]
pub struct CbrDailySource {
    client: Client,
    url: String,
}

impl CbrDailySource {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    fn get_url(&self, date: NaiveDate) -> String {
        format!("{}?date_req={}", self.url, date.format("%d/%m/%Y"))
    }

    pub async fn get_val_curs(&self, date: NaiveDate) -> Result<ValCurs, SourceError> {
        let text = self.load_xml(&self.get_url(date)).await?;
        quick_xml::de::from_str(&text).map_err(|err| SourceError::malformed(err.to_string()))
    }

    async fn load_xml(&self, url: &str) -> Result<String, SourceError> {
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(SourceError::Status(resp.status().as_u16()));
        }

        Ok(resp.text().await?)
    }
}

#[async_trait]
impl RateSource for CbrDailySource {
    async fn fetch_rate(&self, from: CurrencyCode, to: CurrencyCode) -> Result<f64, SourceError> {
        let today = Utc::now().date_naive();
        let val_curs = self.get_val_curs(today).await?;
        debug!("CBR feed for {} lists {} currencies", today, val_curs.valute.len());

        let rate = val_curs
            .cross_rate(from, to)
            .map_err(|err| SourceError::malformed(err.to_string()))?
            .ok_or(SourceError::NoRate { from, to })?;

        let rate = rate
            .to_f64()
            .ok_or_else(|| SourceError::malformed(format!("rate {rate} does not fit f64")))?;

        checked_rate(rate)
    }
}
