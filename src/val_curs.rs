use std::str::FromStr;

use rust_decimal::Decimal;
use serde::Deserialize;
use serde::Serialize;

use crate::currency::CurrencyCode;

#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct Valute {
    #[serde(rename = "CharCode")]
    pub char_code: String,
    #[serde(rename = "VunitRate")]
    pub vunit_rate: String,
}

/// Daily rates document published by the Central Bank of Russia.
#[derive(Debug, Deserialize, Serialize, PartialEq)]
pub struct ValCurs {
    #[serde(rename = "Valute")]
    pub valute: Vec<Valute>,
}

impl ValCurs {
    /// Roubles per one unit of `code`. The rouble itself is implicit in the feed.
    pub fn rub_per(&self, code: CurrencyCode) -> Result<Option<Decimal>, rust_decimal::Error> {
        if code == CurrencyCode::RUB {
            return Ok(Some(Decimal::ONE));
        }

        let Some(valute) = self
            .valute
            .iter()
            .find(|valute| valute.char_code.eq_ignore_ascii_case(code.as_str()))
        else {
            return Ok(None);
        };

        Decimal::from_str(&normalize_decimal_string(&valute.vunit_rate)).map(Some)
    }

    /// Units of `to` bought by one unit of `from`, crossed through the rouble.
    pub fn cross_rate(
        &self,
        from: CurrencyCode,
        to: CurrencyCode,
    ) -> Result<Option<Decimal>, rust_decimal::Error> {
        let (Some(from_rub), Some(to_rub)) = (self.rub_per(from)?, self.rub_per(to)?) else {
            return Ok(None);
        };

        Ok(from_rub.checked_div(to_rub))
    }
}

fn normalize_decimal_string(s: &str) -> String {
    s.trim().replace(',', ".")
}
