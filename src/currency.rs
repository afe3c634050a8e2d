use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// ISO-4217 style currency code: exactly three ASCII letters, stored upper case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurrencyCode([u8; 3]);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("currency code must be exactly 3 letters, got {0:?}")]
pub struct InvalidCurrencyCode(pub String);

impl CurrencyCode {
    pub const RUB: CurrencyCode = CurrencyCode(*b"RUB");

    pub fn as_str(&self) -> &str {
        // Only ASCII letters ever reach the inner array.
        std::str::from_utf8(&self.0).unwrap_or("???")
    }
}

impl FromStr for CurrencyCode {
    type Err = InvalidCurrencyCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.trim().as_bytes();
        if bytes.len() != 3 || !bytes.iter().all(u8::is_ascii_alphabetic) {
            return Err(InvalidCurrencyCode(s.to_string()));
        }

        let mut code = [0u8; 3];
        for (dst, src) in code.iter_mut().zip(bytes) {
            *dst = src.to_ascii_uppercase();
        }

        Ok(CurrencyCode(code))
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
