pub mod config;
pub mod currency;
pub mod error;
pub mod exchange_rate;
pub mod http;
pub mod item;
pub mod rate_cache;
pub mod source;
pub mod store;
pub mod student;
pub mod val_curs;
