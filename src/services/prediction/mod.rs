//! Model reply parsing and prediction persistence.

pub mod parser;
pub mod store;

pub use parser::{extract_json, parse_reply};
pub use store::{rounded_hour, ticker_lang, ticker_prefix, PredictionStore};
