//! KALE price quotes.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use super::source::SourceError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum QuoteSource {
    Live { endpoint: String },
    /// Fixed configured value served because every source failed.
    /// Never cached and never to be mistaken for market data.
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    /// USD per KALE.
    pub price: f64,
    /// 24h change as a fraction (0.05 == +5%).
    pub change_24h: Option<f64>,
    pub source: QuoteSource,
    pub fetched_at: DateTime<Utc>,
}

impl Quote {
    pub fn placeholder(price: f64) -> Self {
        Self {
            price,
            change_24h: None,
            source: QuoteSource::Placeholder,
            fetched_at: Utc::now(),
        }
    }

    pub fn is_live(&self) -> bool {
        matches!(self.source, QuoteSource::Live { .. })
    }

    pub fn change_24h_percent(&self) -> Option<f64> {
        self.change_24h.map(|c| c * 100.0)
    }
}

/// Read the quote for `token` out of a price API response.
///
/// Expected shape is `{"data": {<token>: {"price": f, "priceChange24h": f?}}}`;
/// the `data` envelope is optional.
pub fn parse_quote(body: &Value, token: &str, endpoint: &str) -> Result<Quote, SourceError> {
    let map = body.get("data").filter(|d| d.is_object()).unwrap_or(body);
    let entry = map
        .get(token)
        .ok_or_else(|| SourceError::Malformed(format!("no price entry for {}", token)))?;

    let price = entry
        .get("price")
        .and_then(Value::as_f64)
        .filter(|p| p.is_finite())
        .ok_or_else(|| SourceError::Malformed("price is missing or not a number".into()))?;

    Ok(Quote {
        price,
        change_24h: entry.get("priceChange24h").and_then(Value::as_f64),
        source: QuoteSource::Live {
            endpoint: endpoint.to_string(),
        },
        fetched_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const TOKEN: &str = "CB23WRDQWGSP6YPMY4UV5C4OW5CBTXKYN3XEATG7KJEZCXMJBYEHOUOV";

    #[test]
    fn test_parse_enveloped_quote() {
        let body = json!({"data": {TOKEN: {"price": 0.0021, "priceChange24h": 0.05}}});
        let quote = parse_quote(&body, TOKEN, "jup").unwrap();

        assert_eq!(quote.price, 0.0021);
        assert_eq!(quote.change_24h, Some(0.05));
        assert_eq!(quote.change_24h_percent(), Some(5.0));
        assert!(quote.is_live());
    }

    #[test]
    fn test_parse_bare_map_without_change() {
        let body = json!({TOKEN: {"price": 1.5}});
        let quote = parse_quote(&body, TOKEN, "jup").unwrap();
        assert_eq!(quote.change_24h, None);
    }

    #[test]
    fn test_missing_or_bad_price() {
        assert!(matches!(
            parse_quote(&json!({"data": {}}), TOKEN, "jup"),
            Err(SourceError::Malformed(_))
        ));
        assert!(matches!(
            parse_quote(&json!({"data": {TOKEN: {"price": "cheap"}}}), TOKEN, "jup"),
            Err(SourceError::Malformed(_))
        ));
    }

    #[test]
    fn test_placeholder_is_flagged() {
        let quote = Quote::placeholder(0.000123);
        assert!(!quote.is_live());
        assert_eq!(quote.source, QuoteSource::Placeholder);
    }
}
