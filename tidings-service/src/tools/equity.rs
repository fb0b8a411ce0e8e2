//! Stock quotes from an Alpha Vantage style `GLOBAL_QUOTE` endpoint.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

use super::{ProviderError, get_json, record_fallback, with_deadline};
use crate::config::EquityProviderConfig;
use crate::models::ToolName;

const UNAVAILABLE: &str = "unavailable";

/// Display-formatted quote
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: String,
    pub change: String,
    pub change_percent: String,
    pub volume: String,
    pub high: String,
    pub low: String,
    pub open: String,
    pub previous_close: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<&'static str>,
}

impl Quote {
    /// Symbol echoed, every numeric field marked unavailable
    pub fn unavailable(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            price: UNAVAILABLE.to_string(),
            change: UNAVAILABLE.to_string(),
            change_percent: UNAVAILABLE.to_string(),
            volume: UNAVAILABLE.to_string(),
            high: UNAVAILABLE.to_string(),
            low: UNAVAILABLE.to_string(),
            open: UNAVAILABLE.to_string(),
            previous_close: UNAVAILABLE.to_string(),
            status: Some(UNAVAILABLE),
        }
    }
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(rename = "Global Quote", default)]
    global_quote: HashMap<String, String>,
    #[serde(rename = "Error Message", default)]
    error_message: Option<String>,
    /// Rate-limit notices arrive as 200 responses under one of these keys
    #[serde(rename = "Note", alias = "Information", default)]
    note: Option<String>,
}

#[derive(Clone)]
pub struct EquityExecutor {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    timeout: Duration,
}

impl EquityExecutor {
    pub fn new(config: &EquityProviderConfig, timeout: Duration) -> Result<Self, ProviderError> {
        Ok(Self {
            client: super::http_client(timeout)?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.trim().is_empty()),
            timeout,
        })
    }

    pub async fn execute(&self, symbol: &str) -> Value {
        let quote = match with_deadline(self.timeout, self.fetch(symbol)).await {
            Ok(quote) => quote,
            Err(e) => {
                record_fallback(ToolName::GetStockPrice, symbol, &e);
                Quote::unavailable(symbol)
            }
        };
        serde_json::to_value(quote).unwrap_or(Value::Null)
    }

    pub async fn fetch(&self, symbol: &str) -> Result<Quote, ProviderError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::MissingCredentials {
                provider: "equity quotes",
            })?;

        let url = format!(
            "{}?function=GLOBAL_QUOTE&symbol={}&apikey={}",
            self.base_url,
            urlencoding::encode(symbol),
            urlencoding::encode(api_key)
        );
        let response: QuoteResponse = get_json(&self.client, &url).await?;

        if let Some(message) = response.error_message.or(response.note) {
            return Err(ProviderError::ApiError {
                status: 200,
                message,
            });
        }
        if response.global_quote.is_empty() {
            return Err(ProviderError::NotFound {
                message: format!("no quote for {}", symbol),
            });
        }

        format_quote(symbol, &response.global_quote)
    }
}

/// Turn raw numbered quote fields into the display form
fn format_quote(symbol: &str, raw: &HashMap<String, String>) -> Result<Quote, ProviderError> {
    let number = |key: &str| -> Result<f64, ProviderError> {
        let text = raw
            .get(key)
            .ok_or_else(|| ProviderError::malformed(format!("missing field {}", key)))?;
        text.trim()
            .parse::<f64>()
            .map_err(|_| ProviderError::malformed(format!("{} is not a number: {}", key, text)))
    };

    let price = number("05. price")?;
    let previous_close = number("08. previous close")?;
    let change = number("09. change").unwrap_or(price - previous_close);
    let change_percent = raw
        .get("10. change percent")
        .and_then(|p| p.trim().trim_end_matches('%').parse::<f64>().ok())
        .unwrap_or_else(|| {
            if previous_close == 0.0 {
                0.0
            } else {
                change / previous_close * 100.0
            }
        });

    Ok(Quote {
        symbol: raw
            .get("01. symbol")
            .cloned()
            .unwrap_or_else(|| symbol.to_string()),
        price: money(price),
        change: signed_money(change),
        change_percent: signed_percent(change_percent),
        volume: thousands(number("06. volume")? as u64),
        high: money(number("03. high")?),
        low: money(number("04. low")?),
        open: money(number("02. open")?),
        previous_close: money(previous_close),
        status: None,
    })
}

pub fn money(value: f64) -> String {
    format!("${:.2}", value)
}

pub fn signed_money(value: f64) -> String {
    if value >= 0.0 {
        format!("+${:.2}", value)
    } else {
        format!("-${:.2}", value.abs())
    }
}

pub fn signed_percent(value: f64) -> String {
    if value >= 0.0 {
        format!("+{:.2}%", value)
    } else {
        format!("{:.2}%", value)
    }
}

/// 1234567 -> "1,234,567"
pub fn thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support;
    use axum::{Json, Router, extract::Query, routing::get};
    use serde_json::json;

    fn provider() -> Router {
        Router::new().route(
            "/query",
            get(|Query(q): Query<HashMap<String, String>>| async move {
                match q.get("symbol").map(String::as_str) {
                    Some("AAPL") => Json(json!({ "Global Quote": {
                        "01. symbol": "AAPL",
                        "02. open": "189.5000",
                        "03. high": "191.0500",
                        "04. low": "188.2000",
                        "05. price": "190.6400",
                        "06. volume": "48123456",
                        "07. latest trading day": "2025-01-10",
                        "08. previous close": "188.1000",
                        "09. change": "2.5400",
                        "10. change percent": "1.3503%"
                    }})),
                    Some("TSLA") => Json(json!({ "Global Quote": {
                        "01. symbol": "TSLA",
                        "02. open": "250.00",
                        "03. high": "252.00",
                        "04. low": "240.00",
                        "05. price": "245.00",
                        "06. volume": "999",
                        "08. previous close": "250.00"
                    }})),
                    Some("LIMIT") => Json(json!({ "Note": "Thank you for using our API" })),
                    _ => Json(json!({ "Global Quote": {} })),
                }
            }),
        )
    }

    async fn executor_for(base: &str, api_key: Option<&str>) -> EquityExecutor {
        EquityExecutor::new(
            &EquityProviderConfig {
                base_url: format!("{}/query", base),
                api_key: api_key.map(str::to_string),
            },
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_quote_is_display_formatted() {
        let base = test_support::serve(provider()).await;
        let quote = executor_for(&base, Some("key"))
            .await
            .fetch("AAPL")
            .await
            .unwrap();

        assert_eq!(quote.symbol, "AAPL");
        assert_eq!(quote.price, "$190.64");
        assert_eq!(quote.change, "+$2.54");
        assert_eq!(quote.change_percent, "+1.35%");
        assert_eq!(quote.volume, "48,123,456");
        assert_eq!(quote.previous_close, "$188.10");
        assert_eq!(quote.status, None);
    }

    #[tokio::test]
    async fn test_missing_change_fields_are_computed() {
        let base = test_support::serve(provider()).await;
        let quote = executor_for(&base, Some("key"))
            .await
            .fetch("TSLA")
            .await
            .unwrap();

        assert_eq!(quote.change, "-$5.00");
        assert_eq!(quote.change_percent, "-2.00%");
        assert_eq!(quote.volume, "999");
    }

    #[tokio::test]
    async fn test_missing_api_key_is_unavailable() {
        let base = test_support::serve(provider()).await;
        let value = executor_for(&base, None).await.execute("AAPL").await;

        assert_eq!(value["status"], "unavailable");
        assert_eq!(value["symbol"], "AAPL");
        for field in ["price", "change", "changePercent", "volume", "high", "low", "open", "previousClose"] {
            assert_eq!(value[field], "unavailable", "{field}");
        }
    }

    #[tokio::test]
    async fn test_rate_limit_notice_is_unavailable() {
        let base = test_support::serve(provider()).await;
        let value = executor_for(&base, Some("key")).await.execute("LIMIT").await;
        assert_eq!(value["status"], "unavailable");
        assert_eq!(value["symbol"], "LIMIT");
    }

    #[tokio::test]
    async fn test_unknown_symbol_is_unavailable() {
        let base = test_support::serve(provider()).await;
        let value = executor_for(&base, Some("key")).await.execute("ZZZZ").await;
        assert_eq!(value["status"], "unavailable");
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(money(3.0), "$3.00");
        assert_eq!(signed_money(0.0), "+$0.00");
        assert_eq!(signed_money(-1.234), "-$1.23");
        assert_eq!(signed_percent(-0.5), "-0.50%");
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(123456), "123,456");
        assert_eq!(thousands(1234567), "1,234,567");
    }
}
