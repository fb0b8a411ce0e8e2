//! Tool executors backed by external data providers.
//!
//! Every executor is infallible from the caller's point of view: provider
//! errors, bad statuses, malformed bodies and timeouts are logged, counted
//! and turned into a well-formed fallback result.

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::config::ProvidersConfig;
use crate::error::format_error_chain;
use crate::models::{ToolInvocation, ToolName};

pub mod equity;
pub mod error;
pub mod motorsport;
pub mod weather;

pub use equity::EquityExecutor;
pub use error::ProviderError;
pub use motorsport::{MotorsportExecutor, MotorsportQuery, RaceView};
pub use weather::WeatherExecutor;

/// A resolved request for one tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    Weather { location: String },
    Motorsport(MotorsportQuery),
    Equity { symbol: String },
}

impl ToolCall {
    pub fn tool_name(&self) -> ToolName {
        match self {
            ToolCall::Weather { .. } => ToolName::GetWeather,
            ToolCall::Motorsport(_) => ToolName::GetF1Results,
            ToolCall::Equity { .. } => ToolName::GetStockPrice,
        }
    }

    /// Arguments as recorded on the invocation
    pub fn args(&self) -> Map<String, Value> {
        let args = match self {
            ToolCall::Weather { location } => json!({ "location": location }),
            ToolCall::Motorsport(query) => {
                json!({ "type": query.view.to_string(), "compact": query.compact })
            }
            ToolCall::Equity { symbol } => json!({ "symbol": symbol }),
        };
        match args {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

/// The three executors, sharing one timeout budget
#[derive(Clone)]
pub struct ToolExecutors {
    weather: WeatherExecutor,
    motorsport: MotorsportExecutor,
    equity: EquityExecutor,
}

impl ToolExecutors {
    pub fn new(config: &ProvidersConfig) -> Result<Self, ProviderError> {
        let timeout = config.timeout();
        Ok(Self {
            weather: WeatherExecutor::new(&config.weather, timeout)?,
            motorsport: MotorsportExecutor::new(&config.motorsport, timeout)?,
            equity: EquityExecutor::new(&config.equity, timeout)?,
        })
    }

    /// Run a tool call to completion; never fails
    pub async fn execute(&self, call: &ToolCall) -> ToolInvocation {
        let result = match call {
            ToolCall::Weather { location } => self.weather.execute(location, None).await,
            ToolCall::Motorsport(query) => self.motorsport.execute(*query).await,
            ToolCall::Equity { symbol } => self.equity.execute(symbol).await,
        };

        ToolInvocation {
            tool_name: call.tool_name(),
            args: call.args(),
            result,
        }
    }
}

/// Whether a tool result is a fallback rather than live provider data
pub fn is_degraded(result: &Value) -> bool {
    result.get("status").and_then(Value::as_str) == Some("unavailable")
        || result.get("source").and_then(Value::as_str) == Some("demo")
}

/// Shared HTTP client construction for provider adapters
pub(crate) fn http_client(timeout: Duration) -> Result<Client, ProviderError> {
    Ok(Client::builder()
        .timeout(timeout)
        .user_agent(concat!("Tidings/", env!("CARGO_PKG_VERSION")))
        .build()?)
}

/// GET a URL and decode its JSON body, mapping non-2xx to `ApiError`
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
) -> Result<T, ProviderError> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(ProviderError::ApiError {
            status: response.status().as_u16(),
            message: response.text().await.unwrap_or_default(),
        });
    }

    Ok(response.json().await?)
}

/// Apply the hard per-call deadline on top of the client's own timeout
pub(crate) async fn with_deadline<T>(
    timeout: Duration,
    call: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    tokio::time::timeout(timeout, call)
        .await
        .unwrap_or(Err(ProviderError::Timeout(timeout)))
}

/// Log and count a provider failure before the caller substitutes its fallback
pub(crate) fn record_fallback(tool: ToolName, subject: &str, error: &ProviderError) {
    warn!(
        tool = %tool,
        subject = %subject,
        error = %format_error_chain(error),
        "Provider call failed, using fallback result"
    );
    metrics::counter!("tidings_tool_fallbacks_total", "tool" => tool.to_string()).increment(1);
}

#[cfg(test)]
pub(crate) mod test_support {
    use axum::Router;
    use tokio::net::TcpListener;

    /// Serve a router on an ephemeral local port, returning its base URL
    pub async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    /// A local URL nothing listens on
    pub async fn dead_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EquityProviderConfig, MotorsportProviderConfig, WeatherProviderConfig};

    #[test]
    fn test_tool_call_args() {
        let call = ToolCall::Weather {
            location: "Tokyo".to_string(),
        };
        assert_eq!(call.tool_name(), ToolName::GetWeather);
        assert_eq!(call.args().get("location"), Some(&json!("Tokyo")));

        let call = ToolCall::Motorsport(MotorsportQuery {
            view: RaceView::LatestRace,
            compact: false,
        });
        assert_eq!(call.args().get("type"), Some(&json!("latest-race")));
    }

    #[test]
    fn test_degraded_markers() {
        assert!(is_degraded(&json!({"status": "unavailable"})));
        assert!(is_degraded(&json!({"source": "demo"})));
        assert!(!is_degraded(&json!({"source": "live", "city": "Tokyo"})));
    }

    #[tokio::test]
    async fn test_all_executors_degrade_when_providers_are_down() {
        let dead = test_support::dead_url().await;
        let config = ProvidersConfig {
            timeout_secs: 2,
            weather: WeatherProviderConfig {
                geocoding_url: format!("{}/search", dead),
                forecast_url: format!("{}/forecast", dead),
            },
            motorsport: MotorsportProviderConfig {
                base_url: dead.clone(),
            },
            equity: EquityProviderConfig {
                base_url: dead.clone(),
                api_key: Some("demo".to_string()),
            },
        };
        let executors = ToolExecutors::new(&config).unwrap();

        let calls = [
            ToolCall::Weather {
                location: "Tokyo".to_string(),
            },
            ToolCall::Motorsport(MotorsportQuery {
                view: RaceView::Standings,
                compact: false,
            }),
            ToolCall::Equity {
                symbol: "AAPL".to_string(),
            },
        ];
        for call in calls {
            let invocation = executors.execute(&call).await;
            assert_eq!(invocation.tool_name, call.tool_name());
            assert!(is_degraded(&invocation.result), "{call:?} was not degraded");
        }
    }

    #[tokio::test]
    async fn test_deadline_turns_slow_calls_into_timeouts() {
        let result: Result<(), ProviderError> = with_deadline(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(matches!(result, Err(ProviderError::Timeout(_))));
    }
}
