//! Natural-language prefaces for classified turns.

use std::sync::Arc;

use super::intent::Classification;
use crate::i18n::I18n;
use crate::models::ToolInvocation;
use crate::tools::{self, motorsport::RaceView};
use crate::transport::frame;

/// What the assistant says for one turn
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub preface: String,
    pub invocation: Option<ToolInvocation>,
}

/// Builds prefaces from localized templates
#[derive(Clone)]
pub struct Composer {
    i18n: Arc<I18n>,
    locale: String,
}

impl Composer {
    pub fn new(i18n: Arc<I18n>, locale: impl Into<String>) -> Self {
        Self {
            i18n,
            locale: locale.into(),
        }
    }

    /// Pair a preface with the tool invocation (if any) for this turn
    pub fn compose(
        &self,
        classification: &Classification,
        invocation: Option<ToolInvocation>,
    ) -> Composition {
        let degraded = invocation
            .as_ref()
            .is_some_and(|inv| tools::is_degraded(&inv.result));

        let preface = match classification {
            Classification::Weather { location } if degraded => {
                self.format("weather-unavailable", "city", location)
            }
            Classification::Weather { location } => {
                self.format("weather-preface", "city", location)
            }
            Classification::Correction { location } if degraded => {
                self.format("weather-unavailable", "city", location)
            }
            Classification::Correction { location } => {
                self.format("weather-correction-preface", "city", location)
            }
            Classification::Motorsport(_) if degraded => self.get("motorsport-unavailable"),
            Classification::Motorsport(query) => self.get(match query.view {
                RaceView::LatestRace => "motorsport-latest-race-preface",
                RaceView::Standings => "motorsport-standings-preface",
                RaceView::NextRace => "motorsport-next-race-preface",
            }),
            Classification::Equity { symbol } if degraded => {
                self.format("equity-unavailable", "symbol", symbol)
            }
            Classification::Equity { symbol } => self.format("equity-preface", "symbol", symbol),
            Classification::SmallTalk(topic) => self.get(&format!("smalltalk-{}", topic)),
        };

        Composition {
            preface: frame::strip_delimiter(&preface),
            invocation,
        }
    }

    /// Reply used when the turn cannot be produced at all
    pub fn apology(&self) -> String {
        self.get("chat-apology")
    }

    fn get(&self, key: &str) -> String {
        self.i18n.get(&self.locale, key, None)
    }

    fn format(&self, key: &str, arg: &str, value: &str) -> String {
        self.i18n.format(&self.locale, key, &[(arg, value)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assistant::intent::SmallTalkTopic;
    use crate::models::ToolName;
    use crate::tools::motorsport::MotorsportQuery;
    use serde_json::json;

    fn composer() -> Composer {
        Composer::new(Arc::new(I18n::new()), "en")
    }

    fn invocation(tool_name: ToolName, result: serde_json::Value) -> ToolInvocation {
        ToolInvocation {
            tool_name,
            args: serde_json::Map::new(),
            result,
        }
    }

    #[test]
    fn test_weather_preface_names_city() {
        let composition = composer().compose(
            &Classification::Weather {
                location: "Tokyo".to_string(),
            },
            Some(invocation(ToolName::GetWeather, json!({"city": "Tokyo"}))),
        );
        assert_eq!(composition.preface, "Here's the current weather in Tokyo:");
        assert!(composition.invocation.is_some());
    }

    #[test]
    fn test_unavailable_weather_selects_failure_preface() {
        let composition = composer().compose(
            &Classification::Weather {
                location: "Tokyo".to_string(),
            },
            Some(invocation(
                ToolName::GetWeather,
                json!({"status": "unavailable", "city": "Tokyo"}),
            )),
        );
        assert!(composition.preface.starts_with("I'm having trouble"));
        assert!(composition.preface.contains("Tokyo"));
        assert!(composition.invocation.is_some());
    }

    #[test]
    fn test_correction_acknowledges_city() {
        let composition = composer().compose(
            &Classification::Correction {
                location: "Dehradun".to_string(),
            },
            Some(invocation(ToolName::GetWeather, json!({"city": "Dehradun"}))),
        );
        assert!(composition.preface.starts_with("Got it! You meant Dehradun."));
    }

    #[test]
    fn test_motorsport_demo_data_selects_failure_preface() {
        let classification = Classification::Motorsport(MotorsportQuery {
            view: RaceView::Standings,
            compact: false,
        });
        let live = composer().compose(
            &classification,
            Some(invocation(ToolName::GetF1Results, json!({"source": "live"}))),
        );
        assert_eq!(live.preface, "Here are the current F1 driver standings:");

        let demo = composer().compose(
            &classification,
            Some(invocation(ToolName::GetF1Results, json!({"source": "demo"}))),
        );
        assert!(demo.preface.starts_with("I'm having trouble"));
    }

    #[test]
    fn test_small_talk_has_no_invocation() {
        let composition =
            composer().compose(&Classification::SmallTalk(SmallTalkTopic::HowAreYou), None);
        assert!(composition.preface.starts_with("I'm doing great"));
        assert!(composition.invocation.is_none());
    }

    #[test]
    fn test_every_small_talk_topic_has_a_reply() {
        let topics = [
            SmallTalkTopic::Greeting,
            SmallTalkTopic::HowAreYou,
            SmallTalkTopic::GoodMorning,
            SmallTalkTopic::GoodAfternoon,
            SmallTalkTopic::GoodEvening,
            SmallTalkTopic::Thanks,
            SmallTalkTopic::Farewell,
            SmallTalkTopic::Help,
            SmallTalkTopic::Capability,
            SmallTalkTopic::Region,
            SmallTalkTopic::Uncertain,
            SmallTalkTopic::Fallback,
        ];
        for topic in topics {
            let preface = composer()
                .compose(&Classification::SmallTalk(topic), None)
                .preface;
            assert!(!preface.starts_with("smalltalk-"), "{topic} has no reply");
        }
    }

    #[test]
    fn test_preface_never_carries_delimiter() {
        let composition = composer().compose(
            &Classification::Equity {
                symbol: format!("X{}Y", frame::DELIMITER),
            },
            Some(invocation(ToolName::GetStockPrice, json!({}))),
        );
        assert!(!composition.preface.contains(frame::DELIMITER));
    }
}
