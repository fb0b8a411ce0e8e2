use bytes::Bytes;
use futures::Stream;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, info};

use crate::assistant::{Classifier, Composer, Composition};
use crate::config::ServiceConfig;
use crate::error::{ServiceError, ServiceResult};
use crate::i18n::I18n;
use crate::models::ConversationMessage;
use crate::store::ChatStore;
use crate::tools::ToolExecutors;
use crate::transport::{Cadence, encode};

/// Main service coordinator
pub struct TidingsService {
    pub config: Arc<ServiceConfig>,
    pub store: Arc<dyn ChatStore>,
    pub i18n: Arc<I18n>,
    classifier: Classifier,
    composer: Composer,
    executors: ToolExecutors,
    cadence: Cadence,
}

impl TidingsService {
    /// Create a new service instance around an already opened store
    pub fn new(config: ServiceConfig, store: Arc<dyn ChatStore>) -> ServiceResult<Self> {
        info!(backend = ?store.backend(), "Initializing Tidings service");

        let i18n = Arc::new(I18n::new());
        let executors =
            ToolExecutors::new(&config.providers).map_err(|e| ServiceError::Internal {
                message: format!("Failed to build provider clients: {}", e),
            })?;

        if config.providers.equity.api_key.is_none() {
            info!("No equity API key configured; stock quotes will report unavailable");
        }

        Ok(Self {
            classifier: Classifier::new(&config.assistant),
            composer: Composer::new(i18n.clone(), config.assistant.locale.clone()),
            cadence: Cadence::from_config(&config.assistant),
            executors,
            i18n,
            store,
            config: Arc::new(config),
        })
    }

    /// Decide what to say for the latest message and run the tool it needs.
    ///
    /// The latest utterance is the last message's content; everything before
    /// it is history for correction detection.
    pub async fn respond(&self, messages: &[ConversationMessage]) -> Composition {
        metrics::counter!("tidings_chat_requests_total").increment(1);

        let (latest, history) = match messages.split_last() {
            Some((last, history)) => (last.content.as_str(), history),
            None => ("", messages),
        };

        let classification = self.classifier.classify(history, latest);
        let intent = classification.intent();
        metrics::counter!("tidings_intents_total", "intent" => intent.to_string()).increment(1);

        let invocation = match classification.tool_call() {
            Some(call) => Some(self.executors.execute(&call).await),
            None => None,
        };
        debug!(
            %intent,
            history_len = history.len(),
            tool = ?invocation.as_ref().map(|inv| inv.tool_name),
            "Composed reply"
        );

        self.composer.compose(&classification, invocation)
    }

    /// Encode a composed reply for the wire at the configured pace
    pub fn reply_stream(
        &self,
        composition: Composition,
    ) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
        encode(composition.preface, composition.invocation, self.cadence)
    }

    /// Reply sent when no turn could be produced
    pub fn apology(&self) -> String {
        self.composer.apology()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::offline_service;
    use super::*;
    use crate::models::{ToolInvocation, ToolName};
    use crate::transport::StreamDecoder;
    use futures::StreamExt;
    use serde_json::json;

    #[tokio::test]
    async fn test_small_talk_has_no_tool() {
        let service = offline_service().await;
        let composition = service
            .respond(&[ConversationMessage::user("u1", "hello")])
            .await;
        assert!(composition.invocation.is_none());
        assert!(!composition.preface.is_empty());
    }

    #[tokio::test]
    async fn test_empty_conversation_gets_a_reply() {
        let service = offline_service().await;
        let composition = service.respond(&[]).await;
        assert!(composition.invocation.is_none());
        assert!(!composition.preface.is_empty());
    }

    #[tokio::test]
    async fn test_weather_with_provider_down_reports_unavailable() {
        let service = offline_service().await;
        let composition = service
            .respond(&[ConversationMessage::user("u1", "what's the weather in Tokyo?")])
            .await;

        let invocation = composition.invocation.unwrap();
        assert_eq!(invocation.tool_name, ToolName::GetWeather);
        assert_eq!(invocation.args["location"], "Tokyo");
        assert_eq!(invocation.result["status"], "unavailable");
        assert!(composition.preface.contains("Tokyo"));
    }

    #[tokio::test]
    async fn test_correction_uses_history() {
        let service = offline_service().await;
        let mut earlier = ConversationMessage::assistant("a1", "Here's the current weather:");
        earlier.tool_invocations.push(ToolInvocation {
            tool_name: ToolName::GetWeather,
            args: serde_json::Map::new(),
            result: json!({"city": "Paris"}),
        });

        let composition = service
            .respond(&[
                ConversationMessage::user("u1", "weather in paris"),
                earlier,
                ConversationMessage::user("u2", "no, I meant London"),
            ])
            .await;

        let invocation = composition.invocation.unwrap();
        assert_eq!(invocation.args["location"], "London");
    }

    #[tokio::test]
    async fn test_reply_stream_decodes_to_composition() {
        let service = offline_service().await;
        let composition = service
            .respond(&[ConversationMessage::user("u1", "latest F1 results")])
            .await;
        let expected = composition.clone();

        let mut decoder = StreamDecoder::new();
        let mut decoded = None;
        let mut stream = Box::pin(service.reply_stream(composition));
        while let Some(Ok(chunk)) = stream.next().await {
            if let Some(message) = decoder.push(&chunk) {
                decoded = Some(message);
            }
        }
        let decoded = decoded.or_else(|| decoder.finish()).unwrap();

        assert_eq!(decoded.content, expected.preface.trim());
        assert_eq!(decoded.invocation, expected.invocation);
    }
}
