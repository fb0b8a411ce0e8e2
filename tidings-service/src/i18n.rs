use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource};
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};
use unic_langid::LanguageIdentifier;

/// Localized assistant replies backed by Fluent (thread-safe)
pub struct I18n {
    bundles: RwLock<HashMap<String, FluentBundle<FluentResource>>>,
    default_locale: String,
}

impl I18n {
    /// Create a new i18n service with embedded English replies
    pub fn new() -> Self {
        let i18n = Self {
            bundles: RwLock::new(HashMap::new()),
            default_locale: "en".to_string(),
        };

        i18n.load_embedded_en();

        i18n
    }

    /// Add a locale with translations
    pub fn add_locale(&self, locale: &str, content: &str) -> Result<(), String> {
        let lang_id: LanguageIdentifier = locale
            .parse()
            .map_err(|e| format!("Invalid locale '{}': {}", locale, e))?;

        let resource = FluentResource::try_new(content.to_string())
            .map_err(|(_, errors)| format!("Failed to parse Fluent resource: {:?}", errors))?;

        let mut bundle = FluentBundle::new_concurrent(vec![lang_id]);
        // Replies are streamed as plain text; bidi isolation marks would leak into it
        bundle.set_use_isolating(false);
        bundle
            .add_resource(resource)
            .map_err(|errors| format!("Failed to add resource to bundle: {:?}", errors))?;

        let mut bundles = self.bundles.write().unwrap();
        bundles.insert(locale.to_string(), bundle);

        debug!(locale = %locale, "Loaded translations");

        Ok(())
    }

    /// Get a translated message
    pub fn get(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> String {
        // Try requested locale, fall back to default, fall back to key
        self.try_get(locale, key, args)
            .or_else(|| self.try_get(&self.default_locale, key, args))
            .unwrap_or_else(|| key.to_string())
    }

    fn try_get(&self, locale: &str, key: &str, args: Option<&FluentArgs>) -> Option<String> {
        let bundles = self.bundles.read().unwrap();
        let bundle = bundles.get(locale)?;
        let message = bundle.get_message(key)?;
        let pattern = message.value()?;

        let mut errors = vec![];
        let result = bundle.format_pattern(pattern, args, &mut errors);

        if !errors.is_empty() {
            warn!(key = %key, errors = ?errors, "Fluent formatting errors");
        }

        Some(result.to_string())
    }

    /// Get a translated message with arguments
    pub fn format(&self, locale: &str, key: &str, args: &[(&str, &str)]) -> String {
        let mut fluent_args = FluentArgs::new();
        for (k, v) in args {
            fluent_args.set(*k, *v);
        }
        self.get(locale, key, Some(&fluent_args))
    }

    fn load_embedded_en(&self) {
        let en_translations = r#"
# Tidings - English replies

# Tool prefaces
weather-preface = Here's the current weather in { $city }:
weather-correction-preface = Got it! You meant { $city }. Here's the current weather there:
weather-unavailable = I'm having trouble getting the weather for { $city } right now. Please try again in a moment.
motorsport-latest-race-preface = Here are the latest Formula 1 race results:
motorsport-standings-preface = Here are the current F1 driver standings:
motorsport-next-race-preface = Here's the next Formula 1 race information:
motorsport-unavailable = I'm having trouble getting live Formula 1 data right now, so here's a demo snapshot instead. Please try again later.
equity-preface = Here's the stock information for { $symbol }:
equity-unavailable = I'm having trouble getting a quote for { $symbol } right now. Please try again later.

# Small talk
smalltalk-greeting = Hello! I'm your AI assistant. I'm here to help you with various tasks. How can I assist you today?
smalltalk-how-are-you = I'm doing great, thank you for asking! I'm ready to help you with anything you need. What would you like to know about?
smalltalk-good-morning = Good morning! I hope you're having a wonderful day. How can I help you today?
smalltalk-good-afternoon = Good afternoon! How can I assist you today?
smalltalk-good-evening = Good evening! What can I help you with tonight?
smalltalk-thanks = You're very welcome! I'm happy to help. Is there anything else you'd like to know?
smalltalk-farewell = Goodbye! Feel free to come back anytime you need assistance. Have a great day!
smalltalk-help =
    I can help you with:

    - Weather information: ask "What's the weather in [city]?"
    - Formula 1 updates: ask "Next F1 race" or "F1 standings"
    - Stock prices: ask "[SYMBOL] stock price"

    I can also have general conversations. What would you like to explore?
smalltalk-capability = I'm always looking to improve! Right now I'm best at weather, Formula 1 and stock lookups, and every question you ask helps shape what I learn next.
smalltalk-region = I can look up places across America and the rest of the world. Try asking about the weather in New York, Chicago or Los Angeles.
smalltalk-uncertain = No worries if you're not sure! You could check the weather somewhere, see the latest F1 results, or look up a stock like AAPL.
smalltalk-fallback = I'm not quite sure what you're looking for, but I'm here to help! You can ask me about weather, Formula 1, stock prices, or just chat with me about anything. What's on your mind?

# Errors
chat-apology = Sorry, I encountered an error. Please try again.
"#;

        if let Err(e) = self.add_locale("en", en_translations) {
            warn!(error = %e, "Failed to load embedded English translations");
        }
    }
}

impl Default for I18n {
    fn default() -> Self {
        Self::new()
    }
}
