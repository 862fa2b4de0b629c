//! # Topic Router
//!
//! Maps an event type to its transport topic by prefix rule.
//!
//! Rules are checked in a fixed order and the first match wins; anything
//! unmatched falls through to `system-topic`. Keeping the order explicit is
//! what makes routing deterministic and testable:
//!
//! | Order | Rule | Topic |
//! |-------|------|-------|
//! | 1 | `user_` | `user-topic` |
//! | 2 | `content_` | `content-topic` |
//! | 3 | `payment_`, `payout_` | `payment-topic` |
//! | 4 | platform-name substring | `platform-topic` |
//! | 5 | `system_`, `health_` | `system-topic` |
//! | 6 | `analytics_` | `analytics-topic` |
//! | 7 | (fallback) | `system-topic` |

/// Topic receiving user lifecycle events.
pub const USER_TOPIC: &str = "user-topic";
/// Topic receiving content lifecycle events.
pub const CONTENT_TOPIC: &str = "content-topic";
/// Topic receiving payment and payout events.
pub const PAYMENT_TOPIC: &str = "payment-topic";
/// Topic receiving platform-brand events.
pub const PLATFORM_TOPIC: &str = "platform-topic";
/// Topic receiving system and health events, and the routing fallback.
pub const SYSTEM_TOPIC: &str = "system-topic";
/// Topic receiving analytics events.
pub const ANALYTICS_TOPIC: &str = "analytics-topic";

/// Platform brand names recognized by rule 4 when none are configured.
pub const DEFAULT_PLATFORM_KEYWORDS: &[&str] = &["creatorhub", "fanhub", "platform"];

/// All topics the router can produce, in rule order.
pub const ALL_TOPICS: &[&str] = &[
    USER_TOPIC,
    CONTENT_TOPIC,
    PAYMENT_TOPIC,
    PLATFORM_TOPIC,
    SYSTEM_TOPIC,
    ANALYTICS_TOPIC,
];

/// Deterministic event-type to topic mapping.
#[derive(Debug, Clone)]
pub struct TopicRouter {
    /// Substrings routed to [`PLATFORM_TOPIC`] by rule 4.
    platform_keywords: Vec<String>,
}

impl TopicRouter {
    /// Router with the default platform keyword list.
    #[must_use]
    pub fn new() -> Self {
        Self::with_platform_keywords(
            DEFAULT_PLATFORM_KEYWORDS
                .iter()
                .map(|k| (*k).to_string())
                .collect(),
        )
    }

    /// Router recognizing a deployment-specific platform keyword list.
    #[must_use]
    pub fn with_platform_keywords(platform_keywords: Vec<String>) -> Self {
        Self { platform_keywords }
    }

    /// Resolve the transport topic for an event type.
    #[must_use]
    pub fn route_for(&self, event_type: &str) -> &'static str {
        if event_type.starts_with("user_") {
            return USER_TOPIC;
        }
        if event_type.starts_with("content_") {
            return CONTENT_TOPIC;
        }
        if event_type.starts_with("payment_") || event_type.starts_with("payout_") {
            return PAYMENT_TOPIC;
        }
        if self
            .platform_keywords
            .iter()
            .any(|keyword| event_type.contains(keyword.as_str()))
        {
            return PLATFORM_TOPIC;
        }
        if event_type.starts_with("system_") || event_type.starts_with("health_") {
            return SYSTEM_TOPIC;
        }
        if event_type.starts_with("analytics_") {
            return ANALYTICS_TOPIC;
        }
        SYSTEM_TOPIC
    }
}

impl Default for TopicRouter {
    fn default() -> Self {
        Self::new()
    }
}
