//! Text suggestions with static fallbacks.
//!
//! Suggestions are single-shot prompt → text requests. They have no
//! consistency contract: a failure or an empty answer is replaced by a
//! fixed text for the topic and never reaches the caller as an error.

use crate::error::SuggestionError;
use async_trait::async_trait;
use std::fmt;
use tracing::{debug, warn};

/// A generative text service.
#[async_trait]
pub trait TextSuggestionProvider: Send + Sync {
    async fn request(&self, prompt: &str) -> Result<String, SuggestionError>;
}

/// The features that ask for suggestions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuggestionTopic {
    ClimbAdvice,
    GearRecommendations,
    TrendingInsights,
    NotificationSummary,
    ProfileMotto,
}

impl SuggestionTopic {
    pub const ALL: [SuggestionTopic; 5] = [
        SuggestionTopic::ClimbAdvice,
        SuggestionTopic::GearRecommendations,
        SuggestionTopic::TrendingInsights,
        SuggestionTopic::NotificationSummary,
        SuggestionTopic::ProfileMotto,
    ];

    /// Text shown when the service fails.
    pub const fn fallback(&self) -> &'static str {
        match self {
            SuggestionTopic::ClimbAdvice => {
                "Make sure you are properly acclimatized to altitude and check local weather conditions."
            }
            SuggestionTopic::GearRecommendations => {
                "Standard mountaineering kit: crampons, ice axe, harness, helmet and layered technical clothing."
            }
            SuggestionTopic::TrendingInsights => {
                "Trending: early-season attempts on Denali; growing interest in low-impact climbing ethics; new weather tracking in the Karakoram."
            }
            SuggestionTopic::NotificationSummary => {
                "Weather alert: strong winds expected around Mont Blanc. Stay at lower altitudes today. Remember: the mountain will always be there."
            }
            SuggestionTopic::ProfileMotto => {
                "Pushing limits among the most demanding peaks in the world."
            }
        }
    }
}

impl fmt::Display for SuggestionTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SuggestionTopic::ClimbAdvice => "climb_advice",
            SuggestionTopic::GearRecommendations => "gear_recommendations",
            SuggestionTopic::TrendingInsights => "trending_insights",
            SuggestionTopic::NotificationSummary => "notification_summary",
            SuggestionTopic::ProfileMotto => "profile_motto",
        };
        f.write_str(name)
    }
}

/// Wraps a provider so every request yields text.
pub struct WithFallback<P> {
    provider: P,
}

impl<P: TextSuggestionProvider> WithFallback<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn inner(&self) -> &P {
        &self.provider
    }

    /// Requests a suggestion for `topic`, falling back to the topic's fixed
    /// text on error or on a blank answer.
    pub async fn suggest(&self, topic: SuggestionTopic, prompt: &str) -> String {
        match self.provider.request(prompt).await {
            Ok(text) if !text.trim().is_empty() => {
                debug!("Got {} suggestion ({} bytes)", topic, text.len());
                text
            }
            Ok(_) => {
                warn!("Empty {} suggestion, using fallback", topic);
                topic.fallback().to_string()
            }
            Err(e) => {
                warn!("{} suggestion failed, using fallback: {}", topic, e);
                topic.fallback().to_string()
            }
        }
    }
}
