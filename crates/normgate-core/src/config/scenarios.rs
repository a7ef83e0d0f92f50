//! Scenario registry for the Dify proxy surface.
//!
//! A scenario is a named upstream application with its own credential pair
//! per api-type. Two scenarios are required; both are read from the
//! environment at startup with development defaults.

use normgate_error::UpstreamError;
use serde_json::{json, Value};

use super::{env_or, mask_key};

/// Scenario used by the legacy non-scenario proxy paths.
pub const DEFAULT_SCENARIO: &str = "multilingual_qa";

/// Upstream api-types multiplexed behind one scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiType {
    /// Chat-messages endpoint (streaming capable).
    Chat,
    /// Conversation list endpoint.
    Conversations,
    /// Message history endpoint.
    Messages,
    /// Conversation rename/delete operations (same app as conversations).
    ConversationOps,
}

impl ApiType {
    /// Stable key used in status payloads.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Conversations => "conversations",
            Self::Messages => "messages",
            Self::ConversationOps => "conversation_ops",
        }
    }
}

/// Resolved URL + credential for one `(scenario, api_type)` pair.
#[derive(Debug, Clone)]
pub struct ScenarioApp {
    /// Upstream endpoint URL.
    pub url: String,
    /// Bearer credential.
    pub key: String,
}

#[derive(Debug, Clone)]
struct Scenario {
    key: &'static str,
    name: &'static str,
    description: &'static str,
    chat: ScenarioApp,
    conversations: ScenarioApp,
    messages: ScenarioApp,
}

fn scenario_app(env_prefix: &str, api: &str, default_url: &str, default_key: &str) -> ScenarioApp {
    ScenarioApp {
        url: env_or(&format!("DIFY_{env_prefix}_{api}_URL"), default_url),
        key: env_or(&format!("DIFY_{env_prefix}_{api}_KEY"), default_key),
    }
}

/// Registry of upstream scenarios, read-only after startup.
#[derive(Debug, Clone)]
pub struct ScenarioRegistry {
    scenarios: Vec<Scenario>,
}

impl ScenarioRegistry {
    /// Build the registry from the environment.
    pub fn from_env() -> Self {
        let scenarios = vec![
            Scenario {
                key: "multilingual_qa",
                name: "多语言问答",
                description: "多语言问答页面专用配置",
                chat: scenario_app(
                    "MULTILINGUAL",
                    "CHAT",
                    "http://localhost/v1/chat-messages",
                    "app-multilingual-chat-key",
                ),
                conversations: scenario_app(
                    "MULTILINGUAL",
                    "CONVERSATIONS",
                    "http://localhost/v1/conversations",
                    "app-multilingual-conversations-key",
                ),
                messages: scenario_app(
                    "MULTILINGUAL",
                    "MESSAGES",
                    "http://localhost/v1/messages",
                    "app-multilingual-messages-key",
                ),
            },
            Scenario {
                key: "standard_query",
                name: "标准查询",
                description: "标准查询页面专用配置",
                chat: scenario_app(
                    "STANDARD_QUERY",
                    "CHAT",
                    "http://localhost/v1/chat-messages",
                    "app-standard-query-chat-key",
                ),
                conversations: scenario_app(
                    "STANDARD_QUERY",
                    "CONVERSATIONS",
                    "http://localhost/v1/conversations",
                    "app-standard-query-conversations-key",
                ),
                messages: scenario_app(
                    "STANDARD_QUERY",
                    "MESSAGES",
                    "http://localhost/v1/messages",
                    "app-standard-query-messages-key",
                ),
            },
        ];

        Self { scenarios }
    }

    fn get(&self, scenario: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.key == scenario)
    }

    /// Whether `scenario` is a known key.
    pub fn contains(&self, scenario: &str) -> bool {
        self.get(scenario).is_some()
    }

    /// Known scenario keys, in registration order.
    pub fn keys(&self) -> Vec<&'static str> {
        self.scenarios.iter().map(|s| s.key).collect()
    }

    /// Display name for a scenario, if known.
    pub fn display_name(&self, scenario: &str) -> Option<&'static str> {
        self.get(scenario).map(|s| s.name)
    }

    /// Resolve the credential pair for `(scenario, api_type)`.
    pub fn resolve(&self, scenario: &str, api_type: ApiType) -> Result<ScenarioApp, UpstreamError> {
        let entry = self.get(scenario).ok_or_else(|| UpstreamError::UnknownScenario {
            given: scenario.to_string(),
        })?;
        // Conversation operations reuse the conversations application.
        let app = match api_type {
            ApiType::Chat => &entry.chat,
            ApiType::Conversations | ApiType::ConversationOps => &entry.conversations,
            ApiType::Messages => &entry.messages,
        };
        Ok(app.clone())
    }

    /// Summaries for the `/scenarios` endpoint.
    pub fn summaries(&self) -> Vec<Value> {
        self.scenarios
            .iter()
            .map(|s| {
                json!({
                    "key": s.key,
                    "name": s.name,
                    "description": s.description,
                    "status": self.status(s.key),
                })
            })
            .collect()
    }

    /// Per-api-type configuration status with masked credentials.
    pub fn status(&self, scenario: &str) -> Option<Value> {
        let entry = self.get(scenario)?;
        let mut apis = serde_json::Map::new();
        for api_type in [
            ApiType::Chat,
            ApiType::Conversations,
            ApiType::Messages,
            ApiType::ConversationOps,
        ] {
            let app = match api_type {
                ApiType::Chat => &entry.chat,
                ApiType::Conversations | ApiType::ConversationOps => &entry.conversations,
                ApiType::Messages => &entry.messages,
            };
            apis.insert(
                api_type.as_str().to_string(),
                json!({
                    "api_url": app.url,
                    "api_key_masked": mask_key(&app.key),
                    "is_configured": !app.url.is_empty() && !app.key.is_empty(),
                }),
            );
        }
        Some(json!({
            "scenario": entry.key,
            "name": entry.name,
            "apis": apis,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_scenarios_present() {
        let registry = ScenarioRegistry::from_env();
        assert!(registry.contains("multilingual_qa"));
        assert!(registry.contains("standard_query"));
        assert!(!registry.contains("bogus"));
    }

    #[test]
    fn test_unknown_scenario_is_an_error() {
        let registry = ScenarioRegistry::from_env();
        let err = registry.resolve("bogus", ApiType::Chat).unwrap_err();
        assert!(matches!(err, UpstreamError::UnknownScenario { .. }));
    }

    #[test]
    fn test_conversation_ops_shares_conversations_credentials() {
        let registry = ScenarioRegistry::from_env();
        let ops = registry
            .resolve(DEFAULT_SCENARIO, ApiType::ConversationOps)
            .unwrap();
        let conversations = registry
            .resolve(DEFAULT_SCENARIO, ApiType::Conversations)
            .unwrap();
        assert_eq!(ops.url, conversations.url);
        assert_eq!(ops.key, conversations.key);
    }

    #[test]
    fn test_status_masks_credentials() {
        let registry = ScenarioRegistry::from_env();
        let status = registry.status("standard_query").unwrap();
        let rendered = status.to_string();
        assert!(rendered.contains("api_key_masked"));
        assert!(!rendered.contains("app-standard-query-chat-key"));
    }
}
