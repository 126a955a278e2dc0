//! Startup configuration from the process environment.
//!
//! | Variable | Default |
//! |----------|---------|
//! | `PORT` | `8080` |
//! | `MCP_SERVER_URL` | - |
//! | `MCP_SERVER_COMMAND`, `MCP_SERVER_ARGS` | - |
//! | `MCP_ALLOWED_TOOLS`, `MCP_BLOCKED_TOOLS` | empty |
//! | `LLM_PROVIDER` | none |
//! | `LLM_API_KEY` or the vendor variable (`OPENAI_API_KEY`, ...) | - |
//! | `LLM_ENDPOINT`, `LLM_MODEL` | vendor defaults |
//! | `TOOL_TIMEOUT_SECS` | `30` |
//! | `HEALTH_CHECK_INTERVAL_SECS` | `30` |
//! | `HISTORY_WINDOW` | `10` |
//! | `SESSION_IDLE_SECS` | `1800` |
//! | `VOCABULARY_EXTRA` | empty |
//!
//! One MCP server source is required; the URL wins when both are set.
//!
//! `VOCABULARY_EXTRA` adds classifier keywords as `keyword=meaning` pairs
//! separated by commas, where the meaning is an entity (`bed`, `patients`)
//! or an action (`list`, `create`, `update`, `assign`):
//! `cot=bed,admit=create`.

use std::fmt;
use std::str::FromStr;

use crate::chat::synthesizer::DEFAULT_HISTORY_WINDOW;
use crate::chat::vocabulary::{Term, Vocabulary};
use crate::llms::provider_config::{ProviderConfig, ProviderId};
use crate::mcp::config::{MCPServerConfig, MCPServerHTTP, MCPServerStdio};
use crate::mcp::filters::StaticToolFilter;
use crate::server::routes::DEFAULT_SESSION_IDLE_SECS;
use crate::utilities::errors::ConfigError;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u64 = 30;

#[derive(Clone)]
pub struct AppConfig {
    pub port: u16,
    pub mcp_server: MCPServerConfig,
    pub tool_filter: StaticToolFilter,
    /// Provider active at startup; can be switched at runtime.
    pub provider: Option<ProviderConfig>,
    pub tool_timeout_secs: u64,
    pub health_check_interval_secs: u64,
    pub history_window: usize,
    /// Chat sessions idle this long are dropped.
    pub session_idle_secs: u64,
    /// Classifier keywords: the built-in table plus `VOCABULARY_EXTRA`.
    pub vocabulary: Vocabulary,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("port", &self.port)
            .field("mcp_server", &self.mcp_server.server_identifier())
            .field("tool_filter", &self.tool_filter)
            .field("provider", &self.provider)
            .field("tool_timeout_secs", &self.tool_timeout_secs)
            .field("health_check_interval_secs", &self.health_check_interval_secs)
            .field("history_window", &self.history_window)
            .field("session_idle_secs", &self.session_idle_secs)
            .field("vocabulary", &self.vocabulary.len())
            .finish()
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load through `lookup`, which returns a variable's value if set.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mcp_server = match (get("MCP_SERVER_URL"), get("MCP_SERVER_COMMAND")) {
            (Some(url), _) => MCPServerHTTP::new(&url).into(),
            (None, Some(command)) => {
                let args = get("MCP_SERVER_ARGS")
                    .map(|a| a.split_whitespace().map(str::to_string).collect())
                    .unwrap_or_default();
                MCPServerStdio::new(&command).with_args(args).into()
            }
            (None, None) => {
                return Err(ConfigError::Missing(
                    "MCP_SERVER_URL or MCP_SERVER_COMMAND".to_string(),
                ))
            }
        };

        let tool_filter = StaticToolFilter::new(
            get("MCP_ALLOWED_TOOLS").map(|v| split_list(&v)),
            get("MCP_BLOCKED_TOOLS").map(|v| split_list(&v)),
        );

        let provider = match get("LLM_PROVIDER") {
            None => None,
            Some(name) => {
                let id = ProviderId::from_str_opt(&name).ok_or_else(|| ConfigError::InvalidValue {
                    name: "LLM_PROVIDER".to_string(),
                    value: name.clone(),
                })?;
                let api_key = get("LLM_API_KEY")
                    .or_else(|| get(id.api_key_env()))
                    .ok_or_else(|| {
                        ConfigError::Missing(format!("LLM_API_KEY or {}", id.api_key_env()))
                    })?;
                Some(
                    ProviderConfig::new(id, api_key)
                        .with_endpoint(get("LLM_ENDPOINT"))
                        .with_model(get("LLM_MODEL")),
                )
            }
        };

        let tool_timeout_secs = parse_or(&get, "TOOL_TIMEOUT_SECS", DEFAULT_TOOL_TIMEOUT_SECS)?;
        let health_check_interval_secs = parse_or(
            &get,
            "HEALTH_CHECK_INTERVAL_SECS",
            DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
        )?;
        for (name, value) in [
            ("TOOL_TIMEOUT_SECS", tool_timeout_secs),
            ("HEALTH_CHECK_INTERVAL_SECS", health_check_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    name: name.to_string(),
                    value: "0".to_string(),
                });
            }
        }

        let vocabulary = match get("VOCABULARY_EXTRA") {
            Some(extra) => parse_vocabulary(&extra)?,
            None => Vocabulary::default(),
        };

        Ok(Self {
            port: parse_or(&get, "PORT", DEFAULT_PORT)?,
            mcp_server,
            tool_filter,
            provider,
            tool_timeout_secs,
            health_check_interval_secs,
            history_window: parse_or(&get, "HISTORY_WINDOW", DEFAULT_HISTORY_WINDOW)?,
            session_idle_secs: parse_or(&get, "SESSION_IDLE_SECS", DEFAULT_SESSION_IDLE_SECS)?,
            vocabulary,
        })
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_vocabulary(value: &str) -> Result<Vocabulary, ConfigError> {
    split_list(value)
        .iter()
        .try_fold(Vocabulary::default(), |vocabulary, pair| {
            let term = pair
                .split_once('=')
                .map(|(keyword, label)| (keyword.trim(), Term::from_label(label)));
            match term {
                Some((keyword, Some(term))) if !keyword.is_empty() => {
                    Ok(vocabulary.with_entry(keyword, term))
                }
                _ => Err(ConfigError::InvalidValue {
                    name: "VOCABULARY_EXTRA".to_string(),
                    value: pair.clone(),
                }),
            }
        })
}

fn parse_or<T, G>(get: &G, name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value,
        }),
    }
}
