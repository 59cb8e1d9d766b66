use std::time::Duration;

use once_cell::sync::Lazy;

use crate::error::ProxyError;

/// Token limits for a client-facing model, keyed by name substring.
#[derive(Debug, Clone, Copy)]
pub struct ModelLimits {
    pub pattern: &'static str,
    pub context_window: u64,
    pub max_input_tokens: u64,
    pub max_output_tokens: u64,
}

/// Built-in limits for the model families this proxy serves. Used only by the
/// truncation override in the response translator: backends that do not signal
/// truncation still get a correct `max_tokens` stop reason when the output
/// count reaches the model's cap.
static MODEL_LIMITS: Lazy<Vec<ModelLimits>> = Lazy::new(|| {
    vec![
        ModelLimits {
            pattern: "claude-3-opus",
            context_window: 200_000,
            max_input_tokens: 195_904,
            max_output_tokens: 4_096,
        },
        ModelLimits {
            pattern: "claude-3-5-sonnet",
            context_window: 200_000,
            max_input_tokens: 191_808,
            max_output_tokens: 8_192,
        },
        ModelLimits {
            pattern: "claude-3-5-haiku",
            context_window: 200_000,
            max_input_tokens: 191_808,
            max_output_tokens: 8_192,
        },
        ModelLimits {
            pattern: "claude-3-7-sonnet",
            context_window: 200_000,
            max_input_tokens: 135_936,
            max_output_tokens: 64_000,
        },
        ModelLimits {
            pattern: "claude-sonnet-4",
            context_window: 200_000,
            max_input_tokens: 135_936,
            max_output_tokens: 64_000,
        },
        ModelLimits {
            pattern: "claude-opus-4",
            context_window: 200_000,
            max_input_tokens: 167_936,
            max_output_tokens: 32_000,
        },
        ModelLimits {
            pattern: "claude-haiku-4",
            context_window: 200_000,
            max_input_tokens: 135_936,
            max_output_tokens: 64_000,
        },
    ]
});

/// Look up limits for a model by substring match.
pub fn model_limits(model: &str) -> Option<&'static ModelLimits> {
    MODEL_LIMITS.iter().find(|l| model.contains(l.pattern))
}

/// Mapping from client-facing model names to backend model names.
///
/// Explicit aliases win; otherwise names containing "opus"/"sonnet" resolve to
/// the big backend model and "haiku" to the small one. Anything else is a
/// client error carrying the allowed list.
#[derive(Debug, Clone)]
pub struct ModelMap {
    pub aliases: Vec<(String, String)>,
    pub big: String,
    pub small: String,
}

impl ModelMap {
    pub fn resolve(&self, model: &str) -> Result<String, ProxyError> {
        if let Some((_, target)) = self.aliases.iter().find(|(from, _)| from == model) {
            return Ok(target.clone());
        }
        if model.contains("opus") || model.contains("sonnet") {
            return Ok(self.big.clone());
        }
        if model.contains("haiku") {
            return Ok(self.small.clone());
        }
        Err(ProxyError::DisallowedModel {
            model: model.to_string(),
            allowed: self.allowed(),
        })
    }

    /// Machine-readable allowed-values list for error responses: explicit
    /// aliases plus the substring classes.
    pub fn allowed(&self) -> Vec<String> {
        let mut allowed: Vec<String> = self.aliases.iter().map(|(from, _)| from.clone()).collect();
        for class in ["*opus*", "*sonnet*", "*haiku*"] {
            allowed.push(class.to_string());
        }
        allowed
    }

    /// Distinct backend model names, used by the startup probe.
    pub fn backend_models(&self) -> Vec<String> {
        let mut models: Vec<String> = self.aliases.iter().map(|(_, to)| to.clone()).collect();
        models.push(self.big.clone());
        models.push(self.small.clone());
        models.sort();
        models.dedup();
        models
    }
}

/// Resolved proxy configuration. Read once at startup; the translation core
/// only consumes it.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Backend base URL, e.g. "https://api.openai.com/v1". Mandatory.
    pub base_url: String,
    /// Upstream credential. Optional: when absent, the inbound bearer is
    /// forwarded instead.
    pub api_key: Option<String>,
    pub bind_addr: String,
    pub models: ModelMap,
    /// Timeout budget for non-streaming upstream calls.
    pub http_timeout: Duration,
    /// Timeout budget for streaming upstream calls (time to headers; the body
    /// may flow much longer).
    pub stream_timeout: Duration,
    /// Bound on the 429 retry loop.
    pub max_retries: u32,
    pub skip_startup_checks: bool,
}

impl ProxyConfig {
    /// Build configuration from environment variables, with a few CLI flag
    /// overrides (`--big-model=`, `--small-model=`, `--bind=`).
    pub fn from_env(args: &[String]) -> anyhow::Result<Self> {
        let base_url = std::env::var("OPENAI_BASE_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .map_err(|_| anyhow::anyhow!("OPENAI_BASE_URL not set (mandatory)"))?;

        let api_key = std::env::var("OPENAI_API_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let big = flag_value(args, "--big-model=")
            .or_else(|| env_string("MSG2RESPONSE_BIG_MODEL"))
            .unwrap_or_else(|| "gpt-4o".to_string());
        let small = flag_value(args, "--small-model=")
            .or_else(|| env_string("MSG2RESPONSE_SMALL_MODEL"))
            .unwrap_or_else(|| "gpt-4o-mini".to_string());

        // MSG2RESPONSE_MODEL_MAP="claude-x=gpt-y,claude-z=gpt-w"
        let aliases = env_string("MSG2RESPONSE_MODEL_MAP")
            .map(|raw| {
                raw.split(',')
                    .filter_map(|pair| {
                        let (from, to) = pair.split_once('=')?;
                        let (from, to) = (from.trim(), to.trim());
                        if from.is_empty() || to.is_empty() {
                            tracing::warn!(pair, "ignoring malformed model-map entry");
                            return None;
                        }
                        Some((from.to_string(), to.to_string()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let bind_addr = flag_value(args, "--bind=")
            .or_else(|| env_string("BIND_ADDR"))
            .unwrap_or_else(|| "0.0.0.0:8089".to_string());

        Ok(Self {
            base_url,
            api_key,
            bind_addr,
            models: ModelMap {
                aliases,
                big,
                small,
            },
            http_timeout: Duration::from_secs(env_u64("MSG2RESPONSE_HTTP_TIMEOUT_SECONDS", 90)),
            stream_timeout: Duration::from_secs(env_u64("MSG2RESPONSE_STREAM_TIMEOUT_SECONDS", 30)),
            max_retries: env_u64("MSG2RESPONSE_MAX_RETRIES", 2) as u32,
            skip_startup_checks: env_truthy("MSG2RESPONSE_SKIP_STARTUP_CHECKS"),
        })
    }

    /// The backend "create response" endpoint.
    pub fn responses_url(&self) -> String {
        format!("{}/responses", self.base_url)
    }
}

fn flag_value(args: &[String], prefix: &str) -> Option<String> {
    args.iter()
        .find_map(|a| a.strip_prefix(prefix))
        .map(|s| s.to_string())
        .filter(|s| !s.is_empty())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_truthy(key: &str) -> bool {
    std::env::var(key)
        .map(|v| {
            let v = v.trim().to_ascii_lowercase();
            v == "1" || v == "true" || v == "yes" || v == "on"
        })
        .unwrap_or(false)
}
