//! Application configuration stored in `aidi.toml`.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::profile::OrchestrationProfile;
use crate::core::router::FallbackPolicy;
use crate::error::ConfigurationError;
use crate::io::completion::StructuredMode;
use crate::io::translation_data::PromptComponent;

pub const DEFAULT_CONFIG_PATH: &str = "aidi.toml";
pub const OPENAI_SERVICE: &str = "OpenAI";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";
/// Run artifacts (transcripts, response cache) live under this directory.
pub const STATE_DIR: &str = ".aidi";

/// Application configuration (TOML).
///
/// Every table is optional; missing fields fall back to the defaults below.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    /// Key into `services` selecting the completion backend.
    pub active_service: String,
    pub services: BTreeMap<String, ServiceConfig>,
    pub logging: LoggingConfig,
    pub group_chat: GroupChatConfig,
    pub code: CodeConfig,
    pub data: DataConfig,
    pub prompt: PromptConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServiceConfig {
    pub selected_model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub structured_mode: Option<StructuredMode>,
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Optional plain-text log file in addition to stderr.
    pub log_file: Option<PathBuf>,
}

/// Whether the Admin consults a human before replying.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminInput {
    #[default]
    Never,
    Always,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GroupChatConfig {
    pub max_round: u32,
    pub structured_output: bool,
    pub validation_by_tool: bool,
    pub cache_chat: bool,
    pub send_introductions: bool,
    pub admin_input: AdminInput,
    pub fallback: FallbackPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CodeConfig {
    /// Folder the Executor writes and runs generated programs in.
    pub code_folder: PathBuf,
    /// Hard wall-clock limit per code execution.
    pub timeout_secs: u64,
    /// Interpreter used for python blocks and offline program runs.
    pub python: String,
    /// Truncate captured stdout/stderr beyond this many bytes.
    pub output_limit_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DataConfig {
    pub data_folder: PathBuf,
}

/// Prompt selection plus optional overrides of the bundled templates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PromptConfig {
    pub prompt_components: Vec<PromptComponent>,
    pub prompt_template: Option<String>,
    pub planner_system_message: Option<String>,
    pub coder_system_message: Option<String>,
    pub validator_system_message: Option<String>,
    pub tool_validator_system_message: Option<String>,
    pub tool_runner_system_message: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            active_service: OPENAI_SERVICE.to_string(),
            services: BTreeMap::new(),
            logging: LoggingConfig::default(),
            group_chat: GroupChatConfig::default(),
            code: CodeConfig::default(),
            data: DataConfig::default(),
            prompt: PromptConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Default for GroupChatConfig {
    fn default() -> Self {
        Self {
            max_round: 20,
            structured_output: true,
            validation_by_tool: false,
            cache_chat: false,
            send_introductions: false,
            admin_input: AdminInput::Never,
            fallback: FallbackPolicy::RoundRobin,
        }
    }
}

impl Default for CodeConfig {
    fn default() -> Self {
        Self {
            code_folder: PathBuf::from("translation_folder"),
            timeout_secs: 60,
            python: "python3".to_string(),
            output_limit_bytes: 100_000,
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_folder: PathBuf::from("data"),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            prompt_components: vec![
                PromptComponent::Sd,
                PromptComponent::Sds1,
                PromptComponent::Tds1,
                PromptComponent::Sds2,
                PromptComponent::Tds2,
                PromptComponent::Ts,
            ],
            prompt_template: None,
            planner_system_message: None,
            coder_system_message: None,
            validator_system_message: None,
            tool_validator_system_message: None,
            tool_runner_system_message: None,
        }
    }
}

/// Connection settings for the active completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedService {
    pub name: String,
    pub model: String,
    pub api_key: Option<String>,
    pub base_url: String,
    pub structured_mode: StructuredMode,
    pub request_timeout_secs: u64,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |msg: &str| Err(ConfigurationError::Invalid(msg.to_string()));
        if self.active_service.trim().is_empty() {
            return invalid("active_service must not be empty");
        }
        if self.group_chat.max_round == 0 {
            return invalid("group_chat.max_round must be > 0");
        }
        if self.code.timeout_secs == 0 {
            return invalid("code.timeout_secs must be > 0");
        }
        if self.code.output_limit_bytes == 0 {
            return invalid("code.output_limit_bytes must be > 0");
        }
        if self.code.code_folder.as_os_str().is_empty() {
            return invalid("code.code_folder must not be empty");
        }
        if self.code.python.trim().is_empty() {
            return invalid("code.python must not be empty");
        }
        Ok(())
    }

    pub fn profile(&self) -> OrchestrationProfile {
        OrchestrationProfile::from_flags(
            self.group_chat.structured_output,
            self.group_chat.validation_by_tool,
        )
    }

    /// Resolve the active service, reading credentials from the process
    /// environment when the config has none.
    pub fn resolve_service(&self) -> Result<ResolvedService, ConfigurationError> {
        self.resolve_service_with(|key| std::env::var(key).ok())
    }

    pub fn resolve_service_with(
        &self,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ResolvedService, ConfigurationError> {
        let name = self.active_service.clone();
        let service = self
            .services
            .get(&name)
            .ok_or_else(|| ConfigurationError::UnsupportedService(name.clone()))?;
        let is_openai = name == OPENAI_SERVICE;

        let model = service
            .selected_model
            .clone()
            .filter(|model| !model.trim().is_empty())
            .ok_or_else(|| ConfigurationError::MissingField {
                service: name.clone(),
                field: "selected_model".to_string(),
            })?;

        let api_key = service
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .or_else(|| if is_openai { env(OPENAI_API_KEY_ENV) } else { None });
        if is_openai && api_key.is_none() {
            return Err(ConfigurationError::MissingCredential {
                service: name,
                env_var: OPENAI_API_KEY_ENV.to_string(),
            });
        }

        let base_url = match (&service.base_url, is_openai) {
            (Some(url), _) => url.trim_end_matches('/').to_string(),
            (None, true) => OPENAI_BASE_URL.to_string(),
            (None, false) => {
                return Err(ConfigurationError::MissingField {
                    service: name,
                    field: "base_url".to_string(),
                });
            }
        };

        let structured_mode = service.structured_mode.unwrap_or(if is_openai {
            StructuredMode::Native
        } else {
            StructuredMode::Json
        });

        Ok(ResolvedService {
            name,
            model,
            api_key,
            base_url,
            structured_mode,
            request_timeout_secs: service.request_timeout_secs.unwrap_or(120),
        })
    }

    /// Create the code folder if it does not exist yet.
    pub fn ensure_code_folder(&self) -> Result<()> {
        fs::create_dir_all(&self.code.code_folder)
            .with_context(|| format!("create code folder {}", self.code.code_folder.display()))
    }

    pub fn state_dir(&self) -> PathBuf {
        PathBuf::from(STATE_DIR)
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.state_dir().join("cache")
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AppConfig::default()`.
pub fn load_config(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config file missing, using defaults");
        let cfg = AppConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AppConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn load_missing_returns_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let cfg = load_config(&temp.path().join("missing.toml")).expect("load");
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.profile(), OrchestrationProfile::Structured);
    }

    #[test]
    fn parses_full_layout() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("aidi.toml");
        fs::write(
            &path,
            r#"
active_service = "ollama"

[services.ollama]
selected_model = "llama3.1"
base_url = "http://localhost:11434/v1/"

[group_chat]
max_round = 12
structured_output = false
validation_by_tool = true
admin_input = "always"

[code]
code_folder = "out"
timeout_secs = 5

[prompt]
prompt_components = ["sd", "ts"]
"#,
        )
        .expect("write");

        let cfg = load_config(&path).expect("load");
        assert_eq!(cfg.group_chat.max_round, 12);
        assert_eq!(cfg.group_chat.admin_input, AdminInput::Always);
        assert_eq!(cfg.profile(), OrchestrationProfile::ToolValidated);
        assert_eq!(cfg.code.python, "python3");
        assert_eq!(
            cfg.prompt.prompt_components,
            vec![PromptComponent::Sd, PromptComponent::Ts]
        );

        let service = cfg.resolve_service_with(no_env).expect("resolve");
        assert_eq!(service.base_url, "http://localhost:11434/v1");
        assert_eq!(service.structured_mode, StructuredMode::Json);
        assert_eq!(service.api_key, None);
    }

    #[test]
    fn unknown_service_is_rejected() {
        let cfg = AppConfig {
            active_service: "mistral".to_string(),
            ..AppConfig::default()
        };
        assert_eq!(
            cfg.resolve_service_with(no_env),
            Err(ConfigurationError::UnsupportedService("mistral".to_string()))
        );
    }

    #[test]
    fn openai_requires_a_credential() {
        let mut cfg = AppConfig::default();
        cfg.services.insert(
            OPENAI_SERVICE.to_string(),
            ServiceConfig {
                selected_model: Some("gpt-4o".to_string()),
                ..ServiceConfig::default()
            },
        );
        assert!(matches!(
            cfg.resolve_service_with(no_env),
            Err(ConfigurationError::MissingCredential { .. })
        ));

        let service = cfg
            .resolve_service_with(|key| (key == OPENAI_API_KEY_ENV).then(|| "sk-test".to_string()))
            .expect("resolve");
        assert_eq!(service.api_key.as_deref(), Some("sk-test"));
        assert_eq!(service.base_url, OPENAI_BASE_URL);
        assert_eq!(service.structured_mode, StructuredMode::Native);
    }

    #[test]
    fn zero_round_limit_is_invalid() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("aidi.toml");
        fs::write(&path, "[group_chat]\nmax_round = 0\n").expect("write");
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("max_round"));
    }

    #[test]
    fn unknown_prompt_component_fails_to_parse() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("aidi.toml");
        fs::write(&path, "[prompt]\nprompt_components = [\"xx\"]\n").expect("write");
        assert!(load_config(&path).is_err());
    }
}
