use serde::Deserialize;
use std::{env, fs, path::PathBuf, time::Duration};

use anyhow::Context;

pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Runtime settings for the assistant.
///
/// Layered as: built-in defaults, then the optional `reva.json` file, then
/// environment variables (a `.env` file is loaded first if present).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub model_name: String,
    pub temperature: f32,

    pub tavily_api_key: Option<String>,
    pub fred_api_key: Option<String>,

    pub supabase_url: Option<String>,
    pub supabase_service_key: Option<String>,
    pub vector_store_table: String,
    pub vector_store_query: String,
    pub embedding_model: String,

    pub templates_dir: PathBuf,
    pub patterns_dir: PathBuf,

    /// Per-tool wall time during the concurrent fan-out.
    pub tool_timeout_secs: u64,
    pub agent_max_iterations: usize,
    pub agent_max_execution_secs: u64,
    /// Pause between streamed chunks on `/chat`.
    pub stream_chunk_delay_ms: u64,

    /// Messages kept per conversation session (user and assistant each count).
    pub memory_max_messages: usize,
    /// Sessions kept before the least recently used one is dropped.
    pub memory_max_sessions: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model_name: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            tavily_api_key: None,
            fred_api_key: None,
            supabase_url: None,
            supabase_service_key: None,
            vector_store_table: "documents".to_string(),
            vector_store_query: "match_documents".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            templates_dir: PathBuf::from("data/templates/cold_call"),
            patterns_dir: PathBuf::from("data/patterns/objections"),
            tool_timeout_secs: 30,
            agent_max_iterations: 10,
            agent_max_execution_secs: 30,
            stream_chunk_delay_ms: 100,
            memory_max_messages: 20,
            memory_max_sessions: 1000,
        }
    }
}

impl Settings {
    /// Load settings from `.env`, the config file (if any) and the process
    /// environment.
    pub fn load() -> anyhow::Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }

        let mut settings = match resolve_config_path()? {
            Some(path) => {
                tracing::info!("Reading settings from {}", path.display());
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        settings.apply_env_from(|key| env::var(key).ok());
        Ok(settings)
    }

    /// Parse a JSON settings file, expanding `${VAR}` references in string values.
    pub fn from_file(path: &std::path::Path) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let settings: Settings = serde_json::from_str(&raw)
            .with_context(|| format!("Invalid settings file {}", path.display()))?;
        Ok(settings.expanded(|key| env::var(key).ok()))
    }

    /// Override fields from environment-style variables.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        fn parse<T: std::str::FromStr>(key: &str, raw: String) -> Option<T> {
            match raw.trim().parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!("Ignoring invalid value for {}: {}", key, raw);
                    None
                }
            }
        }

        let string = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(v) = string("OPENAI_API_KEY") {
            self.openai_api_key = Some(v);
        }
        if let Some(v) = string("OPENAI_BASE_URL") {
            self.openai_base_url = v;
        }
        if let Some(v) = string("MODEL_NAME") {
            self.model_name = v;
        }
        if let Some(v) = string("TEMPERATURE").and_then(|v| parse("TEMPERATURE", v)) {
            self.temperature = v;
        }
        if let Some(v) = string("TAVILY_API_KEY") {
            self.tavily_api_key = Some(v);
        }
        if let Some(v) = string("FRED_API_KEY") {
            self.fred_api_key = Some(v);
        }
        if let Some(v) = string("SUPABASE_URL") {
            self.supabase_url = Some(v);
        }
        if let Some(v) = string("SUPABASE_SERVICE_KEY") {
            self.supabase_service_key = Some(v);
        }
        if let Some(v) = string("VECTOR_STORE_TABLE") {
            self.vector_store_table = v;
        }
        if let Some(v) = string("VECTOR_STORE_QUERY") {
            self.vector_store_query = v;
        }
        if let Some(v) = string("EMBEDDING_MODEL") {
            self.embedding_model = v;
        }
        if let Some(v) = string("TEMPLATES_DIR") {
            self.templates_dir = PathBuf::from(v);
        }
        if let Some(v) = string("PATTERNS_DIR") {
            self.patterns_dir = PathBuf::from(v);
        }
        if let Some(v) = string("TOOL_TIMEOUT_SECS").and_then(|v| parse("TOOL_TIMEOUT_SECS", v)) {
            self.tool_timeout_secs = v;
        }
        if let Some(v) = string("STREAM_CHUNK_DELAY_MS")
            .and_then(|v| parse("STREAM_CHUNK_DELAY_MS", v))
        {
            self.stream_chunk_delay_ms = v;
        }
        if let Some(v) = string("MEMORY_MAX_MESSAGES")
            .and_then(|v| parse("MEMORY_MAX_MESSAGES", v))
        {
            self.memory_max_messages = v;
        }
        if let Some(v) = string("MEMORY_MAX_SESSIONS")
            .and_then(|v| parse("MEMORY_MAX_SESSIONS", v))
        {
            self.memory_max_sessions = v;
        }
    }

    fn expanded(mut self, lookup: impl Fn(&str) -> Option<String> + Copy) -> Self {
        let expand_opt = |v: &mut Option<String>| {
            if let Some(s) = v.as_mut() {
                *s = expand_env_vars_with(s, lookup);
            }
        };
        expand_opt(&mut self.openai_api_key);
        expand_opt(&mut self.tavily_api_key);
        expand_opt(&mut self.fred_api_key);
        expand_opt(&mut self.supabase_url);
        expand_opt(&mut self.supabase_service_key);
        self.openai_base_url = expand_env_vars_with(&self.openai_base_url, lookup);
        self
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn agent_max_execution(&self) -> Duration {
        Duration::from_secs(self.agent_max_execution_secs)
    }

    pub fn stream_chunk_delay(&self) -> Duration {
        Duration::from_millis(self.stream_chunk_delay_ms)
    }
}

/// Locate the optional settings file.
///
/// `REVA_CONFIG` must point at an existing file when set; the XDG and
/// working-directory locations are only used if they exist.
pub fn resolve_config_path() -> anyhow::Result<Option<PathBuf>> {
    if let Ok(p) = env::var("REVA_CONFIG") {
        let path = PathBuf::from(p);
        if !path.exists() {
            return Err(anyhow::anyhow!(
                "REVA_CONFIG points at {} which does not exist",
                path.display()
            ));
        }
        return Ok(Some(path));
    }

    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        let candidate = PathBuf::from(xdg).join("reva").join("reva.json");
        if candidate.exists() {
            return Ok(Some(candidate));
        }
    }

    let candidate = PathBuf::from("reva.json");
    if candidate.exists() {
        return Ok(Some(candidate));
    }

    Ok(None)
}

/// Replace `${NAME}` with the looked-up value; unknown names are left as-is.
fn expand_env_vars_with(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next(); // consume '{'
            let mut name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                name.push(c);
            }
            match lookup(&name) {
                Some(val) => out.push_str(&val),
                None => {
                    out.push_str("${");
                    out.push_str(&name);
                    out.push('}');
                }
            }
        } else {
            out.push(ch);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_expand_env_vars() {
        let env = vars(&[("KEY", "secret")]);
        let lookup = |k: &str| env.get(k).cloned();

        assert_eq!(expand_env_vars_with("Bearer ${KEY}", lookup), "Bearer secret");
        assert_eq!(expand_env_vars_with("${MISSING}/x", lookup), "${MISSING}/x");
        assert_eq!(expand_env_vars_with("$plain", lookup), "$plain");
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.model_name, DEFAULT_MODEL);
        assert!((settings.temperature - 0.7).abs() < f32::EPSILON);
        assert_eq!(settings.agent_max_iterations, 10);
        assert_eq!(settings.vector_store_query, "match_documents");
        assert_eq!(settings.vector_store_table, "documents");
        assert_eq!(settings.memory_max_messages, 20);
    }

    #[test]
    fn test_env_overrides() {
        let env = vars(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("MODEL_NAME", "gpt-4o"),
            ("TEMPERATURE", "0.2"),
            ("TOOL_TIMEOUT_SECS", "not-a-number"),
            ("TAVILY_API_KEY", ""),
            ("MEMORY_MAX_SESSIONS", "50"),
        ]);
        let mut settings = Settings::default();
        settings.apply_env_from(|k| env.get(k).cloned());

        assert_eq!(settings.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(settings.model_name, "gpt-4o");
        assert!((settings.temperature - 0.2).abs() < f32::EPSILON);
        assert_eq!(settings.tool_timeout_secs, 30);
        assert!(settings.tavily_api_key.is_none());
        assert_eq!(settings.memory_max_sessions, 50);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"model_name": "gpt-4o-mini", "fred_api_key": "${{REVA_TEST_UNSET_VAR}}"}}"#
        )
        .unwrap();

        let settings = Settings::from_file(file.path()).unwrap();
        assert_eq!(settings.model_name, "gpt-4o-mini");
        assert_eq!(settings.fred_api_key.as_deref(), Some("${REVA_TEST_UNSET_VAR}"));
        assert_eq!(settings.vector_store_query, "match_documents");
    }
}
