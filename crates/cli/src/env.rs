use crate::error::CliError;
use model::execution::job::JobConfig;
use std::{collections::HashMap, fs, path::Path, path::PathBuf};

pub const STORE_URL_VAR: &str = "REINDEX_STORE_URL";
pub const STATE_DIR_VAR: &str = "REINDEX_STATE_DIR";

/// Environment variables from the process and, optionally, a .env file
#[derive(Debug, Clone, Default)]
pub struct EnvManager {
    vars: HashMap<String, String>,
}

impl EnvManager {
    pub fn new() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Load variables from a .env file; they win over the process environment
    pub fn load_from_file<P: AsRef<Path>>(&mut self, path: P) -> Result<(), CliError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("Failed to read env file {}: {}", path.display(), e))
        })?;

        self.parse_env_content(&content)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.trim().is_empty())
    }

    pub fn store_url(&self) -> Option<&str> {
        self.get(STORE_URL_VAR)
    }

    pub fn state_dir(&self) -> Option<PathBuf> {
        self.get(STATE_DIR_VAR).map(PathBuf::from)
    }

    /// Environment overrides take precedence over the job file.
    pub fn apply(&self, config: &mut JobConfig) {
        if let Some(url) = self.store_url() {
            config.store.url = url.to_string();
        }
        if let Some(dir) = self.state_dir() {
            config.state_dir = Some(dir);
        }
    }

    fn parse_env_content(&mut self, content: &str) -> Result<(), CliError> {
        for (line_num, line) in content.lines().enumerate() {
            let line = line.trim();

            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(CliError::Config(format!(
                    "Invalid env file: malformed line {} (expected KEY=VALUE)",
                    line_num + 1
                )));
            };

            let key = key.trim();
            if key.is_empty() {
                return Err(CliError::Config(format!(
                    "Invalid env file: empty key at line {}",
                    line_num + 1
                )));
            }

            self.vars
                .insert(key.to_string(), Self::unquote_value(value));
        }

        Ok(())
    }

    fn unquote_value(value: &str) -> String {
        let value = value.trim();
        for quote in ['"', '\''] {
            if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
                return value[1..value.len() - 1].to_string();
            }
        }
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> EnvManager {
        EnvManager {
            vars: HashMap::new(),
        }
    }

    #[test]
    fn test_parse_basic_env() {
        let mut env = empty();
        let content = r#"
# Comment
REINDEX_STORE_URL=http://es-prod:9200
REINDEX_STATE_DIR='/var/lib/reindex'
        "#;

        env.parse_env_content(content).unwrap();
        assert_eq!(env.store_url(), Some("http://es-prod:9200"));
        assert_eq!(env.state_dir(), Some(PathBuf::from("/var/lib/reindex")));
    }

    #[test]
    fn test_invalid_env_format() {
        let mut env = empty();
        assert!(env.parse_env_content("INVALID LINE WITHOUT EQUALS").is_err());
        assert!(env.parse_env_content("=value").is_err());
    }

    #[test]
    fn test_overrides_apply_to_job() {
        let mut env = empty();
        env.parse_env_content("REINDEX_STORE_URL=\"http://other:9200\"\nREINDEX_STATE_DIR=")
            .unwrap();
        let mut config = JobConfig::from_json(
            r#"{"source": {"index": "rides"}, "target": "t", "key": {"field": "id"}}"#,
        )
        .unwrap();

        env.apply(&mut config);

        assert_eq!(config.store.url, "http://other:9200");
        assert_eq!(config.state_dir, None);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        fs::write(&path, "REINDEX_STATE_DIR=/tmp/state\n").unwrap();

        let mut env = empty();
        env.load_from_file(&path).unwrap();

        assert_eq!(env.state_dir(), Some(PathBuf::from("/tmp/state")));
        assert!(env.load_from_file(dir.path().join("missing")).is_err());
    }
}
