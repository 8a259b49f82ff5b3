use crate::domain::ports::{ConfigProvider, Credentials};
use crate::utils::error::{PatrolError, Result};
use crate::utils::validation::{
    validate_path, validate_positive_number, validate_range, validate_url, Validate,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_SEARCH_ENDPOINT: &str =
    "https://app.rakuten.co.jp/services/api/IchibaItem/Search/20170706";
pub const DEFAULT_CLASSIFIER_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-preview-09-2025";
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 3;
pub const DEFAULT_BATCH_LIMIT: usize = 50;
pub const DEFAULT_HISTORY_PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatrolConfig {
    #[serde(default)]
    pub credentials: CredentialsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CredentialsConfig {
    pub marketplace_app_id: Option<String>,
    pub ai_api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub endpoint: String,
    pub hits_per_page: Option<u32>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
            hits_per_page: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub endpoint: String,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_CLASSIFIER_ENDPOINT.to_string(),
            model: None,
            timeout_seconds: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    pub concurrency_limit: Option<usize>,
    pub batch_limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub path: String,
    pub history_page_size: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "./patrol-data".to_string(),
            history_page_size: None,
        }
    }
}

impl PatrolConfig {
    /// 從 TOML 檔案載入配置，檔案不存在時使用預設值
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!("Config file {} not found, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(PatrolError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| PatrolError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GEMINI_API_KEY})，找不到的保留原文
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| PatrolError::ConfigurationError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validate_url("search.endpoint", &self.search.endpoint)?;
        validate_url("classifier.endpoint", &self.classifier.endpoint)?;
        validate_path("store.path", &self.store.path)?;

        if let Some(hits) = self.search.hits_per_page {
            validate_range("search.hits_per_page", hits, 1, 30)?;
        }
        if let Some(limit) = self.scan.concurrency_limit {
            validate_range("scan.concurrency_limit", limit, 1, 16)?;
        }
        if let Some(batch) = self.scan.batch_limit {
            validate_positive_number("scan.batch_limit", batch, 1)?;
        }
        if let Some(page_size) = self.store.history_page_size {
            validate_positive_number("store.history_page_size", page_size, 1)?;
        }
        if let Some(timeout) = self.classifier.timeout_seconds {
            validate_range("classifier.timeout_seconds", timeout, 1, 600)?;
        }

        Ok(())
    }

    /// 以命令列參數覆蓋檔案中的憑證
    pub fn credentials(&self, app_id: Option<&str>, api_key: Option<&str>) -> Credentials {
        let pick = |flag: Option<&str>, file: &Option<String>| {
            flag.map(str::to_string)
                .or_else(|| file.clone())
                .filter(|v| !v.starts_with("${"))
                .unwrap_or_default()
        };
        Credentials {
            marketplace_app_id: pick(app_id, &self.credentials.marketplace_app_id),
            ai_api_key: pick(api_key, &self.credentials.ai_api_key),
        }
    }

    pub fn hits_per_page(&self) -> u32 {
        self.search.hits_per_page.unwrap_or(30)
    }

    pub fn model(&self) -> &str {
        self.classifier.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn classifier_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.classifier.timeout_seconds.unwrap_or(60))
    }
}

impl ConfigProvider for PatrolConfig {
    fn search_endpoint(&self) -> &str {
        &self.search.endpoint
    }

    fn classifier_endpoint(&self) -> &str {
        &self.classifier.endpoint
    }

    fn store_path(&self) -> &str {
        &self.store.path
    }

    fn concurrency_limit(&self) -> usize {
        self.scan.concurrency_limit.unwrap_or(DEFAULT_CONCURRENCY_LIMIT)
    }

    fn batch_limit(&self) -> usize {
        self.scan.batch_limit.unwrap_or(DEFAULT_BATCH_LIMIT)
    }

    fn history_page_size(&self) -> usize {
        self.store
            .history_page_size
            .unwrap_or(DEFAULT_HISTORY_PAGE_SIZE)
    }
}

impl Validate for PatrolConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_full_config() {
        let toml_content = r#"
[credentials]
marketplace_app_id = "app-123"
ai_api_key = "key-456"

[search]
endpoint = "https://search.example.com/items"
hits_per_page = 20

[classifier]
endpoint = "https://ai.example.com/v1beta"
model = "test-model"
timeout_seconds = 15

[scan]
concurrency_limit = 2
batch_limit = 10

[store]
path = "./data"
history_page_size = 5
"#;

        let config = PatrolConfig::from_toml_str(toml_content).unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.search_endpoint(), "https://search.example.com/items");
        assert_eq!(config.hits_per_page(), 20);
        assert_eq!(config.model(), "test-model");
        assert_eq!(config.concurrency_limit(), 2);
        assert_eq!(config.batch_limit(), 10);
        assert_eq!(config.history_page_size(), 5);

        let creds = config.credentials(None, None);
        assert_eq!(creds.marketplace_app_id, "app-123");
        assert_eq!(creds.ai_api_key, "key-456");
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = PatrolConfig::from_toml_str("").unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.search_endpoint(), DEFAULT_SEARCH_ENDPOINT);
        assert_eq!(config.concurrency_limit(), 3);
        assert_eq!(config.batch_limit(), 50);
        assert_eq!(config.history_page_size(), 20);
        assert_eq!(config.credentials(None, None), Credentials::default());
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("PATROL_TEST_AI_KEY", "from-env");

        let toml_content = r#"
[credentials]
ai_api_key = "${PATROL_TEST_AI_KEY}"
marketplace_app_id = "${PATROL_TEST_UNSET_VAR}"
"#;

        let config = PatrolConfig::from_toml_str(toml_content).unwrap();
        let creds = config.credentials(None, None);
        assert_eq!(creds.ai_api_key, "from-env");
        // 未設定的變數不當成憑證
        assert_eq!(creds.marketplace_app_id, "");

        std::env::remove_var("PATROL_TEST_AI_KEY");
    }

    #[test]
    fn test_cli_overrides_credentials() {
        let config = PatrolConfig::from_toml_str(
            r#"
[credentials]
marketplace_app_id = "file-app"
"#,
        )
        .unwrap();

        let creds = config.credentials(Some("flag-app"), Some("flag-key"));
        assert_eq!(creds.marketplace_app_id, "flag-app");
        assert_eq!(creds.ai_api_key, "flag-key");
    }

    #[test]
    fn test_config_validation() {
        let config = PatrolConfig::from_toml_str(
            r#"
[scan]
concurrency_limit = 0
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());

        let config = PatrolConfig::from_toml_str(
            r#"
[search]
endpoint = "invalid-url"
"#,
        )
        .unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[store]\npath = \"./from-file\"\n")
            .unwrap();

        let config = PatrolConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.store_path(), "./from-file");
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = PatrolConfig::from_file(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.store_path(), "./patrol-data");
    }
}
