use std::path::Path;

use estate_gate::GateConfig;
use estate_store::{CollectionMembers, CollectionPolicy};
use estate_types::Amount;
use serde::{Deserialize, Serialize};

/// Errors loading or validating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("cannot render config: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Runtime configuration of the contract layer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Page size used when a list query passes 0.
    pub default_page_size: usize,
    /// Upper bound on any requested page size.
    pub max_page_size: usize,
    pub gate: GateConfig,
    /// Private collection membership overrides.
    pub collections: Vec<CollectionMembers>,
    /// User seeded by `InitLedger`.
    pub bootstrap: BootstrapUser,
}

/// The government account created by `InitLedger`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapUser {
    pub citizen_id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub password_hash: String,
    pub balance: Amount,
}

impl Default for BootstrapUser {
    fn default() -> Self {
        Self {
            citizen_id: "000000000000000000".into(),
            name: "Land Registry Administrator".into(),
            phone: String::new(),
            email: String::new(),
            password_hash: String::new(),
            balance: Amount::new(1_000_000_000_000),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            gate: GateConfig::default(),
            collections: Vec::new(),
            bootstrap: BootstrapUser::default(),
        }
    }
}

impl LedgerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&text)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_page_size == 0 {
            return Err(ConfigError::Invalid("max_page_size must be positive".into()));
        }
        if self.default_page_size == 0 || self.default_page_size > self.max_page_size {
            return Err(ConfigError::Invalid(format!(
                "default_page_size must be between 1 and {}",
                self.max_page_size
            )));
        }
        if self.bootstrap.citizen_id.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "bootstrap.citizen_id must not be empty".into(),
            ));
        }
        Ok(())
    }

    pub fn collection_policy(&self) -> CollectionPolicy {
        CollectionPolicy::new(self.collections.clone())
    }

    /// Clamp a requested page size; 0 selects the default.
    pub fn page_size(&self, requested: usize) -> usize {
        match requested {
            0 => self.default_page_size,
            n => n.min(self.max_page_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use estate_types::{Collection, Organization};

    #[test]
    fn default_config_is_valid() {
        let c = LedgerConfig::default();
        c.validate().unwrap();
        assert_eq!(c.page_size(0), 20);
        assert_eq!(c.page_size(5), 5);
        assert_eq!(c.page_size(10_000), 100);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let c = LedgerConfig::from_toml_str(
            r#"
            default_page_size = 5

            [bootstrap]
            citizen_id = "110101199001011234"
            balance = 500

            [[collections]]
            collection = "RealEstatePrivateCollection"
            members = ["GovernmentMSP", "InvestorMSP"]
            "#,
        )
        .unwrap();
        assert_eq!(c.default_page_size, 5);
        assert_eq!(c.max_page_size, 100);
        assert_eq!(c.bootstrap.balance, Amount::new(500));
        assert_eq!(c.bootstrap.name, "Land Registry Administrator");
        let policy = c.collection_policy();
        assert!(!policy.is_member(Collection::RealEstatePrivate, Organization::Bank));
    }

    #[test]
    fn invalid_page_sizes_are_rejected() {
        let err = LedgerConfig::from_toml_str("default_page_size = 500").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        assert!(LedgerConfig::from_toml_str("max_page_size = 0").is_err());
    }

    #[test]
    fn file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("estate.toml");
        let mut config = LedgerConfig::default();
        config.gate.require_principal = true;
        std::fs::write(&path, config.to_toml_string().unwrap()).unwrap();
        assert_eq!(LedgerConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = LedgerConfig::from_file(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
