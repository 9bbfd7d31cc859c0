use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use cfebill_ocr::{Normalizer, TesseractCli, DEFAULT_MAX_DIMENSION};

/// Runtime settings. Every key is optional in the TOML file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub tesseract_path: PathBuf,
    pub language: String,
    pub pdftoppm_path: PathBuf,
    pub timeout_secs: u64,
    pub max_dimension: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            tesseract_path: PathBuf::from("tesseract"),
            language: "spa".to_string(),
            pdftoppm_path: PathBuf::from("pdftoppm"),
            timeout_secs: 30,
            max_dimension: DEFAULT_MAX_DIMENSION,
        }
    }
}

impl AppConfig {
    /// Load from `explicit` (must exist), else the platform config file if
    /// present, else defaults. Environment overrides are applied last.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match explicit {
            Some(path) => Self::from_file(path)?,
            None => match default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_toml(&raw)
            .with_context(|| format!("parsing config {}", path.display()))?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(path) = lookup("CFEBILL_TESSERACT") {
            self.tesseract_path = PathBuf::from(path);
        }
        if let Some(lang) = lookup("CFEBILL_LANG") {
            self.language = lang;
        }
        if let Some(secs) = lookup("CFEBILL_TIMEOUT_SECS") {
            self.timeout_secs = secs
                .trim()
                .parse()
                .with_context(|| format!("CFEBILL_TIMEOUT_SECS is not a number: '{secs}'"))?;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn recognizer(&self) -> TesseractCli {
        TesseractCli::new(&self.tesseract_path, &self.language)
    }

    pub fn normalizer(&self) -> Normalizer {
        Normalizer::new(&self.pdftoppm_path, self.max_dimension)
    }
}

fn default_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("mx", "cfebill", "cfebill")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_toml_gives_defaults() {
        assert_eq!(AppConfig::from_toml("").unwrap(), AppConfig::default());
    }

    #[test]
    fn partial_toml_keeps_other_defaults() {
        let c = AppConfig::from_toml("language = \"spa+eng\"\ntimeout_secs = 10\n").unwrap();
        assert_eq!(c.language, "spa+eng");
        assert_eq!(c.timeout(), Duration::from_secs(10));
        assert_eq!(c.tesseract_path, PathBuf::from("tesseract"));
    }

    #[test]
    fn unknown_types_are_rejected() {
        assert!(AppConfig::from_toml("timeout_secs = \"soon\"").is_err());
    }

    #[test]
    fn env_overrides_file_values() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("CFEBILL_TESSERACT", "/opt/tesseract/bin/tesseract"),
            ("CFEBILL_TIMEOUT_SECS", " 45 "),
        ]);
        let mut c = AppConfig::default();
        c.apply_env(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(c.tesseract_path, PathBuf::from("/opt/tesseract/bin/tesseract"));
        assert_eq!(c.timeout_secs, 45);
        assert_eq!(c.language, "spa");
    }

    #[test]
    fn bad_timeout_env_is_an_error() {
        let mut c = AppConfig::default();
        assert!(c.apply_env(|k| (k == "CFEBILL_TIMEOUT_SECS").then(|| "abc".into())).is_err());
    }

    #[test]
    fn zero_timeout_is_clamped() {
        let c = AppConfig { timeout_secs: 0, ..AppConfig::default() };
        assert_eq!(c.timeout(), Duration::from_secs(1));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn explicit_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_dimension = 2000\n").unwrap();
        assert_eq!(AppConfig::from_file(&path).unwrap().max_dimension, 2000);
    }
}
