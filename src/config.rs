// Config store: the small JSON document holding the remote URL, the access
// token and the tag vocabulary. It is the only durable state of the tool.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Tag vocabulary used when no config file exists yet.
pub const DEFAULT_TAGS: &[&str] = &[
    "大宗",
    "空盒仓库",
    "MIS多物品分类",
    "MBS多种类潜影盒分类",
    "细雪展示",
    "SIS无实体输入",
    "编码相关",
    "远程大宗",
    "不可堆叠分类",
    "打包机",
    "混杂打包",
    "自适应打包机",
    "地狱门加载器",
    "分盒器",
    "盒子分类",
    "盒子合并",
    "红石合成站",
    "解码器",
    "潜影盒展示",
    "四边形大宗",
    "整流器",
    "仓库成品",
];

/// Persisted configuration. Field names mirror the on-disk keys.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub repo: String,
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            repo: String::new(),
            token: String::new(),
            tags: DEFAULT_TAGS.iter().map(|t| t.to_string()).collect(),
        }
    }
}

impl Config {
    /// Append a tag to the vocabulary. Blank or already present tags are
    /// ignored; returns whether the vocabulary changed.
    pub fn add_tag(&mut self, tag: &str) -> bool {
        let tag = tag.trim();
        if tag.is_empty() || self.tags.iter().any(|t| t == tag) {
            return false;
        }
        self.tags.push(tag.to_string());
        true
    }
}

/// Loads and saves a [`Config`] at a fixed path.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ConfigStore { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the config, falling back to the defaults when the file is
    /// missing.
    pub fn load(&self) -> Result<Config> {
        if !self.path.exists() {
            log::info!("no config at {}, using defaults", self.path.display());
            return Ok(Config::default());
        }
        let data = fs::read_to_string(&self.path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, config: &Config) -> Result<()> {
        let data = serde_json::to_string_pretty(config)?;
        fs::write(&self.path, data)?;
        log::debug!("saved config to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_default_vocabulary() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        let cfg = store.load().unwrap();
        assert_eq!(cfg.repo, "");
        assert_eq!(cfg.token, "");
        assert_eq!(cfg.tags.len(), DEFAULT_TAGS.len());
        assert_eq!(cfg.tags[13], "分盒器");
    }

    #[test]
    fn save_then_load_keeps_tags_in_order_and_unescaped() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path().join("config.json"));
        let cfg = Config {
            repo: "https://github.com/example/schematics".into(),
            token: "ghp_secret".into(),
            tags: vec!["分盒器".into(), "打包机".into()],
        };
        store.save(&cfg).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("分盒器"));
        assert!(raw.contains("\"repo\""));

        assert_eq!(store.load().unwrap(), cfg);
    }

    #[test]
    fn add_tag_ignores_blank_and_duplicates() {
        let mut cfg = Config {
            repo: String::new(),
            token: String::new(),
            tags: vec!["a".into()],
        };
        assert!(!cfg.add_tag("   "));
        assert!(!cfg.add_tag("a"));
        assert!(cfg.add_tag(" b "));
        assert_eq!(cfg.tags, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn partial_document_fills_missing_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"repo": "https://example.com/r.git"}"#).unwrap();
        let cfg = ConfigStore::new(&path).load().unwrap();
        assert_eq!(cfg.repo, "https://example.com/r.git");
        assert!(cfg.token.is_empty());
        assert!(cfg.tags.is_empty());
    }
}
