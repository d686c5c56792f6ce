use derive_debug::Dbg;
use serde::Deserialize;

use crate::{crawl::CrawlOptions, remote::lark::DEFAULT_BASE_URL, render::RenderOptions};

#[derive(Deserialize, Dbg, Clone)]
#[serde(default)]
pub struct RemoteConfig {
    pub app_id: String,
    #[dbg(skip)]
    pub app_secret: String,
    pub base_url: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_secret: String::new(),
            base_url: DEFAULT_BASE_URL.to_owned(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct OutputConfig {
    pub image_dir: String,
    pub title_as_filename: bool,
    pub use_html_tags: bool,
    pub skip_img_download: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            image_dir: "static".to_owned(),
            title_as_filename: false,
            use_html_tags: false,
            skip_img_download: false,
        }
    }
}

impl OutputConfig {
    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            use_html_tags: self.use_html_tags,
            image_dir: self.image_dir.clone(),
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct CrawlConfig {
    pub concurrency: usize,
    pub fail_fast: bool,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            fail_fast: true,
        }
    }
}

impl From<&CrawlConfig> for CrawlOptions {
    fn from(value: &CrawlConfig) -> Self {
        CrawlOptions {
            concurrency: value.concurrency,
            fail_fast: value.fail_fast,
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub remote: RemoteConfig,
    pub output: OutputConfig,
    pub crawl: CrawlConfig,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("remote.{0} must not be empty")]
    MissingCredential(&'static str),
    #[error("crawl.concurrency must be at least 1")]
    ZeroConcurrency,
    #[error("output.image_dir must be a relative path")]
    AbsoluteImageDir,
}

impl Config {
    pub fn from_yaml(src: &str) -> Result<Self, serde_yaml::Error> {
        if src.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(src)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote.app_id.is_empty() {
            return Err(ConfigError::MissingCredential("app_id"));
        }
        if self.remote.app_secret.is_empty() {
            return Err(ConfigError::MissingCredential("app_secret"));
        }
        if self.crawl.concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }
        if std::path::Path::new(&self.output.image_dir).is_absolute() {
            return Err(ConfigError::AbsoluteImageDir);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigError};

    #[test]
    fn defaults_apply_to_missing_sections() {
        let config = Config::from_yaml("remote: { app_id: cli_a, app_secret: s }").unwrap();
        assert_eq!(config.remote.base_url, "https://open.feishu.cn");
        assert_eq!(config.output.image_dir, "static");
        assert!(!config.output.title_as_filename);
        assert_eq!(config.crawl.concurrency, 10);
        assert!(config.crawl.fail_fast);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn full_document() {
        let config = Config::from_yaml(
            r#"
remote:
  app_id: cli_a
  app_secret: secret
  base_url: https://open.larksuite.com
output:
  image_dir: assets
  title_as_filename: true
  use_html_tags: true
  skip_img_download: true
crawl:
  concurrency: 3
  fail_fast: false
"#,
        )
        .unwrap();
        assert_eq!(config.remote.base_url, "https://open.larksuite.com");
        assert!(config.output.title_as_filename);
        assert!(config.output.skip_img_download);
        let options = config.output.render_options();
        assert!(options.use_html_tags);
        assert_eq!(options.image_dir, "assets");
        assert_eq!(config.crawl.concurrency, 3);
        assert!(!config.crawl.fail_fast);
    }

    #[test]
    fn json_is_accepted() {
        let config =
            Config::from_yaml(r#"{"remote": {"app_id": "a", "app_secret": "b"}}"#).unwrap();
        assert_eq!(config.remote.app_id, "a");
    }

    #[test]
    fn validation() {
        let empty = Config::from_yaml("").unwrap();
        assert_eq!(
            empty.validate(),
            Err(ConfigError::MissingCredential("app_id"))
        );

        let mut config = Config::from_yaml("remote: { app_id: a, app_secret: b }").unwrap();
        config.crawl.concurrency = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroConcurrency));

        config.crawl.concurrency = 1;
        config.output.image_dir = "/tmp/images".into();
        assert_eq!(config.validate(), Err(ConfigError::AbsoluteImageDir));
    }

    #[test]
    fn secrets_are_not_printed() {
        let config = Config::from_yaml("remote: { app_id: a, app_secret: hunter2 }").unwrap();
        assert!(!format!("{:?}", config.remote).contains("hunter2"));
    }
}
