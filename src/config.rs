// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! User-tunable W-projection parameters.

use std::{fs::File, io::Read, path::Path};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::constants::*;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid W-projection parameter: {0}")]
    Invalid(String),

    #[error("Config file '{0}' doesn't have a recognised file extension! Valid extensions are: toml, json")]
    UnknownFileType(String),

    #[error("Couldn't decode {kind} structure from '{file}':\n{err}")]
    Decode {
        kind: &'static str,
        file: String,
        err: String,
    },

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

/// Parameters that control how convolution functions are made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WProjectionConfig {
    /// The number of W planes. 0 or less means "work it out from the W
    /// statistics".
    pub w_planes: i32,
    /// Images are padded by this factor before gridding. At least 1.
    pub padding: f64,
    /// The oversampling factor of the convolution functions.
    pub oversampling: usize,
    /// Kernel magnitudes (relative to the peak) at or below this are
    /// considered zero when finding supports.
    pub threshold: f64,
    /// Kernel cubes bigger than this \[MB\] cause a warning. Big budgets
    /// also allow bigger kernels when there are many W planes.
    pub memory_budget_mb: usize,
    /// If set, the most convolution functions kept in the cache.
    pub max_cached_kernels: Option<usize>,
}

impl Default for WProjectionConfig {
    fn default() -> Self {
        WProjectionConfig {
            w_planes: 1,
            padding: DEFAULT_PADDING,
            oversampling: DEFAULT_OVERSAMPLING,
            threshold: DEFAULT_SUPPORT_THRESHOLD,
            memory_budget_mb: DEFAULT_MEMORY_BUDGET_MB,
            max_cached_kernels: None,
        }
    }
}

impl WProjectionConfig {
    /// Check that these parameters are usable. Every constructor of
    /// [`crate::WProjectConvFunc`] calls this.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.padding.is_finite() && self.padding >= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "padding must be at least 1 (got {})",
                self.padding
            )));
        }
        if self.oversampling == 0 {
            return Err(ConfigError::Invalid(
                "oversampling must be at least 1".to_string(),
            ));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "threshold must be between 0 and 1 (got {})",
                self.threshold
            )));
        }
        if self.max_cached_kernels == Some(0) {
            return Err(ConfigError::Invalid(
                "max_cached_kernels must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Read parameters from a toml or json file (chosen by the file
    /// extension). Parameters not in the file get their default values.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<WProjectionConfig, ConfigError> {
        let file = file.as_ref();
        debug!("Attempting to parse config file {}", file.display());
        let ext = file
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        let decode_err = |kind, err: String| ConfigError::Decode {
            kind,
            file: file.display().to_string(),
            err,
        };
        let config: WProjectionConfig = match ext.as_deref() {
            Some("toml") => {
                let contents = read_file(file)?;
                toml::from_str(&contents).map_err(|e| decode_err("toml", e.to_string()))?
            }
            Some("json") => {
                let contents = read_file(file)?;
                serde_json::from_str(&contents).map_err(|e| decode_err("json", e.to_string()))?
            }
            _ => return Err(ConfigError::UnknownFileType(file.display().to_string())),
        };
        config.validate()?;
        Ok(config)
    }
}

fn read_file(file: &Path) -> Result<String, ConfigError> {
    let mut contents = String::new();
    File::open(file)?.read_to_string(&mut contents)?;
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_valid() {
        let c = WProjectionConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.oversampling, 4);
        assert_eq!(c.max_cached_kernels, None);
    }

    #[test]
    fn test_invalid() {
        let bad = [
            WProjectionConfig {
                padding: 0.9,
                ..Default::default()
            },
            WProjectionConfig {
                oversampling: 0,
                ..Default::default()
            },
            WProjectionConfig {
                threshold: 0.0,
                ..Default::default()
            },
            WProjectionConfig {
                threshold: f64::NAN,
                ..Default::default()
            },
            WProjectionConfig {
                max_cached_kernels: Some(0),
                ..Default::default()
            },
        ];
        for c in bad {
            assert!(matches!(c.validate(), Err(ConfigError::Invalid(_))), "{c:?}");
        }
    }

    #[test]
    fn test_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "wproj.toml",
            "w_planes = 0\npadding = 1.0\nmax_cached_kernels = 3\n",
        );
        let c = WProjectionConfig::from_file(path).unwrap();
        assert_eq!(c.w_planes, 0);
        assert_eq!(c.padding, 1.0);
        assert_eq!(c.max_cached_kernels, Some(3));
        // Everything else is a default.
        assert_eq!(c.oversampling, DEFAULT_OVERSAMPLING);
        assert_eq!(c.threshold, DEFAULT_SUPPORT_THRESHOLD);
    }

    #[test]
    fn test_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(
            &dir,
            "wproj.JSON",
            r#"{"w_planes": 64, "oversampling": 8, "memory_budget_mb": 1000}"#,
        );
        let c = WProjectionConfig::from_file(path).unwrap();
        assert_eq!(c.w_planes, 64);
        assert_eq!(c.oversampling, 8);
        assert_eq!(c.memory_budget_mb, 1000);
        assert_eq!(c.padding, DEFAULT_PADDING);
    }

    #[test]
    fn test_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir, "wproj.yaml", "w_planes: 3");
        assert!(matches!(
            WProjectionConfig::from_file(path),
            Err(ConfigError::UnknownFileType(_))
        ));

        let path = write_config(&dir, "typo.toml", "w_plane = 3\n");
        assert!(matches!(
            WProjectionConfig::from_file(path),
            Err(ConfigError::Decode { kind: "toml", .. })
        ));

        let path = write_config(&dir, "invalid.json", r#"{"padding": 0.5}"#);
        assert!(matches!(
            WProjectionConfig::from_file(path),
            Err(ConfigError::Invalid(_))
        ));

        assert!(matches!(
            WProjectionConfig::from_file(dir.path().join("missing.toml")),
            Err(ConfigError::Io(_))
        ));
    }
}
