//! Configuration file loading for coderun
//!
//! Handles loading and parsing configuration files using the config crate.

use std::path::Path;

use config::{Config as ConfigBuilder, File, FileFormat};

use crate::config::{Config, ConfigError, MAX_SECONDS, SourceNaming};

impl Config {
    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::ReadFile {
                path: path.to_path_buf(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }

        let config = ConfigBuilder::builder()
            .add_source(File::from(path))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self, ConfigError> {
        let config = ConfigBuilder::builder()
            .add_source(File::from_str(content, FileFormat::Toml))
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Loading validates automatically; call this again after changing
    /// fields programmatically.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (key, value) in [
            ("deadline", self.deadline),
            ("kill_grace", self.kill_grace),
            ("probe_timeout", self.probe_timeout),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be a positive number of seconds"
                )));
            }
            if value > MAX_SECONDS {
                return Err(ConfigError::Invalid(format!(
                    "{key} must be at most {MAX_SECONDS} seconds"
                )));
            }
        }

        if self.max_output == 0 {
            return Err(ConfigError::Invalid(
                "max_output must be at least 1 byte".to_owned(),
            ));
        }

        if self.max_concurrent_jobs == Some(0) {
            return Err(ConfigError::Invalid(
                "max_concurrent_jobs must be at least 1".to_owned(),
            ));
        }

        for (id, lang) in &self.languages {
            if lang.name.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty name"
                )));
            }
            if lang.extension.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty extension"
                )));
            }
            if lang.run.command.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty run command"
                )));
            }
            if let Some(ref compile) = lang.compile {
                if compile.command.is_empty() {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has empty compile command"
                    )));
                }
                if compile.output_name.is_empty() || compile.output_name.contains('/') {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has invalid compile output name"
                    )));
                }
            } else if lang.is_named_class() {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' derives its file name from a public type but has no compile step"
                )));
            }
            match &lang.naming {
                SourceNaming::Fixed { stem } if stem.is_empty() || stem.contains('/') => {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has invalid source file stem"
                    )));
                }
                SourceNaming::PublicType { fallback } if fallback.is_empty() => {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' has empty fallback type name"
                    )));
                }
                _ => {}
            }
            match &lang.instrument {
                Some(instrument) => {
                    if instrument.file.is_empty() || instrument.file.contains('/') {
                        return Err(ConfigError::Invalid(format!(
                            "language '{id}' has invalid instrument file name"
                        )));
                    }
                    if let SourceNaming::Fixed { stem } = &lang.naming
                        && instrument.file == format!("{stem}.{}", lang.extension)
                    {
                        return Err(ConfigError::Invalid(format!(
                            "language '{id}' instrument file would overwrite the source file"
                        )));
                    }
                    if !lang.uses_driver() {
                        return Err(ConfigError::Invalid(format!(
                            "language '{id}' has an instrument but no command uses {{driver}}"
                        )));
                    }
                }
                None if lang.uses_driver() => {
                    return Err(ConfigError::Invalid(format!(
                        "language '{id}' uses {{driver}} without an instrument"
                    )));
                }
                None => {}
            }
            if let Some(tool) = lang.toolchain.iter().find(|t| t.probe.is_empty()) {
                return Err(ConfigError::Invalid(format!(
                    "language '{id}' has empty probe for toolchain '{}'",
                    tool.name
                )));
            }
        }

        Ok(())
    }
}
