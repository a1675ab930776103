use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize, de};

use crate::config::ConfigError;

const INVALID_FILE_EXT_CHARS: [char; 2] = ['/', '.'];

/// Configuration for a programming language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Language {
    /// Human-readable name for the language (e.g., "C++ 17 (GCC)")
    pub name: String,

    /// File extension
    pub extension: FileExtension,

    /// How the source file is named on disk
    #[serde(default)]
    pub naming: SourceNaming,

    /// Measurement driver the run stage goes through
    #[serde(default)]
    pub instrument: Option<Instrument>,

    /// External programs that must be installed for this language
    #[serde(default)]
    pub toolchain: Vec<Toolchain>,

    /// Compilation configuration (None for scripted languages)
    #[serde(default)]
    pub compile: Option<CompileConfig>,

    /// Execution configuration
    pub run: RunConfig,
}

impl Language {
    /// Check if the language is compiled
    pub fn is_compiled(&self) -> bool {
        self.compile.is_some()
    }

    /// Check if the file name is derived from the declared public type
    pub fn is_named_class(&self) -> bool {
        matches!(self.naming, SourceNaming::PublicType { .. })
    }

    /// Check if any stage command refers to the measurement driver
    pub fn uses_driver(&self) -> bool {
        self.compile
            .iter()
            .flat_map(|compile| compile.command.iter())
            .chain(self.run.command.iter())
            .any(|arg| arg.contains("{driver}"))
    }

    /// Expand placeholders in the given command
    pub fn expand_command(command: &[String], placeholders: &Placeholders<'_>) -> Vec<String> {
        command.iter().map(|arg| placeholders.expand(arg)).collect()
    }
}

/// Values substituted into command templates
///
/// Supported placeholders: `{source}`, `{binary}`, `{driver}`, `{class}`,
/// `{dir}`.
/// Paths are absolute so commands do not depend on how the child resolves
/// relative program names.
#[derive(Debug, Clone, Copy)]
pub struct Placeholders<'a> {
    pub source: &'a Path,
    pub binary: Option<&'a Path>,
    pub driver: Option<&'a Path>,
    pub class: &'a str,
    pub dir: &'a Path,
}

impl Placeholders<'_> {
    pub fn expand(&self, template: &str) -> String {
        let mut arg = template
            .replace("{source}", &self.source.to_string_lossy())
            .replace("{class}", self.class)
            .replace("{dir}", &self.dir.to_string_lossy());
        if let Some(binary) = self.binary {
            arg = arg.replace("{binary}", &binary.to_string_lossy());
        }
        if let Some(driver) = self.driver {
            arg = arg.replace("{driver}", &driver.to_string_lossy());
        }
        arg
    }
}

/// Naming policy for the materialized source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceNaming {
    /// Always `<stem>.<extension>`
    Fixed {
        #[serde(default = "default_stem")]
        stem: String,
    },

    /// `<Type>.<extension>` where `Type` is the declared public type of the
    /// source, or `fallback` when none is declared
    PublicType {
        #[serde(default = "default_type_name")]
        fallback: String,
    },
}

impl Default for SourceNaming {
    fn default() -> Self {
        SourceNaming::Fixed {
            stem: default_stem(),
        }
    }
}

fn default_stem() -> String {
    "main".to_owned()
}

fn default_type_name() -> String {
    "Main".to_owned()
}

/// Measurement driver that runs the user's program
///
/// The driver is written into the job directory as `file`, next to the
/// untouched user source, and run commands invoke it through `{driver}`.
/// It reports performance markers on stdout after the user's code finished
/// successfully. See [`crate::runner::perf`] for the format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instrument {
    /// File name of the driver inside the job directory
    pub file: String,

    /// Driver source
    pub script: String,
}

/// An external program a language depends on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Toolchain {
    /// Human readable name used in error messages (e.g. "Java compiler (javac)")
    pub name: String,

    /// Cheap version check, e.g. `["javac", "-version"]`
    pub probe: Vec<String>,
}

/// File extension without dot (e.g., "cpp")
#[derive(Debug, Clone, Serialize)]
pub struct FileExtension(String);

impl FileExtension {
    pub fn new(extension: &str) -> Result<Self, ConfigError> {
        let contains_invalid = extension
            .chars()
            .any(|c| INVALID_FILE_EXT_CHARS.contains(&c));
        if contains_invalid {
            return Err(ConfigError::InvalidFileExtChars);
        }
        Ok(Self(extension.to_owned()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for FileExtension {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FileExtension::new(&s).map_err(|_| {
            de::Error::invalid_value(
                de::Unexpected::Str(&s),
                &"a file extension without '/' or '.' characters",
            )
        })
    }
}

impl std::fmt::Display for FileExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Configuration for the compilation step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Command and arguments with placeholders
    pub command: Vec<String>,

    /// File produced by the compiler, relative to the job directory.
    /// May reference `{class}` (e.g. "{class}.class").
    pub output_name: String,

    /// Environment variables to set during compilation
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Configuration for the execution step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Command and arguments with placeholders
    pub command: Vec<String>,

    /// Environment variables to set
    #[serde(default)]
    pub env: HashMap<String, String>,
}
