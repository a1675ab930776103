//! Writing the user's source into the job directory

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::config::{Language, SourceNaming};
use crate::runner::cleanup::ArtifactSet;

/// Modifiers that may sit between `public` and the type keyword
const TYPE_MODIFIERS: [&str; 6] = ["final", "abstract", "static", "sealed", "strictfp", "non"];

/// Keywords that declare a top-level type
const TYPE_KEYWORDS: [&str; 4] = ["class", "interface", "enum", "record"];

/// A source file written for a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaterializedSource {
    /// Absolute path of the file on disk
    pub path: PathBuf,
    /// Value of the `{class}` placeholder
    pub type_name: String,
    /// Measurement driver written next to the source, if the language has one
    pub driver: Option<PathBuf>,
}

/// Find the name of the first public top-level type declared in `source`
///
/// This is a token scan, not a parser: `public` followed by optional
/// modifiers, a type keyword and a valid identifier.
pub fn detect_public_type(source: &str) -> Option<&str> {
    let mut tokens = source
        .split(|c: char| !is_identifier_char(c))
        .filter(|t| !t.is_empty());

    while let Some(token) = tokens.next() {
        if token != "public" {
            continue;
        }

        let mut next = tokens.next();
        while let Some(t) = next
            && TYPE_MODIFIERS.contains(&t)
        {
            next = tokens.next();
        }

        if let Some(keyword) = next
            && TYPE_KEYWORDS.contains(&keyword)
            && let Some(name) = tokens.next()
            && is_identifier(name)
        {
            return Some(name);
        }
    }

    None
}

fn is_identifier_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn is_identifier(name: &str) -> bool {
    name.chars()
        .next()
        .is_some_and(|c| !c.is_ascii_digit() && is_identifier_char(c))
}

/// File stem and `{class}` value for a source under a naming policy
pub fn resolve_name<'a>(naming: &'a SourceNaming, source: &'a str) -> &'a str {
    match naming {
        SourceNaming::Fixed { stem } => stem,
        SourceNaming::PublicType { fallback } => detect_public_type(source).unwrap_or(fallback),
    }
}

/// Write the user's source, and the language's measurement driver, into
/// the artifact set's directory
///
/// The source is written byte for byte. Files are registered before they
/// are written, so a partially written file is still removed by cleanup.
#[instrument(skip_all, fields(language = %language.name))]
pub async fn materialize(
    artifacts: &mut ArtifactSet,
    language: &Language,
    source: &str,
) -> std::io::Result<MaterializedSource> {
    let type_name = resolve_name(&language.naming, source).to_owned();
    let file_name = format!("{type_name}.{}", language.extension);
    let path = artifacts.dir().join(&file_name);

    let driver = match &language.instrument {
        Some(instrument) if instrument.file == file_name => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("source file '{file_name}' collides with the measurement driver"),
            ));
        }
        Some(instrument) => {
            let driver = artifacts.dir().join(&instrument.file);
            artifacts.register(&driver);
            write_atomic(&driver, instrument.script.as_bytes()).await?;
            Some(driver)
        }
        None => None,
    };

    artifacts.register(&path);
    write_atomic(&path, source.as_bytes()).await?;
    debug!(path = %path.display(), len = source.len(), "materialized source");

    Ok(MaterializedSource {
        path,
        type_name,
        driver,
    })
}

/// Write through a hidden temporary file and rename it into place
async fn write_atomic(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    let result = async {
        tokio::fs::write(&tmp, content).await?;
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}
