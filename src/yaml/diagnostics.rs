//! Diagnostics for malformed YAML inputs (manifest trees, ticket snapshots, config)

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

/// Errors raised while loading a YAML document
#[derive(Debug, Error, Diagnostic)]
pub enum YamlError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Syntax(Box<YamlSyntaxError>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A YAML syntax or shape error pointing into the offending file
#[derive(Debug, Error, Diagnostic)]
#[error("Invalid YAML in {filename}: {message}")]
#[diagnostic(code(relcheck::yaml::syntax))]
pub struct YamlSyntaxError {
    pub filename: String,
    pub message: String,

    #[source_code]
    pub src: NamedSource<String>,

    #[label("{message}")]
    pub span: Option<SourceSpan>,
}

impl YamlSyntaxError {
    /// Build a diagnostic from a serde_yml error, keeping the source for display
    pub fn from_serde_error(err: &serde_yml::Error, content: &str, filename: &str) -> Self {
        let span = err.location().map(|loc| {
            let offset = loc.index().min(content.len());
            let len = usize::from(offset < content.len());
            SourceSpan::from((offset, len))
        });

        Self {
            filename: filename.to_string(),
            message: err.to_string(),
            src: NamedSource::new(filename, content.to_string()),
            span,
        }
    }
}

impl From<YamlSyntaxError> for YamlError {
    fn from(err: YamlSyntaxError) -> Self {
        YamlError::Syntax(Box::new(err))
    }
}
