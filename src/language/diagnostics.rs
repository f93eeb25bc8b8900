use crate::language::{compiler::CodegenError, errors::ParseError};
use miette::{Diagnostic, NamedSource, Report, SourceSpan};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic, Clone)]
#[error("{message}")]
#[diagnostic(code(plsm::parse))]
pub struct ParseDiagnostic {
    #[source_code]
    src: NamedSource<String>,
    #[label("here")]
    span: SourceSpan,
    #[help]
    help: Option<String>,
    message: String,
}

impl ParseDiagnostic {
    pub fn from_error(src: NamedSource<String>, err: &ParseError) -> Self {
        Self {
            src,
            span: err.to_source_span(),
            help: err.help.clone(),
            message: err.message.clone(),
        }
    }
}

pub fn emit_parse_error(path: &Path, source: &str, err: &ParseError) {
    let src = NamedSource::new(path.display().to_string(), source.to_string());
    let diagnostic = ParseDiagnostic::from_error(src, err);
    eprintln!("{:?}", Report::new(diagnostic));
}

pub fn report_codegen_error(error: &CodegenError) {
    eprintln!("Compile error: {}", error);
}

pub fn report_io_error(path: &Path, error: &std::io::Error) {
    eprintln!("Failed to access {}: {}", path.display(), error);
}
