//! Lossless concrete syntax trees for Ruby source.
//!
//! `parse` turns a source string into a [`SyntaxTree`] whose leaves, read in
//! order, reproduce the input byte for byte. Syntax errors are recovered into
//! `error` nodes and reported as [`Diagnostic`]s rather than failing the parse.

mod builder;
pub mod cst;
pub mod diagnostics;
pub mod lexer;
pub mod options;
mod parser;
pub mod policy;
pub mod syntax;

use std::fs;
use std::path::{Path, PathBuf};

pub use cst::{
    CstBundle, CstFile, Element, Field, Node, NodeKind, SyntaxTree, TextRange, Token, TokenKind,
};
pub use diagnostics::{
    render_diagnostic, render_diagnostics, Diagnostic, DiagnosticLabel, DiagnosticSeverity,
    Position, Span,
};
pub use lexer::tokenize;
pub use options::ParseOptions;
pub use parser::ParseError;

#[derive(Debug, thiserror::Error)]
pub enum RbcstError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    #[error("Invalid options: {0}")]
    Options(#[from] toml::de::Error),
    #[error("{path}: {source}")]
    Parse { path: String, source: ParseError },
}

/// Parses `source` with default options.
pub fn parse(source: &str) -> Result<SyntaxTree, ParseError> {
    parse_with_options(source, &ParseOptions::default())
}

/// Parses `source` with `options`; `RBCST_TRACE_PARSE=1` also turns tracing on.
pub fn parse_with_options(source: &str, options: &ParseOptions) -> Result<SyntaxTree, ParseError> {
    parser::parse_source(source, &options.clone().with_env_overrides())
}

/// Parses every Ruby file named by `target`: a file, a directory, or
/// `dir/...` for a recursive walk.
pub fn parse_target(target: &str, options: &ParseOptions) -> Result<CstBundle, RbcstError> {
    let mut files = Vec::new();
    for path in expand_target(target)? {
        files.push(parse_file(&path, options)?);
    }
    Ok(CstBundle { files })
}

pub fn parse_file(path: &Path, options: &ParseOptions) -> Result<CstFile, RbcstError> {
    let content = fs::read_to_string(path)?;
    let display = path.display().to_string();
    let options = options.clone().with_env_overrides();
    if options.trace {
        eprintln!("[RBCST_TRACE_PARSE] file {display} ({} bytes)", content.len());
    }
    let tree = parser::parse_source(&content, &options).map_err(|source| RbcstError::Parse {
        path: display.clone(),
        source,
    })?;
    Ok(CstFile::from_tree(display, tree))
}

/// Reads `[parse]` options from a TOML file.
pub fn load_options(path: &Path) -> Result<ParseOptions, RbcstError> {
    let text = fs::read_to_string(path)?;
    Ok(ParseOptions::from_toml_str(&text)?)
}

fn expand_target(target: &str) -> Result<Vec<PathBuf>, RbcstError> {
    let mut paths = Vec::new();
    let (base, recursive) = match target.strip_suffix("/...") {
        Some(base) => (if base.is_empty() { "." } else { base }, true),
        None => (target, false),
    };

    let Some(path) = resolve_target_path(base) else {
        return Err(RbcstError::InvalidPath(target.to_string()));
    };

    if path.is_file() {
        return Ok(vec![path]);
    }

    if path.is_dir() {
        if recursive {
            collect_files(&path, &mut paths)?;
        } else {
            for entry in fs::read_dir(&path)? {
                let entry_path = entry?.path();
                if entry_path.is_file() && is_ruby_file(&entry_path) {
                    paths.push(entry_path);
                }
            }
        }
    }

    paths.sort();
    if paths.is_empty() {
        return Err(RbcstError::InvalidPath(target.to_string()));
    }
    Ok(paths)
}

fn resolve_target_path(target: &str) -> Option<PathBuf> {
    let target_path = Path::new(target);
    if target_path.is_absolute() {
        return target_path.exists().then(|| target_path.to_path_buf());
    }

    if target_path.exists() {
        return Some(target_path.to_path_buf());
    }

    let Ok(mut dir) = std::env::current_dir() else {
        return None;
    };

    // Relative targets also resolve against enclosing project roots.
    loop {
        if dir.join("Gemfile").exists() || dir.join("Cargo.toml").exists() {
            let candidate = dir.join(target);
            if candidate.exists() {
                return Some(candidate);
            }
        }

        let Some(parent) = dir.parent() else {
            break;
        };
        dir = parent.to_path_buf();
    }

    None
}

fn collect_files(dir: &Path, paths: &mut Vec<PathBuf>) -> Result<(), RbcstError> {
    for entry in fs::read_dir(dir)? {
        let entry_path = entry?.path();
        if entry_path.is_dir() {
            collect_files(&entry_path, paths)?;
            continue;
        }

        if is_ruby_file(&entry_path) {
            paths.push(entry_path);
        }
    }
    Ok(())
}

fn is_ruby_file(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("rb")
}
