// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Fatal conditions reported by `mka`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MkaError {
    #[error("input file {0:?} does not exist or is not a regular file")]
    MissingInput(PathBuf),

    #[error("input file {path:?} is not readable: {reason}")]
    UnreadableInput { path: PathBuf, reason: String },

    #[error("run info file {0:?} has no [Data] section, or it lists no samples")]
    MissingRunInfo(PathBuf),

    #[error("library defaults file {path:?} is invalid: {reason}")]
    InvalidDefaults { path: PathBuf, reason: String },

    #[error("input file {0:?} is given more than once")]
    DuplicateInput(PathBuf),

    #[error("no {field} could be determined for {file:?}")]
    MissingField { file: String, field: &'static str },

    #[error(
        "library {library} is assigned to sample {existing_sample} and also to sample {new_sample}"
    )]
    LibraryConflict {
        library: String,
        existing_sample: String,
        new_sample: String,
    },

    #[error("template {0:?} was not found in the custom template directory or the bundled templates")]
    MissingTemplate(String),

    #[error("template {template:?} line {line}: placeholder {placeholder:?} is undefined")]
    UndefinedPlaceholder {
        template: String,
        placeholder: String,
        line: usize,
    },

    #[error("template {template:?} has a syntax error: {message}")]
    TemplateSyntax { template: String, message: String },

    #[error("template {template:?} could not be rendered: {message}")]
    TemplateRender { template: String, message: String },

    #[error("sequencing date {value:?} for {file:?} could not be parsed")]
    UnparseableDate { file: String, value: String },

    #[error("{value:?} is not a valid {option}; expected {expected}")]
    InvalidChoice {
        option: String,
        value: String,
        expected: String,
    },

    #[error("input ended while waiting for an answer to {0:?}")]
    PromptClosed(String),

    #[error("{0:?} already exists and does not look like an mka control directory (no commands file)")]
    UnrecognizedControlDir(PathBuf),

    #[error("read group {readgroup} of library {library} has {count} files; expected one or two")]
    OversizedReadGroup {
        library: String,
        readgroup: String,
        count: usize,
    },

    #[error("library map could not be read: {0}")]
    InvalidLibraryMap(String),
}
