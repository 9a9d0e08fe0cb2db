// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Locate, check and render the templates that make up a control directory.

use crate::analysis::AnalysisType;
use crate::error::MkaError;
use anyhow::{Context as _, Result};
use lazy_static::lazy_static;
use log::{debug, info};
use regex::Regex;
use serde_derive::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};

/// Files rendered into every control directory, in order.
pub const MANIFEST: &[&str] = &["Makefile", COMMANDS];

pub const COMMANDS: &str = "commands";

const EXECUTABLE_MODE: u32 = 0o755;

/// Templates compiled into the binary.
const BUNDLED: &[(&str, &str)] = &[
    ("Makefile", include_str!("../templates/Makefile")),
    ("commands", include_str!("../templates/commands")),
];

/// Names a template may use without the context defining them.
const BUILTIN_NAMES: &[&str] = &["loop", "__tera_context"];

/// Words inside tag expressions that are operators or literals, not names.
const EXPRESSION_KEYWORDS: &[&str] = &[
    "and", "or", "not", "in", "is", "true", "false", "True", "False",
];

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{\{-?\s*([A-Za-z_][A-Za-z0-9_]*)").unwrap();
    static ref FOR_BINDING: Regex =
        Regex::new(r"\{%-?\s*for\s+([A-Za-z_][A-Za-z0-9_]*)(?:\s*,\s*([A-Za-z_][A-Za-z0-9_]*))?\s+in\s")
            .unwrap();
    static ref SET_BINDING: Regex =
        Regex::new(r"\{%-?\s*set(?:_global)?\s+([A-Za-z_][A-Za-z0-9_]*)\s*=").unwrap();
    static ref CONDITION: Regex = Regex::new(
        r"\{%-?\s*(?:(?:if|elif)\s|for\s+[A-Za-z_][A-Za-z0-9_]*(?:\s*,\s*[A-Za-z_][A-Za-z0-9_]*)?\s+in\s)(.*?)-?%\}"
    )
    .unwrap();
    static ref STRING_LITERAL: Regex = Regex::new(r#""[^"]*"|'[^']*'|`[^`]*`"#).unwrap();
    static ref IDENTIFIER: Regex = Regex::new(r"[A-Za-z_][A-Za-z0-9_]*").unwrap();
}

/// Where a template was found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TemplateSource {
    Custom(PathBuf),
    Bundled {
        name: &'static str,
        text: &'static str,
    },
}

impl TemplateSource {
    /// Find `name`, trying the custom directory before the bundled set and,
    /// within each, `<name>.<analysis>` before `<name>`.
    pub fn locate(
        name: &str,
        analysis_type: AnalysisType,
        custom_dir: Option<&Path>,
    ) -> Option<TemplateSource> {
        let candidates = [format!("{name}.{}", analysis_type.name()), name.to_string()];

        if let Some(dir) = custom_dir {
            for candidate in &candidates {
                let path = dir.join(candidate);
                if path.is_file() {
                    return Some(TemplateSource::Custom(path));
                }
            }
        }

        candidates.iter().find_map(|candidate| {
            BUNDLED
                .iter()
                .find(|(n, _)| *n == candidate.as_str())
                .map(|&(name, text)| TemplateSource::Bundled { name, text })
        })
    }

    pub fn read(&self) -> Result<String> {
        match self {
            TemplateSource::Custom(path) => fs::read_to_string(path)
                .with_context(|| format!("reading template {}", path.display())),
            TemplateSource::Bundled { text, .. } => Ok(text.to_string()),
        }
    }
}

impl std::fmt::Display for TemplateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TemplateSource::Custom(path) => write!(f, "{}", path.display()),
            TemplateSource::Bundled { name, .. } => write!(f, "bundled {name}"),
        }
    }
}

/// Values available to every template.
#[derive(Serialize, Clone, Debug, Default)]
pub struct TemplateContext {
    pub name: String,
    pub description: String,
    pub analysis_type: String,
    pub analysis_path: String,
    pub control_path: String,
    pub data_path: String,
    pub work_path: String,
    pub reference_root: String,
    pub io_limit: usize,
    /// The library map as sorted, pretty-printed JSON.
    pub libraries: String,
    pub mka: String,
    pub version: String,
    pub created: String,
}

/// Root variable names of a tag expression such as `a.b and not c | length > 0`.
/// Attributes, filters, tests, function calls and keyword arguments are skipped.
fn expression_roots(expr: &str) -> Vec<String> {
    let cleaned =
        STRING_LITERAL.replace_all(expr, |c: &regex::Captures<'_>| " ".repeat(c[0].len()));
    let mut roots = Vec::new();
    let mut after_is = false;
    for m in IDENTIFIER.find_iter(&cleaned) {
        let word = m.as_str();
        if word == "is" {
            after_is = true;
            continue;
        }
        if after_is {
            after_is = word == "not";
            continue;
        }

        let before = &cleaned[..m.start()];
        let after = cleaned[m.end()..].trim_start();
        let number_suffix = before.chars().last().map_or(false, |c| c.is_ascii_digit());
        let qualified = matches!(before.trim_end().chars().last(), Some('.') | Some('|'));
        let call = after.starts_with('(');
        let keyword_arg = after.starts_with('=') && !after.starts_with("==");
        if EXPRESSION_KEYWORDS.contains(&word) || number_suffix || qualified || call || keyword_arg {
            continue;
        }
        roots.push(word.to_string());
    }
    roots
}

/// Report the first placeholder whose root name is neither in `known` nor
/// bound inside the template.
pub fn check_placeholders(template: &str, text: &str, known: &BTreeSet<String>) -> Result<()> {
    let mut bound: BTreeSet<&str> = BUILTIN_NAMES.iter().copied().collect();
    for caps in FOR_BINDING.captures_iter(text) {
        bound.extend(caps.iter().skip(1).flatten().map(|m| m.as_str()));
    }
    for caps in SET_BINDING.captures_iter(text) {
        bound.extend(caps.get(1).map(|m| m.as_str()));
    }

    for (i, line) in text.lines().enumerate() {
        let mut roots: Vec<String> = PLACEHOLDER
            .captures_iter(line)
            .map(|caps| caps[1].to_string())
            .collect();
        for caps in CONDITION.captures_iter(line) {
            roots.extend(expression_roots(&caps[1]));
        }
        if let Some(root) = roots
            .into_iter()
            .find(|r| !known.contains(r) && !bound.contains(r.as_str()))
        {
            return Err(MkaError::UndefinedPlaceholder {
                template: template.to_string(),
                placeholder: root,
                line: i + 1,
            }
            .into());
        }
    }
    Ok(())
}

/// Tera keeps the useful part of a message (line and column) in the error's sources.
fn tera_message(err: &tera::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = std::error::Error::source(err);
    while let Some(s) = source {
        parts.push(s.to_string());
        source = s.source();
    }
    parts.join(": ")
}

/// Render one template's text.
pub fn render(template: &str, text: &str, context: &TemplateContext) -> Result<String> {
    let value = serde_json::to_value(context)?;
    let known: BTreeSet<String> = value
        .as_object()
        .map(|m| m.keys().cloned().collect())
        .unwrap_or_default();
    check_placeholders(template, text, &known)?;

    let mut tera = Tera::default();
    tera.add_raw_template(template, text)
        .map_err(|e| MkaError::TemplateSyntax {
            template: template.to_string(),
            message: tera_message(&e),
        })?;

    let ctx = Context::from_value(value).map_err(|e| MkaError::TemplateRender {
        template: template.to_string(),
        message: tera_message(&e),
    })?;
    let rendered = tera.render(template, &ctx).map_err(|e| MkaError::TemplateRender {
        template: template.to_string(),
        message: tera_message(&e),
    })?;
    Ok(rendered)
}

/// Render every manifest template into `control_path`, returning the written files.
pub fn render_control_dir(
    control_path: &Path,
    analysis_type: AnalysisType,
    custom_dir: Option<&Path>,
    context: &TemplateContext,
) -> Result<Vec<PathBuf>> {
    render_templates(MANIFEST, control_path, analysis_type, custom_dir, context)
}

fn render_templates(
    names: &[&str],
    control_path: &Path,
    analysis_type: AnalysisType,
    custom_dir: Option<&Path>,
    context: &TemplateContext,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(names.len());

    for &name in names {
        let source = TemplateSource::locate(name, analysis_type, custom_dir)
            .ok_or_else(|| MkaError::MissingTemplate(name.to_string()))?;
        debug!("rendering {name} from {source}");

        let rendered = render(name, &source.read()?, context)?;
        let dest = control_path.join(name);
        fs::write(&dest, rendered.as_bytes())
            .with_context(|| format!("writing {}", dest.display()))?;

        if name == COMMANDS {
            fs::set_permissions(&dest, fs::Permissions::from_mode(EXECUTABLE_MODE))
                .with_context(|| format!("making {} executable", dest.display()))?;
        }
        info!("wrote {}", dest.display());
        written.push(dest);
    }

    Ok(written)
}
