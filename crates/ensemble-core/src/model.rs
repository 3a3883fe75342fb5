//! Model wrapper seam: turns a resolved parameter assignment and a run
//! directory into a concrete command line.

use crate::errors::{EnsembleError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Executable plus argument vector, never passed through a shell locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCommand {
    pub executable: String,
    pub args: Vec<String>,
}

impl ModelCommand {
    /// Shell-safe rendering, used for printing and for job scripts.
    pub fn render(&self) -> String {
        std::iter::once(&self.executable)
            .chain(&self.args)
            .map(|s| shell_quote(s))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ModelCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

pub trait ModelWrapper: Send + Sync {
    fn command(&self, params: &[(String, f64)], rundir: &Path) -> Result<ModelCommand>;

    /// Side effects needed in the run directory before dispatch.
    fn prepare(&self, _params: &[(String, f64)], _rundir: &Path) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamFileType {
    /// `NAME VALUE` per line.
    #[default]
    Linesep,
    Json,
}

impl std::str::FromStr for ParamFileType {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linesep" => Ok(Self::Linesep),
            "json" => Ok(Self::Json),
            other => Err(EnsembleError::Parse(format!(
                "unknown parameter file type: {other} (expected linesep or json)"
            ))),
        }
    }
}

/// Command-line template model.
///
/// `args` is split on whitespace; in each token `{NAME}` is replaced by the
/// parameter value and `{}` by the run directory (`{{` and `}}` escape braces).
/// `out_prefix` (e.g. `"--out "`) is followed by the run directory and
/// `param_prefix` (e.g. `"--{} "`, `{}` being the name) by each value.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandTemplate {
    pub executable: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub param_prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out_prefix: Option<String>,
    /// Parameter file written into the run directory before dispatch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub file_type: ParamFileType,
}

impl CommandTemplate {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
            ..Self::default()
        }
    }

    pub fn args(mut self, args: impl Into<String>) -> Self {
        self.args = Some(args.into());
        self
    }

    pub fn param_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.param_prefix = Some(prefix.into());
        self
    }

    pub fn out_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.out_prefix = Some(prefix.into());
        self
    }

    pub fn param_file(mut self, name: impl Into<String>, file_type: ParamFileType) -> Self {
        self.file_name = Some(name.into());
        self.file_type = file_type;
        self
    }

    fn render_param_file(&self, params: &[(String, f64)]) -> Result<String> {
        match self.file_type {
            ParamFileType::Linesep => Ok(params
                .iter()
                .map(|(name, value)| format!("{name} {value}\n"))
                .collect()),
            ParamFileType::Json => {
                let map: serde_json::Map<String, serde_json::Value> = params
                    .iter()
                    .map(|(name, value)| (name.clone(), serde_json::json!(value)))
                    .collect();
                Ok(serde_json::to_string_pretty(&map)?)
            }
        }
    }
}

impl ModelWrapper for CommandTemplate {
    fn command(&self, params: &[(String, f64)], rundir: &Path) -> Result<ModelCommand> {
        if self.executable.is_empty() {
            return Err(EnsembleError::Template("no model executable configured".into()));
        }
        let rundir = rundir.to_string_lossy();
        let mut args = Vec::new();

        if let Some(template) = &self.args {
            for token in template.split_whitespace() {
                args.push(format_token(token, params, &rundir)?);
            }
        }
        if let Some(prefix) = &self.out_prefix {
            args.extend(prefixed(prefix, &rundir));
        }
        if let Some(prefix) = &self.param_prefix {
            for (name, value) in params {
                args.extend(prefixed(&prefix.replace("{}", name), &value.to_string()));
            }
        }

        Ok(ModelCommand {
            executable: self.executable.clone(),
            args,
        })
    }

    fn prepare(&self, params: &[(String, f64)], rundir: &Path) -> Result<()> {
        let Some(name) = &self.file_name else {
            return Ok(());
        };
        let path = rundir.join(name);
        let body = self.render_param_file(params)?;
        std::fs::write(&path, body).map_err(|e| EnsembleError::io(&path, e))
    }
}

/// Prefix tokens followed by `value`; glued to the last token unless the
/// prefix ends with whitespace.
fn prefixed(prefix: &str, value: &str) -> Vec<String> {
    let mut tokens: Vec<String> = prefix.split_whitespace().map(str::to_string).collect();
    match tokens.last_mut() {
        Some(last) if !prefix.ends_with(char::is_whitespace) => last.push_str(value),
        _ => tokens.push(value.to_string()),
    }
    tokens
}

fn format_token(token: &str, params: &[(String, f64)], rundir: &str) -> Result<String> {
    let mut out = String::with_capacity(token.len());
    let mut chars = token.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let key: String = chars.by_ref().take_while(|&c| c != '}').collect();
                if key.is_empty() {
                    out.push_str(rundir);
                    continue;
                }
                let value = params
                    .iter()
                    .find(|(name, _)| *name == key)
                    .map(|(_, v)| *v)
                    .ok_or_else(|| {
                        EnsembleError::Template(format!("unbound placeholder {{{key}}} in {token:?}"))
                    })?;
                out.push_str(&value.to_string());
            }
            c => out.push(c),
        }
    }
    Ok(out)
}

/// Single-quote `s` unless it is made only of shell-inert characters.
pub fn shell_quote(s: &str) -> String {
    let inert = |c: char| c.is_ascii_alphanumeric() || "_-./=:,+@%".contains(c);
    if !s.is_empty() && s.chars().all(inert) {
        s.to_string()
    } else {
        format!("'{}'", s.replace('\'', r"'\''"))
    }
}
