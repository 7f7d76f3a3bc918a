//! Parameter declarations
//!
//! Options in this crate can be renamed by passing a list of declarations
//! such as `["-l", "--log"]`.

use std::ffi::OsStr;
use std::fmt;

use clap::error::ErrorKind;
use clap::{Arg, Command};
use thiserror::Error;

/// Invalid parameter declarations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParamError {
    /// No declarations given
    #[error("at least one parameter declaration is required")]
    Empty,

    /// Declaration does not start with a dash
    #[error("invalid parameter declaration '{0}': must start with '-' or '--'")]
    NoDash(String),

    /// Multi-character short flag like `-tb`
    #[error("invalid short flag '{0}': short flags are a single character")]
    InvalidShort(String),
}

/// Parsed declarations for one option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDecls {
    /// Argument id, also the keyword used to look the value up
    pub id: String,
    /// Primary long flag
    pub long: Option<String>,
    /// Additional long flags
    pub aliases: Vec<String>,
    /// Short flag
    pub short: Option<char>,
}

impl ParamDecls {
    /// Parse declarations.
    ///
    /// # Errors
    ///
    /// See [`ParamError`].
    pub fn parse(decls: &[&str]) -> Result<Self, ParamError> {
        if decls.is_empty() {
            return Err(ParamError::Empty);
        }

        let mut long = None;
        let mut aliases = Vec::new();
        let mut short = None;

        for decl in decls {
            if let Some(name) = decl.strip_prefix("--") {
                if name.is_empty() {
                    return Err(ParamError::NoDash((*decl).to_string()));
                }
                if long.is_none() {
                    long = Some(name.to_string());
                } else {
                    aliases.push(name.to_string());
                }
            } else if let Some(name) = decl.strip_prefix('-') {
                let mut chars = name.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => short = Some(c),
                    _ => return Err(ParamError::InvalidShort((*decl).to_string())),
                }
            } else {
                return Err(ParamError::NoDash((*decl).to_string()));
            }
        }

        Ok(Self {
            id: param_id(decls),
            long,
            aliases,
            short,
        })
    }

    /// Build a clap argument carrying these names
    pub fn to_arg(&self) -> Arg {
        let mut arg = Arg::new(self.id.clone());
        if let Some(long) = &self.long {
            arg = arg.long(long.clone());
        }
        if !self.aliases.is_empty() {
            arg = arg.visible_aliases(self.aliases.clone());
        }
        if let Some(short) = self.short {
            arg = arg.short(short);
        }
        arg
    }
}

/// Keyword for a list of declarations: the first `--` declaration, else the
/// first one, without leading dashes and with `-` turned into `_`.
pub fn param_id(decls: &[&str]) -> String {
    let keyword = decls
        .iter()
        .find(|d| d.starts_with("--"))
        .or_else(|| decls.first())
        .copied()
        .unwrap_or_default();

    keyword.trim_start_matches('-').replace('-', "_")
}

/// Usage error of the form `invalid value '<value>' for '<arg>': <reason>`
pub(crate) fn invalid_value(
    cmd: &Command,
    arg: Option<&Arg>,
    value: &OsStr,
    reason: &dyn fmt::Display,
) -> clap::Error {
    let arg = arg.map_or_else(|| "...".to_string(), ToString::to_string);
    let mut cmd = cmd.clone();
    cmd.error(
        ErrorKind::ValueValidation,
        format!(
            "invalid value '{}' for '{}': {}",
            value.to_string_lossy(),
            arg,
            reason
        ),
    )
}
