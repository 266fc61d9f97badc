//! Parsing of command-line arguments against a [`CanonicalSpec`].
//!
//! Parsing runs in two passes over an explicit token buffer. The first pass
//! replaces every `--config FILE` (or `--cfg`, `--cfg-file`, with `=` or a
//! separate value) by the tokens of that file, in place, so options from a
//! config file can be overridden by anything that follows them. The second pass
//! hands the expanded tokens to `clap`. The caller's argument slice is never
//! modified.

use crate::config_file;
use crate::error::{Error, Result};
use crate::option_spec::{ARGS_KEY, Arity, CanonicalSpec, OptionValue, ValueType};
use crate::path;
use clap::ArgMatches;
use clap::parser::ValueSource;
use std::collections::{BTreeMap, VecDeque};
use std::iter;

/// Deepest allowed chain of config files including other config files.
pub const MAX_CONFIG_DEPTH: usize = 16;

/// State of one option after parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    /// Given on the command line or in a config file.
    Supplied(OptionValue),
    /// Not given, the declared default applies.
    Default(OptionValue),
    /// Not given and without a default.
    Unset,
}

/// Result of parsing, before normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOptions {
    /// One entry for every option of the spec.
    pub values: BTreeMap<String, RawValue>,
    /// Non-option arguments in the order they were given.
    pub positional: Vec<String>,
}

impl RawOptions {
    /// True if the flag `key` was given.
    pub fn is_set(&self, key: &str) -> bool {
        matches!(
            self.values.get(key),
            Some(RawValue::Supplied(OptionValue::Flag(true)))
        )
    }
}

/// Parses `args` (without the program name) against `spec`.
///
/// # Errors
/// [`Error::InvalidArguments`] on unknown options, missing or malformed
/// values; config file errors as returned by [`expand_config_refs`].
pub fn parse(spec: &CanonicalSpec, args: &[String]) -> Result<RawOptions> {
    let tokens = expand_config_refs(spec, args)?;
    let matches = spec
        .command()
        .try_get_matches_from(iter::once(spec.name().to_string()).chain(tokens))
        .map_err(|e| Error::InvalidArguments(e.to_string().trim_end().to_string()))?;

    let values = spec
        .options()
        .map(|(key, def)| {
            let raw = if matches.value_source(key) == Some(ValueSource::CommandLine) {
                RawValue::Supplied(read_value(&matches, key, def.value_type))
            } else if let Some(default) = &def.default {
                RawValue::Default(default.clone())
            } else {
                RawValue::Unset
            };
            (key.clone(), raw)
        })
        .collect();

    let positional = matches
        .get_many::<String>(ARGS_KEY)
        .map(|values| values.cloned().collect())
        .unwrap_or_default();

    Ok(RawOptions { values, positional })
}

fn read_value(matches: &ArgMatches, key: &str, value_type: ValueType) -> OptionValue {
    match value_type {
        ValueType::Flag => OptionValue::Flag(matches.get_flag(key)),
        ValueType::String => {
            OptionValue::Str(matches.get_one::<String>(key).cloned().unwrap_or_default())
        }
        ValueType::Integer => {
            OptionValue::Int(matches.get_one::<i64>(key).copied().unwrap_or_default())
        }
        ValueType::Repeated => OptionValue::List(
            matches
                .get_many::<String>(key)
                .map(|values| values.cloned().collect())
                .unwrap_or_default(),
        ),
    }
}

/// Returns `args` with every config file reference replaced by the file's
/// tokens, recursively.
///
/// Tokens consumed as the value of another option are never treated as config
/// references, and nothing after a bare `--` is expanded. A separate value taken
/// by an option whose value is optional is joined to it as `--opt=value`.
///
/// # Errors
/// [`Error::ConfigRead`] / [`Error::ConfigParse`] from the expander,
/// [`Error::ConfigRecursion`] past [`MAX_CONFIG_DEPTH`] nested files, and
/// [`Error::InvalidArguments`] for a config option without a file name.
pub fn expand_config_refs(spec: &CanonicalSpec, args: &[String]) -> Result<Vec<String>> {
    let mut pending: VecDeque<(String, usize)> = args.iter().map(|a| (a.clone(), 0)).collect();
    let mut tokens = Vec::with_capacity(pending.len());

    while let Some((token, depth)) = pending.pop_front() {
        if token == "--" {
            tokens.push(token);
            tokens.extend(pending.drain(..).map(|(t, _)| t));
            break;
        }

        let (token, arity) = if let Some(long) = token.strip_prefix("--") {
            let (name, inline) = match long.split_once('=') {
                Some((name, value)) => (name, Some(value)),
                None => (long, None),
            };
            if spec.is_config_name(name) {
                let file = match inline {
                    Some(value) => value.to_string(),
                    None => match pending.pop_front() {
                        Some((value, _)) => value,
                        None => {
                            return Err(Error::InvalidArguments(format!(
                                "option '--{name}' requires a file name"
                            )));
                        }
                    },
                };
                let file = path::expand_path(&file);
                if depth >= MAX_CONFIG_DEPTH {
                    return Err(Error::ConfigRecursion {
                        path: file,
                        limit: MAX_CONFIG_DEPTH,
                    });
                }
                for expanded in config_file::expand(&file)?.into_iter().rev() {
                    pending.push_front((expanded, depth + 1));
                }
                continue;
            }
            let arity = match inline {
                Some(_) => Arity::None,
                None => spec.long_arity(name).unwrap_or(Arity::None),
            };
            (token, arity)
        } else if token.len() > 1 && token.starts_with('-') {
            short_cluster(spec, &token[1..])
        } else {
            (token, Arity::None)
        };

        match arity {
            Arity::None => tokens.push(token),
            Arity::Required => {
                tokens.push(token);
                if let Some((value, _)) = pending.pop_front() {
                    tokens.push(value);
                }
            }
            Arity::Optional(value_type) => {
                let fits = pending
                    .front()
                    .is_some_and(|(next, _)| fits_optional(next, value_type));
                match fits.then(|| pending.pop_front()).flatten() {
                    Some((value, _)) => tokens.push(format!("{token}={value}")),
                    None => tokens.push(token),
                }
            }
        }
    }
    Ok(tokens)
}

/// Examines a cluster of short options such as `-vD` (given without its
/// dash) and returns the token to pass on, with the arity of the value that
/// may follow it.
///
/// A value-taking option in the middle of a cluster takes the rest inline. An
/// optional value attached that way is rewritten as `-l=5`.
fn short_cluster(spec: &CanonicalSpec, cluster: &str) -> (String, Arity) {
    let token = format!("-{cluster}");
    for (i, c) in cluster.char_indices() {
        let rest = &cluster[i + c.len_utf8()..];
        match spec.short_arity(c) {
            Some(Arity::None) => continue,
            Some(arity) if rest.is_empty() => return (token, arity),
            Some(Arity::Optional(_)) if !rest.starts_with('=') => {
                let head = &cluster[..i + c.len_utf8()];
                return (format!("-{head}={rest}"), Arity::None);
            }
            _ => return (token, Arity::None),
        }
    }
    (token, Arity::None)
}

/// True if `token` can be the value of an option whose value is optional.
fn fits_optional(token: &str, value_type: ValueType) -> bool {
    match value_type {
        ValueType::Integer => token.parse::<i64>().is_ok(),
        _ => !token.starts_with('-') || token == "-",
    }
}
