//! Normalization of parsed options into the map a program works with.

use crate::args::{RawOptions, RawValue};
use crate::error::{Error, Result};
use crate::logging::caret_to_percent;
use crate::option_spec::{HELP_KEY, LOG_KEY, OptionValue, VERSION_KEY};
use std::collections::BTreeMap;

/// Final options of a program run.
///
/// Holds only options that were given or have a declared default, so a
/// missing key always means "never set". Non-option arguments are kept in
/// order and available through [`ParsedOptions::positional`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedOptions {
    values: BTreeMap<String, OptionValue>,
    positional: Vec<String>,
}

impl ParsedOptions {
    pub fn get(&self, key: &str) -> Option<&OptionValue> {
        self.values.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Value of a flag; an absent flag is false.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.values.get(key), Some(OptionValue::Flag(true)))
    }

    pub fn string(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(OptionValue::Str(s)) => Some(s),
            _ => None,
        }
    }

    pub fn integer(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(OptionValue::Int(i)) => Some(*i),
            _ => None,
        }
    }

    /// Values of a repeated option, empty if it was never given.
    pub fn list(&self, key: &str) -> &[String] {
        match self.values.get(key) {
            Some(OptionValue::List(values)) => values,
            _ => &[],
        }
    }

    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: OptionValue) -> Option<OptionValue> {
        self.values.insert(key.into(), value)
    }

    pub fn remove(&mut self, key: &str) -> Option<OptionValue> {
        self.values.remove(key)
    }
}

/// What the command line asks the program to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Help,
    Version,
    Run(ParsedOptions),
}

/// Handles `--help` / `--version` and drops every option that was neither
/// given nor defaulted.
pub fn finalize(raw: RawOptions) -> Request {
    if raw.is_set(HELP_KEY) {
        return Request::Help;
    }
    if raw.is_set(VERSION_KEY) {
        return Request::Version;
    }

    let values = raw
        .values
        .into_iter()
        .filter_map(|(key, value)| match value {
            RawValue::Supplied(value) | RawValue::Default(value) => Some((key, value)),
            RawValue::Unset => None,
        })
        .collect();
    Request::Run(ParsedOptions {
        values,
        positional: raw.positional,
    })
}

/// Removes the mandatory `--log` value from `options` and returns it as a
/// strftime template.
///
/// # Errors
/// [`Error::MissingMandatoryOption`] when `--log` was not given or is empty.
pub fn take_log_template(options: &mut ParsedOptions) -> Result<String> {
    match options.remove(LOG_KEY) {
        Some(OptionValue::Str(value)) if !value.is_empty() => Ok(caret_to_percent(&value)),
        _ => Err(Error::MissingMandatoryOption {
            option: LOG_KEY.to_string(),
        }),
    }
}
