//! Declarative option tables and their resolution into a parseable form.
//!
//! Every pitr program describes its command line as an [`OptionSpec`]: a map
//! from option key to an [`OptionDef`] holding aliases, value type, default and
//! whether the value may be omitted. [`CanonicalSpec::resolve`] adds the options
//! every program shares (`help`, `version`, `log` and the reserved `config`),
//! validates the table and builds the `clap` command used for parsing.

use crate::error::{Error, Result};
use clap::{Arg, ArgAction, Command, value_parser};
use std::collections::{BTreeMap, HashMap};

/// Key of the help flag, `--help` / `-?`.
pub const HELP_KEY: &str = "help";
/// Key of the version flag, `--version` / `-V`.
pub const VERSION_KEY: &str = "version";
/// Key of the mandatory log template option.
pub const LOG_KEY: &str = "log";
/// Key of the config file option, expanded in place before parsing.
pub const CONFIG_KEY: &str = "config";
/// Other spellings of [`CONFIG_KEY`].
pub const CONFIG_ALIASES: [&str; 2] = ["cfg", "cfg-file"];
/// Reserved id under which positional arguments are collected.
pub const ARGS_KEY: &str = "ARGS";

/// Type of the value an option carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    /// Present or not, no value.
    Flag,
    String,
    /// Signed integer.
    Integer,
    /// String that may be given several times; values accumulate in order.
    Repeated,
}

/// A resolved option value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    Flag(bool),
    Str(String),
    Int(i64),
    List(Vec<String>),
}

impl OptionValue {
    fn value_type(&self) -> ValueType {
        match self {
            OptionValue::Flag(_) => ValueType::Flag,
            OptionValue::Str(_) => ValueType::String,
            OptionValue::Int(_) => ValueType::Integer,
            OptionValue::List(_) => ValueType::Repeated,
        }
    }
}

/// Definition of a single option.
#[derive(Debug, Clone, PartialEq)]
pub struct OptionDef {
    /// Alternative names. One-character aliases become short options.
    pub aliases: Vec<String>,
    /// Value used when the option is not given.
    pub default: Option<OptionValue>,
    /// The option may appear without a value (`--opt` as well as `--opt=v`).
    pub optional_value: bool,
    pub value_type: ValueType,
    /// One line of help text.
    pub help: Option<String>,
}

impl OptionDef {
    fn new(value_type: ValueType) -> Self {
        Self {
            aliases: vec![],
            default: None,
            optional_value: false,
            value_type,
            help: None,
        }
    }

    pub fn flag() -> Self {
        Self::new(ValueType::Flag)
    }

    pub fn string() -> Self {
        Self::new(ValueType::String)
    }

    pub fn integer() -> Self {
        Self::new(ValueType::Integer)
    }

    pub fn repeated() -> Self {
        Self::new(ValueType::Repeated)
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn default(mut self, value: OptionValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn optional_value(mut self) -> Self {
        self.optional_value = true;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub(crate) fn arity(&self) -> Arity {
        if self.value_type == ValueType::Flag {
            Arity::None
        } else if self.optional_value {
            Arity::Optional(self.value_type)
        } else {
            Arity::Required
        }
    }
}

/// How many values an option consumes from the argument stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Arity {
    None,
    /// Takes the next token only when it fits the value type.
    Optional(ValueType),
    /// Always takes the next token, even one starting with `-`.
    Required,
}

/// A program's option table, as written by the program.
#[derive(Debug, Clone, Default)]
pub struct OptionSpec {
    options: BTreeMap<String, OptionDef>,
}

impl OptionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an option. Defining the same key twice keeps the last definition.
    pub fn option(mut self, key: impl Into<String>, def: OptionDef) -> Self {
        self.options.insert(key.into(), def);
        self
    }

    pub fn get(&self, key: &str) -> Option<&OptionDef> {
        self.options.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &OptionDef)> {
        self.options.iter()
    }
}

/// An option table with the shared options added, validated and ready to
/// drive the argument parser.
#[derive(Debug, Clone)]
pub struct CanonicalSpec {
    name: String,
    version: String,
    options: BTreeMap<String, OptionDef>,
    long_names: HashMap<String, Arity>,
    short_names: HashMap<char, Arity>,
    command: Command,
}

impl CanonicalSpec {
    /// Builds the canonical table for program `name`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidOptionSpec`] when aliases clash, a reserved name
    /// is used, or a default does not match its option's type.
    pub fn resolve(
        name: &str,
        version: &str,
        about: Option<&str>,
        spec: &OptionSpec,
    ) -> Result<Self> {
        let mut options = spec.options.clone();
        options.entry(HELP_KEY.to_string()).or_insert_with(|| {
            OptionDef::flag()
                .alias("?")
                .help("Print this help and exit")
        });
        options.entry(VERSION_KEY.to_string()).or_insert_with(|| {
            OptionDef::flag()
                .alias("V")
                .help("Print the program version and exit")
        });
        options.entry(LOG_KEY.to_string()).or_insert_with(|| {
            OptionDef::string()
                .help("Log file template, strftime with ^ in place of %, or - for stdout")
        });

        let (long_names, short_names) = index_names(&options)?;

        let mut command = Command::new(name.to_string())
            .version(version.to_string())
            .disable_help_flag(true)
            .disable_version_flag(true)
            .args_override_self(true)
            .arg(
                Arg::new(ARGS_KEY)
                    .value_name(ARGS_KEY)
                    .action(ArgAction::Append)
                    .num_args(1..),
            );
        if let Some(about) = about {
            command = command.about(about.to_string());
        }
        for (key, def) in &options {
            command = command.arg(build_arg(key, def));
        }
        command = command.arg(
            Arg::new(CONFIG_KEY)
                .long(CONFIG_KEY)
                .visible_aliases(CONFIG_ALIASES)
                .value_name("FILE")
                .action(ArgAction::Append)
                .help("Read further options from FILE, one per line"),
        );

        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
            options,
            long_names,
            short_names,
            command,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn get(&self, key: &str) -> Option<&OptionDef> {
        self.options.get(key)
    }

    pub fn options(&self) -> impl Iterator<Item = (&String, &OptionDef)> {
        self.options.iter()
    }

    /// Full usage documentation.
    pub fn render_help(&self) -> String {
        self.command.clone().render_long_help().to_string()
    }

    pub(crate) fn command(&self) -> Command {
        self.command.clone()
    }

    pub(crate) fn long_arity(&self, name: &str) -> Option<Arity> {
        self.long_names.get(name).copied()
    }

    pub(crate) fn short_arity(&self, name: char) -> Option<Arity> {
        self.short_names.get(&name).copied()
    }

    pub(crate) fn is_config_name(&self, name: &str) -> bool {
        name == CONFIG_KEY || CONFIG_ALIASES.contains(&name)
    }
}

fn is_reserved(name: &str) -> bool {
    name == ARGS_KEY || name == CONFIG_KEY || CONFIG_ALIASES.contains(&name)
}

/// Validates the table and maps every long and short name to its arity.
fn index_names(
    options: &BTreeMap<String, OptionDef>,
) -> Result<(HashMap<String, Arity>, HashMap<char, Arity>)> {
    let mut long_names = HashMap::new();
    let mut short_names = HashMap::new();

    for (key, def) in options {
        if key.is_empty() || key.starts_with('-') || is_reserved(key) {
            return Err(Error::InvalidOptionSpec(format!(
                "'{key}' cannot be used as an option name"
            )));
        }
        long_names.insert(key.clone(), def.arity());
    }

    for (key, def) in options {
        if let Some(default) = &def.default {
            if default.value_type() != def.value_type {
                return Err(Error::InvalidOptionSpec(format!(
                    "default of '{key}' is a {:?}, the option is a {:?}",
                    default.value_type(),
                    def.value_type
                )));
            }
        }
        if def.optional_value && matches!(def.value_type, ValueType::Flag | ValueType::Repeated) {
            return Err(Error::InvalidOptionSpec(format!(
                "'{key}' is a {:?} and cannot take an optional value",
                def.value_type
            )));
        }
        for alias in &def.aliases {
            if alias.is_empty() || alias.starts_with('-') || is_reserved(alias) {
                return Err(Error::InvalidOptionSpec(format!(
                    "'{alias}' cannot be used as an alias of '{key}'"
                )));
            }
            let mut chars = alias.chars();
            let clash = match (chars.next(), chars.next()) {
                (Some(c), None) => short_names.insert(c, def.arity()).is_some(),
                _ => long_names.insert(alias.clone(), def.arity()).is_some(),
            };
            if clash {
                return Err(Error::InvalidOptionSpec(format!(
                    "alias '{alias}' of '{key}' is already in use"
                )));
            }
        }
    }
    Ok((long_names, short_names))
}

fn build_arg(key: &str, def: &OptionDef) -> Arg {
    let mut arg = Arg::new(key.to_string()).long(key.to_string());

    let mut has_short = false;
    for alias in &def.aliases {
        let mut chars = alias.chars();
        arg = match (chars.next(), chars.next()) {
            (Some(c), None) if !has_short => {
                has_short = true;
                arg.short(c)
            }
            (Some(c), None) => arg.short_alias(c),
            _ => arg.visible_alias(alias.clone()),
        };
    }

    arg = match def.value_type {
        ValueType::Flag => arg.action(ArgAction::SetTrue),
        ValueType::String => arg.action(ArgAction::Set).value_parser(value_parser!(String)),
        ValueType::Integer => arg
            .action(ArgAction::Set)
            .value_parser(value_parser!(i64))
            .allow_negative_numbers(true),
        ValueType::Repeated => arg
            .action(ArgAction::Append)
            .value_parser(value_parser!(String)),
    };

    if def.optional_value {
        let missing = if def.value_type == ValueType::Integer {
            "0"
        } else {
            ""
        };
        // The parser joins an accepted value as `--opt=value`; a bare `--opt`
        // must not pick up the following argument.
        arg = arg
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value(missing);
    } else if def.value_type != ValueType::Flag {
        arg = arg.allow_hyphen_values(true);
    }

    // Shown in the help text only; defaults are applied from the table itself.
    arg = match &def.default {
        Some(OptionValue::Str(s)) if !s.is_empty() => arg.default_value(s.clone()),
        Some(OptionValue::Int(i)) => arg.default_value(i.to_string()),
        Some(OptionValue::List(values)) if !values.is_empty() => {
            arg.default_values(values.clone())
        }
        _ => arg,
    };

    if let Some(help) = &def.help {
        arg = arg.help(help.clone());
    }
    arg
}
