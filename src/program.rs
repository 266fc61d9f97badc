//! Start-up of a pitr program: from raw process arguments to a running
//! [`Session`].
//!
//! ```no_run
//! use pitr_base::{OptionDef, OptionSpec, Program};
//!
//! let spec = OptionSpec::new().option("data-dir", OptionDef::string().alias("D"));
//! let session = Program::new("pitr-archive", "1.0.0", spec).start();
//! session.logger.info("started");
//! ```

use crate::args;
use crate::debug;
use crate::error::{Error, Result};
use crate::logging::Logger;
use crate::option_spec::{CanonicalSpec, OptionSpec};
use crate::options::{self, ParsedOptions, Request};
use crate::status::{DEFAULT_STATUS_COMMAND, EscalationPolicy, StatusRecord, StatusRetriever};
use crate::sysexits;
use std::env;
use std::io;
use std::iter;
use std::path::{Path, PathBuf};
use std::process;
use tempfile::TempDir;
use tracing::Level;

/// Option key that raises the log level to DEBUG when a program declares it.
pub const VERBOSE_KEY: &str = "verbose";

type Finalizer = Box<dyn Fn(&mut ParsedOptions, &Logger) -> anyhow::Result<()>>;

/// A pitr program's identity and command-line definition.
pub struct Program {
    name: String,
    version: String,
    about: Option<String>,
    spec: OptionSpec,
    finalizer: Option<Finalizer>,
}

/// Outcome of [`Program::try_start`].
pub enum Invocation {
    /// Help was requested; holds the rendered usage.
    Help(String),
    /// Version was requested; holds the version line.
    Version(String),
    Run(Session),
}

impl Program {
    pub fn new(name: impl Into<String>, version: impl Into<String>, spec: OptionSpec) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            about: None,
            spec,
            finalizer: None,
        }
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    /// Program-specific normalization, run on the finalized options once the
    /// logger is up. An error stops the program before it does any work.
    pub fn normalize_with<F>(mut self, finalizer: F) -> Self
    where
        F: Fn(&mut ParsedOptions, &Logger) -> anyhow::Result<()> + 'static,
    {
        self.finalizer = Some(Box::new(finalizer));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolves the option table of this program.
    ///
    /// # Errors
    /// [`Error::InvalidOptionSpec`] if the table is inconsistent.
    pub fn resolve(&self) -> Result<CanonicalSpec> {
        CanonicalSpec::resolve(&self.name, &self.version, self.about.as_deref(), &self.spec)
    }

    /// Runs the start-up sequence on `args` (without the program name) and
    /// reports what should happen, without printing or exiting.
    ///
    /// # Errors
    /// Any [`Error`] from resolution, parsing or opening the log, and errors
    /// returned by the program-specific normalization.
    pub fn try_start(&self, args: &[String]) -> anyhow::Result<Invocation> {
        let spec = self.resolve()?;
        let raw = args::parse(&spec, args)?;
        let mut options = match options::finalize(raw) {
            Request::Help => return Ok(Invocation::Help(spec.render_help())),
            Request::Version => {
                return Ok(Invocation::Version(format!(
                    "{} version {}",
                    self.name, self.version
                )));
            }
            Request::Run(options) => options,
        };

        let template = options::take_log_template(&mut options)?;
        let level = if options.flag(VERBOSE_KEY) {
            Level::DEBUG
        } else {
            Level::INFO
        };
        let logger = Logger::open(&template, level)?;
        if let Some(finalizer) = &self.finalizer {
            finalizer(&mut options, &logger)?;
        }
        let mut session = Session::new(&self.name, options, logger);
        session.argv = iter::once(self.name.clone())
            .chain(args.iter().cloned())
            .collect();
        Ok(Invocation::Run(session))
    }

    /// Starts the program from the process arguments.
    ///
    /// Prints help, version or errors and exits when the command line asks for
    /// it or is unusable; otherwise returns the session.
    pub fn start(&self) -> Session {
        self.start_from(env::args().collect())
    }

    /// Like [`start`](Self::start) with an explicit argument vector, program
    /// name included.
    pub fn start_from(&self, argv: Vec<String>) -> Session {
        let args = argv.get(1..).unwrap_or_default();
        let (debug, args) = debug::strip_debug_flag(args);
        if debug {
            // Best effort: a closed stderr must not stop the program.
            let _ = debug::dump(&argv, &mut io::stderr().lock());
        }

        match self.try_start(args) {
            Ok(Invocation::Run(mut session)) => {
                session.argv = argv;
                session
            }
            Ok(Invocation::Help(help)) => {
                print!("{help}");
                process::exit(sysexits::EX_USAGE_ERROR);
            }
            Ok(Invocation::Version(version)) => {
                println!("{version}");
                process::exit(sysexits::EX_OK);
            }
            Err(e) => match e.downcast_ref::<Error>() {
                Some(Error::InvalidArguments(message)) => {
                    self.show_help_and_exit(Some(message.as_str()))
                }
                Some(err) => {
                    eprintln!("error: {e:#}");
                    process::exit(err.exit_code());
                }
                None => {
                    eprintln!("error: {e:#}");
                    process::exit(sysexits::EX_CONFIG);
                }
            },
        }
    }

    /// Prints `message` (if any) to stderr, then the full usage, and exits
    /// with status 1.
    pub fn show_help_and_exit(&self, message: Option<&str>) -> ! {
        if let Some(message) = message {
            eprintln!("{message}\n");
        }
        match self.resolve() {
            Ok(spec) => print!("{}", spec.render_help()),
            Err(e) => eprintln!("error: {e}"),
        }
        process::exit(sysexits::EX_USAGE_ERROR);
    }
}

/// A running program instance: its options, its logger and, once asked for,
/// a private temporary directory removed when the session is dropped.
pub struct Session {
    name: String,
    argv: Vec<String>,
    pub options: ParsedOptions,
    pub logger: Logger,
    temp_dir: Option<TempDir>,
}

impl Session {
    pub fn new(name: &str, options: ParsedOptions, logger: Logger) -> Self {
        Self {
            name: name.to_string(),
            argv: vec![],
            options,
            logger,
            temp_dir: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The arguments the program was started with, program name first, as
    /// given: config files unexpanded and `--debug` still in place.
    pub fn argv(&self) -> &[String] {
        &self.argv
    }

    /// The session's temporary directory, created on first use.
    ///
    /// # Errors
    /// [`Error::TempDir`] if it cannot be created.
    pub fn temp_dir(&mut self) -> Result<&Path> {
        let dir = match self.temp_dir.take() {
            Some(dir) => dir,
            None => {
                let dir = tempfile::Builder::new()
                    .prefix(&format!("{}-", self.name))
                    .tempdir()
                    .map_err(Error::TempDir)?;
                self.logger
                    .debug(format_args!("Created temporary directory {}", dir.path().display()));
                dir
            }
        };
        Ok(self.temp_dir.insert(dir).path())
    }

    /// Builds a status retriever from the options `command_key` (falling back
    /// to `pg_controldata`) and `policy_key`.
    pub fn status_retriever(&self, command_key: &str, policy_key: &str) -> StatusRetriever {
        let command = self
            .options
            .string(command_key)
            .unwrap_or(DEFAULT_STATUS_COMMAND);
        let setting = self.options.string(policy_key);
        if let Some(setting) = setting.filter(|s| !EscalationPolicy::is_known_setting(s)) {
            self.logger.warn(format_args!(
                "Unknown --{policy_key} value '{setting}', status failures will stall the program"
            ));
        }
        StatusRetriever::new(command, EscalationPolicy::from_setting(setting))
    }

    /// Retrieves control data for `data_dir`, running the command inside the
    /// session's temporary directory.
    ///
    /// # Errors
    /// See [`StatusRetriever::retrieve`]; also [`Error::TempDir`].
    pub fn control_data(
        &mut self,
        retriever: &StatusRetriever,
        data_dir: &Path,
    ) -> Result<Option<StatusRecord>> {
        let workdir: PathBuf = self.temp_dir()?.to_path_buf();
        retriever.retrieve(data_dir, &workdir, &self.logger)
    }
}
