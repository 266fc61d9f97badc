//! pitr-base: shared foundation of the pitr backup and recovery tools.
//!
//! This crate provides option resolution (declarative option tables, config
//! files spliced into the command line, help/version handling, the mandatory
//! log sink), control data retrieval with configurable failure escalation, and
//! compression planning across backup destinations.

pub mod args;
pub mod config_file;
pub mod debug;
pub mod destination;
pub mod error;
pub mod logging;
pub mod option_spec;
pub mod options;
mod path;
pub mod program;
pub mod status;
pub mod sysexits;

pub use destination::{CompressFormat, Destination, DestinationClass, DestinationSet};
pub use error::{Error, Result};
pub use logging::Logger;
pub use option_spec::{CanonicalSpec, OptionDef, OptionSpec, OptionValue, ValueType};
pub use options::ParsedOptions;
pub use program::{Invocation, Program, Session};
pub use status::{EscalationPolicy, StatusRecord, StatusRetriever};
