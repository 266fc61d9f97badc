//! `--debug` as the very first argument dumps the process arguments and the
//! environment to stderr before anything else is parsed.

use std::env;
use std::io::{self, Write};

/// The literal first argument that triggers the dump.
pub const DEBUG_FLAG: &str = "--debug";

/// Splits a leading `--debug` off `args` (which exclude the program name).
pub fn strip_debug_flag(args: &[String]) -> (bool, &[String]) {
    match args.split_first() {
        Some((first, rest)) if first == DEBUG_FLAG => (true, rest),
        _ => (false, args),
    }
}

/// Writes `argv` and the sorted environment to `out`.
pub fn dump<W: Write>(argv: &[String], out: &mut W) -> io::Result<()> {
    writeln!(out, "Arguments:")?;
    for (index, arg) in argv.iter().enumerate() {
        writeln!(out, "  [{index}] {arg}")?;
    }

    let mut vars: Vec<(String, String)> = env::vars_os()
        .map(|(k, v)| {
            (
                k.to_string_lossy().into_owned(),
                v.to_string_lossy().into_owned(),
            )
        })
        .collect();
    vars.sort();
    writeln!(out, "Environment:")?;
    for (key, value) in vars {
        writeln!(out, "  {key}={value}")?;
    }
    out.flush()
}
