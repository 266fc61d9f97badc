//! Exit status codes shared by every pitr program.
//! reference: [SYSEXITS](https://man.freebsd.org/cgi/man.cgi?query=sysexits&apropos=0&sektion=0&manpath=FreeBSD+11.2-stable&arch=default&format=html)

/// value: 0 <br>
/// Successful termination, also used after printing the version.
pub const EX_OK: i32 = 0;

/// value: 1 <br>
/// Bad command line usage or an explicit `--help`. The pitr tools have always
/// exited with 1 here rather than `EX_USAGE`, and scripts depend on it.
pub const EX_USAGE_ERROR: i32 = 1;

/// value: 69 <br>
/// A service is unavailable. Used when the control data command cannot be run
/// or its output cannot be trusted.
pub const EX_UNAVAILABLE: i32 = 69;

/// value: 70 <br>
/// An internal software error has been detected, e.g. asking for a compression
/// plan without any destination.
pub const EX_SOFTWARE: i32 = 70;

/// value: 74 <br>
/// An error occurred while doing I/O on some file.
pub const EX_IOERR: i32 = 74;

/// value: 78 <br>
/// Something was found in an unconfigured or misconfigured state: unreadable or
/// malformed config files, a missing `--log`, a bad log template.
pub const EX_CONFIG: i32 = 78;
