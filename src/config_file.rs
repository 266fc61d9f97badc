//! Config files as argument injection.
//!
//! A config file is a plain list of command-line options, one per line:
//!
//! ```text
//! # comments and blank lines are ignored
//! --verbose
//! --data-dir /var/lib/postgresql/data
//! --log=/var/log/pitr/status-^Y-^m-^d.log
//! --dst-local gzip=/mnt/backup dir with spaces
//! ```
//!
//! Everything after the separator is taken verbatim, so values need no quoting.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Reads `path` and returns the command-line tokens it stands for, in order.
///
/// # Errors
/// [`Error::ConfigRead`] if the file cannot be opened or read,
/// [`Error::ConfigParse`] on the first line that is not an option.
pub fn expand(path: &Path) -> Result<Vec<String>> {
    let read_error = |source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    };
    let reader = BufReader::new(File::open(path).map_err(read_error)?);

    let mut tokens = vec![];
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(read_error)?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match split_line(line) {
            Some((option, None)) => tokens.push(option.to_string()),
            Some((option, Some(value))) => {
                tokens.push(option.to_string());
                tokens.push(value.to_string());
            }
            None => {
                return Err(Error::ConfigParse {
                    path: path.to_path_buf(),
                    line_no: index + 1,
                    line: line.to_string(),
                });
            }
        }
    }
    Ok(tokens)
}

/// Splits a trimmed line into the option token and its verbatim value.
fn split_line(line: &str) -> Option<(&str, Option<&str>)> {
    if !line.starts_with('-') {
        return None;
    }
    let end = line
        .find(|c: char| c == '=' || c.is_whitespace())
        .unwrap_or(line.len());
    let (option, rest) = line.split_at(end);
    if option.trim_start_matches('-').is_empty() {
        return None;
    }
    if rest.is_empty() {
        return Some((option, None));
    }

    let rest = rest.trim_start();
    let value = match rest.strip_prefix('=') {
        Some(value) => value.trim_start(),
        None => rest,
    };
    Some((option, Some(value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_split_line() {
        assert_eq!(split_line("--verbose"), Some(("--verbose", None)));
        assert_eq!(split_line("-v"), Some(("-v", None)));
        assert_eq!(split_line("--log=/tmp/x"), Some(("--log", Some("/tmp/x"))));
        assert_eq!(split_line("--log = /tmp/x"), Some(("--log", Some("/tmp/x"))));
        assert_eq!(split_line("--log\t/tmp/x"), Some(("--log", Some("/tmp/x"))));
        assert_eq!(split_line("--name="), Some(("--name", Some(""))));
        assert_eq!(split_line("verbose"), None);
        assert_eq!(split_line("-- value"), None);
        assert_eq!(split_line("-"), None);
    }

    #[test]
    fn test_value_taken_verbatim() {
        assert_eq!(
            split_line("--dst-local gzip=/mnt/backup dir \"quoted\""),
            Some(("--dst-local", Some("gzip=/mnt/backup dir \"quoted\"")))
        );
    }

    #[test]
    fn test_expand_skips_comments_and_blanks() {
        let file = config(
            "# leading comment\n\n--verbose\n   # indented comment\n--data-dir /var/lib/pg  \n\t\n-D=/other\n",
        );
        let tokens = expand(file.path()).unwrap();
        assert_eq!(
            tokens,
            vec!["--verbose", "--data-dir", "/var/lib/pg", "-D", "/other"]
        );
    }

    #[test]
    fn test_expand_empty_file() {
        let file = config("# nothing to see\n");
        assert!(expand(file.path()).unwrap().is_empty());
    }

    #[test]
    fn test_expand_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = expand(&dir.path().join("missing.cfg")).unwrap_err();
        assert!(matches!(err, Error::ConfigRead { .. }));
    }

    #[test]
    fn test_expand_reports_bad_line() {
        let file = config("--verbose\nthis is not an option\n");
        match expand(file.path()) {
            Err(Error::ConfigParse { line_no, line, .. }) => {
                assert_eq!(line_no, 2);
                assert_eq!(line, "this is not an option");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
