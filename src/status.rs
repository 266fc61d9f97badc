//! Control data retrieval.
//!
//! Runs the status command (`pg_controldata` by default) against a data
//! directory, parses its `Label: value` output and makes sure the checkpoint
//! location and timeline are there. How a failure is handled depends on the
//! configured [`EscalationPolicy`].

use crate::error::{Error, Result};
use crate::logging::Logger;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

/// Status command used when none is configured.
pub const DEFAULT_STATUS_COMMAND: &str = "pg_controldata";
/// Checkpoint location field, mandatory.
pub const REDO_LOCATION_FIELD: &str = "Latest checkpoint's REDO location";
/// Timeline field, mandatory.
pub const TIMELINE_FIELD: &str = "Latest checkpoint's TimeLineID";

const MANDATORY_FIELDS: [&str; 2] = [REDO_LOCATION_FIELD, TIMELINE_FIELD];
const STALL_INTERVAL: Duration = Duration::from_secs(600);

/// What to do when control data cannot be retrieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EscalationPolicy {
    /// Log as fatal and return the error; the program terminates.
    FailFast,
    /// Log as error and carry on without control data.
    Degrade,
    /// Log as error and block forever, waiting for someone to fix things.
    Stall,
}

impl EscalationPolicy {
    /// Maps a configured value to a policy: nothing or `break` fails fast,
    /// `ignore` degrades, and every other value (`hang`, but also typos)
    /// stalls.
    pub fn from_setting(setting: Option<&str>) -> Self {
        match setting {
            None | Some("break") => EscalationPolicy::FailFast,
            Some("ignore") => EscalationPolicy::Degrade,
            Some(_) => EscalationPolicy::Stall,
        }
    }

    /// True for the values with a documented meaning.
    pub fn is_known_setting(setting: &str) -> bool {
        matches!(setting, "break" | "ignore" | "hang")
    }
}

/// Fields reported by the status command, keyed by label.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusRecord {
    fields: BTreeMap<String, String>,
}

impl StatusRecord {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields.get(label).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn redo_location(&self) -> Option<&str> {
        self.get(REDO_LOCATION_FIELD)
    }

    pub fn timeline(&self) -> Option<&str> {
        self.get(TIMELINE_FIELD)
    }
}

/// Parses `Label: value` lines. Later labels overwrite earlier ones; blank
/// lines are skipped.
///
/// # Errors
/// [`Error::UnparseableStatusLine`] for the first line without a label.
pub fn parse_status(output: &str) -> Result<StatusRecord> {
    let mut fields = BTreeMap::new();
    for line in output.lines().map(str::trim_end) {
        if line.is_empty() {
            continue;
        }
        match line.split_once(':') {
            Some((label, value)) if !label.is_empty() => {
                fields.insert(label.to_string(), value.trim_start().to_string());
            }
            _ => {
                return Err(Error::UnparseableStatusLine {
                    line: line.to_string(),
                    response: output.to_string(),
                });
            }
        }
    }
    Ok(StatusRecord { fields })
}

fn check_mandatory(record: &StatusRecord) -> Result<()> {
    for field in MANDATORY_FIELDS {
        if record.get(field).is_none_or(str::is_empty) {
            return Err(Error::MissingStatusField {
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

/// Runs the status command and applies the escalation policy.
#[derive(Debug, Clone)]
pub struct StatusRetriever {
    command: PathBuf,
    args: Vec<String>,
    policy: EscalationPolicy,
}

impl StatusRetriever {
    pub fn new(command: impl Into<PathBuf>, policy: EscalationPolicy) -> Self {
        Self {
            command: command.into(),
            args: vec![],
            policy,
        }
    }

    /// Arguments placed before the target path, e.g. for a wrapper command.
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn policy(&self) -> EscalationPolicy {
        self.policy
    }

    fn display_command(&self) -> String {
        let mut s = self.command.display().to_string();
        for arg in &self.args {
            s.push(' ');
            s.push_str(arg);
        }
        s
    }

    /// Runs the command for `target` inside `workdir` and returns its
    /// validated output, without escalation.
    ///
    /// # Errors
    /// [`Error::StatusCommandFailure`] if the command cannot be run or exits
    /// non-zero, [`Error::UnparseableStatusLine`] and
    /// [`Error::MissingStatusField`] for bad output.
    pub fn fetch(&self, target: &Path, workdir: &Path) -> Result<StatusRecord> {
        let failure = |reason: String| Error::StatusCommandFailure {
            command: self.display_command(),
            reason,
        };
        let output = Command::new(&self.command)
            .args(&self.args)
            .arg(target)
            .current_dir(workdir)
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .output()
            .map_err(|e| failure(e.to_string()))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(failure(format!("{} {}", output.status, stderr.trim())));
        }

        let record = parse_status(&String::from_utf8_lossy(&output.stdout))?;
        check_mandatory(&record)?;
        Ok(record)
    }

    /// Like [`fetch`](Self::fetch), with failures escalated per policy.
    ///
    /// Returns `Ok(None)` when the policy is [`EscalationPolicy::Degrade`] and
    /// the retrieval failed. With [`EscalationPolicy::Stall`] a failure never
    /// returns.
    ///
    /// # Errors
    /// The retrieval error under [`EscalationPolicy::FailFast`].
    pub fn retrieve(
        &self,
        target: &Path,
        workdir: &Path,
        logger: &Logger,
    ) -> Result<Option<StatusRecord>> {
        let err = match self.fetch(target, workdir) {
            Ok(record) => return Ok(Some(record)),
            Err(err) => err,
        };
        let message = format!(
            "Cannot get control data for {} using '{}': {err}",
            target.display(),
            self.display_command()
        );
        match self.policy {
            EscalationPolicy::FailFast => {
                logger.fatal(&message);
                Err(err)
            }
            EscalationPolicy::Degrade => {
                logger.error(&message);
                Ok(None)
            }
            EscalationPolicy::Stall => {
                logger.error(&message);
                stall(logger)
            }
        }
    }
}

/// Blocks the program for good. Only killing the process ends it.
fn stall(logger: &Logger) -> ! {
    logger.error("Stalling until the problem is fixed and this process is killed");
    loop {
        thread::sleep(STALL_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTROL_DATA: &str =
        "Latest checkpoint's REDO location: 0/1629D20\nLatest checkpoint's TimeLineID: 3\n";

    #[test]
    fn test_policy_from_setting() {
        assert_eq!(EscalationPolicy::from_setting(None), EscalationPolicy::FailFast);
        assert_eq!(
            EscalationPolicy::from_setting(Some("break")),
            EscalationPolicy::FailFast
        );
        assert_eq!(
            EscalationPolicy::from_setting(Some("ignore")),
            EscalationPolicy::Degrade
        );
        assert_eq!(
            EscalationPolicy::from_setting(Some("hang")),
            EscalationPolicy::Stall
        );
        assert_eq!(
            EscalationPolicy::from_setting(Some("ignroe")),
            EscalationPolicy::Stall
        );
        assert!(!EscalationPolicy::is_known_setting("ignroe"));
    }

    #[test]
    fn test_parse_control_data() {
        let record = parse_status(CONTROL_DATA).unwrap();
        assert_eq!(record.len(), 2);
        assert_eq!(record.redo_location(), Some("0/1629D20"));
        assert_eq!(record.timeline(), Some("3"));
        assert!(check_mandatory(&record).is_ok());
    }

    #[test]
    fn test_parse_keeps_colons_in_value_and_last_label_wins() {
        let record = parse_status(
            "Database cluster state:               in production   \n\
             pg_control last modified:             Mon 12 Oct 2026 10:11:12 AM UTC\n\
             Database cluster state: shut down\n\n",
        )
        .unwrap();
        assert_eq!(record.get("Database cluster state"), Some("shut down"));
        assert_eq!(
            record.get("pg_control last modified"),
            Some("Mon 12 Oct 2026 10:11:12 AM UTC")
        );
    }

    #[test]
    fn test_unparseable_line() {
        let output = "Latest checkpoint's TimeLineID: 3\nWARNING calculated CRC mismatch\n";
        match parse_status(output) {
            Err(Error::UnparseableStatusLine { line, response }) => {
                assert_eq!(line, "WARNING calculated CRC mismatch");
                assert_eq!(response, output);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert!(parse_status(": no label").is_err());
    }

    #[test]
    fn test_missing_fields() {
        let record = parse_status("Latest checkpoint's REDO location: 0/1629D20\n").unwrap();
        match check_mandatory(&record) {
            Err(Error::MissingStatusField { field }) => assert_eq!(field, TIMELINE_FIELD),
            other => panic!("unexpected result: {other:?}"),
        }

        let record = parse_status(
            "Latest checkpoint's REDO location:\nLatest checkpoint's TimeLineID: 1\n",
        )
        .unwrap();
        assert!(matches!(
            check_mandatory(&record),
            Err(Error::MissingStatusField { .. })
        ));
    }

    #[test]
    fn test_missing_command() {
        let dir = tempfile::tempdir().unwrap();
        let retriever = StatusRetriever::new(
            dir.path().join("no-such-command"),
            EscalationPolicy::FailFast,
        );
        let err = retriever.fetch(dir.path(), dir.path()).unwrap_err();
        assert!(matches!(err, Error::StatusCommandFailure { .. }));
    }

    #[cfg(unix)]
    mod command {
        use super::*;
        use crate::logging::LogDestination;
        use std::fs;
        use tracing::Level;

        /// Retriever running `script` through `sh`, with `target` as `$1`.
        fn retriever(dir: &Path, script: &str, policy: EscalationPolicy) -> StatusRetriever {
            let path = dir.join("status.sh");
            fs::write(&path, script).unwrap();
            StatusRetriever::new("/bin/sh", policy).with_args([path.to_string_lossy()])
        }

        fn logger(dir: &Path) -> (Logger, PathBuf) {
            let logger = Logger::open(&dir.join("test.log").to_string_lossy(), Level::INFO)
                .unwrap();
            let LogDestination::File(path) = logger.destination().clone() else {
                panic!("expected a file logger");
            };
            (logger, path)
        }

        #[test]
        fn test_fetch_runs_in_workdir_with_target() {
            let dir = tempfile::tempdir().unwrap();
            let workdir = tempfile::tempdir().unwrap();
            let retriever = retriever(
                dir.path(),
                &format!(
                    "printf '%s\\n' \"{}: $1\" \"{}: 3\" \"Workdir: $(pwd)\"\n",
                    REDO_LOCATION_FIELD, TIMELINE_FIELD
                ),
                EscalationPolicy::FailFast,
            );
            let record = retriever
                .fetch(Path::new("/var/lib/pgdata"), workdir.path())
                .unwrap();
            assert_eq!(record.redo_location(), Some("/var/lib/pgdata"));
            assert_eq!(record.timeline(), Some("3"));
            let expected = workdir.path().canonicalize().unwrap();
            assert_eq!(record.get("Workdir").map(PathBuf::from), Some(expected));
        }

        #[test]
        fn test_non_zero_exit() {
            let dir = tempfile::tempdir().unwrap();
            let retriever = retriever(
                dir.path(),
                "echo 'could not open file global/pg_control' >&2\nexit 1\n",
                EscalationPolicy::FailFast,
            );
            match retriever.fetch(dir.path(), dir.path()) {
                Err(Error::StatusCommandFailure { reason, .. }) => {
                    assert!(reason.contains("could not open file global/pg_control"));
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }

        #[test]
        fn test_fail_fast_returns_error_and_logs_fatal() {
            let dir = tempfile::tempdir().unwrap();
            let (logger, log) = logger(dir.path());
            let retriever = retriever(
                dir.path(),
                &format!("echo \"{REDO_LOCATION_FIELD}: 0/1629D20\"\n"),
                EscalationPolicy::FailFast,
            );
            let err = retriever.retrieve(dir.path(), dir.path(), &logger).unwrap_err();
            assert!(matches!(err, Error::MissingStatusField { .. }));
            let content = fs::read_to_string(log).unwrap();
            assert!(content.contains("fatal=true"));
        }

        #[test]
        fn test_degrade_returns_none() {
            let dir = tempfile::tempdir().unwrap();
            let (logger, log) = logger(dir.path());
            let retriever = retriever(
                dir.path(),
                "echo 'garbage without a label'\n",
                EscalationPolicy::Degrade,
            );
            let record = retriever.retrieve(dir.path(), dir.path(), &logger).unwrap();
            assert!(record.is_none());
            let content = fs::read_to_string(log).unwrap();
            assert!(content.contains("ERROR"));
            assert!(content.contains("garbage without a label"));
        }

        #[test]
        fn test_retrieve_success() {
            let dir = tempfile::tempdir().unwrap();
            let (logger, _) = logger(dir.path());
            let retriever = retriever(
                dir.path(),
                &format!("cat <<'EOF'\n{CONTROL_DATA}EOF\n"),
                EscalationPolicy::Stall,
            );
            let record = retriever
                .retrieve(dir.path(), dir.path(), &logger)
                .unwrap()
                .unwrap();
            assert_eq!(record.len(), 2);
            assert_eq!(record.redo_location(), Some("0/1629D20"));
        }
    }
}
