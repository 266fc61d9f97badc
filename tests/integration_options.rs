use pitr_base::args;
use pitr_base::{
    CanonicalSpec, Error, Invocation, OptionDef, OptionSpec, OptionValue, ParsedOptions, Program,
};
use std::fs;
use tempfile::tempdir;

fn spec() -> OptionSpec {
    OptionSpec::new()
        .option("data-dir", OptionDef::string().alias("D"))
        .option("verbose", OptionDef::flag().alias("v"))
        .option("temp-dir", OptionDef::string().default(OptionValue::Str("/tmp".into())))
        .option("parallel", OptionDef::integer().alias("p"))
        .option("dst-local", OptionDef::repeated())
        .option("label", OptionDef::string())
}

fn args(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn options(program: &Program, argv: &[String]) -> ParsedOptions {
    match program.try_start(argv) {
        Ok(Invocation::Run(session)) => session.options.clone(),
        Ok(_) => panic!("help or version requested"),
        Err(e) => panic!("start failed: {e:#}"),
    }
}

#[test]
fn test_parse_is_pure() {
    let canonical = CanonicalSpec::resolve("pitr-test", "1.0", None, &spec()).unwrap();
    let argv = args(&["-v", "-p", "4", "--dst-local", "a", "--dst-local=b", "pos1", "pos2"]);
    let first = args::parse(&canonical, &argv).unwrap();
    let second = args::parse(&canonical, &argv).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.positional, args(&["pos1", "pos2"]));
}

#[test]
fn test_only_given_or_defaulted_keys_present() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("x.log");
    let program = Program::new("pitr-test", "1.0", spec());
    let parsed = options(&program, &args(&["--log", &log.to_string_lossy(), "-D", "/pg"]));
    let mut keys: Vec<&str> = parsed.keys().collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["data-dir", "temp-dir"]);
    assert!(!parsed.flag("verbose"));
    assert_eq!(parsed.integer("parallel"), None);
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("x.log");
    let cfg = dir.path().join("pitr.cfg");
    fs::write(
        &cfg,
        format!(
            "--log {}\n--label=weekly full\n-p 8\n--dst-local gzip=/mnt/a\n",
            log.display()
        ),
    )
    .unwrap();
    let program = Program::new("pitr-test", "1.0", spec());

    let from_file = options(&program, &args(&["--config", &cfg.to_string_lossy()]));
    let direct = options(
        &program,
        &args(&[
            "--log",
            &log.to_string_lossy(),
            "--label",
            "weekly full",
            "-p",
            "8",
            "--dst-local",
            "gzip=/mnt/a",
        ]),
    );
    assert_eq!(from_file, direct);
    assert_eq!(direct.integer("parallel"), Some(8));
}

#[test]
fn test_later_scalar_wins() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("x.log");
    let cfg = dir.path().join("pitr.cfg");
    fs::write(&cfg, "--label from-file\n--dst-local /mnt/file\n").unwrap();
    let program = Program::new("pitr-test", "1.0", spec());
    let log = log.to_string_lossy();
    let cfg = cfg.to_string_lossy();

    let parsed = options(
        &program,
        &args(&["--log", &log, "--label", "first", "--cfg", &cfg, "--label", "last"]),
    );
    assert_eq!(parsed.string("label"), Some("last"));

    let parsed = options(
        &program,
        &args(&["--log", &log, "--label", "first", "--dst-local", "/mnt/cli", "--cfg", &cfg]),
    );
    assert_eq!(parsed.string("label"), Some("from-file"));
    assert_eq!(
        parsed.list("dst-local"),
        &["/mnt/cli".to_string(), "/mnt/file".to_string()]
    );
}

#[test]
fn test_missing_log_stops_before_normalization() {
    let program = Program::new("pitr-test", "1.0", spec()).normalize_with(|_, _| {
        panic!("program-specific normalization must not run");
    });
    let err = match program.try_start(&args(&["-D", "/pg"])) {
        Err(err) => err,
        Ok(_) => panic!("started without --log"),
    };
    assert!(matches!(
        err.downcast_ref::<Error>(),
        Some(Error::MissingMandatoryOption { .. })
    ));
}

#[test]
fn test_invalid_arguments() {
    let program = Program::new("pitr-test", "1.0", spec());
    for argv in [
        args(&["--log", "-", "--nope"]),
        args(&["--log", "-", "-p", "many"]),
        args(&["--log"]),
    ] {
        let err = match program.try_start(&argv) {
            Err(err) => err,
            Ok(_) => panic!("{argv:?} accepted"),
        };
        assert!(
            matches!(err.downcast_ref::<Error>(), Some(Error::InvalidArguments(_))),
            "{argv:?}: {err:#}"
        );
    }
}

#[test]
fn test_values_starting_with_dash() {
    let dir = tempdir().unwrap();
    let log = dir.path().join("x.log");
    let cfg = dir.path().join("pitr.cfg");
    fs::write(&cfg, format!("--log {}\n--label=-avz --delete\n", log.display())).unwrap();
    let program = Program::new("pitr-test", "1.0", spec());

    let parsed = options(&program, &args(&["--config", &cfg.to_string_lossy()]));
    assert_eq!(parsed.string("label"), Some("-avz --delete"));

    let parsed = options(
        &program,
        &args(&["--log", &log.to_string_lossy(), "--label", "-avz", "-p", "-2"]),
    );
    assert_eq!(parsed.string("label"), Some("-avz"));
    assert_eq!(parsed.integer("parallel"), Some(-2));
}
