use anyhow::{Context, Result, bail};
use pitr_base::status::{REDO_LOCATION_FIELD, TIMELINE_FIELD};
use pitr_base::{
    DestinationSet, OptionDef, OptionSpec, OptionValue, Program, Session, sysexits,
};
use std::path::{Path, PathBuf};
use std::process;

/// Options of pitr-status, on top of the ones every pitr program has.
fn option_spec() -> OptionSpec {
    OptionSpec::new()
        .option(
            "data-dir",
            OptionDef::string()
                .alias("D")
                .help("Data directory of the database cluster"),
        )
        .option(
            "status-cmd",
            OptionDef::string()
                .alias("s")
                .default(OptionValue::Str("pg_controldata".into()))
                .help("Command printing the control data of a data directory"),
        )
        .option(
            "on-status-error",
            OptionDef::string()
                .help("What to do if control data is unavailable: break, ignore or hang"),
        )
        .option(
            "dst-local",
            OptionDef::repeated()
                .alias("dl")
                .help("Local destination, FORMAT=DIRECTORY"),
        )
        .option(
            "dst-remote",
            OptionDef::repeated()
                .alias("dr")
                .help("Remote destination, FORMAT=HOST:DIRECTORY"),
        )
        .option(
            "dst-direct",
            OptionDef::repeated().help("Direct stream destination, FORMAT=TARGET"),
        )
        .option(
            "dst-pipe",
            OptionDef::repeated().help("Program to pipe data to, FORMAT=PROGRAM"),
        )
        .option(
            "destinations",
            OptionDef::string().help("TOML file listing further destinations"),
        )
        .option(
            "verbose",
            OptionDef::flag().alias("v").help("Log debug messages too"),
        )
}

/// Entry point for pitr-status.
/// Prints the checkpoint location and timeline of a cluster, and the
/// compressions its configured destinations need.
fn main() {
    let program = Program::new("pitr-status", env!("CARGO_PKG_VERSION"), option_spec())
        .about("Show control data and compression plan of a PostgreSQL cluster")
        .normalize_with(|options, logger| {
            if options.string("data-dir").is_none_or(str::is_empty) {
                bail!("--data-dir is required");
            }
            logger.debug(format_args!(
                "Options: {}",
                options.keys().collect::<Vec<_>>().join(", ")
            ));
            Ok(())
        });

    let mut session = program.start();
    if let Err(e) = run(&mut session) {
        let code = e
            .downcast_ref::<pitr_base::Error>()
            .map_or(sysexits::EX_SOFTWARE, pitr_base::Error::exit_code);
        eprintln!("error: {e:#}");
        // Remove the temporary directory before exiting.
        drop(session);
        process::exit(code);
    }
}

fn run(session: &mut Session) -> Result<()> {
    let data_dir: PathBuf = session
        .options
        .string("data-dir")
        .map(PathBuf::from)
        .unwrap_or_default();

    session.logger.time_start("control data");
    let retriever = session.status_retriever("status-cmd", "on-status-error");
    match session.control_data(&retriever, &data_dir)? {
        Some(record) => {
            for (label, value) in record.iter() {
                session.logger.debug(format_args!("[{label}] = [{value}]"));
            }
            for field in [REDO_LOCATION_FIELD, TIMELINE_FIELD] {
                let value = record.get(field).unwrap_or_default();
                session.logger.info(format_args!("{field}: {value}"));
                println!("{field}: {value}");
            }
        }
        None => session.logger.warn("Continuing without control data"),
    }
    session.logger.time_finish("control data");

    let mut destinations = DestinationSet::from_options(&session.options)?;
    if let Some(file) = session.options.string("destinations") {
        let loaded = DestinationSet::load(Path::new(file))
            .with_context(|| format!("Loading destinations from {file}"))?;
        destinations.merge(loaded);
    }
    if destinations.is_empty() {
        session.logger.info("No destinations configured");
        return Ok(());
    }

    for (class, destination) in destinations.iter() {
        session.logger.debug(format_args!(
            "{class:?} destination {} ({})",
            destination.target, destination.compression
        ));
    }
    let formats = destinations.required_compressions()?;
    let formats: Vec<&str> = formats.iter().map(|f| f.name()).collect();
    session
        .logger
        .info(format_args!("Required compressions: {}", formats.join(", ")));
    println!("Required compressions: {}", formats.join(", "));
    Ok(())
}
