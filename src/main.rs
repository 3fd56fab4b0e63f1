// getML client - Main executable
// Author: Gabriel Demetrios Lafis

use anyhow::{bail, Context, Result};
use clap::{Arg, ArgMatches, Command};
use log::{debug, info};

use getml_client::{
    comm::Session,
    data::{DataFrame, Roles},
    project,
    utils::{init_logging, Config},
};

fn cli() -> Command<'static> {
    Command::new("getml-client")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Gabriel Demetrios Lafis")
        .about("Inspect and manage a getML engine")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Sets a custom config file")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .value_name("HOST")
                .help("Sets the engine host")
                .takes_value(true)
                .global(true),
        )
        .arg(
            Arg::new("port")
                .short('p')
                .long("port")
                .value_name("PORT")
                .help("Sets the engine port")
                .takes_value(true)
                .global(true),
        )
        .subcommand(Command::new("ping").about("Check that the engine answers"))
        .subcommand(
            Command::new("projects")
                .about("List projects")
                .arg(Arg::new("running").long("running").help("Only list running projects")),
        )
        .subcommand(
            Command::new("set-project")
                .about("Switch the engine to a project")
                .arg(Arg::new("name").required(true).takes_value(true)),
        )
        .subcommand(Command::new("data-frames").about("List the data frames of the current project"))
        .subcommand(Command::new("pipelines").about("List the pipelines of the current project"))
        .subcommand(
            Command::new("nrows")
                .about("Print the number of rows of a data frame")
                .arg(Arg::new("name").required(true).takes_value(true)),
        )
        .subcommand(
            Command::new("describe")
                .about("Print the roles of a data frame as JSON")
                .arg(Arg::new("name").required(true).takes_value(true)),
        )
}

/// Build the session from the config file, overridden by the command line
fn session(config: &Config, matches: &ArgMatches) -> Result<Session> {
    let mut config = config.clone();

    if let Some(host) = matches.value_of("host") {
        config.engine.host = host.to_string();
    }

    if let Some(port) = matches.value_of("port") {
        config.engine.port = port
            .parse()
            .with_context(|| format!("Invalid port '{}'", port))?;
    }

    Ok(config.session())
}

fn name_arg(matches: &ArgMatches) -> Result<&str> {
    matches.value_of("name").context("Missing data frame name")
}

fn run(matches: &ArgMatches, config: &Config) -> Result<()> {
    let mut session = session(config, matches)?;

    if let Some(name) = &config.project.name {
        info!("Connecting to project '{}'", name);
        session = project::set_project(&session, name)?;
    }

    match matches.subcommand() {
        Some(("ping", _)) => {
            if !session.is_alive() {
                bail!("No engine answers at {}:{}", session.host(), session.port());
            }
            println!("Engine is alive, project: {}", session.project_name()?);
        }
        Some(("projects", sub)) => {
            let projects = if sub.is_present("running") {
                project::list_running_projects(&session)?
            } else {
                project::list_projects(&session)?
            };

            for name in projects {
                println!("{}", name);
            }
        }
        Some(("set-project", sub)) => {
            let name = sub.value_of("name").context("Missing project name")?;
            let session = project::set_project(&session, name)?;
            println!("{}", session.port());
        }
        Some(("data-frames", _)) => {
            let listing = project::list_data_frames(&session)?;
            println!("In memory: {}", listing.in_memory.join(", "));
            println!("On disk:   {}", listing.on_disk.join(", "));
        }
        Some(("pipelines", _)) => {
            for id in project::list_pipelines(&session)? {
                println!("{}", id);
            }
        }
        Some(("nrows", sub)) => {
            let df = DataFrame::new(name_arg(sub)?, Roles::new())?;
            println!("{}", df.nrows(&session)?);
        }
        Some(("describe", sub)) => {
            let mut df = DataFrame::new(name_arg(sub)?, Roles::new())?;
            df.refresh(&session)?;
            println!("{}", serde_json::to_string_pretty(&df.roles().to_json())?);
        }
        _ => println!("No subcommand specified. Use --help for usage information."),
    }

    Ok(())
}

fn main() -> Result<()> {
    let matches = cli().get_matches();

    // Load configuration
    let config = match matches.value_of("config") {
        Some(path) => Config::from_file(path).with_context(|| format!("Error loading config file '{}'", path))?,
        None => Config::default(),
    };

    // Initialize logging
    if let Err(err) = init_logging(config.log_level_filter()) {
        eprintln!("Error initializing logger: {}", err);
    }

    debug!("Using engine at {}:{}", config.engine.host, config.engine.port);

    run(&matches, &config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_config() {
        let matches = cli().get_matches_from(vec!["getml-client", "--host", "engine", "--port", "2000", "pipelines"]);

        let session = session(&Config::default(), &matches).unwrap();

        assert_eq!(session.host(), "engine");
        assert_eq!(session.port(), 2000);
        assert_eq!(session.monitor_port(), 1711);
    }

    #[test]
    fn test_invalid_port() {
        let matches = cli().get_matches_from(vec!["getml-client", "--port", "high", "ping"]);

        assert!(session(&Config::default(), &matches).is_err());
    }
}
