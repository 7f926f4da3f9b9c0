use anyhow::{anyhow, Result};
use clap::{Arg, ArgAction, Command};
use pamgate::{Config, CredentialVerifier};
use std::path::Path;
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let matches = Command::new("pamcheck")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Check whether PAM authentication is usable on this host")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("pamcheck.yml"),
        )
        .arg(
            Arg::new("generate-config")
                .short('g')
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .conflicts_with("config"),
        )
        .arg(
            Arg::new("service")
                .short('s')
                .long("service")
                .value_name("NAME")
                .help("PAM service to authenticate against (overrides the config file)"),
        )
        .arg(
            Arg::new("user")
                .short('u')
                .long("user")
                .value_name("NAME")
                .help("Verify this user; the password is read from one line of stdin"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(ArgAction::Count),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .help("Suppress all output except errors")
                .action(ArgAction::SetTrue)
                .conflicts_with("verbose"),
        )
        .get_matches();

    if let Some(config_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(config_path)?;
        return Ok(ExitCode::SUCCESS);
    }

    let config_path = matches
        .get_one::<String>("config")
        .ok_or_else(|| anyhow!("No configuration file given"))?;

    let mut config = if Path::new(config_path).exists() {
        match Config::load_from_file(config_path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load configuration from {}: {}", config_path, e);
                eprintln!("Using default configuration. Run with --generate-config to create a template.");
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    if let Some(service) = matches.get_one::<String>("service") {
        config.pam.service = service.clone();
        config.validate()?;
    }

    let _guard = setup_logging(&config, &matches)?;

    info!("Checking PAM service '{}'", config.pam.service);

    let verifier = CredentialVerifier::system(&config.pam.service);
    let availability = verifier.availability().await;
    print!("{}", serde_yaml::to_string(&availability)?);

    if !availability.available {
        error!(
            "PAM is unavailable: {}",
            availability.error.as_deref().unwrap_or("unknown reason")
        );
        return Ok(ExitCode::FAILURE);
    }

    if let Some(username) = matches.get_one::<String>("user") {
        let password = read_password().await?;

        if verifier.verify_credentials(username, &password).await {
            println!("accepted: true");
        } else {
            warn!("Invalid credentials for '{}'", username);
            println!("accepted: false");
            return Ok(ExitCode::FAILURE);
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn generate_default_config(path: &str) -> Result<()> {
    let config = Config::default();
    config.save_to_file(path)?;

    println!("Generated default configuration file: {}", path);
    println!("Edit this file to choose the PAM service and logging settings.");

    Ok(())
}

/// Reads the password verbatim, dropping only the line terminator.
async fn read_password() -> Result<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;

    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }

    Ok(line)
}

fn setup_logging(config: &Config, matches: &clap::ArgMatches) -> Result<Option<WorkerGuard>> {
    let filter = if matches.get_flag("quiet") {
        EnvFilter::new("error")
    } else {
        match matches.get_count("verbose") {
            0 => EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    let console = config.logging.console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
    });

    let (file, guard) = match &config.logging.file {
        Some(path) => {
            let path = Path::new(path);
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow!("Invalid log file path: {}", path.display()))?;

            let (writer, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::never(dir, name));
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(file)
        .try_init()?;

    Ok(guard)
}
