use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use punte::cli::{Cli, Command};
use punte::config;

fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Some(Command::CheckConfig) => {
            let cfg = config::env::build_config_from_env()?;
            config::validate_config(&cfg)?;
            println!("Configuration is valid.");
            println!("  Listen port:  {}", cfg.listen_port);
            println!("  Data dir:     {}", cfg.data_dir.display());
            println!(
                "  Auth:         {}",
                if cfg.use_auth { "enforced" } else { "disabled" }
            );
            println!(
                "  Allowed SSH hosts: {}",
                if cfg.allowed_ssh_hosts.is_empty() {
                    "(all)".to_string()
                } else {
                    cfg.allowed_ssh_hosts.join(", ")
                }
            );
            return Ok(());
        }
        Some(Command::HealthCheck { addr, timeout }) => {
            use std::net::TcpStream;
            use std::time::Duration;

            let timeout = Duration::from_secs(*timeout);
            let parsed = addr.parse().unwrap_or_else(|_| {
                eprintln!("Invalid address: {}", addr);
                std::process::exit(1);
            });
            match TcpStream::connect_timeout(&parsed, timeout) {
                Ok(_) => {
                    println!("OK: {} is reachable", addr);
                    return Ok(());
                }
                Err(e) => {
                    eprintln!("FAIL: {} is not reachable: {}", addr, e);
                    std::process::exit(1);
                }
            }
        }
        Some(Command::Completions { shell }) => {
            use clap::CommandFactory;
            let mut cmd = Cli::command();
            clap_complete::generate(*shell, &mut cmd, "punte", &mut std::io::stdout());
            return Ok(());
        }
        Some(Command::Manpage) => {
            use clap::CommandFactory;
            let cmd = Cli::command();
            let man = clap_mangen::Man::new(cmd);
            man.render(&mut std::io::stdout())?;
            return Ok(());
        }
        None => {}
    }

    let app_config = config::env::build_config_from_env()?;
    config::validate_config(&app_config)?;

    // Setup logging (CLI override > config)
    let log_level = cli
        .log_level
        .as_deref()
        .map(|s| s.to_string())
        .unwrap_or_else(|| app_config.logging.level.to_string());
    punte::logging::setup_logging(&log_level, app_config.logging.format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        port = app_config.listen_port,
        auth_enforced = app_config.use_auth,
        "Starting punte relay server"
    );

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        if let Err(e) = punte::server::run(app_config).await {
            error!(error = %e, "Server error");
            std::process::exit(1);
        }
    });

    Ok(())
}
