use clap::Parser;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "warden", about = "Directory reconciliation service", version)]
struct Cli {
    /// Path to configuration file
    #[arg(long, default_value = "warden.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run one reconciliation from local CSV files
    Sync {
        /// Path to the user roster CSV
        roster: String,
        /// Path to the group-mapping CSV
        mapping: String,
        /// Preview changes without applying
        #[arg(long)]
        dry_run: bool,
    },
    /// Start the sync and SCIM web service
    Serve {
        /// Port to listen on (overrides the configured port)
        #[arg(long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Sync {
            roster,
            mapping,
            dry_run,
        } => {
            commands::sync::run(&cli.config, &roster, &mapping, dry_run).await?;
        }
        Commands::Serve { port } => {
            commands::serve::run(&cli.config, port).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn cli_parse_sync() {
        let cli = Cli::parse_from(["warden", "sync", "roster.csv", "mapping.csv"]);
        assert_eq!(cli.config, "warden.toml");
        match cli.command {
            Commands::Sync {
                roster,
                mapping,
                dry_run,
            } => {
                assert_eq!(roster, "roster.csv");
                assert_eq!(mapping, "mapping.csv");
                assert!(!dry_run);
            }
            _ => panic!("expected Sync command"),
        }
    }

    #[test]
    fn cli_parse_sync_dry_run() {
        let cli = Cli::parse_from(["warden", "sync", "roster.csv", "mapping.csv", "--dry-run"]);
        match cli.command {
            Commands::Sync { dry_run, .. } => {
                assert!(dry_run);
            }
            _ => panic!("expected Sync command"),
        }
    }

    #[test]
    fn cli_parse_custom_config() {
        let cli = Cli::parse_from(["warden", "--config", "/etc/warden.toml", "serve"]);
        assert_eq!(cli.config, "/etc/warden.toml");
    }

    #[test]
    fn cli_parse_serve_defaults() {
        let cli = Cli::parse_from(["warden", "serve"]);
        match cli.command {
            Commands::Serve { port } => {
                assert!(port.is_none());
            }
            _ => panic!("expected Serve command"),
        }
    }

    #[test]
    fn cli_parse_serve_custom_port() {
        let cli = Cli::parse_from(["warden", "serve", "--port", "3000"]);
        match cli.command {
            Commands::Serve { port } => {
                assert_eq!(port, Some(3000));
            }
            _ => panic!("expected Serve command"),
        }
    }

    #[test]
    fn cli_sync_requires_both_files() {
        let result = Cli::try_parse_from(["warden", "sync", "roster.csv"]);
        assert!(result.is_err());
    }
}
