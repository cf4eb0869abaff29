use std::path::Path;

use tracing::info;
use warden_core::config::WardenConfig;
use warden_sync::client::DirectoryClient;
use warden_sync::engine::SyncEngine;

/// Run the `sync` command: one reconciliation from local CSV files.
pub async fn run(
    config_path: &str,
    roster_path: &str,
    mapping_path: &str,
    dry_run: bool,
) -> anyhow::Result<()> {
    let config = WardenConfig::load(Path::new(config_path))?;
    config.validate()?;

    let roster = std::fs::read(roster_path)?;
    let mapping = std::fs::read(mapping_path)?;

    info!(roster_path, mapping_path, dry_run, "Starting reconciliation");

    let client = DirectoryClient::new(&config.directory);
    let engine = SyncEngine::new(client);

    let result = engine.execute_sync(&roster, &mapping, dry_run, false).await?;

    println!(
        "Reconciliation {}!",
        if dry_run { "preview" } else { "completed" }
    );
    println!("  Users processed: {}", result.users_processed);
    println!("  Users created:   {}", result.users_created);
    println!("  Users updated:   {}", result.users_updated);
    println!("  Users deleted:   {}", result.users_deleted);
    if dry_run {
        println!();
        println!("This was a dry run. No changes were made to users or grants.");
        println!("Run `warden sync` without --dry-run to apply changes.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn sync_requires_config_file() {
        let result = run("/nonexistent/warden.toml", "roster.csv", "mapping.csv", true).await;
        assert!(result.is_err());
    }
}
