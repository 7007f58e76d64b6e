//! # Migrate Command Handler
//!
//! Applies or reverts the embedded schema migrations.

use sqlx::PgPool;

use crate::cli_utils;
use crate::sql::MIGRATOR;

const MIGRATE_USAGE: &str = "Usage: schoolctl migrate [up|down]";

/// Handles `schoolctl migrate [up|down]`; `up` is the default.
pub async fn handle_migrate_command(args: &[String], pool: &PgPool) {
    match args.first().map(String::as_str) {
        None | Some("up") => {
            if let Err(e) = MIGRATOR.run(pool).await {
                cli_utils::exit_with_error(&format!("Migration failed: {}", e));
            }
            cli_utils::print_success("Migrations completed successfully");
        }
        Some("down") => {
            let Some(latest) = MIGRATOR.iter().map(|m| m.version).max() else {
                cli_utils::exit_with_error("No migrations are embedded");
            };
            // Undo every migration newer than the one before the latest.
            let target = MIGRATOR
                .iter()
                .map(|m| m.version)
                .filter(|v| *v < latest)
                .max()
                .unwrap_or(0);
            if let Err(e) = MIGRATOR.undo(pool, target).await {
                cli_utils::exit_with_error(&format!("Revert failed: {}", e));
            }
            cli_utils::print_success(&format!("Reverted migration {}", latest));
        }
        Some(other) => cli_utils::exit_with_usage_error(
            &format!("Unknown migrate direction '{}'", other),
            MIGRATE_USAGE,
        ),
    }
}
