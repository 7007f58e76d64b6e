use std::sync::Arc;

use arrrg::CommandLine;
use arrrg_derive::CommandLine;

use schoolhouse::{
    SchoolHandlers, TracingEventPublisher,
    cli_utils::{self, OutputFormat},
    commands::{
        CommandContext, errors::format_cli_error, handle_migrate_command, handle_school_command,
        handle_student_command,
    },
    config::AppConfig,
    logging::{self, LogFormat},
    sql::PgRepository,
};

#[derive(CommandLine, Default, PartialEq, Eq)]
struct Options {
    #[arrrg(optional, "PostgreSQL database URL")]
    database_url: Option<String>,
    #[arrrg(optional, "Update strategy: aggregate or selective")]
    strategy: Option<String>,
    #[arrrg(optional, "Output format: json or yaml (default: json)")]
    output: Option<String>,
    #[arrrg(flag, "Enable verbose logging")]
    verbose: bool,
    #[arrrg(flag, "Write log lines as JSON")]
    log_json: bool,
}

const USAGE: &str = r#"Usage: schoolctl [options] <command> [args...]

Options:
  --database-url <url>   PostgreSQL URL (default: $SCHOOLHOUSE_DATABASE_URL or $DATABASE_URL)
  --strategy <name>      Update strategy: aggregate or selective (default: aggregate)
  --output <format>      Output format: json or yaml (default: json)
  --verbose              Enable verbose logging
  --log-json             Write log lines as JSON

Commands:
  migrate [up|down]                                   Apply or revert schema migrations
  school create <capacity> <name...>                  Create a school
  school get <school-id>                              Show a school and its students
  school update <school-id> [name=<n>] [capacity=<n>] Rename and/or resize a school
  school delete <school-id>                           Delete a school and its students
  school search [query...] [page=<n>] [size=<n>]      Search schools by name
  student enroll <school-id> <name...>                Enroll a new student
  student get <school-id> <student-id>                Show a student
  student rename <school-id> <student-id> <name...>   Rename a student
  student remove <school-id> <student-id>             Remove a student
  student search <school-id> [query...] [page=<n>]    Search a school's students by name"#;

enum Command {
    Migrate,
    School,
    Student,
}

#[tokio::main]
async fn main() {
    let (options, free) =
        Options::from_command_line_relaxed("USAGE: schoolctl <command> [args...]");

    if free.is_empty() {
        cli_utils::exit_with_usage_error("No command specified", USAGE);
    }

    let mut config = AppConfig::from_env().unwrap_or_else(|e| exit_with(&format_cli_error(&e)));
    if let Some(url) = options.database_url {
        config = config.with_database_url(url);
    }
    if let Some(strategy) = options.strategy.as_deref() {
        config = config
            .with_strategy(strategy)
            .unwrap_or_else(|e| exit_with(&format_cli_error(&e)));
    }
    let output: OutputFormat = match options.output.as_deref() {
        Some(format) => format
            .parse()
            .unwrap_or_else(|e: String| cli_utils::exit_with_usage_error(&e, USAGE)),
        None => OutputFormat::default(),
    };

    let format = if options.log_json {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };
    if let Err(e) = logging::init_logger(&config.log_filter, options.verbose, format) {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let command = match free[0].as_str() {
        "migrate" => Command::Migrate,
        "school" => Command::School,
        "student" => Command::Student,
        other => cli_utils::exit_with_error(&format!(
            "Unknown command '{}'. Available commands: migrate, school, student",
            other
        )),
    };

    let pool = config
        .connect()
        .await
        .unwrap_or_else(|e| exit_with(&format_cli_error(&e)));
    tracing::debug!(strategy = %config.update_strategy, "connected");

    let context = CommandContext {
        handlers: SchoolHandlers::new(
            Arc::new(PgRepository::new(pool.clone())),
            Arc::new(TracingEventPublisher),
            config.update_strategy,
        ),
        default_page_size: config.default_page_size,
    };

    match command {
        Command::Migrate => handle_migrate_command(&free[1..], &pool).await,
        Command::School => handle_school_command(&free[1..], &context, output).await,
        Command::Student => handle_student_command(&free[1..], &context, output).await,
    }

    pool.close().await;
}

fn exit_with(formatted: &str) -> ! {
    eprintln!("{}", formatted);
    std::process::exit(1);
}
