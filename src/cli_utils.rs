use std::fmt::{Display, Formatter};
use std::process;
use std::str::FromStr;

use handled::Handle;
use serde::Serialize;

use crate::commands::errors::UserError;

/// Output format for commands that print records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Json,
    Yaml,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "yaml" | "yml" => Ok(OutputFormat::Yaml),
            other => Err(format!(
                "unknown output format '{}', expected 'json' or 'yaml'",
                other
            )),
        }
    }
}

impl Display for OutputFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Yaml => write!(f, "yaml"),
        }
    }
}

/// Exits the program with an error message
pub fn exit_with_error(message: &str) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

/// Exits the program with an error message and usage information
pub fn exit_with_usage_error(message: &str, usage: &str) -> ! {
    eprintln!("Error: {}", message);
    eprintln!("{}", usage);
    process::exit(1);
}

/// Exits with the user-facing message and hint extracted from `error`.
pub fn exit_with_handled<E>(error: &E) -> !
where
    E: Handle<UserError> + Display,
{
    match error.handle() {
        Some(UserError {
            message,
            usage_hint: Some(hint),
        }) => exit_with_usage_error(&message, &format!("Hint: {}", hint)),
        Some(UserError { message, .. }) => exit_with_error(&message),
        None => exit_with_error(&error.to_string()),
    }
}

/// Prints a formatted success message
pub fn print_success(message: &str) {
    println!("{}", message);
}

/// Renders `value` in the requested format.
pub fn format_value<T>(value: &T, format: OutputFormat) -> Result<String, String>
where
    T: Serialize,
{
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(value).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yml::to_string(value).map_err(|e| e.to_string()),
    }
}

/// Prints `value` in the requested format or exits with error
pub fn print_formatted_or_exit<T>(value: &T, format: OutputFormat, context: &str)
where
    T: Serialize,
{
    match format_value(value, format) {
        Ok(text) => println!("{}", text.trim_end()),
        Err(e) => exit_with_error(&format!("Failed to format {} as {}: {}", context, format, e)),
    }
}
