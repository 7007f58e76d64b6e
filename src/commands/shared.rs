//! # Shared Command Utilities
//!
//! Argument parsing and validation helpers used by every schoolctl command handler.

use std::collections::HashMap;
use std::str::FromStr;

use handled::Handle;

use crate::commands::errors::{ArgumentError, UserError};
use crate::repository::PageRequest;
use crate::{DomainError, SchoolHandlers, SchoolId, StudentId, cli_utils};

/// Everything a command handler needs to run.
pub struct CommandContext {
    pub handlers: SchoolHandlers,
    pub default_page_size: u32,
}

/// Generic ID parsing function that works with any ID type that implements FromStr
/// and whose error type implements Handle<UserError>.
fn parse_id_or_exit_generic<T, E>(id_str: &str, id_type_name: &str) -> T
where
    T: FromStr<Err = E>,
    E: Handle<UserError> + std::fmt::Display,
{
    id_str.parse().unwrap_or_else(|e: E| {
        if let Some(user_error) = e.handle() {
            if let Some(ref hint) = user_error.usage_hint {
                cli_utils::exit_with_usage_error(&user_error.message, hint);
            } else {
                cli_utils::exit_with_error(&user_error.message);
            }
        } else {
            cli_utils::exit_with_error(&format!("Invalid {}: {}", id_type_name, e));
        }
    })
}

pub fn parse_school_id_or_exit(id_str: &str) -> SchoolId {
    parse_id_or_exit_generic(id_str, "school ID")
}

pub fn parse_student_id_or_exit(id_str: &str) -> StudentId {
    parse_id_or_exit_generic(id_str, "student ID")
}

/// Parses an integer argument.
pub fn parse_number<T: FromStr>(field: &str, value: &str) -> Result<T, ArgumentError> {
    value.trim().parse().map_err(|_| ArgumentError {
        field: field.to_string(),
        value: value.to_string(),
        reason: "expected a whole number".to_string(),
    })
}

/// Parses an integer argument or exits.
pub fn parse_number_or_exit<T: FromStr>(field: &str, value: &str) -> T {
    parse_number(field, value).unwrap_or_else(|e| cli_utils::exit_with_handled(&e))
}

/// Splits trailing `key=value` arguments from the leading positional ones.
///
/// Returns the positional arguments and the options; unknown keys are an error.
pub fn split_options<'a>(
    args: &'a [String],
    allowed: &[&str],
) -> Result<(Vec<&'a str>, HashMap<String, String>), ArgumentError> {
    let mut positional = Vec::new();
    let mut options = HashMap::new();
    for arg in args {
        match arg.split_once('=') {
            Some((key, value)) if !key.is_empty() && !key.contains(' ') => {
                if !allowed.contains(&key) {
                    return Err(ArgumentError {
                        field: "option".to_string(),
                        value: arg.clone(),
                        reason: format!("expected one of: {}", allowed.join(", ")),
                    });
                }
                options.insert(key.to_string(), value.to_string());
            }
            _ => positional.push(arg.as_str()),
        }
    }
    Ok((positional, options))
}

/// Builds the page request from `page=` and `size=` options.
pub fn page_from_options(
    options: &HashMap<String, String>,
    default_size: u32,
) -> Result<PageRequest, String> {
    let page = match options.get("page") {
        Some(v) => parse_number::<u32>("page", v).map_err(|e| e.to_string())?,
        None => 0,
    };
    let size = match options.get("size") {
        Some(v) => parse_number::<u32>("size", v).map_err(|e| e.to_string())?,
        None => default_size,
    };
    PageRequest::new(page, size).map_err(|e| e.to_string())
}

/// Unwraps a handler result or exits with its message and hint.
pub fn ok_or_exit<T>(result: Result<T, DomainError>) -> T {
    result.unwrap_or_else(|e| cli_utils::exit_with_handled(&e))
}

/// Validates both minimum and maximum argument counts.
///
/// # Arguments
/// * `args` - The command arguments array
/// * `min_count` - The minimum number of arguments required (including subcommand)
/// * `max_count` - The maximum number of arguments allowed (including subcommand)
/// * `command` - The command name for error message
/// * `usage` - The usage string to display
pub fn validate_args_count_or_exit(
    args: &[String],
    min_count: usize,
    max_count: usize,
    command: &str,
    usage: &str,
) {
    if args.len() < min_count {
        cli_utils::exit_with_usage_error(
            &format!("{} command requires more arguments", command),
            usage,
        );
    }
    if args.len() > max_count {
        cli_utils::exit_with_usage_error(
            &format!("{} command has too many arguments", command),
            usage,
        );
    }
}

/// Macro to generate command dispatcher boilerplate.
macro_rules! dispatch_command {
    ($command_name:expr, $usage:expr, $args:expr, $context:expr, $output_format:expr, {
        $($subcommand:expr => $handler:expr),* $(,)?
    }) => {
        if $args.is_empty() {
            crate::cli_utils::exit_with_usage_error(
                &format!("{} command requires a subcommand", $command_name),
                $usage,
            );
        }

        match $args[0].as_str() {
            $(
                $subcommand => $handler($args, $context, $output_format).await,
            )*
            _ => {
                let available_subcommands = vec![$($subcommand),*];
                crate::cli_utils::exit_with_error(&format!(
                    "Unknown {} subcommand '{}'. Available subcommands: {}",
                    $command_name,
                    $args[0],
                    available_subcommands.join(", ")
                ));
            }
        }
    };
}

pub(crate) use dispatch_command;

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(args: &[&str]) -> Vec<String> {
        args.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn options_are_split_from_positionals() {
        let args = strings(&["update", "abc", "name=North High", "capacity=40"]);
        let (positional, options) = split_options(&args, &["name", "capacity"]).unwrap();
        assert_eq!(positional, vec!["update", "abc"]);
        assert_eq!(options["name"], "North High");
        assert_eq!(options["capacity"], "40");
    }

    #[test]
    fn unknown_options_are_rejected() {
        let args = strings(&["search", "color=blue"]);
        assert!(split_options(&args, &["page", "size"]).is_err());
    }

    #[test]
    fn pages_default_and_validate() {
        let mut options = HashMap::new();
        assert_eq!(page_from_options(&options, 20).unwrap(), PageRequest::default());
        options.insert("page".to_string(), "2".to_string());
        options.insert("size".to_string(), "5".to_string());
        assert_eq!(page_from_options(&options, 20).unwrap().offset(), 10);
        options.insert("size".to_string(), "0".to_string());
        assert!(page_from_options(&options, 20).is_err());
    }

    #[test]
    fn numbers_report_the_field() {
        let err = parse_number::<i32>("capacity", "lots").unwrap_err();
        assert_eq!(err.field, "capacity");
    }
}
