//! # School Command Handler
//!
//! Handles `schoolctl school ...`: creating, inspecting, updating, deleting, and
//! searching schools.

use crate::cli_utils::{self, OutputFormat};
use crate::commands::shared::{
    CommandContext, dispatch_command, ok_or_exit, page_from_options, parse_number_or_exit,
    parse_school_id_or_exit, split_options, validate_args_count_or_exit,
};
use crate::{CreateSchool, DeleteSchool, GetSchool, SearchSchools, UpdateSchool};

const SCHOOL_USAGE: &str =
    "Usage: schoolctl school <create|get|update|delete|search> [args...]";
const CREATE_USAGE: &str = "Usage: schoolctl school create <capacity> <name...>";
const UPDATE_USAGE: &str =
    "Usage: schoolctl school update <school-id> [name=<name>] [capacity=<n>]";
const SEARCH_USAGE: &str = "Usage: schoolctl school search [query...] [page=<n>] [size=<n>]";

/// Handles all school-related commands.
///
/// # Arguments
/// * `args` - Command arguments (first element is the subcommand)
/// * `context` - Handlers and defaults
/// * `output_format` - Output format for printed records
pub async fn handle_school_command(
    args: &[String],
    context: &CommandContext,
    output_format: OutputFormat,
) {
    dispatch_command!("school", SCHOOL_USAGE, args, context, output_format, {
        "create" => handle_school_create,
        "get" => handle_school_get,
        "update" => handle_school_update,
        "delete" => handle_school_delete,
        "search" => handle_school_search,
    });
}

async fn handle_school_create(
    args: &[String],
    context: &CommandContext,
    output_format: OutputFormat,
) {
    validate_args_count_or_exit(args, 3, usize::MAX, "create", CREATE_USAGE);
    let capacity = parse_number_or_exit("capacity", &args[1]);
    let name = args[2..].join(" ");

    let view = ok_or_exit(
        context
            .handlers
            .create_school(CreateSchool { name, capacity })
            .await,
    );
    cli_utils::print_formatted_or_exit(&view, output_format, "school");
}

async fn handle_school_get(args: &[String], context: &CommandContext, output_format: OutputFormat) {
    validate_args_count_or_exit(args, 2, 2, "get", "Usage: schoolctl school get <school-id>");
    let school_id = parse_school_id_or_exit(&args[1]);

    let view = ok_or_exit(context.handlers.get_school(GetSchool { school_id }).await);
    cli_utils::print_formatted_or_exit(&view, output_format, "school");
}

async fn handle_school_update(
    args: &[String],
    context: &CommandContext,
    output_format: OutputFormat,
) {
    validate_args_count_or_exit(args, 3, 4, "update", UPDATE_USAGE);
    let (positional, options) = split_options(&args[1..], &["name", "capacity"])
        .unwrap_or_else(|e| cli_utils::exit_with_usage_error(&e.to_string(), UPDATE_USAGE));
    if positional.len() != 1 || options.is_empty() {
        cli_utils::exit_with_usage_error(
            "update needs a school id and at least one field",
            UPDATE_USAGE,
        );
    }
    let school_id = parse_school_id_or_exit(positional[0]);
    let capacity = options
        .get("capacity")
        .map(|v| parse_number_or_exit::<i32>("capacity", v));

    let view = ok_or_exit(
        context
            .handlers
            .update_school(UpdateSchool {
                school_id,
                name: options.get("name").cloned(),
                capacity,
            })
            .await,
    );
    cli_utils::print_formatted_or_exit(&view, output_format, "school");
}

async fn handle_school_delete(
    args: &[String],
    context: &CommandContext,
    _output_format: OutputFormat,
) {
    validate_args_count_or_exit(args, 2, 2, "delete", "Usage: schoolctl school delete <school-id>");
    let school_id = parse_school_id_or_exit(&args[1]);

    ok_or_exit(context.handlers.delete_school(DeleteSchool { school_id }).await);
    cli_utils::print_success(&format!("Deleted school: {}", school_id));
}

async fn handle_school_search(
    args: &[String],
    context: &CommandContext,
    output_format: OutputFormat,
) {
    let (positional, options) = split_options(&args[1..], &["page", "size"])
        .unwrap_or_else(|e| cli_utils::exit_with_usage_error(&e.to_string(), SEARCH_USAGE));
    let page = page_from_options(&options, context.default_page_size)
        .unwrap_or_else(|e| cli_utils::exit_with_usage_error(&e, SEARCH_USAGE));

    let results = ok_or_exit(
        context
            .handlers
            .search_schools(SearchSchools {
                query: positional.join(" "),
                page,
            })
            .await,
    );
    cli_utils::print_formatted_or_exit(&results, output_format, "schools");
}
