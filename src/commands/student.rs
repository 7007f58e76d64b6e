//! # Student Command Handler
//!
//! Handles `schoolctl student ...`. Every student command names the school first; a
//! student is only visible through the school it is enrolled in.

use crate::cli_utils::{self, OutputFormat};
use crate::commands::shared::{
    CommandContext, dispatch_command, ok_or_exit, page_from_options, parse_school_id_or_exit,
    parse_student_id_or_exit, split_options, validate_args_count_or_exit,
};
use crate::{CreateStudent, DeleteStudent, GetStudent, SearchStudents, UpdateStudent};

const STUDENT_USAGE: &str =
    "Usage: schoolctl student <enroll|get|rename|remove|search> <school-id> [args...]";
const ENROLL_USAGE: &str = "Usage: schoolctl student enroll <school-id> <name...>";
const RENAME_USAGE: &str = "Usage: schoolctl student rename <school-id> <student-id> <name...>";
const SEARCH_USAGE: &str =
    "Usage: schoolctl student search <school-id> [query...] [page=<n>] [size=<n>]";

/// Handles all student-related commands.
///
/// # Arguments
/// * `args` - Command arguments (first element is the subcommand)
/// * `context` - Handlers and defaults
/// * `output_format` - Output format for printed records
pub async fn handle_student_command(
    args: &[String],
    context: &CommandContext,
    output_format: OutputFormat,
) {
    dispatch_command!("student", STUDENT_USAGE, args, context, output_format, {
        "enroll" => handle_student_enroll,
        "get" => handle_student_get,
        "rename" => handle_student_rename,
        "remove" => handle_student_remove,
        "search" => handle_student_search,
    });
}

async fn handle_student_enroll(
    args: &[String],
    context: &CommandContext,
    output_format: OutputFormat,
) {
    validate_args_count_or_exit(args, 3, usize::MAX, "enroll", ENROLL_USAGE);
    let school_id = parse_school_id_or_exit(&args[1]);
    let name = args[2..].join(" ");

    let student = ok_or_exit(
        context
            .handlers
            .create_student(CreateStudent { school_id, name })
            .await,
    );
    cli_utils::print_formatted_or_exit(&student, output_format, "student");
}

async fn handle_student_get(
    args: &[String],
    context: &CommandContext,
    output_format: OutputFormat,
) {
    validate_args_count_or_exit(
        args,
        3,
        3,
        "get",
        "Usage: schoolctl student get <school-id> <student-id>",
    );
    let school_id = parse_school_id_or_exit(&args[1]);
    let student_id = parse_student_id_or_exit(&args[2]);

    let student = ok_or_exit(
        context
            .handlers
            .get_student(GetStudent {
                school_id,
                student_id,
            })
            .await,
    );
    cli_utils::print_formatted_or_exit(&student, output_format, "student");
}

async fn handle_student_rename(
    args: &[String],
    context: &CommandContext,
    output_format: OutputFormat,
) {
    validate_args_count_or_exit(args, 4, usize::MAX, "rename", RENAME_USAGE);
    let school_id = parse_school_id_or_exit(&args[1]);
    let student_id = parse_student_id_or_exit(&args[2]);
    let name = args[3..].join(" ");

    let student = ok_or_exit(
        context
            .handlers
            .update_student(UpdateStudent {
                school_id,
                student_id,
                name,
            })
            .await,
    );
    cli_utils::print_formatted_or_exit(&student, output_format, "student");
}

async fn handle_student_remove(
    args: &[String],
    context: &CommandContext,
    _output_format: OutputFormat,
) {
    validate_args_count_or_exit(
        args,
        3,
        3,
        "remove",
        "Usage: schoolctl student remove <school-id> <student-id>",
    );
    let school_id = parse_school_id_or_exit(&args[1]);
    let student_id = parse_student_id_or_exit(&args[2]);

    ok_or_exit(
        context
            .handlers
            .delete_student(DeleteStudent {
                school_id,
                student_id,
            })
            .await,
    );
    cli_utils::print_success(&format!("Removed student {} from school {}", student_id, school_id));
}

async fn handle_student_search(
    args: &[String],
    context: &CommandContext,
    output_format: OutputFormat,
) {
    validate_args_count_or_exit(args, 2, usize::MAX, "search", SEARCH_USAGE);
    let school_id = parse_school_id_or_exit(&args[1]);
    let (positional, options) = split_options(&args[2..], &["page", "size"])
        .unwrap_or_else(|e| cli_utils::exit_with_usage_error(&e.to_string(), SEARCH_USAGE));
    let page = page_from_options(&options, context.default_page_size)
        .unwrap_or_else(|e| cli_utils::exit_with_usage_error(&e, SEARCH_USAGE));

    let results = ok_or_exit(
        context
            .handlers
            .search_students(SearchStudents {
                school_id,
                query: positional.join(" "),
                page,
            })
            .await,
    );
    cli_utils::print_formatted_or_exit(&results, output_format, "students");
}
