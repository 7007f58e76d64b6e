//! # Command Handlers
//!
//! Command handlers for the schoolctl CLI, one submodule per top-level command.
//!
//! ## Structure
//!
//! - `school` - School commands (create, get, update, delete, search)
//! - `student` - Student commands (enroll, get, rename, remove, search)
//! - `migrate` - Schema migrations (up, down)
//! - `shared` - Shared parsing and validation functions
//! - `errors` - User-facing error extraction

pub mod errors;
pub mod migrate;
pub mod school;
pub mod shared;
pub mod student;

pub use migrate::handle_migrate_command;
pub use school::handle_school_command;
pub use shared::CommandContext;
pub use student::handle_student_command;
