//! # Schoolhouse: Schools, Students, and a Capacity That Holds Under Concurrency
//!
//! Schoolhouse manages schools and the students enrolled in them. Each school has a
//! fixed capacity, and the central promise of the crate is that the number of students
//! enrolled in a school never exceeds it, no matter how many writers race to enroll.
//!
//! This crate provides:
//!
//! - **A School Aggregate**: [`School`] owns its [`Student`]s and enforces the capacity
//!   and naming rules on every mutation, recording a [`StudentEnrolled`] event for each
//!   enrollment
//! - **A Repository Port**: [`SchoolRepository`] and [`UnitOfWork`] describe transactional
//!   storage with plain, locked, and version-checked reads
//! - **Two Adapters**: [`InMemoryRepository`] for tests and embedding, and
//!   [`sql::PgRepository`] for PostgreSQL
//! - **Application Handlers**: [`SchoolHandlers`] executes commands and queries with either
//!   the aggregate or the selective [`UpdateStrategy`]
//! - **A CLI**: the `schoolctl` binary drives the handlers against PostgreSQL
//!
//! ## Core Concepts
//!
//! ### Capacity
//! A [`Capacity`] is a strictly positive integer. Enrolling is allowed only while the
//! current count is below it, and a school can never be resized below its current
//! enrollment. The same guard functions back both update strategies.
//!
//! ### Identity
//! [`SchoolId`] and [`StudentId`] are UUID newtypes. A student always belongs to exactly
//! one school, and every student operation is scoped by the school id: a student id
//! presented with the wrong school is reported as not found.
//!
//! ### Concurrency
//! Every read of a school records the version it saw. Writes advance the version on
//! commit and fail with [`DomainError::VersionConflict`] if it moved in between. The
//! selective path additionally holds a row lock on the school from its first read to
//! its commit, so concurrent enrollments serialize on that school.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │ schoolctl (arrrg CLI, commands/)        │
//! ├─────────────────────────────────────────┤
//! │ Handlers (commands, queries, strategy)  │
//! ├─────────────────────────────────────────┤
//! │ Domain (School, Student, Capacity)      │
//! ├─────────────────────────────────────────┤
//! │ Repository port (UnitOfWork)            │
//! ├────────────────────┬────────────────────┤
//! │ InMemoryRepository │ PgRepository (sqlx)│
//! └────────────────────┴────────────────────┘
//! ```
//!
//! ## Usage Examples
//!
//! ### Working With the Aggregate
//!
//! ```rust
//! # use schoolhouse::{Capacity, ErrorKind, School, SchoolId};
//! let mut school = School::create(SchoolId::generate(), "Riverside", Capacity::new(1).unwrap()).unwrap();
//! school.enroll_student("Ada").unwrap();
//!
//! let err = school.enroll_student("Bob").unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::CapacityExceeded);
//! assert_eq!(school.enrolled_count(), 1);
//! ```
//!
//! ### Running Commands
//!
//! ```rust
//! # use std::sync::Arc;
//! # use schoolhouse::{
//! #     CreateSchool, CreateStudent, InMemoryEventPublisher, InMemoryRepository, SchoolHandlers,
//! #     UpdateStrategy,
//! # };
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let publisher = Arc::new(InMemoryEventPublisher::new());
//! let handlers = SchoolHandlers::new(
//!     Arc::new(InMemoryRepository::new()),
//!     publisher.clone(),
//!     UpdateStrategy::Selective,
//! );
//!
//! let school = handlers
//!     .create_school(CreateSchool { name: "Riverside".to_string(), capacity: 30 })
//!     .await
//!     .unwrap();
//! let student = handlers
//!     .create_student(CreateStudent { school_id: school.id, name: "Ada".to_string() })
//!     .await
//!     .unwrap();
//!
//! assert_eq!(student.school_id(), school.id);
//! assert_eq!(publisher.drain().len(), 1);
//! # });
//! ```

mod capacity;
mod errors;
mod events;
mod handlers;
mod id;
mod memory;
mod repository;
mod school;
mod student;

/// PostgreSQL persistence.
///
/// Row-level functions per table plus [`sql::PgRepository`], the PostgreSQL
/// implementation of the repository port. The schema is embedded from `migrations/`.
pub mod sql;

/// Runtime configuration from the environment and command-line overrides.
pub mod config;

/// Subscriber setup for structured logging.
pub mod logging;

// CLI utility modules

/// Command-line interface utilities for program termination and output formatting.
pub mod cli_utils;

/// Command-line interface command handlers.
///
/// This module contains the command handlers for the schoolctl CLI application,
/// with each command implemented in a dedicated submodule.
pub mod commands;

pub use capacity::{Capacity, ensure_can_enroll, ensure_resize_allowed};
pub use errors::{DomainError, ErrorKind};
pub use events::{
    DomainEvent, DomainEventPublisher, InMemoryEventPublisher, StudentEnrolled,
    TracingEventPublisher,
};
pub use handlers::{
    CreateSchool, CreateStudent, DeleteSchool, DeleteStudent, GetSchool, GetStudent,
    HandlerResult, SchoolHandlers, SchoolView, SearchSchools, SearchStudents, UpdateSchool,
    UpdateStrategy, UpdateStudent,
};
pub use id::{IdParseError, SchoolId, StudentId};
pub use memory::{InMemoryRepository, InMemoryUnitOfWork};
pub use repository::{
    DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, Page, PageRequest, RepoResult, SchoolRecord,
    SchoolRepository, SchoolSummary, UnitOfWork,
};
pub use school::School;
pub use student::{MAX_NAME_LEN, Student};
