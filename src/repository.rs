//! # Repository Port
//!
//! The application layer talks to storage exclusively through the traits in this module.
//! A [`SchoolRepository`] hands out [`UnitOfWork`] values; each unit of work is one
//! transaction that the handler mutates through and then commits. Dropping a unit of
//! work without committing rolls it back and releases any row locks it holds.
//!
//! ## Concurrency Contract
//!
//! - Every read of a school row remembers the version it saw. Writing the school, or
//!   touching it after writing its student rows, advances the version by one when the
//!   unit of work commits. If the row moved in the meantime the commit fails with
//!   [`DomainError::VersionConflict`](crate::DomainError::VersionConflict).
//! - [`UnitOfWork::find_school_for_update`] additionally takes a write lock on the school
//!   row that is held until the unit of work ends, blocking other lockers and writers.
//!
//! ## Implementations
//!
//! - [`InMemoryRepository`](crate::InMemoryRepository): tables in a `Mutex`, row locks as
//!   `tokio` mutexes.
//! - [`PgRepository`](crate::sql::PgRepository): PostgreSQL through `sqlx`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{Capacity, DomainError, School, SchoolId, Student, StudentId};

/// Result type for repository operations.
pub type RepoResult<T> = Result<T, DomainError>;

/////////////////////////////////////////////// Paging /////////////////////////////////////////////////

/// Largest page a caller may request.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page size used when none is given.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// A zero-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    page: u32,
    size: u32,
}

impl PageRequest {
    /// Creates a page request; `size` must be within `1..=MAX_PAGE_SIZE`.
    pub fn new(page: u32, size: u32) -> Result<Self, DomainError> {
        if size == 0 || size > MAX_PAGE_SIZE {
            return Err(DomainError::Validation(format!(
                "page size must be between 1 and {}, got {}",
                MAX_PAGE_SIZE, size
            )));
        }
        Ok(PageRequest { page, size })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// Rows to skip before this page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page) * u64::from(self.size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        PageRequest {
            page: 0,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

/// One page of results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: u32,
    pub size: u32,
    pub total_elements: u64,
    pub total_pages: u64,
    pub has_next: bool,
    pub has_previous: bool,
}

impl<T> Page<T> {
    /// Builds a page from the items of `request` and the total number of matches.
    pub fn new(items: Vec<T>, request: PageRequest, total_elements: u64) -> Self {
        let size = u64::from(request.size());
        let total_pages = total_elements.div_ceil(size);
        Page {
            items,
            page: request.page(),
            size: request.size(),
            total_elements,
            total_pages,
            has_next: u64::from(request.page()) + 1 < total_pages,
            has_previous: request.page() > 0,
        }
    }
}

/////////////////////////////////////////////// Records ////////////////////////////////////////////////

/// The school row without its students, as loaded by the selective path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchoolRecord {
    pub id: SchoolId,
    pub name: String,
    pub capacity: Capacity,
    /// Optimistic-concurrency version observed when the row was read.
    pub version: i64,
}

impl SchoolRecord {
    /// Views the row as an aggregate with no students loaded.
    pub fn into_basic_school(self) -> School {
        School::rehydrate_basic(self.id, self.name, self.capacity)
    }
}

/// Search projection of a school.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolSummary {
    pub id: SchoolId,
    pub name: String,
    pub capacity: Capacity,
    pub enrolled: i64,
}

/// Case-insensitive substring match shared by the in-memory adapter and tests.
pub(crate) fn name_matches(name: &str, query: &str) -> bool {
    let query = query.trim();
    query.is_empty() || name.to_lowercase().contains(&query.to_lowercase())
}

//////////////////////////////////////////////// Traits ////////////////////////////////////////////////

/// Entry point to storage: starts transactions.
#[async_trait]
pub trait SchoolRepository: Send + Sync {
    /// Starts a new unit of work.
    async fn begin(&self) -> RepoResult<Box<dyn UnitOfWork>>;
}

/// One transaction against school and student storage.
#[async_trait]
pub trait UnitOfWork: Send {
    // School operations

    /// Loads the full aggregate, students included.
    async fn find_school(&mut self, id: SchoolId) -> RepoResult<Option<School>>;

    /// Loads only the school row.
    async fn find_school_basic(&mut self, id: SchoolId) -> RepoResult<Option<SchoolRecord>>;

    /// Loads only the school row and write-locks it until this unit of work ends.
    async fn find_school_for_update(&mut self, id: SchoolId) -> RepoResult<Option<SchoolRecord>>;

    /// True when some school is named `name`, ignoring case and surrounding whitespace.
    async fn exists_school_by_name(&mut self, name: &str) -> RepoResult<bool>;

    /// Case-insensitive substring search over school names, ordered by name then id.
    async fn search_schools(
        &mut self,
        query: &str,
        page: PageRequest,
    ) -> RepoResult<Page<SchoolSummary>>;

    /// Inserts or updates the whole aggregate, reconciling its student set.
    ///
    /// # Returns
    /// * `Err(DomainError::DuplicateName)` - Another school already uses the name
    /// * `Err(DomainError::VersionConflict)` - The school changed since it was read
    async fn save_school(&mut self, school: &School) -> RepoResult<()>;

    /// Writes name and capacity of a school row loaded with `find_school_basic` or
    /// `find_school_for_update`.
    async fn update_school_record(&mut self, record: &SchoolRecord) -> RepoResult<()>;

    /// Deletes a school and, by cascade, its students.
    ///
    /// # Returns
    /// * `Ok(true)` - School existed and was deleted
    /// * `Ok(false)` - School did not exist
    async fn delete_school(&mut self, id: SchoolId) -> RepoResult<bool>;

    /// Counts the students of a school as currently stored.
    async fn count_students(&mut self, school_id: SchoolId) -> RepoResult<i64>;

    /// Advances the school's version without changing its fields.
    ///
    /// Used after writing student rows directly so that concurrent aggregate writers
    /// notice the change.
    async fn touch_school(&mut self, id: SchoolId) -> RepoResult<()>;

    // Student operations

    async fn find_student(&mut self, id: StudentId) -> RepoResult<Option<Student>>;

    /// Loads a student only if it belongs to `school_id`.
    async fn find_student_in_school(
        &mut self,
        student_id: StudentId,
        school_id: SchoolId,
    ) -> RepoResult<Option<Student>>;

    async fn exists_student_in_school(
        &mut self,
        student_id: StudentId,
        school_id: SchoolId,
    ) -> RepoResult<bool>;

    /// Case-insensitive substring search over the students of one school.
    async fn search_students(
        &mut self,
        school_id: SchoolId,
        query: &str,
        page: PageRequest,
    ) -> RepoResult<Page<Student>>;

    async fn insert_student(&mut self, student: &Student) -> RepoResult<()>;

    async fn update_student(&mut self, student: &Student) -> RepoResult<()>;

    /// # Returns
    /// * `Ok(true)` - Student existed and was deleted
    /// * `Ok(false)` - Student did not exist
    async fn delete_student(&mut self, id: StudentId) -> RepoResult<bool>;

    // Transaction control

    /// Makes every write of this unit of work durable and visible.
    async fn commit(self: Box<Self>) -> RepoResult<()>;

    /// Discards every write of this unit of work.
    async fn rollback(self: Box<Self>) -> RepoResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_bounds() {
        assert!(PageRequest::new(0, 0).is_err());
        assert!(PageRequest::new(0, MAX_PAGE_SIZE + 1).is_err());
        let request = PageRequest::new(3, 20).unwrap();
        assert_eq!(request.offset(), 60);
        assert_eq!(PageRequest::default().size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn page_metadata() {
        let page = Page::new(vec![1, 2], PageRequest::new(0, 2).unwrap(), 5);
        assert_eq!(page.total_pages, 3);
        assert!(page.has_next);
        assert!(!page.has_previous);

        let last = Page::new(vec![5], PageRequest::new(2, 2).unwrap(), 5);
        assert!(!last.has_next);
        assert!(last.has_previous);

        let empty: Page<i32> = Page::new(vec![], PageRequest::default(), 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
    }

    #[test]
    fn name_matching_ignores_case() {
        assert!(name_matches("Central High", "central"));
        assert!(name_matches("Central High", "  HIGH "));
        assert!(name_matches("Central High", ""));
        assert!(!name_matches("Central High", "north"));
    }
}
