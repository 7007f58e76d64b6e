//! PostgreSQL persistence for schoolhouse.
//!
//! The row-level functions live in [`school`] and [`student`], each taking an open
//! transaction. [`PgRepository`] wraps a pool and hands out [`PgUnitOfWork`] values that
//! implement the repository port on top of those functions.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use crate::repository::{
    Page, PageRequest, RepoResult, SchoolRecord, SchoolRepository, SchoolSummary, UnitOfWork,
};
use crate::{DomainError, School, SchoolId, Student, StudentId};

/// School row operations with version tracking.
pub mod school;

/// Student row operations.
pub mod student;

/// Result type for database operations.
pub type SqlResult<T> = Result<T, DomainError>;

/// The embedded schema migrations.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Logs a database failure and turns it into a storage error.
pub(crate) fn db_error(context: &str, e: sqlx::Error) -> DomainError {
    tracing::error!(error = %e, "database error {}", context);
    DomainError::from(e)
}

/// Escapes `%`, `_` and `\` so that `s` matches literally inside a `LIKE` pattern.
pub(crate) fn escape_like(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

////////////////////////////////////////////// PgRepository ////////////////////////////////////////////

/// A [`SchoolRepository`] backed by a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgRepository {
    pool: PgPool,
}

impl PgRepository {
    pub fn new(pool: PgPool) -> Self {
        PgRepository { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl SchoolRepository for PgRepository {
    async fn begin(&self) -> RepoResult<Box<dyn UnitOfWork>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| db_error("starting transaction", e))?;
        Ok(Box::new(PgUnitOfWork {
            tx,
            observed: HashMap::new(),
        }))
    }
}

/////////////////////////////////////////////// PgUnitOfWork ///////////////////////////////////////////

/// One PostgreSQL transaction. Dropping it without committing rolls it back.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
    /// School versions as first read in this transaction, advanced by its own writes.
    observed: HashMap<SchoolId, i64>,
}

impl PgUnitOfWork {
    fn observe(&mut self, mut record: SchoolRecord) -> SchoolRecord {
        record.version = *self.observed.entry(record.id).or_insert(record.version);
        record
    }
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn find_school(&mut self, id: SchoolId) -> RepoResult<Option<School>> {
        let Some(record) = school::get(&mut self.tx, id).await? else {
            return Ok(None);
        };
        let record = self.observe(record);
        let students = student::list_for_school(&mut self.tx, id).await?;
        School::rehydrate(record.id, record.name, record.capacity, students).map(Some)
    }

    async fn find_school_basic(&mut self, id: SchoolId) -> RepoResult<Option<SchoolRecord>> {
        let record = school::get(&mut self.tx, id).await?;
        Ok(record.map(|r| self.observe(r)))
    }

    async fn find_school_for_update(&mut self, id: SchoolId) -> RepoResult<Option<SchoolRecord>> {
        let record = school::get_for_update(&mut self.tx, id).await?;
        if let Some(record) = &record {
            self.observed.insert(record.id, record.version);
        }
        Ok(record)
    }

    async fn exists_school_by_name(&mut self, name: &str) -> RepoResult<bool> {
        school::exists_by_name(&mut self.tx, name).await
    }

    async fn search_schools(
        &mut self,
        query: &str,
        page: PageRequest,
    ) -> RepoResult<Page<SchoolSummary>> {
        school::search(&mut self.tx, query, page).await
    }

    async fn save_school(&mut self, aggregate: &School) -> RepoResult<()> {
        let id = aggregate.id();
        let version = match self.observed.get(&id).copied() {
            Some(expected) => {
                let record = SchoolRecord {
                    id,
                    name: aggregate.name().to_string(),
                    capacity: aggregate.capacity(),
                    version: expected,
                };
                school::update(&mut self.tx, &record).await?
            }
            None => school::insert(&mut self.tx, id, aggregate.name(), aggregate.capacity()).await?,
        };
        self.observed.insert(id, version);

        let students = aggregate.students();
        let keep: Vec<StudentId> = students.iter().map(|s| s.id()).collect();
        student::delete_missing(&mut self.tx, id, &keep).await?;
        for s in students {
            student::upsert(&mut self.tx, s).await?;
        }
        Ok(())
    }

    async fn update_school_record(&mut self, record: &SchoolRecord) -> RepoResult<()> {
        let version = school::update(&mut self.tx, record).await?;
        self.observed.insert(record.id, version);
        Ok(())
    }

    async fn delete_school(&mut self, id: SchoolId) -> RepoResult<bool> {
        let deleted = school::delete(&mut self.tx, id).await?;
        self.observed.remove(&id);
        Ok(deleted)
    }

    async fn count_students(&mut self, school_id: SchoolId) -> RepoResult<i64> {
        student::count_for_school(&mut self.tx, school_id).await
    }

    async fn touch_school(&mut self, id: SchoolId) -> RepoResult<()> {
        let expected = match self.observed.get(&id).copied() {
            Some(version) => version,
            None => {
                school::get(&mut self.tx, id)
                    .await?
                    .ok_or_else(|| DomainError::school_not_found(id))?
                    .version
            }
        };
        let version = school::touch(&mut self.tx, id, expected).await?;
        self.observed.insert(id, version);
        Ok(())
    }

    async fn find_student(&mut self, id: StudentId) -> RepoResult<Option<Student>> {
        student::get(&mut self.tx, id).await
    }

    async fn find_student_in_school(
        &mut self,
        student_id: StudentId,
        school_id: SchoolId,
    ) -> RepoResult<Option<Student>> {
        student::get_in_school(&mut self.tx, student_id, school_id).await
    }

    async fn exists_student_in_school(
        &mut self,
        student_id: StudentId,
        school_id: SchoolId,
    ) -> RepoResult<bool> {
        Ok(student::get_in_school(&mut self.tx, student_id, school_id)
            .await?
            .is_some())
    }

    async fn search_students(
        &mut self,
        school_id: SchoolId,
        query: &str,
        page: PageRequest,
    ) -> RepoResult<Page<Student>> {
        student::search(&mut self.tx, school_id, query, page).await
    }

    async fn insert_student(&mut self, s: &Student) -> RepoResult<()> {
        student::insert(&mut self.tx, s).await
    }

    async fn update_student(&mut self, s: &Student) -> RepoResult<()> {
        if student::update(&mut self.tx, s).await? {
            Ok(())
        } else {
            Err(DomainError::student_not_found(s.id()))
        }
    }

    async fn delete_student(&mut self, id: StudentId) -> RepoResult<bool> {
        student::delete(&mut self.tx, id).await
    }

    async fn commit(self: Box<Self>) -> RepoResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| db_error("committing transaction", e))
    }

    async fn rollback(self: Box<Self>) -> RepoResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| db_error("rolling back transaction", e))
    }
}

#[cfg(test)]
/// Test utilities for PostgreSQL database operations.
pub mod tests {
    use sqlx::PgPool;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::{SystemTime, UNIX_EPOCH};

    use super::*;
    use crate::Capacity;

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    /// Creates a fresh, migrated database for one test.
    ///
    /// The name combines the process id, a timestamp, and a counter so that tests running
    /// in parallel never share state.
    pub async fn setup_test_db() -> PgPool {
        let base_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgres://localhost/schoolhouse_test".to_string());

        let pid = std::process::id();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        let counter = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        let db_name = format!("schoolhouse_test_{}_{}_{}", pid, timestamp, counter);

        let mut parsed_url = url::Url::parse(&base_url).expect("Invalid database URL");

        let admin_pool = PgPool::connect(&base_url)
            .await
            .expect("Failed to connect to test database");
        sqlx::query(&format!("CREATE DATABASE {}", db_name))
            .execute(&admin_pool)
            .await
            .expect("Failed to create test database");
        admin_pool.close().await;

        parsed_url.set_path(&format!("/{}", db_name));
        let pool = PgPool::connect(parsed_url.as_str())
            .await
            .expect("Failed to connect to test database");

        MIGRATOR.run(&pool).await.expect("Failed to run migrations");

        pool
    }

    #[test]
    fn like_patterns_are_escaped() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL; set TEST_DATABASE_URL"]
    async fn aggregate_round_trip_through_unit_of_work() {
        let repo = PgRepository::new(setup_test_db().await);
        let mut aggregate =
            School::create(SchoolId::generate(), "Central", Capacity::new(3).unwrap()).unwrap();
        aggregate.enroll_student("Ada").unwrap();
        aggregate.enroll_student("Bob").unwrap();

        let mut uow = repo.begin().await.unwrap();
        uow.save_school(&aggregate).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = repo.begin().await.unwrap();
        let loaded = uow.find_school(aggregate.id()).await.unwrap().unwrap();
        assert_eq!(loaded.enrolled_count(), 2);
        assert_eq!(loaded.name(), "Central");
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL; set TEST_DATABASE_URL"]
    async fn stale_aggregate_write_conflicts() {
        let repo = PgRepository::new(setup_test_db().await);
        let aggregate =
            School::create(SchoolId::generate(), "Central", Capacity::new(3).unwrap()).unwrap();
        let mut uow = repo.begin().await.unwrap();
        uow.save_school(&aggregate).await.unwrap();
        uow.commit().await.unwrap();

        let mut first = repo.begin().await.unwrap();
        let mut second = repo.begin().await.unwrap();
        let mut a = first.find_school(aggregate.id()).await.unwrap().unwrap();
        let b = second.find_school(aggregate.id()).await.unwrap().unwrap();
        a.enroll_student("Ada").unwrap();
        first.save_school(&a).await.unwrap();
        first.commit().await.unwrap();

        let err = second.save_school(&b).await.unwrap_err();
        assert_eq!(
            err,
            DomainError::VersionConflict {
                school_id: aggregate.id()
            }
        );
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL; set TEST_DATABASE_URL"]
    async fn touch_after_direct_student_write() {
        let repo = PgRepository::new(setup_test_db().await);
        let aggregate =
            School::create(SchoolId::generate(), "Central", Capacity::new(3).unwrap()).unwrap();
        let mut uow = repo.begin().await.unwrap();
        uow.save_school(&aggregate).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = repo.begin().await.unwrap();
        let record = uow
            .find_school_for_update(aggregate.id())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.version, 0);
        let ada = Student::new(StudentId::generate(), "Ada", aggregate.id()).unwrap();
        uow.insert_student(&ada).await.unwrap();
        uow.touch_school(aggregate.id()).await.unwrap();
        uow.commit().await.unwrap();

        let mut uow = repo.begin().await.unwrap();
        let record = uow.find_school_basic(aggregate.id()).await.unwrap().unwrap();
        assert_eq!(record.version, 1);
        assert_eq!(uow.count_students(aggregate.id()).await.unwrap(), 1);
    }
}
