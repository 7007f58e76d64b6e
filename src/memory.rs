//! # In-Memory Repository
//!
//! A thread-safe [`SchoolRepository`] that keeps every table in process memory. It
//! honours the full concurrency contract of the port so handlers and tests behave the
//! same way they do against PostgreSQL:
//!
//! - each [`InMemoryUnitOfWork`] stages its writes and applies them atomically on commit;
//! - versions observed at read time are re-checked on commit (optimistic concurrency);
//! - `find_school_for_update` takes a per-school `tokio` mutex that is held until the
//!   unit of work ends, and commit takes the same lock for every school it writes, the
//!   way a row-level write lock would.
//!
//! ```rust
//! # use schoolhouse::{Capacity, InMemoryRepository, School, SchoolId, SchoolRepository, UnitOfWork};
//! # tokio_test_block_on(async {
//! let repo = InMemoryRepository::new();
//! let school = School::create(SchoolId::generate(), "Riverside", Capacity::new(30).unwrap()).unwrap();
//!
//! let mut uow = repo.begin().await.unwrap();
//! uow.save_school(&school).await.unwrap();
//! uow.commit().await.unwrap();
//!
//! assert_eq!(repo.school_version(school.id()), Some(0));
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::{Mutex as RowLock, OwnedMutexGuard};

use crate::repository::{
    Page, PageRequest, RepoResult, SchoolRecord, SchoolRepository, SchoolSummary, UnitOfWork,
    name_matches,
};
use crate::{Capacity, DomainError, School, SchoolId, Student, StudentId};

#[derive(Debug, Clone)]
struct SchoolRow {
    name: String,
    capacity: Capacity,
    version: i64,
}

#[derive(Debug, Default)]
struct Tables {
    schools: HashMap<SchoolId, SchoolRow>,
    students: HashMap<StudentId, Student>,
}

#[derive(Debug, Default)]
struct Shared {
    tables: Mutex<Tables>,
    row_locks: Mutex<HashMap<SchoolId, Arc<RowLock<()>>>>,
}

impl Shared {
    fn tables(&self) -> RepoResult<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| DomainError::Storage("in-memory tables lock poisoned".to_string()))
    }

    fn row_lock(&self, id: SchoolId) -> RepoResult<Arc<RowLock<()>>> {
        let mut locks = self
            .row_locks
            .lock()
            .map_err(|_| DomainError::Storage("in-memory row lock table poisoned".to_string()))?;
        Ok(locks.entry(id).or_default().clone())
    }

    /// Forgets row locks that no unit of work holds or waits on.
    fn release_idle_locks(&self) {
        if let Ok(mut locks) = self.row_locks.lock() {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
    }
}

/////////////////////////////////////////// InMemoryRepository /////////////////////////////////////////

/// Shared in-memory storage. Cloning yields another handle to the same tables.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    shared: Arc<Shared>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// The committed version of a school, if it exists.
    pub fn school_version(&self, id: SchoolId) -> Option<i64> {
        self.shared
            .tables()
            .ok()
            .and_then(|tables| tables.schools.get(&id).map(|row| row.version))
    }

    /// Number of committed students across all schools.
    pub fn student_count(&self) -> usize {
        self.shared
            .tables()
            .map(|tables| tables.students.len())
            .unwrap_or(0)
    }
}

#[async_trait]
impl SchoolRepository for InMemoryRepository {
    async fn begin(&self) -> RepoResult<Box<dyn UnitOfWork>> {
        Ok(Box::new(InMemoryUnitOfWork {
            shared: Arc::clone(&self.shared),
            staged_schools: HashMap::new(),
            staged_students: HashMap::new(),
            observed: HashMap::new(),
            dirty: BTreeSet::new(),
            held: HashMap::new(),
        }))
    }
}

/////////////////////////////////////////// InMemoryUnitOfWork /////////////////////////////////////////

/// A transaction over an [`InMemoryRepository`].
pub struct InMemoryUnitOfWork {
    shared: Arc<Shared>,
    /// `None` marks a deleted school.
    staged_schools: HashMap<SchoolId, Option<(String, Capacity)>>,
    /// `None` marks a deleted student.
    staged_students: HashMap<StudentId, Option<Student>>,
    /// Versions read from committed state; checked again on commit.
    observed: HashMap<SchoolId, i64>,
    /// Schools whose version advances on commit.
    dirty: BTreeSet<SchoolId>,
    held: HashMap<SchoolId, OwnedMutexGuard<()>>,
}

impl InMemoryUnitOfWork {
    /// The school as this unit of work sees it, with the version its writes are checked against.
    fn current_school(&mut self, tables: &Tables, id: SchoolId) -> Option<SchoolRecord> {
        match self.staged_schools.get(&id) {
            Some(Some((name, capacity))) => Some(SchoolRecord {
                id,
                name: name.clone(),
                capacity: *capacity,
                version: self.observed.get(&id).copied().unwrap_or(0),
            }),
            Some(None) => None,
            None => {
                let row = tables.schools.get(&id)?;
                let version = *self.observed.entry(id).or_insert(row.version);
                Some(SchoolRecord {
                    id,
                    name: row.name.clone(),
                    capacity: row.capacity,
                    version,
                })
            }
        }
    }

    fn school_exists(&self, tables: &Tables, id: SchoolId) -> bool {
        match self.staged_schools.get(&id) {
            Some(staged) => staged.is_some(),
            None => tables.schools.contains_key(&id),
        }
    }

    fn visible_schools(&self, tables: &Tables) -> Vec<(SchoolId, String, Capacity)> {
        let mut schools: Vec<(SchoolId, String, Capacity)> = tables
            .schools
            .iter()
            .filter(|(id, _)| !self.staged_schools.contains_key(id))
            .map(|(id, row)| (*id, row.name.clone(), row.capacity))
            .collect();
        for (id, staged) in &self.staged_schools {
            if let Some((name, capacity)) = staged {
                schools.push((*id, name.clone(), *capacity));
            }
        }
        schools
    }

    fn current_student(&self, tables: &Tables, id: StudentId) -> Option<Student> {
        let student = match self.staged_students.get(&id) {
            Some(staged) => staged.clone()?,
            None => tables.students.get(&id)?.clone(),
        };
        if self.school_exists(tables, student.school_id()) {
            Some(student)
        } else {
            None
        }
    }

    fn students_of(&self, tables: &Tables, school_id: SchoolId) -> Vec<Student> {
        if !self.school_exists(tables, school_id) {
            return Vec::new();
        }
        let mut students: Vec<Student> = tables
            .students
            .values()
            .filter(|s| s.school_id() == school_id && !self.staged_students.contains_key(&s.id()))
            .cloned()
            .collect();
        students.extend(
            self.staged_students
                .values()
                .flatten()
                .filter(|s| s.school_id() == school_id)
                .cloned(),
        );
        students
    }

    fn name_taken(&self, tables: &Tables, name: &str, except: Option<SchoolId>) -> bool {
        let wanted = name.trim().to_lowercase();
        self.visible_schools(tables)
            .iter()
            .any(|(id, existing, _)| Some(*id) != except && existing.to_lowercase() == wanted)
    }

    async fn lock_row(&mut self, id: SchoolId) -> RepoResult<()> {
        if !self.held.contains_key(&id) {
            let lock = self.shared.row_lock(id)?;
            let guard = lock.lock_owned().await;
            self.held.insert(id, guard);
        }
        Ok(())
    }

    /// Checks observed versions, names, and student ownership against committed state.
    fn validate(&self, tables: &Tables) -> RepoResult<()> {
        for id in &self.dirty {
            match (self.observed.get(id), tables.schools.get(id)) {
                (Some(seen), Some(row)) if row.version == *seen => {}
                (Some(_), _) => return Err(DomainError::VersionConflict { school_id: *id }),
                (None, Some(_)) => {
                    return Err(DomainError::Storage(format!("school {} already exists", id)));
                }
                (None, None) => {}
            }
        }
        for id in &self.dirty {
            if let Some(Some((name, _))) = self.staged_schools.get(id) {
                if self.name_taken(tables, name, Some(*id)) {
                    return Err(DomainError::DuplicateName { name: name.clone() });
                }
            }
        }
        for student in self.staged_students.values().flatten() {
            if !self.school_exists(tables, student.school_id()) {
                return Err(DomainError::school_not_found(student.school_id()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl UnitOfWork for InMemoryUnitOfWork {
    async fn find_school(&mut self, id: SchoolId) -> RepoResult<Option<School>> {
        let shared = Arc::clone(&self.shared);
        let tables = shared.tables()?;
        let Some(record) = self.current_school(&tables, id) else {
            return Ok(None);
        };
        let students = self.students_of(&tables, id);
        School::rehydrate(record.id, record.name, record.capacity, students).map(Some)
    }

    async fn find_school_basic(&mut self, id: SchoolId) -> RepoResult<Option<SchoolRecord>> {
        let shared = Arc::clone(&self.shared);
        let tables = shared.tables()?;
        Ok(self.current_school(&tables, id))
    }

    async fn find_school_for_update(&mut self, id: SchoolId) -> RepoResult<Option<SchoolRecord>> {
        self.lock_row(id).await?;
        let shared = Arc::clone(&self.shared);
        let tables = shared.tables()?;
        if !self.staged_schools.contains_key(&id) {
            // A locked read always sees the latest committed row.
            match tables.schools.get(&id) {
                Some(row) => {
                    self.observed.insert(id, row.version);
                }
                None => return Ok(None),
            }
        }
        Ok(self.current_school(&tables, id))
    }

    async fn exists_school_by_name(&mut self, name: &str) -> RepoResult<bool> {
        let tables = self.shared.tables()?;
        Ok(self.name_taken(&tables, name, None))
    }

    async fn search_schools(
        &mut self,
        query: &str,
        page: PageRequest,
    ) -> RepoResult<Page<SchoolSummary>> {
        let tables = self.shared.tables()?;
        let mut matches: Vec<(SchoolId, String, Capacity)> = self
            .visible_schools(&tables)
            .into_iter()
            .filter(|(_, name, _)| name_matches(name, query))
            .collect();
        matches.sort_by(|a, b| {
            a.1.to_lowercase()
                .cmp(&b.1.to_lowercase())
                .then(a.0.cmp(&b.0))
        });
        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.size() as usize)
            .map(|(id, name, capacity)| SchoolSummary {
                id,
                name,
                capacity,
                enrolled: self.students_of(&tables, id).len() as i64,
            })
            .collect();
        Ok(Page::new(items, page, total))
    }

    async fn save_school(&mut self, school: &School) -> RepoResult<()> {
        let shared = Arc::clone(&self.shared);
        let tables = shared.tables()?;
        if self.name_taken(&tables, school.name(), Some(school.id())) {
            return Err(DomainError::DuplicateName {
                name: school.name().to_string(),
            });
        }
        // Register the version this write is based on before staging over it.
        let _ = self.current_school(&tables, school.id());
        let existing: HashSet<StudentId> = self
            .students_of(&tables, school.id())
            .iter()
            .map(Student::id)
            .collect();
        for student in school.students() {
            self.staged_students
                .insert(student.id(), Some(student.clone()));
        }
        for id in existing {
            if school.find_student(id).is_none() {
                self.staged_students.insert(id, None);
            }
        }
        self.staged_schools.insert(
            school.id(),
            Some((school.name().to_string(), school.capacity())),
        );
        self.dirty.insert(school.id());
        Ok(())
    }

    async fn update_school_record(&mut self, record: &SchoolRecord) -> RepoResult<()> {
        let shared = Arc::clone(&self.shared);
        let tables = shared.tables()?;
        if !self.school_exists(&tables, record.id) {
            return Err(DomainError::school_not_found(record.id));
        }
        if self.name_taken(&tables, &record.name, Some(record.id)) {
            return Err(DomainError::DuplicateName {
                name: record.name.clone(),
            });
        }
        if tables.schools.contains_key(&record.id) {
            self.observed.insert(record.id, record.version);
        }
        self.staged_schools
            .insert(record.id, Some((record.name.clone(), record.capacity)));
        self.dirty.insert(record.id);
        Ok(())
    }

    async fn delete_school(&mut self, id: SchoolId) -> RepoResult<bool> {
        let shared = Arc::clone(&self.shared);
        let tables = shared.tables()?;
        if self.current_school(&tables, id).is_none() {
            return Ok(false);
        }
        for student in self.students_of(&tables, id) {
            self.staged_students.insert(student.id(), None);
        }
        self.staged_schools.insert(id, None);
        self.dirty.insert(id);
        Ok(true)
    }

    async fn count_students(&mut self, school_id: SchoolId) -> RepoResult<i64> {
        let tables = self.shared.tables()?;
        Ok(self.students_of(&tables, school_id).len() as i64)
    }

    async fn touch_school(&mut self, id: SchoolId) -> RepoResult<()> {
        let shared = Arc::clone(&self.shared);
        let tables = shared.tables()?;
        if self.current_school(&tables, id).is_none() {
            return Err(DomainError::school_not_found(id));
        }
        self.dirty.insert(id);
        Ok(())
    }

    async fn find_student(&mut self, id: StudentId) -> RepoResult<Option<Student>> {
        let tables = self.shared.tables()?;
        Ok(self.current_student(&tables, id))
    }

    async fn find_student_in_school(
        &mut self,
        student_id: StudentId,
        school_id: SchoolId,
    ) -> RepoResult<Option<Student>> {
        let tables = self.shared.tables()?;
        Ok(self
            .current_student(&tables, student_id)
            .filter(|s| s.school_id() == school_id))
    }

    async fn exists_student_in_school(
        &mut self,
        student_id: StudentId,
        school_id: SchoolId,
    ) -> RepoResult<bool> {
        Ok(self
            .find_student_in_school(student_id, school_id)
            .await?
            .is_some())
    }

    async fn search_students(
        &mut self,
        school_id: SchoolId,
        query: &str,
        page: PageRequest,
    ) -> RepoResult<Page<Student>> {
        let tables = self.shared.tables()?;
        let mut matches: Vec<Student> = self
            .students_of(&tables, school_id)
            .into_iter()
            .filter(|s| name_matches(s.name(), query))
            .collect();
        matches.sort_by(|a, b| {
            a.name()
                .to_lowercase()
                .cmp(&b.name().to_lowercase())
                .then(a.id().cmp(&b.id()))
        });
        let total = matches.len() as u64;
        let items = matches
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.size() as usize)
            .collect();
        Ok(Page::new(items, page, total))
    }

    async fn insert_student(&mut self, student: &Student) -> RepoResult<()> {
        let tables = self.shared.tables()?;
        if !self.school_exists(&tables, student.school_id()) {
            return Err(DomainError::school_not_found(student.school_id()));
        }
        if self.current_student(&tables, student.id()).is_some() {
            return Err(DomainError::Storage(format!(
                "student {} already exists",
                student.id()
            )));
        }
        drop(tables);
        self.staged_students
            .insert(student.id(), Some(student.clone()));
        Ok(())
    }

    async fn update_student(&mut self, student: &Student) -> RepoResult<()> {
        let tables = self.shared.tables()?;
        if self.current_student(&tables, student.id()).is_none() {
            return Err(DomainError::student_not_found(student.id()));
        }
        drop(tables);
        self.staged_students
            .insert(student.id(), Some(student.clone()));
        Ok(())
    }

    async fn delete_student(&mut self, id: StudentId) -> RepoResult<bool> {
        let tables = self.shared.tables()?;
        if self.current_student(&tables, id).is_none() {
            return Ok(false);
        }
        drop(tables);
        self.staged_students.insert(id, None);
        Ok(true)
    }

    async fn commit(mut self: Box<Self>) -> RepoResult<()> {
        let dirty: Vec<SchoolId> = self.dirty.iter().copied().collect();
        for id in dirty {
            self.lock_row(id).await?;
        }

        let shared = Arc::clone(&self.shared);
        let mut tables = shared.tables()?;
        self.validate(&tables)?;

        let dirty = std::mem::take(&mut self.dirty);
        for id in &dirty {
            match self.staged_schools.remove(id) {
                Some(Some((name, capacity))) => {
                    let version = self.observed.get(id).map_or(0, |seen| seen + 1);
                    tables.schools.insert(
                        *id,
                        SchoolRow {
                            name,
                            capacity,
                            version,
                        },
                    );
                }
                Some(None) => {
                    tables.schools.remove(id);
                    tables.students.retain(|_, s| s.school_id() != *id);
                }
                None => {
                    if let Some(row) = tables.schools.get_mut(id) {
                        row.version += 1;
                    }
                }
            }
        }
        for (id, staged) in self.staged_students.drain() {
            match staged {
                Some(student) => {
                    tables.students.insert(id, student);
                }
                None => {
                    tables.students.remove(&id);
                }
            }
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> RepoResult<()> {
        Ok(())
    }
}

impl Drop for InMemoryUnitOfWork {
    fn drop(&mut self) {
        if self.held.is_empty() {
            return;
        }
        self.held.clear();
        self.shared.release_idle_locks();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    fn school(name: &str, capacity: i32) -> School {
        School::create(SchoolId::generate(), name, Capacity::new(capacity).unwrap()).unwrap()
    }

    async fn committed(repo: &InMemoryRepository, school: &School) {
        let mut uow = repo.begin().await.unwrap();
        uow.save_school(school).await.unwrap();
        uow.commit().await.unwrap();
    }

    #[tokio::test]
    async fn save_and_reload_aggregate() {
        let repo = InMemoryRepository::new();
        let mut school = school("Central", 10);
        school.enroll_student("Ada").unwrap();
        school.enroll_student("Bob").unwrap();
        committed(&repo, &school).await;

        let mut uow = repo.begin().await.unwrap();
        let loaded = uow.find_school(school.id()).await.unwrap().unwrap();
        assert_eq!(loaded.name(), "Central");
        assert_eq!(loaded.enrolled_count(), 2);
        assert_eq!(uow.count_students(school.id()).await.unwrap(), 2);
        assert_eq!(repo.school_version(school.id()), Some(0));
    }

    #[tokio::test]
    async fn uncommitted_writes_are_invisible() {
        let repo = InMemoryRepository::new();
        let school = school("Central", 10);

        let mut uow = repo.begin().await.unwrap();
        uow.save_school(&school).await.unwrap();
        assert!(uow.find_school(school.id()).await.unwrap().is_some());
        drop(uow);

        let mut uow = repo.begin().await.unwrap();
        assert!(uow.find_school(school.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_removes_students_missing_from_aggregate() {
        let repo = InMemoryRepository::new();
        let mut school = school("Central", 10);
        let ada = school.enroll_student("Ada").unwrap();
        school.enroll_student("Bob").unwrap();
        committed(&repo, &school).await;

        let mut uow = repo.begin().await.unwrap();
        let mut loaded = uow.find_school(school.id()).await.unwrap().unwrap();
        loaded.remove_student(ada.id()).unwrap();
        uow.save_school(&loaded).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(repo.student_count(), 1);
        assert_eq!(repo.school_version(school.id()), Some(1));
    }

    #[tokio::test]
    async fn stale_version_conflicts_on_commit() {
        let repo = InMemoryRepository::new();
        let school = school("Central", 10);
        committed(&repo, &school).await;

        let mut first = repo.begin().await.unwrap();
        let mut second = repo.begin().await.unwrap();
        let mut a = first.find_school(school.id()).await.unwrap().unwrap();
        let mut b = second.find_school(school.id()).await.unwrap().unwrap();
        a.change_name("Central North").unwrap();
        b.resize_capacity(Capacity::new(20).unwrap()).unwrap();
        first.save_school(&a).await.unwrap();
        second.save_school(&b).await.unwrap();

        first.commit().await.unwrap();
        let err = second.commit().await.unwrap_err();
        assert_eq!(
            err,
            DomainError::VersionConflict {
                school_id: school.id()
            }
        );
        assert_eq!(repo.school_version(school.id()), Some(1));
    }

    #[tokio::test]
    async fn duplicate_names_are_rejected_case_insensitively() {
        let repo = InMemoryRepository::new();
        committed(&repo, &school("Central", 10)).await;

        let mut uow = repo.begin().await.unwrap();
        assert!(uow.exists_school_by_name(" CENTRAL ").await.unwrap());
        let err = uow.save_school(&school("central", 5)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateName);
    }

    #[tokio::test]
    async fn delete_school_cascades() {
        let repo = InMemoryRepository::new();
        let mut school = school("Central", 10);
        let ada = school.enroll_student("Ada").unwrap();
        committed(&repo, &school).await;

        let mut uow = repo.begin().await.unwrap();
        assert!(uow.delete_school(school.id()).await.unwrap());
        assert!(uow.find_student(ada.id()).await.unwrap().is_none());
        uow.commit().await.unwrap();

        assert_eq!(repo.school_version(school.id()), None);
        assert_eq!(repo.student_count(), 0);
        let mut uow = repo.begin().await.unwrap();
        assert!(!uow.delete_school(school.id()).await.unwrap());
    }

    #[tokio::test]
    async fn student_rows_are_scoped_to_their_school() {
        let repo = InMemoryRepository::new();
        let mut central = school("Central", 10);
        let other = school("Other", 10);
        let ada = central.enroll_student("Ada").unwrap();
        committed(&repo, &central).await;
        committed(&repo, &other).await;

        let mut uow = repo.begin().await.unwrap();
        assert!(uow.exists_student_in_school(ada.id(), central.id()).await.unwrap());
        assert!(!uow.exists_student_in_school(ada.id(), other.id()).await.unwrap());
        assert!(uow.find_student_in_school(ada.id(), other.id()).await.unwrap().is_none());
        assert_eq!(uow.find_student(ada.id()).await.unwrap(), Some(ada));
    }

    #[tokio::test]
    async fn insert_student_requires_school() {
        let repo = InMemoryRepository::new();
        let mut uow = repo.begin().await.unwrap();
        let orphan = Student::new(StudentId::generate(), "Ada", SchoolId::generate()).unwrap();
        assert_eq!(
            uow.insert_student(&orphan).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[tokio::test]
    async fn touch_advances_version() {
        let repo = InMemoryRepository::new();
        let school = school("Central", 10);
        committed(&repo, &school).await;

        let mut uow = repo.begin().await.unwrap();
        uow.find_school_for_update(school.id()).await.unwrap().unwrap();
        let student = Student::new(StudentId::generate(), "Ada", school.id()).unwrap();
        uow.insert_student(&student).await.unwrap();
        uow.touch_school(school.id()).await.unwrap();
        uow.commit().await.unwrap();

        assert_eq!(repo.school_version(school.id()), Some(1));
        assert_eq!(repo.student_count(), 1);
    }

    #[tokio::test]
    async fn search_orders_by_name_then_id() {
        let repo = InMemoryRepository::new();
        for name in ["beta", "Alpha", "alphabet", "Gamma"] {
            committed(&repo, &school(name, 10)).await;
        }
        let mut uow = repo.begin().await.unwrap();
        let page = uow
            .search_schools("ALPHA", PageRequest::new(0, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(page.total_elements, 2);
        assert_eq!(page.items[0].name, "Alpha");
        assert!(page.has_next);

        let all = uow.search_schools("", PageRequest::default()).await.unwrap();
        let names: Vec<&str> = all.items.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "alphabet", "beta", "Gamma"]);
    }

    #[tokio::test]
    async fn locked_read_blocks_second_locker() {
        let repo = InMemoryRepository::new();
        let school = school("Central", 10);
        committed(&repo, &school).await;

        let mut holder = repo.begin().await.unwrap();
        holder.find_school_for_update(school.id()).await.unwrap();

        let repo2 = repo.clone();
        let id = school.id();
        let waiter = tokio::spawn(async move {
            let mut uow = repo2.begin().await.unwrap();
            uow.find_school_for_update(id).await.unwrap()
        });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!waiter.is_finished());

        holder.rollback().await.unwrap();
        let record = waiter.await.unwrap().unwrap();
        assert_eq!(record.version, 0);
    }

    fn row_lock_entries(repo: &InMemoryRepository) -> usize {
        repo.shared.row_locks.lock().unwrap().len()
    }

    #[tokio::test]
    async fn row_locks_are_released_when_units_of_work_end() {
        let repo = InMemoryRepository::new();
        let school = school("Central", 10);
        committed(&repo, &school).await;
        assert_eq!(row_lock_entries(&repo), 0);

        let mut uow = repo.begin().await.unwrap();
        uow.find_school_for_update(school.id()).await.unwrap();
        assert_eq!(row_lock_entries(&repo), 1);
        drop(uow);
        assert_eq!(row_lock_entries(&repo), 0);

        let mut uow = repo.begin().await.unwrap();
        assert!(uow.find_school_for_update(SchoolId::generate()).await.unwrap().is_none());
        uow.rollback().await.unwrap();
        assert_eq!(row_lock_entries(&repo), 0);

        let mut uow = repo.begin().await.unwrap();
        assert!(uow.delete_school(school.id()).await.unwrap());
        uow.commit().await.unwrap();
        assert_eq!(row_lock_entries(&repo), 0);
        assert_eq!(repo.school_version(school.id()), None);
    }
}
