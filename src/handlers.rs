//! # Application Handlers
//!
//! One method per command or query. Every method opens a single [`UnitOfWork`], does its
//! reads and writes through it, commits, and only then publishes the domain events the
//! aggregate recorded. A failed commit publishes nothing.
//!
//! Writes to an existing school follow one of two [`UpdateStrategy`] variants:
//!
//! - **Aggregate** loads the whole school with its students, mutates it through the
//!   aggregate's methods, and saves it back. Conflicting writers are detected by the
//!   school version on commit.
//! - **Selective** loads and write-locks only the school row, asks storage for the
//!   current enrollment count, applies the same capacity guards the aggregate uses, and
//!   writes just the affected rows. The school version is still advanced so aggregate
//!   writers racing with it notice.
//!
//! Both strategies enforce the same invariants and return the same errors.

use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::capacity::{ensure_can_enroll, ensure_resize_allowed};
use crate::repository::{Page, PageRequest, SchoolRepository, SchoolSummary, UnitOfWork};
use crate::student::normalize_name;
use crate::{
    Capacity, DomainError, DomainEvent, DomainEventPublisher, School, SchoolId, Student, StudentId,
};

/// Result type for handler operations.
pub type HandlerResult<T> = Result<T, DomainError>;

//////////////////////////////////////////// UpdateStrategy ////////////////////////////////////////////

/// How writes to an existing school are carried out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateStrategy {
    /// Load, mutate, and save the whole aggregate.
    #[default]
    Aggregate,
    /// Lock the school row and write only the rows that change.
    Selective,
}

impl FromStr for UpdateStrategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aggregate" => Ok(UpdateStrategy::Aggregate),
            "selective" => Ok(UpdateStrategy::Selective),
            other => Err(DomainError::Validation(format!(
                "unknown update strategy '{}', expected 'aggregate' or 'selective'",
                other
            ))),
        }
    }
}

impl Display for UpdateStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            UpdateStrategy::Aggregate => write!(f, "aggregate"),
            UpdateStrategy::Selective => write!(f, "selective"),
        }
    }
}

/////////////////////////////////////////////// Commands ///////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSchool {
    pub name: String,
    pub capacity: i32,
}

/// Changes the name, the capacity, or both. `None` leaves a field as it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSchool {
    pub school_id: SchoolId,
    pub name: Option<String>,
    pub capacity: Option<i32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteSchool {
    pub school_id: SchoolId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStudent {
    pub school_id: SchoolId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStudent {
    pub school_id: SchoolId,
    pub student_id: StudentId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteStudent {
    pub school_id: SchoolId,
    pub student_id: StudentId,
}

//////////////////////////////////////////////// Queries ///////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetSchool {
    pub school_id: SchoolId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetStudent {
    pub school_id: SchoolId,
    pub student_id: StudentId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchSchools {
    pub query: String,
    pub page: PageRequest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStudents {
    pub school_id: SchoolId,
    pub query: String,
    pub page: PageRequest,
}

/// Read model of a school with its enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolView {
    pub id: SchoolId,
    pub name: String,
    pub capacity: Capacity,
    pub enrolled: i64,
    pub available_spots: i64,
    /// Empty when the students were counted rather than loaded.
    pub students: Vec<Student>,
}

impl From<&School> for SchoolView {
    fn from(school: &School) -> Self {
        SchoolView {
            id: school.id(),
            name: school.name().to_string(),
            capacity: school.capacity(),
            enrolled: school.enrolled_count() as i64,
            available_spots: school.available_spots(),
            students: school.students().into_iter().cloned().collect(),
        }
    }
}

impl SchoolView {
    /// Builds the view of a school whose students were counted but not loaded.
    fn counted(school: &School, enrolled: i64) -> Self {
        SchoolView {
            id: school.id(),
            name: school.name().to_string(),
            capacity: school.capacity(),
            enrolled,
            available_spots: school.capacity().available_spots(enrolled),
            students: Vec::new(),
        }
    }
}

fn same_name(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

//////////////////////////////////////////// SchoolHandlers ////////////////////////////////////////////

/// Executes commands and queries against a repository.
#[derive(Clone)]
pub struct SchoolHandlers {
    repository: Arc<dyn SchoolRepository>,
    publisher: Arc<dyn DomainEventPublisher>,
    strategy: UpdateStrategy,
}

impl SchoolHandlers {
    pub fn new(
        repository: Arc<dyn SchoolRepository>,
        publisher: Arc<dyn DomainEventPublisher>,
        strategy: UpdateStrategy,
    ) -> Self {
        SchoolHandlers {
            repository,
            publisher,
            strategy,
        }
    }

    async fn publish(&self, events: Vec<DomainEvent>) {
        if events.is_empty() {
            return;
        }
        let count = events.len();
        if let Err(err) = self.publisher.publish(events).await {
            tracing::warn!(error = %err, count, "failed to publish domain events");
        }
    }

    async fn load_school(&self, uow: &mut dyn UnitOfWork, id: SchoolId) -> HandlerResult<School> {
        uow.find_school(id)
            .await?
            .ok_or_else(|| DomainError::school_not_found(id))
    }

    /// Fails with `DuplicateName` when `new_name` belongs to another school.
    async fn check_rename(
        &self,
        uow: &mut dyn UnitOfWork,
        current: &str,
        new_name: &str,
    ) -> HandlerResult<()> {
        if !same_name(current, new_name) && uow.exists_school_by_name(new_name).await? {
            return Err(DomainError::DuplicateName {
                name: new_name.trim().to_string(),
            });
        }
        Ok(())
    }

    // Schools

    /// Creates an empty school with a unique name.
    #[tracing::instrument(skip_all, fields(name = %cmd.name, capacity = cmd.capacity))]
    pub async fn create_school(&self, cmd: CreateSchool) -> HandlerResult<SchoolView> {
        let capacity = Capacity::new(cmd.capacity)?;
        let mut school = School::create(SchoolId::generate(), &cmd.name, capacity)?;

        let mut uow = self.repository.begin().await?;
        if uow.exists_school_by_name(school.name()).await? {
            return Err(DomainError::DuplicateName {
                name: school.name().to_string(),
            });
        }
        uow.save_school(&school).await?;
        uow.commit().await?;

        tracing::info!(school_id = %school.id(), "school created");
        self.publish(school.pull_domain_events()).await;
        Ok(SchoolView::from(&school))
    }

    /// Renames and/or resizes a school.
    #[tracing::instrument(skip_all, fields(school_id = %cmd.school_id, strategy = %self.strategy))]
    pub async fn update_school(&self, cmd: UpdateSchool) -> HandlerResult<SchoolView> {
        let capacity = cmd.capacity.map(Capacity::new).transpose()?;
        let mut uow = self.repository.begin().await?;

        let view = match self.strategy {
            UpdateStrategy::Aggregate => {
                let mut school = self.load_school(uow.as_mut(), cmd.school_id).await?;
                if let Some(name) = &cmd.name {
                    self.check_rename(uow.as_mut(), school.name(), name).await?;
                    school.change_name(name)?;
                }
                if let Some(capacity) = capacity {
                    school.resize_capacity(capacity)?;
                }
                uow.save_school(&school).await?;
                SchoolView::from(&school)
            }
            UpdateStrategy::Selective => {
                let mut record = uow
                    .find_school_for_update(cmd.school_id)
                    .await?
                    .ok_or_else(|| DomainError::school_not_found(cmd.school_id))?;
                if let Some(name) = &cmd.name {
                    let name = normalize_name("school", name)?;
                    self.check_rename(uow.as_mut(), &record.name, &name).await?;
                    record.name = name;
                }
                let enrolled = uow.count_students(cmd.school_id).await?;
                if let Some(capacity) = capacity {
                    ensure_resize_allowed(capacity, enrolled)?;
                    record.capacity = capacity;
                }
                uow.update_school_record(&record).await?;
                SchoolView::counted(&record.into_basic_school(), enrolled)
            }
        };
        uow.commit().await?;

        tracing::info!("school updated");
        Ok(view)
    }

    /// Deletes a school together with its students.
    #[tracing::instrument(skip_all, fields(school_id = %cmd.school_id))]
    pub async fn delete_school(&self, cmd: DeleteSchool) -> HandlerResult<()> {
        let mut uow = self.repository.begin().await?;
        if !uow.delete_school(cmd.school_id).await? {
            return Err(DomainError::school_not_found(cmd.school_id));
        }
        uow.commit().await?;
        tracing::info!("school deleted");
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(school_id = %query.school_id))]
    pub async fn get_school(&self, query: GetSchool) -> HandlerResult<SchoolView> {
        let mut uow = self.repository.begin().await?;
        let school = self.load_school(uow.as_mut(), query.school_id).await?;
        uow.rollback().await?;
        Ok(SchoolView::from(&school))
    }

    #[tracing::instrument(skip_all, fields(query = %query.query, page = query.page.page()))]
    pub async fn search_schools(&self, query: SearchSchools) -> HandlerResult<Page<SchoolSummary>> {
        let mut uow = self.repository.begin().await?;
        let page = uow.search_schools(&query.query, query.page).await?;
        uow.rollback().await?;
        Ok(page)
    }

    // Students

    /// Enrolls a new student, refusing when the school is full.
    #[tracing::instrument(skip_all, fields(school_id = %cmd.school_id, strategy = %self.strategy))]
    pub async fn create_student(&self, cmd: CreateStudent) -> HandlerResult<Student> {
        let mut uow = self.repository.begin().await?;

        let (student, events) = match self.strategy {
            UpdateStrategy::Aggregate => {
                let mut school = self.load_school(uow.as_mut(), cmd.school_id).await?;
                let student = school.enroll_student(&cmd.name)?;
                uow.save_school(&school).await?;
                (student, school.pull_domain_events())
            }
            UpdateStrategy::Selective => {
                let record = uow
                    .find_school_for_update(cmd.school_id)
                    .await?
                    .ok_or_else(|| DomainError::school_not_found(cmd.school_id))?;
                let enrolled = uow.count_students(cmd.school_id).await?;
                ensure_can_enroll(record.capacity, enrolled, record.id)?;
                let student = Student::new(StudentId::generate(), &cmd.name, record.id)?;
                uow.insert_student(&student).await?;
                uow.touch_school(record.id).await?;
                let events = vec![DomainEvent::student_enrolled(student.id(), record.id)];
                (student, events)
            }
        };
        uow.commit().await?;

        tracing::info!(student_id = %student.id(), "student enrolled");
        self.publish(events).await;
        Ok(student)
    }

    /// Renames a student of the given school.
    #[tracing::instrument(
        skip_all,
        fields(school_id = %cmd.school_id, student_id = %cmd.student_id, strategy = %self.strategy)
    )]
    pub async fn update_student(&self, cmd: UpdateStudent) -> HandlerResult<Student> {
        let mut uow = self.repository.begin().await?;

        let student = match self.strategy {
            UpdateStrategy::Aggregate => {
                let mut school = self.load_school(uow.as_mut(), cmd.school_id).await?;
                let student = school.update_student(cmd.student_id, &cmd.name)?.clone();
                uow.save_school(&school).await?;
                student
            }
            UpdateStrategy::Selective => {
                uow.find_school_for_update(cmd.school_id)
                    .await?
                    .ok_or_else(|| DomainError::school_not_found(cmd.school_id))?;
                let existing = uow
                    .find_student_in_school(cmd.student_id, cmd.school_id)
                    .await?
                    .ok_or_else(|| DomainError::student_not_found(cmd.student_id))?;
                let student = existing.renamed(&cmd.name)?;
                uow.update_student(&student).await?;
                uow.touch_school(cmd.school_id).await?;
                student
            }
        };
        uow.commit().await?;

        tracing::info!("student updated");
        Ok(student)
    }

    /// Removes a student from the given school.
    #[tracing::instrument(
        skip_all,
        fields(school_id = %cmd.school_id, student_id = %cmd.student_id, strategy = %self.strategy)
    )]
    pub async fn delete_student(&self, cmd: DeleteStudent) -> HandlerResult<()> {
        let mut uow = self.repository.begin().await?;

        match self.strategy {
            UpdateStrategy::Aggregate => {
                let mut school = self.load_school(uow.as_mut(), cmd.school_id).await?;
                school.remove_student(cmd.student_id)?;
                uow.save_school(&school).await?;
            }
            UpdateStrategy::Selective => {
                uow.find_school_for_update(cmd.school_id)
                    .await?
                    .ok_or_else(|| DomainError::school_not_found(cmd.school_id))?;
                if !uow
                    .exists_student_in_school(cmd.student_id, cmd.school_id)
                    .await?
                {
                    return Err(DomainError::student_not_found(cmd.student_id));
                }
                uow.delete_student(cmd.student_id).await?;
                uow.touch_school(cmd.school_id).await?;
            }
        }
        uow.commit().await?;

        tracing::info!("student removed");
        Ok(())
    }

    /// Looks up a student, but only within the given school.
    #[tracing::instrument(
        skip_all,
        fields(school_id = %query.school_id, student_id = %query.student_id)
    )]
    pub async fn get_student(&self, query: GetStudent) -> HandlerResult<Student> {
        let mut uow = self.repository.begin().await?;
        uow.find_school_basic(query.school_id)
            .await?
            .ok_or_else(|| DomainError::school_not_found(query.school_id))?;
        let student = uow
            .find_student_in_school(query.student_id, query.school_id)
            .await?
            .ok_or_else(|| DomainError::student_not_found(query.student_id))?;
        uow.rollback().await?;
        Ok(student)
    }

    #[tracing::instrument(skip_all, fields(school_id = %query.school_id, query = %query.query))]
    pub async fn search_students(&self, query: SearchStudents) -> HandlerResult<Page<Student>> {
        let mut uow = self.repository.begin().await?;
        uow.find_school_basic(query.school_id)
            .await?
            .ok_or_else(|| DomainError::school_not_found(query.school_id))?;
        let page = uow
            .search_students(query.school_id, &query.query, query.page)
            .await?;
        uow.rollback().await?;
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, InMemoryEventPublisher, InMemoryRepository};

    const STRATEGIES: [UpdateStrategy; 2] = [UpdateStrategy::Aggregate, UpdateStrategy::Selective];

    struct Fixture {
        handlers: SchoolHandlers,
        publisher: Arc<InMemoryEventPublisher>,
        repository: InMemoryRepository,
    }

    fn fixture(strategy: UpdateStrategy) -> Fixture {
        let repository = InMemoryRepository::new();
        let publisher = Arc::new(InMemoryEventPublisher::new());
        let handlers = SchoolHandlers::new(
            Arc::new(repository.clone()),
            publisher.clone(),
            strategy,
        );
        Fixture {
            handlers,
            publisher,
            repository,
        }
    }

    async fn create(handlers: &SchoolHandlers, name: &str, capacity: i32) -> SchoolView {
        handlers
            .create_school(CreateSchool {
                name: name.to_string(),
                capacity,
            })
            .await
            .unwrap()
    }

    async fn enroll(
        handlers: &SchoolHandlers,
        school_id: SchoolId,
        name: &str,
    ) -> HandlerResult<Student> {
        handlers
            .create_student(CreateStudent {
                school_id,
                name: name.to_string(),
            })
            .await
    }

    #[test]
    fn strategy_parses_and_displays() {
        assert_eq!("aggregate".parse::<UpdateStrategy>().unwrap(), UpdateStrategy::Aggregate);
        assert_eq!(" Selective ".parse::<UpdateStrategy>().unwrap(), UpdateStrategy::Selective);
        assert!("optimistic".parse::<UpdateStrategy>().is_err());
        assert_eq!(UpdateStrategy::Selective.to_string(), "selective");
        assert_eq!(UpdateStrategy::default(), UpdateStrategy::Aggregate);
    }

    #[tokio::test]
    async fn create_school_rejects_duplicates_and_bad_input() {
        let f = fixture(UpdateStrategy::Aggregate);
        let view = create(&f.handlers, "  Central  ", 10).await;
        assert_eq!(view.name, "Central");
        assert_eq!(view.available_spots, 10);

        let err = f
            .handlers
            .create_school(CreateSchool {
                name: "CENTRAL".to_string(),
                capacity: 5,
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateName);

        for (name, capacity) in [("", 5), ("North", 0), ("North", -3)] {
            let err = f
                .handlers
                .create_school(CreateSchool {
                    name: name.to_string(),
                    capacity,
                })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[tokio::test]
    async fn enrollment_stops_at_capacity() {
        for strategy in STRATEGIES {
            let f = fixture(strategy);
            let school = create(&f.handlers, "Central", 2).await;
            let first = enroll(&f.handlers, school.id, "Ada").await.unwrap();
            enroll(&f.handlers, school.id, "Bob").await.unwrap();

            let err = enroll(&f.handlers, school.id, "Cy").await.unwrap_err();
            assert_eq!(err, DomainError::CapacityExceeded { school_id: school.id });

            let events = f.publisher.drain();
            assert_eq!(events.len(), 2, "{}", strategy);
            assert_eq!(events[0], DomainEvent::student_enrolled(first.id(), school.id));

            let view = f
                .handlers
                .get_school(GetSchool { school_id: school.id })
                .await
                .unwrap();
            assert_eq!(view.enrolled, 2);
            assert_eq!(view.available_spots, 0);
        }
    }

    #[tokio::test]
    async fn enroll_in_missing_school_is_not_found() {
        for strategy in STRATEGIES {
            let f = fixture(strategy);
            let err = enroll(&f.handlers, SchoolId::generate(), "Ada").await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
            assert!(f.publisher.drain().is_empty());
        }
    }

    #[tokio::test]
    async fn resize_below_enrollment_is_rejected() {
        for strategy in STRATEGIES {
            let f = fixture(strategy);
            let school = create(&f.handlers, "Central", 5).await;
            for name in ["A", "B", "C"] {
                enroll(&f.handlers, school.id, name).await.unwrap();
            }
            let err = f
                .handlers
                .update_school(UpdateSchool {
                    school_id: school.id,
                    name: None,
                    capacity: Some(2),
                })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation, "{}", strategy);

            let view = f
                .handlers
                .update_school(UpdateSchool {
                    school_id: school.id,
                    name: None,
                    capacity: Some(3),
                })
                .await
                .unwrap();
            assert_eq!(view.capacity.value(), 3);
            assert_eq!(view.available_spots, 0);
            assert_eq!(view.enrolled, 3);
        }
    }

    #[tokio::test]
    async fn rename_checks_other_schools_only() {
        for strategy in STRATEGIES {
            let f = fixture(strategy);
            let central = create(&f.handlers, "Central", 5).await;
            create(&f.handlers, "North", 5).await;

            let view = f
                .handlers
                .update_school(UpdateSchool {
                    school_id: central.id,
                    name: Some(" CENTRAL ".to_string()),
                    capacity: None,
                })
                .await
                .unwrap();
            assert_eq!(view.name, "CENTRAL");

            let err = f
                .handlers
                .update_school(UpdateSchool {
                    school_id: central.id,
                    name: Some("north".to_string()),
                    capacity: None,
                })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::DuplicateName, "{}", strategy);

            let err = f
                .handlers
                .update_school(UpdateSchool {
                    school_id: central.id,
                    name: Some("   ".to_string()),
                    capacity: None,
                })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[tokio::test]
    async fn update_missing_school_is_not_found() {
        for strategy in STRATEGIES {
            let f = fixture(strategy);
            let err = f
                .handlers
                .update_school(UpdateSchool {
                    school_id: SchoolId::generate(),
                    name: Some("X".to_string()),
                    capacity: None,
                })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);
        }
    }

    #[tokio::test]
    async fn students_are_scoped_to_their_school() {
        for strategy in STRATEGIES {
            let f = fixture(strategy);
            let central = create(&f.handlers, "Central", 5).await;
            let north = create(&f.handlers, "North", 5).await;
            let ada = enroll(&f.handlers, central.id, "Ada").await.unwrap();

            let err = f
                .handlers
                .update_student(UpdateStudent {
                    school_id: north.id,
                    student_id: ada.id(),
                    name: "Eve".to_string(),
                })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound, "{}", strategy);

            let err = f
                .handlers
                .delete_student(DeleteStudent {
                    school_id: north.id,
                    student_id: ada.id(),
                })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);

            let err = f
                .handlers
                .get_student(GetStudent {
                    school_id: north.id,
                    student_id: ada.id(),
                })
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::NotFound);

            let found = f
                .handlers
                .get_student(GetStudent {
                    school_id: central.id,
                    student_id: ada.id(),
                })
                .await
                .unwrap();
            assert_eq!(found, ada);
        }
    }

    #[tokio::test]
    async fn rename_and_remove_student() {
        for strategy in STRATEGIES {
            let f = fixture(strategy);
            let school = create(&f.handlers, "Central", 1).await;
            let ada = enroll(&f.handlers, school.id, "Ada").await.unwrap();

            let renamed = f
                .handlers
                .update_student(UpdateStudent {
                    school_id: school.id,
                    student_id: ada.id(),
                    name: " Ada King ".to_string(),
                })
                .await
                .unwrap();
            assert_eq!(renamed.name(), "Ada King");
            assert_eq!(renamed.id(), ada.id());

            f.handlers
                .delete_student(DeleteStudent {
                    school_id: school.id,
                    student_id: ada.id(),
                })
                .await
                .unwrap();
            assert_eq!(f.repository.student_count(), 0);

            enroll(&f.handlers, school.id, "Bob").await.unwrap();
        }
    }

    #[tokio::test]
    async fn student_writes_advance_school_version() {
        for strategy in STRATEGIES {
            let f = fixture(strategy);
            let school = create(&f.handlers, "Central", 5).await;
            assert_eq!(f.repository.school_version(school.id), Some(0));
            let ada = enroll(&f.handlers, school.id, "Ada").await.unwrap();
            assert_eq!(f.repository.school_version(school.id), Some(1));
            f.handlers
                .update_student(UpdateStudent {
                    school_id: school.id,
                    student_id: ada.id(),
                    name: "Ada King".to_string(),
                })
                .await
                .unwrap();
            assert_eq!(f.repository.school_version(school.id), Some(2), "{}", strategy);
        }
    }

    #[tokio::test]
    async fn delete_school_removes_students() {
        let f = fixture(UpdateStrategy::Aggregate);
        let school = create(&f.handlers, "Central", 5).await;
        enroll(&f.handlers, school.id, "Ada").await.unwrap();

        f.handlers
            .delete_school(DeleteSchool { school_id: school.id })
            .await
            .unwrap();
        assert_eq!(f.repository.student_count(), 0);

        let err = f
            .handlers
            .delete_school(DeleteSchool { school_id: school.id })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn search_pages_and_requires_school() {
        let f = fixture(UpdateStrategy::Selective);
        let school = create(&f.handlers, "Central", 10).await;
        create(&f.handlers, "Central North", 10).await;
        create(&f.handlers, "South", 10).await;
        for name in ["Ada", "Adam", "Bob"] {
            enroll(&f.handlers, school.id, name).await.unwrap();
        }

        let page = f
            .handlers
            .search_schools(SearchSchools {
                query: "central".to_string(),
                page: PageRequest::default(),
            })
            .await
            .unwrap();
        assert_eq!(page.total_elements, 2);
        assert_eq!(page.items[0].enrolled, 3);

        let page = f
            .handlers
            .search_students(SearchStudents {
                school_id: school.id,
                query: "ad".to_string(),
                page: PageRequest::new(0, 1).unwrap(),
            })
            .await
            .unwrap();
        assert_eq!(page.total_elements, 2);
        assert_eq!(page.items[0].name(), "Ada");
        assert!(page.has_next);

        let err = f
            .handlers
            .search_students(SearchStudents {
                school_id: SchoolId::generate(),
                query: String::new(),
                page: PageRequest::default(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
