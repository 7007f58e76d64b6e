//! The school aggregate.
//!
//! A [`School`] owns its students and is the only way to enroll, rename, or remove them
//! while enforcing the aggregate's invariants:
//!
//! - `enrolled_count() <= capacity().value()` after every mutation,
//! - every owned student's `school_id()` equals the school's id,
//! - the name is trimmed and non-blank.
//!
//! ```rust
//! # use schoolhouse::{Capacity, School, SchoolId, DomainEvent};
//! let mut school = School::create(SchoolId::generate(), " Riverside ", Capacity::new(2).unwrap()).unwrap();
//! let student = school.enroll_student("Ada").unwrap();
//! assert_eq!(school.name(), "Riverside");
//! assert_eq!(school.enrolled_count(), 1);
//! assert_eq!(
//!     school.pull_domain_events(),
//!     vec![DomainEvent::student_enrolled(student.id(), school.id())]
//! );
//! assert!(school.pull_domain_events().is_empty());
//! ```

use std::collections::HashMap;

use crate::capacity::{ensure_can_enroll, ensure_resize_allowed};
use crate::student::normalize_name;
use crate::{Capacity, DomainError, DomainEvent, SchoolId, Student, StudentId};

/// Aggregate root for a school and its enrolled students.
#[derive(Debug, Clone)]
pub struct School {
    id: SchoolId,
    name: String,
    capacity: Capacity,
    students: HashMap<StudentId, Student>,
    events: Vec<DomainEvent>,
}

impl School {
    /// Creates a brand-new school with no students.
    pub fn create(id: SchoolId, name: &str, capacity: Capacity) -> Result<Self, DomainError> {
        Ok(School {
            id,
            name: normalize_name("school", name)?,
            capacity,
            students: HashMap::new(),
            events: Vec::new(),
        })
    }

    /// Reconstructs a persisted school together with its students.
    ///
    /// Used by repository adapters only. Students that reference another school are
    /// rejected rather than silently adopted.
    pub fn rehydrate(
        id: SchoolId,
        name: String,
        capacity: Capacity,
        students: impl IntoIterator<Item = Student>,
    ) -> Result<Self, DomainError> {
        let mut by_id = HashMap::new();
        for student in students {
            if student.school_id() != id {
                return Err(DomainError::Storage(format!(
                    "student {} belongs to school {}, not {}",
                    student.id(),
                    student.school_id(),
                    id
                )));
            }
            by_id.insert(student.id(), student);
        }
        Ok(School {
            id,
            name,
            capacity,
            students: by_id,
            events: Vec::new(),
        })
    }

    /// Reconstructs only the school row, without any students.
    pub fn rehydrate_basic(id: SchoolId, name: String, capacity: Capacity) -> Self {
        School {
            id,
            name,
            capacity,
            students: HashMap::new(),
            events: Vec::new(),
        }
    }

    /// Enrolls a new student named `name`, generating its id.
    ///
    /// Fails with `CapacityExceeded` when the school is full; the student set is left
    /// untouched on failure. Records a `StudentEnrolled` event on success.
    pub fn enroll_student(&mut self, name: &str) -> Result<Student, DomainError> {
        ensure_can_enroll(self.capacity, self.enrolled_count() as i64, self.id)?;
        let student = Student::new(StudentId::generate(), name, self.id)?;
        self.students.insert(student.id(), student.clone());
        self.events
            .push(DomainEvent::student_enrolled(student.id(), self.id));
        Ok(student)
    }

    /// Renames an owned student.
    pub fn update_student(
        &mut self,
        student_id: StudentId,
        name: &str,
    ) -> Result<&Student, DomainError> {
        let existing = self
            .students
            .get(&student_id)
            .ok_or_else(|| DomainError::student_not_found(student_id))?;
        let updated = existing.renamed(name)?;
        self.students.insert(student_id, updated);
        Ok(&self.students[&student_id])
    }

    /// Removes an owned student and returns it.
    pub fn remove_student(&mut self, student_id: StudentId) -> Result<Student, DomainError> {
        self.students
            .remove(&student_id)
            .ok_or_else(|| DomainError::student_not_found(student_id))
    }

    /// Looks up an owned student.
    pub fn find_student(&self, student_id: StudentId) -> Option<&Student> {
        self.students.get(&student_id)
    }

    /// Replaces the name. Uniqueness across schools is the caller's concern.
    pub fn change_name(&mut self, name: &str) -> Result<(), DomainError> {
        self.name = normalize_name("school", name)?;
        Ok(())
    }

    /// Replaces the capacity unless it would fall below the current enrollment.
    pub fn resize_capacity(&mut self, capacity: Capacity) -> Result<(), DomainError> {
        ensure_resize_allowed(capacity, self.enrolled_count() as i64)?;
        self.capacity = capacity;
        Ok(())
    }

    /// Returns every pending event and empties the buffer.
    pub fn pull_domain_events(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn id(&self) -> SchoolId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> Capacity {
        self.capacity
    }

    pub fn enrolled_count(&self) -> usize {
        self.students.len()
    }

    pub fn available_spots(&self) -> i64 {
        self.capacity.available_spots(self.enrolled_count() as i64)
    }

    /// The owned students, ordered by name and then id.
    pub fn students(&self) -> Vec<&Student> {
        let mut students: Vec<&Student> = self.students.values().collect();
        students.sort_by(|a, b| a.name().cmp(b.name()).then(a.id().cmp(&b.id())));
        students
    }
}
