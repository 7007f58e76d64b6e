use serde::{Deserialize, Serialize};

use crate::{DomainError, SchoolId, StudentId};

/// Longest accepted school or student name, in characters.
pub const MAX_NAME_LEN: usize = 100;

/// Trims `raw` and checks that the result is a usable name.
pub(crate) fn normalize_name(what: &str, raw: &str) -> Result<String, DomainError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(DomainError::Validation(format!("{} name must not be blank", what)));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::Validation(format!(
            "{} name must be at most {} characters",
            what, MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

//////////////////////////////////////////////// Student ///////////////////////////////////////////////

/// A student enrolled in exactly one school.
///
/// Students are immutable values: renaming produces a new `Student` with the same id and
/// school. `school_id` is a plain back-reference, never an owning handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    id: StudentId,
    name: String,
    school_id: SchoolId,
}

impl Student {
    /// Creates a student, trimming and validating the name.
    pub fn new(id: StudentId, name: &str, school_id: SchoolId) -> Result<Self, DomainError> {
        Ok(Student {
            id,
            name: normalize_name("student", name)?,
            school_id,
        })
    }

    /// Returns a copy of this student carrying `name`.
    pub fn renamed(&self, name: &str) -> Result<Self, DomainError> {
        Student::new(self.id, name, self.school_id)
    }

    pub fn id(&self) -> StudentId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn school_id(&self) -> SchoolId {
        self.school_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn new_trims_name() {
        let student = Student::new(StudentId::generate(), "  Ada Lovelace ", SchoolId::generate())
            .unwrap();
        assert_eq!(student.name(), "Ada Lovelace");
    }

    #[test]
    fn blank_names_are_rejected() {
        for name in ["", "   ", "\t\n"] {
            let err = Student::new(StudentId::generate(), name, SchoolId::generate()).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Validation);
        }
    }

    #[test]
    fn overlong_names_are_rejected() {
        let name = "x".repeat(MAX_NAME_LEN + 1);
        let err = Student::new(StudentId::generate(), &name, SchoolId::generate()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let name = "x".repeat(MAX_NAME_LEN);
        assert!(Student::new(StudentId::generate(), &name, SchoolId::generate()).is_ok());
    }

    #[test]
    fn renamed_keeps_identity() {
        let original = Student::new(StudentId::generate(), "Grace", SchoolId::generate()).unwrap();
        let renamed = original.renamed(" Grace Hopper ").unwrap();
        assert_eq!(renamed.id(), original.id());
        assert_eq!(renamed.school_id(), original.school_id());
        assert_eq!(renamed.name(), "Grace Hopper");
        assert_eq!(original.name(), "Grace");
    }
}
