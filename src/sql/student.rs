//! Student row operations for PostgreSQL.
//!
//! These functions never touch the owning school row; callers that write students
//! directly are responsible for advancing the school version with
//! [`super::school::touch`].

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{SqlResult, db_error, escape_like};
use crate::repository::{Page, PageRequest};
use crate::{DomainError, SchoolId, Student, StudentId};

type StudentRow = (Uuid, String, Uuid);

fn student_from_row((id, name, school_id): StudentRow) -> SqlResult<Student> {
    Student::new(StudentId::new(id), &name, SchoolId::new(school_id))
        .map_err(|e| DomainError::Storage(format!("student {} is invalid: {}", id, e)))
}

fn students_from_rows(rows: Vec<StudentRow>) -> SqlResult<Vec<Student>> {
    rows.into_iter().map(student_from_row).collect()
}

/// Lists every student of a school.
pub async fn list_for_school(
    tx: &mut Transaction<'_, Postgres>,
    school_id: SchoolId,
) -> SqlResult<Vec<Student>> {
    let rows: Vec<StudentRow> = sqlx::query_as(
        r#"
        SELECT id, name, school_id
        FROM students
        WHERE school_id = $1
        "#,
    )
    .bind(school_id.as_uuid())
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| db_error("listing students", e))?;
    students_from_rows(rows)
}

/// Retrieves a student by id.
pub async fn get(tx: &mut Transaction<'_, Postgres>, id: StudentId) -> SqlResult<Option<Student>> {
    let row: Option<StudentRow> = sqlx::query_as(
        r#"
        SELECT id, name, school_id
        FROM students
        WHERE id = $1
        "#,
    )
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| db_error("getting student", e))?;
    row.map(student_from_row).transpose()
}

/// Retrieves a student only if it belongs to `school_id`.
pub async fn get_in_school(
    tx: &mut Transaction<'_, Postgres>,
    id: StudentId,
    school_id: SchoolId,
) -> SqlResult<Option<Student>> {
    let row: Option<StudentRow> = sqlx::query_as(
        r#"
        SELECT id, name, school_id
        FROM students
        WHERE id = $1 AND school_id = $2
        "#,
    )
    .bind(id.as_uuid())
    .bind(school_id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| db_error("getting student in school", e))?;
    row.map(student_from_row).transpose()
}

pub async fn count_for_school(
    tx: &mut Transaction<'_, Postgres>,
    school_id: SchoolId,
) -> SqlResult<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM students WHERE school_id = $1")
        .bind(school_id.as_uuid())
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| db_error("counting students", e))
}

/// Inserts a new student row.
///
/// # Returns
/// * `Ok(())` - Student created
/// * `Err(DomainError::NotFound)` - The school does not exist
/// * `Err(DomainError::Storage)` - The id is taken or the database failed
pub async fn insert(tx: &mut Transaction<'_, Postgres>, student: &Student) -> SqlResult<()> {
    let result = sqlx::query(
        r#"
        INSERT INTO students (id, name, school_id)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(student.id().as_uuid())
    .bind(student.name())
    .bind(student.school_id().as_uuid())
    .execute(&mut **tx)
    .await;

    match result {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
            Err(DomainError::school_not_found(student.school_id()))
        }
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Err(
            DomainError::Storage(format!("student {} already exists", student.id())),
        ),
        Err(e) => Err(db_error("inserting student", e)),
    }
}

/// Inserts the student or overwrites the name and school of an existing row.
pub async fn upsert(tx: &mut Transaction<'_, Postgres>, student: &Student) -> SqlResult<()> {
    sqlx::query(
        r#"
        INSERT INTO students (id, name, school_id)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO UPDATE
        SET name = EXCLUDED.name, school_id = EXCLUDED.school_id, updated_at = CURRENT_TIMESTAMP
        "#,
    )
    .bind(student.id().as_uuid())
    .bind(student.name())
    .bind(student.school_id().as_uuid())
    .execute(&mut **tx)
    .await
    .map_err(|e| db_error("upserting student", e))?;
    Ok(())
}

/// Writes the student's name.
///
/// # Returns
/// * `Ok(true)` - Student updated
/// * `Ok(false)` - No such student in that school
pub async fn update(tx: &mut Transaction<'_, Postgres>, student: &Student) -> SqlResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE students
        SET name = $3, updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND school_id = $2
        "#,
    )
    .bind(student.id().as_uuid())
    .bind(student.school_id().as_uuid())
    .bind(student.name())
    .execute(&mut **tx)
    .await
    .map_err(|e| db_error("updating student", e))?;
    Ok(result.rows_affected() > 0)
}

/// # Returns
/// * `Ok(true)` - Student deleted
/// * `Ok(false)` - Student did not exist
pub async fn delete(tx: &mut Transaction<'_, Postgres>, id: StudentId) -> SqlResult<bool> {
    let result = sqlx::query("DELETE FROM students WHERE id = $1")
        .bind(id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("deleting student", e))?;
    Ok(result.rows_affected() > 0)
}

/// Deletes the students of `school_id` whose ids are not in `keep`.
///
/// Returns the number of deleted rows.
pub async fn delete_missing(
    tx: &mut Transaction<'_, Postgres>,
    school_id: SchoolId,
    keep: &[StudentId],
) -> SqlResult<u64> {
    let keep: Vec<Uuid> = keep.iter().map(StudentId::as_uuid).collect();
    let result = sqlx::query("DELETE FROM students WHERE school_id = $1 AND id <> ALL($2)")
        .bind(school_id.as_uuid())
        .bind(keep)
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("pruning students", e))?;
    Ok(result.rows_affected())
}

/// Searches the students of one school by name, case-insensitively.
pub async fn search(
    tx: &mut Transaction<'_, Postgres>,
    school_id: SchoolId,
    query: &str,
    page: PageRequest,
) -> SqlResult<Page<Student>> {
    let pattern = format!("%{}%", escape_like(query.trim()));

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM students WHERE school_id = $1 AND name ILIKE $2 ESCAPE '\'
        "#,
    )
    .bind(school_id.as_uuid())
    .bind(&pattern)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| db_error("counting students", e))?;

    let rows: Vec<StudentRow> = sqlx::query_as(
        r#"
        SELECT id, name, school_id
        FROM students
        WHERE school_id = $1 AND name ILIKE $2 ESCAPE '\'
        ORDER BY lower(name), id
        LIMIT $3 OFFSET $4
        "#,
    )
    .bind(school_id.as_uuid())
    .bind(&pattern)
    .bind(i64::from(page.size()))
    .bind(page.offset() as i64)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| db_error("searching students", e))?;

    Ok(Page::new(students_from_rows(rows)?, page, total.max(0) as u64))
}
