//! School row operations for PostgreSQL.
//!
//! Every write to a school row advances its `version` column and refreshes `updated_at`.
//! Conditional writes compare the version the caller observed and fail with
//! [`DomainError::VersionConflict`] when another transaction got there first.

use sqlx::{Postgres, Transaction};
use uuid::Uuid;

use super::{SqlResult, db_error, escape_like};
use crate::repository::{Page, PageRequest, SchoolRecord, SchoolSummary};
use crate::{Capacity, DomainError, SchoolId};

/// Name of the unique index that enforces case-insensitive school names.
const NAME_INDEX: &str = "schools_name_lower_idx";

type SchoolRow = (Uuid, String, i32, i64);

fn record_from_row((id, name, capacity, version): SchoolRow) -> SqlResult<SchoolRecord> {
    let capacity = Capacity::new(capacity)
        .map_err(|e| DomainError::Storage(format!("school {} has invalid capacity: {}", id, e)))?;
    Ok(SchoolRecord {
        id: SchoolId::new(id),
        name,
        capacity,
        version,
    })
}

fn write_error(context: &str, name: &str, e: sqlx::Error) -> DomainError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() && db_err.constraint() == Some(NAME_INDEX) {
            return DomainError::DuplicateName {
                name: name.to_string(),
            };
        }
    }
    db_error(context, e)
}

/// Retrieves a school row without locking it.
///
/// # Returns
/// * `Ok(Some(SchoolRecord))` - School found, with its current version
/// * `Ok(None)` - School not found
pub async fn get(
    tx: &mut Transaction<'_, Postgres>,
    id: SchoolId,
) -> SqlResult<Option<SchoolRecord>> {
    let row: Option<SchoolRow> = sqlx::query_as(
        r#"
        SELECT id, name, capacity, version
        FROM schools
        WHERE id = $1
        "#,
    )
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| db_error("getting school", e))?;
    row.map(record_from_row).transpose()
}

/// Retrieves a school row and locks it until the transaction ends.
///
/// Other transactions calling this function, or writing the row, block until then.
pub async fn get_for_update(
    tx: &mut Transaction<'_, Postgres>,
    id: SchoolId,
) -> SqlResult<Option<SchoolRecord>> {
    let row: Option<SchoolRow> = sqlx::query_as(
        r#"
        SELECT id, name, capacity, version
        FROM schools
        WHERE id = $1
        FOR UPDATE
        "#,
    )
    .bind(id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| db_error("locking school", e))?;
    row.map(record_from_row).transpose()
}

/// Checks whether a school with this name exists, ignoring case and surrounding whitespace.
pub async fn exists_by_name(tx: &mut Transaction<'_, Postgres>, name: &str) -> SqlResult<bool> {
    sqlx::query_scalar(
        r#"
        SELECT EXISTS (SELECT 1 FROM schools WHERE lower(name) = lower($1))
        "#,
    )
    .bind(name.trim())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| db_error("checking school name", e))
}

/// Inserts a new school row at version 0.
///
/// # Returns
/// * `Ok(0)` - The version of the new row
/// * `Err(DomainError::DuplicateName)` - Another school already uses the name
/// * `Err(DomainError::Storage)` - The id is taken or the database failed
pub async fn insert(
    tx: &mut Transaction<'_, Postgres>,
    id: SchoolId,
    name: &str,
    capacity: Capacity,
) -> SqlResult<i64> {
    sqlx::query_scalar(
        r#"
        INSERT INTO schools (id, name, capacity, version)
        VALUES ($1, $2, $3, 0)
        RETURNING version
        "#,
    )
    .bind(id.as_uuid())
    .bind(name)
    .bind(capacity.value())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| write_error("inserting school", name, e))
}

/// Writes name and capacity if the row still carries `record.version`.
///
/// # Returns
/// * `Ok(version)` - The new version of the row
/// * `Err(DomainError::VersionConflict)` - The row moved on or disappeared
/// * `Err(DomainError::DuplicateName)` - Another school already uses the name
pub async fn update(tx: &mut Transaction<'_, Postgres>, record: &SchoolRecord) -> SqlResult<i64> {
    let version: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE schools
        SET name = $3, capacity = $4, version = version + 1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND version = $2
        RETURNING version
        "#,
    )
    .bind(record.id.as_uuid())
    .bind(record.version)
    .bind(&record.name)
    .bind(record.capacity.value())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| write_error("updating school", &record.name, e))?;
    version.ok_or(DomainError::VersionConflict {
        school_id: record.id,
    })
}

/// Advances the version of a school row without changing its fields.
///
/// # Returns
/// * `Ok(version)` - The new version of the row
/// * `Err(DomainError::VersionConflict)` - The row no longer carries `expected_version`
pub async fn touch(
    tx: &mut Transaction<'_, Postgres>,
    id: SchoolId,
    expected_version: i64,
) -> SqlResult<i64> {
    let version: Option<i64> = sqlx::query_scalar(
        r#"
        UPDATE schools
        SET version = version + 1, updated_at = CURRENT_TIMESTAMP
        WHERE id = $1 AND version = $2
        RETURNING version
        "#,
    )
    .bind(id.as_uuid())
    .bind(expected_version)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| db_error("touching school", e))?;
    version.ok_or(DomainError::VersionConflict { school_id: id })
}

/// Deletes a school row; its students go with it by cascade.
///
/// # Returns
/// * `Ok(true)` - School was deleted
/// * `Ok(false)` - School did not exist
pub async fn delete(tx: &mut Transaction<'_, Postgres>, id: SchoolId) -> SqlResult<bool> {
    let result = sqlx::query("DELETE FROM schools WHERE id = $1")
        .bind(id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| db_error("deleting school", e))?;
    Ok(result.rows_affected() > 0)
}

/// Searches schools whose name contains `query`, case-insensitively.
///
/// Results are ordered by lower-cased name, then id, and carry their enrollment count.
pub async fn search(
    tx: &mut Transaction<'_, Postgres>,
    query: &str,
    page: PageRequest,
) -> SqlResult<Page<SchoolSummary>> {
    let pattern = format!("%{}%", escape_like(query.trim()));

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM schools WHERE name ILIKE $1 ESCAPE '\'
        "#,
    )
    .bind(&pattern)
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| db_error("counting schools", e))?;

    let rows: Vec<(Uuid, String, i32, i64)> = sqlx::query_as(
        r#"
        SELECT s.id, s.name, s.capacity,
               (SELECT COUNT(*) FROM students st WHERE st.school_id = s.id) AS enrolled
        FROM schools s
        WHERE s.name ILIKE $1 ESCAPE '\'
        ORDER BY lower(s.name), s.id
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(&pattern)
    .bind(i64::from(page.size()))
    .bind(page.offset() as i64)
    .fetch_all(&mut **tx)
    .await
    .map_err(|e| db_error("searching schools", e))?;

    let mut items = Vec::with_capacity(rows.len());
    for (id, name, capacity, enrolled) in rows {
        let record = record_from_row((id, name, capacity, 0))?;
        items.push(SchoolSummary {
            id: record.id,
            name: record.name,
            capacity: record.capacity,
            enrolled,
        });
    }
    Ok(Page::new(items, page, total.max(0) as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::tests::setup_test_db;

    #[tokio::test]
    #[ignore = "requires PostgreSQL; set TEST_DATABASE_URL"]
    async fn insert_get_and_update() {
        let pool = setup_test_db().await;
        let mut tx = pool.begin().await.unwrap();
        let id = SchoolId::generate();
        let capacity = Capacity::new(30).unwrap();

        assert_eq!(insert(&mut tx, id, "Central", capacity).await.unwrap(), 0);
        let mut record = get(&mut tx, id).await.unwrap().unwrap();
        assert_eq!(record.name, "Central");
        assert_eq!(record.version, 0);

        record.name = "Central North".to_string();
        assert_eq!(update(&mut tx, &record).await.unwrap(), 1);

        let err = update(&mut tx, &record).await.unwrap_err();
        assert_eq!(err, DomainError::VersionConflict { school_id: id });
        tx.rollback().await.unwrap();
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL; set TEST_DATABASE_URL"]
    async fn names_are_unique_ignoring_case() {
        let pool = setup_test_db().await;
        let mut tx = pool.begin().await.unwrap();
        let capacity = Capacity::new(30).unwrap();
        insert(&mut tx, SchoolId::generate(), "Central", capacity)
            .await
            .unwrap();
        assert!(exists_by_name(&mut tx, " CENTRAL ").await.unwrap());

        let err = insert(&mut tx, SchoolId::generate(), "central", capacity)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DomainError::DuplicateName {
                name: "central".to_string()
            }
        );
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL; set TEST_DATABASE_URL"]
    async fn touch_and_delete() {
        let pool = setup_test_db().await;
        let mut tx = pool.begin().await.unwrap();
        let id = SchoolId::generate();
        insert(&mut tx, id, "Central", Capacity::new(5).unwrap())
            .await
            .unwrap();
        assert_eq!(touch(&mut tx, id, 0).await.unwrap(), 1);
        assert!(touch(&mut tx, id, 0).await.is_err());
        assert!(delete(&mut tx, id).await.unwrap());
        assert!(!delete(&mut tx, id).await.unwrap());
        assert!(get(&mut tx, id).await.unwrap().is_none());
    }

    #[tokio::test]
    #[ignore = "requires PostgreSQL; set TEST_DATABASE_URL"]
    async fn search_escapes_wildcards_and_pages() {
        let pool = setup_test_db().await;
        let mut tx = pool.begin().await.unwrap();
        let capacity = Capacity::new(5).unwrap();
        for name in ["100% Academy", "Alpha", "alphabet", "Beta"] {
            insert(&mut tx, SchoolId::generate(), name, capacity)
                .await
                .unwrap();
        }

        let page = search(&mut tx, "%", PageRequest::default()).await.unwrap();
        assert_eq!(page.total_elements, 1);
        assert_eq!(page.items[0].name, "100% Academy");
        assert_eq!(page.items[0].enrolled, 0);

        let page = search(&mut tx, "ALPHA", PageRequest::new(0, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(page.total_elements, 2);
        assert_eq!(page.items[0].name, "Alpha");
        assert!(page.has_next);
    }
}
