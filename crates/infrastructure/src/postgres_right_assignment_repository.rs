use async_trait::async_trait;
use refdata_application::{RebuildStaging, RightAssignmentRepository};
use refdata_core::{AppError, AppResult};
use refdata_domain::{FacilityId, ProgramId, RightAssignment, UserId};
use sqlx::{FromRow, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;


const LIVE_TABLE: &str = "right_assignments";
const STAGING_TABLE_PREFIX: &str = "right_assignments_staging_";
// PostgreSQL accepts at most 65535 bind parameters per statement.
const MAX_ROWS_PER_STATEMENT: usize = 65535 / 4;

/// PostgreSQL-backed store of materialized right assignments.
///
/// A rebuild fills a staging table created from the live table definition
/// and swaps it in with one transaction.
#[derive(Clone)]
pub struct PostgresRightAssignmentRepository {
    pool: PgPool,
}

impl PostgresRightAssignmentRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct RightAssignmentRow {
    user_id: Uuid,
    right_name: String,
    facility_id: Option<Uuid>,
    program_id: Option<Uuid>,
}

impl From<RightAssignmentRow> for RightAssignment {
    fn from(row: RightAssignmentRow) -> Self {
        Self::new(
            UserId::from_uuid(row.user_id),
            row.right_name,
            row.facility_id.map(FacilityId::from_uuid),
            row.program_id.map(ProgramId::from_uuid),
        )
    }
}

/// Returns the staging table name after checking it was issued by this
/// repository, since it is spliced into SQL text.
fn staging_table(staging: &RebuildStaging) -> AppResult<&str> {
    let table_name = staging.table_name.as_str();
    let valid = table_name
        .strip_prefix(STAGING_TABLE_PREFIX)
        .is_some_and(|suffix| {
            !suffix.is_empty() && suffix.bytes().all(|byte| byte.is_ascii_hexdigit())
        });

    if !valid {
        return Err(AppError::Validation(format!(
            "'{table_name}' is not a right assignment staging table"
        )));
    }

    Ok(table_name)
}

#[async_trait]
impl RightAssignmentRepository for PostgresRightAssignmentRepository {
    async fn begin_rebuild(&self) -> AppResult<RebuildStaging> {
        let run_id = Uuid::new_v4().simple().to_string();
        let staging = RebuildStaging {
            table_name: format!("{STAGING_TABLE_PREFIX}{run_id}"),
            run_id,
        };
        let table_name = staging_table(&staging)?;

        sqlx::query(&format!(
            "CREATE TABLE {table_name} (LIKE {LIVE_TABLE} INCLUDING ALL)"
        ))
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to create staging table '{table_name}': {error}"
            ))
        })?;

        debug!(
            run_id = %staging.run_id,
            table_name,
            "right assignment staging table created"
        );
        Ok(staging)
    }

    async fn insert_batch(
        &self,
        staging: &RebuildStaging,
        rows: &[RightAssignment],
    ) -> AppResult<u64> {
        if rows.is_empty() {
            return Ok(0);
        }
        let table_name = staging_table(staging)?;

        let mut inserted = 0;
        for chunk in rows.chunks(MAX_ROWS_PER_STATEMENT) {
            let mut builder: QueryBuilder<'_, Postgres> = QueryBuilder::new(format!(
                "INSERT INTO {table_name} (user_id, right_name, facility_id, program_id) "
            ));
            builder.push_values(chunk, |mut values, row| {
                values
                    .push_bind(row.user_id.as_uuid())
                    .push_bind(row.right_name.as_str())
                    .push_bind(row.facility_id.map(|value| value.as_uuid()))
                    .push_bind(row.program_id.map(|value| value.as_uuid()));
            });

            let result = builder.build().execute(&self.pool).await.map_err(|error| {
                AppError::Persistence(format!(
                    "failed to insert {} right assignments into '{table_name}': {error}",
                    chunk.len()
                ))
            })?;
            inserted += result.rows_affected();
        }

        Ok(inserted)
    }

    async fn commit_rebuild(&self, staging: RebuildStaging) -> AppResult<()> {
        let table_name = staging_table(&staging)?;

        let mut transaction = self.pool.begin().await.map_err(|error| {
            AppError::Persistence(format!(
                "failed to start right assignment swap transaction: {error}"
            ))
        })?;

        let statements = [
            format!("LOCK TABLE {LIVE_TABLE} IN ACCESS EXCLUSIVE MODE"),
            format!("DROP TABLE {LIVE_TABLE}"),
            format!("ALTER TABLE {table_name} RENAME TO {LIVE_TABLE}"),
            format!("ANALYZE {LIVE_TABLE}"),
        ];
        for statement in &statements {
            sqlx::query(statement)
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Persistence(format!(
                        "failed to swap in staging table '{table_name}': {error}"
                    ))
                })?;
        }

        transaction.commit().await.map_err(|error| {
            AppError::Persistence(format!(
                "failed to commit right assignment swap transaction: {error}"
            ))
        })?;

        Ok(())
    }

    async fn abort_rebuild(&self, staging: RebuildStaging) -> AppResult<()> {
        let table_name = staging_table(&staging)?;

        sqlx::query(&format!("DROP TABLE IF EXISTS {table_name}"))
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Persistence(format!(
                    "failed to drop staging table '{table_name}': {error}"
                ))
            })?;

        Ok(())
    }

    async fn list_right_assignments_for_user(
        &self,
        user_id: UserId,
    ) -> AppResult<Vec<RightAssignment>> {
        let rows = sqlx::query_as::<_, RightAssignmentRow>(
            r#"
            SELECT user_id, right_name, facility_id, program_id
            FROM right_assignments
            WHERE user_id = $1
            ORDER BY right_name, facility_id NULLS FIRST, program_id NULLS FIRST
            "#,
        )
        .bind(user_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| {
            AppError::Persistence(format!(
                "failed to list right assignments for user '{user_id}': {error}"
            ))
        })?;

        Ok(rows.into_iter().map(RightAssignment::from).collect())
    }
}
