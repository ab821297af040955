//! ClickHouse table schemas for the star schema.
//!
//! - ReplacingMergeTree ordered by each table's natural key; the version
//!   column is the processing timestamp, so the last write of a key wins
//! - Reads go through `FINAL`
//! - UUID columns for identifiers, DateTime64(3) for timestamps
//!
//! Statements use `{db}` as the database placeholder.

use crate::client::ClickHouseClient;
use analytics_core::{Error, Result};
use tracing::debug;

pub const CREATE_DATABASE: &str = "CREATE DATABASE IF NOT EXISTS {db}";

pub const CREATE_DIM_TEACHER: &str = r#"
CREATE TABLE IF NOT EXISTS {db}.dim_teacher (
    teacher_id UUID,
    full_name String,
    department_id UUID,
    department_name String,
    specializations Array(String),
    updated_at DateTime64(3, 'UTC')
)
ENGINE = ReplacingMergeTree(updated_at)
ORDER BY teacher_id
"#;

pub const CREATE_DIM_DEPARTMENT: &str = r#"
CREATE TABLE IF NOT EXISTS {db}.dim_department (
    department_id UUID,
    name String,
    code LowCardinality(String),
    updated_at DateTime64(3, 'UTC')
)
ENGINE = ReplacingMergeTree(updated_at)
ORDER BY department_id
"#;

pub const CREATE_DIM_SUBJECT: &str = r#"
CREATE TABLE IF NOT EXISTS {db}.dim_subject (
    subject_id UUID,
    name String,
    code String,
    credits Int32,
    department_id UUID,
    updated_at DateTime64(3, 'UTC')
)
ENGINE = ReplacingMergeTree(updated_at)
ORDER BY subject_id
"#;

pub const CREATE_DIM_SEMESTER: &str = r#"
CREATE TABLE IF NOT EXISTS {db}.dim_semester (
    semester_id UUID,
    name String,
    year Int32,
    term LowCardinality(String),
    start_date Nullable(Date32),
    end_date Nullable(Date32),
    updated_at DateTime64(3, 'UTC')
)
ENGINE = ReplacingMergeTree(updated_at)
ORDER BY semester_id
"#;

/// `created_at` doubles as the version, so a conflicting write replaces it.
pub const CREATE_FACT_WORKLOAD: &str = r#"
CREATE TABLE IF NOT EXISTS {db}.fact_workload (
    id UUID,
    teacher_id UUID,
    semester_id UUID,
    subject_id UUID,
    hours_per_week Float64,
    total_hours Float64,
    created_at DateTime64(3, 'UTC')
)
ENGINE = ReplacingMergeTree(created_at)
ORDER BY (teacher_id, semester_id, subject_id)
"#;

pub const CREATE_FACT_SCHEDULE_ENTRY: &str = r#"
CREATE TABLE IF NOT EXISTS {db}.fact_schedule_entry (
    id UUID,
    schedule_id UUID,
    semester_id UUID,
    teacher_id UUID,
    subject_id UUID,
    room_id UUID,
    day_of_week Int32,
    period Int32,
    is_assigned Bool,
    created_at DateTime64(3, 'UTC')
)
ENGINE = ReplacingMergeTree(created_at)
ORDER BY (schedule_id, day_of_week, period, room_id)
"#;

/// Table names, in creation order.
pub mod table {
    pub const DIM_TEACHER: &str = "dim_teacher";
    pub const DIM_DEPARTMENT: &str = "dim_department";
    pub const DIM_SUBJECT: &str = "dim_subject";
    pub const DIM_SEMESTER: &str = "dim_semester";
    pub const FACT_WORKLOAD: &str = "fact_workload";
    pub const FACT_SCHEDULE_ENTRY: &str = "fact_schedule_entry";

    pub const ALL: &[&str] = &[
        DIM_TEACHER,
        DIM_DEPARTMENT,
        DIM_SUBJECT,
        DIM_SEMESTER,
        FACT_WORKLOAD,
        FACT_SCHEDULE_ENTRY,
    ];
}

/// All table creation statements.
pub fn all_tables() -> Vec<&'static str> {
    vec![
        CREATE_DIM_TEACHER,
        CREATE_DIM_DEPARTMENT,
        CREATE_DIM_SUBJECT,
        CREATE_DIM_SEMESTER,
        CREATE_FACT_WORKLOAD,
        CREATE_FACT_SCHEDULE_ENTRY,
    ]
}

/// Substitute the database name into a statement.
pub fn render(ddl: &str, database: &str) -> String {
    ddl.replace("{db}", database)
}

/// Create the database and every table if missing.
pub async fn init_schema(client: &ClickHouseClient) -> Result<()> {
    let database = client.database();

    client
        .server()
        .query(&render(CREATE_DATABASE, database))
        .execute()
        .await
        .map_err(|e| Error::internal(format!("Failed to create database {}: {}", database, e)))?;

    for ddl in all_tables() {
        client
            .server()
            .query(&render(ddl, database))
            .execute()
            .await
            .map_err(|e| Error::internal(format!("Schema init error: {}", e)))?;
    }

    debug!(database, tables = table::ALL.len(), "ClickHouse schema initialized");
    Ok(())
}
