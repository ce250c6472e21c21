use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::{postgres::PgRow, sqlite::SqliteRow, PgPool, Row, SqlitePool};
use tracing::debug;

use careplan_core::{
    domain::graph, GraphDocument, PatientId, PlanError, PlanId, PlanRepository, TreatmentPlan,
};

const SELECT_COLUMNS: &str = "id, patient_id, nodes, edges, created_at, updated_at";

fn storage_error(context: &str, e: sqlx::Error) -> PlanError {
    PlanError::StorageUnavailable(format!("{}: {}", context, e))
}

fn missing_after_insert(patient_id: &PatientId) -> PlanError {
    PlanError::StorageUnavailable(format!(
        "Plan for patient {} vanished between insert and read",
        patient_id
    ))
}

fn assemble(
    id: i64,
    patient_id: i64,
    nodes: &Value,
    edges: &Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
) -> Result<TreatmentPlan, PlanError> {
    let document = graph::deserialize_stored(nodes, edges).map_err(|e| {
        PlanError::CorruptRecord(format!("stored plan {} is unreadable: {}", id, e))
    })?;
    Ok(TreatmentPlan::new(
        PlanId(id),
        PatientId(patient_id),
        document,
        created_at,
        updated_at,
    ))
}

/// PostgreSQL implementation of the PlanRepository
#[derive(Clone)]
pub struct PostgresPlanRepository {
    pool: PgPool,
}

impl PostgresPlanRepository {
    /// Create a new repository over an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get the database connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn row_to_plan(row: &PgRow) -> Result<TreatmentPlan, PlanError> {
        let decode = |e| storage_error("Failed to decode plan row", e);
        let nodes: Value = row.try_get("nodes").map_err(decode)?;
        let edges: Value = row.try_get("edges").map_err(decode)?;
        assemble(
            row.try_get("id").map_err(decode)?,
            row.try_get("patient_id").map_err(decode)?,
            &nodes,
            &edges,
            row.try_get("created_at").map_err(decode)?,
            row.try_get("updated_at").map_err(decode)?,
        )
    }

    fn payloads(document: &GraphDocument) -> Result<(Value, Value), PlanError> {
        graph::serialize(document)
    }
}

#[async_trait]
impl PlanRepository for PostgresPlanRepository {
    async fn get_by_patient(
        &self,
        patient_id: &PatientId,
    ) -> Result<Option<TreatmentPlan>, PlanError> {
        let query = format!(
            "SELECT {} FROM treatment_plans WHERE patient_id = $1",
            SELECT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(patient_id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to load plan", e))?;

        row.as_ref().map(Self::row_to_plan).transpose()
    }

    async fn upsert(
        &self,
        patient_id: &PatientId,
        document: &GraphDocument,
    ) -> Result<TreatmentPlan, PlanError> {
        let (nodes, edges) = Self::payloads(document)?;
        let query = format!(
            "
            INSERT INTO treatment_plans (patient_id, nodes, edges, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (patient_id) DO UPDATE SET
                nodes = EXCLUDED.nodes,
                edges = EXCLUDED.edges,
                updated_at = EXCLUDED.updated_at
            RETURNING {}
            ",
            SELECT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(patient_id.get())
            .bind(&nodes)
            .bind(&edges)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to save plan", e))?;

        debug!(patient_id = %patient_id, "Plan upserted");
        Self::row_to_plan(&row)
    }

    async fn create_if_absent(
        &self,
        patient_id: &PatientId,
        document: &GraphDocument,
    ) -> Result<TreatmentPlan, PlanError> {
        let (nodes, edges) = Self::payloads(document)?;

        sqlx::query(
            "
            INSERT INTO treatment_plans (patient_id, nodes, edges, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $4)
            ON CONFLICT (patient_id) DO NOTHING
            ",
        )
        .bind(patient_id.get())
        .bind(&nodes)
        .bind(&edges)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to create plan", e))?;

        self.get_by_patient(patient_id)
            .await?
            .ok_or_else(|| missing_after_insert(patient_id))
    }

    async fn delete_by_patient(&self, patient_id: &PatientId) -> Result<bool, PlanError> {
        let result = sqlx::query("DELETE FROM treatment_plans WHERE patient_id = $1")
            .bind(patient_id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to delete plan", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<bool, PlanError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("Health check failed", e))?;
        Ok(true)
    }
}

/// SQLite implementation of the PlanRepository.
///
/// Graph payloads are stored as JSON text.
#[derive(Clone)]
pub struct SqlitePlanRepository {
    pool: SqlitePool,
}

impl SqlitePlanRepository {
    /// Create a new repository over an existing pool
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Get the database connection pool
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn row_to_plan(row: &SqliteRow) -> Result<TreatmentPlan, PlanError> {
        let decode = |e| storage_error("Failed to decode plan row", e);
        let id: i64 = row.try_get("id").map_err(decode)?;
        let nodes_text: String = row.try_get("nodes").map_err(decode)?;
        let edges_text: String = row.try_get("edges").map_err(decode)?;

        let parse = |text: &str| {
            serde_json::from_str::<Value>(text).map_err(|e| {
                PlanError::CorruptRecord(format!("stored plan {} is not JSON: {}", id, e))
            })
        };

        assemble(
            id,
            row.try_get("patient_id").map_err(decode)?,
            &parse(&nodes_text)?,
            &parse(&edges_text)?,
            row.try_get("created_at").map_err(decode)?,
            row.try_get("updated_at").map_err(decode)?,
        )
    }

    fn payloads(document: &GraphDocument) -> Result<(String, String), PlanError> {
        let (nodes, edges) = graph::serialize(document)?;
        Ok((serde_json::to_string(&nodes)?, serde_json::to_string(&edges)?))
    }
}

#[async_trait]
impl PlanRepository for SqlitePlanRepository {
    async fn get_by_patient(
        &self,
        patient_id: &PatientId,
    ) -> Result<Option<TreatmentPlan>, PlanError> {
        let query = format!(
            "SELECT {} FROM treatment_plans WHERE patient_id = ?1",
            SELECT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(patient_id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to load plan", e))?;

        row.as_ref().map(Self::row_to_plan).transpose()
    }

    async fn upsert(
        &self,
        patient_id: &PatientId,
        document: &GraphDocument,
    ) -> Result<TreatmentPlan, PlanError> {
        let (nodes, edges) = Self::payloads(document)?;
        let query = format!(
            "
            INSERT INTO treatment_plans (patient_id, nodes, edges, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT (patient_id) DO UPDATE SET
                nodes = excluded.nodes,
                edges = excluded.edges,
                updated_at = excluded.updated_at
            RETURNING {}
            ",
            SELECT_COLUMNS
        );

        let row = sqlx::query(&query)
            .bind(patient_id.get())
            .bind(&nodes)
            .bind(&edges)
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to save plan", e))?;

        debug!(patient_id = %patient_id, "Plan upserted");
        Self::row_to_plan(&row)
    }

    async fn create_if_absent(
        &self,
        patient_id: &PatientId,
        document: &GraphDocument,
    ) -> Result<TreatmentPlan, PlanError> {
        let (nodes, edges) = Self::payloads(document)?;

        sqlx::query(
            "
            INSERT INTO treatment_plans (patient_id, nodes, edges, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?4)
            ON CONFLICT (patient_id) DO NOTHING
            ",
        )
        .bind(patient_id.get())
        .bind(&nodes)
        .bind(&edges)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| storage_error("Failed to create plan", e))?;

        self.get_by_patient(patient_id)
            .await?
            .ok_or_else(|| missing_after_insert(patient_id))
    }

    async fn delete_by_patient(&self, patient_id: &PatientId) -> Result<bool, PlanError> {
        let result = sqlx::query("DELETE FROM treatment_plans WHERE patient_id = ?1")
            .bind(patient_id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("Failed to delete plan", e))?;

        Ok(result.rows_affected() > 0)
    }

    async fn health_check(&self) -> Result<bool, PlanError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| storage_error("Health check failed", e))?;
        Ok(true)
    }
}
