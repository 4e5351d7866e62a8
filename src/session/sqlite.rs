use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::cat::{encode_state, decode_state};
use crate::session::store::{
    AnswerRecord, AttemptRecord, AttemptStatus, FinishReason, StoreError,
};

pub const SQLITE_SCHEMA_SQL: &str = include_str!("../../sql/sqlite_schema.sql");

#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let in_memory = url.contains(":memory:");
        let mut options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(30));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to an in-memory database sees its own database.
        let max_connections = if in_memory { 1 } else { 5 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        for statement in split_sql_statements(SQLITE_SCHEMA_SQL) {
            let sql = strip_comment_lines(&statement);
            if sql.is_empty() {
                continue;
            }
            sqlx::query(&sql).execute(&self.pool).await?;
        }
        tracing::debug!("sqlite assessment schema ready");
        Ok(())
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    pub async fn insert_attempt(&self, attempt: &AttemptRecord) -> Result<(), StoreError> {
        let state = serde_json::to_string(&encode_state(&attempt.state)?)?;
        let result = sqlx::query(
            r#"
            INSERT INTO "assessment_attempts"
              ("id","learnerId","conceptId","status","finishReason","pendingItemId","version","state","createdAt","updatedAt")
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)
            "#,
        )
        .bind(&attempt.id)
        .bind(&attempt.learner_id)
        .bind(&attempt.concept_id)
        .bind(attempt.status.as_str())
        .bind(attempt.finish_reason.map(|r| r.as_str()))
        .bind(attempt.pending_item_id.as_deref())
        .bind(attempt.version)
        .bind(&state)
        .bind(attempt.created_at.to_rfc3339())
        .bind(attempt.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(err) if is_unique_violation(&err) => {
                Err(StoreError::DuplicateAttempt(attempt.id.clone()))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub async fn load_attempt(&self, attempt_id: &str) -> Result<Option<AttemptRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT "id","learnerId","conceptId","status","finishReason","pendingItemId","version","state","createdAt","updatedAt"
            FROM "assessment_attempts" WHERE "id" = $1
            "#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_attempt(&r)).transpose()
    }

    pub async fn find_answer(
        &self,
        attempt_id: &str,
        item_id: &str,
    ) -> Result<Option<AnswerRecord>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT "attemptId","itemId","conceptId","selectedIndex","isCorrect","misconceptionTag","answeredAt"
            FROM "assessment_answers" WHERE "attemptId" = $1 AND "itemId" = $2
            "#,
        )
        .bind(attempt_id)
        .bind(item_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| row_to_answer(&r)).transpose()
    }

    pub async fn commit_answer(
        &self,
        answer: &AnswerRecord,
        attempt: &AttemptRecord,
        expected_version: i64,
    ) -> Result<(), StoreError> {
        let state = serde_json::to_string(&encode_state(&attempt.state)?)?;
        let mut tx = self.pool.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO "assessment_answers"
              ("attemptId","itemId","conceptId","selectedIndex","isCorrect","misconceptionTag","answeredAt")
            VALUES ($1,$2,$3,$4,$5,$6,$7)
            "#,
        )
        .bind(&answer.attempt_id)
        .bind(&answer.item_id)
        .bind(&answer.concept_id)
        .bind(answer.selected_index as i64)
        .bind(answer.is_correct)
        .bind(&answer.misconception_tag)
        .bind(answer.answered_at.to_rfc3339())
        .execute(&mut *tx)
        .await;

        if let Err(err) = inserted {
            tx.rollback().await?;
            if is_unique_violation(&err) {
                return Err(StoreError::DuplicateAnswer {
                    attempt_id: answer.attempt_id.clone(),
                    item_id: answer.item_id.clone(),
                });
            }
            return Err(err.into());
        }

        let updated = sqlx::query(
            r#"
            UPDATE "assessment_attempts"
            SET "status" = $1, "finishReason" = $2, "pendingItemId" = $3, "version" = $4,
                "state" = $5, "updatedAt" = $6
            WHERE "id" = $7 AND "version" = $8
            "#,
        )
        .bind(attempt.status.as_str())
        .bind(attempt.finish_reason.map(|r| r.as_str()))
        .bind(attempt.pending_item_id.as_deref())
        .bind(attempt.version)
        .bind(&state)
        .bind(attempt.updated_at.to_rfc3339())
        .bind(&attempt.id)
        .bind(expected_version)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(StoreError::StaleWrite {
                attempt_id: attempt.id.clone(),
                expected_version,
            });
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn usage_counts(&self, concept_id: &str) -> Result<HashMap<String, u32>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT "itemId", COUNT(*) AS "uses"
            FROM "assessment_answers" WHERE "conceptId" = $1
            GROUP BY "itemId"
            "#,
        )
        .bind(concept_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = HashMap::with_capacity(rows.len());
        for row in rows {
            let item_id: String = row.try_get("itemId")?;
            let uses: i64 = row.try_get("uses")?;
            counts.insert(item_id, u32::try_from(uses).unwrap_or(u32::MAX));
        }
        Ok(counts)
    }

    pub async fn answers(&self, attempt_id: &str) -> Result<Vec<AnswerRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT "attemptId","itemId","conceptId","selectedIndex","isCorrect","misconceptionTag","answeredAt"
            FROM "assessment_answers" WHERE "attemptId" = $1
            ORDER BY "seq" ASC
            "#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_answer).collect()
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| StoreError::Corrupt(format!("timestamp {value}: {err}")))
}

fn row_to_attempt(row: &SqliteRow) -> Result<AttemptRecord, StoreError> {
    let status: String = row.try_get("status")?;
    let finish_reason: Option<String> = row.try_get("finishReason")?;
    let state: String = row.try_get("state")?;
    let created_at: String = row.try_get("createdAt")?;
    let updated_at: String = row.try_get("updatedAt")?;

    Ok(AttemptRecord {
        id: row.try_get("id")?,
        learner_id: row.try_get("learnerId")?,
        concept_id: row.try_get("conceptId")?,
        status: AttemptStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("attempt status {status}")))?,
        finish_reason: match finish_reason {
            Some(value) => Some(
                FinishReason::parse(&value)
                    .ok_or_else(|| StoreError::Corrupt(format!("finish reason {value}")))?,
            ),
            None => None,
        },
        pending_item_id: row.try_get("pendingItemId")?,
        version: row.try_get("version")?,
        state: decode_state(serde_json::from_str(&state)?)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_answer(row: &SqliteRow) -> Result<AnswerRecord, StoreError> {
    let selected_index: i64 = row.try_get("selectedIndex")?;
    let answered_at: String = row.try_get("answeredAt")?;

    Ok(AnswerRecord {
        attempt_id: row.try_get("attemptId")?,
        item_id: row.try_get("itemId")?,
        concept_id: row.try_get("conceptId")?,
        selected_index: usize::try_from(selected_index)
            .map_err(|_| StoreError::Corrupt(format!("selected index {selected_index}")))?,
        is_correct: row.try_get("isCorrect")?,
        misconception_tag: row.try_get("misconceptionTag")?,
        answered_at: parse_timestamp(&answered_at)?,
    })
}

pub fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut in_single_quote = false;
    let mut in_double_quote = false;

    for ch in sql.chars() {
        match ch {
            '\'' if !in_double_quote => in_single_quote = !in_single_quote,
            '"' if !in_single_quote => in_double_quote = !in_double_quote,
            ';' if !in_single_quote && !in_double_quote => {
                let stmt = current.trim();
                if !stmt.is_empty() {
                    statements.push(stmt.to_string());
                }
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(ch);
    }

    let tail = current.trim();
    if !tail.is_empty() {
        statements.push(tail.to_string());
    }

    statements
}

fn strip_comment_lines(statement: &str) -> String {
    statement
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
