//! PostgreSQL implementation of ConversationRepository.
//!
//! An exchange is one transaction that starts with `SELECT ... FOR UPDATE`
//! on the conversation row. Concurrent submissions for the same
//! conversation queue on that row lock; the transaction rolls back if the
//! exchange is dropped without a commit.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Postgres, Row, Transaction};

use crate::domain::foundation::{ConversationId, SubjectId, Timestamp, TurnId};
use crate::domain::interview::{Conversation, InterviewStatus, Turn, TurnRole};
use crate::ports::{ConversationExchange, ConversationRepository, RepositoryError};

const SELECT_CONVERSATION: &str = r#"
    SELECT id, subject_id, candidate_name, title, completed, feedback,
           recommended_alternative, created_at, updated_at
    FROM interview_conversations
    WHERE id = $1
"#;

const SELECT_CONVERSATION_FOR_UPDATE: &str = r#"
    SELECT id, subject_id, candidate_name, title, completed, feedback,
           recommended_alternative, created_at, updated_at
    FROM interview_conversations
    WHERE id = $1
    FOR UPDATE
"#;

const INSERT_TURN: &str = r#"
    INSERT INTO interview_turns (id, conversation_id, position, role, content, created_at)
    VALUES ($1, $2, $3, $4, $5, $6)
"#;

#[derive(Clone)]
pub struct PostgresConversationRepository {
    pool: PgPool,
}

impl PostgresConversationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(context: &str) -> impl FnOnce(sqlx::Error) -> RepositoryError + '_ {
    move |e| RepositoryError::Database(format!("{}: {}", context, e))
}

#[async_trait]
impl ConversationRepository for PostgresConversationRepository {
    async fn create(&self, conversation: &Conversation) -> Result<(), RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to start transaction"))?;

        sqlx::query(
            r#"
            INSERT INTO interview_conversations (
                id, subject_id, candidate_name, title, completed, feedback,
                recommended_alternative, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(conversation.id().as_uuid())
        .bind(conversation.subject_id().map(|s| s.as_str()))
        .bind(conversation.candidate_name())
        .bind(conversation.title())
        .bind(conversation.is_completed())
        .bind(conversation.feedback())
        .bind(conversation.recommended_alternative().map(|s| s.as_str()))
        .bind(conversation.created_at().as_datetime())
        .bind(conversation.updated_at().as_datetime())
        .execute(&mut *tx)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => RepositoryError::Conflict(
                format!("conversation {} already exists", conversation.id()),
            ),
            other => RepositoryError::Database(format!("Failed to insert conversation: {}", other)),
        })?;

        for (position, turn) in conversation.turns().iter().enumerate() {
            insert_turn(&mut tx, conversation.id(), position, turn).await?;
        }

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))?;
        Ok(())
    }

    async fn find_by_id(&self, id: ConversationId) -> Result<Option<Conversation>, RepositoryError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(db_error("Failed to acquire connection"))?;
        load(&mut conn, id, SELECT_CONVERSATION).await
    }

    async fn begin_exchange(
        &self,
        id: ConversationId,
    ) -> Result<Box<dyn ConversationExchange>, RepositoryError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(db_error("Failed to start transaction"))?;

        let staged = load(&mut tx, id, SELECT_CONVERSATION_FOR_UPDATE)
            .await?
            .ok_or(RepositoryError::NotFound(id))?;

        Ok(Box::new(PostgresExchange { tx, staged }))
    }
}

struct PostgresExchange {
    tx: Transaction<'static, Postgres>,
    staged: Conversation,
}

#[async_trait]
impl ConversationExchange for PostgresExchange {
    fn conversation(&self) -> &Conversation {
        &self.staged
    }

    async fn append_turn(&mut self, turn: &Turn) -> Result<(), RepositoryError> {
        let position = self.staged.turns().len();
        self.staged
            .apply_turn(turn.clone())
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;
        insert_turn(&mut self.tx, self.staged.id(), position, turn).await
    }

    async fn mark_completed(
        &mut self,
        feedback: &str,
        recommended_alternative: Option<&SubjectId>,
    ) -> Result<(), RepositoryError> {
        self.staged
            .complete(feedback, recommended_alternative.cloned())
            .map_err(|e| RepositoryError::Conflict(e.to_string()))?;

        let result = sqlx::query(
            r#"
            UPDATE interview_conversations SET
                completed = TRUE,
                feedback = $2,
                recommended_alternative = $3,
                updated_at = $4
            WHERE id = $1 AND completed = FALSE
            "#,
        )
        .bind(self.staged.id().as_uuid())
        .bind(feedback)
        .bind(recommended_alternative.map(|s| s.as_str()))
        .bind(self.staged.updated_at().as_datetime())
        .execute(&mut *self.tx)
        .await
        .map_err(db_error("Failed to complete conversation"))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::Conflict(format!(
                "conversation {} was already completed",
                self.staged.id()
            )));
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), RepositoryError> {
        let PostgresExchange { mut tx, staged } = *self;

        sqlx::query("UPDATE interview_conversations SET updated_at = $2 WHERE id = $1")
            .bind(staged.id().as_uuid())
            .bind(staged.updated_at().as_datetime())
            .execute(&mut *tx)
            .await
            .map_err(db_error("Failed to touch conversation"))?;

        tx.commit()
            .await
            .map_err(db_error("Failed to commit transaction"))
    }
}

async fn insert_turn(
    conn: &mut PgConnection,
    conversation_id: ConversationId,
    position: usize,
    turn: &Turn,
) -> Result<(), RepositoryError> {
    let position = i32::try_from(position)
        .map_err(|_| RepositoryError::Database("turn position overflow".to_string()))?;

    sqlx::query(INSERT_TURN)
        .bind(turn.id().as_uuid())
        .bind(conversation_id.as_uuid())
        .bind(position)
        .bind(turn.role().as_str())
        .bind(turn.content())
        .bind(turn.created_at().as_datetime())
        .execute(conn)
        .await
        .map_err(db_error("Failed to insert turn"))?;
    Ok(())
}

async fn load(
    conn: &mut PgConnection,
    id: ConversationId,
    select: &str,
) -> Result<Option<Conversation>, RepositoryError> {
    let row = sqlx::query(select)
        .bind(id.as_uuid())
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_error("Failed to fetch conversation"))?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    let turn_rows = sqlx::query(
        r#"
        SELECT id, role, content, created_at
        FROM interview_turns
        WHERE conversation_id = $1
        ORDER BY position ASC
        "#,
    )
    .bind(id.as_uuid())
    .fetch_all(&mut *conn)
    .await
    .map_err(db_error("Failed to fetch turns"))?;

    let turns = turn_rows
        .iter()
        .map(row_to_turn)
        .collect::<Result<Vec<_>, _>>()?;

    row_to_conversation(&row, turns).map(Some)
}

fn column<'r, T>(row: &'r PgRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| RepositoryError::Database(format!("Failed to read column {}: {}", name, e)))
}

fn subject_id(raw: Option<String>) -> Result<Option<SubjectId>, RepositoryError> {
    raw.map(SubjectId::new)
        .transpose()
        .map_err(|e| RepositoryError::Database(format!("Invalid stored subject id: {}", e)))
}

fn row_to_turn(row: &PgRow) -> Result<Turn, RepositoryError> {
    let id: uuid::Uuid = column(row, "id")?;
    let role: String = column(row, "role")?;
    let content: String = column(row, "content")?;
    let created_at: chrono::DateTime<chrono::Utc> = column(row, "created_at")?;

    let role: TurnRole = role
        .parse()
        .map_err(|e| RepositoryError::Database(format!("Invalid stored role: {}", e)))?;

    Ok(Turn::reconstitute(
        TurnId::from_uuid(id),
        role,
        content,
        Timestamp::from_datetime(created_at),
    ))
}

fn row_to_conversation(row: &PgRow, turns: Vec<Turn>) -> Result<Conversation, RepositoryError> {
    let id: uuid::Uuid = column(row, "id")?;
    let completed: bool = column(row, "completed")?;
    let created_at: chrono::DateTime<chrono::Utc> = column(row, "created_at")?;
    let updated_at: chrono::DateTime<chrono::Utc> = column(row, "updated_at")?;

    let status = if completed {
        InterviewStatus::Completed
    } else {
        InterviewStatus::Open
    };

    Ok(Conversation::reconstitute(
        ConversationId::from_uuid(id),
        subject_id(column(row, "subject_id")?)?,
        column(row, "candidate_name")?,
        column(row, "title")?,
        status,
        column(row, "feedback")?,
        subject_id(column(row, "recommended_alternative")?)?,
        turns,
        Timestamp::from_datetime(created_at),
        Timestamp::from_datetime(updated_at),
    ))
}
