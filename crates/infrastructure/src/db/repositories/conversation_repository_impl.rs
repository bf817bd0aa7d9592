//! 会话参与者Repository实现

use std::sync::Arc;

use async_trait::async_trait;
use domain::entities::ConversationParticipants;
use domain::errors::DomainResult;
use domain::repositories::ConversationRepository;
use sqlx::{query_as, FromRow};
use uuid::Uuid;

use crate::db::{map_sqlx_err, DbPool};

/// 参与者查询结果
///
/// 双方的用户ID都在档案表里，一次连接查询同时取出。
#[derive(Debug, FromRow)]
struct ParticipantsRecord {
    application_id: Uuid,
    employer_user_id: Uuid,
    candidate_user_id: Uuid,
}

impl From<ParticipantsRecord> for ConversationParticipants {
    fn from(record: ParticipantsRecord) -> Self {
        ConversationParticipants {
            application_id: record.application_id,
            employer_user_id: record.employer_user_id,
            candidate_user_id: record.candidate_user_id,
        }
    }
}

/// 会话参与者Repository实现
pub struct PgConversationRepository {
    pool: Arc<DbPool>,
}

impl PgConversationRepository {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ConversationRepository for PgConversationRepository {
    async fn get_participants(
        &self,
        application_id: Uuid,
    ) -> DomainResult<Option<ConversationParticipants>> {
        let record = query_as::<_, ParticipantsRecord>(
            r#"
            SELECT a.id AS application_id,
                   ep.user_id AS employer_user_id,
                   cp.user_id AS candidate_user_id
            FROM applications a
            JOIN jobs j ON a.job_id = j.id
            JOIN employer_profiles ep ON j.employer_id = ep.id
            JOIN candidate_profiles cp ON a.candidate_id = cp.id
            WHERE a.id = $1
            "#,
        )
        .bind(application_id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(map_sqlx_err)?;

        Ok(record.map(ConversationParticipants::from))
    }
}
