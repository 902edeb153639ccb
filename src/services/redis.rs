//! Redis service for session revocation

use redis::{AsyncCommands, Client};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct RedisService {
    client: Client,
}

impl RedisService {
    /// Create a new Redis service
    pub async fn new(url: &str) -> AppResult<Self> {
        let client = Client::open(url)
            .map_err(|e| AppError::Internal(format!("Failed to create Redis client: {}", e)))?;

        // Test connection
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to connect to Redis: {}", e)))?;

        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis connection test failed: {}", e)))?;

        Ok(Self { client })
    }

    /// Mark a token id as signed out until the token would have expired
    pub async fn revoke_token(&self, token_id: Uuid, ttl_seconds: u64) -> AppResult<()> {
        let mut conn = self.get_connection().await?;

        conn.set_ex::<_, _, ()>(revoked_key(token_id), "1", ttl_seconds.max(1))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to store revoked token in Redis: {}", e)))?;

        Ok(())
    }

    /// Whether a token id has been signed out
    pub async fn is_token_revoked(&self, token_id: Uuid) -> AppResult<bool> {
        let mut conn = self.get_connection().await?;

        let exists: bool = conn
            .exists(revoked_key(token_id))
            .await
            .map_err(|e| AppError::Internal(format!("Failed to check revoked token in Redis: {}", e)))?;

        Ok(exists)
    }

    /// Round-trip used by the readiness endpoint
    pub async fn ping(&self) -> AppResult<()> {
        let mut conn = self.get_connection().await?;
        redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
            .map_err(|e| AppError::Internal(format!("Redis ping failed: {}", e)))?;
        Ok(())
    }

    async fn get_connection(&self) -> AppResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to get Redis connection: {}", e)))
    }
}

fn revoked_key(token_id: Uuid) -> String {
    format!("revoked:{}", token_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_revoked_key() {
        let id = Uuid::nil();
        assert_eq!(revoked_key(id), "revoked:00000000-0000-0000-0000-000000000000");
    }
}
