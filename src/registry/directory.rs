//! Buyer directory
//!
//! Purchases and retirements must name a known, active buyer. Account
//! management lives outside the registry, so the lookup is a trait.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::core_types::UserId;
use crate::db::Database;

use super::error::RegistryError;

#[async_trait]
pub trait BuyerDirectory: Send + Sync {
    /// `true` if `buyer_id` may hold credits
    async fn is_active_buyer(&self, buyer_id: UserId) -> Result<bool, RegistryError>;
}

/// Accepts every non-zero id (single-node development)
#[derive(Debug, Default, Clone, Copy)]
pub struct OpenDirectory;

#[async_trait]
impl BuyerDirectory for OpenDirectory {
    async fn is_active_buyer(&self, buyer_id: UserId) -> Result<bool, RegistryError> {
        Ok(buyer_id != 0)
    }
}

/// Fixed allow-list
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    buyers: HashSet<UserId>,
}

impl StaticDirectory {
    pub fn new(buyers: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            buyers: buyers.into_iter().collect(),
        }
    }
}

#[async_trait]
impl BuyerDirectory for StaticDirectory {
    async fn is_active_buyer(&self, buyer_id: UserId) -> Result<bool, RegistryError> {
        Ok(self.buyers.contains(&buyer_id))
    }
}

/// Active users from the shared `users` table (status = 1)
#[derive(Clone)]
pub struct PgBuyerDirectory {
    db: Database,
}

impl PgBuyerDirectory {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl BuyerDirectory for PgBuyerDirectory {
    async fn is_active_buyer(&self, buyer_id: UserId) -> Result<bool, RegistryError> {
        let Ok(id) = i64::try_from(buyer_id) else {
            return Ok(false);
        };
        let active: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM users WHERE user_id = $1 AND status = 1)"#,
        )
        .bind(id)
        .fetch_one(self.db.pool())
        .await?;
        Ok(active)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_directory_rejects_zero() {
        assert!(!OpenDirectory.is_active_buyer(0).await.unwrap());
        assert!(OpenDirectory.is_active_buyer(1).await.unwrap());
    }

    #[tokio::test]
    async fn test_static_directory() {
        let dir = StaticDirectory::new([10, 11]);
        assert!(dir.is_active_buyer(10).await.unwrap());
        assert!(!dir.is_active_buyer(12).await.unwrap());
    }
}
