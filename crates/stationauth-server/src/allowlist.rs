//! Per-station driver allowlists: the data behind the ACL service.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use stationauth_worker::{AccessControlStore, AclError};
use uuid::Uuid;

use crate::error::AllowlistError;

/// Set of authorized driver tokens per station.
#[async_trait]
pub trait AllowlistStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn contains(&self, station_id: Uuid, driver_token: &str) -> Result<bool, AllowlistError>;

    /// Returns the number of tokens newly added (0 or 1).
    async fn add(&self, station_id: Uuid, driver_token: &str) -> Result<u64, AllowlistError>;

    /// Returns the number of tokens removed (0 or 1).
    async fn remove(&self, station_id: Uuid, driver_token: &str) -> Result<u64, AllowlistError>;
}

#[derive(Debug, Default)]
pub struct InMemoryAllowlist {
    stations: DashMap<Uuid, HashSet<String>>,
}

impl InMemoryAllowlist {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AllowlistStore for InMemoryAllowlist {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn contains(&self, station_id: Uuid, driver_token: &str) -> Result<bool, AllowlistError> {
        Ok(self
            .stations
            .get(&station_id)
            .is_some_and(|tokens| tokens.contains(driver_token)))
    }

    async fn add(&self, station_id: Uuid, driver_token: &str) -> Result<u64, AllowlistError> {
        let added = self
            .stations
            .entry(station_id)
            .or_default()
            .insert(driver_token.to_string());
        Ok(u64::from(added))
    }

    async fn remove(&self, station_id: Uuid, driver_token: &str) -> Result<u64, AllowlistError> {
        let removed = self
            .stations
            .get_mut(&station_id)
            .is_some_and(|mut tokens| tokens.remove(driver_token));
        // Drop empty sets, as Redis does
        self.stations.remove_if(&station_id, |_, tokens| tokens.is_empty());
        Ok(u64::from(removed))
    }
}

/// Allowlist kept in one Redis set per station.
#[derive(Clone)]
pub struct RedisAllowlist {
    pool: Pool,
}

impl RedisAllowlist {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn key(station_id: Uuid) -> String {
        format!("station:{station_id}:allowlist")
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, AllowlistError> {
        self.pool
            .get()
            .await
            .map_err(|e| AllowlistError::Connection(e.to_string()))
    }
}

#[async_trait]
impl AllowlistStore for RedisAllowlist {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn contains(&self, station_id: Uuid, driver_token: &str) -> Result<bool, AllowlistError> {
        let mut conn = self.conn().await?;
        conn.sismember(Self::key(station_id), driver_token)
            .await
            .map_err(|e| AllowlistError::Command(e.to_string()))
    }

    async fn add(&self, station_id: Uuid, driver_token: &str) -> Result<u64, AllowlistError> {
        let mut conn = self.conn().await?;
        conn.sadd(Self::key(station_id), driver_token)
            .await
            .map_err(|e| AllowlistError::Command(e.to_string()))
    }

    async fn remove(&self, station_id: Uuid, driver_token: &str) -> Result<u64, AllowlistError> {
        let mut conn = self.conn().await?;
        conn.srem(Self::key(station_id), driver_token)
            .await
            .map_err(|e| AllowlistError::Command(e.to_string()))
    }
}

/// Lets an in-process worker query the allowlist without the HTTP hop.
pub struct AllowlistAccessControl {
    store: Arc<dyn AllowlistStore>,
}

impl AllowlistAccessControl {
    pub fn new(store: Arc<dyn AllowlistStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AccessControlStore for AllowlistAccessControl {
    async fn is_authorized(
        &self,
        station_id: Uuid,
        driver_token: &str,
        timeout: Duration,
    ) -> Result<bool, AclError> {
        match tokio::time::timeout(timeout, self.store.contains(station_id, driver_token)).await {
            Ok(Ok(member)) => Ok(member),
            Ok(Err(e)) => Err(AclError::Store(e.to_string())),
            Err(_) => Err(AclError::Timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "valid_driver_token_12345";

    #[tokio::test]
    async fn test_add_contains_remove() {
        let store = InMemoryAllowlist::new();
        let station = Uuid::new_v4();

        assert!(!store.contains(station, TOKEN).await.unwrap());
        assert_eq!(store.add(station, TOKEN).await.unwrap(), 1);
        assert_eq!(store.add(station, TOKEN).await.unwrap(), 0);
        assert!(store.contains(station, TOKEN).await.unwrap());

        // Other stations are unaffected
        assert!(!store.contains(Uuid::new_v4(), TOKEN).await.unwrap());

        assert_eq!(store.remove(station, TOKEN).await.unwrap(), 1);
        assert_eq!(store.remove(station, TOKEN).await.unwrap(), 0);
        assert!(!store.contains(station, TOKEN).await.unwrap());
    }

    #[tokio::test]
    async fn test_access_control_adapter() {
        let store = Arc::new(InMemoryAllowlist::new());
        let station = Uuid::new_v4();
        store.add(station, TOKEN).await.unwrap();

        let acl = AllowlistAccessControl::new(store);
        let timeout = Duration::from_secs(1);
        assert!(acl.is_authorized(station, TOKEN, timeout).await.unwrap());
        assert!(!acl.is_authorized(station, "someone_else_entirely", timeout).await.unwrap());
    }

    #[test]
    fn test_redis_key_layout() {
        let station = Uuid::parse_str("6f1c2b9e-4a5d-4e7f-9a0b-1c2d3e4f5a6b").unwrap();
        assert_eq!(
            RedisAllowlist::key(station),
            "station:6f1c2b9e-4a5d-4e7f-9a0b-1c2d3e4f5a6b:allowlist"
        );
    }
}
