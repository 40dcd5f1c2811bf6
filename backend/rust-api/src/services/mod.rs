use std::sync::Arc;

use crate::config::Config;
use mongodb::{Client as MongoClient, Database};
use redis::aio::ConnectionManager;

use self::otp_ledger::{MemoryOtpStore, OtpStore};

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub redis: ConnectionManager,
    /// In-memory by default; injectable so a shared cache can back the
    /// ledger when the service is scaled beyond one instance.
    pub otp: Arc<dyn OtpStore>,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let otp: Arc<dyn OtpStore> = Arc::new(MemoryOtpStore::new());
        Self::with_otp_store(config, mongo_client, redis_client, otp).await
    }

    pub async fn with_otp_store(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
        otp: Arc<dyn OtpStore>,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        // Create ConnectionManager with longer timeout
        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        tracing::info!("Redis ConnectionManager created, testing with PING...");

        // Test connection
        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        Ok(Self {
            config,
            mongo,
            redis,
            otp,
        })
    }
}

pub mod auth_service;
pub mod catalog_service;
pub mod email_service;
pub mod otp_ledger;
pub mod user_service;
