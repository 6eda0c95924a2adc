use std::sync::Arc;

use anyhow::Context;
use axum::extract::FromRef;
use tracing::info;

use crate::auth::jwt::JwtKeys;
use crate::auth::password::Hasher;
use crate::auth::repo::{PgUserStore, UserStore};
use crate::auth::services::AuthService;
use crate::config::AppConfig;
use crate::db;
use crate::reliefs::repo::{PgReliefStore, ReliefStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub auth: AuthService,
    pub reliefs: Arc<dyn ReliefStore>,
}

impl AppState {
    /// Loads configuration, connects to the database and runs migrations.
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let pool = db::connect(&config).await?;
        db::migrate(&pool).await?;

        let users = Arc::new(PgUserStore::new(pool.clone())) as Arc<dyn UserStore>;
        let reliefs = Arc::new(PgReliefStore::new(pool)) as Arc<dyn ReliefStore>;
        Self::from_parts(config, users, reliefs)
    }

    pub fn from_parts(
        config: Arc<AppConfig>,
        users: Arc<dyn UserStore>,
        reliefs: Arc<dyn ReliefStore>,
    ) -> anyhow::Result<Self> {
        let hasher = Hasher::new(config.hash).context("password hasher")?;
        let keys = JwtKeys::new(&config.jwt);
        info!(ttl_secs = keys.ttl().as_secs(), issuer = %config.jwt.issuer, "token issuer ready");
        Ok(Self {
            auth: AuthService::new(users, hasher, keys),
            config,
            reliefs,
        })
    }
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        state.auth.keys().clone()
    }
}
