use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;

use crate::auth::oauth::{GoogleOAuth, OAuthProvider};
use crate::auth::repo::{AccountStore, PgStore};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn AccountStore>,
    pub oauth: Arc<dyn OAuthProvider>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await
            .context("connect to database")?;

        let store = Arc::new(PgStore::new(db.clone())) as Arc<dyn AccountStore>;
        let oauth = Arc::new(GoogleOAuth::new(config.google.clone())?) as Arc<dyn OAuthProvider>;

        Ok(Self {
            db,
            config,
            store,
            oauth,
        })
    }
}
