use std::{sync::Arc, time::Duration};

use crate::{
    config::Config,
    database::{init_redis, RedisStore},
    store::Store,
};

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
}

impl AppState {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let manager = init_redis(&config.redis_url).await;
        let store = Arc::new(RedisStore::new(
            manager,
            Duration::from_millis(config.store_timeout_ms),
        ));

        Arc::new(Self { config, store })
    }
}
