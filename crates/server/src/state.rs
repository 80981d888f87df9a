use std::sync::Arc;

use db::DBService;
use sqlx::SqlitePool;

use crate::identity::IdentityProvider;

#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    db: DBService,
    identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    pub fn new(db: DBService, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { db, identity }),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.inner.db.pool
    }

    pub fn identity(&self) -> &dyn IdentityProvider {
        self.inner.identity.as_ref()
    }
}
