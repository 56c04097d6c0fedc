//! Shared unit-test fixture.

use std::sync::Arc;

use kc_cache::InMemoryCache;
use uuid::Uuid;

use crate::config::SessionConfig;
use crate::directory::{DirectoryClient, DirectoryUser, InMemoryDirectory};
use crate::entity::SessionEntity;
use crate::provider::SessionProvider;
use crate::transaction::NewUserSession;

pub(crate) struct Fixture {
    pub(crate) provider: SessionProvider,
    pub(crate) cache: Arc<InMemoryCache<SessionEntity>>,
    pub(crate) directory: Arc<InMemoryDirectory>,
    pub(crate) realm_id: Uuid,
    pub(crate) user: DirectoryUser,
    pub(crate) client: DirectoryClient,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub(crate) fn with_config(config: SessionConfig) -> Self {
        let cache = Arc::new(InMemoryCache::new());
        let directory = Arc::new(InMemoryDirectory::new());
        let realm_id = Uuid::now_v7();
        let user = directory.add_user(realm_id, "alice");
        let client = directory.add_client(realm_id, "account-console", "openid-connect");
        let provider = SessionProvider::new(cache.clone(), directory.clone(), config)
            .expect("valid test config");

        Self {
            provider,
            cache,
            directory,
            realm_id,
            user,
            client,
        }
    }

    pub(crate) fn new_user_session(&self) -> NewUserSession {
        NewUserSession::new(self.realm_id, self.user.id, self.user.username.clone())
    }

    /// Creates and commits a user session, returning its id.
    pub(crate) async fn committed_user_session(&self) -> Uuid {
        let mut tx = self.provider.begin();
        let id = tx
            .create_user_session(self.new_user_session())
            .await
            .expect("user exists")
            .id();
        tx.commit().await.expect("commit");
        id
    }
}
