//! Common test utilities and fixtures.

use std::sync::Arc;

use kc_cache::{InMemoryCache, ReplicatedCache};
use kc_cache_redis::{RedisCache, RedisConfig};
use kc_core::event::{Event, EventType};
use kc_core::logging::init_tracing;
use kc_session::{
    DirectoryClient, DirectoryUser, InMemoryDirectory, NewUserSession, SessionConfig,
    SessionEntity, SessionEventListener, SessionProvider,
};
use parking_lot::Mutex;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::redis::Redis;
use uuid::Uuid;

/// Records the type of every published event.
#[derive(Default)]
pub struct RecordingListener {
    events: Mutex<Vec<EventType>>,
}

impl RecordingListener {
    /// Event types seen so far.
    pub fn events(&self) -> Vec<EventType> {
        self.events.lock().clone()
    }
}

impl SessionEventListener for RecordingListener {
    fn on_event(&self, event: &Event) {
        self.events.lock().push(event.event_type);
    }
}

/// Test environment: a provider over a cache, with one realm, one user and
/// one client registered in the directory.
pub struct TestEnv {
    /// Session provider under test.
    pub provider: SessionProvider,
    /// Directory backing the provider.
    pub directory: Arc<InMemoryDirectory>,
    /// Listener registered on the provider.
    pub listener: Arc<RecordingListener>,
    /// Realm everything is created in.
    pub realm_id: Uuid,
    /// Registered user.
    pub user: DirectoryUser,
    /// Registered client.
    pub client: DirectoryClient,
    /// Redis container, kept alive for the test's duration.
    _redis: Option<ContainerAsync<Redis>>,
}

impl TestEnv {
    /// Creates an environment over an in-memory cache.
    pub fn in_memory() -> anyhow::Result<Self> {
        Self::with_cache(
            Arc::new(InMemoryCache::<SessionEntity>::new()),
            SessionConfig::default(),
            None,
        )
    }

    /// Creates an in-memory environment with a custom configuration.
    pub fn in_memory_with_config(config: SessionConfig) -> anyhow::Result<Self> {
        Self::with_cache(Arc::new(InMemoryCache::<SessionEntity>::new()), config, None)
    }

    /// Creates an environment over an ephemeral Redis container.
    pub async fn redis() -> anyhow::Result<Self> {
        let redis = Redis::default().start().await?;
        let port = redis.get_host_port_ipv4(6379).await?;

        let config = RedisConfig::from_env()
            .with_server("127.0.0.1", port)
            .with_key_prefix(format!("kc:test:{}", Uuid::now_v7()));
        let cache = RedisCache::<SessionEntity>::connect(config).await?;

        Self::with_cache(Arc::new(cache), SessionConfig::default(), Some(redis))
    }

    fn with_cache(
        cache: Arc<dyn ReplicatedCache<SessionEntity>>,
        config: SessionConfig,
        redis: Option<ContainerAsync<Redis>>,
    ) -> anyhow::Result<Self> {
        init_tracing("kc_session=debug,kc_cache_redis=debug,warn");

        let directory = Arc::new(InMemoryDirectory::new());
        let realm_id = Uuid::now_v7();
        let user = directory.add_user(realm_id, "alice");
        let client = directory.add_client(realm_id, "account-console", "openid-connect");

        let provider = SessionProvider::new(cache, directory.clone(), config)?;
        let listener = Arc::new(RecordingListener::default());
        provider.register_listener(listener.clone());

        tracing::debug!(realm_id = %realm_id, "test environment ready");

        Ok(Self {
            provider,
            directory,
            listener,
            realm_id,
            user,
            client,
            _redis: redis,
        })
    }

    /// Parameters for a user session of the registered user.
    pub fn new_user_session(&self) -> NewUserSession {
        NewUserSession::new(self.realm_id, self.user.id, self.user.username.clone())
    }

    /// Registers another client in the realm.
    pub fn add_client(&self, client_id: &str) -> DirectoryClient {
        self.directory
            .add_client(self.realm_id, client_id, "openid-connect")
    }

    /// Creates and commits a user session.
    pub async fn create_user_session(&self) -> anyhow::Result<Uuid> {
        let mut tx = self.provider.begin();
        let id = tx.create_user_session(self.new_user_session()).await?.id();
        tx.commit().await?;
        Ok(id)
    }

    /// Creates and commits an unattached client session for `client_id`.
    pub async fn create_client_session(&self, client_id: Uuid) -> anyhow::Result<Uuid> {
        let mut tx = self.provider.begin();
        let id = tx
            .create_client_session(self.realm_id, client_id)
            .await?
            .id();
        tx.commit().await?;
        Ok(id)
    }

    /// Attaches (or with `None` detaches) a client session and commits.
    pub async fn set_user_session(
        &self,
        client_session: Uuid,
        user_session: Option<Uuid>,
    ) -> anyhow::Result<()> {
        let mut tx = self.provider.begin();
        let mut client = tx
            .client_session(self.realm_id, client_session)
            .await?
            .ok_or_else(|| anyhow::anyhow!("client session {client_session} not found"))?;
        client.set_user_session(user_session).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Committed client session ids of a user session, or `None` if absent.
    pub async fn client_sessions_of(&self, user_session: Uuid) -> anyhow::Result<Option<Vec<Uuid>>> {
        let mut tx = self.provider.begin();
        Ok(tx
            .user_session(self.realm_id, user_session)
            .await?
            .map(|s| s.client_session_ids()))
    }

    /// Committed user session of a client session. Outer `None` if absent.
    pub async fn user_session_of(&self, client_session: Uuid) -> anyhow::Result<Option<Option<Uuid>>> {
        let mut tx = self.provider.begin();
        Ok(tx
            .client_session(self.realm_id, client_session)
            .await?
            .map(|s| s.user_session_id()))
    }
}
