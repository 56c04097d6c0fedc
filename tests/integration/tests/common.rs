//! Assertions shared by the scenario modules.

use kc_integration_tests::TestEnv;
use uuid::Uuid;

/// Asserts both sides agree that `client_session` is attached to `user_session`.
pub async fn assert_attached(env: &TestEnv, user_session: Uuid, client_session: Uuid) -> anyhow::Result<()> {
    let ids = env
        .client_sessions_of(user_session)
        .await?
        .expect("user session exists");
    assert!(
        ids.contains(&client_session),
        "user session {user_session} should list {client_session}"
    );
    assert_eq!(
        env.user_session_of(client_session).await?,
        Some(Some(user_session)),
        "client session should reference its user session"
    );
    Ok(())
}

/// Asserts `client_session` is attached to nothing and listed nowhere in `user_sessions`.
pub async fn assert_detached(env: &TestEnv, user_sessions: &[Uuid], client_session: Uuid) -> anyhow::Result<()> {
    assert_eq!(env.user_session_of(client_session).await?, Some(None));
    for user_session in user_sessions {
        if let Some(ids) = env.client_sessions_of(*user_session).await? {
            assert!(!ids.contains(&client_session));
        }
    }
    Ok(())
}
