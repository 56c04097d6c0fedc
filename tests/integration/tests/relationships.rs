//! The client session / user session relationship.

use kc_integration_tests::TestEnv;
use kc_session::SessionError;

use crate::common::{assert_attached, assert_detached};

#[tokio::test]
async fn test_attach_and_detach_keep_both_sides_in_step() -> anyhow::Result<()> {
    let env = TestEnv::in_memory()?;
    let user_session = env.create_user_session().await?;
    let client_session = env.create_client_session(env.client.id).await?;

    env.set_user_session(client_session, Some(user_session)).await?;
    assert_attached(&env, user_session, client_session).await?;

    env.set_user_session(client_session, None).await?;
    assert_detached(&env, &[user_session], client_session).await?;
    Ok(())
}

#[tokio::test]
async fn test_reattach_moves_between_user_sessions() -> anyhow::Result<()> {
    let env = TestEnv::in_memory()?;
    let first = env.create_user_session().await?;
    let second = env.create_user_session().await?;
    let client_session = env.create_client_session(env.client.id).await?;

    env.set_user_session(client_session, Some(first)).await?;
    env.set_user_session(client_session, Some(second)).await?;

    assert_attached(&env, second, client_session).await?;
    assert_eq!(env.client_sessions_of(first).await?, Some(vec![]));
    Ok(())
}

#[tokio::test]
async fn test_repeated_set_is_idempotent() -> anyhow::Result<()> {
    let env = TestEnv::in_memory()?;
    let user_session = env.create_user_session().await?;
    let client_session = env.create_client_session(env.client.id).await?;

    env.set_user_session(client_session, Some(user_session)).await?;
    let before = env.listener.events().len();

    env.set_user_session(client_session, Some(user_session)).await?;
    assert_eq!(env.listener.events().len(), before);
    assert_eq!(env.client_sessions_of(user_session).await?, Some(vec![client_session]));

    env.set_user_session(client_session, None).await?;
    env.set_user_session(client_session, None).await?;
    assert_detached(&env, &[user_session], client_session).await?;
    Ok(())
}

#[tokio::test]
async fn test_attach_to_missing_user_session_fails() -> anyhow::Result<()> {
    let env = TestEnv::in_memory()?;
    let client_session = env.create_client_session(env.client.id).await?;

    let err = env
        .set_user_session(client_session, Some(uuid::Uuid::now_v7()))
        .await
        .unwrap_err();
    let err = err.downcast::<SessionError>()?;
    assert!(err.is_not_found());
    assert_eq!(env.user_session_of(client_session).await?, Some(None));
    Ok(())
}

#[tokio::test]
async fn test_sessions_by_client() -> anyhow::Result<()> {
    let env = TestEnv::in_memory()?;
    let other_client = env.add_client("admin-console");
    let first = env.create_user_session().await?;
    let second = env.create_user_session().await?;

    for user_session in [first, second] {
        let client_session = env.create_client_session(env.client.id).await?;
        env.set_user_session(client_session, Some(user_session)).await?;
    }
    let unattached = env.create_client_session(other_client.id).await?;

    let mut expected = vec![first, second];
    expected.sort_unstable();
    assert_eq!(
        env.provider.get_user_sessions_by_client(env.realm_id, env.client.id).await?,
        expected
    );
    assert_eq!(
        env.provider.active_user_session_count(env.realm_id, other_client.id).await?,
        0
    );

    assert_eq!(env.provider.on_client_removed(env.realm_id, env.client.id).await?, 2);
    assert_eq!(env.client_sessions_of(first).await?, Some(vec![]));
    assert_eq!(env.user_session_of(unattached).await?, Some(None));
    Ok(())
}
