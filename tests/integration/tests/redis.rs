//! The same scenarios over a real Redis instance.

use kc_integration_tests::TestEnv;

use crate::common::{assert_attached, assert_detached};

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_attach_detach_remove() -> anyhow::Result<()> {
    let env = TestEnv::redis().await?;
    let first = env.create_user_session().await?;
    let second = env.create_user_session().await?;
    let client_session = env.create_client_session(env.client.id).await?;

    env.set_user_session(client_session, Some(first)).await?;
    assert_attached(&env, first, client_session).await?;

    env.set_user_session(client_session, Some(second)).await?;
    assert_attached(&env, second, client_session).await?;
    assert_eq!(env.client_sessions_of(first).await?, Some(vec![]));

    env.set_user_session(client_session, None).await?;
    assert_detached(&env, &[first, second], client_session).await?;

    let mut tx = env.provider.begin();
    assert!(tx.remove_user_session(env.realm_id, first).await?);
    tx.commit().await?;
    assert_eq!(env.client_sessions_of(first).await?, None);
    assert_eq!(
        env.provider.get_user_sessions(env.realm_id, env.user.id).await?,
        vec![second]
    );
    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker"]
async fn test_redis_stale_commit_is_rejected() -> anyhow::Result<()> {
    let env = TestEnv::redis().await?;
    let user_session = env.create_user_session().await?;

    let mut first = env.provider.begin();
    let mut second = env.provider.begin();
    first
        .user_session(env.realm_id, user_session)
        .await?
        .expect("exists")
        .set_note("early", "yes");
    second
        .user_session(env.realm_id, user_session)
        .await?
        .expect("exists")
        .set_note("late", "yes");

    first.commit().await?;
    assert!(second.commit().await.unwrap_err().is_transient());
    Ok(())
}
