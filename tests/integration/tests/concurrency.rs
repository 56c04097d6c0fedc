//! Concurrent writers over the same sessions.

use std::sync::Arc;

use futures::future::join_all;
use kc_integration_tests::TestEnv;
use kc_session::SessionConfig;

/// Many client sessions attach to one user session at once. Each unit of
/// work that loses the race retries, so every attachment lands on both sides.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_attach_to_same_user_session() -> anyhow::Result<()> {
    const WRITERS: usize = 8;

    let env = Arc::new(TestEnv::in_memory_with_config(
        SessionConfig::default().with_max_commit_attempts(64),
    )?);
    let user_session = env.create_user_session().await?;

    let mut client_sessions = Vec::with_capacity(WRITERS);
    for _ in 0..WRITERS {
        client_sessions.push(env.create_client_session(env.client.id).await?);
    }

    let tasks = client_sessions.iter().map(|&client_session| {
        let env = Arc::clone(&env);
        tokio::spawn(async move {
            let realm_id = env.realm_id;
            env.provider
                .with_transaction(move |tx| {
                    Box::pin(async move {
                        let mut client = tx
                            .client_session(realm_id, client_session)
                            .await?
                            .expect("client session exists");
                        client.set_user_session(Some(user_session)).await?;
                        Ok(())
                    })
                })
                .await
        })
    });

    for result in join_all(tasks).await {
        result??;
    }

    let mut expected = client_sessions.clone();
    expected.sort_unstable();
    assert_eq!(env.client_sessions_of(user_session).await?, Some(expected));
    for client_session in client_sessions {
        assert_eq!(env.user_session_of(client_session).await?, Some(Some(user_session)));
    }
    Ok(())
}

/// One client session is pulled onto several user sessions at once. Whoever
/// commits last wins, and the loser's attachment must not linger on any other
/// user session.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_moves_of_one_client_session() -> anyhow::Result<()> {
    const ROUNDS: usize = 20;
    const USER_SESSIONS: usize = 6;

    let env = Arc::new(TestEnv::in_memory_with_config(
        SessionConfig::default().with_max_commit_attempts(64),
    )?);

    for _ in 0..ROUNDS {
        let client_session = env.create_client_session(env.client.id).await?;
        let mut user_sessions = Vec::with_capacity(USER_SESSIONS);
        for _ in 0..USER_SESSIONS {
            user_sessions.push(env.create_user_session().await?);
        }

        let tasks = user_sessions.iter().map(|&user_session| {
            let env = Arc::clone(&env);
            tokio::spawn(async move {
                let realm_id = env.realm_id;
                env.provider
                    .with_transaction(move |tx| {
                        Box::pin(async move {
                            let mut client = tx
                                .client_session(realm_id, client_session)
                                .await?
                                .expect("client session exists");
                            client.set_user_session(Some(user_session)).await?;
                            Ok(())
                        })
                    })
                    .await
            })
        });

        for result in join_all(tasks).await {
            result??;
        }

        let mut holders = Vec::new();
        for &user_session in &user_sessions {
            let ids = env
                .client_sessions_of(user_session)
                .await?
                .expect("user session exists");
            if ids.contains(&client_session) {
                holders.push(user_session);
            }
        }

        assert_eq!(holders.len(), 1, "client session listed by {holders:?}");
        assert_eq!(env.user_session_of(client_session).await?, Some(Some(holders[0])));
    }
    Ok(())
}

/// Only one of two transactions that read the same session may commit.
#[tokio::test]
async fn test_second_writer_goes_stale() -> anyhow::Result<()> {
    let env = TestEnv::in_memory()?;
    let user_session = env.create_user_session().await?;

    let mut first = env.provider.begin();
    let mut second = env.provider.begin();
    first
        .user_session(env.realm_id, user_session)
        .await?
        .expect("exists")
        .set_note("writer", "first");
    second
        .user_session(env.realm_id, user_session)
        .await?
        .expect("exists")
        .set_note("writer", "second");

    first.commit().await?;
    let err = second.commit().await.unwrap_err();
    assert!(err.is_transient());

    let mut tx = env.provider.begin();
    let session = tx.user_session(env.realm_id, user_session).await?.expect("exists");
    assert_eq!(session.note("writer"), Some("first"));
    Ok(())
}
