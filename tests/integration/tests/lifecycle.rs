//! Session lifecycle: creation, notes, removal and sweeps.

use kc_core::event::EventType;
use kc_integration_tests::TestEnv;
use kc_session::client_session::notes as client_notes;
use kc_session::user_session::notes as user_notes;
use kc_session::{AuthenticatorStatus, SessionConfig, SessionState};

/// A login: user session, client session attached, notes carried over.
#[tokio::test]
async fn test_login_flow() -> anyhow::Result<()> {
    let env = TestEnv::in_memory()?;

    let mut tx = env.provider.begin();
    let user_session = tx
        .create_user_session(env.new_user_session().with_ip_address("198.51.100.4"))
        .await?
        .id();

    let mut client = tx.create_client_session(env.realm_id, env.client.id).await?;
    client.set_redirect_uri("https://app.example.com/callback");
    client.set_note(client_notes::NONCE, "n-0S6_WzA2Mj");
    client.set_note(client_notes::STATE, "af0ifjsldkj");
    client.set_user_session_note(user_notes::ACR, "1");
    client.set_authenticator_status("auth-username-password-form", AuthenticatorStatus::Success);
    client.set_authenticated_user(Some(env.user.id));
    client.set_user_session(Some(user_session)).await?;
    let client_session = client.id();
    let carried = client.user_session_notes();

    let mut session = tx
        .user_session(env.realm_id, user_session)
        .await?
        .expect("created in this transaction");
    for (name, value) in carried {
        session.set_note(name, value);
    }
    session.set_state(SessionState::LoggedIn);
    tx.commit().await?;

    crate::common::assert_attached(&env, user_session, client_session).await?;

    let mut tx = env.provider.begin();
    let session = tx.user_session(env.realm_id, user_session).await?.expect("committed");
    assert_eq!(session.state(), SessionState::LoggedIn);
    assert_eq!(session.note(user_notes::ACR), Some("1"));
    assert_eq!(session.ip_address(), Some("198.51.100.4"));

    let client = tx.client_session(env.realm_id, client_session).await?.expect("committed");
    assert_eq!(client.note(client_notes::NONCE), Some("n-0S6_WzA2Mj"));
    assert_eq!(client.note(client_notes::STATE), Some("af0ifjsldkj"));
    assert_eq!(client.note(user_notes::ACR), None);

    assert_eq!(
        env.listener.events(),
        vec![
            EventType::UserSessionStarted,
            EventType::ClientSessionStarted,
            EventType::ClientSessionAttached,
        ]
    );
    Ok(())
}

/// Logout removes the user session and its client sessions.
#[tokio::test]
async fn test_logout_removes_client_sessions() -> anyhow::Result<()> {
    let env = TestEnv::in_memory()?;
    let user_session = env.create_user_session().await?;
    let first = env.create_client_session(env.client.id).await?;
    let second = env.create_client_session(env.add_client("admin-console").id).await?;
    env.set_user_session(first, Some(user_session)).await?;
    env.set_user_session(second, Some(user_session)).await?;

    let mut tx = env.provider.begin();
    assert!(tx.remove_user_session(env.realm_id, user_session).await?);
    tx.commit().await?;

    assert_eq!(env.client_sessions_of(user_session).await?, None);
    assert_eq!(env.user_session_of(first).await?, None);
    assert_eq!(env.user_session_of(second).await?, None);
    Ok(())
}

/// Dropping a transaction discards everything it staged.
#[tokio::test]
async fn test_abandoned_transaction_writes_nothing() -> anyhow::Result<()> {
    let env = TestEnv::in_memory()?;
    let user_session = env.create_user_session().await?;

    {
        let mut tx = env.provider.begin();
        let mut session = tx.user_session(env.realm_id, user_session).await?.expect("exists");
        session.set_note("discarded", "yes");
    }

    let mut tx = env.provider.begin();
    let session = tx.user_session(env.realm_id, user_session).await?.expect("exists");
    assert_eq!(session.note("discarded"), None);
    Ok(())
}

/// Sweeps for expiry, user removal and realm removal.
#[tokio::test]
async fn test_sweeps() -> anyhow::Result<()> {
    let env = TestEnv::in_memory_with_config(SessionConfig::default().with_idle_timeout(1))?;
    let user_session = env.create_user_session().await?;
    let client_session = env.create_client_session(env.client.id).await?;
    env.set_user_session(client_session, Some(user_session)).await?;

    let mut tx = env.provider.begin();
    let mut session = tx.user_session(env.realm_id, user_session).await?.expect("exists");
    session.set_last_session_refresh(chrono_past(3600));
    tx.commit().await?;

    assert_eq!(env.provider.remove_expired(env.realm_id).await?, 1);
    assert_eq!(env.user_session_of(client_session).await?, None);
    assert!(env.listener.events().contains(&EventType::SessionExpired));

    env.create_user_session().await?;
    env.create_user_session().await?;
    assert_eq!(env.provider.get_user_sessions(env.realm_id, env.user.id).await?.len(), 2);
    assert_eq!(env.provider.on_user_removed(env.realm_id, env.user.id).await?, 2);
    assert!(env.provider.get_user_sessions(env.realm_id, env.user.id).await?.is_empty());

    env.create_user_session().await?;
    env.create_client_session(env.client.id).await?;
    assert_eq!(env.provider.on_realm_removed(env.realm_id).await?, 2);
    Ok(())
}

fn chrono_past(secs: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::Utc::now() - chrono::Duration::seconds(secs)
}
