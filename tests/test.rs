use async_lock::Barrier;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use session_gate::{
    AuthConfig, AuthOutcome, AuthPolicy, AuthSetup, BasicAuth, DebugSessionCookieGenerator,
    DurableStore, Error, ExclusionList, FileTable, MemoryStore, MemoryTable, MemoryUserDirectory,
    NoAuth, Persistence, RecordFilter, Request, Result, SessionCookieGenerator, SessionDuration,
    SessionId, SessionRecord, SessionStore, UserId,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const COOKIE: &str = "_my_session_id";

fn user(id: &str) -> UserId {
    UserId::new(id).unwrap()
}

/// Creating a session yields a cookie that resolves to the user, and nobody gets a session.
#[async_std::test]
async fn test_session_lifecycle() {
    let store = SessionStore::new(MemoryStore::new());
    let cookie_value = store.create_session(Some(&user("u1"))).await.unwrap().unwrap();
    assert_eq!(
        store.user_id_for_session(Some(&cookie_value)).await,
        Some(user("u1"))
    );
    assert_eq!(store.create_session(None).await.unwrap(), None);
    assert_eq!(store.user_id_for_session(None).await, None);
    assert_eq!(store.user_id_for_session(Some("unknown")).await, None);
    assert_eq!(store.inner().len().await, 1);
}

/// Sessions expire once their duration has passed, evaluated at lookup time.
#[async_std::test]
async fn test_expiration_with_simulated_time() {
    let store =
        SessionStore::new_with_duration(MemoryStore::new(), SessionDuration::from_secs(1));
    let created_at = Utc::now();
    let cookie_value = store
        .create_session_at(Some(&user("u1")), created_at)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        store
            .user_id_for_session_at(Some(&cookie_value), created_at)
            .await,
        Some(user("u1"))
    );
    assert_eq!(
        store
            .user_id_for_session_at(Some(&cookie_value), created_at + Duration::seconds(2))
            .await,
        None
    );
    // Expired sessions are not purged by lookups.
    assert_eq!(store.inner().len().await, 1);
}

/// With a zero duration, sessions live forever.
#[async_std::test]
async fn test_zero_duration_never_expires() {
    let store = SessionStore::new_with_duration(MemoryStore::new(), SessionDuration::NEVER);
    let created_at = Utc::now() - Duration::days(365);
    let cookie_value = store
        .create_session_at(Some(&user("u1")), created_at)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        store.user_id_for_session(Some(&cookie_value)).await,
        Some(user("u1"))
    );
}

/// Destroying a session succeeds once.
#[async_std::test]
async fn test_destroy_session_is_idempotent() {
    let store = SessionStore::new(MemoryStore::new());
    let cookie_value = store.create_session(Some(&user("u1"))).await.unwrap().unwrap();
    assert!(store.destroy_session(Some(&cookie_value)).await);
    assert!(!store.destroy_session(Some(&cookie_value)).await);
    assert_eq!(store.user_id_for_session(Some(&cookie_value)).await, None);
    assert!(!store.destroy_session(Some("unknown")).await);
    assert!(!store.destroy_session(None).await);
}

/// Cookies come from the generator; the store keys sessions by their hash.
#[async_std::test]
async fn test_debug_cookie_generator() {
    let cookie_generator = DebugSessionCookieGenerator::<32>::default();
    let cookie_0 = cookie_generator.generate_cookie();

    let store: SessionStore<_, _, 32> = SessionStore::new_with_cookie_generator(
        DurableStore::new(MemoryTable::new()),
        DebugSessionCookieGenerator::<32>::default(),
        SessionDuration::NEVER,
    );
    let cookie_value = store.create_session(Some(&user("u1"))).await.unwrap().unwrap();
    assert_eq!(cookie_value, cookie_0);

    let records = store
        .inner()
        .persistence()
        .search(&RecordFilter::any())
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].session_id,
        SessionId::from_cookie_value(&cookie_0).to_hex()
    );
    assert_eq!(records[0].user_id, user("u1"));
}

#[derive(Debug)]
struct ConstantCookieGenerator;

impl SessionCookieGenerator<64> for ConstantCookieGenerator {
    fn generate_cookie(&self) -> String {
        "always-the-same".to_owned()
    }
}

/// A reused session id is a fatal error, not silently accepted.
#[async_std::test]
async fn test_session_id_collision_is_fatal() {
    let store: SessionStore<_, _, 64> = SessionStore::new_with_cookie_generator(
        MemoryStore::new(),
        ConstantCookieGenerator,
        SessionDuration::NEVER,
    );
    store.create_session(Some(&user("u1"))).await.unwrap();
    assert!(matches!(
        store.create_session(Some(&user("u2"))).await,
        Err(Error::SessionIdCollision)
    ));
    assert_eq!(
        store.user_id_for_session(Some("always-the-same")).await,
        Some(user("u1"))
    );
}

/// A table whose inserts wait until two of them are in flight.
#[derive(Debug)]
struct GatedTable {
    table: MemoryTable,
    gate: Barrier,
}

#[async_trait]
impl Persistence for GatedTable {
    async fn search(&self, filter: &RecordFilter) -> Result<Vec<SessionRecord>> {
        self.table.search(filter).await
    }

    async fn insert(&self, record: &SessionRecord) -> Result<bool> {
        self.gate.wait().await;
        self.table.insert(record).await
    }

    async fn save(&self, record: &SessionRecord) -> Result {
        self.table.save(record).await
    }

    async fn remove(&self, record: &SessionRecord) -> Result {
        self.table.remove(record).await
    }
}

/// Two logins racing for the same session id: one wins, the other gets a collision error.
#[async_std::test]
async fn test_concurrent_session_id_collision_is_fatal() {
    let table = GatedTable {
        table: MemoryTable::new(),
        gate: Barrier::new(2),
    };
    let store: Arc<SessionStore<_, _, 64>> = Arc::new(SessionStore::new_with_cookie_generator(
        DurableStore::new(table),
        ConstantCookieGenerator,
        SessionDuration::NEVER,
    ));

    let tasks: Vec<_> = ["u1", "u2"]
        .into_iter()
        .map(|id| {
            let store = Arc::clone(&store);
            async_std::task::spawn(async move {
                (id, store.create_session(Some(&user(id))).await)
            })
        })
        .collect();

    let mut winners = Vec::new();
    let mut collisions = 0;
    for task in tasks {
        match task.await {
            (id, Ok(Some(cookie_value))) => {
                assert_eq!(cookie_value, "always-the-same");
                winners.push(id);
            }
            (_, Err(Error::SessionIdCollision)) => collisions += 1,
            (id, other) => panic!("unexpected result for {id}: {other:?}"),
        }
    }
    assert_eq!(winners.len(), 1);
    assert_eq!(collisions, 1);
    assert_eq!(
        store.user_id_for_session(Some("always-the-same")).await,
        Some(user(winners[0]))
    );
    assert_eq!(store.inner().persistence().table.len().await, 1);
}

/// A table that can be switched into failing every operation.
#[derive(Debug, Default)]
struct FlakyTable {
    table: MemoryTable,
    failing: AtomicBool,
}

impl FlakyTable {
    fn check(&self) -> Result {
        if self.failing.load(Ordering::SeqCst) {
            Err(Error::store_fault(anyhow::anyhow!("connection reset")))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Persistence for FlakyTable {
    async fn search(&self, filter: &RecordFilter) -> Result<Vec<SessionRecord>> {
        self.check()?;
        self.table.search(filter).await
    }

    async fn insert(&self, record: &SessionRecord) -> Result<bool> {
        self.check()?;
        self.table.insert(record).await
    }

    async fn save(&self, record: &SessionRecord) -> Result {
        self.check()?;
        self.table.save(record).await
    }

    async fn remove(&self, record: &SessionRecord) -> Result {
        self.check()?;
        self.table.remove(record).await
    }
}

/// Persistence faults are reported as "no session" by lookups and destruction, and as errors by creation.
#[async_std::test]
async fn test_durable_store_swallows_faults() {
    let store = SessionStore::new(DurableStore::new(FlakyTable::default()));
    let cookie_value = store.create_session(Some(&user("u1"))).await.unwrap().unwrap();

    store.inner().persistence().failing.store(true, Ordering::SeqCst);
    assert_eq!(store.user_id_for_session(Some(&cookie_value)).await, None);
    assert!(!store.destroy_session(Some(&cookie_value)).await);
    assert!(matches!(
        store.create_session(Some(&user("u2"))).await,
        Err(Error::StoreFault(_))
    ));

    store.inner().persistence().failing.store(false, Ordering::SeqCst);
    assert_eq!(
        store.user_id_for_session(Some(&cookie_value)).await,
        Some(user("u1"))
    );
    assert!(store.destroy_session(Some(&cookie_value)).await);
}

/// The durable store expires sessions like the memory store, and flags corrupt records.
#[async_std::test]
async fn test_durable_store_expiry_and_corruption() {
    let store = SessionStore::new_with_duration(
        DurableStore::new(MemoryTable::new()),
        SessionDuration::from_secs(60),
    );
    let created_at = Utc::now();
    let cookie_value = store
        .create_session_at(Some(&user("u1")), created_at)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        store
            .user_id_for_session_at(Some(&cookie_value), created_at + Duration::seconds(61))
            .await,
        None
    );

    let mut record = SessionRecord::new(
        &SessionId::from_cookie_value("corrupt"),
        user("u2"),
        created_at,
    );
    record.created_at = None;
    store.inner().persistence().save(&record).await.unwrap();
    assert_eq!(store.user_id_for_session(Some("corrupt")).await, None);
}

/// Two stores on the same file see each other's sessions, like two processes would.
#[async_std::test]
async fn test_file_table_shares_sessions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sessions.json");
    let first = SessionStore::new(DurableStore::new(FileTable::new(&path)));
    let second = SessionStore::new(DurableStore::new(FileTable::new(&path)));

    let cookie_value = first.create_session(Some(&user("u1"))).await.unwrap().unwrap();
    assert_eq!(
        second.user_id_for_session(Some(&cookie_value)).await,
        Some(user("u1"))
    );
    assert!(second.destroy_session(Some(&cookie_value)).await);
    assert_eq!(first.user_id_for_session(Some(&cookie_value)).await, None);
}

/// The memory store can be used from many tasks at once.
#[async_std::test]
async fn test_concurrent_sessions() {
    let store = Arc::new(SessionStore::new(MemoryStore::new()));
    let tasks: Vec<_> = (0..32)
        .map(|index| {
            let store = Arc::clone(&store);
            async_std::task::spawn(async move {
                let user_id = user(&index.to_string());
                let cookie_value = store.create_session(Some(&user_id)).await.unwrap().unwrap();
                assert_eq!(
                    store.user_id_for_session(Some(&cookie_value)).await,
                    Some(user_id)
                );
                cookie_value
            })
        })
        .collect();

    let mut cookies = Vec::new();
    for task in tasks {
        cookies.push(task.await);
    }
    assert_eq!(store.inner().len().await, 32);
    for cookie_value in &cookies {
        assert!(store.destroy_session(Some(cookie_value)).await);
    }
    assert!(store.inner().is_empty().await);
}

/// A missing header is answered with 401 before user resolution, a wrong one with 403.
#[async_std::test]
async fn test_basic_auth_policy_ordering() {
    let users = Arc::new(MemoryUserDirectory::new());
    users
        .register(user("bob"), "bob@hbtn.io", "H0lbertonSchool98!")
        .await
        .unwrap();
    let policy = AuthPolicy::new(
        Arc::new(BasicAuth::new(users)),
        ExclusionList::default_api(),
    );

    assert_eq!(
        policy.authenticate(&Request::new("/api/v1/users")).await,
        AuthOutcome::Unauthorized
    );
    assert_eq!(
        policy
            .authenticate(
                &Request::new("/api/v1/users").with_header("Authorization", "Basic d3Jvbmc=")
            )
            .await,
        AuthOutcome::Forbidden
    );
    assert_eq!(
        policy
            .authenticate(&Request::new("/api/v1/users").with_header(
                "Authorization",
                "Basic Ym9iQGhidG4uaW86SDBsYmVydG9uU2Nob29sOTgh"
            ))
            .await,
        AuthOutcome::Allow {
            user: Some(user("bob"))
        }
    );
    assert_eq!(
        policy.authenticate(&Request::new("/api/v1/status/")).await,
        AuthOutcome::Allow { user: None }
    );
}

fn config(vars: &[(&str, &str)]) -> AuthConfig {
    AuthConfig::from_lookup(|key| {
        vars.iter()
            .find(|(name, _)| *name == key)
            .map(|(_, value)| (*value).to_owned())
    })
}

async fn directory() -> Arc<MemoryUserDirectory> {
    let users = Arc::new(MemoryUserDirectory::new());
    users
        .register(user("bob"), "bob@hbtn.io", "H0lbertonSchool98!")
        .await
        .unwrap();
    users
}

// "bob@hbtn.io:H0lbertonSchool98!"
const BOB: &str = "Basic Ym9iQGhidG4uaW86SDBsYmVydG9uU2Nob29sOTgh";

/// `none` disables authentication altogether.
#[async_std::test]
async fn test_policy_from_config_none() {
    let setup = AuthSetup::from_config(
        &config(&[("AUTH_TYPE", "none")]),
        directory().await,
        MemoryTable::new(),
    );
    assert!(!setup.policy.is_enabled());
    assert!(setup.sessions.is_none());
    assert_eq!(
        setup.policy.authenticate(&Request::new("/api/v1/users")).await,
        AuthOutcome::Allow { user: None }
    );
}

/// `auth`, and anything unknown, refuses every request outside the exclusions.
#[async_std::test]
async fn test_policy_from_config_auth() {
    for auth_type in ["auth", "sesion_auth"] {
        let policy = AuthPolicy::from_config(
            &config(&[("AUTH_TYPE", auth_type)]),
            directory().await,
            MemoryTable::new(),
        );
        assert!(policy.is_enabled());
        assert_eq!(
            policy.authenticate(&Request::new("/api/v1/users")).await,
            AuthOutcome::Unauthorized
        );
        let request = Request::new("/api/v1/users").with_header("Authorization", BOB);
        assert_eq!(policy.authenticate(&request).await, AuthOutcome::Forbidden);
        assert_eq!(
            policy.authenticate(&Request::new("/api/v1/status")).await,
            AuthOutcome::Allow { user: None }
        );
    }
}

/// `basic_auth` checks credentials against the user directory.
#[async_std::test]
async fn test_policy_from_config_basic_auth() {
    let setup = AuthSetup::from_config(
        &config(&[("AUTH_TYPE", "basic_auth")]),
        directory().await,
        MemoryTable::new(),
    );
    assert!(setup.sessions.is_none());
    let request = Request::new("/api/v1/users").with_header("Authorization", BOB);
    assert_eq!(
        setup.policy.authenticate(&request).await,
        AuthOutcome::Allow {
            user: Some(user("bob"))
        }
    );
}

/// `session_auth` keeps sessions in memory and never expires them, whatever the duration says.
#[async_std::test]
async fn test_policy_from_config_session_auth() {
    let setup = AuthSetup::from_config(
        &config(&[
            ("AUTH_TYPE", "session_auth"),
            ("SESSION_NAME", COOKIE),
            ("SESSION_DURATION", "30"),
        ]),
        directory().await,
        MemoryTable::new(),
    );
    let sessions = setup.sessions.unwrap();
    assert_eq!(sessions.cookie_name(), Some(COOKIE));
    assert_eq!(sessions.store().duration(), SessionDuration::NEVER);

    let old = sessions
        .store()
        .create_session_at(Some(&user("u1")), Utc::now() - Duration::days(365))
        .await
        .unwrap()
        .unwrap();
    let request = Request::new("/api/v1/users").with_cookie(COOKIE, old);
    assert_eq!(
        setup.policy.authenticate(&request).await.user(),
        Some(&user("u1"))
    );
}

/// `session_exp_auth` expires sessions after the configured duration.
#[async_std::test]
async fn test_policy_from_config_session_exp_auth() {
    let setup = AuthSetup::from_config(
        &config(&[
            ("AUTH_TYPE", "session_exp_auth"),
            ("SESSION_NAME", COOKIE),
            ("SESSION_DURATION", "30"),
        ]),
        directory().await,
        MemoryTable::new(),
    );
    let policy = setup.policy;
    let sessions = setup.sessions.unwrap();
    assert_eq!(sessions.store().duration(), SessionDuration::from_secs(30));

    assert_eq!(
        policy.authenticate(&Request::new("/api/v1/users")).await,
        AuthOutcome::Unauthorized
    );

    let stale = sessions
        .store()
        .create_session_at(Some(&user("u1")), Utc::now() - Duration::seconds(60))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        policy
            .authenticate(&Request::new("/api/v1/users").with_cookie(COOKIE, stale))
            .await,
        AuthOutcome::Forbidden
    );

    let fresh = sessions.create_session(Some(&user("u1"))).await.unwrap().unwrap();
    let request = Request::new("/api/v1/users").with_header("Cookie", format!("{COOKIE}={fresh}"));
    assert_eq!(
        policy.authenticate(&request).await.user(),
        Some(&user("u1"))
    );
    assert!(sessions.destroy_session(Some(&request)).await);
    assert_eq!(policy.authenticate(&request).await, AuthOutcome::Forbidden);
}

/// `session_db_auth` keeps sessions in the given persistence, and expires them.
#[async_std::test]
async fn test_policy_from_config_session_db_auth() {
    let table = Arc::new(MemoryTable::new());
    let setup = AuthSetup::from_config(
        &config(&[
            ("AUTH_TYPE", "session_db_auth"),
            ("SESSION_NAME", COOKIE),
            ("SESSION_DURATION", "30"),
        ]),
        directory().await,
        Arc::clone(&table),
    );
    let sessions = setup.sessions.unwrap();

    let cookie_value = sessions.create_session(Some(&user("u1"))).await.unwrap().unwrap();
    assert_eq!(table.len().await, 1);
    let stored = table.search(&RecordFilter::any()).await.unwrap();
    assert_eq!(
        stored[0].session_id,
        SessionId::from_cookie_value(&cookie_value).to_hex()
    );

    let request = Request::new("/api/v1/users").with_cookie(COOKIE, cookie_value.as_str());
    assert_eq!(
        setup.policy.authenticate(&request).await.user(),
        Some(&user("u1"))
    );

    let stale = sessions
        .store()
        .create_session_at(Some(&user("u2")), Utc::now() - Duration::seconds(60))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        setup
            .policy
            .authenticate(&Request::new("/api/v1/users").with_cookie(COOKIE, stale))
            .await,
        AuthOutcome::Forbidden
    );
    assert_eq!(table.len().await, 2);
}

/// The base scheme refuses everything outside the exclusions, and no scheme allows everything.
#[async_std::test]
async fn test_base_and_disabled_policies() {
    let request = Request::new("/api/v1/users").with_header("Authorization", "Bearer x");
    let base = AuthPolicy::new(Arc::new(NoAuth), ExclusionList::default_api());
    assert_eq!(base.authenticate(&request).await, AuthOutcome::Forbidden);
    assert_eq!(
        base.authenticate(&Request::new("/api/v1/users")).await,
        AuthOutcome::Unauthorized
    );
    assert_eq!(
        base.authenticate(&Request::new("/api/v1/forbidden/")).await,
        AuthOutcome::Allow { user: None }
    );

    let disabled = AuthPolicy::disabled();
    assert_eq!(
        disabled.authenticate(&request).await,
        AuthOutcome::Allow { user: None }
    );
}

/// Without exclusions, every path requires authentication.
#[async_std::test]
async fn test_empty_exclusions_protect_everything() {
    let policy = AuthPolicy::new(Arc::new(NoAuth), ExclusionList::default());
    assert_eq!(
        policy.authenticate(&Request::new("/api/v1/status/")).await,
        AuthOutcome::Unauthorized
    );
}
