#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::Mutex;
use uuid::Uuid;

use passgate::auth::password;
use passgate::clock::{Clock, ManualClock};
use passgate::config::Config;
use passgate::models::{Role, TokenPurpose, User};
use passgate::notify::{HttpNotifier, Notification, Notifier};
use passgate::service::{AccountPolicy, AccountService};
use passgate::state::SharedState;
use passgate::store::{CredentialStore, MemoryStore, PgStore};

pub const NOTIFY_SECRET: &str = "test-notify-secret";

/// Notifier that keeps every notification in memory and can be told to fail.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<Notification> {
        self.sent.lock().await.clone()
    }

    /// Most recent token sent to `email` for `purpose`.
    pub async fn last_token(&self, email: &str, purpose: TokenPurpose) -> Option<String> {
        self.sent
            .lock()
            .await
            .iter()
            .rev()
            .find(|n| n.email == email && n.purpose == purpose)
            .map(|n| n.token.clone())
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err("dispatcher unavailable".to_string());
        }
        self.sent.lock().await.push(notification.clone());
        Ok(())
    }
}

/// Account service over an in-memory store with a hand-driven clock.
pub struct TestAccounts {
    pub accounts: AccountService,
    pub store: Arc<MemoryStore>,
    pub clock: ManualClock,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn accounts() -> TestAccounts {
    accounts_with(AccountPolicy::default())
}

pub fn accounts_with(policy: AccountPolicy) -> TestAccounts {
    let clock = ManualClock::new(Utc::now());
    let store = Arc::new(MemoryStore::new(Arc::new(clock.clone())));
    let notifier = Arc::new(RecordingNotifier::default());
    let accounts = AccountService::new(
        store.clone(),
        notifier.clone(),
        Arc::new(clock.clone()),
        policy,
    );

    TestAccounts {
        accounts,
        store,
        clock,
        notifier,
    }
}

pub fn test_config(base_url: &str) -> Config {
    Config {
        database_url: None,
        jwt_secret: "test-jwt-secret-that-is-long-enough".to_string(),
        notify_secret: NOTIFY_SECRET.to_string(),
        host: "127.0.0.1".parse().unwrap(),
        port: 0, // unused, we bind to random port
        base_url: base_url.to_string(),
        send_url: format!("{base_url}/api/send"),
        token_ttl_minutes: 60,
        session_ttl_minutes: 60,
        reveal_accounts: false,
        log_level: "warn".to_string(),
        smtp: None,
    }
}

/// How the spawned app delivers tokens.
pub enum Dispatch {
    /// Record notifications in memory.
    Recording,
    /// POST to the app's own send endpoint presenting this secret.
    Http { secret: String },
}

/// A running test server on an in-memory store.
pub struct TestApp {
    pub addr: SocketAddr,
    pub client: Client,
    pub state: SharedState,
    pub store: Arc<MemoryStore>,
    pub clock: ManualClock,
    pub notifier: Arc<RecordingNotifier>,
}

impl TestApp {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Call an RPC operation anonymously.
    pub async fn rpc(&self, operation: &str, body: &Value) -> (Value, StatusCode) {
        self.call(operation, None, body).await
    }

    /// Call an RPC operation with a session token.
    pub async fn rpc_auth(&self, operation: &str, token: &str, body: &Value) -> (Value, StatusCode) {
        self.call(operation, Some(token), body).await
    }

    async fn call(&self, operation: &str, token: Option<&str>, body: &Value) -> (Value, StatusCode) {
        let mut req = self
            .client
            .post(self.url(&format!("/api/rpc/{operation}")))
            .json(body);
        if let Some(token) = token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.expect("rpc request failed");
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or(json!(null));
        (body, status)
    }

    pub async fn register(&self, email: &str, password: &str) -> (Value, StatusCode) {
        self.rpc("register", &json!({ "email": email, "password": password }))
            .await
    }

    pub async fn login(&self, email: &str, password: &str) -> (Value, StatusCode) {
        self.rpc("login", &json!({ "email": email, "password": password }))
            .await
    }

    /// Log in and return the session token.
    pub async fn session(&self, email: &str, password: &str) -> String {
        let (body, status) = self.login(email, password).await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["result"]["token"].as_str().unwrap().to_string()
    }

    /// Insert a user with the given role straight into the store.
    pub async fn seed_user(&self, email: &str, password: &str, role: Role) -> User {
        let hash = password::hash(password).unwrap();
        self.store.create_user(email, &hash, role).await.unwrap()
    }
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(Dispatch::Recording, false).await
}

pub async fn spawn_app_with(dispatch: Dispatch, reveal_accounts: bool) -> TestApp {
    // Bind first so the send endpoint URL is known before the state is built
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind to random port");
    let addr = listener.local_addr().unwrap();

    let mut config = test_config(&format!("http://{addr}"));
    config.reveal_accounts = reveal_accounts;

    let clock = ManualClock::new(Utc::now());
    let store = Arc::new(MemoryStore::new(Arc::new(clock.clone())));
    let recorder = Arc::new(RecordingNotifier::default());

    let notifier: Arc<dyn Notifier> = match dispatch {
        Dispatch::Recording => recorder.clone() as Arc<dyn Notifier>,
        Dispatch::Http { secret } => Arc::new(HttpNotifier::new(config.send_url.clone(), secret).unwrap()),
    };

    let state = passgate::build_state(config, store.clone(), notifier, Arc::new(clock.clone()));
    let app = passgate::build_app(state.clone());

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Server failed");
    });

    let client = Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    TestApp {
        addr,
        client,
        state,
        store,
        clock,
        notifier: recorder,
    }
}

// ── Postgres ────────────────────────────────────────────────────

/// A fresh Postgres database with migrations applied.
pub struct TestDb {
    pub pool: PgPool,
    pub db_name: String,
}

fn admin_url(base_url: &str) -> String {
    base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/postgres"))
        .unwrap_or_else(|| base_url.to_string())
}

pub async fn spawn_db() -> TestDb {
    let _ = dotenvy::dotenv();

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let db_name = format!("passgate_test_{}", Uuid::now_v7().to_string().replace('-', ""));

    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url(&base_url))
        .await
        .expect("Failed to connect to postgres for test DB creation");

    sqlx::query(&format!("CREATE DATABASE \"{db_name}\""))
        .execute(&admin_pool)
        .await
        .expect("Failed to create test database");

    admin_pool.close().await;

    let test_url = base_url
        .rsplit_once('/')
        .map(|(base, _)| format!("{base}/{db_name}"))
        .unwrap_or_else(|| base_url.clone());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&test_url)
        .await
        .expect("Failed to connect to test database");

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("Failed to run migrations on test database");

    TestDb { pool, db_name }
}

pub fn pg_accounts(db: &TestDb, clock: Arc<dyn Clock>) -> (AccountService, Arc<PgStore>, Arc<RecordingNotifier>) {
    let store = Arc::new(PgStore::new(db.pool.clone(), clock.clone()));
    let notifier = Arc::new(RecordingNotifier::default());
    let accounts = AccountService::new(
        store.clone(),
        notifier.clone(),
        clock,
        AccountPolicy {
            token_ttl: TimeDelta::hours(1),
            reveal_accounts: false,
        },
    );
    (accounts, store, notifier)
}

/// Drop the test database after tests complete.
pub async fn cleanup_db(db: TestDb) {
    db.pool.close().await;

    let base_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for tests");
    let admin_pool = PgPoolOptions::new()
        .max_connections(2)
        .connect(&admin_url(&base_url))
        .await
        .expect("Failed to connect for cleanup");

    let _ = sqlx::query(&format!("DROP DATABASE IF EXISTS \"{}\" WITH (FORCE)", db.db_name))
        .execute(&admin_pool)
        .await;

    admin_pool.close().await;
}
