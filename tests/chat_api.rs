use actix_web::{test, web, App};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use mockall::mock;
use promptgate_server::auth::handlers::{login, register};
use promptgate_server::chat::handlers::chat;
use promptgate_server::error::{DatabaseError, ProxyError, SecretError, QUOTA_MESSAGE};
use promptgate_server::secrets::SigningKey;
use promptgate_server::{
    AppState, CompletionProvider, GenerationParams, MemoryStore, PromptRecord, PromptStore,
    SecretProvider, Settings, StaticSecretProvider, TokenCodec,
};
use serde_json::json;
use std::sync::Arc;

const SECRET: &str = "test_secret";

mock! {
    pub Completion {}

    #[async_trait]
    impl CompletionProvider for Completion {
        async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, ProxyError>;
    }
}

struct EchoCompletion;

#[async_trait]
impl CompletionProvider for EchoCompletion {
    async fn complete(&self, prompt: &str, params: &GenerationParams) -> Result<String, ProxyError> {
        Ok(format!("echo({}, max_tokens={}): {}", params.return_likelihoods, params.max_tokens, prompt))
    }
}

/// Counts come from memory; writes always fail.
struct ReadOnlyPrompts(MemoryStore);

#[async_trait]
impl PromptStore for ReadOnlyPrompts {
    async fn put(&self, _record: &PromptRecord) -> Result<(), DatabaseError> {
        Err(DatabaseError::Unavailable("prompts table is read-only".into()))
    }

    async fn count_by_email_and_date(&self, email: &str, date: NaiveDate) -> Result<u64, DatabaseError> {
        self.0.count_by_email_and_date(email, date).await
    }
}

/// Counting fails; nothing is ever recorded.
struct UnreachablePrompts;

#[async_trait]
impl PromptStore for UnreachablePrompts {
    async fn put(&self, _record: &PromptRecord) -> Result<(), DatabaseError> {
        Err(DatabaseError::Unavailable("connection refused".into()))
    }

    async fn count_by_email_and_date(&self, _email: &str, _date: NaiveDate) -> Result<u64, DatabaseError> {
        Err(DatabaseError::Unavailable("connection refused".into()))
    }
}

/// Writes go to memory; counting always fails.
struct UncountablePrompts(MemoryStore);

#[async_trait]
impl PromptStore for UncountablePrompts {
    async fn put(&self, record: &PromptRecord) -> Result<(), DatabaseError> {
        PromptStore::put(&self.0, record).await
    }

    async fn count_by_email_and_date(&self, _email: &str, _date: NaiveDate) -> Result<u64, DatabaseError> {
        Err(DatabaseError::Timeout)
    }
}

struct BrokenSecrets;

#[async_trait]
impl SecretProvider for BrokenSecrets {
    async fn signing_key(&self) -> Result<SigningKey, SecretError> {
        Err(SecretError::Unavailable("secrets backend unreachable".into()))
    }
}

struct SlowSecrets;

#[async_trait]
impl SecretProvider for SlowSecrets {
    async fn signing_key(&self) -> Result<SigningKey, SecretError> {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        Ok(SigningKey::new(SECRET))
    }
}

fn test_config() -> Settings {
    Settings::new_for_test().expect("Failed to load test config")
}

fn state_from(
    config: Settings,
    prompts: Arc<dyn PromptStore>,
    secrets: Arc<dyn SecretProvider>,
    completion: Arc<dyn CompletionProvider>,
) -> AppState {
    AppState::from_parts(config, Arc::new(MemoryStore::new()), prompts, secrets, completion)
}

fn state_with(prompts: Arc<dyn PromptStore>, completion: Arc<dyn CompletionProvider>) -> AppState {
    state_from(test_config(), prompts, Arc::new(StaticSecretProvider::new(SECRET)), completion)
}

fn server_token() -> String {
    TokenCodec::default()
        .issue("some-id", "a@x.com", &SigningKey::new(SECRET), Utc::now())
        .unwrap()
}

fn default_state() -> AppState {
    state_with(Arc::new(MemoryStore::new()), Arc::new(EchoCompletion))
}

macro_rules! chat_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .route("/register", web::post().to(register))
                .route("/login", web::post().to(login))
                .route("/chat", web::post().to(chat))
        )
        .await
    };
}

macro_rules! login_token {
    ($app:expr, $email:expr) => {{
        let registered = test::TestRequest::post()
            .uri("/register")
            .set_json(json!({"email": $email, "password": "p1"}))
            .send_request(&$app)
            .await;
        assert_eq!(registered.status(), 201);

        let resp = test::TestRequest::post()
            .uri("/login")
            .set_json(json!({"email": $email, "password": "p1"}))
            .send_request(&$app)
            .await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = test::read_body_json(resp).await;
        body["token"].as_str().unwrap().to_string()
    }};
}

fn chat_request(token: &str, prompt: &str) -> test::TestRequest {
    test::TestRequest::post()
        .uri("/chat")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .set_json(json!({"prompt": prompt}))
}

#[actix_web::test]
async fn test_quota_allows_three_per_day() {
    let app = chat_app!(default_state());
    let token = login_token!(app, "a@x.com");

    for served in 1..=3u64 {
        let resp = chat_request(&token, "Where is Lake Naivasha?").send_request(&app).await;
        assert_eq!(resp.status(), 200);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["prompt"], "Where is Lake Naivasha?");
        assert_eq!(body["response"], "echo(NONE, max_tokens=400): Where is Lake Naivasha?");
        assert_eq!(body["queries"], served);
        assert_eq!(body["balance"], 3 - served);
    }

    let resp = chat_request(&token, "one more").send_request(&app).await;
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"message": QUOTA_MESSAGE}));

    // A second user still has a full allowance.
    let other = login_token!(app, "b@x.com");
    let resp = chat_request(&other, "hello").send_request(&app).await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn test_expired_token_is_unauthorized() {
    let app = chat_app!(default_state());
    let issued = Utc::now() - Duration::hours(2);
    let token = TokenCodec::default()
        .issue("some-id", "a@x.com", &SigningKey::new(SECRET), issued)
        .unwrap();

    let resp = chat_request(&token, "hi").send_request(&app).await;
    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"message": "Invalid or expired token"}));
}

#[actix_web::test]
async fn test_token_signed_with_other_secret_is_unauthorized() {
    let app = chat_app!(default_state());
    let token = TokenCodec::default()
        .issue("some-id", "a@x.com", &SigningKey::new("not-the-server-secret"), Utc::now())
        .unwrap();

    let resp = chat_request(&token, "hi").send_request(&app).await;
    assert_eq!(resp.status(), 401);

    let resp = chat_request("garbage", "hi").send_request(&app).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_authorization_header_problems_are_bad_requests() {
    let app = chat_app!(default_state());

    let missing = test::TestRequest::post()
        .uri("/chat")
        .set_json(json!({"prompt": "hi"}))
        .send_request(&app)
        .await;
    assert_eq!(missing.status(), 400);
    let body: serde_json::Value = test::read_body_json(missing).await;
    assert_eq!(body["message"], "Authorization header missing");

    let wrong_scheme = test::TestRequest::post()
        .uri("/chat")
        .insert_header(("Authorization", "Basic YTpi"))
        .set_json(json!({"prompt": "hi"}))
        .send_request(&app)
        .await;
    assert_eq!(wrong_scheme.status(), 400);
    let body: serde_json::Value = test::read_body_json(wrong_scheme).await;
    assert_eq!(body["message"], "Invalid Authorization header format");
}

#[actix_web::test]
async fn test_empty_prompt_is_bad_request() {
    let app = chat_app!(default_state());
    let token = login_token!(app, "a@x.com");

    let resp = chat_request(&token, "   ").send_request(&app).await;
    assert_eq!(resp.status(), 400);

    let no_body = test::TestRequest::post()
        .uri("/chat")
        .insert_header(("Authorization", format!("Bearer {}", token)))
        .send_request(&app)
        .await;
    assert_eq!(no_body.status(), 400);
}

#[actix_web::test]
async fn test_provider_failure_is_internal_error_and_not_counted() {
    let prompts = Arc::new(MemoryStore::new());
    let mut completion = MockCompletion::new();
    completion
        .expect_complete()
        .times(1)
        .returning(|_, _| Err(ProxyError::ResponseError("upstream exploded".into())));

    let app = chat_app!(state_with(prompts.clone(), Arc::new(completion)));
    let token = login_token!(app, "a@x.com");

    let resp = chat_request(&token, "hi").send_request(&app).await;
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"message": "Internal Server Error"}));

    let today = Utc::now().date_naive();
    assert_eq!(prompts.count_by_email_and_date("a@x.com", today).await.unwrap(), 0);
}

#[actix_web::test]
async fn test_quota_exhausted_never_reaches_provider() {
    let prompts = Arc::new(MemoryStore::new());
    for i in 0..3 {
        let record = PromptRecord::new("u1".into(), "a@x.com".into(), format!("earlier {}", i));
        PromptStore::put(prompts.as_ref(), &record).await.unwrap();
    }

    let mut completion = MockCompletion::new();
    completion.expect_complete().never();

    let app = chat_app!(state_with(prompts, Arc::new(completion)));
    let token = login_token!(app, "a@x.com");

    let resp = chat_request(&token, "hi").send_request(&app).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn test_record_failure_is_internal_error() {
    let app = chat_app!(state_with(
        Arc::new(ReadOnlyPrompts(MemoryStore::new())),
        Arc::new(EchoCompletion),
    ));
    let token = login_token!(app, "a@x.com");

    let resp = chat_request(&token, "hi").send_request(&app).await;
    assert_eq!(resp.status(), 500);
}

#[actix_web::test]
async fn test_secret_failure_during_validation_is_internal_error() {
    let mut completion = MockCompletion::new();
    completion.expect_complete().never();

    let app = chat_app!(state_from(
        test_config(),
        Arc::new(MemoryStore::new()),
        Arc::new(BrokenSecrets),
        Arc::new(completion),
    ));

    let resp = chat_request(&server_token(), "hi").send_request(&app).await;
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"message": "Internal Server Error"}));
}

#[actix_web::test]
async fn test_secret_timeout_during_validation_is_internal_error() {
    let mut config = test_config();
    config.timeouts.secret_ms = 20;
    let mut completion = MockCompletion::new();
    completion.expect_complete().never();

    let app = chat_app!(state_from(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(SlowSecrets),
        Arc::new(completion),
    ));

    let resp = chat_request(&server_token(), "hi").send_request(&app).await;
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"message": "Internal Server Error"}));
}

#[actix_web::test]
async fn test_failed_count_is_internal_error_when_failing_closed() {
    let mut config = test_config();
    config.quota.fail_open = false;
    let mut completion = MockCompletion::new();
    completion.expect_complete().never();

    let app = chat_app!(state_from(
        config,
        Arc::new(UnreachablePrompts),
        Arc::new(StaticSecretProvider::new(SECRET)),
        Arc::new(completion),
    ));

    let resp = chat_request(&server_token(), "hi").send_request(&app).await;
    assert_eq!(resp.status(), 500);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"message": "Internal Server Error"}));
}

#[actix_web::test]
async fn test_failed_count_admits_request_when_failing_open() {
    let mut completion = MockCompletion::new();
    completion
        .expect_complete()
        .times(1)
        .returning(|_, _| Ok("served anyway".to_string()));

    let app = chat_app!(state_with(Arc::new(UncountablePrompts(MemoryStore::new())), Arc::new(completion)));

    let resp = chat_request(&server_token(), "hi").send_request(&app).await;
    assert_eq!(resp.status(), 200);
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["response"], "served anyway");
    assert_eq!(body["queries"], 1);
    assert_eq!(body["balance"], 2);
}
