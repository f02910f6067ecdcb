#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use beacon::{
    api,
    config::Settings,
    email::RecordingEmailSender,
    payments::{FakeGateway, PaymentGateway},
    service::ServiceContext,
};
use serde_json::{json, Value};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tower::ServiceExt;

pub const GATEWAY_SECRET: &str = "fake_key_secret";
pub const ADMIN_EMAIL: &str = "admin@beacon.test";
pub const ADMIN_PASSWORD: &str = "admin-pass";

/// One connection, kept for the life of the pool, so the in-memory database survives.
pub async fn test_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    Ok(pool)
}

pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub cookie: Option<String>,
}

pub struct TestApp {
    pub router: Router,
    pub pool: SqlitePool,
    pub email: Arc<RecordingEmailSender>,
    pub gateway: Arc<FakeGateway>,
    pub services: Arc<ServiceContext>,
}

impl TestApp {
    pub async fn new() -> anyhow::Result<Self> {
        Self::build(RecordingEmailSender::new(), FakeGateway::new(GATEWAY_SECRET), true).await
    }

    /// Same wiring, but no payment gateway configured.
    pub async fn without_gateway() -> anyhow::Result<Self> {
        Self::build(RecordingEmailSender::new(), FakeGateway::new(GATEWAY_SECRET), false).await
    }

    /// The mail relay rejects every message.
    pub async fn with_failing_email() -> anyhow::Result<Self> {
        Self::build(RecordingEmailSender::failing(), FakeGateway::new(GATEWAY_SECRET), true).await
    }

    /// The gateway errors on every order creation.
    pub async fn with_unreachable_gateway() -> anyhow::Result<Self> {
        Self::build(RecordingEmailSender::new(), FakeGateway::unreachable(GATEWAY_SECRET), true).await
    }

    async fn build(
        email: RecordingEmailSender,
        gateway: FakeGateway,
        with_gateway: bool,
    ) -> anyhow::Result<Self> {
        let pool = test_pool().await?;

        let mut settings = Settings::default();
        settings.auth.admin_email = Some(ADMIN_EMAIL.to_string());
        settings.auth.admin_password = Some(ADMIN_PASSWORD.to_string());
        settings.server.uploads_dir = std::env::temp_dir()
            .join(format!("beacon-test-{}", uuid::Uuid::new_v4()))
            .to_string_lossy()
            .into_owned();
        let settings = Arc::new(settings);

        let email = Arc::new(email);
        let gateway = Arc::new(gateway);
        let configured: Option<Arc<dyn PaymentGateway>> = if with_gateway {
            Some(gateway.clone())
        } else {
            None
        };

        let services = Arc::new(ServiceContext::new(
            pool.clone(),
            &settings,
            email.clone(),
            configured,
        ));
        let router = api::create_app(services.clone(), settings);

        Ok(Self { router, pool, email, gateway, services })
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        cookie: Option<&str>,
    ) -> anyhow::Result<TestResponse> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(';').next())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };

        Ok(TestResponse { status, body, cookie })
    }

    pub async fn get(&self, uri: &str, cookie: &str) -> anyhow::Result<TestResponse> {
        self.send(Method::GET, uri, None, Some(cookie)).await
    }

    pub async fn post(&self, uri: &str, body: Value, cookie: Option<&str>) -> anyhow::Result<TestResponse> {
        self.send(Method::POST, uri, Some(body), cookie).await
    }

    /// Signs up, verifies with the mailed code and logs in. Returns the session cookie.
    pub async fn verified_user(&self, email: &str) -> anyhow::Result<String> {
        let res = self
            .post(
                "/auth/signup",
                json!({"name": "Asha Rao", "email": email, "password": "hunter22", "sport": "Football"}),
                None,
            )
            .await?;
        anyhow::ensure!(res.status == StatusCode::OK, "signup failed: {}", res.body);

        let code = self
            .email
            .last_code_for(email)
            .await
            .ok_or_else(|| anyhow::anyhow!("no code sent to {}", email))?;

        let res = self
            .post("/auth/verify-otp", json!({"email": email, "otp": code}), None)
            .await?;
        anyhow::ensure!(res.status == StatusCode::OK, "verify failed: {}", res.body);

        self.login(email, "hunter22").await
    }

    pub async fn login(&self, email: &str, password: &str) -> anyhow::Result<String> {
        let res = self
            .post("/auth/login", json!({"email": email, "password": password}), None)
            .await?;
        anyhow::ensure!(res.status == StatusCode::OK, "login failed: {}", res.body);
        res.cookie.ok_or_else(|| anyhow::anyhow!("login set no cookie"))
    }
}

pub fn personal_info() -> Value {
    json!({
        "fullName": "Asha Rao",
        "dob": "2010-04-12",
        "gender": "female",
        "phone": "9876543210",
        "email": "asha@example.com",
        "address": "12 MG Road, Pune",
        "parentName": "Ravi Rao"
    })
}

pub fn academic_info() -> Value {
    json!({"isStudying": true, "schoolName": "City High", "grade": "9"})
}

pub fn sports_info() -> Value {
    json!([{
        "sportType": "Football",
        "position": "Forward",
        "clubName": "Pune FC Juniors",
        "level": "State",
        "experience": "4"
    }])
}

pub fn additional_info() -> Value {
    json!({"fatherIncome": 120000, "motherIncome": "30000"})
}

/// Saves every required section through the API.
pub async fn fill_application(app: &TestApp, cookie: &str) -> anyhow::Result<()> {
    for (section, data) in [
        ("personalInfo", personal_info()),
        ("academicInfo", academic_info()),
        ("sportsInfo", sports_info()),
        ("additionalInfo", additional_info()),
    ] {
        let res = app
            .post(
                "/user/application/save-section",
                json!({"section": section, "data": data}),
                Some(cookie),
            )
            .await?;
        anyhow::ensure!(res.status == StatusCode::OK, "saving {} failed: {}", section, res.body);
    }
    Ok(())
}
