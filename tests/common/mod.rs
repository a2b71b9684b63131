#![allow(dead_code)]

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::{header, StatusCode};
use serde_json::{json, Value};

use helpdesk_api::app::{memory_state, router, AppState};
use helpdesk_api::auth::Role;
use helpdesk_api::config::{AppConfig, StoreBackend};
use helpdesk_api::database::models::User;

pub const PASSWORD: &str = "correct-horse";

/// An in-process server on a free port, backed by the memory stores.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    pub state: AppState,
    pub client: reqwest::Client,
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig::development();
    config.database.backend = StoreBackend::Memory;
    config.security.bcrypt_cost = 4;
    config.security.session_secret = "integration-test-secret".to_string();
    config
}

impl TestServer {
    pub async fn start() -> Result<Self> {
        Self::start_with(test_config()).await
    }

    pub async fn start_with(config: AppConfig) -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let state = memory_state(config)?;
        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .context("failed to bind test listener")?;
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        let server = Self {
            port,
            base_url,
            state,
            client: reqwest::Client::new(),
        };
        server.wait_ready(Duration::from_secs(10)).await?;
        Ok(server)
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            if let Ok(resp) = self.client.get(self.url("/healthz")).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Create a user directly through the auth service.
    pub async fn seed_user(&self, email: &str, role: Role) -> Result<User> {
        Ok(self
            .state
            .auth
            .create_user(email, email, PASSWORD, role)
            .await?)
    }

    /// Log in and return the `Cookie` header value carrying the session.
    pub async fn login(&self, email: &str) -> Result<String> {
        let res = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&json!({"email": email, "password": PASSWORD}))
            .send()
            .await?;
        anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());
        session_cookie(&res).context("login response carried no session cookie")
    }

    pub async fn seed_and_login(&self, email: &str, role: Role) -> Result<(User, String)> {
        let user = self.seed_user(email, role).await?;
        let cookie = self.login(email).await?;
        Ok((user, cookie))
    }

    pub async fn get(&self, path: &str, cookie: Option<&str>) -> Result<reqwest::Response> {
        let mut req = self.client.get(self.url(path));
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        Ok(req.send().await?)
    }

    pub async fn post(&self, path: &str, cookie: Option<&str>, body: Value) -> Result<reqwest::Response> {
        let mut req = self.client.post(self.url(path)).json(&body);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        Ok(req.send().await?)
    }

    pub async fn patch(&self, path: &str, cookie: Option<&str>, body: Value) -> Result<reqwest::Response> {
        let mut req = self.client.patch(self.url(path)).json(&body);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        Ok(req.send().await?)
    }
}

/// `session=<token>` from the response's Set-Cookie headers, if any.
pub fn session_cookie(res: &reqwest::Response) -> Option<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with("session=") && pair.len() > "session=".len())
        .map(str::to_string)
}

/// The raw Set-Cookie header for the session cookie, attributes included.
pub fn raw_session_set_cookie(res: &reqwest::Response) -> Option<String> {
    res.headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find(|v| v.starts_with("session="))
        .map(str::to_string)
}
