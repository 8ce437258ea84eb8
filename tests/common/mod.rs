#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{RequestBuilder, StatusCode};
use serde_json::{json, Value};

pub const JWT_SECRET: &str = "infoline-integration-secret";

pub const REGION_BAKU: &str = "10000000-0000-4000-8000-000000000001";
pub const SECTOR_A: &str = "20000000-0000-4000-8000-000000000001";
pub const SECTOR_B: &str = "20000000-0000-4000-8000-000000000002";
pub const SCHOOL_12: &str = "30000000-0000-4000-8000-000000000001";
pub const SCHOOL_40: &str = "30000000-0000-4000-8000-000000000002";
pub const SCHOOL_7: &str = "30000000-0000-4000-8000-000000000003";
pub const CATEGORY_STUDENTS: &str = "40000000-0000-4000-8000-000000000001";
pub const CATEGORY_STAFF: &str = "40000000-0000-4000-8000-000000000002";

pub const SUPERADMIN: &str = "50000000-0000-4000-8000-000000000001";
pub const REGION_ADMIN: &str = "50000000-0000-4000-8000-000000000002";
pub const SECTOR_A_ADMIN: &str = "50000000-0000-4000-8000-000000000003";
pub const SCHOOL_12_ADMIN: &str = "50000000-0000-4000-8000-000000000004";
pub const SCHOOL_40_ADMIN: &str = "50000000-0000-4000-8000-000000000005";
/// Signed-in user without a profile row
pub const NO_PROFILE: &str = "50000000-0000-4000-8000-000000000099";

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Seeded memory store, so no database is needed
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_infoline-api"));
        cmd.arg("serve")
            .env("INFOLINE_API_PORT", port.to_string())
            .env("INFOLINE_STORE", "memory")
            .env("INFOLINE_SEED", concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/seed.json"))
            .env("JWT_SECRET", JWT_SECRET)
            .env("APP_ENV", "development")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;
        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

/// Bearer token for an auth user id, signed like the server expects
pub fn token_for(user_id: &str) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = json!({ "sub": user_id, "iat": now, "exp": now + 3600 });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(JWT_SECRET.as_bytes()))
        .expect("token encodes")
}

/// Authenticated client bound to one user
pub struct Session {
    pub server: &'static TestServer,
    client: reqwest::Client,
    token: String,
}

impl Session {
    pub async fn as_user(user_id: &str) -> Result<Self> {
        Ok(Self {
            server: ensure_server().await?,
            client: reqwest::Client::new(),
            token: token_for(user_id),
        })
    }

    fn auth(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(&self.token)
    }

    pub async fn get(&self, path: &str) -> Result<(StatusCode, Value)> {
        let res = self.auth(self.client.get(self.server.url(path))).send().await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn post(&self, path: &str, body: Value) -> Result<(StatusCode, Value)> {
        let res = self.auth(self.client.post(self.server.url(path))).json(&body).send().await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn post_bytes(&self, path: &str, body: Vec<u8>) -> Result<(StatusCode, Value)> {
        let res = self.auth(self.client.post(self.server.url(path))).body(body).send().await?;
        Ok((res.status(), res.json().await?))
    }

    pub async fn get_bytes(&self, path: &str) -> Result<(StatusCode, Vec<u8>)> {
        let res = self.auth(self.client.get(self.server.url(path))).send().await?;
        Ok((res.status(), res.bytes().await?.to_vec()))
    }
}
