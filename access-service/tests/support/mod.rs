#![allow(dead_code)]

use std::sync::{Arc, OnceLock};

use access_service::store::MemoryStore;
use access_service::{build_router, AppState};
use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use common_auth::{JwtConfig, JwtVerifier};
use common_cache::{InMemoryCacheBackend, ListingCache};
use common_observability::AccessMetrics;
use common_security::{Membership, Principal, Role, Tenant};
use http_body_util::BodyExt;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rsa::pkcs1::{EncodeRsaPrivateKey, EncodeRsaPublicKey, LineEnding};
use rsa::rand_core::OsRng;
use rsa::RsaPrivateKey;
use serde::Serialize;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

pub const ISSUER: &str = "https://auth.marketplace.test";
pub const AUDIENCE: &str = "marketplace";
pub const KID: &str = "access-test";

struct Keys {
    encoding: EncodingKey,
    public_pem: String,
}

fn keys() -> &'static Keys {
    static KEYS: OnceLock<Keys> = OnceLock::new();
    KEYS.get_or_init(|| {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048).expect("key generation");
        let private_pem = private_key.to_pkcs1_pem(LineEnding::LF).expect("private pem");
        let public_pem = private_key.to_public_key().to_pkcs1_pem(LineEnding::LF).expect("public pem");
        let encoding = EncodingKey::from_rsa_pem(private_pem.as_bytes()).expect("encoding key");
        Keys { encoding, public_pem }
    })
}

#[derive(Serialize)]
struct TokenClaims {
    sub: String,
    iss: &'static str,
    aud: &'static str,
    exp: i64,
    iat: i64,
}

pub fn token_for(principal_id: Uuid) -> String {
    let now = Utc::now().timestamp();
    let claims = TokenClaims { sub: principal_id.to_string(), iss: ISSUER, aud: AUDIENCE, exp: now + 600, iat: now };
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(KID.to_string());
    encode(&header, &claims, &keys().encoding).expect("sign token")
}

pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub backend: Arc<InMemoryCacheBackend>,
    pub metrics: Arc<AccessMetrics>,
    pub state: AppState,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(MemoryStore::new());
        let backend = Arc::new(InMemoryCacheBackend::new());
        let metrics = Arc::new(AccessMetrics::new().expect("metrics"));
        let verifier = JwtVerifier::new(JwtConfig::new(ISSUER, AUDIENCE))
            .with_rsa_pem(KID, keys().public_pem.as_bytes())
            .expect("verifier");
        let state = AppState::from_store(
            store.clone(),
            ListingCache::new(backend.clone()),
            Arc::new(verifier),
            metrics.clone(),
        );
        Self { store, backend, metrics, state }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    pub async fn principal(&self) -> Uuid {
        self.principal_with(false).await
    }

    pub async fn principal_with(&self, elevated: bool) -> Uuid {
        let id = Uuid::new_v4();
        self.store.add_principal(Principal { id, active: true, elevated }).await;
        id
    }

    pub async fn tenant(&self, slug: &str, approved: bool) -> Tenant {
        let tenant = Tenant {
            id: Uuid::new_v4(),
            slug: slug.to_string(),
            company_name: slug.to_uppercase(),
            approved,
            active: true,
        };
        self.store.add_tenant(tenant.clone()).await;
        tenant
    }

    pub async fn grant(&self, principal_id: Uuid, tenant: Option<&Tenant>, role: Role) -> Membership {
        self.store
            .add_membership(Membership::new(principal_id, tenant.map(|tenant| tenant.id), role))
            .await
            .expect("membership")
    }

    /// A principal with the platform admin membership.
    pub async fn platform_admin(&self) -> Uuid {
        let id = self.principal().await;
        self.grant(id, None, Role::PlatformAdmin).await;
        id
    }

    /// A principal owning `tenant`.
    pub async fn vendor_admin(&self, tenant: &Tenant) -> Uuid {
        let id = self.principal().await;
        self.grant(id, Some(tenant), Role::VendorAdmin).await;
        id
    }

    pub async fn send(&self, request: Request<Body>) -> Reply {
        let response = self.router().oneshot(request).await.expect("router response");
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        Reply { status, headers, body }
    }

    pub async fn call(&self, method: Method, uri: &str, as_principal: Option<Uuid>, body: Option<Value>) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(principal_id) = as_principal {
            builder = builder.header("authorization", format!("Bearer {}", token_for(principal_id)));
        }
        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };
        self.send(request).await
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn error_code(&self) -> Option<&str> {
        self.headers.get("X-Error-Code").and_then(|value| value.to_str().ok())
    }
}
