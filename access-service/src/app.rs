use std::sync::Arc;

use axum::extract::{FromRef, State};
use axum::http::{header::CONTENT_TYPE, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch, post};
use axum::Router;
use common_auth::JwtVerifier;
use common_cache::{CartTotals, ListingCache, WriteHooks};
use common_observability::AccessMetrics;
use tracing::error;

use crate::gate_handlers::{authorize_request, record_write_event};
use crate::promotion::MembershipService;
use crate::store::{IdentityStore, MembershipStore, TenantStore};
use crate::tenant_handlers::{
    approve_tenant, create_tenant, delete_tenant, list_approved_tenants, list_pending_tenants, list_tenants,
    reject_tenant,
};
use crate::user_handlers::{
    make_platform_agent, make_vendor_agent, me, register, remove_platform_agent, remove_vendor_agent,
};

#[derive(Clone)]
pub struct AppState {
    pub identities: Arc<dyn IdentityStore>,
    pub tenants: Arc<dyn TenantStore>,
    pub memberships: Arc<dyn MembershipStore>,
    pub promotions: MembershipService,
    pub hooks: WriteHooks,
    pub jwt_verifier: Arc<JwtVerifier>,
    pub metrics: Arc<AccessMetrics>,
}

impl AppState {
    /// Wires every seam to one store implementation.
    pub fn from_store<S>(store: Arc<S>, cache: ListingCache, jwt_verifier: Arc<JwtVerifier>, metrics: Arc<AccessMetrics>) -> Self
    where
        S: IdentityStore + TenantStore + MembershipStore + CartTotals + 'static,
    {
        let memberships: Arc<dyn MembershipStore> = store.clone();
        let promotions = MembershipService::new(memberships.clone()).with_metrics(metrics.clone());
        let hooks = WriteHooks::new(cache.with_metrics(metrics.clone()), store.clone());
        Self {
            identities: store.clone(),
            tenants: store,
            memberships,
            promotions,
            hooks,
            jwt_verifier,
            metrics,
        }
    }

    pub fn cache(&self) -> &ListingCache {
        self.hooks.cache()
    }
}

impl FromRef<AppState> for Arc<JwtVerifier> {
    fn from_ref(state: &AppState) -> Self {
        state.jwt_verifier.clone()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metrics", get(render_metrics))
        .route("/register", post(register))
        .route("/me", get(me))
        .route("/vendors", post(create_tenant).get(list_tenants))
        .route("/vendors/approved", get(list_approved_tenants))
        .route("/vendors/pending", get(list_pending_tenants))
        .route("/vendors/:slug", axum::routing::delete(delete_tenant))
        .route("/vendors/:slug/approve", patch(approve_tenant))
        .route("/vendors/:slug/reject", patch(reject_tenant))
        .route("/users/:id/make-platform-agent", patch(make_platform_agent))
        .route("/users/:id/remove-platform-agent", patch(remove_platform_agent))
        .route("/users/:id/make-vendor-agent", patch(make_vendor_agent))
        .route("/users/:id/remove-vendor-agent", patch(remove_vendor_agent))
        .route("/authorize", post(authorize_request))
        .route("/internal/write-events", post(record_write_event))
        .with_state(state)
}

async fn render_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => {
            let mut resp = body.into_response();
            resp.headers_mut()
                .insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; version=0.0.4"));
            resp
        }
        Err(err) => {
            error!(error = %err, "metrics_encode_failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
