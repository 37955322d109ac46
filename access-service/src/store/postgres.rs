use std::str::FromStr;

use anyhow::Context;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use common_cache::CartTotals;
use common_money::{cart_total, LineItem};
use common_security::{Membership, MembershipGrant, Principal, Role, SecurityError, Tenant};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{PgPool, Row};
use tracing::error;
use uuid::Uuid;

use super::{
    already_registered, slug_taken, IdentityStore, MembershipStore, NewTenant, StoreResult, TenantFilter, TenantStore,
};
use crate::promotion::{self, TransitionRequest};

const GRANTS_SQL: &str = "SELECT m.id, m.principal_id, m.tenant_id, m.role, \
        v.slug, v.company_name, v.approved, v.active \
     FROM memberships m \
     LEFT JOIN vendors v ON v.id = m.tenant_id \
     WHERE m.principal_id = $1 \
     ORDER BY m.tenant_id NULLS FIRST";

const TENANT_COLUMNS: &str = "id, slug, company_name, approved, active";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn db_error(err: sqlx::Error) -> SecurityError {
    error!(error = %err, "access_store_query_failed");
    SecurityError::internal(err)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

fn tenant_from_row(row: &PgRow) -> Result<Tenant, sqlx::Error> {
    Ok(Tenant {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        company_name: row.try_get("company_name")?,
        approved: row.try_get("approved")?,
        active: row.try_get("active")?,
    })
}

fn grant_from_row(row: &PgRow) -> StoreResult<MembershipGrant> {
    let role_raw: String = row.try_get("role").map_err(db_error)?;
    let role = Role::from_str(&role_raw)
        .map_err(|_| SecurityError::internal(format!("unknown role '{role_raw}' in memberships")))?;
    let tenant_id: Option<Uuid> = row.try_get("tenant_id").map_err(db_error)?;
    let membership = Membership {
        id: row.try_get("id").map_err(db_error)?,
        principal_id: row.try_get("principal_id").map_err(db_error)?,
        tenant_id,
        role,
    };
    let Some(tenant_id) = tenant_id else {
        return Ok(MembershipGrant::platform(membership));
    };
    let tenant = Tenant {
        id: tenant_id,
        slug: row.try_get("slug").map_err(db_error)?,
        company_name: row.try_get("company_name").map_err(db_error)?,
        approved: row.try_get("approved").map_err(db_error)?,
        active: row.try_get("active").map_err(db_error)?,
    };
    Ok(MembershipGrant::scoped(membership, tenant))
}

/// `lock` takes row locks on the principal's memberships for the rest of the
/// enclosing transaction.
async fn load_grants(conn: &mut PgConnection, principal_id: Uuid, lock: bool) -> StoreResult<Vec<MembershipGrant>> {
    let sql = if lock { format!("{GRANTS_SQL} FOR UPDATE OF m") } else { GRANTS_SQL.to_string() };
    let rows = sqlx::query(&sql)
        .bind(principal_id)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_error)?;
    rows.iter().map(grant_from_row).collect()
}

#[async_trait]
impl IdentityStore for PgStore {
    async fn principal(&self, id: Uuid) -> StoreResult<Option<Principal>> {
        let row = sqlx::query("SELECT id, active, elevated FROM principals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.map(|row| -> Result<Principal, sqlx::Error> {
            Ok(Principal {
                id: row.try_get("id")?,
                active: row.try_get("active")?,
                elevated: row.try_get("elevated")?,
            })
        })
        .transpose()
        .map_err(db_error)
    }
}

#[async_trait]
impl TenantStore for PgStore {
    async fn tenant_by_slug(&self, slug: &str) -> StoreResult<Option<Tenant>> {
        let row = sqlx::query(&format!("SELECT {TENANT_COLUMNS} FROM vendors WHERE slug = $1"))
            .bind(slug)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;
        row.as_ref().map(tenant_from_row).transpose().map_err(db_error)
    }

    async fn list_tenants(&self, filter: TenantFilter) -> StoreResult<Vec<Tenant>> {
        let clause = match filter {
            TenantFilter::All => "",
            TenantFilter::Approved => "WHERE approved = TRUE",
            TenantFilter::Pending => "WHERE approved = FALSE",
        };
        let rows = sqlx::query(&format!(
            "SELECT {TENANT_COLUMNS} FROM vendors {clause} ORDER BY company_name, slug"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        rows.iter()
            .map(tenant_from_row)
            .collect::<Result<Vec<Tenant>, sqlx::Error>>()
            .map_err(db_error)
    }

    async fn create_tenant(&self, owner_id: Uuid, new: NewTenant) -> StoreResult<(Tenant, Membership)> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let inserted = sqlx::query(&format!(
            "INSERT INTO vendors (id, slug, company_name, approved, active) VALUES ($1, $2, $3, FALSE, TRUE) \
             RETURNING {TENANT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(&new.slug)
        .bind(&new.company_name)
        .fetch_one(&mut *tx)
        .await;
        let row = match inserted {
            Ok(row) => row,
            Err(err) if is_unique_violation(&err) => return Err(slug_taken(&new.slug)),
            Err(err) => return Err(db_error(err)),
        };
        let tenant = tenant_from_row(&row).map_err(db_error)?;

        let membership = Membership::new(owner_id, Some(tenant.id), Role::VendorAdmin);
        sqlx::query("INSERT INTO memberships (id, principal_id, tenant_id, role) VALUES ($1, $2, $3, $4)")
            .bind(membership.id)
            .bind(membership.principal_id)
            .bind(membership.tenant_id)
            .bind(membership.role.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;
        Ok((tenant, membership))
    }

    async fn set_approved(&self, slug: &str, approved: bool) -> StoreResult<Option<Tenant>> {
        let row = sqlx::query(&format!(
            "UPDATE vendors SET approved = $1 WHERE slug = $2 RETURNING {TENANT_COLUMNS}"
        ))
        .bind(approved)
        .bind(slug)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        row.as_ref().map(tenant_from_row).transpose().map_err(db_error)
    }

    async fn delete_tenant(&self, slug: &str) -> StoreResult<bool> {
        // memberships, products and carts cascade
        let result = sqlx::query("DELETE FROM vendors WHERE slug = $1")
            .bind(slug)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl MembershipStore for PgStore {
    async fn grants_for(&self, principal_id: Uuid) -> StoreResult<Vec<MembershipGrant>> {
        let mut conn = self.pool.acquire().await.map_err(db_error)?;
        load_grants(&mut conn, principal_id, false).await
    }

    async fn register(&self, principal_id: Uuid) -> StoreResult<Membership> {
        let membership = Membership::new(principal_id, None, Role::User);
        let inserted = sqlx::query("INSERT INTO memberships (id, principal_id, tenant_id, role) VALUES ($1, $2, NULL, $3)")
            .bind(membership.id)
            .bind(principal_id)
            .bind(membership.role.as_str())
            .execute(&self.pool)
            .await;
        match inserted {
            Ok(_) => Ok(membership),
            Err(err) if is_unique_violation(&err) => Err(already_registered()),
            Err(err) => Err(db_error(err)),
        }
    }

    async fn apply_transition(&self, request: &TransitionRequest) -> StoreResult<Membership> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        // Target rows stay locked until commit; a concurrent transition on the
        // same target waits here and then plans against the committed state.
        let target = load_grants(&mut tx, request.target_id, true).await?;
        let actor = load_grants(&mut tx, request.actor_id, false).await?;
        let updated = promotion::plan(request, &actor, &target)?;

        let result = sqlx::query("UPDATE memberships SET role = $1, tenant_id = $2, updated_at = NOW() WHERE id = $3")
            .bind(updated.role.as_str())
            .bind(updated.tenant_id)
            .bind(updated.id)
            .execute(&mut *tx)
            .await;
        match result {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                return Err(SecurityError::invalid("User already holds a membership in that scope."))
            }
            Err(err) => return Err(db_error(err)),
        }
        tx.commit().await.map_err(db_error)?;
        Ok(updated)
    }
}

#[async_trait]
impl CartTotals for PgStore {
    async fn recompute_total(&self, tenant_slug: &str, cart_id: Uuid) -> anyhow::Result<Option<BigDecimal>> {
        let mut tx = self.pool.begin().await.context("Failed to begin cart total transaction")?;
        let cart = sqlx::query(
            "SELECT c.id FROM carts c JOIN vendors v ON v.id = c.vendor_id \
             WHERE c.id = $1 AND v.slug = $2 FOR UPDATE OF c",
        )
        .bind(cart_id)
        .bind(tenant_slug)
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to lock cart")?;
        if cart.is_none() {
            return Ok(None);
        }

        let rows = sqlx::query(
            "SELECT p.price, p.discount, ci.quantity \
             FROM cart_items ci JOIN products p ON p.id = ci.product_id \
             WHERE ci.cart_id = $1",
        )
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await
        .context("Failed to load cart items")?;

        let lines = rows
            .iter()
            .map(|row| -> anyhow::Result<LineItem> {
                let quantity: i32 = row.try_get("quantity")?;
                Ok(LineItem {
                    price: row.try_get("price")?,
                    discount_pct: row.try_get("discount")?,
                    quantity: u32::try_from(quantity).context("negative cart item quantity")?,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        let total = cart_total(&lines);

        sqlx::query("UPDATE carts SET total = $1, updated_at = NOW() WHERE id = $2")
            .bind(&total)
            .bind(cart_id)
            .execute(&mut *tx)
            .await
            .context("Failed to store cart total")?;
        tx.commit().await.context("Failed to commit cart total")?;
        Ok(Some(total))
    }
}
