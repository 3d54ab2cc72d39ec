use chrono::{DateTime, Utc};
use rusqlite::{Connection, TransactionBehavior, params};
use uuid::Uuid;

use crate::error::{AppError, ErrorCode, Result};
use crate::models::*;
use crate::util::{generate_brand_secret, hash_secret};

use super::from_row::{
    ACTIVATION_COLS, AUDIT_LOG_COLS, BRAND_COLS, LICENSE_COLS, LICENSE_FROM, LICENSE_KEY_COLS,
    LICENSE_KEY_FROM, PRODUCT_COLS, now_micros, query_all, query_one, to_micros,
};

fn gen_id() -> String {
    Uuid::new_v4().to_string()
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

// ============ Brands ============

/// Create a brand and its API key. The full key (`slug:secret`) is returned
/// once; only the secret's hash is stored.
pub fn create_brand(conn: &Connection, input: &CreateBrand) -> Result<(Brand, String)> {
    let id = gen_id();
    let now = now_micros();
    let secret = generate_brand_secret();
    let api_key_hash = hash_secret(&secret);

    conn.execute(
        "INSERT INTO brands (id, slug, name, api_key_hash, is_active, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5)",
        params![&id, &input.slug, &input.name, &api_key_hash, to_micros(now)],
    )?;

    let api_key = format!("{}:{}", input.slug, secret);
    Ok((
        Brand {
            id,
            slug: input.slug.clone(),
            name: input.name.clone(),
            api_key_hash,
            is_active: true,
            created_at: now,
        },
        api_key,
    ))
}

pub fn get_brand_by_id(conn: &Connection, id: &str) -> Result<Option<Brand>> {
    query_one(
        conn,
        &format!("SELECT {} FROM brands WHERE id = ?1", BRAND_COLS),
        params![id],
    )
}

pub fn get_brand_by_slug(conn: &Connection, slug: &str) -> Result<Option<Brand>> {
    query_one(
        conn,
        &format!("SELECT {} FROM brands WHERE slug = ?1", BRAND_COLS),
        params![slug],
    )
}

pub fn set_brand_active(conn: &Connection, id: &str, is_active: bool) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE brands SET is_active = ?1 WHERE id = ?2",
        params![is_active, id],
    )?;
    Ok(updated > 0)
}

// ============ Products ============

pub fn create_product(conn: &Connection, brand_id: &str, input: &CreateProduct) -> Result<Product> {
    let id = gen_id();
    let now = now_micros();

    conn.execute(
        "INSERT INTO products (id, brand_id, slug, name, is_active, default_max_seats, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6)",
        params![
            &id,
            brand_id,
            &input.slug,
            &input.name,
            input.default_max_seats,
            to_micros(now)
        ],
    )?;

    Ok(Product {
        id,
        brand_id: brand_id.to_string(),
        slug: input.slug.clone(),
        name: input.name.clone(),
        is_active: true,
        default_max_seats: input.default_max_seats,
        created_at: now,
    })
}

pub fn get_product_by_id(conn: &Connection, id: &str) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!("SELECT {} FROM products WHERE id = ?1", PRODUCT_COLS),
        params![id],
    )
}

pub fn get_product_by_brand_and_slug(
    conn: &Connection,
    brand_id: &str,
    slug: &str,
) -> Result<Option<Product>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM products WHERE brand_id = ?1 AND slug = ?2",
            PRODUCT_COLS
        ),
        params![brand_id, slug],
    )
}

pub fn set_product_active(conn: &Connection, id: &str, is_active: bool) -> Result<bool> {
    let updated = conn.execute(
        "UPDATE products SET is_active = ?1 WHERE id = ?2",
        params![is_active, id],
    )?;
    Ok(updated > 0)
}

// ============ License Keys ============

pub fn create_license_key(conn: &Connection, input: &NewLicenseKey) -> Result<LicenseKey> {
    let id = gen_id();
    let now = now_micros();

    conn.execute(
        "INSERT INTO license_keys (id, key, brand_id, customer_email, external_reference, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            &id,
            &input.key,
            &input.brand_id,
            &input.customer_email,
            &input.external_reference,
            to_micros(now)
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::conflict(ErrorCode::KeyExists, "License key already exists")
        } else {
            e.into()
        }
    })?;

    get_license_key_by_id(conn, &id)?
        .ok_or_else(|| AppError::Internal("license key vanished after insert".into()))
}

pub fn get_license_key_by_key(conn: &Connection, key: &str) -> Result<Option<LicenseKey>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM {} WHERE k.key = ?1",
            LICENSE_KEY_COLS, LICENSE_KEY_FROM
        ),
        params![key],
    )
}

pub fn get_license_key_by_id(conn: &Connection, id: &str) -> Result<Option<LicenseKey>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM {} WHERE k.id = ?1",
            LICENSE_KEY_COLS, LICENSE_KEY_FROM
        ),
        params![id],
    )
}

pub fn get_license_key_by_brand_and_key(
    conn: &Connection,
    brand_id: &str,
    key: &str,
) -> Result<Option<LicenseKey>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM {} WHERE k.brand_id = ?1 AND k.key = ?2",
            LICENSE_KEY_COLS, LICENSE_KEY_FROM
        ),
        params![brand_id, key],
    )
}

/// Case-insensitive email lookup, newest first.
pub fn list_license_keys_by_email(
    conn: &Connection,
    email: &str,
    brand_id: Option<&str>,
) -> Result<Vec<LicenseKey>> {
    let email = email.trim();
    match brand_id {
        Some(brand_id) => query_all(
            conn,
            &format!(
                "SELECT {} FROM {} WHERE k.customer_email = ?1 COLLATE NOCASE AND k.brand_id = ?2
                 ORDER BY k.created_at DESC",
                LICENSE_KEY_COLS, LICENSE_KEY_FROM
            ),
            params![email, brand_id],
        ),
        None => query_all(
            conn,
            &format!(
                "SELECT {} FROM {} WHERE k.customer_email = ?1 COLLATE NOCASE
                 ORDER BY k.created_at DESC",
                LICENSE_KEY_COLS, LICENSE_KEY_FROM
            ),
            params![email],
        ),
    }
}

// ============ Licenses ============

pub fn create_license(conn: &Connection, input: &NewLicense) -> Result<License> {
    let id = gen_id();
    let now = to_micros(now_micros());

    conn.execute(
        "INSERT INTO licenses (id, license_key_id, product_id, status, expires_at, max_seats, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            &id,
            &input.license_key_id,
            &input.product_id,
            LicenseStatus::Valid.as_ref(),
            input.expires_at.map(to_micros),
            input.max_seats,
            now,
            now
        ],
    )
    .map_err(|e| {
        if is_unique_violation(&e) {
            AppError::conflict(
                ErrorCode::LicenseExists,
                "A license for this product already exists on this key",
            )
        } else {
            e.into()
        }
    })?;

    get_license_by_id(conn, &id)?
        .ok_or_else(|| AppError::Internal("license vanished after insert".into()))
}

pub fn get_license_by_id(conn: &Connection, id: &str) -> Result<Option<License>> {
    query_one(
        conn,
        &format!("SELECT {} FROM {} WHERE l.id = ?1", LICENSE_COLS, LICENSE_FROM),
        params![id],
    )
}

pub fn get_license_by_key_and_product(
    conn: &Connection,
    license_key_id: &str,
    product_id: &str,
) -> Result<Option<License>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM {} WHERE l.license_key_id = ?1 AND l.product_id = ?2",
            LICENSE_COLS, LICENSE_FROM
        ),
        params![license_key_id, product_id],
    )
}

pub fn list_licenses_by_license_key(
    conn: &Connection,
    license_key_id: &str,
) -> Result<Vec<License>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM {} WHERE l.license_key_id = ?1 ORDER BY l.created_at, p.slug",
            LICENSE_COLS, LICENSE_FROM
        ),
        params![license_key_id],
    )
}

/// Compare-and-set the status: only a license still in `from` is updated.
/// `None` means the license is missing or its status has since changed.
pub fn update_license_status(
    conn: &Connection,
    id: &str,
    from: LicenseStatus,
    to: LicenseStatus,
) -> Result<Option<License>> {
    let updated = conn.execute(
        "UPDATE licenses SET status = ?1, updated_at = ?2 WHERE id = ?3 AND status = ?4",
        params![to.as_ref(), to_micros(now_micros()), id, from.as_ref()],
    )?;
    if updated == 0 {
        return Ok(None);
    }
    get_license_by_id(conn, id)
}

/// Same compare-and-set as [`update_license_status`], also replacing the
/// expiration.
pub fn renew_license(
    conn: &Connection,
    id: &str,
    from: LicenseStatus,
    expires_at: Option<DateTime<Utc>>,
    to: LicenseStatus,
) -> Result<Option<License>> {
    let updated = conn.execute(
        "UPDATE licenses SET status = ?1, expires_at = ?2, updated_at = ?3
         WHERE id = ?4 AND status = ?5",
        params![
            to.as_ref(),
            expires_at.map(to_micros),
            to_micros(now_micros()),
            id,
            from.as_ref()
        ],
    )?;
    if updated == 0 {
        return Ok(None);
    }
    get_license_by_id(conn, id)
}

// ============ Activations ============

fn get_active_activation_in(
    conn: &Connection,
    license_id: &str,
    instance_id: &str,
) -> Result<Option<Activation>> {
    query_one(
        conn,
        &format!(
            "SELECT {} FROM activations WHERE license_id = ?1 AND instance_id = ?2 AND is_active = 1",
            ACTIVATION_COLS
        ),
        params![license_id, instance_id],
    )
}

/// Atomically take a seat on a license for an instance.
///
/// Runs in an IMMEDIATE transaction so the write lock is held from the first
/// read: the active-instance lookup, the seat count and the insert cannot
/// interleave with another activation. The partial unique index on
/// `(license_id, instance_id) WHERE is_active = 1` backs the per-instance
/// invariant at the storage level as well.
pub fn acquire_activation_atomic(
    conn: &mut Connection,
    input: &NewActivation,
    max_seats: Option<i64>,
) -> Result<ActivationAcquisition> {
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if let Some(existing) = get_active_activation_in(&tx, &input.license_id, &input.instance_id)? {
        return Ok(ActivationAcquisition::Existing(existing));
    }

    let used_seats = count_active_activations(&tx, &input.license_id)?;
    if let Some(max) = max_seats.filter(|&max| used_seats >= max) {
        // Dropping the transaction rolls it back
        return Ok(ActivationAcquisition::SeatsExhausted {
            max_seats: max,
            used_seats,
        });
    }

    let id = gen_id();
    let now = now_micros();
    tx.execute(
        "INSERT INTO activations (id, license_id, instance_id, instance_name, is_active, activated_at, ip_address, user_agent)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7)",
        params![
            &id,
            &input.license_id,
            &input.instance_id,
            &input.instance_name,
            to_micros(now),
            &input.ip_address,
            &input.user_agent
        ],
    )?;
    tx.commit()?;

    Ok(ActivationAcquisition::Created(Activation {
        id,
        license_id: input.license_id.clone(),
        instance_id: input.instance_id.clone(),
        instance_name: input.instance_name.clone(),
        is_active: true,
        activated_at: now,
        deactivated_at: None,
        ip_address: input.ip_address.clone(),
        user_agent: input.user_agent.clone(),
    }))
}

pub fn get_active_activation(
    conn: &Connection,
    license_id: &str,
    instance_id: &str,
) -> Result<Option<Activation>> {
    get_active_activation_in(conn, license_id, instance_id)
}

pub fn count_active_activations(conn: &Connection, license_id: &str) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM activations WHERE license_id = ?1 AND is_active = 1",
        params![license_id],
        |row| row.get(0),
    )
    .map_err(Into::into)
}

/// Soft-deactivate. Only an active row is touched, so a concurrent second
/// deactivation of the same activation sees zero rows updated.
pub fn deactivate_activation(conn: &Connection, id: &str) -> Result<Option<Activation>> {
    let updated = conn.execute(
        "UPDATE activations SET is_active = 0, deactivated_at = ?1 WHERE id = ?2 AND is_active = 1",
        params![to_micros(now_micros()), id],
    )?;
    if updated == 0 {
        return Ok(None);
    }
    query_one(
        conn,
        &format!("SELECT {} FROM activations WHERE id = ?1", ACTIVATION_COLS),
        params![id],
    )
}

pub fn list_activations_for_license(conn: &Connection, license_id: &str) -> Result<Vec<Activation>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM activations WHERE license_id = ?1 ORDER BY activated_at DESC",
            ACTIVATION_COLS
        ),
        params![license_id],
    )
}

// ============ Audit Logs ============

pub fn create_audit_log(conn: &Connection, enabled: bool, entry: &NewAuditLog) -> Result<AuditLog> {
    let log = AuditLog {
        id: gen_id(),
        action: entry.action,
        actor_type: entry.actor_type,
        actor_id: entry.actor_id.clone(),
        license_id: entry.license_id.clone(),
        license_key_id: entry.license_key_id.clone(),
        details: entry.details.clone(),
        ip_address: entry.ip_address.clone(),
        created_at: now_micros(),
    };

    // Skip database insert if audit logging is disabled
    if !enabled {
        return Ok(log);
    }

    conn.execute(
        "INSERT INTO audit_logs (id, action, actor_type, actor_id, license_id, license_key_id, details, ip_address, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            &log.id,
            log.action.as_ref(),
            log.actor_type.as_ref(),
            &log.actor_id,
            &log.license_id,
            &log.license_key_id,
            log.details.to_string(),
            &log.ip_address,
            to_micros(log.created_at)
        ],
    )?;

    Ok(log)
}

pub fn list_audit_logs_for_license_key(
    conn: &Connection,
    license_key_id: &str,
) -> Result<Vec<AuditLog>> {
    query_all(
        conn,
        &format!(
            "SELECT {} FROM audit_logs WHERE license_key_id = ?1 ORDER BY created_at, rowid",
            AUDIT_LOG_COLS
        ),
        params![license_key_id],
    )
}
