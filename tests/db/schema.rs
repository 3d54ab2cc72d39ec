use rusqlite::params;

use crate::common::*;

/// Brand, product and a provisioned key on a fresh SQLite store.
fn provisioned() -> (SqliteStore, LicenseKeyDetails) {
    let store = sqlite_store();
    let (_, _, details) = acme_widget(&store, Some(2));
    (store, details)
}

#[test]
fn init_db_is_idempotent() {
    let store = sqlite_store();
    let conn = store.pool().get().unwrap();
    db::init_db(&conn).unwrap();
    db::init_db(&conn).unwrap();
}

#[test]
fn foreign_keys_are_enforced() {
    let store = sqlite_store();
    let conn = store.pool().get().unwrap();
    let result = conn.execute(
        "INSERT INTO products (id, brand_id, slug, name, is_active, created_at)
         VALUES ('p1', 'missing-brand', 'widget', 'Widget', 1, 0)",
        [],
    );
    assert!(result.is_err());
}

#[test]
fn product_slug_unique_per_brand_only() {
    let store = sqlite_store();
    let acme = store.seed_brand("acme");
    let globex = store.seed_brand("globex");
    store.seed_product(&acme, "widget", None);
    // Same slug under another brand is fine
    store.seed_product(&globex, "widget", None);

    let conn = store.pool().get().unwrap();
    let dup = queries::create_product(
        &conn,
        &acme.id,
        &CreateProduct {
            slug: "widget".into(),
            name: "Widget again".into(),
            default_max_seats: None,
        },
    );
    assert!(dup.is_err());
}

#[test]
fn one_license_per_key_and_product() {
    let (store, details) = provisioned();
    let license = &details.licenses[0];

    let dup = store.create_license(&NewLicense {
        license_key_id: license.license_key_id.clone(),
        product_id: license.product_id.clone(),
        expires_at: None,
        max_seats: None,
    });
    assert_code(dup, ErrorCode::LicenseExists);
}

#[test]
fn license_key_string_is_unique() {
    let (store, details) = provisioned();

    let dup = store.create_license_key(&NewLicenseKey {
        key: details.license_key.key.clone(),
        brand_id: details.license_key.brand_id.clone(),
        customer_email: "other@example.com".into(),
        external_reference: None,
    });
    assert_code(dup, ErrorCode::KeyExists);
}

#[test]
fn license_status_is_checked() {
    let (store, details) = provisioned();
    let conn = store.pool().get().unwrap();
    let result = conn.execute(
        "UPDATE licenses SET status = 'revoked' WHERE id = ?1",
        params![details.licenses[0].id],
    );
    assert!(result.is_err());
}

#[test]
fn one_active_activation_per_instance() {
    let (store, details) = provisioned();
    let license_id = &details.licenses[0].id;
    let conn = store.pool().get().unwrap();

    let insert = |id: &str, active: i64| {
        conn.execute(
            "INSERT INTO activations (id, license_id, instance_id, is_active, activated_at)
             VALUES (?1, ?2, 'laptop', ?3, 0)",
            params![id, license_id, active],
        )
    };

    insert("a1", 1).unwrap();
    assert!(insert("a2", 1).is_err());
    // Inactive history rows for the same instance are allowed
    insert("a3", 0).unwrap();
    insert("a4", 0).unwrap();
}

#[test]
fn audit_logs_are_append_only() {
    let (store, details) = provisioned();
    let conn = store.pool().get().unwrap();
    let key_id = &details.license_key.id;

    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM audit_logs WHERE license_key_id = ?1",
            params![key_id],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(count, 2);

    let update = conn.execute(
        "UPDATE audit_logs SET action = 'license_cancelled' WHERE license_key_id = ?1",
        params![key_id],
    );
    assert!(update.is_err());

    let delete = conn.execute(
        "DELETE FROM audit_logs WHERE license_key_id = ?1",
        params![key_id],
    );
    assert!(delete.is_err());
}

#[test]
fn audit_references_are_weak() {
    let (store, details) = provisioned();
    let conn = store.pool().get().unwrap();

    conn.execute(
        "DELETE FROM license_keys WHERE id = ?1",
        params![details.license_key.id],
    )
    .unwrap();

    let (orphaned, total): (i64, i64) = conn
        .query_row(
            "SELECT SUM(license_key_id IS NULL AND license_id IS NULL), COUNT(*) FROM audit_logs",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(total, 2);
    assert_eq!(orphaned, 2);
}

#[test]
fn brands_with_products_cannot_be_deleted() {
    let (store, details) = provisioned();
    let conn = store.pool().get().unwrap();
    let result = conn.execute(
        "DELETE FROM brands WHERE id = ?1",
        params![details.license_key.brand_id],
    );
    assert!(result.is_err());
}
