mod from_row;
pub mod queries;
mod store;

pub use store::SqliteStore;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::Connection;

use crate::error::Result;

pub type DbPool = Pool<SqliteConnectionManager>;

/// Shared state handed to every handler and middleware.
#[derive(Clone)]
pub struct AppState {
    pub store: SqliteStore,
}

/// Applied to every pooled connection. Foreign keys are per-connection in SQLite.
const CONNECTION_PRAGMAS: &str = "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = 5000;";

/// Open a pool on a database file.
pub fn create_pool(path: &str, max_size: u32) -> Result<DbPool> {
    let manager =
        SqliteConnectionManager::file(path).with_init(|c| c.execute_batch(CONNECTION_PRAGMAS));
    let pool = Pool::builder().max_size(max_size).build(manager)?;
    Ok(pool)
}

/// Open a single-connection pool on a private in-memory database.
///
/// Every SQLite memory connection is its own database, so the pool is capped
/// at one connection.
pub fn create_memory_pool() -> Result<DbPool> {
    let manager =
        SqliteConnectionManager::memory().with_init(|c| c.execute_batch(CONNECTION_PRAGMAS));
    let pool = Pool::builder().max_size(1).build(manager)?;
    Ok(pool)
}

pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;

        CREATE TABLE IF NOT EXISTS brands (
            id TEXT PRIMARY KEY,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            api_key_hash TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS products (
            id TEXT PRIMARY KEY,
            brand_id TEXT NOT NULL REFERENCES brands(id) ON DELETE RESTRICT,
            slug TEXT NOT NULL,
            name TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            default_max_seats INTEGER,
            created_at INTEGER NOT NULL,
            UNIQUE (brand_id, slug)
        );

        CREATE TABLE IF NOT EXISTS license_keys (
            id TEXT PRIMARY KEY,
            key TEXT NOT NULL UNIQUE,
            brand_id TEXT NOT NULL REFERENCES brands(id) ON DELETE RESTRICT,
            customer_email TEXT NOT NULL,
            external_reference TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_license_keys_email
            ON license_keys(customer_email COLLATE NOCASE);
        CREATE INDEX IF NOT EXISTS idx_license_keys_brand_email
            ON license_keys(brand_id, customer_email COLLATE NOCASE);
        CREATE INDEX IF NOT EXISTS idx_license_keys_external_ref
            ON license_keys(external_reference);

        CREATE TABLE IF NOT EXISTS licenses (
            id TEXT PRIMARY KEY,
            license_key_id TEXT NOT NULL REFERENCES license_keys(id) ON DELETE CASCADE,
            product_id TEXT NOT NULL REFERENCES products(id) ON DELETE RESTRICT,
            status TEXT NOT NULL
                CHECK (status IN ('valid', 'suspended', 'cancelled', 'expired')),
            expires_at INTEGER,
            max_seats INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE (license_key_id, product_id)
        );
        CREATE INDEX IF NOT EXISTS idx_licenses_status ON licenses(status);
        CREATE INDEX IF NOT EXISTS idx_licenses_expires_at ON licenses(expires_at);

        CREATE TABLE IF NOT EXISTS activations (
            id TEXT PRIMARY KEY,
            license_id TEXT NOT NULL REFERENCES licenses(id) ON DELETE CASCADE,
            instance_id TEXT NOT NULL,
            instance_name TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            activated_at INTEGER NOT NULL,
            deactivated_at INTEGER,
            ip_address TEXT,
            user_agent TEXT
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_activations_active_instance
            ON activations(license_id, instance_id) WHERE is_active = 1;
        CREATE INDEX IF NOT EXISTS idx_activations_instance ON activations(instance_id);

        CREATE TABLE IF NOT EXISTS audit_logs (
            id TEXT PRIMARY KEY,
            action TEXT NOT NULL,
            actor_type TEXT NOT NULL,
            actor_id TEXT NOT NULL,
            license_id TEXT REFERENCES licenses(id) ON DELETE SET NULL,
            license_key_id TEXT REFERENCES license_keys(id) ON DELETE SET NULL,
            details TEXT NOT NULL DEFAULT '{}',
            ip_address TEXT,
            created_at INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_logs_license ON audit_logs(license_id);
        CREATE INDEX IF NOT EXISTS idx_audit_logs_license_key ON audit_logs(license_key_id);
        CREATE INDEX IF NOT EXISTS idx_audit_logs_action ON audit_logs(action);
        CREATE INDEX IF NOT EXISTS idx_audit_logs_actor ON audit_logs(actor_type, actor_id);

        -- Audit entries are append-only. Nulling the weak references when the
        -- referenced rows go away is the only permitted change.
        CREATE TRIGGER IF NOT EXISTS audit_logs_no_update
            BEFORE UPDATE OF id, action, actor_type, actor_id, details, ip_address, created_at
            ON audit_logs
        BEGIN
            SELECT RAISE(ABORT, 'audit_logs is append-only');
        END;
        CREATE TRIGGER IF NOT EXISTS audit_logs_no_delete
            BEFORE DELETE ON audit_logs
        BEGIN
            SELECT RAISE(ABORT, 'audit_logs is append-only');
        END;
        "#,
    )?;
    Ok(())
}
