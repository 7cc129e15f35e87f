use sqlx::PgPool;

use crate::config::PostgresConfig;

/// Run database migrations, creating required tables if they do not exist.
///
/// This creates the contacts and locks tables in the configured schema with
/// the configured table prefix.
///
/// # Errors
///
/// Returns a [`sqlx::Error`] if any DDL statement fails.
pub async fn run_migrations(pool: &PgPool, config: &PostgresConfig) -> Result<(), sqlx::Error> {
    let contacts_table = config.contacts_table();
    let locks_table = config.locks_table();

    let create_contacts = format!(
        "CREATE TABLE IF NOT EXISTS {contacts_table} (
            id BIGSERIAL PRIMARY KEY,
            nombre VARCHAR(100) NOT NULL,
            apellidos VARCHAR(100) NOT NULL,
            correo VARCHAR(150) NOT NULL UNIQUE,
            fecha_nac DATE NOT NULL,
            foto_url VARCHAR(500),
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )"
    );

    let create_surname_idx = format!(
        "CREATE INDEX IF NOT EXISTS {}contactos_apellidos_idx ON {contacts_table} (apellidos, nombre)",
        config.table_prefix
    );

    let create_locks = format!(
        "CREATE TABLE IF NOT EXISTS {locks_table} (
            name TEXT PRIMARY KEY,
            owner TEXT NOT NULL,
            expires_at TIMESTAMPTZ NOT NULL
        )"
    );

    sqlx::query(&create_contacts).execute(pool).await?;
    sqlx::query(&create_surname_idx).execute(pool).await?;
    sqlx::query(&create_locks).execute(pool).await?;

    Ok(())
}
