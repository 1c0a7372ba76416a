//! Wrapper para correr migraciones embebidas.
//!
//! Cada sede tiene su propio set de migraciones porque los esquemas NO son
//! idénticos: los talleres llevan las tablas replicadas más sus fragmentos
//! con sufijo propio; CENTRAL solo lleva las replicadas. Al inicializar el
//! pool de una sede se ejecuta su set una vez.

use diesel::pg::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use policar_core::StoreError;
use policar_domain::Sede;

pub const MIGRACIONES_NORTE: EmbeddedMigrations = embed_migrations!("migrations/norte");
pub const MIGRACIONES_SUR: EmbeddedMigrations = embed_migrations!("migrations/sur");
pub const MIGRACIONES_CENTRAL: EmbeddedMigrations = embed_migrations!("migrations/central");

pub fn run_pending_migrations(conn: &mut PgConnection, sede: Sede) -> Result<(), StoreError> {
    let migraciones = match sede {
        Sede::Norte => MIGRACIONES_NORTE,
        Sede::Sur => MIGRACIONES_SUR,
        Sede::Central => MIGRACIONES_CENTRAL,
    };
    conn.run_pending_migrations(migraciones)
        .map(|_| ())
        .map_err(|e| StoreError::Desconocido(format!("error de migración en {sede}: {e}")))
}
