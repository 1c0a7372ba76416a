//! policar-persistence
//!
//! Objetivo: Proveer la implementación Postgres (Diesel) de `SedeStore`,
//! con una base de datos independiente por sede, más utilidades de
//! conexión, configuración y migraciones. La semántica replica 1:1 el
//! backend en memoria de `policar-core`: mismos órdenes de listado, mismas
//! filas afectadas, mismos errores clasificados.
//!
//! Módulos:
//! - `pg`: `PgSedeStore` sobre Postgres (pool r2d2 + `spawn_blocking`).
//! - `migrations`: runner embebido de migraciones Diesel, por sede.
//! - `config`: carga de configuración de cada sede desde .env.
//! - `schema`: tablas Diesel declaradas (replicadas y fragmentos por taller).

pub mod config;
pub mod error;
pub mod migrations;
pub mod pg;
pub mod schema;

pub use config::{init_dotenv, ConfigError, DbConfig};
pub use error::clasificar_diesel;
pub use pg::{build_dev_pool_from_env, build_pool, registro_desde_env, ConnectionProvider, PgPool, PgSedeStore,
             PoolProvider};
