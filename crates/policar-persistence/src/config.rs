//! Carga de configuración de conexión desde variables de entorno.
//! Cada sede tiene su propia base de datos: convención `POLICAR_DB_URL_<SEDE>`
//! y parámetros opcionales de pool compartidos entre sedes.

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use thiserror::Error;

use policar_domain::Sede;

// Carga perezosa del archivo .env una sola vez.
static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv(); // ignora error si no existe .env
});

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("variable de entorno {0} no definida")]
    VariableFaltante(String),
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    /// Lee la configuración de UNA sede (`POLICAR_DB_URL_NORTE`, `_SUR` o
    /// `_CENTRAL`). Los tamaños de pool se leen de `POLICAR_DB_MIN_CONNECTIONS`
    /// y `POLICAR_DB_MAX_CONNECTIONS`, con valores por defecto 2 y 16.
    pub fn para_sede(sede: Sede) -> Result<Self, ConfigError> {
        // asegura que .env se haya cargado
        Lazy::force(&DOTENV_LOADED);
        let variable = variable_url(sede);
        let url = env::var(&variable).map_err(|_| ConfigError::VariableFaltante(variable))?;
        let min_connections = env::var("POLICAR_DB_MIN_CONNECTIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(2);
        let max_connections = env::var("POLICAR_DB_MAX_CONNECTIONS").ok().and_then(|v| v.parse().ok()).unwrap_or(16);
        Ok(Self { url, min_connections, max_connections })
    }

    /// Sedes con URL definida en el entorno, en el orden canónico NORTE,
    /// SUR, CENTRAL. Una sede sin variable simplemente no participa.
    pub fn sedes_configuradas() -> Vec<Sede> {
        Lazy::force(&DOTENV_LOADED);
        [Sede::Norte, Sede::Sur, Sede::Central].into_iter()
                                               .filter(|sede| env::var(variable_url(*sede)).is_ok())
                                               .collect()
    }
}

fn variable_url(sede: Sede) -> String {
    format!("POLICAR_DB_URL_{}", sede.codigo())
}

/// Forzar carga temprana de .env desde aplicaciones externas si se desea.
pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lee_la_url_de_la_sede() {
        env::set_var("POLICAR_DB_URL_CENTRAL", "postgres://localhost/policar_central");
        let cfg = DbConfig::para_sede(Sede::Central).unwrap();
        assert_eq!(cfg.url, "postgres://localhost/policar_central");
        env::remove_var("POLICAR_DB_URL_CENTRAL");
    }

    #[test]
    fn sede_sin_variable_reporta_cual_falta() {
        env::remove_var("POLICAR_DB_URL_SUR");
        let err = DbConfig::para_sede(Sede::Sur).unwrap_err();
        assert!(err.to_string().contains("POLICAR_DB_URL_SUR"));
    }
}
