// error.rs
use thiserror::Error;

/// Error personalizado del dominio para el sistema de talleres
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("Error de validación: {0}")]
    Validacion(String),

    #[error("Sede no válida: {0}")]
    SedeInvalida(String),

    #[error("La sede {0} no almacena fragmentos (use NORTE o SUR)")]
    SedeSinFragmentos(String),

    #[error("Error de serialización: {0}")]
    Serializacion(String),
}

// Implementación de conversión desde serde_json::Error a DomainError
impl From<serde_json::Error> for DomainError {
    fn from(e: serde_json::Error) -> Self {
        DomainError::Serializacion(e.to_string())
    }
}
