//! Taxonomía de errores de las operaciones distribuidas.
//!
//! Cada fallo por sede se clasifica UNA sola vez, en la frontera con el motor
//! de datos (mapeo estructurado en la capa de persistencia, o por texto aquí
//! cuando el motor solo expone mensajes). El resto de la capa trabaja con
//! variantes semánticas y nunca vuelve a inspeccionar el error crudo.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error clasificado de una operación contra una sede.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("Sin conexión disponible a {0}")]
    ConexionPerdida(String),

    #[error("Error de transacción distribuida (DTC desactivado): {0}")]
    TransaccionDistribuida(String),

    #[error("Violación de unicidad: {0}")]
    ViolacionUnicidad(String),

    #[error("Violación de clave foránea: {0}")]
    ViolacionClaveForanea(String),

    #[error("No encontrado: {0}")]
    NoEncontrado(String),

    #[error("Error desconocido: {0}")]
    Desconocido(String),
}

/// Clase serializable del error, sin el detalle. Es la que viaja en los
/// mapas de resultado por sede del sobre de respuesta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaseError {
    ConexionPerdida,
    TransaccionDistribuida,
    ViolacionUnicidad,
    ViolacionClaveForanea,
    NoEncontrado,
    Desconocido,
}

impl StoreError {
    pub fn clase(&self) -> ClaseError {
        match self {
            StoreError::ConexionPerdida(_) => ClaseError::ConexionPerdida,
            StoreError::TransaccionDistribuida(_) => ClaseError::TransaccionDistribuida,
            StoreError::ViolacionUnicidad(_) => ClaseError::ViolacionUnicidad,
            StoreError::ViolacionClaveForanea(_) => ClaseError::ViolacionClaveForanea,
            StoreError::NoEncontrado(_) => ClaseError::NoEncontrado,
            StoreError::Desconocido(_) => ClaseError::Desconocido,
        }
    }

    /// `true` si el fallo es de conectividad (la sede no respondió).
    pub fn es_conectividad(&self) -> bool {
        matches!(self, StoreError::ConexionPerdida(_))
    }
}

/// Clasifica por texto el error crudo de un motor que no expone códigos
/// estructurados. Best-effort por substring en minúsculas, sin acoplarse a
/// un dialecto SQL concreto.
///
/// Familias reconocidas:
/// - Coordinador de transacciones distribuidas apagado (MSDTC y similares).
/// - Pérdida de conexión / timeout.
/// - Violaciones de unicidad y de clave foránea por nombre de constraint.
pub fn clasificar_mensaje(mensaje: &str) -> StoreError {
    let m = mensaje.to_lowercase();
    if m.contains("transaction manager") || m.contains("msdtc") || m.contains("distributed transaction") {
        return StoreError::TransaccionDistribuida(mensaje.to_string());
    }
    if m.contains("econnreset")
       || m.contains("econnrefused")
       || m.contains("connection refused")
       || m.contains("connection closed")
       || m.contains("connection reset")
       || m.contains("failed to connect")
       || m.contains("timeout")
       || m.contains("sin conexión")
    {
        return StoreError::ConexionPerdida(mensaje.to_string());
    }
    if m.contains("unique") || m.contains("duplicate key") || m.contains("primary key") {
        return StoreError::ViolacionUnicidad(mensaje.to_string());
    }
    if m.contains("foreign key") || m.contains("reference constraint") {
        return StoreError::ViolacionClaveForanea(mensaje.to_string());
    }
    StoreError::Desconocido(mensaje.to_string())
}
