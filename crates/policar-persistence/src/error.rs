//! Frontera de errores entre Diesel y la capa distribuida.
//!
//! Aquí se clasifica el error crudo del motor UNA sola vez: las violaciones
//! de constraint llegan con código estructurado y se mapean directo; el
//! resto de errores de base pasa por el clasificador de texto del core. La
//! capa de orquestación recibe siempre un `StoreError` y no vuelve a mirar
//! el mensaje.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use policar_core::{clasificar_mensaje, StoreError};
use policar_domain::Sede;

/// Clasifica un error de Diesel como `StoreError` de la sede indicada.
///
/// Los fallos de conectividad reportan la sede (el detalle del driver se
/// pierde aquí; quien necesite el texto crudo debe loguearlo antes).
pub fn clasificar_diesel(sede: Sede, err: DieselError) -> StoreError {
    match err {
        DieselError::NotFound => StoreError::NoEncontrado(format!("registro inexistente en {sede}")),
        DieselError::DatabaseError(kind, info) => match kind {
            DatabaseErrorKind::UniqueViolation => StoreError::ViolacionUnicidad(info.message().to_string()),
            DatabaseErrorKind::ForeignKeyViolation => StoreError::ViolacionClaveForanea(info.message().to_string()),
            DatabaseErrorKind::ClosedConnection => StoreError::ConexionPerdida(sede.to_string()),
            _ => clasificar_mensaje(info.message()),
        },
        DieselError::BrokenTransactionManager => StoreError::ConexionPerdida(sede.to_string()),
        otro => StoreError::Desconocido(otro.to_string()),
    }
}

/// Error interno de una transacción local de sede: o bien falló Diesel, o
/// bien una regla de negocio pidió revertir con un error ya clasificado.
#[derive(Debug, Error)]
pub(crate) enum ErrorTransaccion {
    #[error(transparent)]
    Motor(#[from] DieselError),
    #[error("{0}")]
    Negocio(StoreError),
}

/// Colapsa el error de una transacción al `StoreError` definitivo.
pub(crate) fn resolver_transaccion(sede: Sede, err: ErrorTransaccion) -> StoreError {
    match err {
        ErrorTransaccion::Motor(e) => clasificar_diesel(sede, e),
        ErrorTransaccion::Negocio(e) => e,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policar_core::ClaseError;

    #[test]
    fn not_found_se_mapea_a_no_encontrado() {
        let err = clasificar_diesel(Sede::Norte, DieselError::NotFound);
        assert_eq!(err.clase(), ClaseError::NoEncontrado);
        assert!(err.to_string().contains("NORTE"));
    }

    #[test]
    fn transaccion_rota_cuenta_como_conectividad() {
        let err = clasificar_diesel(Sede::Sur, DieselError::BrokenTransactionManager);
        assert!(err.es_conectividad());
        assert_eq!(err.to_string(), "Sin conexión disponible a SUR");
    }

    #[test]
    fn error_de_negocio_sobrevive_a_la_transaccion() {
        let original = StoreError::ViolacionClaveForanea("el repuesto 9 no existe en NORTE".into());
        let resuelto = resolver_transaccion(Sede::Norte, ErrorTransaccion::Negocio(original.clone()));
        assert_eq!(resuelto, original);
    }
}
