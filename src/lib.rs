//! POLI-CAR Rust Library
//!
//! Este crate actúa como la fachada del sistema distribuido de talleres:
//! - Reexporta `policar_domain` con las entidades del negocio y sus validaciones.
//! - Reexporta `policar_core` con el registro de sedes, el router réplica/fragmento
//!   y la fachada `ServicioDatos`.
//! - Con la feature `pg_demo` expone además `policar_persistence` (backend Postgres).
//!
//! Puede usarse desde `main.rs` o por otros crates/clientes.

pub use policar_core;
pub use policar_domain;

#[cfg(feature = "pg_demo")]
pub use policar_persistence;

#[cfg(test)]
mod tests {
    use policar_core::StoreError;
    use policar_domain::DomainError;

    #[test]
    fn domain_error_tests() {
        let d = DomainError::Validacion("x".into()).to_string();
        assert_eq!(d, "Error de validación: x");
    }

    #[test]
    fn store_error_tests() {
        let e = StoreError::ConexionPerdida("NORTE".into()).to_string();
        assert_eq!(e, "Sin conexión disponible a NORTE");
    }
}
