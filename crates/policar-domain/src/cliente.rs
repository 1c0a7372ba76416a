use serde::{Deserialize, Serialize};

use crate::validacion::{longitud_maxima, no_vacio};
use crate::DomainError;

/// Cliente del taller. Tabla replicada: cada nodo mantiene una copia
/// completa y las escrituras se propagan a todas las sedes conectadas.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cliente {
    pub cedula_cliente: String,
    pub nombre_cliente: String,
    pub apellido_cliente: String,
    pub zona: String,
}

impl Cliente {
    /// Crea un cliente validado.
    ///
    /// # Errores
    /// Retorna `DomainError::Validacion` si falta la cédula, el nombre o el
    /// apellido, o si la cédula excede los 10 caracteres.
    pub fn nuevo(cedula: impl Into<String>,
                 nombre: impl Into<String>,
                 apellido: impl Into<String>,
                 zona: impl Into<String>)
                 -> Result<Self, DomainError> {
        let cliente = Cliente { cedula_cliente: cedula.into(),
                                nombre_cliente: nombre.into(),
                                apellido_cliente: apellido.into(),
                                zona: zona.into() };
        cliente.validar()?;
        Ok(cliente)
    }

    /// Valida los invariantes del registro (útil para payloads deserializados).
    pub fn validar(&self) -> Result<(), DomainError> {
        no_vacio("cedula_cliente", &self.cedula_cliente)?;
        longitud_maxima("cedula_cliente", &self.cedula_cliente, 10)?;
        no_vacio("nombre_cliente", &self.nombre_cliente)?;
        no_vacio("apellido_cliente", &self.apellido_cliente)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cliente_valido() {
        let c = Cliente::nuevo("0912345678", "Carlos", "Mendoza", "Norte").unwrap();
        assert_eq!(c.cedula_cliente, "0912345678");
    }

    #[test]
    fn rechaza_cedula_vacia() {
        let err = Cliente::nuevo("", "Carlos", "Mendoza", "Norte").unwrap_err();
        assert!(matches!(err, DomainError::Validacion(_)));
    }

    #[test]
    fn rechaza_cedula_larga() {
        let err = Cliente::nuevo("09123456789", "Carlos", "Mendoza", "Norte").unwrap_err();
        assert!(err.to_string().contains("10"));
    }
}
