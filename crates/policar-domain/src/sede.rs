use serde::{Deserialize, Serialize};

use crate::DomainError;
use std::fmt;
use std::str::FromStr;

/// Identificador lógico de un nodo de la red POLI-CAR.
///
/// `Norte` y `Sur` son talleres: además de las tablas replicadas poseen los
/// fragmentos horizontales propios (empleados por sede, repuestos,
/// reparaciones). `Central` es un nodo opcional que solo participa en la
/// replicación.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Sede {
    Norte,
    Sur,
    Central,
}

impl Sede {
    /// Código en mayúsculas, tal como aparece en mensajes y claves de detalle.
    pub fn codigo(&self) -> &'static str {
        match self {
            Sede::Norte => "NORTE",
            Sede::Sur => "SUR",
            Sede::Central => "CENTRAL",
        }
    }

    /// Sufijo usado por las tablas físicas fragmentadas de esta sede.
    pub fn sufijo(&self) -> &'static str {
        match self {
            Sede::Norte => "norte",
            Sede::Sur => "sur",
            Sede::Central => "central",
        }
    }

    /// Sedes taller, en el orden canónico de consulta.
    pub fn talleres() -> [Sede; 2] {
        [Sede::Norte, Sede::Sur]
    }

    /// `true` si la sede posee fragmentos propios.
    pub fn es_taller(&self) -> bool {
        matches!(self, Sede::Norte | Sede::Sur)
    }
}

impl FromStr for Sede {
    type Err = DomainError;

    /// Acepta el nombre en cualquier combinación de mayúsculas/minúsculas.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "NORTE" => Ok(Sede::Norte),
            "SUR" => Ok(Sede::Sur),
            "CENTRAL" => Ok(Sede::Central),
            otro => Err(DomainError::SedeInvalida(otro.to_string())),
        }
    }
}

impl fmt::Display for Sede {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.codigo())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsea_nombres_en_cualquier_caso() {
        assert_eq!("norte".parse::<Sede>().unwrap(), Sede::Norte);
        assert_eq!("SUR".parse::<Sede>().unwrap(), Sede::Sur);
        assert_eq!(" Central ".parse::<Sede>().unwrap(), Sede::Central);
    }

    #[test]
    fn rechaza_sede_desconocida() {
        let err = "oeste".parse::<Sede>().unwrap_err();
        assert!(matches!(err, DomainError::SedeInvalida(_)));
    }

    #[test]
    fn serializa_en_mayusculas() {
        assert_eq!(serde_json::to_string(&Sede::Norte).unwrap(), "\"NORTE\"");
        let s: Sede = serde_json::from_str("\"SUR\"").unwrap();
        assert_eq!(s, Sede::Sur);
    }

    #[test]
    fn central_no_es_taller() {
        assert!(Sede::Norte.es_taller());
        assert!(Sede::Sur.es_taller());
        assert!(!Sede::Central.es_taller());
    }
}
