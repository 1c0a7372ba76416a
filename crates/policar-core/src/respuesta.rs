//! Sobre uniforme de respuesta de la capa de servicio.
//!
//! Toda operación devuelve `Respuesta<T>`: éxito global, mensaje en español
//! con conteos, payload opcional y, para operaciones multi-sede, el mapa
//! ordenado de resultados por sede. Un fallo parcial nunca se oculta: queda
//! visible en `detalles` aunque `exito` sea `true`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{ClaseError, StoreError};

/// Resultado de un paso sobre una sede concreta.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultadoSede {
    #[serde(rename = "success")]
    pub exito: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clase: Option<ClaseError>,
}

impl ResultadoSede {
    pub fn ok() -> Self {
        ResultadoSede { exito: true, error: None, clase: None }
    }

    pub fn fallo(err: &StoreError) -> Self {
        ResultadoSede { exito: false,
                        error: Some(err.to_string()),
                        clase: Some(err.clase()) }
    }
}

/// Mapa ordenado paso → resultado ("NORTE", "nomina_SUR", "info_NORTE", ...).
/// El orden de inserción se conserva para que el consumidor vea las sedes en
/// el orden canónico de consulta.
pub type DetalleOperacion = IndexMap<String, ResultadoSede>;

/// Sobre de respuesta de toda la capa de servicio. Los nombres serializados
/// (`success`, `message`, `data`, `detalles`) son el contrato con los
/// consumidores existentes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Respuesta<T> {
    #[serde(rename = "success")]
    pub exito: bool,
    #[serde(rename = "message")]
    pub mensaje: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detalles: Option<DetalleOperacion>,
}

impl<T> Respuesta<T> {
    pub fn ok(data: T, mensaje: impl Into<String>) -> Self {
        Respuesta { exito: true,
                    mensaje: mensaje.into(),
                    data: Some(data),
                    detalles: None }
    }

    pub fn fallo(mensaje: impl Into<String>) -> Self {
        Respuesta { exito: false,
                    mensaje: mensaje.into(),
                    data: None,
                    detalles: None }
    }

    /// Adjunta el mapa de resultados por sede.
    pub fn con_detalles(mut self, detalles: DetalleOperacion) -> Self {
        self.detalles = Some(detalles);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializa_los_nombres_del_contrato() {
        let r = Respuesta::ok(vec![1, 2], "2 registros");
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "2 registros");
        assert_eq!(json["data"], serde_json::json!([1, 2]));
        assert!(json.get("detalles").is_none());
    }

    #[test]
    fn detalles_conservan_el_orden_de_insercion() {
        let mut detalles = DetalleOperacion::new();
        detalles.insert("NORTE".into(), ResultadoSede::ok());
        detalles.insert("SUR".into(), ResultadoSede::fallo(&StoreError::ConexionPerdida("SUR".into())));
        let r = Respuesta::<()>::fallo("Sin conexión").con_detalles(detalles);
        let claves: Vec<&String> = r.detalles.as_ref().unwrap().keys().collect();
        assert_eq!(claves, ["NORTE", "SUR"]);
    }

    #[test]
    fn fallo_de_sede_conserva_mensaje_y_clase() {
        let err = StoreError::ViolacionUnicidad("PK_Cliente".into());
        let res = ResultadoSede::fallo(&err);
        assert!(!res.exito);
        assert_eq!(res.clase, Some(ClaseError::ViolacionUnicidad));
        assert!(res.error.unwrap().contains("PK_Cliente"));
    }
}
