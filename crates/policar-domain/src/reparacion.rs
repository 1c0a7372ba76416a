use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::validacion::{longitud_maxima, no_negativo, no_vacio};
use crate::{DomainError, Sede};

/// Cabecera de una reparación. Tabla fragmentada horizontalmente por la sede
/// donde se realizó el trabajo; el id es único solo dentro de su sede.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reparacion {
    pub id_reparacion: i32,
    pub placa: String,
    pub sede_taller: Sede,
    pub fecha_reparacion: NaiveDate,
    pub descripcion: String,
    pub precio_total: f64,
}

impl Reparacion {
    pub fn validar(&self) -> Result<(), DomainError> {
        if self.id_reparacion <= 0 {
            return Err(DomainError::Validacion(format!("id_reparacion debe ser positivo: {}", self.id_reparacion)));
        }
        no_vacio("placa", &self.placa)?;
        longitud_maxima("placa", &self.placa, 10)?;
        if !self.sede_taller.es_taller() {
            return Err(DomainError::SedeSinFragmentos(self.sede_taller.to_string()));
        }
        no_negativo("precio_total", self.precio_total)
    }
}

/// Renglón de detalle: repuesto consumido por una reparación. Vive en la
/// misma sede que su cabecera (clave foránea local al fragmento).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReparacionDetalle {
    pub id_reparacion: i32,
    pub id_repuesto: i32,
    pub cantidad_usada: i32,
}

impl ReparacionDetalle {
    pub fn validar(&self) -> Result<(), DomainError> {
        if self.cantidad_usada <= 0 {
            return Err(DomainError::Validacion(format!("cantidad_usada debe ser positiva: {}", self.cantidad_usada)));
        }
        Ok(())
    }
}

/// Repuesto solicitado al crear una reparación (el id de la reparación
/// todavía no existe cuando llega el payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsoRepuesto {
    pub id_repuesto: i32,
    pub cantidad_usada: i32,
}

impl UsoRepuesto {
    pub fn validar(&self) -> Result<(), DomainError> {
        if self.cantidad_usada <= 0 {
            return Err(DomainError::Validacion(format!("cantidad_usada debe ser positiva: {}", self.cantidad_usada)));
        }
        Ok(())
    }

    /// Renglón de detalle definitivo una vez asignado el id de la reparación.
    pub fn como_detalle(&self, id_reparacion: i32) -> ReparacionDetalle {
        ReparacionDetalle { id_reparacion,
                            id_repuesto: self.id_repuesto,
                            cantidad_usada: self.cantidad_usada }
    }
}

/// Payload de alta de reparación: cabecera sin id más los repuestos usados.
/// La sede dueña asigna el id (máximo actual + 1) y descuenta el stock de
/// cada repuesto dentro de su propia transacción local.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NuevaReparacion {
    pub placa: String,
    pub sede_taller: Sede,
    pub fecha_reparacion: NaiveDate,
    pub descripcion: String,
    pub precio_total: f64,
    #[serde(default)]
    pub repuestos: Vec<UsoRepuesto>,
}

impl NuevaReparacion {
    pub fn validar(&self) -> Result<(), DomainError> {
        no_vacio("placa", &self.placa)?;
        longitud_maxima("placa", &self.placa, 10)?;
        if !self.sede_taller.es_taller() {
            return Err(DomainError::SedeSinFragmentos(self.sede_taller.to_string()));
        }
        no_negativo("precio_total", self.precio_total)?;
        for uso in &self.repuestos {
            uso.validar()?;
        }
        Ok(())
    }

    /// Materializa la cabecera con el id que asignó la sede.
    pub fn con_id(&self, id_reparacion: i32) -> Reparacion {
        Reparacion { id_reparacion,
                     placa: self.placa.clone(),
                     sede_taller: self.sede_taller,
                     fecha_reparacion: self.fecha_reparacion,
                     descripcion: self.descripcion.clone(),
                     precio_total: self.precio_total }
    }
}

/// Proyección de lectura: renglón de detalle junto a los datos del repuesto,
/// tal como la devuelve el JOIN dentro de la sede dueña.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepuestoUsado {
    pub id_reparacion: i32,
    pub id_repuesto: i32,
    pub cantidad_usada: i32,
    pub nombre_repuesto: String,
    pub descripcion_repuesto: String,
    pub precio_unitario: f64,
    pub sede_taller: Sede,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fecha(anio: i32, mes: u32, dia: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(anio, mes, dia).unwrap()
    }

    fn alta_base() -> NuevaReparacion {
        NuevaReparacion { placa: "ABC-1234".into(),
                          sede_taller: Sede::Sur,
                          fecha_reparacion: fecha(2024, 5, 20),
                          descripcion: "Cambio de frenos".into(),
                          precio_total: 150.0,
                          repuestos: vec![UsoRepuesto { id_repuesto: 2, cantidad_usada: 1 }] }
    }

    #[test]
    fn alta_valida_y_con_id() {
        let alta = alta_base();
        alta.validar().unwrap();
        let cabecera = alta.con_id(7);
        assert_eq!(cabecera.id_reparacion, 7);
        assert_eq!(cabecera.sede_taller, Sede::Sur);
    }

    #[test]
    fn rechaza_cantidad_usada_cero() {
        let mut alta = alta_base();
        alta.repuestos[0].cantidad_usada = 0;
        assert!(alta.validar().is_err());
    }

    #[test]
    fn uso_se_convierte_en_detalle() {
        let uso = UsoRepuesto { id_repuesto: 9, cantidad_usada: 3 };
        let detalle = uso.como_detalle(7);
        assert_eq!(detalle.id_reparacion, 7);
        assert_eq!(detalle.id_repuesto, 9);
        assert_eq!(detalle.cantidad_usada, 3);
    }
}
