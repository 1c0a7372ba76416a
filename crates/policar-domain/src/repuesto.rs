use serde::{Deserialize, Serialize};

use crate::validacion::{entero_no_negativo, no_negativo, no_vacio};
use crate::{DomainError, Sede};

/// Repuesto en inventario. Tabla fragmentada horizontalmente: cada sede
/// administra su propio stock y sus propios identificadores (el mismo
/// `id_repuesto` puede existir en NORTE y en SUR designando piezas
/// distintas), por eso toda operación por id exige también la sede.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repuesto {
    pub id_repuesto: i32,
    pub sede_taller: Sede,
    pub nombre_repuesto: String,
    pub descripcion_repuesto: String,
    pub cantidad_repuesto: i32,
    pub precio_unitario: f64,
}

impl Repuesto {
    pub fn validar(&self) -> Result<(), DomainError> {
        if self.id_repuesto <= 0 {
            return Err(DomainError::Validacion(format!("id_repuesto debe ser positivo: {}", self.id_repuesto)));
        }
        self.datos().validar()
    }

    /// Campos editables del repuesto (todo menos el id).
    pub fn datos(&self) -> NuevoRepuesto {
        NuevoRepuesto { sede_taller: self.sede_taller,
                        nombre_repuesto: self.nombre_repuesto.clone(),
                        descripcion_repuesto: self.descripcion_repuesto.clone(),
                        cantidad_repuesto: self.cantidad_repuesto,
                        precio_unitario: self.precio_unitario }
    }
}

/// Payload de alta de repuesto: el id lo asigna la sede dueña del fragmento
/// (máximo actual + 1) en el momento de la inserción.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NuevoRepuesto {
    pub sede_taller: Sede,
    pub nombre_repuesto: String,
    pub descripcion_repuesto: String,
    pub cantidad_repuesto: i32,
    pub precio_unitario: f64,
}

impl NuevoRepuesto {
    pub fn validar(&self) -> Result<(), DomainError> {
        if !self.sede_taller.es_taller() {
            return Err(DomainError::SedeSinFragmentos(self.sede_taller.to_string()));
        }
        no_vacio("nombre_repuesto", &self.nombre_repuesto)?;
        entero_no_negativo("cantidad_repuesto", self.cantidad_repuesto)?;
        no_negativo("precio_unitario", self.precio_unitario)?;
        Ok(())
    }

    /// Materializa el repuesto con el id que asignó la sede.
    pub fn con_id(&self, id_repuesto: i32) -> Repuesto {
        Repuesto { id_repuesto,
                   sede_taller: self.sede_taller,
                   nombre_repuesto: self.nombre_repuesto.clone(),
                   descripcion_repuesto: self.descripcion_repuesto.clone(),
                   cantidad_repuesto: self.cantidad_repuesto,
                   precio_unitario: self.precio_unitario }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> NuevoRepuesto {
        NuevoRepuesto { sede_taller: Sede::Norte,
                        nombre_repuesto: "Filtro de aceite".into(),
                        descripcion_repuesto: "Filtro estándar".into(),
                        cantidad_repuesto: 12,
                        precio_unitario: 8.5 }
    }

    #[test]
    fn alta_valida_y_con_id() {
        let alta = base();
        alta.validar().unwrap();
        let repuesto = alta.con_id(4);
        assert_eq!(repuesto.id_repuesto, 4);
        assert_eq!(repuesto.datos(), alta);
    }

    #[test]
    fn rechaza_stock_negativo() {
        let mut alta = base();
        alta.cantidad_repuesto = -1;
        assert!(alta.validar().is_err());
    }

    #[test]
    fn rechaza_fragmento_en_central() {
        let mut alta = base();
        alta.sede_taller = Sede::Central;
        assert!(matches!(alta.validar().unwrap_err(), DomainError::SedeSinFragmentos(_)));
    }
}
