use serde::{Deserialize, Serialize};

use crate::validacion::{longitud_maxima, no_vacio};
use crate::DomainError;

/// Vehículo registrado. Tabla replicada, con clave foránea hacia `Cliente`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehiculo {
    pub placa: String,
    pub cedula_cliente: String,
    pub marca: String,
    pub modelo: String,
    pub anio: i32,
}

impl Vehiculo {
    /// Crea un vehículo validado.
    ///
    /// # Errores
    /// Retorna `DomainError::Validacion` si falta la placa, la cédula del
    /// dueño, la marca o el modelo, o si el año queda fuera de 1900..=2100.
    pub fn nuevo(placa: impl Into<String>,
                 cedula_cliente: impl Into<String>,
                 marca: impl Into<String>,
                 modelo: impl Into<String>,
                 anio: i32)
                 -> Result<Self, DomainError> {
        let vehiculo = Vehiculo { placa: placa.into(),
                                  cedula_cliente: cedula_cliente.into(),
                                  marca: marca.into(),
                                  modelo: modelo.into(),
                                  anio };
        vehiculo.validar()?;
        Ok(vehiculo)
    }

    pub fn validar(&self) -> Result<(), DomainError> {
        no_vacio("placa", &self.placa)?;
        longitud_maxima("placa", &self.placa, 10)?;
        no_vacio("cedula_cliente", &self.cedula_cliente)?;
        no_vacio("marca", &self.marca)?;
        no_vacio("modelo", &self.modelo)?;
        if !(1900..=2100).contains(&self.anio) {
            return Err(DomainError::Validacion(format!("anio fuera de rango: {}", self.anio)));
        }
        Ok(())
    }
}

/// Proyección de lectura: vehículo junto al nombre de su dueño, tal como la
/// devuelve la consulta replicada con JOIN a `Cliente`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehiculoConCliente {
    pub placa: String,
    pub cedula_cliente: String,
    pub marca: String,
    pub modelo: String,
    pub anio: i32,
    pub nombre_cliente: String,
    pub apellido_cliente: String,
}

impl VehiculoConCliente {
    /// Arma la proyección a partir del vehículo y los datos del dueño.
    pub fn desde(vehiculo: &Vehiculo, nombre_cliente: &str, apellido_cliente: &str) -> Self {
        VehiculoConCliente { placa: vehiculo.placa.clone(),
                             cedula_cliente: vehiculo.cedula_cliente.clone(),
                             marca: vehiculo.marca.clone(),
                             modelo: vehiculo.modelo.clone(),
                             anio: vehiculo.anio,
                             nombre_cliente: nombre_cliente.to_string(),
                             apellido_cliente: apellido_cliente.to_string() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehiculo_valido() {
        let v = Vehiculo::nuevo("ABC-1234", "0912345678", "Toyota", "Corolla", 2020).unwrap();
        assert_eq!(v.anio, 2020);
    }

    #[test]
    fn rechaza_anio_fuera_de_rango() {
        let err = Vehiculo::nuevo("ABC-1234", "0912345678", "Toyota", "Corolla", 1880).unwrap_err();
        assert!(matches!(err, DomainError::Validacion(_)));
    }

    #[test]
    fn proyeccion_con_cliente() {
        let v = Vehiculo::nuevo("ABC-1234", "0912345678", "Toyota", "Corolla", 2020).unwrap();
        let con_dueno = VehiculoConCliente::desde(&v, "Carlos", "Mendoza");
        assert_eq!(con_dueno.placa, v.placa);
        assert_eq!(con_dueno.apellido_cliente, "Mendoza");
    }
}
