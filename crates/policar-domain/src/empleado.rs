use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::validacion::{longitud_maxima, no_negativo, no_vacio};
use crate::{DomainError, Sede};

/// Fragmento de información personal del empleado. Tabla fragmentada
/// horizontalmente: cada fila vive únicamente en la sede donde trabaja el
/// empleado.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmpleadoInformacion {
    pub cedula_empleado: String,
    pub nombre_empleado: String,
    pub sede_taller: Sede,
}

impl EmpleadoInformacion {
    pub fn nuevo(cedula: impl Into<String>, nombre: impl Into<String>, sede_taller: Sede) -> Result<Self, DomainError> {
        let info = EmpleadoInformacion { cedula_empleado: cedula.into(),
                                         nombre_empleado: nombre.into(),
                                         sede_taller };
        info.validar()?;
        Ok(info)
    }

    pub fn validar(&self) -> Result<(), DomainError> {
        no_vacio("cedula_empleado", &self.cedula_empleado)?;
        longitud_maxima("cedula_empleado", &self.cedula_empleado, 10)?;
        no_vacio("nombre_empleado", &self.nombre_empleado)?;
        if !self.sede_taller.es_taller() {
            return Err(DomainError::SedeSinFragmentos(self.sede_taller.to_string()));
        }
        Ok(())
    }
}

/// Fragmento salarial del empleado. Tabla replicada: la nómina se consulta
/// desde cualquier sede, por eso cada nodo guarda copia completa.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmpleadoNomina {
    pub cedula_empleado: String,
    pub fecha_comienzo: NaiveDate,
    pub salario: f64,
}

impl EmpleadoNomina {
    pub fn nueva(cedula: impl Into<String>, fecha_comienzo: NaiveDate, salario: f64) -> Result<Self, DomainError> {
        let nomina = EmpleadoNomina { cedula_empleado: cedula.into(),
                                      fecha_comienzo,
                                      salario };
        nomina.validar()?;
        Ok(nomina)
    }

    pub fn validar(&self) -> Result<(), DomainError> {
        no_vacio("cedula_empleado", &self.cedula_empleado)?;
        no_negativo("salario", self.salario)?;
        Ok(())
    }
}

/// Entidad compuesta `Empleado`: une el fragmento de información (fragmentado
/// por sede) con el de nómina (replicado). Es el payload de creación y la
/// vista que reciben los consumidores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmpleadoCompleto {
    pub cedula_empleado: String,
    pub nombre_empleado: String,
    pub sede_taller: Sede,
    pub fecha_comienzo: NaiveDate,
    pub salario: f64,
}

impl EmpleadoCompleto {
    pub fn nuevo(cedula: impl Into<String>,
                 nombre: impl Into<String>,
                 sede_taller: Sede,
                 fecha_comienzo: NaiveDate,
                 salario: f64)
                 -> Result<Self, DomainError> {
        let empleado = EmpleadoCompleto { cedula_empleado: cedula.into(),
                                          nombre_empleado: nombre.into(),
                                          sede_taller,
                                          fecha_comienzo,
                                          salario };
        empleado.validar()?;
        Ok(empleado)
    }

    pub fn validar(&self) -> Result<(), DomainError> {
        self.informacion().validar()?;
        self.nomina().validar()
    }

    /// Parte fragmentada de la entidad compuesta.
    pub fn informacion(&self) -> EmpleadoInformacion {
        EmpleadoInformacion { cedula_empleado: self.cedula_empleado.clone(),
                              nombre_empleado: self.nombre_empleado.clone(),
                              sede_taller: self.sede_taller }
    }

    /// Parte replicada de la entidad compuesta.
    pub fn nomina(&self) -> EmpleadoNomina {
        EmpleadoNomina { cedula_empleado: self.cedula_empleado.clone(),
                         fecha_comienzo: self.fecha_comienzo,
                         salario: self.salario }
    }

    /// Reconstruye la entidad compuesta desde sus dos fragmentos.
    pub fn desde_fragmentos(info: &EmpleadoInformacion, nomina: &EmpleadoNomina) -> Self {
        EmpleadoCompleto { cedula_empleado: info.cedula_empleado.clone(),
                           nombre_empleado: info.nombre_empleado.clone(),
                           sede_taller: info.sede_taller,
                           fecha_comienzo: nomina.fecha_comienzo,
                           salario: nomina.salario }
    }
}

/// Fila de la nómina completa: empleado con su información salarial y los
/// días transcurridos desde su fecha de comienzo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NominaEmpleado {
    pub cedula_empleado: String,
    pub nombre_empleado: String,
    pub sede_taller: Sede,
    pub fecha_comienzo: NaiveDate,
    pub salario: f64,
    pub dias_trabajados: i64,
}

impl NominaEmpleado {
    /// Une información y nómina calculando `dias_trabajados` respecto a `hoy`.
    /// Un empleado con fecha de comienzo futura reporta 0 días.
    pub fn desde(info: &EmpleadoInformacion, nomina: &EmpleadoNomina, hoy: NaiveDate) -> Self {
        let dias = hoy.signed_duration_since(nomina.fecha_comienzo).num_days().max(0);
        NominaEmpleado { cedula_empleado: info.cedula_empleado.clone(),
                         nombre_empleado: info.nombre_empleado.clone(),
                         sede_taller: info.sede_taller,
                         fecha_comienzo: nomina.fecha_comienzo,
                         salario: nomina.salario,
                         dias_trabajados: dias }
    }
}

/// Payload de actualización de un empleado existente. `sede_taller` viene
/// del formulario solo para detectar intentos de cambio de sede: el cambio
/// real se hace con la operación de transferencia, nunca desde aquí.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActualizacionEmpleado {
    pub nombre_empleado: String,
    #[serde(default)]
    pub sede_taller: Option<Sede>,
    pub fecha_comienzo: NaiveDate,
    pub salario: f64,
}

impl ActualizacionEmpleado {
    pub fn validar(&self) -> Result<(), DomainError> {
        no_vacio("nombre_empleado", &self.nombre_empleado)?;
        no_negativo("salario", self.salario)?;
        Ok(())
    }
}
