//! Enrutamiento de entidades a sedes según su modo de distribución.
//!
//! Las tablas replicadas viven con el mismo nombre en todas las sedes; las
//! fragmentadas existen solo en los talleres, con el sufijo de la sede en el
//! nombre físico (`Repuesto_norte`, `Repuesto_sur`). El router traduce
//! entidad + sede destino a la lista de sedes objetivo y al nombre físico,
//! y rechaza de entrada los destinos que no almacenan fragmentos.

use policar_domain::{DomainError, Sede};
use serde::Serialize;

/// Entidades del sistema, una por tabla lógica.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Entidad {
    Cliente,
    Vehiculo,
    EmpleadoNomina,
    EmpleadoInformacion,
    Repuesto,
    Reparacion,
    ReparacionDetalle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModoDistribucion {
    Replicada,
    Fragmentada,
}

impl Entidad {
    pub fn modo(&self) -> ModoDistribucion {
        match self {
            Entidad::Cliente | Entidad::Vehiculo | Entidad::EmpleadoNomina => ModoDistribucion::Replicada,
            Entidad::EmpleadoInformacion | Entidad::Repuesto | Entidad::Reparacion | Entidad::ReparacionDetalle => {
                ModoDistribucion::Fragmentada
            }
        }
    }

    pub fn tabla_logica(&self) -> &'static str {
        match self {
            Entidad::Cliente => "Cliente",
            Entidad::Vehiculo => "Vehiculo",
            Entidad::EmpleadoNomina => "Empleado_nomina",
            Entidad::EmpleadoInformacion => "Empleado_informacion",
            Entidad::Repuesto => "Repuesto",
            Entidad::Reparacion => "Reparacion",
            Entidad::ReparacionDetalle => "Reparacion_detalle",
        }
    }
}

/// Nombre físico de la tabla de `entidad` en `sede`.
///
/// # Errores
/// `SedeSinFragmentos` si la entidad es fragmentada y la sede no es taller.
pub fn tabla_fisica(entidad: Entidad, sede: Sede) -> Result<String, DomainError> {
    match entidad.modo() {
        ModoDistribucion::Replicada => Ok(entidad.tabla_logica().to_string()),
        ModoDistribucion::Fragmentada => {
            if !sede.es_taller() {
                return Err(DomainError::SedeSinFragmentos(sede.to_string()));
            }
            Ok(format!("{}_{}", entidad.tabla_logica(), sede.sufijo()))
        }
    }
}

/// Resultado de resolver una entidad contra las sedes configuradas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolucion {
    pub entidad: Entidad,
    pub modo: ModoDistribucion,
    pub objetivos: Vec<Sede>,
}

/// Decide a qué sedes va una operación sobre `entidad`.
///
/// Replicada: todas las sedes configuradas, en su orden de registro (el
/// destino explícito no aplica y se ignora). Fragmentada con destino: solo
/// esa sede, validando que sea taller. Fragmentada sin destino: todos los
/// talleres configurados, en orden de registro.
pub fn resolver(sedes_configuradas: &[Sede], entidad: Entidad, destino: Option<Sede>)
                -> Result<Resolucion, DomainError> {
    let modo = entidad.modo();
    let objetivos = match (modo, destino) {
        (ModoDistribucion::Replicada, _) => sedes_configuradas.to_vec(),
        (ModoDistribucion::Fragmentada, Some(sede)) => {
            if !sede.es_taller() {
                return Err(DomainError::SedeSinFragmentos(sede.to_string()));
            }
            vec![sede]
        }
        (ModoDistribucion::Fragmentada, None) => {
            sedes_configuradas.iter().copied().filter(Sede::es_taller).collect()
        }
    };
    Ok(Resolucion { entidad, modo, objetivos })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIGURADAS: [Sede; 2] = [Sede::Norte, Sede::Sur];

    #[test]
    fn replicada_va_a_todas_las_sedes() {
        let resolucion = resolver(&CONFIGURADAS, Entidad::Cliente, None).unwrap();
        assert_eq!(resolucion.modo, ModoDistribucion::Replicada);
        assert_eq!(resolucion.objetivos, vec![Sede::Norte, Sede::Sur]);
    }

    #[test]
    fn replicada_ignora_el_destino_explicito() {
        let resolucion = resolver(&CONFIGURADAS, Entidad::EmpleadoNomina, Some(Sede::Sur)).unwrap();
        assert_eq!(resolucion.objetivos, vec![Sede::Norte, Sede::Sur]);
    }

    #[test]
    fn fragmentada_con_destino_va_solo_al_duenio() {
        let resolucion = resolver(&CONFIGURADAS, Entidad::Repuesto, Some(Sede::Sur)).unwrap();
        assert_eq!(resolucion.modo, ModoDistribucion::Fragmentada);
        assert_eq!(resolucion.objetivos, vec![Sede::Sur]);
    }

    #[test]
    fn fragmentada_sin_destino_abarca_los_talleres() {
        let configuradas = [Sede::Norte, Sede::Sur, Sede::Central];
        let resolucion = resolver(&configuradas, Entidad::Reparacion, None).unwrap();
        assert_eq!(resolucion.objetivos, vec![Sede::Norte, Sede::Sur]);
    }

    #[test]
    fn central_no_almacena_fragmentos() {
        let err = resolver(&CONFIGURADAS, Entidad::Repuesto, Some(Sede::Central)).unwrap_err();
        assert_eq!(err.to_string(), "La sede CENTRAL no almacena fragmentos (use NORTE o SUR)");
        assert!(tabla_fisica(Entidad::Reparacion, Sede::Central).is_err());
    }

    #[test]
    fn nombres_fisicos_por_modo() {
        assert_eq!(tabla_fisica(Entidad::Cliente, Sede::Central).unwrap(), "Cliente");
        assert_eq!(tabla_fisica(Entidad::Repuesto, Sede::Norte).unwrap(), "Repuesto_norte");
        assert_eq!(tabla_fisica(Entidad::ReparacionDetalle, Sede::Sur).unwrap(), "Reparacion_detalle_sur");
    }
}
