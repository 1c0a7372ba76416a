// policar-domain library entry point
pub mod cliente;
pub mod empleado;
pub mod error;
pub mod reparacion;
pub mod repuesto;
pub mod sede;
mod validacion;
pub mod vehiculo;

pub use cliente::Cliente;
pub use empleado::{ActualizacionEmpleado, EmpleadoCompleto, EmpleadoInformacion, EmpleadoNomina, NominaEmpleado};
pub use error::DomainError;
pub use reparacion::{NuevaReparacion, Reparacion, ReparacionDetalle, RepuestoUsado, UsoRepuesto};
pub use repuesto::{NuevoRepuesto, Repuesto};
pub use sede::Sede;
pub use vehiculo::{Vehiculo, VehiculoConCliente};
