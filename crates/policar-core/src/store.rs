//! Contrato con el motor de datos de UNA sede.
//!
//! La capa de orquestación nunca habla SQL: toda interacción con el motor
//! relacional de una sede pasa por este trait. Hay dos implementaciones con
//! paridad de comportamiento: `MemSedeStore` (referencia en memoria, usada
//! por demos y tests) y `PgSedeStore` (Diesel/Postgres, en
//! `policar-persistence`).
//!
//! Contrato general:
//! - Cada método opera SOLO sobre los datos locales de su sede (su copia de
//!   las tablas replicadas y sus propios fragmentos).
//! - Los errores llegan ya clasificados como `StoreError`; el llamador no
//!   vuelve a inspeccionar mensajes crudos.
//! - Las operaciones de actualización/borrado devuelven filas afectadas; el
//!   0 no es error aquí, el servicio decide cómo reportarlo.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use policar_domain::{Cliente, EmpleadoInformacion, EmpleadoNomina, NuevaReparacion, NuevoRepuesto, Reparacion,
                     Repuesto, RepuestoUsado, Sede, Vehiculo, VehiculoConCliente};

use crate::error::StoreError;

/// Conteos agregados de una sede, para estadísticas y resúmenes.
/// `ingresos` es la suma de `precio_total` de las reparaciones locales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConteosSede {
    pub clientes: i64,
    pub vehiculos: i64,
    pub empleados_info: i64,
    pub empleados_nomina: i64,
    pub repuestos: i64,
    pub reparaciones: i64,
    pub ingresos: f64,
}

/// Resultado de eliminar una reparación en la sede dueña: renglones de
/// detalle retirados antes que la cabecera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReparacionEliminada {
    pub id_reparacion: i32,
    pub detalles_eliminados: u64,
}

/// Operaciones que la capa distribuida necesita de una sede.
#[async_trait]
pub trait SedeStore: Send + Sync {
    /// Sede a la que pertenece este store.
    fn sede(&self) -> Sede;

    /// Verificación de conectividad de una sola vez (modelo one-shot: el
    /// resultado vale hasta el próximo intento explícito).
    async fn ping(&self) -> Result<(), StoreError>;

    // ---- Cliente (replicada) ----

    /// Clientes locales ordenados por apellido y nombre.
    async fn listar_clientes(&self) -> Result<Vec<Cliente>, StoreError>;
    async fn insertar_cliente(&self, cliente: &Cliente) -> Result<(), StoreError>;
    async fn actualizar_cliente(&self, cedula: &str, cliente: &Cliente) -> Result<u64, StoreError>;
    async fn eliminar_cliente(&self, cedula: &str) -> Result<u64, StoreError>;

    // ---- Vehiculo (replicada) ----

    /// Vehículos locales con los datos del dueño (JOIN a `Cliente`),
    /// ordenados por placa.
    async fn listar_vehiculos(&self) -> Result<Vec<VehiculoConCliente>, StoreError>;
    async fn insertar_vehiculo(&self, vehiculo: &Vehiculo) -> Result<(), StoreError>;
    async fn actualizar_vehiculo(&self, placa: &str, vehiculo: &Vehiculo) -> Result<u64, StoreError>;
    async fn eliminar_vehiculo(&self, placa: &str) -> Result<u64, StoreError>;

    // ---- Empleado información (fragmentada) ----

    /// Fragmento local de información de empleados, ordenado por nombre.
    async fn listar_empleados_info(&self) -> Result<Vec<EmpleadoInformacion>, StoreError>;
    async fn buscar_empleado_info(&self, cedula: &str) -> Result<Option<EmpleadoInformacion>, StoreError>;
    async fn insertar_empleado_info(&self, info: &EmpleadoInformacion) -> Result<(), StoreError>;
    async fn actualizar_empleado_info(&self, cedula: &str, nombre: &str) -> Result<u64, StoreError>;
    async fn eliminar_empleado_info(&self, cedula: &str) -> Result<u64, StoreError>;

    // ---- Empleado nómina (replicada) ----

    async fn listar_nominas(&self) -> Result<Vec<EmpleadoNomina>, StoreError>;
    async fn buscar_nomina(&self, cedula: &str) -> Result<Option<EmpleadoNomina>, StoreError>;
    async fn insertar_nomina(&self, nomina: &EmpleadoNomina) -> Result<(), StoreError>;
    async fn actualizar_nomina(&self, cedula: &str, fecha_comienzo: NaiveDate, salario: f64)
                               -> Result<u64, StoreError>;
    async fn eliminar_nomina(&self, cedula: &str) -> Result<u64, StoreError>;

    // ---- Repuesto (fragmentada) ----

    /// Fragmento local de repuestos, ordenado por id.
    async fn listar_repuestos(&self) -> Result<Vec<Repuesto>, StoreError>;
    async fn buscar_repuesto(&self, id_repuesto: i32) -> Result<Option<Repuesto>, StoreError>;
    /// Próximo id local: `max(id_repuesto) + 1` dentro de esta sede (los ids
    /// NO son globales: cada fragmento numera por su cuenta).
    async fn proximo_id_repuesto(&self) -> Result<i32, StoreError>;
    async fn insertar_repuesto(&self, repuesto: &Repuesto) -> Result<(), StoreError>;
    async fn actualizar_repuesto(&self, id_repuesto: i32, datos: &NuevoRepuesto) -> Result<u64, StoreError>;
    async fn eliminar_repuesto(&self, id_repuesto: i32) -> Result<u64, StoreError>;

    // ---- Reparación (fragmentada) ----

    /// Fragmento local de reparaciones, de la más reciente a la más antigua.
    async fn listar_reparaciones(&self) -> Result<Vec<Reparacion>, StoreError>;
    async fn buscar_reparacion(&self, id_reparacion: i32) -> Result<Option<Reparacion>, StoreError>;
    /// Alta local completa: asigna id (`max + 1`), inserta cabecera y
    /// renglones de detalle y descuenta el stock usado, todo dentro de la
    /// transacción local de la sede. Devuelve el id asignado.
    async fn crear_reparacion(&self, alta: &NuevaReparacion) -> Result<i32, StoreError>;
    async fn actualizar_reparacion(&self, id_reparacion: i32, datos: &NuevaReparacion) -> Result<u64, StoreError>;
    /// Borra una reparación local junto con su detalle (detalle primero).
    /// `None` si la cabecera no existe en esta sede.
    async fn eliminar_reparacion(&self, id_reparacion: i32) -> Result<Option<ReparacionEliminada>, StoreError>;
    /// Renglones de detalle con los datos del repuesto (JOIN local).
    async fn listar_repuestos_de_reparacion(&self, id_reparacion: i32) -> Result<Vec<RepuestoUsado>, StoreError>;

    // ---- Agregados ----

    async fn conteos(&self) -> Result<ConteosSede, StoreError>;
}
