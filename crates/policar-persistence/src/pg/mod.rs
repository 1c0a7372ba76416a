//! Implementación Postgres (Diesel) del store de una sede.
//!
//! Objetivo general del módulo:
//! - Proveer una capa de persistencia durable con paridad 1:1 respecto al
//!   backend en memoria (`MemSedeStore`): mismos órdenes de listado, mismas
//!   filas afectadas, mismos errores clasificados.
//! - Cada `PgSedeStore` habla con UNA base de datos: la de su sede. La
//!   distribución (replicación y fragmentación) vive en `policar-core`; aquí
//!   no se conoce a las otras sedes.
//! - Las tablas fragmentadas existen con sufijo de taller; el despacho por
//!   sede elige el par de tablas correcto y CENTRAL rechaza los fragmentos.
//! - Diesel es síncrono: cada operación corre en `spawn_blocking` con una
//!   conexión del pool r2d2 de la sede.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::connection::SimpleConnection;
use diesel::dsl::{max, sum};
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager};
use log::{debug, warn};

use policar_core::{ConteosSede, RegistroSedes, ReparacionEliminada, SedeStore, StoreError};
use policar_domain::{Cliente, DomainError, EmpleadoInformacion, EmpleadoNomina, NuevaReparacion, NuevoRepuesto,
                     Reparacion, Repuesto, RepuestoUsado, Sede, Vehiculo, VehiculoConCliente};

use crate::config::DbConfig;
use crate::error::{clasificar_diesel, resolver_transaccion, ErrorTransaccion};
use crate::migrations::run_pending_migrations;
use crate::schema::{cliente, empleado_nomina, vehiculo};

/// Alias de tipo para el pool r2d2 de conexiones Postgres de una sede.
pub type PgPool = r2d2::Pool<ConnectionManager<PgConnection>>;

/// Proveedor abstracto de conexiones.
///
/// Permite inyectar un pool real (producción/tests de integración) o
/// simularlo en tests unitarios sin acoplar a r2d2.
pub trait ConnectionProvider: Send + Sync + 'static {
    /// Obtiene una conexión lista para ejecutar consultas Diesel.
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, StoreError>;
}

/// Implementación de provider a partir de un pool r2d2. Un pool agotado o
/// una base caída se reportan como pérdida de conexión de la sede.
pub struct PoolProvider {
    pub sede: Sede,
    pub pool: PgPool,
}

impl ConnectionProvider for PoolProvider {
    fn connection(&self) -> Result<r2d2::PooledConnection<ConnectionManager<PgConnection>>, StoreError> {
        self.pool.get().map_err(|e| {
                           debug!("pool de {} sin conexión: {e}", self.sede);
                           StoreError::ConexionPerdida(self.sede.to_string())
                       })
    }
}

fn sin_fragmentos(sede: Sede) -> StoreError {
    StoreError::Desconocido(DomainError::SedeSinFragmentos(sede.to_string()).to_string())
}

/// Fila de la tabla replicada `cliente` (lecturas e inserciones).
#[derive(Queryable, Insertable, Debug)]
#[diesel(table_name = cliente)]
struct ClienteRow {
    cedula_cliente: String,
    nombre_cliente: String,
    apellido_cliente: String,
    zona: String,
}

impl ClienteRow {
    fn desde(cliente: &Cliente) -> Self {
        ClienteRow { cedula_cliente: cliente.cedula_cliente.clone(),
                     nombre_cliente: cliente.nombre_cliente.clone(),
                     apellido_cliente: cliente.apellido_cliente.clone(),
                     zona: cliente.zona.clone() }
    }

    fn al_dominio(self) -> Cliente {
        Cliente { cedula_cliente: self.cedula_cliente,
                  nombre_cliente: self.nombre_cliente,
                  apellido_cliente: self.apellido_cliente,
                  zona: self.zona }
    }
}

/// Fila de la tabla replicada `vehiculo`.
#[derive(Queryable, Insertable, Debug)]
#[diesel(table_name = vehiculo)]
struct VehiculoRow {
    placa: String,
    cedula_cliente: String,
    marca: String,
    modelo: String,
    anio: i32,
}

impl VehiculoRow {
    fn desde(vehiculo: &Vehiculo) -> Self {
        VehiculoRow { placa: vehiculo.placa.clone(),
                      cedula_cliente: vehiculo.cedula_cliente.clone(),
                      marca: vehiculo.marca.clone(),
                      modelo: vehiculo.modelo.clone(),
                      anio: vehiculo.anio }
    }
}

/// Fila de la tabla replicada `empleado_nomina`.
#[derive(Queryable, Insertable, Debug)]
#[diesel(table_name = empleado_nomina)]
struct NominaRow {
    cedula_empleado: String,
    fecha_comienzo: NaiveDate,
    salario: f64,
}

impl NominaRow {
    fn desde(nomina: &EmpleadoNomina) -> Self {
        NominaRow { cedula_empleado: nomina.cedula_empleado.clone(),
                    fecha_comienzo: nomina.fecha_comienzo,
                    salario: nomina.salario }
    }

    fn al_dominio(self) -> EmpleadoNomina {
        EmpleadoNomina { cedula_empleado: self.cedula_empleado,
                         fecha_comienzo: self.fecha_comienzo,
                         salario: self.salario }
    }
}

// Las tablas fragmentadas existen por duplicado (sufijo _norte / _sur) y
// Diesel trata cada una como un tipo distinto. El macro instancia las mismas
// consultas sobre el cuarteto de tablas de cada taller; el despacho por sede
// queda en los métodos de `PgSedeStore`.
macro_rules! consultas_fragmento {
    ($modulo:ident, $sede:expr, $info:ident, $repuesto:ident, $reparacion:ident, $detalle:ident) => {
        mod $modulo {
            use super::*;
            use crate::schema::{$detalle, $info, $reparacion, $repuesto};

            pub(super) const SEDE: Sede = $sede;

            pub(super) fn listar_empleados_info(conn: &mut PgConnection)
                                                -> Result<Vec<EmpleadoInformacion>, StoreError> {
                let filas: Vec<(String, String)> = $info::table.select(($info::cedula_empleado,
                                                                        $info::nombre_empleado))
                                                               .order($info::nombre_empleado.asc())
                                                               .load(conn)
                                                               .map_err(|e| clasificar_diesel(SEDE, e))?;
                Ok(filas.into_iter()
                        .map(|(cedula, nombre)| EmpleadoInformacion { cedula_empleado: cedula,
                                                                      nombre_empleado: nombre,
                                                                      sede_taller: SEDE })
                        .collect())
            }

            pub(super) fn buscar_empleado_info(conn: &mut PgConnection, cedula: &str)
                                               -> Result<Option<EmpleadoInformacion>, StoreError> {
                let fila: Option<(String, String)> =
                    $info::table.select(($info::cedula_empleado, $info::nombre_empleado))
                                .filter($info::cedula_empleado.eq(cedula))
                                .first(conn)
                                .optional()
                                .map_err(|e| clasificar_diesel(SEDE, e))?;
                Ok(fila.map(|(cedula, nombre)| EmpleadoInformacion { cedula_empleado: cedula,
                                                                     nombre_empleado: nombre,
                                                                     sede_taller: SEDE }))
            }

            pub(super) fn insertar_empleado_info(conn: &mut PgConnection, info: &EmpleadoInformacion)
                                                 -> Result<(), StoreError> {
                diesel::insert_into($info::table).values(($info::cedula_empleado.eq(&info.cedula_empleado),
                                                          $info::sede_taller.eq(SEDE.codigo()),
                                                          $info::nombre_empleado.eq(&info.nombre_empleado)))
                                                 .execute(conn)
                                                 .map(|_| ())
                                                 .map_err(|e| clasificar_diesel(SEDE, e))
            }

            pub(super) fn actualizar_empleado_info(conn: &mut PgConnection, cedula: &str, nombre: &str)
                                                   -> Result<u64, StoreError> {
                diesel::update($info::table.filter($info::cedula_empleado.eq(cedula)))
                    .set($info::nombre_empleado.eq(nombre))
                    .execute(conn)
                    .map(|filas| filas as u64)
                    .map_err(|e| clasificar_diesel(SEDE, e))
            }

            pub(super) fn eliminar_empleado_info(conn: &mut PgConnection, cedula: &str) -> Result<u64, StoreError> {
                diesel::delete($info::table.filter($info::cedula_empleado.eq(cedula)))
                    .execute(conn)
                    .map(|filas| filas as u64)
                    .map_err(|e| clasificar_diesel(SEDE, e))
            }

            pub(super) fn listar_repuestos(conn: &mut PgConnection) -> Result<Vec<Repuesto>, StoreError> {
                let filas: Vec<(i32, String, String, i32, f64)> =
                    $repuesto::table.select(($repuesto::id_repuesto,
                                             $repuesto::nombre_repuesto,
                                             $repuesto::descripcion_repuesto,
                                             $repuesto::cantidad_repuesto,
                                             $repuesto::precio_unitario))
                                    .order($repuesto::id_repuesto.asc())
                                    .load(conn)
                                    .map_err(|e| clasificar_diesel(SEDE, e))?;
                Ok(filas.into_iter().map(repuesto_al_dominio).collect())
            }

            pub(super) fn buscar_repuesto(conn: &mut PgConnection, id_repuesto: i32)
                                          -> Result<Option<Repuesto>, StoreError> {
                let fila: Option<(i32, String, String, i32, f64)> =
                    $repuesto::table.select(($repuesto::id_repuesto,
                                             $repuesto::nombre_repuesto,
                                             $repuesto::descripcion_repuesto,
                                             $repuesto::cantidad_repuesto,
                                             $repuesto::precio_unitario))
                                    .filter($repuesto::id_repuesto.eq(id_repuesto))
                                    .first(conn)
                                    .optional()
                                    .map_err(|e| clasificar_diesel(SEDE, e))?;
                Ok(fila.map(repuesto_al_dominio))
            }

            pub(super) fn proximo_id_repuesto(conn: &mut PgConnection) -> Result<i32, StoreError> {
                let maximo: Option<i32> = $repuesto::table.select(max($repuesto::id_repuesto))
                                                          .first(conn)
                                                          .map_err(|e| clasificar_diesel(SEDE, e))?;
                Ok(maximo.unwrap_or(0) + 1)
            }

            pub(super) fn insertar_repuesto(conn: &mut PgConnection, repuesto: &Repuesto) -> Result<(), StoreError> {
                diesel::insert_into($repuesto::table)
                    .values(($repuesto::id_repuesto.eq(repuesto.id_repuesto),
                             $repuesto::nombre_repuesto.eq(&repuesto.nombre_repuesto),
                             $repuesto::descripcion_repuesto.eq(&repuesto.descripcion_repuesto),
                             $repuesto::sede_taller.eq(SEDE.codigo()),
                             $repuesto::cantidad_repuesto.eq(repuesto.cantidad_repuesto),
                             $repuesto::precio_unitario.eq(repuesto.precio_unitario)))
                    .execute(conn)
                    .map(|_| ())
                    .map_err(|e| clasificar_diesel(SEDE, e))
            }

            pub(super) fn actualizar_repuesto(conn: &mut PgConnection, id_repuesto: i32, datos: &NuevoRepuesto)
                                              -> Result<u64, StoreError> {
                diesel::update($repuesto::table.filter($repuesto::id_repuesto.eq(id_repuesto)))
                    .set(($repuesto::nombre_repuesto.eq(&datos.nombre_repuesto),
                          $repuesto::descripcion_repuesto.eq(&datos.descripcion_repuesto),
                          $repuesto::cantidad_repuesto.eq(datos.cantidad_repuesto),
                          $repuesto::precio_unitario.eq(datos.precio_unitario)))
                    .execute(conn)
                    .map(|filas| filas as u64)
                    .map_err(|e| clasificar_diesel(SEDE, e))
            }

            pub(super) fn eliminar_repuesto(conn: &mut PgConnection, id_repuesto: i32) -> Result<u64, StoreError> {
                diesel::delete($repuesto::table.filter($repuesto::id_repuesto.eq(id_repuesto)))
                    .execute(conn)
                    .map(|filas| filas as u64)
                    .map_err(|e| clasificar_diesel(SEDE, e))
            }

            pub(super) fn listar_reparaciones(conn: &mut PgConnection) -> Result<Vec<Reparacion>, StoreError> {
                let filas: Vec<(i32, String, NaiveDate, String, f64)> =
                    $reparacion::table.select(($reparacion::id_reparacion,
                                               $reparacion::placa,
                                               $reparacion::fecha_reparacion,
                                               $reparacion::descripcion,
                                               $reparacion::precio_total))
                                      .order(($reparacion::fecha_reparacion.desc(),
                                              $reparacion::id_reparacion.asc()))
                                      .load(conn)
                                      .map_err(|e| clasificar_diesel(SEDE, e))?;
                Ok(filas.into_iter().map(reparacion_al_dominio).collect())
            }

            pub(super) fn buscar_reparacion(conn: &mut PgConnection, id_reparacion: i32)
                                            -> Result<Option<Reparacion>, StoreError> {
                let fila: Option<(i32, String, NaiveDate, String, f64)> =
                    $reparacion::table.select(($reparacion::id_reparacion,
                                               $reparacion::placa,
                                               $reparacion::fecha_reparacion,
                                               $reparacion::descripcion,
                                               $reparacion::precio_total))
                                      .filter($reparacion::id_reparacion.eq(id_reparacion))
                                      .first(conn)
                                      .optional()
                                      .map_err(|e| clasificar_diesel(SEDE, e))?;
                Ok(fila.map(reparacion_al_dominio))
            }

            /// Alta local completa dentro de la transacción de la sede:
            /// id `max + 1`, cabecera, renglones de detalle y descuento de
            /// stock. Si algo falla no queda nada a medias.
            pub(super) fn crear_reparacion(conn: &mut PgConnection, alta: &NuevaReparacion)
                                           -> Result<i32, StoreError> {
                conn.build_transaction()
                    .read_write()
                    .run(|tx| -> Result<i32, ErrorTransaccion> {
                        let maximo: Option<i32> =
                            $reparacion::table.select(max($reparacion::id_reparacion)).first(tx)?;
                        let nuevo_id = maximo.unwrap_or(0) + 1;
                        diesel::insert_into($reparacion::table)
                            .values(($reparacion::id_reparacion.eq(nuevo_id),
                                     $reparacion::placa.eq(&alta.placa),
                                     $reparacion::sede_taller.eq(SEDE.codigo()),
                                     $reparacion::fecha_reparacion.eq(alta.fecha_reparacion),
                                     $reparacion::descripcion.eq(&alta.descripcion),
                                     $reparacion::precio_total.eq(alta.precio_total)))
                            .execute(tx)?;
                        for uso in &alta.repuestos {
                            let descontadas =
                                diesel::update($repuesto::table.filter($repuesto::id_repuesto.eq(uso.id_repuesto)))
                                    .set($repuesto::cantidad_repuesto.eq($repuesto::cantidad_repuesto
                                                                         - uso.cantidad_usada))
                                    .execute(tx)?;
                            if descontadas == 0 {
                                return Err(ErrorTransaccion::Negocio(StoreError::ViolacionClaveForanea(
                                    format!("no existe el repuesto {} en {}", uso.id_repuesto, SEDE))));
                            }
                            diesel::insert_into($detalle::table)
                                .values(($detalle::id_reparacion.eq(nuevo_id),
                                         $detalle::id_repuesto.eq(uso.id_repuesto),
                                         $detalle::cantidad_usada.eq(uso.cantidad_usada)))
                                .execute(tx)?;
                        }
                        Ok(nuevo_id)
                    })
                    .map_err(|e| resolver_transaccion(SEDE, e))
            }

            pub(super) fn actualizar_reparacion(conn: &mut PgConnection, id_reparacion: i32, datos: &NuevaReparacion)
                                                -> Result<u64, StoreError> {
                diesel::update($reparacion::table.filter($reparacion::id_reparacion.eq(id_reparacion)))
                    .set(($reparacion::placa.eq(&datos.placa),
                          $reparacion::fecha_reparacion.eq(datos.fecha_reparacion),
                          $reparacion::descripcion.eq(&datos.descripcion),
                          $reparacion::precio_total.eq(datos.precio_total)))
                    .execute(conn)
                    .map(|filas| filas as u64)
                    .map_err(|e| clasificar_diesel(SEDE, e))
            }

            /// Borra detalle y cabecera en una sola transacción. `None` si la
            /// cabecera no existe en esta sede.
            pub(super) fn eliminar_reparacion(conn: &mut PgConnection, id_reparacion: i32)
                                              -> Result<Option<ReparacionEliminada>, StoreError> {
                conn.build_transaction()
                    .read_write()
                    .run(|tx| -> Result<Option<ReparacionEliminada>, ErrorTransaccion> {
                        let detalles =
                            diesel::delete($detalle::table.filter($detalle::id_reparacion.eq(id_reparacion)))
                                .execute(tx)? as u64;
                        let cabeceras =
                            diesel::delete($reparacion::table.filter($reparacion::id_reparacion.eq(id_reparacion)))
                                .execute(tx)?;
                        if cabeceras == 0 {
                            return Ok(None);
                        }
                        Ok(Some(ReparacionEliminada { id_reparacion, detalles_eliminados: detalles }))
                    })
                    .map_err(|e| resolver_transaccion(SEDE, e))
            }

            pub(super) fn listar_repuestos_de_reparacion(conn: &mut PgConnection, id_reparacion: i32)
                                                         -> Result<Vec<RepuestoUsado>, StoreError> {
                let filas: Vec<(i32, i32, i32, String, String, f64)> =
                    $detalle::table.inner_join($repuesto::table.on($repuesto::id_repuesto.eq($detalle::id_repuesto)))
                                   .filter($detalle::id_reparacion.eq(id_reparacion))
                                   .select(($detalle::id_reparacion,
                                            $detalle::id_repuesto,
                                            $detalle::cantidad_usada,
                                            $repuesto::nombre_repuesto,
                                            $repuesto::descripcion_repuesto,
                                            $repuesto::precio_unitario))
                                   .order($detalle::id_repuesto.asc())
                                   .load(conn)
                                   .map_err(|e| clasificar_diesel(SEDE, e))?;
                Ok(filas.into_iter()
                        .map(|(id_reparacion, id_repuesto, cantidad_usada, nombre, descripcion, precio)| {
                            RepuestoUsado { id_reparacion,
                                            id_repuesto,
                                            cantidad_usada,
                                            nombre_repuesto: nombre,
                                            descripcion_repuesto: descripcion,
                                            precio_unitario: precio,
                                            sede_taller: SEDE }
                        })
                        .collect())
            }

            pub(super) fn conteos_fragmentos(conn: &mut PgConnection) -> Result<(i64, i64, i64, f64), StoreError> {
                let empleados_info: i64 = $info::table.count()
                                                      .get_result(conn)
                                                      .map_err(|e| clasificar_diesel(SEDE, e))?;
                let repuestos: i64 = $repuesto::table.count()
                                                     .get_result(conn)
                                                     .map_err(|e| clasificar_diesel(SEDE, e))?;
                let reparaciones: i64 = $reparacion::table.count()
                                                          .get_result(conn)
                                                          .map_err(|e| clasificar_diesel(SEDE, e))?;
                let ingresos: Option<f64> = $reparacion::table.select(sum($reparacion::precio_total))
                                                              .first(conn)
                                                              .map_err(|e| clasificar_diesel(SEDE, e))?;
                Ok((empleados_info, repuestos, reparaciones, ingresos.unwrap_or(0.0)))
            }

            fn repuesto_al_dominio(fila: (i32, String, String, i32, f64)) -> Repuesto {
                let (id_repuesto, nombre, descripcion, cantidad, precio) = fila;
                Repuesto { id_repuesto,
                           sede_taller: SEDE,
                           nombre_repuesto: nombre,
                           descripcion_repuesto: descripcion,
                           cantidad_repuesto: cantidad,
                           precio_unitario: precio }
            }

            fn reparacion_al_dominio(fila: (i32, String, NaiveDate, String, f64)) -> Reparacion {
                let (id_reparacion, placa, fecha, descripcion, precio) = fila;
                Reparacion { id_reparacion,
                             placa,
                             sede_taller: SEDE,
                             fecha_reparacion: fecha,
                             descripcion,
                             precio_total: precio }
            }
        }
    };
}

consultas_fragmento!(norte, Sede::Norte, empleado_informacion_norte, repuesto_norte, reparacion_norte,
                     reparacion_detalle_norte);
consultas_fragmento!(sur, Sede::Sur, empleado_informacion_sur, repuesto_sur, reparacion_sur, reparacion_detalle_sur);

/// Store Postgres de una sede.
///
/// La instancia se registra en `RegistroSedes` igual que el backend en
/// memoria; la capa distribuida no distingue entre ambos.
pub struct PgSedeStore<P: ConnectionProvider> {
    sede: Sede,
    provider: Arc<P>,
}

impl<P: ConnectionProvider> PgSedeStore<P> {
    pub fn new(sede: Sede, provider: P) -> Self {
        PgSedeStore { sede, provider: Arc::new(provider) }
    }

    /// Ejecuta trabajo Diesel síncrono sobre una conexión del pool, fuera
    /// del runtime async.
    async fn en_conexion<T, F>(&self, trabajo: F) -> Result<T, StoreError>
        where T: Send + 'static,
              F: FnOnce(&mut PgConnection) -> Result<T, StoreError> + Send + 'static
    {
        let provider = Arc::clone(&self.provider);
        let sede = self.sede;
        tokio::task::spawn_blocking(move || {
            let mut conn = provider.connection()?;
            trabajo(&mut conn)
        })
        .await
        .unwrap_or_else(|e| Err(StoreError::Desconocido(format!("tarea de {sede} interrumpida: {e}"))))
    }
}

impl PgSedeStore<PoolProvider> {
    /// Constructor habitual: un pool ya construido para la sede.
    pub fn desde_pool(sede: Sede, pool: PgPool) -> Self {
        PgSedeStore::new(sede, PoolProvider { sede, pool })
    }
}

#[async_trait]
impl<P: ConnectionProvider> SedeStore for PgSedeStore<P> {
    fn sede(&self) -> Sede {
        self.sede
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let sede = self.sede;
        self.en_conexion(move |conn| {
                conn.batch_execute("SELECT 1;").map_err(|e| {
                                                   debug!("ping a {sede} falló: {e}");
                                                   StoreError::ConexionPerdida(sede.to_string())
                                               })
            })
            .await
    }

    // ---- Cliente (replicada) ----

    async fn listar_clientes(&self) -> Result<Vec<Cliente>, StoreError> {
        let sede = self.sede;
        self.en_conexion(move |conn| {
                let filas: Vec<ClienteRow> = cliente::table.order((cliente::apellido_cliente.asc(),
                                                                   cliente::nombre_cliente.asc()))
                                                           .load(conn)
                                                           .map_err(|e| clasificar_diesel(sede, e))?;
                Ok(filas.into_iter().map(ClienteRow::al_dominio).collect())
            })
            .await
    }

    async fn insertar_cliente(&self, cliente: &Cliente) -> Result<(), StoreError> {
        let sede = self.sede;
        let fila = ClienteRow::desde(cliente);
        self.en_conexion(move |conn| {
                diesel::insert_into(cliente::table).values(&fila)
                                                   .execute(conn)
                                                   .map(|_| ())
                                                   .map_err(|e| clasificar_diesel(sede, e))
            })
            .await
    }

    async fn actualizar_cliente(&self, cedula: &str, cliente: &Cliente) -> Result<u64, StoreError> {
        let sede = self.sede;
        let cedula = cedula.to_string();
        let datos = cliente.clone();
        self.en_conexion(move |conn| {
                diesel::update(cliente::table.filter(cliente::cedula_cliente.eq(&cedula)))
                    .set((cliente::nombre_cliente.eq(&datos.nombre_cliente),
                          cliente::apellido_cliente.eq(&datos.apellido_cliente),
                          cliente::zona.eq(&datos.zona)))
                    .execute(conn)
                    .map(|filas| filas as u64)
                    .map_err(|e| clasificar_diesel(sede, e))
            })
            .await
    }

    async fn eliminar_cliente(&self, cedula: &str) -> Result<u64, StoreError> {
        let sede = self.sede;
        let cedula = cedula.to_string();
        self.en_conexion(move |conn| {
                diesel::delete(cliente::table.filter(cliente::cedula_cliente.eq(&cedula)))
                    .execute(conn)
                    .map(|filas| filas as u64)
                    .map_err(|e| clasificar_diesel(sede, e))
            })
            .await
    }

    // ---- Vehiculo (replicada) ----

    async fn listar_vehiculos(&self) -> Result<Vec<VehiculoConCliente>, StoreError> {
        let sede = self.sede;
        self.en_conexion(move |conn| {
                let filas: Vec<(String, String, String, String, i32, String, String)> =
                    vehiculo::table.inner_join(cliente::table.on(cliente::cedula_cliente
                                                                     .eq(vehiculo::cedula_cliente)))
                                   .select((vehiculo::placa,
                                            vehiculo::cedula_cliente,
                                            vehiculo::marca,
                                            vehiculo::modelo,
                                            vehiculo::anio,
                                            cliente::nombre_cliente,
                                            cliente::apellido_cliente))
                                   .order(vehiculo::placa.asc())
                                   .load(conn)
                                   .map_err(|e| clasificar_diesel(sede, e))?;
                Ok(filas.into_iter()
                        .map(|(placa, cedula, marca, modelo, anio, nombre, apellido)| {
                            VehiculoConCliente { placa,
                                                 cedula_cliente: cedula,
                                                 marca,
                                                 modelo,
                                                 anio,
                                                 nombre_cliente: nombre,
                                                 apellido_cliente: apellido }
                        })
                        .collect())
            })
            .await
    }

    async fn insertar_vehiculo(&self, vehiculo: &Vehiculo) -> Result<(), StoreError> {
        let sede = self.sede;
        let fila = VehiculoRow::desde(vehiculo);
        self.en_conexion(move |conn| {
                diesel::insert_into(vehiculo::table).values(&fila)
                                                    .execute(conn)
                                                    .map(|_| ())
                                                    .map_err(|e| clasificar_diesel(sede, e))
            })
            .await
    }

    async fn actualizar_vehiculo(&self, placa: &str, vehiculo: &Vehiculo) -> Result<u64, StoreError> {
        let sede = self.sede;
        let placa = placa.to_string();
        let datos = vehiculo.clone();
        self.en_conexion(move |conn| {
                diesel::update(vehiculo::table.filter(vehiculo::placa.eq(&placa)))
                    .set((vehiculo::cedula_cliente.eq(&datos.cedula_cliente),
                          vehiculo::marca.eq(&datos.marca),
                          vehiculo::modelo.eq(&datos.modelo),
                          vehiculo::anio.eq(datos.anio)))
                    .execute(conn)
                    .map(|filas| filas as u64)
                    .map_err(|e| clasificar_diesel(sede, e))
            })
            .await
    }

    async fn eliminar_vehiculo(&self, placa: &str) -> Result<u64, StoreError> {
        let sede = self.sede;
        let placa = placa.to_string();
        self.en_conexion(move |conn| {
                diesel::delete(vehiculo::table.filter(vehiculo::placa.eq(&placa)))
                    .execute(conn)
                    .map(|filas| filas as u64)
                    .map_err(|e| clasificar_diesel(sede, e))
            })
            .await
    }

    // ---- Empleado información (fragmentada) ----

    async fn listar_empleados_info(&self) -> Result<Vec<EmpleadoInformacion>, StoreError> {
        let sede = self.sede;
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::listar_empleados_info(conn),
                Sede::Sur => sur::listar_empleados_info(conn),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    async fn buscar_empleado_info(&self, cedula: &str) -> Result<Option<EmpleadoInformacion>, StoreError> {
        let sede = self.sede;
        let cedula = cedula.to_string();
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::buscar_empleado_info(conn, &cedula),
                Sede::Sur => sur::buscar_empleado_info(conn, &cedula),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    async fn insertar_empleado_info(&self, info: &EmpleadoInformacion) -> Result<(), StoreError> {
        let sede = self.sede;
        let info = info.clone();
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::insertar_empleado_info(conn, &info),
                Sede::Sur => sur::insertar_empleado_info(conn, &info),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    async fn actualizar_empleado_info(&self, cedula: &str, nombre: &str) -> Result<u64, StoreError> {
        let sede = self.sede;
        let cedula = cedula.to_string();
        let nombre = nombre.to_string();
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::actualizar_empleado_info(conn, &cedula, &nombre),
                Sede::Sur => sur::actualizar_empleado_info(conn, &cedula, &nombre),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    async fn eliminar_empleado_info(&self, cedula: &str) -> Result<u64, StoreError> {
        let sede = self.sede;
        let cedula = cedula.to_string();
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::eliminar_empleado_info(conn, &cedula),
                Sede::Sur => sur::eliminar_empleado_info(conn, &cedula),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    // ---- Empleado nómina (replicada) ----

    async fn listar_nominas(&self) -> Result<Vec<EmpleadoNomina>, StoreError> {
        let sede = self.sede;
        self.en_conexion(move |conn| {
                let filas: Vec<NominaRow> = empleado_nomina::table.order(empleado_nomina::cedula_empleado.asc())
                                                                  .load(conn)
                                                                  .map_err(|e| clasificar_diesel(sede, e))?;
                Ok(filas.into_iter().map(NominaRow::al_dominio).collect())
            })
            .await
    }

    async fn buscar_nomina(&self, cedula: &str) -> Result<Option<EmpleadoNomina>, StoreError> {
        let sede = self.sede;
        let cedula = cedula.to_string();
        self.en_conexion(move |conn| {
                let fila: Option<NominaRow> =
                    empleado_nomina::table.filter(empleado_nomina::cedula_empleado.eq(&cedula))
                                          .first(conn)
                                          .optional()
                                          .map_err(|e| clasificar_diesel(sede, e))?;
                Ok(fila.map(NominaRow::al_dominio))
            })
            .await
    }

    async fn insertar_nomina(&self, nomina: &EmpleadoNomina) -> Result<(), StoreError> {
        let sede = self.sede;
        let fila = NominaRow::desde(nomina);
        self.en_conexion(move |conn| {
                diesel::insert_into(empleado_nomina::table).values(&fila)
                                                           .execute(conn)
                                                           .map(|_| ())
                                                           .map_err(|e| clasificar_diesel(sede, e))
            })
            .await
    }

    async fn actualizar_nomina(&self, cedula: &str, fecha_comienzo: NaiveDate, salario: f64)
                               -> Result<u64, StoreError> {
        let sede = self.sede;
        let cedula = cedula.to_string();
        self.en_conexion(move |conn| {
                diesel::update(empleado_nomina::table.filter(empleado_nomina::cedula_empleado.eq(&cedula)))
                    .set((empleado_nomina::fecha_comienzo.eq(fecha_comienzo),
                          empleado_nomina::salario.eq(salario)))
                    .execute(conn)
                    .map(|filas| filas as u64)
                    .map_err(|e| clasificar_diesel(sede, e))
            })
            .await
    }

    async fn eliminar_nomina(&self, cedula: &str) -> Result<u64, StoreError> {
        let sede = self.sede;
        let cedula = cedula.to_string();
        self.en_conexion(move |conn| {
                diesel::delete(empleado_nomina::table.filter(empleado_nomina::cedula_empleado.eq(&cedula)))
                    .execute(conn)
                    .map(|filas| filas as u64)
                    .map_err(|e| clasificar_diesel(sede, e))
            })
            .await
    }

    // ---- Repuesto (fragmentada) ----

    async fn listar_repuestos(&self) -> Result<Vec<Repuesto>, StoreError> {
        let sede = self.sede;
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::listar_repuestos(conn),
                Sede::Sur => sur::listar_repuestos(conn),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    async fn buscar_repuesto(&self, id_repuesto: i32) -> Result<Option<Repuesto>, StoreError> {
        let sede = self.sede;
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::buscar_repuesto(conn, id_repuesto),
                Sede::Sur => sur::buscar_repuesto(conn, id_repuesto),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    async fn proximo_id_repuesto(&self) -> Result<i32, StoreError> {
        let sede = self.sede;
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::proximo_id_repuesto(conn),
                Sede::Sur => sur::proximo_id_repuesto(conn),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    async fn insertar_repuesto(&self, repuesto: &Repuesto) -> Result<(), StoreError> {
        let sede = self.sede;
        let repuesto = repuesto.clone();
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::insertar_repuesto(conn, &repuesto),
                Sede::Sur => sur::insertar_repuesto(conn, &repuesto),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    async fn actualizar_repuesto(&self, id_repuesto: i32, datos: &NuevoRepuesto) -> Result<u64, StoreError> {
        let sede = self.sede;
        let datos = datos.clone();
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::actualizar_repuesto(conn, id_repuesto, &datos),
                Sede::Sur => sur::actualizar_repuesto(conn, id_repuesto, &datos),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    async fn eliminar_repuesto(&self, id_repuesto: i32) -> Result<u64, StoreError> {
        let sede = self.sede;
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::eliminar_repuesto(conn, id_repuesto),
                Sede::Sur => sur::eliminar_repuesto(conn, id_repuesto),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    // ---- Reparación (fragmentada) ----

    async fn listar_reparaciones(&self) -> Result<Vec<Reparacion>, StoreError> {
        let sede = self.sede;
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::listar_reparaciones(conn),
                Sede::Sur => sur::listar_reparaciones(conn),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    async fn buscar_reparacion(&self, id_reparacion: i32) -> Result<Option<Reparacion>, StoreError> {
        let sede = self.sede;
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::buscar_reparacion(conn, id_reparacion),
                Sede::Sur => sur::buscar_reparacion(conn, id_reparacion),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    async fn crear_reparacion(&self, alta: &NuevaReparacion) -> Result<i32, StoreError> {
        let sede = self.sede;
        let alta = alta.clone();
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::crear_reparacion(conn, &alta),
                Sede::Sur => sur::crear_reparacion(conn, &alta),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    async fn actualizar_reparacion(&self, id_reparacion: i32, datos: &NuevaReparacion) -> Result<u64, StoreError> {
        let sede = self.sede;
        let datos = datos.clone();
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::actualizar_reparacion(conn, id_reparacion, &datos),
                Sede::Sur => sur::actualizar_reparacion(conn, id_reparacion, &datos),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    async fn eliminar_reparacion(&self, id_reparacion: i32) -> Result<Option<ReparacionEliminada>, StoreError> {
        let sede = self.sede;
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::eliminar_reparacion(conn, id_reparacion),
                Sede::Sur => sur::eliminar_reparacion(conn, id_reparacion),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    async fn listar_repuestos_de_reparacion(&self, id_reparacion: i32) -> Result<Vec<RepuestoUsado>, StoreError> {
        let sede = self.sede;
        self.en_conexion(move |conn| match sede {
                Sede::Norte => norte::listar_repuestos_de_reparacion(conn, id_reparacion),
                Sede::Sur => sur::listar_repuestos_de_reparacion(conn, id_reparacion),
                Sede::Central => Err(sin_fragmentos(sede)),
            })
            .await
    }

    // ---- Agregados ----

    async fn conteos(&self) -> Result<ConteosSede, StoreError> {
        let sede = self.sede;
        self.en_conexion(move |conn| {
                let clientes: i64 = cliente::table.count()
                                                  .get_result(conn)
                                                  .map_err(|e| clasificar_diesel(sede, e))?;
                let vehiculos: i64 = vehiculo::table.count()
                                                    .get_result(conn)
                                                    .map_err(|e| clasificar_diesel(sede, e))?;
                let empleados_nomina: i64 = empleado_nomina::table.count()
                                                                  .get_result(conn)
                                                                  .map_err(|e| clasificar_diesel(sede, e))?;
                let (empleados_info, repuestos, reparaciones, ingresos) = match sede {
                    Sede::Norte => norte::conteos_fragmentos(conn)?,
                    Sede::Sur => sur::conteos_fragmentos(conn)?,
                    Sede::Central => (0, 0, 0, 0.0),
                };
                Ok(ConteosSede { clientes,
                                 vehiculos,
                                 empleados_info,
                                 empleados_nomina,
                                 repuestos,
                                 reparaciones,
                                 ingresos })
            })
            .await
    }
}

/// Construye un pool Postgres r2d2 para una sede a partir de su URL.
///
/// Comportamiento:
/// - Valida y ajusta tamaños (si `min_size > max_size`, usa `min_size =
///   max_size`).
/// - Ejecuta las migraciones de la sede inmediatamente tras el primer
///   `get()`.
/// - Una base inalcanzable se reporta como pérdida de conexión de la sede.
pub fn build_pool(sede: Sede, database_url: &str, min_size: u32, max_size: u32) -> Result<PgPool, StoreError> {
    let validated_min = if min_size == 0 { 1 } else { min_size };
    let validated_max = if max_size == 0 { 1 } else { max_size };
    if validated_min > validated_max {
        eprintln!("WARN: min_size > max_size ({} > {}), ajustando min=max",
                  validated_min, validated_max);
    }
    let final_min = validated_min.min(validated_max);
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = r2d2::Pool::builder().min_idle(Some(final_min))
                                    .max_size(validated_max)
                                    .build(manager)
                                    .map_err(|e| {
                                        debug!("pool de {sede} no se pudo construir: {e}");
                                        StoreError::ConexionPerdida(sede.to_string())
                                    })?;
    // Ejecutar migraciones una sola vez al construir (primer connection checkout).
    {
        let mut conn = pool.get().map_err(|e| {
                                     debug!("pool de {sede} sin conexión para migraciones: {e}");
                                     StoreError::ConexionPerdida(sede.to_string())
                                 })?;
        run_pending_migrations(&mut conn, sede)?;
    }
    Ok(pool)
}

/// Helper de desarrollo: carga `.env`, lee la configuración de la sede y
/// construye un pool ya migrado.
pub fn build_dev_pool_from_env(sede: Sede) -> Result<PgPool, StoreError> {
    crate::config::init_dotenv();
    let cfg = DbConfig::para_sede(sede).map_err(|e| StoreError::Desconocido(e.to_string()))?;
    build_pool(sede, &cfg.url, cfg.min_connections, cfg.max_connections)
}

/// Arma el registro distribuido con un `PgSedeStore` por sede configurada
/// en el entorno. Una sede cuya base no responde al arrancar queda fuera
/// del registro y se reporta como sin conexión hasta el próximo arranque.
pub fn registro_desde_env() -> Result<RegistroSedes, StoreError> {
    crate::config::init_dotenv();
    let configuradas = DbConfig::sedes_configuradas();
    if configuradas.is_empty() {
        return Err(StoreError::Desconocido("ninguna sede configurada: defina POLICAR_DB_URL_NORTE, \
                                            POLICAR_DB_URL_SUR o POLICAR_DB_URL_CENTRAL"
                                                                                       .into()));
    }
    let mut registro = RegistroSedes::nuevo();
    for sede in configuradas {
        match build_dev_pool_from_env(sede) {
            Ok(pool) => registro.registrar(Arc::new(PgSedeStore::desde_pool(sede, pool))),
            Err(e) => warn!("sede {sede} fuera de línea al iniciar: {e}"),
        }
    }
    Ok(registro)
}
