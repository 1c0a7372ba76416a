//! Fachada de datos del sistema POLI-CAR.
//!
//! `ServicioDatos` es la única puerta de entrada de los consumidores: recibe
//! el registro de sedes ya armado, decide con el router a qué sedes va cada
//! operación y devuelve siempre un sobre `Respuesta` con el detalle por
//! sede. Ningún método devuelve `Err`: todo fallo se absorbe en el sobre,
//! clasificado, para que el consumidor decida qué hacer con él.

use std::future::Future;
use std::sync::Arc;

use chrono::NaiveDate;
use indexmap::IndexMap;
use log::debug;
use serde::Serialize;

use policar_domain::{ActualizacionEmpleado, Cliente, EmpleadoCompleto, EmpleadoInformacion, EmpleadoNomina,
                     NominaEmpleado, NuevaReparacion, NuevoRepuesto, Reparacion, Repuesto, RepuestoUsado, Sede,
                     Vehiculo, VehiculoConCliente};

use crate::compuesto;
use crate::error::StoreError;
use crate::fragmento::{ejecutar_en, leer_fragmentos, LecturaAgregada};
use crate::registro::{EstadoConexiones, RegistroSedes};
use crate::replica::{escribir_en_todas, leer_replicada, ResultadoReplicacion};
use crate::respuesta::{DetalleOperacion, Respuesta, ResultadoSede};
use crate::router::{resolver, Entidad};
use crate::store::{ReparacionEliminada, SedeStore};

/// Bloque del resumen por sede (vista del tablero de administración).
#[derive(Debug, Clone, Serialize)]
pub struct ResumenSede {
    pub sede_taller: String,
    pub nombre_taller: String,
    pub total_clientes: i64,
    pub total_vehiculos: i64,
    pub total_empleados: i64,
    pub total_repuestos: i64,
    pub total_reparaciones: i64,
    pub ingresos_totales: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TotalesResumen {
    pub total_clientes: i64,
    pub total_vehiculos: i64,
    pub total_empleados: i64,
    pub total_reparaciones: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumenSedes {
    pub resumen_por_sedes: Vec<ResumenSede>,
    pub totales: TotalesResumen,
}

/// Estadísticas globales. Los conteos replicados salen de la primera sede
/// que responde; los fragmentados se suman sede por sede.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Estadisticas {
    pub total_clientes: i64,
    pub total_vehiculos: i64,
    pub total_empleados: i64,
    pub total_repuestos: i64,
    pub total_reparaciones: i64,
    pub ingresos_totales: f64,
    pub detalles_por_sede: IndexMap<String, DetalleEstadisticas>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DetalleEstadisticas {
    Conteos {
        clientes: i64,
        vehiculos: i64,
        empleados: i64,
        repuestos: i64,
        reparaciones: i64,
        ingresos: f64,
    },
    Fallo {
        error: String,
    },
}

/// Fachada de todas las operaciones distribuidas del sistema.
pub struct ServicioDatos {
    registro: Arc<RegistroSedes>,
}

impl ServicioDatos {
    pub fn nuevo(registro: Arc<RegistroSedes>) -> Self {
        ServicioDatos { registro }
    }

    pub fn registro(&self) -> &RegistroSedes {
        &self.registro
    }

    fn lista_sedes(sedes: &[Sede]) -> String {
        sedes.iter().map(Sede::codigo).collect::<Vec<_>>().join(", ")
    }

    fn objetivos(&self, entidad: Entidad, destino: Option<Sede>) -> Result<Vec<Sede>, String> {
        resolver(&self.registro.sedes(), entidad, destino).map(|resolucion| resolucion.objetivos)
                                                          .map_err(|err| err.to_string())
    }

    async fn escritura_replicada<T, F, Fut>(&self, entidad: Entidad, op: F) -> Result<ResultadoReplicacion<T>, String>
        where T: Send + 'static,
              F: Fn(Arc<dyn SedeStore>) -> Fut,
              Fut: Future<Output = Result<T, StoreError>> + Send + 'static
    {
        let objetivos = self.objetivos(entidad, None)?;
        Ok(escribir_en_todas(&self.registro, &objetivos, op).await)
    }

    async fn lectura_replicada<T, F, Fut>(&self, entidad: Entidad, op: F) -> Result<(Sede, T), String>
        where F: Fn(Arc<dyn SedeStore>) -> Fut,
              Fut: Future<Output = Result<T, StoreError>>
    {
        let objetivos = self.objetivos(entidad, None)?;
        leer_replicada(&self.registro, &objetivos, op).await.map_err(|err| err.to_string())
    }

    async fn lectura_fragmentada<T, F, Fut>(&self, entidad: Entidad, op: F) -> Result<LecturaAgregada<T>, String>
        where T: Send + 'static,
              F: Fn(Arc<dyn SedeStore>) -> Fut,
              Fut: Future<Output = Result<Vec<T>, StoreError>> + Send + 'static
    {
        let objetivos = self.objetivos(entidad, None)?;
        Ok(leer_fragmentos(&self.registro, &objetivos, op).await)
    }

    /// Sobre estándar de una unión de fragmentos: falla solo si ningún
    /// taller respondió.
    fn envolver_union<T>(lectura: LecturaAgregada<T>, descripcion: &str) -> Respuesta<Vec<T>> {
        let detalles = lectura.detalles();
        if !lectura.disponible() {
            let motivo = lectura.primer_error()
                                .map(|err| err.to_string())
                                .unwrap_or_else(|| "ningún taller configurado".to_string());
            return Respuesta::fallo(format!("No se pudo leer {descripcion} en ningún taller: {motivo}"))
                             .con_detalles(detalles);
        }
        let consultadas = lectura.por_sede.len() - lectura.sedes_caidas().len();
        let total = lectura.filas.len();
        Respuesta::ok(lectura.filas, format!("{total} {descripcion} de {consultadas} taller(es)")).con_detalles(detalles)
    }

    /// Sobre estándar de una escritura replicada de filas afectadas: exitosa
    /// si alguna sede aplicó el cambio y al menos una fila cambió.
    fn envolver_filas(resultado: ResultadoReplicacion<u64>, accion: &str, no_encontrado: String) -> Respuesta<u64> {
        let detalles = resultado.detalles();
        if !resultado.exito_global() {
            let motivo = resultado.primer_error()
                                  .map(|err| err.to_string())
                                  .unwrap_or_else(|| "ninguna sede configurada".to_string());
            return Respuesta::fallo(format!("{accion} falló en todas las sedes: {motivo}")).con_detalles(detalles);
        }
        let filas = resultado.filas_afectadas();
        if filas == 0 {
            return Respuesta::fallo(no_encontrado).con_detalles(detalles);
        }
        Respuesta::ok(filas,
                      format!("{accion} en {} de {} sede(s): {}",
                              resultado.exitos(),
                              resultado.total(),
                              Self::lista_sedes(&resultado.sedes_exitosas()))).con_detalles(detalles)
    }

    // ---- Estado ----

    /// Verifica todas las sedes configuradas y devuelve la foto de
    /// conectividad. Repetir la llamada sin cambios en la red da el mismo
    /// resultado.
    pub async fn estado_conexiones(&self) -> Respuesta<EstadoConexiones> {
        let estado = self.registro.conectar_todas().await;
        let mensaje = format!("{} de {} sede(s) conectadas",
                              estado.resumen.conectadas, estado.resumen.total);
        Respuesta::ok(estado, mensaje)
    }

    // ---- Clientes (replicados) ----

    pub async fn obtener_clientes(&self) -> Respuesta<Vec<Cliente>> {
        match self.lectura_replicada(Entidad::Cliente, |store| async move { store.listar_clientes().await }).await {
            Ok((sede, filas)) => {
                let total = filas.len();
                Respuesta::ok(filas, format!("{total} cliente(s) obtenidos desde {sede}"))
            }
            Err(mensaje) => Respuesta::fallo(format!("No se pudieron obtener los clientes: {mensaje}")),
        }
    }

    pub async fn crear_cliente(&self, cliente: &Cliente) -> Respuesta<Cliente> {
        if let Err(err) = cliente.validar() {
            return Respuesta::fallo(err.to_string());
        }
        let fila = cliente.clone();
        let resultado = match self.escritura_replicada(Entidad::Cliente, move |store| {
                                  let fila = fila.clone();
                                  async move { store.insertar_cliente(&fila).await }
                              }).await
        {
            Ok(resultado) => resultado,
            Err(mensaje) => return Respuesta::fallo(mensaje),
        };
        let detalles = resultado.detalles();
        if !resultado.exito_global() {
            let motivo = resultado.primer_error()
                                  .map(|err| err.to_string())
                                  .unwrap_or_else(|| "ninguna sede configurada".to_string());
            return Respuesta::fallo(format!("No se pudo crear el cliente en ninguna sede: {motivo}"))
                             .con_detalles(detalles);
        }
        Respuesta::ok(cliente.clone(),
                      format!("Cliente creado en {} de {} sede(s): {}",
                              resultado.exitos(),
                              resultado.total(),
                              Self::lista_sedes(&resultado.sedes_exitosas()))).con_detalles(detalles)
    }

    pub async fn actualizar_cliente(&self, cedula: &str, cliente: &Cliente) -> Respuesta<u64> {
        if let Err(err) = cliente.validar() {
            return Respuesta::fallo(err.to_string());
        }
        let cedula_buscada = cedula.to_string();
        let fila = cliente.clone();
        match self.escritura_replicada(Entidad::Cliente, move |store| {
                  let cedula = cedula_buscada.clone();
                  let fila = fila.clone();
                  async move { store.actualizar_cliente(&cedula, &fila).await }
              }).await
        {
            Ok(resultado) => {
                Self::envolver_filas(resultado, "Cliente actualizado", format!("Cliente no encontrado: {cedula}"))
            }
            Err(mensaje) => Respuesta::fallo(mensaje),
        }
    }

    pub async fn eliminar_cliente(&self, cedula: &str) -> Respuesta<u64> {
        let cedula_buscada = cedula.to_string();
        match self.escritura_replicada(Entidad::Cliente, move |store| {
                  let cedula = cedula_buscada.clone();
                  async move { store.eliminar_cliente(&cedula).await }
              }).await
        {
            Ok(resultado) => {
                Self::envolver_filas(resultado, "Cliente eliminado", format!("Cliente no encontrado: {cedula}"))
            }
            Err(mensaje) => Respuesta::fallo(mensaje),
        }
    }

    // ---- Vehículos (replicados) ----

    pub async fn obtener_vehiculos(&self) -> Respuesta<Vec<VehiculoConCliente>> {
        match self.lectura_replicada(Entidad::Vehiculo, |store| async move { store.listar_vehiculos().await }).await {
            Ok((sede, filas)) => {
                let total = filas.len();
                Respuesta::ok(filas, format!("{total} vehículo(s) obtenidos desde {sede}"))
            }
            Err(mensaje) => Respuesta::fallo(format!("No se pudieron obtener los vehículos: {mensaje}")),
        }
    }

    pub async fn crear_vehiculo(&self, vehiculo: &Vehiculo) -> Respuesta<Vehiculo> {
        if let Err(err) = vehiculo.validar() {
            return Respuesta::fallo(err.to_string());
        }
        let fila = vehiculo.clone();
        let resultado = match self.escritura_replicada(Entidad::Vehiculo, move |store| {
                                  let fila = fila.clone();
                                  async move { store.insertar_vehiculo(&fila).await }
                              }).await
        {
            Ok(resultado) => resultado,
            Err(mensaje) => return Respuesta::fallo(mensaje),
        };
        let detalles = resultado.detalles();
        if !resultado.exito_global() {
            let motivo = resultado.primer_error()
                                  .map(|err| err.to_string())
                                  .unwrap_or_else(|| "ninguna sede configurada".to_string());
            return Respuesta::fallo(format!("No se pudo crear el vehículo en ninguna sede: {motivo}"))
                             .con_detalles(detalles);
        }
        Respuesta::ok(vehiculo.clone(),
                      format!("Vehículo creado en {} de {} sede(s): {}",
                              resultado.exitos(),
                              resultado.total(),
                              Self::lista_sedes(&resultado.sedes_exitosas()))).con_detalles(detalles)
    }

    pub async fn actualizar_vehiculo(&self, placa: &str, vehiculo: &Vehiculo) -> Respuesta<u64> {
        if let Err(err) = vehiculo.validar() {
            return Respuesta::fallo(err.to_string());
        }
        let placa_buscada = placa.to_string();
        let fila = vehiculo.clone();
        match self.escritura_replicada(Entidad::Vehiculo, move |store| {
                  let placa = placa_buscada.clone();
                  let fila = fila.clone();
                  async move { store.actualizar_vehiculo(&placa, &fila).await }
              }).await
        {
            Ok(resultado) => {
                Self::envolver_filas(resultado, "Vehículo actualizado", format!("Vehículo no encontrado: {placa}"))
            }
            Err(mensaje) => Respuesta::fallo(mensaje),
        }
    }

    pub async fn eliminar_vehiculo(&self, placa: &str) -> Respuesta<u64> {
        let placa_buscada = placa.to_string();
        match self.escritura_replicada(Entidad::Vehiculo, move |store| {
                  let placa = placa_buscada.clone();
                  async move { store.eliminar_vehiculo(&placa).await }
              }).await
        {
            Ok(resultado) => {
                Self::envolver_filas(resultado, "Vehículo eliminado", format!("Vehículo no encontrado: {placa}"))
            }
            Err(mensaje) => Respuesta::fallo(mensaje),
        }
    }

    // ---- Empleados (entidad compuesta) ----

    pub async fn obtener_empleados(&self) -> Respuesta<Vec<EmpleadoInformacion>> {
        match self.lectura_fragmentada(Entidad::EmpleadoInformacion,
                                       |store| async move { store.listar_empleados_info().await }).await
        {
            Ok(lectura) => Self::envolver_union(lectura, "empleado(s)"),
            Err(mensaje) => Respuesta::fallo(mensaje),
        }
    }

    pub async fn obtener_empleados_por_sede(&self, sede: Sede) -> Respuesta<Vec<EmpleadoInformacion>> {
        if let Err(mensaje) = self.objetivos(Entidad::EmpleadoInformacion, Some(sede)) {
            return Respuesta::fallo(mensaje);
        }
        match ejecutar_en(&self.registro, sede, |store| async move { store.listar_empleados_info().await }).await {
            Ok(filas) => {
                let total = filas.len();
                Respuesta::ok(filas, format!("{total} empleado(s) en {sede}"))
            }
            Err(err) => Respuesta::fallo(format!("No se pudieron obtener los empleados de {sede}: {err}")),
        }
    }

    pub async fn obtener_nomina_completa(&self) -> Respuesta<Vec<NominaEmpleado>> {
        compuesto::nomina_completa(&self.registro).await
    }

    pub async fn obtener_empleado(&self, cedula: &str) -> Respuesta<EmpleadoCompleto> {
        compuesto::obtener_empleado(&self.registro, cedula).await
    }

    pub async fn crear_empleado_completo(&self, empleado: &EmpleadoCompleto) -> Respuesta<EmpleadoCompleto> {
        compuesto::crear_empleado_completo(&self.registro, empleado).await
    }

    pub async fn actualizar_empleado(&self, cedula: &str, cambios: &ActualizacionEmpleado) -> Respuesta<u64> {
        compuesto::actualizar_empleado(&self.registro, cedula, cambios).await
    }

    pub async fn transferir_empleado(&self, cedula: &str, destino: Sede) -> Respuesta<EmpleadoInformacion> {
        compuesto::transferir_empleado(&self.registro, cedula, destino).await
    }

    pub async fn eliminar_empleado(&self, cedula: &str) -> Respuesta<u64> {
        compuesto::eliminar_empleado(&self.registro, cedula).await
    }

    /// Actualiza solo el fragmento replicado de nómina, en todas las sedes.
    pub async fn actualizar_nomina(&self, cedula: &str, fecha_comienzo: NaiveDate, salario: f64) -> Respuesta<u64> {
        let nomina = match EmpleadoNomina::nueva(cedula, fecha_comienzo, salario) {
            Ok(nomina) => nomina,
            Err(err) => return Respuesta::fallo(err.to_string()),
        };
        let cedula_buscada = nomina.cedula_empleado.clone();
        match self.escritura_replicada(Entidad::EmpleadoNomina, move |store| {
                  let cedula = cedula_buscada.clone();
                  async move { store.actualizar_nomina(&cedula, fecha_comienzo, salario).await }
              }).await
        {
            Ok(resultado) => {
                Self::envolver_filas(resultado, "Nómina actualizada", format!("Nómina no encontrada: {cedula}"))
            }
            Err(mensaje) => Respuesta::fallo(mensaje),
        }
    }

    // ---- Repuestos (fragmentados) ----

    pub async fn obtener_todos_repuestos(&self) -> Respuesta<Vec<Repuesto>> {
        match self.lectura_fragmentada(Entidad::Repuesto, |store| async move { store.listar_repuestos().await }).await {
            Ok(lectura) => Self::envolver_union(lectura, "repuesto(s)"),
            Err(mensaje) => Respuesta::fallo(mensaje),
        }
    }

    pub async fn obtener_repuestos_por_sede(&self, sede: Sede) -> Respuesta<Vec<Repuesto>> {
        if let Err(mensaje) = self.objetivos(Entidad::Repuesto, Some(sede)) {
            return Respuesta::fallo(mensaje);
        }
        match ejecutar_en(&self.registro, sede, |store| async move { store.listar_repuestos().await }).await {
            Ok(filas) => {
                let total = filas.len();
                Respuesta::ok(filas, format!("{total} repuesto(s) en {sede}"))
            }
            Err(err) => Respuesta::fallo(format!("No se pudieron obtener los repuestos de {sede}: {err}")),
        }
    }

    pub async fn obtener_repuesto(&self, sede: Sede, id_repuesto: i32) -> Respuesta<Repuesto> {
        if let Err(mensaje) = self.objetivos(Entidad::Repuesto, Some(sede)) {
            return Respuesta::fallo(mensaje);
        }
        match ejecutar_en(&self.registro, sede, |store| async move { store.buscar_repuesto(id_repuesto).await }).await {
            Ok(Some(fila)) => Respuesta::ok(fila, format!("Repuesto {id_repuesto} obtenido de {sede}")),
            Ok(None) => Respuesta::fallo(format!("Repuesto {id_repuesto} no encontrado en {sede}")),
            Err(err) => Respuesta::fallo(format!("No se pudo obtener el repuesto {id_repuesto} de {sede}: {err}")),
        }
    }

    /// Alta de repuesto en su taller: el id se asigna ahí mismo con el
    /// máximo local + 1, por eso solo es único dentro de la sede.
    pub async fn crear_repuesto(&self, datos: &NuevoRepuesto) -> Respuesta<Repuesto> {
        if let Err(err) = datos.validar() {
            return Respuesta::fallo(err.to_string());
        }
        let sede = datos.sede_taller;
        if let Err(mensaje) = self.objetivos(Entidad::Repuesto, Some(sede)) {
            return Respuesta::fallo(mensaje);
        }
        let alta = datos.clone();
        match ejecutar_en(&self.registro, sede, |store| async move {
                  let id = store.proximo_id_repuesto().await?;
                  let fila = alta.con_id(id);
                  store.insertar_repuesto(&fila).await?;
                  Ok(fila)
              }).await
        {
            Ok(fila) => {
                let id = fila.id_repuesto;
                Respuesta::ok(fila, format!("Repuesto {id} creado en {sede}"))
            }
            Err(err) => Respuesta::fallo(format!("No se pudo crear el repuesto en {sede}: {err}")),
        }
    }

    pub async fn actualizar_repuesto(&self, sede: Sede, id_repuesto: i32, datos: &NuevoRepuesto) -> Respuesta<u64> {
        if let Err(err) = datos.validar() {
            return Respuesta::fallo(err.to_string());
        }
        if let Err(mensaje) = self.objetivos(Entidad::Repuesto, Some(sede)) {
            return Respuesta::fallo(mensaje);
        }
        if datos.sede_taller != sede {
            return Respuesta::fallo(format!("El repuesto {id_repuesto} pertenece al fragmento de {sede}; una \
                                             actualización no lo mueve de sede"));
        }
        let cambios = datos.clone();
        match ejecutar_en(&self.registro, sede, |store| async move {
                  store.actualizar_repuesto(id_repuesto, &cambios).await
              }).await
        {
            Ok(0) => Respuesta::fallo(format!("Repuesto {id_repuesto} no encontrado en {sede}")),
            Ok(filas) => Respuesta::ok(filas, format!("Repuesto {id_repuesto} actualizado en {sede}")),
            Err(err) => Respuesta::fallo(format!("No se pudo actualizar el repuesto {id_repuesto} en {sede}: {err}")),
        }
    }

    pub async fn eliminar_repuesto(&self, sede: Sede, id_repuesto: i32) -> Respuesta<u64> {
        if let Err(mensaje) = self.objetivos(Entidad::Repuesto, Some(sede)) {
            return Respuesta::fallo(mensaje);
        }
        match ejecutar_en(&self.registro, sede, |store| async move { store.eliminar_repuesto(id_repuesto).await }).await
        {
            Ok(0) => Respuesta::fallo(format!("Repuesto {id_repuesto} no encontrado en {sede}")),
            Ok(filas) => Respuesta::ok(filas, format!("Repuesto {id_repuesto} eliminado de {sede}")),
            Err(err) => Respuesta::fallo(format!("No se pudo eliminar el repuesto {id_repuesto} de {sede}: {err}")),
        }
    }

    // ---- Reparaciones (fragmentadas) ----

    pub async fn obtener_todas_reparaciones(&self) -> Respuesta<Vec<Reparacion>> {
        match self.lectura_fragmentada(Entidad::Reparacion, |store| async move { store.listar_reparaciones().await })
                  .await
        {
            Ok(lectura) => Self::envolver_union(lectura, "reparación(es)"),
            Err(mensaje) => Respuesta::fallo(mensaje),
        }
    }

    pub async fn obtener_reparaciones_por_sede(&self, sede: Sede) -> Respuesta<Vec<Reparacion>> {
        if let Err(mensaje) = self.objetivos(Entidad::Reparacion, Some(sede)) {
            return Respuesta::fallo(mensaje);
        }
        match ejecutar_en(&self.registro, sede, |store| async move { store.listar_reparaciones().await }).await {
            Ok(filas) => {
                let total = filas.len();
                Respuesta::ok(filas, format!("{total} reparación(es) en {sede}"))
            }
            Err(err) => Respuesta::fallo(format!("No se pudieron obtener las reparaciones de {sede}: {err}")),
        }
    }

    /// Alta de reparación en su taller, con los repuestos usados y el
    /// descuento de stock aplicados por el store bajo su transacción local.
    pub async fn crear_reparacion(&self, alta: &NuevaReparacion) -> Respuesta<Reparacion> {
        if let Err(err) = alta.validar() {
            return Respuesta::fallo(err.to_string());
        }
        let sede = alta.sede_taller;
        if let Err(mensaje) = self.objetivos(Entidad::Reparacion, Some(sede)) {
            return Respuesta::fallo(mensaje);
        }
        let datos = alta.clone();
        match ejecutar_en(&self.registro, sede, |store| async move { store.crear_reparacion(&datos).await }).await {
            Ok(id) => {
                let mensaje = if alta.repuestos.is_empty() {
                    format!("Reparación {id} creada exitosamente en {sede}")
                } else {
                    format!("Reparación {id} creada exitosamente en {sede} con {} repuesto(s)", alta.repuestos.len())
                };
                Respuesta::ok(alta.con_id(id), mensaje)
            }
            Err(err) => Respuesta::fallo(format!("No se pudo crear la reparación en {sede}: {err}")),
        }
    }

    pub async fn actualizar_reparacion(&self, sede: Sede, id_reparacion: i32, datos: &NuevaReparacion)
                                       -> Respuesta<u64> {
        if let Err(err) = datos.validar() {
            return Respuesta::fallo(err.to_string());
        }
        if let Err(mensaje) = self.objetivos(Entidad::Reparacion, Some(sede)) {
            return Respuesta::fallo(mensaje);
        }
        if datos.sede_taller != sede {
            return Respuesta::fallo(format!("La reparación {id_reparacion} pertenece al fragmento de {sede}; una \
                                             actualización no la mueve de sede"));
        }
        let cambios = datos.clone();
        match ejecutar_en(&self.registro, sede, |store| async move {
                  store.actualizar_reparacion(id_reparacion, &cambios).await
              }).await
        {
            Ok(0) => Respuesta::fallo(format!("Reparación {id_reparacion} no encontrada en {sede}")),
            Ok(filas) => Respuesta::ok(filas, format!("Reparación {id_reparacion} actualizada en {sede}")),
            Err(err) => {
                Respuesta::fallo(format!("No se pudo actualizar la reparación {id_reparacion} en {sede}: {err}"))
            }
        }
    }

    /// Baja de una reparación sin conocer su taller: se buscan los talleres
    /// en orden y el primero que la tenga borra primero el detalle y luego
    /// la cabecera, reportando cuántos detalles cayeron con ella.
    pub async fn eliminar_reparacion(&self, id_reparacion: i32) -> Respuesta<ReparacionEliminada> {
        let talleres = match self.objetivos(Entidad::Reparacion, None) {
            Ok(sedes) => sedes,
            Err(mensaje) => return Respuesta::fallo(mensaje),
        };
        let mut detalles = DetalleOperacion::new();
        for sede in talleres {
            match ejecutar_en(&self.registro, sede, |store| async move { store.eliminar_reparacion(id_reparacion).await })
                      .await
            {
                Ok(Some(eliminada)) => {
                    detalles.insert(sede.codigo().to_string(), ResultadoSede::ok());
                    return Respuesta::ok(eliminada,
                                         format!("Reparación {id_reparacion} eliminada de {sede}: {} detalle(s) \
                                                  eliminados",
                                                 eliminada.detalles_eliminados)).con_detalles(detalles);
                }
                Ok(None) => {
                    detalles.insert(sede.codigo().to_string(), ResultadoSede::ok());
                }
                Err(err) => {
                    debug!("eliminar reparación {id_reparacion}: sede {sede} no respondió ({err})");
                    detalles.insert(sede.codigo().to_string(), ResultadoSede::fallo(&err));
                }
            }
        }
        Respuesta::fallo(format!("Reparación {id_reparacion} no encontrada en ningún taller")).con_detalles(detalles)
    }

    /// Repuestos usados por una reparación: gana el primer taller que tenga
    /// filas para ese id (los ids se repiten entre talleres).
    pub async fn obtener_repuestos_de_reparacion(&self, id_reparacion: i32) -> Respuesta<Vec<RepuestoUsado>> {
        let talleres = match self.objetivos(Entidad::ReparacionDetalle, None) {
            Ok(sedes) => sedes,
            Err(mensaje) => return Respuesta::fallo(mensaje),
        };
        for sede in talleres {
            match ejecutar_en(&self.registro, sede, |store| async move {
                      store.listar_repuestos_de_reparacion(id_reparacion).await
                  }).await
            {
                Ok(filas) if !filas.is_empty() => {
                    let total = filas.len();
                    return Respuesta::ok(filas,
                                         format!("{total} repuesto(s) usados en la reparación {id_reparacion} \
                                                  ({sede})"));
                }
                Ok(_) => {}
                Err(err) => {
                    debug!("repuestos de reparación {id_reparacion}: sede {sede} no respondió ({err})");
                }
            }
        }
        Respuesta::ok(Vec::new(), format!("La reparación {id_reparacion} no tiene repuestos registrados"))
    }

    // ---- Consultas distribuidas ----

    /// Resumen por sede para el tablero. Los conteos replicados (clientes,
    /// vehículos) se toman solo del primer taller para no duplicarlos; un
    /// taller que falla aparece con su bloque en cero.
    pub async fn obtener_resumen_sedes(&self) -> Respuesta<ResumenSedes> {
        let talleres = match self.objetivos(Entidad::Reparacion, None) {
            Ok(sedes) => sedes,
            Err(mensaje) => return Respuesta::fallo(mensaje),
        };
        let mut bloques = Vec::new();
        let mut totales = TotalesResumen::default();
        for (posicion, sede) in talleres.iter().enumerate() {
            let store = match self.registro.get(*sede) {
                Some(store) => store,
                None => {
                    debug!("resumen: sede {sede} sin conexión, se omite");
                    continue;
                }
            };
            let conteos = store.conteos().await.unwrap_or_default();
            let replicados = posicion == 0;
            let bloque = ResumenSede { sede_taller: sede.codigo().to_string(),
                                       nombre_taller: format!("Taller POLI-CAR {sede}"),
                                       total_clientes: if replicados { conteos.clientes } else { 0 },
                                       total_vehiculos: if replicados { conteos.vehiculos } else { 0 },
                                       total_empleados: conteos.empleados_info,
                                       total_repuestos: conteos.repuestos,
                                       total_reparaciones: conteos.reparaciones,
                                       ingresos_totales: conteos.ingresos };
            totales.total_clientes += bloque.total_clientes;
            totales.total_vehiculos += bloque.total_vehiculos;
            totales.total_empleados += bloque.total_empleados;
            totales.total_reparaciones += bloque.total_reparaciones;
            bloques.push(bloque);
        }
        Respuesta::ok(ResumenSedes { resumen_por_sedes: bloques,
                                     totales },
                      "Resumen obtenido exitosamente".to_string())
    }

    /// Estadísticas globales del sistema distribuido. Conteos replicados de
    /// la primera sede que responde; fragmentados sumados sede a sede. Una
    /// sede que falla queda en `detalles_por_sede` con su error.
    pub async fn obtener_estadisticas(&self) -> Respuesta<Estadisticas> {
        let talleres = match self.objetivos(Entidad::Reparacion, None) {
            Ok(sedes) => sedes,
            Err(mensaje) => return Respuesta::fallo(mensaje),
        };
        let mut estadisticas = Estadisticas::default();
        let mut replicados_obtenidos = false;
        for sede in talleres {
            let store = match self.registro.get(sede) {
                Some(store) => store,
                None => {
                    debug!("estadísticas: sede {sede} sin conexión, se omite");
                    continue;
                }
            };
            match store.conteos().await {
                Err(err) => {
                    estadisticas.detalles_por_sede
                                .insert(sede.codigo().to_string(),
                                        DetalleEstadisticas::Fallo { error: err.to_string() });
                }
                Ok(conteos) => {
                    if !replicados_obtenidos {
                        estadisticas.total_clientes = conteos.clientes;
                        estadisticas.total_vehiculos = conteos.vehiculos;
                        estadisticas.total_empleados = conteos.empleados_nomina;
                        replicados_obtenidos = true;
                    }
                    estadisticas.total_repuestos += conteos.repuestos;
                    estadisticas.total_reparaciones += conteos.reparaciones;
                    estadisticas.ingresos_totales += conteos.ingresos;
                    estadisticas.detalles_por_sede
                                .insert(sede.codigo().to_string(),
                                        DetalleEstadisticas::Conteos { clientes: conteos.clientes,
                                                                       vehiculos: conteos.vehiculos,
                                                                       empleados: conteos.empleados_info,
                                                                       repuestos: conteos.repuestos,
                                                                       reparaciones: conteos.reparaciones,
                                                                       ingresos: conteos.ingresos });
                }
            }
        }
        Respuesta::ok(estadisticas, "Estadísticas distribuidas obtenidas".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memoria::MemSedeStore;

    fn fecha(anio: i32, mes: u32, dia: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(anio, mes, dia).unwrap()
    }

    async fn servicio() -> (ServicioDatos, Arc<MemSedeStore>, Arc<MemSedeStore>) {
        let norte = Arc::new(MemSedeStore::nuevo(Sede::Norte));
        let sur = Arc::new(MemSedeStore::nuevo(Sede::Sur));
        let registro = Arc::new(RegistroSedes::con_nodos(vec![norte.clone(), sur.clone()]));
        registro.conectar_todas().await;
        (ServicioDatos::nuevo(registro), norte, sur)
    }

    fn cliente() -> Cliente {
        Cliente::nuevo("0912345678", "Carlos", "Mendoza", "Norte").unwrap()
    }

    #[tokio::test]
    async fn crear_cliente_reporta_las_sedes_exitosas() {
        let (servicio, _norte, sur) = servicio().await;
        sur.desconectar();

        let respuesta = servicio.crear_cliente(&cliente()).await;
        assert!(respuesta.exito);
        assert_eq!(respuesta.mensaje, "Cliente creado en 1 de 2 sede(s): NORTE");
        let detalles = respuesta.detalles.unwrap();
        assert!(detalles["NORTE"].exito);
        assert!(!detalles["SUR"].exito);
    }

    #[tokio::test]
    async fn actualizar_cliente_inexistente_no_es_exito() {
        let (servicio, _norte, _sur) = servicio().await;
        let respuesta = servicio.actualizar_cliente("0999999999", &cliente()).await;
        assert!(!respuesta.exito);
        assert!(respuesta.mensaje.contains("no encontrado"));
    }

    #[tokio::test]
    async fn los_ids_de_repuesto_son_independientes_por_taller() {
        let (servicio, _norte, _sur) = servicio().await;
        let norte = NuevoRepuesto { sede_taller: Sede::Norte,
                                    nombre_repuesto: "Filtro de aceite".into(),
                                    descripcion_repuesto: String::new(),
                                    cantidad_repuesto: 10,
                                    precio_unitario: 8.5 };
        let sur = NuevoRepuesto { sede_taller: Sede::Sur, ..norte.clone() };

        let r1 = servicio.crear_repuesto(&norte).await;
        let r2 = servicio.crear_repuesto(&sur).await;
        assert_eq!(r1.data.unwrap().id_repuesto, 1);
        assert_eq!(r2.data.unwrap().id_repuesto, 1);

        let todos = servicio.obtener_todos_repuestos().await;
        assert_eq!(todos.data.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn eliminar_reparacion_busca_el_taller_y_cuenta_detalles() {
        let (servicio, _norte, _sur) = servicio().await;
        servicio.crear_cliente(&cliente()).await;
        let vehiculo = Vehiculo::nuevo("ABC-1234", "0912345678", "Toyota", "Corolla", 2020).unwrap();
        servicio.crear_vehiculo(&vehiculo).await;
        let repuesto = NuevoRepuesto { sede_taller: Sede::Sur,
                                       nombre_repuesto: "Pastillas de freno".into(),
                                       descripcion_repuesto: String::new(),
                                       cantidad_repuesto: 6,
                                       precio_unitario: 30.0 };
        servicio.crear_repuesto(&repuesto).await;
        let alta = NuevaReparacion { placa: "ABC-1234".into(),
                                     sede_taller: Sede::Sur,
                                     fecha_reparacion: fecha(2024, 6, 10),
                                     descripcion: "Cambio de frenos".into(),
                                     precio_total: 95.0,
                                     repuestos: vec![policar_domain::UsoRepuesto { id_repuesto: 1,
                                                                                   cantidad_usada: 2 }] };
        let creada = servicio.crear_reparacion(&alta).await;
        let id = creada.data.unwrap().id_reparacion;

        let respuesta = servicio.eliminar_reparacion(id).await;
        assert!(respuesta.exito);
        assert!(respuesta.mensaje.contains("1 detalle(s)"));
        assert_eq!(respuesta.data.unwrap().detalles_eliminados, 1);
    }

    #[tokio::test]
    async fn estadisticas_suman_fragmentos_y_no_duplican_replicas() {
        let (servicio, _norte, _sur) = servicio().await;
        servicio.crear_cliente(&cliente()).await;
        for sede in [Sede::Norte, Sede::Sur] {
            let alta = NuevoRepuesto { sede_taller: sede,
                                       nombre_repuesto: "Bujía".into(),
                                       descripcion_repuesto: String::new(),
                                       cantidad_repuesto: 20,
                                       precio_unitario: 4.0 };
            servicio.crear_repuesto(&alta).await;
        }

        let respuesta = servicio.obtener_estadisticas().await;
        assert!(respuesta.exito);
        let datos = respuesta.data.unwrap();
        // Cliente replicado en 2 sedes cuenta una sola vez.
        assert_eq!(datos.total_clientes, 1);
        // Repuestos fragmentados se suman.
        assert_eq!(datos.total_repuestos, 2);
        assert_eq!(datos.detalles_por_sede.len(), 2);
    }

    #[tokio::test]
    async fn estadisticas_omiten_la_sede_sin_conexion_verificada() {
        let (servicio, _norte, sur) = servicio().await;
        sur.desconectar();
        servicio.registro().conectar_todas().await;

        let respuesta = servicio.obtener_estadisticas().await;
        assert!(respuesta.exito);
        let datos = respuesta.data.unwrap();
        assert_eq!(datos.detalles_por_sede.len(), 1);
        assert!(datos.detalles_por_sede.contains_key("NORTE"));
    }
}
