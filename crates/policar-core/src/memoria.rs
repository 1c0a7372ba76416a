//! Motor de referencia en memoria de una sede.
//!
//! Paridad de comportamiento con el backend Postgres: mismas claves, mismas
//! violaciones de integridad y mismos órdenes de lectura, para que demos y
//! tests ejerciten la orquestación distribuida sin base de datos. Incluye
//! inyección de fallos de conectividad (`desconectar`/`reconectar`) con la
//! que los tests simulan una sede caída a mitad de operación.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use log::debug;

use policar_domain::{Cliente, EmpleadoInformacion, EmpleadoNomina, NuevaReparacion, NuevoRepuesto, Reparacion,
                     Repuesto, RepuestoUsado, Sede, Vehiculo, VehiculoConCliente};

use crate::error::StoreError;
use crate::store::{ConteosSede, ReparacionEliminada, SedeStore};

/// Tablas locales de una sede (copia replicada + fragmentos propios).
pub struct MemSedeStore {
    sede: Sede,
    disponible: AtomicBool,
    clientes: DashMap<String, Cliente>,
    vehiculos: DashMap<String, Vehiculo>,
    empleados_info: DashMap<String, EmpleadoInformacion>,
    nominas: DashMap<String, EmpleadoNomina>,
    repuestos: DashMap<i32, Repuesto>,
    reparaciones: DashMap<i32, Reparacion>,
    detalles: DashMap<(i32, i32), i32>, // (id_reparacion, id_repuesto) -> cantidad_usada
}

impl MemSedeStore {
    pub fn nuevo(sede: Sede) -> Self {
        MemSedeStore { sede,
                       disponible: AtomicBool::new(true),
                       clientes: DashMap::new(),
                       vehiculos: DashMap::new(),
                       empleados_info: DashMap::new(),
                       nominas: DashMap::new(),
                       repuestos: DashMap::new(),
                       reparaciones: DashMap::new(),
                       detalles: DashMap::new() }
    }

    /// Simula la caída del enlace: toda operación posterior falla con
    /// `ConexionPerdida` hasta llamar a `reconectar`.
    pub fn desconectar(&self) {
        debug!("sede {}: enlace simulado caído", self.sede);
        self.disponible.store(false, Ordering::SeqCst);
    }

    pub fn reconectar(&self) {
        debug!("sede {}: enlace simulado restablecido", self.sede);
        self.disponible.store(true, Ordering::SeqCst);
    }

    fn verificar(&self) -> Result<(), StoreError> {
        if !self.disponible.load(Ordering::SeqCst) {
            return Err(StoreError::ConexionPerdida(self.sede.to_string()));
        }
        Ok(())
    }

    fn existe_cliente(&self, cedula: &str) -> bool {
        self.clientes.contains_key(cedula)
    }

    fn existe_vehiculo(&self, placa: &str) -> bool {
        self.vehiculos.contains_key(placa)
    }
}

#[async_trait]
impl SedeStore for MemSedeStore {
    fn sede(&self) -> Sede {
        self.sede
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.verificar()
    }

    // ---- Cliente ----

    async fn listar_clientes(&self) -> Result<Vec<Cliente>, StoreError> {
        self.verificar()?;
        let mut filas: Vec<Cliente> = self.clientes.iter().map(|e| e.value().clone()).collect();
        filas.sort_by(|a, b| {
                 (a.apellido_cliente.as_str(), a.nombre_cliente.as_str())
                     .cmp(&(b.apellido_cliente.as_str(), b.nombre_cliente.as_str()))
             });
        Ok(filas)
    }

    async fn insertar_cliente(&self, cliente: &Cliente) -> Result<(), StoreError> {
        self.verificar()?;
        if self.existe_cliente(&cliente.cedula_cliente) {
            return Err(StoreError::ViolacionUnicidad(format!("ya existe un cliente con cédula {}",
                                                             cliente.cedula_cliente)));
        }
        self.clientes.insert(cliente.cedula_cliente.clone(), cliente.clone());
        Ok(())
    }

    async fn actualizar_cliente(&self, cedula: &str, cliente: &Cliente) -> Result<u64, StoreError> {
        self.verificar()?;
        match self.clientes.get_mut(cedula) {
            Some(mut fila) => {
                fila.nombre_cliente = cliente.nombre_cliente.clone();
                fila.apellido_cliente = cliente.apellido_cliente.clone();
                fila.zona = cliente.zona.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn eliminar_cliente(&self, cedula: &str) -> Result<u64, StoreError> {
        self.verificar()?;
        if self.vehiculos.iter().any(|v| v.value().cedula_cliente == cedula) {
            return Err(StoreError::ViolacionClaveForanea(format!("el cliente {cedula} tiene vehículos registrados")));
        }
        Ok(self.clientes.remove(cedula).map(|_| 1).unwrap_or(0))
    }

    // ---- Vehiculo ----

    async fn listar_vehiculos(&self) -> Result<Vec<VehiculoConCliente>, StoreError> {
        self.verificar()?;
        let mut filas: Vec<VehiculoConCliente> =
            self.vehiculos
                .iter()
                .filter_map(|v| {
                    self.clientes
                        .get(&v.value().cedula_cliente)
                        .map(|c| VehiculoConCliente::desde(v.value(), &c.nombre_cliente, &c.apellido_cliente))
                })
                .collect();
        filas.sort_by(|a, b| a.placa.cmp(&b.placa));
        Ok(filas)
    }

    async fn insertar_vehiculo(&self, vehiculo: &Vehiculo) -> Result<(), StoreError> {
        self.verificar()?;
        if self.existe_vehiculo(&vehiculo.placa) {
            return Err(StoreError::ViolacionUnicidad(format!("ya existe un vehículo con placa {}", vehiculo.placa)));
        }
        if !self.existe_cliente(&vehiculo.cedula_cliente) {
            return Err(StoreError::ViolacionClaveForanea(format!("no existe el cliente {}", vehiculo.cedula_cliente)));
        }
        self.vehiculos.insert(vehiculo.placa.clone(), vehiculo.clone());
        Ok(())
    }

    async fn actualizar_vehiculo(&self, placa: &str, vehiculo: &Vehiculo) -> Result<u64, StoreError> {
        self.verificar()?;
        if !self.existe_cliente(&vehiculo.cedula_cliente) {
            return Err(StoreError::ViolacionClaveForanea(format!("no existe el cliente {}", vehiculo.cedula_cliente)));
        }
        match self.vehiculos.get_mut(placa) {
            Some(mut fila) => {
                fila.cedula_cliente = vehiculo.cedula_cliente.clone();
                fila.marca = vehiculo.marca.clone();
                fila.modelo = vehiculo.modelo.clone();
                fila.anio = vehiculo.anio;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn eliminar_vehiculo(&self, placa: &str) -> Result<u64, StoreError> {
        self.verificar()?;
        if self.reparaciones.iter().any(|r| r.value().placa == placa) {
            return Err(StoreError::ViolacionClaveForanea(format!("el vehículo {placa} tiene reparaciones registradas")));
        }
        Ok(self.vehiculos.remove(placa).map(|_| 1).unwrap_or(0))
    }

    // ---- Empleado información ----

    async fn listar_empleados_info(&self) -> Result<Vec<EmpleadoInformacion>, StoreError> {
        self.verificar()?;
        let mut filas: Vec<EmpleadoInformacion> = self.empleados_info.iter().map(|e| e.value().clone()).collect();
        filas.sort_by(|a, b| a.nombre_empleado.cmp(&b.nombre_empleado));
        Ok(filas)
    }

    async fn buscar_empleado_info(&self, cedula: &str) -> Result<Option<EmpleadoInformacion>, StoreError> {
        self.verificar()?;
        Ok(self.empleados_info.get(cedula).map(|e| e.value().clone()))
    }

    async fn insertar_empleado_info(&self, info: &EmpleadoInformacion) -> Result<(), StoreError> {
        self.verificar()?;
        if self.empleados_info.contains_key(&info.cedula_empleado) {
            return Err(StoreError::ViolacionUnicidad(format!("ya existe un empleado con cédula {}",
                                                             info.cedula_empleado)));
        }
        self.empleados_info.insert(info.cedula_empleado.clone(), info.clone());
        Ok(())
    }

    async fn actualizar_empleado_info(&self, cedula: &str, nombre: &str) -> Result<u64, StoreError> {
        self.verificar()?;
        match self.empleados_info.get_mut(cedula) {
            Some(mut fila) => {
                fila.nombre_empleado = nombre.to_string();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn eliminar_empleado_info(&self, cedula: &str) -> Result<u64, StoreError> {
        self.verificar()?;
        Ok(self.empleados_info.remove(cedula).map(|_| 1).unwrap_or(0))
    }

    // ---- Empleado nómina ----

    async fn listar_nominas(&self) -> Result<Vec<EmpleadoNomina>, StoreError> {
        self.verificar()?;
        let mut filas: Vec<EmpleadoNomina> = self.nominas.iter().map(|e| e.value().clone()).collect();
        filas.sort_by(|a, b| a.cedula_empleado.cmp(&b.cedula_empleado));
        Ok(filas)
    }

    async fn buscar_nomina(&self, cedula: &str) -> Result<Option<EmpleadoNomina>, StoreError> {
        self.verificar()?;
        Ok(self.nominas.get(cedula).map(|e| e.value().clone()))
    }

    async fn insertar_nomina(&self, nomina: &EmpleadoNomina) -> Result<(), StoreError> {
        self.verificar()?;
        if self.nominas.contains_key(&nomina.cedula_empleado) {
            return Err(StoreError::ViolacionUnicidad(format!("ya existe nómina para la cédula {}",
                                                             nomina.cedula_empleado)));
        }
        self.nominas.insert(nomina.cedula_empleado.clone(), nomina.clone());
        Ok(())
    }

    async fn actualizar_nomina(&self, cedula: &str, fecha_comienzo: NaiveDate, salario: f64)
                               -> Result<u64, StoreError> {
        self.verificar()?;
        match self.nominas.get_mut(cedula) {
            Some(mut fila) => {
                fila.fecha_comienzo = fecha_comienzo;
                fila.salario = salario;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn eliminar_nomina(&self, cedula: &str) -> Result<u64, StoreError> {
        self.verificar()?;
        Ok(self.nominas.remove(cedula).map(|_| 1).unwrap_or(0))
    }

    // ---- Repuesto ----

    async fn listar_repuestos(&self) -> Result<Vec<Repuesto>, StoreError> {
        self.verificar()?;
        let mut filas: Vec<Repuesto> = self.repuestos.iter().map(|e| e.value().clone()).collect();
        filas.sort_by_key(|r| r.id_repuesto);
        Ok(filas)
    }

    async fn buscar_repuesto(&self, id_repuesto: i32) -> Result<Option<Repuesto>, StoreError> {
        self.verificar()?;
        Ok(self.repuestos.get(&id_repuesto).map(|e| e.value().clone()))
    }

    async fn proximo_id_repuesto(&self) -> Result<i32, StoreError> {
        self.verificar()?;
        Ok(self.repuestos.iter().map(|e| *e.key()).max().unwrap_or(0) + 1)
    }

    async fn insertar_repuesto(&self, repuesto: &Repuesto) -> Result<(), StoreError> {
        self.verificar()?;
        if self.repuestos.contains_key(&repuesto.id_repuesto) {
            return Err(StoreError::ViolacionUnicidad(format!("ya existe el repuesto {} en {}",
                                                             repuesto.id_repuesto, self.sede)));
        }
        self.repuestos.insert(repuesto.id_repuesto, repuesto.clone());
        Ok(())
    }

    async fn actualizar_repuesto(&self, id_repuesto: i32, datos: &NuevoRepuesto) -> Result<u64, StoreError> {
        self.verificar()?;
        match self.repuestos.get_mut(&id_repuesto) {
            Some(mut fila) => {
                fila.nombre_repuesto = datos.nombre_repuesto.clone();
                fila.descripcion_repuesto = datos.descripcion_repuesto.clone();
                fila.cantidad_repuesto = datos.cantidad_repuesto;
                fila.precio_unitario = datos.precio_unitario;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn eliminar_repuesto(&self, id_repuesto: i32) -> Result<u64, StoreError> {
        self.verificar()?;
        if self.detalles.iter().any(|d| d.key().1 == id_repuesto) {
            return Err(StoreError::ViolacionClaveForanea(format!("el repuesto {id_repuesto} está usado por reparaciones")));
        }
        Ok(self.repuestos.remove(&id_repuesto).map(|_| 1).unwrap_or(0))
    }

    // ---- Reparación ----

    async fn listar_reparaciones(&self) -> Result<Vec<Reparacion>, StoreError> {
        self.verificar()?;
        let mut filas: Vec<Reparacion> = self.reparaciones.iter().map(|e| e.value().clone()).collect();
        filas.sort_by(|a, b| {
                 b.fecha_reparacion
                  .cmp(&a.fecha_reparacion)
                  .then(a.id_reparacion.cmp(&b.id_reparacion))
             });
        Ok(filas)
    }

    async fn buscar_reparacion(&self, id_reparacion: i32) -> Result<Option<Reparacion>, StoreError> {
        self.verificar()?;
        Ok(self.reparaciones.get(&id_reparacion).map(|e| e.value().clone()))
    }

    async fn crear_reparacion(&self, alta: &NuevaReparacion) -> Result<i32, StoreError> {
        self.verificar()?;
        if !self.existe_vehiculo(&alta.placa) {
            return Err(StoreError::ViolacionClaveForanea(format!("no existe el vehículo {}", alta.placa)));
        }
        // Chequeo previo de todos los repuestos: emula el rollback de la
        // transacción local (o entra todo, o no entra nada).
        for uso in &alta.repuestos {
            if !self.repuestos.contains_key(&uso.id_repuesto) {
                return Err(StoreError::ViolacionClaveForanea(format!("no existe el repuesto {} en {}",
                                                                    uso.id_repuesto, self.sede)));
            }
        }
        let nuevo_id = self.reparaciones.iter().map(|e| *e.key()).max().unwrap_or(0) + 1;
        self.reparaciones.insert(nuevo_id, alta.con_id(nuevo_id));
        for uso in &alta.repuestos {
            self.detalles.insert((nuevo_id, uso.id_repuesto), uso.cantidad_usada);
            if let Some(mut repuesto) = self.repuestos.get_mut(&uso.id_repuesto) {
                repuesto.cantidad_repuesto -= uso.cantidad_usada;
            }
        }
        debug!("sede {}: reparación {} creada con {} repuestos", self.sede, nuevo_id, alta.repuestos.len());
        Ok(nuevo_id)
    }

    async fn actualizar_reparacion(&self, id_reparacion: i32, datos: &NuevaReparacion) -> Result<u64, StoreError> {
        self.verificar()?;
        match self.reparaciones.get_mut(&id_reparacion) {
            Some(mut fila) => {
                fila.placa = datos.placa.clone();
                fila.fecha_reparacion = datos.fecha_reparacion;
                fila.descripcion = datos.descripcion.clone();
                fila.precio_total = datos.precio_total;
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn eliminar_reparacion(&self, id_reparacion: i32) -> Result<Option<ReparacionEliminada>, StoreError> {
        self.verificar()?;
        if self.reparaciones.get(&id_reparacion).is_none() {
            return Ok(None);
        }
        let claves: Vec<(i32, i32)> = self.detalles
                                          .iter()
                                          .filter(|d| d.key().0 == id_reparacion)
                                          .map(|d| *d.key())
                                          .collect();
        for clave in &claves {
            self.detalles.remove(clave);
        }
        self.reparaciones.remove(&id_reparacion);
        Ok(Some(ReparacionEliminada { id_reparacion,
                                      detalles_eliminados: claves.len() as u64 }))
    }

    async fn listar_repuestos_de_reparacion(&self, id_reparacion: i32) -> Result<Vec<RepuestoUsado>, StoreError> {
        self.verificar()?;
        let mut filas: Vec<RepuestoUsado> =
            self.detalles
                .iter()
                .filter(|d| d.key().0 == id_reparacion)
                .filter_map(|d| {
                    let (_, id_repuesto) = *d.key();
                    self.repuestos.get(&id_repuesto).map(|r| RepuestoUsado { id_reparacion,
                                                                             id_repuesto,
                                                                             cantidad_usada: *d.value(),
                                                                             nombre_repuesto: r.nombre_repuesto.clone(),
                                                                             descripcion_repuesto:
                                                                                 r.descripcion_repuesto.clone(),
                                                                             precio_unitario: r.precio_unitario,
                                                                             sede_taller: self.sede })
                })
                .collect();
        filas.sort_by_key(|r| r.id_repuesto);
        Ok(filas)
    }

    // ---- Agregados ----

    async fn conteos(&self) -> Result<ConteosSede, StoreError> {
        self.verificar()?;
        let ingresos: f64 = self.reparaciones.iter().map(|r| r.value().precio_total).sum();
        Ok(ConteosSede { clientes: self.clientes.len() as i64,
                         vehiculos: self.vehiculos.len() as i64,
                         empleados_info: self.empleados_info.len() as i64,
                         empleados_nomina: self.nominas.len() as i64,
                         repuestos: self.repuestos.len() as i64,
                         reparaciones: self.reparaciones.len() as i64,
                         ingresos })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use policar_domain::UsoRepuesto;

    fn fecha(anio: i32, mes: u32, dia: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(anio, mes, dia).unwrap()
    }

    fn cliente() -> Cliente {
        Cliente::nuevo("0912345678", "Carlos", "Mendoza", "Norte").unwrap()
    }

    fn vehiculo() -> Vehiculo {
        Vehiculo::nuevo("ABC-1234", "0912345678", "Toyota", "Corolla", 2020).unwrap()
    }

    fn repuesto(id: i32, stock: i32) -> Repuesto {
        Repuesto { id_repuesto: id,
                   sede_taller: Sede::Norte,
                   nombre_repuesto: format!("Repuesto {id}"),
                   descripcion_repuesto: String::new(),
                   cantidad_repuesto: stock,
                   precio_unitario: 5.0 }
    }

    #[tokio::test]
    async fn desconectar_corta_todas_las_operaciones() {
        let store = MemSedeStore::nuevo(Sede::Norte);
        store.insertar_cliente(&cliente()).await.unwrap();
        store.desconectar();
        let err = store.listar_clientes().await.unwrap_err();
        assert!(err.es_conectividad());
        store.reconectar();
        assert_eq!(store.listar_clientes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn insercion_duplicada_es_violacion_de_unicidad() {
        let store = MemSedeStore::nuevo(Sede::Norte);
        store.insertar_cliente(&cliente()).await.unwrap();
        let err = store.insertar_cliente(&cliente()).await.unwrap_err();
        assert!(matches!(err, StoreError::ViolacionUnicidad(_)));
    }

    #[tokio::test]
    async fn vehiculo_sin_cliente_es_violacion_de_clave_foranea() {
        let store = MemSedeStore::nuevo(Sede::Norte);
        let err = store.insertar_vehiculo(&vehiculo()).await.unwrap_err();
        assert!(matches!(err, StoreError::ViolacionClaveForanea(_)));
    }

    #[tokio::test]
    async fn proximo_id_repuesto_es_max_mas_uno_local() {
        let store = MemSedeStore::nuevo(Sede::Norte);
        assert_eq!(store.proximo_id_repuesto().await.unwrap(), 1);
        store.insertar_repuesto(&repuesto(4, 10)).await.unwrap();
        assert_eq!(store.proximo_id_repuesto().await.unwrap(), 5);
    }

    #[tokio::test]
    async fn crear_reparacion_descuenta_stock_y_asigna_id() {
        let store = MemSedeStore::nuevo(Sede::Norte);
        store.insertar_cliente(&cliente()).await.unwrap();
        store.insertar_vehiculo(&vehiculo()).await.unwrap();
        store.insertar_repuesto(&repuesto(1, 10)).await.unwrap();

        let alta = NuevaReparacion { placa: "ABC-1234".into(),
                                     sede_taller: Sede::Norte,
                                     fecha_reparacion: fecha(2024, 5, 20),
                                     descripcion: "Cambio de filtro".into(),
                                     precio_total: 25.0,
                                     repuestos: vec![UsoRepuesto { id_repuesto: 1, cantidad_usada: 3 }] };
        let id = store.crear_reparacion(&alta).await.unwrap();
        assert_eq!(id, 1);
        let repuesto = store.buscar_repuesto(1).await.unwrap().unwrap();
        assert_eq!(repuesto.cantidad_repuesto, 7);
        assert_eq!(store.listar_repuestos_de_reparacion(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn crear_reparacion_con_repuesto_inexistente_no_deja_rastro() {
        let store = MemSedeStore::nuevo(Sede::Norte);
        store.insertar_cliente(&cliente()).await.unwrap();
        store.insertar_vehiculo(&vehiculo()).await.unwrap();

        let alta = NuevaReparacion { placa: "ABC-1234".into(),
                                     sede_taller: Sede::Norte,
                                     fecha_reparacion: fecha(2024, 5, 20),
                                     descripcion: "Cambio de filtro".into(),
                                     precio_total: 25.0,
                                     repuestos: vec![UsoRepuesto { id_repuesto: 99, cantidad_usada: 1 }] };
        let err = store.crear_reparacion(&alta).await.unwrap_err();
        assert!(matches!(err, StoreError::ViolacionClaveForanea(_)));
        assert!(store.listar_reparaciones().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn eliminar_reparacion_retira_detalle_primero() {
        let store = MemSedeStore::nuevo(Sede::Norte);
        store.insertar_cliente(&cliente()).await.unwrap();
        store.insertar_vehiculo(&vehiculo()).await.unwrap();
        store.insertar_repuesto(&repuesto(1, 10)).await.unwrap();
        store.insertar_repuesto(&repuesto(2, 10)).await.unwrap();

        let alta = NuevaReparacion { placa: "ABC-1234".into(),
                                     sede_taller: Sede::Norte,
                                     fecha_reparacion: fecha(2024, 5, 20),
                                     descripcion: "Mantenimiento".into(),
                                     precio_total: 80.0,
                                     repuestos: vec![UsoRepuesto { id_repuesto: 1, cantidad_usada: 1 },
                                                     UsoRepuesto { id_repuesto: 2, cantidad_usada: 2 },] };
        let id = store.crear_reparacion(&alta).await.unwrap();
        let resultado = store.eliminar_reparacion(id).await.unwrap().unwrap();
        assert_eq!(resultado.detalles_eliminados, 2);
        assert!(store.buscar_reparacion(id).await.unwrap().is_none());
        assert!(store.listar_repuestos_de_reparacion(id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn conteos_reflejan_el_estado_local() {
        let store = MemSedeStore::nuevo(Sede::Sur);
        store.insertar_cliente(&cliente()).await.unwrap();
        store.insertar_repuesto(&repuesto(1, 10)).await.unwrap();
        let conteos = store.conteos().await.unwrap();
        assert_eq!(conteos.clientes, 1);
        assert_eq!(conteos.repuestos, 1);
        assert_eq!(conteos.reparaciones, 0);
    }
}
