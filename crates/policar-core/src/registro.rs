//! Registro de sedes y verificación de conectividad.
//!
//! Cada sede del sistema se registra una sola vez con su `SedeStore`. El
//! registro verifica el enlace bajo demanda (`conectar` hace un ping real)
//! y conserva el resultado de la última verificación, de modo que `estado`
//! pueda responder sin tocar la red. `get` entrega el handle únicamente si
//! la última verificación fue exitosa: una sede que nunca conectó se
//! reporta como "sin conexión" antes de intentar cualquier operación.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use log::debug;
use serde::Serialize;

use policar_domain::Sede;

use crate::error::StoreError;
use crate::store::SedeStore;

struct NodoSede {
    store: Arc<dyn SedeStore>,
    conectado: AtomicBool,
    verificado_en_ms: AtomicI64, // epoch ms de la última verificación, 0 = nunca
}

/// Estado serializable de una sede en el registro.
#[derive(Debug, Clone, Serialize)]
pub struct EstadoSede {
    pub conectada: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verificado_en: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ResumenConexiones {
    pub total: usize,
    pub conectadas: usize,
    pub desconectadas: usize,
}

/// Foto del registro completo, en el orden de registro de las sedes.
#[derive(Debug, Clone, Serialize)]
pub struct EstadoConexiones {
    pub sedes: IndexMap<String, EstadoSede>,
    pub resumen: ResumenConexiones,
    pub generado_en: DateTime<Utc>,
}

impl EstadoConexiones {
    pub fn todas_conectadas(&self) -> bool {
        self.resumen.desconectadas == 0 && self.resumen.total > 0
    }
}

/// Registro central de las sedes configuradas.
#[derive(Default)]
pub struct RegistroSedes {
    nodos: IndexMap<Sede, NodoSede>,
}

impl RegistroSedes {
    pub fn nuevo() -> Self {
        RegistroSedes { nodos: IndexMap::new() }
    }

    /// Registra una sede. Si ya estaba registrada, reemplaza su handle y
    /// descarta el estado de verificación anterior.
    pub fn registrar(&mut self, store: Arc<dyn SedeStore>) {
        let sede = store.sede();
        debug!("registro: sede {sede} registrada");
        self.nodos.insert(sede,
                          NodoSede { store,
                                     conectado: AtomicBool::new(false),
                                     verificado_en_ms: AtomicI64::new(0) });
    }

    /// Construye un registro a partir de varios stores, en orden.
    pub fn con_nodos(stores: Vec<Arc<dyn SedeStore>>) -> Self {
        let mut registro = RegistroSedes::nuevo();
        for store in stores {
            registro.registrar(store);
        }
        registro
    }

    /// Sedes registradas, en orden de registro.
    pub fn sedes(&self) -> Vec<Sede> {
        self.nodos.keys().copied().collect()
    }

    /// Handle de la sede, solo si su última verificación fue exitosa.
    pub fn get(&self, sede: Sede) -> Option<Arc<dyn SedeStore>> {
        self.nodos
            .get(&sede)
            .filter(|nodo| nodo.conectado.load(Ordering::SeqCst))
            .map(|nodo| Arc::clone(&nodo.store))
    }

    /// Verifica el enlace con una sede haciendo un ping real y registra el
    /// resultado. Una sede no registrada cuenta como sin conexión.
    pub async fn conectar(&self, sede: Sede) -> Result<(), StoreError> {
        let nodo = self.nodos
                       .get(&sede)
                       .ok_or_else(|| StoreError::ConexionPerdida(sede.to_string()))?;
        let resultado = nodo.store.ping().await;
        nodo.conectado.store(resultado.is_ok(), Ordering::SeqCst);
        nodo.verificado_en_ms.store(Utc::now().timestamp_millis(), Ordering::SeqCst);
        match &resultado {
            Ok(()) => debug!("registro: sede {sede} conectada"),
            Err(err) => debug!("registro: sede {sede} sin conexión ({err})"),
        }
        resultado
    }

    /// Verifica todas las sedes sin cortar en el primer fallo y devuelve la
    /// foto resultante.
    pub async fn conectar_todas(&self) -> EstadoConexiones {
        for sede in self.sedes() {
            let _ = self.conectar(sede).await;
        }
        self.estado()
    }

    /// Foto del estado actual sin verificar nada.
    pub fn estado(&self) -> EstadoConexiones {
        let mut sedes = IndexMap::new();
        let mut conectadas = 0;
        for (sede, nodo) in &self.nodos {
            let conectada = nodo.conectado.load(Ordering::SeqCst);
            if conectada {
                conectadas += 1;
            }
            let verificado_ms = nodo.verificado_en_ms.load(Ordering::SeqCst);
            let verificado_en = (verificado_ms > 0).then(|| DateTime::from_timestamp_millis(verificado_ms))
                                                   .flatten();
            sedes.insert(sede.codigo().to_string(), EstadoSede { conectada, verificado_en });
        }
        let total = self.nodos.len();
        EstadoConexiones { sedes,
                           resumen: ResumenConexiones { total,
                                                        conectadas,
                                                        desconectadas: total - conectadas },
                           generado_en: Utc::now() }
    }
}
