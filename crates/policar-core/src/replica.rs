//! Coordinador de escrituras replicadas y lecturas con respaldo.
//!
//! Una escritura replicada se lanza en paralelo contra todas las sedes
//! objetivo y NUNCA corta en el primer fallo: cada sede termina con su
//! propio `Result`, y el éxito global se decide con la regla "al menos una
//! sede aplicó el cambio". Las sedes sin handle verificado fallan de
//! inmediato con `ConexionPerdida`, sin tocar el store.

use std::future::{ready, Future};
use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture, FutureExt};
use indexmap::IndexMap;
use log::debug;

use policar_domain::Sede;

use crate::error::StoreError;
use crate::registro::RegistroSedes;
use crate::respuesta::{DetalleOperacion, ResultadoSede};
use crate::store::SedeStore;

/// Resultado por sede de una escritura replicada, en el orden de fan-out.
pub struct ResultadoReplicacion<T> {
    pub resultados: IndexMap<Sede, Result<T, StoreError>>,
}

impl<T> ResultadoReplicacion<T> {
    /// Regla de éxito global: al menos una sede aplicó el cambio.
    pub fn exito_global(&self) -> bool {
        self.resultados.values().any(|r| r.is_ok())
    }

    pub fn exitos(&self) -> usize {
        self.resultados.values().filter(|r| r.is_ok()).count()
    }

    pub fn total(&self) -> usize {
        self.resultados.len()
    }

    pub fn sedes_exitosas(&self) -> Vec<Sede> {
        self.resultados
            .iter()
            .filter(|(_, r)| r.is_ok())
            .map(|(sede, _)| *sede)
            .collect()
    }

    pub fn primer_error(&self) -> Option<&StoreError> {
        self.resultados.values().find_map(|r| r.as_ref().err())
    }

    /// Detalle por sede con la clave `CODIGO` de cada sede.
    pub fn detalles(&self) -> DetalleOperacion {
        self.detalle_interno(None)
    }

    /// Detalle por sede con claves `prefijo_CODIGO` (p. ej. `nomina_NORTE`).
    pub fn detalles_con_prefijo(&self, prefijo: &str) -> DetalleOperacion {
        self.detalle_interno(Some(prefijo))
    }

    fn detalle_interno(&self, prefijo: Option<&str>) -> DetalleOperacion {
        let mut detalle = DetalleOperacion::new();
        for (sede, resultado) in &self.resultados {
            let clave = match prefijo {
                Some(p) => format!("{p}_{}", sede.codigo()),
                None => sede.codigo().to_string(),
            };
            let valor = match resultado {
                Ok(_) => ResultadoSede::ok(),
                Err(err) => ResultadoSede::fallo(err),
            };
            detalle.insert(clave, valor);
        }
        detalle
    }
}

impl ResultadoReplicacion<u64> {
    /// Suma de filas afectadas en las sedes exitosas.
    pub fn filas_afectadas(&self) -> u64 {
        self.resultados.values().filter_map(|r| r.as_ref().ok()).sum()
    }
}

/// Lanza `op` en paralelo contra cada sede objetivo y reúne el resultado
/// por sede. Las sedes sin handle fallan con `ConexionPerdida` sin
/// participar del fan-out.
pub async fn escribir_en_todas<T, F, Fut>(registro: &RegistroSedes, objetivos: &[Sede], op: F)
                                          -> ResultadoReplicacion<T>
    where T: Send + 'static,
          F: Fn(Arc<dyn SedeStore>) -> Fut,
          Fut: Future<Output = Result<T, StoreError>> + Send + 'static
{
    let mut futuros: Vec<BoxFuture<'static, Result<T, StoreError>>> = Vec::with_capacity(objetivos.len());
    for sede in objetivos {
        match registro.get(*sede) {
            Some(store) => futuros.push(op(store).boxed()),
            None => futuros.push(ready(Err(StoreError::ConexionPerdida(sede.to_string()))).boxed()),
        }
    }
    let salidas = join_all(futuros).await;
    let resultados: IndexMap<Sede, Result<T, StoreError>> = objetivos.iter().copied().zip(salidas).collect();
    for (sede, resultado) in &resultados {
        if let Err(err) = resultado {
            debug!("replicacion: sede {sede} falló ({err})");
        }
    }
    ResultadoReplicacion { resultados }
}

/// Lectura replicada con respaldo: intenta las sedes en orden y devuelve la
/// primera respuesta junto con la sede que la atendió. Solo falla si
/// ninguna sede pudo responder.
pub async fn leer_replicada<T, F, Fut>(registro: &RegistroSedes, objetivos: &[Sede], op: F)
                                       -> Result<(Sede, T), StoreError>
    where F: Fn(Arc<dyn SedeStore>) -> Fut,
          Fut: Future<Output = Result<T, StoreError>>
{
    let mut ultimo_error: Option<StoreError> = None;
    for sede in objetivos {
        match registro.get(*sede) {
            None => {
                ultimo_error = Some(StoreError::ConexionPerdida(sede.to_string()));
            }
            Some(store) => match op(store).await {
                Ok(valor) => return Ok((*sede, valor)),
                Err(err) => {
                    debug!("lectura replicada: sede {sede} falló, probando la siguiente ({err})");
                    ultimo_error = Some(err);
                }
            },
        }
    }
    Err(ultimo_error.unwrap_or_else(|| StoreError::ConexionPerdida("ninguna sede configurada".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClaseError;
    use crate::memoria::MemSedeStore;
    use policar_domain::Cliente;

    fn cliente() -> Cliente {
        Cliente::nuevo("0912345678", "Laura", "Paredes", "Sur").unwrap()
    }

    async fn registro_conectado() -> (RegistroSedes, Arc<MemSedeStore>, Arc<MemSedeStore>) {
        let norte = Arc::new(MemSedeStore::nuevo(Sede::Norte));
        let sur = Arc::new(MemSedeStore::nuevo(Sede::Sur));
        let registro = RegistroSedes::con_nodos(vec![norte.clone(), sur.clone()]);
        registro.conectar_todas().await;
        (registro, norte, sur)
    }

    #[tokio::test]
    async fn escritura_replicada_llega_a_todas_las_sedes() {
        let (registro, norte, sur) = registro_conectado().await;
        let objetivos = registro.sedes();
        let fila = cliente();
        let resultado = escribir_en_todas(&registro, &objetivos, move |store| {
                            let fila = fila.clone();
                            async move { store.insertar_cliente(&fila).await }
                        }).await;
        assert!(resultado.exito_global());
        assert_eq!(resultado.exitos(), 2);
        assert_eq!(norte.listar_clientes().await.unwrap().len(), 1);
        assert_eq!(sur.listar_clientes().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn fallo_parcial_no_tumba_la_escritura() {
        let (registro, _norte, sur) = registro_conectado().await;
        sur.desconectar();
        let objetivos = registro.sedes();
        let fila = cliente();
        let resultado = escribir_en_todas(&registro, &objetivos, move |store| {
                            let fila = fila.clone();
                            async move { store.insertar_cliente(&fila).await }
                        }).await;
        assert!(resultado.exito_global());
        assert_eq!(resultado.exitos(), 1);
        assert_eq!(resultado.sedes_exitosas(), vec![Sede::Norte]);

        let detalles = resultado.detalles();
        assert!(detalles["NORTE"].exito);
        assert!(!detalles["SUR"].exito);
        assert_eq!(detalles["SUR"].clase, Some(ClaseError::ConexionPerdida));
    }

    #[tokio::test]
    async fn sede_sin_handle_falla_sin_tocar_el_store() {
        let norte = Arc::new(MemSedeStore::nuevo(Sede::Norte));
        let registro = RegistroSedes::con_nodos(vec![norte.clone() as Arc<dyn SedeStore>]);
        // Sin conectar: el registro no entrega handles.
        let fila = cliente();
        let resultado = escribir_en_todas(&registro, &[Sede::Norte], move |store| {
                            let fila = fila.clone();
                            async move { store.insertar_cliente(&fila).await }
                        }).await;
        assert!(!resultado.exito_global());
        assert!(matches!(resultado.primer_error(), Some(StoreError::ConexionPerdida(_))));
        assert!(norte.listar_clientes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn lectura_replicada_cae_a_la_siguiente_sede() {
        let (registro, norte, sur) = registro_conectado().await;
        sur.insertar_cliente(&cliente()).await.unwrap();
        norte.insertar_cliente(&cliente()).await.unwrap();
        norte.desconectar();

        let objetivos = registro.sedes();
        let (sede, filas) = leer_replicada(&registro, &objetivos, |store| async move {
                                store.listar_clientes().await
                            }).await
                              .unwrap();
        assert_eq!(sede, Sede::Sur);
        assert_eq!(filas.len(), 1);
    }

    #[tokio::test]
    async fn lectura_replicada_sin_sedes_vivas_propaga_conectividad() {
        let (registro, norte, sur) = registro_conectado().await;
        norte.desconectar();
        sur.desconectar();
        let objetivos = registro.sedes();
        let err = leer_replicada(&registro, &objetivos, |store| async move { store.listar_clientes().await }).await
                                                                                                            .unwrap_err();
        assert!(err.es_conectividad());
    }

    #[tokio::test]
    async fn detalles_con_prefijo_usa_el_codigo_de_sede() {
        let (registro, _norte, sur) = registro_conectado().await;
        sur.desconectar();
        let objetivos = registro.sedes();
        let resultado = escribir_en_todas(&registro, &objetivos, |store| async move { store.ping().await }).await;
        let detalles = resultado.detalles_con_prefijo("nomina");
        let claves: Vec<&String> = detalles.keys().collect();
        assert_eq!(claves, vec!["nomina_NORTE", "nomina_SUR"]);
    }
}
