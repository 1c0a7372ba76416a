//! Lecturas agregadas sobre fragmentos horizontales y ejecución en la sede
//! dueña de un fragmento.
//!
//! Una lectura global de una tabla fragmentada consulta todos los talleres
//! en paralelo y une los fragmentos en el orden de registro. La caída de un
//! taller no tumba la lectura: sus filas simplemente no aparecen y la sede
//! queda marcada en el detalle. Solo si ningún taller responde se considera
//! la lectura no disponible.

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

/// Unión de fragmentos por sede. `filas` concatena los fragmentos en el
/// orden de las sedes consultadas; `por_sede` registra cuántas filas aportó
/// cada una o el error que la dejó fuera.
pub struct LecturaAgregada<T> {
    pub filas: Vec<T>,
    pub por_sede: IndexMap<Sede, Result<usize, StoreError>>,
}

impl<T> LecturaAgregada<T> {
    /// La lectura está disponible si al menos una sede respondió.
    pub fn disponible(&self) -> bool {
        self.por_sede.values().any(|r| r.is_ok())
    }

    pub fn sedes_consultadas(&self) -> Vec<Sede> {
        self.por_sede.keys().copied().collect()
    }

    pub fn sedes_caidas(&self) -> Vec<Sede> {
        self.por_sede
            .iter()
            .filter(|(_, r)| r.is_err())
            .map(|(sede, _)| *sede)
            .collect()
    }

    pub fn primer_error(&self) -> Option<&StoreError> {
        self.por_sede.values().find_map(|r| r.as_ref().err())
    }

    pub fn detalles(&self) -> DetalleOperacion {
        let mut detalle = DetalleOperacion::new();
        for (sede, resultado) in &self.por_sede {
            let valor = match resultado {
                Ok(_) => ResultadoSede::ok(),
                Err(err) => ResultadoSede::fallo(err),
            };
            detalle.insert(sede.codigo().to_string(), valor);
        }
        detalle
    }
}

/// Consulta los fragmentos de todas las sedes objetivo en paralelo y une
/// las filas en el orden de `objetivos`.
pub async fn leer_fragmentos<T, F, Fut>(registro: &RegistroSedes, objetivos: &[Sede], op: F) -> LecturaAgregada<T>
    where T: Send + 'static,
          F: Fn(Arc<dyn SedeStore>) -> Fut,
          Fut: Future<Output = Result<Vec<T>, StoreError>> + Send + 'static
{
    let mut futuros: Vec<BoxFuture<'static, Result<Vec<T>, StoreError>>> = Vec::with_capacity(objetivos.len());
    for sede in objetivos {
        match registro.get(*sede) {
            Some(store) => futuros.push(op(store).boxed()),
            None => futuros.push(ready(Err(StoreError::ConexionPerdida(sede.to_string()))).boxed()),
        }
    }
    let salidas = join_all(futuros).await;

    let mut filas = Vec::new();
    let mut por_sede = IndexMap::new();
    for (sede, salida) in objetivos.iter().copied().zip(salidas) {
        match salida {
            Ok(fragmento) => {
                por_sede.insert(sede, Ok(fragmento.len()));
                filas.extend(fragmento);
            }
            Err(err) => {
                debug!("lectura fragmentada: sede {sede} fuera de la unión ({err})");
                por_sede.insert(sede, Err(err));
            }
        }
    }
    LecturaAgregada { filas, por_sede }
}

/// Ejecuta `op` en la sede dueña del fragmento. Falla con `ConexionPerdida`
/// si el registro no tiene un handle verificado para esa sede.
pub async fn ejecutar_en<T, F, Fut>(registro: &RegistroSedes, sede: Sede, op: F) -> Result<T, StoreError>
    where F: FnOnce(Arc<dyn SedeStore>) -> Fut,
          Fut: Future<Output = Result<T, StoreError>>
{
    let store = registro.get(sede)
                        .ok_or_else(|| StoreError::ConexionPerdida(sede.to_string()))?;
    op(store).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memoria::MemSedeStore;
    use policar_domain::{Repuesto, Sede};

    fn repuesto(id: i32, sede: Sede) -> Repuesto {
        Repuesto { id_repuesto: id,
                   sede_taller: sede,
                   nombre_repuesto: format!("Repuesto {id}"),
                   descripcion_repuesto: String::new(),
                   cantidad_repuesto: 4,
                   precio_unitario: 12.5 }
    }

    async fn talleres_conectados() -> (RegistroSedes, Arc<MemSedeStore>, Arc<MemSedeStore>) {
        let norte = Arc::new(MemSedeStore::nuevo(Sede::Norte));
        let sur = Arc::new(MemSedeStore::nuevo(Sede::Sur));
        let registro = RegistroSedes::con_nodos(vec![norte.clone(), sur.clone()]);
        registro.conectar_todas().await;
        (registro, norte, sur)
    }

    #[tokio::test]
    async fn la_union_respeta_el_orden_de_registro() {
        let (registro, norte, sur) = talleres_conectados().await;
        norte.insertar_repuesto(&repuesto(1, Sede::Norte)).await.unwrap();
        sur.insertar_repuesto(&repuesto(1, Sede::Sur)).await.unwrap();
        sur.insertar_repuesto(&repuesto(2, Sede::Sur)).await.unwrap();

        let lectura = leer_fragmentos(&registro, &registro.sedes(), |store| async move {
                          store.listar_repuestos().await
                      }).await;
        assert!(lectura.disponible());
        assert_eq!(lectura.filas.len(), 3);
        assert_eq!(lectura.filas[0].sede_taller, Sede::Norte);
        assert_eq!(lectura.filas[1].sede_taller, Sede::Sur);
        assert_eq!(lectura.por_sede[&Sede::Norte], Ok(1));
        assert_eq!(lectura.por_sede[&Sede::Sur], Ok(2));
    }

    #[tokio::test]
    async fn un_taller_caido_no_tumba_la_lectura() {
        let (registro, norte, sur) = talleres_conectados().await;
        norte.insertar_repuesto(&repuesto(1, Sede::Norte)).await.unwrap();
        sur.desconectar();

        let lectura = leer_fragmentos(&registro, &registro.sedes(), |store| async move {
                          store.listar_repuestos().await
                      }).await;
        assert!(lectura.disponible());
        assert_eq!(lectura.filas.len(), 1);
        assert_eq!(lectura.sedes_caidas(), vec![Sede::Sur]);
        assert!(!lectura.detalles()["SUR"].exito);
    }

    #[tokio::test]
    async fn sin_talleres_vivos_la_lectura_no_esta_disponible() {
        let (registro, norte, sur) = talleres_conectados().await;
        norte.desconectar();
        sur.desconectar();
        let lectura = leer_fragmentos(&registro, &registro.sedes(), |store| async move {
                          store.listar_repuestos().await
                      }).await;
        assert!(!lectura.disponible());
        assert!(lectura.filas.is_empty());
        assert!(lectura.primer_error().is_some());
    }

    #[tokio::test]
    async fn ejecutar_en_exige_handle_verificado() {
        let norte = Arc::new(MemSedeStore::nuevo(Sede::Norte));
        let registro = RegistroSedes::con_nodos(vec![norte.clone() as Arc<dyn SedeStore>]);

        let err = ejecutar_en(&registro, Sede::Norte, |store| async move { store.listar_repuestos().await }).await
                                                                                                           .unwrap_err();
        assert!(err.es_conectividad());

        registro.conectar_todas().await;
        let filas = ejecutar_en(&registro, Sede::Norte, |store| async move { store.listar_repuestos().await }).await
                                                                                                              .unwrap();
        assert!(filas.is_empty());
    }
}
