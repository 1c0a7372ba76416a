//! policar-core: Orquestación distribuida de las sedes POLI-CAR
pub mod compuesto;
pub mod error;
pub mod fragmento;
pub mod memoria;
pub mod registro;
pub mod replica;
pub mod respuesta;
pub mod router;
pub mod servicio;
pub mod store;

pub use error::{clasificar_mensaje, ClaseError, StoreError};
pub use fragmento::{ejecutar_en, leer_fragmentos, LecturaAgregada};
pub use memoria::MemSedeStore;
pub use registro::{EstadoConexiones, EstadoSede, RegistroSedes, ResumenConexiones};
pub use replica::{escribir_en_todas, leer_replicada, ResultadoReplicacion};
pub use respuesta::{DetalleOperacion, Respuesta, ResultadoSede};
pub use router::{resolver, tabla_fisica, Entidad, ModoDistribucion, Resolucion};
pub use servicio::{DetalleEstadisticas, Estadisticas, ResumenSede, ResumenSedes, ServicioDatos, TotalesResumen};
pub use store::{ConteosSede, ReparacionEliminada, SedeStore};

#[cfg(test)]
mod tests {
    use super::*;
    use policar_domain::{Cliente, Sede};
    use std::sync::Arc;

    #[tokio::test]
    async fn la_fachada_expone_el_flujo_basico() {
        let registro = Arc::new(RegistroSedes::con_nodos(vec![
            Arc::new(MemSedeStore::nuevo(Sede::Norte)) as Arc<dyn SedeStore>,
            Arc::new(MemSedeStore::nuevo(Sede::Sur)) as Arc<dyn SedeStore>,
        ]));
        let servicio = ServicioDatos::nuevo(registro);

        let estado = servicio.estado_conexiones().await;
        assert!(estado.exito);
        assert!(estado.data.unwrap().todas_conectadas());

        let cliente = Cliente::nuevo("0912345678", "Elena", "Ruiz", "Centro").unwrap();
        let creado = servicio.crear_cliente(&cliente).await;
        assert_eq!(creado.mensaje, "Cliente creado en 2 de 2 sede(s): NORTE, SUR");

        let listado = servicio.obtener_clientes().await;
        assert_eq!(listado.data.unwrap().len(), 1);
    }
}
