//! Convergencia y degradación de las tablas replicadas.

use std::sync::Arc;

use policar_core::{ClaseError, MemSedeStore, RegistroSedes, SedeStore, ServicioDatos};
use policar_domain::{Cliente, Sede, Vehiculo};

async fn sistema() -> (ServicioDatos, Arc<MemSedeStore>, Arc<MemSedeStore>) {
    let norte = Arc::new(MemSedeStore::nuevo(Sede::Norte));
    let sur = Arc::new(MemSedeStore::nuevo(Sede::Sur));
    let registro = Arc::new(RegistroSedes::con_nodos(vec![norte.clone(), sur.clone()]));
    registro.conectar_todas().await;
    (ServicioDatos::nuevo(registro), norte, sur)
}

fn cliente(cedula: &str) -> Cliente {
    Cliente::nuevo(cedula, "Paula", "Chicaiza", "Valle").unwrap()
}

#[tokio::test]
async fn una_escritura_replicada_converge_en_todas_las_sedes() {
    let (servicio, norte, sur) = sistema().await;

    let respuesta = servicio.crear_cliente(&cliente("1102233445")).await;
    assert!(respuesta.exito);
    assert_eq!(respuesta.mensaje, "Cliente creado en 2 de 2 sede(s): NORTE, SUR");

    let en_norte = norte.listar_clientes().await.unwrap();
    let en_sur = sur.listar_clientes().await.unwrap();
    assert_eq!(en_norte, en_sur);
    assert_eq!(en_norte.len(), 1);
}

#[tokio::test]
async fn la_actualizacion_replicada_tambien_converge() {
    let (servicio, norte, sur) = sistema().await;
    servicio.crear_cliente(&cliente("1102233445")).await;

    let mut cambios = cliente("1102233445");
    cambios.zona = "Norte industrial".to_string();
    let respuesta = servicio.actualizar_cliente("1102233445", &cambios).await;
    assert!(respuesta.exito);
    assert_eq!(respuesta.data, Some(2));

    assert_eq!(norte.listar_clientes().await.unwrap()[0].zona, "Norte industrial");
    assert_eq!(sur.listar_clientes().await.unwrap()[0].zona, "Norte industrial");
}

#[tokio::test]
async fn la_replica_parcial_queda_visible_y_no_se_repara_sola() {
    let (servicio, norte, sur) = sistema().await;
    sur.desconectar();

    let respuesta = servicio.crear_cliente(&cliente("1102233445")).await;
    assert!(respuesta.exito);
    let detalles = respuesta.detalles.unwrap();
    assert!(detalles["NORTE"].exito);
    assert!(!detalles["SUR"].exito);
    assert_eq!(detalles["SUR"].clase, Some(ClaseError::ConexionPerdida));

    // Al volver la sede, la divergencia persiste: no hay resincronización
    // automática.
    sur.reconectar();
    assert_eq!(norte.listar_clientes().await.unwrap().len(), 1);
    assert!(sur.listar_clientes().await.unwrap().is_empty());
}

#[tokio::test]
async fn la_lectura_replicada_cae_a_la_sede_siguiente() {
    let (servicio, norte, _sur) = sistema().await;
    servicio.crear_cliente(&cliente("1102233445")).await;

    norte.desconectar();
    let respuesta = servicio.obtener_clientes().await;
    assert!(respuesta.exito);
    assert!(respuesta.mensaje.contains("desde SUR"));
    assert_eq!(respuesta.data.unwrap().len(), 1);
}

#[tokio::test]
async fn sin_sedes_vivas_la_lectura_replicada_falla_por_conectividad() {
    let (servicio, norte, sur) = sistema().await;
    norte.desconectar();
    sur.desconectar();

    let respuesta = servicio.obtener_clientes().await;
    assert!(!respuesta.exito);
    assert!(respuesta.mensaje.contains("Sin conexión"));
}

#[tokio::test]
async fn el_duplicado_replicado_se_reporta_con_su_clase() {
    let (servicio, _norte, _sur) = sistema().await;
    servicio.crear_cliente(&cliente("1102233445")).await;

    let respuesta = servicio.crear_cliente(&cliente("1102233445")).await;
    assert!(!respuesta.exito);
    let detalles = respuesta.detalles.unwrap();
    assert_eq!(detalles["NORTE"].clase, Some(ClaseError::ViolacionUnicidad));
    assert_eq!(detalles["SUR"].clase, Some(ClaseError::ViolacionUnicidad));
}

#[tokio::test]
async fn el_vehiculo_replica_y_exige_a_su_cliente() {
    let (servicio, norte, sur) = sistema().await;

    let vehiculo = Vehiculo::nuevo("PBX-9021", "1102233445", "Kia", "Sportage", 2022).unwrap();
    let sin_cliente = servicio.crear_vehiculo(&vehiculo).await;
    assert!(!sin_cliente.exito);
    let detalles = sin_cliente.detalles.unwrap();
    assert_eq!(detalles["NORTE"].clase, Some(ClaseError::ViolacionClaveForanea));

    servicio.crear_cliente(&cliente("1102233445")).await;
    let con_cliente = servicio.crear_vehiculo(&vehiculo).await;
    assert!(con_cliente.exito);
    assert_eq!(norte.listar_vehiculos().await.unwrap().len(), 1);
    assert_eq!(sur.listar_vehiculos().await.unwrap().len(), 1);

    // La lectura une el vehículo con su dueño replicado.
    let listado = servicio.obtener_vehiculos().await.data.unwrap();
    assert_eq!(listado[0].nombre_cliente, "Paula");
}
