//! Ciclo de vida de la entidad compuesta Empleado: fragmento de información
//! más nómina replicada.

use std::sync::Arc;

use chrono::NaiveDate;
use policar_core::{MemSedeStore, RegistroSedes, SedeStore, ServicioDatos};
use policar_domain::{ActualizacionEmpleado, EmpleadoCompleto, Sede};

async fn sistema() -> (ServicioDatos, Arc<MemSedeStore>, Arc<MemSedeStore>) {
    let norte = Arc::new(MemSedeStore::nuevo(Sede::Norte));
    let sur = Arc::new(MemSedeStore::nuevo(Sede::Sur));
    let registro = Arc::new(RegistroSedes::con_nodos(vec![norte.clone(), sur.clone()]));
    registro.conectar_todas().await;
    (ServicioDatos::nuevo(registro), norte, sur)
}

fn fecha(anio: i32, mes: u32, dia: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(anio, mes, dia).unwrap()
}

fn empleado(cedula: &str, nombre: &str, sede: Sede) -> EmpleadoCompleto {
    EmpleadoCompleto::nuevo(cedula, nombre, sede, fecha(2022, 9, 15), 780.0).unwrap()
}

#[tokio::test]
async fn la_cedula_duplicada_se_rechaza_antes_de_replicar_la_nomina() {
    let (servicio, norte, sur) = sistema().await;
    servicio.crear_empleado_completo(&empleado("1710002003", "Iván Torres", Sede::Norte)).await;

    let repetido = servicio.crear_empleado_completo(&empleado("1710002003", "Otro Nombre", Sede::Norte)).await;
    assert!(!repetido.exito);
    assert!(repetido.mensaje.contains("Ya existe un empleado"));

    // El rechazo ocurre antes de tocar la nómina: sigue habiendo exactamente
    // una fila por réplica, sin registro huérfano.
    assert_eq!(norte.listar_nominas().await.unwrap().len(), 1);
    assert_eq!(sur.listar_nominas().await.unwrap().len(), 1);
}

#[tokio::test]
async fn la_nomina_duplicada_tambien_bloquea_el_alta() {
    let (servicio, norte, sur) = sistema().await;
    servicio.crear_empleado_completo(&empleado("1710002003", "Iván Torres", Sede::Norte)).await;

    // Misma cédula pero en el otro taller: la información no choca, la
    // nómina replicada sí.
    let en_sur = servicio.crear_empleado_completo(&empleado("1710002003", "Iván Torres", Sede::Sur)).await;
    assert!(!en_sur.exito);
    assert!(en_sur.mensaje.contains("Ya existe nómina"));
    assert!(sur.listar_empleados_info().await.unwrap().is_empty());
    assert_eq!(norte.listar_nominas().await.unwrap().len(), 1);
}

#[tokio::test]
async fn el_empleado_se_reconstruye_desde_sus_fragmentos() {
    let (servicio, _norte, _sur) = sistema().await;
    let original = empleado("1710002003", "Iván Torres", Sede::Sur);
    servicio.crear_empleado_completo(&original).await;

    let respuesta = servicio.obtener_empleado("1710002003").await;
    assert!(respuesta.exito);
    assert_eq!(respuesta.data.unwrap(), original);
}

#[tokio::test]
async fn la_actualizacion_toca_info_local_y_nomina_global() {
    let (servicio, norte, sur) = sistema().await;
    servicio.crear_empleado_completo(&empleado("1710002003", "Iván Torres", Sede::Norte)).await;

    let cambios = ActualizacionEmpleado { nombre_empleado: "Iván A. Torres".to_string(),
                                          sede_taller: None,
                                          fecha_comienzo: fecha(2022, 9, 15),
                                          salario: 815.0 };
    let respuesta = servicio.actualizar_empleado("1710002003", &cambios).await;
    assert!(respuesta.exito);
    // 1 fila de información + 2 de nómina.
    assert_eq!(respuesta.data, Some(3));
    let detalles = respuesta.detalles.unwrap();
    assert!(detalles["info_NORTE"].exito);
    assert!(detalles["nomina_NORTE"].exito);
    assert!(detalles["nomina_SUR"].exito);

    assert_eq!(norte.listar_empleados_info().await.unwrap()[0].nombre_empleado, "Iván A. Torres");
    assert_eq!(sur.buscar_nomina("1710002003").await.unwrap().unwrap().salario, 815.0);
}

#[tokio::test]
async fn el_traslado_deja_un_solo_fragmento_en_el_destino() {
    let (servicio, norte, sur) = sistema().await;
    servicio.crear_empleado_completo(&empleado("1710002003", "Iván Torres", Sede::Norte)).await;

    let respuesta = servicio.transferir_empleado("1710002003", Sede::Sur).await;
    assert!(respuesta.exito);
    assert_eq!(respuesta.mensaje, "Empleado 1710002003 trasladado de NORTE a SUR");
    assert!(norte.listar_empleados_info().await.unwrap().is_empty());
    assert_eq!(sur.listar_empleados_info().await.unwrap().len(), 1);

    // Trasladar a la sede actual no duplica nada.
    let repetido = servicio.transferir_empleado("1710002003", Sede::Sur).await;
    assert!(repetido.exito);
    assert!(repetido.mensaje.contains("ya está asignado"));
    assert_eq!(sur.listar_empleados_info().await.unwrap().len(), 1);
}

#[tokio::test]
async fn el_traslado_a_central_se_rechaza() {
    let (servicio, _norte, _sur) = sistema().await;
    servicio.crear_empleado_completo(&empleado("1710002003", "Iván Torres", Sede::Norte)).await;

    let respuesta = servicio.transferir_empleado("1710002003", Sede::Central).await;
    assert!(!respuesta.exito);
    assert_eq!(respuesta.mensaje, "La sede CENTRAL no almacena fragmentos (use NORTE o SUR)");
}

#[tokio::test]
async fn la_baja_elimina_informacion_y_todas_las_replicas_de_nomina() {
    let (servicio, norte, sur) = sistema().await;
    servicio.crear_empleado_completo(&empleado("1710002003", "Iván Torres", Sede::Sur)).await;

    let respuesta = servicio.eliminar_empleado("1710002003").await;
    assert!(respuesta.exito);
    assert_eq!(respuesta.mensaje, "Empleado eliminado: 1 registro(s) de información y 2 de nómina");
    assert!(sur.listar_empleados_info().await.unwrap().is_empty());
    assert!(norte.listar_nominas().await.unwrap().is_empty());
    assert!(sur.listar_nominas().await.unwrap().is_empty());

    let repetida = servicio.eliminar_empleado("1710002003").await;
    assert!(!repetida.exito);
    assert!(repetida.mensaje.contains("no encontrado"));
}

#[tokio::test]
async fn la_nomina_completa_une_talleres_y_calcula_dias() {
    let (servicio, _norte, _sur) = sistema().await;
    servicio.crear_empleado_completo(&empleado("1710002003", "Iván Torres", Sede::Norte)).await;
    servicio.crear_empleado_completo(&empleado("0923344556", "Rosa Paucar", Sede::Sur)).await;

    let respuesta = servicio.obtener_nomina_completa().await;
    assert!(respuesta.exito);
    let filas = respuesta.data.unwrap();
    assert_eq!(filas.len(), 2);
    assert!(filas.iter().any(|fila| fila.sede_taller == Sede::Norte));
    assert!(filas.iter().any(|fila| fila.sede_taller == Sede::Sur));
    assert!(filas.iter().all(|fila| fila.dias_trabajados > 0));
}

#[tokio::test]
async fn la_nomina_completa_sigue_sirviendo_con_un_taller_caido() {
    let (servicio, norte, _sur) = sistema().await;
    servicio.crear_empleado_completo(&empleado("1710002003", "Iván Torres", Sede::Norte)).await;
    servicio.crear_empleado_completo(&empleado("0923344556", "Rosa Paucar", Sede::Sur)).await;

    norte.desconectar();
    let respuesta = servicio.obtener_nomina_completa().await;
    assert!(respuesta.exito);
    // Solo aparecen los empleados del taller vivo; la nómina sale de la
    // réplica de SUR.
    let filas = respuesta.data.unwrap();
    assert_eq!(filas.len(), 1);
    assert_eq!(filas[0].sede_taller, Sede::Sur);
    let detalles = respuesta.detalles.unwrap();
    assert!(!detalles["NORTE"].exito);
}
