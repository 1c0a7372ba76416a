//! Ensamblador de la entidad compuesta `Empleado`.
//!
//! Un empleado vive partido en dos fragmentos con modos de distribución
//! distintos: la información personal está fragmentada por sede (solo la
//! sede donde trabaja tiene la fila) y la nómina está replicada en todas.
//! Este módulo coordina las operaciones que tocan ambos fragmentos y arma
//! las respuestas con el detalle por sede (`info_SEDE` / `nomina_SEDE`).

use std::collections::HashMap;

use chrono::Utc;
use log::debug;

use policar_domain::{ActualizacionEmpleado, EmpleadoCompleto, EmpleadoInformacion, EmpleadoNomina, NominaEmpleado,
                     Sede};

use crate::fragmento::{ejecutar_en, leer_fragmentos};
use crate::registro::RegistroSedes;
use crate::replica::{escribir_en_todas, leer_replicada};
use crate::respuesta::{DetalleOperacion, Respuesta, ResultadoSede};
use crate::router::{resolver, Entidad};

fn objetivos_info(registro: &RegistroSedes) -> Result<Vec<Sede>, String> {
    resolver(&registro.sedes(), Entidad::EmpleadoInformacion, None).map(|resolucion| resolucion.objetivos)
                                                                   .map_err(|err| err.to_string())
}

fn objetivos_nomina(registro: &RegistroSedes) -> Result<Vec<Sede>, String> {
    resolver(&registro.sedes(), Entidad::EmpleadoNomina, None).map(|resolucion| resolucion.objetivos)
                                                              .map_err(|err| err.to_string())
}

/// Busca el fragmento de información recorriendo los talleres en orden de
/// registro. Un taller caído se salta: si el empleado vive ahí, la búsqueda
/// lo reporta como no encontrado, igual que una consulta directa fallida.
async fn buscar_info(registro: &RegistroSedes, talleres: &[Sede], cedula: &str)
                     -> Option<(Sede, EmpleadoInformacion)> {
    for sede in talleres {
        if let Some(store) = registro.get(*sede) {
            match store.buscar_empleado_info(cedula).await {
                Ok(Some(info)) => return Some((*sede, info)),
                Ok(None) => {}
                Err(err) => debug!("búsqueda de empleado: sede {sede} no respondió ({err})"),
            }
        }
    }
    None
}

/// Alta de un empleado completo. La información entra solo en la sede donde
/// trabaja; la nómina se replica en todas las sedes configuradas. El alta es
/// exitosa si la información quedó en su sede y la nómina llegó al menos a
/// una réplica.
pub async fn crear_empleado_completo(registro: &RegistroSedes, empleado: &EmpleadoCompleto)
                                     -> Respuesta<EmpleadoCompleto> {
    if let Err(err) = empleado.validar() {
        return Respuesta::fallo(err.to_string());
    }
    let sede_duena = empleado.sede_taller;

    let cedula = empleado.cedula_empleado.clone();
    match ejecutar_en(registro, sede_duena, |store| async move { store.buscar_empleado_info(&cedula).await }).await {
        Err(err) => {
            return Respuesta::fallo(format!("No se pudo verificar la cédula en {sede_duena}: {err}"));
        }
        Ok(Some(_)) => {
            return Respuesta::fallo(format!("Ya existe un empleado con cédula {} en {sede_duena}",
                                            empleado.cedula_empleado));
        }
        Ok(None) => {}
    }

    let replicas = match objetivos_nomina(registro) {
        Ok(sedes) => sedes,
        Err(mensaje) => return Respuesta::fallo(mensaje),
    };
    let cedula = empleado.cedula_empleado.clone();
    match leer_replicada(registro, &replicas, |store| {
              let cedula = cedula.clone();
              async move { store.buscar_nomina(&cedula).await }
          }).await
    {
        Err(err) => return Respuesta::fallo(format!("No se pudo verificar la nómina: {err}")),
        Ok((_, Some(_))) => {
            return Respuesta::fallo(format!("Ya existe nómina registrada para la cédula {}",
                                            empleado.cedula_empleado));
        }
        Ok((_, None)) => {}
    }

    let mut detalles = DetalleOperacion::new();
    let clave_info = format!("info_{}", sede_duena.codigo());
    let info = empleado.informacion();
    match ejecutar_en(registro, sede_duena, |store| async move { store.insertar_empleado_info(&info).await }).await {
        Ok(()) => {
            detalles.insert(clave_info, ResultadoSede::ok());
        }
        Err(err) => {
            detalles.insert(clave_info, ResultadoSede::fallo(&err));
            return Respuesta::fallo(format!("No se pudo crear la información en {sede_duena}: {err}"))
                             .con_detalles(detalles);
        }
    }

    let nomina = empleado.nomina();
    let replicacion = escribir_en_todas(registro, &replicas, move |store| {
                          let fila = nomina.clone();
                          async move { store.insertar_nomina(&fila).await }
                      }).await;
    detalles.extend(replicacion.detalles_con_prefijo("nomina"));

    if !replicacion.exito_global() {
        return Respuesta::fallo(format!("Información creada en {sede_duena}, pero la nómina no llegó a ninguna sede"))
                         .con_detalles(detalles);
    }
    Respuesta::ok(empleado.clone(),
                  format!("Empleado creado: información en {}, nómina en {} de {} sede(s)",
                          sede_duena,
                          replicacion.exitos(),
                          replicacion.total())).con_detalles(detalles)
}

/// Reconstruye un empleado completo desde sus fragmentos.
pub async fn obtener_empleado(registro: &RegistroSedes, cedula: &str) -> Respuesta<EmpleadoCompleto> {
    let talleres = match objetivos_info(registro) {
        Ok(sedes) => sedes,
        Err(mensaje) => return Respuesta::fallo(mensaje),
    };
    let (_, info) = match buscar_info(registro, &talleres, cedula).await {
        Some(encontrado) => encontrado,
        None => return Respuesta::fallo(format!("Empleado no encontrado: {cedula}")),
    };

    let replicas = match objetivos_nomina(registro) {
        Ok(sedes) => sedes,
        Err(mensaje) => return Respuesta::fallo(mensaje),
    };
    let cedula_buscada = cedula.to_string();
    match leer_replicada(registro, &replicas, |store| {
              let cedula = cedula_buscada.clone();
              async move { store.buscar_nomina(&cedula).await }
          }).await
    {
        Err(err) => Respuesta::fallo(format!("No se pudo leer la nómina: {err}")),
        Ok((_, None)) => Respuesta::fallo(format!("El empleado {cedula} no tiene nómina registrada")),
        Ok((sede_nomina, Some(nomina))) => {
            Respuesta::ok(EmpleadoCompleto::desde_fragmentos(&info, &nomina),
                          format!("Empleado obtenido: información en {}, nómina desde {}",
                                  info.sede_taller, sede_nomina))
        }
    }
}

/// Actualiza nombre (fragmento de información, solo en su sede) y nómina
/// (todas las réplicas). Un intento de cambiar la sede por esta vía se
/// rechaza: el movimiento entre talleres es un traslado, no un update.
pub async fn actualizar_empleado(registro: &RegistroSedes, cedula: &str, cambios: &ActualizacionEmpleado)
                                 -> Respuesta<u64> {
    if let Err(err) = cambios.validar() {
        return Respuesta::fallo(err.to_string());
    }
    let talleres = match objetivos_info(registro) {
        Ok(sedes) => sedes,
        Err(mensaje) => return Respuesta::fallo(mensaje),
    };
    let (sede_actual, _) = match buscar_info(registro, &talleres, cedula).await {
        Some(encontrado) => encontrado,
        None => return Respuesta::fallo(format!("Empleado no encontrado: {cedula}")),
    };
    if let Some(destino) = cambios.sede_taller {
        if destino != sede_actual {
            return Respuesta::fallo(format!("El empleado {cedula} pertenece a {sede_actual}; el cambio de sede se \
                                             hace con el traslado, no con una actualización"));
        }
    }

    let cedula_info = cedula.to_string();
    let nombre = cambios.nombre_empleado.clone();
    let resultado_info = ejecutar_en(registro, sede_actual, |store| async move {
                             store.actualizar_empleado_info(&cedula_info, &nombre).await
                         }).await;

    let replicas = match objetivos_nomina(registro) {
        Ok(sedes) => sedes,
        Err(mensaje) => return Respuesta::fallo(mensaje),
    };
    let cedula_nomina = cedula.to_string();
    let fecha = cambios.fecha_comienzo;
    let salario = cambios.salario;
    let replicacion = escribir_en_todas(registro, &replicas, move |store| {
                          let cedula = cedula_nomina.clone();
                          async move { store.actualizar_nomina(&cedula, fecha, salario).await }
                      }).await;

    let mut detalles = DetalleOperacion::new();
    let clave_info = format!("info_{}", sede_actual.codigo());
    match &resultado_info {
        Ok(_) => {
            detalles.insert(clave_info, ResultadoSede::ok());
        }
        Err(err) => {
            detalles.insert(clave_info, ResultadoSede::fallo(err));
        }
    }
    detalles.extend(replicacion.detalles_con_prefijo("nomina"));

    if resultado_info.is_err() && !replicacion.exito_global() {
        return Respuesta::fallo(format!("No se pudo actualizar el empleado {cedula} en ninguna sede"))
                         .con_detalles(detalles);
    }
    let filas_info = match &resultado_info {
        Ok(filas) => *filas,
        Err(_) => 0,
    };
    let filas = filas_info + replicacion.filas_afectadas();
    Respuesta::ok(filas,
                  format!("Empleado actualizado: información en {}, nómina en {} de {} sede(s)",
                          sede_actual,
                          replicacion.exitos(),
                          replicacion.total())).con_detalles(detalles)
}

/// Traslada el fragmento de información a otro taller: copia la fila en el
/// destino y luego la borra del origen. Si la baja del origen falla, la
/// copia queda duplicada y la respuesta lo reporta sede por sede.
pub async fn transferir_empleado(registro: &RegistroSedes, cedula: &str, destino: Sede)
                                 -> Respuesta<EmpleadoInformacion> {
    if let Err(err) = resolver(&registro.sedes(), Entidad::EmpleadoInformacion, Some(destino)) {
        return Respuesta::fallo(err.to_string());
    }
    let talleres = match objetivos_info(registro) {
        Ok(sedes) => sedes,
        Err(mensaje) => return Respuesta::fallo(mensaje),
    };
    let (origen, info) = match buscar_info(registro, &talleres, cedula).await {
        Some(encontrado) => encontrado,
        None => return Respuesta::fallo(format!("Empleado no encontrado: {cedula}")),
    };
    if origen == destino {
        return Respuesta::ok(info, format!("El empleado {cedula} ya está asignado a la sede {destino}"));
    }

    let nueva = EmpleadoInformacion { cedula_empleado: info.cedula_empleado.clone(),
                                      nombre_empleado: info.nombre_empleado.clone(),
                                      sede_taller: destino };
    let mut detalles = DetalleOperacion::new();
    let clave_destino = format!("info_{}", destino.codigo());
    let copia = nueva.clone();
    match ejecutar_en(registro, destino, |store| async move { store.insertar_empleado_info(&copia).await }).await {
        Ok(()) => {
            detalles.insert(clave_destino, ResultadoSede::ok());
        }
        Err(err) => {
            detalles.insert(clave_destino, ResultadoSede::fallo(&err));
            return Respuesta::fallo(format!("No se pudo copiar el empleado {cedula} a {destino}: {err}"))
                             .con_detalles(detalles);
        }
    }

    let clave_origen = format!("info_{}", origen.codigo());
    let cedula_baja = cedula.to_string();
    match ejecutar_en(registro, origen, |store| async move { store.eliminar_empleado_info(&cedula_baja).await }).await {
        Ok(_) => {
            detalles.insert(clave_origen, ResultadoSede::ok());
            Respuesta::ok(nueva, format!("Empleado {cedula} trasladado de {origen} a {destino}")).con_detalles(detalles)
        }
        Err(err) => {
            detalles.insert(clave_origen, ResultadoSede::fallo(&err));
            Respuesta::fallo(format!("Empleado {cedula} copiado a {destino}, pero la baja en {origen} falló; la \
                                      información quedó duplicada: {err}")).con_detalles(detalles)
        }
    }
}

/// Baja de un empleado: elimina la información en todos los talleres donde
/// aparezca y la nómina en todas las réplicas.
pub async fn eliminar_empleado(registro: &RegistroSedes, cedula: &str) -> Respuesta<u64> {
    let talleres = match objetivos_info(registro) {
        Ok(sedes) => sedes,
        Err(mensaje) => return Respuesta::fallo(mensaje),
    };
    let replicas = match objetivos_nomina(registro) {
        Ok(sedes) => sedes,
        Err(mensaje) => return Respuesta::fallo(mensaje),
    };

    let cedula_info = cedula.to_string();
    let bajas_info = escribir_en_todas(registro, &talleres, move |store| {
                         let cedula = cedula_info.clone();
                         async move { store.eliminar_empleado_info(&cedula).await }
                     }).await;
    let cedula_nomina = cedula.to_string();
    let bajas_nomina = escribir_en_todas(registro, &replicas, move |store| {
                           let cedula = cedula_nomina.clone();
                           async move { store.eliminar_nomina(&cedula).await }
                       }).await;

    let mut detalles = bajas_info.detalles_con_prefijo("info");
    detalles.extend(bajas_nomina.detalles_con_prefijo("nomina"));

    if bajas_info.exitos() == 0 && bajas_nomina.exitos() == 0 {
        let mensaje = bajas_info.primer_error()
                                .or_else(|| bajas_nomina.primer_error())
                                .map(|err| err.to_string())
                                .unwrap_or_else(|| "ninguna sede configurada".to_string());
        return Respuesta::fallo(format!("No se pudo eliminar el empleado {cedula}: {mensaje}")).con_detalles(detalles);
    }

    let filas_info = bajas_info.filas_afectadas();
    let filas_nomina = bajas_nomina.filas_afectadas();
    if filas_info + filas_nomina == 0 {
        return Respuesta::fallo(format!("Empleado no encontrado: {cedula}")).con_detalles(detalles);
    }
    Respuesta::ok(filas_info + filas_nomina,
                  format!("Empleado eliminado: {filas_info} registro(s) de información y {filas_nomina} de nómina"))
              .con_detalles(detalles)
}

/// Nómina completa del sistema: une los fragmentos de información de todos
/// los talleres con la nómina replicada y calcula los días trabajados de
/// cada empleado a la fecha actual.
pub async fn nomina_completa(registro: &RegistroSedes) -> Respuesta<Vec<NominaEmpleado>> {
    let talleres = match objetivos_info(registro) {
        Ok(sedes) => sedes,
        Err(mensaje) => return Respuesta::fallo(mensaje),
    };
    let lectura = leer_fragmentos(registro, &talleres, |store| async move { store.listar_empleados_info().await }).await;
    if !lectura.disponible() {
        let mensaje = lectura.primer_error()
                             .map(|err| err.to_string())
                             .unwrap_or_else(|| "ningún taller configurado".to_string());
        return Respuesta::fallo(format!("No se pudo leer la información de empleados: {mensaje}"))
                         .con_detalles(lectura.detalles());
    }

    let replicas = match objetivos_nomina(registro) {
        Ok(sedes) => sedes,
        Err(mensaje) => return Respuesta::fallo(mensaje),
    };
    let nominas = match leer_replicada(registro, &replicas, |store| async move { store.listar_nominas().await }).await {
        Ok((_, filas)) => filas,
        Err(err) => {
            return Respuesta::fallo(format!("No se pudo leer la nómina: {err}")).con_detalles(lectura.detalles());
        }
    };

    let por_cedula: HashMap<&str, &EmpleadoNomina> =
        nominas.iter().map(|nomina| (nomina.cedula_empleado.as_str(), nomina)).collect();
    let hoy = Utc::now().date_naive();
    let filas: Vec<NominaEmpleado> = lectura.filas
                                            .iter()
                                            .filter_map(|info| {
                                                por_cedula.get(info.cedula_empleado.as_str())
                                                          .map(|nomina| NominaEmpleado::desde(info, nomina, hoy))
                                            })
                                            .collect();
    let total = filas.len();
    Respuesta::ok(filas, format!("{total} empleado(s) en la nómina completa")).con_detalles(lectura.detalles())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memoria::MemSedeStore;
    use crate::store::SedeStore;
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn fecha(anio: i32, mes: u32, dia: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(anio, mes, dia).unwrap()
    }

    fn empleado(cedula: &str, sede: Sede) -> EmpleadoCompleto {
        EmpleadoCompleto::nuevo(cedula, "Marco Vinueza", sede, fecha(2023, 6, 1), 920.0).unwrap()
    }

    async fn sistema() -> (RegistroSedes, Arc<MemSedeStore>, Arc<MemSedeStore>) {
        let norte = Arc::new(MemSedeStore::nuevo(Sede::Norte));
        let sur = Arc::new(MemSedeStore::nuevo(Sede::Sur));
        let registro = RegistroSedes::con_nodos(vec![norte.clone(), sur.clone()]);
        registro.conectar_todas().await;
        (registro, norte, sur)
    }

    #[tokio::test]
    async fn el_alta_parte_la_entidad_en_sus_fragmentos() {
        let (registro, norte, sur) = sistema().await;
        let respuesta = crear_empleado_completo(&registro, &empleado("1712345678", Sede::Norte)).await;
        assert!(respuesta.exito);

        // Información solo en la sede dueña; nómina en ambas réplicas.
        assert_eq!(norte.listar_empleados_info().await.unwrap().len(), 1);
        assert!(sur.listar_empleados_info().await.unwrap().is_empty());
        assert_eq!(norte.listar_nominas().await.unwrap().len(), 1);
        assert_eq!(sur.listar_nominas().await.unwrap().len(), 1);

        let detalles = respuesta.detalles.unwrap();
        let claves: Vec<&String> = detalles.keys().collect();
        assert_eq!(claves, vec!["info_NORTE", "nomina_NORTE", "nomina_SUR"]);
    }

    #[tokio::test]
    async fn el_alta_sobrevive_a_una_replica_caida() {
        let (registro, _norte, sur) = sistema().await;
        sur.desconectar();
        let respuesta = crear_empleado_completo(&registro, &empleado("1712345678", Sede::Norte)).await;
        assert!(respuesta.exito);
        assert!(respuesta.mensaje.contains("1 de 2 sede(s)"));
        let detalles = respuesta.detalles.unwrap();
        assert!(detalles["nomina_NORTE"].exito);
        assert!(!detalles["nomina_SUR"].exito);
    }

    #[tokio::test]
    async fn el_update_rechaza_el_cambio_de_sede() {
        let (registro, _norte, _sur) = sistema().await;
        crear_empleado_completo(&registro, &empleado("1712345678", Sede::Norte)).await;

        let cambios = ActualizacionEmpleado { nombre_empleado: "Marco V.".into(),
                                              sede_taller: Some(Sede::Sur),
                                              fecha_comienzo: fecha(2023, 6, 1),
                                              salario: 980.0 };
        let respuesta = actualizar_empleado(&registro, "1712345678", &cambios).await;
        assert!(!respuesta.exito);
        assert!(respuesta.mensaje.contains("traslado"));
    }

    #[tokio::test]
    async fn el_traslado_mueve_la_informacion_de_taller() {
        let (registro, norte, sur) = sistema().await;
        crear_empleado_completo(&registro, &empleado("1712345678", Sede::Norte)).await;

        let respuesta = transferir_empleado(&registro, "1712345678", Sede::Sur).await;
        assert!(respuesta.exito);
        assert!(norte.listar_empleados_info().await.unwrap().is_empty());
        let en_sur = sur.listar_empleados_info().await.unwrap();
        assert_eq!(en_sur.len(), 1);
        assert_eq!(en_sur[0].sede_taller, Sede::Sur);
        // La nómina replicada no se toca en un traslado.
        assert_eq!(norte.listar_nominas().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn el_traslado_reporta_el_duplicado_si_la_baja_falla() {
        let (registro, norte, _sur) = sistema().await;
        crear_empleado_completo(&registro, &empleado("1712345678", Sede::Norte)).await;

        norte.desconectar();
        let respuesta = transferir_empleado(&registro, "1712345678", Sede::Sur).await;
        // La búsqueda ya no ve al empleado en NORTE (sede caída).
        assert!(!respuesta.exito);
        assert!(respuesta.mensaje.contains("no encontrado"));
    }

    #[tokio::test]
    async fn la_baja_borra_informacion_y_nomina() {
        let (registro, norte, sur) = sistema().await;
        crear_empleado_completo(&registro, &empleado("1712345678", Sede::Sur)).await;

        let respuesta = eliminar_empleado(&registro, "1712345678").await;
        assert!(respuesta.exito);
        assert_eq!(respuesta.data, Some(3)); // 1 de información + 2 de nómina
        assert!(sur.listar_empleados_info().await.unwrap().is_empty());
        assert!(norte.listar_nominas().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn la_nomina_completa_une_fragmentos_y_replica() {
        let (registro, _norte, _sur) = sistema().await;
        crear_empleado_completo(&registro, &empleado("1712345678", Sede::Norte)).await;
        crear_empleado_completo(&registro, &empleado("0998765432", Sede::Sur)).await;

        let respuesta = nomina_completa(&registro).await;
        assert!(respuesta.exito);
        let filas = respuesta.data.unwrap();
        assert_eq!(filas.len(), 2);
        assert_eq!(filas[0].sede_taller, Sede::Norte);
        assert_eq!(filas[1].sede_taller, Sede::Sur);
        assert!(filas.iter().all(|fila| fila.dias_trabajados > 0));
    }
}
