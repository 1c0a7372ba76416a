use std::sync::Arc;

use chrono::NaiveDate;

use policar_core::{MemSedeStore, RegistroSedes, SedeStore, ServicioDatos};
use policar_domain::{ActualizacionEmpleado, Cliente, EmpleadoCompleto, NuevaReparacion, NuevoRepuesto, Sede,
                     UsoRepuesto, Vehiculo};

fn fecha(anio: i32, mes: u32, dia: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(anio, mes, dia).expect("fecha de demo válida")
}

/// Sistema completo en memoria: las tres sedes registradas y verificadas.
/// Devuelve los handles de NORTE y SUR para simular caídas de enlace.
async fn armar_sistema() -> (ServicioDatos, Arc<MemSedeStore>, Arc<MemSedeStore>) {
    let norte = Arc::new(MemSedeStore::nuevo(Sede::Norte));
    let sur = Arc::new(MemSedeStore::nuevo(Sede::Sur));
    let central = Arc::new(MemSedeStore::nuevo(Sede::Central));
    let registro = Arc::new(RegistroSedes::con_nodos(vec![norte.clone(), sur.clone(), central]));
    registro.conectar_todas().await;
    (ServicioDatos::nuevo(registro), norte, sur)
}

/// Validación de estado: verificación de las tres sedes y foto idempotente.
async fn validar_estado() {
    let (servicio, _norte, _sur) = armar_sistema().await;

    let respuesta = servicio.estado_conexiones().await;
    assert!(respuesta.exito, "el estado de conexiones siempre responde");
    let estado = respuesta.data.expect("estado presente");
    for (sede, detalle) in &estado.sedes {
        println!("  {sede}: {}", if detalle.conectada { "conectada" } else { "sin conexión" });
    }
    assert!(estado.todas_conectadas(), "las tres sedes en memoria deben conectar");

    // Repetir la verificación sin cambios en la red da la misma foto.
    let repetido = servicio.estado_conexiones().await.data.expect("estado presente");
    assert_eq!(repetido.resumen.conectadas, estado.resumen.conectadas);
    println!("!Validación de estado: OK ({} de {} sedes conectadas)",
             estado.resumen.conectadas, estado.resumen.total);
}

/// Validación de réplica: Cliente y Vehiculo existen con los mismos datos en
/// las tres sedes, con unicidad y claves foráneas vigiladas en cada copia.
async fn validar_replicacion() {
    let (servicio, _norte, _sur) = armar_sistema().await;

    let cliente = Cliente::nuevo("0912345678", "Carlos", "Mendoza", "Norte").expect("cliente de demo válido");
    let alta = servicio.crear_cliente(&cliente).await;
    println!("  {}", alta.mensaje);
    assert!(alta.exito);
    assert!(alta.mensaje.contains("3 de 3 sede(s)"), "el cliente debe replicarse en las tres sedes");

    // El duplicado choca contra la unicidad en todas las réplicas.
    let duplicado = servicio.crear_cliente(&cliente).await;
    assert!(!duplicado.exito);
    println!("  {}", duplicado.mensaje);

    // El vehículo exige que el dueño exista en la réplica local.
    let sin_dueno = Vehiculo::nuevo("XYZ-0001", "0999999999", "Kia", "Rio", 2021).expect("vehículo de demo válido");
    let rechazo = servicio.crear_vehiculo(&sin_dueno).await;
    assert!(!rechazo.exito, "un vehículo sin dueño registrado se rechaza");

    let vehiculo = Vehiculo::nuevo("ABC-1234", "0912345678", "Toyota", "Corolla", 2020).expect("vehículo de demo válido");
    assert!(servicio.crear_vehiculo(&vehiculo).await.exito);
    let listado = servicio.obtener_vehiculos().await.data.expect("listado presente");
    assert_eq!(listado.len(), 1);
    assert_eq!(listado[0].nombre_cliente, "Carlos");

    // Mientras tenga vehículos, el cliente no puede darse de baja.
    let protegido = servicio.eliminar_cliente("0912345678").await;
    assert!(!protegido.exito);
    println!("  {}", protegido.mensaje);

    println!("!Validación de réplica: OK (alta en 3 sedes, unicidad y claves foráneas)");
}

/// Validación de fragmentos: cada taller numera su fragmento de repuestos
/// desde 1, CENTRAL no almacena fragmentos y la lectura global une talleres.
async fn validar_fragmentacion() {
    let (servicio, _norte, _sur) = armar_sistema().await;

    let filtro = NuevoRepuesto { sede_taller: Sede::Norte,
                                 nombre_repuesto: "Filtro de aceite".into(),
                                 descripcion_repuesto: "Filtro estándar de motor".into(),
                                 cantidad_repuesto: 10,
                                 precio_unitario: 8.5 };
    let bujia = NuevoRepuesto { sede_taller: Sede::Sur,
                                nombre_repuesto: "Bujía".into(),
                                descripcion_repuesto: String::new(),
                                cantidad_repuesto: 20,
                                precio_unitario: 4.0 };
    let en_norte = servicio.crear_repuesto(&filtro).await.data.expect("repuesto creado");
    let en_sur = servicio.crear_repuesto(&bujia).await.data.expect("repuesto creado");
    assert_eq!(en_norte.id_repuesto, 1);
    assert_eq!(en_sur.id_repuesto, 1, "los ids de repuesto son locales a cada taller");

    let central = NuevoRepuesto { sede_taller: Sede::Central, ..filtro.clone() };
    let rechazo = servicio.crear_repuesto(&central).await;
    assert!(!rechazo.exito);
    println!("  {}", rechazo.mensaje);
    assert!(rechazo.mensaje.contains("no almacena fragmentos"));

    let union = servicio.obtener_todos_repuestos().await;
    println!("  {}", union.mensaje);
    assert_eq!(union.data.expect("unión presente").len(), 2);

    println!("!Validación de fragmentos: OK (ids locales por taller y unión de 2 talleres)");
}

/// Validación de reparaciones: el alta descuenta stock dentro de la
/// transacción local del taller, un repuesto inexistente anula todo y la
/// baja busca el taller dueño sin pedir la sede.
async fn validar_reparaciones() {
    let (servicio, _norte, _sur) = armar_sistema().await;

    let cliente = Cliente::nuevo("1712345678", "María", "Salazar", "Sur").expect("cliente de demo válido");
    servicio.crear_cliente(&cliente).await;
    let vehiculo = Vehiculo::nuevo("PCH-2048", "1712345678", "Chevrolet", "Aveo", 2018).expect("vehículo de demo válido");
    servicio.crear_vehiculo(&vehiculo).await;
    let pastillas = NuevoRepuesto { sede_taller: Sede::Sur,
                                    nombre_repuesto: "Pastillas de freno".into(),
                                    descripcion_repuesto: String::new(),
                                    cantidad_repuesto: 6,
                                    precio_unitario: 30.0 };
    let id_pastillas = servicio.crear_repuesto(&pastillas).await.data.expect("repuesto creado").id_repuesto;

    let alta = NuevaReparacion { placa: "PCH-2048".into(),
                                 sede_taller: Sede::Sur,
                                 fecha_reparacion: fecha(2024, 6, 10),
                                 descripcion: "Cambio de frenos".into(),
                                 precio_total: 95.0,
                                 repuestos: vec![UsoRepuesto { id_repuesto: id_pastillas, cantidad_usada: 2 }] };
    let creada = servicio.crear_reparacion(&alta).await;
    println!("  {}", creada.mensaje);
    assert!(creada.exito);
    let id_reparacion = creada.data.expect("reparación creada").id_reparacion;
    let restante = servicio.obtener_repuesto(Sede::Sur, id_pastillas).await.data.expect("repuesto presente");
    assert_eq!(restante.cantidad_repuesto, 4, "el alta descuenta el stock usado");

    // Un repuesto inexistente anula el alta completa: ni cabecera ni descuento.
    let rota = NuevaReparacion { descripcion: "Intento con repuesto inexistente".into(),
                                 repuestos: vec![UsoRepuesto { id_repuesto: 99, cantidad_usada: 1 }],
                                 ..alta.clone() };
    let rechazo = servicio.crear_reparacion(&rota).await;
    assert!(!rechazo.exito);
    println!("  {}", rechazo.mensaje);
    let despues = servicio.obtener_repuesto(Sede::Sur, id_pastillas).await.data.expect("repuesto presente");
    assert_eq!(despues.cantidad_repuesto, 4, "un alta rechazada no descuenta stock");

    let usados = servicio.obtener_repuestos_de_reparacion(id_reparacion).await.data.expect("detalle presente");
    assert_eq!(usados.len(), 1);
    assert_eq!(usados[0].nombre_repuesto, "Pastillas de freno");

    let baja = servicio.eliminar_reparacion(id_reparacion).await;
    println!("  {}", baja.mensaje);
    assert!(baja.exito);
    assert_eq!(baja.data.expect("baja presente").detalles_eliminados, 1);

    println!("!Validación de reparaciones: OK (transacción local, rechazo sin rastro y baja con búsqueda)");
}

/// Validación de empleados: la entidad compuesta parte en fragmento de
/// información (solo su taller) y nómina replicada (las tres sedes).
async fn validar_empleados() {
    let (servicio, norte, sur) = armar_sistema().await;

    let empleado = EmpleadoCompleto::nuevo("1712345678", "Marco Vinueza", Sede::Norte, fecha(2023, 6, 1), 920.0)
        .expect("empleado de demo válido");
    let alta = servicio.crear_empleado_completo(&empleado).await;
    println!("  {}", alta.mensaje);
    assert!(alta.exito);
    let detalles = alta.detalles.expect("detalle por sede presente");
    assert!(detalles["info_NORTE"].exito);
    assert!(detalles["nomina_CENTRAL"].exito);

    assert_eq!(norte.listar_empleados_info().await.expect("norte responde").len(), 1);
    assert!(sur.listar_empleados_info().await.expect("sur responde").is_empty());

    let completo = servicio.obtener_empleado("1712345678").await;
    println!("  {}", completo.mensaje);
    assert!(completo.exito);
    assert_eq!(completo.data.expect("empleado presente").salario, 920.0);

    // El cambio de sede por update se rechaza: para eso está el traslado.
    let cambios = ActualizacionEmpleado { nombre_empleado: "Marco V.".into(),
                                          sede_taller: Some(Sede::Sur),
                                          fecha_comienzo: fecha(2023, 6, 1),
                                          salario: 980.0 };
    let rechazo = servicio.actualizar_empleado("1712345678", &cambios).await;
    assert!(!rechazo.exito);
    println!("  {}", rechazo.mensaje);

    let traslado = servicio.transferir_empleado("1712345678", Sede::Sur).await;
    println!("  {}", traslado.mensaje);
    assert!(traslado.exito);
    assert!(norte.listar_empleados_info().await.expect("norte responde").is_empty());

    let nomina = servicio.obtener_nomina_completa().await.data.expect("nómina presente");
    assert_eq!(nomina.len(), 1);
    assert_eq!(nomina[0].sede_taller, Sede::Sur);

    let baja = servicio.eliminar_empleado("1712345678").await;
    println!("  {}", baja.mensaje);
    assert_eq!(baja.data, Some(4), "1 fila de información + 3 réplicas de nómina");

    println!("!Validación de empleados: OK (fragmento + réplica, traslado y baja total)");
}

/// Validación de tolerancia: una sede caída no detiene las escrituras
/// replicadas ni las uniones de fragmentos, y la reconexión restablece todo.
async fn validar_tolerancia() {
    let (servicio, _norte, sur) = armar_sistema().await;

    sur.desconectar();
    let estado = servicio.estado_conexiones().await;
    println!("  {}", estado.mensaje);
    assert!(estado.mensaje.contains("2 de 3"));

    let cliente = Cliente::nuevo("0955555555", "Elena", "Paz", "Centro").expect("cliente de demo válido");
    let alta = servicio.crear_cliente(&cliente).await;
    println!("  {}", alta.mensaje);
    assert!(alta.exito, "la escritura replicada sigue con las sedes vivas");
    assert!(alta.mensaje.contains("2 de 3 sede(s)"));
    let detalles = alta.detalles.expect("detalle por sede presente");
    assert!(!detalles["SUR"].exito);

    let repuesto = NuevoRepuesto { sede_taller: Sede::Norte,
                                   nombre_repuesto: "Amortiguador".into(),
                                   descripcion_repuesto: String::new(),
                                   cantidad_repuesto: 4,
                                   precio_unitario: 55.0 };
    servicio.crear_repuesto(&repuesto).await;
    let union = servicio.obtener_todos_repuestos().await;
    println!("  {}", union.mensaje);
    assert!(union.exito, "la unión reporta el taller caído sin ocultar el resto");
    assert!(union.mensaje.contains("1 taller(es)"));

    sur.reconectar();
    let recuperado = servicio.estado_conexiones().await.data.expect("estado presente");
    assert!(recuperado.todas_conectadas());

    println!("!Validación de tolerancia: OK (la caída de SUR no detiene al resto)");
}

/// Datos mínimos para las consultas distribuidas: dos clientes con vehículo,
/// un empleado por taller, un repuesto por taller y una reparación en SUR.
async fn sembrar_demo(servicio: &ServicioDatos) {
    let clientes = [Cliente::nuevo("0912345678", "Carlos", "Mendoza", "Norte").expect("cliente de demo válido"),
                    Cliente::nuevo("1712345678", "María", "Salazar", "Sur").expect("cliente de demo válido")];
    for cliente in &clientes {
        assert!(servicio.crear_cliente(cliente).await.exito);
    }
    let vehiculos = [Vehiculo::nuevo("ABC-1234", "0912345678", "Toyota", "Corolla", 2020).expect("vehículo de demo válido"),
                     Vehiculo::nuevo("PCH-2048", "1712345678", "Chevrolet", "Aveo", 2018).expect("vehículo de demo válido")];
    for vehiculo in &vehiculos {
        assert!(servicio.crear_vehiculo(vehiculo).await.exito);
    }
    for (cedula, nombre, sede) in [("0601234567", "Luis Cabrera", Sede::Norte),
                                   ("0909876543", "Ana Quinde", Sede::Sur)] {
        let empleado = EmpleadoCompleto::nuevo(cedula, nombre, sede, fecha(2022, 3, 15), 850.0)
            .expect("empleado de demo válido");
        assert!(servicio.crear_empleado_completo(&empleado).await.exito);
    }
    for sede in Sede::talleres() {
        let alta = NuevoRepuesto { sede_taller: sede,
                                   nombre_repuesto: "Aceite 10W40".into(),
                                   descripcion_repuesto: String::new(),
                                   cantidad_repuesto: 30,
                                   precio_unitario: 12.0 };
        assert!(servicio.crear_repuesto(&alta).await.exito);
    }
    let reparacion = NuevaReparacion { placa: "PCH-2048".into(),
                                       sede_taller: Sede::Sur,
                                       fecha_reparacion: fecha(2024, 7, 2),
                                       descripcion: "Cambio de aceite".into(),
                                       precio_total: 45.0,
                                       repuestos: vec![UsoRepuesto { id_repuesto: 1, cantidad_usada: 4 }] };
    assert!(servicio.crear_reparacion(&reparacion).await.exito);
}

/// Validación de consultas: el resumen por sede y las estadísticas globales
/// cuentan los replicados una sola vez y suman los fragmentos.
async fn validar_consultas() {
    let (servicio, _norte, _sur) = armar_sistema().await;
    sembrar_demo(&servicio).await;

    let resumen = servicio.obtener_resumen_sedes().await.data.expect("resumen presente");
    for bloque in &resumen.resumen_por_sedes {
        println!("  {}: {} empleado(s), {} reparación(es), ingresos {:.2}",
                 bloque.nombre_taller, bloque.total_empleados, bloque.total_reparaciones, bloque.ingresos_totales);
    }
    assert_eq!(resumen.resumen_por_sedes.len(), 2);
    // Los replicados cuentan solo en el primer taller del recorrido.
    assert_eq!(resumen.resumen_por_sedes[1].total_clientes, 0);
    assert_eq!(resumen.totales.total_clientes, 2);
    assert_eq!(resumen.totales.total_empleados, 2);

    let estadisticas = servicio.obtener_estadisticas().await.data.expect("estadísticas presentes");
    println!("{}", serde_json::to_string_pretty(&estadisticas).unwrap_or_default());
    assert_eq!(estadisticas.total_clientes, 2, "la réplica no duplica clientes");
    assert_eq!(estadisticas.total_repuestos, 2, "los fragmentos de repuestos se suman");
    assert_eq!(estadisticas.total_reparaciones, 1);
    assert_eq!(estadisticas.detalles_por_sede.len(), 2);

    println!("!Validación de consultas: OK (resumen por sede y estadísticas sin duplicar réplicas)");
}

#[tokio::main]
async fn main() {
    // Cargar variables de entorno desde .env si existe (antes de leer las URLs por sede)
    let _ = dotenvy::dotenv();

    println!("--- Iniciando validación de estado ---");
    validar_estado().await;
    println!("--- Iniciando validación de réplica ---");
    validar_replicacion().await;
    println!("--- Iniciando validación de fragmentos ---");
    validar_fragmentacion().await;
    println!("--- Iniciando validación de reparaciones ---");
    validar_reparaciones().await;
    println!("--- Iniciando validación de empleados ---");
    validar_empleados().await;
    println!("--- Iniciando validación de tolerancia ---");
    validar_tolerancia().await;
    println!("--- Iniciando validación de consultas ---");
    validar_consultas().await;

    #[cfg(feature = "pg_demo")]
    maybe_run_pg_demo().await;
    #[cfg(not(feature = "pg_demo"))]
    eprintln!("[PG DEMO] Compilado sin la feature pg_demo; demo de Postgres omitida");
}

#[cfg(feature = "pg_demo")]
mod pg_demo {
    use std::sync::Arc;

    use policar_core::ServicioDatos;
    use policar_persistence::registro_desde_env;

    /// Recorre las sedes Postgres configuradas por entorno: verifica la
    /// conectividad y lee las estadísticas distribuidas reales.
    pub async fn run() -> Result<(), String> {
        let registro = registro_desde_env().map_err(|e| e.to_string())?;
        let servicio = ServicioDatos::nuevo(Arc::new(registro));

        let estado = servicio.estado_conexiones().await;
        println!("[PG] {}", estado.mensaje);
        let foto = estado.data.ok_or_else(|| "estado sin datos".to_string())?;
        for (sede, detalle) in &foto.sedes {
            println!("[PG]   {sede}: {}", if detalle.conectada { "conectada" } else { "sin conexión" });
        }
        if foto.resumen.conectadas == 0 {
            return Err("ninguna sede de Postgres respondió".into());
        }

        let estadisticas = servicio.obtener_estadisticas().await;
        println!("[PG] {}", estadisticas.mensaje);
        if let Some(datos) = estadisticas.data {
            println!("{}", serde_json::to_string_pretty(&datos).unwrap_or_default());
        }
        Ok(())
    }
}

#[cfg(feature = "pg_demo")]
async fn maybe_run_pg_demo() {
    // Ejecutar solo bajo pedido explícito: exige sedes Postgres accesibles.
    if std::env::var("POLICAR_RUN_PG_DEMO").ok().as_deref() != Some("1") {
        eprintln!("[PG DEMO] Omitido (exporte POLICAR_RUN_PG_DEMO=1 para habilitarlo)");
        return;
    }
    if let Err(e) = pg_demo::run().await {
        eprintln!("[PG DEMO] Error: {e}");
    }
}
