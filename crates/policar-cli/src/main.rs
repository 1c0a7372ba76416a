use std::str::FromStr;
use std::sync::Arc;

use chrono::NaiveDate;
use policar_core::{Respuesta, ServicioDatos};
use policar_domain::{Cliente, EmpleadoCompleto, NuevaReparacion, NuevoRepuesto, Sede, UsoRepuesto, Vehiculo};

fn imprimir_uso() {
    eprintln!("Uso: policar-cli <comando> [opciones]");
    eprintln!("  status                           estado de conexión de las sedes");
    eprintln!("  clientes                         listado replicado de clientes");
    eprintln!("  vehiculos                        listado replicado de vehículos con dueño");
    eprintln!("  empleados [--sede NORTE|SUR]     unión de fragmentos o un taller");
    eprintln!("  repuestos [--sede NORTE|SUR]     unión de fragmentos o un taller");
    eprintln!("  reparaciones [--sede NORTE|SUR]  unión de fragmentos o un taller");
    eprintln!("  resumen                          bloques por sede y totales");
    eprintln!("  estadisticas                     estadísticas distribuidas (JSON)");
    eprintln!("  seed                             carga datos de demostración");
}

/// Arma el servicio contra las bases configuradas en el entorno y verifica
/// las sedes una vez (sin verificación previa ninguna operación despacha).
async fn armar_servicio() -> ServicioDatos {
    let registro = match policar_persistence::registro_desde_env() {
        Ok(registro) => registro,
        Err(e) => {
            eprintln!("[policar] no se pudo armar el registro de sedes: {e}");
            eprintln!("[policar] defina POLICAR_DB_URL_NORTE / POLICAR_DB_URL_SUR (y opcionalmente \
                       POLICAR_DB_URL_CENTRAL) en el entorno o en .env");
            std::process::exit(5);
        }
    };
    let servicio = ServicioDatos::nuevo(Arc::new(registro));
    servicio.estado_conexiones().await;
    servicio
}

/// Imprime el mensaje del sobre por la salida que corresponda y devuelve si
/// la operación fue exitosa.
fn salida<T>(respuesta: &Respuesta<T>) -> bool {
    if respuesta.exito {
        println!("{}", respuesta.mensaje);
    } else {
        eprintln!("[policar] {}", respuesta.mensaje);
    }
    respuesta.exito
}

/// Busca `--sede <NOMBRE>` en los argumentos del subcomando.
fn parsear_sede(args: &[String]) -> Result<Option<Sede>, String> {
    let mut sede = None;
    let mut i = 2;
    while i < args.len() {
        if args[i] == "--sede" {
            i += 1;
            if i < args.len() {
                sede = Some(Sede::from_str(&args[i]).map_err(|e| e.to_string())?);
            }
        }
        i += 1;
    }
    Ok(sede)
}

fn fecha(anio: i32, mes: u32, dia: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(anio, mes, dia).unwrap_or_default()
}

fn nota<T>(respuesta: &Respuesta<T>, fallos: &mut u32) {
    if respuesta.exito {
        println!("  ✓ {}", respuesta.mensaje);
    } else {
        println!("  ✗ {}", respuesta.mensaje);
        *fallos += 1;
    }
}

/// Carga un juego pequeño de datos de demostración a través del servicio:
/// replicados en todas las sedes, fragmentos en su taller.
async fn sembrar(servicio: &ServicioDatos) -> u32 {
    let mut fallos = 0;

    println!("Clientes:");
    let clientes = [Cliente { cedula_cliente: "0912345678".into(),
                              nombre_cliente: "Carlos".into(),
                              apellido_cliente: "Mendoza".into(),
                              zona: "Alborada".into() },
                    Cliente { cedula_cliente: "0923456789".into(),
                              nombre_cliente: "María".into(),
                              apellido_cliente: "Vera".into(),
                              zona: "Kennedy".into() }];
    for cliente in &clientes {
        nota(&servicio.crear_cliente(cliente).await, &mut fallos);
    }

    println!("Vehículos:");
    let vehiculos = [Vehiculo { placa: "GYE-1042".into(),
                                cedula_cliente: "0912345678".into(),
                                marca: "Toyota".into(),
                                modelo: "Corolla".into(),
                                anio: 2019 },
                     Vehiculo { placa: "GYE-2208".into(),
                                cedula_cliente: "0923456789".into(),
                                marca: "Chevrolet".into(),
                                modelo: "Sail".into(),
                                anio: 2021 }];
    for vehiculo in &vehiculos {
        nota(&servicio.crear_vehiculo(vehiculo).await, &mut fallos);
    }

    println!("Empleados:");
    let empleados = [EmpleadoCompleto { cedula_empleado: "0801234567".into(),
                                        nombre_empleado: "Pedro Loor".into(),
                                        sede_taller: Sede::Norte,
                                        fecha_comienzo: fecha(2023, 3, 1),
                                        salario: 850.0 },
                     EmpleadoCompleto { cedula_empleado: "0812345670".into(),
                                        nombre_empleado: "Lucía Mera".into(),
                                        sede_taller: Sede::Sur,
                                        fecha_comienzo: fecha(2022, 11, 15),
                                        salario: 920.0 }];
    for empleado in &empleados {
        nota(&servicio.crear_empleado_completo(empleado).await, &mut fallos);
    }

    println!("Repuestos:");
    let repuestos = [NuevoRepuesto { sede_taller: Sede::Norte,
                                     nombre_repuesto: "Filtro de aceite".into(),
                                     descripcion_repuesto: "Filtro para motor 1.6".into(),
                                     cantidad_repuesto: 25,
                                     precio_unitario: 8.5 },
                     NuevoRepuesto { sede_taller: Sede::Norte,
                                     nombre_repuesto: "Pastillas de freno".into(),
                                     descripcion_repuesto: "Juego delantero".into(),
                                     cantidad_repuesto: 12,
                                     precio_unitario: 34.0 },
                     NuevoRepuesto { sede_taller: Sede::Sur,
                                     nombre_repuesto: "Bujía".into(),
                                     descripcion_repuesto: "Juego x4".into(),
                                     cantidad_repuesto: 40,
                                     precio_unitario: 4.75 }];
    let mut id_filtro_norte = None;
    for (posicion, alta) in repuestos.iter().enumerate() {
        let respuesta = servicio.crear_repuesto(alta).await;
        if posicion == 0 {
            id_filtro_norte = respuesta.data.as_ref().map(|fila| fila.id_repuesto);
        }
        nota(&respuesta, &mut fallos);
    }

    println!("Reparaciones:");
    let usados = match id_filtro_norte {
        Some(id_repuesto) => vec![UsoRepuesto { id_repuesto, cantidad_usada: 1 }],
        None => Vec::new(),
    };
    let alta = NuevaReparacion { placa: "GYE-1042".into(),
                                 sede_taller: Sede::Norte,
                                 fecha_reparacion: fecha(2024, 6, 10),
                                 descripcion: "Cambio de aceite y filtro".into(),
                                 precio_total: 45.0,
                                 repuestos: usados };
    nota(&servicio.crear_reparacion(&alta).await, &mut fallos);

    fallos
}

#[tokio::main]
async fn main() {
    // Cargar .env si existe para obtener las URLs por sede
    let _ = dotenvy::dotenv();
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        imprimir_uso();
        std::process::exit(2);
    }
    let comando = args[1].as_str();
    let conocidos = ["status", "clientes", "vehiculos", "empleados", "repuestos", "reparaciones", "resumen",
                     "estadisticas", "seed"];
    if !conocidos.contains(&comando) {
        imprimir_uso();
        std::process::exit(2);
    }
    let sede = match parsear_sede(&args) {
        Ok(sede) => sede,
        Err(mensaje) => {
            eprintln!("[policar {comando}] {mensaje}");
            std::process::exit(2);
        }
    };
    let servicio = armar_servicio().await;

    match comando {
        "status" => {
            let respuesta = servicio.estado_conexiones().await;
            if let Some(estado) = &respuesta.data {
                for (sede, estado_sede) in &estado.sedes {
                    let marca = if estado_sede.conectada { "conectada" } else { "sin conexión" };
                    println!("  {sede}: {marca}");
                }
                println!("{}", respuesta.mensaje);
                if estado.resumen.conectadas == 0 {
                    std::process::exit(4);
                }
            }
        }
        "clientes" => {
            let respuesta = servicio.obtener_clientes().await;
            if !salida(&respuesta) {
                std::process::exit(4);
            }
            for cliente in respuesta.data.unwrap_or_default() {
                println!("  {}  {}, {}  ({})",
                         cliente.cedula_cliente, cliente.apellido_cliente, cliente.nombre_cliente, cliente.zona);
            }
        }
        "vehiculos" => {
            let respuesta = servicio.obtener_vehiculos().await;
            if !salida(&respuesta) {
                std::process::exit(4);
            }
            for fila in respuesta.data.unwrap_or_default() {
                println!("  {}  {} {} {}  dueño: {} {}",
                         fila.placa, fila.marca, fila.modelo, fila.anio, fila.nombre_cliente, fila.apellido_cliente);
            }
        }
        "empleados" => {
            let respuesta = match sede {
                Some(sede) => servicio.obtener_empleados_por_sede(sede).await,
                None => servicio.obtener_empleados().await,
            };
            if !salida(&respuesta) {
                std::process::exit(4);
            }
            for empleado in respuesta.data.unwrap_or_default() {
                println!("  {}  {}  [{}]",
                         empleado.cedula_empleado, empleado.nombre_empleado, empleado.sede_taller);
            }
        }
        "repuestos" => {
            let respuesta = match sede {
                Some(sede) => servicio.obtener_repuestos_por_sede(sede).await,
                None => servicio.obtener_todos_repuestos().await,
            };
            if !salida(&respuesta) {
                std::process::exit(4);
            }
            for repuesto in respuesta.data.unwrap_or_default() {
                println!("  #{} {}  stock {}  ${:.2}  [{}]",
                         repuesto.id_repuesto,
                         repuesto.nombre_repuesto,
                         repuesto.cantidad_repuesto,
                         repuesto.precio_unitario,
                         repuesto.sede_taller);
            }
        }
        "reparaciones" => {
            let respuesta = match sede {
                Some(sede) => servicio.obtener_reparaciones_por_sede(sede).await,
                None => servicio.obtener_todas_reparaciones().await,
            };
            if !salida(&respuesta) {
                std::process::exit(4);
            }
            for reparacion in respuesta.data.unwrap_or_default() {
                println!("  #{} {}  {}  ${:.2}  [{}]  {}",
                         reparacion.id_reparacion,
                         reparacion.placa,
                         reparacion.fecha_reparacion,
                         reparacion.precio_total,
                         reparacion.sede_taller,
                         reparacion.descripcion);
            }
        }
        "resumen" => {
            let respuesta = servicio.obtener_resumen_sedes().await;
            if !salida(&respuesta) {
                std::process::exit(4);
            }
            if let Some(resumen) = respuesta.data {
                for bloque in &resumen.resumen_por_sedes {
                    println!("  {}: {} empleado(s), {} repuesto(s), {} reparación(es), ingresos ${:.2}",
                             bloque.nombre_taller,
                             bloque.total_empleados,
                             bloque.total_repuestos,
                             bloque.total_reparaciones,
                             bloque.ingresos_totales);
                }
                println!("  Totales: {} cliente(s), {} vehículo(s), {} empleado(s), {} reparación(es)",
                         resumen.totales.total_clientes,
                         resumen.totales.total_vehiculos,
                         resumen.totales.total_empleados,
                         resumen.totales.total_reparaciones);
            }
        }
        "estadisticas" => {
            let respuesta = servicio.obtener_estadisticas().await;
            if !salida(&respuesta) {
                std::process::exit(4);
            }
            if let Some(datos) = &respuesta.data {
                match serde_json::to_string_pretty(datos) {
                    Ok(json) => println!("{json}"),
                    Err(e) => {
                        eprintln!("[policar estadisticas] error de serialización: {e}");
                        std::process::exit(5);
                    }
                }
            }
        }
        "seed" => {
            let fallos = sembrar(&servicio).await;
            if fallos > 0 {
                eprintln!("[policar seed] {fallos} operación(es) fallida(s)");
                std::process::exit(4);
            }
            println!("Datos de demostración cargados");
        }
        _ => {}
    }
}
