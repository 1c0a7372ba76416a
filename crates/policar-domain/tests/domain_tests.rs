use chrono::NaiveDate;
use policar_domain::{Cliente, DomainError, EmpleadoCompleto, NuevaReparacion, NuevoRepuesto, Sede, UsoRepuesto, Vehiculo};

fn fecha(anio: i32, mes: u32, dia: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(anio, mes, dia).unwrap()
}

#[test]
fn test_entidades_replicadas_validas() {
    let cliente = Cliente::nuevo("0912345678", "Carlos", "Mendoza", "Norte").unwrap();
    let vehiculo = Vehiculo::nuevo("ABC-1234", &cliente.cedula_cliente, "Toyota", "Corolla", 2020).unwrap();
    assert_eq!(vehiculo.cedula_cliente, cliente.cedula_cliente);
}

#[test]
fn test_entidad_compuesta_round_trip() {
    let emp = EmpleadoCompleto::nuevo("0801234567", "Ana Quinde", Sede::Norte, fecha(2023, 3, 1), 850.0).unwrap();
    let reconstruido = EmpleadoCompleto::desde_fragmentos(&emp.informacion(), &emp.nomina());
    assert_eq!(reconstruido, emp);
}

#[test]
fn test_payloads_fragmentados_rechazan_central() {
    let repuesto = NuevoRepuesto { sede_taller: Sede::Central,
                                   nombre_repuesto: "Filtro".into(),
                                   descripcion_repuesto: String::new(),
                                   cantidad_repuesto: 1,
                                   precio_unitario: 2.0 };
    assert!(matches!(repuesto.validar().unwrap_err(), DomainError::SedeSinFragmentos(_)));

    let reparacion = NuevaReparacion { placa: "ABC-1234".into(),
                                       sede_taller: Sede::Central,
                                       fecha_reparacion: fecha(2024, 5, 20),
                                       descripcion: "Revisión".into(),
                                       precio_total: 30.0,
                                       repuestos: vec![] };
    assert!(matches!(reparacion.validar().unwrap_err(), DomainError::SedeSinFragmentos(_)));
}

#[test]
fn test_payload_reparacion_valida_sus_repuestos() {
    let reparacion = NuevaReparacion { placa: "ABC-1234".into(),
                                       sede_taller: Sede::Norte,
                                       fecha_reparacion: fecha(2024, 5, 20),
                                       descripcion: "Revisión".into(),
                                       precio_total: 30.0,
                                       repuestos: vec![UsoRepuesto { id_repuesto: 1, cantidad_usada: 0 }] };
    assert!(matches!(reparacion.validar().unwrap_err(), DomainError::Validacion(_)));
}

#[test]
fn test_mensajes_de_error_en_espanol() {
    let err = Cliente::nuevo("", "Carlos", "Mendoza", "Norte").unwrap_err();
    assert_eq!(err.to_string(), "Error de validación: cedula_cliente es obligatorio");

    let err = "oeste".parse::<Sede>().unwrap_err();
    assert_eq!(err.to_string(), "Sede no válida: OESTE");
}
