//! Esquema Diesel de las tablas físicas de una sede.
//!
//! Las tres bases comparten las tablas replicadas (`cliente`, `vehiculo`,
//! `empleado_nomina`). Las tablas fragmentadas existen por duplicado con
//! sufijo de taller (`_norte` / `_sur`); CENTRAL no las posee. Nombres en
//! minúsculas, normalizados respecto al esquema histórico.

diesel::table! {
    cliente (cedula_cliente) {
        cedula_cliente -> Varchar,
        nombre_cliente -> Varchar,
        apellido_cliente -> Varchar,
        zona -> Varchar,
    }
}

diesel::table! {
    vehiculo (placa) {
        placa -> Varchar,
        cedula_cliente -> Varchar,
        marca -> Varchar,
        modelo -> Varchar,
        anio -> Integer,
    }
}

diesel::table! {
    empleado_nomina (cedula_empleado) {
        cedula_empleado -> Varchar,
        fecha_comienzo -> Date,
        salario -> Double,
    }
}

diesel::table! {
    empleado_informacion_norte (cedula_empleado) {
        cedula_empleado -> Varchar,
        sede_taller -> Varchar,
        nombre_empleado -> Varchar,
    }
}

diesel::table! {
    empleado_informacion_sur (cedula_empleado) {
        cedula_empleado -> Varchar,
        sede_taller -> Varchar,
        nombre_empleado -> Varchar,
    }
}

diesel::table! {
    repuesto_norte (id_repuesto) {
        id_repuesto -> Integer,
        nombre_repuesto -> Varchar,
        descripcion_repuesto -> Varchar,
        sede_taller -> Varchar,
        cantidad_repuesto -> Integer,
        precio_unitario -> Double,
    }
}

diesel::table! {
    repuesto_sur (id_repuesto) {
        id_repuesto -> Integer,
        nombre_repuesto -> Varchar,
        descripcion_repuesto -> Varchar,
        sede_taller -> Varchar,
        cantidad_repuesto -> Integer,
        precio_unitario -> Double,
    }
}

diesel::table! {
    reparacion_norte (id_reparacion) {
        id_reparacion -> Integer,
        placa -> Varchar,
        sede_taller -> Varchar,
        fecha_reparacion -> Date,
        descripcion -> Varchar,
        precio_total -> Double,
    }
}

diesel::table! {
    reparacion_sur (id_reparacion) {
        id_reparacion -> Integer,
        placa -> Varchar,
        sede_taller -> Varchar,
        fecha_reparacion -> Date,
        descripcion -> Varchar,
        precio_total -> Double,
    }
}

diesel::table! {
    reparacion_detalle_norte (id_reparacion, id_repuesto) {
        id_reparacion -> Integer,
        id_repuesto -> Integer,
        cantidad_usada -> Integer,
    }
}

diesel::table! {
    reparacion_detalle_sur (id_reparacion, id_repuesto) {
        id_reparacion -> Integer,
        id_repuesto -> Integer,
        cantidad_usada -> Integer,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    cliente,
    vehiculo,
    empleado_nomina,
    empleado_informacion_norte,
    empleado_informacion_sur,
    repuesto_norte,
    repuesto_sur,
    reparacion_norte,
    reparacion_sur,
    reparacion_detalle_norte,
    reparacion_detalle_sur,
);
