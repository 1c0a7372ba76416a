//! Chequeos compartidos por los constructores del dominio.

use crate::DomainError;

pub(crate) fn no_vacio(campo: &str, valor: &str) -> Result<(), DomainError> {
    if valor.trim().is_empty() {
        return Err(DomainError::Validacion(format!("{campo} es obligatorio")));
    }
    Ok(())
}

pub(crate) fn longitud_maxima(campo: &str, valor: &str, max: usize) -> Result<(), DomainError> {
    if valor.chars().count() > max {
        return Err(DomainError::Validacion(format!("{campo} supera los {max} caracteres permitidos")));
    }
    Ok(())
}

pub(crate) fn no_negativo(campo: &str, valor: f64) -> Result<(), DomainError> {
    if !valor.is_finite() || valor < 0.0 {
        return Err(DomainError::Validacion(format!("{campo} no puede ser negativo")));
    }
    Ok(())
}

pub(crate) fn entero_no_negativo(campo: &str, valor: i32) -> Result<(), DomainError> {
    if valor < 0 {
        return Err(DomainError::Validacion(format!("{campo} no puede ser negativo")));
    }
    Ok(())
}
