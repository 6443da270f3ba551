pub mod json_file;
pub mod memory;

/// Capacidad por defecto, la misma que ofrece `localStorage` en los navegadores.
pub const DEFAULT_CAPACITY_BYTES: usize = 5 * 1024 * 1024;

/// Tamaño contabilizado de una entrada: clave más valor.
pub(crate) fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}
