//! Registro de aplicaciones map/reduce por nombre.
//!
//! ```
//! let wc = common::apps::named("wc").unwrap();
//! let kvs = (wc.map_fn)("doc", "a b a");
//! assert_eq!(kvs.len(), 3);
//! ```

use anyhow::{bail, Result};

use crate::record::KeyValue;

pub mod indexer;
pub mod wc;

/// map(identificador de entrada, contenido) -> registros.
pub type MapFn = fn(&str, &str) -> Vec<KeyValue>;

/// reduce(clave, todos los valores de esa clave) -> salida.
pub type ReduceFn = fn(&str, &[String]) -> String;

#[derive(Clone, Copy)]
pub struct Workload {
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

/// Devuelve la aplicación `name`, o `None` si no existe.
pub fn try_named(name: &str) -> Option<Workload> {
    match name {
        "wc" => Some(Workload {
            map_fn: wc::map,
            reduce_fn: wc::reduce,
        }),
        "indexer" => Some(Workload {
            map_fn: indexer::map,
            reduce_fn: indexer::reduce,
        }),
        _ => None,
    }
}

pub fn named(name: &str) -> Result<Workload> {
    match try_named(name) {
        Some(app) => Ok(app),
        None => bail!("no existe la aplicación `{}`", name),
    }
}
