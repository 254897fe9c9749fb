use std::io;

use tracing::{debug, warn};

use crate::{
    apps::Workload,
    error::TaskError,
    partition::{bucketize, group_sorted},
    record::KeyValue,
    store::{decode_records, encode_records, format_output_line, intermediate_name, output_name, BlobStore},
};

/* =========================
   Fase map
   ========================= */

/// Ejecuta un map completo:
///   1. lee la entrada entera desde el store
///   2. aplica la función map de la aplicación
///   3. reparte los registros por hash(key) % R
///   4. escribe una partición `mr-<map>-<r>` por cada r en 0..R (aunque quede vacía)
pub fn run_map(
    store: &dyn BlobStore,
    app: &Workload,
    map_index: u32,
    input_id: &str,
    reduce_count: u32,
) -> Result<(), TaskError> {
    let raw = store
        .read(input_id)
        .map_err(|e| TaskError::input(input_id, e))?;
    let content = String::from_utf8(raw).map_err(|e| {
        TaskError::input(input_id, io::Error::new(io::ErrorKind::InvalidData, e))
    })?;

    let records = (app.map_fn)(input_id, &content);
    debug!(
        "map {}: {} registros desde {}",
        map_index,
        records.len(),
        input_id
    );

    for (reduce_index, bucket) in bucketize(records, reduce_count).into_iter().enumerate() {
        let name = intermediate_name(map_index, reduce_index as u32);
        let bytes = encode_records(&bucket).map_err(|e| TaskError::output(&name, e.into()))?;
        store
            .write(&name, &bytes)
            .map_err(|e| TaskError::output(&name, e))?;
    }

    Ok(())
}

/* =========================
   Fase reduce
   ========================= */

/// Junta las particiones `(i, reduce_index)` de todos los maps.
/// Una partición que no existe o no se puede decodificar no aporta registros.
fn collect_partitions(store: &dyn BlobStore, reduce_index: u32, map_count: u32) -> Vec<KeyValue> {
    let mut all = Vec::new();

    for map_index in 0..map_count {
        let name = intermediate_name(map_index, reduce_index);
        if !store.exists(&name) {
            debug!("partición {} no existe, se omite", name);
            continue;
        }
        let raw = match store.read(&name) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("partición {} no se pudo leer ({}), se omite", name, e);
                continue;
            }
        };

        match decode_records(&raw) {
            Ok(mut recs) => all.append(&mut recs),
            Err(e) => warn!("partición {} ilegible ({}), se omite", name, e),
        }
    }

    all
}

/// Ejecuta un reduce completo y escribe `mr-out-<reduce_index>` con una línea
/// `"<clave> <salida>"` por clave distinta, en orden ascendente de clave.
pub fn run_reduce(
    store: &dyn BlobStore,
    app: &Workload,
    reduce_index: u32,
    map_count: u32,
) -> Result<(), TaskError> {
    let records = collect_partitions(store, reduce_index, map_count);
    debug!(
        "reduce {}: {} registros de {} maps",
        reduce_index,
        records.len(),
        map_count
    );

    let mut out = String::new();
    for (key, values) in group_sorted(records) {
        let reduced = (app.reduce_fn)(&key, &values);
        out.push_str(&format_output_line(&key, &reduced));
    }

    let name = output_name(reduce_index);
    store
        .write(&name, out.as_bytes())
        .map_err(|e| TaskError::output(&name, e))
}
