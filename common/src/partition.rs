use itertools::Itertools;

use crate::record::KeyValue;

const FNV32_OFFSET: u32 = 0x811c_9dc5;
const FNV32_PRIME: u32 = 0x0100_0193;

/// Hash FNV-1a de 32 bits sobre los bytes de la clave, sin bit de signo.
///
/// Tiene que dar lo mismo en todos los procesos y en todas las corridas:
/// el reduce solo ve las claves que los map mandaron a su partición.
pub fn ihash(key: &str) -> u32 {
    let mut h = FNV32_OFFSET;
    for b in key.as_bytes() {
        h ^= u32::from(*b);
        h = h.wrapping_mul(FNV32_PRIME);
    }
    h & 0x7fff_ffff
}

/// Partición (índice de reduce) que le toca a una clave.
pub fn partition_for(key: &str, num_partitions: u32) -> u32 {
    ihash(key) % num_partitions.max(1)
}

/// Reparte los registros en `num_partitions` cubetas según hash(key) % R.
/// Siempre devuelve exactamente R cubetas, aunque alguna quede vacía.
pub fn bucketize<I>(records: I, num_partitions: u32) -> Vec<Vec<KeyValue>>
where
    I: IntoIterator<Item = KeyValue>,
{
    let n = num_partitions.max(1);
    let mut buckets: Vec<Vec<KeyValue>> = (0..n).map(|_| Vec::new()).collect();
    for kv in records {
        let pid = partition_for(&kv.key, n) as usize;
        buckets[pid].push(kv);
    }
    buckets
}

/// Ordena por clave (orden lexicográfico de bytes, estable) y agrupa las
/// corridas de claves iguales: `(clave, valores en orden de llegada)`.
pub fn group_sorted(mut records: Vec<KeyValue>) -> Vec<(String, Vec<String>)> {
    records.sort_by(|a, b| a.key.as_bytes().cmp(b.key.as_bytes()));

    let mut out = Vec::new();
    for (key, run) in &records.into_iter().chunk_by(|kv| kv.key.clone()) {
        out.push((key, run.map(|kv| kv.value).collect()));
    }
    out
}
