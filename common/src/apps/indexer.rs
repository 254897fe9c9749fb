//! Índice invertido: para cada palabra, en qué documentos aparece.

use std::collections::BTreeSet;

use crate::record::KeyValue;

pub fn map(input_id: &str, contents: &str) -> Vec<KeyValue> {
    let distinct: BTreeSet<&str> = contents
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
        .collect();

    distinct
        .into_iter()
        .map(|w| KeyValue::new(w, input_id))
        .collect()
}

/// `"<n> <doc1>,<doc2>,..."` con los documentos ordenados y sin repetir.
pub fn reduce(_key: &str, values: &[String]) -> String {
    let docs: BTreeSet<&str> = values.iter().map(String::as_str).collect();
    let joined = docs.iter().copied().collect::<Vec<_>>().join(",");
    format!("{} {}", docs.len(), joined)
}
