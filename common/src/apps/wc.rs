//! Conteo de palabras.

use crate::record::KeyValue;

/// Una palabra es una corrida de letras; todo lo demás separa.
fn words(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .split(|c: char| !c.is_alphabetic())
        .filter(|w| !w.is_empty())
}

pub fn map(_input_id: &str, contents: &str) -> Vec<KeyValue> {
    words(contents).map(|w| KeyValue::new(w, "1")).collect()
}

pub fn reduce(_key: &str, values: &[String]) -> String {
    values.len().to_string()
}
