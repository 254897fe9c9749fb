use std::{
    fs,
    io::{self, Write},
    path::PathBuf,
};

use tempfile::NamedTempFile;

use crate::record::KeyValue;

/// Almacén de blobs con nombre, legibles y escribibles de forma independiente.
pub trait BlobStore: Send + Sync {
    /// Lee el blob completo.
    fn read(&self, name: &str) -> io::Result<Vec<u8>>;

    /// Reemplaza el blob completo. Un lector nunca ve una escritura a medias.
    fn write(&self, name: &str, data: &[u8]) -> io::Result<()>;

    fn exists(&self, name: &str) -> bool;
}

/// Blobs como archivos bajo un directorio compartido por todos los procesos.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Ruta de un blob. Un identificador absoluto se respeta tal cual.
    pub fn path_of(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }
}

impl BlobStore for FsStore {
    fn read(&self, name: &str) -> io::Result<Vec<u8>> {
        fs::read(self.path_of(name))
    }

    fn write(&self, name: &str, data: &[u8]) -> io::Result<()> {
        let path = self.path_of(name);
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        // temporal en el mismo directorio + rename atómico
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(data)?;
        tmp.flush()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    fn exists(&self, name: &str) -> bool {
        self.path_of(name).is_file()
    }
}

/// Nombre de la partición que el map `map_index` deja para el reduce `reduce_index`.
pub fn intermediate_name(map_index: u32, reduce_index: u32) -> String {
    format!("mr-{}-{}", map_index, reduce_index)
}

/// Nombre del blob de salida final de un reduce.
pub fn output_name(reduce_index: u32) -> String {
    format!("mr-out-{}", reduce_index)
}

/// Línea de salida final: `"<clave> <salida>\n"`.
pub fn format_output_line(key: &str, output: &str) -> String {
    format!("{} {}\n", key, output)
}

/// Codifica registros como JSON Lines (un objeto por línea).
pub fn encode_records(records: &[KeyValue]) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    for kv in records {
        serde_json::to_writer(&mut buf, kv)?;
        buf.push(b'\n');
    }
    Ok(buf)
}

/// Inverso de [`encode_records`]. Las líneas vacías se ignoran.
pub fn decode_records(data: &[u8]) -> Result<Vec<KeyValue>, serde_json::Error> {
    let mut out = Vec::new();
    for line in data.split(|b| *b == b'\n') {
        if line.iter().all(u8::is_ascii_whitespace) {
            continue;
        }
        out.push(serde_json::from_slice(line)?);
    }
    Ok(out)
}
