use std::io;

use thiserror::Error;

/// Errores que abortan una tarea en el worker.
///
/// Cualquiera de ellos termina en un reporte de fallo al coordinador; no hay
/// reintento local, la tarea se reasigna desde el coordinador.
#[derive(Error, Debug)]
pub enum TaskError {
    /// No se pudo leer el blob de entrada.
    #[error("no se pudo leer {name}: {source}")]
    Input {
        name: String,
        #[source]
        source: io::Error,
    },

    /// No se pudo escribir una partición intermedia o el blob de salida.
    #[error("no se pudo escribir {name}: {source}")]
    Output {
        name: String,
        #[source]
        source: io::Error,
    },
}

impl TaskError {
    pub fn input(name: impl Into<String>, source: io::Error) -> Self {
        TaskError::Input {
            name: name.into(),
            source,
        }
    }

    pub fn output(name: impl Into<String>, source: io::Error) -> Self {
        TaskError::Output {
            name: name.into(),
            source,
        }
    }
}
