//! Acesso a sensores via Linux Industrial I/O (sysfs).
//!
//! Os drivers do kernel (`dht11`, `bmp280`, `bh1750`) expõem cada canal como
//! um arquivo texto em `/sys/bus/iio/devices/iio:deviceN/`. Ler o arquivo
//! dispara a transação de hardware; falhas de checksum/NACK chegam como EIO.

use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Erros de acesso ao sysfs IIO.
#[derive(Debug, thiserror::Error)]
pub enum IioError {
    #[error("Dispositivo IIO não encontrado ({0})")]
    NotFound(String),

    #[error("Falha ao ler {attr}: {source}")]
    Io {
        attr: String,
        #[source]
        source: io::Error,
    },

    #[error("Valor inválido em {attr}: {raw:?}")]
    Parse { attr: String, raw: String },
}

/// Um dispositivo IIO resolvido.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IioDevice {
    path: PathBuf,
}

impl IioDevice {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lê um atributo numérico (ex: `in_temp_input`).
    pub fn read_f64(&self, attr: &str) -> Result<f64, IioError> {
        let raw = std::fs::read_to_string(self.path.join(attr)).map_err(|source| IioError::Io {
            attr: attr.to_string(),
            source,
        })?;
        let trimmed = raw.trim();
        trimmed.parse::<f64>().map_err(|_| IioError::Parse {
            attr: attr.to_string(),
            raw: trimmed.to_string(),
        })
    }

    /// Lê um atributo opcional; `None` se o arquivo não existir.
    pub fn read_f64_opt(&self, attr: &str) -> Result<Option<f64>, IioError> {
        match self.read_f64(attr) {
            Ok(v) => Ok(Some(v)),
            Err(IioError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Localiza um dispositivo por caminho explícito ou pelo nome do driver.
#[derive(Debug, Clone)]
pub struct IioLocator {
    root: PathBuf,
    driver_names: &'static [&'static str],
    explicit: Option<PathBuf>,
}

impl IioLocator {
    pub fn new(
        root: impl Into<PathBuf>,
        driver_names: &'static [&'static str],
        explicit: Option<PathBuf>,
    ) -> Self {
        Self {
            root: root.into(),
            driver_names,
            explicit,
        }
    }

    /// Resolve o dispositivo. Chamado de novo a cada falha, então um driver
    /// que aparece depois do boot é encontrado.
    pub fn locate(&self) -> Result<IioDevice, IioError> {
        if let Some(path) = &self.explicit {
            if path.is_dir() {
                return Ok(IioDevice::new(path));
            }
            return Err(IioError::NotFound(path.display().to_string()));
        }

        let entries = std::fs::read_dir(&self.root).map_err(|source| IioError::Io {
            attr: self.root.display().to_string(),
            source,
        })?;

        let mut candidates: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_dir())
            .collect();
        // Ordem estável entre execuções
        candidates.sort();

        for dir in candidates {
            let Ok(name) = std::fs::read_to_string(dir.join("name")) else {
                continue;
            };
            let name = name.trim();
            if self.driver_names.iter().any(|n| *n == name) {
                debug!("IIO: {} → {}", name, dir.display());
                return Ok(IioDevice::new(dir));
            }
        }

        Err(IioError::NotFound(format!(
            "{} em {}",
            self.driver_names.join("|"),
            self.root.display()
        )))
    }
}
