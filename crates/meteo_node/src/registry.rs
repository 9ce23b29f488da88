//! Registro de sensores – coleta todas as fontes habilitadas.
//!
//! Ordem fixa de construção (DHT → BMP180 → BH1750), que define a ordem dos
//! campos na linha enviada. Falha de uma fonte não afeta as outras: o lote
//! parcial é um resultado válido.

use crate::source::SensorSource;
use meteo_core::config::AppConfig;
use meteo_core::types::MeasurementBatch;
use tracing::{debug, info, warn};

#[cfg(feature = "bh1750")]
use crate::bh1750_sensor::LightSource;
#[cfg(feature = "bmp180")]
use crate::bmp180_sensor::BarometerSource;
#[cfg(feature = "dht")]
use crate::dht_sensor::DhtSource;

/// Conjunto de fontes habilitadas, criado uma vez no boot.
pub struct SensorRegistry {
    measurement: String,
    sources: Vec<Box<dyn SensorSource>>,
    /// Fontes que falharam na última coleta
    last_failures: Vec<String>,
}

impl SensorRegistry {
    pub fn new(measurement: impl Into<String>, sources: Vec<Box<dyn SensorSource>>) -> Self {
        Self {
            measurement: measurement.into(),
            sources,
            last_failures: Vec::new(),
        }
    }

    /// Instancia apenas as fontes habilitadas e compiladas.
    pub fn from_config(config: &AppConfig) -> Self {
        let sensors = &config.sensors;
        let mut sources: Vec<Box<dyn SensorSource>> = Vec::new();

        // ── DHT ──
        if sensors.dht.enabled {
            #[cfg(feature = "dht")]
            {
                let dht = DhtSource::new(&sensors.dht, &sensors.iio_root);
                info!("✓ DHT{} no GPIO {}", sensors.dht.model, dht.pin());
                sources.push(Box::new(dht));
            }
            #[cfg(not(feature = "dht"))]
            warn!("✗ DHT habilitado na config mas não compilado (feature \"dht\")");
        }

        // ── BMP180 ──
        if sensors.bmp180.enabled {
            #[cfg(feature = "bmp180")]
            {
                sources.push(Box::new(BarometerSource::new(
                    &sensors.bmp180,
                    &sensors.iio_root,
                )));
                match sensors.bmp180.altitude {
                    Some(alt) => info!("✓ BMP180 (altitude de referência {alt} m)"),
                    None => info!("✓ BMP180"),
                }
            }
            #[cfg(not(feature = "bmp180"))]
            warn!("✗ BMP180 habilitado na config mas não compilado (feature \"bmp180\")");
        }

        // ── BH1750 ──
        if sensors.bh1750.enabled {
            #[cfg(feature = "bh1750")]
            {
                let light = LightSource::new(&sensors.bh1750, &sensors.iio_root);
                info!("✓ BH1750 em 0x{:02X}", light.address());
                sources.push(Box::new(light));
            }
            #[cfg(not(feature = "bh1750"))]
            warn!("✗ BH1750 habilitado na config mas não compilado (feature \"bh1750\")");
        }

        if sources.is_empty() {
            warn!("Nenhum sensor habilitado – os ciclos não terão nada a enviar");
        }

        Self::new(config.node.name.clone(), sources)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Nomes das fontes, na ordem de coleta.
    pub fn source_names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// Fontes que falharam na última chamada de [`collect_all`](Self::collect_all).
    pub fn last_failures(&self) -> &[String] {
        &self.last_failures
    }

    /// Amostra todas as fontes e agrega as leituras bem-sucedidas.
    pub fn collect_all(&mut self, timestamp_nanos: u64) -> MeasurementBatch {
        let mut batch = MeasurementBatch::new(self.measurement.clone(), timestamp_nanos);
        self.last_failures.clear();

        for source in self.sources.iter_mut() {
            match source.sample() {
                Ok(readings) => {
                    debug!("{}: {} campos", source.name(), readings.len());
                    batch.extend(readings);
                }
                Err(e) => {
                    warn!("🚫 {e}");
                    self.last_failures.push(source.name().to_string());
                }
            }
        }

        batch
    }
}

// ──────────────────────────────────────────────
// Testes
// ──────────────────────────────────────────────
