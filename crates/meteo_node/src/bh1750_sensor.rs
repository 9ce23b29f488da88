//! BH1750 – iluminância.
//!
//! Driver do kernel: `bh1750`. lux = `in_illuminance_raw` ×
//! `in_illuminance_scale`; sem escala exposta usa 1/1.2 (datasheet).

use crate::iio::IioLocator;
use crate::source::{DeviceSlot, SensorError, SensorSource, plausible};
use meteo_core::config::Bh1750Config;
use meteo_core::types::SensorReading;
use std::path::Path;

const SENSOR: &str = "bh1750";
const DRIVER_NAMES: &[&str] = &["bh1750", "bh1721", "bh1710"];
const DEFAULT_SCALE: f64 = 1.0 / 1.2;

/// Fonte de iluminância.
#[derive(Debug)]
pub struct LightSource {
    address: u8,
    slot: DeviceSlot,
}

impl LightSource {
    pub fn new(config: &Bh1750Config, iio_root: &Path) -> Self {
        Self {
            address: config.address,
            slot: DeviceSlot::new(IioLocator::new(
                iio_root,
                DRIVER_NAMES,
                config.device.clone(),
            )),
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }
}

impl SensorSource for LightSource {
    fn name(&self) -> &str {
        SENSOR
    }

    fn sample(&mut self) -> Result<Vec<SensorReading>, SensorError> {
        let (raw, scale) = self
            .slot
            .read(|dev| {
                Ok((
                    dev.read_f64("in_illuminance_raw")?,
                    dev.read_f64_opt("in_illuminance_scale")?,
                ))
            })
            .map_err(|e| SensorError::read_failure(SENSOR, e))?;

        let lux = raw * scale.unwrap_or(DEFAULT_SCALE);
        let lux = plausible(SENSOR, "lux", lux, 0.0..=f64::MAX)?;
        Ok(vec![SensorReading::new("lux", lux)])
    }
}
