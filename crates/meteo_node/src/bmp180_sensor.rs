//! BMP180 – pressão atmosférica.
//!
//! Driver do kernel: `bmp280` (registra o chip como "bmp180"). O canal
//! `in_pressure_input` vem em kPa; publicamos em hPa. Com altitude de
//! referência configurada também publicamos a pressão ao nível do mar.

use crate::iio::IioLocator;
use crate::source::{DeviceSlot, SensorError, SensorSource, plausible};
use meteo_core::config::Bmp180Config;
use meteo_core::types::SensorReading;
use std::path::Path;

const SENSOR: &str = "bmp180";
const DRIVER_NAMES: &[&str] = &["bmp180", "bmp085"];

/// Faixa de medição do BMP180 (hPa).
const PRESSURE_RANGE_HPA: std::ops::RangeInclusive<f64> = 300.0..=1100.0;

/// Pressão ao nível do mar pela fórmula barométrica padrão.
///
/// `p0 = p / (1 - h / 44330)^5.255`
pub fn sea_level_pressure(pressure_hpa: f64, altitude_m: f64) -> f64 {
    pressure_hpa / (1.0 - altitude_m / 44_330.0).powf(5.255)
}

/// Fonte de pressão.
#[derive(Debug)]
pub struct BarometerSource {
    altitude: Option<f64>,
    slot: DeviceSlot,
}

impl BarometerSource {
    pub fn new(config: &Bmp180Config, iio_root: &Path) -> Self {
        Self {
            altitude: config.altitude,
            slot: DeviceSlot::new(IioLocator::new(
                iio_root,
                DRIVER_NAMES,
                config.device.clone(),
            )),
        }
    }
}

impl SensorSource for BarometerSource {
    fn name(&self) -> &str {
        SENSOR
    }

    fn sample(&mut self) -> Result<Vec<SensorReading>, SensorError> {
        let kpa = self
            .slot
            .read(|dev| dev.read_f64("in_pressure_input"))
            .map_err(|e| SensorError::read_failure(SENSOR, e))?;
        let pressure = plausible(SENSOR, "pressure", kpa * 10.0, PRESSURE_RANGE_HPA)?;

        let mut readings = vec![SensorReading::new("pressure", pressure)];
        if let Some(altitude) = self.altitude {
            let p0 = sea_level_pressure(pressure, altitude);
            if p0.is_finite() {
                readings.push(SensorReading::new("sea_level_pressure", p0));
            }
        }
        Ok(readings)
    }
}
