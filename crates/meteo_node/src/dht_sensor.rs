//! DHT11/DHT22 – temperatura e umidade relativa.
//!
//! Driver do kernel: `dht11` (atende os dois modelos). Canais em milésimos:
//! `in_temp_input` (m°C) e `in_humidityrelative_input` (m%RH).

use crate::iio::IioLocator;
use crate::source::{DeviceSlot, SensorError, SensorSource, plausible};
use meteo_core::config::DhtConfig;
use meteo_core::types::SensorReading;
use std::ops::RangeInclusive;
use std::path::Path;

const DRIVER_NAMES: &[&str] = &["dht11", "dht22"];

/// Modelo do sensor, define a faixa plausível.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhtModel {
    Dht11,
    Dht22,
}

impl DhtModel {
    pub fn from_number(n: u8) -> Option<Self> {
        match n {
            11 => Some(DhtModel::Dht11),
            22 => Some(DhtModel::Dht22),
            _ => None,
        }
    }

    fn label(self) -> &'static str {
        match self {
            DhtModel::Dht11 => "dht11",
            DhtModel::Dht22 => "dht22",
        }
    }

    fn temperature_range(self) -> RangeInclusive<f64> {
        match self {
            DhtModel::Dht11 => 0.0..=50.0,
            DhtModel::Dht22 => -40.0..=80.0,
        }
    }

    fn humidity_range(self) -> RangeInclusive<f64> {
        match self {
            DhtModel::Dht11 => 20.0..=90.0,
            DhtModel::Dht22 => 0.0..=100.0,
        }
    }
}

/// Fonte de temperatura + umidade.
#[derive(Debug)]
pub struct DhtSource {
    model: DhtModel,
    pin: u8,
    slot: DeviceSlot,
}

impl DhtSource {
    pub fn new(config: &DhtConfig, iio_root: &Path) -> Self {
        // Modelo inválido já é barrado por AppConfig::validate
        let model = DhtModel::from_number(config.model).unwrap_or(DhtModel::Dht22);
        Self {
            model,
            pin: config.pin,
            slot: DeviceSlot::new(IioLocator::new(
                iio_root,
                DRIVER_NAMES,
                config.device.clone(),
            )),
        }
    }

    pub fn pin(&self) -> u8 {
        self.pin
    }
}

impl SensorSource for DhtSource {
    fn name(&self) -> &str {
        self.model.label()
    }

    fn sample(&mut self) -> Result<Vec<SensorReading>, SensorError> {
        let sensor = self.model.label();
        let (temp_milli, hum_milli) = self
            .slot
            .read(|dev| {
                Ok((
                    dev.read_f64("in_temp_input")?,
                    dev.read_f64("in_humidityrelative_input")?,
                ))
            })
            .map_err(|e| SensorError::read_failure(sensor, e))?;

        let temperature = plausible(
            sensor,
            "temperature",
            temp_milli / 1000.0,
            self.model.temperature_range(),
        )?;
        let humidity = plausible(
            sensor,
            "humidity",
            hum_milli / 1000.0,
            self.model.humidity_range(),
        )?;

        Ok(vec![
            SensorReading::new("temperature", temperature),
            SensorReading::new("humidity", humidity),
        ])
    }
}
