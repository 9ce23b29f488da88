//! Contrato comum das fontes de sensor.
//!
//! Cada fonte corresponde a um tipo físico de sensor e faz uma única
//! transação por amostra, sem retry interno.

use crate::iio::{IioDevice, IioError, IioLocator};
use meteo_core::types::SensorReading;
use std::ops::RangeInclusive;
use tracing::debug;

/// Falha de leitura de um sensor neste ciclo.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SensorError {
    #[error("{sensor}: leitura falhou ({reason})")]
    ReadFailure { sensor: String, reason: String },
}

impl SensorError {
    pub fn read_failure(sensor: &str, reason: impl std::fmt::Display) -> Self {
        SensorError::ReadFailure {
            sensor: sensor.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Uma fonte de leituras.
pub trait SensorSource {
    /// Nome curto usado em logs e relatórios (ex: "dht22").
    fn name(&self) -> &str;

    /// Faz uma amostra. Em falha, a fonte não contribui com campos.
    fn sample(&mut self) -> Result<Vec<SensorReading>, SensorError>;
}

/// Rejeita valores não finitos ou fora da faixa física do sensor.
pub(crate) fn plausible(
    sensor: &str,
    field: &str,
    value: f64,
    range: RangeInclusive<f64>,
) -> Result<f64, SensorError> {
    if !value.is_finite() || !range.contains(&value) {
        return Err(SensorError::read_failure(
            sensor,
            format!("{field} fora da faixa: {value}"),
        ));
    }
    Ok(value)
}

/// Dispositivo IIO resolvido sob demanda e mantido em cache.
#[derive(Debug)]
pub(crate) struct DeviceSlot {
    locator: IioLocator,
    device: Option<IioDevice>,
}

impl DeviceSlot {
    pub(crate) fn new(locator: IioLocator) -> Self {
        Self {
            locator,
            device: None,
        }
    }

    /// Executa uma leitura no dispositivo, redescobrindo-o se sumiu.
    pub(crate) fn read<T>(
        &mut self,
        f: impl FnOnce(&IioDevice) -> Result<T, IioError>,
    ) -> Result<T, IioError> {
        let device = match &self.device {
            Some(device) => device.clone(),
            None => {
                let device = self.locator.locate()?;
                debug!("Dispositivo IIO em uso: {}", device.path().display());
                self.device = Some(device.clone());
                device
            }
        };

        let result = f(&device);
        if let Err(IioError::Io { source, .. }) = &result {
            if source.kind() == std::io::ErrorKind::NotFound {
                self.device = None;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iio::fake;

    #[test]
    fn plausible_rejects_out_of_range_and_nan() {
        assert_eq!(plausible("dht22", "humidity", 45.0, 0.0..=100.0), Ok(45.0));
        assert!(plausible("dht22", "humidity", 120.0, 0.0..=100.0).is_err());
        assert!(plausible("dht22", "humidity", f64::NAN, 0.0..=100.0).is_err());
    }

    #[test]
    fn slot_rediscovers_vanished_device() {
        let tmp = tempfile::tempdir().unwrap();
        let locator = IioLocator::new(tmp.path(), &["dht11"], None);
        let mut slot = DeviceSlot::new(locator);

        // Driver ainda não carregado
        assert!(matches!(
            slot.read(|d| d.read_f64("in_temp_input")),
            Err(IioError::NotFound(_))
        ));

        let first = fake::device(tmp.path(), "iio:device3", "dht11", &[("in_temp_input", "20000")]);
        assert_eq!(slot.read(|d| d.read_f64("in_temp_input")).unwrap(), 20000.0);

        // Driver re-probado com outro índice
        std::fs::remove_dir_all(&first).unwrap();
        fake::device(tmp.path(), "iio:device4", "dht11", &[("in_temp_input", "19000")]);
        assert!(slot.read(|d| d.read_f64("in_temp_input")).is_err());
        assert_eq!(slot.read(|d| d.read_f64("in_temp_input")).unwrap(), 19000.0);
    }
}
