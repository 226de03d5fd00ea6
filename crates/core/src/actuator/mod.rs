//! Boundary to the lighting device.
//!
//! The core only relies on the [`Actuator`] trait. Every operation is
//! asynchronous and reports failures as [`ActuatorError`]; callers decide
//! whether a failure matters (the animation controller never lets one
//! escape).

#[cfg(feature = "ble")]
pub mod ble;
pub mod frame;
pub mod leddmx;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{config::BaselineConfig, Percent, Rgb};

/// Errors surfaced by actuator backends.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ActuatorError {
    #[error("actuator is not connected")]
    NotConnected,
    #[error("actuator device not found: {0}")]
    DeviceNotFound(String),
    #[error("no actuator devices found")]
    NoDevices,
    #[error("actuator write failed: {0}")]
    Write(String),
    #[error("actuator backend error: {0}")]
    Backend(String),
}

/// A device reported by [`Actuator::scan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub address: String,
    pub name: String,
}

/// Operation set the core drives. Implementations must be cheap to share
/// across tasks.
#[async_trait]
pub trait Actuator: Send + Sync {
    async fn scan(&self) -> Result<Vec<DeviceInfo>, ActuatorError>;

    async fn connect(&self, address: &str) -> Result<(), ActuatorError>;

    async fn disconnect(&self) -> Result<(), ActuatorError>;

    async fn power(&self, on: bool) -> Result<(), ActuatorError>;

    async fn set_color(&self, color: Rgb) -> Result<(), ActuatorError>;

    async fn set_brightness(&self, brightness: Percent) -> Result<(), ActuatorError>;
}

/// Picks the device to connect to: an explicit address must appear in the
/// scan results, otherwise the first device found is used.
pub fn select_device<'a>(
    devices: &'a [DeviceInfo],
    explicit: Option<&str>,
) -> Result<&'a DeviceInfo, ActuatorError> {
    match explicit {
        Some(address) => devices
            .iter()
            .find(|device| device.address == address)
            .ok_or_else(|| ActuatorError::DeviceNotFound(address.to_string())),
        None => devices.first().ok_or(ActuatorError::NoDevices),
    }
}

/// Powers the light on and applies the baseline state.
pub async fn apply_baseline(
    actuator: &dyn Actuator,
    baseline: &BaselineConfig,
) -> Result<(), ActuatorError> {
    actuator.power(true).await?;
    actuator.set_brightness(baseline.brightness).await?;
    actuator.set_color(baseline.color).await
}

/// Restores the baseline and disconnects. Failures are logged, never
/// returned, so teardown always runs to completion.
pub async fn restore_and_disconnect(actuator: &dyn Actuator, baseline: &BaselineConfig) {
    if let Err(err) = actuator.set_brightness(baseline.brightness).await {
        tracing::error!(%err, "failed to restore baseline brightness");
    }
    if let Err(err) = actuator.set_color(baseline.color).await {
        tracing::error!(%err, "failed to restore baseline colour");
    }
    if let Err(err) = actuator.disconnect().await {
        tracing::error!(%err, "failed to disconnect actuator");
    }
}

/// Actuator that encodes LEDDMX frames and logs them instead of writing to
/// a radio. Useful for rehearsing a setup without hardware.
#[derive(Debug, Default)]
pub struct DryRunActuator {
    connected: Mutex<Option<String>>,
}

impl DryRunActuator {
    pub const ADDRESS: &'static str = "00:00:00:00:00:00";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected_address(&self) -> Option<String> {
        self.connected.lock().clone()
    }

    fn write(&self, bytes: frame::Frame) -> Result<(), ActuatorError> {
        if self.connected.lock().is_none() {
            return Err(ActuatorError::NotConnected);
        }
        tracing::debug!(frame = %frame::hex(&bytes), "dry-run write");
        Ok(())
    }
}

#[async_trait]
impl Actuator for DryRunActuator {
    async fn scan(&self) -> Result<Vec<DeviceInfo>, ActuatorError> {
        Ok(vec![DeviceInfo {
            address: Self::ADDRESS.to_string(),
            name: "LEDDMX-DRYRUN".to_string(),
        }])
    }

    async fn connect(&self, address: &str) -> Result<(), ActuatorError> {
        if address != Self::ADDRESS {
            return Err(ActuatorError::DeviceNotFound(address.to_string()));
        }
        *self.connected.lock() = Some(address.to_string());
        tracing::info!(address, "dry-run actuator connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ActuatorError> {
        if self.connected.lock().take().is_some() {
            tracing::info!("dry-run actuator disconnected");
        }
        Ok(())
    }

    async fn power(&self, on: bool) -> Result<(), ActuatorError> {
        self.write(frame::power(on))
    }

    async fn set_color(&self, color: Rgb) -> Result<(), ActuatorError> {
        self.write(frame::color(color))
    }

    async fn set_brightness(&self, brightness: Percent) -> Result<(), ActuatorError> {
        self.write(frame::brightness(brightness))
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::{sync::Arc, time::Duration};

    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) enum Call {
        Power(bool),
        Color(Rgb),
        Brightness(u8),
    }

    /// Records every call. Optionally fails colour writes or delays each
    /// call to exercise slow links.
    #[derive(Debug, Default)]
    pub(crate) struct RecordingActuator {
        calls: Mutex<Vec<Call>>,
        fail_colors: Mutex<bool>,
        latency: Mutex<Option<Duration>>,
    }

    impl RecordingActuator {
        pub(crate) fn shared() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub(crate) fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        pub(crate) fn fail_colors(&self, fail: bool) {
            *self.fail_colors.lock() = fail;
        }

        pub(crate) fn set_latency(&self, latency: Duration) {
            *self.latency.lock() = Some(latency);
        }

        async fn record(&self, call: Call) {
            let latency = *self.latency.lock();
            if let Some(latency) = latency {
                tokio::time::sleep(latency).await;
            }
            self.calls.lock().push(call);
        }
    }

    #[async_trait]
    impl Actuator for RecordingActuator {
        async fn scan(&self) -> Result<Vec<DeviceInfo>, ActuatorError> {
            Ok(Vec::new())
        }

        async fn connect(&self, _address: &str) -> Result<(), ActuatorError> {
            Ok(())
        }

        async fn disconnect(&self) -> Result<(), ActuatorError> {
            Ok(())
        }

        async fn power(&self, on: bool) -> Result<(), ActuatorError> {
            self.record(Call::Power(on)).await;
            Ok(())
        }

        async fn set_color(&self, color: Rgb) -> Result<(), ActuatorError> {
            let fail = *self.fail_colors.lock();
            if fail {
                return Err(ActuatorError::Write("injected failure".to_string()));
            }
            self.record(Call::Color(color)).await;
            Ok(())
        }

        async fn set_brightness(&self, brightness: Percent) -> Result<(), ActuatorError> {
            self.record(Call::Brightness(brightness.get())).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{testing::Call, testing::RecordingActuator, *};

    fn devices() -> Vec<DeviceInfo> {
        vec![
            DeviceInfo {
                address: "AA".to_string(),
                name: "LEDDMX-00".to_string(),
            },
            DeviceInfo {
                address: "BB".to_string(),
                name: "LEDDMX-03".to_string(),
            },
        ]
    }

    #[test]
    fn selects_explicit_device_when_present() {
        let devices = devices();
        assert_eq!(select_device(&devices, Some("BB")).unwrap().address, "BB");
        assert_eq!(
            select_device(&devices, Some("CC")).unwrap_err(),
            ActuatorError::DeviceNotFound("CC".to_string())
        );
    }

    #[test]
    fn falls_back_to_first_device() {
        let devices = devices();
        assert_eq!(select_device(&devices, None).unwrap().address, "AA");
        assert_eq!(select_device(&[], None).unwrap_err(), ActuatorError::NoDevices);
    }

    #[tokio::test]
    async fn baseline_setup_and_teardown_order() {
        let actuator = RecordingActuator::shared();
        let baseline = BaselineConfig::default();

        apply_baseline(actuator.as_ref(), &baseline).await.unwrap();
        restore_and_disconnect(actuator.as_ref(), &baseline).await;

        assert_eq!(
            actuator.calls(),
            vec![
                Call::Power(true),
                Call::Brightness(50),
                Call::Color(Rgb::new(255, 255, 255)),
                Call::Brightness(50),
                Call::Color(Rgb::new(255, 255, 255)),
            ]
        );
    }

    #[tokio::test]
    async fn dry_run_requires_connection() {
        let actuator = DryRunActuator::new();
        assert_eq!(
            actuator.power(true).await.unwrap_err(),
            ActuatorError::NotConnected
        );

        let devices = actuator.scan().await.unwrap();
        let device = select_device(&devices, None).unwrap();
        actuator.connect(&device.address).await.unwrap();
        assert!(actuator.set_color(Rgb::new(1, 2, 3)).await.is_ok());

        actuator.disconnect().await.unwrap();
        assert!(actuator.connected_address().is_none());
    }
}
