//! Bluetooth LE link for LEDDMX lights, built on `btleplug`.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use btleplug::{
    api::{
        bleuuid::uuid_from_u16, Central, CharPropFlags, Characteristic, Manager as _,
        Peripheral as _, ScanFilter, WriteType,
    },
    platform::{Adapter, Manager, Peripheral},
};
use tokio::sync::OnceCell;

use super::{
    frame::Frame,
    leddmx::{Advertisement, FrameLink, LeddmxActuator, LinkProvider},
    ActuatorError,
};

/// GATT characteristic that accepts command frames (`0000ffe1-...`).
const COMMAND_CHARACTERISTIC: u16 = 0xFFE1;

pub const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(5);

pub type BleActuator = LeddmxActuator<BleRadio>;

impl LeddmxActuator<BleRadio> {
    /// LEDDMX actuator on the first Bluetooth adapter. Each scan listens
    /// for `scan_duration` before reporting.
    pub fn bluetooth(scan_duration: Duration) -> Self {
        LeddmxActuator::new(BleRadio::new(scan_duration))
    }
}

fn backend(err: btleplug::Error) -> ActuatorError {
    ActuatorError::Backend(err.to_string())
}

/// The host's first Bluetooth adapter, opened on first use.
pub struct BleRadio {
    scan_duration: Duration,
    session: OnceCell<(Manager, Adapter)>,
}

impl BleRadio {
    pub fn new(scan_duration: Duration) -> Self {
        Self {
            scan_duration,
            session: OnceCell::new(),
        }
    }

    async fn adapter(&self) -> Result<&Adapter, ActuatorError> {
        let (_, adapter) = self
            .session
            .get_or_try_init(|| async {
                let manager = Manager::new().await.map_err(backend)?;
                let adapter = manager
                    .adapters()
                    .await
                    .map_err(backend)?
                    .into_iter()
                    .next()
                    .ok_or_else(|| ActuatorError::Backend("no Bluetooth adapter".to_string()))?;
                Ok::<_, ActuatorError>((manager, adapter))
            })
            .await?;
        Ok(adapter)
    }

    async fn peripheral(&self, address: &str) -> Result<Peripheral, ActuatorError> {
        let adapter = self.adapter().await?;
        adapter
            .peripherals()
            .await
            .map_err(backend)?
            .into_iter()
            .find(|peripheral| peripheral.address().to_string() == address)
            .ok_or_else(|| ActuatorError::DeviceNotFound(address.to_string()))
    }
}

#[async_trait]
impl LinkProvider for BleRadio {
    async fn discover(&self) -> Result<Vec<Advertisement>, ActuatorError> {
        let adapter = self.adapter().await?;
        tracing::info!(seconds = self.scan_duration.as_secs_f64(), "scanning for LEDDMX lights");
        adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(backend)?;
        tokio::time::sleep(self.scan_duration).await;
        if let Err(err) = adapter.stop_scan().await {
            tracing::warn!(%err, "failed to stop Bluetooth scan");
        }

        let mut found = Vec::new();
        for peripheral in adapter.peripherals().await.map_err(backend)? {
            let name = peripheral
                .properties()
                .await
                .map_err(backend)?
                .and_then(|properties| properties.local_name);
            found.push(Advertisement {
                address: peripheral.address().to_string(),
                name,
            });
        }
        Ok(found)
    }

    async fn open(&self, address: &str) -> Result<Arc<dyn FrameLink>, ActuatorError> {
        let peripheral = self.peripheral(address).await?;
        if !peripheral.is_connected().await.map_err(backend)? {
            peripheral.connect().await.map_err(backend)?;
        }
        peripheral.discover_services().await.map_err(backend)?;

        let uuid = uuid_from_u16(COMMAND_CHARACTERISTIC);
        let characteristic = peripheral
            .characteristics()
            .into_iter()
            .find(|characteristic| characteristic.uuid == uuid)
            .ok_or_else(|| {
                ActuatorError::Backend(format!("{address} has no LEDDMX command characteristic"))
            })?;
        let write_type = if characteristic
            .properties
            .contains(CharPropFlags::WRITE_WITHOUT_RESPONSE)
        {
            WriteType::WithoutResponse
        } else {
            WriteType::WithResponse
        };

        Ok(Arc::new(GattLink {
            peripheral,
            characteristic,
            write_type,
        }))
    }
}

impl std::fmt::Debug for BleRadio {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleRadio")
            .field("scan_duration", &self.scan_duration)
            .field("open", &self.session.initialized())
            .finish()
    }
}

struct GattLink {
    peripheral: Peripheral,
    characteristic: Characteristic,
    write_type: WriteType,
}

#[async_trait]
impl FrameLink for GattLink {
    async fn write(&self, frame: &Frame) -> Result<(), ActuatorError> {
        self.peripheral
            .write(&self.characteristic, frame, self.write_type)
            .await
            .map_err(|err| ActuatorError::Write(err.to_string()))
    }

    async fn close(&self) -> Result<(), ActuatorError> {
        self.peripheral.disconnect().await.map_err(backend)
    }
}
