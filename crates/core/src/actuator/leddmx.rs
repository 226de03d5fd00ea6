//! LEDDMX lights driven over a frame link.
//!
//! Discovery keeps only devices advertising an `LEDDMX` name, and every
//! actuator operation becomes a single nine-byte frame write. The radio
//! itself sits behind [`LinkProvider`], so the same actuator runs over
//! Bluetooth LE in production and over an in-memory link in tests.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{
    frame::{self, Frame},
    Actuator, ActuatorError, DeviceInfo,
};
use crate::{Percent, Rgb};

/// Advertised name prefix shared by LEDDMX-00 and LEDDMX-03 controllers.
pub const NAME_PREFIX: &str = "LEDDMX";

/// A device seen during discovery, before name filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: String,
    pub name: Option<String>,
}

pub fn is_leddmx(name: &str) -> bool {
    name.starts_with(NAME_PREFIX)
}

/// Keeps the advertisements that name an LEDDMX controller, in discovery
/// order. Unnamed devices are skipped.
pub fn leddmx_devices(found: impl IntoIterator<Item = Advertisement>) -> Vec<DeviceInfo> {
    found
        .into_iter()
        .filter_map(|advertisement| {
            let name = advertisement.name.filter(|name| is_leddmx(name))?;
            Some(DeviceInfo {
                address: advertisement.address,
                name,
            })
        })
        .collect()
}

/// An open connection that accepts command frames.
#[async_trait]
pub trait FrameLink: Send + Sync {
    async fn write(&self, frame: &Frame) -> Result<(), ActuatorError>;

    async fn close(&self) -> Result<(), ActuatorError>;
}

/// Radio side of an LEDDMX actuator: finds devices and opens links to them.
#[async_trait]
pub trait LinkProvider: Send + Sync {
    async fn discover(&self) -> Result<Vec<Advertisement>, ActuatorError>;

    async fn open(&self, address: &str) -> Result<Arc<dyn FrameLink>, ActuatorError>;
}

type OpenLink = (String, Arc<dyn FrameLink>);

pub struct LeddmxActuator<P> {
    provider: P,
    link: Mutex<Option<OpenLink>>,
}

impl<P: LinkProvider> LeddmxActuator<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            link: Mutex::new(None),
        }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn connected_address(&self) -> Option<String> {
        self.link.lock().as_ref().map(|(address, _)| address.clone())
    }

    async fn send(&self, bytes: Frame) -> Result<(), ActuatorError> {
        let link = self
            .link
            .lock()
            .as_ref()
            .map(|(_, link)| Arc::clone(link))
            .ok_or(ActuatorError::NotConnected)?;
        tracing::trace!(frame = %frame::hex(&bytes), "LEDDMX write");
        link.write(&bytes).await
    }
}

#[async_trait]
impl<P: LinkProvider> Actuator for LeddmxActuator<P> {
    async fn scan(&self) -> Result<Vec<DeviceInfo>, ActuatorError> {
        let found = self.provider.discover().await?;
        let seen = found.len();
        let devices = leddmx_devices(found);
        tracing::debug!(seen, matched = devices.len(), "LEDDMX scan finished");
        Ok(devices)
    }

    async fn connect(&self, address: &str) -> Result<(), ActuatorError> {
        if self.connected_address().is_some() {
            self.disconnect().await?;
        }
        let link = self.provider.open(address).await?;
        *self.link.lock() = Some((address.to_string(), link));
        tracing::info!(address, "LEDDMX light connected");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), ActuatorError> {
        let open = self.link.lock().take();
        if let Some((address, link)) = open {
            link.close().await?;
            tracing::info!(address = %address, "LEDDMX light disconnected");
        }
        Ok(())
    }

    async fn power(&self, on: bool) -> Result<(), ActuatorError> {
        self.send(frame::power(on)).await
    }

    async fn set_color(&self, color: Rgb) -> Result<(), ActuatorError> {
        self.send(frame::color(color)).await
    }

    async fn set_brightness(&self, brightness: Percent) -> Result<(), ActuatorError> {
        self.send(frame::brightness(brightness)).await
    }
}

impl<P: std::fmt::Debug> std::fmt::Debug for LeddmxActuator<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeddmxActuator")
            .field("provider", &self.provider)
            .field(
                "connected",
                &self.link.lock().as_ref().map(|(address, _)| address.clone()),
            )
            .finish()
    }
}
