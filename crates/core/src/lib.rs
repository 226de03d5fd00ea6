//! Core library for the Drum Light synchroniser.
//!
//! Drum hits arrive on the trigger source's own thread, are classified and
//! parked in two bounded lanes (kicks in the high-priority lane, everything
//! else in the normal lane). A single scheduling loop drains those lanes,
//! drops anything that went stale, and hands fresh hits to the animation
//! controller, which flashes the light and fades it back without ever
//! blocking the loop.

pub mod actuator;
pub mod animation;
pub mod config;
pub mod error;
pub mod mapping;
pub mod pipeline;
pub mod queue;
pub mod scheduler;
pub mod trigger;

#[cfg(feature = "ble")]
pub use actuator::ble::{BleActuator, BleRadio};
pub use actuator::leddmx::{FrameLink, LeddmxActuator, LinkProvider};
pub use actuator::{Actuator, ActuatorError, DeviceInfo, DryRunActuator};
pub use animation::{AnimationController, AnimationPhase};
pub use config::{AppConfig, BaselineConfig, BrightnessConfig, QueueConfig, TimingConfig};
pub use error::{DrumLightError, Result};
pub use mapping::{brightness_of, Category, DrumMapping, Percent, Priority, Rgb, TriggerEvent};
pub use pipeline::Pipeline;
pub use queue::{BoundedLane, EventQueues};
pub use scheduler::{Dispatch, Scheduler, SchedulerStats};
#[cfg(feature = "midi")]
pub use trigger::MidiTrigger;
pub use trigger::{select_port, PortKind, TriggerError, TriggerMessage};
