//! Trigger source: MIDI port selection, message decoding and the producer
//! side hook that feeds classified hits into the event lanes.

#[cfg(feature = "midi")]
mod midi;

#[cfg(feature = "midi")]
pub use midi::MidiTrigger;

use std::sync::Arc;

use crate::{DrumMapping, EventQueues};

/// Substrings that mark a port as virtual or loopback.
const VIRTUAL_MARKERS: [&str; 3] = ["virtual", "iac", "garageband"];
/// Virtual ports worth preferring over an arbitrary first port.
const PREFERRED_VIRTUAL_MARKERS: [&str; 2] = ["garageband", "iac"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TriggerError {
    #[error("no MIDI input ports found")]
    NoPorts,
    #[error("MIDI port `{requested}` not found; available: {available:?}")]
    PortNotFound {
        requested: String,
        available: Vec<String>,
    },
    #[error("MIDI backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortKind {
    Hardware,
    Virtual,
}

impl PortKind {
    pub fn of(name: &str) -> Self {
        let lowered = name.to_lowercase();
        if VIRTUAL_MARKERS.iter().any(|marker| lowered.contains(marker)) {
            PortKind::Virtual
        } else {
            PortKind::Hardware
        }
    }
}

impl std::fmt::Display for PortKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PortKind::Hardware => f.write_str("hardware"),
            PortKind::Virtual => f.write_str("virtual"),
        }
    }
}

/// Chooses an input port. Precedence: the explicit name, then the first
/// hardware port, then the first GarageBand/IAC loopback, then whatever
/// comes first.
pub fn select_port<'a>(
    ports: &'a [String],
    explicit: Option<&str>,
) -> Result<&'a str, TriggerError> {
    if ports.is_empty() {
        return Err(TriggerError::NoPorts);
    }

    if let Some(requested) = explicit {
        return ports
            .iter()
            .find(|port| port.as_str() == requested)
            .map(String::as_str)
            .ok_or_else(|| TriggerError::PortNotFound {
                requested: requested.to_string(),
                available: ports.to_vec(),
            });
    }

    let hardware = ports.iter().find(|port| PortKind::of(port) == PortKind::Hardware);
    let loopback = || {
        ports.iter().find(|port| {
            let lowered = port.to_lowercase();
            PREFERRED_VIRTUAL_MARKERS
                .iter()
                .any(|marker| lowered.contains(marker))
        })
    };

    Ok(hardware.or_else(loopback).unwrap_or(&ports[0]).as_str())
}

/// Decoded channel message, reduced to what the trigger path cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerMessage {
    Hit { channel: u8, note: u8, velocity: u8 },
    Release { channel: u8, note: u8 },
    Other,
}

impl TriggerMessage {
    /// Note-on with zero velocity is a release. Truncated messages decode
    /// as [`TriggerMessage::Other`].
    pub fn parse(bytes: &[u8]) -> Self {
        let (status, note, velocity) = match bytes {
            [status, note, velocity, ..] => (*status, *note & 0x7F, *velocity & 0x7F),
            _ => return TriggerMessage::Other,
        };
        let channel = status & 0x0F;
        match status & 0xF0 {
            0x90 if velocity > 0 => TriggerMessage::Hit {
                channel,
                note,
                velocity,
            },
            0x90 | 0x80 => TriggerMessage::Release { channel, note },
            _ => TriggerMessage::Other,
        }
    }

    pub fn hit(&self) -> Option<(u8, u8)> {
        match *self {
            TriggerMessage::Hit { note, velocity, .. } => Some((note, velocity)),
            _ => None,
        }
    }
}

/// Builds the producer callback: classify the hit and offer it to its lane.
/// Runs on the trigger source's thread and never touches the actuator.
pub fn enqueue_hits(
    mapping: DrumMapping,
    queues: Arc<EventQueues>,
) -> impl FnMut(u8, u8) + Send + 'static {
    move |note, velocity| {
        let event = mapping.event(note, velocity);
        tracing::debug!(
            note,
            velocity,
            category = %event.category,
            "drum hit received"
        );
        queues.offer_event(event);
    }
}
