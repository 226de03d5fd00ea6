use midir::{Ignore, MidiInput, MidiInputConnection, MidiInputPort};

use super::{select_port, PortKind, TriggerError, TriggerMessage};

const CLIENT_NAME: &str = "drum-light";
const CONNECTION_NAME: &str = "drum-light-input";

/// A MIDI input port opened through `midir`. Hits are delivered on midir's
/// own callback thread while listening.
pub struct MidiTrigger {
    port_name: String,
    port: MidiInputPort,
    input: Option<MidiInput>,
    connection: Option<MidiInputConnection<()>>,
}

impl MidiTrigger {
    /// Lists input port names together with their hardware/virtual kind.
    pub fn list_ports() -> Result<Vec<(String, PortKind)>, TriggerError> {
        let input = new_input()?;
        Ok(port_names(&input)?
            .into_iter()
            .map(|(name, _)| {
                let kind = PortKind::of(&name);
                (name, kind)
            })
            .collect())
    }

    /// Opens the port chosen by [`select_port`].
    pub fn connect(explicit: Option<&str>) -> Result<Self, TriggerError> {
        let input = new_input()?;
        let ports = port_names(&input)?;
        let names: Vec<String> = ports.iter().map(|(name, _)| name.clone()).collect();
        let selected = select_port(&names, explicit)?.to_string();

        let port = ports
            .into_iter()
            .find_map(|(name, port)| (name == selected).then_some(port))
            .ok_or_else(|| TriggerError::Backend(format!("port `{selected}` vanished")))?;

        tracing::info!(port = %selected, kind = %PortKind::of(&selected), "selected MIDI input");
        Ok(Self {
            port_name: selected,
            port,
            input: Some(input),
            connection: None,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn is_listening(&self) -> bool {
        self.connection.is_some()
    }

    /// Starts delivering `(note, velocity)` hits to `on_hit`. Releases and
    /// non-note messages never reach the callback.
    pub fn start_listening<F>(&mut self, mut on_hit: F) -> Result<(), TriggerError>
    where
        F: FnMut(u8, u8) + Send + 'static,
    {
        let Some(input) = self.input.take() else {
            return Ok(());
        };

        let connection = input
            .connect(
                &self.port,
                CONNECTION_NAME,
                move |_stamp, bytes, _| {
                    let message = TriggerMessage::parse(bytes);
                    tracing::trace!(?bytes, ?message, "MIDI message");
                    if let Some((note, velocity)) = message.hit() {
                        on_hit(note, velocity);
                    }
                },
                (),
            )
            .map_err(|err| TriggerError::Backend(err.to_string()))?;

        self.connection = Some(connection);
        tracing::info!(port = %self.port_name, "listening for MIDI hits");
        Ok(())
    }

    pub fn stop_listening(&mut self) {
        if let Some(connection) = self.connection.take() {
            let (input, ()) = connection.close();
            self.input = Some(input);
            tracing::info!(port = %self.port_name, "stopped listening for MIDI hits");
        }
    }
}

impl Drop for MidiTrigger {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

impl std::fmt::Debug for MidiTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiTrigger")
            .field("port_name", &self.port_name)
            .field("listening", &self.is_listening())
            .finish()
    }
}

fn new_input() -> Result<MidiInput, TriggerError> {
    let mut input =
        MidiInput::new(CLIENT_NAME).map_err(|err| TriggerError::Backend(err.to_string()))?;
    input.ignore(Ignore::All);
    Ok(input)
}

fn port_names(input: &MidiInput) -> Result<Vec<(String, MidiInputPort)>, TriggerError> {
    let mut ports = Vec::new();
    for port in input.ports() {
        let name = input
            .port_name(&port)
            .map_err(|err| TriggerError::Backend(err.to_string()))?;
        ports.push((name, port));
    }
    if ports.is_empty() {
        return Err(TriggerError::NoPorts);
    }
    Ok(ports)
}
