//! Command dispatcher — operator action → one outbound publish.

use super::{Action, DeviceCommand};
use crate::error::DispatchError;
use crate::shared::DeviceId;
use crate::transport::CommandSink;

/// Forwards operator commands to a transport's publish capability.
///
/// Fire-and-forget: `dispatch` hands the command to the sink and returns. No
/// acknowledgment, retry, or queueing; a rejected command is logged and dropped.
/// Device ids are not checked against any catalog.
#[derive(Debug, Clone)]
pub struct CommandDispatcher<S> {
    sink: S,
}

impl<S: CommandSink> CommandDispatcher<S> {
    pub fn new(sink: S) -> Self {
        Self { sink }
    }

    pub fn dispatch(
        &self,
        device_id: impl Into<DeviceId>,
        action: Action,
    ) -> Result<(), DispatchError> {
        let command = DeviceCommand::new(device_id, action);
        match self.sink.publish(&command) {
            Ok(()) => {
                tracing::info!(command = %command.token(), "Command dispatched");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(command = %command.token(), "Dropping command: {}", e);
                Err(e)
            }
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}
