use crate::domain::{ConnectionId, ConnectionSet, Message};
use crate::infrastructure::error::{ProtocolError, Result};

/// Where an outbound message should go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// A single connection, whatever its sync phase
    To(ConnectionId, Message),
    /// Every synced connection except `except`
    Broadcast {
        message: Message,
        except: Option<ConnectionId>,
    },
}

/// Message codec and fan-out
#[derive(Debug, Default, Clone, Copy)]
pub struct MessageRouter;

impl MessageRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn encode(&self, message: &Message) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(message)?)
    }

    /// Decode one inbound message
    ///
    /// The tag is checked before the payload so an unknown type is reported
    /// as such rather than as a generic parse failure.
    pub fn decode(&self, bytes: &[u8]) -> std::result::Result<Message, ProtocolError> {
        let value: serde_json::Value =
            serde_json::from_slice(bytes).map_err(|e| ProtocolError::Malformed(e.to_string()))?;

        let tag = value
            .get("type")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| ProtocolError::Malformed("missing \"type\" tag".to_string()))?;

        if !Message::TAGS.contains(&tag) {
            return Err(ProtocolError::UnknownTag(tag.to_string()));
        }

        serde_json::from_value(value).map_err(|e| ProtocolError::Malformed(e.to_string()))
    }

    /// Synced connections a broadcast reaches
    pub fn fan_out(
        &self,
        connections: &ConnectionSet,
        except: Option<ConnectionId>,
    ) -> Vec<ConnectionId> {
        connections.synced_except(except)
    }

    /// Resolve dispatches into concrete sends, preserving order
    pub fn route(
        &self,
        dispatches: Vec<Dispatch>,
        connections: &ConnectionSet,
    ) -> Vec<(ConnectionId, Message)> {
        let mut sends = Vec::new();
        for dispatch in dispatches {
            match dispatch {
                Dispatch::To(connection, message) => {
                    if connections.contains(connection) {
                        sends.push((connection, message));
                    }
                }
                Dispatch::Broadcast { message, except } => {
                    for connection in self.fan_out(connections, except) {
                        sends.push((connection, message.clone()));
                    }
                }
            }
        }
        sends
    }
}
