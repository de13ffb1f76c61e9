// MIT License - Copyright (c) Nick Whyte
// Rust translation

use tokio::sync::broadcast;

use crate::alarm::{AlarmChange, ArmingMode, ArmingState};
use crate::event::Event;

/// Notifications broadcast by the client.
///
/// Delivered to every receiver returned by `Client::subscribe`.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    /// Transport connected (or reconnected)
    Connected,
    /// Transport reported a disconnect
    Disconnected,
    /// Every successfully decoded event, before it is applied to the alarm state
    EventReceived(Event),
    /// Arming state changed
    ArmingStateChanged {
        state: ArmingState,
        mode: Option<ArmingMode>,
    },
    /// Zone sealed/unsealed state changed
    ZoneChanged { zone_id: u8, triggered: bool },
    /// Auxiliary output state changed
    AuxOutputChanged { output_id: u8, active: bool },
}

impl From<AlarmChange> for ClientEvent {
    fn from(change: AlarmChange) -> Self {
        match change {
            AlarmChange::ArmingState { state, mode } => Self::ArmingStateChanged { state, mode },
            AlarmChange::Zone { zone_id, triggered } => Self::ZoneChanged { zone_id, triggered },
            AlarmChange::AuxOutput { output_id, active } => {
                Self::AuxOutputChanged { output_id, active }
            }
        }
    }
}

/// Sending half held by the client; every `subscribe()` call clones a receiver from it.
pub type EventSender = broadcast::Sender<ClientEvent>;

/// Returned by `Client::subscribe`. A slow subscriber sees `Lagged` rather than
/// holding up the receive task.
pub type EventReceiver = broadcast::Receiver<ClientEvent>;

/// Channel sized by `ClientConfig::event_channel_capacity`.
pub(crate) fn event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    broadcast::channel(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alarm_change_maps_to_client_event() {
        let event = ClientEvent::from(AlarmChange::Zone {
            zone_id: 4,
            triggered: true,
        });
        assert!(matches!(
            event,
            ClientEvent::ZoneChanged {
                zone_id: 4,
                triggered: true
            }
        ));
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags() {
        let (tx, mut rx) = event_channel(2);
        for _ in 0..3 {
            tx.send(ClientEvent::Connected).unwrap();
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(1))
        ));
        assert!(matches!(rx.recv().await, Ok(ClientEvent::Connected)));
    }
}
