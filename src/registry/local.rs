//! Local Publishing
//!
//! The local runtime describes itself on the multicast channel once per
//! frame. Readings come from the host; polling devices is not done here.

use tracing::debug;

use crate::core::Pose;
use crate::registry::participant::ParticipantKind;
use crate::registry::{control, description, device, DeviceStatus, FrameSink};

/// Writes the local member's fields for one frame.
pub trait LocalPublisher {
    /// Pend this frame's fields. Returns `false` when nothing was published.
    fn publish(&self, sink: &mut dyn FrameSink) -> bool;
}

/// One tracked device as read by the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DeviceReading {
    /// Tracking status.
    pub status: DeviceStatus,
    /// Pose, meaningful when ready.
    pub pose: Pose,
    /// Battery level in `0.0..=1.0`.
    pub battery: f32,
}

impl Default for DeviceReading {
    fn default() -> Self {
        Self {
            status: DeviceStatus::Unavailable,
            pose: Pose::IDENTITY,
            battery: 0.0,
        }
    }
}

impl DeviceReading {
    /// A tracked device at `pose`.
    pub fn ready(pose: Pose, battery: f32) -> Self {
        Self { status: DeviceStatus::Ready, pose, battery }
    }
}

/// Battery level as a whole percentage byte.
pub fn battery_percent(level: f32) -> u8 {
    (level * 100.0).round().clamp(0.0, 255.0) as u8
}

/// Local player runtime.
#[derive(Clone, Debug, Default)]
pub struct LocalPlayer {
    /// Headset with hand controllers, or flat screen.
    pub stereo: bool,
    /// Numeric user id, if assigned.
    pub user_id: Option<String>,
    /// Whether the player is admitted to the playground.
    pub activated: bool,
    /// Head tracker.
    pub head: DeviceReading,
    /// Left controller.
    pub left_hand: DeviceReading,
    /// Right controller.
    pub right_hand: DeviceReading,
}

impl LocalPlayer {
    /// Kind published for this player.
    pub fn kind(&self) -> ParticipantKind {
        if self.stereo {
            ParticipantKind::Stereo
        } else {
            ParticipantKind::Mono
        }
    }
}

impl LocalPublisher for LocalPlayer {
    fn publish(&self, sink: &mut dyn FrameSink) -> bool {
        if !self.activated {
            return false;
        }

        sink.pend_byte(device::DESCRIPTION, description::TYPE, self.kind().as_byte());

        if let Some(user_id) = self.user_id.as_deref().filter(|id| !id.is_empty()) {
            match user_id.parse::<u8>() {
                Ok(byte) => sink.pend_byte(device::DESCRIPTION, description::USER_ID, byte),
                Err(_) => debug!("User id {:?} does not fit the channel", user_id),
            }
        }

        sink.pend_pose(device::HEAD, control::POSE, self.head.pose);
        sink.pend_byte(device::HEAD, control::BATTERY, battery_percent(self.head.battery));

        if self.stereo {
            publish_hand(sink, device::LEFT_HAND, &self.left_hand);
            publish_hand(sink, device::RIGHT_HAND, &self.right_hand);
        }

        true
    }
}

fn publish_hand(sink: &mut dyn FrameSink, hand: u8, reading: &DeviceReading) {
    sink.pend_byte(hand, control::STATUS, reading.status as u8);
    if reading.status == DeviceStatus::Ready {
        sink.pend_pose(hand, control::POSE, reading.pose);
        sink.pend_byte(hand, control::BATTERY, battery_percent(reading.battery));
    }
}

/// Local observer runtime.
#[derive(Clone, Debug, Default)]
pub struct LocalObserver {
    /// Client id assigned by the game extension.
    pub client_id: Option<String>,
}

impl LocalPublisher for LocalObserver {
    fn publish(&self, sink: &mut dyn FrameSink) -> bool {
        sink.pend_byte(device::DESCRIPTION, description::TYPE, ParticipantKind::Observer.as_byte());
        if let Some(id) = self.client_id.as_deref().filter(|id| !id.is_empty()) {
            sink.pend_string(device::DESCRIPTION, description::EXTENSION_CLIENT_ID, id);
        }
        true
    }
}
