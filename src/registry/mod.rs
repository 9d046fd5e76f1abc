//! Participant Registry
//!
//! Tracks everyone sharing the playground: players, tracker clusters and the
//! observer. Truth comes from the multicast data channel, re-read every frame
//! through [`FrameSource`]. The local runtime writes its own description back
//! through [`FrameSink`].
//!
//! Fields are addressed by `(member, device, control)`:
//!
//! | device          | controls                                        |
//! |-----------------|-------------------------------------------------|
//! | `DESCRIPTION` 0 | `TYPE` 0, `USER_ID`/`GROUP` 1, `EXTENSION_CLIENT_ID`/`DEVICE_COUNT` 2 |
//! | `HEAD` 1        | `POSE` 1, `BATTERY` 2                           |
//! | `LEFT_HAND` 2   | `STATUS` 0, `POSE` 1, `BATTERY` 2               |
//! | `RIGHT_HAND` 3  | `STATUS` 0, `POSE` 1, `BATTERY` 2               |
//!
//! Tracker owners use the same `STATUS`/`POSE` controls with the device
//! number as the device slot. `USER_DATA` 7 belongs to the application and
//! is read and written through [`ParticipantData`].

pub mod participant;
pub mod roster;
pub mod local;
pub mod loopback;

pub use participant::{HandState, Participant, ParticipantKind, ParticipantTemplate};
pub use roster::{ParticipantRegistry, RegistryEvent, TrackerGroup};
pub use local::{DeviceReading, LocalObserver, LocalPlayer, LocalPublisher};
pub use loopback::LoopbackChannel;

use crate::core::Pose;

// =============================================================================
// FIELD ADDRESSING
// =============================================================================

/// Device slots.
pub mod device {
    /// Participant description.
    pub const DESCRIPTION: u8 = 0;
    /// Head tracker.
    pub const HEAD: u8 = 1;
    /// Left hand tracker.
    pub const LEFT_HAND: u8 = 2;
    /// Right hand tracker.
    pub const RIGHT_HAND: u8 = 3;
    /// Application data.
    pub const USER_DATA: u8 = 7;
}

/// Controls of the description device.
pub mod description {
    /// Participant kind byte.
    pub const TYPE: u8 = 0;
    /// Numeric user id (players).
    pub const USER_ID: u8 = 1;
    /// Extension client id (observers).
    pub const EXTENSION_CLIENT_ID: u8 = 2;
    /// Tracker group number (tracker owners).
    pub const GROUP: u8 = 1;
    /// Number of devices in the tracker group.
    pub const DEVICE_COUNT: u8 = 2;
}

/// Controls of tracked devices.
pub mod control {
    /// Device status byte.
    pub const STATUS: u8 = 0;
    /// Device pose.
    pub const POSE: u8 = 1;
    /// Battery percentage.
    pub const BATTERY: u8 = 2;
}

/// Status byte of a tracked device.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum DeviceStatus {
    /// Not tracking.
    Unavailable = 0,
    /// Tracking.
    Ready = 1,
}

impl DeviceStatus {
    /// Decode a status byte. Unknown values read as unavailable.
    pub fn from_byte(value: u8) -> Self {
        match value {
            1 => DeviceStatus::Ready,
            _ => DeviceStatus::Unavailable,
        }
    }
}

// =============================================================================
// CHANNEL
// =============================================================================

/// Read side of the multicast data channel for the current frame.
pub trait FrameSource {
    /// Byte field of `member`.
    fn get_byte(&self, member: &str, device: u8, control: u8) -> Option<u8>;

    /// Pose field of `member`.
    fn get_pose(&self, member: &str, device: u8, control: u8) -> Option<Pose>;

    /// String field of `member`.
    fn get_string(&self, member: &str, device: u8, control: u8) -> Option<String>;
}

/// Write side of the multicast data channel for the local member.
pub trait FrameSink {
    /// Queue a byte field for this frame.
    fn pend_byte(&mut self, device: u8, control: u8, value: u8);

    /// Queue a pose field for this frame.
    fn pend_pose(&mut self, device: u8, control: u8, pose: Pose);

    /// Queue a string field for this frame.
    fn pend_string(&mut self, device: u8, control: u8, value: &str);
}

/// Application data carried alongside the built-in fields, normally on the
/// [`device::USER_DATA`] slot.
pub trait ParticipantData {
    /// Pend the local player's fields. Called after the built-in fields, and
    /// only on frames the player publishes.
    fn pend_local(&mut self, _player: &LocalPlayer, _sink: &mut dyn FrameSink) {}

    /// Read a remote player's fields after its poses were updated this frame.
    fn read_remote(&mut self, _participant: &Participant, _source: &dyn FrameSource) {}
}

/// No application data.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoParticipantData;

impl ParticipantData for NoParticipantData {}
