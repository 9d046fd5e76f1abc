//! In-process multicast channel.
//!
//! Holds one frame of fields for every member. Fields pended by the local
//! member are held back until [`LoopbackChannel::commit`], which replaces
//! the local member's previous frame. Used by the standalone binary and by
//! tests; a networked channel implements the same traits.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::Pose;
use crate::registry::{FrameSink, FrameSource};

#[derive(Clone, Debug, PartialEq)]
enum Field {
    Byte(u8),
    Pose(Pose),
    Text(String),
}

type Key = (String, u8, u8);

/// In-memory [`FrameSource`] + [`FrameSink`].
#[derive(Debug, Default)]
pub struct LoopbackChannel {
    local_id: String,
    frame: BTreeMap<Key, Field>,
    pending: BTreeMap<(u8, u8), Field>,
}

impl LoopbackChannel {
    /// Channel whose local member is `local_id`.
    pub fn new(local_id: impl Into<String>) -> Self {
        Self {
            local_id: local_id.into(),
            ..Default::default()
        }
    }

    /// Local member id.
    pub fn local_id(&self) -> &str {
        &self.local_id
    }

    /// Members with at least one field this frame.
    pub fn members(&self) -> BTreeSet<String> {
        self.frame.keys().map(|(member, _, _)| member.clone()).collect()
    }

    /// Set a remote byte field.
    pub fn set_byte(&mut self, member: &str, device: u8, control: u8, value: u8) {
        self.frame.insert((member.to_string(), device, control), Field::Byte(value));
    }

    /// Set a remote pose field.
    pub fn set_pose(&mut self, member: &str, device: u8, control: u8, pose: Pose) {
        self.frame.insert((member.to_string(), device, control), Field::Pose(pose));
    }

    /// Set a remote string field.
    pub fn set_string(&mut self, member: &str, device: u8, control: u8, value: &str) {
        self.frame.insert((member.to_string(), device, control), Field::Text(value.to_string()));
    }

    /// Drop one field.
    pub fn clear_field(&mut self, member: &str, device: u8, control: u8) {
        self.frame.remove(&(member.to_string(), device, control));
    }

    /// Drop every field of `member`.
    pub fn clear_member(&mut self, member: &str) {
        self.frame.retain(|(m, _, _), _| m != member);
    }

    /// Publish pended local fields as the local member's frame.
    pub fn commit(&mut self) {
        let local = self.local_id.clone();
        self.clear_member(&local);
        for ((device, control), field) in std::mem::take(&mut self.pending) {
            self.frame.insert((local.clone(), device, control), field);
        }
    }

    fn field(&self, member: &str, device: u8, control: u8) -> Option<&Field> {
        self.frame.get(&(member.to_string(), device, control))
    }
}

impl FrameSource for LoopbackChannel {
    fn get_byte(&self, member: &str, device: u8, control: u8) -> Option<u8> {
        match self.field(member, device, control)? {
            Field::Byte(value) => Some(*value),
            _ => None,
        }
    }

    fn get_pose(&self, member: &str, device: u8, control: u8) -> Option<Pose> {
        match self.field(member, device, control)? {
            Field::Pose(pose) => Some(*pose),
            _ => None,
        }
    }

    fn get_string(&self, member: &str, device: u8, control: u8) -> Option<String> {
        match self.field(member, device, control)? {
            Field::Text(value) => Some(value.clone()),
            _ => None,
        }
    }
}

impl FrameSink for LoopbackChannel {
    fn pend_byte(&mut self, device: u8, control: u8, value: u8) {
        self.pending.insert((device, control), Field::Byte(value));
    }

    fn pend_pose(&mut self, device: u8, control: u8, pose: Pose) {
        self.pending.insert((device, control), Field::Pose(pose));
    }

    fn pend_string(&mut self, device: u8, control: u8, value: &str) {
        self.pending.insert((device, control), Field::Text(value.to_string()));
    }
}
