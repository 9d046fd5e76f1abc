//! Participants
//!
//! A participant is one entity in the shared space. Its kind decides which
//! anchors it carries: players have a head and, in stereo, two hands;
//! trackers and observers carry a single anchor.

use serde::{Serialize, Deserialize};

use crate::core::Pose;

/// Participant kind, as published in the description `TYPE` byte.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ParticipantKind {
    /// Headset player with hand controllers.
    Stereo = 0,
    /// Flat-screen player.
    Mono = 1,
    /// Owner of a tracker group, or a synthetic tracker.
    Tracker = 2,
    /// Spectator view.
    Observer = 3,
}

impl ParticipantKind {
    /// Decode a kind byte.
    pub fn from_byte(value: u8) -> Option<Self> {
        match value {
            0 => Some(ParticipantKind::Stereo),
            1 => Some(ParticipantKind::Mono),
            2 => Some(ParticipantKind::Tracker),
            3 => Some(ParticipantKind::Observer),
            _ => None,
        }
    }

    /// Kind byte.
    #[inline]
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// One hand anchor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct HandState {
    /// Hand is tracked this frame.
    pub active: bool,
    /// Last pose seen while active.
    pub pose: Pose,
}

/// Anchor layout used when instantiating a participant.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParticipantTemplate {
    /// Head pose before the first update.
    pub rest_pose: Pose,
    /// Whether hand anchors exist.
    pub has_hands: bool,
}

impl ParticipantTemplate {
    /// Default layout for `kind`.
    pub fn for_kind(kind: ParticipantKind) -> Self {
        Self {
            rest_pose: Pose::IDENTITY,
            has_hands: kind == ParticipantKind::Stereo,
        }
    }
}

/// A live participant.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Multicast member id, or a synthetic `tracker-N` id.
    pub id: String,
    /// Kind at instantiation.
    pub kind: ParticipantKind,
    /// User id published by the participant.
    pub user_id: Option<String>,
    /// Extension client id (observers).
    pub client_id: Option<String>,
    /// Head (or tracker) pose.
    pub head: Pose,
    /// Left hand, absent when the layout has no hands.
    pub left_hand: Option<HandState>,
    /// Right hand, absent when the layout has no hands.
    pub right_hand: Option<HandState>,
}

impl Participant {
    /// Instantiate from `template`.
    pub fn new(
        id: &str,
        kind: ParticipantKind,
        user_id: Option<String>,
        client_id: Option<String>,
        template: &ParticipantTemplate,
    ) -> Self {
        let hand = template.has_hands.then(HandState::default);
        Self {
            id: id.to_string(),
            kind,
            user_id,
            client_id,
            head: template.rest_pose,
            left_hand: hand,
            right_hand: hand,
        }
    }

    /// Replace the extension client id.
    pub fn update_client_id(&mut self, id: Option<String>) {
        self.client_id = id;
    }

    /// Move the head anchor.
    pub fn update_head(&mut self, pose: Pose) {
        self.head = pose;
    }

    /// Update the left hand. The pose is kept when inactive.
    pub fn update_left_hand(&mut self, active: bool, pose: Pose) {
        update_hand(&mut self.left_hand, active, pose);
    }

    /// Update the right hand. The pose is kept when inactive.
    pub fn update_right_hand(&mut self, active: bool, pose: Pose) {
        update_hand(&mut self.right_hand, active, pose);
    }
}

fn update_hand(hand: &mut Option<HandState>, active: bool, pose: Pose) {
    let Some(hand) = hand.as_mut() else {
        return;
    };
    hand.active = active;
    if active {
        hand.pose = pose;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_bytes() {
        for kind in [
            ParticipantKind::Stereo,
            ParticipantKind::Mono,
            ParticipantKind::Tracker,
            ParticipantKind::Observer,
        ] {
            assert_eq!(ParticipantKind::from_byte(kind.as_byte()), Some(kind));
        }
        assert_eq!(ParticipantKind::from_byte(9), None);
    }

    #[test]
    fn test_inactive_hand_keeps_pose() {
        let mut p = Participant::new(
            "m1",
            ParticipantKind::Stereo,
            None,
            None,
            &ParticipantTemplate::for_kind(ParticipantKind::Stereo),
        );

        p.update_left_hand(true, Pose::at(1.0, 0.0, 0.0));
        p.update_left_hand(false, Pose::at(5.0, 0.0, 0.0));

        let hand = p.left_hand.unwrap();
        assert!(!hand.active);
        assert_eq!(hand.pose, Pose::at(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_handless_layout_ignores_hands() {
        let mut p = Participant::new(
            "m2",
            ParticipantKind::Mono,
            Some("4".into()),
            None,
            &ParticipantTemplate::for_kind(ParticipantKind::Mono),
        );
        p.update_right_hand(true, Pose::at(1.0, 2.0, 3.0));
        assert_eq!(p.right_hand, None);
        assert_eq!(p.user_id.as_deref(), Some("4"));
    }
}
