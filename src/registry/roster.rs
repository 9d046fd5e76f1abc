//! Participant Roster
//!
//! Owns every participant instance. Member ids become known through
//! multicast membership; instances are created lazily the first time a
//! member reports a kind, and destroyed when the member leaves.
//!
//! The per-frame pass is level-triggered: each tick re-derives poses,
//! tracker sets and the observer slot from the current channel snapshot.
//! Only [`RegistryEvent`]s are edge-triggered, and they fire exactly once
//! per transition.
//!
//! A new observer identity takes the slot from the current holder. The
//! displaced id cannot reclaim it while the slot is held, so two members
//! both claiming to observe settle on one instead of trading the slot
//! every frame.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, info};

use crate::core::Pose;
use crate::registry::participant::{Participant, ParticipantKind, ParticipantTemplate};
use crate::registry::{control, description, device, DeviceStatus, FrameSource, NoParticipantData, ParticipantData};

/// Lifecycle transition of a participant instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryEvent {
    /// Instance created.
    Joined {
        /// Participant id.
        id: String,
        /// Kind it was created with.
        kind: ParticipantKind,
    },
    /// Instance destroyed.
    Left {
        /// Participant id.
        id: String,
    },
}

/// Tracker cluster reported by an owner member.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TrackerGroup {
    /// Group number.
    pub group: u8,
    /// Devices in the group, numbered from 1.
    pub device_count: u8,
}

impl TrackerGroup {
    /// Synthetic participant id of `device`.
    pub fn tracker_id(&self, device: u8) -> String {
        format!("tracker-{}", (u32::from(self.group) << 8) | u32::from(device))
    }

    /// Every synthetic id this group can spawn.
    pub fn tracker_ids(&self) -> impl Iterator<Item = String> + '_ {
        (1..=self.device_count).map(move |device| self.tracker_id(device))
    }
}

/// The set of live participants.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    /// Known ids; `None` until instantiated.
    members: BTreeMap<String, Option<Participant>>,
    /// Tracker groups by owner id.
    tracker_groups: BTreeMap<String, TrackerGroup>,
    /// Id holding the observer slot.
    observer: Option<String>,
    /// Former holders barred from the slot until it is vacated.
    displaced: BTreeSet<String>,
    events: Vec<RegistryEvent>,
}

impl ParticipantRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // LIFECYCLE
    // =========================================================================

    /// Make `id` known. No-op if already known.
    pub fn add_participant(&mut self, id: &str) {
        if !self.members.contains_key(id) {
            debug!("Member known: {}", id);
            self.members.insert(id.to_string(), None);
        }
    }

    /// Instance for `id`, created on first access.
    ///
    /// Returns `None` for unknown ids. Creation queues a
    /// [`RegistryEvent::Joined`]; later calls return the existing instance
    /// and ignore the other arguments.
    pub fn get_or_create(
        &mut self,
        id: &str,
        kind: ParticipantKind,
        user_id: Option<String>,
        client_id: Option<String>,
        template: &ParticipantTemplate,
    ) -> Option<&mut Participant> {
        let slot = self.members.get_mut(id)?;

        if slot.is_none() {
            info!("Participant joined: {} ({:?})", id, kind);
            self.events.push(RegistryEvent::Joined { id: id.to_string(), kind });
            *slot = Some(Participant::new(id, kind, user_id, client_id, template));
        }

        slot.as_mut()
    }

    /// Forget `id`, destroying its instance and any trackers it owns.
    ///
    /// Returns `false` if `id` was unknown.
    pub fn remove(&mut self, id: &str) -> bool {
        let Some(instance) = self.members.remove(id) else {
            return false;
        };

        if instance.is_some() {
            info!("Participant left: {}", id);
            self.events.push(RegistryEvent::Left { id: id.to_string() });
        }

        self.displaced.remove(id);
        if self.observer.as_deref() == Some(id) {
            self.observer = None;
            self.displaced.clear();
        }

        if let Some(group) = self.tracker_groups.remove(id) {
            debug!("Removing tracker group {} of {}", group.group, id);
            for tracker in group.tracker_ids() {
                self.remove(&tracker);
            }
        }

        true
    }

    /// Multicast member appeared.
    pub fn member_joined(&mut self, id: &str) {
        self.add_participant(id);
    }

    /// Multicast member disappeared.
    pub fn member_left(&mut self, id: &str) {
        if !self.remove(id) {
            debug!("Unknown member left: {}", id);
        }
    }

    /// Drain queued lifecycle events.
    pub fn take_events(&mut self) -> Vec<RegistryEvent> {
        std::mem::take(&mut self.events)
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Whether `id` is known.
    pub fn contains(&self, id: &str) -> bool {
        self.members.contains_key(id)
    }

    /// Instance for `id`, if created.
    pub fn participant(&self, id: &str) -> Option<&Participant> {
        self.members.get(id).and_then(Option::as_ref)
    }

    /// All instantiated participants in id order.
    pub fn participants(&self) -> impl Iterator<Item = &Participant> {
        self.members.values().flatten()
    }

    /// Number of instantiated participants.
    pub fn len(&self) -> usize {
        self.participants().count()
    }

    /// No participant instantiated.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Id holding the observer slot.
    pub fn observer(&self) -> Option<&str> {
        self.observer.as_deref()
    }

    /// Tracker group recorded for `owner`.
    pub fn tracker_group(&self, owner: &str) -> Option<TrackerGroup> {
        self.tracker_groups.get(owner).copied()
    }

    // =========================================================================
    // FRAME PASS
    // =========================================================================

    /// Pull one frame of channel data for every known id.
    ///
    /// Ids that publish no kind are skipped this frame; they stay known.
    pub fn on_frame_tick(&mut self, source: &dyn FrameSource) {
        self.on_frame_tick_with(source, &mut NoParticipantData);
    }

    /// [`on_frame_tick`](Self::on_frame_tick), handing every updated player
    /// to `data` for its application fields.
    pub fn on_frame_tick_with(&mut self, source: &dyn FrameSource, data: &mut dyn ParticipantData) {
        let ids: Vec<String> = self.members.keys().cloned().collect();

        for id in ids {
            if !self.members.contains_key(&id) {
                continue;
            }

            let Some(kind_byte) = source.get_byte(&id, device::DESCRIPTION, description::TYPE) else {
                continue;
            };
            let Some(kind) = ParticipantKind::from_byte(kind_byte) else {
                debug!("Member {} reports unknown kind {}", id, kind_byte);
                continue;
            };

            if kind != ParticipantKind::Observer {
                self.displaced.remove(&id);
            }

            match kind {
                ParticipantKind::Stereo | ParticipantKind::Mono => self.update_player(&id, kind, source, data),
                ParticipantKind::Tracker => self.update_tracker_group(&id, source),
                ParticipantKind::Observer => self.update_observer(&id, source),
            }
        }
    }

    fn update_player(&mut self, id: &str, kind: ParticipantKind, source: &dyn FrameSource, data: &mut dyn ParticipantData) {
        let user_id = source
            .get_byte(id, device::DESCRIPTION, description::USER_ID)
            .map(|b| b.to_string());
        let template = ParticipantTemplate::for_kind(kind);

        let Some(player) = self.get_or_create(id, kind, user_id, None, &template) else {
            return;
        };

        if let Some(pose) = source.get_pose(id, device::HEAD, control::POSE) {
            player.update_head(pose);
        }

        if kind == ParticipantKind::Stereo {
            let (active, pose) = read_hand(source, id, device::LEFT_HAND);
            player.update_left_hand(active, pose);

            let (active, pose) = read_hand(source, id, device::RIGHT_HAND);
            player.update_right_hand(active, pose);
        }

        data.read_remote(player, source);
    }

    fn update_tracker_group(&mut self, owner: &str, source: &dyn FrameSource) {
        let group = source.get_byte(owner, device::DESCRIPTION, description::GROUP);
        let count = source.get_byte(owner, device::DESCRIPTION, description::DEVICE_COUNT);
        let (Some(group), Some(device_count)) = (group, count) else {
            return;
        };

        let current = TrackerGroup { group, device_count };
        if let Some(previous) = self.tracker_groups.insert(owner.to_string(), current) {
            // drop trackers the new descriptor no longer covers
            for device in 1..=previous.device_count {
                if previous.group != current.group || device > current.device_count {
                    self.remove(&previous.tracker_id(device));
                }
            }
        }

        let template = ParticipantTemplate::for_kind(ParticipantKind::Tracker);
        for device in 1..=device_count {
            let tracker_id = current.tracker_id(device);
            let status = source
                .get_byte(owner, device, control::STATUS)
                .map(DeviceStatus::from_byte)
                .unwrap_or(DeviceStatus::Unavailable);

            if status != DeviceStatus::Ready {
                self.remove(&tracker_id);
                continue;
            }

            self.add_participant(&tracker_id);
            let pose = source.get_pose(owner, device, control::POSE);
            if let Some(tracker) = self.get_or_create(&tracker_id, ParticipantKind::Tracker, None, None, &template) {
                if let Some(pose) = pose {
                    tracker.update_head(pose);
                }
            }
        }
    }

    fn update_observer(&mut self, id: &str, source: &dyn FrameSource) {
        let client_id = source
            .get_string(id, device::DESCRIPTION, description::EXTENSION_CLIENT_ID)
            .filter(|s| !s.is_empty());

        if self.observer.as_deref() == Some(id) {
            if let Some(Some(observer)) = self.members.get_mut(id) {
                observer.update_client_id(client_id);
            }
            return;
        }

        if self.displaced.contains(id) {
            return;
        }

        if let Some(previous) = self.observer.take() {
            info!("Observer slot moves from {} to {}", previous, id);
            self.retire(&previous);
            self.displaced.insert(previous);
        }

        self.observer = Some(id.to_string());
        let template = ParticipantTemplate::for_kind(ParticipantKind::Observer);
        self.get_or_create(id, ParticipantKind::Observer, None, client_id, &template);
    }

    /// Destroy the instance for `id` but keep the id known.
    fn retire(&mut self, id: &str) {
        if let Some(slot) = self.members.get_mut(id) {
            if slot.take().is_some() {
                info!("Participant left: {}", id);
                self.events.push(RegistryEvent::Left { id: id.to_string() });
            }
        }
    }
}

/// Hand activity and pose. A missing status field deactivates the hand.
fn read_hand(source: &dyn FrameSource, id: &str, hand: u8) -> (bool, Pose) {
    let ready = source
        .get_byte(id, hand, control::STATUS)
        .map(DeviceStatus::from_byte)
        == Some(DeviceStatus::Ready);

    match source.get_pose(id, hand, control::POSE) {
        Some(pose) if ready => (true, pose),
        _ => (false, Pose::IDENTITY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    use crate::registry::LoopbackChannel;

    fn joined(events: &[RegistryEvent]) -> usize {
        events.iter().filter(|e| matches!(e, RegistryEvent::Joined { .. })).count()
    }

    fn left(events: &[RegistryEvent]) -> usize {
        events.iter().filter(|e| matches!(e, RegistryEvent::Left { .. })).count()
    }

    fn publish_stereo(channel: &mut LoopbackChannel, id: &str) {
        channel.set_byte(id, device::DESCRIPTION, description::TYPE, ParticipantKind::Stereo.as_byte());
        channel.set_pose(id, device::HEAD, control::POSE, Pose::at(0.0, 1.7, 0.0));
    }

    fn publish_trackers(channel: &mut LoopbackChannel, owner: &str, group: u8, ready: &[u8], count: u8) {
        channel.set_byte(owner, device::DESCRIPTION, description::TYPE, ParticipantKind::Tracker.as_byte());
        channel.set_byte(owner, device::DESCRIPTION, description::GROUP, group);
        channel.set_byte(owner, device::DESCRIPTION, description::DEVICE_COUNT, count);
        for device in 1..=count {
            let status = if ready.contains(&device) { DeviceStatus::Ready } else { DeviceStatus::Unavailable };
            channel.set_byte(owner, device, control::STATUS, status as u8);
            channel.set_pose(owner, device, control::POSE, Pose::at(device as f32, 0.0, 0.0));
        }
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut registry = ParticipantRegistry::new();
        registry.add_participant("a");
        registry.add_participant("a");
        assert!(registry.contains("a"));
        assert!(registry.is_empty());
        assert!(registry.take_events().is_empty());
    }

    #[test]
    fn test_get_or_create_joins_once() {
        let mut registry = ParticipantRegistry::new();
        let template = ParticipantTemplate::for_kind(ParticipantKind::Mono);

        assert!(registry.get_or_create("ghost", ParticipantKind::Mono, None, None, &template).is_none());

        registry.add_participant("a");
        registry.get_or_create("a", ParticipantKind::Mono, Some("1".into()), None, &template);
        let again = registry
            .get_or_create("a", ParticipantKind::Stereo, Some("2".into()), None, &template)
            .unwrap();
        assert_eq!(again.kind, ParticipantKind::Mono);
        assert_eq!(again.user_id.as_deref(), Some("1"));

        let events = registry.take_events();
        assert_eq!(events, vec![RegistryEvent::Joined { id: "a".into(), kind: ParticipantKind::Mono }]);
    }

    #[test]
    fn test_remove_unknown_and_uninstantiated() {
        let mut registry = ParticipantRegistry::new();
        assert!(!registry.remove("nobody"));

        registry.add_participant("quiet");
        assert!(registry.remove("quiet"));
        assert!(registry.take_events().is_empty());
    }

    proptest! {
        #[test]
        fn test_join_leave_balance(ops in prop::collection::vec((0u8..3, 0usize..3), 0..60)) {
            let ids = ["a", "b", "c"];
            let template = ParticipantTemplate::for_kind(ParticipantKind::Mono);
            let mut registry = ParticipantRegistry::new();
            let mut live = [false; 3];

            for (op, which) in ops {
                let id = ids[which];
                match op {
                    0 => registry.add_participant(id),
                    1 => { registry.get_or_create(id, ParticipantKind::Mono, None, None, &template); }
                    _ => { registry.remove(id); }
                }

                for event in registry.take_events() {
                    match event {
                        RegistryEvent::Joined { id, .. } => {
                            let i = ids.iter().position(|x| *x == id).unwrap();
                            prop_assert!(!live[i], "double join of {}", id);
                            live[i] = true;
                        }
                        RegistryEvent::Left { id } => {
                            let i = ids.iter().position(|x| *x == id).unwrap();
                            prop_assert!(live[i], "leave without join of {}", id);
                            live[i] = false;
                        }
                    }
                }
            }

            for (i, id) in ids.iter().enumerate() {
                prop_assert_eq!(registry.participant(id).is_some(), live[i]);
            }
        }
    }

    #[test]
    fn test_silent_member_is_skipped() {
        let mut channel = LoopbackChannel::new("local");
        let mut registry = ParticipantRegistry::new();
        registry.member_joined("p1");

        publish_stereo(&mut channel, "p1");
        registry.on_frame_tick(&channel);
        assert_eq!(registry.participant("p1").unwrap().head, Pose::at(0.0, 1.7, 0.0));

        channel.clear_member("p1");
        registry.on_frame_tick(&channel);
        assert!(registry.participant("p1").is_some());
        assert!(registry.contains("p1"));
    }

    #[test]
    fn test_player_hands_follow_status() {
        let mut channel = LoopbackChannel::new("local");
        let mut registry = ParticipantRegistry::new();
        registry.member_joined("p1");

        publish_stereo(&mut channel, "p1");
        channel.set_byte("p1", device::DESCRIPTION, description::USER_ID, 12);
        channel.set_byte("p1", device::LEFT_HAND, control::STATUS, DeviceStatus::Ready as u8);
        channel.set_pose("p1", device::LEFT_HAND, control::POSE, Pose::at(-0.3, 1.0, 0.2));
        channel.set_byte("p1", device::RIGHT_HAND, control::STATUS, DeviceStatus::Ready as u8);
        channel.set_pose("p1", device::RIGHT_HAND, control::POSE, Pose::at(0.3, 1.0, 0.2));
        registry.on_frame_tick(&channel);

        let p = registry.participant("p1").unwrap();
        assert_eq!(p.user_id.as_deref(), Some("12"));
        assert!(p.left_hand.unwrap().active);
        assert_eq!(p.right_hand.unwrap().pose, Pose::at(0.3, 1.0, 0.2));

        // right controller drops off the channel entirely
        channel.clear_field("p1", device::RIGHT_HAND, control::STATUS);
        channel.set_byte("p1", device::LEFT_HAND, control::STATUS, DeviceStatus::Unavailable as u8);
        registry.on_frame_tick(&channel);

        let p = registry.participant("p1").unwrap();
        assert!(!p.left_hand.unwrap().active);
        assert!(!p.right_hand.unwrap().active);
        assert_eq!(p.left_hand.unwrap().pose, Pose::at(-0.3, 1.0, 0.2));
    }

    #[test]
    fn test_mono_player_has_no_hands() {
        let mut channel = LoopbackChannel::new("local");
        let mut registry = ParticipantRegistry::new();
        registry.member_joined("m");

        channel.set_byte("m", device::DESCRIPTION, description::TYPE, ParticipantKind::Mono.as_byte());
        channel.set_pose("m", device::HEAD, control::POSE, Pose::at(1.0, 1.0, 1.0));
        channel.set_byte("m", device::LEFT_HAND, control::STATUS, DeviceStatus::Ready as u8);
        registry.on_frame_tick(&channel);

        let p = registry.participant("m").unwrap();
        assert_eq!(p.kind, ParticipantKind::Mono);
        assert_eq!(p.left_hand, None);
        assert_eq!(p.head, Pose::at(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_tracker_ids() {
        let group = TrackerGroup { group: 1, device_count: 2 };
        assert_eq!(group.tracker_id(2), "tracker-258");
        assert_eq!(group.tracker_ids().collect::<Vec<_>>(), vec!["tracker-257", "tracker-258"]);
    }

    #[test]
    fn test_tracker_status_drives_membership() {
        let mut channel = LoopbackChannel::new("local");
        let mut registry = ParticipantRegistry::new();
        registry.member_joined("rig");

        publish_trackers(&mut channel, "rig", 2, &[1, 3], 3);
        registry.on_frame_tick(&channel);

        assert!(registry.participant("rig").is_none());
        assert_eq!(registry.tracker_group("rig"), Some(TrackerGroup { group: 2, device_count: 3 }));
        assert_eq!(registry.participant("tracker-513").unwrap().head, Pose::at(1.0, 0.0, 0.0));
        assert!(registry.participant("tracker-514").is_none());
        assert_eq!(registry.participant("tracker-515").unwrap().kind, ParticipantKind::Tracker);

        publish_trackers(&mut channel, "rig", 2, &[3], 3);
        registry.on_frame_tick(&channel);
        assert!(!registry.contains("tracker-513"));
        assert!(registry.participant("tracker-515").is_some());
    }

    #[test]
    fn test_owner_leave_cascades_exactly_its_trackers() {
        let mut channel = LoopbackChannel::new("local");
        let mut registry = ParticipantRegistry::new();
        registry.member_joined("rig-a");
        registry.member_joined("rig-b");
        registry.member_joined("p1");

        publish_trackers(&mut channel, "rig-a", 1, &[1, 2, 3, 4], 4);
        publish_trackers(&mut channel, "rig-b", 2, &[1, 2], 2);
        publish_stereo(&mut channel, "p1");
        registry.on_frame_tick(&channel);
        assert_eq!(joined(&registry.take_events()), 7);

        registry.member_left("rig-a");
        let events = registry.take_events();
        assert_eq!(left(&events), 4);
        assert_eq!(joined(&events), 0);
        assert_eq!(registry.len(), 3);
        assert!(registry.participant("tracker-513").is_some());
        assert!(registry.participant("p1").is_some());
        assert_eq!(registry.tracker_group("rig-a"), None);
    }

    #[test]
    fn test_group_shrink_drops_excess_trackers() {
        let mut channel = LoopbackChannel::new("local");
        let mut registry = ParticipantRegistry::new();
        registry.member_joined("rig");

        publish_trackers(&mut channel, "rig", 1, &[1, 2, 3], 3);
        registry.on_frame_tick(&channel);
        registry.take_events();

        publish_trackers(&mut channel, "rig", 1, &[1], 1);
        registry.on_frame_tick(&channel);
        let events = registry.take_events();
        assert_eq!(left(&events), 2);
        assert!(registry.participant("tracker-257").is_some());
    }

    #[test]
    fn test_observer_replacement_leaves_before_join() {
        let mut channel = LoopbackChannel::new("local");
        let mut registry = ParticipantRegistry::new();
        registry.member_joined("obs-1");

        let observer = ParticipantKind::Observer.as_byte();
        channel.set_byte("obs-1", device::DESCRIPTION, description::TYPE, observer);
        channel.set_string("obs-1", device::DESCRIPTION, description::EXTENSION_CLIENT_ID, "c1");
        registry.on_frame_tick(&channel);
        assert_eq!(registry.observer(), Some("obs-1"));
        assert_eq!(registry.participant("obs-1").unwrap().client_id.as_deref(), Some("c1"));

        // same identity only refreshes the client id
        channel.set_string("obs-1", device::DESCRIPTION, description::EXTENSION_CLIENT_ID, "c2");
        registry.on_frame_tick(&channel);
        assert_eq!(registry.take_events().len(), 1);
        assert_eq!(registry.participant("obs-1").unwrap().client_id.as_deref(), Some("c2"));

        channel.clear_member("obs-1");
        registry.member_joined("obs-2");
        channel.set_byte("obs-2", device::DESCRIPTION, description::TYPE, observer);
        registry.on_frame_tick(&channel);

        assert_eq!(
            registry.take_events(),
            vec![
                RegistryEvent::Left { id: "obs-1".into() },
                RegistryEvent::Joined { id: "obs-2".into(), kind: ParticipantKind::Observer },
            ]
        );
        assert_eq!(registry.observer(), Some("obs-2"));
        assert!(registry.contains("obs-1"));
        assert_eq!(registry.participant("obs-2").unwrap().client_id, None);
    }

    #[test]
    fn test_competing_observers_settle() {
        let mut channel = LoopbackChannel::new("local");
        let mut registry = ParticipantRegistry::new();
        registry.member_joined("obs-a");
        registry.member_joined("obs-b");

        let observer = ParticipantKind::Observer.as_byte();
        channel.set_byte("obs-a", device::DESCRIPTION, description::TYPE, observer);
        channel.set_byte("obs-b", device::DESCRIPTION, description::TYPE, observer);

        registry.on_frame_tick(&channel);
        assert_eq!(registry.observer(), Some("obs-b"));
        registry.take_events();

        for _ in 0..3 {
            registry.on_frame_tick(&channel);
            assert!(registry.take_events().is_empty());
            assert_eq!(registry.observer(), Some("obs-b"));
        }
        assert!(registry.participant("obs-a").is_none());

        // once the holder leaves, the displaced member may take over
        registry.member_left("obs-b");
        registry.take_events();
        registry.on_frame_tick(&channel);
        assert_eq!(registry.observer(), Some("obs-a"));
        assert_eq!(
            registry.take_events(),
            vec![RegistryEvent::Joined { id: "obs-a".into(), kind: ParticipantKind::Observer }]
        );
    }

    #[derive(Default)]
    struct UserBytes {
        seen: Vec<(String, Option<u8>)>,
    }

    impl ParticipantData for UserBytes {
        fn read_remote(&mut self, participant: &Participant, source: &dyn FrameSource) {
            let value = source.get_byte(&participant.id, device::USER_DATA, 0);
            self.seen.push((participant.id.clone(), value));
        }
    }

    #[test]
    fn test_player_data_read_after_update() {
        let mut channel = LoopbackChannel::new("local");
        let mut registry = ParticipantRegistry::new();
        registry.member_joined("p1");
        registry.member_joined("rig");
        registry.member_joined("obs");

        publish_stereo(&mut channel, "p1");
        channel.set_byte("p1", device::USER_DATA, 0, 42);
        publish_trackers(&mut channel, "rig", 1, &[1], 1);
        channel.set_byte("obs", device::DESCRIPTION, description::TYPE, ParticipantKind::Observer.as_byte());

        let mut data = UserBytes::default();
        registry.on_frame_tick_with(&channel, &mut data);

        // trackers and observers carry no application data
        assert_eq!(data.seen, vec![("p1".to_string(), Some(42))]);
    }

    #[test]
    fn test_observer_leave_vacates_slot() {
        let mut channel = LoopbackChannel::new("local");
        let mut registry = ParticipantRegistry::new();
        registry.member_joined("obs");
        channel.set_byte("obs", device::DESCRIPTION, description::TYPE, ParticipantKind::Observer.as_byte());
        registry.on_frame_tick(&channel);

        registry.member_left("obs");
        assert_eq!(registry.observer(), None);
        assert_eq!(left(&registry.take_events()), 1);
    }
}
