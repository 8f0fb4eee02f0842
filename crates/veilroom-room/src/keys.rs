//! Public-key distribution among room members.
//!
//! The relay never generates or inspects keys. It only decides, after a
//! membership change, which members should be told which other members'
//! public keys, so that everyone inside a room ends up holding the key of
//! everyone else who announced one.
//!
//! Planning is a pure function over a snapshot of the room, so the hub
//! can compute it under its lock and deliver the resulting envelopes in
//! the same critical section.

use serde::{Deserialize, Serialize};
use veilroom_protocol::{Envelope, PublicKey, SessionId};

/// How keys are exchanged when someone joins a room.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum KeyStrategy {
    /// Exchange only between the newcomer and each existing member:
    /// the newcomer's key goes to everyone else, and every other key
    /// goes to the newcomer.
    #[default]
    Push,
    /// Rebroadcast the full key set: every member receives the key of
    /// every other member. Chattier, but also repairs clients that
    /// dropped an earlier announcement.
    FanOut,
}

/// A room member as seen by the planner.
#[derive(Debug, Clone, Copy)]
pub struct KeyHolder<'a> {
    pub id: SessionId,
    pub identity: &'a str,
    pub public_key: Option<&'a PublicKey>,
}

/// "Tell `recipient` that `owner`'s key is `public_key`."
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyAnnouncement {
    pub recipient: SessionId,
    pub owner: String,
    pub public_key: PublicKey,
}

impl KeyAnnouncement {
    fn new(recipient: SessionId, owner: &KeyHolder<'_>, key: &PublicKey) -> Self {
        Self {
            recipient,
            owner: owner.identity.to_string(),
            public_key: key.clone(),
        }
    }

    /// Converts into the `key_update` envelope for the recipient.
    pub fn into_envelope(self) -> (SessionId, Envelope) {
        (self.recipient, Envelope::key_update(self.owner, self.public_key))
    }
}

/// Plans the key announcements after `subject` joined a room whose
/// current members (including `subject`) are `members`.
///
/// Nobody is ever sent their own key, and members without a key are
/// simply skipped as owners. A room of one produces nothing.
pub fn plan(
    strategy: KeyStrategy,
    subject: SessionId,
    members: &[KeyHolder<'_>],
) -> Vec<KeyAnnouncement> {
    match strategy {
        KeyStrategy::Push => plan_push(subject, members),
        KeyStrategy::FanOut => plan_fan_out(members),
    }
}

fn plan_push(subject: SessionId, members: &[KeyHolder<'_>]) -> Vec<KeyAnnouncement> {
    let Some(newcomer) = members.iter().find(|m| m.id == subject) else {
        return Vec::new();
    };
    let others = members.iter().filter(|m| m.id != subject);

    let mut out = Vec::new();
    if let Some(key) = newcomer.public_key {
        out.extend(others.clone().map(|m| KeyAnnouncement::new(m.id, newcomer, key)));
    }
    out.extend(others.filter_map(|m| {
        m.public_key
            .map(|key| KeyAnnouncement::new(subject, m, key))
    }));
    out
}

fn plan_fan_out(members: &[KeyHolder<'_>]) -> Vec<KeyAnnouncement> {
    members
        .iter()
        .flat_map(move |recipient| {
            members
                .iter()
                .filter(move |owner| owner.id != recipient.id)
                .filter_map(move |owner| {
                    owner
                        .public_key
                        .map(|key| KeyAnnouncement::new(recipient.id, owner, key))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, BTreeSet};

    use super::*;

    fn key(s: &str) -> PublicKey {
        PublicKey::from(s)
    }

    /// Replays a sequence of joins and returns, per recipient, the set of
    /// owners whose key it was told.
    fn replay(
        strategy: KeyStrategy,
        roster: &[(u64, &str, Option<PublicKey>)],
    ) -> BTreeMap<SessionId, BTreeSet<String>> {
        let mut received: BTreeMap<SessionId, BTreeSet<String>> = BTreeMap::new();
        for joined in 1..=roster.len() {
            let members: Vec<KeyHolder<'_>> = roster[..joined]
                .iter()
                .map(|(id, name, pk)| KeyHolder {
                    id: SessionId(*id),
                    identity: name,
                    public_key: pk.as_ref(),
                })
                .collect();
            let subject = members[joined - 1].id;
            for a in plan(strategy, subject, &members) {
                received.entry(a.recipient).or_default().insert(a.owner);
            }
        }
        received
    }

    fn owners(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_plan_single_member_is_empty() {
        let pk = key("QQ==");
        let members = [KeyHolder {
            id: SessionId(1),
            identity: "alice",
            public_key: Some(&pk),
        }];
        assert!(plan(KeyStrategy::Push, SessionId(1), &members).is_empty());
        assert!(plan(KeyStrategy::FanOut, SessionId(1), &members).is_empty());
    }

    #[test]
    fn test_plan_push_exchanges_both_ways() {
        let (ka, kb) = (key("QQ=="), key("Qg=="));
        let members = [
            KeyHolder { id: SessionId(1), identity: "alice", public_key: Some(&ka) },
            KeyHolder { id: SessionId(2), identity: "bob", public_key: Some(&kb) },
        ];

        let announcements = plan(KeyStrategy::Push, SessionId(2), &members);
        assert_eq!(
            announcements,
            vec![
                KeyAnnouncement { recipient: SessionId(1), owner: "bob".into(), public_key: kb },
                KeyAnnouncement { recipient: SessionId(2), owner: "alice".into(), public_key: ka },
            ]
        );
    }

    #[test]
    fn test_plan_push_skips_keyless_members() {
        let ka = key("QQ==");
        let members = [
            KeyHolder { id: SessionId(1), identity: "alice", public_key: Some(&ka) },
            KeyHolder { id: SessionId(2), identity: "bob", public_key: None },
        ];

        let announcements = plan(KeyStrategy::Push, SessionId(2), &members);
        // Bob still learns Alice's key; nobody learns a key Bob never sent.
        assert_eq!(announcements.len(), 1);
        assert_eq!(announcements[0].recipient, SessionId(2));
        assert_eq!(announcements[0].owner, "alice");
    }

    #[test]
    fn test_plan_never_announces_own_key() {
        let roster = [
            (1, "alice", Some(key("QQ=="))),
            (2, "bob", Some(key("Qg=="))),
            (3, "carol", Some(key("Qw=="))),
        ];
        for strategy in [KeyStrategy::Push, KeyStrategy::FanOut] {
            let members: Vec<KeyHolder<'_>> = roster
                .iter()
                .map(|(id, name, pk)| KeyHolder {
                    id: SessionId(*id),
                    identity: name,
                    public_key: pk.as_ref(),
                })
                .collect();
            for a in plan(strategy, SessionId(3), &members) {
                let owner_id = roster
                    .iter()
                    .find(|(_, name, _)| *name == a.owner)
                    .map(|(id, _, _)| SessionId(*id))
                    .unwrap();
                assert_ne!(owner_id, a.recipient, "{strategy:?}");
            }
        }
    }

    #[test]
    fn test_both_strategies_converge_to_full_key_set() {
        let roster = [
            (1, "alice", Some(key("QQ=="))),
            (2, "bob", Some(key("Qg=="))),
            (3, "carol", Some(key("Qw=="))),
        ];
        for strategy in [KeyStrategy::Push, KeyStrategy::FanOut] {
            let received = replay(strategy, &roster);
            assert_eq!(received[&SessionId(1)], owners(&["bob", "carol"]), "{strategy:?}");
            assert_eq!(received[&SessionId(2)], owners(&["alice", "carol"]), "{strategy:?}");
            assert_eq!(received[&SessionId(3)], owners(&["alice", "bob"]), "{strategy:?}");
        }
    }

    #[test]
    fn test_fan_out_resends_existing_pairs() {
        let (ka, kb, kc) = (key("QQ=="), key("Qg=="), key("Qw=="));
        let members = [
            KeyHolder { id: SessionId(1), identity: "alice", public_key: Some(&ka) },
            KeyHolder { id: SessionId(2), identity: "bob", public_key: Some(&kb) },
            KeyHolder { id: SessionId(3), identity: "carol", public_key: Some(&kc) },
        ];

        let announcements = plan(KeyStrategy::FanOut, SessionId(3), &members);
        // 3 members × 2 peers each, including alice ↔ bob again.
        assert_eq!(announcements.len(), 6);
        assert!(announcements.iter().any(|a| a.recipient == SessionId(1) && a.owner == "bob"));
    }

    #[test]
    fn test_strategy_config_names() {
        let s: KeyStrategy = serde_json::from_str("\"fan-out\"").unwrap();
        assert_eq!(s, KeyStrategy::FanOut);
        assert_eq!(KeyStrategy::default(), KeyStrategy::Push);
    }

    #[test]
    fn test_announcement_into_envelope() {
        let a = KeyAnnouncement {
            recipient: SessionId(4),
            owner: "dave".into(),
            public_key: key("RA=="),
        };
        let (to, env) = a.into_envelope();
        assert_eq!(to, SessionId(4));
        assert_eq!(env, Envelope::key_update("dave", key("RA==")));
    }
}
