mod common;

use crate::common::*;
use chat_friends_lib::libs::config::ClientConfig;
use chat_friends_lib::libs::core::models::{RelationshipStatus, UserId};
use chat_friends_lib::libs::ffi::models::{PeerRelationship, RelationshipState};
use chat_friends_lib::libs::ffi::RelationshipListener;
use chat_friends_lib::libs::storage::database::storage_traits::Storage;
use chat_friends_lib::libs::storage::records::{RelationshipEntry, RelationshipRecord};
use chat_friends_lib::{ClientError, FriendClient};
use chrono::Utc;
use std::time::Duration;
use tempfile::TempDir;

struct ForwardingListener {
    changes: flume::Sender<Vec<PeerRelationship>>,
}

impl RelationshipListener for ForwardingListener {
    fn on_relationships_changed(&self, relationships: Vec<PeerRelationship>) {
        let _ = self.changes.send(relationships);
    }
}

fn client(dir: &TempDir) -> FriendClient {
    FriendClient::with_config(config_for(dir)).expect("Failed to open client")
}

fn register(client: &FriendClient, name: &str) -> String {
    client
        .register(name.to_string(), format!("{}@example.com", name.to_lowercase()), None)
        .expect("Failed to register")
        .user_id
}

#[test]
fn operations_require_sign_in() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir);
    let bob = register(&client, "Bob");

    assert!(matches!(client.send_request(bob), Err(ClientError::NotSignedIn)));
    assert!(matches!(client.friends(), Err(ClientError::NotSignedIn)));
    assert!(client.current_user().is_none());
}

#[test]
fn sign_in_tracks_presence() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir);
    let alice = register(&client, "Alice");

    let profile = client.sign_in(alice.clone()).unwrap();
    assert!(profile.is_online);
    assert!(profile.last_seen_ms.is_some());
    assert_eq!(client.current_user().unwrap().user_id, alice);

    client.sign_out().unwrap();
    assert!(client.current_user().is_none());

    client.sign_in(alice.clone()).unwrap();
    client.set_online(false).unwrap();
    assert!(!client.current_user().unwrap().is_online);
}

#[test]
fn sign_in_rejects_unknown_and_blank_ids() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir);

    assert!(matches!(
        client.sign_in("nobody".to_string()),
        Err(ClientError::UnknownUser(_))
    ));
    assert!(matches!(
        client.sign_in("  ".to_string()),
        Err(ClientError::InvalidArgument(_))
    ));
    assert!(matches!(
        client.register(" ".to_string(), "x@example.com".to_string(), None),
        Err(ClientError::InvalidArgument(_))
    ));
}

#[test]
fn friendship_flow_between_two_devices() {
    let dir = TempDir::new().unwrap();
    let alice_device = client(&dir);
    let bob_device = client(&dir);
    let alice = register(&alice_device, "Alice");
    let bob = register(&bob_device, "Bob");
    alice_device.sign_in(alice.clone()).unwrap();
    bob_device.sign_in(bob.clone()).unwrap();

    assert!(alice_device.send_request(bob.clone()).unwrap());
    assert!(!alice_device.send_request(bob.clone()).unwrap());
    assert_eq!(
        alice_device.relationship_with(bob.clone()).unwrap(),
        Some(RelationshipState::Pending)
    );

    let outgoing = alice_device.outgoing_requests().unwrap();
    assert_eq!(outgoing.len(), 1);
    assert_eq!(outgoing[0].profile.user_id, bob);

    let incoming = bob_device.incoming_requests().unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].profile.display_name, "Alice");
    assert_eq!(incoming[0].relationship, Some(RelationshipState::Requested));

    assert!(bob_device.accept_request(alice.clone()).unwrap());
    let friends = alice_device.friends().unwrap();
    assert_eq!(friends.len(), 1);
    assert_eq!(friends[0].profile.user_id, bob);
    assert_eq!(friends[0].presence, "online");

    assert!(alice_device.block(bob.clone()).unwrap());
    assert_eq!(alice_device.blocked().unwrap().len(), 1);
    assert!(alice_device.friends().unwrap().is_empty());
    assert_eq!(bob_device.friends().unwrap().len(), 1);

    assert!(alice_device.unblock(bob.clone()).unwrap());
    assert!(alice_device.cancel_or_reject(bob.clone()).unwrap());
    assert!(bob_device.friends().unwrap().is_empty());
}

#[test]
fn self_request_is_reported() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir);
    let alice = register(&client, "Alice");
    client.sign_in(alice.clone()).unwrap();

    assert!(matches!(
        client.send_request(alice),
        Err(ClientError::Relationship(_))
    ));
}

#[test]
fn suggestions_and_search() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir);
    let alice = register(&client, "Alice");
    let alina = register(&client, "Alina");
    let bob = register(&client, "Bob");
    register(&client, "Carl");
    client.sign_in(alice).unwrap();

    client.send_request(alina.clone()).unwrap();
    client.block(bob).unwrap();

    let suggestions = client.suggestions().unwrap();
    let names: Vec<&str> = suggestions
        .iter()
        .map(|peer| peer.profile.display_name.as_str())
        .collect();
    assert_eq!(names, vec!["Alina", "Carl"]);
    assert_eq!(suggestions[0].relationship, Some(RelationshipState::Pending));
    assert_eq!(suggestions[1].presence, "offline");

    let found = client.search_users("Al".to_string()).unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].profile.user_id, alina);
    assert!(client.search_users("".to_string()).unwrap().is_empty());
}

#[test]
fn dedupe_on_open_cleans_existing_records() {
    let db = TestDb::new();
    let alice = db.user("alice", "Alice");
    let bob = db.user("bob", "Bob");
    let now = Utc::now();
    db.store
        .with_transaction(|tx| {
            tx.store_relationships(&RelationshipRecord {
                owner_id: alice.clone(),
                entries: vec![
                    RelationshipEntry::new(bob.clone(), RelationshipStatus::Accepted, now),
                    RelationshipEntry::new(bob.clone(), RelationshipStatus::Accepted, now),
                ],
            })
        })
        .unwrap();

    let config = ClientConfig {
        dedupe_on_open: true,
        ..ClientConfig::new(db.path())
    };
    let client = FriendClient::with_config(config).unwrap();

    let record = client.manager().record(&UserId::from("alice")).unwrap();
    assert_eq!(record.entries.len(), 1);

    let summary = client.deduplicate_all().unwrap();
    assert_eq!(summary.entries_removed, 0);
    assert_eq!(summary.records_scanned, 1);
}

#[test]
fn listener_hears_changes_made_on_another_device() {
    let dir = TempDir::new().unwrap();
    let alice_device = client(&dir);
    let bob_device = client(&dir);
    let alice = register(&alice_device, "Alice");
    let bob = register(&bob_device, "Bob");
    alice_device.sign_in(alice.clone()).unwrap();
    bob_device.sign_in(bob.clone()).unwrap();

    let (changes, received) = flume::unbounded();
    let watch = bob_device
        .watch_relationships(Box::new(ForwardingListener { changes }))
        .unwrap();

    alice_device.send_request(bob.clone()).unwrap();
    let update = received.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(
        update,
        vec![PeerRelationship {
            peer_id: alice.clone(),
            relationship: RelationshipState::Requested,
        }]
    );

    watch.cancel();
}

#[test]
fn watching_requires_sign_in() {
    let dir = TempDir::new().unwrap();
    let client = client(&dir);
    let (changes, _received) = flume::unbounded();

    assert!(matches!(
        client.watch_relationships(Box::new(ForwardingListener { changes })),
        Err(ClientError::NotSignedIn)
    ));
}
