//! End-to-end tests over real TCP connections: the registration handshake,
//! message routing, presence notifications, and disconnect cleanup.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use netchat_protocol::{Channel, Message, TransportError};
use netchat_server::{ChatServer, MemoryUserStore, Registry, ServerConfig, UserStore};

const RECV_TIMEOUT: Duration = Duration::from_secs(2);
const SILENCE: Duration = Duration::from_millis(200);

async fn start_server_with_store(store: Arc<dyn UserStore>) -> (SocketAddr, Arc<Registry>) {
    let config = ServerConfig::new("127.0.0.1:0".parse().unwrap());
    let server = ChatServer::bind(config, store).await.unwrap();
    let addr = server.local_addr().unwrap();
    let registry = server.registry();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (addr, registry)
}

async fn start_server() -> (SocketAddr, Arc<Registry>) {
    start_server_with_store(Arc::new(MemoryUserStore::new())).await
}

async fn recv(channel: &Channel) -> Message {
    timeout(RECV_TIMEOUT, channel.receive())
        .await
        .expect("timed out waiting for a message")
        .expect("receive failed")
}

async fn assert_silent(channel: &Channel) {
    let result = timeout(SILENCE, channel.receive()).await;
    assert!(result.is_err(), "expected silence, got {result:?}");
}

/// Connects and completes the handshake, returning the active channel and
/// the roster the server handed back.
async fn join(addr: SocketAddr, name: &str) -> (Channel, Vec<String>) {
    let channel = Channel::connect(addr).await.unwrap();
    assert_eq!(recv(&channel).await, Message::NameRequest);
    channel.send(&Message::user_name(name)).await.unwrap();
    match recv(&channel).await {
        Message::NameAccepted { users } => (channel, users),
        other => panic!("expected name_accepted, got {other:?}"),
    }
}

#[tokio::test]
async fn first_user_sees_itself_in_roster() {
    let (addr, registry) = start_server().await;

    let (_alice, roster) = join(addr, "alice").await;
    assert_eq!(roster, ["alice"]);
    assert_eq!(registry.snapshot().await, ["alice"]);
}

#[tokio::test]
async fn second_user_sees_join_order_and_first_hears_about_it() {
    let (addr, _registry) = start_server().await;

    let (alice, _) = join(addr, "alice").await;
    let (_bob, roster) = join(addr, "bob").await;

    assert_eq!(roster, ["alice", "bob"]);
    assert_eq!(recv(&alice).await, Message::user_added("bob"));
    assert_silent(&alice).await;
}

#[tokio::test]
async fn duplicate_name_is_refused_and_not_registered() {
    let (addr, registry) = start_server().await;

    let (_alice, _) = join(addr, "alice").await;

    let intruder = Channel::connect(addr).await.unwrap();
    assert_eq!(recv(&intruder).await, Message::NameRequest);
    intruder.send(&Message::user_name("alice")).await.unwrap();
    assert_eq!(recv(&intruder).await, Message::NameUsed);

    assert_eq!(registry.len().await, 1);

    // The server closes the refused connection.
    assert!(matches!(
        timeout(RECV_TIMEOUT, intruder.receive()).await.unwrap(),
        Err(TransportError::Disconnected)
    ));
}

#[tokio::test]
async fn reserved_name_is_refused_even_when_owner_is_offline() {
    let store = Arc::new(MemoryUserStore::with_reserved(vec!["admin".into()]));
    let (addr, registry) = start_server_with_store(store).await;

    let channel = Channel::connect(addr).await.unwrap();
    assert_eq!(recv(&channel).await, Message::NameRequest);
    channel.send(&Message::user_name("admin")).await.unwrap();
    assert_eq!(recv(&channel).await, Message::NameUsed);
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn blank_name_is_refused() {
    let (addr, registry) = start_server().await;

    let channel = Channel::connect(addr).await.unwrap();
    assert_eq!(recv(&channel).await, Message::NameRequest);
    channel.send(&Message::user_name("   ")).await.unwrap();
    assert_eq!(recv(&channel).await, Message::NameUsed);
    assert!(registry.is_empty().await);
}

#[tokio::test]
async fn text_broadcast_reaches_everyone_but_the_sender() {
    let (addr, _registry) = start_server().await;

    let (alice, _) = join(addr, "alice").await;
    let (bob, _) = join(addr, "bob").await;
    let (carol, _) = join(addr, "carol").await;
    assert_eq!(recv(&alice).await, Message::user_added("bob"));
    assert_eq!(recv(&alice).await, Message::user_added("carol"));
    assert_eq!(recv(&bob).await, Message::user_added("carol"));

    alice.send(&Message::text("hi")).await.unwrap();

    assert_eq!(recv(&bob).await, Message::text("hi"));
    assert_eq!(recv(&carol).await, Message::text("hi"));
    assert_silent(&alice).await;
}

#[tokio::test]
async fn private_message_reaches_only_its_recipient() {
    let (addr, _registry) = start_server().await;

    let (alice, _) = join(addr, "alice").await;
    let (bob, _) = join(addr, "bob").await;
    let (carol, _) = join(addr, "carol").await;
    assert_eq!(recv(&alice).await, Message::user_added("bob"));
    assert_eq!(recv(&alice).await, Message::user_added("carol"));
    assert_eq!(recv(&bob).await, Message::user_added("carol"));

    alice
        .send(&Message::private_text("secret", "bob"))
        .await
        .unwrap();

    // The server fills in the sender before forwarding.
    assert_eq!(
        recv(&bob).await,
        Message::private_from("secret", "bob", "alice")
    );
    assert_silent(&carol).await;
    assert_silent(&alice).await;
}

#[tokio::test]
async fn private_message_to_unknown_recipient_is_dropped_silently() {
    let (addr, _registry) = start_server().await;

    let (alice, _) = join(addr, "alice").await;
    let (bob, _) = join(addr, "bob").await;
    assert_eq!(recv(&alice).await, Message::user_added("bob"));

    alice
        .send(&Message::private_text("anyone there?", "nobody"))
        .await
        .unwrap();
    assert_silent(&alice).await;
    assert_silent(&bob).await;

    // The session is still healthy afterwards.
    alice.send(&Message::text("after")).await.unwrap();
    assert_eq!(recv(&bob).await, Message::text("after"));
}

#[tokio::test]
async fn orderly_disable_announces_departure_once() {
    let (addr, registry) = start_server().await;

    let (alice, _) = join(addr, "alice").await;
    let (bob, _) = join(addr, "bob").await;
    assert_eq!(recv(&alice).await, Message::user_added("bob"));

    alice.send(&Message::Disable).await.unwrap();

    assert_eq!(recv(&bob).await, Message::user_removed("alice"));
    assert_silent(&bob).await;
    assert!(registry.lookup("alice").await.is_none());

    // The name is free again.
    let (_alice2, roster) = join(addr, "alice").await;
    assert_eq!(roster, ["bob", "alice"]);
}

#[tokio::test]
async fn connection_loss_announces_departure_once() {
    let (addr, registry) = start_server().await;

    let (alice, _) = join(addr, "alice").await;
    let (bob, _) = join(addr, "bob").await;
    assert_eq!(recv(&alice).await, Message::user_added("bob"));

    // Alice vanishes without a disable message.
    alice.close().await;
    drop(alice);

    assert_eq!(recv(&bob).await, Message::user_removed("alice"));
    assert_silent(&bob).await;
    assert!(registry.lookup("alice").await.is_none());
}

#[tokio::test]
async fn rename_is_announced_to_everyone_and_rebinds_routing() {
    let (addr, registry) = start_server().await;

    let (alice, _) = join(addr, "alice").await;
    let (bob, _) = join(addr, "bob").await;
    assert_eq!(recv(&alice).await, Message::user_added("bob"));

    alice
        .send(&Message::name_changed("alice", "alicia"))
        .await
        .unwrap();

    // The announcement goes to everyone, initiator included.
    assert_eq!(recv(&alice).await, Message::name_changed("alice", "alicia"));
    assert_eq!(recv(&bob).await, Message::name_changed("alice", "alicia"));

    assert!(registry.lookup("alice").await.is_none());
    assert!(registry.lookup("alicia").await.is_some());

    // Private routing follows the new name.
    bob.send(&Message::private_text("hi", "alicia")).await.unwrap();
    assert_eq!(
        recv(&alice).await,
        Message::private_from("hi", "alicia", "bob")
    );
}

#[tokio::test]
async fn rename_collision_is_reported_to_initiator_only() {
    let (addr, registry) = start_server().await;

    let (alice, _) = join(addr, "alice").await;
    let (bob, _) = join(addr, "bob").await;
    assert_eq!(recv(&alice).await, Message::user_added("bob"));

    bob.send(&Message::name_changed("bob", "alice")).await.unwrap();

    assert_eq!(recv(&bob).await, Message::NameUsed);
    assert_silent(&alice).await;
    assert!(registry.lookup("bob").await.is_some());
    assert!(registry.lookup("alice").await.is_some());

    // Bob's session survives the refusal.
    bob.send(&Message::text("still here")).await.unwrap();
    assert_eq!(recv(&alice).await, Message::text("still here"));
}

#[tokio::test]
async fn rename_with_stale_name_is_refused() {
    let (addr, registry) = start_server().await;

    let (alice, _) = join(addr, "alice").await;

    alice
        .send(&Message::name_changed("someone-else", "hijack"))
        .await
        .unwrap();
    assert_eq!(recv(&alice).await, Message::NameUsed);
    assert!(registry.lookup("alice").await.is_some());
    assert!(registry.lookup("hijack").await.is_none());
}

#[tokio::test]
async fn rename_onto_reserved_name_is_refused() {
    let store = Arc::new(MemoryUserStore::with_reserved(vec!["alice".into()]));
    let (addr, registry) = start_server_with_store(store.clone()).await;

    // "alice" is reserved, so join under a different name.
    let (channel, _) = join(addr, "ally").await;

    // Renaming onto the store-reserved name is refused by the collaborator.
    channel
        .send(&Message::name_changed("ally", "alice"))
        .await
        .unwrap();
    assert_eq!(recv(&channel).await, Message::NameUsed);
    assert!(store.lookup_nickname("alice").await.unwrap().is_some());
    assert!(registry.lookup("ally").await.is_some());

    // A rename to an unreserved name still works afterwards.
    channel
        .send(&Message::name_changed("ally", "allison"))
        .await
        .unwrap();
    assert_eq!(
        recv(&channel).await,
        Message::name_changed("ally", "allison")
    );
    assert!(registry.lookup("allison").await.is_some());
}
