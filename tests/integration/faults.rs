//! Fault injection: lost packets, undecodable content, and the
//! settings-only refresh path.

use mantle_core::SyncMessage;

use crate::{test_blob, TestNet};

#[test]
fn lost_packet_stalls_the_transfer_without_side_effects() {
    let mut net = TestNet::new();
    net.set_chunk_size(1024);
    let server = net.add_server("Server");
    let alice = net.add_client("Alice", server);
    let _bob = net.add_client("Bob", server);

    net.host_mut(alice)
        .controller
        .register_local("Alice", test_blob(4096))
        .unwrap();

    // lose the second content packet; nobody retries, nobody crashes
    net.drop_when(|e| matches!(&e.msg, SyncMessage::DataPacket { index: 1, payload, .. } if !payload.is_empty()));

    let announce = net.host_mut(alice).controller.announce_now();
    net.send_from(alice, announce);
    net.run_until_idle();

    assert!(net.host(server).controller.registry().get("Alice").is_none());
    assert_eq!(net.host(server).controller.active_transfers(), 1);
    assert!(net.host(server).backend.installed_names().is_empty());
}

#[test]
fn undecodable_content_is_dropped_and_never_relayed() {
    let mut net = TestNet::new();
    let server = net.add_server("Server");
    let alice = net.add_client("Alice", server);
    let bob = net.add_client("Bob", server);

    net.host_mut(alice)
        .controller
        .register_local("Alice", test_blob(4096))
        .unwrap();
    net.host(server)
        .backend
        .fail_import
        .store(true, std::sync::atomic::Ordering::Relaxed);

    let announce = net.host_mut(alice).controller.announce_now();
    net.send_from(alice, announce);
    net.run_until_idle();

    // the relay rejected the bytes: no asset, no fan-out to the peer
    assert!(net.host(server).controller.registry().get("Alice").is_none());
    let relayed = net.delivered_count(|e| {
        e.from == server && e.to == bob && matches!(&e.msg, SyncMessage::Hashes { .. })
    });
    assert_eq!(relayed, 0);
    assert!(net.host(bob).backend.installed_names().is_empty());
}

#[test]
fn settings_change_refreshes_without_moving_content() {
    let mut net = TestNet::new();
    let server = net.add_server("Server");
    let alice = net.add_client("Alice", server);
    let bob = net.add_client("Bob", server);

    net.host_mut(alice)
        .controller
        .register_local("Alice", test_blob(4096))
        .unwrap();
    let announce = net.host_mut(alice).controller.announce_now();
    net.send_from(alice, announce);
    net.run_until_idle();
    let installs_after_sync = net.host(bob).backend.installed_names().len();
    let content_mark = net.delivered.len();

    // Alice edits her settings and re-announces
    {
        let ctl = &mut net.host_mut(alice).controller;
        ctl.settings().apply_raw("Alice", "model_scale=1.6");
        let digest = ctl.settings().digest_of("Alice");
        ctl.registry().set_settings_hash("Alice", digest);
    }
    let announce = net.host_mut(alice).controller.announce_now();
    net.send_from(alice, announce);
    net.run_until_idle();

    // settings propagated to both hops
    for peer in [server, bob] {
        assert_eq!(
            net.host(peer)
                .controller
                .settings()
                .get("Alice")
                .unwrap()
                .model_scale,
            1.6
        );
    }

    // no content moved and the visual was not reimported
    let content_packets = net.delivered[content_mark..]
        .iter()
        .filter(|e| matches!(&e.msg, SyncMessage::DataPacket { .. }))
        .count();
    assert_eq!(content_packets, 0);
    assert_eq!(net.host(bob).backend.installed_names().len(), installs_after_sync);
}
