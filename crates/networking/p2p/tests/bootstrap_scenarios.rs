//! End-to-end bootstrap scenarios against in-process peers.

mod common;

use common::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use strand_blockchain::{BlockProcessor, BlockSource, BlockStatus, Ledger};
use strand_common::{Account, Block};
use strand_p2p::messages::{AckPayload, AscPullAck};
use strand_p2p::{BootstrapServer, BootstrapService, Network};
use strand_storage::Store;

fn ledger_with_genesis(genesis: &Block) -> Ledger {
    let ledger = Ledger::new(Store::new());
    ledger.insert_genesis(genesis).unwrap();
    ledger
}

/// A peer holds a short chain the local node lacks entirely; the service
/// pulls it and the local head catches up.
#[test]
fn activates_and_syncs_short_chain() {
    let genesis = test_genesis();
    let (remote, chain) = remote_with_chain(&genesis, 6);
    let node = TestNode::start(test_config(), &genesis);
    connect_peer(&node, remote, None);

    let target = chain.last().unwrap().hash();
    let synced = wait_until(Duration::from_secs(15), || {
        node.ledger
            .account_info(&genesis.account)
            .map(|info| info.head == target)
            .unwrap_or(false)
    });
    node.stop();
    assert!(synced, "local head never reached the remote frontier");
    assert_eq!(node.ledger.block_count(), 7);
    assert!(node.service.metrics().blocks_received >= 6);
}

/// A long chain with a confirmed local prefix; the pull starts from the
/// local head and the account's priority rises while blocks land.
#[test]
fn catches_up_from_confirmed_prefix() {
    let genesis = test_genesis();
    let (remote, chain) = remote_with_chain(&genesis, 63);
    let node = TestNode::start(test_config(), &genesis);
    // Locally the first 11 blocks exist and are confirmed
    for block in &chain[1..11] {
        assert_eq!(node.processor.process_blocking(block), BlockStatus::Progress);
    }
    node.ledger.confirm_up_to(&genesis.account, 11).unwrap();
    connect_peer(&node, remote, None);

    let target = chain.last().unwrap().hash();
    let initial = test_config().account_sets.priority_initial;
    let mut priority_rose = false;
    let synced = wait_until(Duration::from_secs(15), || {
        if node
            .service
            .priority_of(&genesis.account)
            .map(|priority| priority > initial)
            .unwrap_or(false)
        {
            priority_rose = true;
        }
        node.ledger.block_exists(&target)
    });
    node.stop();
    assert!(synced, "remote frontier block never arrived");
    assert!(priority_rose, "account priority never increased");
}

/// A pulled block references an unknown source: the account parks in the
/// blocking set, the dependency walker resolves the owning account, and
/// the chain drains through.
#[test]
fn gap_source_blocks_then_dependency_walker_unblocks() {
    let genesis = test_genesis();
    let receiver = Account::from_low_u64_be(0x5eed);
    // Remote: genesis -> send to receiver -> receiver's open block
    let (remote_ledger, chain) = remote_with_chain(&genesis, 0);
    let send;
    let open;
    {
        let processor = BlockProcessor::new(remote_ledger.clone());
        send = send_block(&chain[0], receiver, 100);
        assert_eq!(processor.process_blocking(&send), BlockStatus::Progress);
        open = open_block(receiver, &send, 100);
        assert_eq!(processor.process_blocking(&open), BlockStatus::Progress);
    }

    let node = TestNode::start(test_config(), &genesis);
    connect_peer(&node, remote_ledger, None);

    // The open block arrives ahead of its source
    node.processor.add(open.clone(), BlockSource::Bootstrap);
    let blocked = wait_until(Duration::from_secs(5), || node.service.blocked(&receiver));
    assert!(blocked, "receiver never entered the blocking set");

    // account_info_by_hash names the sender; the send lands and unblocks
    // the receiver, whose chain then completes
    let synced = wait_until(Duration::from_secs(15), || {
        node.ledger.block_exists(&send.hash())
            && node
                .ledger
                .account_info(&receiver)
                .map(|info| info.head == open.hash())
                .unwrap_or(false)
    });
    let unblocked = wait_until(Duration::from_secs(5), || !node.service.blocked(&receiver));
    node.stop();
    assert!(synced, "dependency chain never drained");
    assert!(unblocked, "receiver stayed blocked");
}

/// The peer serves discontinuous chains; every multi-block response is
/// classified invalid and nothing reaches the ledger.
#[test]
fn discontinuous_response_is_rejected() {
    let genesis = test_genesis();
    let (remote, _chain) = remote_with_chain(&genesis, 6);
    let node = TestNode::start(test_config(), &genesis);

    let server = BootstrapServer::new(remote);
    connect_peer(
        &node,
        node.ledger.clone(), // ignored by the tampering responder
        Some(Box::new(move |request| {
            let mut ack = server.respond(request);
            if let AckPayload::Blocks(payload) = &mut ack.payload {
                // Break the predecessor chain while keeping a valid first
                // block
                if payload.blocks.len() >= 3 {
                    payload.blocks.remove(1);
                } else if payload.blocks.len() == 2 {
                    payload.blocks.swap(0, 1);
                }
            }
            Some(ack)
        })),
    );

    let rejected = wait_until(Duration::from_secs(15), || {
        node.service.metrics().invalid_responses >= 1
    });
    node.stop();
    assert!(rejected, "tampered response was never classified invalid");
    // Nothing was enqueued: the local ledger still only has genesis
    assert_eq!(node.ledger.block_count(), 1);
}

/// The peer swallows requests; tags expire at their cutoff and the tag
/// table drains once the channel goes quiet.
#[test]
fn unanswered_requests_time_out() {
    let genesis = test_genesis();
    let mut config = test_config();
    config.request_timeout = Duration::from_millis(300);
    let node = TestNode::start(config, &genesis);
    let channel = connect_peer(&node, node.ledger.clone(), Some(Box::new(|_| None)));

    let timed_out = wait_until(Duration::from_secs(10), || {
        node.service.metrics().timeouts >= 1
    });
    assert!(timed_out, "no tag ever expired");

    // With the channel gone no new pulls start, so expiry empties the table
    channel.close();
    let drained = wait_until(Duration::from_secs(10), || {
        node.service.container_info().tags == 0
    });
    node.stop();
    assert!(drained, "expired tags were not evicted");
}

/// While the block processor queue sits above the high-water mark, not a
/// single request leaves the node; once it drains, pulling resumes.
#[test]
fn backpressure_suspends_requests() {
    let genesis = test_genesis();
    let mut config = test_config();
    config.block_processor_threshold = 1;
    let (remote, _) = remote_with_chain(&genesis, 4);

    // Hand-assembled node: the processor is deliberately not started, so
    // whatever is queued stays queued
    let local = ledger_with_genesis(&genesis);
    let processor = BlockProcessor::new(local.clone());
    let network = Network::new();
    let service = BootstrapService::new(
        config,
        local.clone(),
        Arc::clone(&processor),
        network.clone(),
    );
    service.start();
    let node = TestNode {
        ledger: local,
        processor,
        network,
        service,
    };
    let channel = connect_peer(&node, remote, None);

    // Two stuck blocks hold the queue above the threshold
    let filler = send_block(&genesis, Account::from_low_u64_be(1), 1);
    node.processor.add(filler.clone(), BlockSource::Live);
    node.processor.add(filler, BlockSource::Live);

    std::thread::sleep(Duration::from_secs(3));
    assert_eq!(
        channel.sent_requests.load(Ordering::SeqCst),
        0,
        "request sent despite backpressure"
    );

    // Draining the queue lifts the suspension
    node.processor.start();
    let resumed = wait_until(Duration::from_secs(10), || {
        channel.sent_requests.load(Ordering::SeqCst) > 0
    });
    node.stop();
    assert!(resumed, "requests never resumed after the queue drained");
}

/// An acknowledgement with no matching tag (duplicate or fabricated) is
/// dropped without side effects.
#[test]
fn untracked_acknowledgement_is_discarded() {
    let genesis = test_genesis();
    let (remote, _) = remote_with_chain(&genesis, 3);
    let node = TestNode::start(test_config(), &genesis);
    connect_peer(&node, remote, None);

    let responded = wait_until(Duration::from_secs(15), || {
        node.service.metrics().responses >= 1
    });
    assert!(responded);

    let channels = node.network.shuffled_channels();
    let bogus = AscPullAck {
        id: 0xdead_beef,
        payload: AckPayload::Empty,
    };
    node.service.process(bogus, &channels[0]);
    let untracked = node.service.metrics().untracked_responses;
    node.stop();
    assert!(untracked >= 1, "unknown id was not discarded");
}

/// Frontier sampling notices an account whose advertised frontier is
/// locally unknown and queues it for pulling.
#[test]
fn frontier_scan_activates_unknown_accounts() {
    let genesis = test_genesis();
    let receiver = Account::from_low_u64_be(0x7ab);
    let (remote_ledger, chain) = remote_with_chain(&genesis, 1);
    // Remote also holds a second account
    {
        let processor = BlockProcessor::new(remote_ledger.clone());
        let send = send_block(chain.last().unwrap(), receiver, 10);
        assert_eq!(processor.process_blocking(&send), BlockStatus::Progress);
        let open = open_block(receiver, &send, 10);
        assert_eq!(processor.process_blocking(&open), BlockStatus::Progress);
    }
    let node = TestNode::start(test_config(), &genesis);
    connect_peer(&node, remote_ledger, None);

    let synced = wait_until(Duration::from_secs(15), || {
        node.ledger.account_info(&receiver).is_some()
    });
    node.stop();
    assert!(synced, "second account was never discovered and pulled");
    assert!(node.service.metrics().frontier_requests >= 1);
}
