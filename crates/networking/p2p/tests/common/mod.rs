//! Shared harness for the bootstrap scenario tests: a local node under
//! test, in-process loopback channels that round-trip every message
//! through the wire codec, and chain-building helpers.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use strand_blockchain::block_processor::genesis_block;
use strand_blockchain::{BlockProcessor, BlockStatus, Ledger};
use strand_common::{Account, Amount, Block, BlockHash, HashOrAccount, Signature};
use strand_p2p::bootstrap::{AccountSetsConfig, FrontierScanConfig};
use strand_p2p::messages::{AscPullAck, AscPullReq};
use strand_p2p::{
    BootstrapConfig, BootstrapServer, BootstrapService, Channel, Message, Network, TrafficType,
};
use strand_storage::Store;

/// Bootstrap tuning with intervals shrunk for test time.
pub fn test_config() -> BootstrapConfig {
    BootstrapConfig {
        request_timeout: Duration::from_secs(5),
        sync_dependencies_interval: Duration::from_secs(1),
        account_sets: AccountSetsConfig {
            cooldown: Duration::from_millis(100),
            ..AccountSetsConfig::default()
        },
        frontier_scan: FrontierScanConfig {
            cooldown: Duration::from_millis(100),
            ..FrontierScanConfig::default()
        },
        ..BootstrapConfig::default()
    }
}

/// The node under test: ledger, processor and bootstrap service wired
/// together the way the daemon does it.
pub struct TestNode {
    pub ledger: Ledger,
    pub processor: Arc<BlockProcessor>,
    pub network: Network,
    pub service: Arc<BootstrapService>,
}

/// Opt-in test logging: `RUST_LOG=strand_p2p=debug cargo test ...`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

impl TestNode {
    pub fn start(config: BootstrapConfig, genesis: &Block) -> Self {
        init_tracing();
        let ledger = Ledger::new(Store::new());
        ledger.insert_genesis(genesis).unwrap();
        let processor = BlockProcessor::new(ledger.clone());
        let network = Network::new();
        let service = BootstrapService::new(
            config,
            ledger.clone(),
            Arc::clone(&processor),
            network.clone(),
        );
        processor.start();
        service.start();
        Self {
            ledger,
            processor,
            network,
            service,
        }
    }

    pub fn stop(&self) {
        self.service.stop();
        self.processor.stop();
    }
}

type Responder = Box<dyn Fn(&AscPullReq) -> Option<AscPullAck> + Send + 'static>;

/// In-process channel: requests are serialized, decoded and handed to a
/// responder thread; acknowledgements come back through
/// `BootstrapService::process`.
pub struct LoopbackChannel {
    requests: Mutex<mpsc::Sender<AscPullReq>>,
    pub sent_requests: AtomicUsize,
    alive: AtomicBool,
}

impl LoopbackChannel {
    /// Simulates the transport tearing the connection down.
    pub fn close(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl Channel for LoopbackChannel {
    fn send(&self, message: &Message, _traffic: TrafficType) -> bool {
        if !self.is_alive() {
            return false;
        }
        // Round-trip through the codec so the wire format is exercised
        let decoded = Message::from_bytes(&message.to_bytes()).expect("encoded message decodes");
        match decoded {
            Message::AscPullReq(request) => {
                self.sent_requests.fetch_add(1, Ordering::SeqCst);
                self.requests
                    .lock()
                    .unwrap()
                    .send(request)
                    .is_ok()
            }
            Message::AscPullAck(_) => true,
        }
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    fn congested(&self, _traffic: TrafficType) -> bool {
        false
    }
}

/// Connects a remote peer to `node`. The peer answers pulls with
/// `responder`; pass `None` to serve faithfully from `remote_ledger`.
pub fn connect_peer(
    node: &TestNode,
    remote_ledger: Ledger,
    responder: Option<Responder>,
) -> Arc<LoopbackChannel> {
    let (sender, receiver) = mpsc::channel::<AscPullReq>();
    let channel = Arc::new(LoopbackChannel {
        requests: Mutex::new(sender),
        sent_requests: AtomicUsize::new(0),
        alive: AtomicBool::new(true),
    });
    let as_dyn: Arc<dyn Channel> = channel.clone();
    node.network.add(as_dyn.clone());

    let server = BootstrapServer::new(remote_ledger);
    let responder = responder.unwrap_or_else(|| {
        let server = server.clone();
        Box::new(move |request| Some(server.respond(request)))
    });
    let service = Arc::clone(&node.service);
    std::thread::spawn(move || {
        while let Ok(request) = receiver.recv() {
            if let Some(ack) = responder(&request) {
                service.process(ack, &as_dyn);
            }
        }
    });
    channel
}

/// Polls until the condition holds or the deadline passes.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    condition()
}

// Chain building

pub fn test_genesis() -> Block {
    genesis_block(Account::from_low_u64_be(0xbeef))
}

pub fn send_block(previous: &Block, destination: Account, amount: u128) -> Block {
    let mut block = Block {
        account: previous.account,
        previous: previous.hash(),
        representative: previous.representative,
        balance: previous.balance.checked_sub(Amount::raw(amount)).unwrap(),
        link: HashOrAccount(destination.0),
        signature: Signature::default(),
        work: 0,
    };
    block.fill_signature();
    block
}

pub fn open_block(account: Account, source: &Block, amount: u128) -> Block {
    let mut block = Block {
        account,
        previous: BlockHash::ZERO,
        representative: account,
        balance: Amount::raw(amount),
        link: HashOrAccount(source.hash().0),
        signature: Signature::default(),
        work: 0,
    };
    block.fill_signature();
    block
}

/// A remote ledger holding the genesis account chain extended by `length`
/// self-contained send blocks. Returns the ledger and the full chain,
/// genesis included.
pub fn remote_with_chain(genesis: &Block, length: usize) -> (Ledger, Vec<Block>) {
    let ledger = Ledger::new(Store::new());
    ledger.insert_genesis(genesis).unwrap();
    let processor = BlockProcessor::new(ledger.clone());
    let mut chain = vec![genesis.clone()];
    for n in 0..length {
        let block = send_block(
            chain.last().unwrap(),
            Account::from_low_u64_be(0x1000 + n as u64),
            1,
        );
        assert_eq!(processor.process_blocking(&block), BlockStatus::Progress);
        chain.push(block);
    }
    (ledger, chain)
}
