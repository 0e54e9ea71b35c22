//! Integration tests exercising the full node pipeline: submission →
//! validation → mining → gossip → fork resolution, wired the way the
//! daemon wires it rather than component by component.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use naka_crypto::{derive_address, generate_keypair, KeyPair};
use naka_ledger::{Block, Chain, Transaction, Utxo};
use naka_network::{read_frame, write_frame, PeerChannel, RpcRequest, RpcResponse, WireBlock};
use naka_node::{Node, NodeConfig, NodeError};
use naka_types::{BlockHash, ConsensusParams, TxHash};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parameters whose initial target accepts practically every hash, so
/// blocks seal on the first nonce.
fn easy_params() -> ConsensusParams {
    ConsensusParams {
        initial_target: "f".repeat(64),
        ..ConsensusParams::default()
    }
}

fn easy_config() -> NodeConfig {
    NodeConfig {
        params: easy_params(),
        ..NodeConfig::default()
    }
}

fn seed_utxo(kp: &KeyPair, amount: i64) -> Utxo {
    Utxo {
        tx_hash: TxHash::from("seed"),
        index: 0,
        amount,
        address: derive_address(&kp.public).unwrap(),
    }
}

fn payment(sender: &KeyPair, inputs: Vec<Utxo>, recipient: &KeyPair, amount: i64) -> Transaction {
    let mut tx =
        Transaction::new(inputs, sender.public.clone(), &recipient.public, amount).unwrap();
    tx.sign(&sender.private).unwrap();
    tx
}

fn seal(mut block: Block) -> Block {
    for nonce in 0.. {
        block.header.nonce = nonce;
        let hash = block.header_hash().unwrap();
        if block.hash_meets_difficulty(&hash) {
            block.hash = hash;
            return block;
        }
    }
    unreachable!()
}

/// Wait until the node's chain reaches `height`, or panic after `secs`.
async fn await_height(node: &Arc<Node>, height: i32, secs: u64) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(secs);
    loop {
        if node.chain_height().await >= height {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "chain did not reach height {height} within {secs}s"
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// A peer process stand-in: serves `GetBlockByHash` from a fixed block
/// set and accepts everything else.
async fn serve_blocks(blocks: Vec<Block>) -> String {
    let map: HashMap<String, WireBlock> = blocks
        .iter()
        .map(|b| (b.hash.as_str().to_string(), WireBlock::from(b)))
        .collect();
    let map = Arc::new(map);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let map = Arc::clone(&map);
            tokio::spawn(async move {
                while let Ok(frame) = read_frame(&mut stream).await {
                    let response = match bincode::deserialize::<RpcRequest>(&frame) {
                        Ok(RpcRequest::GetBlockByHash { hash }) => match map.get(&hash) {
                            Some(block) => RpcResponse::Block {
                                block: Some(block.clone()),
                                error: String::new(),
                            },
                            None => RpcResponse::Block {
                                block: None,
                                error: "block not found".into(),
                            },
                        },
                        Ok(_) => RpcResponse::Submit {
                            accepted: true,
                            error: String::new(),
                        },
                        Err(_) => return,
                    };
                    let body = bincode::serialize(&response).unwrap();
                    if write_frame(&mut stream, &body).await.is_err() {
                        return;
                    }
                }
            });
        }
    });
    addr
}

// ---------------------------------------------------------------------------
// 1. Single transaction round-trip
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn single_transaction_round_trip() {
    let alice = generate_keypair().unwrap();
    let bob = generate_keypair().unwrap();
    let node = Node::new(easy_config(), vec![seed_utxo(&alice, 100)]).unwrap();

    let tx = payment(&alice, vec![seed_utxo(&alice, 100)], &bob, 30);
    let tx_hash = tx.hash.clone();
    node.submit_transaction(tx).await.unwrap();

    node.start_mining().await.unwrap();
    await_height(&node, 1, 30).await;
    node.stop_mining().await.unwrap();

    let (confirmed, depth) = node.transaction_status(&tx_hash, 1).await;
    assert!(confirmed);
    assert!(depth >= 1);

    let alice_addr = derive_address(&alice.public).unwrap();
    let bob_addr = derive_address(&bob.public).unwrap();
    assert_eq!(node.balance(&bob_addr).await, 30);
    assert_eq!(node.balance(&alice_addr).await, 70);

    let mined_hash = node.last_100_hashes().await[1].clone();
    let block = node.block_by_hash(&mined_hash).await;
    assert!(block.is_some());
}

// ---------------------------------------------------------------------------
// 2. Double-spend rejection
// ---------------------------------------------------------------------------

#[tokio::test]
async fn double_spend_rejected_after_first_applies() {
    let alice = generate_keypair().unwrap();
    let bob = generate_keypair().unwrap();
    let carol = generate_keypair().unwrap();
    let seeds = vec![seed_utxo(&alice, 100)];
    let node = Node::new(easy_config(), seeds.clone()).unwrap();

    // Mine the first spend into the chain through the peer path: a
    // builder chain shares the deterministic genesis.
    let mut builder = Chain::new(seeds, easy_params()).unwrap();
    let first = payment(&alice, vec![seed_utxo(&alice, 100)], &bob, 100);
    node.submit_transaction(first.clone()).await.unwrap();

    let block = seal(builder.create_block(vec![first]).unwrap());
    builder.add_block(block.clone()).unwrap();
    node.submit_block(block, builder.last_100_hashes(), "10.1.1.1:4000")
        .await
        .unwrap();
    assert_eq!(node.chain_height().await, 1);

    // The same input again, to a different output: its input is spent.
    let second = payment(&alice, vec![seed_utxo(&alice, 100)], &carol, 100);
    let err = node.submit_transaction(second).await.unwrap_err();
    assert!(matches!(
        err,
        NodeError::Ledger(naka_ledger::LedgerError::InvalidTransaction(_))
    ));

    // And the identical transaction is a duplicate.
    let mined_hash = node.last_100_hashes().await[1].clone();
    let mined_tx = node
        .block_by_hash(&mined_hash)
        .await
        .unwrap()
        .transactions[0]
        .clone();
    let replay = node.submit_transaction(mined_tx).await.unwrap_err();
    assert!(matches!(
        replay,
        NodeError::Ledger(naka_ledger::LedgerError::DuplicateTransaction(_))
    ));
}

// ---------------------------------------------------------------------------
// 3. Signature tampering
// ---------------------------------------------------------------------------

#[tokio::test]
async fn tampered_signature_rejected() {
    let alice = generate_keypair().unwrap();
    let bob = generate_keypair().unwrap();
    let node = Node::new(easy_config(), vec![seed_utxo(&alice, 100)]).unwrap();

    let mut tx = payment(&alice, vec![seed_utxo(&alice, 100)], &bob, 30);
    let flipped = if &tx.signature[0..1] == "0" { "1" } else { "0" };
    tx.signature.replace_range(0..1, flipped);
    assert!(!tx.verify());

    let err = node.submit_transaction(tx).await.unwrap_err();
    assert!(matches!(
        err,
        NodeError::Ledger(naka_ledger::LedgerError::InvalidTransaction(_))
    ));
    assert_eq!(node.chain_height().await, 0);
}

// ---------------------------------------------------------------------------
// 4. Mining happy path at the protocol's initial target
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mining_happy_path_at_initial_target() {
    let alice = generate_keypair().unwrap();
    let bob = generate_keypair().unwrap();
    // The real 59-f initial target: roughly a million attempts per block.
    let node = Node::new(
        NodeConfig::default(),
        vec![seed_utxo(&alice, 100)],
    )
    .unwrap();

    let tx = payment(&alice, vec![seed_utxo(&alice, 100)], &bob, 30);
    node.submit_transaction(tx).await.unwrap();

    node.start_mining().await.unwrap();
    await_height(&node, 1, 120).await;
    node.stop_mining().await.unwrap();

    let tail_hash = node.last_100_hashes().await[1].clone();
    let block = node.block_by_hash(&tail_hash).await.unwrap();
    assert!(naka_work::hash_meets_target(
        block.hash.as_str(),
        naka_types::params::INITIAL_TARGET
    ));
    assert_eq!(block.transactions.len(), 1);
}

// ---------------------------------------------------------------------------
// 5. Reorg to a heavier fork
// ---------------------------------------------------------------------------

#[tokio::test]
async fn reorg_adopts_heavier_fork_and_readmits_transactions() {
    let alice = generate_keypair().unwrap();
    let bob = generate_keypair().unwrap();
    let seeds = vec![seed_utxo(&alice, 100)];
    let node = Node::new(easy_config(), seeds.clone()).unwrap();

    // Local chain: heights 1..3, with Alice's payment in block 2.
    let mut local = Chain::new(seeds.clone(), easy_params()).unwrap();
    let b1 = seal(local.create_block(vec![]).unwrap());
    local.add_block(b1.clone()).unwrap();
    node.submit_block(b1.clone(), local.last_100_hashes(), "10.1.1.1:4000")
        .await
        .unwrap();

    let to_bob = payment(&alice, vec![seed_utxo(&alice, 100)], &bob, 30);
    let b2 = seal(local.create_block(vec![to_bob.clone()]).unwrap());
    local.add_block(b2.clone()).unwrap();
    node.submit_block(b2, local.last_100_hashes(), "10.1.1.1:4000")
        .await
        .unwrap();

    let b3 = seal(local.create_block(vec![]).unwrap());
    local.add_block(b3.clone()).unwrap();
    node.submit_block(b3, local.last_100_hashes(), "10.1.1.1:4000")
        .await
        .unwrap();
    assert_eq!(node.chain_height().await, 3);

    // Rival chain: shares block 1, then three empty blocks to height 4.
    let mut rival = Chain::new(seeds, easy_params()).unwrap();
    rival.add_block(b1).unwrap();
    let mut rival_blocks = Vec::new();
    for i in 0..3 {
        let mut block = rival.create_block(vec![]).unwrap();
        block.header.timestamp += 1000 * (i + 1);
        let block = seal(block);
        rival.add_block(block.clone()).unwrap();
        rival_blocks.push(block);
    }

    // A peer serves the rival's interior blocks; its tail is submitted.
    let server = serve_blocks(rival_blocks[..2].to_vec()).await;
    node.peers().add_peer(&server).await.unwrap();

    node.submit_block(
        rival_blocks[2].clone(),
        rival.last_100_hashes(),
        "10.2.2.2:4000",
    )
    .await
    .unwrap();

    assert_eq!(node.chain_height().await, 4);
    let tail = node
        .block_by_hash(&rival.last_block().hash.clone())
        .await
        .expect("fork tail adopted");
    assert_eq!(tail.header.height, 4);

    // The orphaned payment left the chain and returned to the pool:
    // re-submitting it reports a duplicate.
    let (confirmed, depth) = node.transaction_status(&to_bob.hash, 1).await;
    assert!(!confirmed);
    assert_eq!(depth, -1);
    // Its effects were reverted with it.
    assert_eq!(node.balance(&derive_address(&bob.public).unwrap()).await, 0);
    assert_eq!(
        node.balance(&derive_address(&alice.public).unwrap()).await,
        100
    );
    let err = node.submit_transaction(to_bob).await.unwrap_err();
    assert!(matches!(
        err,
        NodeError::Ledger(naka_ledger::LedgerError::DuplicateTransaction(_))
    ));
}

// ---------------------------------------------------------------------------
// 6. Blacklisting after three invalid blocks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn three_invalid_blocks_blacklist_the_peer() {
    let node = Node::new(easy_config(), vec![]).unwrap();
    let attacker = "203.0.113.7:50051";

    // A block lying about its hash never verifies.
    let mut forged = Chain::new(vec![], easy_params())
        .unwrap()
        .create_block(vec![])
        .unwrap();
    forged.hash = BlockHash::from("1");
    forged.header.nonce = 1;

    for _ in 0..3 {
        let err = node
            .submit_block(forged.clone(), vec![], attacker)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NodeError::Ledger(naka_ledger::LedgerError::InvalidBlock(_))
        ));
    }
    assert!(node.peers().is_blacklisted(attacker).await);

    // A perfectly valid block from the same endpoint is now refused
    // before validation, and the chain does not move.
    let mut honest = Chain::new(vec![], easy_params()).unwrap();
    let good = seal(honest.create_block(vec![]).unwrap());
    honest.add_block(good.clone()).unwrap();

    let err = node
        .submit_block(good.clone(), honest.last_100_hashes(), attacker)
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::PeerBlacklisted(_)));
    assert_eq!(node.chain_height().await, 0);

    // Another endpoint delivers the same block without trouble.
    node.submit_block(good, honest.last_100_hashes(), "198.51.100.2:50051")
        .await
        .unwrap();
    assert_eq!(node.chain_height().await, 1);
}

// ---------------------------------------------------------------------------
// Gossip between two real nodes over the RPC transport
// ---------------------------------------------------------------------------

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mined_blocks_gossip_to_peer_node() {
    let alice = generate_keypair().unwrap();
    let bob = generate_keypair().unwrap();
    let seeds = vec![seed_utxo(&alice, 100)];

    let receiver = Node::new(easy_config(), seeds.clone()).unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let rpc_addr = listener.local_addr().unwrap();
    drop(listener);
    let receiver_port = rpc_addr.port();
    naka_node::server::spawn_rpc_server(Arc::clone(&receiver), receiver_port)
        .await
        .unwrap();

    let miner = Node::new(easy_config(), seeds).unwrap();
    miner
        .peers()
        .add_peer(&format!("127.0.0.1:{receiver_port}"))
        .await
        .unwrap();

    let tx = payment(&alice, vec![seed_utxo(&alice, 100)], &bob, 40);
    miner.submit_transaction(tx.clone()).await.unwrap();

    miner.start_mining().await.unwrap();
    await_height(&receiver, 1, 30).await;
    miner.stop_mining().await.unwrap();

    assert_eq!(
        receiver.balance(&derive_address(&bob.public).unwrap()).await,
        40
    );

    // The receiver learned the block through gossip and confirms the
    // transaction over its own RPC surface.
    let channel = PeerChannel::new(format!("127.0.0.1:{receiver_port}"));
    let response = channel
        .call(&RpcRequest::GetTransactionStatus {
            hash: tx.hash.as_str().to_string(),
            k: 1,
        })
        .await
        .unwrap();
    assert!(matches!(
        response,
        RpcResponse::TransactionStatus {
            confirmed: true,
            ..
        }
    ));

    let genesis_hash = receiver.last_100_hashes().await[0].clone();
    let response = channel
        .call(&RpcRequest::GetBlockByHash {
            hash: genesis_hash.as_str().to_string(),
        })
        .await
        .unwrap();
    assert!(matches!(response, RpcResponse::Block { block: Some(_), .. }));
}

// ---------------------------------------------------------------------------
// Genesis determinism
// ---------------------------------------------------------------------------

#[tokio::test]
async fn independent_nodes_share_the_genesis_block() {
    let a = Node::new(easy_config(), vec![]).unwrap();
    let b = Node::new(easy_config(), vec![]).unwrap();
    assert_eq!(a.last_100_hashes().await[0], b.last_100_hashes().await[0]);
}
