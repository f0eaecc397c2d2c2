use actix_web::{web, HttpResponse, Responder};
use log::{error, info};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::blockchain::chain::ConsensusError;
use crate::blockchain::explorer::{self, AddressSummary};
use crate::blockchain::{Block, Blockchain, NodeSnapshot, Transaction};
use crate::network::{PeerClient, PeerRegistry};

/// Shared ledger handle
pub type BlockchainData = web::Data<Blockchain>;

/// Shared peer registry handle
pub type PeersData = web::Data<PeerRegistry>;

/// Shared peer HTTP client handle
pub type PeerClientData = web::Data<PeerClient>;

/// This node's own on-ledger identity, credited when it mines.
pub struct NodeIdentity {
    pub miner_address: String,
}

pub type IdentityData = web::Data<NodeIdentity>;

/// Request for creating and broadcasting a transaction
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct NewTransactionRequest {
    /// Address the amount and gas are debited from
    pub debit_address: String,

    /// Address the amount is credited to
    pub credit_address: String,

    /// Amount to transfer, must be positive
    pub amount: f64,

    /// Gas offered to the miner, must be positive
    pub gas: f64,
}

/// Response carrying a freshly pooled transaction
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionCreatedResponse {
    pub note: String,
    pub transaction: Transaction,
}

/// Generic note-only response
#[derive(Serialize, Deserialize, ToSchema)]
pub struct NoteResponse {
    pub note: String,
}

/// Response for the mine endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct MineResponse {
    pub note: String,
    pub block: Block,
}

/// Envelope for a block relayed between nodes
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReceiveBlockRequest {
    pub new_block: Block,
}

/// Response for the consensus endpoint
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ConsensusResponse {
    pub note: String,
    pub chain: Vec<Block>,
}

/// Request to register a node URL
#[derive(Serialize, Deserialize, ToSchema)]
pub struct RegisterNodeRequest {
    #[serde(rename = "newNodeURL")]
    pub new_node_url: String,
}

/// Full network roster pushed to a joining node
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BulkRegisterRequest {
    pub all_network_nodes: Vec<String>,
}

/// Request for creating an account
#[derive(Serialize, Deserialize, ToSchema)]
pub struct CreateAccountRequest {
    /// Display name, not required to be unique
    pub nickname: String,

    /// Explicit address; omitted for a generated one
    pub address: Option<String>,
}

/// Explorer response for a block lookup
#[derive(Serialize, Deserialize, ToSchema)]
pub struct BlockSearchResponse {
    pub note: String,
    pub block: Option<Block>,
}

/// Explorer response for a transaction lookup
#[derive(Serialize, Deserialize, ToSchema)]
pub struct TransactionSearchResponse {
    pub note: String,
    pub block: Option<Block>,
    pub transaction: Option<Transaction>,
}

/// Explorer response for an address summary
#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AddressSearchResponse {
    pub note: String,
    pub address_data: AddressSummary,
}

/// Get this node's full state
///
/// Returns the chain, pending pool, accounts and known peers
#[utoipa::path(
    get,
    path = "/blockchain",
    responses(
        (status = 200, description = "Node state retrieved successfully", body = NodeSnapshot)
    )
)]
pub async fn get_blockchain(blockchain: BlockchainData, peers: PeersData) -> impl Responder {
    let snapshot = NodeSnapshot {
        chain: blockchain.chain(),
        pending_transactions: blockchain.pending_transactions(),
        accounts: blockchain.accounts(),
        network_nodes: peers.list(),
        current_node_url: peers.own_url().to_string(),
    };
    HttpResponse::Ok().json(snapshot)
}

/// Create a transaction and broadcast it
///
/// Validates, pools the transaction locally, then fans it out to every peer
#[utoipa::path(
    post,
    path = "/transaction/broadcast",
    request_body = NewTransactionRequest,
    responses(
        (status = 200, description = "Transaction pooled and broadcast", body = TransactionCreatedResponse),
        (status = 400, description = "Transaction rejected", body = NoteResponse)
    )
)]
pub async fn broadcast_transaction(
    blockchain: BlockchainData,
    peers: PeersData,
    client: PeerClientData,
    request: web::Json<NewTransactionRequest>,
) -> impl Responder {
    if request.amount <= 0.0 || request.gas <= 0.0 {
        return HttpResponse::BadRequest().json(NoteResponse {
            note: "amount and gas must both be positive".to_string(),
        });
    }

    let txn = match blockchain.create_transaction(
        &request.debit_address,
        &request.credit_address,
        request.amount,
        request.gas,
    ) {
        Ok(txn) => txn,
        Err(err) => {
            return HttpResponse::BadRequest().json(NoteResponse {
                note: format!("transaction rejected: {}", err),
            });
        }
    };

    // fan out after the ledger lock is released
    client.broadcast_transaction(&peers.list(), &txn).await;

    HttpResponse::Ok().json(TransactionCreatedResponse {
        note: "transaction created and broadcast successfully".to_string(),
        transaction: txn,
    })
}

/// Receive a transaction from a peer
///
/// Pools a transaction another node created and broadcast
#[utoipa::path(
    post,
    path = "/internal/receive-new-transaction",
    request_body = Transaction,
    responses(
        (status = 200, description = "Transaction pooled", body = NoteResponse),
        (status = 400, description = "Transaction rejected", body = NoteResponse)
    )
)]
pub async fn receive_transaction(
    blockchain: BlockchainData,
    txn: web::Json<Transaction>,
) -> impl Responder {
    let txn = txn.into_inner();
    let txn_id = txn.txn_id.clone();
    match blockchain.receive_transaction(txn) {
        Ok(()) => HttpResponse::Ok().json(NoteResponse {
            note: format!("transaction {} added to pending pool", txn_id),
        }),
        Err(err) => HttpResponse::BadRequest().json(NoteResponse {
            note: format!("transaction rejected: {}", err),
        }),
    }
}

/// Mine the next block
///
/// Assembles a block from the pending pool, runs the proof-of-work search
/// and broadcasts the result to every peer
#[utoipa::path(
    get,
    path = "/mine",
    responses(
        (status = 200, description = "Block mined and broadcast", body = MineResponse),
        (status = 400, description = "Mining attempt abandoned", body = NoteResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn mine(
    blockchain: BlockchainData,
    peers: PeersData,
    client: PeerClientData,
    identity: IdentityData,
) -> impl Responder {
    // the proof-of-work search runs to completion, so keep it off the
    // async executor
    let ledger = blockchain.get_ref().clone();
    let miner = identity.miner_address.clone();
    let mined = match web::block(move || ledger.mine(&miner)).await {
        Ok(result) => result,
        Err(err) => {
            error!("mining task failed to run: {}", err);
            return HttpResponse::InternalServerError().finish();
        }
    };

    match mined {
        Ok(block) => {
            client.broadcast_block(&peers.list(), &block).await;
            HttpResponse::Ok().json(MineResponse {
                note: "new block mined and broadcast successfully".to_string(),
                block,
            })
        }
        Err(err) => HttpResponse::BadRequest().json(NoteResponse {
            note: format!("mining abandoned: {}", err),
        }),
    }
}

/// Receive a block from a peer
///
/// Validates the relayed block against local state and commits it
#[utoipa::path(
    post,
    path = "/internal/receive-new-block",
    request_body = ReceiveBlockRequest,
    responses(
        (status = 200, description = "Block accepted", body = NoteResponse),
        (status = 400, description = "Block rejected", body = NoteResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn receive_block(
    blockchain: BlockchainData,
    request: web::Json<ReceiveBlockRequest>,
) -> impl Responder {
    let ledger = blockchain.get_ref().clone();
    let block = request.into_inner().new_block;
    let index = block.index;

    // simulation re-executes the whole block; run it off the executor
    let received = match web::block(move || ledger.receive_block(block)).await {
        Ok(result) => result,
        Err(err) => {
            error!("block reception task failed to run: {}", err);
            return HttpResponse::InternalServerError().finish();
        }
    };

    match received {
        Ok(()) => HttpResponse::Ok().json(NoteResponse {
            note: format!("block {} accepted and appended to chain", index),
        }),
        Err(err) => HttpResponse::BadRequest().json(NoteResponse {
            note: format!("block rejected: {}", err),
        }),
    }
}

/// Run longest-chain consensus
///
/// Fetches every peer's chain and adopts the longest valid one
#[utoipa::path(
    get,
    path = "/consensus",
    responses(
        (status = 200, description = "Consensus round completed", body = ConsensusResponse),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn consensus(
    blockchain: BlockchainData,
    peers: PeersData,
    client: PeerClientData,
) -> impl Responder {
    let snapshots = client.fetch_snapshots(&peers.list()).await;

    // longest chain offered by any reachable peer
    let best = snapshots
        .into_iter()
        .filter_map(|(peer, result)| match result {
            Ok(snapshot) => Some(snapshot),
            Err(err) => {
                info!("consensus skipping peer {}: {}", peer, err);
                None
            }
        })
        .max_by_key(|snapshot| snapshot.chain.len());

    let candidate = match best {
        Some(snapshot) => snapshot,
        None => {
            return HttpResponse::Ok().json(ConsensusResponse {
                note: "no peer chains available, current chain retained".to_string(),
                chain: blockchain.chain(),
            });
        }
    };

    // full re-execution from genesis; run it off the executor
    let ledger = blockchain.get_ref().clone();
    let replaced = match web::block(move || {
        ledger.try_replace_chain(candidate.chain, candidate.pending_transactions)
    })
    .await
    {
        Ok(result) => result,
        Err(err) => {
            error!("consensus task failed to run: {}", err);
            return HttpResponse::InternalServerError().finish();
        }
    };

    let note = match replaced {
        Ok(length) => format!("chain replaced by peer chain of {} blocks", length),
        Err(ConsensusError::NotLonger) => {
            "current chain retained, no longer peer chain found".to_string()
        }
        Err(err) => format!("current chain retained: {}", err),
    };
    HttpResponse::Ok().json(ConsensusResponse {
        note,
        chain: blockchain.chain(),
    })
}

/// Join the network through this node
///
/// Registers the new node, announces it to every existing peer and sends
/// the full roster back to it
#[utoipa::path(
    post,
    path = "/register-and-broadcast-node",
    request_body = RegisterNodeRequest,
    responses(
        (status = 200, description = "Node registered with the network", body = NoteResponse),
        (status = 502, description = "Registration handshake failed", body = NoteResponse)
    )
)]
pub async fn register_and_broadcast_node(
    peers: PeersData,
    client: PeerClientData,
    request: web::Json<RegisterNodeRequest>,
) -> impl Responder {
    let new_node_url = request.into_inner().new_node_url;

    // announce to the peers known before this registration; unlike
    // transaction and block broadcasts, a failed announcement fails the
    // whole handshake
    let existing = peers.list();
    peers.add(&new_node_url);
    let announced = client.announce_node(&existing, &new_node_url).await;
    if !announced.failed.is_empty() {
        return HttpResponse::BadGateway().json(NoteResponse {
            note: format!(
                "registration broadcast failed for peers: {}",
                announced.failed.join(", ")
            ),
        });
    }

    // the joining node gets everyone, including this node
    let mut roster = peers.list();
    roster.retain(|url| *url != new_node_url);
    roster.push(peers.own_url().to_string());
    if let Err(err) = client.register_bulk(&new_node_url, &roster).await {
        return HttpResponse::BadGateway().json(NoteResponse {
            note: format!("roster delivery to {} failed: {}", new_node_url, err),
        });
    }

    HttpResponse::Ok().json(NoteResponse {
        note: "new node registered with network successfully".to_string(),
    })
}

/// Register a single node
///
/// Registration only, no re-broadcast
#[utoipa::path(
    post,
    path = "/internal/register-node",
    request_body = RegisterNodeRequest,
    responses(
        (status = 200, description = "Node registered", body = NoteResponse)
    )
)]
pub async fn register_node(peers: PeersData, request: web::Json<RegisterNodeRequest>) -> impl Responder {
    peers.add(&request.new_node_url);
    HttpResponse::Ok().json(NoteResponse {
        note: "new node registered successfully".to_string(),
    })
}

/// Register a full network roster
///
/// Used by a joining node to learn every existing peer at once
#[utoipa::path(
    post,
    path = "/internal/register-nodes-bulk",
    request_body = BulkRegisterRequest,
    responses(
        (status = 200, description = "Roster registered", body = NoteResponse)
    )
)]
pub async fn register_nodes_bulk(
    peers: PeersData,
    request: web::Json<BulkRegisterRequest>,
) -> impl Responder {
    peers.add_bulk(request.into_inner().all_network_nodes);
    HttpResponse::Ok().json(NoteResponse {
        note: "bulk registration successful".to_string(),
    })
}

/// Create an account
///
/// Generates an address unless one is supplied; duplicate addresses are
/// rejected without side effects
#[utoipa::path(
    post,
    path = "/account",
    request_body = CreateAccountRequest,
    responses(
        (status = 201, description = "Account created", body = crate::blockchain::Account),
        (status = 400, description = "Address already exists", body = NoteResponse)
    )
)]
pub async fn create_account(
    blockchain: BlockchainData,
    request: web::Json<CreateAccountRequest>,
) -> impl Responder {
    match blockchain.create_account(&request.nickname, request.address.as_deref()) {
        Some(account) => HttpResponse::Created().json(account),
        None => HttpResponse::BadRequest().json(NoteResponse {
            note: "an account with that address already exists".to_string(),
        }),
    }
}

/// Get one account
#[utoipa::path(
    get,
    path = "/account/{address}",
    responses(
        (status = 200, description = "Account retrieved", body = crate::blockchain::Account),
        (status = 404, description = "Account not found", body = NoteResponse)
    )
)]
pub async fn get_account(blockchain: BlockchainData, address: web::Path<String>) -> impl Responder {
    match blockchain.get_account(&address) {
        Some(account) => HttpResponse::Ok().json(account),
        None => HttpResponse::NotFound().json(NoteResponse {
            note: format!("no account found for address {}", address),
        }),
    }
}

/// Get all accounts
#[utoipa::path(
    get,
    path = "/accounts",
    responses(
        (status = 200, description = "Accounts retrieved", body = Vec<crate::blockchain::Account>)
    )
)]
pub async fn get_accounts(blockchain: BlockchainData) -> impl Responder {
    HttpResponse::Ok().json(blockchain.accounts())
}

/// Look a committed block up by hash
#[utoipa::path(
    get,
    path = "/explorer/block/{blockHash}",
    responses(
        (status = 200, description = "Search completed", body = BlockSearchResponse)
    )
)]
pub async fn explorer_block(blockchain: BlockchainData, path: web::Path<String>) -> impl Responder {
    let block = explorer::find_block(&blockchain.chain(), &path);
    let note = match &block {
        Some(_) => "block found".to_string(),
        None => "no block found for the given hash".to_string(),
    };
    HttpResponse::Ok().json(BlockSearchResponse { note, block })
}

/// Look a committed transaction up by id
#[utoipa::path(
    get,
    path = "/explorer/transaction/{txnID}",
    responses(
        (status = 200, description = "Search completed", body = TransactionSearchResponse)
    )
)]
pub async fn explorer_transaction(
    blockchain: BlockchainData,
    path: web::Path<String>,
) -> impl Responder {
    match explorer::find_transaction(&blockchain.chain(), &path) {
        Some((block, transaction)) => HttpResponse::Ok().json(TransactionSearchResponse {
            note: "transaction found".to_string(),
            block: Some(block),
            transaction: Some(transaction),
        }),
        None => HttpResponse::Ok().json(TransactionSearchResponse {
            note: "no committed transaction found for the given id".to_string(),
            block: None,
            transaction: None,
        }),
    }
}

/// Summarize committed activity for an address
#[utoipa::path(
    get,
    path = "/explorer/address/{address}",
    responses(
        (status = 200, description = "Search completed", body = AddressSearchResponse)
    )
)]
pub async fn explorer_address(blockchain: BlockchainData, path: web::Path<String>) -> impl Responder {
    let address_data = explorer::address_summary(&blockchain.chain(), &path);
    HttpResponse::Ok().json(AddressSearchResponse {
        note: "address summary compiled from committed blocks".to_string(),
        address_data,
    })
}

/// Liveness probe
#[utoipa::path(
    get,
    path = "/healthcheck",
    responses(
        (status = 200, description = "Node is up", body = NoteResponse)
    )
)]
pub async fn healthcheck() -> impl Responder {
    HttpResponse::Ok().json(NoteResponse {
        note: "node is up".to_string(),
    })
}
