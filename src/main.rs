use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use anyhow::Context;
use log::{info, warn};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod api;
mod blockchain;
mod config;
mod network;

use api::handlers::NodeIdentity;
use blockchain::Blockchain;
use config::NodeConfig;
use network::{PeerClient, PeerRegistry};

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::get_blockchain,
        api::handlers::broadcast_transaction,
        api::handlers::receive_transaction,
        api::handlers::mine,
        api::handlers::receive_block,
        api::handlers::consensus,
        api::handlers::register_and_broadcast_node,
        api::handlers::register_node,
        api::handlers::register_nodes_bulk,
        api::handlers::create_account,
        api::handlers::get_account,
        api::handlers::get_accounts,
        api::handlers::explorer_block,
        api::handlers::explorer_transaction,
        api::handlers::explorer_address,
        api::handlers::healthcheck
    ),
    components(
        schemas(
            blockchain::Account,
            blockchain::Block,
            blockchain::Transaction,
            blockchain::NodeSnapshot,
            blockchain::execution::FailedTransaction,
            blockchain::explorer::AddressSummary,
            api::handlers::NewTransactionRequest,
            api::handlers::TransactionCreatedResponse,
            api::handlers::NoteResponse,
            api::handlers::MineResponse,
            api::handlers::ReceiveBlockRequest,
            api::handlers::ConsensusResponse,
            api::handlers::RegisterNodeRequest,
            api::handlers::BulkRegisterRequest,
            api::handlers::CreateAccountRequest,
            api::handlers::BlockSearchResponse,
            api::handlers::TransactionSearchResponse,
            api::handlers::AddressSearchResponse
        )
    ),
    tags(
        (name = "ledger", description = "Proof-of-work account ledger endpoints")
    ),
    info(
        title = "PoW Ledger Node API",
        version = "1.0.0",
        description = "A peer-to-peer proof-of-work account ledger node"
    )
)]
struct ApiDoc;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = NodeConfig::from_env().context("invalid node configuration")?;

    let blockchain = Blockchain::new(&config.premine_address, config.block_size);
    let node_account = blockchain
        .create_account(&format!("node-{}", config.port), None)
        .context("failed to create the node's own account")?;
    info!("node account {} created", node_account.address);

    let peers = PeerRegistry::new(&config.node_url);
    let client = PeerClient::new().context("failed to build the peer HTTP client")?;

    if let Some(seed) = &config.seed_node_url {
        match client.join_network(seed, &config.node_url).await {
            Ok(()) => info!("joined network through seed node {}", seed),
            Err(err) => warn!("could not join network through {}: {}", seed, err),
        }
    }

    let blockchain = web::Data::new(blockchain);
    let peers = web::Data::new(peers);
    let client = web::Data::new(client);
    let identity = web::Data::new(NodeIdentity {
        miner_address: node_account.address,
    });

    info!("starting HTTP server at {}", config.node_url);

    let openapi = ApiDoc::openapi();
    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_method()
            .allow_any_header()
            .max_age(3600);

        App::new()
            .wrap(middleware::Logger::default().exclude("/healthcheck"))
            .wrap(cors)
            .app_data(blockchain.clone())
            .app_data(peers.clone())
            .app_data(client.clone())
            .app_data(identity.clone())
            .configure(api::configure_routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", openapi.clone()),
            )
    })
    .bind(("0.0.0.0", config.port))?
    .run()
    .await?;

    Ok(())
}
