use actix_web::web;

use super::handlers;

/// Configures the API routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/blockchain", web::get().to(handlers::get_blockchain))
        .route(
            "/transaction/broadcast",
            web::post().to(handlers::broadcast_transaction),
        )
        .route(
            "/internal/receive-new-transaction",
            web::post().to(handlers::receive_transaction),
        )
        .route("/mine", web::get().to(handlers::mine))
        .route(
            "/internal/receive-new-block",
            web::post().to(handlers::receive_block),
        )
        .route("/consensus", web::get().to(handlers::consensus))
        .route(
            "/register-and-broadcast-node",
            web::post().to(handlers::register_and_broadcast_node),
        )
        .route(
            "/internal/register-node",
            web::post().to(handlers::register_node),
        )
        .route(
            "/internal/register-nodes-bulk",
            web::post().to(handlers::register_nodes_bulk),
        )
        .route("/account", web::post().to(handlers::create_account))
        .route("/account", web::get().to(handlers::get_accounts))
        .route("/account/{address}", web::get().to(handlers::get_account))
        .route("/accounts", web::get().to(handlers::get_accounts))
        .route(
            "/explorer/block/{blockHash}",
            web::get().to(handlers::explorer_block),
        )
        .route(
            "/explorer/transaction/{txnID}",
            web::get().to(handlers::explorer_transaction),
        )
        .route(
            "/explorer/address/{address}",
            web::get().to(handlers::explorer_address),
        )
        .route("/healthcheck", web::get().to(handlers::healthcheck));
}
