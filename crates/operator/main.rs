use actix_web::{get, middleware, web::Data, App, HttpRequest, HttpResponse, HttpServer, Responder};
use kube::Client;
use prometheus::{Encoder, TextEncoder};

use kontract::controllers::{
    self, blockexplorer_controller, contract_controller, contractversion_controller,
    network_controller, rpcprovider_controller, wallet_controller,
};
use kontract::util::telemetry;
use tracing::info;

#[get("/metrics")]
async fn metrics(c: Data<controllers::State>, _req: HttpRequest) -> impl Responder {
    let metrics = c.metrics();
    let encoder = TextEncoder::new();
    let mut buffer = vec![];
    encoder.encode(&metrics, &mut buffer).unwrap();
    HttpResponse::Ok().body(buffer)
}

#[get("/health")]
async fn health(_: HttpRequest) -> impl Responder {
    HttpResponse::Ok().json("healthy")
}

#[get("/")]
async fn index(c: Data<controllers::State>, _req: HttpRequest) -> impl Responder {
    let d = c.diagnostics().await;
    HttpResponse::Ok().json(&d)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    telemetry::init().await;

    // One client and one state shared across every controller
    let client = Client::try_default().await.expect("failed to create kube Client");
    let state = controllers::State::default();
    info!("starting kontract operator");

    let wallet_controller = wallet_controller::run(state.clone(), client.clone());
    let rpcprovider_controller = rpcprovider_controller::run(state.clone(), client.clone());
    let blockexplorer_controller = blockexplorer_controller::run(state.clone(), client.clone());
    let network_controller = network_controller::run(state.clone(), client.clone());
    let contract_controller = contract_controller::run(state.clone(), client.clone());
    let contractversion_controller = contractversion_controller::run(state.clone(), client.clone());

    // Start web server
    let server = HttpServer::new(move || {
        App::new()
            .app_data(Data::new(state.clone()))
            .wrap(middleware::Logger::default().exclude("/health"))
            .service(index)
            .service(health)
            .service(metrics)
    })
    .bind("0.0.0.0:8080")?
    .shutdown_timeout(5);

    // All runtimes implement graceful shutdown, so poll until every one is done
    tokio::join!(
        wallet_controller,
        rpcprovider_controller,
        blockexplorer_controller,
        network_controller,
        contract_controller,
        contractversion_controller,
        server.run()
    )
    .6?;
    Ok(())
}
