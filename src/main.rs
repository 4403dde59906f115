use std::net::SocketAddr;
use std::sync::Arc;

use mongodb::Client;

use stockpulse::{
    AppState, config, routes,
    services::{
        alert_monitor,
        market_data::MarketData,
        notifier::{self, BroadcastNotifier, LogNotifier},
        providers::{AlphaVantageClient, FinnhubClient, PriceSource, YahooClient},
        store::MongoStore,
    },
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let settings = config::load();

    // Mongo connection
    let client = Client::with_uri_str(&settings.mongodb_uri).await?;
    let store = MongoStore::new(client.database(&settings.mongodb_db));
    store.ensure_indexes().await?;

    // priority order: first source that answers wins
    let sources: Vec<Arc<dyn PriceSource>> = vec![
        Arc::new(YahooClient::new()),
        Arc::new(FinnhubClient::new(settings.finnhub_api_key.clone())),
        Arc::new(AlphaVantageClient::new(settings.alpha_vantage_api_key.clone())),
    ];
    let market = MarketData::from_settings(&settings, sources);

    let notifier = BroadcastNotifier::new(256);
    // chat delivery is not wired in yet; notifications end up in the log
    notifier::spawn_delivery(&notifier, Arc::new(LogNotifier));

    let state = AppState {
        settings: settings.clone(),
        store: Arc::new(store),
        market: Arc::new(market),
        notifier: Arc::new(notifier),
    };

    alert_monitor::spawn_alert_monitor(state.clone());

    let app = routes::app(state);

    let addr = SocketAddr::from((settings.host.parse::<std::net::IpAddr>()?, settings.port));
    tracing::info!("status server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await?;

    Ok(())
}
