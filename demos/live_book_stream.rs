use bookhub_rs::book::HttpSnapshotSource;
use bookhub_rs::dialect::{Dialect, DispatchDirectory, ExchangeId};
use bookhub_rs::{new_manager, Config, OrderBookFeed};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let config = Config::from_env();
    let directory = DispatchDirectory::with_known_defaults();
    let profile = directory.profile(ExchangeId::Binance).unwrap_or(bookhub_rs::dialect::ExchangeProfile { dialect: Dialect::SnapshotThenDelta, max_count: 1000 });

    let manager = new_manager(config.into_hub_config());
    let snapshot_source: Arc<dyn bookhub_rs::book::SnapshotSource> =
        Arc::new(HttpSnapshotSource::new(std::env::var("BOOKHUB_REST_BASE_URL").unwrap_or_else(|_| "https://api.example.com".to_string())));

    let feed = OrderBookFeed::subscribe(
        manager,
        "SubscribeToExchangeDeltas",
        vec!["BTCUSDT".to_string()],
        profile.dialect,
        profile.max_count,
        Default::default(),
        snapshot_source,
        Arc::new(|book| {
            tracing::info!(symbol = %book.symbol, sequence_id = book.sequence_id, best_bid = ?book.best_bid(), best_ask = ?book.best_ask(), "book updated");
        }),
    )
    .await?;

    tokio::signal::ctrl_c().await?;
    feed.close().await;
    Ok(())
}
