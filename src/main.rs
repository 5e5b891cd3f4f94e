use huobix::core::config::ExchangeConfig;
use huobix::core::traits::MarketDataSource;
use huobix::exchanges::huobi::create_huobi_connector;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Public endpoints work without credentials
    let config = ExchangeConfig::read_only();
    let huobi = create_huobi_connector(config)?;

    println!("Fetching markets...");
    match huobi.get_markets().await {
        Ok(markets) => {
            println!("Found {} markets", markets.len());
            for market in markets.iter().take(5) {
                println!(
                    "Market: {} ({}->{}), Status: {}",
                    market.symbol, market.symbol.base, market.symbol.quote, market.status
                );
            }
        }
        Err(e) => {
            println!("Error fetching markets: {}", e);
        }
    }

    let rest = huobi.market().rest();
    match rest.get_merged_ticker("btcusdt").await {
        Ok(tick) => {
            println!(
                "btcusdt best bid {} @ {}, best ask {} @ {}",
                tick.bid[1], tick.bid[0], tick.ask[1], tick.ask[0]
            );
        }
        Err(e) => {
            println!("Error fetching ticker: {}", e);
        }
    }

    Ok(())
}
