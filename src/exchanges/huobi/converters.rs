use crate::core::book::{BookDelta, BookSnapshot, PriceLevel};
use crate::core::errors::ExchangeError;
use crate::core::types::{Balance, Market, OrderSide, OrderType, Symbol};
use crate::exchanges::huobi::types::{
    HuobiAccountBalances, HuobiMarketDepth, HuobiSymbol, HuobiWsDepthUpdate,
};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// Candlestick periods supported by the kline endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuobiPeriod {
    OneMinute,
    FiveMinutes,
    FifteenMinutes,
    ThirtyMinutes,
    OneHour,
    FourHours,
    OneDay,
    OneWeek,
    OneMonth,
    OneYear,
}

impl HuobiPeriod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OneMinute => "1min",
            Self::FiveMinutes => "5min",
            Self::FifteenMinutes => "15min",
            Self::ThirtyMinutes => "30min",
            Self::OneHour => "60min",
            Self::FourHours => "4hour",
            Self::OneDay => "1day",
            Self::OneWeek => "1week",
            Self::OneMonth => "1mon",
            Self::OneYear => "1year",
        }
    }
}

/// Order lifecycle states reported by the order endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HuobiOrderState {
    PreSubmitted,
    Submitted,
    PartiallyFilled,
    PartiallyCanceled,
    Filled,
    Canceled,
}

impl HuobiOrderState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PreSubmitted => "pre-submitted",
            Self::Submitted => "submitted",
            Self::PartiallyFilled => "partial-filled",
            Self::PartiallyCanceled => "partial-canceled",
            Self::Filled => "filled",
            Self::Canceled => "canceled",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ExchangeError> {
        match value {
            "pre-submitted" => Ok(Self::PreSubmitted),
            "submitted" => Ok(Self::Submitted),
            "partial-filled" => Ok(Self::PartiallyFilled),
            "partial-canceled" => Ok(Self::PartiallyCanceled),
            "filled" => Ok(Self::Filled),
            "canceled" => Ok(Self::Canceled),
            other => Err(ExchangeError::DeserializationError(format!(
                "Unknown order state: {}",
                other
            ))),
        }
    }
}

/// Build the combined side-and-type string the order endpoints expect
pub fn order_type_to_string(side: OrderSide, order_type: OrderType) -> String {
    let side = match side {
        OrderSide::Buy => "buy",
        OrderSide::Sell => "sell",
    };
    let kind = match order_type {
        OrderType::Market => "market",
        OrderType::Limit => "limit",
        OrderType::Ioc => "ioc",
        OrderType::LimitMaker => "limit-maker",
    };
    format!("{}-{}", side, kind)
}

/// Parse a combined side-and-type string like "buy-limit"
pub fn parse_order_type(value: &str) -> Result<(OrderSide, OrderType), ExchangeError> {
    let (side, kind) = value.split_once('-').ok_or_else(|| {
        ExchangeError::DeserializationError(format!("Unknown order type: {}", value))
    })?;
    let side = match side {
        "buy" => OrderSide::Buy,
        "sell" => OrderSide::Sell,
        _ => {
            return Err(ExchangeError::DeserializationError(format!(
                "Unknown order side: {}",
                value
            )))
        }
    };
    let kind = match kind {
        "market" => OrderType::Market,
        "limit" => OrderType::Limit,
        "ioc" => OrderType::Ioc,
        "limit-maker" => OrderType::LimitMaker,
        _ => {
            return Err(ExchangeError::DeserializationError(format!(
                "Unknown order type: {}",
                value
            )))
        }
    };
    Ok((side, kind))
}

/// Convert symbol metadata to the core market type
pub fn convert_symbol(huobi: &HuobiSymbol) -> Result<Market, ExchangeError> {
    let symbol = Symbol::new(
        huobi.base_currency.to_uppercase(),
        huobi.quote_currency.to_uppercase(),
    )
    .map_err(|e| ExchangeError::DeserializationError(e.to_string()))?;

    Ok(Market {
        symbol,
        status: huobi.state.clone().unwrap_or_else(|| "online".to_string()),
        base_precision: huobi.amount_precision,
        quote_precision: huobi.price_precision,
        amount_precision: huobi.amount_precision,
        min_amount: huobi.min_order_amount,
        max_amount: huobi.max_order_amount,
    })
}

/// Flatten the per-type balance list into one entry per currency
pub fn convert_balances(balances: &HuobiAccountBalances) -> Vec<Balance> {
    let mut merged: BTreeMap<String, (Decimal, Decimal)> = BTreeMap::new();
    for entry in &balances.list {
        let slot = merged.entry(entry.currency.clone()).or_default();
        match entry.balance_type.as_str() {
            "trade" => slot.0 += entry.balance,
            "frozen" => slot.1 += entry.balance,
            _ => {}
        }
    }
    merged
        .into_iter()
        .map(|(asset, (free, locked))| Balance {
            asset,
            free,
            locked,
        })
        .collect()
}

fn convert_levels(levels: &[[Decimal; 2]]) -> Vec<PriceLevel> {
    levels
        .iter()
        .map(|[price, quantity]| PriceLevel::new(*price, *quantity))
        .collect()
}

/// Convert a REST depth response into a book snapshot. The `version` field
/// carries the sequence number that incremental updates chain from.
pub fn depth_to_snapshot(symbol: Symbol, depth: &HuobiMarketDepth) -> BookSnapshot {
    let sequence = depth
        .version
        .and_then(|v| u64::try_from(v).ok())
        .unwrap_or_default();
    BookSnapshot {
        symbol,
        sequence,
        bids: convert_levels(&depth.bids),
        asks: convert_levels(&depth.asks),
    }
}

/// Convert a streamed incremental depth update into a book delta
pub fn ws_depth_to_delta(symbol: Symbol, update: &HuobiWsDepthUpdate) -> BookDelta {
    BookDelta {
        symbol,
        sequence: update.seq_num,
        previous_sequence: update.prev_seq_num,
        bids: convert_levels(&update.bids),
        asks: convert_levels(&update.asks),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_type_strings_round_trip() {
        let cases = [
            (OrderSide::Buy, OrderType::Market, "buy-market"),
            (OrderSide::Sell, OrderType::Market, "sell-market"),
            (OrderSide::Buy, OrderType::Limit, "buy-limit"),
            (OrderSide::Sell, OrderType::Limit, "sell-limit"),
            (OrderSide::Buy, OrderType::Ioc, "buy-ioc"),
            (OrderSide::Sell, OrderType::LimitMaker, "sell-limit-maker"),
        ];
        for (side, order_type, expected) in cases {
            assert_eq!(order_type_to_string(side, order_type), expected);
            assert_eq!(parse_order_type(expected).unwrap(), (side, order_type));
        }
    }

    #[test]
    fn unknown_order_type_is_rejected() {
        assert!(parse_order_type("hold-limit").is_err());
        assert!(parse_order_type("buylimit").is_err());
    }

    #[test]
    fn period_strings_match_the_api() {
        assert_eq!(HuobiPeriod::OneMinute.as_str(), "1min");
        assert_eq!(HuobiPeriod::OneHour.as_str(), "60min");
        assert_eq!(HuobiPeriod::OneMonth.as_str(), "1mon");
    }

    #[test]
    fn balances_merge_trade_and_frozen() {
        let balances = HuobiAccountBalances {
            id: 1,
            account_type: "spot".to_string(),
            state: "working".to_string(),
            list: vec![
                crate::exchanges::huobi::types::HuobiBalance {
                    currency: "btc".to_string(),
                    balance_type: "trade".to_string(),
                    balance: dec!(1.5),
                },
                crate::exchanges::huobi::types::HuobiBalance {
                    currency: "btc".to_string(),
                    balance_type: "frozen".to_string(),
                    balance: dec!(0.5),
                },
                crate::exchanges::huobi::types::HuobiBalance {
                    currency: "usdt".to_string(),
                    balance_type: "trade".to_string(),
                    balance: dec!(1000),
                },
            ],
        };

        let converted = convert_balances(&balances);
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].asset, "btc");
        assert_eq!(converted[0].free, dec!(1.5));
        assert_eq!(converted[0].locked, dec!(0.5));
        assert_eq!(converted[1].asset, "usdt");
        assert_eq!(converted[1].locked, dec!(0));
    }

    #[test]
    fn depth_converts_to_snapshot_with_version_as_sequence() {
        let depth = HuobiMarketDepth {
            version: Some(42),
            ts: None,
            bids: vec![[dec!(100), dec!(1)]],
            asks: vec![[dec!(101), dec!(2)]],
        };
        let snapshot = depth_to_snapshot(Symbol::new("BTC", "USDT").unwrap(), &depth);
        assert_eq!(snapshot.sequence, 42);
        assert_eq!(snapshot.bids[0].price, dec!(100));
        assert_eq!(snapshot.asks[0].quantity, dec!(2));
    }
}
