use serde::{Deserialize, Serialize};

/// 搜索候选项，只用于填充下拉选择列表，不做持久化
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMatch {
    pub symbol: String,
    pub display_name: String,
    pub exchange: Option<String>,
}

impl SymbolMatch {
    pub fn new(symbol: &str, display_name: &str, exchange: Option<&str>) -> Self {
        Self {
            symbol: symbol.to_string(),
            display_name: display_name.to_string(),
            exchange: exchange.map(|e| e.to_string()),
        }
    }
}

// 加密货币代码形如 BTC-USD，后缀为计价货币
const CRYPTO_QUOTES: &[&str] = &["USD", "USDT", "USDC", "EUR", "GBP", "JPY", "BTC", "ETH"];

/// 资产类别，决定清洗时是否按交易日历过滤
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AssetClass {
    Listed,
    Crypto,
    Currency,
}

impl AssetClass {
    pub fn classify(symbol: &str, instrument_type: Option<&str>) -> Self {
        match instrument_type.map(|t| t.to_uppercase()).as_deref() {
            Some("CRYPTOCURRENCY") | Some("CRYPTO") => return AssetClass::Crypto,
            Some("CURRENCY") => return AssetClass::Currency,
            _ => {}
        }

        let symbol = symbol.trim().to_uppercase();
        if symbol.ends_with("=X") {
            return AssetClass::Currency;
        }
        if let Some((base, quote)) = symbol.rsplit_once('-') {
            if !base.is_empty() && CRYPTO_QUOTES.contains(&quote) {
                return AssetClass::Crypto;
            }
        }
        AssetClass::Listed
    }

    /// 全天候交易的资产不受交易所日历约束
    pub fn follows_exchange_calendar(&self) -> bool {
        matches!(self, AssetClass::Listed)
    }

    pub fn instrument_type(&self) -> Option<&'static str> {
        match self {
            AssetClass::Listed => None,
            AssetClass::Crypto => Some("CRYPTOCURRENCY"),
            AssetClass::Currency => Some("CURRENCY"),
        }
    }
}

/// Exchange suffix of a listing, e.g. `AS` for `ASML.AS`.
pub fn listing_suffix(symbol: &str) -> Option<&str> {
    let (base, suffix) = symbol.rsplit_once('.')?;
    if base.is_empty() || suffix.is_empty() {
        return None;
    }
    Some(suffix)
}

/// Exchange code used for ranking: the listing suffix, or `US` for
/// suffix-less symbols.
pub fn exchange_code(symbol: &str) -> String {
    listing_suffix(symbol)
        .map(|s| s.to_uppercase())
        .unwrap_or_else(|| "US".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_by_suffix() {
        assert_eq!(AssetClass::classify("BTC-USD", None), AssetClass::Crypto);
        assert_eq!(AssetClass::classify("eth-eur", None), AssetClass::Crypto);
        assert_eq!(AssetClass::classify("EURUSD=X", None), AssetClass::Currency);
        assert_eq!(AssetClass::classify("AAPL", None), AssetClass::Listed);
        // 美股B类股不是加密货币
        assert_eq!(AssetClass::classify("BRK-B", None), AssetClass::Listed);
    }

    #[test]
    fn test_classify_by_instrument_type() {
        assert_eq!(AssetClass::classify("XYZ", Some("CRYPTOCURRENCY")), AssetClass::Crypto);
        assert_eq!(AssetClass::classify("XYZ", Some("EQUITY")), AssetClass::Listed);
    }

    #[test]
    fn test_exchange_code() {
        assert_eq!(exchange_code("ASML.AS"), "AS");
        assert_eq!(exchange_code("AAPL"), "US");
        assert_eq!(listing_suffix(".AS"), None);
    }
}
