use crate::models::outcome::Diagnostic;
use crate::models::symbol::{exchange_code, SymbolMatch};
use crate::providers::{SymbolLookup, SymbolSearch};
use log::{debug, info, warn};
use serde::Serialize;
use std::sync::Arc;

/// Where the matches of a resolution came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResolutionSource {
    /// 直接查询确认的代码
    Primary,
    Search,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolution {
    pub query: String,
    pub matches: Vec<SymbolMatch>,
    pub source: ResolutionSource,
    pub diagnostics: Vec<Diagnostic>,
}

impl Resolution {
    fn unresolved(query: &str, diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            query: query.to_string(),
            matches: Vec::new(),
            source: ResolutionSource::Unresolved,
            diagnostics,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Best candidate, if any.
    pub fn best(&self) -> Option<&SymbolMatch> {
        self.matches.first()
    }
}

/// Turns free text into an ordered list of candidate symbols.
pub struct SymbolResolver {
    lookup: Option<Arc<dyn SymbolLookup + Send + Sync>>,
    search: Option<Arc<dyn SymbolSearch + Send + Sync>>,
    preferred_exchanges: Vec<String>,
}

impl SymbolResolver {
    pub fn new(
        lookup: Option<Arc<dyn SymbolLookup + Send + Sync>>,
        search: Option<Arc<dyn SymbolSearch + Send + Sync>>,
        preferred_exchanges: Vec<String>,
    ) -> Self {
        Self {
            lookup,
            search,
            preferred_exchanges,
        }
    }

    pub async fn resolve(&self, query: &str) -> Resolution {
        let query = query.trim();
        if query.is_empty() {
            return Resolution::unresolved(query, Vec::new());
        }

        let mut diagnostics = Vec::new();

        // 带空格的输入不可能是代码，直接走搜索
        if let Some(lookup) = self.lookup.as_ref().filter(|_| !query.contains(char::is_whitespace)) {
            let symbol = query.to_uppercase();
            match lookup.lookup(&symbol).await {
                Ok(Some(found)) => {
                    info!("Resolved '{}' directly to {}", query, found.symbol);
                    return Resolution {
                        query: query.to_string(),
                        matches: vec![found],
                        source: ResolutionSource::Primary,
                        diagnostics,
                    };
                }
                Ok(None) => debug!("'{}' is not a confirmed symbol", symbol),
                Err(e) => {
                    warn!("Symbol lookup for '{}' failed: {}", symbol, e);
                    diagnostics.push(Diagnostic::from_error(lookup.provider_name(), &e));
                }
            }
        }

        let search = match &self.search {
            Some(search) => search,
            None => return Resolution::unresolved(query, diagnostics),
        };

        match search.search(query).await {
            Ok(candidates) => {
                let matches = rank(query, candidates, &self.preferred_exchanges);
                info!("Search for '{}' returned {} candidates", query, matches.len());
                let source = if matches.is_empty() {
                    ResolutionSource::Unresolved
                } else {
                    ResolutionSource::Search
                };
                Resolution {
                    query: query.to_string(),
                    matches,
                    source,
                    diagnostics,
                }
            }
            Err(e) => {
                warn!("Symbol search for '{}' failed: {}", query, e);
                diagnostics.push(Diagnostic::from_error(search.provider_name(), &e));
                Resolution::unresolved(query, diagnostics)
            }
        }
    }
}

/// Orders candidates: exact symbol, then name match, then the rest. Inside a
/// tier listings on a preferred exchange come first; ties keep their order.
pub fn rank(query: &str, mut candidates: Vec<SymbolMatch>, preferred_exchanges: &[String]) -> Vec<SymbolMatch> {
    let upper = query.trim().to_uppercase();
    let lower = query.trim().to_lowercase();

    candidates.sort_by_key(|candidate| {
        let symbol = candidate.symbol.to_uppercase();
        let base = symbol.rsplit_once('.').map(|(base, _)| base).unwrap_or(&symbol);
        let tier = if symbol == upper || base == upper {
            0
        } else if candidate.display_name.to_lowercase().contains(&lower) {
            1
        } else {
            2
        };
        let preferred = is_preferred(candidate, preferred_exchanges);
        (tier, !preferred)
    });
    candidates
}

fn is_preferred(candidate: &SymbolMatch, preferred_exchanges: &[String]) -> bool {
    let code = exchange_code(&candidate.symbol);
    preferred_exchanges.iter().any(|p| {
        p.eq_ignore_ascii_case(&code)
            || candidate
                .exchange
                .as_deref()
                .map_or(false, |exchange| p.eq_ignore_ascii_case(exchange))
    })
}
