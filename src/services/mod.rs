pub mod chart_service;
pub mod fetcher;
pub mod symbol_resolver;
