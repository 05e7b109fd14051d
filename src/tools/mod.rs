//! Tools module - toolkits the agents bind to their models.
//!
//! - Calculator: integer arithmetic
//! - Web search: Tavily-backed search

pub mod calculator;
pub mod web_search;

pub use calculator::calculator_toolkit;
pub use web_search::{
    web_search_toolkit, SearchResponse, SearchResult, SearchTopic, TavilyClient, WebSearchConfig,
    WebSearchTool,
};
