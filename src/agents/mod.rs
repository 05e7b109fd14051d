//! The agents built on the graph runtime.

pub mod clipping;
pub mod math;
pub mod perplexity;

pub use clipping::{
    clipping_agent_graph, search_instructions, ClippingAgent, ClippingState, ClippingUpdate,
};
pub use math::{math_agent_graph, MathAgent, MATH_SYSTEM_PROMPT};
pub use perplexity::{ask_perplexity, collect_stream, stream_perplexity};
