//! Web-grounded answers from Perplexity's chat API.

use futures::StreamExt;

use crate::error::Result;
use crate::llm::{ChatStream, LanguageModel, OpenAIClient};
use crate::message::Message;

pub const PERPLEXITY_SYSTEM_PROMPT: &str = "You are an artificial intelligence assistant and you need to search the web and summarize the results.";

pub fn perplexity_messages(question: &str) -> Vec<Message> {
    vec![
        Message::system(PERPLEXITY_SYSTEM_PROMPT),
        Message::user(question),
    ]
}

/// Blocking variant: waits for the whole answer.
pub async fn ask_perplexity(client: &OpenAIClient, question: &str) -> Result<String> {
    let completion = client
        .complete_chat(&perplexity_messages(question), &[], false)
        .await?;
    Ok(completion.content.unwrap_or_default())
}

/// Streaming variant: yields the answer as it is generated.
pub async fn stream_perplexity(client: &OpenAIClient, question: &str) -> Result<ChatStream> {
    client.stream_chat(&perplexity_messages(question)).await
}

/// Drain a stream, handing every delta to `on_delta`, and return the whole text.
pub async fn collect_stream(mut stream: ChatStream, mut on_delta: impl FnMut(&str)) -> Result<String> {
    let mut answer = String::new();
    while let Some(delta) = stream.next().await {
        let delta = delta?;
        on_delta(&delta);
        answer.push_str(&delta);
    }
    Ok(answer)
}
