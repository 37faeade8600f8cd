//! Question answering over the ingested documents
//!
//! Retrieval always runs; the chat model is optional. Without one, or when
//! the model call fails, the answer is built from the retrieved chunks alone.

use crate::config::{ChatConfig, EmbeddingConfig};
use crate::error::{PipelineError, Result};
use crate::ml::EmbeddingClient;
use crate::storage::{ScoredRecord, VectorStore};
use crate::utils::preview;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
};
use async_openai::{Client, config::OpenAIConfig};
use serde::Serialize;

const NO_RESULTS_ANSWER: &str = "I couldn't find any relevant information in the knowledge base.";

const SYSTEM_PROMPT: &str = "You are a helpful assistant answering questions about a collection of PDF documents.\n\nWhen answering questions:\n1. Use the provided context from the documents when relevant\n2. Be clear about what comes from the documents and what is general knowledge\n3. If the context doesn't contain enough information, say so clearly\n4. Keep answers accurate and concise";

/// Characters of each chunk shown in a context-only answer
const PREVIEW_CHARS: usize = 200;

/// Answer to a question
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Retrieved chunks the answer is based on, best first
    pub sources: Vec<ScoredRecord>,
    /// Whether the text came from the chat model
    pub used_llm: bool,
}

/// OpenAI-compatible chat completions client
pub struct ChatClient {
    client: Client<OpenAIConfig>,
    config: ChatConfig,
}

impl ChatClient {
    /// Build a client from the shared API credentials. Returns `None` when
    /// neither an API key nor a custom base URL is configured.
    pub fn from_config(embedding: &EmbeddingConfig, chat: &ChatConfig) -> Option<Self> {
        let api_key = embedding.api_key.as_deref().unwrap_or_default();
        if api_key.is_empty() && embedding.base_url.is_none() {
            return None;
        }

        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base_url) = &embedding.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Some(Self {
            client: Client::with_config(openai_config),
            config: chat.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    pub fn context_chunks(&self) -> usize {
        self.config.context_chunks
    }

    /// Ask the model `question` with `context` prepended
    pub async fn complete(&self, question: &str, context: &str) -> Result<String> {
        let user_message = if context.trim().is_empty() {
            question.to_string()
        } else {
            format!("Context from the documents:\n{}\n\nQuestion: {}", context, question)
        };

        let messages = vec![
            ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                content: ChatCompletionRequestSystemMessageContent::Text(SYSTEM_PROMPT.to_string()),
                name: None,
            }),
            ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(user_message),
                name: None,
            }),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.config.model.as_str())
            .messages(messages)
            .max_tokens(self.config.max_tokens)
            .temperature(self.config.temperature)
            .build()?;

        let response = self.client.chat().create(request).await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| PipelineError::Generic("No content in chat response".to_string()))
    }
}

/// Retrieve the `top_k` chunks most similar to `query`, from one document
/// when `filename` is given or from all of them otherwise
pub async fn search(
    query: &str,
    top_k: usize,
    filename: Option<&str>,
    embedder: &dyn EmbeddingClient,
    store: &dyn VectorStore,
) -> Result<Vec<ScoredRecord>> {
    if query.trim().is_empty() {
        return Err(PipelineError::InvalidArgument(
            "search query is empty".to_string(),
        ));
    }

    let start_time = std::time::Instant::now();
    let embedding = embedder.embed(query).await?;
    let results = store.query(&embedding, top_k, filename)?;
    log::debug!(
        "Found {} results for {:?} in {:.3}s",
        results.len(),
        query,
        start_time.elapsed().as_secs_f64()
    );
    Ok(results)
}

/// Answer `question` from the stored chunks, using the chat model if given
pub async fn ask(
    question: &str,
    top_k: usize,
    filename: Option<&str>,
    embedder: &dyn EmbeddingClient,
    store: &dyn VectorStore,
    chat: Option<&ChatClient>,
) -> Result<Answer> {
    let sources = search(question, top_k, filename, embedder, store).await?;

    if sources.is_empty() {
        return Ok(Answer {
            text: NO_RESULTS_ANSWER.to_string(),
            sources,
            used_llm: false,
        });
    }

    let Some(chat) = chat else {
        return Ok(Answer {
            text: context_only_answer(&sources, 3),
            sources,
            used_llm: false,
        });
    };

    let context = sources
        .iter()
        .take(chat.context_chunks().max(1))
        .map(|result| format!("[{}]: {}", result.record.filename, result.record.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    match chat.complete(question, &context).await {
        Ok(text) => Ok(Answer {
            text,
            sources,
            used_llm: true,
        }),
        Err(e) => {
            log::warn!("Chat model error: {}. Falling back to context-only answer.", e);
            Ok(Answer {
                text: context_only_answer(&sources, chat.context_chunks().max(1)),
                sources,
                used_llm: false,
            })
        }
    }
}

fn context_only_answer(sources: &[ScoredRecord], limit: usize) -> String {
    let mut answer = "Based on the documents, here's what I found:\n\n".to_string();
    for (i, result) in sources.iter().take(limit).enumerate() {
        answer.push_str(&format!(
            "{}. [{}] {}\n\n",
            i + 1,
            result.record.filename,
            preview(&result.record.text, PREVIEW_CHARS)
        ));
    }
    answer.trim_end().to_string()
}
