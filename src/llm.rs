use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::brag::BragDocument;
use crate::config::LlmConfig;
use crate::error::AppError;

const SYSTEM_PROMPT: &str = "Você é um assistente que ajuda profissionais de tecnologia a \
escrever o seu Brag Document: um registro das próprias conquistas usado em avaliações de \
desempenho e promoções. Responda sempre em português do Brasil.";

/// Trecho máximo do corpo de erro guardado em `AppError::Llm`.
const ERROR_BODY_LIMIT: usize = 500;

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AppError>;
    fn model(&self) -> &str;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint (OpenRouter by default).
pub struct OpenAiCompatClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatClient {
    /// `None` quando não há chave configurada.
    pub fn from_config(cfg: &LlmConfig) -> Result<Option<Self>, AppError> {
        let Some(api_key) = cfg.api_key.clone().filter(|k| !k.trim().is_empty()) else {
            return Ok(None);
        };
        let client = Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .user_agent("Bragfy/0.1")
            .build()?;
        Ok(Some(Self {
            client,
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: cfg.model.clone(),
        }))
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AppError> {
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.4,
        };

        let resp = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .header("X-Title", "Bragfy")
            .json(&payload)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AppError::Llm {
                status: status.as_u16(),
                detail: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }

        let parsed: ChatResponse = resp.json().await?;
        extract_content(parsed)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

fn extract_content(resp: ChatResponse) -> Result<String, AppError> {
    resp.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::Llm {
            status: 200,
            detail: "empty completion".into(),
        })
}

/// Monta a mensagem do usuário com as atividades do período.
pub fn build_prompt(doc: &BragDocument) -> String {
    let mut prompt = format!(
        "Abaixo estão as atividades que {} registrou entre {}.\n\n",
        doc.user_name,
        doc.period_label()
    );
    prompt.push_str(&doc.render_text());
    prompt.push_str(
        "\nEscreva um resumo profissional dessas atividades para um Brag Document:\n\
         1. Um parágrafo curto de visão geral do período.\n\
         2. Destaques agrupados por tema (entregas, colaboração, aprendizado, liderança), \
         em tópicos, com foco em impacto.\n\
         3. Uma frase final com sugestões do que registrar nas próximas semanas.\n\
         Não invente atividades que não estão na lista. Use no máximo 300 palavras. \
         Não use Markdown; use apenas texto simples com hífens para tópicos.",
    );
    prompt
}

/// Gera o resumo por IA. Documento vazio não chama o modelo.
pub async fn summarize(client: &dyn LlmClient, doc: &BragDocument) -> Result<String, AppError> {
    if doc.is_empty() {
        return Err(AppError::Validation(doc.empty_message()));
    }

    let prompt = build_prompt(doc);
    tracing::info!(
        model = client.model(),
        activities = doc.total(),
        prompt_len = prompt.len(),
        "Requesting LLM summary"
    );
    client.complete(SYSTEM_PROMPT, &prompt).await
}
