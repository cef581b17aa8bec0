//! Reasoning service contract and the chat-completions client.
//!
//! The service receives a field name, value, and context, and must return a
//! structured verdict within a bounded time. Prompt construction and model
//! selection live here, behind the [`ReasoningService`] trait, so the rest
//! of the pipeline only depends on the contract.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use prospectclean_shared::{ProspectCleanError, Result};

/// User-Agent string for service requests.
const USER_AGENT: &str = concat!("prospectclean/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Request/verdict types
// ---------------------------------------------------------------------------

/// The attributes of a row subject to validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    LastName,
    FirstName,
    Company,
}

impl FieldKind {
    /// Stable token used in summary strings and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LastName => "lastname",
            Self::FirstName => "firstname",
            Self::Company => "company",
        }
    }

    /// Label used when talking to the reasoning service.
    fn label(&self) -> &'static str {
        match self {
            Self::LastName => "Nom",
            Self::FirstName => "Prénom",
            Self::Company => "Entreprise",
        }
    }
}

/// Auxiliary hints that travel with a field value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationContext {
    /// Email domain associated with the row, empty when absent.
    pub email_domain: String,
    /// The other half of the name pair, for name fields.
    pub companion_name: Option<String>,
}

/// One validation request handed to the reasoning service.
#[derive(Debug, Clone)]
pub struct ServiceRequest {
    pub field: FieldKind,
    pub value: String,
    pub context: ValidationContext,
}

/// Structured verdict returned by the reasoning service.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceVerdict {
    /// Corrected value (may equal the original).
    pub corrected_value: String,
    /// Confidence in [0.0, 1.0].
    pub confidence: f64,
    /// Free-text rationale.
    pub explanation: String,
    /// False when the service could not identify the entity.
    pub known_entity: bool,
    /// Supporting citation URLs.
    pub citations: Vec<String>,
}

/// Contract for the external reasoning service.
pub trait ReasoningService: Send + Sync {
    /// Assess one field value. Must resolve within the caller's deadline;
    /// every failure mode is an error, never a partial verdict.
    fn assess(
        &self,
        request: &ServiceRequest,
    ) -> impl std::future::Future<Output = Result<ServiceVerdict>> + Send;
}

// ---------------------------------------------------------------------------
// Chat-completions client
// ---------------------------------------------------------------------------

/// Configuration for [`OpenAiService`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Bearer token for the API.
    pub api_key: String,
    /// Model identifier.
    pub model: String,
    /// Base URL of the API (e.g. `https://api.openai.com/v1`).
    pub base_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Additional attempts after a failed request.
    pub max_retries: u32,
}

/// Production reasoning service backed by an OpenAI-compatible
/// chat-completions endpoint.
pub struct OpenAiService {
    config: ServiceConfig,
    client: Client,
}

impl OpenAiService {
    /// Create a new service client with the given configuration.
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| {
                ProspectCleanError::Validation(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.as_str().trim_end_matches('/')
        )
    }

    /// Send one chat completion, retrying on transport and server errors.
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: 0.1,
            max_tokens: 400,
        };

        let mut last_err = None;
        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
            }
            match self.try_complete(&body).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(attempt, error = %e, "completion attempt failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.expect("at least one attempt"))
    }

    async fn try_complete(&self, body: &ChatRequest<'_>) -> Result<String> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| ProspectCleanError::Validation(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProspectCleanError::Validation(format!("HTTP {status}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| ProspectCleanError::Validation(format!("response decode: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| ProspectCleanError::Validation("response has no choices".into()))
    }
}

impl ReasoningService for OpenAiService {
    fn assess(
        &self,
        request: &ServiceRequest,
    ) -> impl std::future::Future<Output = Result<ServiceVerdict>> + Send {
        async move {
            let messages = build_messages(request);
            let text = self.complete(&messages).await?;
            decode_verdict(&text)
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: String,
}

/// JSON payload the service is instructed to return.
#[derive(Debug, Deserialize)]
struct VerdictPayload {
    valeur_corrigee: String,
    confiance: f64,
    #[serde(default)]
    explication: String,
    #[serde(default = "default_known")]
    entreprise_connue: bool,
    #[serde(default)]
    citations: Vec<String>,
}

fn default_known() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Prompt construction
// ---------------------------------------------------------------------------

fn build_messages(request: &ServiceRequest) -> Vec<ChatMessage> {
    match request.field {
        FieldKind::Company => vec![
            ChatMessage {
                role: "system",
                content: COMPANY_INSTRUCTIONS.to_string(),
            },
            ChatMessage {
                role: "user",
                content: format!(
                    "Entreprise: \"{}\", Domaine email: \"{}\"",
                    request.value,
                    if request.context.email_domain.is_empty() {
                        "Non fourni"
                    } else {
                        &request.context.email_domain
                    }
                ),
            },
        ],
        FieldKind::LastName | FieldKind::FirstName => {
            let companion = request.context.companion_name.as_deref().unwrap_or("");
            vec![ChatMessage {
                role: "user",
                content: format!(
                    "Analyse et corrige si nécessaire ce champ d'identité.\n\
                     {label}: \"{value}\"\n\
                     Autre composante du nom: \"{companion}\"\n\
                     Domaine email: \"{domain}\"\n\n\
                     Problèmes possibles à corriger :\n\
                     - Inversion nom/prénom\n\
                     - Noms composés mal séparés\n\
                     - Noms multiculturels (portugais, indiens, chinois, etc.)\n\
                     - Noms de type « nom de mariage + nom de jeune-fille »\n\n\
                     Pour le score de confiance, évalue entre 0 et 1 :\n\
                     - Cohérence culturelle\n\
                     - Probabilité que la séparation soit correcte\n\
                     - Complexité du cas (noms composés = moins de confiance)\n\
                     - Certitude de la correction appliquée\n\n\
                     Réponds uniquement en JSON :\n\
                     {{\n\
                         \"valeur_corrigee\": \"valeur corrigée\",\n\
                         \"confiance\": 0.95,\n\
                         \"explication\": \"justification du score\"\n\
                     }}",
                    label = request.field.label(),
                    value = request.value,
                    domain = if request.context.email_domain.is_empty() {
                        "Non fourni"
                    } else {
                        &request.context.email_domain
                    },
                ),
            }]
        }
    }
}

const COMPANY_INSTRUCTIONS: &str = r#"# Identity
You are an expert in global companies and commercial brands.

# Instructions
- Ignore legal suffixes (SARL, SA, AG, etc.) when identifying the company.
- Return the current publicly used trade name.
- If recently renamed, use the new name.
- For subsidiaries, use the main brand unless distinct.
- Evaluate confidence (0-1) on:
    - Certainty of identification
    - Match with email domain
    - Whether it is well-known
- If not found, keep the cleaned name and mark it unknown.
- Preserve special characters. Do not guess or invent.
- You MUST return a JSON object with:

{
    "valeur_corrigee": "Meta",
    "confiance": 0.95,
    "explication": "Nom officiel après changement en 2021.",
    "entreprise_connue": true,
    "citations": ["https://example.com"]
}"#;

// ---------------------------------------------------------------------------
// Strict decode
// ---------------------------------------------------------------------------

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^```(?:json)?\s*(.*?)\s*```$").expect("fence regex"));

/// Strip a surrounding markdown code fence, if any.
fn strip_fences(text: &str) -> &str {
    let trimmed = text.trim();
    match FENCE_RE.captures(trimmed) {
        Some(caps) => caps.get(1).map_or(trimmed, |m| m.as_str()),
        None => trimmed,
    }
}

/// Decode a service reply into a [`ServiceVerdict`].
///
/// Any shape mismatch is an error here; nothing loosely typed crosses this
/// boundary.
fn decode_verdict(text: &str) -> Result<ServiceVerdict> {
    let payload: VerdictPayload = serde_json::from_str(strip_fences(text)).map_err(|e| {
        let preview: String = text.chars().take(200).collect();
        ProspectCleanError::Validation(format!(
            "undecodable verdict payload: {e} (got: {preview})"
        ))
    })?;

    Ok(ServiceVerdict {
        corrected_value: payload.valeur_corrigee,
        confidence: payload.confiance.clamp(0.0, 1.0),
        explanation: payload.explication,
        known_entity: payload.entreprise_connue,
        citations: payload.citations,
    })
}
