use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::Serialize;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::body_map::{self, BodySide, Circle};
use crate::config::ChatConfig;
use crate::error::{CoachError, Result};

use super::dto::{AnalyzeRequest, AnalyzeResponse, ChatContext, ChatRequest, ChatResponse, MuscleContext};

/// One try plus one retry
const MAX_ATTEMPTS: u32 = 2;
const RETRY_DELAY_MS: u64 = 500;

const FALLBACK_SESSION_ID: &str = "local-fallback";
const DEFAULT_VIDEO_QUERY: &str = "safe home mobility exercise";
const YOUTUBE_RESULTS: &str = "https://www.youtube.com/results";

/// Request/response contract of the chat backend
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;
    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse>;
}

/// JSON over HTTP with a per-request timeout
pub struct HttpTransport {
    client: Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("armonia-coach/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CoachError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    fn map_err(&self, e: reqwest::Error) -> CoachError {
        if e.is_timeout() {
            CoachError::BackendTimeout {
                timeout_ms: self.timeout.as_millis() as u64,
            }
        } else {
            CoachError::Backend(e.to_string())
        }
    }

    async fn post<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_err(e))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CoachError::Backend(format!("{} returned {}", path, status)));
        }
        response.json::<Value>().await.map_err(|e| self.map_err(e))
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let value = self.post("/api/chat", request).await?;
        ChatResponse::from_value(value, request.session_id.as_deref())
    }

    async fn analyze(&self, request: &AnalyzeRequest) -> Result<AnalyzeResponse> {
        let value = self.post("/api/analyze", request).await?;
        serde_json::from_value(value).map_err(|e| CoachError::Backend(format!("bad analyze response: {}", e)))
    }
}

async fn with_retry<T, F, Fut>(what: &str, mut attempt: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut tries = 0;
    loop {
        tries += 1;
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if tries < MAX_ATTEMPTS => {
                warn!("{} failed (attempt {}/{}): {}", what, tries, MAX_ATTEMPTS, e);
                sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// YouTube search page for `query`
pub fn youtube_search_url(query: &str) -> String {
    Url::parse_with_params(YOUTUBE_RESULTS, &[("search_query", query)])
        .map(String::from)
        .unwrap_or_else(|_| YOUTUBE_RESULTS.to_string())
}

/// Reply used when the backend can't be reached
pub fn fallback_reply(request: &ChatRequest) -> ChatResponse {
    let query = request
        .context
        .muscles
        .first()
        .and_then(|m| {
            [m.muscle_en.as_str(), m.muscle_ar.as_str()]
                .into_iter()
                .find(|s| !s.trim().is_empty())
        })
        .unwrap_or(DEFAULT_VIDEO_QUERY);
    let youtube = youtube_search_url(query);

    let greeting = request.user_message.to_lowercase().contains("سلام");
    let reply = if greeting {
        format!(
            "وعليكم السلام! السيرفر متعذر حاليًا. تقدر تبدأ بخطة خفيفة: 5–10 دقائق إحماء (مشي/دراجة)، ثم تمارين حركة خفيفة. هذا بحث قد يفيدك: {}",
            youtube
        )
    } else {
        format!(
            "الخدمة متعذّرة مؤقتًا، لكن تقدر تبدأ بإحماء 5–10 دقائق وتمارين مدى حركة خفيفة بدون ألم. هذا بحث قد يساعدك: {}",
            youtube
        )
    };

    ChatResponse {
        session_id: request
            .session_id
            .clone()
            .unwrap_or_else(|| FALLBACK_SESSION_ID.to_string()),
        reply,
        turns: 0,
        used_openai: false,
        youtube,
        ui_text: None,
    }
}

/// Chat and selection analysis that never fail: after one retry the
/// client answers locally.
pub struct ChatClient<T = HttpTransport> {
    transport: T,
    language: String,
    /// Backend conversation id, kept for this process only
    session_id: Option<String>,
}

impl ChatClient<HttpTransport> {
    pub fn from_config(config: &ChatConfig) -> Result<Self> {
        Ok(Self::new(HttpTransport::from_config(config)?, &config.language))
    }
}

impl<T: ChatTransport> ChatClient<T> {
    pub fn new(transport: T, language: &str) -> Self {
        Self {
            transport,
            language: language.to_string(),
            session_id: None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn forget_session(&mut self) {
        self.session_id = None;
    }

    pub async fn send_chat(&mut self, message: &str, muscles: &[MuscleContext]) -> ChatResponse {
        let request = ChatRequest {
            session_id: self.session_id.clone(),
            user_message: message.to_string(),
            context: ChatContext {
                muscles: muscles.to_vec(),
            },
            language: self.language.clone(),
        };

        let (transport, req) = (&self.transport, &request);
        match with_retry("chat", move || transport.chat(req)).await {
            Ok(response) => {
                debug!("chat reply for session {}", response.session_id);
                if !response.session_id.is_empty() {
                    self.session_id = Some(response.session_id.clone());
                }
                response
            }
            Err(e) => {
                warn!("chat backend unavailable, answering locally: {}", e);
                fallback_reply(&request)
            }
        }
    }

    /// Backend analysis, or the local body map when the backend fails or
    /// returns nothing
    pub async fn analyze(&self, side: BodySide, circle: Circle) -> AnalyzeResponse {
        let request = AnalyzeRequest { side, circle };
        let (transport, req) = (&self.transport, &request);
        match with_retry("analyze", move || transport.analyze(req)).await {
            Ok(response) if !response.results.is_empty() => response,
            Ok(_) => {
                debug!("backend analysis empty, using local body map");
                body_map::analyze_circle(side, &circle).into()
            }
            Err(e) => {
                warn!("analyze backend unavailable, using local body map: {}", e);
                body_map::analyze_circle(side, &circle).into()
            }
        }
    }
}
