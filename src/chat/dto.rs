use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::body_map::{Analysis, BodySide, Circle, MuscleHit};
use crate::error::{CoachError, Result};

use super::format::{clean_model_text, non_blank, pick_ui_text};

/// Muscle the user selected, passed along so replies can be specific
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuscleContext {
    pub muscle_ar: String,
    pub muscle_en: String,
    pub region: String,
    pub prob: f64,
}

impl From<&MuscleHit> for MuscleContext {
    fn from(hit: &MuscleHit) -> Self {
        Self {
            muscle_ar: hit.muscle_ar.clone(),
            muscle_en: hit.muscle_en.clone(),
            region: hit.region.clone(),
            prob: hit.prob,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatContext {
    #[serde(default)]
    pub muscles: Vec<MuscleContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub session_id: Option<String>,
    pub user_message: String,
    pub context: ChatContext,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub reply: String,
    #[serde(default)]
    pub turns: u32,
    #[serde(default, rename = "usedOpenAI", alias = "used_openai")]
    pub used_openai: bool,
    #[serde(default)]
    pub youtube: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ui_text: Option<String>,
}

impl ChatResponse {
    /// Accepts the current response shape, or anything carrying `ui_text` /
    /// `reply` from older backends
    pub fn from_value(value: Value, session_id: Option<&str>) -> Result<Self> {
        match serde_json::from_value::<ChatResponse>(value.clone()) {
            Ok(response) => Ok(response),
            Err(e) => {
                let text = match &value {
                    Value::Object(_) => non_blank(&value, "ui_text")
                        .or_else(|| non_blank(&value, "reply"))
                        .unwrap_or_default(),
                    Value::String(_) => pick_ui_text(&value),
                    _ => String::new(),
                };
                if text.is_empty() {
                    return Err(CoachError::Backend(format!("unexpected chat response: {}", e)));
                }
                Ok(Self {
                    session_id: value
                        .get("session_id")
                        .and_then(Value::as_str)
                        .or(session_id)
                        .unwrap_or_default()
                        .to_string(),
                    reply: text,
                    turns: 0,
                    used_openai: false,
                    youtube: String::new(),
                    ui_text: None,
                })
            }
        }
    }

    /// Cleaned text for display, preferring `ui_text`
    pub fn display_text(&self) -> String {
        let raw = self
            .ui_text
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or(&self.reply);
        clean_model_text(raw)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub side: BodySide,
    pub circle: Circle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    #[serde(default)]
    pub results: Vec<MuscleHit>,
    #[serde(default)]
    pub region_hint: Option<String>,
    #[serde(default)]
    pub region_conf: Option<f64>,
    /// True when computed on this machine instead of the backend
    #[serde(default, skip_serializing)]
    pub local: bool,
}

impl From<Analysis> for AnalyzeResponse {
    fn from(a: Analysis) -> Self {
        Self {
            results: a.results,
            region_hint: a.region_hint,
            region_conf: a.region_conf,
            local: true,
        }
    }
}

impl AnalyzeResponse {
    pub fn muscles(&self) -> Vec<MuscleContext> {
        self.results.iter().map(MuscleContext::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_wire_format() {
        let req = ChatRequest {
            session_id: None,
            user_message: "hello".to_string(),
            context: ChatContext::default(),
            language: "ar".to_string(),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(
            v,
            json!({"session_id": null, "user_message": "hello", "context": {"muscles": []}, "language": "ar"})
        );
    }

    #[test]
    fn test_response_accepts_backend_casing() {
        let v = json!({"session_id": "s1", "reply": "hi", "turns": 2, "usedOpenAI": true, "youtube": "y"});
        let r = ChatResponse::from_value(v, None).unwrap();
        assert!(r.used_openai);
        assert_eq!(r.turns, 2);
    }

    #[test]
    fn test_response_from_legacy_shape() {
        let v = json!({"ui_text": "stretch gently"});
        let r = ChatResponse::from_value(v, Some("s9")).unwrap();
        assert_eq!(r.reply, "stretch gently");
        assert_eq!(r.session_id, "s9");
        assert!(ChatResponse::from_value(json!({}), None).is_err());
    }

    #[test]
    fn test_response_without_text_is_rejected() {
        assert!(ChatResponse::from_value(json!({"turns": 3, "youtube": "y"}), None).is_err());
        assert!(ChatResponse::from_value(json!({"ui_text": "  ", "reply": ""}), None).is_err());
        assert!(ChatResponse::from_value(json!([1, 2]), None).is_err());

        let r = ChatResponse::from_value(json!("```json\n{}\n```\nbend the knees"), Some("s2")).unwrap();
        assert_eq!(r.reply, "bend the knees");
        assert_eq!(r.session_id, "s2");
    }

    #[test]
    fn test_display_text_prefers_ui_text() {
        let mut r = ChatResponse::from_value(json!({"session_id": "s", "reply": "from reply"}), None).unwrap();
        assert_eq!(r.display_text(), "from reply");
        r.ui_text = Some("from ui\n\n\n\nok".to_string());
        assert_eq!(r.display_text(), "from ui\n\nok");
    }

    #[test]
    fn test_analyze_request_wire_format() {
        let req = AnalyzeRequest {
            side: BodySide::Back,
            circle: Circle { cx: 0.5, cy: 0.25, radius: 0.1 },
        };
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["side"], "back");
        assert_eq!(v["circle"]["radius"], 0.1);
    }

    #[test]
    fn test_analyze_response_without_results() {
        let r: AnalyzeResponse = serde_json::from_value(json!({})).unwrap();
        assert!(r.results.is_empty());
        assert!(!r.local);
    }
}
