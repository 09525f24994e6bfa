//! Prompt for the binary causal-relation judgment.
//!
//! Domain logic for rendering the annotation prompt. Provider-agnostic.

/// Fixed system instruction for the causal judgment. The reply contract
/// is JSON-only `{"label": 0 or 1, "confidence": 0..1}`; the instruction
/// explicitly pushes back against defaulting to 0, which cheap models
/// otherwise do on requirements-style text.
pub const CAUSAL_SYSTEM_PROMPT: &str = r#"You are a careful annotator for *causal relations* in one sentence.

Goal: return ONLY JSON: {"label": 0 or 1, "confidence": number 0..1}

Labeling rule (binary):
- label=1 if the sentence states or clearly implies that X causes/leads to/makes Y happen (explicit markers like because, due to, leads to, causes, results in; or clear implied cause→effect).
- label=0 if it is merely descriptive, correlational, temporal ("after", "when" without causal force), or unclear.

IMPORTANT:
- Do NOT default to 0. In typical software/requirements text, **25–40%** of sentences are causal.
- If causal cues or a clear mechanism are present, choose 1.

Examples (POSITIVE):
- "This change caused a crash." -> {"label":1, "confidence":0.95}
- "Due to a race condition, requests time out under load." -> {"label":1, "confidence":0.9}
- "If the token is missing, the API rejects the request." -> {"label":1, "confidence":0.8}
- "Increasing the batch size leads to higher memory usage." -> {"label":1, "confidence":0.85}

Examples (NEGATIVE):
- "We updated the documentation." -> {"label":0, "confidence":0.95}
- "Memory usage is high and latency increased." (no cause stated) -> {"label":0, "confidence":0.7}
- "After deployment, we saw errors." (temporal only) -> {"label":0, "confidence":0.6}
"#;

/// Rendered prompt ready for the provider adapter.
#[derive(Debug, Clone)]
pub struct PromptInstance {
    pub system: String,
    pub user: String,
}

impl PromptInstance {
    /// Single-string form for APIs that take one combined input instead
    /// of a message list.
    pub fn combined_input(&self) -> String {
        format!("{}\n\n{}", self.system.trim_end(), self.user)
    }
}

/// Escape double quotes so the sentence survives inside the quoted
/// template.
fn escape_quotes(s: &str) -> String {
    s.replace('"', "\\\"")
}

/// Render the judgment prompt for one sentence.
pub fn render_sentence_prompt(text: &str) -> PromptInstance {
    PromptInstance {
        system: CAUSAL_SYSTEM_PROMPT.to_string(),
        user: format!("Sentence: \"{}\"\nReturn JSON only.", escape_quotes(text)),
    }
}
