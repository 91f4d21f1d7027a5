use crate::domain::intent::Intent;
use crate::llm::json::strip_code_fence;
use crate::llm::{ChatMessage, LlmClient};

const SYSTEM_PROMPT: &str = "You convert a user's analytics question into a minimal JSON intent \
for a KPI API. Respond with STRICT JSON only.";

const INTENT_SCHEMA: &str = r#"Return ONLY valid JSON matching this schema (no markdown, no prose):
{
  "intent": "compare_cac_roas_last_vs_prior",
  "n_days": <integer from 1 to 3650, default 30>,
  "metrics": ["CAC", "ROAS"]
}
Rules:
- If the question asks to compare CAC/ROAS for "last N days vs prior/previous N days", set "intent" exactly as above and extract N (default 30).
- "metrics" may additionally include "spend" and "conversions".
- Ignore casing and punctuation in the question.
- Do not include any keys other than the three above."#;

pub struct IntentParser {
    llm: Box<dyn LlmClient>,
}

impl IntentParser {
    pub fn new(llm: Box<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub fn messages(question: &str) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!("Question: {question}\n\n{INTENT_SCHEMA}")),
        ]
    }

    /// `Ok(None)` means the reply was not usable; transport failures are errors.
    pub async fn parse(&self, question: &str) -> anyhow::Result<Option<Intent>> {
        let reply = self.llm.complete(&Self::messages(question)).await?;
        let intent = Self::interpret(&reply);
        if intent.is_none() {
            tracing::warn!(
                provider = %self.llm.provider(),
                reply_len = reply.len(),
                "model reply is not a supported intent"
            );
        }
        Ok(intent)
    }

    pub fn interpret(reply: &str) -> Option<Intent> {
        let value = serde_json::from_str::<serde_json::Value>(strip_code_fence(reply)).ok()?;
        Intent::from_value(&value)
    }
}
