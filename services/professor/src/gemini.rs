//! `ProfessorService` implementation backed by the Gemini `generateContent`
//! REST API: one JSON-mode model for the structured critique, a lighter model
//! for counter-critique replies, and a TTS model for the professor's voice.

use crate::config::Config;
use anasagashi_core::critique::CritiqueReply;
use anasagashi_core::dialogue::Role;
use anasagashi_core::service::{CritiqueRequest, ProfessorService};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Reply when the counter model returns an empty body.
const COUNTER_FALLBACK: &str = "Silence.";

pub struct GeminiProfessor {
    client: reqwest::Client,
    api_key: String,
    critique_model: String,
    counter_model: String,
    tts_model: String,
}

// --- Wire types ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<Blob>,
}

impl Part {
    fn text(text: impl Into<String>) -> Part {
        Part {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    fn inline(mime_type: &str, data: &str) -> Part {
        Part {
            inline_data: Some(Blob {
                mime_type: mime_type.to_string(),
                data: data.to_string(),
            }),
            ..Default::default()
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct Blob {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_modalities: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    speech_config: Option<SpeechConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig {
    voice_config: VoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig {
    prebuilt_voice_config: PrebuiltVoiceConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig {
    voice_name: String,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    error: Option<ApiError>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
struct ResponsePart {
    text: Option<String>,
    inline_data: Option<Blob>,
}

#[derive(Deserialize, Debug)]
struct ApiError {
    message: String,
}

impl GenerateResponse {
    fn first_part(self) -> Result<ResponsePart> {
        if let Some(err) = self.error {
            return Err(anyhow!("API returned error: {}", err.message));
        }
        let candidate = self
            .candidates
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No candidates in response"))?;
        let reason = candidate.finish_reason.clone();
        candidate
            .content
            .and_then(|c| c.parts.into_iter().next())
            .ok_or_else(|| {
                anyhow!(
                    "Response carried no content. Finish reason: {}",
                    reason.as_deref().unwrap_or("UNKNOWN")
                )
            })
    }

    fn first_text(self) -> Result<String> {
        self.first_part()?
            .text
            .ok_or_else(|| anyhow!("Response part carried no text"))
    }

    fn first_inline_data(self) -> Result<String> {
        self.first_part()?
            .inline_data
            .map(|b| b.data)
            .ok_or_else(|| anyhow!("Response part carried no inline data"))
    }
}

/// JSON-mode models occasionally wrap their output in a markdown fence
/// anyway; strip it before parsing.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

impl GeminiProfessor {
    pub fn new(config: &Config) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: config.gemini_api_key.clone(),
            critique_model: config.critique_model.clone(),
            counter_model: config.counter_model.clone(),
            tts_model: config.tts_model.clone(),
        }
    }

    async fn generate(&self, model: &str, request: &GenerateRequest) -> Result<GenerateResponse> {
        let url = format!("{API_BASE}/{model}:generateContent?key={}", self.api_key);

        let resp = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .with_context(|| format!("Request to model '{model}' failed"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            return Err(anyhow!("API error ({status}): {error_text}"));
        }

        let response_text = resp.text().await?;
        serde_json::from_str(&response_text).map_err(|e| {
            anyhow!("Failed to parse generateContent response: {e}. Body: {response_text}")
        })
    }

    fn critique_prompt(request: &CritiqueRequest) -> String {
        let mut prompt = String::new();
        if request.slides.is_empty() {
            prompt.push_str(
                "Review the following report from the standpoint of scientific writing \
                 conventions and logical structure.\n\n[REPORT]\n",
            );
            prompt.push_str(request.report.as_deref().unwrap_or_default());
            prompt.push_str(
                "\n\nAs a university professor, point out 3 to 5 holes in this report \
                 (logical leaps, inappropriate wording, inconsistent notation, missing \
                 evidence). For each objection include the exact problematic passage as \
                 `originalText` (quoted verbatim, character for character) and a concrete \
                 fix as `suggestion`.\n",
            );
        } else {
            prompt.push_str(
                "Review the attached presentation slides from the standpoint of research \
                 rigour and logical structure. As a university professor, point out 3 to 5 \
                 holes (logical leaps, weak evidence, unreadable figures, missing \
                 definitions). For each objection report the zero-based `slideIndex` it \
                 refers to, and where possible a `coordinates` rectangle {x, y, w, h} in \
                 percent of the slide image.\n",
            );
            if let Some(transcript) = request
                .transcript
                .as_deref()
                .filter(|t| !t.trim().is_empty())
            {
                prompt.push_str("\n[PRESENTATION TRANSCRIPT]\n");
                prompt.push_str(transcript);
                prompt.push('\n');
            }
        }
        prompt.push_str(
            "\nOutput STRICT JSON of the shape:\n\
             {\"overallComment\": \"...\", \"feedbacks\": [{\"id\": \"...\", \
             \"title\": \"...\", \"comment\": \"...\", \"holeType\": \"...\", ...}]}\n\
             `overallComment` is the professor's terse, severe summary verdict.\n",
        );
        prompt
    }
}

#[async_trait]
impl ProfessorService for GeminiProfessor {
    async fn critique(&self, request: CritiqueRequest) -> Result<CritiqueReply> {
        let mut parts: Vec<Part> = request
            .slides
            .iter()
            .map(|page| Part::inline("image/png", page))
            .collect();
        parts.push(Part::text(Self::critique_prompt(&request)));

        let body = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            system_instruction: Some(SystemInstruction {
                parts: vec![Part::text(&request.system_prompt)],
            }),
            generation_config: Some(GenerationConfig {
                response_mime_type: Some("application/json".to_string()),
                temperature: Some(0.4),
                ..Default::default()
            }),
        };

        let text = self
            .generate(&self.critique_model, &body)
            .await?
            .first_text()?;
        let reply: CritiqueReply = serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| anyhow!("Critique reply is not valid JSON: {e}. Body: {text}"))?;
        Ok(reply)
    }

    async fn synthesize_voice(&self, text: &str, voice: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part::text(format!(
                    "Speak in a calm, slightly stern tone: {text}"
                ))],
            }],
            system_instruction: None,
            generation_config: Some(GenerationConfig {
                response_modalities: Some(vec!["AUDIO".to_string()]),
                speech_config: Some(SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig {
                            voice_name: voice.to_string(),
                        },
                    },
                }),
                ..Default::default()
            }),
        };

        self.generate(&self.tts_model, &body)
            .await?
            .first_inline_data()
            .context("Voice generation failed")
    }

    async fn transcribe(&self, audio_base64: &str, mime_type: &str) -> Result<String> {
        let body = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![
                    Part::inline(mime_type, audio_base64),
                    Part::text(
                        "Transcribe this presentation recording verbatim. \
                         Output only the transcript text, nothing else.",
                    ),
                ],
            }],
            system_instruction: None,
            generation_config: None,
        };

        let text = self
            .generate(&self.counter_model, &body)
            .await?
            .first_text()?;
        Ok(text.trim().to_string())
    }

    async fn counter(
        &self,
        system_prompt: &str,
        history: &[(Role, String)],
        user_text: &str,
    ) -> Result<String> {
        let history_lines = history
            .iter()
            .map(|(role, text)| {
                let tag = match role {
                    Role::Professor => "professor",
                    Role::User => "student",
                };
                format!("{tag}: {text}")
            })
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "The discussion so far:\n{history_lines}\n\n\
             The student's rebuttal: \"{user_text}\"\n\n\
             As the professor, either dismantle this rebuttal further, or — if it has \
             a point — concede it sarcastically while pointing out a different hole. \
             Under no circumstances become gentle.",
        );

        let body = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part::text(prompt)],
            }],
            system_instruction: Some(SystemInstruction {
                parts: vec![Part::text(system_prompt)],
            }),
            generation_config: None,
        };

        let reply = self
            .generate(&self.counter_model, &body)
            .await?
            .first_text()
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        if reply.is_empty() {
            Ok(COUNTER_FALLBACK.to_string())
        } else {
            Ok(reply)
        }
    }
}
