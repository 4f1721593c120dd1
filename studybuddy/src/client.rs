use crate::auth::config::{AppConfig, DEFAULT_TEMPERATURE};
use crate::models::{default_candidates, fetch_candidates};
use crate::persona::Persona;
use crate::providers::status::{is_quota_exceeded, parse_retry_after_ms};
use crate::providers::{GeminiClient, GenerativeBackend, ProviderError};
use crate::resolver::{probe_each, resolve_async, ProbeOutcome};
use crate::splitter::{normalize, split_with, strip_markers};
use crate::tts::{SpeechSynthesizer, TtsError};
use crate::types::*;
use bytes::Bytes;
use std::sync::Arc;

/// Failures of one submission, as the user experiences them.
#[derive(Debug, thiserror::Error)]
pub enum AskError {
    #[error("a question or a photo is required")]
    EmptyRequest,

    #[error("unknown subject: {0}")]
    UnknownSubject(String),

    #[error("no API key configured")]
    MissingApiKey,

    /// Every candidate model failed its probe.
    #[error("no usable model among {tried} candidate(s)")]
    BackendUnavailable { tried: usize },

    /// A model was resolved but the real generation call failed.
    #[error("generation with {model} failed: {source}")]
    GenerationFailed {
        model: String,
        quota_exceeded: bool,
        retry_after_ms: Option<u64>,
        #[source]
        source: ProviderError,
    },
}

impl AskError {
    /// Plain, apologetic text suitable for showing to a child.
    pub fn user_message(&self) -> String {
        match self {
            AskError::EmptyRequest => "질문을 입력해 주세요! 😉".into(),
            AskError::UnknownSubject(s) => format!("'{}' 과목은 아직 몰라요. 다른 과목을 골라 주세요.", s),
            AskError::MissingApiKey => "🚨 열쇠(Key)를 먼저 입력해 주세요.".into(),
            AskError::BackendUnavailable { .. } => {
                "미안해요, 지금은 짝꿍이 대답할 수 없어요. 잠시 후에 다시 물어봐 주세요. 💦".into()
            }
            AskError::GenerationFailed {
                quota_exceeded: true,
                retry_after_ms,
                ..
            } => match retry_after_ms {
                Some(ms) => format!(
                    "오늘 짝꿍이 너무 많이 대답해서 조금 쉬어야 해요. {}초 뒤에 다시 물어봐 주세요. 😴",
                    ms.div_ceil(1000)
                ),
                None => "오늘 짝꿍이 너무 많이 대답해서 조금 쉬어야 해요. 나중에 다시 물어봐 주세요. 😴".into(),
            },
            AskError::GenerationFailed { .. } => "오류가 났어요! 💦 다시 한 번 물어봐 주세요.".into(),
        }
    }

    pub fn is_quota_exceeded(&self) -> bool {
        matches!(self, AskError::GenerationFailed { quota_exceeded: true, .. })
    }
}

/// Where candidate models come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CandidateSource {
    /// A fixed list in probe order.
    Static(Vec<String>),
    /// The live catalog, falling back to the given list when it cannot be fetched.
    Catalog { fallback: Vec<String> },
}

/// Audio for one tagged phrase.
#[derive(Debug, Clone)]
pub struct PhraseAudio {
    /// The phrase as it appeared in the answer.
    pub phrase: String,
    /// The normalized text that was spoken.
    pub spoken: String,
    pub audio: Bytes,
}

/// High-level study buddy: resolves a model, asks it, and splits the reply.
///
/// Holds no per-submission state; every `ask` resolves the model again.
#[derive(Clone)]
pub struct StudyBuddy {
    backend: Arc<dyn GenerativeBackend>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    persona: Persona,
    candidates: CandidateSource,
    api_key: String,
    options: GenerationOptions,
}

impl StudyBuddy {
    pub fn builder() -> StudyBuddyBuilder {
        StudyBuddyBuilder::new()
    }

    pub fn persona(&self) -> &Persona {
        &self.persona
    }

    /// The ordered candidate list for one submission.
    pub async fn candidates(&self) -> Vec<String> {
        match &self.candidates {
            CandidateSource::Static(list) => list.clone(),
            CandidateSource::Catalog { fallback } => {
                match fetch_candidates(self.backend.as_ref(), &self.api_key).await {
                    Ok(list) if !list.is_empty() => list,
                    Ok(_) => {
                        tracing::warn!("model catalog is empty, using configured candidates");
                        fallback.clone()
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "model catalog unavailable, using configured candidates");
                        fallback.clone()
                    }
                }
            }
        }
    }

    /// Run the resolver over the current candidates.
    pub async fn resolve_model(&self) -> Result<String, AskError> {
        let candidates = self.candidates().await;
        let tried = candidates.len();
        let backend = &self.backend;
        let api_key = self.api_key.as_str();

        resolve_async(candidates, |model| async move {
            backend.probe(api_key, &model).await
        })
        .await
        .ok_or(AskError::BackendUnavailable { tried })
    }

    /// Probe every candidate, without stopping at the first success.
    pub async fn probe_report(&self) -> Vec<ProbeOutcome> {
        let candidates = self.candidates().await;
        let backend = &self.backend;
        let api_key = self.api_key.as_str();

        probe_each(candidates, |model| async move {
            backend.probe(api_key, &model).await
        })
        .await
    }

    /// Answer one submission.
    pub async fn ask(&self, request: &StudyRequest) -> Result<Answer, AskError> {
        request.validate()?;
        if !self.persona.has_subject(&request.subject) {
            return Err(AskError::UnknownSubject(request.subject.clone()));
        }

        let model = self.resolve_model().await?;
        self.ask_with_model(&model, request).await
    }

    /// Answer one submission with an already chosen model, skipping resolution.
    pub async fn ask_with_model(&self, model: &str, request: &StudyRequest) -> Result<Answer, AskError> {
        request.validate()?;
        let instruction = self.persona.render_instruction(&request.subject);

        let raw_text = self
            .backend
            .generate(&self.api_key, model, &instruction, request, &self.options)
            .await
            .map_err(|source| {
                tracing::warn!(model, error = %source, "generation failed");
                AskError::GenerationFailed {
                    model: model.to_string(),
                    quota_exceeded: is_quota_exceeded(&source),
                    retry_after_ms: parse_retry_after_ms(&source),
                    source,
                }
            })?;

        let segments = split_with(&raw_text, &self.persona.markers);
        tracing::info!(model, segments = segments.len(), "answer ready");

        Ok(Answer {
            model: model.to_string(),
            raw_text,
            segments,
        })
    }

    /// Synthesize every tagged phrase in the persona's phrase language.
    ///
    /// Phrases with nothing pronounceable after normalization are skipped.
    pub async fn speak_phrases(&self, answer: &Answer) -> Result<Vec<PhraseAudio>, TtsError> {
        let Some(speech) = &self.speech else {
            return Ok(Vec::new());
        };

        let mut out = Vec::new();
        for phrase in answer.foreign_phrases() {
            let spoken = normalize(phrase);
            if spoken.trim().is_empty() {
                tracing::debug!(phrase, "phrase has nothing to speak, skipping");
                continue;
            }
            let audio = speech.synthesize(spoken.trim(), &self.persona.phrase_lang).await?;
            out.push(PhraseAudio {
                phrase: phrase.to_string(),
                spoken,
                audio,
            });
        }
        Ok(out)
    }

    /// Read the whole answer aloud, markers removed, in the persona's speech language.
    pub async fn speak_answer(&self, answer: &Answer) -> Result<Option<Bytes>, TtsError> {
        let Some(speech) = &self.speech else {
            return Ok(None);
        };
        let text = strip_markers(&answer.raw_text, &self.persona.markers);
        speech.synthesize(&text, &self.persona.speech_lang).await.map(Some)
    }
}

pub struct StudyBuddyBuilder {
    backend: Option<Arc<dyn GenerativeBackend>>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    persona: Persona,
    candidates: CandidateSource,
    api_key: Option<String>,
    options: GenerationOptions,
}

impl StudyBuddyBuilder {
    pub fn new() -> Self {
        Self {
            backend: None,
            speech: None,
            persona: Persona::default(),
            candidates: CandidateSource::Static(default_candidates()),
            api_key: None,
            options: GenerationOptions {
                temperature: Some(DEFAULT_TEMPERATURE),
                max_output_tokens: None,
            },
        }
    }

    /// Apply persona, candidates, temperature and base URL from a config file.
    pub fn with_config(mut self, config: &AppConfig) -> Self {
        self.persona = config.persona.clone();
        self.candidates = if config.use_catalog {
            CandidateSource::Catalog {
                fallback: config.candidate_models.clone(),
            }
        } else {
            CandidateSource::Static(config.candidate_models.clone())
        };
        self.options.temperature = Some(config.effective_temperature());
        if self.backend.is_none() {
            if let Some(url) = config.base_url.as_deref().filter(|u| !u.trim().is_empty()) {
                self.backend = Some(Arc::new(GeminiClient::with_base_url(url)));
            }
        }
        self
    }

    pub fn with_backend(mut self, backend: Arc<dyn GenerativeBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_persona(mut self, persona: Persona) -> Self {
        self.persona = persona;
        self
    }

    pub fn with_candidates(mut self, candidates: CandidateSource) -> Self {
        self.candidates = candidates;
        self
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Fails with [`AskError::MissingApiKey`] when no non-blank key was given.
    pub fn build(self) -> Result<StudyBuddy, AskError> {
        let api_key = self
            .api_key
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or(AskError::MissingApiKey)?;

        Ok(StudyBuddy {
            backend: self
                .backend
                .unwrap_or_else(|| Arc::new(GeminiClient::new())),
            speech: self.speech,
            persona: self.persona,
            candidates: self.candidates,
            api_key,
            options: self.options,
        })
    }
}

impl Default for StudyBuddyBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::sanitize::api_error_body;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// In-memory backend: models in `live` answer probes; `reply` is returned by generate.
    struct FakeBackend {
        live: Vec<String>,
        catalog: Result<Vec<ModelInfo>, u16>,
        reply: Result<String, (u16, String)>,
        probed: Mutex<Vec<String>>,
        generated_with: Mutex<Vec<(String, String)>>,
    }

    impl FakeBackend {
        fn new(live: &[&str], reply: &str) -> Self {
            Self {
                live: live.iter().map(|s| s.to_string()).collect(),
                catalog: Err(503),
                reply: Ok(reply.to_string()),
                probed: Mutex::new(Vec::new()),
                generated_with: Mutex::new(Vec::new()),
            }
        }

        fn probed(&self) -> Vec<String> {
            self.probed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerativeBackend for FakeBackend {
        async fn generate(
            &self,
            _api_key: &str,
            model: &str,
            system_instruction: &str,
            _request: &StudyRequest,
            _options: &GenerationOptions,
        ) -> Result<String, ProviderError> {
            self.generated_with
                .lock()
                .unwrap()
                .push((model.to_string(), system_instruction.to_string()));
            match &self.reply {
                Ok(text) => Ok(text.clone()),
                Err((status, body)) => Err(api_error_body(*status, body)),
            }
        }

        async fn probe(&self, _api_key: &str, model: &str) -> Result<(), ProviderError> {
            self.probed.lock().unwrap().push(model.to_string());
            if self.live.iter().any(|m| m == model) {
                Ok(())
            } else {
                Err(api_error_body(404, &format!("models/{} is not found", model)))
            }
        }

        async fn list_models(&self, _api_key: &str) -> Result<Vec<ModelInfo>, ProviderError> {
            match &self.catalog {
                Ok(models) => Ok(models.clone()),
                Err(status) => Err(api_error_body(*status, "")),
            }
        }
    }

    struct FakeSpeech {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for FakeSpeech {
        async fn synthesize(&self, text: &str, lang: &str) -> Result<Bytes, TtsError> {
            self.calls.lock().unwrap().push((text.to_string(), lang.to_string()));
            Ok(Bytes::from(format!("mp3:{}", text)))
        }
    }

    fn subject() -> String {
        Persona::default().subjects[0].clone()
    }

    fn buddy(backend: Arc<FakeBackend>, candidates: &[&str]) -> StudyBuddy {
        StudyBuddy::builder()
            .with_backend(backend)
            .with_candidates(CandidateSource::Static(
                candidates.iter().map(|s| s.to_string()).collect(),
            ))
            .with_api_key("test-key")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn ask_resolves_first_live_model_and_splits_reply() {
        let backend = Arc::new(FakeBackend::new(
            &["gemini-1.5-flash", "gemini-1.5-pro"],
            "사과는 [TAG]apple[/TAG] 이에요.",
        ));
        let b = buddy(backend.clone(), &["gemini-2.0-flash", "gemini-1.5-flash", "gemini-1.5-pro"]);

        let req = StudyRequest::new(subject()).with_question("Apple이 무슨 뜻이야?");
        let answer = b.ask(&req).await.unwrap();

        assert_eq!(answer.model, "gemini-1.5-flash");
        assert_eq!(
            answer.segments,
            vec![
                Segment::PlainText("사과는 ".into()),
                Segment::ForeignPhrase("apple".into()),
                Segment::PlainText(" 이에요.".into()),
            ]
        );
        assert_eq!(backend.probed(), vec!["gemini-2.0-flash", "gemini-1.5-flash"]);

        let generated = backend.generated_with.lock().unwrap().clone();
        assert_eq!(generated.len(), 1);
        assert!(generated[0].1.contains(&subject()));
    }

    #[tokio::test]
    async fn every_probe_failing_is_backend_unavailable() {
        let backend = Arc::new(FakeBackend::new(&[], "unused"));
        let b = buddy(backend.clone(), &["a", "b"]);
        let err = b
            .ask(&StudyRequest::new(subject()).with_question("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AskError::BackendUnavailable { tried: 2 }));
        assert!(backend.generated_with.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_candidate_list_never_probes() {
        let backend = Arc::new(FakeBackend::new(&["a"], "unused"));
        let b = buddy(backend.clone(), &[]);
        let err = b.resolve_model().await.unwrap_err();
        assert!(matches!(err, AskError::BackendUnavailable { tried: 0 }));
        assert!(backend.probed().is_empty());
    }

    #[tokio::test]
    async fn probe_report_covers_all_candidates() {
        let backend = Arc::new(FakeBackend::new(&["a"], "ok"));
        let b = buddy(backend.clone(), &["a", "b"]);
        let report = b.probe_report().await;
        assert_eq!(report.len(), 2);
        assert!(report[0].is_ok());
        assert!(report[1].error.as_deref().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn each_ask_resolves_again() {
        let backend = Arc::new(FakeBackend::new(&["b"], "ok"));
        let b = buddy(backend.clone(), &["a", "b"]);
        let req = StudyRequest::new(subject()).with_question("hi");
        b.ask(&req).await.unwrap();
        b.ask(&req).await.unwrap();
        assert_eq!(backend.probed(), vec!["a", "b", "a", "b"]);
    }

    #[tokio::test]
    async fn quota_failure_after_resolution() {
        let mut fake = FakeBackend::new(&["a"], "");
        fake.reply = Err((
            429,
            r#"{"error":{"status":"RESOURCE_EXHAUSTED","details":[{"retryDelay": "30s"}]}}"#.into(),
        ));
        let b = buddy(Arc::new(fake), &["a"]);
        let err = b
            .ask(&StudyRequest::new(subject()).with_question("hi"))
            .await
            .unwrap_err();
        assert!(err.is_quota_exceeded());
        match &err {
            AskError::GenerationFailed { model, retry_after_ms, .. } => {
                assert_eq!(model, "a");
                assert_eq!(*retry_after_ms, Some(30_000));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert!(err.user_message().contains("30초"));
    }

    #[tokio::test]
    async fn quota_delay_survives_long_error_body() {
        let mut fake = FakeBackend::new(&["a"], "");
        let padding = "Learn more about Gemini API quotas and rate limits. ".repeat(8);
        fake.reply = Err((
            429,
            format!(
                r#"{{"error": {{"code": 429, "message": "You exceeded your current quota. {}", "details": [{{"@type": "type.googleapis.com/google.rpc.RetryInfo", "retryDelay": "42s"}}], "status": "RESOURCE_EXHAUSTED"}}}}"#,
                padding
            ),
        ));
        let b = buddy(Arc::new(fake), &["a"]);
        let err = b
            .ask(&StudyRequest::new(subject()).with_question("hi"))
            .await
            .unwrap_err();
        assert!(err.is_quota_exceeded());
        assert!(err.user_message().contains("42초"));
    }

    #[tokio::test]
    async fn generic_failure_has_generic_message() {
        let mut fake = FakeBackend::new(&["a"], "");
        fake.reply = Err((400, "bad image".into()));
        let b = buddy(Arc::new(fake), &["a"]);
        let err = b
            .ask(&StudyRequest::new(subject()).with_question("hi"))
            .await
            .unwrap_err();
        assert!(!err.is_quota_exceeded());
        assert!(err.user_message().starts_with("오류가 났어요"));
    }

    #[tokio::test]
    async fn invalid_requests_fail_before_probing() {
        let backend = Arc::new(FakeBackend::new(&["a"], "ok"));
        let b = buddy(backend.clone(), &["a"]);

        let err = b.ask(&StudyRequest::new(subject())).await.unwrap_err();
        assert!(matches!(err, AskError::EmptyRequest));

        let err = b
            .ask(&StudyRequest::new("과학").with_question("hi"))
            .await
            .unwrap_err();
        assert!(matches!(err, AskError::UnknownSubject(s) if s == "과학"));
        assert!(backend.probed().is_empty());
    }

    #[tokio::test]
    async fn catalog_candidates_are_flash_first() {
        let mut fake = FakeBackend::new(&["gemini-1.5-pro", "gemini-1.5-flash"], "ok");
        fake.catalog = Ok(vec![
            ModelInfo {
                id: "gemini-1.5-pro".into(),
                display_name: "Pro".into(),
                supports_generate: true,
            },
            ModelInfo {
                id: "gemini-1.5-flash".into(),
                display_name: "Flash".into(),
                supports_generate: true,
            },
        ]);
        let backend = Arc::new(fake);
        let b = StudyBuddy::builder()
            .with_backend(backend.clone())
            .with_candidates(CandidateSource::Catalog { fallback: vec!["x".into()] })
            .with_api_key("k")
            .build()
            .unwrap();
        assert_eq!(b.resolve_model().await.unwrap(), "gemini-1.5-flash");
        assert_eq!(backend.probed(), vec!["gemini-1.5-flash"]);
    }

    #[tokio::test]
    async fn catalog_failure_uses_fallback_list() {
        let backend = Arc::new(FakeBackend::new(&["x"], "ok"));
        let b = StudyBuddy::builder()
            .with_backend(backend.clone())
            .with_candidates(CandidateSource::Catalog { fallback: vec!["x".into()] })
            .with_api_key("k")
            .build()
            .unwrap();
        assert_eq!(b.candidates().await, vec!["x"]);
    }

    #[test]
    fn build_requires_api_key() {
        let err = StudyBuddy::builder().with_api_key("   ").build().err();
        assert!(matches!(err, Some(AskError::MissingApiKey)));
    }

    #[tokio::test]
    async fn speaks_normalized_phrases_and_whole_answer() {
        let backend = Arc::new(FakeBackend::new(
            &["a"],
            "고마워는 [TAG]Thank you![/TAG] 예요. [TAG]123[/TAG]",
        ));
        let speech = Arc::new(FakeSpeech { calls: Mutex::new(Vec::new()) });
        let b = StudyBuddy::builder()
            .with_backend(backend)
            .with_speech(speech.clone())
            .with_candidates(CandidateSource::Static(vec!["a".into()]))
            .with_api_key("k")
            .build()
            .unwrap();

        let answer = b
            .ask(&StudyRequest::new(subject()).with_question("고마워를 영어로?"))
            .await
            .unwrap();

        let phrases = b.speak_phrases(&answer).await.unwrap();
        assert_eq!(phrases.len(), 1);
        assert_eq!(phrases[0].phrase, "Thank you!");
        assert_eq!(phrases[0].spoken, "Thank you");
        assert_eq!(phrases[0].audio, Bytes::from("mp3:Thank you"));

        let whole = b.speak_answer(&answer).await.unwrap().unwrap();
        assert_eq!(whole, Bytes::from("mp3:고마워는 Thank you! 예요. 123"));

        let calls = speech.calls.lock().unwrap().clone();
        assert_eq!(calls[0].1, "en");
        assert_eq!(calls[1].1, "ko");
    }

    #[tokio::test]
    async fn no_synthesizer_means_no_audio() {
        let backend = Arc::new(FakeBackend::new(&["a"], "[TAG]hi[/TAG]"));
        let b = buddy(backend, &["a"]);
        let answer = b
            .ask(&StudyRequest::new(subject()).with_question("hi"))
            .await
            .unwrap();
        assert!(b.speak_phrases(&answer).await.unwrap().is_empty());
        assert!(b.speak_answer(&answer).await.unwrap().is_none());
    }

    #[test]
    fn with_config_uses_catalog_setting() {
        let cfg = AppConfig {
            use_catalog: true,
            candidate_models: vec!["gemini-pro".into()],
            ..Default::default()
        };
        let b = StudyBuddy::builder()
            .with_config(&cfg)
            .with_api_key("k")
            .build()
            .unwrap();
        assert_eq!(
            b.candidates,
            CandidateSource::Catalog { fallback: vec!["gemini-pro".into()] }
        );
        assert_eq!(b.options.temperature, Some(DEFAULT_TEMPERATURE));
    }
}
