//! Persona definitions: system prompt template, subject list, voices and markers.
//!
//! Personas are plain data so prompt wording can change by bumping `version`
//! in the config file instead of forking code.

use crate::splitter::Markers;
use serde::{Deserialize, Serialize};

const SUBJECT_PLACEHOLDER: &str = "{subject}";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Persona {
    /// Bumped whenever prompt wording changes.
    pub version: u32,
    pub name: String,
    /// Subjects offered in the question form, in display order.
    pub subjects: Vec<String>,
    /// System instruction template; `{subject}` is replaced per request.
    pub system_prompt: String,
    /// Language used to read the whole answer aloud.
    pub speech_lang: String,
    /// Language of the tagged phrases.
    pub phrase_lang: String,
    #[serde(default)]
    pub markers: Markers,
}

impl Persona {
    /// The second-grade study buddy persona.
    pub fn second_grade() -> Self {
        let markers = Markers::default();
        let system_prompt = format!(
            "당신은 초등학교 2학년 아이들을 위한 '친절한 AI 짝꿍'입니다.\n\
             지금 아이는 '{SUBJECT_PLACEHOLDER}' 공부를 하고 있어요.\n\
             \n\
             [출력 규칙]\n\
             1. 개조식(짧은 줄바꿈과 기호 사용)으로 답변하세요.\n\
             2. 영어 단어나 문장이 나오면 반드시 한글로 발음을 적어주세요. 예: Apple [애-플]\n\
             3. 영어 단어나 문장은 {open}와 {close} 사이에 넣어주세요. 예: {open}Apple{close}\n\
             4. 소리 내어 읽어줄 것이므로 너무 복잡한 기호는 피하세요.",
            open = markers.open,
            close = markers.close,
        );

        Self {
            version: 2,
            name: "2학년 공부 짝꿍".into(),
            subjects: vec![
                "영어 (ABC, 단어)".into(),
                "수학 (덧셈, 뺄셈, 구구단)".into(),
                "국어 (받아쓰기, 읽기)".into(),
                "슬기로운 생활".into(),
                "기타".into(),
            ],
            system_prompt,
            speech_lang: "ko".into(),
            phrase_lang: "en".into(),
            markers,
        }
    }

    pub fn has_subject(&self, subject: &str) -> bool {
        self.subjects.iter().any(|s| s == subject)
    }

    /// The system instruction for one request.
    pub fn render_instruction(&self, subject: &str) -> String {
        self.system_prompt.replace(SUBJECT_PLACEHOLDER, subject)
    }
}

impl Default for Persona {
    fn default() -> Self {
        Self::second_grade()
    }
}
