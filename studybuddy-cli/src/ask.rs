use clap::Args;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use studybuddy::{
    resolve_api_key, Answer, AppConfig, AskError, ConfigManager, ImageInput, Persona, Segment,
    StudyBuddy, StudyRequest, TranslateTts,
};

#[derive(Args)]
pub struct AskArgs {
    /// Subject: full name, a unique prefix (e.g. "수학"), or its number from `subjects`
    #[arg(short, long)]
    subject: Option<String>,

    /// The typed question
    #[arg(short, long)]
    question: Option<String>,

    /// Photo of the problem (jpg, jpeg, png, webp)
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Use this model directly instead of probing the candidate list
    #[arg(short, long)]
    model: Option<String>,

    /// Write MP3 audio for every tagged phrase into this directory
    #[arg(long)]
    audio_dir: Option<PathBuf>,

    /// Also read the whole answer aloud (requires --audio-dir)
    #[arg(long, requires = "audio_dir")]
    speak_all: bool,

    /// Print the answer as JSON
    #[arg(long)]
    json: bool,
}

/// Build the study buddy from the config file and the resolved API key.
pub fn build_buddy(config: &AppConfig, with_speech: bool) -> anyhow::Result<StudyBuddy> {
    let api_key = resolve_api_key(config.api_key.as_deref()).ok_or(AskError::MissingApiKey)?;
    let mut builder = StudyBuddy::builder().with_config(config).with_api_key(api_key);
    if with_speech {
        builder = builder.with_speech(Arc::new(TranslateTts::new()));
    }
    Ok(builder.build()?)
}

/// Match a subject by exact name, unique prefix, or 1-based number.
pub fn pick_subject(persona: &Persona, input: Option<&str>) -> Result<String, AskError> {
    let Some(input) = input.map(str::trim).filter(|s| !s.is_empty()) else {
        return persona
            .subjects
            .first()
            .cloned()
            .ok_or_else(|| AskError::UnknownSubject(String::new()));
    };

    if persona.has_subject(input) {
        return Ok(input.to_string());
    }
    if let Ok(n) = input.parse::<usize>() {
        if let Some(s) = n.checked_sub(1).and_then(|i| persona.subjects.get(i)) {
            return Ok(s.clone());
        }
    }
    let mut matches = persona.subjects.iter().filter(|s| s.starts_with(input));
    match (matches.next(), matches.next()) {
        (Some(s), None) => Ok(s.clone()),
        _ => Err(AskError::UnknownSubject(input.to_string())),
    }
}

pub async fn run_ask(manager: &ConfigManager, args: AskArgs) -> anyhow::Result<()> {
    let config = manager.load()?;
    let buddy = build_buddy(&config, args.audio_dir.is_some()).map_err(friendly)?;

    let subject = pick_subject(buddy.persona(), args.subject.as_deref()).map_err(user_facing)?;
    let mut request = StudyRequest::new(subject);
    if let Some(q) = args.question {
        request = request.with_question(q);
    }
    if let Some(path) = &args.image {
        request = request.with_image(ImageInput::from_path(path)?);
    }

    let result = match args.model.as_deref() {
        Some(model) => buddy.ask_with_model(model, &request).await,
        None => buddy.ask(&request).await,
    };
    let answer = result.map_err(user_facing)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        print_answer(&answer);
    }

    if let Some(dir) = &args.audio_dir {
        write_audio(&buddy, &answer, dir, args.speak_all).await?;
    }

    Ok(())
}

fn print_answer(answer: &Answer) {
    println!("🐥 ({})\n", answer.model);
    let mut out = String::new();
    for segment in &answer.segments {
        match segment {
            Segment::PlainText(text) => out.push_str(text),
            Segment::ForeignPhrase(text) => {
                out.push('«');
                out.push_str(text);
                out.push('»');
            }
        }
    }
    println!("{}", out);
}

async fn write_audio(buddy: &StudyBuddy, answer: &Answer, dir: &Path, speak_all: bool) -> anyhow::Result<()> {
    let dir = dir.join(chrono::Local::now().format("%Y%m%d-%H%M%S").to_string());
    std::fs::create_dir_all(&dir)?;

    let phrases = buddy.speak_phrases(answer).await?;
    for (i, p) in phrases.iter().enumerate() {
        let path = dir.join(format!("phrase-{:02}.mp3", i + 1));
        std::fs::write(&path, &p.audio)?;
        println!("🔊 {} → {}", p.spoken.trim(), path.display());
    }

    if speak_all {
        if let Some(audio) = buddy.speak_answer(answer).await? {
            let path = dir.join("answer.mp3");
            std::fs::write(&path, &audio)?;
            println!("🎧 {}", path.display());
        }
    }

    tracing::debug!(dir = %dir.display(), phrases = phrases.len(), "audio written");
    Ok(())
}

/// Log the technical detail, surface the child-friendly message.
fn user_facing(err: AskError) -> anyhow::Error {
    tracing::debug!(error = %err, "ask failed");
    anyhow::anyhow!(err.user_message())
}

fn friendly(err: anyhow::Error) -> anyhow::Error {
    match err.downcast::<AskError>() {
        Ok(ask) => user_facing(ask),
        Err(other) => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pick_subject_by_prefix_number_or_default() {
        let p = Persona::second_grade();
        assert_eq!(pick_subject(&p, None).unwrap(), p.subjects[0]);
        assert_eq!(pick_subject(&p, Some("수학")).unwrap(), "수학 (덧셈, 뺄셈, 구구단)");
        assert_eq!(pick_subject(&p, Some("4")).unwrap(), "슬기로운 생활");
        assert_eq!(pick_subject(&p, Some("기타")).unwrap(), "기타");
        assert!(pick_subject(&p, Some("과학")).is_err());
        assert!(pick_subject(&p, Some("0")).is_err());
    }
}
