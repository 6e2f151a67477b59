use crate::domain::narration::NarrationTarget;
use regex::Regex;
use std::sync::OnceLock;

const MAX_COMPONENT_CHARS: usize = 100;
const STORIES_RECORD_NAME: &str = "artifact_stories.json";

fn identity_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[a-z0-9\-]+:[a-f0-9\-]+$").expect("identity id pattern is valid")
    })
}

/// Make a value safe to use as one segment of a storage key.
///
/// Identity ids (`region:uuid`) keep their colon; anything else outside
/// `[A-Za-z0-9_.-]` becomes `_`.
pub fn sanitize_path_component(component: &str) -> String {
    if component.is_empty() {
        return String::new();
    }
    if identity_id_pattern().is_match(component) {
        return component.to_string();
    }

    component
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_COMPONENT_CHARS)
        .collect()
}

/// `public/<user>/<artifact>/`
pub fn artifact_prefix(target: &NarrationTarget) -> String {
    format!(
        "public/{}/{}/",
        sanitize_path_component(&target.user_id),
        sanitize_path_component(&target.artifact_id)
    )
}

/// Stories are numbered from 1 in file names
pub fn audio_filename(story_index: usize, extension: &str) -> String {
    format!("story_audio_{}.{}", story_index + 1, extension)
}

pub fn audio_key(target: &NarrationTarget, extension: &str) -> String {
    format!(
        "{}{}",
        artifact_prefix(target),
        audio_filename(target.story_index, extension)
    )
}

pub fn stories_record_key(target: &NarrationTarget) -> String {
    format!("{}{}", artifact_prefix(target), STORIES_RECORD_NAME)
}
