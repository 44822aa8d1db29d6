//! Local checks around speech transcription.

use super::MediaError;
use crate::config::MediaConfig;

const SUPPORTED_AUDIO: &[&str] = &[
    "audio/ogg",
    "audio/opus",
    "audio/mpeg",
    "audio/mp3",
    "audio/mp4",
    "audio/m4a",
    "audio/x-m4a",
    "audio/aac",
    "audio/wav",
    "audio/x-wav",
    "audio/wave",
    "audio/webm",
];

/// Drops MIME parameters such as `; codecs=opus`.
pub fn essence(mime_type: &str) -> String {
    mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Rejects audio that should never be sent for transcription.
pub fn validate_audio(size: usize, mime_type: &str, config: &MediaConfig) -> Result<(), MediaError> {
    if !SUPPORTED_AUDIO.contains(&mime_type) {
        return Err(MediaError::UnsupportedAudioFormat(mime_type.to_string()));
    }
    if size < config.audio_min_bytes {
        return Err(MediaError::AudioTooSmall {
            size,
            min: config.audio_min_bytes,
        });
    }
    if size > config.audio_max_bytes {
        return Err(MediaError::AudioTooLarge {
            size,
            max: config.audio_max_bytes,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Latin,
    Cyrillic,
    Greek,
    Arabic,
    Hebrew,
    Cjk,
}

fn expected_script(language: &str) -> Script {
    match language.split(['-', '_']).next().unwrap_or_default() {
        "ru" | "uk" | "be" | "bg" | "sr" | "mk" | "kk" => Script::Cyrillic,
        "el" => Script::Greek,
        "ar" | "fa" | "ur" => Script::Arabic,
        "he" | "yi" => Script::Hebrew,
        "zh" | "ja" | "ko" => Script::Cjk,
        _ => Script::Latin,
    }
}

fn script_of(c: char) -> Option<Script> {
    match c as u32 {
        0x0041..=0x024F if c.is_alphabetic() => Some(Script::Latin),
        0x0370..=0x03FF => Some(Script::Greek),
        0x0400..=0x052F => Some(Script::Cyrillic),
        0x0590..=0x05FF => Some(Script::Hebrew),
        0x0600..=0x06FF | 0x0750..=0x077F => Some(Script::Arabic),
        0x1100..=0x11FF | 0x3040..=0x30FF | 0x3400..=0x4DBF | 0x4E00..=0x9FFF | 0xAC00..=0xD7AF => {
            Some(Script::Cjk)
        }
        _ => None,
    }
}

/// True when at least half of the letters belong to the script of `language`.
/// Text without letters passes.
pub fn matches_language(text: &str, language: &str) -> bool {
    let expected = expected_script(language);
    let (mut letters, mut matching) = (0usize, 0usize);
    for script in text.chars().filter_map(script_of) {
        letters += 1;
        if script == expected {
            matching += 1;
        }
    }
    letters == 0 || matching * 2 >= letters
}
