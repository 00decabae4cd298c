use crate::core::state::{StoryParams, BLANK_KEYWORDS_MESSAGE};
use anyhow::Result;
use inquire::validator::Validation;
use inquire::{CustomUserError, Select, Text};
use std::fmt;

pub const MORAL_OPTIONS: [&str; 5] = [
    "The importance of honesty",
    "The power of teamwork",
    "Respecting what makes everyone unique",
    "The courage to face failure",
    "Caring for the environment and its resources",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StylePreset {
    pub name: String,
    pub prompt: String,
}

impl fmt::Display for StylePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

pub const STYLE_PRESETS: [(&str, &str); 4] = [
    (
        "Cozy watercolor",
        "Colorful watercolor picture-book style, gentle and cute characters",
    ),
    (
        "Hand-drawn crayon",
        "Playful crayon drawing style with bright colors",
    ),
    (
        "Pixel adventure",
        "Retro pixel-art style with a video-game feel",
    ),
    (
        "3D animation",
        "Modern 3D animation style, bright and richly detailed",
    ),
];

pub fn validate_keywords(input: &str) -> Validation {
    if input.trim().is_empty() {
        Validation::Invalid(BLANK_KEYWORDS_MESSAGE.into())
    } else {
        Validation::Valid
    }
}

/// Moral choices with the current value preselected. A custom value from the
/// config is offered first.
pub fn moral_options(current: &str) -> (Vec<String>, usize) {
    let mut options: Vec<String> = MORAL_OPTIONS.iter().map(|m| m.to_string()).collect();
    let cursor = match options.iter().position(|m| m == current) {
        Some(i) => i,
        None => {
            options.insert(0, current.to_string());
            0
        }
    };
    (options, cursor)
}

pub fn style_options(current: &str) -> (Vec<StylePreset>, usize) {
    let mut options: Vec<StylePreset> = STYLE_PRESETS
        .iter()
        .map(|(name, prompt)| StylePreset {
            name: name.to_string(),
            prompt: prompt.to_string(),
        })
        .collect();
    let cursor = match options.iter().position(|s| s.prompt == current) {
        Some(i) => i,
        None => {
            options.insert(
                0,
                StylePreset {
                    name: format!("Custom: {}", current),
                    prompt: current.to_string(),
                },
            );
            0
        }
    };
    (options, cursor)
}

/// Asks for the next run's parameters, starting from the previous choices.
pub fn prompt_params(current: &StoryParams) -> Result<StoryParams> {
    let keywords = Text::new("Story keywords:")
        .with_placeholder("e.g. Tom brought a rainbow frog to class, aliens visit the cafeteria...")
        .with_initial_value(&current.keywords)
        .with_validator(|input: &str| Ok::<_, CustomUserError>(validate_keywords(input)))
        .prompt()?;

    let (morals, cursor) = moral_options(&current.moral);
    let moral = Select::new("Moral of the story:", morals)
        .with_starting_cursor(cursor)
        .prompt()?;

    let (styles, cursor) = style_options(&current.style);
    let style = Select::new("Illustration style:", styles)
        .with_starting_cursor(cursor)
        .prompt()?;

    Ok(StoryParams {
        keywords: keywords.trim().to_string(),
        moral,
        style: style.prompt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::{DEFAULT_MORAL, DEFAULT_STYLE};

    #[test]
    fn test_blank_keywords_invalid() {
        for blank in ["", "   ", "\t\n"] {
            match validate_keywords(blank) {
                Validation::Invalid(msg) => {
                    assert!(format!("{:?}", msg).contains(BLANK_KEYWORDS_MESSAGE))
                }
                Validation::Valid => panic!("{:?} should be rejected", blank),
            }
        }
        assert!(matches!(validate_keywords("a robot"), Validation::Valid));
    }

    #[test]
    fn test_defaults_are_presets() {
        let (morals, cursor) = moral_options(DEFAULT_MORAL);
        assert_eq!(morals.len(), MORAL_OPTIONS.len());
        assert_eq!(morals[cursor], DEFAULT_MORAL);

        let (styles, cursor) = style_options(DEFAULT_STYLE);
        assert_eq!(styles.len(), STYLE_PRESETS.len());
        assert_eq!(styles[cursor].name, "Cozy watercolor");
    }

    #[test]
    fn test_custom_values_offered_first() {
        let (morals, cursor) = moral_options("Kindness to animals");
        assert_eq!(cursor, 0);
        assert_eq!(morals[0], "Kindness to animals");
        assert_eq!(morals.len(), MORAL_OPTIONS.len() + 1);

        let (styles, cursor) = style_options("ink wash");
        assert_eq!(cursor, 0);
        assert_eq!(styles[0].prompt, "ink wash");
        assert_eq!(styles[0].to_string(), "Custom: ink wash");
    }
}
