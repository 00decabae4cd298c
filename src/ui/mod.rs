pub mod form;

use crate::core::error::IllustrationError;
use crate::core::state::{RunState, RunStatus, Story};
use crate::services::workflow::RunObserver;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Renders run state on the terminal: spinner, then a bar of illustrated pages.
#[derive(Default)]
pub struct TerminalView {
    spinner: Option<ProgressBar>,
    bar: Option<ProgressBar>,
}

impl TerminalView {
    pub fn new() -> Self {
        Self::default()
    }

    fn clear(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        if let Some(bar) = self.bar.take() {
            bar.finish_and_clear();
        }
    }

    fn show_writing(&mut self) {
        self.clear();
        let spinner = ProgressBar::new_spinner();
        spinner.set_message("Dreaming up the story...");
        spinner.enable_steady_tick(Duration::from_millis(120));
        self.spinner = Some(spinner);
    }

    fn show_illustrating(&mut self, state: &RunState) {
        let (done, total) = state.progress();
        if self.bar.is_none() {
            if let Some(spinner) = self.spinner.take() {
                spinner.finish_and_clear();
            }
            if let Some(story) = &state.story {
                println!("\n📖 {}\n", story.title);
            }
            let bar = ProgressBar::new(total as u64);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.magenta} Painting pages [{bar:30.magenta/blue}] {pos}/{len}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar())
                    .progress_chars("#>-"),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            self.bar = Some(bar);
        }
        if let Some(bar) = &self.bar {
            bar.set_position(done as u64);
        }
    }
}

impl RunObserver for TerminalView {
    fn publish(&mut self, state: &RunState) {
        match state.status {
            RunStatus::Idle => {
                self.clear();
                if let Some(msg) = &state.error_message {
                    eprintln!("⚠ {}", msg);
                }
            }
            RunStatus::Writing => self.show_writing(),
            RunStatus::Illustrating => self.show_illustrating(state),
            RunStatus::Finished => {
                if let Some(bar) = self.bar.take() {
                    bar.finish_with_message("done");
                }
                self.clear();
                if let Some(story) = &state.story {
                    println!("{}", render_story(story));
                }
            }
            RunStatus::Error => {
                self.clear();
                eprintln!(
                    "✗ {}",
                    state.error_message.as_deref().unwrap_or("Story generation failed")
                );
            }
        }
    }

    fn illustration_failed(&mut self, page_index: usize, error: &IllustrationError) {
        let line = format!("Page {} has no illustration: {}", page_index + 1, error);
        match &self.bar {
            Some(bar) => bar.println(line),
            None => eprintln!("{}", line),
        }
    }
}

/// Plain-text rendering of a finished story.
pub fn render_story(story: &Story) -> String {
    let mut out = format!("📖 {}\n", story.title);
    for (i, page) in story.pages.iter().enumerate() {
        let marker = if page.image_url.is_some() {
            "🖼"
        } else {
            "(no illustration)"
        };
        out.push_str(&format!("\n[{}] {}\n{}\n", i + 1, marker, page.text));
    }
    out.push_str(&format!(
        "\n✨ {} of {} pages illustrated ✨\n",
        story.illustrated_count(),
        story.pages.len()
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::state::StoryPage;

    #[test]
    fn test_render_story() {
        let story = Story {
            title: "Owl Night".to_string(),
            pages: vec![
                StoryPage {
                    text: "The owl woke up.".to_string(),
                    visual_prompt: "an owl".to_string(),
                    image_url: Some("data:image/png;base64,AAAA".to_string()),
                },
                StoryPage {
                    text: "It flew away.".to_string(),
                    visual_prompt: "a flying owl".to_string(),
                    image_url: None,
                },
            ],
        };

        let out = render_story(&story);
        assert!(out.starts_with("📖 Owl Night\n"));
        assert!(out.contains("[1] 🖼\nThe owl woke up.\n"));
        assert!(out.contains("[2] (no illustration)\nIt flew away.\n"));
        assert!(out.contains("1 of 2 pages illustrated"));
    }
}
