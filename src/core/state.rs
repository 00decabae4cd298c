use serde::{Deserialize, Serialize};

pub const DEFAULT_MORAL: &str = "The power of teamwork";
pub const DEFAULT_STYLE: &str = "Colorful watercolor picture-book style, gentle and cute characters";

/// Shown inline when a run is submitted without keywords.
pub const BLANK_KEYWORDS_MESSAGE: &str = "Please enter story keywords!";

/// Used when a structure failure carries no message of its own.
pub const FALLBACK_ERROR_MESSAGE: &str =
    "Lost connection to the story service. Please check that the API key is configured.";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct StoryParams {
    pub keywords: String,
    pub moral: String,
    pub style: String,
}

impl Default for StoryParams {
    fn default() -> Self {
        Self {
            keywords: String::new(),
            moral: DEFAULT_MORAL.to_string(),
            style: DEFAULT_STYLE.to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StoryPage {
    pub text: String,
    pub visual_prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Story {
    pub title: String,
    pub pages: Vec<StoryPage>,
}

impl Story {
    pub fn illustrated_count(&self) -> usize {
        self.pages.iter().filter(|p| p.image_url.is_some()).count()
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum RunStatus {
    #[default]
    Idle,
    Writing,
    Illustrating,
    Finished,
    Error,
}

/// Everything the presentation layer needs to render the current run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunState {
    pub status: RunStatus,
    pub story: Option<Story>,
    pub error_message: Option<String>,
    pub params: StoryParams,
}

impl RunState {
    pub fn new(params: StoryParams) -> Self {
        Self {
            params,
            ..Default::default()
        }
    }

    pub(crate) fn begin(&mut self, params: StoryParams) {
        self.params = params;
        self.error_message = None;
        self.story = None;
        self.status = RunStatus::Writing;
    }

    pub(crate) fn story_ready(&mut self, story: Story) {
        self.story = Some(story);
        self.status = RunStatus::Illustrating;
    }

    /// Sets the image of page `index`. Page count and order never change and an
    /// image that is already present is never replaced.
    pub(crate) fn attach_illustration(&mut self, index: usize, image_url: String) -> bool {
        let Some(page) = self.story.as_mut().and_then(|s| s.pages.get_mut(index)) else {
            return false;
        };
        if page.image_url.is_some() {
            return false;
        }
        page.image_url = Some(image_url);
        true
    }

    pub(crate) fn finish(&mut self) {
        self.status = RunStatus::Finished;
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.status = RunStatus::Error;
        self.error_message = Some(if message.trim().is_empty() {
            FALLBACK_ERROR_MESSAGE.to_string()
        } else {
            message
        });
    }

    /// Back to Idle. Moral and style survive, keywords do not.
    pub fn reset(&mut self) {
        self.status = RunStatus::Idle;
        self.story = None;
        self.error_message = None;
        self.params.keywords.clear();
    }

    /// (pages with an image, total pages) of the current story.
    pub fn progress(&self) -> (usize, usize) {
        self.story
            .as_ref()
            .map(|s| (s.illustrated_count(), s.pages.len()))
            .unwrap_or((0, 0))
    }
}
