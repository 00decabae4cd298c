use crate::core::error::{IllustrationError, RunError};
use crate::core::state::{RunState, RunStatus, StoryParams};
use crate::services::illustration::Illustrator;
use crate::services::story::StoryGenerator;
use futures_util::StreamExt;
use log::{info, warn};

/// Receives the run state after every transition.
pub trait RunObserver: Send {
    fn publish(&mut self, state: &RunState);

    /// A page keeps no image. The run goes on.
    fn illustration_failed(&mut self, _page_index: usize, _error: &IllustrationError) {}
}

/// Drives one storybook run: structure first, then one illustration per page.
pub struct StoryPipeline {
    writer: Box<dyn StoryGenerator>,
    illustrator: Box<dyn Illustrator>,
    concurrency: usize,
    state: RunState,
}

impl StoryPipeline {
    pub fn new(
        writer: Box<dyn StoryGenerator>,
        illustrator: Box<dyn Illustrator>,
        initial_params: StoryParams,
    ) -> Self {
        Self {
            writer,
            illustrator,
            concurrency: 1,
            state: RunState::new(initial_params),
        }
    }

    /// Up to `n` illustration requests in flight. Results are still applied in page order.
    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn reset(&mut self, observer: &mut dyn RunObserver) {
        self.state.reset();
        observer.publish(&self.state);
    }

    /// Runs the whole pipeline. Structure failures end in `RunStatus::Error`
    /// and are reported through the state, not the return value.
    pub async fn run(
        &mut self,
        params: StoryParams,
        observer: &mut dyn RunObserver,
    ) -> Result<(), RunError> {
        if self.state.status != RunStatus::Idle {
            return Err(RunError::NotIdle(self.state.status));
        }
        if params.keywords.trim().is_empty() {
            self.state.params = params;
            self.state.error_message = Some(RunError::BlankKeywords.to_string());
            observer.publish(&self.state);
            return Err(RunError::BlankKeywords);
        }

        self.state.begin(params);
        observer.publish(&self.state);

        let story = {
            let p = &self.state.params;
            self.writer
                .generate_structure(&p.keywords, &p.moral, &p.style)
                .await
        };
        let story = match story {
            Ok(story) => story,
            Err(e) => {
                warn!("Story generation failed: {:#}", e);
                self.state.fail(e.to_string());
                observer.publish(&self.state);
                return Ok(());
            }
        };

        let prompts: Vec<String> = story.pages.iter().map(|p| p.visual_prompt.clone()).collect();
        self.state.story_ready(story);
        observer.publish(&self.state);

        let illustrator = self.illustrator.as_ref();
        let results = futures_util::stream::iter(prompts.into_iter().enumerate())
            .map(|(i, prompt)| async move { (i, illustrator.generate_illustration(&prompt).await) })
            .buffered(self.concurrency);
        let mut results = std::pin::pin!(results);

        while let Some((i, result)) = results.next().await {
            match result {
                Ok(image_url) => {
                    if self.state.attach_illustration(i, image_url) {
                        observer.publish(&self.state);
                    }
                }
                Err(e) => {
                    warn!("Page {} image error: {:#}", i + 1, e);
                    observer.illustration_failed(i, &e);
                }
            }
        }

        let (done, total) = self.state.progress();
        info!("Illustrated {}/{} pages", done, total);
        self.state.finish();
        observer.publish(&self.state);
        Ok(())
    }
}
