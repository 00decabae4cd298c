use anyhow::Result;
use clap::Parser;
use picturebook::core::config::{Config, DEFAULT_CONFIG_PATH};
use picturebook::core::io::NativeStorage;
use picturebook::core::state::{RunStatus, StoryParams};
use picturebook::services::export::save_storybook;
use picturebook::services::illustration::GeminiIllustrator;
use picturebook::services::story::GeminiStoryGenerator;
use picturebook::services::workflow::StoryPipeline;
use picturebook::ui::{form, TerminalView};
use std::path::PathBuf;

/// Turns a few keywords into an illustrated children's picture book.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    /// Path to the YAML config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Story keywords. Runs once without prompting when given.
    #[arg(short, long)]
    keywords: Option<String>,

    /// Moral or learning goal of the story
    #[arg(short, long)]
    moral: Option<String>,

    /// Illustration style prompt
    #[arg(short, long)]
    style: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let config = match Config::load_from(&cli.config) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {:#}", e);
            return Err(e);
        }
    };
    config.ensure_directories()?;

    let initial = StoryParams {
        keywords: String::new(),
        moral: cli.moral.clone().unwrap_or_else(|| config.story.default_moral.clone()),
        style: cli.style.clone().unwrap_or_else(|| config.story.default_style.clone()),
    };

    let mut pipeline = StoryPipeline::new(
        Box::new(GeminiStoryGenerator::new(&config)),
        Box::new(GeminiIllustrator::new(&config)),
        initial,
    )
    .with_concurrency(config.illustration.concurrency);

    let storage = NativeStorage::new();
    let mut view = TerminalView::new();
    let one_shot = cli.keywords.is_some();

    loop {
        let params = match &cli.keywords {
            Some(keywords) => StoryParams {
                keywords: keywords.clone(),
                ..pipeline.state().params.clone()
            },
            None => form::prompt_params(&pipeline.state().params)?,
        };

        // Ctrl-C drops the run future, cancelling any request still in flight.
        let outcome = tokio::select! {
            res = pipeline.run(params, &mut view) => Some(res),
            _ = tokio::signal::ctrl_c() => None,
        };

        match outcome {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                if one_shot {
                    anyhow::bail!(e);
                }
                continue;
            }
            None => {
                log::warn!("Run interrupted");
                if one_shot || config.unattended {
                    anyhow::bail!("Run interrupted");
                }
                // Back to the form. Ctrl-C at the prompt quits.
                pipeline.reset(&mut view);
                continue;
            }
        }

        let question = match pipeline.state().status {
            RunStatus::Finished => {
                if let Some(story) = &pipeline.state().story {
                    let folder = save_storybook(&storage, &config.output_folder, story).await?;
                    println!("Storybook saved to {} (open index.html to print)", folder);
                }
                "Create another story?"
            }
            _ => "Try again?",
        };

        if one_shot || config.unattended {
            if pipeline.state().status == RunStatus::Error {
                anyhow::bail!(pipeline
                    .state()
                    .error_message
                    .clone()
                    .unwrap_or_default());
            }
            break;
        }

        let again = inquire::Confirm::new(question)
            .with_default(true)
            .prompt()?;
        pipeline.reset(&mut view);
        if !again {
            break;
        }
    }

    Ok(())
}
