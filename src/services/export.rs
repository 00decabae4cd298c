use crate::core::io::Storage;
use crate::core::state::Story;
use crate::utils::data_url;
use crate::utils::text::{escape_html, slugify};
use anyhow::{Context, Result};
use log::{info, warn};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExportedPage<'a> {
    number: usize,
    text: &'a str,
    visual_prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_file: Option<String>,
}

#[derive(Serialize)]
struct ExportedStory<'a> {
    title: &'a str,
    pages: Vec<ExportedPage<'a>>,
}

/// Writes a printable copy of `story` under `output_folder` and returns its folder.
///
/// Layout: `index.html`, `story.json` and one `page_NN.<ext>` per illustrated page.
pub async fn save_storybook(
    storage: &dyn Storage,
    output_folder: &str,
    story: &Story,
) -> Result<String> {
    let folder = unique_folder(storage, output_folder, &slugify(&story.title)).await?;

    let mut pages = Vec::with_capacity(story.pages.len());
    for (i, page) in story.pages.iter().enumerate() {
        let number = i + 1;
        let image_file = match page.image_url.as_deref() {
            Some(url) => match data_url::decode(url) {
                Ok((mime, bytes)) => {
                    let name = format!("page_{:02}.{}", number, data_url::extension_for(&mime));
                    storage
                        .write(&join(&folder, &name), &bytes)
                        .await
                        .with_context(|| format!("Failed to save image for page {}", number))?;
                    Some(name)
                }
                Err(e) => {
                    warn!("Page {} image could not be decoded: {:#}", number, e);
                    None
                }
            },
            None => None,
        };
        pages.push(ExportedPage {
            number,
            text: &page.text,
            visual_prompt: &page.visual_prompt,
            image_file,
        });
    }

    let exported = ExportedStory {
        title: &story.title,
        pages,
    };
    storage
        .write(
            &join(&folder, "story.json"),
            serde_json::to_string_pretty(&exported)?.as_bytes(),
        )
        .await?;
    storage
        .write(&join(&folder, "index.html"), render_html(&exported).as_bytes())
        .await?;

    info!("Storybook saved to {}", folder);
    Ok(folder)
}

async fn unique_folder(storage: &dyn Storage, output_folder: &str, slug: &str) -> Result<String> {
    let mut candidate = join(output_folder, slug);
    let mut n = 2;
    while storage.exists(&candidate).await? {
        candidate = join(output_folder, &format!("{}-{}", slug, n));
        n += 1;
    }
    Ok(candidate)
}

fn join(dir: &str, name: &str) -> String {
    Path::new(dir).join(name).to_string_lossy().to_string()
}

fn render_html(story: &ExportedStory) -> String {
    let title = escape_html(story.title);
    let mut html = format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n\
        <style>\n\
        body {{ font-family: sans-serif; background: #fdf6e3; color: #333; max-width: 960px; margin: 0 auto; padding: 2em; }}\n\
        h1 {{ text-align: center; color: #5b21b6; }}\n\
        .page {{ display: flex; gap: 2em; align-items: center; margin-bottom: 2em; page-break-inside: avoid; }}\n\
        .page img, .page .missing {{ width: 50%; border-radius: 1em; }}\n\
        .page .missing {{ aspect-ratio: 4 / 3; background: #fef3c7; display: flex; align-items: center; justify-content: center; }}\n\
        .page p {{ width: 50%; font-size: 1.3em; line-height: 1.6; }}\n\
        .number {{ font-weight: bold; color: #f59e0b; }}\n\
        </style>\n</head>\n<body>\n<h1>{title}</h1>\n"
    );

    for page in &story.pages {
        let picture = match &page.image_file {
            Some(file) => format!(
                "<img src=\"{}\" alt=\"Page {} illustration\">",
                escape_html(file),
                page.number
            ),
            None => "<div class=\"missing\">No illustration</div>".to_string(),
        };
        html.push_str(&format!(
            "<section class=\"page\">\n{}\n<p><span class=\"number\">{}.</span> {}</p>\n</section>\n",
            picture,
            page.number,
            escape_html(page.text)
        ));
    }

    html.push_str("</body>\n</html>\n");
    html
}
