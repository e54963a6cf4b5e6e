use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use dotenvy::dotenv;
use tracing::{debug, error, info, warn};

mod config;
mod hairstyle;
mod llm;
mod state;
mod utils;

use config::CONFIG;
use hairstyle::GeneratedImage;
use llm::media::SourceImage;
use llm::{GeminiImageClient, ImageEditService};
use state::AppState;
use utils::logging::init_logging;

#[derive(Debug, PartialEq, Eq)]
struct TryOnArgs {
    image: String,
    style: String,
    out_dir: Option<PathBuf>,
}

fn usage() -> &'static str {
    "Usage: hairstyle_try_on --image <path|data-url> --style <description> [--out-dir <dir>]"
}

fn parse_args(args: &[String]) -> anyhow::Result<Option<TryOnArgs>> {
    let mut image: Option<String> = None;
    let mut style: Option<String> = None;
    let mut out_dir: Option<PathBuf> = None;

    let mut index = 1;
    while index < args.len() {
        match args[index].as_str() {
            "--image" | "-i" => {
                index += 1;
                let value = args
                    .get(index)
                    .ok_or_else(|| anyhow!("Missing value for --image"))?;
                image = Some(value.clone());
            }
            "--style" | "-s" => {
                index += 1;
                let value = args
                    .get(index)
                    .ok_or_else(|| anyhow!("Missing value for --style"))?;
                style = Some(value.clone());
            }
            "--out-dir" | "-o" => {
                index += 1;
                let value = args
                    .get(index)
                    .ok_or_else(|| anyhow!("Missing value for --out-dir"))?;
                out_dir = Some(PathBuf::from(value));
            }
            "--help" | "-h" => return Ok(None),
            other => {
                return Err(anyhow!("Unknown argument: {other}\n{}", usage()));
            }
        }
        index += 1;
    }

    let image = image.ok_or_else(|| anyhow!("--image is required\n{}", usage()))?;
    Ok(Some(TryOnArgs {
        image,
        style: style.unwrap_or_default(),
        out_dir,
    }))
}

async fn write_gallery(
    out_dir: &Path,
    images: &[GeneratedImage],
) -> anyhow::Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(out_dir)
        .await
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let mut written = Vec::with_capacity(images.len());
    for image in images {
        let path = out_dir.join(image.file_name());
        let bytes = image
            .decode_bytes()
            .with_context(|| format!("Invalid image data for {}", image.label))?;
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}

async fn run(args: TryOnArgs) -> anyhow::Result<bool> {
    let service: Arc<dyn ImageEditService> = Arc::new(GeminiImageClient::from_config(&CONFIG));
    let state = AppState::new(service);

    let uploaded = if args.image.trim_start().starts_with("data:") {
        SourceImage::from_data_url(&args.image).map(|image| state.set_image(image))
    } else {
        state.load_image_file(Path::new(&args.image)).await
    };
    if let Err(err) = uploaded {
        eprintln!("{err}");
        return Ok(false);
    }
    state.set_prompt(args.style);
    if !state.can_generate() {
        debug!("Generate is unavailable; running it to record the validation message");
    }

    let images = match state.generate().await {
        Ok(_) => state.snapshot().generated_images,
        Err(_) => {
            let message = state
                .snapshot()
                .error
                .unwrap_or_else(|| hairstyle::UNKNOWN_ERROR_MESSAGE.to_string());
            eprintln!("{message}");
            return Ok(false);
        }
    };

    let out_dir = args.out_dir.unwrap_or_else(|| CONFIG.output_dir.clone());
    let written = write_gallery(&out_dir, &images).await?;
    for (image, path) in images.iter().zip(&written) {
        println!("{}: {}", image.label, path.display());
    }
    info!("Wrote {} views to {}", written.len(), out_dir.display());
    Ok(true)
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv().ok();
    let _guards = init_logging();
    if let Some(warning) = &CONFIG.gemini_safety_settings_warning {
        warn!("{warning}");
    }

    let args: Vec<String> = std::env::args().collect();
    let parsed = match parse_args(&args) {
        Ok(Some(parsed)) => parsed,
        Ok(None) => {
            println!("{}", usage());
            return ExitCode::SUCCESS;
        }
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    info!(
        "Starting hairstyle try-on with model {} (safety settings: {})",
        CONFIG.gemini_image_model,
        CONFIG.gemini_safety_settings.as_str()
    );
    match run(parsed).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            error!("Hairstyle try-on failed: {err:#}");
            eprintln!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hairstyle::views::VIEWS;
    use crate::llm::InlineImage;

    fn args(values: &[&str]) -> Vec<String> {
        std::iter::once("hairstyle_try_on")
            .chain(values.iter().copied())
            .map(|value| value.to_string())
            .collect()
    }

    #[test]
    fn parses_image_style_and_out_dir() {
        let parsed = parse_args(&args(&[
            "--image",
            "me.jpg",
            "--style",
            "a vibrant pink mohawk with shaved sides",
            "-o",
            "out",
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(
            parsed,
            TryOnArgs {
                image: "me.jpg".to_string(),
                style: "a vibrant pink mohawk with shaved sides".to_string(),
                out_dir: Some(PathBuf::from("out")),
            }
        );
    }

    #[test]
    fn missing_style_is_left_to_validation() {
        let parsed = parse_args(&args(&["-i", "me.png"])).unwrap().unwrap();
        assert_eq!(parsed.style, "");
    }

    #[test]
    fn rejects_missing_values_and_unknown_flags() {
        assert!(parse_args(&args(&["--style", "bald"])).is_err());
        assert!(parse_args(&args(&["--image"])).is_err());
        assert!(parse_args(&args(&["--image", "a.png", "--retry"])).is_err());
        assert_eq!(parse_args(&args(&["--help"])).unwrap(), None);
    }

    #[tokio::test]
    async fn gallery_is_written_one_file_per_view() {
        let out_dir = std::env::temp_dir().join(format!(
            "hairstyle_try_on_gallery_{}",
            std::process::id()
        ));
        let inline = InlineImage {
            mime_type: "image/png".to_string(),
            data: "aW1hZ2U=".to_string(),
        };
        let images: Vec<GeneratedImage> = VIEWS
            .iter()
            .map(|view| GeneratedImage::new(view, &inline))
            .collect();

        let written = write_gallery(&out_dir, &images).await.unwrap();
        let names: Vec<String> = written
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            names,
            [
                "front-view.png",
                "left-side-view.png",
                "right-side-view.png",
                "back-view.png"
            ]
        );
        assert_eq!(tokio::fs::read(&written[3]).await.unwrap(), b"image");

        tokio::fs::remove_dir_all(&out_dir).await.unwrap();
    }
}
