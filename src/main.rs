use std::path::Path;

use anyhow::{Context, Result};
use smartchef::cli::{parse_args, Command};
use smartchef::collector::{Collector, HttpRecipeBackend, InputModality};
use smartchef::config::ClientConfig;
use smartchef::enrichment::{ImageResolver, UnsplashImageSearch};
use smartchef::photo::PhotoUpload;
use smartchef::render::{build_cards, render_view, HttpImageProbe, ImageProbe};
use smartchef::session::Session;
use smartchef::view::ViewState;
use smartchef::voice::{InputBox, LineTranscriptSource};
use tracing_subscriber::EnvFilter;

async fn dictate(path: &Path) -> Result<String> {
    let source = LineTranscriptSource::from_path(path)
        .await
        .with_context(|| format!("Failed to open transcript '{}'", path.display()))?;
    let input = InputBox::spawn(source);
    input.start_voice().await?;
    input.wait_until_idle().await?;
    let text = input.finish().await?;
    println!("Heard: {}", text);
    Ok(text)
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("smartchef=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli_args = parse_args();

    let mut config = ClientConfig::from_env().context("Invalid client configuration")?;
    if let Some(url) = cli_args.backend_url.clone() {
        config = config.with_backend_url(url);
    }
    let client = config
        .http_client()
        .context("Failed to build HTTP client")?;

    let session = Session::new(
        Collector::new(HttpRecipeBackend::new(&config, client.clone())),
        ImageResolver::new(
            UnsplashImageSearch::new(&config, client.clone()),
            config.lookup_fallback_image.clone(),
        ),
    );

    let input = match &cli_args.command {
        Command::Photo { image } => match PhotoUpload::from_path(image).await {
            Ok(photo) => InputModality::Photo(photo),
            Err(e) => {
                eprintln!("\nNo file selected: {}", e);
                return Err(e.into());
            }
        },
        Command::Manual {
            ingredients: Some(text),
            ..
        } => InputModality::Manual(text.clone()),
        Command::Manual {
            voice_file: Some(path),
            ..
        } => InputModality::Manual(dictate(path).await?),
        Command::Manual { .. } => InputModality::Manual(String::new()),
    };

    println!("Generating recipes...");
    let view = match session.submit(input).await {
        Ok(view) => view,
        Err(e) => {
            eprintln!("\n{}", e.notification());
            return Err(anyhow::Error::new(e).context("Recipe generation attempt failed"));
        }
    };

    if !cli_args.json {
        println!("\n{}", render_view(&view, &[]));
    }
    view.enrich(session.resolver()).await?;

    let recipes = match view.state() {
        ViewState::Populated(recipes) => recipes.to_vec(),
        _ => Vec::new(),
    };

    if cli_args.json {
        println!("{}", serde_json::to_string_pretty(&recipes)?);
        return Ok(());
    }

    let probe = HttpImageProbe::new(client);
    let probe: Option<&dyn ImageProbe> = if cli_args.check_images {
        Some(&probe)
    } else {
        None
    };
    let cards = build_cards(&recipes, probe, &config.render_fallback_image).await;
    if matches!(view.state(), ViewState::Populated(_)) {
        println!("{}", render_view(&view, &cards));
    }

    Ok(())
}
