use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use generation::{ClientConfig, GeminiBackend, GenerationBackend};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use studio::{CancellationToken, CharacterDraft, EducationKind, Studio, StudioConfig, StudioError};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod session;

#[derive(Parser)]
#[command(name = "tooncraft")]
#[command(about = "ToonCraft - animated characters and short films for the classroom")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[arg(short, long, global = true)]
    verbose: bool,

    /// Studio settings (JSON)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Service client settings (JSON)
    #[arg(long, global = true)]
    client_config: Option<PathBuf>,

    /// Override the service base URL
    #[arg(long, global = true)]
    api_base: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open an interactive studio session (default)
    Studio,

    /// Generate teacher material
    Text {
        /// Tool to use (lesson, emotion, scenario, help)
        kind: EducationKind,

        /// Theme of the material
        #[arg(default_value = "")]
        topic: String,
    },

    /// Design a single character and write its reference image
    Character {
        #[arg(short, long)]
        name: String,

        /// Appearance of the character
        #[arg(short, long)]
        description: String,

        /// Output image file
        #[arg(short, long, default_value = "character.png")]
        output: PathBuf,
    },

    /// Design a character and film one scene with it
    Film {
        #[arg(short, long)]
        name: String,

        /// Appearance of the character
        #[arg(short, long)]
        description: String,

        /// What happens in the scene
        #[arg(short, long)]
        prompt: String,

        /// Directory the video is written to
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Print the effective settings as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let studio_config = match &cli.config {
        Some(path) => StudioConfig::load(path)
            .with_context(|| format!("Failed to load studio settings from {:?}", path))?,
        None => StudioConfig::default(),
    };
    let mut client_config = match &cli.client_config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("Failed to load client settings from {:?}", path))?,
        None => ClientConfig::default(),
    };
    if let Some(api_base) = cli.api_base {
        client_config = client_config.with_api_base(api_base);
    }

    match cli.command.unwrap_or(Commands::Studio) {
        Commands::Studio => {
            let backend = connect(client_config)?;
            session::Session::new(Studio::new(studio_config), backend)
                .run()
                .await
        }
        Commands::Text { kind, topic } => {
            text_command(connect(client_config)?, studio_config, kind, topic).await
        }
        Commands::Character {
            name,
            description,
            output,
        } => {
            character_command(
                connect(client_config)?,
                studio_config,
                name,
                description,
                output,
            )
            .await
        }
        Commands::Film {
            name,
            description,
            prompt,
            output,
        } => {
            film_command(
                connect(client_config)?,
                studio_config,
                name,
                description,
                prompt,
                output,
            )
            .await
        }
        Commands::Config => config_command(&client_config, &studio_config),
    }
}

fn connect(config: ClientConfig) -> Result<Arc<dyn GenerationBackend>> {
    let backend = GeminiBackend::new(config).context("Failed to set up the service client")?;
    Ok(Arc::new(backend))
}

fn studio_failure(err: StudioError) -> anyhow::Error {
    let message = err.banner_message();
    anyhow::Error::new(err).context(message)
}

fn spinner(message: &str) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

async fn text_command(
    backend: Arc<dyn GenerationBackend>,
    config: StudioConfig,
    kind: EducationKind,
    topic: String,
) -> Result<()> {
    let mut studio = Studio::new(config);
    studio.text_panel.open(kind);
    studio.text_panel.topic = topic;

    let bar = spinner(kind.title());
    let text = studio.generate_text_now(backend.as_ref()).await;
    bar.finish_and_clear();

    let text = text.map_err(|p| anyhow::anyhow!("{p} (hint: {})", kind.placeholder()))?;
    println!("{text}");
    Ok(())
}

async fn character_command(
    backend: Arc<dyn GenerationBackend>,
    config: StudioConfig,
    name: String,
    description: String,
    output: PathBuf,
) -> Result<()> {
    let mut studio = Studio::new(config);
    studio.character_form.draft = CharacterDraft::new(name, description);

    let bar = spinner("Designing character");
    let created = studio.create_character_now(backend.as_ref()).await;
    bar.finish_and_clear();

    let id = created.map_err(studio_failure)?;
    let character = studio
        .characters()
        .get(id)
        .context("Character missing from the cast")?;
    std::fs::write(&output, &character.image.data)
        .with_context(|| format!("Failed to write {:?}", output))?;
    info!(id = %id, name = %character.name, "character saved");
    println!("{} -> {}", character.name, output.display());
    Ok(())
}

async fn film_command(
    backend: Arc<dyn GenerationBackend>,
    config: StudioConfig,
    name: String,
    description: String,
    prompt: String,
    output: PathBuf,
) -> Result<()> {
    let mut studio = Studio::new(config);
    studio.character_form.draft = CharacterDraft::new(name, description);

    let bar = spinner("Designing character");
    let created = studio.create_character_now(backend.as_ref()).await;
    if let Err(err) = created {
        bar.finish_and_clear();
        return Err(studio_failure(err));
    }

    bar.set_message("Filming scene (this can take a few minutes)");
    studio.composer.prompt = prompt;
    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });
    let filmed = studio.generate_scene_now(backend.as_ref(), &cancel).await;
    bar.finish_and_clear();

    if let Err(err) = filmed {
        let message = match studio.composer.local_error() {
            Some(message) => message.to_string(),
            None => err.to_string(),
        };
        anyhow::bail!(message);
    }
    let scene = studio.scenes().get(0).context("Scene missing from the timeline")?;
    let path = scene
        .save_to_dir(&output)
        .with_context(|| format!("Failed to write the video into {:?}", output))?;
    println!("SCENE 1 -> {}", path.display());
    Ok(())
}

fn config_command(client: &ClientConfig, studio: &StudioConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(client)?);
    println!("{}", serde_json::to_string_pretty(studio)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use generation::{InlineImage, ScriptedBackend};
    use studio::Precondition;

    #[tokio::test]
    async fn test_film_without_prompt_names_the_problem() {
        let backend = ScriptedBackend::new().with_image(InlineImage::png(vec![1]));
        let err = film_command(
            Arc::new(backend),
            StudioConfig::default(),
            "Robo".to_string(),
            "a blue robot".to_string(),
            String::new(),
            std::env::temp_dir(),
        )
        .await
        .unwrap_err();
        assert_eq!(err.to_string(), Precondition::EmptyPrompt.to_string());
    }
}
