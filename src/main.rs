use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::thread::JoinHandle;
use tracing_subscriber::EnvFilter;
use tripvault::api::ApiClient;
use tripvault::config::{self, AppConfig, SlotKind};
use tripvault::imaging::RustTransformer;
use tripvault::output;
use tripvault::preview::MemoryPreviewStore;
use tripvault::profile::{JsonFileProfileCache, ProfileService};
use tripvault::slot::{SlotEvent, UploadSlot};
use tripvault::types::{PixelCropRegion, ProcessedArtifact};

/// Shared flags for commands that run the crop + compress pipeline.
#[derive(clap::Args, Clone)]
struct PipelineArgs {
    /// Image file to process
    file: PathBuf,

    /// Which upload slot's crop and compression settings to use
    #[arg(long, value_enum, default_value = "default")]
    slot: SlotKind,

    /// Crop region in source pixels as x,y,width,height
    /// (default: the crop surface's initial region)
    #[arg(long)]
    region: Option<PixelCropRegion>,
}

#[derive(Parser)]
#[command(name = "tripvault")]
#[command(about = "Crop, compress and upload travel-journal images")]
#[command(long_about = "\
Crop, compress and upload travel-journal images

Each image goes through the same pipeline as the app's upload slots:

  select → crop → compress → preview → upload

Slots carry their own settings:

  default       free aspect,  1600 px, 0.5 MB, webp
  profile-pic   1 : 1 round,   400 px, 0.3 MB, webp
  cover-photo   16 : 4,       1920 px, 0.8 MB, webp

Without --region the crop is the largest centered rectangle of the slot's
aspect ratio, as the crop surface shows it before any pan or zoom.

Run 'tripvault gen-config' to generate a documented tripvault.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file = stock defaults)
    #[arg(long, default_value = config::CONFIG_FILENAME, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crop and compress an image, writing the artifact to disk
    Process {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Output path (default: the artifact filename in the current directory)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Crop, compress and upload an image, printing the stored URL
    Upload {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Context tag sent with the upload (default: the slot's tag)
        #[arg(long)]
        context: Option<String>,

        /// Also save the URL onto the cached user's profile
        #[arg(long)]
        save_to_profile: bool,

        /// Profile cache file used with --save-to-profile
        #[arg(long, default_value = "tripvault-user.json")]
        profile_cache: PathBuf,
    },
    /// Print a stock tripvault.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Process { pipeline, out } => {
            let app_config = config::load_config(&cli.config)?;
            let mut slot = new_slot(&app_config, pipeline.slot);
            let printer = spawn_printer(slot.subscribe());

            let result = match run_pipeline(&mut slot, &pipeline).await {
                Ok(region) => take_artifact(&slot).map(|artifact| (region, artifact)),
                Err(e) => Err(e),
            };
            slot.dispose();
            join_printer(printer)?;
            let (region, artifact) = result?;

            let path = out.unwrap_or_else(|| PathBuf::from(artifact.filename()));
            std::fs::write(&path, artifact.bytes())?;
            output::print_artifact_summary(&artifact, Some(&region), Some(&path));
        }
        Command::Upload {
            pipeline,
            context,
            save_to_profile,
            profile_cache,
        } => {
            if save_to_profile && pipeline.slot == SlotKind::Default {
                return Err("--save-to-profile needs --slot profile-pic or cover-photo".into());
            }
            let app_config = config::load_config(&cli.config)?;
            let client = ApiClient::new(&app_config.api)?;
            let mut slot = new_slot(&app_config, pipeline.slot);
            let printer = spawn_printer(slot.subscribe());

            let context = context.or_else(|| pipeline.slot.context_tag().map(str::to_string));
            let result = match run_pipeline(&mut slot, &pipeline).await {
                Ok(_) => slot
                    .upload(&client, context.as_deref())
                    .await
                    .map_err(Into::into),
                Err(e) => Err(e),
            };
            slot.dispose();
            join_printer(printer)?;
            let url = result?;

            if save_to_profile {
                let service = ProfileService::new(
                    Arc::new(client),
                    Arc::new(JsonFileProfileCache::new(profile_cache)),
                );
                let user = if pipeline.slot == SlotKind::ProfilePic {
                    service.save_media_urls(Some(url), None).await?
                } else {
                    service.save_media_urls(None, Some(url)).await?
                };
                println!("Profile updated for {}", user.username);
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn new_slot(app_config: &AppConfig, kind: SlotKind) -> UploadSlot {
    UploadSlot::new(
        kind.key(),
        app_config.slots.get(kind).clone(),
        Arc::new(RustTransformer::new()),
        Arc::new(MemoryPreviewStore::new()),
    )
}

/// Print slot events as they arrive. The thread ends once the slot is gone.
fn spawn_printer(events: Receiver<SlotEvent>) -> JoinHandle<()> {
    std::thread::spawn(move || {
        for event in events {
            output::print_slot_event(&event);
        }
    })
}

fn join_printer(printer: JoinHandle<()>) -> Result<(), Box<dyn std::error::Error>> {
    printer.join().map_err(|_| "event printer panicked".into())
}

/// Select the file and confirm the crop; returns the region used.
async fn run_pipeline(
    slot: &mut UploadSlot,
    args: &PipelineArgs,
) -> Result<PixelCropRegion, Box<dyn std::error::Error>> {
    slot.handle_file_selected(&args.file).await?;
    let region = match args.region {
        Some(region) => region,
        None => slot
            .crop_session()
            .and_then(|session| session.confirm())
            .ok_or("could not read image dimensions; pass --region")?,
    };
    slot.confirm_crop(region).await?;
    Ok(region)
}

fn take_artifact(slot: &UploadSlot) -> Result<ProcessedArtifact, Box<dyn std::error::Error>> {
    slot.processed_artifact()
        .cloned()
        .ok_or_else(|| "pipeline finished without an artifact".into())
}
