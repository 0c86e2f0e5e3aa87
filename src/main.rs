use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use listing_catalog::admin::{AdminPanel, CommitOutcome, DeleteOutcome};
use listing_catalog::catalog::gallery_urls;
use listing_catalog::catalog::present::{
    admin_meta_line, bedrooms_label, format_currency, location_line, results_label,
    truncate_text, type_label, whatsapp_link, DESCRIPTION_LIMIT,
};
use listing_catalog::config::CatalogConfig;
use listing_catalog::models::{ListingDraft, PropertyType};
use listing_catalog::staging::LocalFile;
use listing_catalog::store::{ListingStore, SupabaseStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "listing-catalog", about = "Browse and manage property listings")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show listings matching the given filters
    Browse(BrowseArgs),
    /// Create a new listing (needs ADMIN_EMAIL and ADMIN_PASSWORD)
    Publish(PublishArgs),
    /// Change an existing listing
    Edit(EditArgs),
    /// Remove a listing and its images
    Delete { id: String },
}

#[derive(Args)]
struct BrowseArgs {
    #[arg(long)]
    min_price: Option<String>,
    #[arg(long)]
    max_price: Option<String>,
    #[arg(long = "type", value_parser = parse_type)]
    types: Vec<PropertyType>,
    #[arg(long = "neighborhood")]
    neighborhoods: Vec<String>,
    #[arg(long)]
    bedrooms: Vec<u32>,
    /// Also write the matching listings to this file
    #[arg(long)]
    json: Option<PathBuf>,
}

#[derive(Args, Default)]
struct FieldArgs {
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long)]
    price: Option<String>,
    #[arg(long)]
    bedrooms: Option<String>,
    #[arg(long)]
    neighborhood: Option<String>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long = "type")]
    property_type: Option<String>,
    #[arg(long)]
    whatsapp: Option<String>,
}

impl FieldArgs {
    fn apply(self, draft: &mut ListingDraft) {
        let overrides = [
            (self.title, &mut draft.title),
            (self.description, &mut draft.description),
            (self.price, &mut draft.price),
            (self.bedrooms, &mut draft.bedrooms),
            (self.neighborhood, &mut draft.neighborhood),
            (self.location, &mut draft.location),
            (self.property_type, &mut draft.property_type),
            (self.whatsapp, &mut draft.whatsapp),
        ];
        for (value, slot) in overrides {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[derive(Args)]
struct PublishArgs {
    #[command(flatten)]
    fields: FieldArgs,
    /// Image file to attach; repeat for several
    #[arg(long = "image")]
    images: Vec<PathBuf>,
    /// Position (1-based) of the attached image to use as cover
    #[arg(long)]
    cover: Option<usize>,
}

#[derive(Args)]
struct EditArgs {
    id: String,
    #[command(flatten)]
    fields: FieldArgs,
    #[arg(long = "add-image")]
    add_images: Vec<PathBuf>,
    /// Storage path of an existing image to drop
    #[arg(long = "remove-image")]
    remove_images: Vec<String>,
    /// Storage path of an existing image to use as cover
    #[arg(long)]
    cover_path: Option<String>,
}

fn parse_type(value: &str) -> Result<PropertyType, String> {
    value.parse().map_err(|e: listing_catalog::ValidationError| e.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = CatalogConfig::from_env();

    if !config.has_backend() {
        warn!("⚠️  Set SUPABASE_URL and SUPABASE_ANON_KEY to load the catalog");
        if let Command::Browse(_) = cli.command {
            println!("{}", results_label(0));
            return Ok(());
        }
        bail!("the admin panel needs SUPABASE_URL and SUPABASE_ANON_KEY");
    }

    let store: Arc<dyn ListingStore> = Arc::new(SupabaseStore::new(&config)?);
    info!("🏠 Loading listings...");
    let mut panel = AdminPanel::connect(store, config.compression).await?;

    match cli.command {
        Command::Browse(args) => browse(&mut panel, args).await,
        Command::Publish(args) => {
            sign_in(&mut panel).await?;
            publish(&mut panel, args).await
        }
        Command::Edit(args) => {
            sign_in(&mut panel).await?;
            edit(&mut panel, args).await
        }
        Command::Delete { id } => {
            sign_in(&mut panel).await?;
            match panel.delete(&id).await? {
                DeleteOutcome::Deleted => info!("🗑️  Listing {} removed", id),
                DeleteOutcome::DeletedWithWarnings(warnings) => {
                    for w in warnings {
                        warn!("{}", w);
                    }
                }
            }
            Ok(())
        }
    }
}

async fn sign_in(panel: &mut AdminPanel) -> anyhow::Result<()> {
    let email = std::env::var("ADMIN_EMAIL").context("ADMIN_EMAIL is not set")?;
    let password = std::env::var("ADMIN_PASSWORD").context("ADMIN_PASSWORD is not set")?;
    panel
        .sign_in(&email, &password)
        .await
        .context("Login failed")?;
    Ok(())
}

async fn browse(panel: &mut AdminPanel, args: BrowseArgs) -> anyhow::Result<()> {
    let catalog = panel.catalog_mut();
    catalog.set_price_inputs(
        args.min_price.as_deref().unwrap_or(""),
        args.max_price.as_deref().unwrap_or(""),
    );
    for t in args.types {
        catalog.toggle_type(t, true);
    }
    for n in &args.neighborhoods {
        if !catalog.neighborhood_options().contains(n) {
            warn!("No listings in neighborhood {}", n);
            continue;
        }
        catalog.toggle_neighborhood(n, true);
    }
    for b in args.bedrooms {
        catalog.toggle_bedrooms(b, true);
    }

    let visible = panel.catalog().visible();
    println!("{}\n", results_label(visible.len()));

    for (i, listing) in visible.iter().enumerate() {
        println!("{}. {} ({})", i + 1, listing.title, format_currency(listing.price));
        println!(
            "   {} | {}",
            type_label(listing.property_type),
            bedrooms_label(listing.bedrooms)
        );
        println!("   {}", location_line(listing));
        println!("   {}", truncate_text(&listing.description, DESCRIPTION_LIMIT));
        let images = gallery_urls(listing, |path| panel.public_url(path));
        println!("   Photos: {} (cover: {})", images.len(), images[0]);
        match whatsapp_link(listing) {
            Some(link) => println!("   WhatsApp: {}", link),
            None => println!("   WhatsApp: unavailable"),
        }
        println!();
    }

    if let Some(path) = args.json {
        let json = serde_json::to_string_pretty(visible)?;
        tokio::fs::write(&path, json).await?;
        info!("💾 Saved {} listing(s) to {}", visible.len(), path.display());
    }
    Ok(())
}

async fn load_files(paths: &[PathBuf]) -> anyhow::Result<Vec<LocalFile>> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = LocalFile::load(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        if !file.is_image() {
            warn!("Skipping {}: not an image", path.display());
        }
        files.push(file);
    }
    Ok(files)
}

async fn publish(panel: &mut AdminPanel, args: PublishArgs) -> anyhow::Result<()> {
    panel.reset_form();
    let files = load_files(&args.images).await?;
    let ids = panel.staging_mut().attach_new_files(files);
    if let Some(n) = args.cover {
        let id = n
            .checked_sub(1)
            .and_then(|i| ids.get(i))
            .with_context(|| format!("--cover {} does not match an attached image", n))?;
        panel.staging_mut().set_cover(*id);
    }

    let mut draft = ListingDraft::default();
    args.fields.apply(&mut draft);
    report(panel.save(&draft).await?);
    Ok(())
}

async fn edit(panel: &mut AdminPanel, args: EditArgs) -> anyhow::Result<()> {
    let mut draft = panel.start_editing(&args.id)?;
    args.fields.apply(&mut draft);

    for path in &args.remove_images {
        let stage = panel
            .staging()
            .stages()
            .iter()
            .find(|s| s.path() == Some(path.as_str()))
            .map(|s| s.id)
            .with_context(|| format!("Listing has no image {}", path))?;
        panel.staging_mut().remove_stage(stage);
    }

    let files = load_files(&args.add_images).await?;
    panel.staging_mut().attach_new_files(files);

    if let Some(path) = &args.cover_path {
        let stage = panel
            .staging()
            .stages()
            .iter()
            .find(|s| s.path() == Some(path.as_str()))
            .map(|s| s.id)
            .with_context(|| format!("Listing has no image {}", path))?;
        panel.staging_mut().set_cover(stage);
    }

    report(panel.save(&draft).await?);
    Ok(())
}

fn report(outcome: CommitOutcome) {
    let listing = outcome.listing();
    info!(
        "✅ Saved {}: {} ({} image(s), cover {})",
        listing.id,
        admin_meta_line(listing),
        listing.image_paths.len(),
        listing.cover_image.as_deref().unwrap_or("-")
    );
    for w in outcome.warnings() {
        warn!("{}", w);
    }
}
