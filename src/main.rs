//! Filterkit CLI
//!
//! Demonstration CLI for the Filterkit library: browse the catalog and
//! render a category's thumbnails to disk through the background loader.

use anyhow::{bail, Context};
use filterkit::prelude::*;
use log::info;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_THUMBNAIL_SIZE: u32 = 256;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        return;
    }

    let result = match args[1].as_str() {
        "list" => list_filters(&args[2..]),
        "info" => filter_info(&args[2..]),
        "render" => render_category(&args[2..]),
        "help" | "--help" | "-h" => {
            print_usage(&args[0]);
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {}", other);
            print_usage(&args[0]);
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn print_usage(program: &str) {
    println!("Filterkit v{}", filterkit::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  list                          List categories and their filters");
    println!("  info <filter>                 Show details of a filter");
    println!("  render <in> <category> <dir>  Render a category's thumbnails into <dir>");
    println!("  help                          Show this help message");
    println!();
    println!("Options:");
    println!("  --catalog <file>   Catalog definition (JSON), default: built-in filters");
    println!("  --config <file>    Gallery configuration (TOML)");
    println!("  --size <px>        Thumbnail size for render (default: {})", DEFAULT_THUMBNAIL_SIZE);
    println!("  --blend <image>    Blend image for two-input filters");
}

struct Options {
    positional: Vec<String>,
    catalog: Option<PathBuf>,
    config: Option<PathBuf>,
    size: u32,
    blend: Option<PathBuf>,
}

fn parse_options(args: &[String]) -> anyhow::Result<Options> {
    let mut options = Options {
        positional: Vec::new(),
        catalog: None,
        config: None,
        size: DEFAULT_THUMBNAIL_SIZE,
        blend: None,
    };
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--catalog" => options.catalog = iter.next().map(PathBuf::from),
            "--config" => options.config = iter.next().map(PathBuf::from),
            "--blend" => options.blend = iter.next().map(PathBuf::from),
            "--size" => {
                let value = iter.next().context("--size needs a value")?;
                options.size = value.parse().with_context(|| format!("invalid size '{}'", value))?;
            }
            flag if flag.starts_with("--") => bail!("unknown option: {}", flag),
            _ => options.positional.push(arg.clone()),
        }
    }
    Ok(options)
}

fn open_catalog(path: Option<&Path>) -> anyhow::Result<Arc<Catalog>> {
    let catalog = match path {
        Some(path) => Catalog::load(path).with_context(|| format!("loading catalog {}", path.display()))?,
        None => Catalog::with_builtins(),
    };
    Ok(Arc::new(catalog))
}

fn list_filters(args: &[String]) -> anyhow::Result<()> {
    let options = parse_options(args)?;
    let catalog = open_catalog(options.catalog.as_deref())?;

    println!("Available filters ({} total):", catalog.len());
    println!();
    for category in catalog.categories() {
        println!("  {} ({})", category.title, category.name);
        for key in category.members() {
            if let Some(descriptor) = catalog.lookup(key) {
                let slow = if descriptor.is_slow() { " [slow]" } else { "" };
                println!("      - {} - {}{}", key, descriptor.title(), slow);
            }
        }
        println!();
    }
    let collections = catalog.collections();
    if !collections.is_empty() {
        println!("Collections:");
        for collection in collections {
            println!("  {} ({}): {}", collection.title, collection.name, collection.categories().join(", "));
        }
    }
    Ok(())
}

fn filter_info(args: &[String]) -> anyhow::Result<()> {
    let options = parse_options(args)?;
    let key = options.positional.first().context("please specify a filter key")?;
    let catalog = open_catalog(options.catalog.as_deref())?;

    let descriptor = match catalog.lookup(key) {
        Some(descriptor) => descriptor,
        None => bail!("filter not found: {} (use 'list' to see available filters)", key),
    };

    println!("Filter: {}", descriptor.title());
    println!("Key: {}", descriptor.key());
    println!("Kind: {}", descriptor.kind().display_name());
    if !descriptor.description().is_empty() {
        println!();
        println!("Description:");
        println!("  {}", descriptor.description());
    }
    let categories: Vec<String> = catalog
        .categories()
        .into_iter()
        .filter(|c| c.contains(key))
        .map(|c| c.name)
        .collect();
    if !categories.is_empty() {
        println!();
        println!("Categories: {}", categories.join(", "));
    }
    if !descriptor.parameters().is_empty() {
        println!();
        println!("Parameters:");
        for param in descriptor.parameters() {
            println!(
                "  - {} [{:?}] = {:?} ({}..{})",
                param.name, param.kind, param.default, param.min, param.max
            );
        }
    }
    if descriptor.requires_secondary() {
        println!();
        println!("Needs a blend image (--blend).");
    }
    Ok(())
}

fn render_category(args: &[String]) -> anyhow::Result<()> {
    let options = parse_options(args)?;
    let (input_path, category, out_dir) = match options.positional.as_slice() {
        [input, category, out] => (PathBuf::from(input), category.clone(), PathBuf::from(out)),
        _ => bail!("usage: render <input> <category> <output-dir>"),
    };

    let catalog = open_catalog(options.catalog.as_deref())?;
    if !catalog.has_category(&category) {
        bail!("unknown category: {}", category);
    }
    let config = match &options.config {
        Some(path) => GalleryConfig::from_path(path)?,
        None => GalleryConfig::default(),
    };

    let photo = image::open(&input_path).with_context(|| format!("opening {}", input_path.display()))?;
    let provider = StaticInput::new(SharedImage::new(photo.thumbnail(options.size, options.size)));
    if let Some(blend) = &options.blend {
        let blend = image::open(blend).with_context(|| format!("opening {}", blend.display()))?;
        provider.set_blend(Some(SharedImage::new(blend.thumbnail(options.size, options.size))));
    }

    let selection = Arc::new(SelectionState::in_memory(Arc::clone(&catalog)));
    let gallery = FilterGallery::new(catalog, selection, Arc::new(provider), &config)?;
    let events = gallery.subscribe();

    info!("Rendering '{}' from {}", category, input_path.display());
    gallery.show_category(&category);
    if !gallery.run_until_idle(Duration::from_secs(600)) {
        bail!("rendering did not finish in time");
    }

    std::fs::create_dir_all(&out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    for event in events.drain() {
        match event {
            GalleryEvent::ItemReady { key } => {
                if let Some(thumbnail) = gallery.thumbnail(&key) {
                    let path = out_dir.join(format!("{}.png", key));
                    thumbnail
                        .image()
                        .save(&path)
                        .with_context(|| format!("saving {}", path.display()))?;
                    println!("  {} -> {}", key, path.display());
                }
            }
            GalleryEvent::BatchComplete { summary } => {
                println!(
                    "Done in {:?}: {} rendered, {} cached, {} skipped",
                    summary.elapsed,
                    summary.rendered,
                    summary.cached,
                    summary.skipped.len()
                );
                for (key, reason) in &summary.skipped {
                    println!("  skipped {}: {}", key, reason);
                }
            }
        }
    }

    let stats = gallery.cache().stats();
    info!(
        "Cache: {} images, {} allocations, {} reuses",
        gallery.cache().image_count(),
        stats.resource_allocations,
        stats.resource_reuses
    );
    Ok(())
}
