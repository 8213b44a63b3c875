use car_catalog::config::{self, CONFIG_FILENAME, CatalogConfig};
use car_catalog::imaging::{RustBackend, normalise_batch};
use car_catalog::types::{
    CarAttributes, CarId, CarImageId, CarModelId, CarStatus, ChannelId, MakeId, PublicationResult,
    default_currency,
};
use car_catalog::{
    Catalog, CarDraft, CarImageUpload, NewChannel, PublicationAttempt, PublicationLogFilter,
    output,
};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "car-catalog")]
#[command(about = "Back office for a used-car catalog")]
#[command(long_about = "\
Back office for a used-car catalog

Keeps makes, models, car listings, their photos and marketplace submissions
in a JSON snapshot next to catalog.toml. Uploaded photos are turned upright,
converted to RGB, bounded to 2560px and stored as JPEG.

Run 'car-catalog gen-config' to generate a documented catalog.toml.")]
#[command(version)]
struct Cli {
    /// Config file; storage paths inside it are relative to its directory
    #[arg(long, default_value = CONFIG_FILENAME, global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Normalise photos into a directory without touching the catalog
    Normalise {
        /// Photos to normalise
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Where to write the JPEGs
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Manage makes
    #[command(subcommand)]
    Make(MakeCommand),
    /// Manage car models
    #[command(subcommand)]
    Model(ModelCommand),
    /// Manage equipment features
    #[command(subcommand)]
    Feature(FeatureCommand),
    /// Manage car listings
    #[command(subcommand)]
    Car(CarCommand),
    /// Manage car photos
    #[command(subcommand)]
    Image(ImageCommand),
    /// Manage publication channels
    #[command(subcommand)]
    Channel(ChannelCommand),
    /// Record and inspect marketplace submissions
    #[command(subcommand)]
    Publication(PublicationCommand),
    /// Print a stock catalog.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum MakeCommand {
    Add {
        title: String,
        #[arg(long)]
        slug: Option<String>,
    },
    List,
}

#[derive(Subcommand)]
enum ModelCommand {
    Add {
        /// Make id
        #[arg(long)]
        make: u64,
        title: String,
        #[arg(long)]
        slug: Option<String>,
    },
    List {
        #[arg(long)]
        make: Option<u64>,
    },
}

#[derive(Subcommand)]
enum FeatureCommand {
    /// Add a feature, creating its category if needed
    Add { category: String, title: String },
}

#[derive(Subcommand)]
enum CarCommand {
    Add(CarArgs),
    /// Change a car's status
    Status { id: u64, status: CarStatus },
    Show { id: u64 },
    List {
        #[arg(long)]
        status: Option<CarStatus>,
    },
    /// Delete a car with its photos and publication logs
    Delete { id: u64 },
}

#[derive(clap::Args)]
struct CarArgs {
    #[arg(long)]
    title: String,
    #[arg(long)]
    make: u64,
    #[arg(long)]
    model: u64,
    #[arg(long)]
    year: u16,
    #[arg(long)]
    price: Decimal,
    #[arg(long, default_value_t = default_currency())]
    currency: String,
    #[arg(long, default_value = "")]
    vin: String,
    #[arg(long, default_value_t = 0)]
    mileage: u32,
    #[arg(long, default_value = "")]
    contact_name: String,
    #[arg(long, default_value = "")]
    contact_phone: String,
    #[arg(long, default_value = "draft")]
    status: CarStatus,
}

#[derive(Subcommand)]
enum ImageCommand {
    /// Upload one photo
    Add {
        car: u64,
        file: PathBuf,
        #[arg(long)]
        primary: bool,
        #[arg(long, default_value = "")]
        caption: String,
        #[arg(long, default_value_t = 0)]
        ordering: u16,
    },
    /// Upload every supported photo in a directory
    Import { car: u64, dir: PathBuf },
    /// Make a photo the car's primary one
    Primary { image: u64 },
}

#[derive(Subcommand)]
enum ChannelCommand {
    Add {
        title: String,
        #[arg(long)]
        slug: Option<String>,
        #[arg(long, default_value = "")]
        description: String,
    },
}

#[derive(Subcommand)]
enum PublicationCommand {
    Record {
        car: u64,
        channel: u64,
        #[arg(long, default_value = "pending")]
        status: PublicationResult,
        #[arg(long, default_value = "")]
        external_id: String,
        #[arg(long, default_value = "")]
        error: String,
    },
    List {
        #[arg(long)]
        car: Option<u64>,
        #[arg(long)]
        channel: Option<u64>,
        #[arg(long)]
        status: Option<PublicationResult>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.config)?;
    init_tracing(&config);

    if let Command::Normalise { files, out_dir } = &cli.command {
        return normalise_files(&config, files, out_dir);
    }

    let catalog = Catalog::open(&config)?;
    let mutated = run(&catalog, cli.command)?;
    if mutated {
        catalog.persist()?;
    }
    Ok(())
}

/// Log to stderr so stdout carries only command output. `RUST_LOG` wins
/// over the configured level.
fn init_tracing(config: &CatalogConfig) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn normalise_files(
    config: &CatalogConfig,
    files: &[PathBuf],
    out_dir: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut uploads = Vec::with_capacity(files.len());
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        uploads.push((std::fs::read(path)?, name));
    }
    let normalised = normalise_batch(
        &RustBackend::new(),
        &uploads,
        &config.images.normalise_params(),
    )?;
    std::fs::create_dir_all(out_dir)?;
    let mut results = Vec::with_capacity(normalised.len());
    for ((_, source), image) in uploads.into_iter().zip(normalised) {
        std::fs::write(out_dir.join(&image.file_name), &image.bytes)?;
        results.push((source, image));
    }
    output::print_normalised(&results);
    Ok(())
}

/// Execute a catalog command. Returns whether anything was written.
fn run(catalog: &Catalog, command: Command) -> Result<bool, Box<dyn std::error::Error>> {
    match command {
        Command::Make(MakeCommand::Add { title, slug }) => {
            let make = catalog.create_make(&title, slug.as_deref())?;
            println!("Created make #{} {} ({})", make.id, make.title, make.slug);
            Ok(true)
        }
        Command::Make(MakeCommand::List) => {
            output::print_makes(&catalog.makes(), &catalog.car_models(None));
            Ok(false)
        }
        Command::Model(ModelCommand::Add { make, title, slug }) => {
            let model = catalog.create_car_model(MakeId(make), &title, slug.as_deref())?;
            println!("Created model #{} {} ({})", model.id, model.title, model.slug);
            Ok(true)
        }
        Command::Model(ModelCommand::List { make }) => {
            let makes = match make {
                Some(id) => vec![catalog.get_make(MakeId(id))?],
                None => catalog.makes(),
            };
            output::print_makes(&makes, &catalog.car_models(make.map(MakeId)));
            Ok(false)
        }
        Command::Feature(FeatureCommand::Add { category, title }) => {
            let existing = catalog
                .feature_categories()
                .into_iter()
                .find(|c| c.title == category);
            let category = match existing {
                Some(category) => category,
                None => catalog.create_feature_category(&category, None)?,
            };
            let feature = catalog.create_feature(category.id, &title, None)?;
            println!(
                "Created feature #{} {} in {}",
                feature.id, feature.title, category.title
            );
            Ok(true)
        }
        Command::Car(CarCommand::Add(args)) => {
            let mut attrs = CarAttributes::new(
                args.title,
                MakeId(args.make),
                CarModelId(args.model),
                args.year,
                args.price,
            );
            attrs.currency = args.currency;
            attrs.vin = args.vin;
            attrs.mileage_km = args.mileage;
            attrs.contact_name = args.contact_name;
            attrs.contact_phone = args.contact_phone;
            attrs.status = args.status;
            let car = catalog.save_car(CarDraft::create(attrs), None, None)?;
            println!("Created car #{} ({})", car.id, car.slug);
            Ok(true)
        }
        Command::Car(CarCommand::Status { id, status }) => {
            let car = catalog.set_car_status(CarId(id), status)?;
            println!("Car #{} is now {}", car.id, car.status());
            Ok(true)
        }
        Command::Car(CarCommand::Show { id }) => {
            let car = catalog.get_car(CarId(id))?;
            let images = catalog.car_images(car.id)?;
            output::print_car_details(&car, &images);
            Ok(false)
        }
        Command::Car(CarCommand::List { status }) => {
            output::print_car_list(&catalog.cars(status));
            Ok(false)
        }
        Command::Car(CarCommand::Delete { id }) => {
            catalog.delete_car(CarId(id))?;
            println!("Deleted car #{id}");
            Ok(true)
        }
        Command::Image(ImageCommand::Add {
            car,
            file,
            primary,
            caption,
            ordering,
        }) => {
            let name = file
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut upload = CarImageUpload::new(CarId(car), std::fs::read(&file)?, name)
                .with_caption(caption)
                .with_ordering(ordering);
            upload.is_primary = primary;
            let image = catalog.save_car_image(upload)?;
            println!("Stored image #{} as {}", image.id, image.payload);
            Ok(true)
        }
        Command::Image(ImageCommand::Import { car, dir }) => {
            let imported = catalog.import_images(CarId(car), &dir)?;
            for image in &imported {
                println!("Stored image #{} as {}", image.id, image.payload);
            }
            Ok(!imported.is_empty())
        }
        Command::Image(ImageCommand::Primary { image }) => {
            let image = catalog.set_primary_image(CarImageId(image))?;
            println!("Image #{} is now primary for car #{}", image.id, image.car);
            Ok(true)
        }
        Command::Channel(ChannelCommand::Add {
            title,
            slug,
            description,
        }) => {
            let channel = catalog.create_channel(NewChannel {
                title,
                slug,
                description,
                ..NewChannel::default()
            })?;
            println!("Created channel #{} ({})", channel.id, channel.slug);
            Ok(true)
        }
        Command::Publication(PublicationCommand::Record {
            car,
            channel,
            status,
            external_id,
            error,
        }) => {
            let log = catalog.record_publication(
                CarId(car),
                ChannelId(channel),
                PublicationAttempt {
                    external_id,
                    status,
                    error_message: error,
                    published_at: None,
                },
            )?;
            println!("Recorded publication #{}", log.id);
            Ok(true)
        }
        Command::Publication(PublicationCommand::List {
            car,
            channel,
            status,
        }) => {
            let logs = catalog.publication_logs(PublicationLogFilter {
                car: car.map(CarId),
                channel: channel.map(ChannelId),
                status,
            });
            output::print_publication_logs(&logs);
            Ok(false)
        }
        Command::Normalise { .. } | Command::GenConfig => Ok(false),
    }
}
