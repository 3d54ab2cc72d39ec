use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use seatwarden::config::Config;
use seatwarden::db::{self, AppState, SqliteStore, queries};
use seatwarden::handlers;
use seatwarden::models::{CreateBrand, CreateProduct};

#[derive(Parser)]
#[command(name = "seatwarden", version, about = "Multi-brand license and seat management service")]
struct Cli {
    /// Override DATABASE_PATH
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
    /// Manage brands
    #[command(subcommand)]
    Brand(BrandCommand),
    /// Manage products
    #[command(subcommand)]
    Product(ProductCommand),
}

#[derive(Subcommand)]
enum BrandCommand {
    /// Create a brand and print its API key
    Create {
        #[arg(long)]
        slug: String,
        #[arg(long)]
        name: String,
    },
    /// Reject the brand's API key and block new provisioning
    Disable(BrandRef),
    Enable(BrandRef),
}

#[derive(Args)]
struct BrandRef {
    #[arg(long)]
    slug: String,
}

#[derive(Subcommand)]
enum ProductCommand {
    Create {
        /// Owning brand slug
        #[arg(long)]
        brand: String,
        #[arg(long)]
        slug: String,
        #[arg(long)]
        name: String,
        /// Seat cap for licenses that do not set their own
        #[arg(long)]
        default_max_seats: Option<i64>,
    },
    /// Stop new licenses for the product; existing ones keep working
    Disable(ProductRef),
    Enable(ProductRef),
}

#[derive(Args)]
struct ProductRef {
    #[arg(long)]
    brand: String,
    #[arg(long)]
    slug: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "seatwarden=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(path) = cli.database {
        config.database_path = path;
    }

    let pool = db::create_pool(&config.database_path, config.db_pool_size)
        .with_context(|| format!("opening database {}", config.database_path))?;
    {
        let conn = pool.get()?;
        db::init_db(&conn).context("initialising schema")?;
    }

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => {
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            serve(config, pool).await
        }
        Command::Brand(cmd) => brand_command(&pool, cmd),
        Command::Product(cmd) => product_command(&pool, cmd),
    }
}

async fn serve(config: Config, pool: db::DbPool) -> anyhow::Result<()> {
    let state = AppState {
        store: SqliteStore::new(pool).with_audit_log(config.audit_log_enabled),
    };

    if !config.audit_log_enabled {
        tracing::warn!("Audit logging is disabled");
    }

    let app = handlers::app(state);
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    tracing::info!("Seatwarden listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

fn brand_command(pool: &db::DbPool, cmd: BrandCommand) -> anyhow::Result<()> {
    let conn = pool.get()?;
    match cmd {
        BrandCommand::Create { slug, name } => {
            if queries::get_brand_by_slug(&conn, &slug)?.is_some() {
                bail!("brand {} already exists", slug);
            }
            let (brand, api_key) = queries::create_brand(&conn, &CreateBrand { slug, name })?;
            println!("Created brand {} ({})", brand.slug, brand.id);
            println!("API key (shown once): {}", api_key);
        }
        BrandCommand::Disable(BrandRef { slug }) => set_brand_active(&conn, &slug, false)?,
        BrandCommand::Enable(BrandRef { slug }) => set_brand_active(&conn, &slug, true)?,
    }
    Ok(())
}

fn set_brand_active(conn: &rusqlite::Connection, slug: &str, active: bool) -> anyhow::Result<()> {
    let brand = queries::get_brand_by_slug(conn, slug)?
        .with_context(|| format!("brand {} not found", slug))?;
    queries::set_brand_active(conn, &brand.id, active)?;
    println!("Brand {} is now {}", slug, if active { "active" } else { "inactive" });
    Ok(())
}

fn product_command(pool: &db::DbPool, cmd: ProductCommand) -> anyhow::Result<()> {
    let conn = pool.get()?;
    let (brand_slug, active, product) = match cmd {
        ProductCommand::Create {
            brand,
            slug,
            name,
            default_max_seats,
        } => {
            if default_max_seats.is_some_and(|n| n < 1) {
                bail!("--default-max-seats must be at least 1");
            }
            let owner = queries::get_brand_by_slug(&conn, &brand)?
                .with_context(|| format!("brand {} not found", brand))?;
            if queries::get_product_by_brand_and_slug(&conn, &owner.id, &slug)?.is_some() {
                bail!("product {} already exists for brand {}", slug, brand);
            }
            let product = queries::create_product(
                &conn,
                &owner.id,
                &CreateProduct {
                    slug,
                    name,
                    default_max_seats,
                },
            )?;
            println!("Created product {} ({}) for brand {}", product.slug, product.id, brand);
            return Ok(());
        }
        ProductCommand::Disable(ProductRef { brand, slug }) => (brand, false, slug),
        ProductCommand::Enable(ProductRef { brand, slug }) => (brand, true, slug),
    };

    let owner = queries::get_brand_by_slug(&conn, &brand_slug)?
        .with_context(|| format!("brand {} not found", brand_slug))?;
    let found = queries::get_product_by_brand_and_slug(&conn, &owner.id, &product)?
        .with_context(|| format!("product {} not found for brand {}", product, brand_slug))?;
    queries::set_product_active(&conn, &found.id, active)?;
    println!(
        "Product {} is now {}",
        product,
        if active { "active" } else { "inactive" }
    );
    Ok(())
}
