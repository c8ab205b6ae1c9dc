use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    CartStore, LocationProvider, MapPicker, Notification, Notifier, ReloadSignal, SessionStore,
    StaticLocation, UnavailableLocation, UserEndpoints,
};
use map_integration::HeadlessMapBackend;
use rust_decimal::Decimal;
use shared::{
    domain::{Order, Product, ProductId, Session},
    geo::{GeoPoint, RawLatLng},
    protocol::{LoginRequest, RegisterRequest},
};
use storage::{KeyValueStore, MemoryStorage, NoopStorage, Storage};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod config;

use config::{Settings, StorageMode};

#[derive(Parser, Debug)]
#[command(name = "foodmine", about = "Foodmine client: cart, account and delivery address")]
struct Cli {
    #[arg(long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    storage: Option<StorageMode>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Cart {
        #[command(subcommand)]
        action: CartCommand,
    },
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        address: String,
    },
    Logout,
    Whoami,
    /// Picks a delivery coordinate on a headless map. In read-only mode the
    /// given coordinate is the order's existing address.
    PickLocation {
        #[arg(long, allow_hyphen_values = true)]
        lat: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        lng: Option<String>,
        #[arg(long)]
        find_me: bool,
        #[arg(long)]
        readonly: bool,
    },
}

#[derive(Subcommand, Debug)]
enum CartCommand {
    Show,
    Add {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        price: Decimal,
    },
    Remove {
        #[arg(long)]
        id: String,
    },
    Quantity {
        #[arg(long)]
        id: String,
        #[arg(long)]
        quantity: u32,
    },
    Clear,
}

struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        match notification {
            Notification::Success { title, message } => println!("[{title}] {message}"),
            Notification::Failure { title, message } => eprintln!("[{title}] {message}"),
        }
    }
}

/// Composition root: one store of each kind sharing one storage backend.
struct App {
    cart: CartStore,
    session: SessionStore,
    reload: Arc<ReloadSignal>,
}

impl App {
    async fn build(settings: &Settings) -> Result<Self> {
        let storage = open_storage(settings).await?;
        let reload = Arc::new(ReloadSignal::new());
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_seconds))
            .build()
            .context("failed to build http client")?;
        let endpoints = UserEndpoints::from_base(&settings.api_url)?;

        let cart = CartStore::load(storage.clone()).await;
        let session = SessionStore::load(
            endpoints,
            storage,
            Arc::new(ConsoleNotifier),
            reload.clone(),
        )
        .await
        .with_http_client(http);

        Ok(Self {
            cart,
            session,
            reload,
        })
    }
}

async fn open_storage(settings: &Settings) -> Result<Arc<dyn KeyValueStore>> {
    let storage: Arc<dyn KeyValueStore> = match settings.storage {
        StorageMode::Sqlite => Arc::new(Storage::new(&settings.database_url).await?),
        StorageMode::Memory => Arc::new(MemoryStorage::new()),
        StorageMode::None => Arc::new(NoopStorage),
    };
    info!(mode = %settings.storage, "client storage opened");
    Ok(storage)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = config::load_settings(&cli.config)?;
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }
    if let Some(storage) = cli.storage {
        settings.storage = storage;
    }

    let app = App::build(&settings).await?;

    match cli.command {
        Command::Cart { action } => run_cart(&app.cart, action).await?,
        Command::Login { email, password } => {
            // Failures were already shown by the notifier.
            if app
                .session
                .login(&LoginRequest { email, password })
                .await
                .is_ok()
            {
                print_session(&app.session.current());
            }
        }
        Command::Register {
            name,
            email,
            password,
            address,
        } => {
            let request = RegisterRequest {
                name,
                email,
                confirm_password: password.clone(),
                password,
                address,
            };
            if app.session.register(&request).await.is_ok() {
                print_session(&app.session.current());
            }
        }
        Command::Logout => {
            app.session.logout().await?;
            if app.reload.take() {
                info!("reload requested, rebuilding client state");
                let reloaded = App::build(&settings).await?;
                print_session(&reloaded.session.current());
            }
        }
        Command::Whoami => print_session(&app.session.current()),
        Command::PickLocation {
            lat,
            lng,
            find_me,
            readonly,
        } => pick_location(&settings, lat, lng, find_me, readonly).await?,
    }

    Ok(())
}

async fn run_cart(cart: &CartStore, action: CartCommand) -> Result<()> {
    match action {
        CartCommand::Show => {}
        CartCommand::Add { id, name, price } => cart.add(Product::new(id, name, price)).await,
        CartCommand::Remove { id } => cart.remove(&ProductId::new(id)).await,
        CartCommand::Quantity { id, quantity } => {
            cart.set_quantity(&ProductId::new(id), quantity).await;
        }
        CartCommand::Clear => cart.clear().await,
    }

    let snapshot = cart.current();
    for line in &snapshot.items {
        println!(
            "{:>4} x {:<24} {:>10}  ({})",
            line.quantity, line.product.name, line.price, line.product.id
        );
    }
    println!(
        "items={} total={}",
        snapshot.total_count, snapshot.total_price
    );
    Ok(())
}

fn print_session(session: &Session) {
    match session {
        Session::Anonymous => println!("not signed in"),
        Session::Authenticated(user) => {
            println!("signed in as {} <{}> id={}", user.name, user.email, user.id);
        }
    }
}

async fn pick_location(
    settings: &Settings,
    lat: Option<String>,
    lng: Option<String>,
    find_me: bool,
    readonly: bool,
) -> Result<()> {
    let location: Arc<dyn LocationProvider> = match settings.home_location {
        Some(point) => Arc::new(StaticLocation(point)),
        None => Arc::new(UnavailableLocation),
    };
    let backend = Arc::new(HeadlessMapBackend::new());
    let mut picker = MapPicker::new(backend.clone(), location).readonly(readonly);
    let mut order = Order::default();
    let input = lat.zip(lng).map(|(lat, lng)| RawLatLng::parse(&lat, &lng));

    if readonly {
        order.address_lat_lng = input.as_ref().and_then(GeoPoint::from_raw);
    }
    picker.activate(&mut order).await;

    if let (false, Some(input), Some(view)) = (readonly, input, backend.last_view()) {
        view.click(input);
        picker.drain_events(&mut order);
    }
    if find_me {
        picker.find_my_location(&mut order).await;
    }

    println!("{}", serde_json::to_string_pretty(&order)?);
    if let Some(view) = backend.last_view() {
        let state = view.snapshot();
        println!(
            "map: state={:?} center={:?} zoom={:?} marker={:?} disabled={:?}",
            picker.state(),
            state.center,
            state.zoom,
            state.marker.map(|m| (m.position, m.draggable)),
            state.disabled
        );
    }
    Ok(())
}
