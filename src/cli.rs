use clap::{Args, Parser, Subcommand};
use sensor_monitor::adapters::{
    BrowserWindowClients, FsCacheStorage, LogNotificationSurface, ReqwestNetwork,
    SystemTimeProvider,
};
use sensor_monitor::api::ApiClient;
use sensor_monitor::config::{AppConfig, ConfigError, ConfigFile};
use sensor_monitor::push::PushPayload;
use sensor_monitor::types::http::{Method, Request};
use sensor_monitor::types::notification::PushMessage;
use sensor_monitor::types::push::PushSubscriptionRecord;
use sensor_monitor::{ServiceWorker, WorkerEvent, WorkerOutcome};
use serde::Serialize;
use std::path::PathBuf;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use url::Url;

const DEFAULT_CACHE_DIR: &str = ".sensor-monitor-cache";

type CliWorker = ServiceWorker<
    FsCacheStorage,
    ReqwestNetwork,
    LogNotificationSurface,
    BrowserWindowClients,
    SystemTimeProvider,
>;

pub(crate) async fn run() -> i32 {
    let cli = Cli::parse();
    if let Command::Init(args) = &cli.command {
        return run_init(args);
    }

    let config = match resolve_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("error: {err}");
            return 2;
        }
    };

    let result = match &cli.command {
        Command::Init(_) => return 0,
        Command::Decode(args) => run_decode(&cli, &config, args).await,
        Command::Install => run_install(&cli, &config).await,
        Command::Activate => run_activate(&cli, &config).await,
        Command::Fetch(args) => run_fetch(&cli, &config, args).await,
        Command::SendTest(args) => run_send_test(&config, args).await,
        command => run_api(&config, command).await,
    };

    match result {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {err}");
            1
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "sensor-monitor",
    version,
    about = "Offline cache and push notification worker for the sensor monitor dashboard"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Optional TOML file; flags and environment variables take precedence.
    #[arg(long, global = true, env = "SENSOR_MONITOR_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, global = true, env = "SENSOR_MONITOR_API_BASE")]
    api_base: Option<Url>,
    #[arg(long, global = true, env = "SENSOR_MONITOR_ORIGIN")]
    origin: Option<Url>,
    #[arg(long, global = true, env = "SENSOR_MONITOR_CACHE_DIR", default_value = DEFAULT_CACHE_DIR)]
    cache_dir: PathBuf,
    #[arg(long, global = true, env = "SENSOR_MONITOR_VAPID_PRIVATE_KEY")]
    vapid_private_key: Option<String>,
    #[arg(long, global = true, env = "SENSOR_MONITOR_VAPID_PUBLIC_KEY")]
    vapid_public_key: Option<String>,
    #[arg(long, global = true, env = "SENSOR_MONITOR_VAPID_SUBJECT")]
    vapid_subject: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a VAPID key pair.
    Init(InitArgs),
    /// Decode a push payload from a file or stdin and print the notification.
    Decode(DecodeArgs),
    /// Populate the current cache bucket from the asset manifest.
    Install,
    /// Delete every cache bucket except the current one.
    Activate,
    /// Answer a request the way the worker would.
    Fetch(FetchArgs),
    Sensors,
    Readings(ReadingsArgs),
    Average(AverageArgs),
    Thresholds,
    SetThreshold(SetThresholdArgs),
    /// Deliver a test notification to a stored subscription.
    SendTest(SendTestArgs),
}

#[derive(Args, Debug)]
struct InitArgs {
    #[arg(long)]
    subject: Option<String>,
}

#[derive(Args, Debug)]
struct DecodeArgs {
    /// Reads stdin when omitted. Empty input decodes as a message without payload.
    input: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Absolute URL or a path relative to the origin.
    url: String,
    #[arg(long, default_value = "GET")]
    method: Method,
}

#[derive(Args, Debug)]
struct ReadingsArgs {
    #[arg(required_unless_present = "all")]
    sensor_id: Option<i64>,
    /// List readings of every sensor.
    #[arg(long, conflicts_with = "sensor_id")]
    all: bool,
}

#[derive(Args, Debug)]
struct AverageArgs {
    sensor_id: i64,
    #[arg(long, default_value_t = 60)]
    seconds: u64,
}

#[derive(Args, Debug)]
struct SetThresholdArgs {
    kind: String,
    level: f64,
}

#[derive(Args, Debug)]
struct SendTestArgs {
    /// JSON file holding `{endpoint, p256dh, auth}`.
    #[arg(long)]
    subscription: PathBuf,
    #[arg(long, default_value = "Sensor Monitor")]
    title: String,
    #[arg(long, default_value = "Test notification")]
    body: String,
    #[arg(long)]
    icon: Option<String>,
}

fn resolve_config(cli: &Cli) -> Result<AppConfig, ConfigError> {
    let mut config = match cli.config.as_deref() {
        Some(path) => AppConfig::from_file(ConfigFile::load(path)?)?,
        None => AppConfig::default(),
    };
    if let Some(api_base) = &cli.api_base {
        config.api_base = api_base.clone();
    }
    if let Some(origin) = &cli.origin {
        config.worker.origin = origin.clone();
    }
    if let Some(key) = &cli.vapid_private_key {
        config.vapid_private_key = Some(key.clone());
    }
    if let Some(key) = &cli.vapid_public_key {
        config.vapid_public_key = Some(key.clone());
    }
    if let Some(subject) = &cli.vapid_subject {
        config.vapid_subject = Some(subject.clone());
    }
    Ok(config)
}

fn run_init(args: &InitArgs) -> i32 {
    let credentials = match sensor_monitor::generate_vapid_credentials() {
        Ok(credentials) => credentials,
        Err(err) => {
            eprintln!("failed to generate VAPID credentials: {err}");
            return 1;
        }
    };
    let (subject, show_subject_note) = match args.subject.as_deref() {
        Some(subject) => (subject.to_string(), false),
        None => ("mailto:you@example.com".to_string(), true),
    };

    println!("VAPID credentials generated.");
    println!();
    println!(
        "SENSOR_MONITOR_VAPID_PRIVATE_KEY=\"{}\"",
        credentials.private_key
    );
    println!(
        "SENSOR_MONITOR_VAPID_PUBLIC_KEY=\"{}\"",
        credentials.public_key
    );
    println!("SENSOR_MONITOR_VAPID_SUBJECT=\"{subject}\"");
    if show_subject_note {
        println!();
        println!("Note: replace SENSOR_MONITOR_VAPID_SUBJECT with a contact URI you control.");
    }
    println!();
    println!("[controller]");
    println!("application_server_key = \"{}\"", credentials.public_key);
    0
}

fn build_worker(cli: &Cli, config: &AppConfig) -> Result<CliWorker, String> {
    let network = ReqwestNetwork::new().map_err(|err| format!("failed to build client: {err}"))?;
    Ok(ServiceWorker::new(
        &config.worker,
        FsCacheStorage::new(cli.cache_dir.clone()),
        network,
        LogNotificationSurface::default(),
        BrowserWindowClients::new(config.worker.origin.clone()),
        SystemTimeProvider,
    ))
}

async fn run_decode(cli: &Cli, config: &AppConfig, args: &DecodeArgs) -> Result<(), String> {
    let payload = match args.input.as_deref() {
        Some(path) => tokio::fs::read(path)
            .await
            .map_err(|err| format!("failed to read {}: {err}", path.display()))?,
        None => {
            let mut buffer = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut buffer)
                .await
                .map_err(|err| format!("failed to read stdin: {err}"))?;
            buffer
        }
    };
    let worker = build_worker(cli, config)?;
    let outcome = worker
        .handle(WorkerEvent::Push(push_message(payload)))
        .await
        .map_err(|err| err.to_string())?;
    match outcome {
        WorkerOutcome::Notified { descriptor, .. } => print_json(&descriptor),
        other => Err(format!("unexpected worker outcome: {other:?}")),
    }
}

fn push_message(payload: Vec<u8>) -> PushMessage {
    if payload.is_empty() {
        PushMessage::empty()
    } else {
        PushMessage::with_payload(payload)
    }
}

async fn run_install(cli: &Cli, config: &AppConfig) -> Result<(), String> {
    let worker = build_worker(cli, config)?;
    let entries = worker.install().await.map_err(|err| err.to_string())?;
    println!(
        "cached {entries} entries in '{}' under {}",
        config.worker.cache_name,
        cli.cache_dir.display()
    );
    Ok(())
}

async fn run_activate(cli: &Cli, config: &AppConfig) -> Result<(), String> {
    let worker = build_worker(cli, config)?;
    let deleted = worker.activate().await.map_err(|err| err.to_string())?;
    if deleted.is_empty() {
        println!("no stale caches");
    }
    for bucket in deleted {
        println!("deleted {bucket}");
    }
    Ok(())
}

async fn run_fetch(cli: &Cli, config: &AppConfig, args: &FetchArgs) -> Result<(), String> {
    let url = resolve_target(&config.worker.origin, &args.url)?;
    let worker = build_worker(cli, config)?;
    let request = Request {
        method: args.method,
        ..Request::get(url)
    };
    let intercepted = worker.fetch(&request).await.map_err(|err| err.to_string())?;
    eprintln!(
        "{} {} ({:?})",
        intercepted.response.status,
        request.url,
        intercepted.source
    );
    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(&intercepted.response.body)
        .await
        .map_err(|err| format!("failed to write body: {err}"))?;
    stdout
        .flush()
        .await
        .map_err(|err| format!("failed to write body: {err}"))
}

fn resolve_target(origin: &Url, target: &str) -> Result<Url, String> {
    match Url::parse(target) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => origin
            .join(target)
            .map_err(|err| format!("invalid url '{target}': {err}")),
        Err(err) => Err(format!("invalid url '{target}': {err}")),
    }
}

async fn run_api(config: &AppConfig, command: &Command) -> Result<(), String> {
    let client = ApiClient::new(&config.api_base).map_err(|err| err.to_string())?;
    let printed = match command {
        Command::Sensors => client.sensors().await.map(|v| print_json(&v)),
        Command::Readings(args) => match args.sensor_id {
            Some(sensor_id) => client.readings(sensor_id).await,
            None => client.all_readings().await,
        }
        .map(|v| print_json(&v)),
        Command::Average(args) => client
            .average(args.sensor_id, args.seconds)
            .await
            .map(|v| print_json(&v)),
        Command::Thresholds => client.thresholds().await.map(|v| print_json(&v)),
        Command::SetThreshold(args) => client
            .save_threshold(&args.kind, args.level)
            .await
            .map(|v| print_json(&v)),
        other => return Err(format!("not an api command: {other:?}")),
    };
    printed.map_err(|err| err.to_string())?
}

async fn run_send_test(config: &AppConfig, args: &SendTestArgs) -> Result<(), String> {
    let raw = tokio::fs::read(&args.subscription)
        .await
        .map_err(|err| format!("failed to read {}: {err}", args.subscription.display()))?;
    let subscription = parse_subscription(&raw)?;
    let payload = PushPayload {
        icon: args.icon.clone(),
        ..PushPayload::new(args.title.clone(), args.body.clone())
    };
    sensor_monitor::push::send_configured(config, &subscription, &payload)
        .await
        .map_err(|err| err.to_string())?;
    println!("sent to {}", subscription.endpoint);
    Ok(())
}

/// Accepts both the flat record and the browser's `toJSON()` shape with a
/// nested `keys` object.
fn parse_subscription(raw: &[u8]) -> Result<PushSubscriptionRecord, String> {
    #[derive(serde::Deserialize)]
    struct Keys {
        p256dh: String,
        auth: String,
    }
    #[derive(serde::Deserialize)]
    #[serde(untagged)]
    enum Stored {
        Flat(PushSubscriptionRecord),
        Browser { endpoint: Url, keys: Keys },
    }

    match serde_json::from_slice::<Stored>(raw) {
        Ok(Stored::Flat(record)) => Ok(record),
        Ok(Stored::Browser { endpoint, keys }) => Ok(PushSubscriptionRecord {
            endpoint,
            p256dh: keys.p256dh,
            auth: keys.auth,
        }),
        Err(err) => Err(format!("invalid subscription json: {err}")),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), String> {
    let text = serde_json::to_string_pretty(value).map_err(|err| err.to_string())?;
    println!("{text}");
    Ok(())
}
