use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use jumon_arena_server::catalog::Catalog;
use jumon_arena_server::constants::{
    DEFAULT_ARENA_HEIGHT, DEFAULT_ARENA_WIDTH, TURN_TIME_LIMIT_MS,
};
use jumon_arena_server::driver::{Broadcaster, Command, MatchDriver};
use jumon_arena_server::engine::{MatchConfig, MatchSetup, StateMachine};
use jumon_arena_server::result_store::JsonResultStore;
use jumon_arena_server::server_protocol::{parse_client_message, ParsedClientMessage};
use jumon_arena_server::server_utils::{
    normalize_arena_side, normalize_player_count, normalize_turn_ms, parse_results_limit,
    sanitize_name, unique_name,
};
use jumon_arena_server::types::{GameMode, InterTurnEvent, MatchSummary, Snapshot};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

type SharedState = Arc<Mutex<ServerState>>;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, env = "PORT", default_value_t = 8080)]
    port: u16,
    /// Players per match.
    #[arg(long, default_value_t = 2)]
    players: usize,
    #[arg(long, default_value_t = DEFAULT_ARENA_WIDTH)]
    width: i32,
    #[arg(long, default_value_t = DEFAULT_ARENA_HEIGHT)]
    height: i32,
    #[arg(long, default_value_t = TURN_TIME_LIMIT_MS / 1_000)]
    turn_seconds: u64,
    /// `standard` or `last_man_standing`.
    #[arg(long, default_value = "standard")]
    mode: String,
    /// Adds a neutral player to every match.
    #[arg(long)]
    neutral: bool,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, env = "CATALOG_PATH")]
    catalog: Option<PathBuf>,
    #[arg(long, env = "RESULTS_DB_PATH", default_value = ".data/results.json")]
    results: PathBuf,
}

#[derive(Clone, Debug)]
struct MatchSettings {
    players: usize,
    width: i32,
    height: i32,
    neutral: bool,
    config: MatchConfig,
}

struct ClientContext {
    tx: mpsc::Sender<String>,
    name: Option<String>,
    match_tx: Option<mpsc::Sender<Command>>,
}

struct ServerState {
    clients: HashMap<String, ClientContext>,
    waiting: Vec<String>,
    settings: MatchSettings,
    catalog: Arc<Catalog>,
    results: Arc<Mutex<JsonResultStore>>,
    next_seed: u64,
}

#[derive(Debug, Deserialize)]
struct ResultsQuery {
    limit: Option<String>,
}

/// Fans one match's output out to its players' sockets.
struct ClientBroadcaster {
    recipients: Vec<mpsc::Sender<String>>,
}

impl ClientBroadcaster {
    fn send(&self, message: &Value) {
        let payload = message.to_string();
        for tx in &self.recipients {
            if tx.try_send(payload.clone()).is_err() {
                debug!("broadcast.dropped");
            }
        }
    }
}

impl Broadcaster for ClientBroadcaster {
    fn broadcast_snapshot(&mut self, snapshot: &Snapshot) {
        self.send(&json!({ "type": "state", "snapshot": snapshot }));
    }

    fn broadcast_event(&mut self, event: &InterTurnEvent) {
        self.send(&json!({ "type": "event", "event": event }));
    }

    fn broadcast_game_over(&mut self, summary: &MatchSummary) {
        self.send(&json!({ "type": "game_over", "summary": summary }));
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    let mode = GameMode::parse(&cli.mode).unwrap_or_else(|| {
        warn!(mode = %cli.mode, "server.unknown_mode");
        GameMode::Standard
    });
    let catalog = match &cli.catalog {
        Some(path) => Catalog::load(path).expect("failed to load catalog"),
        None => Catalog::builtin(),
    };
    let settings = MatchSettings {
        players: normalize_player_count(cli.players),
        width: normalize_arena_side(cli.width),
        height: normalize_arena_side(cli.height),
        neutral: cli.neutral,
        config: MatchConfig {
            turn_time_limit_ms: normalize_turn_ms(cli.turn_seconds),
            mode,
            ..MatchConfig::default()
        },
    };
    info!(
        players = settings.players,
        width = settings.width,
        height = settings.height,
        mode = mode.key(),
        neutral = settings.neutral,
        "server.settings"
    );

    let state = Arc::new(Mutex::new(ServerState {
        clients: HashMap::new(),
        waiting: Vec::new(),
        settings,
        catalog: Arc::new(catalog),
        results: Arc::new(Mutex::new(JsonResultStore::new(cli.results.clone()))),
        next_seed: cli.seed.unwrap_or_else(rand::random),
    }));

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/api/results", get(results_handler))
        .route("/ws", get(ws_handler))
        .with_state(state);

    let bind_addr = format!("0.0.0.0:{}", cli.port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .expect("failed to bind server socket");

    info!(port = cli.port, "server.listening");
    axum::serve(listener, app)
        .await
        .expect("server runtime failed");
}

async fn healthz() -> impl IntoResponse {
    Json(json!({ "ok": true }))
}

async fn results_handler(
    State(state): State<SharedState>,
    Query(query): Query<ResultsQuery>,
) -> impl IntoResponse {
    let results = state.lock().await.results.clone();
    let store = results.lock().await;
    Json(store.build_response(parse_results_limit(query.limit.as_deref())))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<SharedState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: SharedState, socket: WebSocket) {
    let client_id = make_id("client");
    let (tx, mut rx) = mpsc::channel::<String>(256);

    state.lock().await.clients.insert(
        client_id.clone(),
        ClientContext {
            tx: tx.clone(),
            name: None,
            match_tx: None,
        },
    );

    let (mut ws_sender, mut ws_receiver) = socket.split();
    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(received) = ws_receiver.next().await {
        let Ok(message) = received else {
            break;
        };

        match message {
            Message::Text(raw) => {
                handle_client_message(&state, &client_id, raw.as_str()).await;
            }
            Message::Binary(raw) => match std::str::from_utf8(&raw) {
                Ok(text) => handle_client_message(&state, &client_id, text).await,
                Err(_) => send_error(&state, &client_id, "invalid utf8 message").await,
            },
            Message::Close(_) => break,
            _ => {}
        }
    }

    handle_disconnect(&state, &client_id).await;
    drop(tx);
    let _ = writer.await;
}

async fn handle_client_message(state: &SharedState, client_id: &str, raw: &str) {
    let Some(message) = parse_client_message(raw) else {
        send_error(state, client_id, "invalid message").await;
        return;
    };

    match message {
        ParsedClientMessage::Hello { name } => handle_hello(state, client_id, &name).await,
        ParsedClientMessage::Ping { t } => {
            let guard = state.lock().await;
            send_to_client(&guard, client_id, &json!({ "type": "pong", "t": t }));
        }
        ParsedClientMessage::Action(event) => {
            let guard = state.lock().await;
            let Some(client) = guard.clients.get(client_id) else {
                return;
            };
            let (Some(name), Some(match_tx)) = (&client.name, &client.match_tx) else {
                send_to_client(
                    &guard,
                    client_id,
                    &json!({ "type": "error", "message": "not in a match" }),
                );
                return;
            };
            let command = Command {
                player: name.clone(),
                event,
            };
            if match_tx.try_send(command).is_err() {
                debug!(client = %client_id, "command.dropped");
            }
        }
    }
}

async fn handle_hello(state: &SharedState, client_id: &str, raw_name: &str) {
    let mut guard = state.lock().await;
    if guard
        .clients
        .get(client_id)
        .is_some_and(|client| client.name.is_some())
    {
        send_to_client(
            &guard,
            client_id,
            &json!({ "type": "error", "message": "already joined" }),
        );
        return;
    }

    let taken: Vec<String> = guard
        .clients
        .values()
        .filter_map(|client| client.name.clone())
        .collect();
    let name = unique_name(&sanitize_name(raw_name), &taken);
    if let Some(client) = guard.clients.get_mut(client_id) {
        client.name = Some(name.clone());
    }
    guard.waiting.push(client_id.to_string());
    info!(client = %client_id, player = %name, "lobby.joined");
    send_to_client(&guard, client_id, &json!({ "type": "welcome", "name": name }));
    broadcast_lobby(&guard);

    if guard.waiting.len() >= guard.settings.players {
        start_match(state, &mut guard);
    }
}

fn start_match(state: &SharedState, guard: &mut ServerState) {
    let count = guard.settings.players;
    let client_ids: Vec<String> = guard.waiting.drain(..count).collect();
    let names: Vec<String> = client_ids
        .iter()
        .filter_map(|id| guard.clients.get(id).and_then(|client| client.name.clone()))
        .collect();

    let seed = guard.next_seed;
    guard.next_seed = guard.next_seed.wrapping_add(1);
    let settings = guard.settings.clone();
    let mut rng = StdRng::seed_from_u64(seed);
    let setup = MatchSetup::random(
        &guard.catalog,
        names.clone(),
        settings.width,
        settings.height,
        settings.neutral,
        &mut rng,
    );
    let config = MatchConfig {
        seed,
        ..settings.config
    };
    let machine = match StateMachine::new(&setup, &guard.catalog, config) {
        Ok(machine) => machine,
        Err(error) => {
            warn!(%error, "match.setup_failed");
            for id in &client_ids {
                send_to_client(
                    guard,
                    id,
                    &json!({ "type": "error", "message": "match could not be created" }),
                );
            }
            return;
        }
    };

    let (command_tx, command_rx) = mpsc::channel::<Command>(64);
    let mut recipients = Vec::new();
    for id in &client_ids {
        if let Some(client) = guard.clients.get_mut(id) {
            client.match_tx = Some(command_tx.clone());
            recipients.push(client.tx.clone());
        }
    }
    drop(command_tx);
    info!(players = ?names, seed, "match.started");

    let driver = MatchDriver::new(machine, command_rx, ClientBroadcaster { recipients });
    let results = guard.results.clone();
    let state = state.clone();
    tokio::spawn(async move {
        driver.run(results).await;
        let mut guard = state.lock().await;
        for id in &client_ids {
            if let Some(client) = guard.clients.get_mut(id) {
                client.match_tx = None;
                client.name = None;
            }
        }
        broadcast_lobby(&guard);
    });
}

async fn handle_disconnect(state: &SharedState, client_id: &str) {
    let mut guard = state.lock().await;
    guard.waiting.retain(|id| id != client_id);
    if let Some(client) = guard.clients.remove(client_id) {
        info!(client = %client_id, player = ?client.name, "client.disconnected");
    }
    broadcast_lobby(&guard);
}

fn broadcast_lobby(state: &ServerState) {
    let names: Vec<String> = state
        .waiting
        .iter()
        .filter_map(|id| state.clients.get(id).and_then(|client| client.name.clone()))
        .collect();
    let message = json!({
        "type": "lobby",
        "waiting": names,
        "needed": state.settings.players,
    });
    for id in &state.waiting {
        send_to_client(state, id, &message);
    }
}

fn send_to_client(state: &ServerState, client_id: &str, message: &Value) {
    if let Some(client) = state.clients.get(client_id) {
        if client.tx.try_send(message.to_string()).is_err() {
            debug!(client = %client_id, "send.dropped");
        }
    }
}

async fn send_error(state: &SharedState, client_id: &str, message: &str) {
    let guard = state.lock().await;
    send_to_client(&guard, client_id, &json!({ "type": "error", "message": message }));
}

fn make_id(prefix: &str) -> String {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}_{id}")
}
