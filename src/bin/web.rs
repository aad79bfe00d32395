//! Single binary web server: REST API over the arena (tournaments and live games).
//! Run with: cargo run --bin web
//! Listens on 0.0.0.0:8080 by default. Override with env: HOST, PORT, and the other
//! ArenaConfig variables (ROUND_ADVANCE_DELAY_SECS, RESULTS_PATH, ...).

use actix_web::{
    delete, get, post,
    web::{Bytes, Data, Json, Path, Query},
    App, HttpResponse, HttpServer, Responder,
};
use serde::Deserialize;
use std::time::Duration;
use swiss_arena::{
    Arena, ArenaConfig, ArenaError, CasualMatch, Color, GameId, GameResult, PlayerId,
    SessionError, SessionId, Termination, TournamentError, TournamentId,
};

/// Long-poll requests (queue wait, next event) give up after this long.
const LONG_POLL_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(serde::Serialize)]
struct HealthResponse {
    ok: bool,
    service: &'static str,
}

#[derive(Deserialize)]
struct CreateTournamentBody {
    #[serde(default = "default_tournament_name")]
    name: String,
}

fn default_tournament_name() -> String {
    "Swiss tournament".to_string()
}

#[derive(Deserialize)]
struct RegisterBody {
    player_id: PlayerId,
    #[serde(default)]
    rating: i32,
}

#[derive(Deserialize)]
struct GameResultBody {
    result: GameResult,
    #[serde(default)]
    winner: Option<PlayerId>,
}

#[derive(Deserialize)]
struct PlayerBody {
    player_id: PlayerId,
}

#[derive(Deserialize)]
struct MoveBody {
    player_id: PlayerId,
    /// Long algebraic, e.g. "e2e4" or "e7e8q".
    uci: String,
}

#[derive(Deserialize)]
struct ForceEndBody {
    player_id: PlayerId,
    #[serde(default)]
    winner: Option<Color>,
    reason: Termination,
}

#[derive(Deserialize)]
struct EventCursor {
    #[serde(default)]
    after_ply: u32,
}

/// Path segment: tournament id (e.g. /api/tournaments/{id})
#[derive(Deserialize)]
struct TournamentPath {
    id: TournamentId,
}

/// Path segments: tournament id and round number (e.g. /api/tournaments/{id}/rounds/{number})
#[derive(Deserialize)]
struct RoundPath {
    id: TournamentId,
    number: u32,
}

#[derive(Deserialize)]
struct GamePath {
    game_id: GameId,
}

#[derive(Deserialize)]
struct SessionPath {
    session_id: SessionId,
}

#[derive(Deserialize)]
struct PlayerPath {
    player_id: PlayerId,
}

fn error_response(e: ArenaError) -> HttpResponse {
    let body = serde_json::json!({ "error": e.to_string() });
    match e {
        ArenaError::TournamentNotFound(_)
        | ArenaError::GameNotFound(_)
        | ArenaError::Session(SessionError::NotFound(_))
        | ArenaError::Tournament(TournamentError::GameNotFound(_)) => {
            HttpResponse::NotFound().json(body)
        }
        ArenaError::Session(SessionError::NotInSession) => HttpResponse::Forbidden().json(body),
        ArenaError::Store(_) => HttpResponse::InternalServerError().json(body),
        _ => HttpResponse::BadRequest().json(body),
    }
}

#[get("/api/health")]
async fn api_health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        ok: true,
        service: "swiss-arena",
    })
}

/// Create a new tournament in registration (returns it with id).
#[post("/api/tournaments")]
async fn api_create_tournament(
    arena: Data<Arena>,
    body: Option<Json<CreateTournamentBody>>,
) -> HttpResponse {
    let name = body
        .map(|b| b.into_inner().name)
        .unwrap_or_else(default_tournament_name);
    HttpResponse::Ok().json(arena.create_tournament(name))
}

#[get("/api/tournaments/{id}")]
async fn api_get_tournament(arena: Data<Arena>, path: Path<TournamentPath>) -> HttpResponse {
    match arena.tournament(path.id).await {
        Ok(t) => HttpResponse::Ok().json(t),
        Err(e) => error_response(e),
    }
}

/// Register one participant (registration only).
#[post("/api/tournaments/{id}/participants")]
async fn api_register(
    arena: Data<Arena>,
    path: Path<TournamentPath>,
    body: Json<RegisterBody>,
) -> HttpResponse {
    let RegisterBody { player_id, rating } = body.into_inner();
    match arena.register(path.id, player_id, rating).await {
        Ok(participant_id) => {
            HttpResponse::Ok().json(serde_json::json!({ "participant_id": participant_id }))
        }
        Err(e) => error_response(e),
    }
}

/// Import a `player_id,rating` CSV roster (request body is the CSV text).
#[post("/api/tournaments/{id}/participants/import")]
async fn api_import_roster(
    arena: Data<Arena>,
    path: Path<TournamentPath>,
    body: Bytes,
) -> HttpResponse {
    match arena.import_roster_csv(path.id, &body).await {
        Ok(imported) => HttpResponse::Ok().json(serde_json::json!({ "imported": imported })),
        Err(e) => error_response(e),
    }
}

/// Start the tournament (registration -> active) and pair round 1.
#[post("/api/tournaments/{id}/start")]
async fn api_start_tournament(arena: Data<Arena>, path: Path<TournamentPath>) -> HttpResponse {
    match arena.start_tournament(path.id).await {
        Ok(pairings) => HttpResponse::Ok().json(pairings),
        Err(e) => error_response(e),
    }
}

#[post("/api/tournaments/{id}/rounds/{number}/start")]
async fn api_start_round(arena: Data<Arena>, path: Path<RoundPath>) -> HttpResponse {
    match arena.start_round(path.id, path.number).await {
        Ok(pairings) => HttpResponse::Ok().json(pairings),
        Err(e) => error_response(e),
    }
}

#[post("/api/tournaments/{id}/rounds/{number}/complete")]
async fn api_complete_round(arena: Data<Arena>, path: Path<RoundPath>) -> HttpResponse {
    match arena.complete_round(path.id, path.number).await {
        Ok(_) => match arena.tournament(path.id).await {
            Ok(t) => HttpResponse::Ok().json(t),
            Err(e) => error_response(e),
        },
        Err(e) => error_response(e),
    }
}

/// Force-complete the tournament; returns final standings.
#[post("/api/tournaments/{id}/complete")]
async fn api_complete_tournament(arena: Data<Arena>, path: Path<TournamentPath>) -> HttpResponse {
    match arena.complete_tournament(path.id).await {
        Ok(standings) => HttpResponse::Ok().json(standings),
        Err(e) => error_response(e),
    }
}

#[get("/api/tournaments/{id}/standings")]
async fn api_standings(arena: Data<Arena>, path: Path<TournamentPath>) -> HttpResponse {
    match arena.standings(path.id).await {
        Ok(standings) => HttpResponse::Ok().json(standings),
        Err(e) => error_response(e),
    }
}

#[get("/api/tournaments/{id}/pairings")]
async fn api_pairings(arena: Data<Arena>, path: Path<TournamentPath>) -> HttpResponse {
    match arena.current_pairings(path.id).await {
        Ok(pairings) => HttpResponse::Ok().json(pairings),
        Err(e) => error_response(e),
    }
}

/// Out-of-band result (admin override).
#[post("/api/games/{game_id}/result")]
async fn api_submit_game_result(
    arena: Data<Arena>,
    path: Path<GamePath>,
    body: Json<GameResultBody>,
) -> HttpResponse {
    let GameResultBody { result, winner } = body.into_inner();
    match arena.submit_game_result(path.game_id, result, winner).await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({ "ok": true })),
        Err(e) => error_response(e),
    }
}

/// Casual queue. Answers at once when an opponent was waiting; otherwise holds the
/// request until one arrives or the long-poll times out (then the player leaves the queue).
#[post("/api/casual/queue")]
async fn api_enqueue_casual(arena: Data<Arena>, body: Json<PlayerBody>) -> HttpResponse {
    let ticket = match arena.enqueue_casual(&body.player_id) {
        CasualMatch::Matched(found) => return HttpResponse::Ok().json(found),
        CasualMatch::Waiting(ticket) => ticket,
    };
    match tokio::time::timeout(LONG_POLL_TIMEOUT, ticket.matched()).await {
        Ok(Some(found)) => HttpResponse::Ok().json(found),
        Ok(None) => HttpResponse::Gone().json(serde_json::json!({ "status": "cancelled" })),
        Err(_) => {
            arena.leave_queue(&body.player_id);
            HttpResponse::Accepted().json(serde_json::json!({ "status": "searching" }))
        }
    }
}

#[delete("/api/casual/queue/{player_id}")]
async fn api_leave_queue(arena: Data<Arena>, path: Path<PlayerPath>) -> HttpResponse {
    let removed = arena.leave_queue(&path.player_id);
    HttpResponse::Ok().json(serde_json::json!({ "removed": removed }))
}

#[post("/api/sessions/{session_id}/join")]
async fn api_join_session(
    arena: Data<Arena>,
    path: Path<SessionPath>,
    body: Json<PlayerBody>,
) -> HttpResponse {
    match arena
        .join_tournament_session(path.session_id, &body.player_id)
        .await
    {
        Ok(ack) => HttpResponse::Ok()
            .json(serde_json::json!({ "color": ack.color, "status": ack.status })),
        Err(e) => error_response(e),
    }
}

#[post("/api/sessions/{session_id}/moves")]
async fn api_submit_move(
    arena: Data<Arena>,
    path: Path<SessionPath>,
    body: Json<MoveBody>,
) -> HttpResponse {
    match arena
        .submit_move(path.session_id, &body.player_id, body.uci.trim())
        .await
    {
        Ok(ack) => HttpResponse::Ok().json(serde_json::json!({
            "move": ack.record,
            "turn": ack.turn,
            "completed": ack.completed,
        })),
        Err(e) => error_response(e),
    }
}

/// Resign, agree a draw, or otherwise end the game from one side.
#[post("/api/sessions/{session_id}/end")]
async fn api_force_end(
    arena: Data<Arena>,
    path: Path<SessionPath>,
    body: Json<ForceEndBody>,
) -> HttpResponse {
    let ForceEndBody {
        player_id,
        winner,
        reason,
    } = body.into_inner();
    match arena
        .force_end(path.session_id, &player_id, winner, reason)
        .await
    {
        Ok(outcome) => HttpResponse::Ok().json(serde_json::json!({ "completed": outcome })),
        Err(e) => error_response(e),
    }
}

#[get("/api/sessions/{session_id}")]
async fn api_get_session(arena: Data<Arena>, path: Path<SessionPath>) -> HttpResponse {
    match arena.session_snapshot(path.session_id).await {
        Ok(snapshot) => HttpResponse::Ok().json(snapshot),
        Err(e) => error_response(e),
    }
}

/// Next event after the last ply the client has seen (`?after_ply=N`, default 0).
/// Missed moves come back one per request, in order, without waiting.
#[get("/api/sessions/{session_id}/events/next")]
async fn api_next_event(
    arena: Data<Arena>,
    path: Path<SessionPath>,
    query: Query<EventCursor>,
) -> HttpResponse {
    match arena
        .next_event(path.session_id, query.after_ply, LONG_POLL_TIMEOUT)
        .await
    {
        Ok(Some(event)) => HttpResponse::Ok().json(event),
        Ok(None) => HttpResponse::NoContent().finish(),
        Err(e) => error_response(e),
    }
}

/// Retry the result hand-off for a completed session.
#[post("/api/sessions/{session_id}/persist")]
async fn api_retry_persist(arena: Data<Arena>, path: Path<SessionPath>) -> HttpResponse {
    match arena.retry_persist(path.session_id).await {
        Ok(persisted) => HttpResponse::Ok().json(serde_json::json!({ "persisted": persisted })),
        Err(e) => error_response(e),
    }
}

#[post("/api/players/{player_id}/disconnect")]
async fn api_disconnect(arena: Data<Arena>, path: Path<PlayerPath>) -> HttpResponse {
    let outcomes = arena.disconnect(&path.player_id).await;
    HttpResponse::Ok().json(serde_json::json!({ "forfeited": outcomes }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = ArenaConfig::from_env();
    let bind = (config.host.clone(), config.port);
    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    let sweep_interval = config.sweep_interval;
    let arena = Data::new(Arena::new(config));

    // Background task: retry unpersisted results, evict old sessions, forfeit no-shows
    let arena_sweep = arena.clone();
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(sweep_interval);
        loop {
            interval.tick().await;
            let forfeited = arena_sweep.sweep(chrono::Utc::now()).await;
            if !forfeited.is_empty() {
                log::info!("Sweep forfeited {} session(s)", forfeited.len());
            }
        }
    });

    HttpServer::new(move || {
        App::new()
            .app_data(arena.clone())
            .service(api_health)
            .service(api_create_tournament)
            .service(api_get_tournament)
            .service(api_register)
            .service(api_import_roster)
            .service(api_start_tournament)
            .service(api_start_round)
            .service(api_complete_round)
            .service(api_complete_tournament)
            .service(api_standings)
            .service(api_pairings)
            .service(api_submit_game_result)
            .service(api_enqueue_casual)
            .service(api_leave_queue)
            .service(api_join_session)
            .service(api_submit_move)
            .service(api_force_end)
            .service(api_get_session)
            .service(api_next_event)
            .service(api_retry_persist)
            .service(api_disconnect)
    })
    .bind(bind)?
    .run()
    .await
}
