use anyhow::Result;
use serenity::{
    builder::{
        CreateEmbed, CreateInteractionResponse, CreateInteractionResponseMessage,
        EditInteractionResponse,
    },
    model::{
        application::CommandInteraction,
        id::{ChannelId, GuildId, UserId},
    },
    prelude::Context,
};
use tracing::{info, warn};

use crate::{
    audio::{engine::EngineHandle, queue::Requester, state::EngineState, status::Notice},
    bot::PlayerBot,
    error::{Conflict, PlayerError},
    sources::{classify, ResolutionError},
    ui::embeds,
};

/// Maneja comandos slash
pub async fn handle_command(ctx: &Context, command: CommandInteraction, bot: &PlayerBot) -> Result<()> {
    let guild_id = command
        .guild_id
        .ok_or_else(|| anyhow::anyhow!("Comando usado fuera de un servidor"))?;

    info!(
        "📝 Comando /{} usado por {} en guild {}",
        command.data.name, command.user.name, guild_id
    );

    let engine = bot.registry.get_or_create(guild_id);

    match command.data.name.as_str() {
        // Pueden tardar: respuesta diferida
        "play" | "search" | "join" => {
            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Defer(CreateInteractionResponseMessage::new()),
                )
                .await?;

            let embed = match command.data.name.as_str() {
                "play" => handle_play(ctx, &command, &engine, guild_id).await,
                "search" => handle_search(ctx, &command, &engine, guild_id).await,
                _ => handle_join(ctx, &command, &engine, guild_id).await,
            };

            command
                .edit_response(&ctx.http, EditInteractionResponse::new().embed(embed))
                .await?;
        }
        name => {
            let embed = match name {
                "leave" => outcome(engine.leave().await.map(|()| {
                    embeds::create_success_embed("Desconectado", "👋 Salí del canal de voz")
                })),
                "pause" => outcome(engine.pause().await.map(|()| {
                    embeds::create_success_embed("Pausado", "⏸️ Reproducción pausada")
                })),
                "resume" => outcome(engine.resume().await.map(|()| {
                    embeds::create_success_embed("Reanudado", "▶️ Reproducción reanudada")
                })),
                "skip" => outcome(
                    engine
                        .skip()
                        .await
                        .map(|item| embeds::render(&Notice::Skipped(item))),
                ),
                "stop" => outcome(
                    engine
                        .stop()
                        .await
                        .map(|item| embeds::render(&Notice::Stopped(item))),
                ),
                "remove" => {
                    let position = option_int(&command, "position").unwrap_or(0).max(0) as usize;
                    outcome(engine.remove(position).await.map(|item| {
                        embeds::create_success_embed(
                            "Eliminado",
                            &format!("**{}** se quitó de la cola", item.title),
                        )
                    }))
                }
                "shuffle" => outcome(engine.shuffle().await.map(|count| {
                    embeds::create_success_embed(
                        "Cola mezclada",
                        &format!("🔀 {} canciones mezcladas", count),
                    )
                })),
                "volume" => {
                    let result = match option_int(&command, "level") {
                        Some(level) => engine.set_volume_preference(level as f32).await,
                        None => engine.volume().await,
                    };
                    outcome(result.map(|report| embeds::render(&Notice::Volume(report))))
                }
                "queue" => {
                    let page = option_int(&command, "page").unwrap_or(1).max(1) as usize;
                    outcome(
                        engine
                            .queue_view(page)
                            .await
                            .map(|snapshot| embeds::render(&Notice::Queue(snapshot))),
                    )
                }
                "nowplaying" => outcome(
                    engine
                        .now_playing_view()
                        .await
                        .map(|snapshot| embeds::render(&Notice::NowPlaying(snapshot))),
                ),
                _ => embeds::create_error_embed("Comando no reconocido", name),
            };

            command
                .create_response(
                    &ctx.http,
                    CreateInteractionResponse::Message(
                        CreateInteractionResponseMessage::new().embed(embed),
                    ),
                )
                .await?;
        }
    }

    Ok(())
}

// Handlers específicos para cada comando

async fn handle_play(
    ctx: &Context,
    command: &CommandInteraction,
    engine: &EngineHandle,
    guild_id: GuildId,
) -> CreateEmbed {
    let Some(query) = option_str(command, "query") else {
        return embeds::create_error_embed("Falta la búsqueda", "Usa /play <url o texto>");
    };

    // Texto libre: primer resultado de la búsqueda
    let url = if classify(query).is_some() {
        query.to_string()
    } else {
        match engine.search(query).await {
            Ok(results) => match results.into_iter().next() {
                Some(first) => first.url,
                None => return embeds::create_error_embed("Sin resultados", query),
            },
            Err(e) => return error_embed(&e),
        }
    };

    enqueue(ctx, command, engine, guild_id, url).await
}

async fn handle_search(
    ctx: &Context,
    command: &CommandInteraction,
    engine: &EngineHandle,
    guild_id: GuildId,
) -> CreateEmbed {
    let Some(query) = option_str(command, "query") else {
        return embeds::create_error_embed("Falta la búsqueda", "Usa /search <texto>");
    };

    let results = match engine.search(query).await {
        Ok(results) => results,
        Err(e) => return error_embed(&e),
    };

    match option_int(command, "pick") {
        Some(pick) => {
            let len = results.len();
            let chosen = usize::try_from(pick)
                .ok()
                .and_then(|pick| pick.checked_sub(1))
                .and_then(|index| results.into_iter().nth(index));
            match chosen {
                Some(candidate) => enqueue(ctx, command, engine, guild_id, candidate.url).await,
                None => error_embed(&PlayerError::IndexOutOfRange {
                    position: pick.max(0) as usize,
                    len,
                }),
            }
        }
        None => embeds::render(&Notice::SearchResults(results)),
    }
}

async fn handle_join(
    ctx: &Context,
    command: &CommandInteraction,
    engine: &EngineHandle,
    guild_id: GuildId,
) -> CreateEmbed {
    let voice_channel_id = match get_user_voice_channel(ctx, guild_id, command.user.id) {
        Ok(channel_id) => channel_id,
        Err(e) => return embeds::create_warning_embed("Sin canal de voz", &e.to_string()),
    };

    outcome(
        engine
            .join(voice_channel_id, command.channel_id)
            .await
            .map(|()| embeds::create_success_embed("Conectado", "🔊 Conectado al canal de voz")),
    )
}

/// Conecta si hace falta y agrega `url` a la cola
async fn enqueue(
    ctx: &Context,
    command: &CommandInteraction,
    engine: &EngineHandle,
    guild_id: GuildId,
    url: String,
) -> CreateEmbed {
    let asleep = matches!(
        engine.status().await.map(|status| status.state),
        Ok(EngineState::Asleep)
    );
    if asleep {
        let voice_channel_id = match get_user_voice_channel(ctx, guild_id, command.user.id) {
            Ok(channel_id) => channel_id,
            Err(e) => return embeds::create_warning_embed("Sin canal de voz", &e.to_string()),
        };
        match engine.join(voice_channel_id, command.channel_id).await {
            // Otro comando conectó primero
            Ok(()) | Err(PlayerError::StateConflict(Conflict::AlreadyConnected)) => {}
            Err(e) => return error_embed(&e),
        }
    }

    let requester = Requester {
        user_id: command.user.id,
        display_name: command
            .member
            .as_ref()
            .map(|member| member.display_name().to_string())
            .unwrap_or_else(|| command.user.name.clone()),
    };

    match engine.enqueue(url.clone(), requester).await {
        Ok(report) => embeds::render(&Notice::Enqueued(report)),
        Err(PlayerError::ResolutionFailure(e)) => {
            warn!("❌ No se pudo obtener {}: {}", url, e);
            embeds::render(&Notice::ResolutionFailed {
                request: url,
                reason: e.to_string(),
            })
        }
        Err(e) => error_embed(&e),
    }
}

// Funciones auxiliares

fn outcome(result: Result<CreateEmbed, PlayerError>) -> CreateEmbed {
    result.unwrap_or_else(|e| error_embed(&e))
}

fn error_embed(error: &PlayerError) -> CreateEmbed {
    let title = match error {
        PlayerError::StateConflict(_) => "No se puede hacer eso ahora",
        PlayerError::ResolutionFailure(ResolutionError::Unsupported(_)) => "Fuente no soportada",
        PlayerError::ResolutionFailure(_) => "No se pudo obtener el audio",
        PlayerError::IndexOutOfRange { .. } => "Posición inválida",
        PlayerError::EmptyQueue => "Cola vacía",
        PlayerError::QueueFull(_) => "Cola llena",
        PlayerError::JoinError(_) => "No pude conectarme",
        PlayerError::SinkRuntimeError(_) => "Error de audio",
        PlayerError::EngineGone => "Reproductor no disponible",
    };
    embeds::create_error_embed(title, &error.to_string())
}

fn option_str<'a>(command: &'a CommandInteraction, name: &str) -> Option<&'a str> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_str())
}

fn option_int(command: &CommandInteraction, name: &str) -> Option<i64> {
    command
        .data
        .options
        .iter()
        .find(|opt| opt.name == name)
        .and_then(|opt| opt.value.as_i64())
}

fn get_user_voice_channel(ctx: &Context, guild_id: GuildId, user_id: UserId) -> Result<ChannelId> {
    let guild = guild_id
        .to_guild_cached(&ctx.cache)
        .ok_or_else(|| anyhow::anyhow!("Guild no encontrada en caché"))?;

    let channel_id = guild
        .voice_states
        .get(&user_id)
        .and_then(|voice_state| voice_state.channel_id)
        .ok_or_else(|| anyhow::anyhow!("Debes estar en un canal de voz"))?;

    Ok(channel_id)
}
