use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use songbird::{
    input::{HttpRequest, Input},
    tracks::{PlayMode, TrackHandle},
    Call, Event, EventContext, EventHandler as VoiceEventHandler, Songbird, TrackEvent,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::sink::{Dispatcher, TrackEvents, VoiceConnection, VoiceSink};
use crate::{
    error::{PlayerError, PlayerResult},
    sources::StreamHandle,
};

/// Sink de voz respaldado por songbird
pub struct SongbirdSink {
    manager: Arc<Songbird>,
    http: reqwest::Client,
}

impl SongbirdSink {
    pub fn new(manager: Arc<Songbird>) -> Self {
        Self {
            manager,
            http: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl VoiceSink for SongbirdSink {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> PlayerResult<Box<dyn VoiceConnection>> {
        let call = self.manager.join(guild_id, channel_id).await.map_err(|e| {
            error!("Error al obtener handler de voz: {:?}", e);
            PlayerError::JoinError(e.to_string())
        })?;

        info!("🔊 Conectado al canal de voz en guild {}", guild_id);
        Ok(Box::new(SongbirdConnection {
            manager: self.manager.clone(),
            guild_id,
            call,
            http: self.http.clone(),
        }))
    }
}

struct SongbirdConnection {
    manager: Arc<Songbird>,
    guild_id: GuildId,
    call: Arc<Mutex<Call>>,
    http: reqwest::Client,
}

#[async_trait]
impl VoiceConnection for SongbirdConnection {
    async fn play(
        &mut self,
        stream: StreamHandle,
        volume: f32,
        events: TrackEvents,
    ) -> PlayerResult<Box<dyn Dispatcher>> {
        let input: Input = match stream {
            StreamHandle::Input(input) => input,
            StreamHandle::Url(url) => HttpRequest::new(self.http.clone(), url).into(),
        };

        let handle = {
            let mut call = self.call.lock().await;
            call.play_input(input)
        };

        handle.set_volume(volume).map_err(control_error)?;

        // Registrar event handlers para auto-play
        for event in [TrackEvent::End, TrackEvent::Error] {
            handle
                .add_event(
                    Event::Track(event),
                    TrackEndNotifier {
                        events: events.clone(),
                    },
                )
                .map_err(control_error)?;
        }

        debug!("▶️ Track {} iniciado en guild {}", events.token(), self.guild_id);
        Ok(Box::new(SongbirdDispatcher { handle }))
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.manager.remove(self.guild_id).await {
            warn!("Error al desconectar de guild {}: {:?}", self.guild_id, e);
        }
        info!("👋 Desconectado del canal de voz en guild {}", self.guild_id);
    }
}

struct SongbirdDispatcher {
    handle: TrackHandle,
}

fn control_error(e: songbird::error::ControlError) -> PlayerError {
    PlayerError::SinkRuntimeError(e.to_string())
}

#[async_trait]
impl Dispatcher for SongbirdDispatcher {
    fn pause(&self) -> PlayerResult<()> {
        self.handle.pause().map_err(control_error)
    }

    fn resume(&self) -> PlayerResult<()> {
        self.handle.play().map_err(control_error)
    }

    fn end(&self) -> PlayerResult<()> {
        self.handle.stop().map_err(control_error)
    }

    fn set_volume(&self, volume: f32) -> PlayerResult<()> {
        self.handle.set_volume(volume).map_err(control_error)
    }

    async fn elapsed(&self) -> Duration {
        self.handle
            .get_info()
            .await
            .map(|state| state.position)
            .unwrap_or_default()
    }
}

/// Reenvía el fin (o error) de un track al engine
struct TrackEndNotifier {
    events: TrackEvents,
}

#[async_trait]
impl VoiceEventHandler for TrackEndNotifier {
    async fn act(&self, ctx: &EventContext<'_>) -> Option<Event> {
        if let EventContext::Track(tracks) = ctx {
            for (state, _) in tracks.iter() {
                if let PlayMode::Errored(e) = &state.playing {
                    warn!("❌ Error en track {}: {:?}", self.events.token(), e);
                    self.events.failed(format!("{e:?}"));
                    return None;
                }
            }
        }

        debug!("Track {} terminado", self.events.token());
        self.events.finished();
        None
    }
}
