//! Frontera con el transporte de voz.
//!
//! The engine only talks to these traits. [`super::songbird_sink`] is the
//! production implementation; tests use in-memory fakes.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, GuildId};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

use super::engine::EngineEvent;
use crate::{error::PlayerResult, sources::StreamHandle};

/// Cómo terminó una reproducción
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSignal {
    Finished,
    Failed(String),
}

/// Canal por el que el sink avisa al engine que una reproducción terminó.
///
/// Every playback gets its own token, so signals from a dispatcher that the
/// engine already abandoned are recognisable and dropped.
#[derive(Debug, Clone)]
pub struct TrackEvents {
    tx: mpsc::UnboundedSender<EngineEvent>,
    token: u64,
}

impl TrackEvents {
    pub(crate) fn new(tx: mpsc::UnboundedSender<EngineEvent>, token: u64) -> Self {
        Self { tx, token }
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    pub fn finished(&self) {
        self.signal(TrackSignal::Finished);
    }

    pub fn failed(&self, reason: impl Into<String>) {
        self.signal(TrackSignal::Failed(reason.into()));
    }

    fn signal(&self, signal: TrackSignal) {
        let event = EngineEvent::Track {
            token: self.token,
            signal,
        };
        if self.tx.send(event).is_err() {
            debug!("Engine cerrado, se descarta evento del track {}", self.token);
        }
    }
}

/// Fábrica de conexiones de voz
#[async_trait]
pub trait VoiceSink: Send + Sync {
    async fn join(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> PlayerResult<Box<dyn VoiceConnection>>;
}

/// Conexión de voz abierta de una sesión
#[async_trait]
pub trait VoiceConnection: Send {
    /// Empieza a reproducir `stream`; el fin o error llega por `events`
    async fn play(
        &mut self,
        stream: StreamHandle,
        volume: f32,
        events: TrackEvents,
    ) -> PlayerResult<Box<dyn Dispatcher>>;

    async fn disconnect(&mut self);
}

/// Control de una reproducción en curso
#[async_trait]
pub trait Dispatcher: Send + Sync {
    fn pause(&self) -> PlayerResult<()>;

    fn resume(&self) -> PlayerResult<()>;

    /// Termina la reproducción. The engine ignores any end signal that follows.
    fn end(&self) -> PlayerResult<()>;

    fn set_volume(&self, volume: f32) -> PlayerResult<()>;

    /// Tiempo reproducido hasta ahora
    async fn elapsed(&self) -> Duration;
}
