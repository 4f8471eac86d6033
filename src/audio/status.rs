//! Snapshots for humans: now playing, queue pages and enqueue reports.
//!
//! Everything here is derived from engine state on demand. The only moving
//! part is the [`Announcer`], which delivers engine notices in order and keeps
//! a posted now-playing message fresh until its item stops being current.

use async_trait::async_trait;
use serenity::model::id::{ChannelId, MessageId};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::{
    engine::EngineHandle,
    queue::{ItemId, ItemSummary},
    state::EngineState,
};
use crate::sources::SearchCandidate;

/// Items por página en la vista de cola
pub const PAGE_SIZE: usize = 5;

/// Segmentos de la barra de progreso
pub const PROGRESS_SEGMENTS: usize = 25;

#[derive(Debug, Clone, PartialEq)]
pub struct NowPlayingSnapshot {
    pub item: ItemSummary,
    pub elapsed: Duration,
    pub paused: bool,
}

impl NowPlayingSnapshot {
    /// Fracción reproducida; cero si la duración es desconocida
    pub fn fraction(&self) -> f64 {
        if self.item.duration.is_zero() {
            return 0.0;
        }
        self.elapsed.as_secs_f64() / self.item.duration.as_secs_f64()
    }

    /// `[=====#====================] | 20%`
    pub fn progress_bar(&self) -> String {
        let fraction = self.fraction();
        let filled = ((fraction * PROGRESS_SEGMENTS as f64).floor().max(0.0) as usize)
            .min(PROGRESS_SEGMENTS);
        let percent = (fraction * 100.0).floor().clamp(0.0, 100.0) as u32;

        format!(
            "[{}#{}] | {}%",
            "=".repeat(filled),
            "=".repeat(PROGRESS_SEGMENTS - filled),
            percent
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueueSnapshot {
    /// Página mostrada (base 1, ya acotada)
    pub page: usize,
    pub pages: usize,
    pub len: usize,
    pub total_duration: Duration,
    /// Sólo en la primera página
    pub current: Option<ItemSummary>,
    /// (posición base 1, item)
    pub entries: Vec<(usize, ItemSummary)>,
    /// Items después de esta página
    pub more: usize,
}

impl QueueSnapshot {
    pub fn build(requested_page: usize, current: Option<ItemSummary>, queued: Vec<ItemSummary>) -> Self {
        let len = queued.len();
        let pages = len.div_ceil(PAGE_SIZE).max(1);
        let page = requested_page.clamp(1, pages);
        let start = (page - 1) * PAGE_SIZE;
        let total_duration = queued.iter().map(|item| item.duration).sum();

        let entries = queued
            .into_iter()
            .enumerate()
            .skip(start)
            .take(PAGE_SIZE)
            .map(|(index, item)| (index + 1, item))
            .collect();

        Self {
            page,
            pages,
            len,
            total_duration,
            current: if page == 1 { current } else { None },
            entries,
            more: len.saturating_sub(start + PAGE_SIZE),
        }
    }
}

/// Un item agregado a la cola; `eta` cero significa que suena ahora
#[derive(Debug, Clone, PartialEq)]
pub struct Enqueued {
    pub item: ItemSummary,
    pub position: usize,
    pub eta: Duration,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EnqueueReport {
    pub items: Vec<Enqueued>,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeReport {
    pub preference: f32,
    pub normalized: f32,
    pub combined: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineStatus {
    pub state: EngineState,
    pub current: Option<ItemSummary>,
    pub queue_len: usize,
    pub volume: VolumeReport,
    pub voice_channel: Option<ChannelId>,
}

/// Mensajes que el engine (o la capa de comandos) quiere mostrar
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    Loading { request: String },
    Enqueued(EnqueueReport),
    NowPlaying(NowPlayingSnapshot),
    Skipped(ItemSummary),
    Stopped(ItemSummary),
    PlaybackFailed { title: String, reason: String },
    ResolutionFailed { request: String, reason: String },
    IdleLeave,
    Queue(QueueSnapshot),
    SearchResults(Vec<SearchCandidate>),
    Volume(VolumeReport),
}

/// Mensaje ya publicado, editable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

/// Destino de las notificaciones (Discord en producción)
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(&self, channel_id: ChannelId, notice: Notice) -> anyhow::Result<MessageRef>;

    async fn edit(&self, message: &MessageRef, notice: Notice) -> anyhow::Result<()>;
}

enum Announcement {
    Post(ChannelId, Notice),
    /// Publica y mantiene actualizado mientras el item siga sonando
    Live(ChannelId, NowPlayingSnapshot),
}

/// Entrega ordenada de notificaciones de un engine.
///
/// The engine never awaits the chat platform; it pushes here and moves on.
pub struct Announcer {
    tx: mpsc::UnboundedSender<Announcement>,
}

impl Announcer {
    pub fn spawn(
        notifier: Arc<dyn NotificationSink>,
        handle: EngineHandle,
        refresh_interval: Duration,
    ) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(announcement) = rx.recv().await {
                match announcement {
                    Announcement::Post(channel_id, notice) => {
                        if let Err(e) = notifier.send(channel_id, notice).await {
                            warn!("No se pudo enviar notificación: {:?}", e);
                        }
                    }
                    Announcement::Live(channel_id, snapshot) => {
                        let item_id = snapshot.item.id;
                        match notifier.send(channel_id, Notice::NowPlaying(snapshot)).await {
                            Ok(message) => {
                                tokio::spawn(live_refresh(
                                    handle.clone(),
                                    notifier.clone(),
                                    message,
                                    item_id,
                                    refresh_interval,
                                ));
                            }
                            Err(e) => warn!("No se pudo enviar now playing: {:?}", e),
                        }
                    }
                }
            }
            debug!("Announcer de guild {} terminado", handle.guild_id());
        });

        Self { tx }
    }

    pub fn post(&self, channel_id: ChannelId, notice: Notice) {
        let _ = self.tx.send(Announcement::Post(channel_id, notice));
    }

    pub fn now_playing(&self, channel_id: ChannelId, snapshot: NowPlayingSnapshot) {
        let _ = self.tx.send(Announcement::Live(channel_id, snapshot));
    }
}

/// Edita el mensaje de now playing cada `interval` hasta que `item_id` deja de
/// ser el item actual.
async fn live_refresh(
    handle: EngineHandle,
    notifier: Arc<dyn NotificationSink>,
    message: MessageRef,
    item_id: ItemId,
    interval: Duration,
) {
    loop {
        tokio::time::sleep(interval).await;

        let snapshot = match handle.tracking(item_id).await {
            Ok(Some(snapshot)) => snapshot,
            _ => break,
        };

        if let Err(e) = notifier.edit(&message, Notice::NowPlaying(snapshot)).await {
            warn!("No se pudo actualizar now playing: {:?}", e);
            break;
        }
    }
    debug!("Refresco de {} terminado", item_id);
}
