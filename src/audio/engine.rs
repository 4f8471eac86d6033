//! Controlador de reproducción de una sesión.
//!
//! Each session runs one [`PlaybackEngine`] task. Everything that can change
//! its state arrives as an [`EngineEvent`] on a single channel: user commands
//! (with a oneshot reply), finished resolutions, sink end/error signals and
//! idle-timer expiry. Events are handled one at a time and to completion.
//!
//! Voice joins and resolutions run in spawned tasks so the engine keeps
//! answering commands while the sink connects or media loads. A resolution remembers the session epoch it started
//! in; if the engine left (or re-joined) in the meantime its result is
//! dropped and the caller gets [`Conflict::SessionClosed`].

use serenity::model::id::{ChannelId, GuildId};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use super::{
    queue::{ItemId, ItemSummary, MusicQueue, PlaybackItem, Requester},
    sink::{Dispatcher, TrackEvents, TrackSignal, VoiceConnection, VoiceSink},
    state::EngineState,
    status::{
        Announcer, EngineStatus, EnqueueReport, Enqueued, NotificationSink, Notice,
        NowPlayingSnapshot, QueueSnapshot, VolumeReport,
    },
    volume::VolumeState,
};
use crate::{
    error::{Conflict, PlayerError, PlayerResult},
    sources::{classify, ResolutionError, ResolvedBatch, SearchCandidate, SourceManager},
};

/// Ajustes de un engine, derivados de la configuración
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub idle_timeout: Duration,
    pub refresh_interval: Duration,
    pub loudness_target_db: f32,
    /// Porcentaje (100 = volumen original)
    pub default_volume: f32,
    pub max_queue_size: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            idle_timeout: Duration::from_secs(300),
            refresh_interval: Duration::from_secs(5),
            loudness_target_db: -14.0,
            default_volume: 100.0,
            max_queue_size: 1000,
        }
    }
}

/// Colaboradores compartidos por todos los engines
#[derive(Clone)]
pub struct EngineDeps {
    pub sink: Arc<dyn VoiceSink>,
    pub sources: Arc<SourceManager>,
    pub notifier: Arc<dyn NotificationSink>,
    pub settings: EngineSettings,
}

type Reply<T> = oneshot::Sender<PlayerResult<T>>;

pub(crate) enum Command {
    Join {
        voice_channel: ChannelId,
        text_channel: ChannelId,
        reply: Reply<()>,
    },
    Leave {
        reply: Reply<()>,
    },
    Enqueue {
        request: String,
        requester: Requester,
        reply: Reply<EnqueueReport>,
    },
    Pause {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    Skip {
        reply: Reply<ItemSummary>,
    },
    Stop {
        reply: Reply<ItemSummary>,
    },
    Remove {
        position: usize,
        reply: Reply<ItemSummary>,
    },
    Shuffle {
        reply: Reply<usize>,
    },
    SetVolume {
        raw: f32,
        reply: Reply<VolumeReport>,
    },
    Volume {
        reply: Reply<VolumeReport>,
    },
    QueueView {
        page: usize,
        reply: Reply<QueueSnapshot>,
    },
    NowPlaying {
        reply: Reply<NowPlayingSnapshot>,
    },
    Status {
        reply: Reply<EngineStatus>,
    },
    /// Snapshot only if `item` is still the current item
    Tracking {
        item: ItemId,
        reply: oneshot::Sender<Option<NowPlayingSnapshot>>,
    },
    Shutdown,
}

pub(crate) enum EngineEvent {
    Command(Command),
    Joined {
        epoch: u64,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        result: PlayerResult<Box<dyn VoiceConnection>>,
        reply: Reply<()>,
    },
    Resolved {
        epoch: u64,
        request: String,
        requester: Requester,
        result: Result<ResolvedBatch, ResolutionError>,
        reply: Reply<EnqueueReport>,
    },
    Track {
        token: u64,
        signal: TrackSignal,
    },
    IdleTimeout {
        generation: u64,
    },
}

/// Handle clonable hacia el engine de una sesión
#[derive(Clone)]
pub struct EngineHandle {
    guild_id: GuildId,
    tx: mpsc::UnboundedSender<EngineEvent>,
    sources: Arc<SourceManager>,
}

impl EngineHandle {
    pub fn guild_id(&self) -> GuildId {
        self.guild_id
    }

    /// El task del engine ya terminó
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    async fn request<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> PlayerResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineEvent::Command(command(reply)))
            .map_err(|_| PlayerError::EngineGone)?;
        rx.await.map_err(|_| PlayerError::EngineGone)?
    }

    pub async fn join(&self, voice_channel: ChannelId, text_channel: ChannelId) -> PlayerResult<()> {
        self.request(|reply| Command::Join {
            voice_channel,
            text_channel,
            reply,
        })
        .await
    }

    pub async fn leave(&self) -> PlayerResult<()> {
        self.request(|reply| Command::Leave { reply }).await
    }

    /// Resuelve `request` y lo agrega a la cola. Resolves once the media is
    /// queued (or failed), not when the command is accepted.
    pub async fn enqueue(
        &self,
        request: impl Into<String>,
        requester: Requester,
    ) -> PlayerResult<EnqueueReport> {
        let request = request.into();
        self.request(|reply| Command::Enqueue {
            request,
            requester,
            reply,
        })
        .await
    }

    pub async fn pause(&self) -> PlayerResult<()> {
        self.request(|reply| Command::Pause { reply }).await
    }

    pub async fn resume(&self) -> PlayerResult<()> {
        self.request(|reply| Command::Resume { reply }).await
    }

    pub async fn skip(&self) -> PlayerResult<ItemSummary> {
        self.request(|reply| Command::Skip { reply }).await
    }

    pub async fn stop(&self) -> PlayerResult<ItemSummary> {
        self.request(|reply| Command::Stop { reply }).await
    }

    pub async fn remove(&self, position: usize) -> PlayerResult<ItemSummary> {
        self.request(|reply| Command::Remove { position, reply }).await
    }

    pub async fn shuffle(&self) -> PlayerResult<usize> {
        self.request(|reply| Command::Shuffle { reply }).await
    }

    pub async fn set_volume_preference(&self, raw: f32) -> PlayerResult<VolumeReport> {
        self.request(|reply| Command::SetVolume { raw, reply }).await
    }

    pub async fn volume(&self) -> PlayerResult<VolumeReport> {
        self.request(|reply| Command::Volume { reply }).await
    }

    pub async fn queue_view(&self, page: usize) -> PlayerResult<QueueSnapshot> {
        self.request(|reply| Command::QueueView { page, reply }).await
    }

    pub async fn now_playing_view(&self) -> PlayerResult<NowPlayingSnapshot> {
        self.request(|reply| Command::NowPlaying { reply }).await
    }

    pub async fn status(&self) -> PlayerResult<EngineStatus> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Búsqueda por texto; no pasa por el engine
    pub async fn search(&self, query: &str) -> PlayerResult<Vec<SearchCandidate>> {
        Ok(self.sources.search(query).await?)
    }

    pub(crate) async fn tracking(&self, item: ItemId) -> PlayerResult<Option<NowPlayingSnapshot>> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(EngineEvent::Command(Command::Tracking { item, reply }))
            .map_err(|_| PlayerError::EngineGone)?;
        rx.await.map_err(|_| PlayerError::EngineGone)
    }

    /// Detiene el task del engine (desconectando si hace falta)
    pub fn shutdown(&self) {
        let _ = self.tx.send(EngineEvent::Command(Command::Shutdown));
    }
}

/// Arranca el engine de una sesión y devuelve su handle
pub fn spawn_engine(guild_id: GuildId, deps: EngineDeps) -> EngineHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = EngineHandle {
        guild_id,
        tx: tx.clone(),
        sources: deps.sources.clone(),
    };

    let announcer = Announcer::spawn(
        deps.notifier.clone(),
        handle.clone(),
        deps.settings.refresh_interval,
    );
    let engine = PlaybackEngine::new(guild_id, deps, tx, announcer);
    tokio::spawn(engine.run(rx));

    handle
}

struct PlaybackEngine {
    guild_id: GuildId,
    sink: Arc<dyn VoiceSink>,
    sources: Arc<SourceManager>,
    settings: EngineSettings,
    tx: mpsc::UnboundedSender<EngineEvent>,
    announcer: Announcer,

    state: EngineState,
    queue: MusicQueue,
    current: Option<PlaybackItem>,
    dispatcher: Option<Box<dyn Dispatcher>>,
    connection: Option<Box<dyn VoiceConnection>>,
    voice_channel: Option<ChannelId>,
    text_channel: Option<ChannelId>,
    volume: VolumeState,

    /// Bumped on every join and leave
    epoch: u64,
    /// Token of the playback whose signals are still meaningful
    token: u64,
    next_item: u64,
    /// Resolutions in flight for the current epoch
    pending: usize,
    /// A sink join is in flight
    joining: bool,
    idle_generation: u64,
    idle_timer: Option<JoinHandle<()>>,
}

impl PlaybackEngine {
    fn new(
        guild_id: GuildId,
        deps: EngineDeps,
        tx: mpsc::UnboundedSender<EngineEvent>,
        announcer: Announcer,
    ) -> Self {
        let settings = deps.settings;
        Self {
            guild_id,
            sink: deps.sink,
            sources: deps.sources,
            tx,
            announcer,
            state: EngineState::Asleep,
            queue: MusicQueue::new(settings.max_queue_size),
            current: None,
            dispatcher: None,
            connection: None,
            voice_channel: None,
            text_channel: None,
            volume: VolumeState::new(settings.default_volume),
            epoch: 0,
            token: 0,
            next_item: 0,
            pending: 0,
            joining: false,
            idle_generation: 0,
            idle_timer: None,
            settings,
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<EngineEvent>) {
        info!("🎛️ Engine iniciado para guild {}", self.guild_id);

        while let Some(event) = rx.recv().await {
            match event {
                EngineEvent::Command(Command::Shutdown) => {
                    if self.state.is_connected() {
                        self.leave().await;
                    }
                    break;
                }
                EngineEvent::Command(command) => self.handle_command(command).await,
                EngineEvent::Joined {
                    epoch,
                    voice_channel,
                    text_channel,
                    result,
                    reply,
                } => {
                    let outcome = self.on_joined(epoch, voice_channel, text_channel, result).await;
                    let _ = reply.send(outcome);
                }
                EngineEvent::Resolved {
                    epoch,
                    request,
                    requester,
                    result,
                    reply,
                } => {
                    let outcome = self.on_resolved(epoch, &request, requester, result).await;
                    let _ = reply.send(outcome);
                }
                EngineEvent::Track { token, signal } => self.on_track_signal(token, signal).await,
                EngineEvent::IdleTimeout { generation } => self.on_idle_timeout(generation).await,
            }
        }

        // Joins that finished after the shutdown still hold a voice connection
        rx.close();
        while let Ok(event) = rx.try_recv() {
            if let EngineEvent::Joined {
                result: Ok(mut connection),
                ..
            } = event
            {
                connection.disconnect().await;
            }
        }

        self.cancel_idle_timer();
        info!("🛑 Engine detenido para guild {}", self.guild_id);
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Join {
                voice_channel,
                text_channel,
                reply,
            } => self.join(voice_channel, text_channel, reply),
            Command::Leave { reply } => {
                let result = if self.state.is_connected() {
                    self.leave().await;
                    Ok(())
                } else if self.joining {
                    self.abandon_join();
                    Ok(())
                } else {
                    Err(Conflict::AlreadyAsleep.into())
                };
                let _ = reply.send(result);
            }
            Command::Enqueue {
                request,
                requester,
                reply,
            } => self.enqueue(request, requester, reply),
            Command::Pause { reply } => {
                let _ = reply.send(self.pause());
            }
            Command::Resume { reply } => {
                let _ = reply.send(self.resume());
            }
            Command::Skip { reply } => {
                let _ = reply.send(self.skip("skip").await);
            }
            Command::Stop { reply } => {
                let _ = reply.send(self.skip("stop").await);
            }
            Command::Remove { position, reply } => {
                let result = self.queue.remove(position).map(|item| item.summary());
                let _ = reply.send(result);
            }
            Command::Shuffle { reply } => {
                let _ = reply.send(self.queue.shuffle());
            }
            Command::SetVolume { raw, reply } => {
                let _ = reply.send(Ok(self.set_volume(raw)));
            }
            Command::Volume { reply } => {
                let _ = reply.send(Ok(self.volume_report()));
            }
            Command::QueueView { page, reply } => {
                let snapshot = QueueSnapshot::build(
                    page,
                    self.current.as_ref().map(PlaybackItem::summary),
                    self.queue.iter().map(PlaybackItem::summary).collect(),
                );
                let _ = reply.send(Ok(snapshot));
            }
            Command::NowPlaying { reply } => {
                let snapshot = self.now_playing().await;
                let _ = reply.send(snapshot.ok_or_else(|| Conflict::NothingPlaying.into()));
            }
            Command::Status { reply } => {
                let _ = reply.send(Ok(self.status()));
            }
            Command::Tracking { item, reply } => {
                // Identity, not equality: a re-enqueued copy is a different item
                let tracked = self.current.as_ref().is_some_and(|current| current.id == item);
                let snapshot = if tracked { self.now_playing().await } else { None };
                let _ = reply.send(snapshot);
            }
            Command::Shutdown => {}
        }
    }

    fn join(&mut self, voice_channel: ChannelId, text_channel: ChannelId, reply: Reply<()>) {
        if self.state.is_connected() || self.joining {
            let _ = reply.send(Err(Conflict::AlreadyConnected.into()));
            return;
        }

        self.joining = true;
        let epoch = self.epoch;
        let guild_id = self.guild_id;
        let sink = self.sink.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = sink.join(guild_id, voice_channel).await;
            let event = EngineEvent::Joined {
                epoch,
                voice_channel,
                text_channel,
                result,
                reply,
            };
            // Engine already gone
            if let Err(mpsc::error::SendError(EngineEvent::Joined {
                result: Ok(mut connection),
                ..
            })) = tx.send(event)
            {
                debug!("Engine cerrado durante la conexión de voz de guild {}", guild_id);
                connection.disconnect().await;
            }
        });
    }

    async fn on_joined(
        &mut self,
        epoch: u64,
        voice_channel: ChannelId,
        text_channel: ChannelId,
        result: PlayerResult<Box<dyn VoiceConnection>>,
    ) -> PlayerResult<()> {
        if epoch != self.epoch || !self.joining {
            debug!("Conexión de voz de guild {} descartada", self.guild_id);
            if let Ok(mut connection) = result {
                connection.disconnect().await;
            }
            return Err(Conflict::SessionClosed.into());
        }
        self.joining = false;

        let connection = result.inspect_err(|e| {
            warn!("❌ No se pudo conectar a {}: {}", voice_channel, e);
        })?;
        self.connection = Some(connection);
        self.voice_channel = Some(voice_channel);
        self.text_channel = Some(text_channel);
        self.epoch += 1;
        self.state = EngineState::Inactive;
        self.arm_idle_timer();

        info!("🔊 Guild {} conectada a {}", self.guild_id, voice_channel);
        Ok(())
    }

    /// Cancela una conexión en curso; su resultado llegará obsoleto
    fn abandon_join(&mut self) {
        self.joining = false;
        self.epoch += 1;
        info!("👋 Conexión de voz cancelada en guild {}", self.guild_id);
    }

    /// Desconecta y descarta todo el estado de la sesión
    async fn leave(&mut self) {
        self.cancel_idle_timer();
        self.end_current();
        let dropped = self.queue.clear();
        self.epoch += 1;
        self.pending = 0;

        if let Some(mut connection) = self.connection.take() {
            connection.disconnect().await;
        }
        self.voice_channel = None;
        self.text_channel = None;
        self.state = EngineState::Asleep;

        info!("👋 Guild {} desconectada ({} items descartados)", self.guild_id, dropped);
    }

    fn enqueue(&mut self, request: String, requester: Requester, reply: Reply<EnqueueReport>) {
        if !self.state.is_connected() {
            let _ = reply.send(Err(Conflict::NotConnected.into()));
            return;
        }

        let Some(kind) = classify(&request) else {
            let _ = reply.send(Err(ResolutionError::NotAUrl(request).into()));
            return;
        };

        self.cancel_idle_timer();
        self.pending += 1;
        self.announce(Notice::Loading {
            request: request.clone(),
        });

        let epoch = self.epoch;
        let sources = self.sources.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = sources.resolve(kind, &request).await;
            let event = EngineEvent::Resolved {
                epoch,
                request,
                requester,
                result,
                reply,
            };
            if tx.send(event).is_err() {
                debug!("Engine cerrado antes de terminar una resolución");
            }
        });
    }

    async fn on_resolved(
        &mut self,
        epoch: u64,
        request: &str,
        requester: Requester,
        result: Result<ResolvedBatch, ResolutionError>,
    ) -> PlayerResult<EnqueueReport> {
        if epoch != self.epoch || !self.state.is_connected() {
            debug!("Resolución de {} descartada: la sesión cambió", request);
            return Err(Conflict::SessionClosed.into());
        }
        self.pending = self.pending.saturating_sub(1);

        let batch = match result {
            Ok(batch) => batch,
            Err(e) => {
                warn!("❌ No se pudo resolver {}: {}", request, e);
                self.arm_idle_timer_if_idle();
                return Err(e.into());
            }
        };

        let mut failed = batch.failed;
        let mut added = Vec::new();
        let mut full = None;
        for resolved in batch.resolved {
            if full.is_some() {
                failed += 1;
                continue;
            }
            self.next_item += 1;
            let item = PlaybackItem::new(
                ItemId(self.next_item),
                resolved.kind,
                resolved.url,
                requester.clone(),
                resolved.metadata,
                resolved.stream,
            );
            let id = item.id;
            match self.queue.push(item) {
                Ok(()) => added.push(id),
                Err(e) => {
                    failed += 1;
                    full = Some(e);
                }
            }
        }

        if added.is_empty() {
            self.arm_idle_timer_if_idle();
            return Err(full.unwrap_or(PlayerError::EmptyQueue));
        }

        if self.state == EngineState::Inactive {
            self.advance().await;
        }

        let remaining = self.remaining_current().await;
        let mut report = EnqueueReport {
            items: Vec::with_capacity(added.len()),
            failed,
        };
        for id in added {
            if let Some(current) = self.current.as_ref().filter(|current| current.id == id) {
                report.items.push(Enqueued {
                    item: current.summary(),
                    position: 0,
                    eta: Duration::ZERO,
                });
            } else if let Some(position) = self.queue.position_of(id) {
                if let Some(item) = self.queue.iter().nth(position - 1) {
                    report.items.push(Enqueued {
                        item: item.summary(),
                        position,
                        eta: remaining + self.queue.duration_ahead_of(position),
                    });
                }
            }
        }

        info!(
            "📥 {} items agregados en guild {} ({} fallidos)",
            report.items.len(),
            self.guild_id,
            report.failed
        );
        Ok(report)
    }

    /// Reproduce el siguiente item de la cola, o queda inactivo si está vacía
    async fn advance(&mut self) {
        self.cancel_idle_timer();

        while let Some(mut item) = self.queue.pop_front() {
            let Some(stream) = item.take_stream() else {
                warn!("Item {} sin stream, se omite", item.id);
                continue;
            };
            let Some(connection) = self.connection.as_mut() else {
                error!("advance sin conexión de voz en guild {}", self.guild_id);
                break;
            };

            let volume = self
                .volume
                .normalize_for(item.metadata.loudness_db, self.settings.loudness_target_db);
            self.token += 1;
            let events = TrackEvents::new(self.tx.clone(), self.token);

            match connection.play(stream, volume, events).await {
                Ok(dispatcher) => {
                    info!(
                        "🎵 Reproduciendo: {} ({})",
                        item.metadata.title,
                        item.source.family.as_str()
                    );
                    let snapshot = NowPlayingSnapshot {
                        item: item.summary(),
                        elapsed: Duration::ZERO,
                        paused: false,
                    };
                    self.dispatcher = Some(dispatcher);
                    self.current = Some(item);
                    self.state = EngineState::Playing;
                    if let Some(channel_id) = self.text_channel {
                        self.announcer.now_playing(channel_id, snapshot);
                    }
                    return;
                }
                Err(e) => {
                    error!("❌ No se pudo reproducir {}: {}", item.metadata.title, e);
                    self.announce(Notice::PlaybackFailed {
                        title: item.metadata.title.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        self.volume.reset_normalized();
        self.state = EngineState::Inactive;
        self.arm_idle_timer();
        debug!("Cola vacía para guild {}", self.guild_id);
    }

    /// Quita el item actual (liberando su stream) y corta el dispatcher
    fn end_current(&mut self) -> Option<PlaybackItem> {
        if let Some(dispatcher) = self.dispatcher.take() {
            if let Err(e) = dispatcher.end() {
                debug!("Error al detener dispatcher: {}", e);
            }
        }
        // Invalidate signals from the dispatcher we just dropped
        self.token += 1;
        self.volume.reset_normalized();
        if self.state.is_active() {
            self.state = EngineState::Inactive;
        }
        self.current.take()
    }

    async fn skip(&mut self, action: &str) -> PlayerResult<ItemSummary> {
        if !self.state.is_active() {
            return Err(Conflict::NothingPlaying.into());
        }

        let item = self.end_current().ok_or(Conflict::NothingPlaying)?;
        info!("⏭️ {} de {} en guild {}", action, item.metadata.title, self.guild_id);
        self.advance().await;
        Ok(item.summary())
    }

    fn pause(&mut self) -> PlayerResult<()> {
        if self.state != EngineState::Playing {
            return Err(Conflict::NotPlaying.into());
        }
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.pause()?;
        }
        self.state = EngineState::Paused;
        info!("⏸️ Reproducción pausada");
        Ok(())
    }

    fn resume(&mut self) -> PlayerResult<()> {
        if self.state != EngineState::Paused {
            return Err(Conflict::NotPaused.into());
        }
        if let Some(dispatcher) = &self.dispatcher {
            dispatcher.resume()?;
        }
        self.state = EngineState::Playing;
        info!("▶️ Reproducción reanudada");
        Ok(())
    }

    fn set_volume(&mut self, raw: f32) -> VolumeReport {
        let combined = self.volume.set_preference(raw);
        if let Some(dispatcher) = &self.dispatcher {
            if let Err(e) = dispatcher.set_volume(combined) {
                warn!("No se pudo aplicar volumen: {}", e);
            }
        }
        info!("🔊 Volumen ajustado a {}%", (self.volume.preference() * 100.0).round());
        self.volume_report()
    }

    fn volume_report(&self) -> VolumeReport {
        VolumeReport {
            preference: self.volume.preference(),
            normalized: self.volume.normalized(),
            combined: self.volume.combined(),
        }
    }

    fn status(&self) -> EngineStatus {
        EngineStatus {
            state: self.state,
            current: self.current.as_ref().map(PlaybackItem::summary),
            queue_len: self.queue.len(),
            volume: self.volume_report(),
            voice_channel: self.voice_channel,
        }
    }

    async fn elapsed(&mut self) -> Duration {
        elapsed_of(self.dispatcher.as_deref()).await
    }

    async fn now_playing(&mut self) -> Option<NowPlayingSnapshot> {
        let item = self.current.as_ref()?.summary();
        Some(NowPlayingSnapshot {
            item,
            elapsed: self.elapsed().await,
            paused: self.state == EngineState::Paused,
        })
    }

    /// Lo que falta del item actual; cero si no hay o si su duración es desconocida
    async fn remaining_current(&mut self) -> Duration {
        let Some(duration) = self.current.as_ref().map(|current| current.metadata.duration) else {
            return Duration::ZERO;
        };
        duration.saturating_sub(self.elapsed().await)
    }

    async fn on_track_signal(&mut self, token: u64, signal: TrackSignal) {
        if token != self.token || !self.state.is_active() {
            debug!("Evento de track {} obsoleto, ignorado", token);
            return;
        }

        if let TrackSignal::Failed(reason) = &signal {
            let title = self
                .current
                .as_ref()
                .map(|item| item.metadata.title.clone())
                .unwrap_or_default();
            error!("❌ Error de reproducción en {}: {}", title, reason);
            self.announce(Notice::PlaybackFailed {
                title,
                reason: reason.clone(),
            });
        }

        self.dispatcher = None;
        self.end_current();
        self.advance().await;
    }

    async fn on_idle_timeout(&mut self, generation: u64) {
        if generation != self.idle_generation
            || self.state != EngineState::Inactive
            || !self.queue.is_empty()
            || self.pending > 0
        {
            return;
        }

        info!("💤 Guild {} inactiva, desconectando", self.guild_id);
        self.announce(Notice::IdleLeave);
        self.leave().await;
    }

    fn arm_idle_timer(&mut self) {
        self.cancel_idle_timer();

        let generation = self.idle_generation;
        let timeout = self.settings.idle_timeout;
        let tx = self.tx.clone();
        self.idle_timer = Some(tokio::spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = tx.send(EngineEvent::IdleTimeout { generation });
        }));
    }

    fn arm_idle_timer_if_idle(&mut self) {
        if self.state == EngineState::Inactive && self.queue.is_empty() && self.pending == 0 {
            self.arm_idle_timer();
        }
    }

    fn cancel_idle_timer(&mut self) {
        self.idle_generation += 1;
        if let Some(timer) = self.idle_timer.take() {
            timer.abort();
        }
    }

    fn announce(&self, notice: Notice) {
        if let Some(channel_id) = self.text_channel {
            self.announcer.post(channel_id, notice);
        }
    }
}

async fn elapsed_of(dispatcher: Option<&dyn Dispatcher>) -> Duration {
    match dispatcher {
        Some(dispatcher) => dispatcher.elapsed().await,
        None => Duration::ZERO,
    }
}
