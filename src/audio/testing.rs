//! In-memory collaborators for engine tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use serenity::model::id::{ChannelId, GuildId, MessageId};
use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Duration,
};
use tokio::sync::{Notify, Semaphore};

use super::{
    queue::ItemId,
    sink::{Dispatcher, TrackEvents, VoiceConnection, VoiceSink},
    status::{MessageRef, NotificationSink, Notice},
};
use crate::{
    error::{PlayerError, PlayerResult},
    sources::{
        ItemMetadata, ProviderFamily, ResolutionError, ResolvedStream, SourceKind, StreamHandle,
        StreamProvider,
    },
};

#[derive(Default)]
struct SinkLog {
    played: Vec<String>,
    events: Vec<TrackEvents>,
    volumes: Vec<f32>,
    refused: HashSet<String>,
    fail_joins: bool,
    join_gate: Option<Arc<Semaphore>>,
    join_started: Arc<Notify>,
    disconnects: usize,
}

/// Sink que registra todo lo que el engine le pide
#[derive(Default)]
pub struct FakeSink {
    log: Arc<Mutex<SinkLog>>,
}

impl FakeSink {
    pub fn fail_joins(&self, fail: bool) {
        self.log.lock().fail_joins = fail;
    }

    /// Los joins esperan hasta que se agregue un permiso
    pub fn gate_joins(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.log.lock().join_gate = Some(gate.clone());
        gate
    }

    /// Espera a que el engine pida un join
    pub async fn join_started(&self) {
        let started = self.log.lock().join_started.clone();
        started.notified().await;
    }

    /// `play` falla para esta URL
    pub fn refuse(&self, url: &str) {
        self.log.lock().refused.insert(url.to_string());
    }

    pub fn played(&self) -> Vec<String> {
        self.log.lock().played.clone()
    }

    pub fn volumes(&self) -> Vec<f32> {
        self.log.lock().volumes.clone()
    }

    pub fn disconnects(&self) -> usize {
        self.log.lock().disconnects
    }

    /// Eventos de la n-ésima reproducción iniciada
    pub fn track_events(&self, index: usize) -> TrackEvents {
        self.log.lock().events[index].clone()
    }

    pub fn last_track_events(&self) -> Option<TrackEvents> {
        self.log.lock().events.last().cloned()
    }
}

#[async_trait]
impl VoiceSink for FakeSink {
    async fn join(
        &self,
        _guild_id: GuildId,
        _channel_id: ChannelId,
    ) -> PlayerResult<Box<dyn VoiceConnection>> {
        let (fail, gate, started) = {
            let log = self.log.lock();
            (log.fail_joins, log.join_gate.clone(), log.join_started.clone())
        };
        started.notify_one();
        if let Some(gate) = gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| PlayerError::JoinError("gate closed".to_string()))?;
        }
        if fail {
            return Err(PlayerError::JoinError("missing permissions".to_string()));
        }
        Ok(Box::new(FakeConnection {
            log: self.log.clone(),
        }))
    }
}

struct FakeConnection {
    log: Arc<Mutex<SinkLog>>,
}

#[async_trait]
impl VoiceConnection for FakeConnection {
    async fn play(
        &mut self,
        stream: StreamHandle,
        volume: f32,
        events: TrackEvents,
    ) -> PlayerResult<Box<dyn Dispatcher>> {
        let url = match stream {
            StreamHandle::Url(url) => url,
            StreamHandle::Input(_) => "<input>".to_string(),
        };

        let mut log = self.log.lock();
        if log.refused.contains(&url) {
            return Err(PlayerError::SinkRuntimeError(format!("cannot decode {url}")));
        }
        log.played.push(url);
        log.events.push(events);
        log.volumes.push(volume);

        Ok(Box::new(FakeDispatcher {
            log: self.log.clone(),
        }))
    }

    async fn disconnect(&mut self) {
        self.log.lock().disconnects += 1;
    }
}

struct FakeDispatcher {
    log: Arc<Mutex<SinkLog>>,
}

#[async_trait]
impl Dispatcher for FakeDispatcher {
    fn pause(&self) -> PlayerResult<()> {
        Ok(())
    }

    fn resume(&self) -> PlayerResult<()> {
        Ok(())
    }

    fn end(&self) -> PlayerResult<()> {
        Ok(())
    }

    fn set_volume(&self, volume: f32) -> PlayerResult<()> {
        self.log.lock().volumes.push(volume);
        Ok(())
    }

    async fn elapsed(&self) -> Duration {
        Duration::ZERO
    }
}

#[derive(Clone, Default)]
struct Media {
    title: String,
    secs: u64,
    loudness_db: Option<f32>,
    fail: bool,
    gate: Option<Arc<Semaphore>>,
    started: Arc<Notify>,
}

/// Proveedor con respuestas programadas por URL
#[derive(Default)]
pub struct FakeProvider {
    media: Mutex<HashMap<String, Media>>,
}

impl FakeProvider {
    pub fn add(&self, url: &str, title: &str, secs: u64) {
        self.media.lock().insert(
            url.to_string(),
            Media {
                title: title.to_string(),
                secs,
                ..Media::default()
            },
        );
    }

    pub fn add_with_loudness(&self, url: &str, title: &str, secs: u64, loudness_db: f32) {
        self.add(url, title, secs);
        if let Some(media) = self.media.lock().get_mut(url) {
            media.loudness_db = Some(loudness_db);
        }
    }

    pub fn fail(&self, url: &str) {
        self.media.lock().insert(
            url.to_string(),
            Media {
                fail: true,
                ..Media::default()
            },
        );
    }

    /// La resolución de `url` espera hasta que se agregue un permiso
    pub fn gate(&self, url: &str) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        self.media.lock().entry(url.to_string()).or_default().gate = Some(gate.clone());
        gate
    }

    /// Espera a que empiece la resolución de `url`
    pub async fn started(&self, url: &str) {
        let started = self
            .media
            .lock()
            .entry(url.to_string())
            .or_default()
            .started
            .clone();
        started.notified().await;
    }
}

#[async_trait]
impl StreamProvider for FakeProvider {
    async fn resolve(&self, url: &str) -> Result<ResolvedStream, ResolutionError> {
        let media = self
            .media
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| ResolutionError::Provider(format!("{url} not found")))?;

        media.started.notify_one();
        if let Some(gate) = &media.gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|_| ResolutionError::Provider("gate closed".to_string()))?;
        }
        if media.fail {
            return Err(ResolutionError::Provider("video unavailable".to_string()));
        }

        Ok(ResolvedStream {
            url: url.to_string(),
            kind: SourceKind::single(ProviderFamily::File),
            metadata: ItemMetadata {
                duration: Duration::from_secs(media.secs),
                title: media.title,
                loudness_db: media.loudness_db,
                ..ItemMetadata::default()
            },
            stream: StreamHandle::Url(url.to_string()),
        })
    }

    fn source_name(&self) -> &'static str {
        "fake"
    }
}

/// Notificador que guarda lo enviado
#[derive(Default)]
pub struct FakeNotifier {
    sent: Mutex<Vec<(ChannelId, Notice)>>,
    edits: Mutex<Vec<(MessageId, Notice)>>,
}

impl FakeNotifier {
    pub fn sent_to(&self) -> Vec<ChannelId> {
        self.sent.lock().iter().map(|(channel, _)| *channel).collect()
    }

    /// Mensajes de now playing publicados, con el item que muestran
    pub fn now_playing_messages(&self) -> Vec<(MessageId, ItemId)> {
        self.sent
            .lock()
            .iter()
            .enumerate()
            .filter_map(|(index, (_, notice))| match notice {
                Notice::NowPlaying(snapshot) => {
                    Some((MessageId::new(index as u64 + 1), snapshot.item.id))
                }
                _ => None,
            })
            .collect()
    }

    pub fn edits_of(&self, message_id: MessageId) -> usize {
        self.edits
            .lock()
            .iter()
            .filter(|(edited, _)| *edited == message_id)
            .count()
    }

    fn count(&self, matches: &impl Fn(&Notice) -> bool) -> usize {
        self.sent.lock().iter().filter(|(_, notice)| matches(notice)).count()
    }

    /// Espera (hasta ~1 s) a que lleguen `expected` avisos que cumplan `matches`
    pub async fn wait_for(&self, matches: impl Fn(&Notice) -> bool, expected: usize) -> usize {
        for _ in 0..100 {
            if self.count(&matches) >= expected {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.count(&matches)
    }
}

#[async_trait]
impl NotificationSink for FakeNotifier {
    async fn send(&self, channel_id: ChannelId, notice: Notice) -> anyhow::Result<MessageRef> {
        let mut sent = self.sent.lock();
        sent.push((channel_id, notice));
        Ok(MessageRef {
            channel_id,
            message_id: MessageId::new(sent.len() as u64),
        })
    }

    async fn edit(&self, message: &MessageRef, notice: Notice) -> anyhow::Result<()> {
        self.edits.lock().push((message.message_id, notice));
        Ok(())
    }
}
