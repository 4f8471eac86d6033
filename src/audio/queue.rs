use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serenity::model::id::UserId;
use std::{collections::VecDeque, fmt, time::Duration};
use tracing::{debug, info};

use crate::{
    error::{PlayerError, PlayerResult},
    sources::{ItemMetadata, SourceKind, StreamHandle},
};

/// Identidad de un item dentro de un engine; dos peticiones idénticas
/// producen ids distintos.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemId(pub u64);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Quién pidió el item
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requester {
    pub user_id: UserId,
    pub display_name: String,
}

#[derive(Debug)]
pub struct PlaybackItem {
    pub id: ItemId,
    pub source: SourceKind,
    pub url: String,
    pub requester: Requester,
    pub metadata: ItemMetadata,
    pub added_at: DateTime<Utc>,
    stream: Option<StreamHandle>,
}

impl PlaybackItem {
    pub fn new(
        id: ItemId,
        source: SourceKind,
        url: String,
        requester: Requester,
        metadata: ItemMetadata,
        stream: StreamHandle,
    ) -> Self {
        Self {
            id,
            source,
            url,
            requester,
            metadata,
            added_at: Utc::now(),
            stream: Some(stream),
        }
    }

    /// Entrega el stream para reproducirlo; sólo la primera llamada devuelve algo
    pub fn take_stream(&mut self) -> Option<StreamHandle> {
        self.stream.take()
    }

    pub fn summary(&self) -> ItemSummary {
        ItemSummary {
            id: self.id,
            title: self.metadata.title.clone(),
            url: self.url.clone(),
            duration: self.metadata.duration,
            image_url: self.metadata.image_url.clone(),
            author: self.metadata.author.clone(),
            requester: self.requester.display_name.clone(),
            added_at: self.added_at,
        }
    }
}

/// Vista de sólo lectura de un item, sin el stream
#[derive(Debug, Clone, PartialEq)]
pub struct ItemSummary {
    pub id: ItemId,
    pub title: String,
    pub url: String,
    pub duration: Duration,
    pub image_url: Option<String>,
    pub author: Option<String>,
    pub requester: String,
    pub added_at: DateTime<Utc>,
}

/// Cola FIFO de items resueltos. El item en reproducción nunca está aquí.
#[derive(Debug)]
pub struct MusicQueue {
    items: VecDeque<PlaybackItem>,
    max_size: usize,
}

impl MusicQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Agrega un item al final de la cola
    pub fn push(&mut self, item: PlaybackItem) -> PlayerResult<()> {
        if self.items.len() >= self.max_size {
            return Err(PlayerError::QueueFull(self.max_size));
        }

        info!("➕ Agregado a la cola: {}", item.metadata.title);
        self.items.push_back(item);
        Ok(())
    }

    /// Obtiene el siguiente item (FIFO - First In, First Out)
    pub fn pop_front(&mut self) -> Option<PlaybackItem> {
        let next = self.items.pop_front();
        if let Some(ref item) = next {
            info!("➡️ Siguiente en cola (FIFO): {}", item.metadata.title);
        }
        next
    }

    /// Elimina el item en la posición indicada (base 1)
    pub fn remove(&mut self, position: usize) -> PlayerResult<PlaybackItem> {
        let len = self.items.len();
        if position < 1 || position > len {
            return Err(PlayerError::IndexOutOfRange { position, len });
        }

        let item = self
            .items
            .remove(position - 1)
            .ok_or(PlayerError::IndexOutOfRange { position, len })?;
        debug!("❌ Item eliminado en posición {}", position);
        Ok(item)
    }

    /// Mezcla la cola con una permutación uniforme
    pub fn shuffle(&mut self) -> PlayerResult<usize> {
        if self.items.is_empty() {
            return Err(PlayerError::EmptyQueue);
        }

        let mut rng = rand::thread_rng();
        self.items.make_contiguous().shuffle(&mut rng);
        info!("🔀 Cola mezclada ({} items)", self.items.len());
        Ok(self.items.len())
    }

    /// Limpia la cola, liberando los streams pendientes
    pub fn clear(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        if dropped > 0 {
            info!("🗑️ Cola limpiada ({} items)", dropped);
        }
        dropped
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlaybackItem> {
        self.items.iter()
    }

    /// Posición (base 1) de un item
    pub fn position_of(&self, id: ItemId) -> Option<usize> {
        self.items.iter().position(|item| item.id == id).map(|i| i + 1)
    }

    /// Suma de duraciones de los items delante de la posición dada (base 1).
    /// Duraciones desconocidas cuentan como cero.
    pub fn duration_ahead_of(&self, position: usize) -> Duration {
        self.items
            .iter()
            .take(position.saturating_sub(1))
            .map(|item| item.metadata.duration)
            .sum()
    }
}
