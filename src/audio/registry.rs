use dashmap::DashMap;
use serenity::model::id::GuildId;
use tracing::{debug, info};

use super::engine::{spawn_engine, EngineDeps, EngineHandle};
use crate::error::{Conflict, PlayerError};

/// Mapa explícito guild → engine. Las sesiones no comparten estado mutable.
pub struct SessionRegistry {
    engines: DashMap<GuildId, EngineHandle>,
    deps: EngineDeps,
}

impl SessionRegistry {
    pub fn new(deps: EngineDeps) -> Self {
        Self {
            engines: DashMap::new(),
            deps,
        }
    }

    /// Crea el engine de una guild; si ya existe devuelve el actual
    pub fn create(&self, guild_id: GuildId) -> EngineHandle {
        self.engines
            .entry(guild_id)
            .or_insert_with(|| {
                info!("🆕 Engine creado para guild {}", guild_id);
                spawn_engine(guild_id, self.deps.clone())
            })
            .clone()
    }

    pub fn get(&self, guild_id: GuildId) -> Option<EngineHandle> {
        self.engines
            .get(&guild_id)
            .map(|handle| handle.clone())
            .filter(|handle| !handle.is_closed())
    }

    pub fn get_or_create(&self, guild_id: GuildId) -> EngineHandle {
        match self.get(guild_id) {
            Some(handle) => handle,
            None => {
                // Un engine cerrado se reemplaza
                self.engines.remove(&guild_id);
                self.create(guild_id)
            }
        }
    }

    /// Desconecta y detiene el engine de una guild
    pub async fn destroy(&self, guild_id: GuildId) {
        let Some((_, handle)) = self.engines.remove(&guild_id) else {
            return;
        };

        match handle.leave().await {
            Ok(()) | Err(PlayerError::StateConflict(Conflict::AlreadyAsleep)) => {}
            Err(e) => debug!("leave al destruir engine de {}: {}", guild_id, e),
        }
        handle.shutdown();
        info!("🗑️ Engine destruido para guild {}", guild_id);
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{
        engine::EngineSettings,
        state::EngineState,
        testing::{FakeNotifier, FakeSink},
    };
    use crate::sources::SourceManager;
    use serenity::model::id::ChannelId;
    use std::{sync::Arc, time::Duration};

    fn registry(sink: Arc<FakeSink>) -> SessionRegistry {
        SessionRegistry::new(EngineDeps {
            sink,
            sources: Arc::new(SourceManager::new(Duration::from_secs(5), 25)),
            notifier: Arc::new(FakeNotifier::default()),
            settings: EngineSettings::default(),
        })
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let registry = registry(Arc::new(FakeSink::default()));
        let first = registry.get_or_create(GuildId::new(1));
        let second = registry.get_or_create(GuildId::new(2));
        assert_eq!(registry.len(), 2);

        first.join(ChannelId::new(10), ChannelId::new(11)).await.unwrap();
        assert_eq!(first.status().await.unwrap().state, EngineState::Inactive);
        assert_eq!(second.status().await.unwrap().state, EngineState::Asleep);

        // Same guild, same engine
        let again = registry.get_or_create(GuildId::new(1));
        assert_eq!(again.status().await.unwrap().state, EngineState::Inactive);
    }

    #[tokio::test]
    async fn destroy_leaves_and_shuts_down() {
        let sink = Arc::new(FakeSink::default());
        let registry = registry(sink.clone());
        let handle = registry.create(GuildId::new(1));
        handle.join(ChannelId::new(10), ChannelId::new(11)).await.unwrap();

        registry.destroy(GuildId::new(1)).await;

        assert!(registry.get(GuildId::new(1)).is_none());
        assert_eq!(sink.disconnects(), 1);
        assert!(matches!(handle.status().await, Err(PlayerError::EngineGone)));

        // Destroying an unknown session is a no-op
        registry.destroy(GuildId::new(9)).await;
        assert!(registry.is_empty());
    }
}
