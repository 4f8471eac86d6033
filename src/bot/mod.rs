//! # Bot Module
//!
//! Discord glue for Open Player.
//!
//! [`PlayerBot`] implements Serenity's [`EventHandler`]. It owns no playback
//! state: every guild gets a playback engine from the
//! [`SessionRegistry`], and slash commands are forwarded to it.
//!
//! - `ready` registers the slash commands
//! - `guild_create` / `guild_delete` create and destroy engines
//! - `interaction_create` routes slash commands ([`handlers`])
//! - `voice_state_update` forces a leave when the bot is disconnected by
//!   someone else

use anyhow::Result;
use serenity::{
    all::{Context, EventHandler, Guild, GuildId, Interaction, Ready, UnavailableGuild, VoiceState},
    async_trait,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

pub mod commands;
pub mod handlers;
pub mod notifier;

use crate::{
    audio::registry::SessionRegistry,
    config::Config,
    error::{Conflict, PlayerError},
};

/// Main Discord bot handler for Open Player.
pub struct PlayerBot {
    /// Bot configuration loaded from environment variables
    config: Arc<Config>,
    /// Un engine de reproducción por guild
    pub registry: Arc<SessionRegistry>,
}

impl PlayerBot {
    pub fn new(config: Config, registry: Arc<SessionRegistry>) -> Self {
        Self {
            config: Arc::new(config),
            registry,
        }
    }

    /// Registers slash commands with Discord.
    ///
    /// With `GUILD_ID` set, commands are registered for that guild only
    /// (about a second to propagate). Otherwise they are global, which can
    /// take up to an hour.
    async fn register_commands(&self, ctx: &Context) -> Result<()> {
        info!("📝 Registrando comandos slash...");
        info!("🔧 Application ID: {}", self.config.application_id);

        match self.config.guild_id {
            Some(guild_id) => {
                let guild_id = GuildId::new(guild_id);
                info!("🏠 Registrando comandos para guild específica: {}", guild_id);

                if !ctx.cache.guilds().contains(&guild_id) {
                    warn!("⚠️ El bot no está en la guild especificada: {}", guild_id);
                    return Ok(());
                }

                commands::register_guild_commands(ctx, guild_id)
                    .await
                    .map_err(|e| {
                        error!("❌ Error registrando comandos de guild: {:?}", e);
                        anyhow::anyhow!("No se pudieron registrar comandos de guild. Verifica que el bot tenga permisos de 'applications.commands' en la guild.")
                    })?;
                info!("✅ Comandos de guild registrados para: {}", guild_id);
            }
            None => {
                info!("🌐 Registrando comandos globalmente");
                commands::register_global_commands(ctx).await.map_err(|e| {
                    error!("❌ Error registrando comandos globales: {:?}", e);
                    anyhow::anyhow!("No se pudieron registrar comandos globales. Verifica que el bot tenga permisos de 'applications.commands'.")
                })?;
                info!("✅ Comandos globales registrados");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for PlayerBot {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("🤖 {} está en línea!", ready.user.name);
        info!("📊 Conectado a {} servidores", ready.guilds.len());

        if let Err(e) = self.register_commands(&ctx).await {
            error!("Error al registrar comandos: {:?}", e);
        }
    }

    async fn guild_create(&self, _ctx: Context, guild: Guild, _is_new: Option<bool>) {
        self.registry.create(guild.id);
    }

    async fn guild_delete(&self, _ctx: Context, incomplete: UnavailableGuild, _full: Option<Guild>) {
        // Una guild caída no es una guild abandonada
        if incomplete.unavailable {
            debug!("Guild {} no disponible temporalmente", incomplete.id);
            return;
        }
        self.registry.destroy(incomplete.id).await;
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        if let Interaction::Command(command_interaction) = interaction {
            if let Err(e) = handlers::handle_command(&ctx, command_interaction, self).await {
                error!("Error manejando comando: {:?}", e);
            }
        }
    }

    /// Cleans up when the bot is disconnected from voice by someone else
    async fn voice_state_update(&self, ctx: Context, old: Option<VoiceState>, new: VoiceState) {
        let current_user_id = ctx.cache.current_user().id;
        if new.user_id != current_user_id || old.is_none() || new.channel_id.is_some() {
            return;
        }
        let Some(guild_id) = new.guild_id else {
            return;
        };
        let Some(engine) = self.registry.get(guild_id) else {
            return;
        };

        match engine.leave().await {
            Ok(()) => info!("🔌 Bot desconectado externamente en guild {}", guild_id),
            // El propio engine salió
            Err(PlayerError::StateConflict(Conflict::AlreadyAsleep)) => {}
            Err(e) => error!("Error al limpiar sesión de {}: {:?}", guild_id, e),
        }
    }
}
