//! # Audio Module
//!
//! Per-guild playback engine for Open Player.
//!
//! ## Architecture
//!
//! ### [`engine`] - Playback Controller
//! - One task per guild, driven by a single event channel
//! - State machine: asleep, inactive, playing, paused
//! - Auto-advance, idle disconnect and stale-event filtering
//!
//! ### [`queue`] - Queue Management
//! - FIFO of resolved items, 1-based removal, uniform shuffle
//! - Position and ETA queries
//!
//! ### [`volume`] - Volume Model
//! - User preference times per-item loudness normalization
//!
//! ### [`status`] - Status Projection
//! - Now-playing and queue snapshots
//! - Ordered notifications and the live now-playing refresh
//!
//! ### [`sink`] / [`songbird_sink`] - Voice Transport
//! - The only boundary the engine uses to produce sound
//!
//! ### [`registry`] - Sessions
//! - Explicit guild → engine map
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use crate::audio::{engine::EngineDeps, queue::Requester, registry::SessionRegistry};
//! use serenity::all::{ChannelId, GuildId, UserId};
//!
//! # async fn example(deps: EngineDeps) -> anyhow::Result<()> {
//! let registry = SessionRegistry::new(deps);
//! let engine = registry.get_or_create(GuildId::new(123456789));
//!
//! engine.join(ChannelId::new(1), ChannelId::new(2)).await?;
//! let requester = Requester { user_id: UserId::new(3), display_name: "dj".into() };
//! engine.enqueue("https://youtu.be/dQw4w9WgXcQ", requester).await?;
//!
//! engine.pause().await?;
//! engine.resume().await?;
//! engine.skip().await?;
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod queue;
pub mod registry;
pub mod sink;
pub mod songbird_sink;
pub mod state;
pub mod status;
pub mod volume;

#[cfg(test)]
pub(crate) mod testing;
