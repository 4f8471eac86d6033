use serenity::{
    all::Timestamp,
    builder::{CreateEmbed, CreateEmbedFooter},
};
use std::time::Duration;

use crate::{
    audio::{
        queue::ItemSummary,
        status::{EnqueueReport, Notice, NowPlayingSnapshot, QueueSnapshot, VolumeReport},
    },
    sources::SearchCandidate,
};

/// Paleta de colores estandarizada para el bot
pub mod colors {
    use serenity::all::Colour;

    pub const SUCCESS_GREEN: Colour = Colour::from_rgb(67, 181, 129);
    pub const ERROR_RED: Colour = Colour::from_rgb(220, 53, 69);
    pub const WARNING_ORANGE: Colour = Colour::from_rgb(255, 193, 7);
    pub const INFO_BLUE: Colour = Colour::from_rgb(52, 144, 220);
    pub const MUSIC_PURPLE: Colour = Colour::from_rgb(138, 43, 226);
    pub const NEUTRAL_GRAY: Colour = Colour::from_rgb(108, 117, 125);
}

/// Footer estandarizado para todos los embeds
const STANDARD_FOOTER: &str = "🎵 Open Player";

/// Convierte un aviso del engine en un embed
pub fn render(notice: &Notice) -> CreateEmbed {
    match notice {
        Notice::Loading { request } => {
            create_info_embed("Cargando", &format!("Obteniendo `{}`...", request))
        }
        Notice::Enqueued(report) => create_enqueued_embed(report),
        Notice::NowPlaying(snapshot) => create_now_playing_embed(snapshot),
        Notice::Skipped(item) => create_success_embed("Saltado", &item_link(item)),
        Notice::Stopped(item) => create_success_embed("Detenido", &item_link(item)),
        Notice::PlaybackFailed { title, reason } => create_error_embed(
            "Error de reproducción",
            &format!("**{}** no pudo reproducirse: {}", title, reason),
        ),
        Notice::ResolutionFailed { request, reason } => create_error_embed(
            "No se pudo obtener el audio",
            &format!("`{}`: {}", request, reason),
        ),
        Notice::IdleLeave => create_info_embed(
            "Desconectado",
            "Salí del canal de voz por inactividad",
        ),
        Notice::Queue(snapshot) => create_queue_embed(snapshot),
        Notice::SearchResults(results) => create_search_results_embed(results),
        Notice::Volume(report) => create_volume_embed(report),
    }
}

fn item_link(item: &ItemSummary) -> String {
    format!("[{}]({})", item.title, item.url)
}

/// Crea un embed para mostrar la canción actual
pub fn create_now_playing_embed(snapshot: &NowPlayingSnapshot) -> CreateEmbed {
    let item = &snapshot.item;
    let title = if snapshot.paused {
        "⏸️ En Pausa"
    } else {
        "🎵 Reproduciendo Ahora"
    };

    let mut embed = CreateEmbed::default()
        .title(title)
        .description(item_link(item))
        .color(colors::SUCCESS_GREEN)
        .field(
            "⏱️ Duración / Transcurrido",
            format!(
                "`{}` / `{}`",
                format_length(item.duration),
                format_duration(snapshot.elapsed)
            ),
            true,
        )
        .field("👤 Solicitado por", format!("`{}`", item.requester), true);

    if let Some(author) = &item.author {
        embed = embed.field("🎤 Artista", author, true);
    }
    if let Some(thumbnail) = &item.image_url {
        embed = embed.thumbnail(thumbnail);
    }

    embed.footer(CreateEmbedFooter::new(snapshot.progress_bar()))
}

/// Crea un embed para mostrar lo que se agregó a la cola
pub fn create_enqueued_embed(report: &EnqueueReport) -> CreateEmbed {
    let embed = match report.items.as_slice() {
        [single] => {
            let eta = if single.position == 0 {
                "NOW".to_string()
            } else {
                format_duration(single.eta)
            };
            let position = if single.position == 0 {
                "▶️".to_string()
            } else {
                single.position.to_string()
            };

            let mut embed = CreateEmbed::default()
                .title("✅ Agregado a la Cola")
                .description(item_link(&single.item))
                .color(colors::SUCCESS_GREEN)
                .field("⏱️ Duración", format!("`{}`", format_length(single.item.duration)), true)
                .field("📍 Posición / ETA", format!("`{}` / `{}`", position, eta), true)
                .field(
                    "🕒 Agregado",
                    format!("`{}`", single.item.added_at.format("%H:%M UTC")),
                    true,
                );
            if let Some(thumbnail) = &single.item.image_url {
                embed = embed.thumbnail(thumbnail);
            }
            embed
        }
        items => CreateEmbed::default()
            .title(format!("✅ {} canciones agregadas", items.len()))
            .description(
                items
                    .iter()
                    .take(10)
                    .map(|enqueued| format!("• {}", item_link(&enqueued.item)))
                    .collect::<Vec<_>>()
                    .join("\n"),
            )
            .color(colors::SUCCESS_GREEN),
    };

    let embed = if report.failed > 0 {
        embed.field(
            "⚠️ Omitidas",
            format!("{} no pudieron obtenerse", report.failed),
            false,
        )
    } else {
        embed
    };

    embed
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de la cola paginada
pub fn create_queue_embed(snapshot: &QueueSnapshot) -> CreateEmbed {
    let mut sections = Vec::new();

    if let Some(current) = &snapshot.current {
        sections.push(format!(
            "`[NOW PLAYING]` __**{}**__\nSolicitado por: `{}`\nDuración: `{}`",
            item_link(current),
            current.requester,
            format_length(current.duration)
        ));
    }

    for (position, item) in &snapshot.entries {
        sections.push(format!(
            "`[{}]` __**{}**__\nSolicitado por: `{}`\nDuración: `{}`",
            position,
            item_link(item),
            item.requester,
            format_length(item.duration)
        ));
    }

    if snapshot.more > 0 {
        sections.push(format!("***+{} más en la cola***", snapshot.more));
    }

    let description = if sections.is_empty() {
        "📭 La cola está vacía".to_string()
    } else {
        sections.join("\n\n")
    };

    CreateEmbed::default()
        .title("📋 Cola de Reproducción")
        .description(description)
        .color(colors::MUSIC_PURPLE)
        .field("🎶 Canciones", snapshot.len.to_string(), true)
        .field("⏱️ Duración total", format_duration(snapshot.total_duration), true)
        .footer(CreateEmbedFooter::new(format!(
            "Página {}/{}",
            snapshot.page, snapshot.pages
        )))
}

/// Crea un embed con los resultados de una búsqueda
pub fn create_search_results_embed(results: &[SearchCandidate]) -> CreateEmbed {
    if results.is_empty() {
        return create_error_embed("Sin resultados", "No se encontraron canciones");
    }

    let list = results
        .iter()
        .enumerate()
        .map(|(i, candidate)| {
            let channel = candidate
                .channel
                .as_deref()
                .map(|channel| format!(" · {}", channel))
                .unwrap_or_default();
            format!("`[{}]` [{}]({}){}", i + 1, candidate.title, candidate.url, channel)
        })
        .collect::<Vec<_>>()
        .join("\n");

    CreateEmbed::default()
        .title("🔍 Resultados de YouTube")
        .description(format!(
            "*Usa `/search` con la opción `pick` para elegir uno*\n\n{}",
            list
        ))
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de volumen con indicador visual
pub fn create_volume_embed(report: &VolumeReport) -> CreateEmbed {
    let volume_percent = (report.preference * 100.0).round() as u32;
    let status_emoji = if volume_percent <= 50 { "🔉" } else { "🔊" };

    CreateEmbed::default()
        .title(format!("{} Control de Volumen", status_emoji))
        .description(format!("**Volumen actual: {}%**", volume_percent))
        .field("📊 Nivel", create_volume_bar(report.combined), false)
        .field(
            "🎚️ Normalización",
            format!("{}%", (report.normalized * 100.0).round() as u32),
            true,
        )
        .color(colors::INFO_BLUE)
        .footer(CreateEmbedFooter::new("💡 Usa /volume <nivel> para ajustar"))
        .timestamp(Timestamp::now())
}

/// Crea una barra visual de volumen
fn create_volume_bar(volume: f32) -> String {
    let segments = 20;
    let filled = ((volume.clamp(0.0, 1.0) * segments as f32) as usize).min(segments);
    let empty = segments - filled;

    let bar = "█".repeat(filled) + &"▒".repeat(empty);
    format!("`[{}]`", bar)
}

/// Crea un embed de error
pub fn create_error_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("❌ {}", title))
        .description(description)
        .color(colors::ERROR_RED)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de advertencia
pub fn create_warning_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("⚠️ {}", title))
        .description(description)
        .color(colors::WARNING_ORANGE)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de éxito
pub fn create_success_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("✅ {}", title))
        .description(description)
        .color(colors::SUCCESS_GREEN)
        .timestamp(Timestamp::now())
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Crea un embed de información
pub fn create_info_embed(title: &str, description: &str) -> CreateEmbed {
    CreateEmbed::default()
        .title(format!("ℹ️ {}", title))
        .description(description)
        .color(colors::NEUTRAL_GRAY)
        .footer(CreateEmbedFooter::new(STANDARD_FOOTER))
}

/// Duración de un item; cero significa desconocida (streams en vivo)
fn format_length(duration: Duration) -> String {
    if duration.is_zero() {
        "🔴 En vivo".to_string()
    } else {
        format_duration(duration)
    }
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{queue::ItemId, status::Enqueued};
    use chrono::{TimeZone, Utc};

    fn summary(secs: u64) -> ItemSummary {
        ItemSummary {
            id: ItemId(1),
            title: "Song".to_string(),
            url: "https://youtu.be/abc".to_string(),
            duration: Duration::from_secs(secs),
            image_url: None,
            author: Some("Artist".to_string()),
            requester: "dj".to_string(),
            added_at: Utc.with_ymd_and_hms(2024, 5, 1, 21, 7, 0).unwrap(),
        }
    }

    fn json(embed: CreateEmbed) -> serde_json::Value {
        serde_json::to_value(embed).unwrap()
    }

    #[test]
    fn durations_are_clock_formatted() {
        assert_eq!(format_duration(Duration::from_secs(59)), "0:59");
        assert_eq!(format_duration(Duration::from_secs(200)), "3:20");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1:02:05");
        assert_eq!(format_length(Duration::ZERO), "🔴 En vivo");
    }

    #[test]
    fn now_playing_footer_is_the_progress_bar() {
        let snapshot = NowPlayingSnapshot {
            item: summary(100),
            elapsed: Duration::from_secs(50),
            paused: false,
        };
        let value = json(render(&Notice::NowPlaying(snapshot.clone())));
        assert_eq!(value["footer"]["text"], snapshot.progress_bar());
        assert_eq!(value["description"], "[Song](https://youtu.be/abc)");
    }

    #[test]
    fn item_playing_now_has_now_eta() {
        let report = EnqueueReport {
            items: vec![Enqueued {
                item: summary(100),
                position: 0,
                eta: Duration::ZERO,
            }],
            failed: 0,
        };
        let value = json(create_enqueued_embed(&report));
        let fields = value["fields"].as_array().unwrap();
        assert!(fields.iter().any(|field| field["value"] == "`▶️` / `NOW`"));
        assert!(fields.iter().any(|field| field["value"] == "`21:07 UTC`"));
    }

    #[test]
    fn playlist_report_mentions_failures() {
        let enqueued = |position| Enqueued {
            item: summary(60),
            position,
            eta: Duration::from_secs(60),
        };
        let report = EnqueueReport {
            items: vec![enqueued(1), enqueued(2)],
            failed: 3,
        };
        let value = json(create_enqueued_embed(&report));
        assert_eq!(value["title"], "✅ 2 canciones agregadas");
        assert!(value["fields"][0]["value"].as_str().unwrap().starts_with('3'));
    }
}
