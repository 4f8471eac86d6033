use std::fmt;

/// Estado del reproductor de una sesión
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineState {
    /// Sin conexión de voz
    #[default]
    Asleep,
    /// Conectado, sin item actual
    Inactive,
    Playing,
    Paused,
}

impl EngineState {
    /// Hay un item actual (reproduciendo o en pausa)
    pub fn is_active(&self) -> bool {
        matches!(self, EngineState::Playing | EngineState::Paused)
    }

    pub fn is_connected(&self) -> bool {
        !matches!(self, EngineState::Asleep)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            EngineState::Asleep => "asleep",
            EngineState::Inactive => "inactive",
            EngineState::Playing => "playing",
            EngineState::Paused => "paused",
        };
        f.write_str(text)
    }
}
