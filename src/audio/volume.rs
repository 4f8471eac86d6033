//! Volumen efectivo = preferencia del usuario × factor de normalización.

pub const MIN_PREFERENCE: f32 = 0.1;
pub const MAX_PREFERENCE: f32 = 2.0;

pub const MIN_NORMALIZED: f32 = 0.1;
pub const MAX_NORMALIZED: f32 = 0.9;

pub const MIN_COMBINED: f32 = 0.1;
pub const MAX_COMBINED: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeState {
    preference: f32,
    normalized: f32,
}

impl VolumeState {
    /// `default_percent` uses the same scale as user input (100 = unity).
    pub fn new(default_percent: f32) -> Self {
        let mut state = Self {
            preference: 1.0,
            normalized: 1.0,
        };
        state.set_preference(default_percent);
        state
    }

    /// Fija la preferencia a partir de un porcentaje y devuelve el volumen combinado
    pub fn set_preference(&mut self, raw_percent: f32) -> f32 {
        let raw = if raw_percent.is_nan() { 0.0 } else { raw_percent };
        self.preference = (raw / 100.0).clamp(MIN_PREFERENCE, MAX_PREFERENCE);
        self.combined()
    }

    /// Recalcula el factor de normalización para el item que empieza
    pub fn normalize_for(&mut self, loudness_db: Option<f32>, target_db: f32) -> f32 {
        self.normalized = match loudness_db.filter(|db| db.is_finite()) {
            Some(loudness) => {
                let factor = 10f32.powf((target_db - loudness) / 10.0);
                if factor.is_nan() {
                    MIN_NORMALIZED
                } else {
                    factor.clamp(MIN_NORMALIZED, MAX_NORMALIZED)
                }
            }
            None => 1.0,
        };
        self.combined()
    }

    pub fn reset_normalized(&mut self) {
        self.normalized = 1.0;
    }

    pub fn preference(&self) -> f32 {
        self.preference
    }

    pub fn normalized(&self) -> f32 {
        self.normalized
    }

    pub fn combined(&self) -> f32 {
        (self.preference * self.normalized).clamp(MIN_COMBINED, MAX_COMBINED)
    }
}

impl Default for VolumeState {
    fn default() -> Self {
        Self::new(100.0)
    }
}
