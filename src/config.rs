// ============================================================================
// CONFIG.RS - Settings, Styles and Debug Levels
// ============================================================================
//
// Everything the user (or an outside collaborator) can tune lives here:
//
// - EffectSettings: the live controls for the shared effects chain. Values
//   coming from outside are never rejected, they are clamped with clamped()
//   right before they reach the chain.
// - StyleTag / StyleTable: a mood style picks the tempo and how many image
//   steps each tick skips. The table ships with defaults and can be
//   overridden from a TOML file.
// - DebugLevel: how chatty the player is, mapped onto the log crate's levels.
// ============================================================================

use serde::Deserialize;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

// ============================================================================
// ERRORS
// ============================================================================

/// Errors that can occur while loading configuration
#[derive(Debug)]
pub enum ConfigError {
    /// The style file could not be read
    Io(std::io::Error),

    /// The style file is not valid TOML for a style table
    Parse(toml::de::Error),

    /// A style name that is not one of calm, energetic, melancholic, lofi
    UnknownStyle(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "could not read style table: {}", e),
            ConfigError::Parse(e) => write!(f, "invalid style table: {}", e),
            ConfigError::UnknownStyle(name) => write!(
                f,
                "unknown style '{}' (expected calm, energetic, melancholic or lofi)",
                name
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            ConfigError::UnknownStyle(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

// ============================================================================
// STYLE TAG
// ============================================================================

/// Mood style chosen for a performance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StyleTag {
    #[default]
    Calm,
    Energetic,
    Melancholic,
    Lofi,
}

impl StyleTag {
    pub const ALL: [StyleTag; 4] = [
        StyleTag::Calm,
        StyleTag::Energetic,
        StyleTag::Melancholic,
        StyleTag::Lofi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StyleTag::Calm => "calm",
            StyleTag::Energetic => "energetic",
            StyleTag::Melancholic => "melancholic",
            StyleTag::Lofi => "lofi",
        }
    }
}

impl fmt::Display for StyleTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StyleTag {
    type Err = ConfigError;

    /// Case-insensitive, surrounding whitespace ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        StyleTag::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ConfigError::UnknownStyle(s.to_string()))
    }
}

// ============================================================================
// STYLE TABLE
// ============================================================================

/// Tempo settings resolved from a style
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct StyleTempo {
    /// Beats per minute; one tick lasts half a beat
    pub bpm: f64,

    /// Image steps advanced per tick (1 plays every step)
    pub downsample_rate: usize,
}

impl StyleTempo {
    pub const fn new(bpm: f64, downsample_rate: usize) -> Self {
        Self { bpm, downsample_rate }
    }
}

/// Style -> tempo lookup table
///
/// Any style missing from a loaded file keeps its default entry.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct StyleTable {
    pub calm: StyleTempo,
    pub melancholic: StyleTempo,
    pub lofi: StyleTempo,
    pub energetic: StyleTempo,
}

impl Default for StyleTable {
    fn default() -> Self {
        Self {
            calm: StyleTempo::new(60.0, 4),
            melancholic: StyleTempo::new(75.0, 2),
            lofi: StyleTempo::new(90.0, 2),
            energetic: StyleTempo::new(135.0, 1),
        }
    }
}

impl StyleTable {
    /// Resolves a style to its tempo
    pub fn lookup(&self, style: StyleTag) -> StyleTempo {
        match style {
            StyleTag::Calm => self.calm,
            StyleTag::Melancholic => self.melancholic,
            StyleTag::Lofi => self.lofi,
            StyleTag::Energetic => self.energetic,
        }
    }

    /// Parses a table from TOML text
    ///
    /// ```toml
    /// [energetic]
    /// bpm = 140.0
    /// downsample_rate = 1
    /// ```
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Loads a table from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let table = Self::from_toml_str(&text)?;
        log::info!("loaded style table from {}", path.as_ref().display());
        Ok(table)
    }
}

// ============================================================================
// EFFECT SETTINGS
// ============================================================================

/// Live controls for the shared effects chain
#[derive(Clone, Debug, PartialEq)]
pub struct EffectSettings {
    /// Master volume, 0.0 to 1.0
    pub volume: f32,

    /// Waveshaper amount, 0 (clean) to 100
    pub distortion_amount: f32,

    /// Wah sweep depth, 0 (off) to 100
    pub wah_depth: f32,

    /// Tone frequency for the ambience layer, 100 to 20000 Hz
    pub tone_frequency: f32,

    /// Vinyl crackle bed (ambience layer)
    pub vinyl_noise: bool,

    /// Rain bed (ambience layer)
    pub rain_noise: bool,

    /// Current mood style
    pub style: StyleTag,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            volume: 0.5,
            distortion_amount: 0.0,
            wah_depth: 0.0,
            tone_frequency: 2000.0,
            vinyl_noise: false,
            rain_noise: false,
            style: StyleTag::Calm,
        }
    }
}

impl EffectSettings {
    /// Returns a copy with every numeric field forced into its domain
    ///
    /// NaN falls back to the low end of the range.
    pub fn clamped(&self) -> Self {
        Self {
            volume: clamp_or_min(self.volume, 0.0, 1.0),
            distortion_amount: clamp_or_min(self.distortion_amount, 0.0, 100.0),
            wah_depth: clamp_or_min(self.wah_depth, 0.0, 100.0),
            tone_frequency: clamp_or_min(self.tone_frequency, 100.0, 20000.0),
            ..self.clone()
        }
    }
}

fn clamp_or_min(value: f32, min: f32, max: f32) -> f32 {
    if value.is_nan() {
        min
    } else {
        value.clamp(min, max)
    }
}

// ============================================================================
// DEBUG LEVEL
// ============================================================================

/// How much the player prints while running
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum)]
pub enum DebugLevel {
    /// Errors only
    Off = 0,

    /// Play/stop, image summary, warnings
    #[default]
    Basic = 1,

    /// + settings changes and voice lifecycle
    Verbose = 2,

    /// + every tick and every scheduled parameter event
    Detailed = 3,
}

impl DebugLevel {
    /// Maps onto the log crate's filter
    pub fn level_filter(&self) -> log::LevelFilter {
        match self {
            DebugLevel::Off => log::LevelFilter::Error,
            DebugLevel::Basic => log::LevelFilter::Info,
            DebugLevel::Verbose => log::LevelFilter::Debug,
            DebugLevel::Detailed => log::LevelFilter::Trace,
        }
    }
}

// ============================================================================
// UNIT TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_parsing_is_case_insensitive() {
        assert_eq!("calm".parse::<StyleTag>().unwrap(), StyleTag::Calm);
        assert_eq!("LoFi".parse::<StyleTag>().unwrap(), StyleTag::Lofi);
        assert_eq!(" Energetic ".parse::<StyleTag>().unwrap(), StyleTag::Energetic);
        assert!(matches!(
            "jazz".parse::<StyleTag>(),
            Err(ConfigError::UnknownStyle(_))
        ));
    }

    #[test]
    fn test_default_style_table() {
        let table = StyleTable::default();
        assert_eq!(table.lookup(StyleTag::Calm), StyleTempo::new(60.0, 4));
        assert_eq!(table.lookup(StyleTag::Melancholic), StyleTempo::new(75.0, 2));
        assert_eq!(table.lookup(StyleTag::Lofi), StyleTempo::new(90.0, 2));
        assert_eq!(table.lookup(StyleTag::Energetic), StyleTempo::new(135.0, 1));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let table = StyleTable::from_toml_str(
            "[energetic]\nbpm = 140.0\ndownsample_rate = 3\n",
        )
        .unwrap();
        assert_eq!(table.lookup(StyleTag::Energetic), StyleTempo::new(140.0, 3));
        assert_eq!(table.lookup(StyleTag::Calm), StyleTempo::new(60.0, 4));
    }

    #[test]
    fn test_bad_toml_is_an_error() {
        let result = StyleTable::from_toml_str("[calm]\nbpm = \"fast\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_settings_are_clamped() {
        let wild = EffectSettings {
            volume: 3.0,
            distortion_amount: -5.0,
            wah_depth: 250.0,
            tone_frequency: 5.0,
            ..EffectSettings::default()
        };
        let clamped = wild.clamped();
        assert_eq!(clamped.volume, 1.0);
        assert_eq!(clamped.distortion_amount, 0.0);
        assert_eq!(clamped.wah_depth, 100.0);
        assert_eq!(clamped.tone_frequency, 100.0);
    }

    #[test]
    fn test_clamping_nan_and_in_range_values() {
        let settings = EffectSettings {
            volume: f32::NAN,
            ..EffectSettings::default()
        };
        assert_eq!(settings.clamped().volume, 0.0);
        assert_eq!(EffectSettings::default().clamped(), EffectSettings::default());
    }

    #[test]
    fn test_debug_level_ordering_and_filters() {
        assert!(DebugLevel::Detailed > DebugLevel::Basic);
        assert_eq!(DebugLevel::Off.level_filter(), log::LevelFilter::Error);
        assert_eq!(DebugLevel::Verbose.level_filter(), log::LevelFilter::Debug);
    }
}
