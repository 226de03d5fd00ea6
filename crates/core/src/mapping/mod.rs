//! Drum classification: raw note numbers to categories, colours and
//! brightness levels.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::{config::BrightnessConfig, DrumLightError};

/// Highest intensity a trigger can report.
pub const MAX_INTENSITY: u8 = 127;

/// Drum-kind classification of a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Kick,
    Snare,
    HiHat,
    Crash,
    Ride,
    Tom,
    Unknown,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::Kick,
        Category::Snare,
        Category::HiHat,
        Category::Crash,
        Category::Ride,
        Category::Tom,
        Category::Unknown,
    ];

    /// Maps a General MIDI percussion note to its category.
    pub fn classify(note: u8) -> Self {
        match note {
            35 | 36 => Category::Kick,
            38 | 40 => Category::Snare,
            42 | 44 | 46 => Category::HiHat,
            49 | 57 => Category::Crash,
            51 | 59 => Category::Ride,
            41 | 43 | 45 | 47 | 48 | 50 => Category::Tom,
            _ => Category::Unknown,
        }
    }

    /// Kicks are latency critical and travel in the high-priority lane.
    pub fn priority(self) -> Priority {
        match self {
            Category::Kick => Priority::High,
            _ => Priority::Normal,
        }
    }

    pub fn default_color(self) -> Rgb {
        match self {
            Category::Kick => Rgb::new(255, 0, 0),
            Category::Snare => Rgb::new(255, 255, 255),
            Category::HiHat => Rgb::new(0, 255, 255),
            Category::Crash => Rgb::new(255, 255, 0),
            Category::Ride => Rgb::new(255, 165, 0),
            Category::Tom => Rgb::new(0, 255, 0),
            Category::Unknown => Rgb::new(128, 128, 128),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Category::Kick => "kick",
            Category::Snare => "snare",
            Category::HiHat => "hihat",
            Category::Crash => "crash",
            Category::Ride => "ride",
            Category::Tom => "tom",
            Category::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Category {
    type Err = DrumLightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|category| category.name() == lowered)
            .ok_or_else(|| DrumLightError::config(format!("unknown drum category `{s}`")))
    }
}

/// Queue lane an event travels in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Priority {
    High,
    Normal,
}

impl Priority {
    pub(crate) fn index(self) -> usize {
        match self {
            Priority::High => 0,
            Priority::Normal => 1,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::High => f.write_str("high"),
            Priority::Normal => f.write_str("normal"),
        }
    }
}

/// 8-bit RGB colour. Serialised as a `[r, g, b]` array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "[u8; 3]", into = "[u8; 3]")]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl From<[u8; 3]> for Rgb {
    fn from([r, g, b]: [u8; 3]) -> Self {
        Self { r, g, b }
    }
}

impl From<Rgb> for [u8; 3] {
    fn from(value: Rgb) -> Self {
        [value.r, value.g, value.b]
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RGB({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Integer percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Percent(u8);

impl Percent {
    pub const FULL: Percent = Percent(100);

    /// Builds a percentage, saturating at 100.
    pub const fn saturating(value: u8) -> Self {
        if value > 100 {
            Percent(100)
        } else {
            Percent(value)
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// Brightness the light settles at after a flash: 30% of the hit,
    /// rounded, never below 20%.
    pub fn faded(self) -> Self {
        let scaled = (u16::from(self.0) * 3 + 5) / 10;
        Percent((scaled as u8).max(20))
    }
}

impl TryFrom<u8> for Percent {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > 100 {
            Err(format!("percentage {value} exceeds 100"))
        } else {
            Ok(Percent(value))
        }
    }
}

impl From<Percent> for u8 {
    fn from(value: Percent) -> Self {
        value.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Linearly maps an intensity in `0..=127` onto the configured
/// floor/ceiling. Inputs above the domain are clamped first.
pub fn brightness_of(intensity: u8, config: &BrightnessConfig) -> Percent {
    if !config.velocity_to_brightness {
        return Percent::FULL;
    }

    let intensity = u32::from(intensity.min(MAX_INTENSITY));
    let floor = u32::from(config.floor.get());
    let ceiling = u32::from(config.ceiling.get());
    let span = ceiling.saturating_sub(floor);
    let value = floor + intensity * span / u32::from(MAX_INTENSITY);
    Percent::saturating(value as u8)
}

/// A single classified, timestamped drum hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerEvent {
    pub category: Category,
    pub note: u8,
    pub color: Rgb,
    pub brightness: Percent,
    pub observed_at: Instant,
}

impl TriggerEvent {
    pub fn priority(&self) -> Priority {
        self.category.priority()
    }
}

/// Static note table plus per-category colour overrides and the
/// brightness curve.
#[derive(Debug, Clone, Default)]
pub struct DrumMapping {
    overrides: BTreeMap<Category, Rgb>,
    brightness: BrightnessConfig,
}

impl DrumMapping {
    pub fn new(overrides: BTreeMap<Category, Rgb>, brightness: BrightnessConfig) -> Self {
        Self {
            overrides,
            brightness,
        }
    }

    pub fn classify(&self, note: u8) -> Category {
        Category::classify(note)
    }

    /// Override for the category if one was configured, the built-in
    /// colour otherwise.
    pub fn color_of(&self, category: Category) -> Rgb {
        self.overrides
            .get(&category)
            .copied()
            .unwrap_or_else(|| category.default_color())
    }

    pub fn set_color(&mut self, category: Category, color: Rgb) {
        self.overrides.insert(category, color);
    }

    pub fn brightness_of(&self, intensity: u8) -> Percent {
        brightness_of(intensity, &self.brightness)
    }

    /// Classifies a hit, stamping it with the current time.
    pub fn event(&self, note: u8, intensity: u8) -> TriggerEvent {
        self.event_at(note, intensity, Instant::now())
    }

    pub fn event_at(&self, note: u8, intensity: u8, observed_at: Instant) -> TriggerEvent {
        let category = self.classify(note);
        TriggerEvent {
            category,
            note,
            color: self.color_of(category),
            brightness: self.brightness_of(intensity),
            observed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn curve(floor: u8, ceiling: u8, enabled: bool) -> BrightnessConfig {
        BrightnessConfig {
            floor: Percent::saturating(floor),
            ceiling: Percent::saturating(ceiling),
            velocity_to_brightness: enabled,
        }
    }

    #[test]
    fn classifies_general_midi_notes() {
        assert_eq!(Category::classify(36), Category::Kick);
        assert_eq!(Category::classify(35), Category::Kick);
        assert_eq!(Category::classify(40), Category::Snare);
        assert_eq!(Category::classify(46), Category::HiHat);
        assert_eq!(Category::classify(57), Category::Crash);
        assert_eq!(Category::classify(59), Category::Ride);
        assert_eq!(Category::classify(41), Category::Tom);
        assert_eq!(Category::classify(0), Category::Unknown);
        assert_eq!(Category::classify(127), Category::Unknown);
    }

    #[test]
    fn only_kicks_are_high_priority() {
        for category in Category::ALL {
            let expected = if category == Category::Kick {
                Priority::High
            } else {
                Priority::Normal
            };
            assert_eq!(category.priority(), expected);
        }
    }

    #[test]
    fn brightness_spans_floor_to_ceiling() {
        let config = BrightnessConfig::default();
        assert_eq!(brightness_of(0, &config).get(), 30);
        assert_eq!(brightness_of(127, &config).get(), 100);
        assert_eq!(brightness_of(64, &config).get(), 65);

        let custom = curve(10, 60, true);
        assert_eq!(brightness_of(0, &custom).get(), 10);
        assert_eq!(brightness_of(127, &custom).get(), 60);
    }

    #[test]
    fn brightness_clamps_out_of_domain_intensity() {
        let config = BrightnessConfig::default();
        assert_eq!(brightness_of(200, &config).get(), 100);
    }

    #[test]
    fn disabled_velocity_mapping_is_full_brightness() {
        let config = curve(30, 100, false);
        assert_eq!(brightness_of(0, &config), Percent::FULL);
        assert_eq!(brightness_of(127, &config), Percent::FULL);
    }

    #[test]
    fn fade_keeps_thirty_percent_with_floor() {
        assert_eq!(Percent::saturating(100).faded().get(), 30);
        assert_eq!(Percent::saturating(85).faded().get(), 26);
        assert_eq!(Percent::saturating(30).faded().get(), 20);
        assert_eq!(Percent::saturating(0).faded().get(), 20);
    }

    #[test]
    fn overrides_replace_default_colour() {
        let mut mapping = DrumMapping::default();
        assert_eq!(mapping.color_of(Category::Snare), Rgb::new(255, 255, 255));

        mapping.set_color(Category::Snare, Rgb::new(0, 0, 255));
        assert_eq!(mapping.color_of(Category::Snare), Rgb::new(0, 0, 255));
        assert_eq!(mapping.color_of(Category::Kick), Rgb::new(255, 0, 0));
    }

    #[test]
    fn full_velocity_kick_is_red_and_high_priority() {
        let mapping = DrumMapping::default();
        let event = mapping.event(36, 127);

        assert_eq!(event.category, Category::Kick);
        assert_eq!(event.color, Rgb::new(255, 0, 0));
        assert_eq!(event.brightness.get(), 100);
        assert_eq!(event.priority(), Priority::High);
    }

    #[test]
    fn parses_category_names() {
        assert_eq!("HiHat".parse::<Category>().unwrap(), Category::HiHat);
        assert_eq!(" kick ".parse::<Category>().unwrap(), Category::Kick);
        assert!("cowbell".parse::<Category>().is_err());
    }

    #[test]
    fn percent_rejects_values_over_one_hundred() {
        assert!(Percent::try_from(101).is_err());
        assert_eq!(Percent::try_from(100).unwrap(), Percent::FULL);
    }
}
