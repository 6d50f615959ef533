//! Per-participant avatar settings.
//!
//! Settings travel as plain `key=value` lines (with `//` comments) and are
//! replicated alongside the binary asset. The schema is an explicit,
//! enumerated field table — every field has a name, a type, and a default —
//! so parsing, diffing, and hashing are ordinary typed code.
//!
//! `diff_only()` serializes exactly the fields that differ from their
//! defaults, in schema order. That string is what goes on the wire and what
//! the settings digest is computed from, so it must be deterministic.

use std::sync::Arc;

use dashmap::DashMap;

use crate::digest::Digest;

/// Outcome of applying one `key=value` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Set,
    Unknown,
    Invalid,
}

/// A value type usable in the settings schema.
pub trait SettingValue: Sized + PartialEq {
    fn parse_setting(raw: &str) -> Option<Self>;
    fn format_setting(&self) -> String;
}

impl SettingValue for f32 {
    fn parse_setting(raw: &str) -> Option<Self> {
        raw.trim().parse().ok()
    }
    fn format_setting(&self) -> String {
        format!("{self}")
    }
}

impl SettingValue for bool {
    fn parse_setting(raw: &str) -> Option<Self> {
        match raw.trim() {
            "true" | "True" => Some(true),
            "false" | "False" => Some(false),
            _ => None,
        }
    }
    fn format_setting(&self) -> String {
        format!("{self}")
    }
}

/// Three-component vector, written as `(x,y,z)` in settings text.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Vec3 = Vec3 { x: 1.0, y: 1.0, z: 1.0 };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl SettingValue for Vec3 {
    fn parse_setting(raw: &str) -> Option<Self> {
        let inner = raw.trim().strip_prefix('(')?.strip_suffix(')')?;
        let mut parts = inner.split(',');
        let x = parts.next()?.trim().parse().ok()?;
        let y = parts.next()?.trim().parse().ok()?;
        let z = parts.next()?.trim().parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        Some(Vec3 { x, y, z })
    }
    fn format_setting(&self) -> String {
        format!("({},{},{})", self.x, self.y, self.z)
    }
}

/// Defines `AvatarSettings` from the field table: name, type, default.
macro_rules! avatar_schema {
    ($($field:ident : $ty:ty = $default:expr),* $(,)?) => {
        /// One participant's avatar settings. Field order is schema order
        /// and fixes the serialization order of `diff_only()`.
        #[derive(Debug, Clone, PartialEq)]
        pub struct AvatarSettings {
            $(pub $field: $ty,)*
        }

        impl Default for AvatarSettings {
            fn default() -> Self {
                Self { $($field: $default,)* }
            }
        }

        impl AvatarSettings {
            /// Schema field names, in schema order.
            pub const FIELDS: &'static [&'static str] = &[$(stringify!($field)),*];

            /// Apply one parsed `key=value` pair.
            pub fn apply(&mut self, key: &str, value: &str) -> ApplyOutcome {
                match key {
                    $(stringify!($field) => {
                        match <$ty as SettingValue>::parse_setting(value) {
                            Some(v) => {
                                self.$field = v;
                                ApplyOutcome::Set
                            }
                            None => ApplyOutcome::Invalid,
                        }
                    })*
                    _ => ApplyOutcome::Unknown,
                }
            }

            /// Serialize only the fields that differ from their defaults,
            /// one `key=value` line per field, in schema order.
            pub fn diff_only(&self) -> String {
                let defaults = Self::default();
                let mut lines: Vec<String> = Vec::new();
                $(
                    if self.$field != defaults.$field {
                        lines.push(format!(
                            "{}={}",
                            stringify!($field),
                            SettingValue::format_setting(&self.$field)
                        ));
                    }
                )*
                lines.join("\n")
            }
        }
    };
}

avatar_schema! {
    model_scale: f32 = 1.1,
    model_offset_y: f32 = 0.0,
    player_height: f32 = 1.85,
    player_radius: f32 = 0.5,

    sitting_on_chair_offset: Vec3 = Vec3::ZERO,
    sitting_on_throne_offset: Vec3 = Vec3::ZERO,
    sitting_on_ship_offset: Vec3 = Vec3::ZERO,
    holding_mast_offset: Vec3 = Vec3::ZERO,
    holding_dragon_offset: Vec3 = Vec3::ZERO,
    sitting_idle_offset: Vec3 = Vec3::ZERO,
    sleeping_offset: Vec3 = Vec3::ZERO,

    right_hand_item_pos: Vec3 = Vec3::ZERO,
    left_hand_item_pos: Vec3 = Vec3::ZERO,
    right_hand_back_item_pos: Vec3 = Vec3::ZERO,
    right_hand_back_item_tool_pos: Vec3 = Vec3::ZERO,
    left_hand_back_item_pos: Vec3 = Vec3::ZERO,

    helmet_visible: bool = false,
    helmet_scale: Vec3 = Vec3::ONE,
    helmet_offset: Vec3 = Vec3::ZERO,

    chest_visible: bool = false,
    shoulders_visible: bool = false,
    utility_visible: bool = false,
    legs_visible: bool = false,

    model_brightness: f32 = 0.8,
    fix_camera_height: bool = true,
    use_toon_shader: bool = false,
    enable_player_fade: bool = true,
    allow_share: bool = true,

    spring_bone_stiffness: f32 = 1.0,
    spring_bone_gravity_power: f32 = 1.0,

    equipment_scale: f32 = 1.0,
    attack_distance_scale: f32 = 1.0,
    melee_damage_scale: f32 = 1.0,
    ranged_damage_scale: f32 = 1.0,
    interaction_distance_scale: f32 = 1.0,
    swim_depth_scale: f32 = 1.0,
    swim_speed_scale: f32 = 1.0,
    base_health_scale: f32 = 1.0,
    food_health_scale: f32 = 1.0,
    base_stamina_scale: f32 = 1.0,
    food_stamina_scale: f32 = 1.0,
    weight_limit_scale: f32 = 1.0,
    movement_speed_scale: f32 = 1.0,
    jump_force_scale: f32 = 1.0,
    stealth_scale: f32 = 1.0,
    digestion_time_scale: f32 = 1.0,
}

impl AvatarSettings {
    /// Build settings from `key=value` lines, starting from defaults.
    /// Fields absent from the input stay at their defaults; unknown keys
    /// and unparsable values are logged and skipped.
    pub fn from_lines<'a>(owner: &str, lines: impl IntoIterator<Item = &'a str> + 'a) -> Self {
        let mut settings = Self::default();
        for (key, value) in parse_setting_lines(lines) {
            match settings.apply(&key, &value) {
                ApplyOutcome::Set => {}
                ApplyOutcome::Unknown => {
                    tracing::warn!(owner, key, value, "unknown setting");
                }
                ApplyOutcome::Invalid => {
                    tracing::warn!(owner, key, value, "failed to read setting");
                }
            }
        }
        settings
    }

    /// Digest of the serialized non-default settings.
    pub fn digest(&self) -> Digest {
        Digest::of_text(&self.diff_only())
    }
}

/// Split settings text into `(key, value)` pairs. `//` starts a comment,
/// lines without `=` are ignored, keys and values are trimmed.
pub fn parse_setting_lines<'a>(
    lines: impl IntoIterator<Item = &'a str> + 'a,
) -> impl Iterator<Item = (String, String)> + 'a {
    lines.into_iter().filter_map(|line| {
        let value_line = match line.find("//") {
            Some(idx) => &line[..idx],
            None => line,
        };
        let (key, value) = value_line.split_once('=')?;
        Some((key.trim().to_string(), value.trim().to_string()))
    })
}

/// Owned map of participant name → settings, shared between the protocol
/// task and the host. Replaces ad hoc global state; the host clears it at
/// defined lifecycle points via `reset`.
#[derive(Clone, Default)]
pub struct SettingsStore {
    inner: Arc<DashMap<String, AvatarSettings>>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<AvatarSettings> {
        self.inner.get(name).map(|e| e.value().clone())
    }

    /// Current settings for `name`, or defaults if none are stored.
    pub fn get_or_default(&self, name: &str) -> AvatarSettings {
        self.get(name).unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.inner.contains_key(name)
    }

    /// Replace the settings for `name` with ones parsed from raw lines.
    pub fn apply_raw(&self, name: &str, text: &str) {
        let settings = AvatarSettings::from_lines(name, text.lines());
        tracing::info!(name, "loaded settings");
        self.inner.insert(name.to_string(), settings);
    }

    pub fn insert(&self, name: &str, settings: AvatarSettings) {
        self.inner.insert(name.to_string(), settings);
    }

    pub fn remove(&self, name: &str) {
        self.inner.remove(name);
    }

    /// Digest of the stored (or default) settings for `name`.
    pub fn digest_of(&self, name: &str) -> Digest {
        self.get_or_default(name).digest()
    }

    /// Drop all entries. Invoked by the host on session restart.
    pub fn reset(&self) {
        self.inner.clear();
    }
}
