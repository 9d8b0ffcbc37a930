// Walker archetypes and the asset loader.
//
// A model is a small set of named boxes ("parts"). Parts come either inline
// from the config or from a TOML manifest on disk. Loading scales the model
// to its target height and puts its lowest point on the ground, and limb
// discovery classifies parts by name so the viewer can swing them.

use bevy_ecs::prelude::*;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::error::LoadError;

/// Default height a loaded model is scaled to.
pub const TARGET_HEIGHT: f32 = 1.2;

const ARM_TOKENS: [&str; 4] = ["arm", "hand", "mano", "brazo"];
const LEG_TOKENS: [&str; 4] = ["leg", "foot", "pie", "pierna"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartSpec {
    pub name: String,
    /// Centre of the box in model space.
    pub offset: [f32; 3],
    pub size: [f32; 3],
    #[serde(default)]
    pub color: Option<[f32; 3]>,
}

/// One spawnable archetype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEntry {
    /// Stable asset reference; also the name-persistence key.
    pub key: String,
    /// Display name used before any rename; the humanized key when absent.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_height")]
    pub height: f32,
    #[serde(default = "default_color")]
    pub color: [f32; 3],
    #[serde(default)]
    pub parts: Vec<PartSpec>,
    /// TOML file holding `[[parts]]`, used instead of the inline parts.
    #[serde(default)]
    pub manifest: Option<PathBuf>,
}

fn default_height() -> f32 {
    TARGET_HEIGHT
}

fn default_color() -> [f32; 3] {
    [1.0, 0.84, 0.0]
}

#[derive(Debug, Clone, PartialEq)]
pub struct Part {
    pub name: String,
    pub center: Vec3,
    pub size: Vec3,
    pub color: [f32; 3],
}

impl Part {
    /// Top-centre of the box: shoulders and hips swing around this.
    pub fn pivot(&self) -> Vec3 {
        self.center + Vec3::Y * (self.size.y * 0.5)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub key: String,
    pub parts: Vec<Part>,
}

/// Result of a successful load.
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub key: String,
    /// Configured display name, if any.
    pub name: Option<String>,
    pub model: Arc<Model>,
    /// Height after normalisation; drives name tag placement.
    pub height: f32,
}

/// Part indices classified as arms or legs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Limbs {
    pub arms: Vec<usize>,
    pub legs: Vec<usize>,
}

/// Presentation data for a spawned walker. The simulation never reads it.
#[derive(Component, Debug, Clone)]
pub struct Body {
    pub model: Arc<Model>,
    pub limbs: Limbs,
    /// Height of the name tag above the walker's feet.
    pub tag_height: f32,
}

pub trait AssetLoader: Send + Sync {
    fn load(&self, entry: &ModelEntry) -> Result<LoadedModel, LoadError>;
}

#[derive(Debug, Deserialize)]
struct Manifest {
    parts: Vec<PartSpec>,
}

/// Loads inline parts or a manifest file resolved against `base_dir`.
#[derive(Debug, Clone, Default)]
pub struct ManifestLoader {
    pub base_dir: PathBuf,
}

impl ManifestLoader {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self { base_dir: base_dir.into() }
    }

    fn read_manifest(&self, key: &str, path: &Path) -> Result<Vec<PartSpec>, LoadError> {
        let path = if path.is_absolute() { path.to_path_buf() } else { self.base_dir.join(path) };
        let content = std::fs::read_to_string(&path).map_err(|e| LoadError::Io(path.clone(), e))?;
        let manifest: Manifest = toml::from_str(&content)
            .map_err(|e| LoadError::Malformed { key: key.to_string(), reason: e.to_string() })?;
        Ok(manifest.parts)
    }
}

impl AssetLoader for ManifestLoader {
    fn load(&self, entry: &ModelEntry) -> Result<LoadedModel, LoadError> {
        let specs = match &entry.manifest {
            Some(path) => self.read_manifest(&entry.key, path)?,
            None => entry.parts.clone(),
        };
        let (model, height) = build_model(entry, &specs)?;
        log::debug!("loaded model '{}' ({} parts, height {height:.2})", entry.key, model.parts.len());
        Ok(LoadedModel { key: entry.key.clone(), name: entry.name.clone(), model: Arc::new(model), height })
    }
}

/// Scale `specs` to the entry's height and drop the lowest point onto y = 0.
fn build_model(entry: &ModelEntry, specs: &[PartSpec]) -> Result<(Model, f32), LoadError> {
    let malformed = |reason: String| LoadError::Malformed { key: entry.key.clone(), reason };
    if specs.is_empty() {
        return Err(malformed("model has no parts".into()));
    }
    if !(entry.height.is_finite() && entry.height > 0.0) {
        return Err(malformed(format!("target height {} is not positive", entry.height)));
    }

    let mut min = Vec3::splat(f32::INFINITY);
    let mut max = Vec3::splat(f32::NEG_INFINITY);
    for spec in specs {
        let center = Vec3::from(spec.offset);
        let size = Vec3::from(spec.size);
        if !center.is_finite() || !size.is_finite() || size.min_element() < 0.0 {
            return Err(malformed(format!("part '{}' has invalid geometry", spec.name)));
        }
        min = min.min(center - size * 0.5);
        max = max.max(center + size * 0.5);
    }

    let k = entry.height / (max.y - min.y).max(1e-6);
    let lift = -min.y * k;
    let parts = specs
        .iter()
        .map(|spec| Part {
            name: spec.name.clone(),
            center: Vec3::from(spec.offset) * k + Vec3::Y * lift,
            size: Vec3::from(spec.size) * k,
            color: spec.color.unwrap_or(entry.color),
        })
        .collect();
    Ok((Model { key: entry.key.clone(), parts }, (max.y - min.y) * k))
}

/// Classify parts by case-insensitive name tokens. A part may be both.
pub fn find_limbs(model: &Model) -> Limbs {
    let mut limbs = Limbs::default();
    for (idx, part) in model.parts.iter().enumerate() {
        let name = part.name.to_lowercase();
        if ARM_TOKENS.iter().any(|t| name.contains(t)) {
            limbs.arms.push(idx);
        }
        if LEG_TOKENS.iter().any(|t| name.contains(t)) {
            limbs.legs.push(idx);
        }
    }
    limbs
}

fn part(name: &str, offset: [f32; 3], size: [f32; 3], color: Option<[f32; 3]>) -> PartSpec {
    PartSpec { name: name.to_string(), offset, size, color }
}

/// Archetypes used when the config lists none.
pub fn builtin_models() -> Vec<ModelEntry> {
    let dark = Some([0.15, 0.15, 0.18]);
    vec![
        ModelEntry {
            key: "models/minion_gold.obj".into(),
            name: None,
            height: TARGET_HEIGHT,
            color: [1.0, 0.84, 0.0],
            parts: vec![
                part("Body", [0.0, 0.9, 0.0], [0.6, 0.7, 0.4], None),
                part("Head", [0.0, 1.45, 0.0], [0.45, 0.4, 0.4], None),
                part("Arm_L", [-0.4, 0.95, 0.0], [0.14, 0.55, 0.14], None),
                part("Arm_R", [0.4, 0.95, 0.0], [0.14, 0.55, 0.14], None),
                part("Leg_L", [-0.15, 0.28, 0.0], [0.18, 0.56, 0.18], dark),
                part("Leg_R", [0.15, 0.28, 0.0], [0.18, 0.56, 0.18], dark),
            ],
            manifest: None,
        },
        ModelEntry {
            key: "models/robot-explorador.obj".into(),
            name: None,
            height: 1.4,
            color: [0.0, 0.85, 1.0],
            parts: vec![
                part("Torso", [0.0, 1.0, 0.0], [0.7, 0.6, 0.45], None),
                part("Cabeza", [0.0, 1.5, 0.0], [0.4, 0.35, 0.35], None),
                part("brazo_izq", [-0.45, 1.0, 0.0], [0.16, 0.6, 0.16], None),
                part("brazo_der", [0.45, 1.0, 0.0], [0.16, 0.6, 0.16], None),
                part("pierna_izq", [-0.18, 0.35, 0.0], [0.2, 0.7, 0.2], dark),
                part("pierna_der", [0.18, 0.35, 0.0], [0.2, 0.7, 0.2], dark),
            ],
            manifest: None,
        },
        ModelEntry {
            key: "models/blob_ghost.obj".into(),
            name: Some("Ghost".into()),
            height: 1.0,
            color: [0.85, 0.85, 0.95],
            parts: vec![
                part("Shell", [0.0, 0.45, 0.0], [0.7, 0.9, 0.7], None),
                part("Hat", [0.0, 1.0, 0.0], [0.4, 0.2, 0.4], dark),
            ],
            manifest: None,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn entry(parts: Vec<PartSpec>) -> ModelEntry {
        ModelEntry {
            key: "models/test.obj".into(),
            name: None,
            height: 2.0,
            color: [1.0, 0.0, 0.0],
            parts,
            manifest: None,
        }
    }

    #[test]
    fn load_normalises_height_and_grounds_the_model() {
        let e = entry(vec![
            part("Body", [0.0, 5.0, 0.0], [1.0, 2.0, 1.0], None),
            part("Leg", [0.0, 3.5, 0.0], [0.2, 1.0, 0.2], Some([0.0, 0.0, 1.0])),
        ]);
        let loaded = ManifestLoader::default().load(&e).unwrap();
        assert!((loaded.height - 2.0).abs() < 1e-5);
        let lowest = loaded.model.parts.iter().map(|p| p.center.y - p.size.y * 0.5).fold(f32::INFINITY, f32::min);
        assert!(lowest.abs() < 1e-5);
        assert_eq!(loaded.model.parts[0].color, [1.0, 0.0, 0.0]);
        assert_eq!(loaded.model.parts[1].color, [0.0, 0.0, 1.0]);
    }

    #[test]
    fn empty_model_is_malformed() {
        let err = ManifestLoader::default().load(&entry(Vec::new())).unwrap_err();
        assert!(matches!(err, LoadError::Malformed { .. }));
    }

    #[test]
    fn missing_manifest_is_an_io_error() {
        let mut e = entry(Vec::new());
        e.manifest = Some("nope/missing.toml".into());
        let err = ManifestLoader::new("/tmp/does-not-exist").load(&e).unwrap_err();
        assert!(matches!(err, LoadError::Io(_, _)));
    }

    #[test]
    fn manifest_parts_are_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("crab.toml")).unwrap();
        writeln!(file, "[[parts]]\nname = \"Shell\"\noffset = [0.0, 0.5, 0.0]\nsize = [1.0, 1.0, 1.0]").unwrap();
        let mut e = entry(Vec::new());
        e.manifest = Some("crab.toml".into());
        let loaded = ManifestLoader::new(dir.path()).load(&e).unwrap();
        assert_eq!(loaded.model.parts.len(), 1);
        assert_eq!(loaded.model.parts[0].name, "Shell");
    }

    #[test]
    fn limbs_match_localized_tokens_case_insensitively() {
        let model = Model {
            key: "k".into(),
            parts: ["Body", "LeftARM", "Mano_D", "brazo", "Pierna_I", "FOOT", "leg", "Head"]
                .iter()
                .map(|n| Part { name: n.to_string(), center: Vec3::ZERO, size: Vec3::ONE, color: [1.0; 3] })
                .collect(),
        };
        let limbs = find_limbs(&model);
        assert_eq!(limbs.arms, vec![1, 2, 3]);
        assert_eq!(limbs.legs, vec![4, 5, 6]);
    }

    #[test]
    fn builtin_models_all_load() {
        let loader = ManifestLoader::default();
        for e in builtin_models() {
            let loaded = loader.load(&e).unwrap();
            assert!((loaded.height - e.height).abs() < 1e-4);
        }
    }
}
