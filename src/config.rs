use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

use crate::error::StitchError;

/// Keypoint detector used for feature extraction.
///
/// ORB, AKAZE and BRISK produce binary descriptors (Hamming matching),
/// SIFT produces float descriptors (L2 matching).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeatureKind {
    Orb,
    Sift,
    Akaze,
    Brisk,
}

impl std::fmt::Display for FeatureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureKind::Orb => write!(f, "ORB"),
            FeatureKind::Sift => write!(f, "SIFT"),
            FeatureKind::Akaze => write!(f, "AKAZE"),
            FeatureKind::Brisk => write!(f, "BRISK"),
        }
    }
}

impl FromStr for FeatureKind {
    type Err = StitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "orb" => Ok(FeatureKind::Orb),
            "sift" => Ok(FeatureKind::Sift),
            "akaze" => Ok(FeatureKind::Akaze),
            "brisk" => Ok(FeatureKind::Brisk),
            _ => Err(StitchError::UnknownStrategy {
                axis: "feature strategy",
                name: s.to_string(),
            }),
        }
    }
}

/// Geometric model estimated between the canvas and each new image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionModel {
    /// 6-DoF linear map plus translation; right for near-planar documents.
    Affine,
    /// Full 8-DoF projective map; falls back to affine when degenerate.
    Homography,
}

impl std::fmt::Display for MotionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MotionModel::Affine => write!(f, "affine"),
            MotionModel::Homography => write!(f, "homography"),
        }
    }
}

impl FromStr for MotionModel {
    type Err = StitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "affine" => Ok(MotionModel::Affine),
            "homography" => Ok(MotionModel::Homography),
            _ => Err(StitchError::UnknownStrategy {
                axis: "motion model",
                name: s.to_string(),
            }),
        }
    }
}

/// What the pipeline does when one image cannot be aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FailurePolicy {
    /// Abort the whole run on the first unalignable image.
    Strict,
    /// Skip the unalignable image and keep stitching the rest.
    BestEffort,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Strict => write!(f, "strict"),
            FailurePolicy::BestEffort => write!(f, "best-effort"),
        }
    }
}

impl FromStr for FailurePolicy {
    type Err = StitchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(FailurePolicy::Strict),
            "best-effort" | "besteffort" => Ok(FailurePolicy::BestEffort),
            _ => Err(StitchError::UnknownStrategy {
                axis: "failure policy",
                name: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StitchConfig {
    pub feature_kind: FeatureKind,
    /// Upper bound on keypoints per image; also bounds the quadratic dedup.
    pub max_keypoints: i32,
    /// Minimum pixel distance between two kept keypoints. <= 0 disables.
    pub dedup_radius: f32,
    /// Matcher confidence: a knn candidate survives when
    /// `d0 < (1 - match_conf) * d1`.
    pub match_conf: f32,
    pub motion_model: MotionModel,
    pub failure_policy: FailurePolicy,
    /// Feature work runs on a copy downscaled to roughly this many
    /// megapixels; keypoint coordinates are scaled back afterwards.
    /// <= 0 disables downscaling.
    pub work_megapix: f64,
    /// White balance + denoise + CLAHE before any feature work.
    pub preprocess: bool,
}

impl Default for StitchConfig {
    fn default() -> Self {
        Self {
            feature_kind: FeatureKind::Sift,
            max_keypoints: 7000,
            dedup_radius: 10.0,
            match_conf: 0.6,
            motion_model: MotionModel::Affine,
            failure_policy: FailurePolicy::Strict,
            work_megapix: 0.5,
            preprocess: true,
        }
    }
}

pub fn load_config(path: &Path) -> anyhow::Result<StitchConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config = serde_json::from_str(&json)
        .with_context(|| format!("parsing config {}", path.display()))?;
    log::info!("Config loaded from {}", path.display());
    Ok(config)
}

pub fn save_config(config: &StitchConfig, path: &Path) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(config)?;
    std::fs::write(path, json)
        .with_context(|| format!("writing config {}", path.display()))?;
    log::info!("Config saved to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("orb".parse::<FeatureKind>().unwrap(), FeatureKind::Orb);
        assert_eq!("SIFT".parse::<FeatureKind>().unwrap(), FeatureKind::Sift);
        assert_eq!(
            "homography".parse::<MotionModel>().unwrap(),
            MotionModel::Homography
        );
        assert_eq!(
            "best-effort".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::BestEffort
        );
    }

    #[test]
    fn test_unknown_strategy_fails_fast() {
        let err = "surf".parse::<FeatureKind>().unwrap_err();
        match err {
            StitchError::UnknownStrategy { axis, name } => {
                assert_eq!(axis, "feature strategy");
                assert_eq!(name, "surf");
            }
            other => panic!("expected UnknownStrategy, got {other:?}"),
        }
        assert!("rigid".parse::<MotionModel>().is_err());
        assert!("lenient".parse::<FailurePolicy>().is_err());
    }

    #[test]
    fn test_config_json_round_trip() {
        let config = StitchConfig {
            feature_kind: FeatureKind::Orb,
            match_conf: 0.3,
            ..StitchConfig::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: StitchConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.feature_kind, FeatureKind::Orb);
        assert_eq!(back.match_conf, 0.3);
        assert_eq!(back.motion_model, config.motion_model);
    }
}
