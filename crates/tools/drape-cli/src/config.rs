//! Layered pipeline configuration: defaults, TOML file, environment, flags

use anyhow::{bail, Context};
use drape::PipelineConfig;
use std::{env, fs, path::Path};

pub const ENV_ALPHA_THRESHOLD: &str = "DRAPE_ALPHA_THRESHOLD";
pub const ENV_DOWNSCALE: &str = "DRAPE_DOWNSCALE";
pub const ENV_TARGET_TRIANGLES: &str = "DRAPE_TARGET_TRIANGLES";
pub const ENV_SCALE: &str = "DRAPE_SCALE";

/// Overrides given on the command line; `None` leaves the lower layer as-is.
#[derive(Debug, Default, Clone)]
pub struct FlagOverrides {
    pub alpha_threshold: Option<u8>,
    pub scale: Option<[f32; 3]>,
    pub downscale: Option<u32>,
    pub target_triangles: Option<usize>,
}

/// Resolve the pipeline configuration from every layer.
///
/// Defaults, then the TOML file, then `DRAPE_*` variables, then flags.
pub fn resolve(config_file: Option<&Path>, flags: &FlagOverrides) -> anyhow::Result<PipelineConfig> {
    let mut config = match config_file {
        Some(path) => load_file(path)?,
        None => PipelineConfig::default(),
    };

    config = apply_env(config, |key| env::var(key).ok())?;
    Ok(apply_flags(config, flags))
}

/// Parse a TOML file; missing keys keep their defaults.
pub fn load_file(path: &Path) -> anyhow::Result<PipelineConfig> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    parse_toml(&text).with_context(|| format!("invalid config file {}", path.display()))
}

pub fn parse_toml(text: &str) -> anyhow::Result<PipelineConfig> {
    let config: PipelineConfig = toml::from_str(text)?;
    // Route through the builders so file values get the same clamping as flags
    let mut clamped = PipelineConfig::default()
        .with_alpha_threshold(config.alpha_threshold)
        .with_scale(config.scale)
        .with_downscale_factor(config.downscale_factor);
    if let Some(target) = config.target_triangles {
        clamped = clamped.with_target_triangles(target);
    }
    Ok(clamped)
}

/// Overlay environment variables read through `lookup`.
pub fn apply_env(
    mut config: PipelineConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<PipelineConfig> {
    if let Some(value) = lookup(ENV_ALPHA_THRESHOLD) {
        let threshold = value
            .trim()
            .parse()
            .with_context(|| format!("{ENV_ALPHA_THRESHOLD} must be 0-255, got {value:?}"))?;
        config = config.with_alpha_threshold(threshold);
    }

    if let Some(value) = lookup(ENV_DOWNSCALE) {
        let factor = value
            .trim()
            .parse()
            .with_context(|| format!("{ENV_DOWNSCALE} must be a positive integer, got {value:?}"))?;
        config = config.with_downscale_factor(factor);
    }

    if let Some(value) = lookup(ENV_TARGET_TRIANGLES) {
        let target = value
            .trim()
            .parse()
            .with_context(|| format!("{ENV_TARGET_TRIANGLES} must be an integer, got {value:?}"))?;
        config = config.with_target_triangles(target);
    }

    if let Some(value) = lookup(ENV_SCALE) {
        config = config.with_scale(parse_scale(&value).with_context(|| format!("invalid {ENV_SCALE}"))?);
    }

    Ok(config)
}

pub fn apply_flags(mut config: PipelineConfig, flags: &FlagOverrides) -> PipelineConfig {
    if let Some(threshold) = flags.alpha_threshold {
        config = config.with_alpha_threshold(threshold);
    }
    if let Some(scale) = flags.scale {
        config = config.with_scale(scale);
    }
    if let Some(factor) = flags.downscale {
        config = config.with_downscale_factor(factor);
    }
    if let Some(target) = flags.target_triangles {
        config = config.with_target_triangles(target);
    }
    config
}

/// Parse "x,y,z" into a scale vector
pub fn parse_scale(value: &str) -> anyhow::Result<[f32; 3]> {
    let parts = value
        .split(',')
        .map(|p| p.trim().parse::<f32>())
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("expected three numbers, got {value:?}"))?;

    match parts.as_slice() {
        [x, y, z] => Ok([*x, *y, *z]),
        _ => bail!("expected three comma-separated numbers, got {value:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_parse_partial_toml() {
        let config = parse_toml("downscale_factor = 4\n").unwrap();
        assert_eq!(config.downscale_factor, 4);
        assert_eq!(config.alpha_threshold, 10);
        assert_eq!(config.target_triangles, None);
    }

    #[test]
    fn test_parse_full_toml() {
        let text = r#"
            alpha_threshold = 32
            scale = [0.5, 0.5, 20.0]
            downscale_factor = 0
            target_triangles = 5000
        "#;
        let config = parse_toml(text).unwrap();
        assert_eq!(config.alpha_threshold, 32);
        assert_eq!(config.scale, [0.5, 0.5, 20.0]);
        assert_eq!(config.downscale_factor, 1);
        assert_eq!(config.target_triangles, Some(5000));
    }

    #[test]
    fn test_parse_toml_rejects_bad_types() {
        assert!(parse_toml("alpha_threshold = 300\n").is_err());
        assert!(parse_toml("scale = [1.0, 2.0]\n").is_err());
    }

    #[test]
    fn test_env_overrides_file() {
        let file = parse_toml("alpha_threshold = 32\ndownscale_factor = 2\n").unwrap();
        let config = apply_env(
            file,
            lookup(&[(ENV_DOWNSCALE, "3"), (ENV_SCALE, "1, 1, 15")]),
        )
        .unwrap();
        assert_eq!(config.alpha_threshold, 32);
        assert_eq!(config.downscale_factor, 3);
        assert_eq!(config.scale, [1.0, 1.0, 15.0]);
    }

    #[test]
    fn test_invalid_env_value() {
        let err = apply_env(PipelineConfig::default(), lookup(&[(ENV_ALPHA_THRESHOLD, "lots")]));
        assert!(err.is_err());
    }

    #[test]
    fn test_flags_override_env() {
        let env = apply_env(
            PipelineConfig::default(),
            lookup(&[(ENV_TARGET_TRIANGLES, "1000")]),
        )
        .unwrap();
        let flags = FlagOverrides {
            target_triangles: Some(200),
            alpha_threshold: Some(0),
            ..Default::default()
        };
        let config = apply_flags(env, &flags);
        assert_eq!(config.target_triangles, Some(200));
        assert_eq!(config.alpha_threshold, 0);
        assert_eq!(config.downscale_factor, 1);
    }

    #[test]
    fn test_parse_scale() {
        assert_eq!(parse_scale("1,2,3").unwrap(), [1.0, 2.0, 3.0]);
        assert!(parse_scale("1,2").is_err());
        assert!(parse_scale("a,b,c").is_err());
    }
}
