//! Supports reading the controller configuration from YAML file (optional)

use std::path::Path;
use once_cell::sync::Lazy;
use regex::Regex;
use yaml_rust2::{Yaml, YamlLoader};

use crate::config::{metric_from_name, ControllerConfig, TASK_NAMES};
use crate::joint_limits::JointLimits;
use crate::parameter_error::ParameterError;
use crate::redundancy::SecondaryTasks;

impl ControllerConfig {
    /// Read the controller configuration from YAML file. YAML file like this is supported:
    /// ```yaml
    /// task_space_gains: { kpp: 80.0, kpo: 50.0, kdp: 40.0, kdo: 14.14 }
    /// joint_space_gains: { kp: 150.0, kd: 72.0 }
    /// pinv_tolerance: 1.0e-4
    /// orientation_metric: euler_zyz # or angle_axis
    /// null_space:
    ///   tasks: [joint_damping, joint_limits]
    ///   damping_gain: 1.0
    ///   joint_limit_gain: 10.0
    ///   gamma: 1.0
    /// joint_limits:
    ///   lower: [deg(-170), deg(-120), deg(-170), deg(-120), deg(-170), deg(-120), deg(-175)]
    ///   upper: [deg(170), deg(120), deg(170), deg(120), deg(170), deg(120), deg(175)]
    /// ```
    /// Every section is optional, missing values keep their defaults. Joint limits can be
    /// given in radians or with the deg(angle) function.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ParameterError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    /// Same as [ControllerConfig::from_yaml_file] but reads from the string.
    pub fn from_yaml_str(contents: &str) -> Result<Self, ParameterError> {
        let docs = YamlLoader::load_from_str(contents)
            .map_err(|e| ParameterError::ParseError(e.to_string()))?;
        let doc = docs.first()
            .ok_or_else(|| ParameterError::ParseError("empty YAML document".to_string()))?;

        let mut config = ControllerConfig::default();

        let gains = &doc["task_space_gains"];
        let t = &mut config.task_space_gains;
        read_f64(gains, "kpp", &mut t.kpp)?;
        read_f64(gains, "kpo", &mut t.kpo)?;
        read_f64(gains, "kdp", &mut t.kdp)?;
        read_f64(gains, "kdo", &mut t.kdo)?;

        let gains = &doc["joint_space_gains"];
        read_f64(gains, "kp", &mut config.joint_space_gains.kp)?;
        read_f64(gains, "kd", &mut config.joint_space_gains.kd)?;

        read_f64(doc, "pinv_tolerance", &mut config.pinv_tolerance)?;
        if !(config.pinv_tolerance >= 0.0) {
            return Err(ParameterError::ParseError(format!(
                "pinv_tolerance must not be negative (got {})", config.pinv_tolerance)));
        }

        match &doc["orientation_metric"] {
            Yaml::BadValue => {}
            Yaml::String(name) => {
                config.orientation_metric = metric_from_name(name).ok_or_else(|| {
                    ParameterError::ParseError(format!("unknown orientation_metric: {}", name))
                })?;
            }
            other => return Err(ParameterError::ParseError(format!(
                "orientation_metric must be a name (got {:?})", other))),
        }

        let null_space = &doc["null_space"];
        if let Some(tasks) = null_space["tasks"].as_vec() {
            config.null_space.tasks = parse_tasks(tasks)?;
        }
        let n = &mut config.null_space;
        read_f64(null_space, "damping_gain", &mut n.damping_gain)?;
        read_f64(null_space, "joint_limit_gain", &mut n.joint_limit_gain)?;
        read_f64(null_space, "gamma", &mut n.gamma)?;

        let limits = &doc["joint_limits"];
        if !limits.is_badvalue() {
            let lower = parse_angles(limits, "lower")?;
            let upper = parse_angles(limits, "upper")?;
            if lower.len() != upper.len() {
                return Err(ParameterError::InvalidLength { expected: lower.len(), found: upper.len() });
            }
            config.joint_limits = Some(JointLimits::new(&lower, &upper)?);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Overwrites `value` if the key is present, leaves it as is otherwise.
fn read_f64(section: &Yaml, key: &str, value: &mut f64) -> Result<(), ParameterError> {
    let node = &section[key];
    if node.is_badvalue() {
        return Ok(());
    }
    *value = as_f64(node).ok_or_else(|| {
        ParameterError::ParseError(format!("{} must be a number (got {:?})", key, node))
    })?;
    if !value.is_finite() {
        return Err(ParameterError::ParseError(format!("{} must be finite (got {})", key, value)));
    }
    Ok(())
}

fn as_f64(node: &Yaml) -> Option<f64> {
    match node {
        Yaml::Real(_) => node.as_f64(),
        Yaml::Integer(i) => Some(*i as f64),
        _ => None,
    }
}

fn parse_tasks(names: &[Yaml]) -> Result<SecondaryTasks, ParameterError> {
    let mut tasks = SecondaryTasks::NONE;
    for name in names {
        let name = name.as_str().ok_or_else(|| {
            ParameterError::ParseError(format!("null space task must be a name (got {:?})", name))
        })?;
        let (_, flag) = TASK_NAMES.iter()
            .find(|(known, _)| *known == name)
            .ok_or_else(|| ParameterError::ParseError(format!("unknown null space task: {}", name)))?;
        tasks |= *flag;
    }
    Ok(tasks)
}

fn parse_angles(section: &Yaml, key: &str) -> Result<Vec<f64>, ParameterError> {
    let values = section[key].as_vec()
        .ok_or_else(|| ParameterError::MissingField(format!("joint_limits.{}", key)))?;
    values.iter().map(parse_angle).collect()
}

static DEG_PATTERN: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^deg\(\s*([-+]?\d+(\.\d*)?([eE][-+]?\d+)?)\s*\)$"));

/// Angle in radians, or in degrees when written as deg(angle).
fn parse_angle(node: &Yaml) -> Result<f64, ParameterError> {
    if let Some(radians) = as_f64(node) {
        return Ok(radians);
    }
    let text = node.as_str()
        .ok_or_else(|| ParameterError::WrongAngle(format!("{:?}", node)))?;

    let re = DEG_PATTERN.as_ref()
        .map_err(|_| ParameterError::ParseError("Invalid regex pattern".to_string()))?;
    let caps = re.captures(text.trim())
        .ok_or_else(|| ParameterError::WrongAngle(text.to_string()))?;
    let degrees: f64 = caps.get(1)
        .ok_or_else(|| ParameterError::WrongAngle(format!("Bad representation: {}", text)))?
        .as_str()
        .parse()
        .map_err(|_| ParameterError::WrongAngle(text.to_string()))?;
    Ok(degrees.to_radians())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control_error::ControlError;

    #[test]
    fn test_parse_angle() {
        assert_eq!(parse_angle(&Yaml::Integer(1)).unwrap(), 1.0);
        assert_eq!(parse_angle(&Yaml::Real("0.5".to_string())).unwrap(), 0.5);
        assert!((parse_angle(&Yaml::String("deg(-90)".to_string())).unwrap()
            + std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        assert!((parse_angle(&Yaml::String("deg( 45.5 )".to_string())).unwrap()
            - 45.5_f64.to_radians()).abs() < 1e-12);
        assert!(matches!(parse_angle(&Yaml::String("rad(1)".to_string())),
                         Err(ParameterError::WrongAngle(_))));
    }

    #[test]
    fn test_empty_sections_keep_defaults() {
        let config = ControllerConfig::from_yaml_str("pinv_tolerance: 0.001\n").unwrap();
        let expected = ControllerConfig { pinv_tolerance: 0.001, ..ControllerConfig::default() };
        assert_eq!(config, expected);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(ControllerConfig::from_yaml_str("orientation_metric: quaternion\n"),
                         Err(ParameterError::ParseError(_))));
        assert!(matches!(ControllerConfig::from_yaml_str("null_space: { tasks: [posture] }\n"),
                         Err(ParameterError::ParseError(_))));
        assert!(matches!(ControllerConfig::from_yaml_str("joint_limits: { lower: [0.0] }\n"),
                         Err(ParameterError::MissingField(_))));
        assert!(matches!(ControllerConfig::from_yaml_str(
            "joint_limits: { lower: [0.0, 0.0], upper: [1.0] }\n"),
                         Err(ParameterError::InvalidLength { expected: 2, found: 1 })));
        assert!(matches!(ControllerConfig::from_yaml_str(
            "joint_limits: { lower: [1.0], upper: [0.0] }\n"),
                         Err(ParameterError::InvalidConfiguration(_))));
        assert!(matches!(ControllerConfig::from_yaml_str("task_space_gains: { kpp: fast }\n"),
                         Err(ParameterError::ParseError(_))));
    }

    #[test]
    fn test_null_space_gamma_must_be_positive() {
        for yaml in ["null_space: { gamma: 0.0 }\n", "null_space: { gamma: -2 }\n"] {
            assert!(matches!(ControllerConfig::from_yaml_str(yaml),
                             Err(ParameterError::InvalidConfiguration(ControlError::InvalidParameter {
                                 what: "joint limit cost gamma", .. }))), "{}", yaml);
        }
        let config = ControllerConfig::from_yaml_str("null_space: { gamma: 0.25 }\n").unwrap();
        assert_eq!(config.null_space.gamma, 0.25);
    }
}
