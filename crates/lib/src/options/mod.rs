//! Option resolution.
//!
//! Resolves user overrides against a formula's declared options. Resolution is
//! a pure function: it never touches the filesystem or the environment.

pub mod types;

use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

pub use types::{
  Advisory, AdvisoryLevel, Caution, OptionKind, OptionSpec, OptionValue, Overrides, ResolveError, ResolvedOptions,
};

/// Check that a set of declarations is internally consistent.
///
/// Every peer and prerequisite must name a declared option, names must be
/// unique, and each default must fit its kind.
pub fn validate_specs(specs: &[OptionSpec]) -> Result<(), ResolveError> {
  let mut seen = HashSet::new();
  for spec in specs {
    if !seen.insert(spec.name.as_str()) {
      return Err(invalid(spec, "declared more than once"));
    }
  }

  for spec in specs {
    if let OptionKind::Enum { choices } = &spec.kind
      && choices.is_empty()
    {
      return Err(invalid(spec, "enum option has no choices"));
    }
    if spec.accept(&spec.default).is_none() {
      return Err(invalid(spec, &format!("default '{}' does not fit its kind", spec.default)));
    }

    let referenced = spec
      .exclusive_with
      .iter()
      .chain(spec.requires.iter())
      .chain(spec.cautions.iter().map(|c| &c.peer));
    for peer in referenced {
      if peer == &spec.name {
        return Err(invalid(spec, "refers to itself"));
      }
      if !seen.contains(peer.as_str()) {
        return Err(invalid(spec, &format!("refers to undeclared option {}", peer)));
      }
    }
  }

  Ok(())
}

fn invalid(spec: &OptionSpec, reason: &str) -> ResolveError {
  ResolveError::InvalidSpec {
    option: spec.name.clone(),
    reason: reason.to_string(),
  }
}

/// Resolve overrides against declared options.
///
/// # Errors
///
/// - `UnknownOption` if an override names no declared option
/// - `InvalidValue` if an override does not fit the option's kind
/// - `ConstraintViolation` if two mutually exclusive options end up selected
///
/// Dependent options whose prerequisite is not selected are forced off and
/// reported as a notice. Declared cautions between selected options become
/// warnings; they never fail resolution.
pub fn resolve(specs: &[OptionSpec], overrides: &Overrides) -> Result<ResolvedOptions, ResolveError> {
  validate_specs(specs)?;

  let by_name: HashMap<&str, &OptionSpec> = specs.iter().map(|s| (s.name.as_str(), s)).collect();
  let position: HashMap<&str, usize> = specs.iter().enumerate().map(|(i, s)| (s.name.as_str(), i)).collect();

  let mut resolved = ResolvedOptions::default();
  for spec in specs {
    resolved.values.insert(spec.name.clone(), spec.default.clone());
  }

  for (name, value) in overrides {
    let spec = by_name
      .get(name.as_str())
      .ok_or_else(|| ResolveError::UnknownOption(name.clone()))?;
    let accepted = spec.accept(value).ok_or_else(|| ResolveError::InvalidValue {
      option: name.clone(),
      value: value.to_string(),
    })?;
    debug!(option = %name, value = %accepted, "applying override");
    resolved.values.insert(name.clone(), accepted);
  }

  let selected = |values: &std::collections::BTreeMap<String, OptionValue>, name: &str| {
    by_name[name].is_selected(&values[name])
  };

  // Force off dependents until nothing changes; forcing only turns options
  // off, so this terminates.
  let mut changed = true;
  while changed {
    changed = false;
    for spec in specs {
      let Some(prerequisite) = &spec.requires else {
        continue;
      };
      if selected(&resolved.values, &spec.name) && !selected(&resolved.values, prerequisite) {
        debug!(option = %spec.name, requires = %prerequisite, "forcing dependent option off");
        resolved.values.insert(spec.name.clone(), spec.off_value());
        resolved.advisories.push(Advisory {
          level: AdvisoryLevel::Notice,
          options: vec![spec.name.clone(), prerequisite.clone()],
          message: format!("{} requires {} and was turned off", spec.name, prerequisite),
        });
        changed = true;
      }
    }
  }

  for spec in specs {
    if !selected(&resolved.values, &spec.name) {
      continue;
    }
    for peer in &spec.exclusive_with {
      if selected(&resolved.values, peer) {
        let (first, second) = if position[spec.name.as_str()] <= position[peer.as_str()] {
          (spec.name.clone(), peer.clone())
        } else {
          (peer.clone(), spec.name.clone())
        };
        return Err(ResolveError::ConstraintViolation { first, second });
      }
    }
  }

  for spec in specs {
    if !selected(&resolved.values, &spec.name) {
      continue;
    }
    for caution in &spec.cautions {
      if selected(&resolved.values, &caution.peer) {
        warn!(option = %spec.name, peer = %caution.peer, "{}", caution.message);
        resolved.advisories.push(Advisory {
          level: AdvisoryLevel::Warning,
          options: vec![spec.name.clone(), caution.peer.clone()],
          message: caution.message.clone(),
        });
      }
    }
  }

  Ok(resolved)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn specs() -> Vec<OptionSpec> {
    vec![
      OptionSpec::boolean("with-matlab", "Compile with Matlab support"),
      OptionSpec::boolean("with-single", "Compile with single precision support"),
      OptionSpec::boolean("with-pgi", "Use the PGI toolchain")
        .caution("with-matlab", "Matlab mex files are only tested with the GNU toolchain"),
      OptionSpec::boolean("with-static", "Only build static archives").exclusive_with("with-shared"),
      OptionSpec::boolean("with-shared", "Only build shared objects"),
      OptionSpec::boolean("with-mex-debug", "Debug mex bindings").requires("with-matlab"),
      OptionSpec::choice("opt-level", "Optimization level", &["O0", "O2", "O3"], "O2"),
    ]
  }

  fn overrides(pairs: &[(&str, OptionValue)]) -> Overrides {
    pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
  }

  #[test]
  fn defaults_when_no_overrides() {
    let resolved = resolve(&specs(), &Overrides::new()).unwrap();
    assert!(!resolved.enabled("with-matlab"));
    assert!(!resolved.enabled("with-single"));
    assert_eq!(resolved.choice("opt-level"), Some("O2"));
    assert!(resolved.advisories.is_empty());
  }

  #[test]
  fn unknown_option_fails() {
    let err = resolve(&specs(), &overrides(&[("with-cuda", OptionValue::Bool(true))])).unwrap_err();
    assert_eq!(err, ResolveError::UnknownOption("with-cuda".to_string()));
  }

  #[test]
  fn exclusive_options_fail_naming_both() {
    let err = resolve(
      &specs(),
      &overrides(&[
        ("with-shared", OptionValue::Bool(true)),
        ("with-static", OptionValue::Bool(true)),
      ]),
    )
    .unwrap_err();
    assert_eq!(
      err,
      ResolveError::ConstraintViolation {
        first: "with-static".to_string(),
        second: "with-shared".to_string(),
      }
    );
  }

  #[test]
  fn exclusive_option_alone_is_fine() {
    let resolved = resolve(&specs(), &overrides(&[("with-static", OptionValue::Bool(true))])).unwrap();
    assert!(resolved.enabled("with-static"));
  }

  #[test]
  fn pgi_with_matlab_is_a_warning_not_an_error() {
    let resolved = resolve(
      &specs(),
      &overrides(&[
        ("with-pgi", OptionValue::Bool(true)),
        ("with-matlab", OptionValue::Bool(true)),
      ]),
    )
    .unwrap();

    let warnings: Vec<_> = resolved.warnings().collect();
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].options, vec!["with-pgi", "with-matlab"]);
    assert!(resolved.enabled("with-pgi"));
    assert!(resolved.enabled("with-matlab"));
  }

  #[test]
  fn dependent_option_forced_off_without_prerequisite() {
    let resolved = resolve(&specs(), &overrides(&[("with-mex-debug", OptionValue::Bool(true))])).unwrap();
    assert!(!resolved.enabled("with-mex-debug"));
    assert_eq!(resolved.advisories.len(), 1);
    assert_eq!(resolved.advisories[0].level, AdvisoryLevel::Notice);
  }

  #[test]
  fn dependent_option_kept_with_prerequisite() {
    let resolved = resolve(
      &specs(),
      &overrides(&[
        ("with-mex-debug", OptionValue::Bool(true)),
        ("with-matlab", OptionValue::Bool(true)),
      ]),
    )
    .unwrap();
    assert!(resolved.enabled("with-mex-debug"));
    assert!(resolved.advisories.is_empty());
  }

  #[test]
  fn enum_values_are_checked() {
    let resolved = resolve(&specs(), &overrides(&[("opt-level", OptionValue::raw("O3"))])).unwrap();
    assert_eq!(resolved.choice("opt-level"), Some("O3"));

    let err = resolve(&specs(), &overrides(&[("opt-level", OptionValue::raw("O9"))])).unwrap_err();
    assert!(matches!(err, ResolveError::InvalidValue { .. }));

    let err = resolve(&specs(), &overrides(&[("with-single", OptionValue::raw("O3"))])).unwrap_err();
    assert!(matches!(err, ResolveError::InvalidValue { .. }));
  }

  #[test]
  fn invalid_declarations_are_rejected() {
    let dup = vec![OptionSpec::boolean("a", ""), OptionSpec::boolean("a", "")];
    assert!(matches!(validate_specs(&dup), Err(ResolveError::InvalidSpec { .. })));

    let dangling = vec![OptionSpec::boolean("a", "").exclusive_with("b")];
    assert!(matches!(validate_specs(&dangling), Err(ResolveError::InvalidSpec { .. })));

    let selfref = vec![OptionSpec::boolean("a", "").requires("a")];
    assert!(matches!(validate_specs(&selfref), Err(ResolveError::InvalidSpec { .. })));

    let bad_default = vec![OptionSpec::choice("a", "", &["x"], "y")];
    assert!(matches!(validate_specs(&bad_default), Err(ResolveError::InvalidSpec { .. })));
  }

  #[test]
  fn raw_values_follow_the_option_kind() {
    let resolved = resolve(&specs(), &overrides(&[("with-matlab", OptionValue::raw("yes"))])).unwrap();
    assert!(resolved.enabled("with-matlab"));
    let resolved = resolve(&specs(), &overrides(&[("with-matlab", OptionValue::raw("off"))])).unwrap();
    assert!(!resolved.enabled("with-matlab"));

    let toggles = vec![OptionSpec::choice("color", "", &["auto", "yes", "no"], "auto")];
    let resolved = resolve(&toggles, &overrides(&[("color", OptionValue::raw("yes"))])).unwrap();
    assert_eq!(resolved.choice("color"), Some("yes"));
    let resolved = resolve(&toggles, &overrides(&[("color", OptionValue::raw("no"))])).unwrap();
    assert_eq!(resolved.choice("color"), Some("no"));

    let err = resolve(&toggles, &overrides(&[("color", OptionValue::Bool(true))])).unwrap_err();
    assert!(matches!(err, ResolveError::InvalidValue { .. }));
  }
}
