//! `check` command: load a script directory offline and report what would hook.
//!
//! # Responsibility
//! - Run discovery, context creation and handler registration exactly as the
//!   attach sequence does, without touching any process memory.
//! - Optionally fold a sample value through one point's subscribers.

use hookscript_core::extension::capability::all_capabilities;
use hookscript_core::{
    load_extensions, BootstrapError, HookConfig, HookValue, LoadedExtensions, ResultPolicy,
    RhaiContext, RhaiScriptEngine,
};
use hookscript_ffi::{game_point_names, game_point_policy};
use std::error::Error;
use std::fmt::{Display, Formatter, Write as _};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub struct CheckOptions {
    pub script_dir: PathBuf,
    pub extension: String,
    pub hooks: Vec<String>,
    pub simulate: Option<Simulation>,
}

/// One `NAME=VALUE` fold request with its leading call arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct Simulation {
    pub hook: String,
    pub value: HookValue,
    pub args: Vec<HookValue>,
}

impl Simulation {
    /// Parses `NAME=VALUE`; `args` are parsed as literals.
    pub fn parse(request: &str, args: &[String]) -> Result<Self, CheckError> {
        let (hook, value) = request
            .split_once('=')
            .filter(|(hook, _)| !hook.trim().is_empty())
            .ok_or_else(|| CheckError::InvalidSimulation(request.to_string()))?;
        Ok(Self {
            hook: hook.trim().to_string(),
            value: HookValue::parse_literal(value),
            args: args.iter().map(|arg| HookValue::parse_literal(arg)).collect(),
        })
    }
}

#[derive(Debug)]
pub enum CheckError {
    MissingScriptDir(PathBuf),
    InvalidSimulation(String),
    UnknownHook(String),
    Bootstrap(BootstrapError),
}

impl Display for CheckError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingScriptDir(path) => {
                write!(f, "script directory `{}` does not exist", path.display())
            }
            Self::InvalidSimulation(request) => {
                write!(f, "expected --simulate NAME=VALUE, got `{request}`")
            }
            Self::UnknownHook(hook) => write!(f, "hook `{hook}` is not being checked"),
            Self::Bootstrap(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CheckError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Bootstrap(err) => Some(err),
            _ => None,
        }
    }
}

/// Outcome of one check run.
pub struct CheckReport {
    hooks: Vec<String>,
    extensions: LoadedExtensions<RhaiContext>,
    simulated: Option<(Simulation, HookValue)>,
}

impl CheckReport {
    pub fn extensions(&self) -> &LoadedExtensions<RhaiContext> {
        &self.extensions
    }

    /// Simulation request and the value it folded to.
    pub fn simulated(&self) -> Option<&(Simulation, HookValue)> {
        self.simulated.as_ref()
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for capability in all_capabilities() {
            let _ = writeln!(
                out,
                "capability {}: {}",
                capability.as_str(),
                capability.description()
            );
        }
        let contexts = self.extensions.contexts();
        let _ = writeln!(out, "scripts loaded: {}", contexts.len());
        for (id, context) in contexts.iter() {
            let _ = writeln!(
                out,
                "  [{}] {} handlers={}",
                id.index(),
                context.path().display(),
                context.handlers().join(",")
            );
        }
        for failure in self.extensions.failures() {
            let _ = writeln!(out, "  failed: {failure}");
        }

        let _ = writeln!(out, "hooks:");
        for (hook, group) in self
            .hooks
            .iter()
            .zip(self.extensions.subscriptions().groups())
        {
            let members: Vec<String> = group
                .contexts()
                .iter()
                .map(|id| id.index().to_string())
                .collect();
            let state = if group.is_empty() {
                "untouched".to_string()
            } else {
                format!("subscribers=[{}]", members.join(","))
            };
            let _ = writeln!(out, "  {hook}: {state}");
        }

        if let Some((simulation, result)) = &self.simulated {
            let _ = writeln!(
                out,
                "simulate {}: {} -> {}",
                simulation.hook, simulation.value, result
            );
        }
        out
    }
}

pub fn run_check(options: &CheckOptions) -> Result<CheckReport, CheckError> {
    let hooks: Vec<String> = if options.hooks.is_empty() {
        game_point_names().into_iter().map(str::to_string).collect()
    } else {
        options.hooks.clone()
    };

    let config = HookConfig {
        script_dir: options.script_dir.clone(),
        script_extension: options.extension.clone(),
        ..HookConfig::default()
    };
    let names: Vec<&str> = hooks.iter().map(String::as_str).collect();
    let extensions = load_extensions(&config, &RhaiScriptEngine::default(), &names)
        .map_err(CheckError::Bootstrap)?
        .ok_or_else(|| CheckError::MissingScriptDir(options.script_dir.clone()))?;

    let simulated = match &options.simulate {
        Some(simulation) => {
            let index = hooks
                .iter()
                .position(|hook| *hook == simulation.hook)
                .ok_or_else(|| CheckError::UnknownHook(simulation.hook.clone()))?;
            let result = match game_point_policy(&simulation.hook) {
                Some(ResultPolicy::Notify) => {
                    extensions.notify(index, &simulation.args, &simulation.value);
                    simulation.value.clone()
                }
                _ => extensions.fold(index, &simulation.args, simulation.value.clone()),
            };
            Some((simulation.clone(), result))
        }
        None => None,
    };

    Ok(CheckReport {
        hooks,
        extensions,
        simulated,
    })
}

#[cfg(test)]
mod tests {
    use super::{run_check, CheckError, CheckOptions, Simulation};
    use hookscript_core::HookValue;
    use std::path::Path;

    fn options(dir: &Path) -> CheckOptions {
        CheckOptions {
            script_dir: dir.to_path_buf(),
            extension: "rhai".to_string(),
            hooks: Vec::new(),
            simulate: None,
        }
    }

    #[test]
    fn parses_simulation_requests() {
        let simulation =
            Simulation::parse("Monster_LaunchAction=true", &["0x10".to_string(), "12".to_string()])
                .expect("valid simulation");
        assert_eq!(simulation.hook, "Monster_LaunchAction");
        assert_eq!(simulation.value, HookValue::Bool(true));
        assert_eq!(simulation.args[1], HookValue::Int(12));
        assert!(matches!(
            Simulation::parse("=true", &[]),
            Err(CheckError::InvalidSimulation(_))
        ));
    }

    #[test]
    fn reports_subscribers_per_game_point() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join("claw.rhai"),
            "Hooks.Monster_CanClawTurn = |monster, result| !result;",
        )
        .expect("write script");
        std::fs::write(dir.path().join("broken.rhai"), "Hooks.Quest_Count = |count| {")
            .expect("write broken script");

        let report = run_check(&options(dir.path())).expect("check runs");
        let rendered = report.render();
        assert!(rendered.contains("capability Log:"));
        assert!(rendered.contains("scripts loaded: 1"));
        assert!(rendered.contains("Monster_CanClawTurn: subscribers=[0]"));
        assert!(rendered.contains("Quest_Count: untouched"));
        assert!(rendered.contains("failed:"));
    }

    #[test]
    fn simulates_fold_through_subscribers() {
        let dir = tempfile::tempdir().expect("temp dir");
        std::fs::write(
            dir.path().join("a.rhai"),
            "Hooks.Monster_LaunchAction = |monster, action, result| action != 12 && result;",
        )
        .expect("write script");

        let mut opts = options(dir.path());
        opts.simulate = Some(
            Simulation::parse("Monster_LaunchAction=true", &["1".to_string(), "12".to_string()])
                .expect("valid simulation"),
        );
        let report = run_check(&opts).expect("check runs");
        let (_, result) = report.simulated().expect("simulation ran");
        assert_eq!(*result, HookValue::Bool(false));
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let err = run_check(&options(&dir.path().join("absent")))
            .err()
            .expect("missing dir must fail");
        assert!(matches!(err, CheckError::MissingScriptDir(_)));
    }
}
