//! Rhai-backed scripting collaborator.
//!
//! # Responsibility
//! - Give every script its own `Engine`, `AST` and `Scope`.
//! - Inject the capability surface as static modules (`Log::Info(..)`).
//! - Expose the `Hooks` object map as the handler namespace.
//!
//! # Invariants
//! - Handlers are function pointers stored under their exact hook name in
//!   `Hooks`; anything else under that key is treated as absent.
//! - The `Hooks` map is read fresh on every lookup, so handlers removed after
//!   load are observed as absent.

use crate::extension::capability::{
    CapabilitySurface, CAPABILITY_GAME, CAPABILITY_LOG, SCRIPT_LOG_TARGET,
};
use crate::extension::runtime::{HandlerError, LoadError, ScriptContext, ScriptEngine};
use crate::extension::source::SourceUnit;
use crate::model::value::HookValue;
use log::{debug, info};
use rhai::{Dynamic, Engine, FnPtr, ImmutableString, Map, Module, Scope, AST, INT};

/// Name of the handler namespace inside every context.
pub const HOOKS_NAMESPACE: &str = "Hooks";

/// Creates one isolated Rhai context per source unit.
#[derive(Debug, Clone, Default)]
pub struct RhaiScriptEngine {
    capabilities: CapabilitySurface,
}

impl RhaiScriptEngine {
    pub fn new(capabilities: CapabilitySurface) -> Self {
        Self { capabilities }
    }

    pub fn capabilities(&self) -> &CapabilitySurface {
        &self.capabilities
    }

    fn build_engine(&self, script: &str) -> Engine {
        let mut engine = Engine::new();
        install_capabilities(&mut engine, &self.capabilities);

        let print_script = script.to_string();
        engine.on_print(move |text| {
            info!(target: SCRIPT_LOG_TARGET, "[{print_script}] {text}");
        });
        let debug_script = script.to_string();
        engine.on_debug(move |text, _source, pos| {
            debug!(target: SCRIPT_LOG_TARGET, "[{debug_script}:{pos}] {text}");
        });
        engine
    }
}

impl ScriptEngine for RhaiScriptEngine {
    type Context = RhaiContext;

    fn create_context(&self, unit: &SourceUnit) -> Result<RhaiContext, LoadError> {
        let path = unit.path().to_path_buf();
        let source = std::fs::read_to_string(&path).map_err(|err| LoadError::Read {
            path: path.clone(),
            message: err.to_string(),
        })?;

        let engine = self.build_engine(&unit.display_name());
        let ast = engine.compile(&source).map_err(|err| LoadError::Parse {
            path: path.clone(),
            message: err.to_string(),
        })?;

        let mut scope = Scope::new();
        scope.push(HOOKS_NAMESPACE, Map::new());
        engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(|err| LoadError::Execute {
                path: path.clone(),
                message: err.to_string(),
            })?;

        Ok(RhaiContext { engine, ast, scope })
    }
}

/// One loaded script with its private engine and top-level namespace.
pub struct RhaiContext {
    engine: Engine,
    ast: AST,
    scope: Scope<'static>,
}

impl RhaiContext {
    /// Runs more code against this context's live top-level scope.
    ///
    /// Functions declared by the snippet are not retained; only scope
    /// mutations (for example `Hooks.remove("Quest_Count")`) persist.
    pub fn eval(&mut self, code: &str) -> Result<(), HandlerError> {
        self.engine
            .run_with_scope(&mut self.scope, code)
            .map_err(|err| HandlerError::Runtime(err.to_string()))
    }

    /// Names currently bound in the `Hooks` namespace, sorted.
    pub fn hook_names(&self) -> Vec<String> {
        self.scope
            .get_value::<Map>(HOOKS_NAMESPACE)
            .map(|hooks| hooks.keys().map(|key| key.to_string()).collect())
            .unwrap_or_default()
    }
}

impl std::fmt::Debug for RhaiContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RhaiContext")
            .field("hooks", &self.hook_names())
            .finish_non_exhaustive()
    }
}

impl ScriptContext for RhaiContext {
    type Handler = FnPtr;

    fn lookup(&self, name: &str) -> Option<FnPtr> {
        let hooks = self.scope.get_value::<Map>(HOOKS_NAMESPACE)?;
        hooks.get(name)?.clone().try_cast::<FnPtr>()
    }

    fn invoke(&mut self, handler: &FnPtr, args: Vec<HookValue>) -> Result<HookValue, HandlerError> {
        let args: Vec<Dynamic> = args.into_iter().map(to_dynamic).collect();
        let result = handler
            .call::<Dynamic>(&self.engine, &self.ast, args)
            .map_err(|err| HandlerError::Runtime(err.to_string()))?;
        from_dynamic(result)
    }
}

fn install_capabilities(engine: &mut Engine, surface: &CapabilitySurface) {
    let mut log = Module::new();
    let sink = surface.clone();
    log.set_native_fn("Debug", move |message: ImmutableString| {
        sink.log_debug(&message);
        Ok(())
    });
    let sink = surface.clone();
    log.set_native_fn("Info", move |message: ImmutableString| {
        sink.log_info(&message);
        Ok(())
    });
    let sink = surface.clone();
    log.set_native_fn("Warn", move |message: ImmutableString| {
        sink.log_warn(&message);
        Ok(())
    });
    let sink = surface.clone();
    log.set_native_fn("Error", move |message: ImmutableString| {
        sink.log_error(&message);
        Ok(())
    });
    engine.register_static_module(CAPABILITY_LOG, log.into());

    let mut game = Module::new();
    let host = surface.clone();
    game.set_native_fn("ShowMessage", move |message: ImmutableString| {
        host.show_message(&message);
        Ok(())
    });
    engine.register_static_module(CAPABILITY_GAME, game.into());
}

fn to_dynamic(value: HookValue) -> Dynamic {
    match value {
        HookValue::Unit => Dynamic::UNIT,
        HookValue::Bool(value) => Dynamic::from(value),
        HookValue::Int(value) => Dynamic::from(value as INT),
        HookValue::Float(value) => Dynamic::from(value),
        HookValue::Text(value) => Dynamic::from(value),
        HookValue::Pointer(value) => Dynamic::from(value as INT),
    }
}

fn from_dynamic(value: Dynamic) -> Result<HookValue, HandlerError> {
    if value.is_unit() {
        return Ok(HookValue::Unit);
    }
    if let Ok(value) = value.as_bool() {
        return Ok(HookValue::Bool(value));
    }
    if let Ok(value) = value.as_int() {
        return Ok(HookValue::Int(value));
    }
    if let Ok(value) = value.as_float() {
        return Ok(HookValue::Float(value));
    }
    if value.is_string() {
        return value
            .into_string()
            .map(HookValue::Text)
            .map_err(|found| HandlerError::Runtime(format!("unreadable string result: {found}")));
    }
    Err(HandlerError::ResultType {
        expected: "unit|bool|int|float|string",
        found: "script object",
    })
}
