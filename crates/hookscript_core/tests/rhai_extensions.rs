use hookscript_core::{
    bootstrap, load_extensions, CapabilitySurface, DetourBackend, DetourError, HookConfig,
    HookValue, HostBindings, InterceptPoint, InterceptTable, LoadError, ResultPolicy,
    RhaiScriptEngine,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

const CLAW: &str = "Monster_CanClawTurn";
const LAUNCH: &str = "Monster_LaunchAction";
const QUEST: &str = "Quest_Count";

#[derive(Default)]
struct RecordingHost {
    messages: Mutex<Vec<String>>,
}

impl HostBindings for RecordingHost {
    fn show_message(&self, message: &str) {
        self.messages.lock().push(message.to_string());
    }
}

struct AcceptingBackend;

impl DetourBackend for AcceptingBackend {
    fn create(&mut self, target: usize, _detour: usize) -> Result<usize, DetourError> {
        Ok(target)
    }

    fn apply_queued(&mut self) -> Result<(), DetourError> {
        Ok(())
    }
}

fn game_points() -> InterceptTable {
    let mut table = InterceptTable::new();
    for (index, (name, policy)) in [
        (CLAW, ResultPolicy::Fold),
        (LAUNCH, ResultPolicy::Fold),
        (QUEST, ResultPolicy::Notify),
    ]
    .into_iter()
    .enumerate()
    {
        table
            .declare(InterceptPoint::new(name, 0x10_000 + index, 0x20_000 + index, policy))
            .expect("declare point");
    }
    table
}

fn config_for(dir: &Path) -> HookConfig {
    HookConfig {
        script_dir: dir.to_path_buf(),
        ..HookConfig::default()
    }
}

fn write(dir: &Path, file: &str, body: &str) {
    std::fs::write(dir.join(file), body).expect("write script");
}

#[test]
fn two_scripts_negating_claw_turn_cancel_out() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(
        dir.path(),
        "a.rhai",
        r#"
        Hooks.Monster_CanClawTurn = |monster, result| {
            Log::Info(`claw check for ${monster}`);
            !result
        };
        "#,
    );
    write(
        dir.path(),
        "b.rhai",
        r#"
        fn flip(monster, result) { !result }
        Hooks["Monster_CanClawTurn"] = Fn("flip");
        "#,
    );

    let runtime = bootstrap(
        &config_for(dir.path()),
        &RhaiScriptEngine::default(),
        game_points(),
        Box::new(AcceptingBackend),
    )
    .expect("bootstrap succeeds")
    .expect("script dir present");
    runtime.enable_all().expect("enable succeeds");

    let claw = runtime.points().find(CLAW).expect("claw declared");
    assert_eq!(runtime.installed(), &[claw]);
    let monster = HookValue::Pointer(0xdead_0000);
    assert!(runtime.fold(claw, &[monster.clone()], true));
    assert!(!runtime.fold(claw, &[monster], false));
}

#[test]
fn launch_action_handler_sees_action_id() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(
        dir.path(),
        "block_roar.rhai",
        r#"
        Hooks.Monster_LaunchAction = |monster, action, result| {
            if action == 12 { false } else { result }
        };
        "#,
    );

    let runtime = bootstrap(
        &config_for(dir.path()),
        &RhaiScriptEngine::default(),
        game_points(),
        Box::new(AcceptingBackend),
    )
    .expect("bootstrap succeeds")
    .expect("script dir present");
    let launch = runtime.points().find(LAUNCH).expect("launch declared");

    let monster = HookValue::Pointer(0x4000);
    assert!(!runtime.fold(launch, &[monster.clone(), HookValue::Int(12)], true));
    assert!(runtime.fold(launch, &[monster, HookValue::Int(3)], true));
}

#[test]
fn quest_count_notifies_and_keeps_original() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(
        dir.path(),
        "quests.rhai",
        r#"
        Hooks.Quest_Count = |count| {
            Game::ShowMessage(`quests: ${count}`);
            count + 100
        };
        "#,
    );
    let host = Arc::new(RecordingHost::default());
    let engine = RhaiScriptEngine::new(CapabilitySurface::new(host.clone()));

    let runtime = bootstrap(
        &config_for(dir.path()),
        &engine,
        game_points(),
        Box::new(AcceptingBackend),
    )
    .expect("bootstrap succeeds")
    .expect("script dir present");
    let quest = runtime.points().find(QUEST).expect("quest declared");

    assert_eq!(runtime.dispatch(quest, &[], 7_i32), 7);
    assert_eq!(*host.messages.lock(), vec!["quests: 7".to_string()]);
}

#[test]
fn throwing_handler_does_not_stop_later_scripts() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(
        dir.path(),
        "a.rhai",
        r#"Hooks.Monster_CanClawTurn = |monster, result| { throw "broken mod"; };"#,
    );
    write(
        dir.path(),
        "b.rhai",
        r#"Hooks.Monster_CanClawTurn = |monster, result| "not a bool";"#,
    );
    write(
        dir.path(),
        "c.rhai",
        r#"Hooks.Monster_CanClawTurn = |monster, result| !result;"#,
    );

    let runtime = bootstrap(
        &config_for(dir.path()),
        &RhaiScriptEngine::default(),
        game_points(),
        Box::new(AcceptingBackend),
    )
    .expect("bootstrap succeeds")
    .expect("script dir present");
    let claw = runtime.points().find(CLAW).expect("claw declared");

    assert!(!runtime.fold(claw, &[HookValue::Pointer(1)], true));
}

#[test]
fn broken_scripts_are_reported_without_subscriptions() {
    let dir = tempfile::tempdir().expect("temp dir");
    write(dir.path(), "a.rhai", "Hooks.Monster_CanClawTurn = |monster, result| {");
    write(
        dir.path(),
        "b.rhai",
        r#"
        Hooks.Quest_Count = |count| count;
        throw "refusing to load";
        "#,
    );
    write(dir.path(), "c.RHAI", "Hooks.Quest_Count = |count| count;");

    let loaded = load_extensions(
        &config_for(dir.path()),
        &RhaiScriptEngine::default(),
        &[CLAW, QUEST],
    )
    .expect("load succeeds")
    .expect("script dir present");

    assert_eq!(loaded.contexts().len(), 1);
    assert!(matches!(
        loaded.failures(),
        [LoadError::Parse { .. }, LoadError::Execute { .. }]
    ));
    let quest: Vec<usize> = loaded
        .subscriptions()
        .subscribers_for(QUEST)
        .map(|id| id.index())
        .collect();
    assert_eq!(quest, vec![0]);
    assert_eq!(loaded.subscriptions().subscribers_for(CLAW).count(), 0);
}
