#![cfg(any(target_arch = "x86", target_arch = "x86_64"))]

use hookscript_ffi::game::{MONSTER_CAN_CLAW_TURN, MONSTER_LAUNCH_ACTION, QUEST_COUNT};
use hookscript_ffi::host::module_base;
use hookscript_ffi::hookscript_attach;
use std::ffi::{c_void, CString};
use std::hint::black_box;
use std::path::Path;

type CanClawTurnFn = unsafe extern "C" fn(*mut c_void) -> bool;
type LaunchActionFn = unsafe extern "C" fn(*mut c_void, i32) -> bool;
type QuestCountFn = unsafe extern "C" fn() -> i32;

// Stand-ins for host functions. Bodies are kept large enough to patch.
#[inline(never)]
unsafe extern "C" fn host_can_claw_turn(monster: *mut c_void) -> bool {
    let mut acc = black_box(monster as usize);
    for step in 0..black_box(8_usize) {
        acc = black_box(acc.rotate_left(3) ^ step);
    }
    black_box(acc);
    !black_box(monster).is_null()
}

#[inline(never)]
unsafe extern "C" fn host_launch_action(monster: *mut c_void, action_id: i32) -> bool {
    let mut acc = black_box(action_id as usize);
    for step in 0..black_box(8_usize) {
        acc = black_box(acc.rotate_left(5) ^ step);
    }
    black_box(acc);
    !black_box(monster).is_null() && black_box(action_id) >= 0
}

#[inline(never)]
unsafe extern "C" fn host_quest_count() -> i32 {
    let mut acc = black_box(3_i32);
    for step in 0..black_box(8_i32) {
        acc = black_box(acc.wrapping_mul(7) ^ step);
    }
    black_box(acc);
    black_box(3)
}

fn offset_of(address: usize) -> u64 {
    (address - module_base()) as u64
}

fn write_config(root: &Path) -> CString {
    let scripts = root.join("scripts");
    std::fs::create_dir_all(&scripts).expect("create script dir");
    std::fs::write(
        scripts.join("a_claw.rhai"),
        "Hooks.Monster_CanClawTurn = |monster, result| !result;\n",
    )
    .expect("write claw script");
    std::fs::write(
        scripts.join("b_quests.rhai"),
        "Hooks.Quest_Count = |count| { Log::Info(`quests: ${count}`); count * 100 };\n",
    )
    .expect("write quest script");

    let claw = host_can_claw_turn as CanClawTurnFn as usize;
    let launch = host_launch_action as LaunchActionFn as usize;
    let quest = host_quest_count as QuestCountFn as usize;
    let config = format!(
        "script_dir = {scripts:?}\nlog_dir = {logs:?}\nlog_level = \"debug\"\n\n[targets]\n{MONSTER_CAN_CLAW_TURN} = {}\n{MONSTER_LAUNCH_ACTION} = {}\n{QUEST_COUNT} = {}\n",
        offset_of(claw),
        offset_of(launch),
        offset_of(quest),
        scripts = scripts.to_str().expect("UTF-8 script dir"),
        logs = root.join("logs").to_str().expect("UTF-8 log dir"),
    );
    let path = root.join("hookscript.toml");
    std::fs::write(&path, config).expect("write config");
    CString::new(path.to_str().expect("UTF-8 config path")).expect("config path has no NUL")
}

#[test]
fn attach_redirects_subscribed_host_functions() {
    let root = tempfile::tempdir().expect("temp dir");
    let config = write_config(root.path());

    let claw: CanClawTurnFn = black_box(host_can_claw_turn as CanClawTurnFn);
    let launch: LaunchActionFn = black_box(host_launch_action as LaunchActionFn);
    let quest: QuestCountFn = black_box(host_quest_count as QuestCountFn);
    let mut monster = 0_u8;
    let monster = &mut monster as *mut u8 as *mut c_void;

    // SAFETY: the stand-ins are plain functions with these signatures.
    unsafe {
        assert!(claw(monster));
        assert_eq!(quest(), 3);
    }

    // SAFETY: `config` is a valid NUL-terminated path.
    let status = unsafe { hookscript_attach(config.as_ptr()) };
    assert_eq!(status, 0);

    // SAFETY: after attach the entries jump into the trampolines, which keep
    // the native signatures.
    unsafe {
        assert!(!claw(monster));
        assert!(claw(std::ptr::null_mut()));
        // No script subscribes to LaunchAction, so it stays untouched.
        assert!(launch(monster, 4));
        assert_eq!(quest(), 3);
    }

    // SAFETY: same as above.
    assert_eq!(unsafe { hookscript_attach(config.as_ptr()) }, 0);
}
