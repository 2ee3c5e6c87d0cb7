//! Intercept points exposed to scripts and their trampolines.
//!
//! # Responsibility
//! - Declare the known game functions with their result policies.
//! - Provide one native-signature trampoline per point that calls through to
//!   the original exactly once, then hands the result to dispatch.
//!
//! # Invariants
//! - Trampolines never unwind.
//! - A trampoline is only reachable after its point was installed and the
//!   runtime published, so routing cannot fail in a live process. If it ever
//!   does, the original cannot be reached; the neutral value is returned and
//!   the miss is logged at `error`.
//! - Points whose target is not configured are not declared.

use crate::api::runtime;
use crate::host::resolve_address;
use hookscript_core::{
    HookConfig, HookId, HookRuntime, HookValue, InstallError, InterceptPoint, InterceptTable,
    ResultPolicy, RhaiContext,
};
use log::{error, info, warn};
use std::ffi::c_void;

pub const MONSTER_CAN_CLAW_TURN: &str = "Monster_CanClawTurn";
pub const MONSTER_LAUNCH_ACTION: &str = "Monster_LaunchAction";
pub const QUEST_COUNT: &str = "Quest_Count";

type CanClawTurnFn = unsafe extern "C" fn(*mut c_void) -> bool;
type LaunchActionFn = unsafe extern "C" fn(*mut c_void, i32) -> bool;
type QuestCountFn = unsafe extern "C" fn() -> i32;

struct GamePoint {
    name: &'static str,
    policy: ResultPolicy,
    detour: usize,
}

fn game_points() -> [GamePoint; 3] {
    [
        GamePoint {
            name: MONSTER_CAN_CLAW_TURN,
            policy: ResultPolicy::Fold,
            detour: monster_can_claw_turn as CanClawTurnFn as usize,
        },
        GamePoint {
            name: MONSTER_LAUNCH_ACTION,
            policy: ResultPolicy::Fold,
            detour: monster_launch_action as LaunchActionFn as usize,
        },
        GamePoint {
            name: QUEST_COUNT,
            policy: ResultPolicy::Notify,
            detour: quest_count as QuestCountFn as usize,
        },
    ]
}

/// Names of every game point, in declaration order.
pub fn game_point_names() -> Vec<&'static str> {
    game_points().iter().map(|point| point.name).collect()
}

/// Result policy of the game point called `name`.
pub fn game_point_policy(name: &str) -> Option<ResultPolicy> {
    game_points()
        .iter()
        .find(|point| point.name == name)
        .map(|point| point.policy)
}

/// Declares every game point whose target offset is configured.
pub fn declare_points(config: &HookConfig, base: usize) -> Result<InterceptTable, InstallError> {
    let mut table = InterceptTable::new();
    for point in game_points() {
        let Some(target) = config
            .target_offset(point.name)
            .and_then(|offset| resolve_address(base, offset))
        else {
            warn!(
                "event=hook_unresolved module=game hook={} reason=no_target",
                point.name
            );
            continue;
        };
        table.declare(InterceptPoint::new(
            point.name,
            target,
            point.detour,
            point.policy,
        ))?;
        info!(
            "event=hook_declared module=game hook={} target={target:#x}",
            point.name
        );
    }
    Ok(table)
}

fn route(name: &str) -> Option<(&'static HookRuntime<RhaiContext>, HookId, usize)> {
    let routed = runtime().and_then(|runtime| {
        let id = runtime.points().find(name)?;
        let call_through = runtime.call_through(id)?;
        Some((runtime, id, call_through))
    });
    if routed.is_none() {
        error!("event=trampoline module=game status=error hook={name} reason=unrouted");
    }
    routed
}

unsafe extern "C" fn monster_can_claw_turn(monster: *mut c_void) -> bool {
    let Some((runtime, id, call_through)) = route(MONSTER_CAN_CLAW_TURN) else {
        return false;
    };
    // SAFETY: the backend produced `call_through` for a target with this signature.
    let original = std::mem::transmute::<usize, CanClawTurnFn>(call_through);
    let result = original(monster);
    runtime.dispatch(id, &[HookValue::pointer(monster.cast_const())], result)
}

unsafe extern "C" fn monster_launch_action(monster: *mut c_void, action_id: i32) -> bool {
    let Some((runtime, id, call_through)) = route(MONSTER_LAUNCH_ACTION) else {
        return false;
    };
    // SAFETY: see `monster_can_claw_turn`.
    let original = std::mem::transmute::<usize, LaunchActionFn>(call_through);
    let result = original(monster, action_id);
    runtime.dispatch(
        id,
        &[
            HookValue::pointer(monster.cast_const()),
            HookValue::from(action_id),
        ],
        result,
    )
}

unsafe extern "C" fn quest_count() -> i32 {
    let Some((runtime, id, call_through)) = route(QUEST_COUNT) else {
        return 0;
    };
    // SAFETY: see `monster_can_claw_turn`.
    let original = std::mem::transmute::<usize, QuestCountFn>(call_through);
    let result = original();
    runtime.dispatch(id, &[], result)
}
