//! Built-in autonomous routine plans.
//!
//! A plan is the data half of a routine: which thresholds exist and what each
//! stage is called. Callers turn a plan into a live scheduler with
//! [`register_plan`], supplying the action for every stage.

use crate::stages::{Seconds, Stage, StageRegistryError, StageScheduler};

/// One stage of a plan.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StagePlan {
    /// Lowest remaining time at which the stage still runs.
    pub threshold: f64,
    /// Short operator-facing name.
    pub label: &'static str,
}

impl StagePlan {
    pub const fn new(threshold: f64, label: &'static str) -> Self {
        Self { threshold, label }
    }

    pub const fn threshold(&self) -> Seconds {
        Seconds::new(self.threshold)
    }
}

/// Named list of stages, written in chronological order (highest threshold first).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RoutinePlan {
    pub name: &'static str,
    pub description: &'static str,
    pub stages: &'static [StagePlan],
}

impl RoutinePlan {
    /// Finds the stage registered at `threshold`.
    pub fn stage_at(&self, threshold: Seconds) -> Option<&'static StagePlan> {
        self.stages
            .iter()
            .find(|stage| stage.threshold() == threshold)
    }
}

/// Drive off the starting line and hold position.
pub const DRIVE_PLAN: RoutinePlan = RoutinePlan {
    name: "drive",
    description: "leave the starting zone, then hold position",
    stages: &[
        StagePlan::new(11.0, "drive-forward"),
        StagePlan::new(0.0, "hold-position"),
    ],
};

/// Score a preloaded game piece, then leave the zone.
pub const SCORE_PLAN: RoutinePlan = RoutinePlan {
    name: "score",
    description: "raise arm, score preload, back out, stow",
    stages: &[
        StagePlan::new(13.0, "raise-arm"),
        StagePlan::new(11.0, "release-piece"),
        StagePlan::new(6.0, "drive-backward"),
        StagePlan::new(0.0, "stow-arm"),
    ],
};

/// Every plan the controller knows about.
pub const ROUTINE_PLANS: &[RoutinePlan] = &[DRIVE_PLAN, SCORE_PLAN];

/// Looks up a plan by name, ignoring ASCII case.
pub fn find(name: &str) -> Option<&'static RoutinePlan> {
    ROUTINE_PLANS
        .iter()
        .find(|plan| plan.name.eq_ignore_ascii_case(name))
}

/// Registers every stage of `plan`, building each action with `make_action`.
pub fn register_plan<A, F, const CAPACITY: usize>(
    scheduler: &mut StageScheduler<A, CAPACITY>,
    plan: &RoutinePlan,
    mut make_action: F,
) -> Result<(), StageRegistryError>
where
    A: Stage,
    F: FnMut(&'static StagePlan) -> A,
{
    for stage in plan.stages {
        scheduler.add_stage(stage.threshold(), make_action(stage))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop() {}

    #[test]
    fn plans_are_written_highest_threshold_first() {
        for plan in ROUTINE_PLANS {
            assert!(
                plan.stages
                    .windows(2)
                    .all(|pair| pair[0].threshold > pair[1].threshold),
                "plan {} out of order",
                plan.name
            );
        }
    }

    #[test]
    fn lookup_ignores_case() {
        assert_eq!(find("SCORE").map(|plan| plan.name), Some("score"));
        assert!(find("unknown").is_none());
    }

    #[test]
    fn registers_every_stage() {
        let mut scheduler: StageScheduler<fn(), 8> = StageScheduler::new();
        register_plan(&mut scheduler, &SCORE_PLAN, |_| noop as fn()).expect("registration");
        assert_eq!(scheduler.len(), SCORE_PLAN.stages.len());
        assert_eq!(
            SCORE_PLAN
                .stage_at(scheduler.target_for(10.0).expect("target"))
                .map(|stage| stage.label),
            Some("drive-backward")
        );
    }

    #[test]
    fn registration_stops_when_table_is_full() {
        let mut scheduler: StageScheduler<fn(), 2> = StageScheduler::new();
        let err = register_plan(&mut scheduler, &SCORE_PLAN, |_| noop as fn()).unwrap_err();
        assert_eq!(err, StageRegistryError::TableFull);
    }
}
