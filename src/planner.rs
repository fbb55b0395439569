//! Reconciles solver placements with the detected objects.
//!
//! The planner hands every pick pose to the solver as a packing request,
//! then matches the placements back by id. Matching decides the drop angle
//! and the drop point; ids the solver did not place are reported as
//! unplaced instead of disappearing.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use tracing::{info, warn};

use crate::model::{BinSpec, DropAngle, DropPose, HandoffItem, PackingRequest, PickPose, Placement};
use crate::solver::PackingSolver;

/// Why an object has no drop pose.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum UnplacedReason {
    /// The solver did not return a placement for the id.
    DidNotFit,
    /// The solver placed the id in a bin other than the configured one.
    OutsideConfiguredBin { bin_index: usize },
}

impl std::fmt::Display for UnplacedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnplacedReason::DidNotFit => write!(f, "object did not fit in the available bin"),
            UnplacedReason::OutsideConfiguredBin { bin_index } => {
                write!(f, "object was placed in unavailable bin {}", bin_index)
            }
        }
    }
}

/// Object that received no drop pose.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct UnplacedObject {
    pub id: usize,
    #[serde(flatten)]
    pub reason: UnplacedReason,
}

/// Inconsistencies in the solver output that were tolerated.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlacementAnomaly {
    /// The id was placed more than once; only the first placement is used.
    DuplicatePlacement { id: usize },
    /// The id matches no request.
    UnknownId { id: usize },
}

/// Drop poses plus everything the solver could not place.
#[derive(Clone, Debug, Default, Serialize)]
pub struct LayoutPlan {
    /// Sorted by increasing id.
    pub drops: Vec<DropPose>,
    /// Sorted by increasing id.
    pub unplaced: Vec<UnplacedObject>,
    /// In solver-return order.
    pub anomalies: Vec<PlacementAnomaly>,
}

impl LayoutPlan {
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }

    pub fn drop_for(&self, id: usize) -> Option<&DropPose> {
        self.drops
            .binary_search_by_key(&id, |d| d.id)
            .ok()
            .map(|idx| &self.drops[idx])
    }

    /// Pairs pick poses with their drop poses in increasing id order.
    ///
    /// Pick poses without a drop pose are left out, so positions in the
    /// schedule are not ids.
    pub fn schedule(&self, picks: &[PickPose]) -> Vec<HandoffItem> {
        let mut items: Vec<HandoffItem> = picks
            .iter()
            .filter_map(|pick| {
                self.drop_for(pick.id).map(|drop| HandoffItem {
                    pick: *pick,
                    drop: *drop,
                })
            })
            .collect();
        items.sort_by_key(HandoffItem::id);
        items
    }
}

/// Builds drop poses for one bin with an injected solver.
pub struct LayoutPlanner<S> {
    solver: S,
    bin: BinSpec,
}

impl<S: PackingSolver> LayoutPlanner<S> {
    pub fn new(solver: S, bin: BinSpec) -> Self {
        Self { solver, bin }
    }

    /// Plans drop poses for the given pick poses.
    ///
    /// # Parameters
    /// * `picks` - Pick poses in detection order
    ///
    /// # Returns
    /// A `LayoutPlan` whose drop poses share the pick poses' id space
    pub fn plan(&self, picks: &[PickPose]) -> LayoutPlan {
        let requests: Vec<PackingRequest> = picks.iter().map(PackingRequest::from_pick_pose).collect();
        let placements = self.solver.pack(&requests, self.bin);
        reconcile(&requests, &placements)
    }
}

/// Matches placements to requests by id.
///
/// The first placement of an id wins; later duplicates and unknown ids are
/// recorded as anomalies.
pub fn reconcile(requests: &[PackingRequest], placements: &[Placement]) -> LayoutPlan {
    let by_id: HashMap<usize, &PackingRequest> = requests.iter().map(|r| (r.id, r)).collect();
    let mut matched: BTreeMap<usize, &Placement> = BTreeMap::new();
    let mut anomalies = Vec::new();

    for placement in placements {
        if !by_id.contains_key(&placement.id) {
            warn!(id = placement.id, "solver returned a placement for an unknown id");
            anomalies.push(PlacementAnomaly::UnknownId { id: placement.id });
            continue;
        }
        if matched.contains_key(&placement.id) {
            warn!(
                id = placement.id,
                "solver placed the same id twice, keeping the first placement"
            );
            anomalies.push(PlacementAnomaly::DuplicatePlacement { id: placement.id });
            continue;
        }
        matched.insert(placement.id, placement);
    }

    let mut drops = Vec::with_capacity(matched.len());
    let mut unplaced = Vec::new();
    let mut ordered: Vec<&PackingRequest> = requests.iter().collect();
    ordered.sort_by_key(|r| r.id);

    for request in ordered {
        let Some(placement) = matched.get(&request.id) else {
            info!(id = request.id, "object did not fit in the bin");
            unplaced.push(UnplacedObject {
                id: request.id,
                reason: UnplacedReason::DidNotFit,
            });
            continue;
        };
        if placement.bin_index != 0 {
            warn!(
                id = request.id,
                bin_index = placement.bin_index,
                "object placed outside the configured bin"
            );
            unplaced.push(UnplacedObject {
                id: request.id,
                reason: UnplacedReason::OutsideConfiguredBin {
                    bin_index: placement.bin_index,
                },
            });
            continue;
        }

        let drop = drop_pose(request, placement);
        match drop.angle {
            DropAngle::Aligned => info!(id = request.id, "not rotated"),
            DropAngle::Rotated => info!(id = request.id, "rotated"),
        }
        drops.push(drop);
    }

    LayoutPlan {
        drops,
        unplaced,
        anomalies,
    }
}

fn drop_pose(request: &PackingRequest, placement: &Placement) -> DropPose {
    // Solvers echo the request's sides, so a swap shows up as an exact mismatch.
    let angle = if placement.width != request.width {
        DropAngle::Rotated
    } else {
        DropAngle::Aligned
    };
    DropPose {
        id: request.id,
        drop: placement.rect().center(),
        angle,
        length: request.width,
        height: request.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point2;

    /// Returns a fixed placement list regardless of the input.
    struct ScriptedSolver {
        placements: Vec<Placement>,
    }

    impl PackingSolver for ScriptedSolver {
        fn pack(&self, _requests: &[PackingRequest], _bin: BinSpec) -> Vec<Placement> {
            self.placements.clone()
        }
    }

    fn pick(id: usize, width: f64, height: f64) -> PickPose {
        PickPose {
            id,
            center: Point2::new(10.0 * id as f64, 5.0),
            width,
            height,
            angle: 0.0,
        }
    }

    fn placed(id: usize, x: f64, y: f64, width: f64, height: f64) -> Placement {
        Placement {
            bin_index: 0,
            x,
            y,
            width,
            height,
            id,
        }
    }

    fn planner(placements: Vec<Placement>) -> LayoutPlanner<ScriptedSolver> {
        LayoutPlanner::new(
            ScriptedSolver { placements },
            BinSpec::new(25.0, 25.0).unwrap(),
        )
    }

    #[test]
    fn rotated_placement_yields_quarter_turn_and_center() {
        let picks = vec![pick(3, 10.0, 4.0)];
        let plan = planner(vec![placed(3, 0.0, 0.0, 4.0, 10.0)]).plan(&picks);

        assert!(plan.is_complete());
        let drop = plan.drops[0];
        assert_eq!(drop.angle, DropAngle::Rotated);
        assert_eq!(drop.angle.degrees(), 90.0);
        assert_eq!(drop.drop, Point2::new(2.0, 5.0));
        assert_eq!(drop.length, 10.0);
        assert_eq!(drop.height, 4.0);
    }

    #[test]
    fn unrotated_placement_keeps_angle_zero() {
        let picks = vec![pick(0, 3.0, 2.0)];
        let plan = planner(vec![placed(0, 4.0, 6.0, 3.0, 2.0)]).plan(&picks);

        let drop = plan.drops[0];
        assert_eq!(drop.angle, DropAngle::Aligned);
        assert_eq!(drop.angle.degrees(), 0.0);
        assert_eq!(drop.drop, Point2::new(5.5, 7.0));
    }

    #[test]
    fn drops_follow_id_order_not_solver_order() {
        let picks = vec![pick(0, 1.0, 1.0), pick(1, 2.0, 2.0), pick(2, 3.0, 3.0)];
        let plan = planner(vec![
            placed(2, 0.0, 0.0, 3.0, 3.0),
            placed(0, 3.0, 0.0, 1.0, 1.0),
            placed(1, 4.0, 0.0, 2.0, 2.0),
        ])
        .plan(&picks);

        let ids: Vec<usize> = plan.drops.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![0, 1, 2]);
    }

    #[test]
    fn missing_ids_are_reported_as_unplaced() {
        let picks = vec![pick(0, 1.0, 1.0), pick(1, 30.0, 2.0), pick(2, 3.0, 3.0)];
        let plan = planner(vec![
            placed(2, 0.0, 0.0, 3.0, 3.0),
            placed(0, 3.0, 0.0, 1.0, 1.0),
        ])
        .plan(&picks);

        assert!(!plan.is_complete());
        assert_eq!(
            plan.unplaced,
            vec![UnplacedObject {
                id: 1,
                reason: UnplacedReason::DidNotFit
            }]
        );

        let schedule = plan.schedule(&picks);
        let ids: Vec<usize> = schedule.iter().map(HandoffItem::id).collect();
        assert_eq!(ids, vec![0, 2]);
        assert_eq!(schedule[1].drop.id, schedule[1].pick.id);
    }

    #[test]
    fn duplicate_placement_keeps_first_match() {
        let picks = vec![pick(0, 2.0, 1.0)];
        let plan = planner(vec![
            placed(0, 0.0, 0.0, 2.0, 1.0),
            placed(0, 10.0, 10.0, 1.0, 2.0),
        ])
        .plan(&picks);

        assert_eq!(plan.drops.len(), 1);
        assert_eq!(plan.drops[0].angle, DropAngle::Aligned);
        assert_eq!(plan.drops[0].drop, Point2::new(1.0, 0.5));
        assert_eq!(
            plan.anomalies,
            vec![PlacementAnomaly::DuplicatePlacement { id: 0 }]
        );
    }

    #[test]
    fn unknown_ids_are_recorded_and_ignored() {
        let picks = vec![pick(0, 2.0, 1.0)];
        let plan = planner(vec![
            placed(7, 0.0, 0.0, 2.0, 1.0),
            placed(0, 2.0, 0.0, 2.0, 1.0),
        ])
        .plan(&picks);

        assert_eq!(plan.drops.len(), 1);
        assert_eq!(plan.anomalies, vec![PlacementAnomaly::UnknownId { id: 7 }]);
    }

    #[test]
    fn placement_in_other_bin_is_unplaced() {
        let picks = vec![pick(0, 2.0, 1.0)];
        let mut overflow = placed(0, 0.0, 0.0, 2.0, 1.0);
        overflow.bin_index = 1;
        let plan = planner(vec![overflow]).plan(&picks);

        assert!(plan.drops.is_empty());
        assert_eq!(
            plan.unplaced[0].reason,
            UnplacedReason::OutsideConfiguredBin { bin_index: 1 }
        );
    }

    #[test]
    fn square_object_is_never_reported_rotated() {
        let picks = vec![pick(0, 2.0, 2.0)];
        let plan = planner(vec![placed(0, 0.0, 0.0, 2.0, 2.0)]).plan(&picks);
        assert_eq!(plan.drops[0].angle, DropAngle::Aligned);
    }

    #[test]
    fn nearly_square_object_swapped_by_solver_is_rotated() {
        let picks = vec![pick(0, 2.0, 2.0000001)];
        let plan = planner(vec![placed(0, 0.0, 0.0, 2.0000001, 2.0)]).plan(&picks);
        assert_eq!(plan.drops[0].angle, DropAngle::Rotated);
    }

    #[test]
    fn planner_with_real_solver_places_everything_that_fits() {
        use crate::solver::MaxRectsSolver;

        let picks = vec![pick(0, 4.0, 2.0), pick(1, 3.0, 3.0), pick(2, 40.0, 1.0)];
        let planner = LayoutPlanner::new(
            MaxRectsSolver::default(),
            BinSpec::new(25.0, 25.0).unwrap(),
        );
        let plan = planner.plan(&picks);

        let ids: Vec<usize> = plan.drops.iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![0, 1]);
        assert_eq!(plan.unplaced.len(), 1);
        assert_eq!(plan.unplaced[0].id, 2);
        assert!(plan.anomalies.is_empty());
    }
}
