//! Per-run outcome report.
//!
//! Collects everything that happened to each object: geometry rejections,
//! unplaced ids, solver anomalies and the delivery result of the handoff.

use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::geometry::Extraction;
use crate::handoff::{HandoffError, HandoffSummary};
use crate::model::PickPose;
use crate::planner::LayoutPlan;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GeometryRejection {
    pub id: usize,
    pub error: String,
}

/// How the handoff ended.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Delivery {
    Completed {
        served: usize,
        attempts: u32,
        disconnects: u32,
    },
    RetryExhausted {
        attempts: u32,
        served: usize,
        undelivered: Vec<usize>,
    },
}

impl Delivery {
    pub fn from_outcome(outcome: &Result<HandoffSummary, HandoffError>) -> Self {
        match outcome {
            Ok(summary) => Delivery::Completed {
                served: summary.served,
                attempts: summary.attempts,
                disconnects: summary.disconnects,
            },
            Err(HandoffError::RetryExhausted {
                attempts,
                served,
                undelivered,
            }) => Delivery::RetryExhausted {
                attempts: *attempts,
                served: *served,
                undelivered: undelivered.clone(),
            },
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct RunReport {
    pub detections: usize,
    pub picks: Vec<PickPose>,
    pub geometry_rejections: Vec<GeometryRejection>,
    pub plan: LayoutPlan,
    pub delivery: Delivery,
}

impl RunReport {
    pub fn new(detections: usize, extraction: &Extraction, plan: LayoutPlan, delivery: Delivery) -> Self {
        Self {
            detections,
            picks: extraction.poses.clone(),
            geometry_rejections: extraction
                .rejected
                .iter()
                .map(|(id, err)| GeometryRejection {
                    id: *id,
                    error: err.to_string(),
                })
                .collect(),
            plan,
            delivery,
        }
    }

    /// Number of objects that did not reach the controller.
    pub fn not_delivered(&self) -> usize {
        let undelivered = match &self.delivery {
            Delivery::Completed { .. } => 0,
            Delivery::RetryExhausted { undelivered, .. } => undelivered.len(),
        };
        self.geometry_rejections.len() + self.plan.unplaced.len() + undelivered
    }

    pub fn log_summary(&self) {
        info!(
            detections = self.detections,
            picks = self.picks.len(),
            placed = self.plan.drops.len(),
            not_delivered = self.not_delivered(),
            "run finished"
        );
        for rejection in &self.geometry_rejections {
            warn!(id = rejection.id, error = %rejection.error, "not delivered: invalid geometry");
        }
        for unplaced in &self.plan.unplaced {
            warn!(id = unplaced.id, reason = %unplaced.reason, "not delivered: unplaced");
        }
        if let Delivery::RetryExhausted { undelivered, .. } = &self.delivery {
            warn!(?undelivered, "not delivered: retry ceiling reached");
        }
    }

    pub fn write_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

/// Logs the pick table and the drop table before serving.
pub fn log_plan(picks: &[PickPose], plan: &LayoutPlan) {
    for pick in picks {
        info!(
            id = pick.id,
            x = pick.center.x,
            y = pick.center.y,
            angle = pick.angle,
            width = pick.width,
            height = pick.height,
            "pick"
        );
    }
    for drop in &plan.drops {
        info!(
            id = drop.id,
            x = drop.drop.x,
            y = drop.drop.y,
            angle = drop.angle.degrees(),
            length = drop.length,
            height = drop.height,
            "drop"
        );
    }
}
