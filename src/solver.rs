//! Packing-Solver für die 2D-Ablage der Objekte.
//!
//! Der Planer kennt nur das Trait `PackingSolver`: Rechtecke mit IDs und ein
//! Behälter gehen hinein, Platzierungen kommen heraus. Objekte, die nicht
//! passen, fehlen in der Ausgabe.
//!
//! Mitgeliefert wird `MaxRectsSolver`:
//! - Offline-Betrieb, Rechtecke nach Fläche absteigend sortiert
//! - Best-Short-Side-Fit über alle freien Maximal-Rechtecke
//! - optionale 90°-Drehung pro Rechteck

use std::cmp::Ordering;

use tracing::debug;

use crate::model::{BinSpec, PackingRequest, Placement};
use crate::types::{EPSILON_GENERAL, Rect};

/// Schnittstelle zum Packing-Solver.
///
/// Ein Solver darf Anfragen ablehnen; abgelehnte IDs tauchen in der Ausgabe
/// nicht auf.
pub trait PackingSolver {
    fn pack(&self, requests: &[PackingRequest], bin: BinSpec) -> Vec<Placement>;
}

/// Konfiguration für den MaxRects-Solver.
#[derive(Copy, Clone, Debug)]
pub struct SolverConfig {
    /// Erlaubt die 90°-Drehung einzelner Rechtecke
    pub allow_rotation: bool,
    /// Numerische Toleranz für Passungs-Vergleiche
    pub epsilon: f64,
}

impl SolverConfig {
    pub const DEFAULT_ALLOW_ROTATION: bool = true;
    pub const DEFAULT_EPSILON: f64 = EPSILON_GENERAL;

    /// Erstellt einen Builder für benutzerdefinierte Konfiguration.
    pub fn builder() -> SolverConfigBuilder {
        SolverConfigBuilder::default()
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            allow_rotation: Self::DEFAULT_ALLOW_ROTATION,
            epsilon: Self::DEFAULT_EPSILON,
        }
    }
}

/// Builder-Pattern für SolverConfig.
#[derive(Clone, Debug, Default)]
pub struct SolverConfigBuilder {
    config: SolverConfig,
}

impl SolverConfigBuilder {
    /// Setzt, ob Rechtecke gedreht werden dürfen.
    pub fn allow_rotation(mut self, allow: bool) -> Self {
        self.config.allow_rotation = allow;
        self
    }

    /// Setzt die numerische Toleranz.
    #[allow(dead_code)]
    pub fn epsilon(mut self, epsilon: f64) -> Self {
        self.config.epsilon = epsilon;
        self
    }

    /// Erstellt die finale Konfiguration.
    pub fn build(self) -> SolverConfig {
        self.config
    }
}

/// MaxRects-Solver mit Best-Short-Side-Fit.
#[derive(Clone, Debug, Default)]
pub struct MaxRectsSolver {
    config: SolverConfig,
}

impl MaxRectsSolver {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }
}

impl PackingSolver for MaxRectsSolver {
    /// Platziert alle Anfragen in einem einzigen Behälter (`bin_index` 0).
    ///
    /// # Parameter
    /// * `requests` - Zu platzierende Rechtecke
    /// * `bin` - Der Behälter
    ///
    /// # Rückgabewert
    /// Platzierungen in Platzierungsreihenfolge; nicht passende IDs fehlen
    fn pack(&self, requests: &[PackingRequest], bin: BinSpec) -> Vec<Placement> {
        let mut order: Vec<&PackingRequest> = requests.iter().collect();
        // Große Flächen zuerst, bei Gleichstand stabile ID-Reihenfolge
        order.sort_by(|a, b| {
            (b.width * b.height)
                .partial_cmp(&(a.width * a.height))
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut free = FreeRects::new(bin.as_rect(), self.config.epsilon);
        let mut placements = Vec::with_capacity(requests.len());

        for request in order {
            match free.find_best(request.width, request.height, self.config.allow_rotation) {
                Some(rect) => {
                    free.place(&rect);
                    debug!(
                        id = request.id,
                        x = rect.origin.x,
                        y = rect.origin.y,
                        width = rect.width,
                        height = rect.height,
                        "rectangle placed"
                    );
                    placements.push(Placement {
                        bin_index: 0,
                        x: rect.origin.x,
                        y: rect.origin.y,
                        width: rect.width,
                        height: rect.height,
                        id: request.id,
                    });
                }
                None => debug!(id = request.id, "rectangle does not fit"),
            }
        }

        placements
    }
}

/// Bewertung einer Kandidaten-Position (kleiner ist besser).
#[derive(Clone, Copy, Debug, PartialEq)]
struct FitScore {
    short_side: f64,
    long_side: f64,
}

impl FitScore {
    fn is_better_than(&self, other: &FitScore, eps: f64) -> bool {
        match compare_with_epsilon(self.short_side, other.short_side, eps) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => {
                compare_with_epsilon(self.long_side, other.long_side, eps) == Ordering::Less
            }
        }
    }
}

/// Menge der freien Maximal-Rechtecke eines Behälters.
#[derive(Clone, Debug)]
struct FreeRects {
    rects: Vec<Rect>,
    epsilon: f64,
}

impl FreeRects {
    fn new(bin: Rect, epsilon: f64) -> Self {
        Self {
            rects: vec![bin],
            epsilon,
        }
    }

    /// Sucht die beste Position für ein Rechteck der Größe `width` × `height`.
    ///
    /// Die ungedrehte Variante wird zuerst geprüft; bei gleicher Bewertung
    /// gewinnt sie.
    fn find_best(&self, width: f64, height: f64, allow_rotation: bool) -> Option<Rect> {
        let mut best: Option<(FitScore, Rect)> = None;

        for free in &self.rects {
            let mut candidates = vec![(width, height)];
            if allow_rotation && compare_with_epsilon(width, height, self.epsilon) != Ordering::Equal {
                candidates.push((height, width));
            }

            for (w, h) in candidates {
                if w > free.width + self.epsilon || h > free.height + self.epsilon {
                    continue;
                }
                let leftover_x = (free.width - w).abs();
                let leftover_y = (free.height - h).abs();
                let score = FitScore {
                    short_side: leftover_x.min(leftover_y),
                    long_side: leftover_x.max(leftover_y),
                };
                let is_better = match &best {
                    None => true,
                    Some((current, _)) => score.is_better_than(current, self.epsilon),
                };
                if is_better {
                    best = Some((score, Rect::new(free.origin.x, free.origin.y, w, h)));
                }
            }
        }

        best.map(|(_, rect)| rect)
    }

    /// Belegt `used` und teilt alle überlappenden freien Rechtecke auf.
    fn place(&mut self, used: &Rect) {
        let mut next = Vec::with_capacity(self.rects.len() + 4);
        for free in &self.rects {
            if free.intersects(used) {
                split_free_rect(free, used, &mut next);
            } else {
                next.push(*free);
            }
        }
        self.rects = next;
        self.prune();
    }

    /// Entfernt freie Rechtecke, die vollständig in einem anderen liegen.
    fn prune(&mut self) {
        let mut i = 0;
        while i < self.rects.len() {
            let mut removed_i = false;
            let mut j = i + 1;
            while j < self.rects.len() {
                if self.rects[j].contains(&self.rects[i], self.epsilon) {
                    self.rects.remove(i);
                    removed_i = true;
                    break;
                }
                if self.rects[i].contains(&self.rects[j], self.epsilon) {
                    self.rects.remove(j);
                } else {
                    j += 1;
                }
            }
            if !removed_i {
                i += 1;
            }
        }
    }
}

/// Zerlegt `free` in die bis zu vier Restflächen um `used`.
fn split_free_rect(free: &Rect, used: &Rect, out: &mut Vec<Rect>) {
    if used.left() > free.left() {
        out.push(Rect::new(
            free.left(),
            free.bottom(),
            used.left() - free.left(),
            free.height,
        ));
    }
    if used.right() < free.right() {
        out.push(Rect::new(
            used.right(),
            free.bottom(),
            free.right() - used.right(),
            free.height,
        ));
    }
    if used.bottom() > free.bottom() {
        out.push(Rect::new(
            free.left(),
            free.bottom(),
            free.width,
            used.bottom() - free.bottom(),
        ));
    }
    if used.top() < free.top() {
        out.push(Rect::new(
            free.left(),
            used.top(),
            free.width,
            free.top() - used.top(),
        ));
    }
}

fn compare_with_epsilon(a: f64, b: f64, eps: f64) -> Ordering {
    if (a - b).abs() <= eps {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}
