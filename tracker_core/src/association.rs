//! Association engine (§4.3, §9): match pre-filtered detections against
//! existing tracks. Two interchangeable strategies behind one trait, so
//! the session orchestrator is polymorphic over "score detections
//! against tracks, assign, report new tracks" per §9's design note.

use std::collections::HashSet;

use pathfinding::prelude::{kuhn_munkres_min, Matrix};

use crate::config::PerClassParameters;
use crate::types::{BoundingBox, Detection};

/// A read-only view of one existing track, as seen by the association
/// engine (it only needs identity, class and current box).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: u64,
    pub class_name: String,
    pub bounding_box: BoundingBox,
}

/// `matched` is `(detection index, track id)`; `unmatched` lists the
/// detection indices left over.
pub struct AssociationResult {
    pub matched: Vec<(usize, u64)>,
    pub unmatched: Vec<usize>,
}

pub trait AssociationStrategy {
    fn associate(
        &self,
        detections: &[Detection],
        candidates: &[Candidate],
        class_params: &dyn Fn(&str) -> PerClassParameters,
    ) -> AssociationResult;
}

/// Greedy per-detection IoU matching (§4.3 "Greedy-IoU"). Each candidate
/// is assignable to at most one detection; ties are broken by the order
/// `candidates` is given in (insertion order of tracks).
///
/// Exposed as a free function (not just `Greedy::associate`) because
/// §4.3 step 3 — lost-track reacquisition — reuses this exact matching
/// rule against a different candidate pool.
pub fn greedy_match(
    detections: &[Detection],
    candidates: &[Candidate],
    class_params: &dyn Fn(&str) -> PerClassParameters,
) -> AssociationResult {
    let mut used: HashSet<u64> = HashSet::new();
    let mut matched = Vec::new();
    let mut unmatched = Vec::new();

    for (det_idx, det) in detections.iter().enumerate() {
        let Some(det_box) = det.bounding_box else {
            unmatched.push(det_idx);
            continue;
        };
        let threshold = class_params(&det.class_name).iou_threshold;

        let mut best: Option<(f64, u64)> = None;
        for candidate in candidates {
            if used.contains(&candidate.id) || candidate.class_name != det.class_name {
                continue;
            }
            let iou = det_box.iou(&candidate.bounding_box);
            if iou > threshold {
                let is_better = match best {
                    Some((best_iou, _)) => iou > best_iou,
                    None => true,
                };
                if is_better {
                    best = Some((iou, candidate.id));
                }
            }
        }

        match best {
            Some((_, id)) => {
                matched.push((det_idx, id));
                used.insert(id);
            }
            None => unmatched.push(det_idx),
        }
    }

    AssociationResult { matched, unmatched }
}

pub struct Greedy;

impl AssociationStrategy for Greedy {
    fn associate(
        &self,
        detections: &[Detection],
        candidates: &[Candidate],
        class_params: &dyn Fn(&str) -> PerClassParameters,
    ) -> AssociationResult {
        greedy_match(detections, candidates, class_params)
    }
}

/// Scale factor turning `[0, 1]` IoU costs into the integer weights
/// `kuhn_munkres_min` requires (mirrors the pack's `oc-sort` associator).
const COST_MULTIPLIER: f64 = 1_000_000.0;

/// Global minimum-cost assignment via the Hungarian algorithm (§4.3
/// "Hungarian"). Does not attempt lost-track reacquisition (§9).
pub struct Hungarian;

impl AssociationStrategy for Hungarian {
    fn associate(
        &self,
        detections: &[Detection],
        candidates: &[Candidate],
        class_params: &dyn Fn(&str) -> PerClassParameters,
    ) -> AssociationResult {
        if detections.is_empty() || candidates.is_empty() {
            return AssociationResult {
                matched: Vec::new(),
                unmatched: (0..detections.len()).collect(),
            };
        }

        let rows = detections.len();
        let cols = candidates.len();
        let mut cost = Matrix::new(rows, cols, COST_MULTIPLIER as i64);

        for i in 0..rows {
            let Some(det_box) = detections[i].bounding_box else {
                continue;
            };
            for j in 0..cols {
                let iou = det_box.iou(&candidates[j].bounding_box);
                cost[(i, j)] = ((1.0 - iou) * COST_MULTIPLIER) as i64;
            }
        }

        let transpose = rows > cols;
        let weights = if transpose { cost.transposed() } else { cost.clone() };
        let (_, assignment) = kuhn_munkres_min(&weights);

        let mut matched = Vec::new();
        let mut matched_detections: HashSet<usize> = HashSet::new();

        for (i, &j) in assignment.iter().enumerate() {
            let (det_idx, cand_idx) = if transpose { (j, i) } else { (i, j) };
            if det_idx >= rows || cand_idx >= cols {
                continue;
            }

            let det = &detections[det_idx];
            let candidate = &candidates[cand_idx];
            if det.class_name != candidate.class_name {
                continue;
            }

            let params = class_params(&det.class_name);
            let cost_limit = ((1.0 - params.iou_threshold) * COST_MULTIPLIER) as i64;
            if cost[(det_idx, cand_idx)] >= cost_limit {
                continue;
            }

            matched.push((det_idx, candidate.id));
            matched_detections.insert(det_idx);
        }

        let unmatched = (0..rows).filter(|i| !matched_detections.contains(i)).collect();
        AssociationResult { matched, unmatched }
    }
}

pub fn strategy_for(use_matrix: bool) -> Box<dyn AssociationStrategy> {
    if use_matrix {
        Box::new(Hungarian)
    } else {
        Box::new(Greedy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: u64, class: &str, bbox: BoundingBox) -> Candidate {
        Candidate {
            id,
            class_name: class.to_string(),
            bounding_box: bbox,
        }
    }

    fn det(class: &str, score: f64, bbox: BoundingBox) -> Detection {
        Detection::new(class, score, Some(bbox))
    }

    fn default_params(_: &str) -> PerClassParameters {
        PerClassParameters::default()
    }

    #[test]
    fn test_greedy_and_hungarian_agree_on_trivial_single_pairing() {
        let detections = vec![det("person", 0.9, BoundingBox::new(10.0, 10.0, 50.0, 50.0))];
        let candidates = vec![candidate(7, "person", BoundingBox::new(12.0, 10.0, 50.0, 50.0))];

        let greedy = Greedy.associate(&detections, &candidates, &default_params);
        let hungarian = Hungarian.associate(&detections, &candidates, &default_params);

        assert_eq!(greedy.matched, vec![(0, 7)]);
        assert_eq!(hungarian.matched, vec![(0, 7)]);
    }

    #[test]
    fn test_greedy_never_matches_across_classes() {
        let detections = vec![det("person", 0.9, BoundingBox::new(10.0, 10.0, 50.0, 50.0))];
        let candidates = vec![candidate(7, "car", BoundingBox::new(10.0, 10.0, 50.0, 50.0))];
        let result = Greedy.associate(&detections, &candidates, &default_params);
        assert!(result.matched.is_empty());
        assert_eq!(result.unmatched, vec![0]);
    }

    #[test]
    fn test_greedy_breaks_ties_by_insertion_order() {
        let detections = vec![det("person", 0.9, BoundingBox::new(10.0, 10.0, 50.0, 50.0))];
        let candidates = vec![
            candidate(1, "person", BoundingBox::new(10.0, 10.0, 50.0, 50.0)),
            candidate(2, "person", BoundingBox::new(10.0, 10.0, 50.0, 50.0)),
        ];
        let result = Greedy.associate(&detections, &candidates, &default_params);
        assert_eq!(result.matched, vec![(0, 1)]);
    }

    #[test]
    fn test_hungarian_discards_below_threshold() {
        let detections = vec![det("person", 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0))];
        let candidates = vec![candidate(1, "person", BoundingBox::new(500.0, 500.0, 10.0, 10.0))];
        let result = Hungarian.associate(&detections, &candidates, &default_params);
        assert!(result.matched.is_empty());
        assert_eq!(result.unmatched, vec![0]);
    }
}
