//! Pre-filter pipeline (§4.2): oversize rejection, class/score filter,
//! then class-aware NMS, applied in that exact order. Never mutates its
//! input; returns a new `Vec` of surviving detections.

use std::collections::HashSet;

use crate::config::{PerClassParameters, Settings};
use crate::types::Detection;

/// Run the three pre-filter stages over `detections`.
///
/// `enabled_classes` empty means "no restriction" — every class is
/// considered enabled, since none of the end-to-end scenarios in §8
/// configure an explicit allow-list and still expect ordinary classes
/// to be tracked.
pub fn prefilter(
    detections: &[Detection],
    input_dimensions: (u32, u32),
    enabled_classes: &HashSet<String>,
    class_defaults: &PerClassParameters,
    settings: &Settings,
) -> Vec<Detection> {
    let (width, height) = input_dimensions;
    let frame_area = width as f64 * height as f64;

    let mut kept: Vec<Detection> = detections
        .iter()
        .filter(|d| {
            let Some(bbox) = d.bounding_box else {
                return false;
            };

            // 1. Oversize rejection.
            if frame_area > 0.0 {
                let ratio = (bbox.w.max(0.0) * bbox.h.max(0.0)) / frame_area;
                if ratio >= 0.95 {
                    return false;
                }
            }

            // 2. Class / score filter.
            if !enabled_classes.is_empty() && !enabled_classes.contains(&d.class_name) {
                return false;
            }
            let params = class_defaults.resolve(&d.class_name, settings);
            d.score >= params.min_score
        })
        .cloned()
        .collect();

    // 3. Class-aware NMS: sort by score descending, keep the head,
    // discard later same-class detections that overlap it too much.
    kept.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let mut survivors: Vec<Detection> = Vec::with_capacity(kept.len());
    for candidate in kept {
        let params = class_defaults.resolve(&candidate.class_name, settings);
        let candidate_box = candidate.bounding_box.expect("filtered above");

        let suppressed = survivors.iter().any(|kept_d: &Detection| {
            kept_d.class_name == candidate.class_name
                && candidate_box.iou(&kept_d.bounding_box.expect("filtered above")) > params.iou_threshold
        });

        if !suppressed {
            survivors.push(candidate);
        }
    }

    survivors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn detection(class: &str, score: f64, bbox: BoundingBox) -> Detection {
        Detection::new(class, score, Some(bbox))
    }

    #[test]
    fn test_oversize_box_is_dropped() {
        let detections = vec![detection("person", 0.9, BoundingBox::new(0.0, 0.0, 980.0, 980.0))];
        let out = prefilter(
            &detections,
            (1000, 1000),
            &HashSet::new(),
            &PerClassParameters::default(),
            &Settings::new(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_low_score_is_dropped() {
        let detections = vec![detection("person", 0.5, BoundingBox::new(0.0, 0.0, 10.0, 10.0))];
        let out = prefilter(
            &detections,
            (1000, 1000),
            &HashSet::new(),
            &PerClassParameters::default(),
            &Settings::new(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_nms_keeps_only_highest_score_duplicate() {
        let a = detection("person", 0.9, BoundingBox::new(10.0, 10.0, 50.0, 50.0));
        let b = detection("person", 0.8, BoundingBox::new(12.0, 10.0, 50.0, 50.0));
        assert!(a.bounding_box.unwrap().iou(&b.bounding_box.unwrap()) > 0.5);

        let out = prefilter(
            &[a.clone(), b],
            (1000, 1000),
            &HashSet::new(),
            &PerClassParameters::default(),
            &Settings::new(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].score, 0.9);
    }

    #[test]
    fn test_nms_never_suppresses_across_classes() {
        let a = detection("person", 0.9, BoundingBox::new(10.0, 10.0, 50.0, 50.0));
        let b = detection("car", 0.8, BoundingBox::new(10.0, 10.0, 50.0, 50.0));
        let out = prefilter(
            &[a, b],
            (1000, 1000),
            &HashSet::new(),
            &PerClassParameters::default(),
            &Settings::new(),
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_disabled_class_is_dropped() {
        let mut enabled = HashSet::new();
        enabled.insert("car".to_string());
        let detections = vec![detection("person", 0.9, BoundingBox::new(0.0, 0.0, 10.0, 10.0))];
        let out = prefilter(
            &detections,
            (1000, 1000),
            &enabled,
            &PerClassParameters::default(),
            &Settings::new(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_nms_is_idempotent() {
        let a = detection("person", 0.9, BoundingBox::new(10.0, 10.0, 50.0, 50.0));
        let b = detection("person", 0.8, BoundingBox::new(12.0, 10.0, 50.0, 50.0));
        let c = detection("person", 0.75, BoundingBox::new(500.0, 500.0, 20.0, 20.0));

        let once = prefilter(
            &[a.clone(), b, c.clone()],
            (1000, 1000),
            &HashSet::new(),
            &PerClassParameters::default(),
            &Settings::new(),
        );
        let twice = prefilter(
            &once,
            (1000, 1000),
            &HashSet::new(),
            &PerClassParameters::default(),
            &Settings::new(),
        );
        assert_eq!(once.len(), twice.len());
        for (x, y) in once.iter().zip(twice.iter()) {
            assert_eq!(x.class_name, y.class_name);
            assert_eq!(x.score, y.score);
        }
    }

    proptest::proptest! {
        /// §8 invariant 5: applying pre-filter twice yields the same
        /// result as applying it once, for arbitrary same-class boxes.
        #[test]
        fn test_nms_is_idempotent_for_any_detection_set(
            boxes in proptest::collection::vec(
                (0.0f64..900.0, 0.0f64..900.0, 1.0f64..80.0, 1.0f64..80.0, 0.0f64..1.0),
                0..8,
            ),
        ) {
            let detections: Vec<Detection> = boxes
                .into_iter()
                .map(|(x, y, w, h, score)| detection("person", score, BoundingBox::new(x, y, w, h)))
                .collect();

            let once = prefilter(&detections, (1000, 1000), &HashSet::new(), &PerClassParameters::default(), &Settings::new());
            let twice = prefilter(&once, (1000, 1000), &HashSet::new(), &PerClassParameters::default(), &Settings::new());

            proptest::prop_assert_eq!(once.len(), twice.len());
            for (x, y) in once.iter().zip(twice.iter()) {
                proptest::prop_assert_eq!(&x.class_name, &y.class_name);
                proptest::prop_assert_eq!(x.score, y.score);
            }
        }
    }
}
