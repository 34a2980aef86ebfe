//! Geometry kernel: IoU, centroid, diagonal and Euclidean distance over
//! `[x, y, w, h]` boxes in input-image coordinates.

use nalgebra::Vector2;

use crate::types::BoundingBox;

impl BoundingBox {
    /// `(x + w/2, y + h/2)`.
    pub fn centroid(&self) -> Vector2<f64> {
        Vector2::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    /// `sqrt(w^2 + h^2)`.
    pub fn diagonal(&self) -> f64 {
        (self.w * self.w + self.h * self.h).sqrt()
    }

    fn area(&self) -> f64 {
        self.w.max(0.0) * self.h.max(0.0)
    }

    /// Intersection-over-union with `other`. Symmetric, in `[0, 1]`, zero
    /// when either box has zero area.
    pub fn iou(&self, other: &BoundingBox) -> f64 {
        if self.area() <= 0.0 || other.area() <= 0.0 {
            return 0.0;
        }

        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.w).min(other.x + other.w);
        let y2 = (self.y + self.h).min(other.y + other.h);

        if x2 <= x1 || y2 <= y1 {
            return 0.0;
        }

        let intersection = (x2 - x1) * (y2 - y1);
        let union = self.area() + other.area() - intersection;

        if union <= 0.0 {
            0.0
        } else {
            (intersection / union).clamp(0.0, 1.0)
        }
    }
}

/// Euclidean distance between two centroids.
pub fn distance(p: &Vector2<f64>, q: &Vector2<f64>) -> f64 {
    (p - q).norm()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f64, y: f64, w: f64, h: f64) -> BoundingBox {
        BoundingBox { x, y, w, h }
    }

    #[test]
    fn test_iou_is_symmetric() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 5.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), b.iou(&a));
    }

    #[test]
    fn test_iou_self_is_one() {
        let a = bbox(1.0, 2.0, 10.0, 20.0);
        assert!((a.iou(&a) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_iou_disjoint_is_zero() {
        let a = bbox(0.0, 0.0, 5.0, 5.0);
        let b = bbox(100.0, 100.0, 5.0, 5.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_iou_zero_area_is_zero() {
        let a = bbox(0.0, 0.0, 0.0, 10.0);
        let b = bbox(0.0, 0.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn test_centroid_is_box_center() {
        let a = bbox(10.0, 10.0, 50.0, 50.0);
        let c = a.centroid();
        assert_eq!((c.x, c.y), (35.0, 35.0));
    }

    #[test]
    fn test_distance_matches_pythagoras() {
        let p = Vector2::new(0.0, 0.0);
        let q = Vector2::new(3.0, 4.0);
        assert!((distance(&p, &q) - 5.0).abs() < 1e-9);
    }

    proptest::proptest! {
        /// §8 invariant 6: `iou(a, b) == iou(b, a)` for any boxes, and
        /// `iou(a, a) == 1` for any non-degenerate box.
        #[test]
        fn test_iou_is_symmetric_for_any_boxes(
            ax in 0.0f64..500.0, ay in 0.0f64..500.0, aw in 0.1f64..200.0, ah in 0.1f64..200.0,
            bx in 0.0f64..500.0, by in 0.0f64..500.0, bw in 0.1f64..200.0, bh in 0.1f64..200.0,
        ) {
            let a = bbox(ax, ay, aw, ah);
            let b = bbox(bx, by, bw, bh);
            proptest::prop_assert_eq!(a.iou(&b), b.iou(&a));
            proptest::prop_assert!(a.iou(&b) >= 0.0 && a.iou(&b) <= 1.0);
            proptest::prop_assert!((a.iou(&a) - 1.0).abs() < 1e-9);
        }
    }
}
