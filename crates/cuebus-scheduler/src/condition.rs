//! Condition evaluation against a group's iteration number.
//!
//! Decoding already rejects nodes that carry both `AND` and `OR`, so every
//! [`Condition`] reaching this module is well formed and evaluation cannot fail.

use cuebus_core::Condition;

/// Returns `true` when a command carrying `condition` should fire on `iteration`.
pub fn evaluate(condition: &Condition, iteration: u64) -> bool {
    Evaluation::new(iteration).run(condition)
}

/// One evaluation pass. Counts visited nodes so short-circuiting is observable.
struct Evaluation {
    iteration: u64,
    visited: usize,
}

impl Evaluation {
    fn new(iteration: u64) -> Self {
        Self { iteration, visited: 0 }
    }

    fn run(&mut self, condition: &Condition) -> bool {
        self.visited += 1;
        match condition {
            Condition::Always => true,
            Condition::Leaf { modulo } => self.divides(Some(*modulo)),
            Condition::And { modulo, child } => self.divides(*modulo) && self.run(child),
            Condition::Or { modulo, child } => self.divides(*modulo) || self.run(child),
        }
    }

    /// Leaf test of a node. Without a modulus (or with zero) it never matches,
    /// so an `AND` node with no `mod` is false and an `OR` node defers to its child.
    fn divides(&self, modulo: Option<u64>) -> bool {
        match modulo {
            None | Some(0) => false,
            Some(m) => self.iteration % m == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visits(condition: &Condition, iteration: u64) -> (bool, usize) {
        let mut eval = Evaluation::new(iteration);
        let result = eval.run(condition);
        (result, eval.visited)
    }

    #[test]
    fn empty_condition_always_passes() {
        for i in 0..10 {
            assert!(evaluate(&Condition::Always, i));
        }
    }

    #[test]
    fn modulo_leaf() {
        let c = Condition::leaf(3);
        let passing: Vec<u64> = (0..10).filter(|i| evaluate(&c, *i)).collect();
        assert_eq!(passing, vec![0, 3, 6, 9]);
    }

    #[test]
    fn and_requires_both() {
        let c = Condition::and(Some(2), Condition::leaf(3));
        let passing: Vec<u64> = (0..20).filter(|i| evaluate(&c, *i)).collect();
        assert_eq!(passing, vec![0, 6, 12, 18]);
    }

    #[test]
    fn or_accepts_either() {
        let c = Condition::or(Some(2), Condition::leaf(5));
        let passing: Vec<u64> = (0..11).filter(|i| evaluate(&c, *i)).collect();
        assert_eq!(passing, vec![0, 2, 4, 5, 6, 8, 10]);
    }

    #[test]
    fn and_skips_child_when_leaf_fails() {
        let c = Condition::and(Some(2), Condition::leaf(3));
        assert_eq!(visits(&c, 3), (false, 1));
        assert_eq!(visits(&c, 4), (false, 2));
    }

    #[test]
    fn or_skips_child_when_leaf_passes() {
        let c = Condition::or(Some(2), Condition::leaf(5));
        assert_eq!(visits(&c, 4), (true, 1));
        assert_eq!(visits(&c, 5), (true, 2));
    }

    #[test]
    fn operator_node_without_modulus_fails_its_own_test() {
        let and: Condition = serde_json::from_str(r#"{"AND":{"mod":4}}"#).unwrap();
        assert!(!evaluate(&and, 0));
        assert!(!evaluate(&and, 8));
        assert_eq!(visits(&and, 0), (false, 1));

        let or: Condition = serde_json::from_str(r#"{"OR":{"mod":4}}"#).unwrap();
        assert!(!evaluate(&or, 3));
        assert!(evaluate(&or, 8));
        assert_eq!(visits(&or, 8), (true, 2));
    }

    #[test]
    fn empty_child_still_passes() {
        let or: Condition = serde_json::from_str(r#"{"OR":{}}"#).unwrap();
        assert!(evaluate(&or, 3));
        let and: Condition = serde_json::from_str(r#"{"AND":{}}"#).unwrap();
        assert!(!evaluate(&and, 3));
    }

    #[test]
    fn zero_modulus_never_matches() {
        assert!(!evaluate(&Condition::leaf(0), 0));
        assert!(evaluate(&Condition::or(Some(0), Condition::Always), 3));
    }

    #[test]
    fn nested_chain_from_json() {
        let c: Condition =
            serde_json::from_str(r#"{"mod":2,"AND":{"mod":3,"OR":{"mod":7}}}"#).unwrap();
        assert!(evaluate(&c, 6));
        assert!(evaluate(&c, 14));
        assert!(!evaluate(&c, 4));
        assert!(!evaluate(&c, 7));
    }
}
