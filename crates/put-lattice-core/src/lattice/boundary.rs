use serde::{Deserialize, Serialize};

use crate::types::*;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Exercise decision at one lattice time step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum BoundaryPoint {
    /// Every node at or below `node` exercises; `stock_price` is the threshold.
    Exercise { node: u32, stock_price: Price },
    /// The highest exercising node sits above at least one holding node, so
    /// the exercise region is not a single low-price band.
    Fragmented {
        node: u32,
        stock_price: Price,
        holding_nodes_below: u32,
    },
    /// Holding dominates (or ties) at every node of the step.
    NoExercise,
}

impl BoundaryPoint {
    /// Threshold stock price, `None` when nothing exercises.
    pub fn stock_price(&self) -> Option<Price> {
        match *self {
            BoundaryPoint::Exercise { stock_price, .. }
            | BoundaryPoint::Fragmented { stock_price, .. } => Some(stock_price),
            BoundaryPoint::NoExercise => None,
        }
    }

    pub fn node(&self) -> Option<u32> {
        match *self {
            BoundaryPoint::Exercise { node, .. } | BoundaryPoint::Fragmented { node, .. } => {
                Some(node)
            }
            BoundaryPoint::NoExercise => None,
        }
    }

    pub fn is_fragmented(&self) -> bool {
        matches!(self, BoundaryPoint::Fragmented { .. })
    }

    /// Snake-case label matching the serde tag.
    pub fn label(&self) -> &'static str {
        match self {
            BoundaryPoint::Exercise { .. } => "exercise",
            BoundaryPoint::Fragmented { .. } => "fragmented",
            BoundaryPoint::NoExercise => "no_exercise",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryEntry {
    pub time_step: u32,
    /// Years elapsed since valuation (`time_step * dt`)
    pub time: Years,
    #[serde(flatten)]
    pub point: BoundaryPoint,
}

/// Early-exercise boundary, one entry per interior step `1..n-1`, ascending.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExerciseBoundary {
    entries: Vec<BoundaryEntry>,
}

impl ExerciseBoundary {
    /// Build from entries recorded maturity-first during the backward pass.
    pub(crate) fn from_backward_pass(mut entries: Vec<BoundaryEntry>) -> Self {
        entries.reverse();
        debug_assert!(entries
            .windows(2)
            .all(|pair| pair[0].time_step < pair[1].time_step));
        ExerciseBoundary { entries }
    }

    pub fn entries(&self) -> &[BoundaryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, time_step: u32) -> Option<&BoundaryPoint> {
        self.entries
            .binary_search_by_key(&time_step, |entry| entry.time_step)
            .ok()
            .map(|idx| &self.entries[idx].point)
    }

    /// `(time_step, threshold)` pairs for plotting, `None` marking steps
    /// without early exercise.
    pub fn exercise_prices(&self) -> impl Iterator<Item = (u32, Option<Price>)> + '_ {
        self.entries
            .iter()
            .map(|entry| (entry.time_step, entry.point.stock_price()))
    }

    pub fn first_exercise_step(&self) -> Option<u32> {
        self.entries
            .iter()
            .find(|entry| entry.point.stock_price().is_some())
            .map(|entry| entry.time_step)
    }

    pub fn fragmented_steps(&self) -> Vec<u32> {
        self.entries
            .iter()
            .filter(|entry| entry.point.is_fragmented())
            .map(|entry| entry.time_step)
            .collect()
    }

    pub fn has_early_exercise(&self) -> bool {
        self.first_exercise_step().is_some()
    }
}

// ---------------------------------------------------------------------------
// Level classification
// ---------------------------------------------------------------------------

/// Classify one lattice level from its exercise and continuation values.
///
/// A node exercises only when its exercise value is strictly greater than
/// its continuation value; exact ties hold. The reported node is the
/// highest exercising index. `prices` must be ordered by up-move count.
///
/// No tolerance is applied. Where the two values agree in exact arithmetic
/// (zero rate, deep in the money) rounding noise decides the node, which
/// typically shows up as `Fragmented` levels.
pub fn classify_level(exercise: &[Price], continuation: &[Price], prices: &[Price]) -> BoundaryPoint {
    debug_assert_eq!(exercise.len(), continuation.len());
    debug_assert_eq!(exercise.len(), prices.len());

    let exercises = |(ex, cont): (&Price, &Price)| ex > cont;

    let Some(node) = exercise.iter().zip(continuation).rposition(exercises) else {
        return BoundaryPoint::NoExercise;
    };

    let holding_below = exercise[..node]
        .iter()
        .zip(&continuation[..node])
        .filter(|&pair| !exercises(pair))
        .count();

    if holding_below == 0 {
        BoundaryPoint::Exercise {
            node: node as u32,
            stock_price: prices[node],
        }
    } else {
        BoundaryPoint::Fragmented {
            node: node as u32,
            stock_price: prices[node],
            holding_nodes_below: holding_below as u32,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const PRICES: [Price; 4] = [40.0, 45.0, 50.0, 55.0];

    #[test]
    fn test_contiguous_region_reports_highest_node() {
        let exercise = [12.0, 7.0, 2.0, 0.0];
        let continuation = [11.0, 6.5, 2.5, 1.0];
        assert_eq!(
            classify_level(&exercise, &continuation, &PRICES),
            BoundaryPoint::Exercise {
                node: 1,
                stock_price: 45.0
            }
        );
    }

    #[test]
    fn test_exact_tie_holds() {
        // Node 1 ties exactly and must be treated as a hold
        let exercise = [12.0, 7.0, 2.0, 0.0];
        let continuation = [11.0, 7.0, 2.5, 1.0];
        assert_eq!(
            classify_level(&exercise, &continuation, &PRICES),
            BoundaryPoint::Exercise {
                node: 0,
                stock_price: 40.0
            }
        );

        // A level made only of ties has no boundary
        let tied = [3.0, 2.0, 1.0, 0.0];
        assert_eq!(classify_level(&tied, &tied, &PRICES), BoundaryPoint::NoExercise);
    }

    #[test]
    fn test_no_exercise_marker() {
        let exercise = [0.0; 4];
        let continuation = [0.5, 0.4, 0.2, 0.1];
        assert_eq!(
            classify_level(&exercise, &continuation, &PRICES),
            BoundaryPoint::NoExercise
        );
    }

    #[test]
    fn test_every_node_exercising_reports_top_node() {
        let exercise = [20.0, 15.0, 10.0, 5.0];
        let continuation = [19.0, 14.0, 9.0, 4.0];
        assert_eq!(
            classify_level(&exercise, &continuation, &PRICES),
            BoundaryPoint::Exercise {
                node: 3,
                stock_price: 55.0
            }
        );
    }

    #[test]
    fn test_fragmented_region_is_signalled_deterministically() {
        // Nodes 0 and 2 exercise, node 1 holds
        let exercise = [12.0, 7.0, 2.0, 0.0];
        let continuation = [11.0, 7.5, 1.5, 1.0];
        let point = classify_level(&exercise, &continuation, &PRICES);
        assert_eq!(
            point,
            BoundaryPoint::Fragmented {
                node: 2,
                stock_price: 50.0,
                holding_nodes_below: 1
            }
        );
        assert!(point.is_fragmented());
        assert_eq!(point.stock_price(), Some(50.0));
        assert_eq!(classify_level(&exercise, &continuation, &PRICES), point);
    }

    #[test]
    fn test_boundary_accessors() {
        let boundary = ExerciseBoundary::from_backward_pass(vec![
            BoundaryEntry {
                time_step: 3,
                time: 0.3,
                point: BoundaryPoint::Exercise {
                    node: 1,
                    stock_price: 45.0,
                },
            },
            BoundaryEntry {
                time_step: 2,
                time: 0.2,
                point: BoundaryPoint::Fragmented {
                    node: 1,
                    stock_price: 44.0,
                    holding_nodes_below: 1,
                },
            },
            BoundaryEntry {
                time_step: 1,
                time: 0.1,
                point: BoundaryPoint::NoExercise,
            },
        ]);

        assert_eq!(boundary.len(), 3);
        assert_eq!(boundary.entries()[0].time_step, 1);
        assert_eq!(boundary.get(1), Some(&BoundaryPoint::NoExercise));
        assert_eq!(boundary.get(7), None);
        assert_eq!(boundary.first_exercise_step(), Some(2));
        assert_eq!(boundary.fragmented_steps(), vec![2]);
        assert_eq!(
            boundary.exercise_prices().collect::<Vec<_>>(),
            vec![(1, None), (2, Some(44.0)), (3, Some(45.0))]
        );
        assert!(boundary.has_early_exercise());
    }

    #[test]
    fn test_entry_serialises_flat() {
        let entry = BoundaryEntry {
            time_step: 4,
            time: 0.5,
            point: BoundaryPoint::Exercise {
                node: 2,
                stock_price: 47.5,
            },
        };
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "time_step": 4,
                "time": 0.5,
                "decision": "exercise",
                "node": 2,
                "stock_price": 47.5
            })
        );

        let none = BoundaryEntry {
            time_step: 1,
            time: 0.1,
            point: BoundaryPoint::NoExercise,
        };
        assert_eq!(
            serde_json::to_value(&none).unwrap(),
            serde_json::json!({"time_step": 1, "time": 0.1, "decision": "no_exercise"})
        );
    }
}
