//! Sibling ordering model shared by lists, tasks, and subtasks.
//!
//! # Responsibility
//! - Rebuild one container's ordered member index from stored positions.
//! - Compute reorder and cross-container move plans as position writes.
//!
//! # Invariants
//! - Ranks are 1-based and dense: member at index `i` has rank `i + 1`.
//! - A plan only contains writes for rows whose stored position changes.
//! - Nothing here touches storage; repositories apply plans in one transaction.

use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// One member row as read from storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredPosition {
    pub id: Uuid,
    pub position: i64,
}

/// One position update to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionWrite {
    pub id: Uuid,
    pub position: i64,
}

/// Reasons a reorder payload is not a bijection onto the current members.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// Payload has no ids.
    Empty,
    /// Payload length differs from member count.
    CountMismatch { expected: usize, actual: usize },
    /// Payload names foreign ids, misses members, or repeats ids.
    SetMismatch {
        unknown: Vec<Uuid>,
        missing: Vec<Uuid>,
        duplicates: Vec<Uuid>,
    },
}

impl Display for OrderError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "order must not be empty"),
            Self::CountMismatch { expected, actual } => write!(
                f,
                "order must include all {expected} members, got {actual} ids"
            ),
            Self::SetMismatch {
                unknown,
                missing,
                duplicates,
            } => write!(
                f,
                "order does not match container members: {} unknown, {} missing, {} duplicated",
                unknown.len(),
                missing.len(),
                duplicates.len()
            ),
        }
    }
}

impl Error for OrderError {}

/// Append position for a container whose highest stored position is `max`.
pub fn next_position(max: Option<i64>) -> i64 {
    max.unwrap_or(0).max(0) + 1
}

/// Ordered member index of one container.
///
/// Built from storage rows sorted by `position` (ties keep input order), then
/// mutated in memory. `pending_writes` diffs the dense ranks back against what
/// storage holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiblingOrder {
    container: Uuid,
    members: Vec<Uuid>,
    stored: HashMap<Uuid, i64>,
}

impl SiblingOrder {
    pub fn from_stored(container: Uuid, mut rows: Vec<StoredPosition>) -> Self {
        rows.sort_by_key(|row| row.position);
        let stored = rows.iter().map(|row| (row.id, row.position)).collect();
        Self {
            container,
            members: rows.into_iter().map(|row| row.id).collect(),
            stored,
        }
    }

    pub fn container(&self) -> Uuid {
        self.container
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Current dense rank of `id`.
    pub fn rank_of(&self, id: Uuid) -> Option<i64> {
        self.members
            .iter()
            .position(|member| *member == id)
            .map(|index| index as i64 + 1)
    }

    /// Checks that `ordered` is a permutation of the current members.
    pub fn validate_order(&self, ordered: &[Uuid]) -> Result<(), OrderError> {
        if ordered.is_empty() {
            return Err(OrderError::Empty);
        }
        if ordered.len() != self.members.len() {
            return Err(OrderError::CountMismatch {
                expected: self.members.len(),
                actual: ordered.len(),
            });
        }

        let current: HashSet<Uuid> = self.members.iter().copied().collect();
        let mut seen = HashSet::with_capacity(ordered.len());
        let mut unknown = Vec::new();
        let mut duplicates = Vec::new();
        for id in ordered {
            if !current.contains(id) {
                unknown.push(*id);
            } else if !seen.insert(*id) {
                duplicates.push(*id);
            }
        }
        let missing: Vec<Uuid> = self
            .members
            .iter()
            .filter(|id| !seen.contains(*id))
            .copied()
            .collect();

        if unknown.is_empty() && missing.is_empty() && duplicates.is_empty() {
            Ok(())
        } else {
            Err(OrderError::SetMismatch {
                unknown,
                missing,
                duplicates,
            })
        }
    }

    /// Replaces the member order with `ordered` after validation.
    pub fn reorder(&mut self, ordered: &[Uuid]) -> Result<(), OrderError> {
        self.validate_order(ordered)?;
        self.members = ordered.to_vec();
        Ok(())
    }

    /// Removes `id`, returning its former 1-based rank.
    pub fn remove(&mut self, id: Uuid) -> Option<i64> {
        let index = self.members.iter().position(|member| *member == id)?;
        self.members.remove(index);
        Some(index as i64 + 1)
    }

    /// Inserts `id` at `position` (clamped into `1..=len+1`), or appends when
    /// `position` is `None`. Returns the rank it landed on.
    pub fn insert_at(&mut self, id: Uuid, position: Option<i64>) -> i64 {
        let slot_count = self.members.len() as i64 + 1;
        let rank = position.unwrap_or(slot_count).clamp(1, slot_count);
        self.members.insert((rank - 1) as usize, id);
        rank
    }

    /// Writes needed to make stored positions equal the dense ranks.
    ///
    /// Members without a stored position (newly inserted) are skipped; their
    /// row is written by the caller together with its other columns.
    pub fn pending_writes(&self) -> Vec<PositionWrite> {
        self.members
            .iter()
            .enumerate()
            .filter_map(|(index, id)| {
                let rank = index as i64 + 1;
                match self.stored.get(id) {
                    Some(stored) if *stored != rank => Some(PositionWrite {
                        id: *id,
                        position: rank,
                    }),
                    _ => None,
                }
            })
            .collect()
    }

    /// Writes for a full reorder of this container.
    pub fn plan_reorder(&self, ordered: &[Uuid]) -> Result<Vec<PositionWrite>, OrderError> {
        let mut next = self.clone();
        next.reorder(ordered)?;
        Ok(next.pending_writes())
    }
}

/// Three-phase relocation of one member between two containers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub member: Uuid,
    pub from_container: Uuid,
    pub to_container: Uuid,
    pub from_position: i64,
    /// Final position of the moved member in the target.
    pub position: i64,
    /// Phase 1: source siblings closing the gap.
    pub source_writes: Vec<PositionWrite>,
    /// Phase 2: target siblings opening the slot.
    pub target_writes: Vec<PositionWrite>,
}

impl MovePlan {
    pub fn write_count(&self) -> usize {
        self.source_writes.len() + self.target_writes.len() + 1
    }
}

/// Plans moving `member` from `source` into `target`.
///
/// Returns `None` when `member` is not in `source` or both sides are the same
/// container; same-container ordering is a reorder, not a move.
pub fn plan_move(
    source: &SiblingOrder,
    target: &SiblingOrder,
    member: Uuid,
    explicit_position: Option<i64>,
) -> Option<MovePlan> {
    if source.container() == target.container() {
        return None;
    }

    let mut source_after = source.clone();
    let from_position = source
        .stored
        .get(&member)
        .copied()
        .or_else(|| source.rank_of(member))?;
    source_after.remove(member)?;

    let mut target_after = target.clone();
    target_after.remove(member);
    let position = target_after.insert_at(member, explicit_position);

    Some(MovePlan {
        member,
        from_container: source.container(),
        to_container: target.container(),
        from_position,
        position,
        source_writes: source_after.pending_writes(),
        target_writes: target_after.pending_writes(),
    })
}

/// Whether positions are exactly `1..=N` once sorted.
pub fn is_dense(positions: &[i64]) -> bool {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    sorted
        .iter()
        .enumerate()
        .all(|(index, position)| *position == index as i64 + 1)
}

#[cfg(test)]
mod tests {
    use super::{is_dense, next_position, plan_move, OrderError, PositionWrite, SiblingOrder, StoredPosition};
    use uuid::Uuid;

    fn container_with(positions: &[i64]) -> (SiblingOrder, Vec<Uuid>) {
        let ids: Vec<Uuid> = positions.iter().map(|_| Uuid::new_v4()).collect();
        let rows = ids
            .iter()
            .zip(positions)
            .map(|(id, position)| StoredPosition {
                id: *id,
                position: *position,
            })
            .collect();
        (SiblingOrder::from_stored(Uuid::new_v4(), rows), ids)
    }

    #[test]
    fn next_position_starts_at_one() {
        assert_eq!(next_position(None), 1);
        assert_eq!(next_position(Some(0)), 1);
        assert_eq!(next_position(Some(4)), 5);
    }

    #[test]
    fn reorder_writes_only_changed_rows() {
        let (order, ids) = container_with(&[1, 2, 3]);
        let writes = order
            .plan_reorder(&[ids[0], ids[2], ids[1]])
            .expect("valid permutation");
        assert_eq!(
            writes,
            vec![
                PositionWrite { id: ids[2], position: 2 },
                PositionWrite { id: ids[1], position: 3 },
            ]
        );
    }

    #[test]
    fn reorder_same_order_is_write_free() {
        let (order, ids) = container_with(&[1, 2, 3]);
        assert!(order.plan_reorder(&ids).expect("valid").is_empty());
    }

    #[test]
    fn reorder_rejects_count_and_set_mismatches() {
        let (order, ids) = container_with(&[1, 2]);
        assert_eq!(order.plan_reorder(&[]), Err(OrderError::Empty));
        assert!(matches!(
            order.plan_reorder(&ids[..1]),
            Err(OrderError::CountMismatch { expected: 2, actual: 1 })
        ));

        let foreign = Uuid::new_v4();
        match order.plan_reorder(&[ids[0], foreign]) {
            Err(OrderError::SetMismatch { unknown, missing, .. }) => {
                assert_eq!(unknown, vec![foreign]);
                assert_eq!(missing, vec![ids[1]]);
            }
            other => panic!("unexpected result: {other:?}"),
        }

        match order.plan_reorder(&[ids[0], ids[0]]) {
            Err(OrderError::SetMismatch { duplicates, missing, .. }) => {
                assert_eq!(duplicates, vec![ids[0]]);
                assert_eq!(missing, vec![ids[1]]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn reorder_densifies_gapped_container() {
        let (order, ids) = container_with(&[2, 5]);
        let writes = order.plan_reorder(&ids).expect("valid");
        assert_eq!(
            writes,
            vec![
                PositionWrite { id: ids[0], position: 1 },
                PositionWrite { id: ids[1], position: 2 },
            ]
        );
    }

    #[test]
    fn move_closes_source_gap_and_appends() {
        let (source, source_ids) = container_with(&[1, 2, 3]);
        let (target, _) = container_with(&[]);

        let plan = plan_move(&source, &target, source_ids[1], None).expect("member in source");
        assert_eq!(plan.from_position, 2);
        assert_eq!(plan.position, 1);
        assert_eq!(
            plan.source_writes,
            vec![PositionWrite { id: source_ids[2], position: 2 }]
        );
        assert!(plan.target_writes.is_empty());
    }

    #[test]
    fn move_with_explicit_slot_shifts_target() {
        let (source, source_ids) = container_with(&[1]);
        let (target, target_ids) = container_with(&[1, 2]);

        let plan = plan_move(&source, &target, source_ids[0], Some(1)).expect("member in source");
        assert_eq!(plan.position, 1);
        assert!(plan.source_writes.is_empty());
        assert_eq!(
            plan.target_writes,
            vec![
                PositionWrite { id: target_ids[0], position: 2 },
                PositionWrite { id: target_ids[1], position: 3 },
            ]
        );
    }

    #[test]
    fn move_clamps_out_of_range_slots() {
        let (source, source_ids) = container_with(&[1, 2]);
        let (target, _) = container_with(&[1, 2]);

        let far = plan_move(&source, &target, source_ids[0], Some(40)).expect("planned");
        assert_eq!(far.position, 3);
        assert!(far.target_writes.is_empty());

        let low = plan_move(&source, &target, source_ids[1], Some(-3)).expect("planned");
        assert_eq!(low.position, 1);
        assert_eq!(low.target_writes.len(), 2);
    }

    #[test]
    fn move_within_same_container_is_not_planned() {
        let (source, ids) = container_with(&[1, 2]);
        assert!(plan_move(&source, &source, ids[0], None).is_none());
    }

    #[test]
    fn move_of_foreign_member_is_not_planned() {
        let (source, _) = container_with(&[1]);
        let (target, _) = container_with(&[1]);
        assert!(plan_move(&source, &target, Uuid::new_v4(), None).is_none());
    }

    #[test]
    fn density_check() {
        assert!(is_dense(&[]));
        assert!(is_dense(&[2, 1, 3]));
        assert!(!is_dense(&[1, 1]));
        assert!(!is_dense(&[1, 3]));
    }
}
