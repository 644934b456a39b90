use notegraph_core::db::open_db_in_memory;
use notegraph_core::{
    Branch, BranchRepository, ChangeKind, ChangeLog, CloneOutcome, MoveOutcome, NoteId,
    PlacementRejection, SqliteBranchRepository, SqliteChangeLog, TreeService, TreeServiceError,
};
use rusqlite::Connection;
use uuid::Uuid;

const DEVICE: &str = "device-a";
// Reader id distinct from every writer, so nothing is suppressed.
const READER: &str = "reader";

fn setup() -> Connection {
    open_db_in_memory().unwrap()
}

fn service(conn: &Connection) -> TreeService<SqliteBranchRepository<'_>, SqliteChangeLog<'_>> {
    TreeService::new(
        SqliteBranchRepository::try_new(conn).unwrap(),
        SqliteChangeLog::new(conn),
    )
}

fn clone_into(
    service: &TreeService<SqliteBranchRepository<'_>, SqliteChangeLog<'_>>,
    note_uuid: NoteId,
    parent_uuid: Option<NoteId>,
) -> Branch {
    match service.clone_to_parent(note_uuid, parent_uuid, DEVICE).unwrap() {
        CloneOutcome::Created(branch) => branch,
        CloneOutcome::Rejected(rejection) => panic!("unexpected rejection: {rejection}"),
    }
}

fn children(conn: &Connection, parent_uuid: Option<NoteId>) -> Vec<Branch> {
    SqliteBranchRepository::try_new(conn)
        .unwrap()
        .list_children(parent_uuid, false)
        .unwrap()
}

fn branch_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM branches;", [], |row| row.get(0))
        .unwrap()
}

fn assert_ordering_invariants(conn: &Connection) {
    let duplicate_positions: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM (
                SELECT parent_uuid, position, COUNT(*) AS n
                FROM branches
                WHERE is_deleted = 0
                GROUP BY parent_uuid, position
                HAVING n > 1
            );",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(duplicate_positions, 0, "active siblings share a position");

    let duplicate_placements: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM (
                SELECT note_uuid, parent_uuid, COUNT(*) AS n
                FROM branches
                WHERE is_deleted = 0
                GROUP BY note_uuid, parent_uuid
                HAVING n > 1
            );",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(
        duplicate_placements, 0,
        "note placed twice under the same parent"
    );
}

#[test]
fn clone_to_parent_appends_after_existing_siblings() {
    let conn = setup();
    let service = service(&conn);
    let parent = Uuid::new_v4();

    let first = clone_into(&service, Uuid::new_v4(), Some(parent));
    let second = clone_into(&service, Uuid::new_v4(), Some(parent));

    assert_eq!(first.position, 0);
    assert_eq!(second.position, 1);
    assert!(!second.is_expanded);
    assert!(second.is_active());

    let listed = children(&conn, Some(parent));
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].branch_uuid, first.branch_uuid);
    assert_eq!(listed[1].branch_uuid, second.branch_uuid);
    assert_ordering_invariants(&conn);
}

#[test]
fn move_to_empty_parent_takes_position_zero() {
    let conn = setup();
    let service = service(&conn);
    let old_parent = Uuid::new_v4();
    let new_parent = Uuid::new_v4();

    let branch = clone_into(&service, Uuid::new_v4(), Some(old_parent));
    let outcome = service
        .move_to_parent(branch.branch_uuid, Some(new_parent), DEVICE)
        .unwrap();

    let MoveOutcome::Moved(moved) = outcome else {
        panic!("move should succeed");
    };
    assert_eq!(moved.parent_uuid, Some(new_parent));
    assert_eq!(moved.position, 0);

    assert!(children(&conn, Some(old_parent)).is_empty());
    assert_eq!(children(&conn, Some(new_parent)).len(), 1);
    assert_ordering_invariants(&conn);
}

#[test]
fn move_to_parent_appends_after_existing_siblings() {
    let conn = setup();
    let service = service(&conn);
    let target = Uuid::new_v4();

    let _sibling_a = clone_into(&service, Uuid::new_v4(), Some(target));
    let _sibling_b = clone_into(&service, Uuid::new_v4(), Some(target));
    let branch = clone_into(&service, Uuid::new_v4(), None);

    let outcome = service
        .move_to_parent(branch.branch_uuid, Some(target), DEVICE)
        .unwrap();
    let MoveOutcome::Moved(moved) = outcome else {
        panic!("move should succeed");
    };
    assert_eq!(moved.position, 2);
    assert_ordering_invariants(&conn);
}

#[test]
fn move_before_inserts_at_anchor_position_and_shifts_rest() {
    let conn = setup();
    let service = service(&conn);
    let parent = Uuid::new_v4();

    // Siblings at positions [0, 1, 2]; insert-before the middle one.
    let old0 = clone_into(&service, Uuid::new_v4(), Some(parent));
    let old1 = clone_into(&service, Uuid::new_v4(), Some(parent));
    let old2 = clone_into(&service, Uuid::new_v4(), Some(parent));
    let moving = clone_into(&service, Uuid::new_v4(), None);

    let outcome = service
        .move_before(moving.branch_uuid, old1.branch_uuid, DEVICE)
        .unwrap();
    let MoveOutcome::Moved(moved) = outcome else {
        panic!("move should succeed");
    };
    assert_eq!(moved.parent_uuid, Some(parent));
    assert_eq!(moved.position, 1);

    let listed = children(&conn, Some(parent));
    let ids: Vec<_> = listed.iter().map(|branch| branch.branch_uuid).collect();
    assert_eq!(
        ids,
        vec![
            old0.branch_uuid,
            moving.branch_uuid,
            old1.branch_uuid,
            old2.branch_uuid
        ]
    );
    let positions: Vec<_> = listed.iter().map(|branch| branch.position).collect();
    assert_eq!(positions, vec![0, 1, 2, 3]);
    assert_ordering_invariants(&conn);
}

#[test]
fn move_after_inserts_past_anchor_and_shifts_only_beyond() {
    let conn = setup();
    let service = service(&conn);
    let parent = Uuid::new_v4();

    let old0 = clone_into(&service, Uuid::new_v4(), Some(parent));
    let old1 = clone_into(&service, Uuid::new_v4(), Some(parent));
    let old2 = clone_into(&service, Uuid::new_v4(), Some(parent));
    let moving = clone_into(&service, Uuid::new_v4(), None);

    let outcome = service
        .move_after(moving.branch_uuid, old1.branch_uuid, DEVICE)
        .unwrap();
    let MoveOutcome::Moved(moved) = outcome else {
        panic!("move should succeed");
    };
    assert_eq!(moved.position, 2);

    let listed = children(&conn, Some(parent));
    let ids: Vec<_> = listed.iter().map(|branch| branch.branch_uuid).collect();
    assert_eq!(
        ids,
        vec![
            old0.branch_uuid,
            old1.branch_uuid,
            moving.branch_uuid,
            old2.branch_uuid
        ]
    );
    // The anchor and everything before it keep their positions.
    assert_eq!(listed[0].position, 0);
    assert_eq!(listed[1].position, 1);
    assert_eq!(listed[3].position, 3);
    assert_ordering_invariants(&conn);
}

#[test]
fn move_before_reorders_within_the_same_parent() {
    let conn = setup();
    let service = service(&conn);
    let parent = Uuid::new_v4();

    let first = clone_into(&service, Uuid::new_v4(), Some(parent));
    let second = clone_into(&service, Uuid::new_v4(), Some(parent));
    let third = clone_into(&service, Uuid::new_v4(), Some(parent));

    let outcome = service
        .move_before(third.branch_uuid, first.branch_uuid, DEVICE)
        .unwrap();
    assert!(matches!(outcome, MoveOutcome::Moved(_)));

    let listed = children(&conn, Some(parent));
    let ids: Vec<_> = listed.iter().map(|branch| branch.branch_uuid).collect();
    assert_eq!(
        ids,
        vec![third.branch_uuid, first.branch_uuid, second.branch_uuid]
    );
    assert_ordering_invariants(&conn);
}

#[test]
fn shifted_siblings_keep_their_modification_marker() {
    let conn = setup();
    let service = service(&conn);
    let parent = Uuid::new_v4();

    let old0 = clone_into(&service, Uuid::new_v4(), Some(parent));
    let old1 = clone_into(&service, Uuid::new_v4(), Some(parent));
    let moving = clone_into(&service, Uuid::new_v4(), None);

    // Pin every marker to a known old value, then insert before old0.
    conn.execute("UPDATE branches SET modified_at = 1000;", [])
        .unwrap();
    service
        .move_before(moving.branch_uuid, old0.branch_uuid, DEVICE)
        .unwrap();

    let repo = SqliteBranchRepository::try_new(&conn).unwrap();
    let shifted0 = repo.get_branch(old0.branch_uuid, false).unwrap().unwrap();
    let shifted1 = repo.get_branch(old1.branch_uuid, false).unwrap().unwrap();
    let moved = repo.get_branch(moving.branch_uuid, false).unwrap().unwrap();

    assert_eq!(shifted0.position, 1);
    assert_eq!(shifted1.position, 2);
    assert_eq!(shifted0.modified_at, 1000);
    assert_eq!(shifted1.modified_at, 1000);
    assert!(moved.modified_at > 1000);
}

#[test]
fn clone_into_descendant_is_rejected_as_cycle() {
    let conn = setup();
    let service = service(&conn);

    // x -> y -> z; placing x under z would close a loop.
    let x = Uuid::new_v4();
    let y = Uuid::new_v4();
    let z = Uuid::new_v4();
    clone_into(&service, x, None);
    clone_into(&service, y, Some(x));
    clone_into(&service, z, Some(y));
    let before = branch_count(&conn);

    let outcome = service.clone_to_parent(x, Some(z), DEVICE).unwrap();
    assert_eq!(
        outcome,
        CloneOutcome::Rejected(PlacementRejection::WouldCreateCycle)
    );
    assert_eq!(branch_count(&conn), before);
    assert_ordering_invariants(&conn);
}

#[test]
fn cycle_check_follows_every_parent_of_a_cloned_note() {
    let conn = setup();
    let service = service(&conn);

    // Diamond ancestry: shared sits under both left and right; only the
    // right path leads back up to x. Every path must be clear, so placing
    // x under shared is still a cycle.
    let x = Uuid::new_v4();
    let left = Uuid::new_v4();
    let right = Uuid::new_v4();
    let shared = Uuid::new_v4();
    clone_into(&service, left, None);
    clone_into(&service, x, None);
    clone_into(&service, right, Some(x));
    clone_into(&service, shared, Some(left));
    match service.clone_to_parent(shared, Some(right), DEVICE).unwrap() {
        CloneOutcome::Created(_) => {}
        CloneOutcome::Rejected(rejection) => panic!("unexpected rejection: {rejection}"),
    }

    let outcome = service.clone_to_parent(x, Some(shared), DEVICE).unwrap();
    assert_eq!(
        outcome,
        CloneOutcome::Rejected(PlacementRejection::WouldCreateCycle)
    );

    // The safe direction still works: left has no path back to shared.
    let outcome = service
        .clone_to_parent(Uuid::new_v4(), Some(shared), DEVICE)
        .unwrap();
    assert!(matches!(outcome, CloneOutcome::Created(_)));
    assert_ordering_invariants(&conn);
}

#[test]
fn clone_rejects_duplicate_placement_under_same_parent() {
    let conn = setup();
    let service = service(&conn);
    let parent = Uuid::new_v4();
    let note = Uuid::new_v4();

    clone_into(&service, note, Some(parent));
    let before = branch_count(&conn);

    let outcome = service.clone_to_parent(note, Some(parent), DEVICE).unwrap();
    assert_eq!(
        outcome,
        CloneOutcome::Rejected(PlacementRejection::DuplicatePlacement)
    );
    assert_eq!(branch_count(&conn), before);
    assert_ordering_invariants(&conn);
}

#[test]
fn clone_after_places_next_to_anchor_and_checks_anchor_parent() {
    let conn = setup();
    let service = service(&conn);
    let parent = Uuid::new_v4();

    let anchor = clone_into(&service, Uuid::new_v4(), Some(parent));
    let tail = clone_into(&service, Uuid::new_v4(), Some(parent));

    let outcome = service
        .clone_after(Uuid::new_v4(), anchor.branch_uuid, DEVICE)
        .unwrap();
    let CloneOutcome::Created(created) = outcome else {
        panic!("clone should succeed");
    };
    assert_eq!(created.parent_uuid, Some(parent));
    assert_eq!(created.position, 1);

    let listed = children(&conn, Some(parent));
    let ids: Vec<_> = listed.iter().map(|branch| branch.branch_uuid).collect();
    assert_eq!(
        ids,
        vec![anchor.branch_uuid, created.branch_uuid, tail.branch_uuid]
    );

    // Duplicate and cycle preconditions are evaluated against the anchor's
    // own parent.
    let outcome = service
        .clone_after(created.note_uuid, anchor.branch_uuid, DEVICE)
        .unwrap();
    assert_eq!(
        outcome,
        CloneOutcome::Rejected(PlacementRejection::DuplicatePlacement)
    );
    assert_ordering_invariants(&conn);
}

#[test]
fn move_into_descendant_is_rejected_as_cycle() {
    let conn = setup();
    let service = service(&conn);

    let x = Uuid::new_v4();
    let y = Uuid::new_v4();
    let x_branch = clone_into(&service, x, None);
    let y_branch = clone_into(&service, y, Some(x));

    let outcome = service
        .move_before(x_branch.branch_uuid, y_branch.branch_uuid, DEVICE)
        .unwrap();
    assert_eq!(
        outcome,
        MoveOutcome::Rejected(PlacementRejection::WouldCreateCycle)
    );

    let outcome = service
        .move_to_parent(x_branch.branch_uuid, Some(y), DEVICE)
        .unwrap();
    assert_eq!(
        outcome,
        MoveOutcome::Rejected(PlacementRejection::WouldCreateCycle)
    );
    assert_ordering_invariants(&conn);
}

#[test]
fn move_rejects_duplicate_placement_but_allows_same_parent_reorder() {
    let conn = setup();
    let service = service(&conn);
    let parent_p = Uuid::new_v4();
    let parent_q = Uuid::new_v4();
    let note = Uuid::new_v4();

    let in_p = clone_into(&service, note, Some(parent_p));
    let in_q = clone_into(&service, note, Some(parent_q));
    let neighbor = clone_into(&service, Uuid::new_v4(), Some(parent_p));

    // note already sits in P through `in_p`, so moving its Q placement
    // there is a duplicate.
    let outcome = service
        .move_to_parent(in_q.branch_uuid, Some(parent_p), DEVICE)
        .unwrap();
    assert_eq!(
        outcome,
        MoveOutcome::Rejected(PlacementRejection::DuplicatePlacement)
    );

    // Reordering the P placement inside P is not a duplicate of itself.
    let outcome = service
        .move_after(in_p.branch_uuid, neighbor.branch_uuid, DEVICE)
        .unwrap();
    assert!(matches!(outcome, MoveOutcome::Moved(_)));
    assert_ordering_invariants(&conn);
}

#[test]
fn relative_move_with_unknown_anchor_fails_and_leaves_store_unchanged() {
    let conn = setup();
    let service = service(&conn);
    let parent = Uuid::new_v4();

    let branch = clone_into(&service, Uuid::new_v4(), Some(parent));
    let unknown = Uuid::new_v4();
    let snapshot = children(&conn, Some(parent));

    let err = service
        .move_after(branch.branch_uuid, unknown, DEVICE)
        .unwrap_err();
    assert!(matches!(
        err,
        TreeServiceError::AnchorNotFound(id) if id == unknown
    ));

    let err = service
        .clone_after(Uuid::new_v4(), unknown, DEVICE)
        .unwrap_err();
    assert!(matches!(
        err,
        TreeServiceError::AnchorNotFound(id) if id == unknown
    ));

    assert_eq!(children(&conn, Some(parent)), snapshot);
}

#[test]
fn move_of_unknown_branch_fails_hard() {
    let conn = setup();
    let service = service(&conn);
    let unknown = Uuid::new_v4();

    let err = service
        .move_to_parent(unknown, None, DEVICE)
        .unwrap_err();
    assert!(matches!(
        err,
        TreeServiceError::BranchNotFound(id) if id == unknown
    ));
}

#[test]
fn set_expanded_flips_flag_without_any_side_effect() {
    let conn = setup();
    let service = service(&conn);
    let parent = Uuid::new_v4();

    let branch = clone_into(&service, Uuid::new_v4(), Some(parent));
    let sibling = clone_into(&service, Uuid::new_v4(), Some(parent));
    conn.execute("UPDATE branches SET modified_at = 1000;", [])
        .unwrap();

    service.set_expanded(branch.branch_uuid, true).unwrap();

    let repo = SqliteBranchRepository::try_new(&conn).unwrap();
    let toggled = repo.get_branch(branch.branch_uuid, false).unwrap().unwrap();
    let untouched = repo
        .get_branch(sibling.branch_uuid, false)
        .unwrap()
        .unwrap();
    assert!(toggled.is_expanded);
    assert_eq!(toggled.modified_at, 1000);
    assert_eq!(toggled.position, branch.position);
    assert_eq!(untouched.position, sibling.position);

    // Expansion state is local UI state: nothing reaches the journal.
    let change_log = SqliteChangeLog::new(&conn);
    conn.execute("DELETE FROM sync_changes;", []).unwrap();
    service.set_expanded(branch.branch_uuid, false).unwrap();
    assert!(change_log.changes_for_device(READER).unwrap().is_empty());
}

#[test]
fn set_expanded_of_unknown_branch_fails_hard() {
    let conn = setup();
    let service = service(&conn);
    let unknown = Uuid::new_v4();

    let err = service.set_expanded(unknown, true).unwrap_err();
    assert!(matches!(
        err,
        TreeServiceError::BranchNotFound(id) if id == unknown
    ));
}

#[test]
fn failed_move_rolls_back_shifts_and_change_records() {
    let conn = setup();
    let service = service(&conn);
    let source = Uuid::new_v4();
    let target = Uuid::new_v4();

    let moving = clone_into(&service, Uuid::new_v4(), Some(source));
    let anchor = clone_into(&service, Uuid::new_v4(), Some(target));
    let tail = clone_into(&service, Uuid::new_v4(), Some(target));
    conn.execute("DELETE FROM sync_changes;", []).unwrap();

    // Fail the moved branch's own relocate, after the sibling shift and the
    // reordering record already ran inside the transaction.
    conn.execute_batch(&format!(
        "CREATE TRIGGER branches_fail_relocate_test
         BEFORE UPDATE OF position ON branches
         WHEN NEW.branch_uuid = '{}'
         BEGIN
             SELECT RAISE(ABORT, 'forced relocate failure');
         END;",
        moving.branch_uuid
    ))
    .unwrap();

    let result = service.move_before(moving.branch_uuid, anchor.branch_uuid, DEVICE);
    assert!(result.is_err());

    let source_children = children(&conn, Some(source));
    assert_eq!(source_children.len(), 1);
    assert_eq!(source_children[0].branch_uuid, moving.branch_uuid);
    assert_eq!(source_children[0].position, moving.position);

    let target_children = children(&conn, Some(target));
    let positions: Vec<_> = target_children.iter().map(|branch| branch.position).collect();
    assert_eq!(positions, vec![anchor.position, tail.position]);

    let change_log = SqliteChangeLog::new(&conn);
    assert!(change_log.changes_for_device(READER).unwrap().is_empty());
    assert_ordering_invariants(&conn);
}

#[test]
fn schema_refuses_second_active_placement_of_note_under_parent() {
    let conn = setup();
    let service = service(&conn);
    let parent = Uuid::new_v4();
    let note = Uuid::new_v4();

    clone_into(&service, note, Some(parent));
    clone_into(&service, note, None);

    // Even a write bypassing the service's duplicate check cannot create a
    // second active placement, nested or at the root level.
    let nested = conn.execute(
        "INSERT INTO branches (branch_uuid, note_uuid, parent_uuid, position)
         VALUES (?1, ?2, ?3, 99);",
        rusqlite::params![
            Uuid::new_v4().to_string(),
            note.to_string(),
            parent.to_string()
        ],
    );
    assert!(nested.is_err());

    let root_level = conn.execute(
        "INSERT INTO branches (branch_uuid, note_uuid, parent_uuid, position)
         VALUES (?1, ?2, NULL, 99);",
        rusqlite::params![Uuid::new_v4().to_string(), note.to_string()],
    );
    assert!(root_level.is_err());
    assert_ordering_invariants(&conn);
}

#[test]
fn competing_placement_landing_mid_mutation_forces_rollback() {
    let conn = setup();
    let service = service(&conn);
    let parent = Uuid::new_v4();
    let note = Uuid::new_v4();

    let anchor = clone_into(&service, Uuid::new_v4(), Some(parent));
    conn.execute("DELETE FROM sync_changes;", []).unwrap();

    // Emulate a rival writer landing after the duplicate check passed: the
    // reordering record insert plants a competing active placement of the
    // same note, so the clone's own insert must hit the unique placement
    // index and the whole mutation must roll back.
    conn.execute_batch(&format!(
        "CREATE TRIGGER sync_changes_rival_placement_test
         AFTER INSERT ON sync_changes
         WHEN NEW.kind = 'branch_reordering'
         BEGIN
             INSERT INTO branches (branch_uuid, note_uuid, parent_uuid, position)
             VALUES ('{rival}', '{note}', '{parent}', 50);
         END;",
        rival = Uuid::new_v4(),
        note = note,
        parent = parent
    ))
    .unwrap();

    let result = service.clone_after(note, anchor.branch_uuid, DEVICE);
    assert!(result.is_err());

    // The rollback removed the rival row along with the shift and records.
    let listed = children(&conn, Some(parent));
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].branch_uuid, anchor.branch_uuid);
    assert_eq!(listed[0].position, anchor.position);

    let change_log = SqliteChangeLog::new(&conn);
    assert!(change_log.changes_for_device(READER).unwrap().is_empty());
    assert_ordering_invariants(&conn);
}

#[test]
fn soft_deleted_siblings_are_ignored_by_ordering_and_duplicate_checks() {
    let conn = setup();
    let service = service(&conn);
    let parent = Uuid::new_v4();
    let note = Uuid::new_v4();

    let tombstoned = clone_into(&service, note, Some(parent));
    conn.execute(
        "UPDATE branches SET is_deleted = 1 WHERE branch_uuid = ?1;",
        [tombstoned.branch_uuid.to_string()],
    )
    .unwrap();

    // The tombstone neither blocks re-placement nor occupies a position.
    let recreated = clone_into(&service, note, Some(parent));
    assert_eq!(recreated.position, 0);

    let listed = children(&conn, Some(parent));
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].branch_uuid, recreated.branch_uuid);
    assert_ordering_invariants(&conn);
}

#[test]
fn mutation_sequence_preserves_ordering_invariants() {
    let conn = setup();
    let service = service(&conn);
    let parent_a = Uuid::new_v4();
    let parent_b = Uuid::new_v4();

    let mut branches = Vec::new();
    for _ in 0..5 {
        branches.push(clone_into(&service, Uuid::new_v4(), Some(parent_a)));
    }

    service
        .move_before(branches[4].branch_uuid, branches[0].branch_uuid, DEVICE)
        .unwrap();
    service
        .move_after(branches[1].branch_uuid, branches[3].branch_uuid, DEVICE)
        .unwrap();
    service
        .move_to_parent(branches[2].branch_uuid, Some(parent_b), DEVICE)
        .unwrap();
    service
        .clone_after(Uuid::new_v4(), branches[3].branch_uuid, DEVICE)
        .unwrap();
    service
        .clone_to_parent(branches[2].note_uuid, Some(parent_a), DEVICE)
        .unwrap();

    assert_ordering_invariants(&conn);
    assert_eq!(children(&conn, Some(parent_a)).len(), 6);
    assert_eq!(children(&conn, Some(parent_b)).len(), 1);
}

#[test]
fn clone_records_are_attributed_to_new_branch() {
    let conn = setup();
    let service = service(&conn);
    let parent = Uuid::new_v4();

    conn.execute("DELETE FROM sync_changes;", []).unwrap();
    let created = clone_into(&service, Uuid::new_v4(), Some(parent));

    let change_log = SqliteChangeLog::new(&conn);
    let records = change_log.changes_for_device(READER).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].kind, ChangeKind::Branch);
    assert_eq!(records[0].entity_uuid, Some(created.branch_uuid));
    assert_eq!(records[0].source_device_id, DEVICE);
}
