use rusqlite::Connection;
use trellis_core::db::open_db_in_memory;
use trellis_core::model::board::{NewCard, NewList};
use trellis_core::repo::board_repo::{BoardRepository, SqliteBoardRepository};
use trellis_core::{
    BoardId, BoardService, CardId, ContainerRef, EntityKind, EntityRef, KeySpace, ListId,
    MoveCoordinator, NewBoard, OrderKey, OrderedContainerRepository, RepoError,
    SqliteContainerRepository,
};
use uuid::Uuid;

fn setup() -> (Connection, Uuid) {
    (open_db_in_memory().unwrap(), Uuid::new_v4())
}

fn new_board(conn: &Connection, owner: Uuid) -> BoardId {
    BoardService::try_new(conn)
        .unwrap()
        .create_board(&NewBoard::new("Sprint", owner))
        .unwrap()
        .board_uuid
}

fn list_at(conn: &Connection, board: BoardId, title: &str, position: OrderKey) -> ListId {
    SqliteBoardRepository::try_new(conn)
        .unwrap()
        .create_list(&NewList {
            board_uuid: board,
            title: title.to_string(),
            position,
        })
        .unwrap()
        .list_uuid
}

fn card_at(conn: &Connection, list: ListId, title: &str, position: OrderKey, owner: Uuid) -> CardId {
    SqliteBoardRepository::try_new(conn)
        .unwrap()
        .create_card(&NewCard {
            list_uuid: list,
            title: title.to_string(),
            description: String::new(),
            position,
            created_by: owner,
        })
        .unwrap()
        .card_uuid
}

fn ordered_ids(conn: &Connection, container: ContainerRef) -> Vec<Uuid> {
    SqliteContainerRepository::try_new(conn)
        .unwrap()
        .list_ordered(container, false)
        .unwrap()
        .into_iter()
        .map(|entry| entry.id)
        .collect()
}

#[test]
fn list_ordered_sorts_by_key_then_creation() {
    let (conn, owner) = setup();
    let board = new_board(&conn, owner);
    let list = list_at(&conn, board, "Backlog", 1.0);

    let second = card_at(&conn, list, "b", 2.0, owner);
    let first = card_at(&conn, list, "a", 1.0, owner);
    let third = card_at(&conn, list, "c", 2.0, owner);

    let container = ContainerRef::List(list);
    let expected = vec![first, second, third];
    assert_eq!(ordered_ids(&conn, container), expected);
    assert_eq!(ordered_ids(&conn, container), expected);
}

#[test]
fn archived_members_are_hidden_unless_requested() {
    let (conn, owner) = setup();
    let board = new_board(&conn, owner);
    let list = list_at(&conn, board, "Backlog", 1.0);
    let kept = card_at(&conn, list, "kept", 1.0, owner);
    let archived = card_at(&conn, list, "archived", 2.0, owner);
    SqliteBoardRepository::try_new(&conn)
        .unwrap()
        .set_card_archived(archived, true)
        .unwrap();

    let repo = SqliteContainerRepository::try_new(&conn).unwrap();
    let visible = repo.list_ordered(ContainerRef::List(list), false).unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, kept);

    let all = repo.list_ordered(ContainerRef::List(list), true).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[1].id, archived);
    assert_eq!(all[1].position, 2.0);
}

#[test]
fn batch_write_skips_ids_from_other_containers() {
    let (conn, owner) = setup();
    let board = new_board(&conn, owner);
    let backlog = list_at(&conn, board, "Backlog", 1.0);
    let done = list_at(&conn, board, "Done", 2.0);
    let mine = card_at(&conn, backlog, "mine", 1.0, owner);
    let foreign = card_at(&conn, done, "foreign", 1.0, owner);

    let repo = SqliteContainerRepository::try_new(&conn).unwrap();
    let outcome = repo
        .write_positions_batch(ContainerRef::List(backlog), &[(mine, 5.0), (foreign, 0.5)])
        .unwrap();
    assert_eq!(outcome.applied, 1);
    assert_eq!(outcome.skipped, 1);

    let foreign_card = SqliteBoardRepository::try_new(&conn)
        .unwrap()
        .get_card(foreign)
        .unwrap()
        .unwrap();
    assert_eq!(foreign_card.list_uuid, done);
    assert_eq!(foreign_card.position, 1.0);
}

#[test]
fn write_position_reports_missing_entity() {
    let (conn, _) = setup();
    let repo = SqliteContainerRepository::try_new(&conn).unwrap();
    let missing = Uuid::new_v4();

    match repo.write_position(EntityRef::Card(missing), 1.0) {
        Err(RepoError::NotFound { kind, id }) => {
            assert_eq!(kind, EntityKind::Card);
            assert_eq!(id, missing);
        }
        other => panic!("expected not found, got {other:?}"),
    }
}

#[test]
fn owning_board_is_resolved_per_entity_variant() {
    let (conn, owner) = setup();
    let board = new_board(&conn, owner);
    let list = list_at(&conn, board, "Backlog", 1.0);
    let card = card_at(&conn, list, "card", 1.0, owner);

    let repo = SqliteContainerRepository::try_new(&conn).unwrap();
    assert_eq!(repo.owning_board(EntityRef::List(list)).unwrap(), Some(board));
    assert_eq!(repo.owning_board(EntityRef::Card(card)).unwrap(), Some(board));
    assert_eq!(
        repo.owning_board(EntityRef::Card(Uuid::new_v4())).unwrap(),
        None
    );
    assert_eq!(
        repo.container_board(ContainerRef::Board(board)).unwrap(),
        Some(board)
    );
    assert_eq!(
        repo.parent_of(EntityRef::Card(card)).unwrap(),
        Some(ContainerRef::List(list))
    );
    assert!(!repo
        .container_exists(ContainerRef::List(Uuid::new_v4()))
        .unwrap());
}

#[test]
fn renumber_restores_spacing_and_keeps_order() {
    let (conn, owner) = setup();
    let board = new_board(&conn, owner);
    let list = list_at(&conn, board, "Backlog", 1.0);
    let a = card_at(&conn, list, "a", 0.5, owner);
    let b = card_at(&conn, list, "b", 0.500_000_01, owner);
    let c = card_at(&conn, list, "c", 7.0, owner);
    SqliteBoardRepository::try_new(&conn)
        .unwrap()
        .set_card_archived(b, true)
        .unwrap();

    let repo = SqliteContainerRepository::try_new(&conn).unwrap();
    let count = repo
        .renumber(ContainerRef::List(list), &KeySpace::default())
        .unwrap();
    assert_eq!(count, 3);

    let all = repo.list_ordered(ContainerRef::List(list), true).unwrap();
    let ids: Vec<Uuid> = all.iter().map(|entry| entry.id).collect();
    let keys: Vec<OrderKey> = all.iter().map(|entry| entry.position).collect();
    assert_eq!(ids, vec![a, b, c]);
    assert_eq!(keys, vec![1.0, 2.0, 3.0]);
}

#[test]
fn appended_cards_get_strictly_increasing_keys() {
    let (conn, owner) = setup();
    let service = BoardService::try_new(&conn).unwrap();
    let board = service
        .create_board(&NewBoard::new("Sprint", owner))
        .unwrap();
    let list = service
        .create_list(board.board_uuid, "Backlog", owner)
        .unwrap();
    assert_eq!(list.position, 1.0);

    let keys: Vec<OrderKey> = (0..5)
        .map(|index| {
            service
                .create_card(list.list_uuid, format!("task {index}"), "", owner)
                .unwrap()
                .position
        })
        .collect();
    assert_eq!(keys[0], 1.0);
    assert!(keys.windows(2).all(|pair| pair[0] < pair[1]));
}

#[test]
fn exhausted_gap_is_recovered_by_renumbering() {
    let (conn, owner) = setup();
    let board = new_board(&conn, owner);
    let backlog = list_at(&conn, board, "Backlog", 1.0);
    let done = list_at(&conn, board, "Done", 2.0);
    let lower = card_at(&conn, backlog, "lower", 1.0, owner);
    let upper = card_at(&conn, backlog, "upper", f64::from_bits(1.0_f64.to_bits() + 1), owner);
    let moving = card_at(&conn, done, "moving", 1.0, owner);

    let coordinator = MoveCoordinator::try_new(&conn).unwrap();
    let key = coordinator
        .move_card_to_index(moving, backlog, 1, owner)
        .unwrap();

    assert_eq!(key, 1.5);
    assert_eq!(
        ordered_ids(&conn, ContainerRef::List(backlog)),
        vec![lower, moving, upper]
    );
}

#[test]
fn deleting_a_card_leaves_sibling_keys_untouched() {
    let (conn, owner) = setup();
    let service = BoardService::try_new(&conn).unwrap();
    let board = service
        .create_board(&NewBoard::new("Sprint", owner))
        .unwrap();
    let list = service
        .create_list(board.board_uuid, "Backlog", owner)
        .unwrap();
    let first = service.create_card(list.list_uuid, "a", "", owner).unwrap();
    let middle = service.create_card(list.list_uuid, "b", "", owner).unwrap();
    let last = service.create_card(list.list_uuid, "c", "", owner).unwrap();

    service.delete_card(middle.card_uuid, owner).unwrap();

    let cards = service.cards(list.list_uuid, false).unwrap();
    assert_eq!(cards.len(), 2);
    assert_eq!(cards[0].position, first.position);
    assert_eq!(cards[1].position, last.position);
}
