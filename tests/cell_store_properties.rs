mod fixtures;

use cell_notebook::{CellCollection, CellStore, CellType, Direction};
use fixtures::sample_notebooks::notebook_with;
use proptest::prelude::*;
use proptest::sample::Index;
use std::collections::HashSet;

#[derive(Debug, Clone)]
enum Op {
    InsertAfter(Option<Index>, CellType),
    InsertBefore(Option<Index>, CellType),
    Move(Index, Direction),
    Delete(Index),
    DeleteAbsent,
    Update(Index, String),
}

fn cell_type() -> impl Strategy<Value = CellType> {
    prop_oneof![Just(CellType::Code), Just(CellType::Text)]
}

fn direction() -> impl Strategy<Value = Direction> {
    prop_oneof![Just(Direction::Up), Just(Direction::Down)]
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (proptest::option::of(any::<Index>()), cell_type()).prop_map(|(i, t)| Op::InsertAfter(i, t)),
        (proptest::option::of(any::<Index>()), cell_type()).prop_map(|(i, t)| Op::InsertBefore(i, t)),
        (any::<Index>(), direction()).prop_map(|(i, d)| Op::Move(i, d)),
        any::<Index>().prop_map(Op::Delete),
        Just(Op::DeleteAbsent),
        (any::<Index>(), "[a-z ;=0-9]{0,16}").prop_map(|(i, c)| Op::Update(i, c)),
    ]
}

fn assert_consistent(collection: &CellCollection) {
    let unique: HashSet<_> = collection.order().iter().collect();
    assert_eq!(unique.len(), collection.order().len(), "duplicate id in order");
    assert_eq!(collection.data().len(), collection.order().len(), "orphan cell in data");
    for id in collection.order() {
        let cell = collection.get(id.as_str()).expect("ordered id without cell");
        assert_eq!(&cell.id, id);
    }
}

fn pick(collection: &CellCollection, index: &Index) -> Option<String> {
    if collection.is_empty() {
        return None;
    }
    Some(index.get(collection.order()).to_string())
}

proptest! {
    #[test]
    fn prop_order_and_data_stay_consistent(ops in proptest::collection::vec(op(), 0..40)) {
        let mut store = CellStore::new();

        for op in ops {
            let before = store.snapshot();
            match op {
                Op::InsertAfter(index, cell_type) => {
                    let anchor = index.and_then(|i| pick(&before, &i));
                    let id = store.insert_cell_after(anchor.as_deref(), cell_type);
                    let after = store.snapshot();
                    prop_assert_eq!(after.len(), before.len() + 1);
                    let position = after.position(id.as_str()).unwrap();
                    match anchor {
                        Some(anchor) => prop_assert_eq!(after.position(&anchor).unwrap() + 1, position),
                        None => prop_assert_eq!(position, 0),
                    }
                }
                Op::InsertBefore(index, cell_type) => {
                    let anchor = index.and_then(|i| pick(&before, &i));
                    let id = store.insert_cell_before(anchor.as_deref(), cell_type);
                    let after = store.snapshot();
                    let position = after.position(id.as_str()).unwrap();
                    match anchor {
                        Some(anchor) => prop_assert_eq!(after.position(&anchor).unwrap(), position + 1),
                        None => prop_assert_eq!(position, after.len() - 1),
                    }
                }
                Op::Move(index, direction) => {
                    if let Some(id) = pick(&before, &index) {
                        store.move_cell(&id, direction);
                        let after = store.snapshot();
                        let mut old: Vec<_> = before.order().to_vec();
                        let mut new: Vec<_> = after.order().to_vec();
                        old.sort();
                        new.sort();
                        prop_assert_eq!(old, new);
                    }
                }
                Op::Delete(index) => {
                    if let Some(id) = pick(&before, &index) {
                        store.delete_cell(&id);
                        let after = store.snapshot();
                        prop_assert!(!after.contains(&id));
                        prop_assert_eq!(after.len(), before.len() - 1);
                    }
                }
                Op::DeleteAbsent => {
                    store.delete_cell("not-a-cell-id");
                    prop_assert_eq!(&*store.snapshot(), &*before);
                }
                Op::Update(index, content) => {
                    if let Some(id) = pick(&before, &index) {
                        store.update_cell(&id, content.clone()).unwrap();
                        prop_assert_eq!(&store.get(&id).unwrap().content, &content);
                        let after = store.snapshot();
                        prop_assert_eq!(after.order(), before.order());
                    }
                }
            }
            assert_consistent(&store.snapshot());
        }
    }

    #[test]
    fn prop_snapshots_are_never_mutated(contents in proptest::collection::vec("[a-z]{1,8}", 1..10)) {
        let cells: Vec<_> = contents.iter().map(|c| (CellType::Code, c.as_str())).collect();
        let (collection, ids) = notebook_with(&cells);
        let mut store = CellStore::from_collection(collection);

        let held = store.snapshot();
        let copy = (*held).clone();

        store.update_cell(ids[0].as_str(), "changed").unwrap();
        store.move_cell(ids[0].as_str(), Direction::Down);
        store.delete_cell(ids[ids.len() - 1].as_str());
        store.insert_cell_after(None, CellType::Text);

        prop_assert_eq!(&*held, &copy);
    }
}

#[test]
fn test_no_op_moves_do_not_publish() {
    let mut store = CellStore::new();
    let mut observer = store.subscribe();
    observer.mark_unchanged();

    store.move_cell("1", Direction::Up);
    store.move_cell("2", Direction::Down);
    store.move_cell("zz", Direction::Down);
    assert!(!observer.has_changed().unwrap());

    store.move_cell("1", Direction::Down);
    assert!(observer.has_changed().unwrap());
    let order: Vec<String> = observer
        .borrow_and_update()
        .order()
        .iter()
        .map(|id| id.to_string())
        .collect();
    assert_eq!(order, vec!["2", "1"]);
}
