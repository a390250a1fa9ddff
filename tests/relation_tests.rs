/// Relation and typed model tests
///
/// To-one and to-many relations, and models declared with `model!`.
/// Run with: cargo test --test relation_tests

use std::sync::Arc;

use fezmodel::{
    DataSource, FieldMap, MemoryCache, MemoryStorage, Model, Predicate, QueryArg, Storage, Value, fields,
};

use recording::{RecordingCache, RecordingStorage, StorageCall};

fezmodel::model! {
    /// Account owning items.
    pub struct User {
        kind: "user",
        table: "users",
        primary_key: "id",
        fields: { name: String, active: bool },
        relations: {
            items => many("owner_id", "item"),
        },
    }
}

fezmodel::model! {
    pub struct Item {
        kind: "item",
        table: "items",
        primary_key: "id",
        fields: { label: String, status: String, weight: f64 },
        relations: {
            owner => one("owner_id", "user"),
        },
    }
}

fn item(owner: i64, label: &str, status: &str) -> FieldMap {
    fields([
        ("owner_id", Value::from(owner)),
        ("label", Value::from(label)),
        ("status", Value::from(status)),
    ])
}

fn setup() -> (Arc<RecordingStorage<MemoryStorage>>, DataSource) {
    let memory = MemoryStorage::new()
        .with_table("users", "id")
        .unwrap()
        .with_table("items", "id")
        .unwrap();
    memory.insert("users", &fields([("id", Value::from(7)), ("name", Value::from("seven"))])).unwrap();
    memory.insert("users", &fields([("id", Value::from(8)), ("name", Value::from("eight"))])).unwrap();
    memory.insert("items", &item(7, "a", "active")).unwrap();
    memory.insert("items", &item(7, "b", "retired")).unwrap();
    memory.insert("items", &item(8, "c", "active")).unwrap();
    memory.insert("items", &item(7, "d", "active")).unwrap();

    let storage = Arc::new(RecordingStorage::new(memory));
    let mut source = DataSource::new(storage.clone(), Arc::new(RecordingCache::new(MemoryCache::new())));
    source.register_model::<User>().unwrap();
    source.register_model::<Item>().unwrap();
    (storage, source)
}

#[test]
fn test_related_many_merges_owner_key() {
    let (storage, source) = setup();
    let uow = source.unit_of_work();
    let user = uow.get("user", 7).unwrap();

    let items = user
        .related_many("items", &[QueryArg::from(fields([("status", "active")]))])
        .unwrap()
        .unwrap();

    assert_eq!(items.kind(), "item");
    assert_eq!(items.ids(), &[1, 4]);
    assert_eq!(
        storage.calls(),
        vec![StorageCall::Select {
            table: "items".to_string(),
            selection: fezmodel::Selection::column("id"),
            predicate: Predicate::Fields(fields([
                ("owner_id", Value::from(7)),
                ("status", Value::from("active")),
            ])),
            order: None,
            limit: None,
        }]
    );
}

#[test]
fn test_related_many_raw_order_and_limit() {
    let (storage, source) = setup();
    let uow = source.unit_of_work();
    let user = uow.get("user", 7).unwrap();

    let items = user
        .related_many(
            "items",
            &["label <> 'b'".into(), "label DESC".into(), "0,1".into()],
        )
        .unwrap()
        .unwrap();
    assert_eq!(items.ids(), &[4]);

    match storage.calls().last() {
        Some(StorageCall::Select { predicate, order, limit, .. }) => {
            assert_eq!(*predicate, Predicate::Raw("`owner_id` = 7 AND (label <> 'b')".to_string()));
            assert_eq!(order.as_deref(), Some("label DESC"));
            assert_eq!(*limit, Some(fezmodel::Limit::new(0, 1)));
        }
        other => panic!("unexpected call: {:?}", other),
    }

    let all = user.related_many("items", &[]).unwrap().unwrap();
    assert_eq!(all.ids(), &[1, 2, 4]);
    let all = user.related_many("items", &[QueryArg::Null, QueryArg::Null]).unwrap().unwrap();
    assert_eq!(all.ids(), &[1, 2, 4]);
}

#[test]
fn test_related_many_invalid_arguments() {
    let (storage, source) = setup();
    let uow = source.unit_of_work();
    let user = uow.get("user", 7).unwrap();

    let four: Vec<QueryArg> = vec![QueryArg::Null; 4];
    assert!(user.related_many("items", &four).unwrap().is_none());
    assert!(user.related_many("widgets", &[]).unwrap().is_none());
    assert!(user.related_many_count("items", &[QueryArg::Null, QueryArg::Null]).unwrap().is_none());
    assert!(user.related_many_count("widgets", &[]).unwrap().is_none());
    assert!(
        user.related_many("items", &[QueryArg::Null, QueryArg::Fields(FieldMap::new())])
            .unwrap()
            .is_none()
    );
    assert_eq!(storage.call_count(), 0);

    let item = uow.get("item", 1).unwrap();
    assert!(item.related_many("owner", &[]).unwrap().is_none());

    let unsaved = uow.create("user").unwrap();
    assert!(unsaved.related_many("items", &[]).unwrap().is_none());
}

#[test]
fn test_related_many_count() {
    let (storage, source) = setup();
    let uow = source.unit_of_work();
    let user = uow.get("user", 7).unwrap();

    assert_eq!(user.related_many_count("items", &[]).unwrap(), Some(3));
    assert_eq!(
        user.related_many_count("items", &[fields([("status", "active")]).into()]).unwrap(),
        Some(2)
    );
    assert_eq!(
        user.related_many_count("items", &["status = 'retired'".into()]).unwrap(),
        Some(1)
    );
    assert!(storage.calls().iter().all(|call| matches!(
        call,
        StorageCall::Select { selection: fezmodel::Selection::Count, .. }
    )));
}

#[test]
fn test_related_one_follows_local_key() {
    let (_, source) = setup();
    let uow = source.unit_of_work();
    let item = uow.get("item", 1).unwrap();

    let owner = item.related("owner").unwrap().unwrap();
    assert_eq!(owner.id(), Some(7));
    assert!(owner.ptr_eq(&uow.get("user", 7).unwrap()));
    assert!(item.related("owner").unwrap().unwrap().ptr_eq(&owner));

    item.set("owner_id", 8).unwrap();
    let new_owner = item.related("owner").unwrap().unwrap();
    assert_eq!(new_owner.get_as::<String>("name").unwrap(), Some("eight".to_string()));

    item.set("owner_id", Value::Null).unwrap();
    assert!(item.related("owner").unwrap().is_none());
    assert!(item.related("items").unwrap().is_none());
}

#[test]
fn test_related_entities_share_identity_with_search() {
    let (_, source) = setup();
    let uow = source.unit_of_work();
    let user = uow.get("user", 7).unwrap();

    let items = user.related_many("items", &[]).unwrap().unwrap();
    let first = items.first().unwrap();
    first.set("status", "lost").unwrap();

    let searched = uow.search("item", Predicate::All, None, None).unwrap();
    let same = searched.first().unwrap();
    assert!(same.ptr_eq(&first));
    assert_eq!(same.get_as::<String>("status").unwrap(), Some("lost".to_string()));
}

#[test]
fn test_typed_model_accessors() {
    let (storage, source) = setup();
    let uow = source.unit_of_work();

    let user = User::fetch(&uow, 7).unwrap();
    assert_eq!(user.name().unwrap(), Some("seven".to_string()));
    assert_eq!(user.active().unwrap(), None);

    user.set_name("Seven".to_string()).unwrap();
    user.set_active(true).unwrap();
    assert!(user.commit().unwrap());
    assert_eq!(
        storage.updates(),
        vec![fields([("active", Value::from(true)), ("name", Value::from("Seven"))])]
    );

    let items: Vec<Item> = user
        .entity()
        .related_many("items", &[])
        .unwrap()
        .unwrap()
        .iter_as::<Item>()
        .collect();
    assert_eq!(items.len(), 3);
    assert_eq!(items[0].label().unwrap(), Some("a".to_string()));
    assert_eq!(items[0].weight().unwrap(), None);
}

#[test]
fn test_typed_model_create_and_search() {
    let (_, source) = setup();
    let uow = source.unit_of_work();

    let item = Item::create(&uow).unwrap();
    item.set_label("e".to_string()).unwrap();
    item.set_status("active".to_string()).unwrap();
    item.set_weight(1.5).unwrap();
    item.entity().set("owner_id", 8).unwrap();
    assert!(item.commit().unwrap());
    assert_eq!(item.id(), Some(5));

    let active = Item::search(&uow, fields([("status", "active")]), Some("id DESC"), None).unwrap();
    assert_eq!(active.ids(), &[5, 4, 3, 1]);
    assert!(active.first().unwrap().ptr_eq(item.entity()));

    let found = Item::find(&uow, 5).unwrap();
    assert_eq!(found.weight().unwrap(), Some(1.5));
    assert!(Item::find(&uow, 99).unwrap_err().is_not_found());
}

#[test]
fn test_model_definition_from_macro() {
    let def = User::definition();
    assert_eq!(User::KIND, "user");
    assert_eq!(def.table(), "users");
    assert_eq!(def.primary_key(), "id");
    let items = def.get_relation("items").unwrap();
    assert_eq!(items.local_key, "owner_id");
    assert_eq!(items.foreign, "item");
    assert_eq!(items.cardinality, fezmodel::Cardinality::Many);
}
