use bookshelf::document::Document;
use bookshelf::engine::Engine;
use bookshelf::query::{
    CmpOp, Filter, FindOptions, Order, SortSpec, UpdateDoc, apply_update, count_docs, eval_filter,
    find_docs, parse_filter_json, parse_update_json, update_one,
};
use bson::doc;

#[test]
fn filter_eq_and_cmp() {
    let d1 = Document::new(doc! {"age": 30, "name": "alice"});
    assert!(eval_filter(&d1.data, &Filter::Cmp { path: "age".into(), op: CmpOp::Eq, value: 30.into() }));
    assert!(!eval_filter(&d1.data, &Filter::Cmp { path: "age".into(), op: CmpOp::Gt, value: 45.into() }));
}

#[test]
fn update_set_inc_unset_nested() {
    let mut d = Document::new(doc! {"age": 30, "info": {"visits": 1}, "unused": true});
    let upd = UpdateDoc {
        set: vec![("name".into(), "alice".into())],
        inc: vec![("age".into(), 1.0), ("info.visits".into(), 2.0)],
        unset: vec!["unused".into()],
    };
    assert!(apply_update(&mut d, &upd));
    assert_eq!(d.data.get("name"), Some(&bson::Bson::String("alice".into())));
    assert_eq!(d.data.get("age"), Some(&bson::Bson::Double(31.0)));
    match d.data.get("info") {
        Some(bson::Bson::Document(info)) => assert_eq!(info.get("visits"), Some(&bson::Bson::Double(3.0))),
        other => panic!("unexpected info {other:?}"),
    }
    assert!(d.data.get("unused").is_none());
}

#[test]
fn find_sort_project_paginate() {
    let engine = Engine::new();
    let col = engine.create_collection("qtest");
    col.insert_document(Document::new(doc! {"age": 30, "name": "alice"}));
    col.insert_document(Document::new(doc! {"age": 40, "name": "bob"}));
    col.insert_document(Document::new(doc! {"age": 35, "name": "carol"}));

    let filter = Filter::Cmp { path: "age".into(), op: CmpOp::Gt, value: 30.into() };
    let opts = FindOptions {
        projection: Some(vec!["name".into()]),
        sort: Some(vec![SortSpec { field: "age".into(), order: Order::Desc }]),
        limit: Some(2),
        skip: Some(0),
    };
    let docs = find_docs(&col, &filter, &opts).to_vec();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].data.get("name"), Some(&bson::Bson::String("bob".into())));
    assert_eq!(docs[1].data.get("name"), Some(&bson::Bson::String("carol".into())));
    assert_eq!(count_docs(&col, &filter), 2);
}

#[test]
fn cursor_skips_documents_deleted_after_find() {
    let engine = Engine::new();
    let col = engine.create_collection("lazy");
    let a = col.insert_document(Document::new(doc! {"n": 1}));
    col.insert_document(Document::new(doc! {"n": 2}));
    let cursor = find_docs(&col, &Filter::True, &FindOptions::default());
    col.delete_document(&a);
    let docs: Vec<Document> = cursor.collect();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].data.get("n"), Some(&bson::Bson::Int32(2)));
}

#[test]
fn json_filter_and_update_drive_update_one() {
    let engine = Engine::new();
    let col = engine.create_collection("books");
    col.insert_document(Document::new(doc! {"author": "George Orwell", "price": 10.99}));
    col.insert_document(Document::new(doc! {"author": "George Orwell", "price": 8.5}));
    let filter = parse_filter_json(r#"{"field":"author","$eq":"George Orwell"}"#).unwrap();
    let update = parse_update_json(r#"{"$set":{"price":15.99}}"#).unwrap();
    let report = update_one(&col, &filter, &update);
    assert_eq!((report.matched, report.modified), (1, 1));
    let prices: Vec<f64> = col
        .get_all_documents()
        .iter()
        .filter_map(|d| match d.data.get("price") {
            Some(bson::Bson::Double(p)) => Some(*p),
            _ => None,
        })
        .collect();
    assert_eq!(prices, vec![15.99, 8.5]);
}

#[test]
fn in_and_nin_filters() {
    let d = Document::new(doc! {"genre": "Fantasy"});
    let set = vec![bson::Bson::from("Fantasy"), bson::Bson::from("Romance")];
    assert!(eval_filter(&d.data, &Filter::In { path: "genre".into(), values: set.clone() }));
    assert!(!eval_filter(&d.data, &Filter::Nin { path: "genre".into(), values: set }));
    assert!(eval_filter(&d.data, &Filter::Exists { path: "title".into(), exists: false }));
}
