use bookshelf::Bookshelf;
use bookshelf::books::sample_books;
use bookshelf::config::ShelfConfig;
use bookshelf::query::parse_pipeline_json;
use bookshelf::store::DocumentStore;
use bson::Bson;

fn seeded() -> Bookshelf {
    let shelf = Bookshelf::new(ShelfConfig::default()).unwrap();
    shelf.seed(sample_books()).unwrap();
    shelf
}

#[test]
fn json_pipeline_matches_typed_genre_report() {
    let shelf = seeded();
    let pipeline = parse_pipeline_json(
        r#"[
            {"$group": {"_id": "$genre", "averagePrice": {"$avg": "$price"},
                        "bookCount": {"$sum": 1}, "totalPages": {"$sum": "$pages"}}},
            {"$sort": {"averagePrice": -1}}
        ]"#,
    )
    .unwrap();
    let rows = shelf.collection().unwrap().aggregate(&pipeline).unwrap();
    let typed = shelf.runner().unwrap().avg_price_by_genre().unwrap();
    assert_eq!(rows.len(), typed.len());
    for (row, t) in rows.iter().zip(&typed) {
        assert_eq!(row.get("_id"), Some(&Bson::String(t.genre.clone())));
        assert_eq!(row.get("bookCount"), Some(&Bson::Int32(i32::try_from(t.book_count).unwrap())));
    }
    let genres: Vec<&str> = typed.iter().map(|g| g.genre.as_str()).collect();
    assert_eq!(genres, vec!["Fantasy", "Dystopian", "Fiction", "Political Satire", "Romance"]);
}

#[test]
fn match_after_group_filters_groups() {
    let shelf = seeded();
    let pipeline = parse_pipeline_json(
        r#"[
            {"$group": {"_id": "$author", "bookCount": {"$sum": 1}, "books": {"$push": "$title"}}},
            {"$match": {"field": "bookCount", "$gt": 1}},
            {"$sort": {"bookCount": -1}},
            {"$limit": 2}
        ]"#,
    )
    .unwrap();
    let rows = shelf.collection().unwrap().aggregate(&pipeline).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].get("_id"), Some(&Bson::String("George Orwell".into())));
    assert_eq!(
        rows[0].get("books"),
        Some(&Bson::Array(vec![Bson::String("1984".into()), Bson::String("Animal Farm".into())]))
    );
}

#[test]
fn empty_collection_aggregates_to_nothing() {
    let shelf = Bookshelf::new(ShelfConfig::default()).unwrap();
    assert!(shelf.runner().unwrap().avg_price_by_genre().unwrap().is_empty());
    assert!(shelf.runner().unwrap().multi_book_authors().unwrap().is_empty());
}
