use bookshelf::Bookshelf;
use bookshelf::books::{Book, sample_books};
use bookshelf::config::ShelfConfig;
use bookshelf::errors::DbError;
use bookshelf::query::UpdateReport;
use bookshelf::runner::{CannedQuery, QueryOutcome, QueryParams};

fn seeded() -> Bookshelf {
    let shelf = Bookshelf::new(ShelfConfig::default()).unwrap();
    shelf.seed(sample_books()).unwrap();
    shelf
}

fn titles(books: &[Book]) -> Vec<&str> {
    books.iter().map(|b| b.title.as_str()).collect()
}

#[test]
fn find_by_author_returns_exact_subset() {
    let shelf = seeded();
    let found = shelf.runner().unwrap().find_by_author("George Orwell").unwrap();
    let expected: Vec<Book> =
        sample_books().into_iter().filter(|b| b.author == "George Orwell").collect();
    assert_eq!(found, expected);
    assert!(shelf.runner().unwrap().find_by_author("george orwell").unwrap().is_empty());
}

#[test]
fn count_all_matches_seeded_cardinality() {
    let shelf = seeded();
    assert_eq!(shelf.runner().unwrap().count_all().unwrap(), sample_books().len() as u64);
}

#[test]
fn list_all_is_lazy_and_complete() {
    let shelf = seeded();
    let runner = shelf.runner().unwrap();
    let mut cursor = runner.list_all().unwrap();
    let first = cursor.next().unwrap().unwrap();
    assert_eq!(first, sample_books()[0]);
    assert_eq!(cursor.count() + 1, sample_books().len());
}

#[test]
fn find_in_stock_only_returns_stocked_books() {
    let shelf = seeded();
    let found = shelf.runner().unwrap().find_in_stock().unwrap();
    assert!(found.iter().all(|b| b.in_stock));
    assert_eq!(found.len(), sample_books().iter().filter(|b| b.in_stock).count());
}

#[test]
fn year_range_is_inclusive_and_ascending() {
    let shelf = seeded();
    let found = shelf.runner().unwrap().find_by_year_range(1940, 1960).unwrap();
    let years: Vec<i64> = found.iter().map(|b| b.published_year).collect();
    assert_eq!(years, vec![1945, 1949, 1951, 1954, 1960]);
}

#[test]
fn empty_year_range_is_rejected() {
    let shelf = seeded();
    let err = shelf.runner().unwrap().find_by_year_range(1960, 1940).unwrap_err();
    assert!(matches!(err, DbError::InvalidParams(_)));
}

#[test]
fn title_substring_is_case_insensitive_and_literal() {
    let shelf = seeded();
    let runner = shelf.runner().unwrap();
    let found = runner.find_by_title_substring("the").unwrap();
    assert_eq!(
        titles(&found),
        vec!["The Great Gatsby", "The Hobbit", "The Lord of the Rings", "The Catcher in the Rye"]
    );
    assert!(runner.find_by_title_substring(".*").unwrap().is_empty());
}

#[test]
fn blank_title_pattern_is_rejected() {
    let shelf = seeded();
    let runner = shelf.runner().unwrap();
    assert!(matches!(runner.find_by_title_substring(""), Err(DbError::InvalidParams(_))));
    assert!(matches!(runner.find_by_title_substring("   "), Err(DbError::InvalidParams(_))));
}

#[test]
fn blank_author_is_rejected() {
    let shelf = seeded();
    let runner = shelf.runner().unwrap();
    assert!(matches!(runner.find_by_author(""), Err(DbError::InvalidParams(_))));
    assert!(matches!(runner.find_by_author(" \t "), Err(DbError::InvalidParams(_))));
}

#[test]
fn update_price_changes_only_first_match() {
    let shelf = seeded();
    let runner = shelf.runner().unwrap();
    let ack = runner.update_price("George Orwell", 15.99).unwrap();
    assert_eq!(ack, UpdateReport { matched: 1, modified: 1 });

    let orwell = runner.find_by_author("George Orwell").unwrap();
    assert_eq!(orwell[0].title, "1984");
    assert!((orwell[0].price - 15.99).abs() < 1e-9);
    assert!((orwell[1].price - 8.50).abs() < 1e-9);

    let before = sample_books();
    let after: Vec<Book> = runner.list_all().unwrap().collect::<Result<_, _>>().unwrap();
    for (b, a) in before.iter().zip(&after) {
        if b.title != "1984" {
            assert_eq!(b.price, a.price, "{} changed", b.title);
        }
    }

    let again = runner.update_price("George Orwell", 15.99).unwrap();
    assert_eq!(again, UpdateReport { matched: 1, modified: 0 });
}

#[test]
fn update_price_without_match_is_acknowledged() {
    let shelf = seeded();
    let ack = shelf.runner().unwrap().update_price("Nobody", 1.0).unwrap();
    assert_eq!(ack, UpdateReport::default());
}

#[test]
fn invalid_update_parameters_leave_store_untouched() {
    let shelf = seeded();
    let runner = shelf.runner().unwrap();
    assert!(matches!(runner.update_price("  ", 1.0), Err(DbError::InvalidParams(_))));
    assert!(matches!(runner.update_price("George Orwell", -1.0), Err(DbError::InvalidParams(_))));
    assert!(matches!(runner.update_price("George Orwell", f64::NAN), Err(DbError::InvalidParams(_))));
    assert!((runner.find_by_author("George Orwell").unwrap()[0].price - 10.99).abs() < 1e-9);
}

#[test]
fn avg_price_by_genre_with_two_genres() {
    let shelf = Bookshelf::new(ShelfConfig::default()).unwrap();
    let books: Vec<Book> = sample_books()
        .into_iter()
        .filter(|b| b.genre == "Fiction" || b.genre == "Fantasy")
        .collect();
    shelf.seed(books.clone()).unwrap();
    let stats = shelf.runner().unwrap().avg_price_by_genre().unwrap();
    assert_eq!(stats.len(), 2);
    assert_eq!(stats[0].genre, "Fantasy");
    assert_eq!(stats[1].genre, "Fiction");
    for s in &stats {
        let in_genre: Vec<&Book> = books.iter().filter(|b| b.genre == s.genre).collect();
        assert_eq!(s.book_count, in_genre.len() as u64);
        assert_eq!(s.total_pages, in_genre.iter().map(|b| b.pages).sum::<i64>());
    }
    assert!(stats[0].average_price.unwrap() > stats[1].average_price.unwrap());
    assert!((stats[0].average_price.unwrap() - 17.49).abs() < 1e-9);
}

#[test]
fn multi_book_authors_excludes_single_book_authors() {
    let shelf = seeded();
    let authors = shelf.runner().unwrap().multi_book_authors().unwrap();
    let names: Vec<&str> = authors.iter().map(|a| a.author.as_str()).collect();
    assert_eq!(names, vec!["George Orwell", "J.R.R. Tolkien", "Jane Austen"]);
    assert!(authors.iter().all(|a| a.book_count == 2 && a.titles.len() == 2));
    assert_eq!(authors[0].titles, vec!["1984".to_string(), "Animal Farm".to_string()]);
}

#[test]
fn run_dispatches_by_label() {
    let shelf = seeded();
    let runner = shelf.runner().unwrap();
    let q = CannedQuery::from_label("count all", &QueryParams::default()).unwrap();
    assert_eq!(runner.run(&q).unwrap(), QueryOutcome::Count(10));

    let params = QueryParams { author: Some("Jane Austen".into()), ..QueryParams::default() };
    let q = CannedQuery::from_label("find by author", &params).unwrap();
    match runner.run(&q).unwrap() {
        QueryOutcome::Books(b) => assert_eq!(b.len(), 2),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn outcome_serializes_with_kind_tag() {
    let json = serde_json::to_value(QueryOutcome::Count(3)).unwrap();
    assert_eq!(json, serde_json::json!({"kind": "count", "result": 3}));
}

#[test]
fn max_results_caps_sequences() {
    let cfg = ShelfConfig { max_results: 2, ..ShelfConfig::default() };
    let shelf = Bookshelf::new(cfg).unwrap();
    shelf.seed(sample_books()).unwrap();
    let runner = shelf.runner().unwrap();
    assert_eq!(runner.list_all().unwrap().count(), 2);
    assert_eq!(runner.find_in_stock().unwrap().len(), 2);
    assert_eq!(runner.count_all().unwrap(), 10);
}

#[test]
fn undecodable_document_propagates_error() {
    let shelf = seeded();
    shelf
        .collection()
        .unwrap()
        .insert_document(bookshelf::document::Document::new(bson::doc! {"title": "Loose page", "author": "Anon"}));
    let err = shelf.runner().unwrap().find_by_author("Anon").unwrap_err();
    assert!(matches!(err, DbError::Decode(_)));
}
