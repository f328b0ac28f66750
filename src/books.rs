//! The book record stored in the `books` collection.

use crate::document::Document;
use crate::errors::DbError;
use bson::{Bson, Document as BsonDocument};
use serde::{Deserialize, Serialize};

pub const TITLE: &str = "title";
pub const AUTHOR: &str = "author";
pub const GENRE: &str = "genre";
pub const PUBLISHED_YEAR: &str = "published_year";
pub const PRICE: &str = "price";
pub const PAGES: &str = "pages";
pub const IN_STOCK: &str = "in_stock";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    pub title: String,
    pub author: String,
    pub genre: String,
    pub published_year: i64,
    pub price: f64,
    pub pages: i64,
    pub in_stock: bool,
}

fn field<'a>(d: &'a BsonDocument, key: &str) -> Result<&'a Bson, DbError> {
    d.get(key).ok_or_else(|| DbError::Decode(format!("book document is missing `{key}`")))
}

fn text(d: &BsonDocument, key: &str) -> Result<String, DbError> {
    match field(d, key)? {
        Bson::String(s) => Ok(s.clone()),
        other => Err(DbError::Decode(format!("`{key}` should be a string, got {other}"))),
    }
}

/// Integers of either width; doubles with no fractional part are accepted too.
#[allow(clippy::cast_possible_truncation)]
fn integer(d: &BsonDocument, key: &str) -> Result<i64, DbError> {
    match field(d, key)? {
        Bson::Int32(i) => Ok(i64::from(*i)),
        Bson::Int64(i) => Ok(*i),
        Bson::Double(f) if f.fract() == 0.0 => Ok(*f as i64),
        other => Err(DbError::Decode(format!("`{key}` should be an integer, got {other}"))),
    }
}

#[allow(clippy::cast_precision_loss)]
fn decimal(d: &BsonDocument, key: &str) -> Result<f64, DbError> {
    match field(d, key)? {
        Bson::Double(f) => Ok(*f),
        Bson::Int32(i) => Ok(f64::from(*i)),
        Bson::Int64(i) => Ok(*i as f64),
        other => Err(DbError::Decode(format!("`{key}` should be a number, got {other}"))),
    }
}

fn boolean(d: &BsonDocument, key: &str) -> Result<bool, DbError> {
    match field(d, key)? {
        Bson::Boolean(b) => Ok(*b),
        other => Err(DbError::Decode(format!("`{key}` should be a boolean, got {other}"))),
    }
}

impl Book {
    #[must_use]
    pub fn to_bson(&self) -> BsonDocument {
        let mut d = BsonDocument::new();
        d.insert(TITLE, self.title.clone());
        d.insert(AUTHOR, self.author.clone());
        d.insert(GENRE, self.genre.clone());
        d.insert(PUBLISHED_YEAR, self.published_year);
        d.insert(PRICE, self.price);
        d.insert(PAGES, self.pages);
        d.insert(IN_STOCK, self.in_stock);
        d
    }

    /// # Errors
    /// Returns `Decode` when a field is missing or has the wrong type.
    pub fn from_bson(d: &BsonDocument) -> Result<Self, DbError> {
        Ok(Self {
            title: text(d, TITLE)?,
            author: text(d, AUTHOR)?,
            genre: text(d, GENRE)?,
            published_year: integer(d, PUBLISHED_YEAR)?,
            price: decimal(d, PRICE)?,
            pages: integer(d, PAGES)?,
            in_stock: boolean(d, IN_STOCK)?,
        })
    }

    #[must_use]
    pub fn into_document(self) -> Document {
        Document::new(self.to_bson())
    }
}

impl TryFrom<&Document> for Book {
    type Error = DbError;
    fn try_from(d: &Document) -> Result<Self, Self::Error> {
        Self::from_bson(&d.data)
    }
}

fn book(title: &str, author: &str, genre: &str, year: i64, price: f64, pages: i64, in_stock: bool) -> Book {
    Book {
        title: title.to_string(),
        author: author.to_string(),
        genre: genre.to_string(),
        published_year: year,
        price,
        pages,
        in_stock,
    }
}

/// A small catalogue for demos and tests.
#[must_use]
pub fn sample_books() -> Vec<Book> {
    vec![
        book("To Kill a Mockingbird", "Harper Lee", "Fiction", 1960, 12.99, 336, true),
        book("1984", "George Orwell", "Dystopian", 1949, 10.99, 328, true),
        book("Animal Farm", "George Orwell", "Political Satire", 1945, 8.50, 112, false),
        book("The Great Gatsby", "F. Scott Fitzgerald", "Fiction", 1925, 9.99, 180, true),
        book("Brave New World", "Aldous Huxley", "Dystopian", 1932, 11.50, 311, false),
        book("The Hobbit", "J.R.R. Tolkien", "Fantasy", 1937, 14.99, 310, true),
        book("The Lord of the Rings", "J.R.R. Tolkien", "Fantasy", 1954, 19.99, 1178, true),
        book("The Catcher in the Rye", "J.D. Salinger", "Fiction", 1951, 8.99, 224, true),
        book("Pride and Prejudice", "Jane Austen", "Romance", 1813, 7.99, 432, true),
        book("Emma", "Jane Austen", "Romance", 1815, 8.49, 474, false),
    ]
}
