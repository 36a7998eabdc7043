use kernel::model::{book::Book, id::BookId};

#[derive(sqlx::FromRow)]
pub struct BookRow {
    pub book_id: BookId,
    pub title: String,
}

impl From<BookRow> for Book {
    fn from(value: BookRow) -> Self {
        let BookRow { book_id, title } = value;
        Book { id: book_id, title }
    }
}
