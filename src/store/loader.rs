//! CSV loading of the ratings table and the movie catalog.
//!
//! Both tables are loaded fully into memory before any model is fitted.
//! Columns beyond the ones a record needs (timestamps, release years, ...)
//! are ignored.

use std::{io::Read, path::Path};

use crate::{
    error::{AppError, AppResult},
    models::{Catalog, Item, Rating},
};

const RATING_COLUMNS: [&[&str]; 3] = [&["user_id"], &["item_id"], &["rating", "ratings"]];
const CATALOG_COLUMNS: [&[&str]; 2] = [&["item_id"], &["title"]];

/// Loads the ratings table from a CSV file
pub fn load_ratings(path: impl AsRef<Path>) -> AppResult<Vec<Rating>> {
    let path = path.as_ref();
    let ratings = read_ratings(open(path)?)?;

    tracing::info!(path = %path.display(), rows = ratings.len(), "Ratings loaded");
    Ok(ratings)
}

/// Loads the movie catalog from a CSV file
///
/// The genre column is optional here; a catalog without it loads fine but
/// cannot be used to fit the content model.
pub fn load_catalog(path: impl AsRef<Path>) -> AppResult<Catalog> {
    let path = path.as_ref();
    let catalog = read_catalog(open(path)?)?;

    if !catalog.has_genres() {
        tracing::warn!(path = %path.display(), "Catalog has no genre text");
    }
    tracing::info!(path = %path.display(), rows = catalog.len(), "Catalog loaded");
    Ok(catalog)
}

pub fn read_ratings<R: Read>(reader: R) -> AppResult<Vec<Rating>> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    check_columns(reader.headers()?, &RATING_COLUMNS, "ratings")?;

    reader
        .deserialize::<Rating>()
        .map(|row| row.map_err(AppError::from))
        .collect()
}

pub fn read_catalog<R: Read>(reader: R) -> AppResult<Catalog> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    check_columns(reader.headers()?, &CATALOG_COLUMNS, "catalog")?;

    let items = reader
        .deserialize::<Item>()
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Catalog::new(items))
}

fn open(path: &Path) -> AppResult<std::fs::File> {
    if !path.exists() {
        return Err(AppError::NotFound(format!(
            "Data file not found: {}",
            path.display()
        )));
    }
    Ok(std::fs::File::open(path)?)
}

/// Fails with a schema error unless every required column (or one of its aliases) is present
fn check_columns(headers: &csv::StringRecord, required: &[&[&str]], table: &str) -> AppResult<()> {
    for names in required {
        if !headers.iter().any(|h| names.contains(&h)) {
            return Err(AppError::Schema(format!(
                "{} table is missing column '{}' (found: {:?})",
                table,
                names[0],
                headers.iter().collect::<Vec<_>>()
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_ratings_ignores_extra_columns() {
        let csv = "user_id,item_id,rating,timestamp\n1,10,5,881250949\n2,20,3.5,891717742\n";
        let ratings = read_ratings(csv.as_bytes()).unwrap();

        assert_eq!(
            ratings,
            vec![Rating::new(1, 10, 5.0), Rating::new(2, 20, 3.5)]
        );
    }

    #[test]
    fn test_read_ratings_missing_column() {
        let csv = "user_id,item_id\n1,10\n";
        let result = read_ratings(csv.as_bytes());
        assert!(matches!(result, Err(AppError::Schema(_))));
    }

    #[test]
    fn test_read_catalog_with_and_without_genres() {
        let csv = "item_id,title,genres\n1,Toy Story (1995),Animation|Comedy\n2,GoldenEye (1995),\n";
        let catalog = read_catalog(csv.as_bytes()).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.get(1).unwrap().genres.as_deref(),
            Some("Animation|Comedy")
        );
        assert_eq!(catalog.get(2).unwrap().genres, None);

        let csv = "item_id,title\n1,Toy Story (1995)\n";
        let catalog = read_catalog(csv.as_bytes()).unwrap();
        assert!(!catalog.has_genres());
    }

    #[test]
    fn test_read_catalog_genre_text_alias() {
        let csv = "item_id,title,genre_text\n5,Heat (1995),Action|Crime\n";
        let catalog = read_catalog(csv.as_bytes()).unwrap();
        assert_eq!(catalog.get(5).unwrap().genres.as_deref(), Some("Action|Crime"));
    }

    #[test]
    fn test_load_ratings_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "user_id,item_id,ratings").unwrap();
        writeln!(file, "3,7,4").unwrap();

        let ratings = load_ratings(file.path()).unwrap();
        assert_eq!(ratings, vec![Rating::new(3, 7, 4.0)]);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_catalog("/nonexistent/movies_clean.csv");
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
