//! Parser for MovieLens data files.
//!
//! Handles the three `::`-delimited tables:
//! - users.dat: userId::gender::age::occupation::zipcode
//! - movies.dat: movieId::title::genres
//! - ratings.dat: userId::movieId::rating::timestamp

use crate::error::{DataLoadError, Result};
use crate::types::*;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Read a file with ISO-8859-1 (Latin-1) encoding.
///
/// The MovieLens dataset is not UTF-8; each byte maps directly to a
/// Unicode code point.
fn read_lines_latin1(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        return Err(DataLoadError::MissingTable {
            path: path.display().to_string(),
        });
    }

    let mut file = File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let content: String = bytes.iter().map(|&b| b as char).collect();
    Ok(content.lines().map(|s| s.to_string()).collect())
}

/// Splits one line into `::` fields and hands them out with line context.
struct Fields<'a> {
    file: &'static str,
    line: usize,
    parts: std::str::Split<'a, &'static str>,
}

impl<'a> Fields<'a> {
    fn new(file: &'static str, line: usize, text: &'a str) -> Self {
        Self {
            file,
            line,
            parts: text.split("::"),
        }
    }

    fn next_str(&mut self, name: &str) -> Result<&'a str> {
        self.parts.next().ok_or_else(|| DataLoadError::ParseError {
            file: self.file.to_string(),
            line: self.line,
            reason: format!("Missing {}", name),
        })
    }

    fn next_parsed<T>(&mut self, name: &str) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let raw = self.next_str(name)?;
        raw.trim().parse().map_err(|e| DataLoadError::ParseError {
            file: self.file.to_string(),
            line: self.line,
            reason: format!("Invalid {}: {}", name, e),
        })
    }
}

/// Run `parse_line` over every non-empty line of a table
fn parse_table<T>(
    path: &Path,
    file: &'static str,
    mut parse_line: impl FnMut(Fields<'_>) -> Result<T>,
) -> Result<Vec<T>> {
    let lines = read_lines_latin1(path)?;
    let mut rows = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        rows.push(parse_line(Fields::new(file, idx + 1, trimmed))?);
    }

    Ok(rows)
}

fn parse_gender(s: &str) -> Result<Gender> {
    match s {
        "M" => Ok(Gender::Male),
        "F" => Ok(Gender::Female),
        _ => Err(DataLoadError::InvalidValue {
            field: "gender".to_string(),
            value: s.to_string(),
        }),
    }
}

fn parse_age_group(s: &str) -> Result<AgeGroup> {
    match s {
        "1" => Ok(AgeGroup::Under18),
        "18" => Ok(AgeGroup::Age18To24),
        "25" => Ok(AgeGroup::Age25To34),
        "35" => Ok(AgeGroup::Age35To44),
        "45" => Ok(AgeGroup::Age45To49),
        "50" => Ok(AgeGroup::Age50To55),
        "56" => Ok(AgeGroup::Age56Plus),
        _ => Err(DataLoadError::InvalidValue {
            field: "age".to_string(),
            value: s.to_string(),
        }),
    }
}

fn parse_occupation(s: &str) -> Result<Occupation> {
    const OCCUPATIONS: [Occupation; 21] = [
        Occupation::Other,
        Occupation::Academic,
        Occupation::Artist,
        Occupation::Clerical,
        Occupation::CollegeStudent,
        Occupation::CustomerService,
        Occupation::Doctor,
        Occupation::Executive,
        Occupation::Farmer,
        Occupation::Homemaker,
        Occupation::K12Student,
        Occupation::Lawyer,
        Occupation::Programmer,
        Occupation::Retired,
        Occupation::Sales,
        Occupation::Scientist,
        Occupation::SelfEmployed,
        Occupation::Technician,
        Occupation::Tradesman,
        Occupation::Unemployed,
        Occupation::Writer,
    ];

    s.parse::<usize>()
        .ok()
        .and_then(|code| OCCUPATIONS.get(code).copied())
        .ok_or_else(|| DataLoadError::InvalidValue {
            field: "occupation".to_string(),
            value: s.to_string(),
        })
}

/// Parse the users.dat file
///
/// Format: userId::gender::age::occupation::zipcode
pub fn parse_users(path: &Path) -> Result<Vec<User>> {
    parse_table(path, "users.dat", |mut fields| {
        Ok(User {
            id: fields.next_parsed("userId")?,
            gender: parse_gender(fields.next_str("gender")?)?,
            age: parse_age_group(fields.next_str("age")?)?,
            occupation: parse_occupation(fields.next_str("occupation")?)?,
            zipcode: fields.next_str("zipcode")?.to_string(),
        })
    })
}

/// Parse the movies.dat file
///
/// Format: movieId::title::genres
///
/// The title often includes year in parentheses: "Toy Story (1995)"
pub fn parse_movies(path: &Path) -> Result<Vec<Movie>> {
    parse_table(path, "movies.dat", |mut fields| {
        let id = fields.next_parsed("movieId")?;
        let title = fields.next_str("title")?;
        let genres = parse_genres(fields.next_str("genres")?)?;

        Ok(Movie {
            id,
            title: title.to_string(),
            year: extract_year_from_title(title),
            genres,
        })
    })
}

/// Parse the ratings.dat file
///
/// Format: userId::movieId::rating::timestamp
pub fn parse_ratings(path: &Path) -> Result<Vec<Rating>> {
    parse_table(path, "ratings.dat", |mut fields| {
        Ok(Rating {
            user_id: fields.next_parsed("userId")?,
            movie_id: fields.next_parsed("movieId")?,
            rating: fields.next_parsed("rating")?,
            timestamp: fields.next_parsed("timestamp")?,
        })
    })
}

/// Extract year from movie title
///
/// Example: "Toy Story (1995)" -> Some(1995)
///          "Movie Title" -> None
fn extract_year_from_title(title: &str) -> Option<u16> {
    let start = title.rfind('(')?;
    let end = title.rfind(')')?;
    if start < end {
        return title[start + 1..end].parse::<u16>().ok();
    }
    None
}

/// Parse a genre tag into the Genre enum
///
/// Example: "Action" -> Ok(Genre::Action)
///          "Sci-Fi" -> Ok(Genre::SciFi)
pub fn parse_genre(s: &str) -> Result<Genre> {
    Genre::ALL
        .iter()
        .copied()
        .find(|genre| genre.label() == s || (*genre == Genre::Children && s == "Children"))
        .ok_or_else(|| DataLoadError::InvalidValue {
            field: "genre".to_string(),
            value: s.to_string(),
        })
}

/// Parse pipe- or comma-separated genres.
///
/// An empty field, or the "(no genres listed)" marker, is an empty set.
/// Repeated tags are collapsed.
pub fn parse_genres(s: &str) -> Result<Vec<Genre>> {
    let mut genres = Vec::new();
    for tag in s.split(['|', ',']).map(str::trim) {
        if tag.is_empty() || tag == "(no genres listed)" {
            continue;
        }
        let genre = parse_genre(tag)?;
        if !genres.contains(&genre) {
            genres.push(genre);
        }
    }
    Ok(genres)
}
