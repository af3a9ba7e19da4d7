/*!
 * Bibliographic records and the services that look them up.
 *
 * - `pubmed`: NCBI E-utilities client
 */

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::LookupError;

pub mod pubmed;

pub use pubmed::PubMedClient;

/// Metadata describing one scientific article
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibliographicRecord {
    /// Article title
    pub title: String,

    /// Abstract text (not rendered into decks)
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,

    /// Publication year as reported by the source
    #[serde(default, alias = "pub_date", deserialize_with = "year_from_number_or_string")]
    pub publication_year: String,

    /// Authors in source order
    #[serde(default, deserialize_with = "authors_from_list_or_string")]
    pub authors: Vec<String>,
}

impl BibliographicRecord {
    pub fn new(
        title: impl Into<String>,
        authors: Vec<String>,
        publication_year: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            abstract_text: String::new(),
            publication_year: publication_year.into(),
            authors,
        }
    }

    /// Set the abstract
    pub fn with_abstract(mut self, abstract_text: impl Into<String>) -> Self {
        self.abstract_text = abstract_text.into();
        self
    }

    /// Authors joined the way the references slide prints them
    pub fn authors_line(&self) -> String {
        self.authors.join(", ")
    }

    /// `"{title} by {authors} ({publication_year})"`
    pub fn reference_line(&self) -> String {
        format!("{} by {} ({})", self.title, self.authors_line(), self.publication_year)
    }
}

impl fmt::Display for BibliographicRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.reference_line())
    }
}

// Reference files written by hand often carry "A, B" instead of ["A", "B"].
fn authors_from_list_or_string<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Authors {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match Authors::deserialize(deserializer)? {
        Authors::List(list) => list,
        Authors::Joined(joined) if joined.trim().is_empty() => Vec::new(),
        Authors::Joined(joined) => vec![joined],
    })
}

fn year_from_number_or_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Year {
        Number(i64),
        Text(String),
    }

    Ok(match Year::deserialize(deserializer)? {
        Year::Number(year) => year.to_string(),
        Year::Text(year) => year,
    })
}

/// Search parameters for an article lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleQuery {
    /// Free-text topic
    pub topic: String,
    /// First publication year, inclusive
    pub start_year: u16,
    /// Last publication year, inclusive
    pub end_year: u16,
    /// Maximum number of records to return
    pub max_results: usize,
}

impl ArticleQuery {
    pub fn new(topic: impl Into<String>, start_year: u16, end_year: u16, max_results: usize) -> Self {
        Self {
            topic: topic.into(),
            start_year,
            end_year,
            max_results,
        }
    }

    /// Search term restricted to the publication-date range
    pub fn search_term(&self) -> String {
        format!("{} AND {}:{}[Date - Publication]", self.topic, self.start_year, self.end_year)
    }
}

/// Outcome of a lookup: the records found plus per-article failures
#[derive(Debug, Default)]
pub struct LookupReport {
    /// Records successfully retrieved, in search order
    pub records: Vec<BibliographicRecord>,
    /// Identifier and reason for every article that could not be fetched
    pub failures: Vec<(String, String)>,
}

/// A service able to find articles for a topic
#[async_trait]
pub trait ArticleSource: Send + Sync {
    /// Find articles for the query.
    ///
    /// The search itself failing is an error; individual articles that cannot
    /// be fetched are reported in [`LookupReport::failures`].
    async fn find_articles(&self, query: &ArticleQuery) -> Result<LookupReport, LookupError>;
}

/// Fixed list of records, used for offline compilation and tests
#[derive(Debug, Clone, Default)]
pub struct StaticArticles {
    records: Vec<BibliographicRecord>,
}

impl StaticArticles {
    pub fn new(records: Vec<BibliographicRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl ArticleSource for StaticArticles {
    async fn find_articles(&self, query: &ArticleQuery) -> Result<LookupReport, LookupError> {
        Ok(LookupReport {
            records: self.records.iter().take(query.max_results).cloned().collect(),
            failures: Vec::new(),
        })
    }
}
