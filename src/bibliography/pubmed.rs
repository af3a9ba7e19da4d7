use async_trait::async_trait;
use log::{debug, error, warn};
use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::Event;
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use crate::app_config::BibliographyConfig;
use crate::bibliography::{ArticleQuery, ArticleSource, BibliographicRecord, LookupReport};
use crate::errors::LookupError;
use crate::xml;

static YEAR_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(1[89]|20)\d{2}").expect("year pattern is valid")
});

/// PubMed client backed by the NCBI E-utilities
pub struct PubMedClient {
    /// HTTP client for API requests
    client: Client,
    /// Base URL of the E-utilities service
    endpoint: String,
    /// Optional NCBI API key (raises the request quota)
    api_key: Option<String>,
    /// Optional contact address sent with every request
    email: Option<String>,
}

/// esearch JSON envelope
#[derive(Debug, Deserialize)]
struct SearchEnvelope {
    esearchresult: SearchResult,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    idlist: Vec<String>,
}

impl PubMedClient {
    /// Create a new client for the given E-utilities base URL
    pub fn new(endpoint: impl Into<String>, timeout_secs: u64) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            endpoint: endpoint.into(),
            api_key: None,
            email: None,
        }
    }

    // @creates: Client from the bibliography section of the config
    pub fn from_config(config: &BibliographyConfig) -> Self {
        let mut client = Self::new(config.endpoint.clone(), config.timeout_secs);
        if !config.api_key.is_empty() {
            client.api_key = Some(config.api_key.clone());
        }
        if !config.email.is_empty() {
            client.email = Some(config.email.clone());
        }
        client
    }

    /// Find the PubMed identifiers matching the query
    pub async fn search_ids(&self, query: &ArticleQuery) -> Result<Vec<String>, LookupError> {
        let mut params = self.common_params();
        params.push(("term", query.search_term()));
        params.push(("retmax", query.max_results.to_string()));
        params.push(("retmode", "json".to_string()));

        let url = self.url("esearch.fcgi", &params)?;
        debug!("PubMed search: {}", query.search_term());

        let body = self.get(url).await?;
        let envelope: SearchEnvelope = serde_json::from_str(&body)
            .map_err(|e| LookupError::ParseError(format!("esearch response: {}", e)))?;

        Ok(envelope.esearchresult.idlist)
    }

    /// Fetch and parse a single article by PMID
    pub async fn fetch_article(&self, pmid: &str) -> Result<BibliographicRecord, LookupError> {
        let mut params = self.common_params();
        params.push(("id", pmid.to_string()));
        params.push(("retmode", "xml".to_string()));

        let url = self.url("efetch.fcgi", &params)?;
        let body = self.get(url).await?;

        parse_article_xml(&body).map_err(|e| match e {
            LookupError::NotFound(_) => LookupError::NotFound(pmid.to_string()),
            other => other,
        })
    }

    fn common_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("db", "pubmed".to_string()), ("tool", "pubdeck".to_string())];
        if let Some(api_key) = &self.api_key {
            params.push(("api_key", api_key.clone()));
        }
        if let Some(email) = &self.email {
            params.push(("email", email.clone()));
        }
        params
    }

    fn url(&self, utility: &str, params: &[(&str, String)]) -> Result<Url, LookupError> {
        let base = format!("{}/{}", self.endpoint.trim_end_matches('/'), utility);
        Url::parse_with_params(&base, params.iter().map(|(k, v)| (*k, v.as_str())))
            .map_err(|e| LookupError::RequestFailed(format!("Invalid endpoint {}: {}", base, e)))
    }

    async fn get(&self, url: Url) -> Result<String, LookupError> {
        let response = self.client.get(url)
            .send()
            .await
            .map_err(|e| LookupError::RequestFailed(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await
                .unwrap_or_else(|_| "Failed to get error response text".to_string());
            error!("PubMed API error ({}): {}", status, error_text);
            return Err(LookupError::ApiError {
                status_code: status.as_u16(),
                message: error_text,
            });
        }

        response.text().await
            .map_err(|e| LookupError::RequestFailed(format!("Failed to read response body: {}", e)))
    }
}

#[async_trait]
impl ArticleSource for PubMedClient {
    async fn find_articles(&self, query: &ArticleQuery) -> Result<LookupReport, LookupError> {
        let ids = self.search_ids(query).await?;
        let mut report = LookupReport::default();

        // One request per article so a single bad record does not sink the batch
        for pmid in ids {
            match self.fetch_article(&pmid).await {
                Ok(record) => report.records.push(record),
                Err(e) => {
                    warn!("Skipping PubMed article {}: {}", pmid, e);
                    report.failures.push((pmid, e.to_string()));
                }
            }
        }

        Ok(report)
    }
}

/// Parse the first `PubmedArticle` of an efetch XML response
pub fn parse_article_xml(body: &str) -> Result<BibliographicRecord, LookupError> {
    let mut reader = Reader::from_str(body);

    let mut path: Vec<String> = Vec::new();
    let mut title = String::new();
    let mut abstract_parts: Vec<String> = Vec::new();
    let mut year = String::new();
    let mut medline_date = String::new();
    let mut authors: Vec<String> = Vec::new();
    let mut author = AuthorParts::default();
    let mut seen_article = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                match name.as_str() {
                    "Article" => seen_article = true,
                    "AbstractText" => abstract_parts.push(String::new()),
                    "Author" => author = AuthorParts::default(),
                    _ => {}
                }
                path.push(name);
            }
            Ok(Event::End(e)) => {
                let name = e.local_name();
                if name.as_ref() == b"Author" && in_article_authors(&path) {
                    if let Some(formatted) = author.format() {
                        authors.push(formatted);
                    }
                }
                if name.as_ref() == b"PubmedArticle" && seen_article {
                    break;
                }
                path.pop();
            }
            Ok(Event::Text(e)) => {
                push_text(&path, &xml::text_content(&e), &mut ArticleFields {
                    title: &mut title,
                    abstract_parts: &mut abstract_parts,
                    year: &mut year,
                    medline_date: &mut medline_date,
                    author: &mut author,
                });
            }
            Ok(Event::GeneralRef(e)) => {
                push_text(&path, &xml::reference_content(&e), &mut ArticleFields {
                    title: &mut title,
                    abstract_parts: &mut abstract_parts,
                    year: &mut year,
                    medline_date: &mut medline_date,
                    author: &mut author,
                });
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(LookupError::ParseError(format!("efetch XML: {}", e))),
            _ => {}
        }
    }

    let title = collapse_whitespace(&title);
    if !seen_article || title.is_empty() {
        return Err(LookupError::NotFound(String::new()));
    }

    if year.trim().is_empty() {
        year = YEAR_PATTERN
            .find(&medline_date)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
    }

    let abstract_text = abstract_parts
        .iter()
        .map(|part| collapse_whitespace(part))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(BibliographicRecord::new(title, authors, year.trim()).with_abstract(abstract_text))
}

#[derive(Debug, Default)]
struct AuthorParts {
    last_name: String,
    fore_name: String,
    initials: String,
    collective_name: String,
}

impl AuthorParts {
    // "LastName Initials", falling back to the fore name or a collective name
    fn format(&self) -> Option<String> {
        let last = self.last_name.trim();
        if !last.is_empty() {
            let given = if !self.initials.trim().is_empty() {
                self.initials.trim()
            } else {
                self.fore_name.trim()
            };
            return Some(if given.is_empty() {
                last.to_string()
            } else {
                format!("{} {}", last, given)
            });
        }

        let collective = collapse_whitespace(&self.collective_name);
        (!collective.is_empty()).then_some(collective)
    }
}

struct ArticleFields<'a> {
    title: &'a mut String,
    abstract_parts: &'a mut Vec<String>,
    year: &'a mut String,
    medline_date: &'a mut String,
    author: &'a mut AuthorParts,
}

fn push_text(path: &[String], text: &str, fields: &mut ArticleFields<'_>) {
    let within = |name: &str| path.iter().any(|p| p == name);
    let current = path.last().map(String::as_str).unwrap_or_default();

    if within("ArticleTitle") {
        fields.title.push_str(text);
    } else if within("AbstractText") {
        if let Some(part) = fields.abstract_parts.last_mut() {
            part.push_str(text);
        }
    } else if within("PubDate") {
        match current {
            "Year" => fields.year.push_str(text),
            "MedlineDate" => fields.medline_date.push_str(text),
            _ => {}
        }
    } else if in_article_authors(path) {
        match current {
            "LastName" => fields.author.last_name.push_str(text),
            "ForeName" => fields.author.fore_name.push_str(text),
            "Initials" => fields.author.initials.push_str(text),
            "CollectiveName" => fields.author.collective_name.push_str(text),
            _ => {}
        }
    }
}

// Authors of the article itself, not of comments or corrections
fn in_article_authors(path: &[String]) -> bool {
    path.iter().any(|p| p == "Article")
        && path.iter().any(|p| p == "AuthorList")
        && path.iter().any(|p| p == "Author")
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
