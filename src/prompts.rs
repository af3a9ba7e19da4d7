/*!
 * Prompts for drafting slide markup.
 *
 * The system prompt fixes the markup grammar understood by
 * [`crate::markup`]; the user message carries the topic and the articles
 * found for it.
 */

use crate::bibliography::BibliographicRecord;

/// Abstracts longer than this are cut to keep requests small
pub const MAX_ABSTRACT_CHARS: usize = 1500;

/// Builds the messages sent to the text-generation provider.
#[derive(Debug, Clone)]
pub struct DeckPromptBuilder {
    /// System prompt
    system: String,
}

impl DeckPromptBuilder {
    /// The default system prompt describing the slide markup.
    pub const SLIDE_WRITER: &'static str = r#"Write a detailed PowerPoint presentation about the user's topic, making use of the provided PubMed information. You only answer with the presentation. Follow the structure of the example.
Notice
- You do all the presentation text for the user.
- Each slide should contain at least 500 characters of content!
- Use the provided info from PubMed to add a short analysis in each slide when possible, highlighting potential biases, limitations, and other important information.
- You make the presentation easy to understand.
- The presentation starts with an introduction, covers specific subtopics, and ends with a conclusion.
- The presentation has a table of contents.
- The presentation has a summary.
- At least 10 slides.
- Each slide has a bibliographic reference.

Example! - Stick to this formatting exactly!
#Title: TITLE OF THE PRESENTATION

#Slide: 1
#Header: table of contents
#Content: 1. CONTENT OF THIS POWERPOINT
2. CONTENTS OF THIS POWERPOINT
3. CONTENT OF THIS POWERPOINT
...
#Footer: Bibliographic reference

#Slide: 2
#Header: TITLE OF SLIDE
#Content: CONTENT OF THE SLIDE
#Footer: Bibliographic reference

#Slide: 3
#Header: TITLE OF SLIDE
#Content: CONTENT OF THE SLIDE
#Footer: Bibliographic reference

#Slide: 4
#Header: TITLE OF SLIDE
#Content: CONTENT OF THE SLIDE
#Footer: Bibliographic reference

#Slide: 5
#Header: summary
#Content: CONTENT OF THE SUMMARY
#Footer: Bibliographic reference

#Slide: END"#;

    /// Builder with the default system prompt
    pub fn new() -> Self {
        Self::with_system_prompt(Self::SLIDE_WRITER)
    }

    /// Builder with a custom system prompt
    pub fn with_system_prompt(system: impl Into<String>) -> Self {
        Self { system: system.into() }
    }

    pub fn system_prompt(&self) -> &str {
        &self.system
    }

    /// User message for a topic and the articles found for it
    pub fn user_message(&self, topic: &str, articles: &[BibliographicRecord]) -> String {
        let mut message = format!("The user wants a presentation about {}.", topic.trim());

        if articles.is_empty() {
            message.push_str(" No PubMed articles were found for this topic.");
            return message;
        }

        message.push_str(" Here is some additional information I found on PubMed:\n");
        for (i, article) in articles.iter().enumerate() {
            message.push_str(&format!(
                "\n{}. {} ({})\nAuthors: {}\n",
                i + 1,
                article.title,
                article.publication_year,
                article.authors_line()
            ));
            if !article.abstract_text.is_empty() {
                message.push_str("Abstract: ");
                message.push_str(truncate_chars(&article.abstract_text, MAX_ABSTRACT_CHARS));
                message.push('\n');
            }
        }
        message
    }
}

impl Default for DeckPromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => &text[..index],
        None => text,
    }
}
