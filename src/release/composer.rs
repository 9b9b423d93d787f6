use handlebars::Handlebars;
use serde_json::json;
use std::io::{BufRead, Write};
use std::path::Path;

use super::{ReleaseError, Result};
use crate::config::ReleaseSettings;
use crate::gitlab::NewRelease;

const ONE_AUTHOR: &str = "one_author";
const TWO_AUTHORS: &str = "two_authors";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authors {
    pub first: String,
    pub second: Option<String>,
}

impl Authors {
    /// Build from raw input; names are trimmed and title-cased, and an empty
    /// second name means a single author.
    pub fn new(first: &str, second: &str) -> Result<Self> {
        let first = title_case(first.trim());
        if first.is_empty() {
            return Err(ReleaseError::MissingAuthor);
        }

        let second = title_case(second.trim());
        let second = (!second.is_empty()).then_some(second);

        Ok(Self { first, second })
    }

    /// Surname the tag is derived from: the second author's if present.
    pub fn tag_surname(&self) -> &str {
        surname(self.second.as_deref().unwrap_or(&self.first))
    }
}

/// Ask for the author names on `out`, reading one line each from `input`.
pub fn prompt_authors<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<Authors> {
    writeln!(out, "Enter first author name and surname:")?;
    out.flush()?;
    let mut first = String::new();
    input.read_line(&mut first)?;

    writeln!(
        out,
        "Enter second author name and surname(or press [ENTER] to skip):"
    )?;
    out.flush()?;
    let mut second = String::new();
    input.read_line(&mut second)?;

    Authors::new(&first, &second)
}

/// Upper-case the first letter of every word and lower-case the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for c in s.chars() {
        if prev_alpha {
            out.extend(c.to_lowercase());
        } else {
            out.extend(c.to_uppercase());
        }
        prev_alpha = c.is_alphabetic();
    }
    out
}

pub fn surname(name: &str) -> &str {
    name.split_whitespace().last().unwrap_or(name)
}

pub struct ReleaseComposer {
    templates: Handlebars<'static>,
    settings: ReleaseSettings,
}

impl ReleaseComposer {
    pub fn new(settings: &ReleaseSettings) -> Result<Self> {
        let mut templates = Handlebars::new();
        templates.register_escape_fn(handlebars::no_escape);
        templates.set_strict_mode(true);

        register(
            &mut templates,
            ONE_AUTHOR,
            settings.single_author_template.as_deref(),
            include_str!("../../templates/one_author.md.hbs"),
        )?;
        register(
            &mut templates,
            TWO_AUTHORS,
            settings.two_author_template.as_deref(),
            include_str!("../../templates/two_authors.md.hbs"),
        )?;

        Ok(Self {
            templates,
            settings: settings.clone(),
        })
    }

    pub fn tag_name(&self, authors: &Authors) -> String {
        format!("{}_{}", self.settings.tag_prefix, authors.tag_surname())
    }

    pub fn description(&self, authors: &Authors, artifacts_md: &str) -> Result<String> {
        let rendered = match &authors.second {
            Some(second) => self.templates.render(
                TWO_AUTHORS,
                &json!({
                    "author_1": authors.first,
                    "author_2": second,
                    "artifacts": artifacts_md,
                }),
            )?,
            None => self.templates.render(
                ONE_AUTHOR,
                &json!({
                    "author_1": authors.first,
                    "artifacts": artifacts_md,
                }),
            )?,
        };
        Ok(rendered)
    }

    pub fn compose(&self, authors: &Authors, artifacts_md: &str) -> Result<NewRelease> {
        Ok(NewRelease {
            name: self.settings.name.clone(),
            tag_name: self.tag_name(authors),
            ref_name: self.settings.ref_name.clone(),
            description: self.description(authors, artifacts_md)?,
        })
    }
}

fn register(
    templates: &mut Handlebars<'static>,
    name: &str,
    custom: Option<&Path>,
    builtin: &str,
) -> Result<()> {
    match custom {
        Some(path) => {
            let content = std::fs::read_to_string(path)?;
            templates.register_template_string(name, content)?;
        }
        None => templates.register_template_string(name, builtin)?,
    }
    Ok(())
}
