//! Topic groups and subject patterns.
//!
//! Upstream services publish to one topic per domain and tag each record
//! with a dot-separated subject (`hr.teacher.created`). A topic group pairs a
//! topic with the subject pattern its durable subscription accepts.

use analytics_core::{Error, Result};
use serde::{Deserialize, Serialize};

/// Topic names.
pub mod topic {
    pub const HR: &str = "hr-events";
    pub const SUBJECT: &str = "subject-events";
    pub const TIMETABLE: &str = "timetable-events";

    pub const ALL: &[&str] = &[HR, SUBJECT, TIMETABLE];
}

/// Durable subscription names.
pub mod group {
    pub const HR: &str = "analytics-hr";
    pub const SUBJECT: &str = "analytics-subject";
    pub const TIMETABLE: &str = "analytics-timetable";
}

/// A topic consumed under one durable name, filtered by subject pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicGroup {
    pub name: String,
    pub topic: String,
    pub subject_pattern: String,
}

impl TopicGroup {
    pub fn new(
        name: impl Into<String>,
        topic: impl Into<String>,
        subject_pattern: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            topic: topic.into(),
            subject_pattern: subject_pattern.into(),
        }
    }

    pub fn pattern(&self) -> Result<SubjectPattern> {
        SubjectPattern::parse(&self.subject_pattern)
    }
}

/// The three upstream domains.
pub fn default_groups() -> Vec<TopicGroup> {
    vec![
        TopicGroup::new(group::HR, topic::HR, "hr.>"),
        TopicGroup::new(group::SUBJECT, topic::SUBJECT, "subject.>"),
        TopicGroup::new(group::TIMETABLE, topic::TIMETABLE, "timetable.>"),
    ]
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Literal(String),
    /// `*`: exactly one token
    Single,
    /// `>`: one or more trailing tokens
    Tail,
}

/// Dot-separated subject pattern with `*` and `>` wildcards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectPattern {
    tokens: Vec<Token>,
}

impl SubjectPattern {
    pub fn parse(raw: &str) -> Result<Self> {
        let parts: Vec<&str> = raw.split('.').collect();
        let mut tokens = Vec::with_capacity(parts.len());

        for (i, part) in parts.iter().enumerate() {
            let token = match *part {
                "" => {
                    return Err(Error::config(format!(
                        "subject pattern {:?} has an empty token",
                        raw
                    )))
                }
                "*" => Token::Single,
                ">" if i + 1 == parts.len() => Token::Tail,
                ">" => {
                    return Err(Error::config(format!(
                        "subject pattern {:?}: '>' must be the last token",
                        raw
                    )))
                }
                literal => Token::Literal(literal.to_string()),
            };
            tokens.push(token);
        }

        Ok(Self { tokens })
    }

    pub fn matches(&self, subject: &str) -> bool {
        let mut parts = subject.split('.');

        for token in &self.tokens {
            match token {
                Token::Tail => return parts.next().is_some_and(|p| !p.is_empty()),
                Token::Single => match parts.next() {
                    Some(p) if !p.is_empty() => {}
                    _ => return false,
                },
                Token::Literal(lit) => {
                    if parts.next() != Some(lit.as_str()) {
                        return false;
                    }
                }
            }
        }

        parts.next().is_none()
    }
}
