//! Policy page model
//!
//! The policy page holds up to [`POLICY_SECTION_COUNT`] sections. Each one is
//! stored as a single HTML fragment `<h3>title</h3><span>content</span>` so the
//! public site can render it directly.

use serde::{Deserialize, Serialize};

pub const POLICY_SECTION_COUNT: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySection {
    pub title: String,
    pub content: String,
}

impl PolicySection {
    /// Stored fragment, or `None` when title or content is blank
    pub fn to_html(&self) -> Option<String> {
        if self.title.trim().is_empty() || self.content.trim().is_empty() {
            return None;
        }
        Some(format!(
            "<h3>{}</h3><span>{}</span>",
            self.title, self.content
        ))
    }

    /// Inverse of [`PolicySection::to_html`]; `None` for fragments missing either tag
    pub fn from_html(html: &str) -> Option<Self> {
        let title = between(html, "<h3>", "</h3>")?;
        let content = between(html, "<span>", "</span>")?;
        Some(Self {
            title: title.to_string(),
            content: content.to_string(),
        })
    }
}

fn between<'a>(s: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let start = s.find(open)? + open.len();
    let len = s[start..].find(close)?;
    Some(&s[start..start + len])
}

/// Policy page as exchanged with the admin UI
///
/// `sections[i]` is section `i + 1`; always [`POLICY_SECTION_COUNT`] entries on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policies {
    pub sections: Vec<Option<PolicySection>>,
    pub updated_at: Option<i64>,
}

impl Policies {
    /// Parse stored column values (`section_1..section_10`)
    pub fn from_stored(columns: &[Option<String>], updated_at: Option<i64>) -> Self {
        let mut sections: Vec<Option<PolicySection>> = columns
            .iter()
            .take(POLICY_SECTION_COUNT)
            .map(|c| c.as_deref().and_then(PolicySection::from_html))
            .collect();
        sections.resize(POLICY_SECTION_COUNT, None);
        Self {
            sections,
            updated_at,
        }
    }

    /// Column values to store, blank sections become NULL
    pub fn to_stored(&self) -> Vec<Option<String>> {
        let mut columns: Vec<Option<String>> = self
            .sections
            .iter()
            .take(POLICY_SECTION_COUNT)
            .map(|s| s.as_ref().and_then(PolicySection::to_html))
            .collect();
        columns.resize(POLICY_SECTION_COUNT, None);
        columns
    }
}

/// Update payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoliciesUpdate {
    pub sections: Vec<Option<PolicySection>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(title: &str, content: &str) -> PolicySection {
        PolicySection {
            title: title.into(),
            content: content.into(),
        }
    }

    #[test]
    fn section_html_shape() {
        let html = section("Refunds", "Within 14 days.").to_html().unwrap();
        assert_eq!(html, "<h3>Refunds</h3><span>Within 14 days.</span>");
        assert_eq!(
            PolicySection::from_html(&html),
            Some(section("Refunds", "Within 14 days."))
        );
    }

    #[test]
    fn blank_section_is_not_stored() {
        assert_eq!(section("  ", "text").to_html(), None);
        assert_eq!(section("Title", "").to_html(), None);
    }

    #[test]
    fn multiline_content_parses() {
        let parsed = PolicySection::from_html("<h3>T</h3><span>line one\nline two</span>").unwrap();
        assert_eq!(parsed.content, "line one\nline two");
    }

    #[test]
    fn malformed_fragment_is_dropped() {
        assert_eq!(PolicySection::from_html("<p>legacy</p>"), None);
    }

    #[test]
    fn stored_columns_always_ten() {
        let policies = Policies {
            sections: vec![Some(section("A", "a")), None, Some(section("", "x"))],
            updated_at: None,
        };
        let stored = policies.to_stored();
        assert_eq!(stored.len(), POLICY_SECTION_COUNT);
        assert!(stored[0].is_some());
        assert!(stored[1].is_none());
        assert!(stored[2].is_none());

        let read = Policies::from_stored(&stored, Some(5));
        assert_eq!(read.sections.len(), POLICY_SECTION_COUNT);
        assert_eq!(read.sections[0], Some(section("A", "a")));
        assert_eq!(read.updated_at, Some(5));
    }
}
