//! Translates client selection requests into predicates over the catalog.

use std::fmt;

use percent_encoding::percent_decode_str;

use crate::{catalog::Catalog, error::SelectionError, models::TestEntry};

/// Which catalog entries a run executes. Built per request and consumed by one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// A single test, by full name.
    Single(String),
    Fixture(String),
    /// Any of these categories.
    Categories(Vec<String>),
    All,
}

impl Selection {
    pub fn by_id(catalog: &Catalog, id: &str) -> Result<Self, SelectionError> {
        if id.trim().is_empty() || catalog.find_by_full_name(id).is_none() {
            return Err(SelectionError::InvalidTest);
        }
        Ok(Selection::Single(id.to_string()))
    }

    pub fn by_fixture(catalog: &Catalog, name: &str) -> Result<Self, SelectionError> {
        if name.trim().is_empty() || !catalog.has_fixture(name) {
            return Err(SelectionError::InvalidFixture);
        }
        Ok(Selection::Fixture(name.to_string()))
    }

    /// `raw` is a comma separated list of URL-encoded category names. Unknown
    /// names are dropped; at least one must be known.
    pub fn by_categories(catalog: &Catalog, raw: &str) -> Result<Self, SelectionError> {
        let requested: Vec<String> = raw
            .split(',')
            .filter(|token| !token.is_empty())
            .map(url_decode)
            .collect();

        let known: Vec<String> = catalog
            .categories()
            .iter()
            .filter(|c| requested.contains(c))
            .cloned()
            .collect();

        if known.is_empty() {
            return Err(SelectionError::InvalidCategories);
        }
        Ok(Selection::Categories(known))
    }

    pub fn all(catalog: &Catalog) -> Result<Self, SelectionError> {
        if catalog.is_empty() {
            return Err(SelectionError::EmptyCatalog);
        }
        Ok(Selection::All)
    }

    pub fn matches(&self, entry: &TestEntry) -> bool {
        match self {
            Selection::Single(full_name) => entry.full_name == *full_name,
            Selection::Fixture(name) => entry.fixture_name == *name,
            Selection::Categories(categories) => categories.iter().any(|c| entry.has_category(c)),
            Selection::All => true,
        }
    }

    /// The entries to hand to the engine. Fixture runs are ordered by id so
    /// that re-runs execute in the same order regardless of discovery order.
    pub fn plan(&self, catalog: &Catalog) -> Vec<TestEntry> {
        let mut planned: Vec<TestEntry> = catalog
            .entries()
            .iter()
            .filter(|e| self.matches(e))
            .cloned()
            .collect();
        if let Selection::Fixture(_) = self {
            planned.sort_by(|a, b| a.id.cmp(&b.id));
        }
        planned
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Single(name) => write!(f, "test {}", name),
            Selection::Fixture(name) => write!(f, "fixture {}", name),
            Selection::Categories(categories) => write!(f, "categories {}", categories.join(",")),
            Selection::All => f.write_str("all tests"),
        }
    }
}

/// Form-style decoding: `+` is a space, `%XX` an escaped byte.
fn url_decode(token: &str) -> String {
    let spaced = token.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TestNode;

    fn catalog() -> Catalog {
        Catalog::build(&TestNode::suite(
            "Sample.dll",
            vec![
                TestNode::fixture(
                    "A",
                    vec![
                        TestNode::test("0-1002", "A", "m2").with_categories(&["Fast Lane"]),
                        TestNode::test("0-1001", "A", "m1"),
                    ],
                ),
                TestNode::fixture(
                    "B",
                    vec![TestNode::test("0-1003", "B", "m1").with_categories(&["Slow"])],
                ),
            ],
        ))
    }

    fn names(plan: &[TestEntry]) -> Vec<&str> {
        plan.iter().map(|e| e.full_name.as_str()).collect()
    }

    #[test]
    fn by_id_selects_one_test() {
        let catalog = catalog();
        let selection = Selection::by_id(&catalog, "B.m1").unwrap();
        assert_eq!(names(&selection.plan(&catalog)), vec!["B.m1"]);
    }

    #[test]
    fn by_id_rejects_blank_and_unknown() {
        let catalog = catalog();
        assert_eq!(Selection::by_id(&catalog, "  "), Err(SelectionError::InvalidTest));
        assert_eq!(Selection::by_id(&catalog, "C.m9"), Err(SelectionError::InvalidTest));
    }

    #[test]
    fn by_fixture_sorts_by_id() {
        let catalog = catalog();
        let selection = Selection::by_fixture(&catalog, "A").unwrap();
        assert_eq!(names(&selection.plan(&catalog)), vec!["A.m1", "A.m2"]);
    }

    #[test]
    fn by_fixture_rejects_unknown() {
        let catalog = catalog();
        assert_eq!(Selection::by_fixture(&catalog, ""), Err(SelectionError::InvalidFixture));
        assert_eq!(Selection::by_fixture(&catalog, "Z"), Err(SelectionError::InvalidFixture));
    }

    #[test]
    fn by_categories_decodes_and_unions() {
        let catalog = catalog();
        let selection = Selection::by_categories(&catalog, "Fast%20Lane,,Slow,Unknown").unwrap();
        assert_eq!(
            selection,
            Selection::Categories(vec!["Fast Lane".into(), "Slow".into()])
        );
        assert_eq!(names(&selection.plan(&catalog)), vec!["A.m2", "B.m1"]);
    }

    #[test]
    fn by_categories_accepts_plus_as_space() {
        let catalog = catalog();
        let selection = Selection::by_categories(&catalog, "Fast+Lane").unwrap();
        assert_eq!(names(&selection.plan(&catalog)), vec!["A.m2"]);
    }

    #[test]
    fn by_categories_rejects_when_nothing_matches() {
        let catalog = catalog();
        assert_eq!(
            Selection::by_categories(&catalog, "Smoke,Regression"),
            Err(SelectionError::InvalidCategories)
        );
        assert_eq!(
            Selection::by_categories(&catalog, ",,"),
            Err(SelectionError::InvalidCategories)
        );
    }

    #[test]
    fn all_requires_tests() {
        let catalog = catalog();
        assert_eq!(Selection::all(&catalog).unwrap().plan(&catalog).len(), 3);
        let empty = Catalog::build(&TestNode::suite("Empty", vec![]));
        assert_eq!(Selection::all(&empty), Err(SelectionError::EmptyCatalog));
    }
}
