//! Flattened, indexed view of the discovered test tree.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use crate::models::{NodeKind, TestEntry, TestNode};

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: Vec<TestEntry>,
    categories: IndexSet<String>,
}

/// Tests of one fixture, as listed to clients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureListing<'a> {
    pub name: &'a str,
    pub tests: Vec<&'a TestEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogListing<'a> {
    pub fixtures: Vec<FixtureListing<'a>>,
    pub categories: Vec<&'a str>,
}

impl Catalog {
    /// Walk the tree once, collecting every executable leaf in discovery order
    /// and every category label seen on any node.
    pub fn build(root: &TestNode) -> Self {
        let mut catalog = Catalog::default();
        let mut inherited = Vec::new();
        catalog.collect(root, None, false, &mut inherited);
        catalog
    }

    fn collect<'a>(
        &mut self,
        node: &'a TestNode,
        fixture: Option<&'a str>,
        in_fixture: bool,
        inherited: &mut Vec<&'a str>,
    ) {
        for category in &node.categories {
            if !self.categories.contains(category) {
                self.categories.insert(category.clone());
            }
        }

        if node.is_test() {
            self.entries.push(entry_for(node, fixture, inherited));
            return;
        }

        // Nearest enclosing fixture wins; outside any fixture the parent stands in.
        let (fixture, in_fixture) = if node.kind == NodeKind::Fixture {
            (Some(node.name.as_str()), true)
        } else if in_fixture {
            (fixture, true)
        } else {
            (Some(node.name.as_str()), false)
        };

        let depth = inherited.len();
        inherited.extend(node.categories.iter().map(String::as_str));
        for child in &node.children {
            self.collect(child, fixture, in_fixture, inherited);
        }
        inherited.truncate(depth);
    }

    pub fn entries(&self) -> &[TestEntry] {
        &self.entries
    }

    pub fn categories(&self) -> &IndexSet<String> {
        &self.categories
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn find_by_full_name(&self, full_name: &str) -> Option<&TestEntry> {
        self.entries.iter().find(|e| e.full_name == full_name)
    }

    pub fn has_fixture(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.fixture_name == name)
    }

    /// Entries grouped by fixture in first-seen order.
    pub fn listing(&self) -> CatalogListing<'_> {
        let mut groups: IndexMap<&str, Vec<&TestEntry>> = IndexMap::new();
        for entry in &self.entries {
            groups.entry(entry.fixture_name.as_str()).or_default().push(entry);
        }
        CatalogListing {
            fixtures: groups
                .into_iter()
                .map(|(name, tests)| FixtureListing { name, tests })
                .collect(),
            categories: self.categories.iter().map(String::as_str).collect(),
        }
    }
}

fn entry_for(node: &TestNode, fixture: Option<&str>, inherited: &[&str]) -> TestEntry {
    let mut categories: IndexSet<String> = node.categories.iter().cloned().collect();
    categories.extend(inherited.iter().rev().map(|c| c.to_string()));

    let full_name = if node.full_name.is_empty() {
        node.name.clone()
    } else {
        node.full_name.clone()
    };

    TestEntry {
        id: if node.id.is_empty() { full_name.clone() } else { node.id.clone() },
        fixture_name: node
            .class_name
            .clone()
            .or_else(|| fixture.map(str::to_string))
            .unwrap_or_default(),
        method_name: node.method_name.clone().unwrap_or_else(|| node.name.clone()),
        description: node.description.clone().unwrap_or_default(),
        categories: categories.into_iter().collect(),
        runnable: node.runnable,
        full_name,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> TestNode {
        TestNode::suite(
            "Sample.dll",
            vec![
                TestNode::fixture(
                    "A",
                    vec![
                        TestNode::test("1", "A", "m1").with_categories(&["Smoke"]),
                        TestNode::test("2", "A", "m2"),
                    ],
                )
                .with_categories(&["Unit"]),
                TestNode::fixture(
                    "B",
                    vec![TestNode::test("3", "B", "m1").with_categories(&["Smoke", "Slow"])],
                ),
            ],
        )
    }

    #[test]
    fn collects_leaves_in_discovery_order() {
        let catalog = Catalog::build(&sample_tree());
        let names: Vec<_> = catalog.entries().iter().map(|e| e.full_name.as_str()).collect();
        assert_eq!(names, vec!["A.m1", "A.m2", "B.m1"]);
        assert_eq!(catalog.entries()[2].fixture_name, "B");
        assert_eq!(catalog.entries()[0].method_name, "m1");
    }

    #[test]
    fn categories_are_deduplicated_in_first_seen_order() {
        let catalog = Catalog::build(&sample_tree());
        let categories: Vec<_> = catalog.categories().iter().map(String::as_str).collect();
        assert_eq!(categories, vec!["Unit", "Smoke", "Slow"]);
    }

    #[test]
    fn entries_inherit_fixture_categories() {
        let catalog = Catalog::build(&sample_tree());
        assert_eq!(catalog.entries()[0].categories, vec!["Smoke", "Unit"]);
        assert_eq!(catalog.entries()[1].categories, vec!["Unit"]);
        assert!(!catalog.entries()[2].has_category("Unit"));
    }

    #[test]
    fn empty_tree_yields_empty_catalog() {
        let catalog = Catalog::build(&TestNode::suite("Empty", vec![]));
        assert!(catalog.is_empty());
        assert!(catalog.categories().is_empty());
    }

    #[test]
    fn fixture_falls_back_to_enclosing_node() {
        let mut leaf = TestNode::test("9", "ignored", "orphan");
        leaf.class_name = None;
        let tree = TestNode::suite("Root", vec![TestNode::suite("Namespace", vec![leaf])]);
        let catalog = Catalog::build(&tree);
        assert_eq!(catalog.entries()[0].fixture_name, "Namespace");
    }

    #[test]
    fn non_runnable_tests_are_still_catalogued() {
        let mut skipped = TestNode::test("4", "A", "m3");
        skipped.runnable = false;
        let tree = TestNode::suite(
            "Sample.dll",
            vec![TestNode::fixture("A", vec![TestNode::test("1", "A", "m1"), skipped])],
        );
        let catalog = Catalog::build(&tree);
        assert_eq!(catalog.len(), 2);
        assert!(catalog.entries()[0].runnable);
        assert!(!catalog.entries()[1].runnable);
        assert_eq!(catalog.entries()[1].full_name, "A.m3");
    }

    #[test]
    fn listing_groups_by_fixture() {
        let catalog = Catalog::build(&sample_tree());
        let listing = catalog.listing();
        assert_eq!(listing.fixtures.len(), 2);
        assert_eq!(listing.fixtures[0].name, "A");
        assert_eq!(listing.fixtures[0].tests.len(), 2);
        assert_eq!(listing.categories, vec!["Unit", "Smoke", "Slow"]);
    }
}
