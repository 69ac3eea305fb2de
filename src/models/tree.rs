use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    #[default]
    Suite,
    Fixture,
    Test,
}

/// A node of the test tree as the engine discovered it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestNode {
    pub name: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub kind: NodeKind,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// Owning class of a test method, when the engine knows it.
    #[serde(default)]
    pub class_name: Option<String>,
    #[serde(default)]
    pub method_name: Option<String>,
    #[serde(default = "default_runnable")]
    pub runnable: bool,
    #[serde(default)]
    pub children: Vec<TestNode>,
}

fn default_runnable() -> bool {
    true
}

impl TestNode {
    pub fn suite(name: impl Into<String>, children: Vec<TestNode>) -> Self {
        let name = name.into();
        Self {
            full_name: name.clone(),
            name,
            kind: NodeKind::Suite,
            runnable: true,
            children,
            ..Default::default()
        }
    }

    pub fn fixture(name: impl Into<String>, children: Vec<TestNode>) -> Self {
        Self {
            kind: NodeKind::Fixture,
            ..Self::suite(name, children)
        }
    }

    pub fn test(id: impl Into<String>, fixture: &str, method: &str) -> Self {
        Self {
            name: method.to_string(),
            full_name: format!("{}.{}", fixture, method),
            id: id.into(),
            kind: NodeKind::Test,
            class_name: Some(fixture.to_string()),
            method_name: Some(method.to_string()),
            runnable: true,
            ..Default::default()
        }
    }

    pub fn with_categories(mut self, categories: &[&str]) -> Self {
        self.categories = categories.iter().map(|c| c.to_string()).collect();
        self
    }

    /// A leaf the engine can execute on its own.
    pub fn is_test(&self) -> bool {
        self.kind == NodeKind::Test && self.children.is_empty()
    }
}

/// One executable test in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TestEntry {
    pub id: String,
    pub full_name: String,
    #[serde(rename = "fixture")]
    pub fixture_name: String,
    #[serde(rename = "name")]
    pub method_name: String,
    pub description: String,
    /// Own labels followed by those inherited from enclosing nodes.
    pub categories: Vec<String>,
    /// False when the engine reports the test as not runnable. It is still
    /// catalogued and selectable.
    pub runnable: bool,
}

impl TestEntry {
    pub fn has_category(&self, category: &str) -> bool {
        self.categories.iter().any(|c| c == category)
    }
}
