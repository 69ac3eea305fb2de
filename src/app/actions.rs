use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{
    app::{App, Notice, RunProgress, RunReply},
    catalog::CatalogListing,
    config::ConfigListing,
    error::SelectionError,
    selection::Selection,
};

/// A client request, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum Request {
    Config,
    Tests,
    RunAll,
    RunTest {
        #[serde(default)]
        id: String,
    },
    RunFixture {
        #[serde(default)]
        name: String,
    },
    /// `name` is a comma separated, URL-encoded category list.
    RunCategories {
        #[serde(default)]
        name: String,
    },
    Status,
    Cancel,
}

impl Request {
    pub fn parse(line: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(line)
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Response<'a> {
    Config(&'a ConfigListing),
    Tests(CatalogListing<'a>),
    Run(Arc<RunReply>),
    Status(RunProgress),
    Notice(Notice),
}

impl Response<'_> {
    /// Reply for a request that could not be understood.
    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        Response::Run(Arc::new(RunReply::Error(format!("Invalid request: {reason}"))))
    }
}

/// Answer one request. Run requests wait for the run to finish.
pub async fn handle_request(app: &App, request: Request) -> Response<'_> {
    let catalog = app.coordinator.catalog();
    match request {
        Request::Config => Response::Config(&app.config),
        Request::Tests => Response::Tests(catalog.listing()),
        Request::RunAll => run(app, Selection::all(catalog)).await,
        Request::RunTest { id } => run(app, Selection::by_id(catalog, &id)).await,
        Request::RunFixture { name } => run(app, Selection::by_fixture(catalog, &name)).await,
        Request::RunCategories { name } => {
            run(app, Selection::by_categories(catalog, &name)).await
        }
        Request::Status => Response::Status(app.coordinator.status()),
        Request::Cancel => Response::Notice(app.coordinator.cancel()),
    }
}

async fn run(app: &App, selection: Result<Selection, SelectionError>) -> Response<'_> {
    match selection {
        Ok(selection) => Response::Run(app.coordinator.start(selection).await),
        Err(e) => {
            tracing::debug!(reason = %e, "rejected selection");
            Response::Run(Arc::new(e.into()))
        }
    }
}
