use std::sync::Arc;

use axum::response::Html;
use handlebars::Handlebars;
use serde::Serialize;

use crate::{backend::TodoClient, error::PageError, idp::FlowClient};

#[derive(Clone)]
pub struct AppState(Arc<InternalState>);

pub(crate) struct InternalState {
    flows: FlowClient,
    todos: TodoClient,
    templates: Handlebars<'static>,
}

impl AppState {
    pub fn new(flows: FlowClient, todos: TodoClient, templates: Handlebars<'static>) -> Self {
        Self(Arc::new(InternalState {
            flows,
            todos,
            templates,
        }))
    }

    pub fn flows(&self) -> &FlowClient {
        &self.0.flows
    }

    pub fn todos(&self) -> &TodoClient {
        &self.0.todos
    }

    pub fn templates(&self) -> &Handlebars<'static> {
        &self.0.templates
    }

    /// Render a registered template to a full HTML response body.
    pub fn render<T: Serialize>(&self, name: &str, data: &T) -> Result<Html<String>, PageError> {
        Ok(Html(self.0.templates.render(name, data)?))
    }
}
