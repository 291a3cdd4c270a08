use std::sync::Arc;

use crate::config::Config;
use crate::middleware::rate_limit::RequestLimiter;
use crate::services::{
    BraceSpanParser, CompletionClient, HttpCompletionClient, PromptComposer, PromptTemplates,
    ResponseParser,
};

/// Read-only state shared by every request.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub composer: Arc<PromptComposer>,
    pub llm: Arc<dyn CompletionClient>,
    pub parser: Arc<dyn ResponseParser>,
    pub limiter: Arc<RequestLimiter>,
}

impl AppState {
    /// Production wiring: templates from config, HTTP gateway client and
    /// the brace-span reply parser.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let templates = PromptTemplates::resolve(config.templates_dir.as_deref())?;
        let llm = HttpCompletionClient::new(&config.llm)?;
        Ok(Self::new(config, templates, Arc::new(llm), Arc::new(BraceSpanParser)))
    }

    pub fn new(
        config: Config,
        templates: PromptTemplates,
        llm: Arc<dyn CompletionClient>,
        parser: Arc<dyn ResponseParser>,
    ) -> Self {
        let composer = PromptComposer::new(templates, config.max_prompt_chars);
        let limiter = RequestLimiter::new(config.max_concurrent_requests);
        Self {
            config: Arc::new(config),
            composer: Arc::new(composer),
            llm,
            parser,
            limiter: Arc::new(limiter),
        }
    }
}
