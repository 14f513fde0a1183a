use tracing::info;

pub const NO_MODELS_NOTICE: &str = "No models found. Please pull a model first (e.g., ollama pull llama2)";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelLoadState {
    Loading,
    Ready,
    Error,
}

/// Installed models and which one the conversation is sent to.
///
/// An empty model list, whether the server was unreachable or simply has no
/// models installed, always lands in `Error`.
#[derive(Debug)]
pub struct ModelSelector {
    state: ModelLoadState,
    models: Vec<String>,
    selected: usize,
}

impl Default for ModelSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelSelector {
    pub fn new() -> Self {
        Self {
            state: ModelLoadState::Loading,
            models: Vec::new(),
            selected: 0,
        }
    }

    pub fn state(&self) -> ModelLoadState {
        self.state
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn is_ready(&self) -> bool {
        self.state == ModelLoadState::Ready
    }

    pub fn finish_loading(&mut self, models: Vec<String>) {
        if models.is_empty() {
            info!("model list is empty");
            self.models.clear();
            self.selected = 0;
            self.state = ModelLoadState::Error;
        } else {
            info!(count = models.len(), first = %models[0], "models loaded");
            self.models = models;
            self.selected = 0;
            self.state = ModelLoadState::Ready;
        }
    }

    /// Re-enters `Loading`. Returns `false` if a load is already running.
    pub fn retry(&mut self) -> bool {
        if self.state == ModelLoadState::Loading {
            return false;
        }
        self.state = ModelLoadState::Loading;
        true
    }

    pub fn selected(&self) -> Option<&str> {
        if !self.is_ready() {
            return None;
        }
        self.models.get(self.selected).map(String::as_str)
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.is_ready().then_some(self.selected)
    }

    pub fn select_next(&mut self) {
        if self.is_ready() && !self.models.is_empty() {
            self.selected = (self.selected + 1) % self.models.len();
        }
    }

    pub fn select_previous(&mut self) {
        if self.is_ready() && !self.models.is_empty() {
            self.selected = if self.selected == 0 {
                self.models.len() - 1
            } else {
                self.selected - 1
            };
        }
    }
}
