use crate::core::dispatcher::Dispatcher;
use crate::core::error::AppError;
use crate::core::worker::WorkerControl;
use crate::tools::ToolCatalog;
use std::path::PathBuf;
use std::time::{Duration, Instant};

const NOTICE_DURATION: Duration = Duration::from_secs(5);

/// Operator inputs of one tool tab.
#[derive(Debug, Clone, PartialEq)]
pub struct TabState {
    pub tool: String,
    /// Synthetic tools need no input or output folder.
    pub synthetic: bool,
    pub log_only: bool,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    /// Inputs are frozen while the tool runs.
    pub locked: bool,
}

/// Which path the operator is typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathField {
    Input,
    Output,
    LogDir,
}

impl PathField {
    pub fn label(self) -> &'static str {
        match self {
            PathField::Input => "Input folder",
            PathField::Output => "Output folder",
            PathField::LogDir => "Log folder",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputMode {
    Normal,
    EditPath { field: PathField, buffer: String },
}

/// Modal error shown until dismissed with Enter or Esc.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popup {
    pub title: String,
    pub message: String,
}

/// UI-side state; run bookkeeping lives in the dispatcher.
pub struct MenuState {
    pub tabs: Vec<TabState>,
    pub active: usize,
    pub input_mode: InputMode,
    pub popup: Option<Popup>,
    pub log_dir: PathBuf,
    notice: Option<(String, Instant)>,
    should_exit: bool,
}

impl MenuState {
    pub fn new(
        catalog: &ToolCatalog,
        input: Option<PathBuf>,
        output: Option<PathBuf>,
        log_dir: PathBuf,
    ) -> Self {
        let tabs = catalog
            .iter()
            .map(|tool| TabState {
                tool: tool.name.clone(),
                synthetic: tool.manifest.is_synthetic(),
                log_only: false,
                input: input.clone(),
                output: output.clone(),
                locked: false,
            })
            .collect();
        MenuState {
            tabs,
            active: 0,
            input_mode: InputMode::Normal,
            popup: None,
            log_dir,
            notice: None,
            should_exit: false,
        }
    }

    pub fn active_tab(&self) -> Option<&TabState> {
        self.tabs.get(self.active)
    }

    pub fn active_tab_mut(&mut self) -> Option<&mut TabState> {
        self.tabs.get_mut(self.active)
    }

    pub fn next_tab(&mut self) {
        if !self.tabs.is_empty() {
            self.active = (self.active + 1) % self.tabs.len();
        }
    }

    pub fn previous_tab(&mut self) {
        if self.tabs.is_empty() {
            return;
        }
        self.active = if self.active == 0 {
            self.tabs.len() - 1
        } else {
            self.active - 1
        };
    }

    /// Open the path prompt prefilled with the current value.
    pub fn begin_edit(&mut self, field: PathField) {
        let current = match field {
            PathField::LogDir => Some(self.log_dir.clone()),
            PathField::Input => self.active_tab().and_then(|tab| tab.input.clone()),
            PathField::Output => self.active_tab().and_then(|tab| tab.output.clone()),
        };
        self.input_mode = InputMode::EditPath {
            field,
            buffer: current
                .map(|path| path.display().to_string())
                .unwrap_or_default(),
        };
    }

    /// Store a typed path for the active tab; blank clears it.
    pub fn commit_path(&mut self, field: PathField, value: &str) {
        let value = value.trim();
        let path = (!value.is_empty()).then(|| PathBuf::from(value));
        match field {
            PathField::LogDir => {
                if let Some(path) = path {
                    self.log_dir = path;
                }
            }
            PathField::Input => {
                if let Some(tab) = self.active_tab_mut() {
                    tab.input = path;
                }
            }
            PathField::Output => {
                if let Some(tab) = self.active_tab_mut() {
                    tab.output = path;
                }
            }
        }
    }

    pub fn show_error(&mut self, error: &AppError) {
        let title = if error.is_user_entry() {
            "User Entry Error:".to_string()
        } else {
            format!("{}:", error.category)
        };
        self.popup = Some(Popup {
            title,
            message: error.message.clone(),
        });
    }

    pub fn dismiss_popup(&mut self) {
        self.popup = None;
    }

    pub fn set_notice(&mut self, notice: impl Into<String>) {
        self.notice = Some((notice.into(), Instant::now()));
    }

    pub fn notice(&self) -> Option<&str> {
        self.notice.as_ref().map(|(text, _)| text.as_str())
    }

    /// Freeze the tabs of running tools and expire stale notices.
    pub fn sync<W: WorkerControl>(&mut self, dispatcher: &Dispatcher<W>) {
        for tab in &mut self.tabs {
            tab.locked = dispatcher.is_running(&tab.tool);
        }
        if matches!(&self.notice, Some((_, at)) if at.elapsed() > NOTICE_DURATION) {
            self.notice = None;
        }
    }

    pub fn request_exit(&mut self) {
        self.should_exit = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.should_exit
    }
}
