use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use pdfmark_core::Command;

/// What a key or mouse event means to the editor front end. Context-free
/// actions map straight to a [`Command`]; actions that need the tree cursor
/// or a prompt are left to the caller.
#[derive(Debug, Clone)]
pub enum UiEvent {
    Command(Command),
    CursorMove { delta: isize },
    ShowCursor,
    AddTopLevel,
    AddChild,
    EditTitle,
    SetPageToCurrent,
    CycleColor,
    CycleStyle,
    PickDestination,
    DeleteCursor,
    DeleteAll,
    MoveCursor { delta: isize },
    ToggleCollapseCursor,
    ToggleSelectCursor,
    ExtractOutline,
    Import,
    Export,
    Save,
    BeginSearch,
    SearchQueryChanged { query: String },
    SearchSubmit { query: String },
    SearchCancel,
    PromptChanged { input: String },
    PromptSubmit { input: String },
    PromptCancel,
    Confirm(bool),
    PickerHover { column: u16, row: u16 },
    PickerClick { column: u16, row: u16 },
    Resize,
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Normal,
    Search,
    Prompt,
    Confirm,
    Picking,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    mode: InputMode,
    pending_count: Option<u32>,
    pending_digits: String,
    buffer: String,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.buffer.clear();
            self.mode = mode;
        }
    }

    /// Switches to prompt mode with `initial` already typed.
    pub fn begin_prompt(&mut self, initial: &str) {
        self.set_mode(InputMode::Prompt);
        self.buffer = initial.to_owned();
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Resize(..) => UiEvent::Resize,
            Event::Key(KeyEvent {
                kind: KeyEventKind::Release,
                ..
            }) => UiEvent::None,
            Event::Key(key) => match self.mode {
                InputMode::Normal => self.map_key_normal(key),
                InputMode::Search => self.map_key_search(key),
                InputMode::Prompt => self.map_key_prompt(key),
                InputMode::Confirm => map_key_confirm(key),
                InputMode::Picking => map_key_picking(key),
            },
            Event::Mouse(mouse) if self.mode == InputMode::Picking => map_mouse_picking(mouse),
            _ => UiEvent::None,
        }
    }

    fn map_key_normal(&mut self, key: KeyEvent) -> UiEvent {
        let KeyEvent {
            code, modifiers, ..
        } = key;

        if modifiers.contains(KeyModifiers::CONTROL) {
            self.reset_count();
            return match code {
                KeyCode::Char('z') | KeyCode::Char('Z')
                    if modifiers.contains(KeyModifiers::SHIFT) =>
                {
                    UiEvent::Command(Command::Redo)
                }
                // Some terminals report Ctrl+Shift+Z as an uppercase Z only.
                KeyCode::Char('Z') => UiEvent::Command(Command::Redo),
                KeyCode::Char('z') => UiEvent::Command(Command::Undo),
                KeyCode::Char('y') => UiEvent::Command(Command::Redo),
                KeyCode::Char('c') => UiEvent::Quit,
                _ => UiEvent::None,
            };
        }

        if let KeyCode::Char(c) = code {
            if let Some(digit) = c.to_digit(10) {
                self.push_digit(digit);
                return UiEvent::None;
            }
        }

        match code {
            KeyCode::Char('n') | KeyCode::PageDown => {
                let count = self.take_count();
                return UiEvent::Command(Command::NextPage { count });
            }
            KeyCode::Char('p') | KeyCode::PageUp => {
                let count = self.take_count();
                return UiEvent::Command(Command::PrevPage { count });
            }
            KeyCode::Char('g') | KeyCode::Home => {
                // A numeric prefix turns `g` into "go to page N".
                let page = self.pending_count.take().unwrap_or(1);
                self.reset_count();
                return UiEvent::Command(Command::GotoPage { page });
            }
            _ => {}
        }

        self.reset_count();
        match code {
            KeyCode::Char('j') | KeyCode::Down => UiEvent::CursorMove { delta: 1 },
            KeyCode::Char('k') | KeyCode::Up => UiEvent::CursorMove { delta: -1 },
            KeyCode::Enter => UiEvent::ShowCursor,
            KeyCode::Char('G') | KeyCode::End => {
                UiEvent::Command(Command::GotoPage { page: u32::MAX })
            }
            KeyCode::Char('+') => UiEvent::Command(Command::ZoomIn),
            KeyCode::Char('-') => UiEvent::Command(Command::ZoomOut),
            KeyCode::Char('=') => UiEvent::Command(Command::ResetZoom),
            KeyCode::Char('a') => UiEvent::AddTopLevel,
            KeyCode::Char('A') => UiEvent::AddChild,
            KeyCode::Char('e') => UiEvent::EditTitle,
            KeyCode::Char('P') => UiEvent::SetPageToCurrent,
            KeyCode::Char('c') => UiEvent::CycleColor,
            KeyCode::Char('s') => UiEvent::CycleStyle,
            KeyCode::Char('o') => UiEvent::PickDestination,
            KeyCode::Char('x') | KeyCode::Delete => UiEvent::DeleteCursor,
            KeyCode::Char('X') => UiEvent::DeleteAll,
            KeyCode::Char('K') => UiEvent::MoveCursor { delta: -1 },
            KeyCode::Char('J') => UiEvent::MoveCursor { delta: 1 },
            KeyCode::Tab => UiEvent::ToggleCollapseCursor,
            KeyCode::Char('[') => UiEvent::Command(Command::CollapseAll),
            KeyCode::Char(']') => UiEvent::Command(Command::ExpandAll),
            KeyCode::Char('b') => UiEvent::Command(Command::ToggleBatchMode),
            KeyCode::Char(' ') => UiEvent::ToggleSelectCursor,
            KeyCode::Char('*') => UiEvent::Command(Command::SelectAll),
            KeyCode::Char('u') => UiEvent::Command(Command::ClearSelection),
            KeyCode::Char('/') => {
                self.set_mode(InputMode::Search);
                UiEvent::BeginSearch
            }
            KeyCode::Char('E') => UiEvent::ExtractOutline,
            KeyCode::Char('I') => UiEvent::Import,
            KeyCode::Char('O') => UiEvent::Export,
            KeyCode::Char('w') => UiEvent::Save,
            KeyCode::Char('q') => UiEvent::Quit,
            _ => UiEvent::None,
        }
    }

    fn map_key_search(&mut self, key: KeyEvent) -> UiEvent {
        match self.edit_buffer(key) {
            BufferAction::Submit(query) => {
                self.set_mode(InputMode::Normal);
                UiEvent::SearchSubmit { query }
            }
            BufferAction::Cancel => {
                self.set_mode(InputMode::Normal);
                UiEvent::SearchCancel
            }
            BufferAction::Changed(query) => UiEvent::SearchQueryChanged { query },
            BufferAction::Ignored => UiEvent::None,
        }
    }

    fn map_key_prompt(&mut self, key: KeyEvent) -> UiEvent {
        match self.edit_buffer(key) {
            BufferAction::Submit(input) => {
                self.set_mode(InputMode::Normal);
                UiEvent::PromptSubmit { input }
            }
            BufferAction::Cancel => {
                self.set_mode(InputMode::Normal);
                UiEvent::PromptCancel
            }
            BufferAction::Changed(input) => UiEvent::PromptChanged { input },
            BufferAction::Ignored => UiEvent::None,
        }
    }

    fn edit_buffer(&mut self, key: KeyEvent) -> BufferAction {
        match (key.code, key.modifiers) {
            (KeyCode::Esc, _) => BufferAction::Cancel,
            (KeyCode::Enter, _) => BufferAction::Submit(std::mem::take(&mut self.buffer)),
            (KeyCode::Backspace, _) => {
                self.buffer.pop();
                BufferAction::Changed(self.buffer.clone())
            }
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
                self.buffer.clear();
                BufferAction::Changed(String::new())
            }
            (KeyCode::Char(c), mods) if mods.is_empty() || mods == KeyModifiers::SHIFT => {
                self.buffer.push(c);
                BufferAction::Changed(self.buffer.clone())
            }
            _ => BufferAction::Ignored,
        }
    }

    fn push_digit(&mut self, digit: u32) {
        let current = self.pending_count.unwrap_or(0);
        self.pending_count = Some(current.saturating_mul(10).saturating_add(digit));
        if let Some(c) = char::from_digit(digit, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> u32 {
        let count = self.pending_count.take().filter(|&n| n > 0).unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    /// Text for the status line: the numeric prefix, search box or prompt
    /// being typed.
    pub fn pending_input(&self) -> Option<String> {
        match self.mode {
            InputMode::Search => Some(format!("/{}", self.buffer)),
            InputMode::Prompt => Some(self.buffer.clone()),
            _ if !self.pending_digits.is_empty() => Some(self.pending_digits.clone()),
            _ => None,
        }
    }
}

enum BufferAction {
    Submit(String),
    Cancel,
    Changed(String),
    Ignored,
}

fn map_key_confirm(key: KeyEvent) -> UiEvent {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => UiEvent::Confirm(true),
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => UiEvent::Confirm(false),
        _ => UiEvent::None,
    }
}

fn map_key_picking(key: KeyEvent) -> UiEvent {
    match key.code {
        KeyCode::Esc | KeyCode::Char('q') => UiEvent::Command(Command::CancelPicking),
        KeyCode::Char('n') | KeyCode::PageDown => {
            UiEvent::Command(Command::NextPage { count: 1 })
        }
        KeyCode::Char('p') | KeyCode::PageUp => UiEvent::Command(Command::PrevPage { count: 1 }),
        _ => UiEvent::None,
    }
}

fn map_mouse_picking(mouse: MouseEvent) -> UiEvent {
    let MouseEvent {
        kind, column, row, ..
    } = mouse;
    match kind {
        MouseEventKind::Moved | MouseEventKind::Drag(MouseButton::Left) => {
            UiEvent::PickerHover { column, row }
        }
        MouseEventKind::Down(MouseButton::Left) => UiEvent::PickerClick { column, row },
        MouseEventKind::Down(MouseButton::Right) => UiEvent::Command(Command::CancelPicking),
        _ => UiEvent::None,
    }
}
