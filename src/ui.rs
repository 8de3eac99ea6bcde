use crate::board::{self, Lanes, SortKey};
use crate::commands::App;
use crate::form::{lead_label, TaskForm};
use crate::model::{Status, Task, TaskId};
use crate::poller::{
    alert_text, AlertQueue, NotificationPermission, ReminderPoller, TerminalNotifier,
};
use crate::remote::{AuthBackend, AuthEvent};
use anyhow::Result;
use chrono::{Local, Utc};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::{Alignment, Color, Modifier, Rect, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;
use std::io::{stdout, Stdout};
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

pub fn run(app: App) -> Result<()> {
    let mut terminal = setup_terminal()?;
    let mut board = BoardApp::new(app);
    let result = board.event_loop(&mut terminal);
    board.poller.stop();
    teardown_terminal(&mut terminal)?;
    result
}

struct BoardApp {
    app: App,
    selected_lane: usize,
    selected_task: usize,
    scroll_offsets: [usize; 3],
    last_reload: Instant,
    status: String,
    mode: Mode,
    query: FieldValue,
    sort: SortKey,
    poller: ReminderPoller,
    permission: NotificationPermission,
    alerts: AlertQueue,
    desktop: TerminalNotifier<Stdout>,
    notice: Option<String>,
    auth_events: Receiver<AuthEvent>,
}

enum Mode {
    Normal,
    Searching,
    Creating(FormState),
    ConfirmDelete { task_id: TaskId },
    Login(LoginState),
}

#[derive(Copy, Clone, PartialEq, Eq, Debug)]
enum FormField {
    Title,
    Description,
    Date,
    Time,
    Priority,
    Urgent,
    Importance,
    Reminder,
    Recurrence,
}

const FORM_FIELDS: [FormField; 9] = [
    FormField::Title,
    FormField::Description,
    FormField::Date,
    FormField::Time,
    FormField::Priority,
    FormField::Urgent,
    FormField::Importance,
    FormField::Reminder,
    FormField::Recurrence,
];

struct FormState {
    form: TaskForm,
    title: FieldValue,
    description: FieldValue,
    date: FieldValue,
    time: FieldValue,
    field: FormField,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum LoginStep {
    Email,
    Code,
}

struct LoginState {
    step: LoginStep,
    email: FieldValue,
    code: FieldValue,
}

#[derive(Clone, Default)]
struct FieldValue {
    value: String,
    cursor: usize,
}

impl FieldValue {
    fn new(value: &str) -> Self {
        FieldValue {
            value: value.to_string(),
            cursor: value.len(),
        }
    }

    fn move_left(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor = prev_char(self.cursor, &self.value);
    }

    fn move_right(&mut self) {
        if self.cursor >= self.value.len() {
            return;
        }
        self.cursor = next_char(self.cursor, &self.value);
    }

    fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        let prev = prev_char(self.cursor, &self.value);
        self.value.drain(prev..self.cursor);
        self.cursor = prev;
    }

    fn insert_char(&mut self, ch: char) {
        self.value.insert(self.cursor, ch);
        self.cursor += ch.len_utf8();
    }

    fn clear(&mut self) {
        self.value.clear();
        self.cursor = 0;
    }

    fn with_caret(&self) -> String {
        let mut text = self.value.clone();
        text.insert_str(self.cursor, "▌");
        text
    }
}

impl FormState {
    fn new() -> Self {
        FormState {
            form: TaskForm::new(),
            title: FieldValue::new(""),
            description: FieldValue::new(""),
            date: FieldValue::new(&Local::now().format("%Y-%m-%d").to_string()),
            time: FieldValue::new(""),
            field: FormField::Title,
        }
    }

    fn next_field(&mut self) {
        self.field = shift_field(self.field, 1);
    }

    fn prev_field(&mut self) {
        self.field = shift_field(self.field, -1);
    }

    fn text_field_mut(&mut self) -> Option<&mut FieldValue> {
        match self.field {
            FormField::Title => Some(&mut self.title),
            FormField::Description => Some(&mut self.description),
            FormField::Date => Some(&mut self.date),
            FormField::Time => Some(&mut self.time),
            _ => None,
        }
    }

    fn cycle_choice(&mut self, delta: isize) {
        match self.field {
            FormField::Priority => self.form.cycle_priority(delta),
            FormField::Importance => self.form.cycle_importance(delta),
            FormField::Reminder => self.form.cycle_lead(delta),
            FormField::Recurrence => self.form.cycle_recurrence(delta),
            FormField::Urgent => self.form.urgent = !self.form.urgent,
            _ => {}
        }
    }

    fn sync_text(&mut self) {
        self.form.title = self.title.value.clone();
        self.form.description = self.description.value.clone();
        self.form.date = self.date.value.clone();
        self.form.time = self.time.value.clone();
    }
}

impl LoginState {
    fn new() -> Self {
        LoginState {
            step: LoginStep::Email,
            email: FieldValue::default(),
            code: FieldValue::default(),
        }
    }

    fn active_mut(&mut self) -> &mut FieldValue {
        match self.step {
            LoginStep::Email => &mut self.email,
            LoginStep::Code => &mut self.code,
        }
    }
}

impl BoardApp {
    fn new(mut app: App) -> Self {
        let (tx, rx) = mpsc::channel();
        app.auth.on_auth_change(move |event| {
            let _ = tx.send(event.clone());
        });
        let poller = ReminderPoller::new(
            app.config.poll_interval(),
            app.config.reminder_tolerance(),
        );
        let permission = app.config.notifications;
        let mut board = BoardApp {
            app,
            selected_lane: 0,
            selected_task: 0,
            scroll_offsets: [0; 3],
            last_reload: Instant::now(),
            status: String::new(),
            mode: Mode::Normal,
            query: FieldValue::default(),
            sort: SortKey::Date,
            poller,
            permission,
            alerts: AlertQueue::default(),
            desktop: TerminalNotifier::new(stdout()),
            notice: None,
            auth_events: rx,
        };
        if board.app.auth.current_user().is_some() {
            board.start_session();
        } else {
            board.mode = Mode::Login(LoginState::new());
            board.status = "Non connecté".into();
        }
        board
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
        loop {
            terminal.draw(|f| self.draw(f))?;
            self.drain_auth_events();
            self.tick_reminders(Instant::now());
            if event::poll(Duration::from_millis(200))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key)? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    fn start_session(&mut self) {
        self.app.tracker.set_session(self.app.auth.session());
        self.reload("Tâches chargées");
        self.poller.start(Instant::now());
    }

    fn drain_auth_events(&mut self) {
        while let Ok(event) = self.auth_events.try_recv() {
            // A new user never inherits the previous user's timer or list.
            self.poller.stop();
            self.alerts = AlertQueue::default();
            self.selected_lane = 0;
            self.selected_task = 0;
            match event {
                AuthEvent::SignedIn(user) => {
                    info!(user = %user.id, "board session started");
                    self.start_session();
                }
                AuthEvent::SignedOut => {
                    self.app.tracker.set_session(None);
                    self.status = "Déconnecté (L pour se connecter)".into();
                }
            }
        }
    }

    fn tick_reminders(&mut self, at: Instant) {
        if !self.poller.is_due(at) {
            return;
        }
        let now = Utc::now();
        self.app.refresh_if_expiring(now);
        let store = self.app.tracker.store_mut();
        let fired = match self.permission {
            NotificationPermission::System => self.poller.poll(at, now, store, &mut self.desktop),
            NotificationPermission::Alert => self.poller.poll(at, now, store, &mut self.alerts),
        };
        if fired > 0 {
            self.status = format!("{} rappel(s) envoyé(s)", fired);
        }
    }

    fn reload(&mut self, message: &str) {
        self.app.refresh_if_expiring(Utc::now());
        match self.app.tracker.reload() {
            Ok(()) => {
                self.last_reload = Instant::now();
                self.status = message.to_string();
            }
            Err(err) => {
                error!(error = %err, "loading tasks failed");
                self.status = format!("Erreur chargement tâches : {}", err);
            }
        }
        self.clamp_selection();
    }

    fn blocking_alert(&self) -> Option<String> {
        self.notice
            .clone()
            .or_else(|| self.alerts.front().map(alert_text))
    }

    fn handle_key(&mut self, key: KeyEvent) -> Result<bool> {
        if self.blocking_alert().is_some() {
            if matches!(key.code, KeyCode::Enter | KeyCode::Esc | KeyCode::Char(' ')) {
                if self.notice.take().is_none() {
                    self.alerts.pop();
                }
            }
            return Ok(false);
        }
        match self.mode {
            Mode::Normal => self.handle_normal_key(key),
            Mode::Searching => {
                self.handle_search_key(key);
                Ok(false)
            }
            Mode::Creating(_) => {
                self.handle_form_key(key);
                Ok(false)
            }
            Mode::ConfirmDelete { .. } => {
                self.handle_confirm_key(key);
                Ok(false)
            }
            Mode::Login(_) => {
                self.handle_login_key(key);
                Ok(false)
            }
        }
    }

    fn handle_normal_key(&mut self, key: KeyEvent) -> Result<bool> {
        let signed_in = self.app.auth.current_user().is_some();
        match key.code {
            KeyCode::Char('q') => return Ok(true),
            KeyCode::Char('L') => {
                if signed_in {
                    self.sign_out();
                } else {
                    self.mode = Mode::Login(LoginState::new());
                }
            }
            _ if !signed_in => {
                self.status = "Non connecté (L pour se connecter)".into();
            }
            KeyCode::Left | KeyCode::Char('h') => self.prev_lane(),
            KeyCode::Right | KeyCode::Char('l') => self.next_lane(),
            KeyCode::Up | KeyCode::Char('k') => self.prev_task(),
            KeyCode::Down | KeyCode::Char('j') => self.next_task(),
            KeyCode::Char('m') | KeyCode::Char('>') => self.move_selected(1),
            KeyCode::Char('b') | KeyCode::Char('<') => self.move_selected(-1),
            KeyCode::Char('n') => {
                self.mode = Mode::Creating(FormState::new());
                self.status =
                    "Nouvelle tâche (Tab/Shift-Tab champs, ←→ choix, Entrée valider, Échap annuler)"
                        .into();
            }
            KeyCode::Char('d') => {
                let selected = self.current_task().map(|t| (t.id.clone(), t.title.clone()));
                if let Some((task_id, title)) = selected {
                    self.status = format!("Supprimer {} ? (o pour confirmer)", title);
                    self.mode = Mode::ConfirmDelete { task_id };
                } else {
                    self.status = "Aucune tâche sélectionnée".into();
                }
            }
            KeyCode::Char('/') => {
                self.mode = Mode::Searching;
                self.status = "Recherche (Entrée garder, Échap effacer)".into();
            }
            KeyCode::Char('s') => {
                self.sort = self.sort.next();
                self.selected_task = 0;
                self.status = format!("Tri : {}", self.sort);
            }
            KeyCode::Char('r') => self.reload("Tâches rechargées"),
            _ => {}
        }
        Ok(false)
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.query.clear();
                self.mode = Mode::Normal;
                self.status = "Recherche effacée".into();
            }
            KeyCode::Enter => {
                self.mode = Mode::Normal;
                self.status = format!("Recherche : {}", self.query.value);
            }
            KeyCode::Left => self.query.move_left(),
            KeyCode::Right => self.query.move_right(),
            KeyCode::Backspace => self.query.backspace(),
            KeyCode::Char(c) if !has_modifier(&key) => self.query.insert_char(c),
            _ => {}
        }
        self.selected_task = 0;
        self.clamp_selection();
    }

    fn handle_form_key(&mut self, key: KeyEvent) {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let close = match &mut mode {
            Mode::Creating(state) => self.process_form_key(state, key),
            _ => true,
        };
        self.mode = if close { Mode::Normal } else { mode };
    }

    fn process_form_key(&mut self, state: &mut FormState, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => {
                self.status = "Annulé".into();
                return true;
            }
            KeyCode::Tab | KeyCode::Down => state.next_field(),
            KeyCode::BackTab | KeyCode::Up => state.prev_field(),
            KeyCode::Enter => return self.submit_form(state),
            KeyCode::Left => match state.text_field_mut() {
                Some(field) => field.move_left(),
                None => state.cycle_choice(-1),
            },
            KeyCode::Right => match state.text_field_mut() {
                Some(field) => field.move_right(),
                None => state.cycle_choice(1),
            },
            KeyCode::Backspace => {
                if let Some(field) = state.text_field_mut() {
                    field.backspace();
                }
            }
            KeyCode::Char(c) if !has_modifier(&key) => match state.text_field_mut() {
                Some(field) => field.insert_char(c),
                None if c == ' ' => state.cycle_choice(1),
                None => {}
            },
            _ => {}
        }
        false
    }

    fn submit_form(&mut self, state: &mut FormState) -> bool {
        state.sync_text();
        let draft = match state.form.submit() {
            Ok(draft) => draft,
            Err(err) => {
                self.notice = Some(err.to_string());
                return false;
            }
        };
        let title = draft.title.clone();
        self.app.refresh_if_expiring(Utc::now());
        match self.app.tracker.create(draft) {
            Ok(id) => {
                self.last_reload = Instant::now();
                self.status = format!("Tâche ajoutée : {}", title);
                self.selected_lane = Status::Todo.index();
                self.selected_task = self
                    .lanes()
                    .lane(Status::Todo)
                    .iter()
                    .position(|t| t.id == id)
                    .unwrap_or(0);
                self.clamp_selection();
            }
            Err(err) => {
                error!(error = %err, "inserting task failed");
                self.status = format!("Erreur ajout tâche : {}", err);
            }
        }
        true
    }

    fn handle_confirm_key(&mut self, key: KeyEvent) {
        let task_id = match &self.mode {
            Mode::ConfirmDelete { task_id } => task_id.clone(),
            _ => return,
        };
        match key.code {
            KeyCode::Char('o') | KeyCode::Char('y') | KeyCode::Enter => {
                self.app.refresh_if_expiring(Utc::now());
                match self.app.tracker.delete(&task_id) {
                    Ok(()) => {
                        self.last_reload = Instant::now();
                        self.status = format!("Tâche {} supprimée", task_id);
                    }
                    Err(err) => {
                        error!(task = %task_id, error = %err, "deleting task failed");
                        self.status = format!("Erreur suppression tâche : {}", err);
                    }
                }
                self.clamp_selection();
                self.mode = Mode::Normal;
            }
            KeyCode::Char('n') | KeyCode::Esc => {
                self.status = "Suppression annulée".into();
                self.mode = Mode::Normal;
            }
            _ => {}
        }
    }

    fn handle_login_key(&mut self, key: KeyEvent) {
        let mut mode = std::mem::replace(&mut self.mode, Mode::Normal);
        let close = match &mut mode {
            Mode::Login(state) => self.process_login_key(state, key),
            _ => true,
        };
        self.mode = if close { Mode::Normal } else { mode };
    }

    fn process_login_key(&mut self, state: &mut LoginState, key: KeyEvent) -> bool {
        match key.code {
            KeyCode::Esc => return true,
            KeyCode::Left => state.active_mut().move_left(),
            KeyCode::Right => state.active_mut().move_right(),
            KeyCode::Backspace => state.active_mut().backspace(),
            KeyCode::Char(c) if !has_modifier(&key) => state.active_mut().insert_char(c),
            KeyCode::Enter => match state.step {
                LoginStep::Email => {
                    let email = state.email.value.trim().to_string();
                    if email.is_empty() {
                        return false;
                    }
                    match self.app.tracker.backend().request_code(&email) {
                        Ok(()) => {
                            state.step = LoginStep::Code;
                            self.status = format!("Code envoyé à {}", email);
                        }
                        Err(err) => {
                            warn!(error = %err, "requesting sign-in code failed");
                            self.status = format!("Erreur connexion : {}", err);
                        }
                    }
                }
                LoginStep::Code => {
                    let email = state.email.value.trim().to_string();
                    let code = state.code.value.trim().to_string();
                    match self.app.tracker.backend().verify_code(&email, &code) {
                        Ok(session) => {
                            self.app.auth.sign_in(session);
                            return true;
                        }
                        Err(err) => {
                            warn!(error = %err, "verifying sign-in code failed");
                            self.status = format!("Code refusé : {}", err);
                            state.code.clear();
                        }
                    }
                }
            },
            _ => {}
        }
        false
    }

    fn sign_out(&mut self) {
        if let Some(session) = self.app.auth.session().cloned() {
            if let Err(err) = self.app.tracker.backend().sign_out(&session) {
                warn!(error = %err, "remote sign-out failed");
            }
        }
        self.app.auth.sign_out();
    }

    fn lanes(&self) -> Lanes<'_> {
        Lanes::build(self.app.tracker.store().tasks(), &self.query.value, self.sort)
    }

    fn current_task(&self) -> Option<&Task> {
        let status = Status::ALL[self.selected_lane];
        self.lanes().lane(status).get(self.selected_task).copied()
    }

    fn clamp_selection(&mut self) {
        let status = Status::ALL[self.selected_lane];
        let len = self.lanes().lane(status).len();
        self.selected_task = self.selected_task.min(len.saturating_sub(1));
    }

    fn prev_lane(&mut self) {
        if self.selected_lane > 0 {
            self.selected_lane -= 1;
            self.selected_task = 0;
        }
    }

    fn next_lane(&mut self) {
        if self.selected_lane + 1 < Status::ALL.len() {
            self.selected_lane += 1;
            self.selected_task = 0;
        }
    }

    fn prev_task(&mut self) {
        if self.selected_task > 0 {
            self.selected_task -= 1;
        }
    }

    fn next_task(&mut self) {
        self.selected_task += 1;
        self.clamp_selection();
    }

    fn move_selected(&mut self, delta: isize) {
        let Some(task) = self.current_task() else {
            self.status = "Aucune tâche sélectionnée".into();
            return;
        };
        let target = task.status.shifted(delta);
        if target == task.status {
            return;
        }
        let id = task.id.clone();
        self.app.refresh_if_expiring(Utc::now());
        match self.app.tracker.set_status(&id, target) {
            Ok(()) => {
                self.last_reload = Instant::now();
                self.selected_lane = target.index();
                self.selected_task = self
                    .lanes()
                    .lane(target)
                    .iter()
                    .position(|t| t.id == id)
                    .unwrap_or(0);
                self.status = format!("Déplacée vers {}", target);
            }
            Err(err) => {
                error!(task = %id, error = %err, "updating status failed");
                self.status = format!("Erreur mise à jour statut : {}", err);
            }
        }
    }

    fn draw(&mut self, f: &mut ratatui::Frame<'_>) {
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Min(8),
                Constraint::Length(4),
            ])
            .split(f.size());

        self.draw_header(f, layout[0]);
        self.draw_board(f, layout[1]);
        self.draw_footer(f, layout[2]);

        match &self.mode {
            Mode::Creating(state) => draw_form(f, state),
            Mode::ConfirmDelete { task_id } => self.draw_confirm(f, task_id),
            Mode::Login(state) => draw_login(f, state),
            Mode::Normal | Mode::Searching => {}
        }
        if let Some(message) = self.blocking_alert() {
            draw_alert(f, &message);
        }
    }

    fn draw_header(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let who = match self.app.auth.current_user() {
            Some(user) => user.email.clone().unwrap_or_else(|| user.id.clone()),
            None => "non connecté".to_string(),
        };
        let search = if matches!(self.mode, Mode::Searching) {
            self.query.with_caret()
        } else if self.query.value.is_empty() {
            "—".to_string()
        } else {
            self.query.value.clone()
        };
        let next_scan = self
            .poller
            .remaining(Instant::now())
            .map(|d| format!("rappels dans {}s", d.as_secs()))
            .unwrap_or_else(|| "rappels arrêtés".to_string());
        let title = Line::from(vec![
            Span::styled(
                "Mes tâches quotidiennes ",
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(who, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw("  •  "),
            Span::styled(
                format!("🔎 {}", search),
                Style::default().fg(Color::LightYellow),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("tri {}", self.sort),
                Style::default().fg(Color::Magenta),
            ),
            Span::raw("  •  "),
            Span::styled(
                format!("chargé {}", format_elapsed(self.last_reload)),
                Style::default().fg(Color::Gray),
            ),
            Span::raw("  •  "),
            Span::styled(next_scan, Style::default().fg(Color::DarkGray)),
        ]);
        let block = Block::default()
            .borders(Borders::BOTTOM)
            .border_style(Style::default().fg(Color::DarkGray));
        let paragraph = Paragraph::new(title)
            .alignment(Alignment::Center)
            .block(block);
        f.render_widget(paragraph, area);
    }

    fn draw_board(&mut self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Percentage(33),
                Constraint::Percentage(33),
                Constraint::Percentage(34),
            ])
            .split(area);

        let mut offsets = self.scroll_offsets;
        {
            let lanes = self.lanes();
            for (idx, (status, tasks)) in lanes.iter().enumerate() {
                let accent = color_for_index(idx);
                let card_width = chunks[idx].width.saturating_sub(2);
                let active = idx == self.selected_lane;
                let items = tasks
                    .iter()
                    .enumerate()
                    .map(|(t_idx, task)| {
                        task_item(task, card_width, active && t_idx == self.selected_task)
                    })
                    .collect::<Vec<_>>();
                let mut state = ListState::default();
                let viewport = (chunks[idx].height.saturating_sub(2) / CARD_HEIGHT) as usize;
                if active && !items.is_empty() {
                    offsets[idx] =
                        adjust_offset(self.selected_task, offsets[idx], viewport, 0, items.len());
                    state.select(Some(self.selected_task));
                } else {
                    offsets[idx] = offsets[idx].min(items.len().saturating_sub(1));
                }
                *state.offset_mut() = offsets[idx];

                let block = Block::default()
                    .title(Span::styled(
                        format!("{} ({})", status, tasks.len()),
                        Style::default().fg(accent).add_modifier(if active {
                            Modifier::BOLD | Modifier::UNDERLINED
                        } else {
                            Modifier::BOLD
                        }),
                    ))
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(accent))
                    .style(Style::default().bg(Color::Rgb(16, 18, 24)));
                let list = List::new(items).block(block);
                f.render_stateful_widget(list, chunks[idx], &mut state);
            }
        }
        self.scroll_offsets = offsets;
    }

    fn draw_footer(&self, f: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(2), Constraint::Length(2)])
            .split(area);

        let help_bar = Paragraph::new(help_line())
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(help_bar, rows[0]);

        let bottom = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(rows[1]);

        let status = Paragraph::new(self.status.clone())
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .borders(Borders::TOP)
                    .border_style(Style::default().fg(Color::DarkGray)),
            );
        f.render_widget(status, bottom[0]);

        let detail = match self.current_task() {
            Some(task) => selected_task_detail(task),
            None => Line::from("Aucune tâche sélectionnée"),
        };
        let detail = Paragraph::new(detail).wrap(Wrap { trim: true }).block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(Color::DarkGray))
                .title("Sélection"),
        );
        f.render_widget(detail, bottom[1]);
    }

    fn draw_confirm(&self, f: &mut ratatui::Frame<'_>, task_id: &TaskId) {
        let area = centered_rect(50, 30, f.size());
        let title = self
            .app
            .tracker
            .store()
            .get(task_id)
            .map(|t| t.title.clone())
            .unwrap_or_else(|| task_id.to_string());
        let body = vec![
            Line::from(Span::styled(
                format!("Supprimer « {} » ?", title),
                Style::default()
                    .fg(Color::LightRed)
                    .add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from("o pour confirmer, n ou Échap pour annuler"),
        ];
        let dialog = Paragraph::new(body)
            .alignment(Alignment::Center)
            .block(dialog_block("🗑️ Supprimer", Color::LightRed));
        f.render_widget(Clear, area);
        f.render_widget(dialog, area);
    }
}

const CARD_HEIGHT: u16 = 6;

fn draw_form(f: &mut ratatui::Frame<'_>, state: &FormState) {
    let area = centered_rect(70, 70, f.size());
    let form = &state.form;
    let mut lines = Vec::new();
    lines.extend(text_line("Titre", &state.title, state.field == FormField::Title));
    lines.extend(text_line(
        "Description",
        &state.description,
        state.field == FormField::Description,
    ));
    lines.extend(text_line(
        "Date limite (AAAA-MM-JJ)",
        &state.date,
        state.field == FormField::Date,
    ));
    lines.extend(text_line(
        "Heure limite (HH:MM)",
        &state.time,
        state.field == FormField::Time,
    ));
    lines.push(choice_line(
        "Priorité",
        form.priority.label(),
        state.field == FormField::Priority,
    ));
    lines.push(choice_line(
        "Urgent",
        if form.urgent { "Oui" } else { "Non" },
        state.field == FormField::Urgent,
    ));
    lines.push(choice_line(
        "Importance",
        form.importance.label(),
        state.field == FormField::Importance,
    ));
    lines.push(choice_line(
        "Rappel automatique",
        &lead_label(form.lead_days),
        state.field == FormField::Reminder,
    ));
    lines.push(choice_line(
        "Récurrence",
        form.recurrence.label(),
        state.field == FormField::Recurrence,
    ));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Entrée ajouter • Échap annuler • Tab/↑↓ champs • ←→/Espace choix",
        Style::default().fg(Color::Gray),
    )));
    let dialog = Paragraph::new(lines)
        .block(dialog_block("➕ Ajouter une tâche", Color::Cyan))
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn draw_login(f: &mut ratatui::Frame<'_>, state: &LoginState) {
    let area = centered_rect(60, 35, f.size());
    let mut lines = Vec::new();
    lines.extend(text_line(
        "Email",
        &state.email,
        state.step == LoginStep::Email,
    ));
    if state.step == LoginStep::Code {
        lines.extend(text_line("Code reçu", &state.code, true));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        match state.step {
            LoginStep::Email => "Entrée pour recevoir un code par email • Échap fermer",
            LoginStep::Code => "Entrée pour valider le code • Échap fermer",
        },
        Style::default().fg(Color::Gray),
    )));
    let dialog = Paragraph::new(lines)
        .block(dialog_block("Connexion", Color::LightGreen))
        .wrap(Wrap { trim: true });
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn draw_alert(f: &mut ratatui::Frame<'_>, message: &str) {
    let area = centered_rect(50, 25, f.size());
    let body = vec![
        Line::from(Span::styled(
            message.to_string(),
            Style::default()
                .fg(Color::LightYellow)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("Entrée pour fermer"),
    ];
    let dialog = Paragraph::new(body)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(dialog_block("Alerte", Color::LightYellow));
    f.render_widget(Clear, area);
    f.render_widget(dialog, area);
}

fn dialog_block(title: &str, color: Color) -> Block<'static> {
    Block::default()
        .title(Span::styled(
            title.to_string(),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
}

fn help_line() -> Line<'static> {
    Line::from(vec![
        Span::styled("←↑↓→ / h j k l", Style::default().fg(Color::LightCyan)),
        Span::raw(" naviguer  "),
        Span::styled("m/>", Style::default().fg(Color::LightGreen)),
        Span::raw(" avancer  "),
        Span::styled("b/<", Style::default().fg(Color::LightGreen)),
        Span::raw(" reculer  "),
        Span::styled("n", Style::default().fg(Color::LightMagenta)),
        Span::raw(" nouvelle  "),
        Span::styled("/", Style::default().fg(Color::LightYellow)),
        Span::raw(" rechercher  "),
        Span::styled("s", Style::default().fg(Color::LightYellow)),
        Span::raw(" trier  "),
        Span::styled("r", Style::default().fg(Color::LightBlue)),
        Span::raw(" recharger  "),
        Span::styled("d", Style::default().fg(Color::LightRed)),
        Span::raw(" supprimer  "),
        Span::styled("L", Style::default().fg(Color::LightBlue)),
        Span::raw(" connexion  "),
        Span::styled("q", Style::default().fg(Color::LightRed)),
        Span::raw(" quitter"),
    ])
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

fn teardown_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

fn has_modifier(key: &KeyEvent) -> bool {
    key.modifiers
        .intersects(KeyModifiers::CONTROL | KeyModifiers::ALT)
}

fn shift_field(current: FormField, delta: isize) -> FormField {
    let len = FORM_FIELDS.len() as isize;
    let idx = FORM_FIELDS.iter().position(|f| *f == current).unwrap_or(0) as isize;
    FORM_FIELDS[(idx + delta).rem_euclid(len) as usize]
}

fn color_for_index(idx: usize) -> Color {
    let palette = [Color::Cyan, Color::LightYellow, Color::LightGreen];
    palette[idx % palette.len()]
}

fn adjust_offset(
    selected: usize,
    current_offset: usize,
    viewport: usize,
    scrolloff: usize,
    len: usize,
) -> usize {
    if viewport == 0 || len == 0 {
        return 0;
    }
    let max_offset = len.saturating_sub(viewport);
    let margin = scrolloff.min(viewport.saturating_sub(1));
    let mut offset = current_offset.min(max_offset);
    if selected < offset.saturating_add(margin) {
        offset = selected.saturating_sub(margin);
    } else {
        let upper = offset
            .saturating_add(viewport.saturating_sub(1))
            .saturating_sub(margin);
        if selected > upper {
            offset = selected.saturating_add(margin + 1).saturating_sub(viewport);
        }
    }
    offset.min(max_offset)
}

fn prev_char(cursor: usize, text: &str) -> usize {
    text[..cursor]
        .char_indices()
        .next_back()
        .map(|(idx, _)| idx)
        .unwrap_or(0)
}

fn next_char(cursor: usize, text: &str) -> usize {
    text[cursor..]
        .chars()
        .next()
        .map(|ch| cursor + ch.len_utf8())
        .unwrap_or(text.len())
}

fn truncate_text(text: &str, max: usize) -> String {
    if max == 0 {
        return String::new();
    }
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn task_item(task: &Task, width: u16, selected: bool) -> ListItem<'static> {
    let inner = width.saturating_sub(2).max(10) as usize;
    let lines = vec![
        Line::from(Span::styled(
            truncate_text(&task.title, inner),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::raw(truncate_text(&board::due_line(task), inner)),
        Line::raw(truncate_text(&board::classification_line(task), inner)),
        Line::raw(truncate_text(&board::schedule_line(task), inner)),
        Line::raw(if task.notified { "🔔 rappel envoyé" } else { "" }),
        Line::raw("─".repeat(inner)),
    ];
    let base = if task.urgent {
        Style::default().bg(Color::Rgb(60, 24, 28)).fg(Color::Gray)
    } else {
        Style::default().bg(Color::Rgb(22, 44, 30)).fg(Color::Gray)
    };
    let mut item = ListItem::new(lines).style(base);
    if selected {
        item = item.style(
            Style::default()
                .bg(Color::Rgb(252, 214, 112))
                .fg(Color::Black)
                .add_modifier(Modifier::BOLD),
        );
    }
    item
}

fn text_line(label: &str, field: &FieldValue, active: bool) -> Vec<Line<'static>> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let text = if active {
        field.with_caret()
    } else {
        field.value.clone()
    };
    vec![Line::from(vec![
        Span::styled(format!("{} : ", label), label_style),
        Span::styled(text, value_style),
    ])]
}

fn choice_line(label: &str, value: &str, active: bool) -> Line<'static> {
    let label_style = Style::default()
        .fg(Color::Gray)
        .add_modifier(Modifier::BOLD | Modifier::DIM);
    let value_style = Style::default().fg(if active { Color::Cyan } else { Color::White });
    let value = if active {
        format!("‹ {} ›", value)
    } else {
        value.to_string()
    };
    Line::from(vec![
        Span::styled(format!("{} : ", label), label_style),
        Span::styled(value, value_style),
    ])
}

fn selected_task_detail(task: &Task) -> Line<'static> {
    let mut spans = vec![Span::styled(
        task.title.clone(),
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )];
    spans.push(Span::raw("  "));
    spans.push(Span::styled(
        board::due_line(task),
        Style::default().fg(Color::LightRed),
    ));
    if let Some(at) = task.reminder_at {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            format!(
                "rappel {}",
                at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M")
            ),
            Style::default().fg(Color::LightMagenta),
        ));
    }
    if let Some(description) = &task.description {
        spans.push(Span::raw("  "));
        spans.push(Span::styled(
            description.clone(),
            Style::default().fg(Color::Gray).add_modifier(Modifier::DIM),
        ));
    }
    Line::from(spans)
}

fn format_elapsed(last: Instant) -> String {
    let secs = last.elapsed().as_secs();
    if secs < 60 {
        format!("il y a {}s", secs)
    } else if secs < 3600 {
        format!("il y a {}min", secs / 60)
    } else {
        format!("il y a {}h", secs / 3600)
    }
}
