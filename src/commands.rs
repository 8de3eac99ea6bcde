use crate::board::{self, Lanes, SortKey};
use crate::cli::ConfigAction;
use crate::config::Config;
use crate::form::TaskForm;
use crate::model::{Importance, Priority, Recurrence, Status, Task, TaskId, User};
use crate::poller::{
    alert_text, NotificationPermission, Notifier, Reminder, ReminderPoller, TerminalNotifier,
};
use crate::remote::{AuthBackend, AuthState, MemoryBackend, SupabaseClient};
use crate::storage::SessionLocation;
use crate::tracker::Tracker;
use crate::ui;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, Utc};
use std::io::stdout;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Tokens expiring within this many seconds are refreshed before a remote call.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Loaded config plus the backend and session it points at.
pub struct App {
    pub config: Config,
    pub config_path: PathBuf,
    pub tracker: Tracker,
    pub auth: AuthState,
}

impl App {
    pub fn open(config_path: Option<PathBuf>, offline: bool) -> Result<App> {
        let config_path = match config_path {
            Some(path) => path,
            None => Config::default_path()?,
        };
        let config = Config::load(&config_path)?;
        let (tracker, auth) = if offline {
            let backend = MemoryBackend::new();
            let session = backend.open_session(User {
                id: "local".into(),
                email: None,
            });
            (Tracker::new(Box::new(backend)), AuthState::new(Some(session)))
        } else {
            let backend = SupabaseClient::new(&config.backend(&config_path)?)?;
            let auth = AuthState::load(SessionLocation::default_location()?)?;
            (Tracker::new(Box::new(backend)), auth)
        };
        let mut app = App {
            config,
            config_path,
            tracker,
            auth,
        };
        app.tracker.set_session(app.auth.session());
        app.refresh_if_expiring(Utc::now());
        Ok(app)
    }

    /// Swaps in fresh tokens when the session expires within
    /// [`REFRESH_MARGIN_SECS`] of `now`. Returns whether tokens changed.
    pub fn refresh_if_expiring(&mut self, now: DateTime<Utc>) -> bool {
        let Some(session) = self.auth.session().cloned() else {
            return false;
        };
        if !session.is_expired(now + Duration::seconds(REFRESH_MARGIN_SECS)) {
            return false;
        }
        match self.tracker.backend().refresh(&session) {
            Ok(fresh) => {
                self.tracker.renew_session(&fresh);
                self.auth.replace_tokens(fresh);
                debug!("access token refreshed");
                true
            }
            Err(err) => {
                warn!(error = %err, "session expired and could not be refreshed");
                false
            }
        }
    }

    fn require_user(&self) -> Result<User> {
        self.auth
            .current_user()
            .cloned()
            .ok_or_else(|| anyhow!("not signed in, run `taches login <email>` first"))
    }
}

pub fn login(app: &App, email: String) -> Result<()> {
    app.tracker
        .backend()
        .request_code(email.trim())
        .with_context(|| format!("requesting a sign-in code for {}", email))?;
    println!("Code sent to {}", email);
    println!("Finish with: taches verify {} <code>", email);
    Ok(())
}

pub fn verify(app: &mut App, email: String, code: String) -> Result<()> {
    let session = app
        .tracker
        .backend()
        .verify_code(email.trim(), code.trim())
        .context("verifying sign-in code")?;
    app.auth.sign_in(session);
    app.tracker.set_session(app.auth.session());
    println!("Signed in as {}", email);
    Ok(())
}

pub fn logout(app: &mut App) -> Result<()> {
    let Some(session) = app.auth.session().cloned() else {
        println!("Not signed in");
        return Ok(());
    };
    if let Err(err) = app.tracker.backend().sign_out(&session) {
        warn!(error = %err, "remote sign-out failed, forgetting the session anyway");
    }
    app.auth.sign_out();
    app.tracker.set_session(None);
    println!("Signed out");
    Ok(())
}

pub fn whoami(app: &App) -> Result<()> {
    match app.auth.session() {
        Some(session) => {
            let user = app
                .tracker
                .backend()
                .fetch_user(session)
                .unwrap_or_else(|err| {
                    warn!(error = %err, "could not confirm the session with the backend");
                    session.user.clone()
                });
            println!("{} ({})", user.email.as_deref().unwrap_or("no email"), user.id);
        }
        None => println!("Not signed in"),
    }
    Ok(())
}

pub fn list(
    app: &mut App,
    search: Option<String>,
    sort: String,
    status: Option<String>,
) -> Result<()> {
    let user = app.require_user()?;
    let only = status
        .as_deref()
        .map(str::parse::<Status>)
        .transpose()?;
    app.tracker.reload().context("loading tasks")?;
    let key: SortKey = sort.parse().unwrap_or_default();
    let tasks = app.tracker.store().tasks();
    let lanes = Lanes::build(tasks, search.as_deref().unwrap_or(""), key);
    println!(
        "Board: {} (sort {})",
        user.email.as_deref().unwrap_or(&user.id),
        key
    );
    for (lane, items) in lanes.iter() {
        if only.is_some_and(|s| s != lane) {
            continue;
        }
        println!("{} ({})", lane, items.len());
        if items.is_empty() {
            println!("  (vide)");
        }
        for task in items {
            print_task(task);
        }
        println!();
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn add(
    app: &mut App,
    title: String,
    description: Option<String>,
    date: String,
    time: Option<String>,
    priority: Option<String>,
    importance: Option<String>,
    urgent: bool,
    reminder: Option<u32>,
    recurrence: Option<String>,
) -> Result<()> {
    app.require_user()?;
    let mut form = TaskForm {
        title,
        description: description.unwrap_or_default(),
        date,
        time: time.unwrap_or_default(),
        urgent,
        lead_days: reminder,
        ..TaskForm::default()
    };
    if let Some(p) = priority {
        form.priority = p.parse::<Priority>()?;
    }
    if let Some(i) = importance {
        form.importance = i.parse::<Importance>()?;
    }
    if let Some(r) = recurrence {
        form.recurrence = r.parse::<Recurrence>()?;
    }
    let draft = form.submit()?;
    let title = draft.title.clone();
    let id = app.tracker.create(draft).context("creating task")?;
    println!("Added task {}: {}", id, title);
    Ok(())
}

pub fn set_status(app: &mut App, task_id: String, status: String) -> Result<()> {
    app.require_user()?;
    let status: Status = status.parse()?;
    let id = TaskId::new(task_id);
    app.tracker
        .set_status(&id, status)
        .with_context(|| format!("moving task {} to {}", id, status))?;
    println!("Moved task {} to {}", id, status);
    Ok(())
}

pub fn delete(app: &mut App, task_id: String) -> Result<()> {
    app.require_user()?;
    let id = TaskId::new(task_id);
    app.tracker
        .delete(&id)
        .with_context(|| format!("deleting task {}", id))?;
    println!("Deleted task {}", id);
    Ok(())
}

/// Headless reminder loop. Reloads before every scan so tasks added
/// elsewhere are picked up; already fired reminders stay fired.
pub fn watch(app: &mut App) -> Result<()> {
    let user = app.require_user()?;
    let mut poller = ReminderPoller::new(
        app.config.poll_interval(),
        app.config.reminder_tolerance(),
    );
    let mut notifier: Box<dyn Notifier> = match app.config.notifications {
        NotificationPermission::System => {
            let mut desktop = TerminalNotifier::new(stdout());
            Box::new(move |r: &Reminder| {
                desktop.notify(r);
                println!("{}", alert_text(r));
            })
        }
        NotificationPermission::Alert => Box::new(|r: &Reminder| println!("{}", alert_text(r))),
    };
    app.tracker.reload().context("loading tasks")?;
    println!(
        "Watching {} task(s) for {} every {}s",
        app.tracker.store().len(),
        user.email.as_deref().unwrap_or(&user.id),
        poller.interval().as_secs()
    );
    poller.start(Instant::now());
    loop {
        if let Some(wait) = poller.remaining(Instant::now()) {
            thread::sleep(wait);
        }
        app.refresh_if_expiring(Utc::now());
        if let Err(err) = app.tracker.reload() {
            error!(error = %err, "reload failed, scanning the last known list");
        }
        poller.poll(
            Instant::now(),
            Utc::now(),
            app.tracker.store_mut(),
            notifier.as_mut(),
        );
    }
}

pub fn config(config_path: Option<PathBuf>, action: ConfigAction) -> Result<()> {
    let path = match config_path {
        Some(path) => path,
        None => Config::default_path()?,
    };
    match action {
        ConfigAction::Init => {
            Config::write_template(&path)?;
            println!("Wrote config template to {}", path.display());
        }
        ConfigAction::Show => {
            let config = Config::load(&path)?;
            println!("# {}", path.display());
            print!("{}", serde_yaml::to_string(&config).context("serializing config")?);
        }
    }
    Ok(())
}

/// Opens the board. A signed-out user lands on the sign-in dialog.
pub fn tui(app: App) -> Result<()> {
    ui::run(app)
}

fn print_task(task: &Task) {
    let marker = if task.urgent { "!" } else { "-" };
    println!("  {} {}: {}", marker, task.id, task.title);
    if let Some(description) = &task.description {
        println!("    {}", description);
    }
    println!("    {}", board::due_line(task));
    println!("    {}", board::classification_line(task));
    println!("    {}", board::schedule_line(task));
}
