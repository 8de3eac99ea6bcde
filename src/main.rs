use anyhow::Result;
use clap::Parser;
use taches::cli::{self, Command};
use taches::commands::{self, App};
use taches::logging::{self, LogTarget};

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let command = args.command.unwrap_or(Command::Tui);
    let target = match command {
        Command::Tui => LogTarget::File,
        _ => LogTarget::Stderr,
    };
    let _guard = logging::init(target, args.verbose)?;

    if let Command::Config { action } = command {
        return commands::config(args.config, action);
    }
    let mut app = App::open(args.config, args.offline)?;
    match command {
        Command::Login { email } => commands::login(&app, email),
        Command::Verify { email, code } => commands::verify(&mut app, email, code),
        Command::Logout => commands::logout(&mut app),
        Command::Whoami => commands::whoami(&app),
        Command::List {
            search,
            sort,
            status,
        } => commands::list(&mut app, search, sort, status),
        Command::Add {
            title,
            description,
            date,
            time,
            priority,
            importance,
            urgent,
            reminder,
            recurrence,
        } => commands::add(
            &mut app,
            title,
            description,
            date,
            time,
            priority,
            importance,
            urgent,
            reminder,
            recurrence,
        ),
        Command::Status { task_id, status } => commands::set_status(&mut app, task_id, status),
        Command::Delete { task_id } => commands::delete(&mut app, task_id),
        Command::Watch => commands::watch(&mut app),
        Command::Tui => commands::tui(app),
        Command::Config { .. } => Ok(()),
    }
}
