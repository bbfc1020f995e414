pub mod application;
pub mod domain;
pub mod infrastructure;

use application::bootstrap::{bootstrap_workspace, default_workspace_root, setup_logging};
use application::commands::{
    AppState, add_emotion_impl, add_todo_impl, ai_settings_impl, current_focus_impl,
    delete_emotion_impl, delete_todo_impl, emotion_stats_impl, end_focus_impl, feedbacks_impl,
    focus_presets_impl, focus_stats_impl, generate_feedback_impl, list_emotions_impl,
    list_focus_impl, list_todos_impl, login_impl, logout_impl, overview_impl, register_impl,
    resolve_preset, retry_close_impl, routes_impl, run_focus_impl, start_focus_impl,
    test_api_key_impl, todo_stats_impl, toggle_todo_impl, update_ai_settings_impl,
    update_todo_impl, watch_focus_impl, whoami_impl,
};
use application::console::{ConsoleRouter, PromptWriter, console_channels};
use application::focus_timer::{FocusTimerController, RunOutcome, SessionReviewer, TimerCommand};
use application::forms::{AiSettingsForm, RegistrationForm};
use application::presenter::{
    emotion_line, feedback_line, format_timestamp, session_line, timer_line, todo_line, user_line,
};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use domain::timer::TimerPreset;
use infrastructure::api_client::ReqwestApiClient;
use infrastructure::error::InfraError;
use serde::Serialize;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

#[derive(Debug, Parser)]
#[command(name = "adhd-helper", version, about = "Track emotions, focus sessions and todos")]
pub struct Cli {
    /// Workspace directory holding config/ and logs/
    #[arg(long, global = true, env = "ADHD_HELPER_ROOT")]
    root: Option<PathBuf>,

    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Print JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create the workspace and default config
    Init,
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "ADHD_HELPER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },
    Register(RegisterArgs),
    Logout,
    Whoami,
    /// Show the routes available to the current session
    Routes { route: Option<String> },
    #[command(subcommand)]
    Emotion(EmotionCommand),
    #[command(subcommand)]
    Focus(FocusCommand),
    #[command(subcommand)]
    Todo(TodoCommand),
    #[command(subcommand)]
    Ai(AiCommand),
    /// Dashboard summary cards
    Overview {
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Debug, Args)]
struct RegisterArgs {
    #[arg(long)]
    email: String,
    #[arg(long)]
    name: String,
    #[arg(long)]
    password: String,
    #[arg(long)]
    confirm_password: String,
    #[arg(long)]
    timezone: Option<String>,
}

#[derive(Debug, Args)]
struct ListWindow {
    #[arg(long)]
    skip: Option<u32>,
    #[arg(long)]
    limit: Option<u32>,
    #[arg(long)]
    start: Option<String>,
    #[arg(long)]
    end: Option<String>,
}

#[derive(Debug, Subcommand)]
enum EmotionCommand {
    Add {
        #[arg(long, default_value_t = 3)]
        level: u8,
        #[arg(long = "type", default_value = "neutral")]
        emotion_type: String,
        #[arg(long)]
        note: Option<String>,
    },
    List(ListWindow),
    Stats {
        #[arg(long)]
        days: Option<u32>,
    },
    Delete { id: String },
}

#[derive(Debug, Subcommand)]
enum FocusCommand {
    /// Run a countdown. Type p, r or s and Enter to pause, resume or stop.
    Start {
        #[arg(long = "type")]
        session_type: Option<String>,
        #[arg(long)]
        minutes: Option<u32>,
    },
    Presets,
    Current,
    /// Poll the open session until Ctrl-C
    Watch,
    End {
        id: String,
        #[arg(long)]
        rating: Option<u8>,
        #[arg(long)]
        notes: Option<String>,
    },
    List(ListWindow),
    Stats {
        #[arg(long)]
        days: Option<u32>,
    },
}

#[derive(Debug, Subcommand)]
enum TodoCommand {
    Add {
        title: String,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<u8>,
        #[arg(long)]
        due: Option<String>,
    },
    List {
        #[arg(long, conflicts_with = "pending")]
        completed: bool,
        #[arg(long)]
        pending: bool,
    },
    Update {
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<u8>,
        #[arg(long)]
        due: Option<String>,
        #[arg(long)]
        completed: Option<bool>,
    },
    Toggle { id: String },
    Delete { id: String },
    Stats,
}

#[derive(Debug, Subcommand)]
enum AiCommand {
    Settings,
    Update {
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        enable_analysis: Option<bool>,
        #[arg(long)]
        frequency: Option<String>,
    },
    TestKey { api_key: String },
    Generate {
        #[arg(long = "type")]
        feedback_type: Option<String>,
    },
    Feedbacks {
        #[arg(long)]
        limit: Option<u32>,
    },
}

pub async fn run() -> ExitCode {
    let cli = Cli::parse();
    let workspace_root = cli.root.clone().unwrap_or_else(default_workspace_root);

    let bootstrap = match bootstrap_workspace(&workspace_root) {
        Ok(bootstrap) => bootstrap,
        Err(error) => {
            eprintln!("error: failed to initialize workspace: {error}");
            return ExitCode::from(2);
        }
    };
    if let Err(error) = setup_logging(&cli.log_level, Some(&bootstrap.logs_dir)) {
        eprintln!("warning: logging disabled: {error}");
    }
    tracing::info!(
        root = %bootstrap.workspace_root.display(),
        api = %bootstrap.config.api_base_url,
        "adhd-helper v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let config_dir = bootstrap.config_dir.clone();
    let state = match AppState::new(bootstrap) {
        Ok(state) => state,
        Err(error) => {
            eprintln!("error: {}", error.user_message());
            return ExitCode::from(2);
        }
    };

    let json = cli.json;
    let name = command_name(&cli.command);
    let result = match cli.command {
        Command::Init => {
            let paths = serde_json::json!({
                "workspace_root": state.workspace_root().display().to_string(),
                "config_dir": config_dir.display().to_string(),
            });
            emit(json, &paths, |_| {
                format!(
                    "workspace ready at {}\nconfig: {}",
                    state.workspace_root().display(),
                    config_dir.display()
                )
            });
            Ok(())
        }
        command => dispatch(&state, command, json).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {}", state.command_error(name, &error));
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(state: &AppState, command: Command, json: bool) -> Result<(), InfraError> {
    let zone = state.display_zone().await;
    match command {
        Command::Init => Ok(()),
        Command::Login { email, password } => {
            let password = match password {
                Some(password) => password,
                None => read_password("Password (or set ADHD_HELPER_PASSWORD): ").await?,
            };
            let user = login_impl(state, email, password).await?;
            emit(json, &user, |user| format!("signed in as {}", user_line(user)));
            Ok(())
        }
        Command::Register(args) => {
            let form = RegistrationForm {
                email: args.email,
                name: args.name,
                password: args.password,
                confirm_password: args.confirm_password,
                timezone: args.timezone,
            };
            let user = register_impl(state, form).await?;
            emit(json, &user, |user| {
                format!("registered {}; sign in with `adhd-helper login`", user_line(user))
            });
            Ok(())
        }
        Command::Logout => {
            let auth = logout_impl(state).await?;
            emit(json, &auth, |_| "signed out".to_string());
            Ok(())
        }
        Command::Whoami => {
            let user = whoami_impl(state).await?;
            emit(json, &user, user_line);
            Ok(())
        }
        Command::Routes { route } => {
            let routes = routes_impl(state, route).await?;
            emit(json, &routes, |routes| {
                format!("{} -> {}", routes.routes.join(" "), routes.resolved)
            });
            Ok(())
        }
        Command::Emotion(command) => emotion_command(state, command, json, zone).await,
        Command::Focus(command) => focus_command(state, command, json, zone).await,
        Command::Todo(command) => todo_command(state, command, json, zone).await,
        Command::Ai(command) => ai_command(state, command, json, zone).await,
        Command::Overview { days } => {
            let overview = overview_impl(state, days).await?;
            emit(json, &overview, |overview| {
                let mut lines = vec![format!("last {} days", overview.days)];
                lines.extend(overview.cards.iter().map(ToString::to_string));
                lines.join("\n")
            });
            Ok(())
        }
    }
}

async fn emotion_command(
    state: &AppState,
    command: EmotionCommand,
    json: bool,
    zone: chrono_tz::Tz,
) -> Result<(), InfraError> {
    match command {
        EmotionCommand::Add {
            level,
            emotion_type,
            note,
        } => {
            let record = add_emotion_impl(state, level, emotion_type, note).await?;
            emit(json, &record, |record| emotion_line(record, zone));
        }
        EmotionCommand::List(window) => {
            let records =
                list_emotions_impl(state, window.skip, window.limit, window.start, window.end)
                    .await?;
            emit(json, &records, |records| {
                join_lines(records.iter().map(|record| emotion_line(record, zone)))
            });
        }
        EmotionCommand::Stats { days } => {
            let stats = emotion_stats_impl(state, days).await?;
            emit(json, &stats, |stats| {
                let mut lines = vec![
                    format!("records: {}", stats.total_records),
                    format!("average level: {:.1} / 5", stats.average_level),
                ];
                let mut distribution = stats.emotion_distribution.iter().collect::<Vec<_>>();
                distribution.sort();
                lines.extend(
                    distribution
                        .into_iter()
                        .map(|(emotion, count)| format!("  {emotion}: {count}")),
                );
                lines.join("\n")
            });
        }
        EmotionCommand::Delete { id } => {
            let deleted = delete_emotion_impl(state, id).await?;
            emit(json, &deleted, |_| "deleted".to_string());
        }
    }
    Ok(())
}

async fn focus_command(
    state: &AppState,
    command: FocusCommand,
    json: bool,
    zone: chrono_tz::Tz,
) -> Result<(), InfraError> {
    match command {
        FocusCommand::Start {
            session_type,
            minutes,
        } => {
            let preset = resolve_preset(state.config(), session_type.as_deref(), minutes)?;
            run_focus_session(state, preset, json, zone).await?;
        }
        FocusCommand::Presets => {
            let presets = focus_presets_impl(state);
            emit(json, &presets, |presets| {
                join_lines(presets.iter().map(|preset| {
                    format!("{} {} min", preset.session_type.as_str(), preset.duration_minutes)
                }))
            });
        }
        FocusCommand::Current => {
            let current = current_focus_impl(state).await?;
            emit(json, &current, |current| match current {
                Some(session) => session_line(session, zone),
                None => "no open session".to_string(),
            });
        }
        FocusCommand::Watch => watch_focus(state, json, zone).await,
        FocusCommand::End { id, rating, notes } => {
            let session = end_focus_impl(state, id, rating, notes).await?;
            emit(json, &session, |session| session_line(session, zone));
        }
        FocusCommand::List(window) => {
            let sessions =
                list_focus_impl(state, window.skip, window.limit, window.start, window.end)
                    .await?;
            emit(json, &sessions, |sessions| {
                join_lines(sessions.iter().map(|session| session_line(session, zone)))
            });
        }
        FocusCommand::Stats { days } => {
            let stats = focus_stats_impl(state, days).await?;
            emit(json, &stats, |stats| {
                format!(
                    "sessions: {}\ntotal: {} min\naverage: {:.1} min\nproductivity: {:.1} / 5",
                    stats.total_sessions,
                    stats.total_minutes,
                    stats.average_duration,
                    stats.average_productivity
                )
            });
        }
    }
    Ok(())
}

async fn run_focus_session(
    state: &AppState,
    preset: TimerPreset,
    json: bool,
    zone: chrono_tz::Tz,
) -> Result<(), InfraError> {
    let write_prompt: PromptWriter = Arc::new(|text: &str| print_flush(text));
    let (router, mut commands, reviewer) = console_channels(16, write_prompt);
    let (mut controller, session) = start_focus_impl(state, preset, Arc::new(reviewer)).await?;
    if !json {
        println!("{}", session_line(&session, zone));
        println!("p = pause, r = resume, s = stop");
    }

    let router = Arc::new(router);
    let input = tokio::spawn(forward_console_input(Arc::clone(&router)));
    let interrupt = tokio::spawn(stop_on_ctrl_c(Arc::clone(&router)));

    let result = run_focus_impl(state, &mut controller, &mut commands, |snapshot| {
        if !json {
            print_flush(&format!("\r{}   ", timer_line(snapshot)));
        }
    })
    .await;
    let result = match result {
        Err(error) if controller.pending_close().is_some() => {
            retry_until_closed(state, &mut controller, &mut commands, error).await
        }
        other => other,
    };

    input.abort();
    interrupt.abort();

    let outcome = result?;
    if !json {
        println!();
    }
    emit(json, &outcome, |outcome| match outcome {
        RunOutcome::Completed(session) => format!("completed: {}", session_line(session, zone)),
        RunOutcome::Stopped(Some(session)) => format!("stopped: {}", session_line(session, zone)),
        RunOutcome::Stopped(None) => "stopped".to_string(),
    });
    Ok(())
}

/// A failed close stays pending; `r` re-sends it, `s` leaves the session open.
async fn retry_until_closed<R>(
    state: &AppState,
    controller: &mut FocusTimerController<ReqwestApiClient, R>,
    commands: &mut mpsc::Receiver<TimerCommand>,
    mut error: InfraError,
) -> Result<RunOutcome, InfraError>
where
    R: SessionReviewer,
{
    loop {
        let Some(pending) = controller.pending_close().cloned() else {
            return Err(error);
        };
        eprintln!(
            "\nclosing session {} failed: {}",
            pending.session_id,
            error.user_message()
        );
        eprintln!("r = retry, s = leave it open");

        match commands.recv().await {
            Some(TimerCommand::Resume) => match retry_close_impl(state, controller).await {
                Ok(Some(session)) => return Ok(pending.outcome(session)),
                Ok(None) => return Ok(RunOutcome::Stopped(None)),
                Err(next) => error = next,
            },
            Some(TimerCommand::Pause) => {}
            Some(TimerCommand::Stop) | None => {
                controller.discard_pending_close();
                return Err(InfraError::Timer(format!(
                    "session {0} is still open; close it with `adhd-helper focus end {0}`",
                    pending.session_id
                )));
            }
        }
    }
}

async fn watch_focus(state: &AppState, json: bool, zone: chrono_tz::Tz) {
    let poller = watch_focus_impl(state);
    let mut updates = poller.subscribe();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = updates.borrow_and_update().clone();
                emit(json, &current, |current| {
                    let stamp = format_timestamp(Utc::now(), zone);
                    match current {
                        Some(session) => format!("[{stamp}] {}", session_line(session, zone)),
                        None => format!("[{stamp}] no open session"),
                    }
                });
            }
            _ = &mut interrupt => break,
        }
    }
    poller.abort();
}

async fn todo_command(
    state: &AppState,
    command: TodoCommand,
    json: bool,
    zone: chrono_tz::Tz,
) -> Result<(), InfraError> {
    let now = Utc::now();
    match command {
        TodoCommand::Add {
            title,
            description,
            priority,
            due,
        } => {
            let todo = add_todo_impl(state, title, description, priority, due).await?;
            emit(json, &todo, |todo| todo_line(todo, zone, now));
        }
        TodoCommand::List { completed, pending } => {
            let filter = match (completed, pending) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let todos = list_todos_impl(state, filter).await?;
            emit(json, &todos, |todos| {
                join_lines(todos.iter().map(|todo| todo_line(todo, zone, now)))
            });
        }
        TodoCommand::Update {
            id,
            title,
            description,
            priority,
            due,
            completed,
        } => {
            let todo =
                update_todo_impl(state, id, title, description, priority, due, completed).await?;
            emit(json, &todo, |todo| todo_line(todo, zone, now));
        }
        TodoCommand::Toggle { id } => {
            let todo = toggle_todo_impl(state, id).await?;
            emit(json, &todo, |todo| todo_line(todo, zone, now));
        }
        TodoCommand::Delete { id } => {
            let deleted = delete_todo_impl(state, id).await?;
            emit(json, &deleted, |_| "deleted".to_string());
        }
        TodoCommand::Stats => {
            let stats = todo_stats_impl(state).await?;
            emit(json, &stats, |stats| {
                format!(
                    "total: {}\ncompleted: {}\npending: {}\noverdue: {}\ncompletion: {:.1}%",
                    stats.total, stats.completed, stats.pending, stats.overdue, stats.completion_rate
                )
            });
        }
    }
    Ok(())
}

async fn ai_command(
    state: &AppState,
    command: AiCommand,
    json: bool,
    zone: chrono_tz::Tz,
) -> Result<(), InfraError> {
    match command {
        AiCommand::Settings => {
            let settings = ai_settings_impl(state).await?;
            emit(json, &settings, |settings| {
                format!(
                    "api key: {}\nanalysis: {}\nfeedback: {:?}",
                    if settings.has_api_key() { "set" } else { "not set" },
                    if settings.enable_ai_analysis { "on" } else { "off" },
                    settings.ai_feedback_frequency
                )
            });
        }
        AiCommand::Update {
            api_key,
            enable_analysis,
            frequency,
        } => {
            let form = AiSettingsForm {
                api_key,
                enable_ai_analysis: enable_analysis,
                feedback_frequency: frequency,
            };
            let response = update_ai_settings_impl(state, form).await?;
            emit(json, &response, |response| {
                response.message.clone().unwrap_or_else(|| "updated".to_string())
            });
        }
        AiCommand::TestKey { api_key } => {
            let result = test_api_key_impl(state, api_key).await?;
            emit(json, &result, |result| {
                let verdict = if result.valid { "valid" } else { "invalid" };
                match &result.message {
                    Some(message) => format!("{verdict}: {message}"),
                    None => verdict.to_string(),
                }
            });
        }
        AiCommand::Generate { feedback_type } => {
            let generated = generate_feedback_impl(state, feedback_type).await?;
            emit(json, &generated, |generated| generated.feedback.clone());
        }
        AiCommand::Feedbacks { limit } => {
            let feedbacks = feedbacks_impl(state, limit).await?;
            emit(json, &feedbacks, |feedbacks| {
                join_lines(feedbacks.iter().map(|feedback| feedback_line(feedback, zone)))
            });
        }
    }
    Ok(())
}

fn command_name(command: &Command) -> &'static str {
    match command {
        Command::Init => "init",
        Command::Login { .. } => "login",
        Command::Register(_) => "register",
        Command::Logout => "logout",
        Command::Whoami => "whoami",
        Command::Routes { .. } => "routes",
        Command::Emotion(_) => "emotion",
        Command::Focus(_) => "focus",
        Command::Todo(_) => "todo",
        Command::Ai(_) => "ai",
        Command::Overview { .. } => "overview",
    }
}

fn emit<T, F>(json: bool, value: &T, text: F)
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    if json {
        match serde_json::to_string_pretty(value) {
            Ok(rendered) => println!("{rendered}"),
            Err(error) => eprintln!("error: failed to render json: {error}"),
        }
    } else {
        println!("{}", text(value));
    }
}

fn join_lines<I>(lines: I) -> String
where
    I: Iterator<Item = String>,
{
    let lines = lines.collect::<Vec<_>>();
    if lines.is_empty() {
        "(none)".to_string()
    } else {
        lines.join("\n")
    }
}

fn print_flush(text: &str) {
    let mut stdout = std::io::stdout();
    let _ = stdout.write_all(text.as_bytes());
    let _ = stdout.flush();
}

async fn read_console_line(prompt: &str) -> Result<String, InfraError> {
    print_flush(prompt);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    Ok(lines.next_line().await?.unwrap_or_default())
}

#[derive(Debug, PartialEq, Eq)]
enum PasswordKey {
    Continue,
    Done,
    Cancelled,
}

/// Reads a line without echo when stdin is a terminal; piped input is read
/// as a plain line.
async fn read_password(prompt: &str) -> Result<String, InfraError> {
    if !std::io::stdin().is_terminal() {
        return read_console_line(prompt).await;
    }
    print_flush(prompt);
    let password = tokio::task::spawn_blocking(read_hidden_line)
        .await
        .map_err(|error| InfraError::Io(std::io::Error::other(error)))??;
    println!();
    Ok(password)
}

fn read_hidden_line() -> Result<String, InfraError> {
    enable_raw_mode()?;
    let result = collect_hidden_keys();
    disable_raw_mode()?;
    result
}

fn collect_hidden_keys() -> Result<String, InfraError> {
    let mut buffer = String::new();
    loop {
        if let Event::Key(key) = event::read()? {
            match apply_password_key(&mut buffer, key) {
                PasswordKey::Continue => {}
                PasswordKey::Done => return Ok(buffer),
                PasswordKey::Cancelled => {
                    return Err(InfraError::Validation("password entry cancelled".to_string()));
                }
            }
        }
    }
}

fn apply_password_key(buffer: &mut String, key: KeyEvent) -> PasswordKey {
    if key.kind != KeyEventKind::Press {
        return PasswordKey::Continue;
    }
    match key.code {
        KeyCode::Enter => PasswordKey::Done,
        KeyCode::Esc => PasswordKey::Cancelled,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            PasswordKey::Cancelled
        }
        KeyCode::Char(ch) => {
            buffer.push(ch);
            PasswordKey::Continue
        }
        KeyCode::Backspace => {
            buffer.pop();
            PasswordKey::Continue
        }
        _ => PasswordKey::Continue,
    }
}

async fn forward_console_input(router: Arc<ConsoleRouter>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if !router.route(&line).await {
            break;
        }
    }
}

async fn stop_on_ctrl_c(router: Arc<ConsoleRouter>) {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Ctrl+C received; stopping focus session");
        router.send_command(TimerCommand::Stop).await;
    }
}
