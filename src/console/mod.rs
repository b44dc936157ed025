pub mod commands;
pub mod render;

use crate::api::{ApiClient, AttendanceService};
use crate::camera::CameraBackend;
use crate::capture::{AttendanceCapturePresenter, PresenterError};
use crate::config::Config;
use crate::utils::format::{
    format_error_message, format_history, format_info_message, format_today_status,
    summarize_history,
};
use crate::utils::time::{format_long_date, get_current_date_local};
use anyhow::Result;
use commands::{Command, HELP};
use std::ops::ControlFlow;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

const HISTORY_DAYS: u64 = 4;

pub async fn run(config: &Config, api: Arc<ApiClient>, backend: Arc<dyn CameraBackend>) -> Result<()> {
    let mut out = tokio::io::stdout();

    say(
        &mut out,
        &format!(
            "Attendance for {} ({})",
            format_long_date(get_current_date_local()),
            api.auth().user().name
        ),
    )
    .await?;

    // Load today's record
    let today = match api.fetch_today().await {
        Ok(day) => day,
        Err(e) => {
            warn!(error = %e, "Failed to load today's attendance");
            say(&mut out, &format_error_message(&format!("Failed to load attendance: {}", e))).await?;
            None
        }
    };

    let service: Arc<dyn AttendanceService> = api.clone();
    let mut presenter = AttendanceCapturePresenter::new(backend, service);
    presenter.initialize(today)?;
    show(&mut out, &mut presenter).await?;
    say(&mut out, &format_info_message("Type `help` for the list of commands")).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut ticker = tokio::time::interval(config.preview_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if line.trim().is_empty() {
                    continue;
                }
                let flow = match line.parse::<Command>() {
                    Ok(command) => dispatch(command, &mut presenter, &api, &mut out).await?,
                    Err(e) => {
                        say(&mut out, &format_error_message(&e.to_string())).await?;
                        ControlFlow::Continue(())
                    }
                };
                if flow.is_break() {
                    break;
                }
            }
            Some(event) = presenter.next_event() => {
                presenter.handle_event(event);
                show(&mut out, &mut presenter).await?;
            }
            _ = ticker.tick() => {
                presenter.refresh_preview();
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                break;
            }
        }
    }

    presenter.teardown();
    info!("Console session ended");
    Ok(())
}

async fn dispatch<W: AsyncWrite + Unpin>(
    command: Command,
    presenter: &mut AttendanceCapturePresenter,
    api: &ApiClient,
    out: &mut W,
) -> Result<ControlFlow<()>> {
    match command {
        Command::CheckIn => {
            let result = presenter.on_user_request_check_in();
            respond(out, presenter, result).await?;
        }
        Command::CheckOut => {
            let result = presenter.on_user_request_check_out();
            respond(out, presenter, result).await?;
        }
        Command::Capture => {
            let result = presenter.on_user_snapshot();
            respond(out, presenter, result).await?;
        }
        Command::Cancel => {
            presenter.cancel();
            show(out, presenter).await?;
        }
        Command::Status => {
            say(out, &format_today_status(presenter.day())).await?;
        }
        Command::History => match api.fetch_history().await {
            Ok(days) => {
                let entries = summarize_history(&days, get_current_date_local(), HISTORY_DAYS);
                say(out, &format_history(&entries)).await?;
            }
            Err(e) => {
                warn!(error = %e, "Failed to load attendance history");
                say(out, &format_error_message(&format!("Failed to load history: {}", e))).await?;
            }
        },
        Command::Refresh => {
            presenter.refresh();
            say(out, &format_info_message("Refreshing attendance...")).await?;
        }
        Command::Help => say(out, HELP).await?,
        Command::Quit => return Ok(ControlFlow::Break(())),
    }

    Ok(ControlFlow::Continue(()))
}

async fn respond<W: AsyncWrite + Unpin>(
    out: &mut W,
    presenter: &mut AttendanceCapturePresenter,
    result: Result<(), PresenterError>,
) -> Result<()> {
    match result {
        Ok(()) => show(out, presenter).await,
        Err(e) => say(out, &format_error_message(&e.to_string())).await,
    }
}

async fn show<W: AsyncWrite + Unpin>(
    out: &mut W,
    presenter: &mut AttendanceCapturePresenter,
) -> Result<()> {
    if let Some(notice) = presenter.take_notice() {
        say(out, &render::render_notice(&notice)).await?;
    }

    let view = presenter.view();
    let frame = if view.preview_visible() {
        presenter.preview().borrow().clone()
    } else {
        None
    };
    say(out, &render::render_view(&view, frame.as_ref())).await
}

async fn say<W: AsyncWrite + Unpin>(out: &mut W, message: &str) -> Result<()> {
    out.write_all(message.as_bytes()).await?;
    out.write_all(b"\n").await?;
    out.flush().await?;
    Ok(())
}
