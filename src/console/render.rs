use crate::camera::Frame;
use crate::capture::{CaptureView, Notice, NoticeKind, PhotoRef, PreviewRegion};
use crate::utils::format::{format_error_message, format_success_message};
use crate::utils::time::format_time_local;
use chrono::{DateTime, Utc};

pub const PREVIEW_PLACEHOLDER: &str = "Camera preview will appear here";

pub fn render_view(view: &CaptureView, frame: Option<&Frame>) -> String {
    let mut out = String::new();

    out.push_str(&format!("[{}]\n", render_preview(&view.preview, frame)));
    out.push_str(&render_slot("Check-in ", view.check_in_at, view.check_in_photo.as_ref()));
    out.push('\n');
    out.push_str(&render_slot("Check-out", view.check_out_at, view.check_out_photo.as_ref()));
    out.push('\n');

    let actions: Vec<&str> = [
        (view.check_in_enabled, "in"),
        (view.check_out_enabled, "out"),
        (view.capture_enabled, "capture"),
        (view.cancel_enabled, "cancel"),
    ]
    .into_iter()
    .filter_map(|(enabled, name)| enabled.then_some(name))
    .collect();

    if actions.is_empty() {
        out.push_str("Nothing left to record today");
    } else {
        out.push_str(&format!("Available: {}", actions.join(", ")));
    }

    out
}

fn render_preview(region: &PreviewRegion, frame: Option<&Frame>) -> String {
    match region {
        PreviewRegion::Placeholder => PREVIEW_PLACEHOLDER.to_string(),
        PreviewRegion::Starting(slot) => format!("Starting camera for {}...", slot),
        PreviewRegion::Live(slot) => match frame {
            Some(frame) => format!(
                "Live {} preview {}x{}, type `capture` to take the photo",
                slot, frame.width, frame.height
            ),
            None => format!("Live {} preview, waiting for frames", slot),
        },
        PreviewRegion::Error { message, .. } => message.clone(),
        PreviewRegion::Submitting(slot) => format!("Submitting {}...", slot),
    }
}

fn render_slot(label: &str, at: Option<DateTime<Utc>>, photo: Option<&PhotoRef>) -> String {
    let time = at
        .map(format_time_local)
        .unwrap_or_else(|| "--:--:--".to_string());

    match photo {
        Some(PhotoRef::Url(url)) => format!("{}  {}  {}", label, time, url),
        Some(PhotoRef::Inline(image)) => format!(
            "{}  {}  captured {}x{} ({} bytes)",
            label,
            time,
            image.width(),
            image.height(),
            image.len()
        ),
        None => format!("{}  {}", label, time),
    }
}

pub fn render_notice(notice: &Notice) -> String {
    match notice.kind {
        NoticeKind::Success => format_success_message(&notice.title),
        NoticeKind::Error => match &notice.description {
            Some(description) => {
                format_error_message(&format!("{} {}", notice.title, description))
            }
            None => format_error_message(&notice.title),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::CaptureSlot;
    use crate::testing::{checked_in_day, test_frame, test_image};

    fn idle_view() -> CaptureView {
        CaptureView {
            state: "idle",
            preview: PreviewRegion::Placeholder,
            check_in_at: None,
            check_out_at: None,
            check_in_photo: None,
            check_out_photo: None,
            check_in_enabled: true,
            check_out_enabled: false,
            capture_enabled: false,
            cancel_enabled: false,
            error: None,
            notice: None,
        }
    }

    #[test]
    fn idle_view_shows_placeholder_and_check_in() {
        let text = render_view(&idle_view(), None);

        assert!(text.contains(PREVIEW_PLACEHOLDER));
        assert!(text.contains("Available: in"));
        assert!(!text.contains("out,"));
    }

    #[test]
    fn live_view_shows_frame_size() {
        let mut view = idle_view();
        view.preview = PreviewRegion::Live(CaptureSlot::CheckIn);
        view.check_in_enabled = false;
        view.capture_enabled = true;
        view.cancel_enabled = true;

        let text = render_view(&view, Some(&test_frame()));

        assert!(text.contains("Live check-in preview 4x3"));
        assert!(text.contains("Available: capture, cancel"));
    }

    #[test]
    fn photos_are_described() {
        let day = checked_in_day();
        let mut view = idle_view();
        view.check_in_at = day.check_in_at;
        view.check_in_photo = day.check_in_photo;
        view.check_out_photo = Some(PhotoRef::Inline(test_image()));

        let text = render_view(&view, None);

        assert!(text.contains("checkin.png"));
        assert!(text.contains("captured 4x3"));
    }

    #[test]
    fn device_error_replaces_preview() {
        let mut view = idle_view();
        view.preview = PreviewRegion::Error {
            slot: CaptureSlot::CheckIn,
            message: "No camera device was found.".to_string(),
        };

        assert!(render_view(&view, None).starts_with("[No camera device was found.]"));
    }

    #[test]
    fn error_notice_includes_description() {
        let notice = Notice {
            kind: NoticeKind::Error,
            title: "Check-in failed!, please try again.".to_string(),
            description: Some("Upload failed".to_string()),
        };

        let text = render_notice(&notice);

        assert!(text.contains("Check-in failed!, please try again. Upload failed"));
    }
}
