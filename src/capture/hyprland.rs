use serde::Deserialize;

use super::{CaptureError, CaptureRegion};

#[derive(Deserialize)]
struct MonitorStatus {
    focused: bool,
    name: Option<String>,
    x: Option<i32>,
    y: Option<i32>,
    width: Option<i32>,
    height: Option<i32>,
    #[serde(default, rename = "activeWorkspace")]
    active_workspace: Option<WorkspaceStatus>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct FocusedMonitor {
    pub(super) name: String,
    pub(super) x: i32,
    pub(super) y: i32,
    pub(super) width: Option<u32>,
    pub(super) height: Option<u32>,
    pub(super) active_workspace_id: Option<i32>,
}

#[derive(Deserialize)]
struct WindowClientStatus {
    #[serde(default)]
    mapped: Option<bool>,
    #[serde(default)]
    hidden: Option<bool>,
    #[serde(default)]
    at: Option<[i32; 2]>,
    #[serde(default)]
    size: Option<[i32; 2]>,
    #[serde(default)]
    workspace: Option<WorkspaceStatus>,
    #[serde(default, rename = "focusHistoryID")]
    focus_history_id: Option<i32>,
}

#[derive(Deserialize)]
struct WorkspaceStatus {
    #[serde(default)]
    id: Option<i32>,
}

#[derive(Deserialize)]
struct CursorPosition {
    x: i32,
    y: i32,
}

fn normalize_dimension(value: Option<i32>) -> Option<u32> {
    value
        .and_then(|size| u32::try_from(size).ok())
        .filter(|size| *size > 0)
}

fn client_region(client: &WindowClientStatus) -> Option<CaptureRegion> {
    let [x, y] = client.at?;
    let [width, height] = client.size?;
    Some(CaptureRegion::new(
        x,
        y,
        normalize_dimension(Some(width))?,
        normalize_dimension(Some(height))?,
    ))
}

pub(super) fn parse_focused_monitor(monitors_json: &str) -> Result<FocusedMonitor, CaptureError> {
    let monitors: Vec<MonitorStatus> = serde_json::from_str(monitors_json).map_err(|err| {
        CaptureError::InvalidMonitorMetadata {
            message: err.to_string(),
        }
    })?;
    let monitor = monitors
        .into_iter()
        .find(|monitor| monitor.focused)
        .ok_or(CaptureError::NoFocusedMonitor)?;
    let name = monitor
        .name
        .filter(|item| !item.is_empty())
        .ok_or(CaptureError::NoFocusedMonitor)?;

    Ok(FocusedMonitor {
        name,
        x: monitor.x.unwrap_or(0),
        y: monitor.y.unwrap_or(0),
        width: normalize_dimension(monitor.width),
        height: normalize_dimension(monitor.height),
        active_workspace_id: monitor
            .active_workspace
            .and_then(|workspace| workspace.id)
            .filter(|id| *id != 0),
    })
}

/// `hyprctl activewindow -j` prints `{}` when nothing has focus.
pub(super) fn parse_active_window(window_json: &str) -> Result<CaptureRegion, CaptureError> {
    let client: WindowClientStatus =
        serde_json::from_str(window_json).map_err(|err| CaptureError::InvalidWindowMetadata {
            message: err.to_string(),
        })?;
    client_region(&client).ok_or_else(|| CaptureError::InvalidWindowMetadata {
        message: "no active window".to_string(),
    })
}

pub(super) fn parse_cursor_position(cursor_json: &str) -> Result<(i32, i32), CaptureError> {
    let position: CursorPosition =
        serde_json::from_str(cursor_json).map_err(|err| CaptureError::InvalidWindowMetadata {
            message: format!("invalid cursor position: {err}"),
        })?;
    Ok((position.x, position.y))
}

/// Topmost visible window on the workspace that contains the point. Hyprland orders
/// focus history with 0 as the most recently focused window.
pub(super) fn window_at_point(
    clients_json: &str,
    workspace_id: i32,
    point: (i32, i32),
) -> Result<CaptureRegion, CaptureError> {
    let clients: Vec<WindowClientStatus> =
        serde_json::from_str(clients_json).map_err(|err| CaptureError::InvalidWindowMetadata {
            message: err.to_string(),
        })?;

    clients
        .iter()
        .filter(|client| !client.hidden.unwrap_or(false) && !matches!(client.mapped, Some(false)))
        .filter(|client| {
            client.workspace.as_ref().and_then(|workspace| workspace.id) == Some(workspace_id)
        })
        .filter_map(|client| {
            let region = client_region(client)?;
            region
                .contains(point.0, point.1)
                .then_some((client.focus_history_id.unwrap_or(i32::MAX), region))
        })
        .min_by_key(|(focus_rank, _)| *focus_rank)
        .map(|(_, region)| region)
        .ok_or_else(|| CaptureError::InvalidSelection {
            message: format!("no window under cursor at {},{}", point.0, point.1),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_focused_monitor_prefers_focused_monitor() {
        let json = r#"[{"name":"DP-1","focused":false},{"name":"HDMI-A-1","focused":true,"x":100,"y":200,"width":2560,"height":1440,"activeWorkspace":{"id":3,"name":"3"}}]"#;
        assert_eq!(
            parse_focused_monitor(json).expect("focused monitor should parse"),
            FocusedMonitor {
                name: "HDMI-A-1".to_string(),
                x: 100,
                y: 200,
                width: Some(2560),
                height: Some(1440),
                active_workspace_id: Some(3),
            }
        );
    }

    #[test]
    fn parse_focused_monitor_errors_without_focused() {
        let json = r#"[{"name":"DP-1","focused":false}]"#;
        assert!(matches!(
            parse_focused_monitor(json).expect_err("must error without focused monitor"),
            CaptureError::NoFocusedMonitor
        ));
    }

    #[test]
    fn parse_active_window_reads_geometry() {
        let json = r#"{"title":"Editor","at":[12,34],"size":[800,600],"workspace":{"id":1}}"#;
        assert_eq!(
            parse_active_window(json).unwrap(),
            CaptureRegion::new(12, 34, 800, 600)
        );
    }

    #[test]
    fn parse_active_window_rejects_empty_object() {
        assert!(matches!(
            parse_active_window("{}"),
            Err(CaptureError::InvalidWindowMetadata { .. })
        ));
    }

    #[test]
    fn parse_cursor_position_reads_json() {
        assert_eq!(parse_cursor_position(r#"{"x":640,"y":-20}"#).unwrap(), (640, -20));
        assert!(parse_cursor_position("640, 20").is_err());
    }

    #[test]
    fn window_at_point_picks_most_recently_focused_overlap() {
        let clients_json = r#"
[
  {"title":"Back","mapped":true,"hidden":false,"workspace":{"id":1},"at":[0,0],"size":[1000,1000],"focusHistoryID":3},
  {"title":"Front","mapped":true,"hidden":false,"workspace":{"id":1},"at":[100,100],"size":[200,200],"focusHistoryID":0},
  {"title":"Hidden","mapped":true,"hidden":true,"workspace":{"id":1},"at":[100,100],"size":[50,50],"focusHistoryID":-1},
  {"title":"Elsewhere","mapped":true,"hidden":false,"workspace":{"id":2},"at":[100,100],"size":[50,50],"focusHistoryID":-2}
]
"#;
        assert_eq!(
            window_at_point(clients_json, 1, (150, 150)).unwrap(),
            CaptureRegion::new(100, 100, 200, 200)
        );
        assert_eq!(
            window_at_point(clients_json, 1, (900, 900)).unwrap(),
            CaptureRegion::new(0, 0, 1000, 1000)
        );
        assert!(matches!(
            window_at_point(clients_json, 1, (2000, 2000)),
            Err(CaptureError::InvalidSelection { .. })
        ));
    }
}
