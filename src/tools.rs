//! MCP tool functions over the running observer

use rmcp::{model::*, ErrorData as McpError};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::adapters::directory::ConfiguredDirectory;
use crate::adapters::downloads::DownloadTracker;
use crate::observer::{Observer, SensorDirectory, StartOutcome, StopOutcome};
use crate::shared::{format_duration, internal_error};

const DEFAULT_EVENT_LIMIT: usize = 20;

// === Parameter Types ===

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SensorIdParams {
    #[schemars(description = "Sensor id as listed by list_sensors")]
    pub sensor_id: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DownloadParams {
    #[schemars(description = "Sensor id as listed by list_sensors")]
    pub sensor_id: String,
    #[schemars(description = "true when a data download starts, false when it ends")]
    pub active: bool,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct RecentEventsParams {
    #[schemars(description = "Maximum number of events to return, newest last (default: 20)")]
    pub limit: Option<usize>,
}

// === Report Types ===

#[derive(Debug, Serialize)]
pub struct StateReport {
    pub is_watching: bool,
    pub poll_interval: String,
    pub updating_by_id: BTreeMap<String, bool>,
    pub downloading: Vec<String>,
}

pub fn state_report(observer: &Observer, downloads: &DownloadTracker) -> StateReport {
    let snapshot = observer.state().snapshot();
    StateReport {
        is_watching: snapshot.is_watching,
        poll_interval: format_duration(observer.supervisor.poll_interval().as_secs()),
        updating_by_id: snapshot.updating_by_id,
        downloading: downloads.downloading(),
    }
}

fn json_result<T: Serialize>(value: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(value).map_err(|e| internal_error(e.to_string()))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}

// === Tool Functions ===

pub async fn start_watching(observer: &Observer) -> Result<CallToolResult, McpError> {
    let text = match observer.supervisor.start() {
        StartOutcome::Started => format!(
            "Battery polling started (every {})",
            format_duration(observer.supervisor.poll_interval().as_secs())
        ),
        StartOutcome::AlreadyWatching => "Battery polling is already running".to_string(),
    };
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

pub async fn stop_watching(observer: &Observer) -> Result<CallToolResult, McpError> {
    let text = match observer.supervisor.stop() {
        StopOutcome::Stopped => "Battery polling stopped. Queued updates will still run.",
        StopOutcome::NotWatching => "Battery polling was not running",
    };
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

pub async fn request_update(
    observer: &Observer,
    directory: &ConfiguredDirectory,
    params: SensorIdParams,
) -> Result<CallToolResult, McpError> {
    if let Err(e) = directory.get_by_id(&params.sensor_id).await {
        return Ok(CallToolResult::success(vec![Content::text(e.to_string())]));
    }

    observer
        .supervisor
        .request_update(params.sensor_id.clone())
        .map_err(|e| internal_error(e.to_string()))?;

    let note = if observer.state().is_updating(&params.sensor_id) {
        " (a read for it is in progress)"
    } else {
        ""
    };
    Ok(CallToolResult::success(vec![Content::text(format!(
        "Battery update queued for {}{}",
        params.sensor_id, note
    ))]))
}

pub async fn set_downloading(
    downloads: &DownloadTracker,
    params: DownloadParams,
) -> Result<CallToolResult, McpError> {
    let text = if params.active {
        downloads.begin(&params.sensor_id);
        format!("{} marked as downloading, battery reads skipped", params.sensor_id)
    } else {
        downloads.finish(&params.sensor_id);
        format!("{} download finished", params.sensor_id)
    };
    Ok(CallToolResult::success(vec![Content::text(text)]))
}

pub async fn get_observer_state(
    observer: &Observer,
    downloads: &DownloadTracker,
) -> Result<CallToolResult, McpError> {
    json_result(&state_report(observer, downloads))
}

pub async fn list_sensors(directory: &ConfiguredDirectory) -> Result<CallToolResult, McpError> {
    let sensors = directory
        .get_all()
        .await
        .map_err(|e| internal_error(e.to_string()))?;

    if sensors.is_empty() {
        return Ok(CallToolResult::success(vec![Content::text(
            "No sensors configured. Run `battery-observer config` to add some.",
        )]));
    }
    json_result(&sensors)
}

pub async fn get_recent_events(
    observer: &Observer,
    params: RecentEventsParams,
) -> Result<CallToolResult, McpError> {
    let events = observer
        .history
        .recent(params.limit.unwrap_or(DEFAULT_EVENT_LIMIT));

    if events.is_empty() {
        return Ok(CallToolResult::success(vec![Content::text(
            "No battery events yet",
        )]));
    }
    json_result(&events)
}
