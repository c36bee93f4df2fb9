//! Execution Timeline
//!
//! Records step lifecycle events during a run for timing reports and
//! Gantt charts. Each event carries a wall-clock timestamp for reports and
//! a monotonic offset from the start of the run for durations.

use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventType {
    /// Step dispatched to a worker
    Started,
    /// Step completed successfully
    Completed,
    /// Step failed
    Failed,
    /// Step skipped without running
    Skipped,
}

impl EventType {
    fn ends_step(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Started => "started",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(label)
    }
}

/// A single event in the execution timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEvent {
    pub step_id: String,
    pub event_type: EventType,
    /// Wall-clock time of the event
    pub timestamp: DateTime<Utc>,
    /// Time since the timeline was created
    #[serde(rename = "offset_ms", serialize_with = "as_millis")]
    pub offset: Duration,
}

fn as_millis<S>(offset: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_u64(offset.as_millis() as u64)
}

/// Tracks the execution timeline of a run.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    started_at: DateTime<Utc>,
    #[serde(skip)]
    start_time: Instant,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            started_at: Utc::now(),
            start_time: Instant::now(),
        }
    }

    /// Records an event for a step.
    pub fn add_event(&mut self, step_id: impl Into<String>, event_type: EventType) {
        self.events.push(TimelineEvent {
            step_id: step_id.into(),
            event_type,
            timestamp: Utc::now(),
            offset: self.start_time.elapsed(),
        });
    }

    pub fn get_events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Events recorded for one step, in order.
    pub fn events_for(&self, step_id: &str) -> Vec<&TimelineEvent> {
        self.events.iter().filter(|e| e.step_id == step_id).collect()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Returns the total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Generates an ASCII Gantt chart.
    ///
    /// Each step that ran is a bar placed relative to the total run time.
    /// Skipped steps never ran and are listed below the chart.
    pub fn gantt_chart(&self) -> String {
        let mut output = format!(
            "\nExecution Timeline (started {}):\n\n",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );

        let total_time = self.elapsed().as_millis();
        if total_time == 0 {
            return output;
        }

        // Scale to 50 characters width
        let scale = 50.0 / total_time as f64;

        let mut spans: Vec<(String, u128, u128)> = self
            .spans()
            .into_iter()
            .map(|(id, (start, end))| (id, start, end))
            .collect();
        spans.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));

        for (step_id, start, end) in spans {
            let start_pos = (start as f64 * scale) as usize;
            let width = ((end - start) as f64 * scale).max(1.0) as usize;

            let mut bar = " ".repeat(start_pos);
            bar.push_str(&"#".repeat(width));

            output.push_str(&format!(
                "{:12} |{}| ({} ms)\n",
                truncate(&step_id, 12),
                bar,
                end - start
            ));
        }

        let skipped: Vec<&str> = self
            .events
            .iter()
            .filter(|e| e.event_type == EventType::Skipped)
            .map(|e| e.step_id.as_str())
            .collect();
        if !skipped.is_empty() {
            output.push_str(&format!("\nNot run: {}\n", skipped.join(", ")));
        }

        output.push_str(&format!("\nTotal: {} ms\n", total_time));
        output
    }

    /// Returns durations in milliseconds of steps that started and ended.
    pub fn get_durations(&self) -> HashMap<String, u128> {
        self.spans()
            .into_iter()
            .map(|(id, (start, end))| (id, end - start))
            .collect()
    }

    fn spans(&self) -> HashMap<String, (u128, u128)> {
        let mut starts: HashMap<&str, u128> = HashMap::new();
        let mut spans: HashMap<String, (u128, u128)> = HashMap::new();

        for event in &self.events {
            let at = event.offset.as_millis();
            if event.event_type == EventType::Started {
                starts.insert(event.step_id.as_str(), at);
            } else if event.event_type.ends_step() {
                if let Some(start) = starts.get(event.step_id.as_str()) {
                    spans.insert(event.step_id.clone(), (*start, at.max(*start)));
                }
            }
        }

        spans
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Pads or truncates a string to exactly `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_timeline_creation() {
        let timeline = ExecutionTimeline::new();
        assert!(timeline.get_events().is_empty());
        assert!(timeline.started_at() <= Utc::now());
    }

    #[test]
    fn test_add_events() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("step1", EventType::Started);
        thread::sleep(Duration::from_millis(10));
        timeline.add_event("step1", EventType::Completed);

        let events = timeline.get_events();
        assert_eq!(events.len(), 2);
        assert!(events[0].timestamp <= events[1].timestamp);
        assert!(events[0].offset <= events[1].offset);
    }

    #[test]
    fn test_get_durations() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("step1", EventType::Started);
        thread::sleep(Duration::from_millis(50));
        timeline.add_event("step1", EventType::Completed);

        let durations = timeline.get_durations();
        assert!(durations["step1"] >= 50);
    }

    #[test]
    fn test_failed_step_has_duration() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("step1", EventType::Started);
        timeline.add_event("step1", EventType::Failed);

        assert!(timeline.get_durations().contains_key("step1"));
        assert_eq!(timeline.get_events()[1].event_type, EventType::Failed);
    }

    #[test]
    fn test_skipped_step_has_no_duration() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("step3", EventType::Skipped);

        assert!(timeline.get_durations().is_empty());
        assert_eq!(timeline.events_for("step3").len(), 1);
    }

    #[test]
    fn test_only_started_has_no_duration() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("step1", EventType::Started);
        assert!(!timeline.get_durations().contains_key("step1"));
    }

    #[test]
    fn test_gantt_chart_generation() {
        let mut timeline = ExecutionTimeline::new();

        timeline.add_event("step1", EventType::Started);
        thread::sleep(Duration::from_millis(20));
        timeline.add_event("step1", EventType::Completed);
        timeline.add_event("step2", EventType::Started);
        thread::sleep(Duration::from_millis(20));
        timeline.add_event("step2", EventType::Failed);
        timeline.add_event("step3", EventType::Skipped);

        let chart = timeline.gantt_chart();
        assert!(chart.contains("step1"));
        assert!(chart.contains("step2"));
        assert!(chart.contains("Not run: step3"));
        assert!(chart.contains("Total:"));
    }

    #[test]
    fn test_gantt_chart_empty() {
        let timeline = ExecutionTimeline::new();
        assert!(timeline.gantt_chart().contains("Execution Timeline"));
    }

    #[test]
    fn test_timeline_json() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event("step1", EventType::Started);
        timeline.add_event("step1", EventType::Completed);

        let json = serde_json::to_value(&timeline).unwrap();
        let events = json["events"].as_array().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0]["step_id"], "step1");
        assert_eq!(events[1]["event_type"], "completed");
        assert!(events[1]["offset_ms"].is_u64());

        let stamp = events[0]["timestamp"].as_str().unwrap();
        assert!(DateTime::parse_from_rfc3339(stamp).is_ok());
        assert!(json["started_at"].is_string());
        assert!(json.get("start_time").is_none());
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 8), "short   ");
        assert_eq!(truncate("a_very_long_step_name", 12), "a_very_lo...");
    }

    #[test]
    fn test_event_type_display() {
        assert_eq!(EventType::Skipped.to_string(), "skipped");
        assert_ne!(EventType::Started, EventType::Completed);
    }
}
