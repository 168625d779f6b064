//! Assistant tools: calendar operations exposed to an LLM tool-calling loop.
//!
//! Reads are served from the mirror; a sync only runs when the last one is
//! older than the configured staleness bound.

use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::debug;

use crate::calendar::CalendarMetadata;
use crate::date_range::DateRange;
use crate::error::{OneError, OneResult};
use crate::event::{EventInput, MirrorEvent};
use crate::mutation::EventGateway;
use crate::sync::SyncEngine;

/// Length of an event when only its start is known
const DEFAULT_EVENT_MINUTES: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDefinition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDefinition {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        ToolDefinition {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }
}

/// Definitions of every tool [`AssistantTools::invoke`] understands.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition::function(
            "get_events",
            "Get the user's calendar events, optionally limited to a date range. \
             With only start_date, returns the events of that single day.",
            json!({
                "type": "object",
                "properties": {
                    "start_date": {
                        "type": "string",
                        "description": "First day (YYYY-MM-DD) or instant (RFC 3339)"
                    },
                    "end_date": {
                        "type": "string",
                        "description": "Last day (YYYY-MM-DD, inclusive) or instant (RFC 3339)"
                    }
                },
                "required": []
            }),
        ),
        ToolDefinition::function(
            "create_event",
            "Create one event on the user's primary calendar.",
            json!({
                "type": "object",
                "properties": {
                    "summary": { "type": "string", "description": "Event title" },
                    "description": { "type": "string", "description": "Optional details" },
                    "start": {
                        "type": "string",
                        "description": "Start as RFC 3339, or YYYY-MM-DDTHH:MM in the user's time zone"
                    },
                    "end": {
                        "type": "string",
                        "description": "End, same formats as start. Defaults to one hour after start"
                    }
                },
                "required": ["summary", "start"]
            }),
        ),
        ToolDefinition::function(
            "extract_event_fields",
            "Pull explicit ISO-8601 dates and times out of a message and suggest \
             create_event arguments. Does not understand relative dates like 'tomorrow'.",
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string", "description": "The user's message" }
                },
                "required": ["text"]
            }),
        ),
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetEventsArgs {
    #[serde(default, alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(default, alias = "endDate")]
    pub end_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateEventArgs {
    pub summary: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start: String,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractArgs {
    pub text: String,
}

/// One tool invocation as sent by the model: `{"name": ..., "arguments": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
    GetEvents(GetEventsArgs),
    CreateEvent(CreateEventArgs),
    ExtractEventFields(ExtractArgs),
}

/// Suggested `create_event` arguments.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub summary: String,
    pub start: Option<String>,
    pub end: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum ToolOutput {
    Events {
        events: Vec<MirrorEvent>,
        calendar: Option<CalendarMetadata>,
        /// Whether this call had to sync first
        synced: bool,
    },
    EventCreated {
        id: String,
        summary: String,
        start: String,
        end: String,
    },
    EventFields(ExtractedFields),
}

pub struct AssistantTools {
    sync: Arc<SyncEngine>,
    gateway: Arc<EventGateway>,
    max_staleness: Duration,
}

impl AssistantTools {
    pub fn new(sync: Arc<SyncEngine>, gateway: Arc<EventGateway>, max_staleness: Duration) -> Self {
        AssistantTools {
            sync,
            gateway,
            max_staleness,
        }
    }

    pub async fn invoke(&self, user_id: &str, call: ToolCall) -> OneResult<ToolOutput> {
        self.invoke_at(user_id, call, Utc::now()).await
    }

    pub async fn invoke_at(
        &self,
        user_id: &str,
        call: ToolCall,
        now: DateTime<Utc>,
    ) -> OneResult<ToolOutput> {
        match call {
            ToolCall::GetEvents(args) => self.get_events(user_id, &args, now).await,
            ToolCall::CreateEvent(args) => self.create_event(user_id, &args).await,
            ToolCall::ExtractEventFields(args) => {
                let tz = self.user_zone(user_id).await?;
                Ok(ToolOutput::EventFields(extract_event_fields(&args.text, tz)))
            }
        }
    }

    async fn cached_calendar(&self, user_id: &str) -> OneResult<Option<CalendarMetadata>> {
        self.sync.mirror().calendar_for_user(user_id).await
    }

    async fn user_zone(&self, user_id: &str) -> OneResult<Tz> {
        Ok(zone_of(self.cached_calendar(user_id).await?.as_ref()))
    }

    async fn get_events(
        &self,
        user_id: &str,
        args: &GetEventsArgs,
        now: DateTime<Utc>,
    ) -> OneResult<ToolOutput> {
        let cached = self.cached_calendar(user_id).await?;
        // Bad arguments fail before any sync
        DateRange::from_args(
            args.start_date.as_deref(),
            args.end_date.as_deref(),
            zone_of(cached.as_ref()),
        )?;

        let fresh = cached
            .as_ref()
            .is_some_and(|c| now - c.updated_at <= self.max_staleness);

        let (events, calendar, synced) = if fresh {
            let events = self.sync.mirror().events_for_user(user_id).await?;
            (events, cached, false)
        } else {
            debug!(user_id, "Mirror is stale, syncing before answering");
            let outcome = self.sync.sync_at(user_id, now).await?;
            (outcome.events, Some(outcome.calendar), true)
        };

        // The sync may have revealed the user's zone
        let range = DateRange::from_args(
            args.start_date.as_deref(),
            args.end_date.as_deref(),
            zone_of(calendar.as_ref()),
        )?;

        Ok(ToolOutput::Events {
            events: filter_events(events, &range),
            calendar,
            synced,
        })
    }

    async fn create_event(&self, user_id: &str, args: &CreateEventArgs) -> OneResult<ToolOutput> {
        let tz = self.user_zone(user_id).await?;
        let start = parse_tool_datetime(&args.start, tz)?;
        let end = match args.end.as_deref().filter(|s| !s.trim().is_empty()) {
            Some(end) => parse_tool_datetime(end, tz)?,
            None => start + Duration::minutes(DEFAULT_EVENT_MINUTES),
        };

        let input = EventInput {
            summary: args.summary.clone(),
            description: args.description.clone(),
            start,
            end,
        };
        let created = self.gateway.create(user_id, &input).await?;

        Ok(ToolOutput::EventCreated {
            id: created.id,
            summary: created.summary.unwrap_or(input.summary),
            start: input.start.to_rfc3339(),
            end: input.end.to_rfc3339(),
        })
    }
}

fn zone_of(calendar: Option<&CalendarMetadata>) -> Tz {
    calendar
        .and_then(|c| c.time_zone.parse::<Tz>().ok())
        .unwrap_or(Tz::UTC)
}

/// Keep the events overlapping `range`, preserving order.
pub fn filter_events(events: Vec<MirrorEvent>, range: &DateRange) -> Vec<MirrorEvent> {
    events.into_iter().filter(|e| range.matches(e)).collect()
}

/// Parse an RFC 3339 instant, or a local `YYYY-MM-DDTHH:MM[:SS]` / `YYYY-MM-DD` in `tz`.
pub fn parse_tool_datetime(s: &str, tz: Tz) -> OneResult<DateTime<FixedOffset>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt);
    }

    let naive = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .ok_or_else(|| {
            OneError::InvalidInput(format!(
                "Invalid date/time '{s}'. Use RFC 3339 or YYYY-MM-DDTHH:MM"
            ))
        })?;

    tz.from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
        .ok_or_else(|| OneError::InvalidInput(format!("'{s}' does not exist in {}", tz.name())))
}

static ISO_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:(?:\b(?:on|at|from|to|until|till|and)|-)\s*)?\b(\d{4}-\d{2}-\d{2}(?:[T ]\d{2}:\d{2}(?::\d{2}(?:\.\d+)?)?(?:Z|[+-]\d{2}:?\d{2})?)?)",
    )
    .expect("ISO token pattern is valid")
});

/// Pull explicit ISO-8601 tokens out of `text`: the first is the start, the
/// second (if any) the end. Whatever text remains is the summary.
pub fn extract_event_fields(text: &str, tz: Tz) -> ExtractedFields {
    let instants: Vec<DateTime<FixedOffset>> = ISO_TOKEN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| parse_tool_datetime(&m.as_str().replacen(' ', "T", 1), tz).ok())
        .collect();

    let summary = ISO_TOKEN.replace_all(text, " ");
    let summary = summary
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches(|c: char| c.is_ascii_punctuation() || c.is_whitespace())
        .to_string();

    let start = instants.first().copied();
    let end = instants
        .get(1)
        .copied()
        .filter(|end| start.is_some_and(|start| *end > start))
        .or_else(|| start.map(|s| s + Duration::minutes(DEFAULT_EVENT_MINUTES)));

    ExtractedFields {
        summary,
        start: start.map(|s| s.to_rfc3339()),
        end: end.map(|e| e.to_rfc3339()),
    }
}
