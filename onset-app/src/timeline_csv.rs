use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use onset_core::{StimulusEvent, StimulusKind, Timeline};

pub fn load_timeline(path: &Path) -> Result<Timeline> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read timeline {}", path.display()))?;
    parse_timeline(&text).with_context(|| format!("invalid timeline {}", path.display()))
}

/// Parses `onset_ms,duration_ms,kind,payload` rows. Blank lines and `#`
/// comments are skipped and a first row whose onset is not a number is taken
/// as a header. The payload is everything after the third comma, so text
/// stimuli may contain commas.
pub fn parse_timeline(text: &str) -> Result<Timeline> {
    let mut events = Vec::new();
    let mut seen_row = false;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim_end_matches('\r');
        if line.trim().is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        let first_row = !seen_row;
        seen_row = true;
        let mut fields = line.splitn(4, ',');
        let onset = fields.next().unwrap_or_default().trim();
        if first_row && onset.parse::<u64>().is_err() {
            continue;
        }

        let onset_ms = parse_ms(onset, "onset", line_no)?;
        let duration_ms = parse_ms(
            fields.next().ok_or_else(|| anyhow!("line {line_no}: missing duration"))?,
            "duration",
            line_no,
        )?;
        let kind: StimulusKind = fields
            .next()
            .ok_or_else(|| anyhow!("line {line_no}: missing kind"))?
            .parse()
            .with_context(|| format!("line {line_no}"))?;
        let payload = fields.next().map(str::trim).unwrap_or_default();
        if payload.is_empty() && kind != StimulusKind::End {
            bail!("line {line_no}: {} stimulus without payload", kind.as_str());
        }

        events.push(StimulusEvent::new(onset_ms, duration_ms, kind, payload));
    }

    Ok(Timeline::new(events)?)
}

fn parse_ms(field: &str, what: &str, line_no: usize) -> Result<u64> {
    let field = field.trim();
    field
        .parse()
        .map_err(|_| anyhow!("line {line_no}: invalid {what} `{field}`"))
}
