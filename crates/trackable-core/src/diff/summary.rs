//! Human-readable rendering of change summaries.

use crate::diff::model::{ChangeSummary, EntityChangeEntry};
use crate::model::TrackingState;

/// Render a Markdown summary of a [`ChangeSummary`].
///
/// Output is deterministic for a given summary. It is informational only.
pub fn render_change_summary(summary: &ChangeSummary) -> String {
    let mut out = String::new();

    out.push_str("## Change Summary\n\n");
    out.push_str(&format!(
        "**Added**: {}  \n**Modified**: {}  \n**Deleted**: {}\n\n",
        summary.added, summary.modified, summary.deleted
    ));

    if summary.is_empty() {
        out.push_str("_No changes detected._\n");
        return out;
    }

    for state in [
        TrackingState::Added,
        TrackingState::Modified,
        TrackingState::Deleted,
    ] {
        let entries: Vec<&EntityChangeEntry> = summary
            .entities
            .iter()
            .filter(|e| e.state == state)
            .collect();
        if entries.is_empty() {
            continue;
        }

        out.push_str(&format!("### {}\n\n", state));
        for entry in entries {
            out.push_str(&format!("- {}", label(entry)));
            if !entry.modified_properties.is_empty() {
                out.push_str(&format!(" ({})", entry.modified_properties.join(", ")));
            }
            if let Some(via) = &entry.via {
                out.push_str(&format!(" via `{}`", via));
            }
            out.push('\n');
        }
        out.push('\n');
    }

    out
}

fn label(entry: &EntityChangeEntry) -> String {
    match &entry.primary_key {
        Some(key) => format!("{} `{}`", entry.entity_type, key),
        None => entry.entity_type.clone(),
    }
}
