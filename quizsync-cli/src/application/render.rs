use quizsync_core::{SessionView, Verdict};
use quizsync_p2p::{PeerDescriptor, SyncEvent, SyncView};
use std::fmt::Write;

fn clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

fn status_line(view: &SyncView) -> String {
    let mode = match (view.role, view.solo) {
        (_, true) => "solo".to_string(),
        (Some(role), false) => role.to_string(),
        (None, false) => "negotiating".to_string(),
    };
    format!("[{} | {} device(s) linked]", mode, view.peers.len())
}

fn counters(session: &SessionView) -> String {
    format!(
        "✔ {}  ✘ {}  ⏱ {}  remaining {}",
        session.correct_count,
        session.wrong_count,
        clock(session.elapsed_seconds),
        session.remaining
    )
}

/// Current question with numbered answers
pub fn view(view: &SyncView) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", status_line(view));
    let _ = writeln!(out, "{}", counters(&view.session));

    match &view.session.question {
        Some(question) => {
            let _ = writeln!(out, "\n{}", question.text);
            for (position, answer) in question.answers.iter().enumerate() {
                let mark = if answer.selected { "[x]" } else { "[ ]" };
                let verdict = match answer.correct {
                    Some(true) => "  ✔",
                    Some(false) if answer.selected => "  ✘",
                    _ => "",
                };
                let _ = writeln!(out, "  {} {}. {}{}", mark, position + 1, answer.text, verdict);
            }
            if question.checked {
                let _ = writeln!(out, "\n(checked, type `next`)");
            }
        }
        None if view.session.finished => {
            let _ = writeln!(out, "\n🎉 All questions mastered");
        }
        None => {
            let _ = writeln!(out, "\nwaiting for the current question...");
        }
    }

    out.trim_end().to_string()
}

pub fn peers(peers: &[PeerDescriptor]) -> String {
    if peers.is_empty() {
        return "no other devices connected".to_string();
    }
    peers
        .iter()
        .map(|p| format!("  {} ({:?}, {}) {}", p.name, p.kind, p.role, p.remote))
        .collect::<Vec<_>>()
        .join("\n")
}

/// One-line notice for events worth showing at the prompt
pub fn event(event: &SyncEvent) -> Option<String> {
    match event {
        SyncEvent::RoleAssumed(role) => Some(format!("⇄ acting as {}", role)),
        SyncEvent::EnteredSolo { reason } => Some(format!("⇄ solo mode: {}", reason)),
        SyncEvent::PeerConnected(peer) => Some(format!("+ {} connected", peer.name)),
        SyncEvent::PeerDisconnected { remote } => Some(format!("- {} left", remote)),
        SyncEvent::Synced { .. } => Some("⇄ synchronized with host".to_string()),
        SyncEvent::AnswerChecked { verdict, .. } => Some(match verdict {
            Verdict::Correct => "✔ correct".to_string(),
            Verdict::Wrong => "✘ wrong".to_string(),
        }),
        SyncEvent::StateChanged => None,
    }
}
